//! Syscalls de tempo

use crate::core::kernel::Kernel;
use crate::mm::phys::PhysMemory;
use crate::sched::config::{ms_to_ticks, MAX_SLEEP_TICKS};
use crate::sched::task::PcbId;
use crate::syscall::error::SysResult;

/// sleep(ms). `sleep(0)` só cede o resto do quantum.
pub fn sys_sleep<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    let ms = k.arg(curr, 1);
    if ms == 0 {
        k.schedule(curr);
    } else {
        let ticks = core::cmp::min(ms_to_ticks(ms), MAX_SLEEP_TICKS);
        let wakeup = k.time().wrapping_add(ticks);
        k.sleep_until(curr, wakeup);
    }
    k.dispatch();
    Ok(Some(0))
}

/// gettime(): ticks desde o boot
pub fn sys_gettime<M: PhysMemory>(k: &mut Kernel<M>, _curr: PcbId) -> SysResult<Option<u32>> {
    Ok(Some(k.time()))
}
