//! Syscalls de consulta

use crate::core::kernel::Kernel;
use crate::mm::addr::VirtAddr;
use crate::mm::phys::PhysMemory;
use crate::sched::task::{PcbId, N_STATES};
use crate::syscall::abi::is_user_range;
use crate::syscall::error::{SysError, SysResult};

/// sysstat(counts): N_STATES contagens por estado; devolve os ativos.
pub fn sys_sysstat<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    let ptr = k.arg(curr, 1);
    if !is_user_range(ptr, (N_STATES * 4) as u32) {
        return Err(SysError::BadParam);
    }
    let space = k.procs.get(curr).space.ok_or(SysError::Failure)?;

    let mut counts = [0u32; N_STATES];
    let active = k.procs.pcount(&mut counts);
    for (i, count) in counts.iter().enumerate() {
        k.mm.write_user_u32(space, VirtAddr::new(ptr + i as u32 * 4), *count)?;
    }
    Ok(Some(active as u32))
}

pub fn sys_getpid<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    Ok(Some(k.procs.get(curr).pid))
}

pub fn sys_getppid<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    Ok(Some(k.procs.get(curr).ppid))
}

/// getprio(): classe do chamador (0 = System)
pub fn sys_getprio<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    Ok(Some(k.procs.get(curr).prio.index() as u32))
}
