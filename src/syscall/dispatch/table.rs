//! # Syscall Table
//!
//! Tabela de handlers indexada pelo número da syscall. Como o handler
//! recebe `&mut Kernel<M>`, a tabela é montada por uma função genérica em
//! vez de um `static`.

use crate::core::kernel::Kernel;
use crate::mm::phys::PhysMemory;
use crate::sched::task::PcbId;
use crate::syscall::error::SysResult;
use crate::syscall::numbers::*;
use crate::syscall::{io, process, system, time};

/// Handler de syscall: recebe o chamador.
pub type SyscallHandler<M> = fn(&mut Kernel<M>, PcbId) -> SysResult<Option<u32>>;

/// Tabela completa, na ordem dos números.
pub fn table<M: PhysMemory>() -> [SyscallHandler<M>; N_SYSCALLS] {
    let exit: SyscallHandler<M> = process::sys_exit;
    let mut table = [exit; N_SYSCALLS];

    // === PROCESSO ===
    table[SYS_EXIT as usize] = process::sys_exit;
    table[SYS_FORK as usize] = process::sys_fork;
    table[SYS_EXECP as usize] = process::sys_execp;
    table[SYS_KILL as usize] = process::sys_kill;
    table[SYS_WAIT as usize] = process::sys_wait;

    // === TEMPO ===
    table[SYS_SLEEP as usize] = time::sys_sleep;
    table[SYS_GETTIME as usize] = time::sys_gettime;

    // === IO ===
    table[SYS_READ as usize] = io::sys_read;
    table[SYS_WRITE as usize] = io::sys_write;

    // === SISTEMA ===
    table[SYS_SYSSTAT as usize] = system::sys_sysstat;
    table[SYS_GETPID as usize] = system::sys_getpid;
    table[SYS_GETPPID as usize] = system::sys_getppid;
    table[SYS_GETPRIO as usize] = system::sys_getprio;

    table
}
