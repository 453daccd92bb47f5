//! # Syscall Dispatcher
//!
//! Um único vetor (0x80). O número vem do `eax` salvo; fora da tabela, o
//! chamador é terminado com status `E_BAD_PARAM`.

pub mod table;

use crate::core::kernel::Kernel;
use crate::mm::phys::PhysMemory;
use crate::sched::task::PcbId;
use crate::syscall::error::SysError;
use crate::syscall::numbers::SYSCALL_VECTOR;

pub use table::SyscallHandler;

impl<M: PhysMemory> Kernel<M> {
    pub(crate) fn syscall_init(&mut self) {
        self.vectors.install(SYSCALL_VECTOR, Self::syscall_isr);
        crate::kinfo!("(Syscall) vetor instalado ", SYSCALL_VECTOR);
    }

    /// Handler do vetor de syscall
    fn syscall_isr(k: &mut Self, _vector: u32, _code: u32) {
        let curr = k.current_or_panic();
        let num = k.syscall_number(curr);
        crate::ktrace!("(Syscall) num=", num, " pid=", k.procs.get(curr).pid);

        let handler = match table::table::<M>().get(num as usize) {
            Some(&handler) => handler,
            None => {
                k.bad_syscall(curr, num);
                return;
            }
        };

        match handler(k, curr) {
            Ok(Some(value)) => k.set_ret(curr, value),
            Ok(None) => {}
            Err(e) => {
                crate::ktrace!(e.as_str());
                k.set_ret(curr, e.as_i32() as u32);
            }
        }
    }

    /// Número desconhecido: exit forçado com `E_BAD_PARAM`.
    fn bad_syscall(&mut self, curr: PcbId, num: u32) {
        crate::kwarn!("(Syscall) número inválido ", num, " pid=", self.procs.get(curr).pid);
        self.procs.get_mut(curr).exit_status = SysError::BadParam.as_i32();
        self.perform_exit(curr);
        self.dispatch();
    }
}

#[cfg(test)]
mod tests {
    use crate::sched::task::Priority;
    use crate::syscall::error::SysError;
    use crate::syscall::numbers::{N_SYSCALLS, SYS_WAIT};
    use crate::syscall::test_support::*;

    #[test]
    fn unknown_number_forces_exit_with_bad_param() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        let status_at = user_page(&mut k, init);
        let child = spawn_ready(&mut k, Priority::User);
        let pid = k.pcb(child).pid;

        syscall(&mut k, SYS_WAIT, [status_at, 0, 0]);
        assert_eq!(k.current(), Some(child));
        syscall(&mut k, N_SYSCALLS as u32 + 40, [0; 3]);

        assert_eq!(k.current(), Some(init));
        assert_eq!(ret_of(&k, init) as u32, pid);
        assert_eq!(read_user_u32(&k, init, status_at) as i32, SysError::BadParam.as_i32());
        assert!(k.procs().pcb_find(pid).is_none());
    }
}
