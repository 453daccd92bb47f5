//! # Syscall ABI
//!
//! Convenção de chamada (int 0x80, ring 0):
//!
//! ```text
//!  ctx + 0            Context salvo (eax = número da syscall)
//!  ctx + 72   ARG(0)  endereço de retorno do wrapper
//!  ctx + 76   ARG(1)  primeiro argumento
//!  ctx + 80   ARG(2)
//!  ctx + 84   ARG(3)
//! ```
//!
//! O retorno vai no `eax` salvo, restaurado pelo `popad` da saída do trap.

use crate::arch::x86::context::{CONTEXT_SIZE, EAX_OFFSET};
use crate::core::kernel::Kernel;
use crate::mm::config::{KERNEL_VIRT_BASE, STACK_SIZE, STACK_WINDOW_BASE, USER_SPACE_BASE};
use crate::mm::phys::PhysMemory;
use crate::sched::task::PcbId;

/// Maior índice de argumento lido
pub const MAX_ARG_INDEX: u32 = 3;

/// `[addr, addr+len)` cai inteiro na região de usuário ou na janela de
/// stack? Ponteiro nulo nunca é válido.
pub fn is_user_range(addr: u32, len: u32) -> bool {
    let end = match addr.checked_add(len) {
        Some(end) => end,
        None => return false,
    };
    let in_user = addr >= USER_SPACE_BASE && end <= KERNEL_VIRT_BASE;
    let in_stack = addr >= STACK_WINDOW_BASE && end <= STACK_WINDOW_BASE + STACK_SIZE;
    addr != 0 && (in_user || in_stack)
}

impl<M: PhysMemory> Kernel<M> {
    /// ARG(n) do processo `id`. Fora da stack lê 0.
    pub(crate) fn arg(&self, id: PcbId, n: u32) -> u32 {
        let off = self.procs.get(id).context + CONTEXT_SIZE + n * 4;
        if n > MAX_ARG_INDEX || off + 4 > STACK_SIZE {
            crate::kwarn!("(Syscall) argumento fora da stack n=", n);
            return 0;
        }
        self.mm.mem().read_u32(self.stack_of(id).phys(off))
    }

    /// Grava o valor de retorno no `eax` salvo de `id`.
    pub(crate) fn set_ret(&mut self, id: PcbId, value: u32) {
        let at = self.context_addr(id).add(EAX_OFFSET);
        self.mm.mem_mut().write_u32(at, value);
    }

    /// Número da syscall (eax no momento do trap)
    pub(crate) fn syscall_number(&self, id: PcbId) -> u32 {
        self.mm.mem().read_u32(self.context_addr(id).add(EAX_OFFSET))
    }
}
