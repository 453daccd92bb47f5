//! Controle da CPU: interrupções, HLT, CR0/CR2/CR3, TLB.

use crate::arch::traits::CpuOps;

/// Bit PG do CR0
#[cfg(all(target_arch = "x86", target_os = "none"))]
const CR0_PAGING: u32 = 1 << 31;

/// Bit IF do EFLAGS
#[cfg(all(target_arch = "x86", target_os = "none"))]
const EFLAGS_IF: u32 = 1 << 9;

pub struct X86Cpu;

#[cfg(all(target_arch = "x86", target_os = "none"))]
impl CpuOps for X86Cpu {
    #[inline]
    fn halt() {
        // SAFETY: HLT só espera a próxima interrupção
        unsafe { core::arch::asm!("hlt", options(nomem, nostack, preserves_flags)) }
    }

    #[inline]
    fn disable_interrupts() {
        // SAFETY: CLI
        unsafe { core::arch::asm!("cli", options(nomem, nostack)) }
    }

    #[inline]
    fn enable_interrupts() {
        // SAFETY: STI
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) }
    }

    fn are_interrupts_enabled() -> bool {
        let flags: u32;
        // SAFETY: só lê EFLAGS
        unsafe {
            core::arch::asm!("pushfd", "pop {}", out(reg) flags, options(nomem, preserves_flags));
        }
        flags & EFLAGS_IF != 0
    }
}

/// No host não há interrupções: tudo é síncrono.
#[cfg(not(all(target_arch = "x86", target_os = "none")))]
impl CpuOps for X86Cpu {
    fn halt() {
        core::hint::spin_loop();
    }

    fn disable_interrupts() {}

    fn enable_interrupts() {}

    fn are_interrupts_enabled() -> bool {
        false
    }
}

/// Carrega CR3 e liga a paginação (CR0.PG).
pub fn load_page_directory(dir: u32) {
    #[cfg(all(target_arch = "x86", target_os = "none"))]
    // SAFETY: o diretório mapeia em identidade o código e a stack do núcleo
    unsafe {
        core::arch::asm!("mov cr3, {}", in(reg) dir, options(nostack, preserves_flags));
        let mut cr0: u32;
        core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        if cr0 & CR0_PAGING == 0 {
            cr0 |= CR0_PAGING;
            core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nostack, preserves_flags));
        }
    }
    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    {
        crate::ktrace!("(VMM) CR3 <- ", dir);
    }
}

/// Invalida a entrada de TLB de uma página
pub fn invalidate_page(virt: u32) {
    #[cfg(all(target_arch = "x86", target_os = "none"))]
    // SAFETY: INVLPG não tem efeito além da TLB
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) virt, options(nostack, preserves_flags));
    }
    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    {
        let _ = virt;
    }
}

/// Endereço que provocou o último page fault
pub fn read_cr2() -> u32 {
    #[cfg(all(target_arch = "x86", target_os = "none"))]
    {
        let cr2: u32;
        // SAFETY: leitura de registrador de controle
        unsafe {
            core::arch::asm!("mov {}, cr2", out(reg) cr2, options(nomem, nostack, preserves_flags));
        }
        cr2
    }
    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    {
        0
    }
}
