//! Vetores de interrupção.
//!
//! [`VectorTable`] é a tabela instalável: um handler por vetor, recebendo
//! `(estado, vetor, código de erro)`. Em bare-metal este módulo também
//! carrega a IDT e os stubs de entrada.
//!
//! ## Entrada e saída (bare-metal)
//!
//! Todos os processos rodam em ring 0, então a CPU não troca de stack no
//! trap. O stub empilha o [`Context`](super::Context) na stack do processo
//! (janela fixa, diferente em cada espaço), salva `esp`, troca para a stack
//! de sistema (identidade, presente em todos os espaços) e chama
//! `ember_isr_entry(esp) -> esp`. O valor devolvido aponta para o contexto
//! do processo que deve rodar; o diretório dele já está em CR3.
//!
//! Uma exceção dentro do próprio núcleo (`EMBER_TRAP_DEPTH` > 0) fica na
//! stack de sistema corrente, sem recarregar o topo. A entrada não espera
//! pelo lock do núcleo nesse caso: [`try_enter`] devolve `None` e o
//! chamador só relata a falha ([`report_nested_fault`]).

use super::context::Context;

/// Handler de vetor
pub type IsrFn<C> = fn(&mut C, u32, u32);

/// Número de vetores x86
pub const N_VECTORS: usize = 256;

/// Tabela de handlers por vetor
pub struct VectorTable<C> {
    handlers: [Option<IsrFn<C>>; N_VECTORS],
}

impl<C> Default for VectorTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> VectorTable<C> {
    pub fn new() -> Self {
        Self {
            handlers: [None; N_VECTORS],
        }
    }

    /// Instala (ou troca) o handler de `vector`.
    pub fn install(&mut self, vector: u32, handler: IsrFn<C>) {
        match self.handlers.get_mut(vector as usize) {
            Some(slot) => {
                *slot = Some(handler);
                crate::ktrace!("(Trap) handler instalado vetor=", vector);
            }
            None => crate::kpanic!("(Trap) vetor fora da tabela: ", vector),
        }
    }

    pub fn get(&self, vector: u32) -> Option<IsrFn<C>> {
        self.handlers.get(vector as usize).copied().flatten()
    }

    pub fn is_installed(&self, vector: u32) -> bool {
        self.get(vector).is_some()
    }
}

/// Roda `f` sobre o estado travado sem esperar pelo lock. `None` quando o
/// lock já está tomado, isto é, o trap interrompeu o próprio núcleo.
pub fn try_enter<S, T>(lock: &spin::Mutex<S>, f: impl FnOnce(&mut S) -> T) -> Option<T> {
    let mut guard = lock.try_lock()?;
    Some(f(&mut guard))
}

/// Diagnóstico de uma exceção levantada com o núcleo já em execução.
pub fn report_nested_fault(ctx: &Context, cr2: u32) {
    crate::kerror!("(Trap) exceção dentro do núcleo vetor=", ctx.vector, " código=", ctx.code);
    crate::kerror!("(Trap) eip=", ctx.eip, " CR2=", cr2);
}

/// Endereço da rotina que chama `exit` quando o `main` de um processo
/// retorna. No host é só um valor reconhecível.
pub fn exit_trampoline() -> u32 {
    #[cfg(all(target_arch = "x86", target_os = "none"))]
    {
        extern "C" {
            fn ember_exit_trampoline();
        }
        ember_exit_trampoline as usize as u32
    }
    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    {
        HOST_EXIT_TRAMPOLINE
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub const HOST_EXIT_TRAMPOLINE: u32 = 0x0000_7E00;

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use bare::*;

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod bare {
    use super::super::context::{
        GDT_CODE, VEC_GENERAL_PROTECTION, VEC_INVALID_OPCODE, VEC_PAGE_FAULT, VEC_SERIAL,
        VEC_SYSCALL, VEC_TIMER,
    };
    use core::sync::atomic::AtomicU32;

    /// Topo da stack de sistema usada pelos handlers (definido no boot)
    #[no_mangle]
    pub static EMBER_SYSTEM_STACK_TOP: AtomicU32 = AtomicU32::new(0);

    /// Traps em andamento; só o stub mexe (interrupt gates, IF=0)
    #[no_mangle]
    pub static EMBER_TRAP_DEPTH: AtomicU32 = AtomicU32::new(0);

    // Vetores com código de erro empurrado pela CPU: 0x0D, 0x0E.
    core::arch::global_asm!(
        ".section .text",
        ".global ember_isr_06",
        "ember_isr_06:",
        "    push 0",
        "    push 0x06",
        "    jmp ember_isr_common",
        ".global ember_isr_0d",
        "ember_isr_0d:",
        "    push 0x0d",
        "    jmp ember_isr_common",
        ".global ember_isr_0e",
        "ember_isr_0e:",
        "    push 0x0e",
        "    jmp ember_isr_common",
        ".global ember_isr_20",
        "ember_isr_20:",
        "    push 0",
        "    push 0x20",
        "    jmp ember_isr_common",
        ".global ember_isr_24",
        "ember_isr_24:",
        "    push 0",
        "    push 0x24",
        "    jmp ember_isr_common",
        ".global ember_isr_80",
        "ember_isr_80:",
        "    push 0",
        "    push 0x80",
        "    jmp ember_isr_common",
        "",
        "ember_isr_common:",
        "    pushad",
        "    push ds",
        "    push es",
        "    push fs",
        "    push gs",
        "    push ss",
        "    mov eax, esp",
        // aninhado: já está na stack de sistema
        "    cmp dword ptr [EMBER_TRAP_DEPTH], 0",
        "    jne 3f",
        "    mov esp, dword ptr [EMBER_SYSTEM_STACK_TOP]",
        "3:  inc dword ptr [EMBER_TRAP_DEPTH]",
        "    push eax",
        "    call ember_isr_entry",
        "    dec dword ptr [EMBER_TRAP_DEPTH]",
        "    mov esp, eax",
        ".global ember_isr_return",
        "ember_isr_return:",
        "    pop ss",
        "    pop gs",
        "    pop fs",
        "    pop es",
        "    pop ds",
        "    popad",
        "    add esp, 8",
        "    iretd",
        "",
        ".global ember_exit_trampoline",
        "ember_exit_trampoline:",
        "    push eax",
        "    push 0",
        "    mov eax, 0",
        "    int 0x80",
        "2:  hlt",
        "    jmp 2b",
    );

    extern "C" {
        fn ember_isr_06();
        fn ember_isr_0d();
        fn ember_isr_0e();
        fn ember_isr_20();
        fn ember_isr_24();
        fn ember_isr_80();
    }

    /// Entrada da IDT (8 bytes em modo protegido)
    #[derive(Clone, Copy)]
    #[repr(C, packed)]
    struct IdtEntry {
        offset_low: u16,
        selector: u16,
        zero: u8,
        type_attr: u8,
        offset_high: u16,
    }

    impl IdtEntry {
        const fn missing() -> Self {
            Self {
                offset_low: 0,
                selector: 0,
                zero: 0,
                type_attr: 0,
                offset_high: 0,
            }
        }

        fn new(handler: u32) -> Self {
            Self {
                offset_low: (handler & 0xFFFF) as u16,
                selector: GDT_CODE as u16,
                zero: 0,
                type_attr: 0x8E, // Present, DPL 0, Interrupt Gate 32-bit
                offset_high: (handler >> 16) as u16,
            }
        }
    }

    #[repr(C, align(8))]
    struct Idt {
        entries: [IdtEntry; super::N_VECTORS],
    }

    #[repr(C, packed)]
    struct IdtDescriptor {
        limit: u16,
        base: u32,
    }

    static IDT: spin::Mutex<Idt> = spin::Mutex::new(Idt {
        entries: [IdtEntry::missing(); super::N_VECTORS],
    });

    /// Preenche e carrega a IDT com os stubs do núcleo.
    ///
    /// # Safety
    /// Interrupções devem estar desligadas e `EMBER_SYSTEM_STACK_TOP`
    /// precisa apontar para uma stack mapeada antes do primeiro `sti`.
    pub unsafe fn load_idt() {
        let stubs: [(u32, unsafe extern "C" fn()); 6] = [
            (VEC_INVALID_OPCODE, ember_isr_06),
            (VEC_GENERAL_PROTECTION, ember_isr_0d),
            (VEC_PAGE_FAULT, ember_isr_0e),
            (VEC_TIMER, ember_isr_20),
            (VEC_SERIAL, ember_isr_24),
            (VEC_SYSCALL, ember_isr_80),
        ];

        let mut idt = IDT.lock();
        for (vector, stub) in stubs {
            idt.entries[vector as usize] = IdtEntry::new(stub as usize as u32);
        }

        let descriptor = IdtDescriptor {
            limit: (core::mem::size_of::<Idt>() - 1) as u16,
            base: &*idt as *const Idt as u32,
        };
        core::arch::asm!("lidt [{}]", in(reg) &descriptor, options(readonly, nostack, preserves_flags));
        crate::kinfo!("(Trap) IDT carregada base=", descriptor.base);
    }

    /// Salta para o primeiro processo restaurando o contexto em `esp`.
    ///
    /// # Safety
    /// `esp` deve apontar para um `Context` válido no espaço ativo.
    pub unsafe fn enter_first(esp: u32) -> ! {
        core::arch::asm!(
            "mov esp, {0}",
            "jmp ember_isr_return",
            in(reg) esp,
            options(noreturn)
        );
    }
}
