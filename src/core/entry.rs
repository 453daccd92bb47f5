//! Entry Point Lógico do Kernel.
//!
//! `kmain` é o primeiro código Rust depois do `_start` do binário. Ele
//! monta o [`Kernel`] global, sobe os subsistemas, roda os self-tests e
//! salta para o init. Daí em diante o núcleo só roda dentro de
//! interrupções, via `ember_isr_entry`.

use crate::arch::x86::context::Context;
use crate::arch::x86::cpu::read_cr2;
use crate::arch::x86::trap::{enter_first, load_idt, report_nested_fault, try_enter};
use crate::arch::{Cpu, CpuOps};
use crate::core::kernel::{BootConfig, Kernel};
use crate::drivers::pic;
use crate::drivers::serial::{self, SerialConsole, SerialPort};
use crate::mm::phys::IdentityMemory;
use crate::sched::exec::Elf32Loader;
use alloc::boxed::Box;
use spin::Mutex;

/// O núcleo. Só é tocado com interrupções desligadas (boot e handlers
/// de interrupt gate), então o lock nunca é disputado.
static KERNEL: Mutex<Option<Kernel<IdentityMemory>>> = Mutex::new(None);

/// Chamado pelo stub comum de interrupção com o `esp` do contexto salvo.
/// Devolve o `esp` do contexto a restaurar.
#[no_mangle]
extern "C" fn ember_isr_entry(esp: u32) -> u32 {
    match try_enter(&KERNEL, |slot| slot.as_mut().map(|k| k.trap(esp))) {
        Some(Some(next)) => next,
        Some(None) => crate::kpanic!("(Trap) interrupção antes do núcleo existir esp=", esp),
        None => {
            // SAFETY: o stub acabou de empilhar um Context completo em `esp`.
            let ctx = unsafe { *(esp as *const Context) };
            report_nested_fault(&ctx, read_cr2());
            Cpu::hang()
        }
    }
}

/// Função principal do Kernel.
///
/// `init_entry` é o entry point do processo init, deixado pelo bootstrap.
#[no_mangle]
pub extern "C" fn kmain(init_entry: u32) -> ! {
    serial::init();
    crate::kinfo!("(Boot) Ember iniciando, init em ", init_entry);
    pic::init();

    let esp = {
        let mut guard = KERNEL.lock();
        // Dispositivos e loader são ZSTs: os Box não tocam o heap, que
        // ainda não existe aqui.
        // SAFETY: única instância; paginação ainda desligada.
        let mem = unsafe { IdentityMemory::new() };
        let k = guard.insert(Kernel::new(
            mem,
            Box::new(SerialConsole),
            Box::new(SerialPort),
            Box::new(Elf32Loader),
        ));
        k.init(&BootConfig::new(init_entry));

        #[cfg(feature = "self_test")]
        {
            let report = crate::core::test::run_all(k);
            if report.failed > 0 {
                crate::kpanic!("(Boot) self-tests falharam: ", report.failed);
            }
        }

        k.resume_esp()
    };

    // SAFETY: interrupções seguem desligadas desde o bootstrap; a stack de
    // sistema foi publicada por `Kernel::init`. O EFLAGS do contexto do
    // init liga IF no `iretd`.
    unsafe {
        load_idt();
        enter_first(esp)
    }
}
