//! Operações de CPU que o escalonador e o panic handler precisam.

pub trait CpuOps {
    /// Espera a próxima interrupção (HLT)
    fn halt();

    /// CLI
    fn disable_interrupts();

    /// STI
    fn enable_interrupts();

    fn are_interrupts_enabled() -> bool;

    /// Executa `f` com interrupções mascaradas, restaurando o estado anterior.
    fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
        let was_enabled = Self::are_interrupts_enabled();
        if was_enabled {
            Self::disable_interrupts();
        }
        let result = f();
        if was_enabled {
            Self::enable_interrupts();
        }
        result
    }

    /// Para a máquina de vez (panic).
    fn hang() -> ! {
        Self::disable_interrupts();
        loop {
            Self::halt();
        }
    }
}
