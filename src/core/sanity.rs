//! Sanity checks em camadas.
//!
//! `kassert!(nivel, cond, msg)` só avalia `cond` quando `nivel <= SANITY`.
//! Convenção dos níveis:
//!
//! | Nível | Custo                                             |
//! |-------|---------------------------------------------------|
//! | 0     | Sempre ativo (estado impossível, corrupção)       |
//! | 1     | O(1), barato                                      |
//! | 2     | O(1) em caminhos quentes (clock, dispatch)        |
//! | 3     | O(n) em listas curtas (tabela de processos)       |
//! | 4     | O(n) em listas longas (free list inteiro)         |
//!
//! Com a feature `sanity_off` só os checks de nível 0 sobrevivem.

#[cfg(not(feature = "sanity_off"))]
pub const SANITY: u32 = 9999;

#[cfg(feature = "sanity_off")]
pub const SANITY: u32 = 0;

/// Loga em ERROR e entra em panic.
#[macro_export]
macro_rules! kpanic {
    ($msg:expr) => {{
        $crate::kerror!("*** KERNEL PANIC ***");
        $crate::kerror!($msg);
        panic!("{}", $msg)
    }};
    ($msg:expr, $val:expr) => {{
        $crate::kerror!("*** KERNEL PANIC ***");
        $crate::kerror!($msg, $val);
        panic!("{}{:#x}", $msg, $val as u64)
    }};
}

/// Assert condicionado ao nível de sanity.
#[macro_export]
macro_rules! kassert {
    ($level:expr, $cond:expr, $msg:expr) => {{
        #[allow(clippy::absurd_extreme_comparisons)]
        let active = $level <= $crate::core::sanity::SANITY;
        if active && !($cond) {
            $crate::kpanic!($msg);
        }
    }};
}
