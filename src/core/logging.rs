// =============================================================================
// KERNEL LOGGING SYSTEM - ZERO OVERHEAD
// =============================================================================
//
// Sistema de logging do Ember com custo ZERO quando desligado.
//
// ARQUITETURA:
// - Features do Cargo fazem o filtro em tempo de compilação
// - Com feature "no_logs", TODOS os macros viram expressões vazias
// - SEM core::fmt - a formatação é feita por `emit_record` a partir de uma
//   lista tipada de argumentos (`LogArg`)
// - SEM alocação - apenas strings e inteiros
// - Escreve APENAS na serial (ou stderr nos testes de host)
//
// NÍVEIS DE LOG (do mais crítico ao menos):
// - ERROR: Erros fatais ou críticos
// - WARN:  Situações suspeitas mas recuperáveis
// - INFO:  Fluxo normal de execução
// - DEBUG: Informações de debugging
// - TRACE: Detalhes extremos (cada operação)
//
// COMO USAR:
//   kinfo!("(PMM) Inicializando...");                  // Apenas string
//   kinfo!("(PMM) Addr=", 0x1000);                     // String + hex
//   kdebug!("(Sched) pid=", pid, " prio=", prio);      // Pares rótulo/valor
//
// =============================================================================

use crate::drivers::serial;

// =============================================================================
// PREFIXOS COM CORES ANSI
// =============================================================================

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";

/// Um argumento de log já tipado.
///
/// Substitui o `printf` variádico: quem chama diz explicitamente como
/// cada valor deve ser formatado.
#[derive(Debug, Clone, Copy)]
pub enum LogArg<'a> {
    Str(&'a str),
    Hex(u64),
    Dec(u64),
}

/// Emite uma linha de log: prefixo, argumentos, CRLF.
#[inline(never)]
pub fn emit_record(prefix: &str, args: &[LogArg<'_>]) {
    serial::emit_str(prefix);
    emit_args(args);
    serial::emit_nl();
}

/// Emite argumentos sem prefixo nem quebra de linha (usado pelos dumps).
pub fn emit_args(args: &[LogArg<'_>]) {
    for arg in args {
        match *arg {
            LogArg::Str(s) => serial::emit_str(s),
            LogArg::Hex(v) => serial::emit_hex(v),
            LogArg::Dec(v) => serial::emit_dec(v),
        }
    }
}

/// Monta a lista `[Str(msg), Hex(val), Str(msg2), Hex(val2), ...]`.
#[doc(hidden)]
#[macro_export]
macro_rules! __klog_record {
    ($prefix:expr, $msg:expr $(, $val:expr $(, $more_msg:expr, $more_val:expr)*)?) => {{
        $crate::core::logging::emit_record(
            $prefix,
            &[
                $crate::core::logging::LogArg::Str($msg),
                $(
                    $crate::core::logging::LogArg::Hex($val as u64),
                    $(
                        $crate::core::logging::LogArg::Str($more_msg),
                        $crate::core::logging::LogArg::Hex($more_val as u64),
                    )*
                )?
            ],
        );
    }};
}

// =============================================================================
// MACROS DE LOG - NÍVEL ERROR
// =============================================================================
//
// kerror! - Sempre ativo (exceto com no_logs)
//

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)+) => {
        $crate::__klog_record!($crate::core::logging::P_ERROR, $($t)+)
    };
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL WARN
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)+) => {
        $crate::__klog_record!($crate::core::logging::P_WARN, $($t)+)
    };
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL INFO
// =============================================================================
//
// kinfo! - Ativo com log_info, log_debug ou log_trace
//

#[cfg(all(
    not(feature = "no_logs"),
    any(feature = "log_info", feature = "log_debug", feature = "log_trace")
))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)+) => {
        $crate::__klog_record!($crate::core::logging::P_INFO, $($t)+)
    };
}

#[cfg(not(all(
    not(feature = "no_logs"),
    any(feature = "log_info", feature = "log_debug", feature = "log_trace")
)))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL DEBUG
// =============================================================================

#[cfg(all(
    not(feature = "no_logs"),
    any(feature = "log_debug", feature = "log_trace")
))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)+) => {
        $crate::__klog_record!($crate::core::logging::P_DEBUG, $($t)+)
    };
}

#[cfg(not(all(
    not(feature = "no_logs"),
    any(feature = "log_debug", feature = "log_trace")
)))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL TRACE
// =============================================================================

#[cfg(all(not(feature = "no_logs"), feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)+) => {
        $crate::__klog_record!($crate::core::logging::P_TRACE, $($t)+)
    };
}

#[cfg(not(all(not(feature = "no_logs"), feature = "log_trace")))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}
