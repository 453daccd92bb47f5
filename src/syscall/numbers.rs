//! # Syscall Numbers Registry
//!
//! Números fixos das chamadas de sistema. O número vai em `eax`; os
//! argumentos ficam na stack do processo, logo acima do contexto salvo.
//!
//! | Número | Chamada   | Argumentos                 |
//! |--------|-----------|----------------------------|
//! | 0      | exit      | status                     |
//! | 1      | fork      |                            |
//! | 2      | execp     | imagem, prio, argv         |
//! | 3      | kill      | pid                        |
//! | 4      | wait      | *status                    |
//! | 5      | sleep     | ms                         |
//! | 6      | read      | canal, buf, len            |
//! | 7      | write     | canal, buf, len            |
//! | 8      | sysstat   | *contagens                 |
//! | 9      | getpid    |                            |
//! | 10     | getppid   |                            |
//! | 11     | gettime   |                            |
//! | 12     | getprio   |                            |

/// Vetor de interrupção das syscalls
pub const SYSCALL_VECTOR: u32 = crate::arch::x86::context::VEC_SYSCALL;

// ============================================================================
// PROCESSO
// ============================================================================

/// Termina o processo atual
/// (status) -> !
pub const SYS_EXIT: u32 = 0;

/// Duplica o processo atual
/// () -> pid do filho (0 no filho)
pub const SYS_FORK: u32 = 1;

/// Troca a imagem do processo atual
/// (imagem_fisica, prio, argv) -> ! ou erro
pub const SYS_EXECP: u32 = 2;

/// Termina outro processo (0 = o próprio)
/// (pid) -> 0 ou erro
pub const SYS_KILL: u32 = 3;

/// Espera um filho terminar
/// (status_ptr) -> pid do filho
pub const SYS_WAIT: u32 = 4;

// ============================================================================
// TEMPO
// ============================================================================

/// Dorme (0 = cede a vez)
/// (ms) -> 0
pub const SYS_SLEEP: u32 = 5;

// ============================================================================
// IO
// ============================================================================

/// (canal, buf, len) -> bytes lidos
pub const SYS_READ: u32 = 6;

/// (canal, buf, len) -> len
pub const SYS_WRITE: u32 = 7;

// ============================================================================
// SISTEMA
// ============================================================================

/// Contagem de processos por estado
/// (contagens_ptr) -> processos ativos
pub const SYS_SYSSTAT: u32 = 8;

pub const SYS_GETPID: u32 = 9;
pub const SYS_GETPPID: u32 = 10;

/// Ticks desde o boot
pub const SYS_GETTIME: u32 = 11;

pub const SYS_GETPRIO: u32 = 12;

/// Tamanho da tabela de syscalls
pub const N_SYSCALLS: usize = 13;

// ============================================================================
// CANAIS
// ============================================================================

/// Console (leitura não bloqueante)
pub const CHAN_CONSOLE: u32 = 0;

/// COM1 (leitura bloqueante)
pub const CHAN_SERIAL: u32 = 1;
