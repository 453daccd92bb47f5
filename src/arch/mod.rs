//! # Camada de Arquitetura
//!
//! Única ponte entre o núcleo e o hardware x86 32-bit: portas de I/O,
//! registradores de controle, imagem de contexto salva nas interrupções e
//! a tabela de vetores.
//!
//! Fora de `target_arch = "x86"` + `target_os = "none"` as instruções
//! privilegiadas viram shims inertes, e o resto do núcleo roda igual nos
//! testes de host.

pub mod traits;
pub mod x86;

pub use traits::CpuOps;
pub use x86::cpu::X86Cpu as Cpu;
