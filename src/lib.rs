//! Ember Kernel Library.
//!
//! Núcleo preemptivo para uma máquina x86 32-bit de um único núcleo:
//! memória física e virtual, descritores de processo, stacks, escalonador
//! por prioridades e a fronteira de syscalls.
//!
//! Fora de `cargo test` a biblioteca é `no_std`. Tudo que toca hardware
//! real (portas de I/O, CR0/CR3, stubs de interrupção, panic handler) só
//! compila para `target_arch = "x86"` + `target_os = "none"`; no host os
//! algoritmos rodam sobre uma RAM simulada (`mm::phys::RamArena`).

#![cfg_attr(not(test), no_std)]

// Habilitar alocação dinâmica (Vec/Box/String)
extern crate alloc;

// --- Módulos de Baixo Nível (Hardware) ---
pub mod arch; // CPU, contexto salvo, vetores de interrupção
pub mod drivers; // Serial (logs), dispositivos de caractere, PIC, PIT

// --- Módulos Centrais ---
pub mod core; // Logging, sanity, panic, estado do kernel, boot
pub mod klib; // Bitmap, motor de filas, framework de testes
pub mod mm; // Frames, heap (páginas/slices), VMM

// --- Subsistemas ---
pub mod sched; // PCBs, stacks, escalonador, clock, exec
pub mod syscall; // Interface com userspace (int 0x80)

pub use crate::core::kernel::{BootConfig, Kernel};
