//! Interfaces que o núcleo usa para falar com a CPU.

pub mod cpu;

pub use cpu::CpuOps;
