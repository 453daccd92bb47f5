//! x86 32-bit, modo protegido, um único núcleo.

pub mod context;
pub mod cpu;
pub mod port;
pub mod trap;

pub use context::{Context, CONTEXT_SIZE};
pub use trap::{IsrFn, VectorTable};
