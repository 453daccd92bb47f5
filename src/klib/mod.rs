//! Kernel Library (KLib).
//!
//! Utilitários agnósticos de hardware para uso interno do Kernel.

pub mod bitmap;
pub mod queue;
pub mod test_framework;

pub use queue::{OrderId, QueueEngine, QueueError, QueueId};
