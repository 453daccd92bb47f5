//! # PMM - Physical Memory Manager
//!
//! Alocação de frames físicos a partir de um bitmap plano sobre a região de
//! bootstrap. Quando o bitmap esgota, o `MemoryManager` recorre ao
//! alocador de páginas do heap (ver `mm::MemoryManager::alloc_frame`).

pub mod bitmap;
pub mod frame;

pub use bitmap::BitmapFrameAllocator;
pub use frame::PhysFrame;

/// Tamanho de um frame (4KB)
pub const FRAME_SIZE: u32 = crate::mm::config::PAGE_SIZE;
