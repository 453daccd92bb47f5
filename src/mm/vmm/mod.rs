//! # VMM - Virtual Memory Manager
//!
//! Paginação x86 de dois níveis: diretório de 1024 PDEs, cada uma apontando
//! para uma tabela de 1024 PTEs (páginas de 4 KiB). Diretórios e tabelas
//! vivem em frames do PMM e são manipulados via `PhysMemory`.
//!
//! ## Cópia de espaço de endereçamento
//!
//! `copy_address_space` duplica diretório e tabelas mas NÃO os frames
//! finais: pai e filho enxergam a mesma memória física. Não existe
//! copy-on-write nem tratamento de page fault (o handler só reporta).
//!
//! ```text
//!   pai:   DIR ──▶ TBL_a ──▶ frame X
//!   filho: DIR'──▶ TBL_a'──▶ frame X   (mesmo X)
//! ```

pub mod entry;
pub mod space;
pub mod user;

pub use entry::{Entry, EntryFlags, FRAME_MASK};
pub use space::AddressSpace;
