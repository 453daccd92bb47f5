//! # Kernel Heap (páginas + slices)
//!
//! Dois grãos de alocação sobre a memória livre descoberta no boot:
//!
//! - **Páginas** (`page.rs`): blocos de N páginas contíguas, first-fit sobre
//!   um free list ordenado por endereço. O nó `{pages, next}` de cada bloco
//!   livre vive dentro do próprio bloco.
//! - **Slices** (`slice.rs`): pedaços de 1 KiB (1/4 de página) para objetos
//!   pequenos do kernel (qnodes, cabeçalhos de fila). Free list simples, sem
//!   ordem e sem coalescência.
//!
//! ## 🏗️ Arquitetura
//!
//! ```text
//!   _free_pages ──► [pages=3|next] ──► [pages=1|next] ──► [pages=40|NULL]
//!                    0x0010_0000         0x0010_5000         0x0012_0000
//! ```
//!
//! ## ⚠️ Disciplina de free
//! O alocador não guarda o tamanho original de cada alocação: quem pediu N
//! páginas devolve uma página por vez. Cada `page_free` tenta fundir a
//! página com o vizinho anterior e/ou seguinte.

pub mod page;
pub mod slice;

pub use page::PageHeap;
pub use slice::SliceAllocator;
