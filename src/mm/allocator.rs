//! Alocador global (`Box`, `Vec`) do núcleo em bare-metal.
//!
//! Um bloco contíguo do heap de páginas vira arena do
//! `linked_list_allocator`. As páginas são identity-mapped no espaço do
//! kernel e copiadas para todo espaço de processo, então o heap é visível
//! independente do CR3 ativo.

use super::config::PAGE_SIZE;
use super::phys::PhysMemory;
use super::MemoryManager;
use linked_list_allocator::LockedHeap;

/// Páginas entregues ao alocador global (256 KiB)
pub const KERNEL_HEAP_PAGES: u32 = 64;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Reserva a arena e inicializa o alocador. Chamado uma vez, logo depois
/// de `MemoryManager::init`.
pub fn init_heap<M: PhysMemory>(mm: &mut MemoryManager<M>) {
    let base = match mm.page_alloc(KERNEL_HEAP_PAGES) {
        Some(base) => base,
        None => crate::kpanic!("(Heap) sem páginas para o alocador global"),
    };
    let size = (KERNEL_HEAP_PAGES * PAGE_SIZE) as usize;

    // SAFETY: as páginas acabaram de sair do heap de páginas e ficam com o
    // alocador para sempre; identidade garante virt == phys.
    unsafe {
        ALLOCATOR.lock().init(base.as_u32() as usize as *mut u8, size);
    }
    crate::kinfo!("(Heap) alocador global base=", base.as_u32(), " bytes=", size);
}
