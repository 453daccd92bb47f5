//! Alocador de slices (1/4 de página).
//!
//! O link do free list fica na primeira palavra de cada slice livre. Quando
//! a lista esvazia, o chamador (MemoryManager) entrega uma página nova que é
//! cortada em `SLICES_PER_PAGE` pedaços.

use crate::mm::addr::PhysAddr;
use crate::mm::config::{PAGE_SIZE, SLICES_PER_PAGE, SLICE_SIZE};
use crate::mm::phys::PhysMemory;

pub struct SliceAllocator {
    head: PhysAddr,
    free: u32,
    pages_carved: u32,
}

impl Default for SliceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SliceAllocator {
    pub const fn new() -> Self {
        Self {
            head: PhysAddr::NULL,
            free: 0,
            pages_carved: 0,
        }
    }

    /// Slices livres na lista
    pub fn free_slices(&self) -> u32 {
        self.free
    }

    /// Páginas já consumidas pelo alocador de slices
    pub fn pages_carved(&self) -> u32 {
        self.pages_carved
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Corta uma página em slices e empilha todos.
    pub fn carve<M: PhysMemory>(&mut self, mem: &mut M, page: PhysAddr) {
        crate::kassert!(1, page.is_aligned(PAGE_SIZE), "(Heap) página de slices desalinhada");
        for i in 0..SLICES_PER_PAGE {
            self.push(mem, page.add(i * SLICE_SIZE));
        }
        self.pages_carved += 1;
        crate::ktrace!("(Heap) página cortada em slices @ ", page.as_u32());
    }

    /// Retira um slice (zerado) da lista.
    pub fn pop<M: PhysMemory>(&mut self, mem: &mut M) -> Option<PhysAddr> {
        if self.head.is_null() {
            return None;
        }
        let slice = self.head;
        self.head = PhysAddr::new(mem.read_u32(slice));
        self.free -= 1;
        mem.fill(slice, 0, SLICE_SIZE);
        Some(slice)
    }

    /// Devolve um slice à lista (sem coalescência).
    pub fn push<M: PhysMemory>(&mut self, mem: &mut M, slice: PhysAddr) {
        if slice.is_null() {
            return;
        }
        crate::kassert!(1, slice.is_aligned(SLICE_SIZE), "(Heap) slice desalinhado");
        mem.write_u32(slice, self.head.as_u32());
        self.head = slice;
        self.free += 1;
    }
}
