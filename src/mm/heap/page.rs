//! Alocador de páginas: free list ordenado por endereço, first-fit.

use crate::mm::addr::PhysAddr;
use crate::mm::config::{pages_to_bytes, PAGE_SIZE};
use crate::mm::phys::PhysMemory;
use alloc::vec::Vec;

/// Offset do campo `pages` no nó em memória
const NODE_PAGES: u32 = 0;
/// Offset do campo `next` no nó em memória
const NODE_NEXT: u32 = 4;

/// Free list de blocos de páginas.
///
/// Invariantes: ordenado por endereço, sem sobreposição, e nenhum par de
/// blocos fisicamente adjacentes fica separado (são sempre fundidos).
pub struct PageHeap {
    head: PhysAddr,
    free_pages: u32,
}

impl Default for PageHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl PageHeap {
    pub const fn new() -> Self {
        Self {
            head: PhysAddr::NULL,
            free_pages: 0,
        }
    }

    /// Total de páginas livres
    pub fn free_pages(&self) -> u32 {
        self.free_pages
    }

    fn pages_of<M: PhysMemory>(mem: &M, block: PhysAddr) -> u32 {
        mem.read_u32(block.add(NODE_PAGES))
    }

    fn next_of<M: PhysMemory>(mem: &M, block: PhysAddr) -> PhysAddr {
        PhysAddr::new(mem.read_u32(block.add(NODE_NEXT)))
    }

    fn write_node<M: PhysMemory>(mem: &mut M, block: PhysAddr, pages: u32, next: PhysAddr) {
        mem.write_u32(block.add(NODE_PAGES), pages);
        mem.write_u32(block.add(NODE_NEXT), next.as_u32());
    }

    fn end_of<M: PhysMemory>(mem: &M, block: PhysAddr) -> PhysAddr {
        block.add(pages_to_bytes(Self::pages_of(mem, block)))
    }

    fn set_link<M: PhysMemory>(&mut self, mem: &mut M, prev: PhysAddr, target: PhysAddr) {
        if prev.is_null() {
            self.head = target;
        } else {
            mem.write_u32(prev.add(NODE_NEXT), target.as_u32());
        }
    }

    /// Insere um bloco de `pages` páginas no free list, fundindo com os
    /// vizinhos fisicamente adjacentes.
    pub fn insert_block<M: PhysMemory>(&mut self, mem: &mut M, block: PhysAddr, pages: u32) {
        crate::kassert!(1, block.is_aligned(PAGE_SIZE), "(Heap) bloco desalinhado");
        crate::kassert!(1, pages > 0, "(Heap) bloco de zero páginas");

        // Achar (prev, curr) com prev < block < curr
        let mut prev = PhysAddr::NULL;
        let mut curr = self.head;
        while !curr.is_null() && curr < block {
            prev = curr;
            curr = Self::next_of(mem, curr);
        }

        let end = block.add(pages_to_bytes(pages));

        // Sobreposição = double free ou free list corrompido
        if !prev.is_null() && Self::end_of(mem, prev) > block {
            crate::kpanic!("(Heap) free de página já livre: ", block.as_u32());
        }
        if !curr.is_null() && (curr == block || end > curr) {
            crate::kpanic!("(Heap) free de página já livre: ", block.as_u32());
        }

        self.free_pages += pages;

        let merge_prev = !prev.is_null() && Self::end_of(mem, prev) == block;
        let merge_next = !curr.is_null() && end == curr;

        match (merge_prev, merge_next) {
            (true, true) => {
                // prev absorve block e curr
                let total = Self::pages_of(mem, prev) + pages + Self::pages_of(mem, curr);
                let after = Self::next_of(mem, curr);
                Self::write_node(mem, prev, total, after);
            }
            (true, false) => {
                let total = Self::pages_of(mem, prev) + pages;
                mem.write_u32(prev.add(NODE_PAGES), total);
            }
            (false, true) => {
                // block absorve curr e toma o lugar dele na lista
                let total = pages + Self::pages_of(mem, curr);
                let after = Self::next_of(mem, curr);
                Self::write_node(mem, block, total, after);
                self.set_link(mem, prev, block);
            }
            (false, false) => {
                Self::write_node(mem, block, pages, curr);
                self.set_link(mem, prev, block);
            }
        }

        crate::kassert!(4, self.is_consistent(mem), "(Heap) free list inconsistente");
    }

    /// Aloca `count` páginas contíguas (first-fit).
    ///
    /// Match exato é desligado da lista; bloco maior é dividido, as `count`
    /// páginas baixas são devolvidas e o resto ocupa a mesma posição.
    pub fn page_alloc<M: PhysMemory>(&mut self, mem: &mut M, count: u32) -> Option<PhysAddr> {
        if count < 1 {
            return None;
        }

        let mut prev = PhysAddr::NULL;
        let mut block = self.head;
        while !block.is_null() && Self::pages_of(mem, block) < count {
            prev = block;
            block = Self::next_of(mem, block);
        }

        if block.is_null() {
            crate::kwarn!("(Heap) page_alloc sem bloco para n=", count);
            return None;
        }

        let pages = Self::pages_of(mem, block);
        let next = Self::next_of(mem, block);
        if pages == count {
            self.set_link(mem, prev, next);
        } else {
            let rest = block.add(pages_to_bytes(count));
            Self::write_node(mem, rest, pages - count, next);
            self.set_link(mem, prev, rest);
        }

        self.free_pages -= count;
        crate::ktrace!("(Heap) page_alloc base=", block.as_u32(), " n=", count);
        Some(block)
    }

    /// Devolve UMA página ao free list.
    pub fn page_free<M: PhysMemory>(&mut self, mem: &mut M, page: PhysAddr) {
        if page.is_null() {
            return;
        }
        crate::ktrace!("(Heap) page_free base=", page.as_u32());
        self.insert_block(mem, page, 1);
    }

    /// Blocos do free list, em ordem: (base, páginas)
    pub fn blocks<M: PhysMemory>(&self, mem: &M) -> Vec<(PhysAddr, u32)> {
        let mut out = Vec::new();
        let mut curr = self.head;
        while !curr.is_null() {
            out.push((curr, Self::pages_of(mem, curr)));
            curr = Self::next_of(mem, curr);
        }
        out
    }

    /// Ordenado, sem sobreposição, sem vizinhos adjacentes soltos.
    pub fn is_consistent<M: PhysMemory>(&self, mem: &M) -> bool {
        let mut counted = 0u32;
        let mut prev: Option<(PhysAddr, u32)> = None;
        let mut curr = self.head;
        while !curr.is_null() {
            let pages = Self::pages_of(mem, curr);
            if pages == 0 {
                return false;
            }
            if let Some((pbase, ppages)) = prev {
                if pbase.add(pages_to_bytes(ppages)) >= curr {
                    return false;
                }
            }
            counted += pages;
            prev = Some((curr, pages));
            curr = Self::next_of(mem, curr);
        }
        counted == self.free_pages
    }

    /// Despeja o free list no log
    pub fn dump<M: PhysMemory>(&self, mem: &M) {
        crate::kinfo!("(Heap) free list, páginas livres=", self.free_pages);
        for (base, pages) in self.blocks(mem) {
            crate::kinfo!(
                "(Heap)   bloco @ ",
                base.as_u32(),
                " pages=",
                pages,
                " fim=",
                base.as_u32() + pages_to_bytes(pages)
            );
        }
    }
}
