//! # Testes do Subsistema de Memória
//!
//! Rodam no boot (feature `self_test`) sobre o `MemoryManager` real e
//! devolvem tudo que alocam, menos páginas cortadas em slices:
//! - `pmm_test.rs`  - frames do bitmap
//! - `heap_test.rs` - páginas e slices
//! - `vmm_test.rs`  - map/unmap num espaço descartável

pub mod vmm_test;

use crate::klib::test_framework::{run_test_suite, SuiteReport, TestCase};
use crate::mm::phys::PhysMemory;
use crate::mm::MemoryManager;
use alloc::vec::Vec;

/// Todos os casos de memória
pub fn cases<M: PhysMemory>() -> Vec<TestCase<MemoryManager<M>>> {
    let mut cases = Vec::new();
    cases.extend(pmm_test::cases::<M>());
    cases.extend(heap_test::cases::<M>());
    cases.extend(vmm_test::cases::<M>());
    cases
}

pub fn run<M: PhysMemory>(mm: &mut MemoryManager<M>) -> SuiteReport {
    run_test_suite("mm", mm, &cases::<M>())
}

/// Frames do bitmap mais páginas livres do heap
pub(crate) fn free_total<M: PhysMemory>(mm: &MemoryManager<M>) -> u32 {
    mm.frames().free_frames() as u32 + mm.page_heap().free_pages()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::testing::memory_manager;

    #[test]
    fn memory_suite_passes_and_returns_everything() {
        let mut mm = memory_manager();
        let before = free_total(&mm);
        let carved = mm.slice_allocator().pages_carved();
        let report = run(&mut mm);
        assert_eq!(report.failed, 0);
        assert!(report.passed > 0);
        // páginas cortadas em slices não voltam ao heap de páginas
        let kept = mm.slice_allocator().pages_carved() - carved;
        assert_eq!(free_total(&mm) + kept, before);
    }
}
