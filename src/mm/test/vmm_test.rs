//! Testes do VMM, sempre num espaço descartável (nunca o ativo).

use super::free_total;
use crate::klib::test_framework::{TestCase, TestResult};
use crate::mm::addr::VirtAddr;
use crate::mm::config::{KERNEL_VIRT_BASE, PAGE_SIZE, USER_SPACE_BASE};
use crate::mm::phys::PhysMemory;
use crate::mm::MemoryManager;

/// Endereço de usuário que nenhum espaço de teste usa
const SCRATCH_VIRT: u32 = 0x4000_0000;

pub fn cases<M: PhysMemory>() -> [TestCase<MemoryManager<M>>; 3] {
    [
        TestCase::new("vmm_map_translate_unmap", test_map_translate_unmap::<M>),
        TestCase::new("vmm_copy_shares_frames", test_copy_shares_frames::<M>),
        TestCase::new("vmm_kernel_mirror", test_kernel_mirror::<M>),
    ]
}

fn test_map_translate_unmap<M: PhysMemory>(mm: &mut MemoryManager<M>) -> TestResult {
    let before = free_total(mm);
    let space = match mm.create_address_space() {
        Ok(space) => space,
        Err(_) => return TestResult::Skip,
    };
    let virt = VirtAddr::new(SCRATCH_VIRT + 0x123);

    let mut ok = mm.alloc_page_at(space, virt);
    ok &= !mm.alloc_page_at(space, virt);
    ok &= mm.is_mapped(space, virt);
    ok &= mm.copy_to_user(space, virt, &[0xAB, 0xCD]).is_ok();
    if let Some(phys) = mm.translate(space, virt) {
        ok &= phys.as_u32() & (PAGE_SIZE - 1) == 0x123;
        ok &= mm.mem().read_u8(phys) == 0xAB;
    } else {
        ok = false;
    }
    mm.free_frame_at(space, virt);
    ok &= !mm.is_mapped(space, virt);
    mm.delete_address_space(space);

    ok &= free_total(mm) == before;
    if ok {
        TestResult::Pass
    } else {
        crate::kerror!("(VMM) map/unmap falhou em ", SCRATCH_VIRT);
        TestResult::Fail
    }
}

/// A cópia tem tabelas próprias mas aponta para os mesmos frames.
fn test_copy_shares_frames<M: PhysMemory>(mm: &mut MemoryManager<M>) -> TestResult {
    let before = free_total(mm);
    let src = match mm.create_address_space() {
        Ok(space) => space,
        Err(_) => return TestResult::Skip,
    };
    let virt = VirtAddr::new(SCRATCH_VIRT);
    if !mm.alloc_page_at(src, virt) {
        mm.delete_address_space(src);
        return TestResult::Skip;
    }

    let mut ok = false;
    if let Ok(copy) = mm.copy_address_space(src) {
        ok = copy.directory() != src.directory();
        ok &= mm.translate(copy, virt) == mm.translate(src, virt);
        mm.unmap(copy, virt);
        ok &= mm.is_mapped(src, virt) && !mm.is_mapped(copy, virt);
        mm.delete_address_space(copy);
    }
    mm.free_frame_at(src, virt);
    mm.delete_address_space(src);

    ok &= free_total(mm) == before;
    if ok {
        TestResult::Pass
    } else {
        TestResult::Fail
    }
}

/// Espaço do kernel: identidade abaixo de `USER_SPACE_BASE` e espelho em
/// `KERNEL_VIRT_BASE`.
fn test_kernel_mirror<M: PhysMemory>(mm: &mut MemoryManager<M>) -> TestResult {
    let space = match mm.kernel_space() {
        Some(space) => space,
        None => return TestResult::Skip,
    };
    let spot = USER_SPACE_BASE - PAGE_SIZE;
    let low = mm.translate(space, VirtAddr::new(spot));
    let high = mm.translate(space, VirtAddr::new(KERNEL_VIRT_BASE + PAGE_SIZE));
    match (low, high) {
        (Some(low), Some(high)) if low.as_u32() == spot && high.as_u32() == PAGE_SIZE => {
            TestResult::Pass
        }
        _ => TestResult::Fail,
    }
}
