//! # Memory Management Subsystem (MM)
//!
//! Dono de toda a memória física e das estruturas de paginação.
//!
//! ## 🏗️ Arquitetura dos Módulos
//!
//! | Módulo | Responsabilidade |
//! |--------|------------------|
//! | `pmm`  | Frames de 4 KiB via bitmap sobre a região de bootstrap. |
//! | `heap` | Páginas (first-fit, coalescência) e slices de 1 KiB. |
//! | `vmm`  | Diretório + tabelas (dois níveis), cópia de espaços, acesso a memória de usuário. |
//! | `phys` | Acesso à memória física (`PhysMemory`): real ou simulada. |
//! | `addr` | Wrappers `PhysAddr`/`VirtAddr`. |
//!
//! ## Fluxo de bootstrap
//!
//! ```text
//! mapa E820 ──▶ 1ª região ≥ 0x40 páginas ──▶ bitmap de frames
//!                                         └─▶ espaço base do kernel + identity map
//!              demais regiões ─────────────▶ free list de páginas (identity-mapped)
//! ```
//!
//! Depois do bootstrap, `alloc_frame` usa o bitmap e, quando ele esgota,
//! pega uma página do heap. O `MemoryManager` é o único dono do
//! `PhysMemory`; todo o resto do núcleo acessa memória física através dele.

pub mod addr;
pub mod config;
pub mod error;
pub mod heap;
pub mod phys;
pub mod pmm;
pub mod vmm;

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod allocator;

#[cfg(any(test, feature = "self_test"))]
pub mod test;

pub use addr::{PhysAddr, VirtAddr};
pub use error::{MmError, MmResult};
pub use phys::PhysMemory;
pub use vmm::{AddressSpace, EntryFlags};

use crate::core::boot::memory_map::{MemoryMap, Region};
use alloc::vec::Vec;
use config::{align_down, bytes_to_pages, BOOTSTRAP_MIN_PAGES, MAX_BITMAP_FRAMES, PAGE_SIZE};
use heap::{PageHeap, SliceAllocator};
use pmm::{BitmapFrameAllocator, PhysFrame};

/// Estado completo do gerenciador de memória.
pub struct MemoryManager<M: PhysMemory> {
    mem: M,
    frames: BitmapFrameAllocator,
    pages: PageHeap,
    slices: SliceAllocator,
    kernel_space: Option<AddressSpace>,
    active: Option<AddressSpace>,
    /// Espaços liberados enquanto ainda ativos (soltos no próximo `activate`)
    retired: Vec<AddressSpace>,
    heap_ready: bool,
}

impl<M: PhysMemory> MemoryManager<M> {
    pub fn new(mem: M) -> Self {
        Self {
            mem,
            frames: BitmapFrameAllocator::empty(),
            pages: PageHeap::new(),
            slices: SliceAllocator::new(),
            kernel_space: None,
            active: None,
            retired: Vec::new(),
            heap_ready: false,
        }
    }

    /// Memória física (leitura)
    pub fn mem(&self) -> &M {
        &self.mem
    }

    /// Memória física (escrita)
    pub fn mem_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    pub fn frames(&self) -> &BitmapFrameAllocator {
        &self.frames
    }

    pub fn page_heap(&self) -> &PageHeap {
        &self.pages
    }

    pub fn slice_allocator(&self) -> &SliceAllocator {
        &self.slices
    }

    pub fn is_heap_ready(&self) -> bool {
        self.heap_ready
    }

    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    /// Consome o mapa de memória e deixa frames, páginas e paginação prontos.
    ///
    /// A primeira região grande o bastante sobe o bitmap e o espaço base do
    /// kernel; as outras (antes ou depois dela no mapa) vão para o heap.
    pub fn init(&mut self, map: &MemoryMap) {
        crate::kinfo!("(MM) init, regiões usáveis=", map.regions().len());

        let boot = map
            .regions()
            .iter()
            .position(|r| matches!(page_span(*r), Some((_, n)) if n >= BOOTSTRAP_MIN_PAGES));
        let boot = match boot {
            Some(i) => i,
            None => crate::kpanic!("(MM) memória insuficiente para subir a paginação"),
        };

        self.add_block(map.regions()[boot]);
        for (i, region) in map.regions().iter().enumerate() {
            if i != boot {
                self.add_block(*region);
            }
        }

        self.heap_ready = true;
        crate::kinfo!(
            "(MM) pronto: frames livres=",
            self.frames.free_frames(),
            " páginas livres=",
            self.pages.free_pages()
        );
    }

    /// Entrega uma região ao núcleo.
    ///
    /// Antes da paginação existir, a região vira o backing do bitmap de
    /// frames (caminho de bootstrap). Depois, é arredondada para páginas,
    /// mapeada em identidade e inserida no free list.
    pub fn add_block(&mut self, region: Region) {
        if self.kernel_space.is_none() {
            self.bootstrap(region);
            return;
        }

        let (base, pages) = match page_span(region) {
            Some(span) => span,
            None => {
                crate::ktrace!("(MM) bloco menor que uma página ignorado base=", region.base);
                return;
            }
        };

        self.identity_map_range(base, pages);
        self.pages.insert_block(&mut self.mem, base, pages);
        crate::kdebug!("(MM) bloco livre base=", base.as_u32(), " pages=", pages);
    }

    fn bootstrap(&mut self, region: Region) {
        let (base, pages) = match page_span(region) {
            Some((base, pages)) if pages >= BOOTSTRAP_MIN_PAGES => (base, pages),
            _ => crate::kpanic!("(MM) região de bootstrap pequena demais: ", region.length),
        };

        let frames = core::cmp::min(pages, MAX_BITMAP_FRAMES as u32);
        self.frames.init(base, frames);

        let space = match self.base_kernel_address_space() {
            Ok(space) => space,
            Err(e) => crate::kpanic!(e.as_str()),
        };
        self.kernel_space = Some(space);
        self.identity_map_range(base, frames);
        self.activate(space);

        // O que passou da capacidade do bitmap vira bloco do heap
        if pages > frames {
            let rest = base.add(frames * PAGE_SIZE);
            self.add_block(Region {
                base: rest.as_u32(),
                length: (pages - frames) * PAGE_SIZE,
            });
        }
        crate::kinfo!("(MM) bootstrap base=", base.as_u32(), " frames=", frames);
    }

    fn identity_map_range(&mut self, base: PhysAddr, pages: u32) {
        let space = match self.kernel_space {
            Some(space) => space,
            None => return,
        };
        for i in 0..pages {
            let phys = base.add(i * PAGE_SIZE);
            let virt = VirtAddr::new(phys.as_u32());
            if self.is_mapped(space, virt) {
                continue;
            }
            if let Err(e) = self.map(space, virt, phys) {
                crate::kpanic!(e.as_str(), phys.as_u32());
            }
        }
    }

    // =========================================================================
    // FRAMES
    // =========================================================================

    /// Aloca um frame físico (zerado não garantido).
    pub fn alloc_frame(&mut self) -> Option<PhysFrame> {
        if let Some(frame) = self.frames.allocate_frame() {
            return Some(frame);
        }
        if !self.heap_ready {
            crate::kwarn!("(PMM) bitmap esgotado antes do heap");
            return None;
        }

        let page = self.pages.page_alloc(&mut self.mem, 1)?;
        if let Some(space) = self.kernel_space {
            let virt = VirtAddr::new(page.as_u32());
            if !self.is_mapped(space, virt) {
                if let Err(e) = self.map(space, virt, page) {
                    crate::kwarn!("(PMM) falha ao mapear frame do heap: ", page.as_u32());
                    crate::kdebug!(e.as_str());
                    self.pages.page_free(&mut self.mem, page);
                    return None;
                }
            }
        }
        PhysFrame::from_start_address(page)
    }

    /// Devolve um frame a quem o forneceu (bitmap ou heap).
    pub fn free_frame(&mut self, frame: PhysFrame) {
        if !self.frames.deallocate_frame(frame) {
            self.pages.page_free(&mut self.mem, frame.start_address());
        }
    }

    // =========================================================================
    // PÁGINAS E SLICES
    // =========================================================================

    /// `count` páginas contíguas do heap
    pub fn page_alloc(&mut self, count: u32) -> Option<PhysAddr> {
        self.pages.page_alloc(&mut self.mem, count)
    }

    /// Devolve UMA página
    pub fn page_free(&mut self, page: PhysAddr) {
        self.pages.page_free(&mut self.mem, page)
    }

    /// Um slice zerado; exaustão é erro recuperável.
    pub fn try_slice_alloc(&mut self) -> MmResult<PhysAddr> {
        if self.slices.is_empty() {
            let page = self.page_alloc(1).ok_or(MmError::OutOfMemory)?;
            if let Some(space) = self.kernel_space {
                let virt = VirtAddr::new(page.as_u32());
                if !self.is_mapped(space, virt) {
                    if let Err(e) = self.map(space, virt, page) {
                        self.page_free(page);
                        return Err(e);
                    }
                }
            }
            self.slices.carve(&mut self.mem, page);
        }
        self.slices.pop(&mut self.mem).ok_or(MmError::OutOfMemory)
    }

    /// Um slice zerado; exaustão é fatal.
    pub fn slice_alloc(&mut self) -> PhysAddr {
        match self.try_slice_alloc() {
            Ok(slice) => slice,
            Err(e) => crate::kpanic!(e.as_str()),
        }
    }

    pub fn slice_free(&mut self, slice: PhysAddr) {
        self.slices.push(&mut self.mem, slice)
    }

    /// Despeja o free list de páginas
    pub fn dump(&self) {
        self.pages.dump(&self.mem);
    }
}

/// Páginas inteiras contidas na região: (base alinhada, quantidade)
fn page_span(region: Region) -> Option<(PhysAddr, u32)> {
    let base = PhysAddr::new(region.base).align_up(PAGE_SIZE);
    let end = align_down(region.base.saturating_add(region.length), PAGE_SIZE);
    if region.length < PAGE_SIZE || end <= base.as_u32() {
        return None;
    }
    Some((base, bytes_to_pages(end - base.as_u32())))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Ambiente de memória simulada compartilhado pelos testes.

    use super::*;
    use crate::core::boot::memory_map::{write_raw, RawRecord};
    use crate::mm::config::MMAP_ADDRESS;
    use crate::mm::phys::RamArena;

    /// 4 MiB de RAM simulada
    pub const RAM_SIZE: u32 = 0x0040_0000;
    /// Região de bootstrap (128 frames)
    pub const BOOT_BASE: u32 = 0x0010_0000;
    pub const BOOT_LEN: u32 = 0x0008_0000;
    /// Região do heap de páginas
    pub const HEAP_BASE: u32 = 0x0018_0000;
    pub const HEAP_LEN: u32 = RAM_SIZE - HEAP_BASE;
    /// Fim da região baixa (32 páginas acima do corte; pequena demais
    /// para o bootstrap)
    pub const LOW_END: u32 = 0x5F000;

    /// RAM simulada com o mapa E820 padrão dos testes
    pub fn ram_with_map() -> RamArena {
        let mut ram = RamArena::new(RAM_SIZE);
        let records = [
            RawRecord { base: 0, length: LOW_END as u64, kind: 1, acpi: 1 },
            RawRecord { base: 0xF0000, length: 0x10000, kind: 2, acpi: 1 },
            RawRecord { base: BOOT_BASE as u64, length: BOOT_LEN as u64, kind: 1, acpi: 1 },
            RawRecord { base: HEAP_BASE as u64, length: HEAP_LEN as u64, kind: 1, acpi: 1 },
        ];
        write_raw(&mut ram, PhysAddr::new(MMAP_ADDRESS), &records);
        ram
    }

    /// MemoryManager já inicializado sobre `ram_with_map`
    pub fn memory_manager() -> MemoryManager<RamArena> {
        let ram = ram_with_map();
        let map = MemoryMap::read(&ram, PhysAddr::new(MMAP_ADDRESS));
        let mut mm = MemoryManager::new(ram);
        mm.init(&map);
        mm
    }
}
