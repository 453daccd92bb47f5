//! Alocador de frames por bitmap.
//!
//! Cobre apenas a região de bootstrap (a primeira região do mapa de memória
//! grande o bastante para subir a paginação). Um bit por frame; 1 = em uso.

use super::frame::PhysFrame;
use crate::klib::bitmap::Bitmap;
use crate::mm::addr::PhysAddr;
use crate::mm::config::{MAX_BITMAP_FRAMES, PAGE_SIZE};

const BITMAP_WORDS: usize = MAX_BITMAP_FRAMES / 32;

/// BitmapFrameAllocator - Gerencia a região de bootstrap usando um bitmap.
pub struct BitmapFrameAllocator {
    base: PhysAddr,
    bitmap: Bitmap<BITMAP_WORDS>,
    used: usize,
    failed_allocs: usize,
}

impl BitmapFrameAllocator {
    pub const fn empty() -> Self {
        Self {
            base: PhysAddr::NULL,
            bitmap: Bitmap::empty(),
            used: 0,
            failed_allocs: 0,
        }
    }

    /// Assume a posse de `frames` frames a partir de `base`.
    ///
    /// Regiões maiores que o bitmap são truncadas.
    pub fn init(&mut self, base: PhysAddr, frames: u32) {
        let frames = core::cmp::min(frames as usize, MAX_BITMAP_FRAMES);
        self.base = base;
        self.bitmap.reset(frames);
        self.used = 0;
        crate::kinfo!("(PMM) Bitmap base=", base.as_u32(), " frames=", frames);
    }

    pub fn is_initialized(&self) -> bool {
        !self.bitmap.is_empty()
    }

    /// Total de frames cobertos
    pub fn total_frames(&self) -> usize {
        self.bitmap.len()
    }

    /// Frames ainda livres
    pub fn free_frames(&self) -> usize {
        self.bitmap.len() - self.used
    }

    /// Alocações que encontraram o bitmap cheio
    pub fn failed_allocs(&self) -> usize {
        self.failed_allocs
    }

    /// O frame pertence à região do bitmap?
    pub fn contains(&self, addr: PhysAddr) -> bool {
        if !self.is_initialized() || addr < self.base {
            return false;
        }
        ((addr.as_u32() - self.base.as_u32()) / PAGE_SIZE) < self.bitmap.len() as u32
    }

    /// Aloca o primeiro frame livre do bitmap
    pub fn allocate_frame(&mut self) -> Option<PhysFrame> {
        match self.bitmap.find_first_zero() {
            Some(index) => {
                self.bitmap.set(index);
                self.used += 1;
                let addr = self.base.add(index as u32 * PAGE_SIZE);
                PhysFrame::from_start_address(addr)
            }
            None => {
                self.failed_allocs += 1;
                None
            }
        }
    }

    /// Devolve um frame ao bitmap.
    ///
    /// Retorna `false` se o frame não pertence à região (o chamador decide
    /// para onde ele vai).
    pub fn deallocate_frame(&mut self, frame: PhysFrame) -> bool {
        if !self.contains(frame.start_address()) {
            return false;
        }
        let index = ((frame.addr() - self.base.as_u32()) / PAGE_SIZE) as usize;
        if self.bitmap.test(index) {
            self.bitmap.clear(index);
            self.used -= 1;
        } else {
            crate::kwarn!("(PMM) free de frame que já estava livre: ", frame.addr());
        }
        true
    }
}
