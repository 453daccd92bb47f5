//! # Acesso à Memória Física
//!
//! Toda estrutura que vive "dentro" da memória livre (nós do free list de
//! páginas, links de slices, qnodes, tabelas de página, stacks) é lida e
//! escrita através de [`PhysMemory`]. Os ponteiros brutos ficam confinados
//! às implementações deste trait:
//!
//! - [`IdentityMemory`]: bare-metal, física == virtual no espaço do kernel.
//! - [`RamArena`]: RAM simulada em um `Vec<u8>`, usada nos testes de host.

use super::addr::PhysAddr;
use alloc::vec;
use alloc::vec::Vec;

/// Memória física endereçável por bytes.
///
/// Palavras são little-endian (x86). Acessos fora da memória são bugs de
/// kernel e provocam panic.
pub trait PhysMemory {
    fn read_bytes(&self, addr: PhysAddr, buf: &mut [u8]);
    fn write_bytes(&mut self, addr: PhysAddr, data: &[u8]);

    fn read_u32(&self, addr: PhysAddr) -> u32 {
        let mut word = [0u8; 4];
        self.read_bytes(addr, &mut word);
        u32::from_le_bytes(word)
    }

    fn write_u32(&mut self, addr: PhysAddr, value: u32) {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    fn read_u8(&self, addr: PhysAddr) -> u8 {
        let mut b = [0u8; 1];
        self.read_bytes(addr, &mut b);
        b[0]
    }

    /// Preenche `len` bytes com `value`.
    fn fill(&mut self, addr: PhysAddr, value: u8, len: u32) {
        let chunk = [value; 64];
        let mut done = 0u32;
        while done < len {
            let n = core::cmp::min(64, len - done);
            self.write_bytes(addr.add(done), &chunk[..n as usize]);
            done += n;
        }
    }

    /// Copia `len` bytes de `src` para `dst` (regiões não sobrepostas).
    fn copy(&mut self, src: PhysAddr, dst: PhysAddr, len: u32) {
        let mut chunk = [0u8; 256];
        let mut done = 0u32;
        while done < len {
            let n = core::cmp::min(256, len - done) as usize;
            self.read_bytes(src.add(done), &mut chunk[..n]);
            self.write_bytes(dst.add(done), &chunk[..n]);
            done += n as u32;
        }
    }
}

// =============================================================================
// RAM SIMULADA
// =============================================================================

/// RAM física simulada começando no endereço 0.
pub struct RamArena {
    bytes: Vec<u8>,
}

impl RamArena {
    /// Cria uma RAM zerada de `size` bytes (endereços 0..size).
    pub fn new(size: u32) -> Self {
        Self {
            bytes: vec![0u8; size as usize],
        }
    }

    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn range(&self, addr: PhysAddr, len: usize) -> core::ops::Range<usize> {
        let start = addr.as_usize();
        let end = start + len;
        if end > self.bytes.len() {
            panic!(
                "RamArena: acesso fora da RAM em {:#x} (+{} bytes)",
                start, len
            );
        }
        start..end
    }
}

impl PhysMemory for RamArena {
    fn read_bytes(&self, addr: PhysAddr, buf: &mut [u8]) {
        let r = self.range(addr, buf.len());
        buf.copy_from_slice(&self.bytes[r]);
    }

    fn write_bytes(&mut self, addr: PhysAddr, data: &[u8]) {
        let r = self.range(addr, data.len());
        self.bytes[r].copy_from_slice(data);
    }

    fn fill(&mut self, addr: PhysAddr, value: u8, len: u32) {
        let r = self.range(addr, len as usize);
        self.bytes[r].fill(value);
    }

    fn copy(&mut self, src: PhysAddr, dst: PhysAddr, len: u32) {
        let s = self.range(src, len as usize);
        self.range(dst, len as usize);
        self.bytes.copy_within(s, dst.as_usize());
    }
}

// =============================================================================
// MEMÓRIA REAL (BARE-METAL)
// =============================================================================

/// Memória física acessada em identidade.
///
/// Válida enquanto o diretório ativo mapeia em identidade toda região que o
/// núcleo toca (garantido pelo bootstrap: as `IDENTITY_MAP_PAGES` baixas e
/// todo bloco entregue ao alocador de páginas).
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub struct IdentityMemory {
    _private: (),
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
impl IdentityMemory {
    /// # Safety
    /// Só pode existir uma instância, e ela precisa de paginação em
    /// identidade (ou paginação desligada).
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    #[inline]
    fn word_ptr(addr: PhysAddr) -> volatile::VolatilePtr<'static, u32> {
        let raw = addr.as_usize() as *mut u32;
        // SAFETY: endereço físico mapeado em identidade e alinhado a 4 bytes
        // (todas as estruturas em memória usam palavras alinhadas).
        unsafe { volatile::VolatilePtr::new(core::ptr::NonNull::new_unchecked(raw)) }
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
impl PhysMemory for IdentityMemory {
    fn read_bytes(&self, addr: PhysAddr, buf: &mut [u8]) {
        // SAFETY: ver `IdentityMemory`.
        unsafe {
            core::ptr::copy_nonoverlapping(addr.as_usize() as *const u8, buf.as_mut_ptr(), buf.len());
        }
    }

    fn write_bytes(&mut self, addr: PhysAddr, data: &[u8]) {
        // SAFETY: ver `IdentityMemory`.
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), addr.as_usize() as *mut u8, data.len());
        }
    }

    fn read_u32(&self, addr: PhysAddr) -> u32 {
        Self::word_ptr(addr).read()
    }

    fn write_u32(&mut self, addr: PhysAddr, value: u32) {
        Self::word_ptr(addr).write(value);
    }

    fn fill(&mut self, addr: PhysAddr, value: u8, len: u32) {
        // SAFETY: ver `IdentityMemory`.
        unsafe { core::ptr::write_bytes(addr.as_usize() as *mut u8, value, len as usize) }
    }

    fn copy(&mut self, src: PhysAddr, dst: PhysAddr, len: u32) {
        // SAFETY: ver `IdentityMemory`.
        unsafe {
            core::ptr::copy(src.as_usize() as *const u8, dst.as_usize() as *mut u8, len as usize)
        }
    }
}
