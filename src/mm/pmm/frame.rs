use crate::mm::addr::PhysAddr;
use crate::mm::config::PAGE_SIZE;
use core::fmt;

/// Um frame de memória física (tamanho fixo PAGE_SIZE = 4KiB)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysFrame {
    start_address: PhysAddr,
}

impl PhysFrame {
    /// Retorna o frame que contém o endereço físico dado
    #[inline]
    pub const fn containing_address(addr: PhysAddr) -> Self {
        Self {
            start_address: addr.align_down(PAGE_SIZE),
        }
    }

    /// Cria um frame a partir de um endereço alinhado
    #[inline]
    pub fn from_start_address(addr: PhysAddr) -> Option<Self> {
        if addr.is_aligned(PAGE_SIZE) {
            Some(Self {
                start_address: addr,
            })
        } else {
            None
        }
    }

    /// Retorna o endereço inicial do frame
    #[inline]
    pub const fn start_address(&self) -> PhysAddr {
        self.start_address
    }

    /// Adiciona offset de N frames
    #[inline]
    pub const fn add(&self, count: u32) -> Self {
        Self {
            start_address: self.start_address.add(count * PAGE_SIZE),
        }
    }

    /// Endereço físico como u32
    #[inline]
    pub const fn addr(&self) -> u32 {
        self.start_address.as_u32()
    }
}

impl fmt::Debug for PhysFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysFrame({:?})", self.start_address)
    }
}
