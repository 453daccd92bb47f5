use crate::mm::config::{align_down, align_up, is_aligned};
use core::fmt;

/// Endereço físico (wrapper type-safe)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PhysAddr(u32);

impl PhysAddr {
    /// Endereço nulo (usado como fim de lista nos free lists em memória)
    pub const NULL: Self = Self(0);

    /// Cria novo endereço físico
    #[inline]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// Retorna o valor interno como u32
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Retorna o valor interno como usize
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Alinha para baixo (múltiplo de align)
    #[inline]
    pub const fn align_down(self, align: u32) -> Self {
        Self(align_down(self.0, align))
    }

    /// Alinha para cima (múltiplo de align)
    #[inline]
    pub const fn align_up(self, align: u32) -> Self {
        Self(align_up(self.0, align))
    }

    /// Verifica alinhamento
    #[inline]
    pub const fn is_aligned(self, align: u32) -> bool {
        is_aligned(self.0, align)
    }

    /// Verifica se é nulo
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Adiciona offset
    #[inline]
    pub const fn add(self, offset: u32) -> Self {
        Self(self.0 + offset)
    }

    /// Distância em bytes até `other` (other >= self)
    #[inline]
    pub const fn offset_to(self, other: Self) -> u32 {
        other.0 - self.0
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#010x})", self.0)
    }
}

impl fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
