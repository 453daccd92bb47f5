use crate::mm::config::{align_down, is_aligned, ENTRIES_PER_TABLE, PAGE_SHIFT, PAGE_SIZE};
use core::fmt;

/// Endereço virtual (wrapper type-safe)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(u32);

impl VirtAddr {
    /// Cria novo endereço virtual
    #[inline]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn add(self, offset: u32) -> Self {
        Self(self.0 + offset)
    }

    /// Alinha para baixo (início da página)
    #[inline]
    pub const fn page_base(self) -> Self {
        Self(align_down(self.0, PAGE_SIZE))
    }

    #[inline]
    pub const fn is_page_aligned(self) -> bool {
        is_aligned(self.0, PAGE_SIZE)
    }

    /// Índice no diretório de páginas (bits 31..22)
    #[inline]
    pub const fn dir_index(self) -> u32 {
        (self.0 >> 22) & (ENTRIES_PER_TABLE - 1)
    }

    /// Índice na tabela de páginas (bits 21..12)
    #[inline]
    pub const fn table_index(self) -> u32 {
        (self.0 >> PAGE_SHIFT) & (ENTRIES_PER_TABLE - 1)
    }

    /// Offset dentro da página (bits 11..0)
    #[inline]
    pub const fn page_offset(self) -> u32 {
        self.0 & (PAGE_SIZE - 1)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010x})", self.0)
    }
}
