//! Entradas de diretório/tabela (formato x86 32-bit, páginas de 4 KiB).

use crate::mm::addr::PhysAddr;
use bitflags::bitflags;

/// Bits de endereço do frame numa entrada
pub const FRAME_MASK: u32 = 0xFFFF_F000;

bitflags! {
    /// Flags de PDE/PTE
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EntryFlags: u32 {
        const PRESENT       = 1 << 0;
        const WRITABLE      = 1 << 1;
        const USER          = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const NO_CACHE      = 1 << 4;
        const ACCESSED      = 1 << 5;
        const DIRTY         = 1 << 6;
        /// PDE de 4 MiB (não usado pelo núcleo)
        const HUGE          = 1 << 7;
        const GLOBAL        = 1 << 8;
    }
}

impl EntryFlags {
    /// Flags padrão de todo mapeamento do núcleo
    pub const KERNEL_RW: Self = Self::PRESENT.union(Self::WRITABLE);
}

/// Uma entrada de diretório ou de tabela.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Entry(u32);

impl Entry {
    pub const EMPTY: Self = Self(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn new(frame: PhysAddr, flags: EntryFlags) -> Self {
        Self((frame.as_u32() & FRAME_MASK) | flags.bits())
    }

    pub fn is_unused(self) -> bool {
        self.0 == 0
    }

    pub fn is_present(self) -> bool {
        self.flags().contains(EntryFlags::PRESENT)
    }

    pub fn flags(self) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.0)
    }

    pub fn frame(self) -> PhysAddr {
        PhysAddr::new(self.0 & FRAME_MASK)
    }
}

impl core::fmt::Debug for Entry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Entry({:#010x}, {:?})", self.0 & FRAME_MASK, self.flags())
    }
}
