//! # Mapa de Memória do BIOS (E820)
//!
//! O bootstrap deixa em `MMAP_ADDRESS` um contador `i32` seguido de
//! registros empacotados de 24 bytes:
//!
//! ```text
//!   +0  base   u64
//!   +8  length u64
//!   +16 type   u32   (1 = usável)
//!   +20 acpi   u32   (bit 0 = "não ignorar", bit 1 = não-volátil)
//! ```
//!
//! Só sobrevivem regiões usáveis, voláteis, abaixo de 4 GiB e acima do
//! corte de memória baixa. A leitura não aloca: o heap ainda não existe
//! quando o mapa é consumido.

use crate::mm::addr::PhysAddr;
use crate::mm::config::{LOW_MEMORY_CUTOFF, MMAP_RECORD_SIZE};
use crate::mm::phys::PhysMemory;

/// Máximo de regiões usáveis guardadas
pub const MAX_REGIONS: usize = 32;

const REGION_USABLE: u32 = 1;
const ACPI_DONT_IGNORE: u32 = 1 << 0;
const ACPI_NON_VOLATILE: u32 = 1 << 1;
const ADDR_32_LIMIT: u64 = 1 << 32;

/// Região física usável (já recortada para 32 bits)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Region {
    pub base: u32,
    pub length: u32,
}

/// Um registro bruto do BIOS
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawRecord {
    pub base: u64,
    pub length: u64,
    pub kind: u32,
    pub acpi: u32,
}

impl RawRecord {
    /// Aplica os filtros e recortes; `None` se a região deve ser ignorada.
    pub fn to_region(&self) -> Option<Region> {
        if self.acpi & ACPI_DONT_IGNORE == 0 {
            return None;
        }
        if self.acpi & ACPI_NON_VOLATILE != 0 {
            return None;
        }
        if self.kind != REGION_USABLE {
            return None;
        }
        if self.base >= ADDR_32_LIMIT {
            return None;
        }

        let mut base = self.base;
        let mut end = self.base.saturating_add(self.length);

        if base < LOW_MEMORY_CUTOFF {
            if end < LOW_MEMORY_CUTOFF {
                return None;
            }
            base = LOW_MEMORY_CUTOFF;
        }
        if end > ADDR_32_LIMIT {
            end = ADDR_32_LIMIT;
        }
        if end <= base {
            return None;
        }

        Some(Region {
            base: base as u32,
            length: (end - base).min(u32::MAX as u64) as u32,
        })
    }
}

/// Lista de regiões usáveis, em ordem do BIOS.
#[derive(Clone)]
pub struct MemoryMap {
    regions: [Region; MAX_REGIONS],
    count: usize,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::empty()
    }
}

impl MemoryMap {
    pub const fn empty() -> Self {
        Self {
            regions: [Region { base: 0, length: 0 }; MAX_REGIONS],
            count: 0,
        }
    }

    /// Lê e filtra o mapa que o bootstrap deixou em `at`.
    pub fn read<M: PhysMemory>(mem: &M, at: PhysAddr) -> Self {
        let mut map = Self::empty();
        let entries = mem.read_u32(at) as i32;
        if entries < 1 {
            crate::kwarn!("(Boot) mapa de memória vazio");
            return map;
        }

        crate::kdebug!("(Boot) registros E820=", entries);
        let mut rec = at.add(4);
        for _ in 0..entries {
            let raw = RawRecord {
                base: read_u64(mem, rec),
                length: read_u64(mem, rec.add(8)),
                kind: mem.read_u32(rec.add(16)),
                acpi: mem.read_u32(rec.add(20)),
            };
            rec = rec.add(MMAP_RECORD_SIZE);

            match raw.to_region() {
                Some(region) => map.push(region),
                None => crate::ktrace!("(Boot) região ignorada base=", raw.base, " tipo=", raw.kind),
            }
        }
        map
    }

    /// Acrescenta uma região (excedentes são descartados com aviso).
    pub fn push(&mut self, region: Region) {
        if self.count == MAX_REGIONS {
            crate::kwarn!("(Boot) mapa cheio, região descartada base=", region.base);
            return;
        }
        self.regions[self.count] = region;
        self.count += 1;
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions[..self.count]
    }
}

fn read_u64<M: PhysMemory>(mem: &M, addr: PhysAddr) -> u64 {
    let lo = mem.read_u32(addr) as u64;
    let hi = mem.read_u32(addr.add(4)) as u64;
    (hi << 32) | lo
}

/// Escreve um mapa no formato do BIOS (usado pelos testes e pelo
/// ambiente simulado).
pub fn write_raw<M: PhysMemory>(mem: &mut M, at: PhysAddr, records: &[RawRecord]) {
    mem.write_u32(at, records.len() as u32);
    let mut rec = at.add(4);
    for r in records {
        mem.write_u32(rec, r.base as u32);
        mem.write_u32(rec.add(4), (r.base >> 32) as u32);
        mem.write_u32(rec.add(8), r.length as u32);
        mem.write_u32(rec.add(12), (r.length >> 32) as u32);
        mem.write_u32(rec.add(16), r.kind);
        mem.write_u32(rec.add(20), r.acpi);
        rec = rec.add(MMAP_RECORD_SIZE);
    }
}
