//! Carregador ELF32 (i386, executável estático).
//!
//! Tudo é validado antes de tocar no espaço de destino: cabeçalho, tabela
//! de program headers e a faixa de cada `PT_LOAD`. Segmentos precisam cair
//! em `[USER_SPACE_BASE, KERNEL_VIRT_BASE)`, o que também os mantém longe
//! da janela de stack.
//!
//! Páginas já mapeadas no destino (herdadas de um fork) são desligadas sem
//! liberar o frame, que continua pertencendo a quem o alocou.

use super::loader::{ExecError, ProgramLoader};
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::{KERNEL_VIRT_BASE, PAGE_SIZE, USER_SPACE_BASE};
use crate::mm::phys::PhysMemory;
use crate::mm::{AddressSpace, MemoryManager};
use alloc::vec::Vec;

pub const ELF_MAGIC: [u8; 4] = *b"\x7fELF";
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;
/// Intel 80386
pub const EM_386: u16 = 3;
/// Arquivo executável
pub const ET_EXEC: u16 = 2;
/// Segmento carregável
pub const PT_LOAD: u32 = 1;

pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;

pub const EHDR_SIZE: u32 = 52;
pub const PHDR_SIZE: u32 = 32;

fn read_u16<M: PhysMemory>(mem: &M, at: PhysAddr) -> u16 {
    let mut b = [0u8; 2];
    mem.read_bytes(at, &mut b);
    u16::from_le_bytes(b)
}

/// Campos do cabeçalho ELF32 usados pelo carregador
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32Ehdr {
    pub e_ident: [u8; 16],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_phentsize: u16,
    pub e_phnum: u16,
}

impl Elf32Ehdr {
    pub fn read<M: PhysMemory>(mem: &M, at: PhysAddr) -> Self {
        let mut e_ident = [0u8; 16];
        mem.read_bytes(at, &mut e_ident);
        Self {
            e_ident,
            e_type: read_u16(mem, at.add(16)),
            e_machine: read_u16(mem, at.add(18)),
            e_entry: mem.read_u32(at.add(24)),
            e_phoff: mem.read_u32(at.add(28)),
            e_phentsize: read_u16(mem, at.add(42)),
            e_phnum: read_u16(mem, at.add(44)),
        }
    }

    pub fn validate(&self) -> Result<(), ExecError> {
        if self.e_ident[..4] != ELF_MAGIC {
            return Err(ExecError::BadMagic);
        }
        if self.e_ident[4] != ELFCLASS32
            || self.e_ident[5] != ELFDATA2LSB
            || self.e_machine != EM_386
            || self.e_type != ET_EXEC
        {
            return Err(ExecError::Unsupported);
        }
        if self.e_phentsize as u32 != PHDR_SIZE || self.e_phnum == 0 {
            return Err(ExecError::Unsupported);
        }
        Ok(())
    }
}

/// Program header ELF32
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32Phdr {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: u32,
}

impl Elf32Phdr {
    pub fn read<M: PhysMemory>(mem: &M, at: PhysAddr) -> Self {
        Self {
            p_type: mem.read_u32(at),
            p_offset: mem.read_u32(at.add(4)),
            p_vaddr: mem.read_u32(at.add(8)),
            p_filesz: mem.read_u32(at.add(16)),
            p_memsz: mem.read_u32(at.add(20)),
            p_flags: mem.read_u32(at.add(24)),
        }
    }

    /// Fim (exclusivo) do segmento em memória
    fn end(&self) -> Option<u32> {
        self.p_vaddr.checked_add(self.p_memsz)
    }

    fn validate(&self) -> Result<(), ExecError> {
        if self.p_filesz > self.p_memsz || self.p_offset.checked_add(self.p_filesz).is_none() {
            return Err(ExecError::BadSegment);
        }
        let end = self.end().ok_or(ExecError::BadSegment)?;
        if self.p_vaddr < USER_SPACE_BASE || end > KERNEL_VIRT_BASE {
            return Err(ExecError::BadSegment);
        }
        Ok(())
    }

    fn contains(&self, addr: u32) -> bool {
        matches!(self.end(), Some(end) if addr >= self.p_vaddr && addr < end)
    }
}

/// Lê e valida todos os `PT_LOAD`
fn load_segments<M: PhysMemory>(mem: &M, image: PhysAddr) -> Result<(u32, Vec<Elf32Phdr>), ExecError> {
    let ehdr = Elf32Ehdr::read(mem, image);
    ehdr.validate()?;

    let mut segments = Vec::new();
    for i in 0..ehdr.e_phnum as u32 {
        let off = ehdr
            .e_phoff
            .checked_add(i * PHDR_SIZE)
            .ok_or(ExecError::Unsupported)?;
        let phdr = Elf32Phdr::read(mem, image.add(off));
        if phdr.p_type != PT_LOAD {
            continue;
        }
        phdr.validate()?;
        segments.push(phdr);
    }

    if segments.is_empty() {
        return Err(ExecError::Unsupported);
    }
    if !segments.iter().any(|s| s.contains(ehdr.e_entry)) {
        return Err(ExecError::BadEntry);
    }
    Ok((ehdr.e_entry, segments))
}

/// Carregador padrão do `execp`
#[derive(Debug, Default, Clone, Copy)]
pub struct Elf32Loader;

impl Elf32Loader {
    /// Páginas novas e zeradas para o segmento. `fresh` guarda as que
    /// esta carga já criou (segmentos vizinhos podem dividir uma página).
    fn back_segment<M: PhysMemory>(
        mm: &mut MemoryManager<M>,
        space: AddressSpace,
        seg: &Elf32Phdr,
        fresh: &mut Vec<u32>,
    ) -> Result<(), ExecError> {
        let first = VirtAddr::new(seg.p_vaddr).page_base().as_u32();
        let end = seg.end().ok_or(ExecError::BadSegment)?;
        let mut page = first;
        while page < end {
            if !fresh.contains(&page) {
                let va = VirtAddr::new(page);
                if mm.is_mapped(space, va) {
                    mm.unmap(space, va);
                }
                if !mm.alloc_page_at(space, va) {
                    return Err(ExecError::OutOfMemory);
                }
                fresh.push(page);
            }
            page = match page.checked_add(PAGE_SIZE) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(())
    }

    fn copy_segment<M: PhysMemory>(
        mm: &mut MemoryManager<M>,
        space: AddressSpace,
        image: PhysAddr,
        seg: &Elf32Phdr,
    ) -> Result<(), ExecError> {
        let mut chunk = [0u8; 256];
        let mut done = 0u32;
        while done < seg.p_filesz {
            let n = core::cmp::min(chunk.len() as u32, seg.p_filesz - done);
            mm.mem().read_bytes(image.add(seg.p_offset + done), &mut chunk[..n as usize]);
            mm.copy_to_user(space, VirtAddr::new(seg.p_vaddr + done), &chunk[..n as usize])?;
            done += n;
        }

        // bss
        let zeros = [0u8; 256];
        while done < seg.p_memsz {
            let n = core::cmp::min(zeros.len() as u32, seg.p_memsz - done);
            mm.copy_to_user(space, VirtAddr::new(seg.p_vaddr + done), &zeros[..n as usize])?;
            done += n;
        }
        Ok(())
    }
}

impl<M: PhysMemory> ProgramLoader<M> for Elf32Loader {
    fn load(
        &self,
        mm: &mut MemoryManager<M>,
        space: AddressSpace,
        image: PhysAddr,
    ) -> Result<u32, ExecError> {
        let (entry, segments) = load_segments(mm.mem(), image)?;

        let mut fresh = Vec::new();
        for seg in &segments {
            let loaded = Self::back_segment(mm, space, seg, &mut fresh)
                .and_then(|_| Self::copy_segment(mm, space, image, seg));
            if let Err(e) = loaded {
                crate::kwarn!("(ELF) carga abortada vaddr=", seg.p_vaddr);
                for page in &fresh {
                    mm.free_frame_at(space, VirtAddr::new(*page));
                }
                return Err(e);
            }
            crate::ktrace!(
                "(ELF) segmento vaddr=", seg.p_vaddr,
                " filesz=", seg.p_filesz,
                " memsz=", seg.p_memsz
            );
        }

        crate::kdebug!("(ELF) imagem carregada entry=", entry, " páginas=", fresh.len());
        Ok(entry)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{build_image, Segment};
    use super::*;
    use crate::mm::testing::memory_manager;

    const IMAGE_AT: u32 = 0x0002_0000;
    const TEXT: u32 = 0x0800_0000;

    fn place(mm: &mut MemoryManager<crate::mm::phys::RamArena>, image: &[u8]) -> PhysAddr {
        let at = PhysAddr::new(IMAGE_AT);
        mm.mem_mut().write_bytes(at, image);
        at
    }

    #[test]
    fn loads_text_and_zeroes_bss() {
        let mut mm = memory_manager();
        let space = mm.copy_address_space(mm.kernel_space().unwrap()).unwrap();
        let image = build_image(
            TEXT + 4,
            &[Segment { vaddr: TEXT, data: b"\x90\x90\xeb\xfe", memsz: PAGE_SIZE + 16 }],
        );
        let at = place(&mut mm, &image);

        let entry = Elf32Loader.load(&mut mm, space, at).unwrap();
        assert_eq!(entry, TEXT + 4);

        let mut text = [0u8; 4];
        mm.copy_from_user(space, VirtAddr::new(TEXT), &mut text).unwrap();
        assert_eq!(&text, b"\x90\x90\xeb\xfe");
        assert_eq!(mm.read_user_u32(space, VirtAddr::new(TEXT + PAGE_SIZE + 8)).unwrap(), 0);
        assert!(!mm.is_mapped(space, VirtAddr::new(TEXT + 2 * PAGE_SIZE)));
    }

    #[test]
    fn segments_sharing_a_page_keep_both_contents() {
        let mut mm = memory_manager();
        let space = mm.copy_address_space(mm.kernel_space().unwrap()).unwrap();
        let image = build_image(
            TEXT,
            &[
                Segment { vaddr: TEXT, data: b"code", memsz: 4 },
                Segment { vaddr: TEXT + 0x100, data: b"data", memsz: 8 },
            ],
        );
        let at = place(&mut mm, &image);
        Elf32Loader.load(&mut mm, space, at).unwrap();

        let mut buf = [0u8; 4];
        mm.copy_from_user(space, VirtAddr::new(TEXT), &mut buf).unwrap();
        assert_eq!(&buf, b"code");
        mm.copy_from_user(space, VirtAddr::new(TEXT + 0x100), &mut buf).unwrap();
        assert_eq!(&buf, b"data");
    }

    #[test]
    fn inherited_pages_are_replaced_without_touching_the_original_frame() {
        let mut mm = memory_manager();
        let parent = mm.copy_address_space(mm.kernel_space().unwrap()).unwrap();
        assert!(mm.alloc_page_at(parent, VirtAddr::new(TEXT)));
        mm.write_user_u32(parent, VirtAddr::new(TEXT), 0x1111_1111).unwrap();
        let child = mm.copy_address_space(parent).unwrap();

        let image = build_image(TEXT, &[Segment { vaddr: TEXT, data: &[0x22; 4], memsz: 4 }]);
        let at = place(&mut mm, &image);
        Elf32Loader.load(&mut mm, child, at).unwrap();

        assert_eq!(mm.read_user_u32(parent, VirtAddr::new(TEXT)).unwrap(), 0x1111_1111);
        assert_eq!(mm.read_user_u32(child, VirtAddr::new(TEXT)).unwrap(), 0x2222_2222);
    }

    #[test]
    fn malformed_images_are_rejected_before_mapping() {
        let mut mm = memory_manager();
        let space = mm.copy_address_space(mm.kernel_space().unwrap()).unwrap();

        let mut bad_magic = build_image(TEXT, &[Segment { vaddr: TEXT, data: b"x", memsz: 1 }]);
        bad_magic[1] = b'X';
        let at = place(&mut mm, &bad_magic);
        assert_eq!(Elf32Loader.load(&mut mm, space, at), Err(ExecError::BadMagic));

        let mut elf64 = build_image(TEXT, &[Segment { vaddr: TEXT, data: b"x", memsz: 1 }]);
        elf64[4] = 2;
        let at = place(&mut mm, &elf64);
        assert_eq!(Elf32Loader.load(&mut mm, space, at), Err(ExecError::Unsupported));

        let low = build_image(0x1000, &[Segment { vaddr: 0x1000, data: b"x", memsz: 1 }]);
        let at = place(&mut mm, &low);
        assert_eq!(Elf32Loader.load(&mut mm, space, at), Err(ExecError::BadSegment));

        let kernel = build_image(
            KERNEL_VIRT_BASE,
            &[Segment { vaddr: KERNEL_VIRT_BASE, data: b"x", memsz: 1 }],
        );
        let at = place(&mut mm, &kernel);
        assert_eq!(Elf32Loader.load(&mut mm, space, at), Err(ExecError::BadSegment));

        let shrunk = build_image(TEXT, &[Segment { vaddr: TEXT, data: b"abcd", memsz: 2 }]);
        let at = place(&mut mm, &shrunk);
        assert_eq!(Elf32Loader.load(&mut mm, space, at), Err(ExecError::BadSegment));

        let stray_entry = build_image(TEXT + PAGE_SIZE, &[Segment { vaddr: TEXT, data: b"x", memsz: 1 }]);
        let at = place(&mut mm, &stray_entry);
        assert_eq!(Elf32Loader.load(&mut mm, space, at), Err(ExecError::BadEntry));

        assert!(!mm.is_mapped(space, VirtAddr::new(TEXT)));
    }
}
