//! Espaços de endereçamento: criação, mapeamento, cópia e destruição.

use super::entry::{Entry, EntryFlags};
use crate::arch::x86::cpu;
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::{
    ENTRIES_PER_TABLE, IDENTITY_MAP_PAGES, KERNEL_MIRROR_PAGES, KERNEL_VIRT_BASE, PAGE_SIZE,
};
use crate::mm::error::{MmError, MmResult};
use crate::mm::phys::PhysMemory;
use crate::mm::pmm::PhysFrame;
use crate::mm::MemoryManager;

/// Um espaço de endereçamento, identificado pelo frame do diretório.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AddressSpace {
    dir: PhysAddr,
}

impl AddressSpace {
    /// Endereço físico do diretório (valor de CR3)
    pub fn directory(self) -> PhysAddr {
        self.dir
    }
}

impl<M: PhysMemory> MemoryManager<M> {
    fn read_entry(&self, table: PhysAddr, index: u32) -> Entry {
        Entry::from_raw(self.mem.read_u32(table.add(index * 4)))
    }

    fn write_entry(&mut self, table: PhysAddr, index: u32, entry: Entry) {
        self.mem.write_u32(table.add(index * 4), entry.raw());
    }

    fn zeroed_frame(&mut self) -> MmResult<PhysAddr> {
        let frame = self.alloc_frame().ok_or(MmError::OutOfMemory)?;
        let addr = frame.start_address();
        self.mem.fill(addr, 0, PAGE_SIZE);
        Ok(addr)
    }

    fn release_frame(&mut self, addr: PhysAddr) {
        if let Some(frame) = PhysFrame::from_start_address(addr) {
            self.free_frame(frame);
        }
    }

    /// PTE que cobre `virt`, se a tabela existir: (tabela, índice)
    fn leaf_slot(&self, space: AddressSpace, virt: VirtAddr) -> Option<(PhysAddr, u32)> {
        let pde = self.read_entry(space.dir, virt.dir_index());
        if !pde.is_present() {
            return None;
        }
        Some((pde.frame(), virt.table_index()))
    }

    fn leaf_entry(&self, space: AddressSpace, virt: VirtAddr) -> Entry {
        match self.leaf_slot(space, virt) {
            Some((table, index)) => self.read_entry(table, index),
            None => Entry::EMPTY,
        }
    }

    fn flush(&self, space: AddressSpace, virt: VirtAddr) {
        if self.active == Some(space) {
            cpu::invalidate_page(virt.as_u32());
        }
    }

    /// Diretório vazio
    pub fn create_address_space(&mut self) -> MmResult<AddressSpace> {
        let dir = self.zeroed_frame()?;
        Ok(AddressSpace { dir })
    }

    pub fn kernel_space(&self) -> Option<AddressSpace> {
        self.kernel_space
    }

    pub fn active_space(&self) -> Option<AddressSpace> {
        self.active
    }

    /// Mapeia `virt` → `phys` (presente + escrita).
    pub fn map(&mut self, space: AddressSpace, virt: VirtAddr, phys: PhysAddr) -> MmResult<()> {
        self.map_with(space, virt, phys, EntryFlags::KERNEL_RW)
    }

    /// Mapeia com flags explícitas, criando a tabela se preciso.
    pub fn map_with(
        &mut self,
        space: AddressSpace,
        virt: VirtAddr,
        phys: PhysAddr,
        flags: EntryFlags,
    ) -> MmResult<()> {
        let virt = virt.page_base();
        let di = virt.dir_index();

        let mut pde = self.read_entry(space.dir, di);
        if !pde.is_present() {
            let table = self.zeroed_frame()?;
            // alloc_frame pode ter mapeado algo neste mesmo diretório
            pde = self.read_entry(space.dir, di);
            if pde.is_present() {
                self.release_frame(table);
            } else {
                let mut pde_flags = EntryFlags::KERNEL_RW;
                if flags.contains(EntryFlags::USER) {
                    pde_flags |= EntryFlags::USER;
                }
                pde = Entry::new(table, pde_flags);
                self.write_entry(space.dir, di, pde);
            }
        }

        let entry = Entry::new(phys, flags | EntryFlags::PRESENT);
        self.write_entry(pde.frame(), virt.table_index(), entry);
        self.flush(space, virt);
        Ok(())
    }

    /// Zera a PTE; o frame continua com quem o possui.
    pub fn unmap(&mut self, space: AddressSpace, virt: VirtAddr) {
        if let Some((table, index)) = self.leaf_slot(space, virt) {
            self.write_entry(table, index, Entry::EMPTY);
            self.flush(space, virt);
        }
    }

    pub fn is_mapped(&self, space: AddressSpace, virt: VirtAddr) -> bool {
        self.leaf_entry(space, virt).is_present()
    }

    /// Endereço físico correspondente a `virt`
    pub fn translate(&self, space: AddressSpace, virt: VirtAddr) -> Option<PhysAddr> {
        let pte = self.leaf_entry(space, virt);
        if !pte.is_present() {
            return None;
        }
        Some(pte.frame().add(virt.page_offset()))
    }

    /// Frame novo e zerado em `virt`. `false` se a PTE já está em uso ou
    /// não há memória.
    pub fn alloc_page_at(&mut self, space: AddressSpace, virt: VirtAddr) -> bool {
        if !self.leaf_entry(space, virt).is_unused() {
            return false;
        }
        let frame = match self.zeroed_frame() {
            Ok(frame) => frame,
            Err(_) => return false,
        };
        if self.map(space, virt, frame).is_err() {
            self.release_frame(frame);
            return false;
        }
        true
    }

    /// Libera o frame mapeado em `virt` e zera a PTE.
    pub fn free_frame_at(&mut self, space: AddressSpace, virt: VirtAddr) {
        let pte = self.leaf_entry(space, virt);
        if !pte.is_present() {
            return;
        }
        self.unmap(space, virt);
        self.release_frame(pte.frame());
    }

    /// Tabelas novas, entradas copiadas literalmente (frames compartilhados).
    pub fn copy_address_space(&mut self, src: AddressSpace) -> MmResult<AddressSpace> {
        let copy = self.create_address_space()?;

        for di in 0..ENTRIES_PER_TABLE {
            let pde = self.read_entry(src.dir, di);
            if !pde.is_present() {
                continue;
            }
            let table = match self.zeroed_frame() {
                Ok(table) => table,
                Err(e) => {
                    self.delete_address_space(copy);
                    return Err(e);
                }
            };
            self.mem.copy(pde.frame(), table, PAGE_SIZE);
            self.write_entry(copy.dir, di, Entry::new(table, pde.flags()));
        }

        crate::kdebug!("(VMM) cópia de ", src.dir.as_u32(), " -> ", copy.dir.as_u32());
        Ok(copy)
    }

    /// Libera tabelas e diretório (os frames finais não).
    pub fn delete_address_space(&mut self, space: AddressSpace) {
        crate::kassert!(
            0,
            self.kernel_space != Some(space),
            "(VMM) tentativa de destruir o espaço do kernel"
        );
        crate::kassert!(1, self.active != Some(space), "(VMM) destruindo espaço ativo");

        for di in 0..ENTRIES_PER_TABLE {
            let pde = self.read_entry(space.dir, di);
            if pde.is_present() {
                self.release_frame(pde.frame());
            }
        }
        self.release_frame(space.dir);
        crate::ktrace!("(VMM) espaço destruído dir=", space.dir.as_u32());
    }

    /// Identidade nas páginas baixas + espelho em `KERNEL_VIRT_BASE`.
    pub fn base_kernel_address_space(&mut self) -> MmResult<AddressSpace> {
        let space = self.create_address_space()?;
        for i in 0..IDENTITY_MAP_PAGES {
            let addr = i * PAGE_SIZE;
            self.map(space, VirtAddr::new(addr), PhysAddr::new(addr))?;
        }
        for i in 0..KERNEL_MIRROR_PAGES {
            let addr = i * PAGE_SIZE;
            self.map(space, VirtAddr::new(KERNEL_VIRT_BASE + addr), PhysAddr::new(addr))?;
        }
        crate::kinfo!("(VMM) espaço base do kernel dir=", space.dir.as_u32());
        Ok(space)
    }

    /// Carrega o diretório (CR3 + CR0.PG) e solta espaços aposentados.
    pub fn activate(&mut self, space: AddressSpace) {
        if self.active != Some(space) {
            cpu::load_page_directory(space.dir.as_u32());
            self.active = Some(space);
        }

        let mut i = 0;
        while i < self.retired.len() {
            if self.retired[i] == space {
                i += 1;
            } else {
                let old = self.retired.swap_remove(i);
                self.delete_address_space(old);
            }
        }
    }

    /// Destrói o espaço agora ou, se ainda ativo, no próximo `activate`.
    pub fn retire(&mut self, space: AddressSpace) {
        if self.active == Some(space) {
            self.retired.push(space);
        } else {
            self.delete_address_space(space);
        }
    }

    /// Espaços aguardando destruição
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::mm::addr::{PhysAddr, VirtAddr};
    use crate::mm::config::{KERNEL_VIRT_BASE, PAGE_SIZE};
    use crate::mm::testing::memory_manager;
    use crate::mm::PhysMemory;

    const USER_VA: u32 = 0x0800_0000;

    #[test]
    fn kernel_space_mirrors_low_memory_at_the_high_base() {
        let mm = memory_manager();
        let ks = mm.kernel_space().unwrap();
        assert_eq!(mm.active_space(), Some(ks));
        assert_eq!(
            mm.translate(ks, VirtAddr::new(KERNEL_VIRT_BASE + 0x1234)),
            Some(PhysAddr::new(0x1234))
        );
        assert_eq!(mm.translate(ks, VirtAddr::new(0x1234)), Some(PhysAddr::new(0x1234)));
        assert!(!mm.is_mapped(ks, VirtAddr::new(USER_VA)));
    }

    #[test]
    fn map_creates_the_table_lazily_and_unmap_keeps_the_frame() {
        let mut mm = memory_manager();
        let space = mm.create_address_space().unwrap();
        let frame = mm.page_alloc(1).unwrap();
        let free_before = mm.frames().free_frames();

        mm.map(space, VirtAddr::new(USER_VA + 0x10), frame).unwrap();
        assert_eq!(mm.frames().free_frames(), free_before - 1, "uma tabela nova");
        assert_eq!(mm.translate(space, VirtAddr::new(USER_VA + 0x10)), Some(frame.add(0x10)));

        mm.map(space, VirtAddr::new(USER_VA + PAGE_SIZE), frame).unwrap();
        assert_eq!(mm.frames().free_frames(), free_before - 1, "tabela reaproveitada");

        mm.unmap(space, VirtAddr::new(USER_VA));
        assert!(!mm.is_mapped(space, VirtAddr::new(USER_VA)));
        assert!(mm.is_mapped(space, VirtAddr::new(USER_VA + PAGE_SIZE)));
    }

    #[test]
    fn alloc_page_at_refuses_used_entries() {
        let mut mm = memory_manager();
        let space = mm.create_address_space().unwrap();
        let va = VirtAddr::new(USER_VA);
        assert!(mm.alloc_page_at(space, va));
        assert!(!mm.alloc_page_at(space, va));

        let phys = mm.translate(space, va).unwrap();
        assert_eq!(mm.mem().read_u32(phys), 0);

        mm.free_frame_at(space, va);
        assert!(!mm.is_mapped(space, va));
        assert!(mm.alloc_page_at(space, va));
    }

    #[test]
    fn copied_space_shares_frames_with_the_original() {
        let mut mm = memory_manager();
        let parent = mm.copy_address_space(mm.kernel_space().unwrap()).unwrap();
        let va = VirtAddr::new(USER_VA + 0x20);
        assert!(mm.alloc_page_at(parent, va));

        let child = mm.copy_address_space(parent).unwrap();
        assert_ne!(child.directory(), parent.directory());

        let p_phys = mm.translate(parent, va).unwrap();
        mm.mem_mut().write_u32(p_phys, 0xCAFE_F00D);
        let c_phys = mm.translate(child, va).unwrap();
        assert_eq!(c_phys, p_phys);
        assert_eq!(mm.mem().read_u32(c_phys), 0xCAFE_F00D);

        // tabelas são independentes: desmapear no filho não afeta o pai
        mm.unmap(child, va);
        assert!(mm.is_mapped(parent, va));
    }

    #[test]
    fn deleting_a_space_returns_tables_but_not_leaf_frames() {
        let mut mm = memory_manager();
        let space = mm.create_address_space().unwrap();
        assert!(mm.alloc_page_at(space, VirtAddr::new(USER_VA)));
        let free = mm.frames().free_frames();

        mm.delete_address_space(space);
        // diretório + 1 tabela
        assert_eq!(mm.frames().free_frames(), free + 2);
    }

    #[test]
    fn retiring_the_active_space_is_deferred() {
        let mut mm = memory_manager();
        let ks = mm.kernel_space().unwrap();
        let a = mm.copy_address_space(ks).unwrap();
        mm.activate(a);
        let free = mm.frames().free_frames();

        mm.retire(a);
        assert_eq!(mm.retired_count(), 1);
        assert_eq!(mm.frames().free_frames(), free);

        mm.activate(ks);
        assert_eq!(mm.retired_count(), 0);
        assert!(mm.frames().free_frames() > free);
    }
}
