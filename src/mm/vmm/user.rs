//! Acesso à memória de um processo a partir do kernel.
//!
//! Ponteiros vindos de syscalls são virtuais no espaço do processo. Cada
//! acesso é resolvido página a página pelo diretório do processo; página
//! ausente vira `MmError::NotMapped`.

use super::space::AddressSpace;
use crate::mm::addr::VirtAddr;
use crate::mm::config::PAGE_SIZE;
use crate::mm::error::{MmError, MmResult};
use crate::mm::phys::PhysMemory;
use crate::mm::MemoryManager;
use alloc::vec::Vec;

impl<M: PhysMemory> MemoryManager<M> {
    /// Confere que `[addr, addr + len)` está todo mapeado em `space`.
    pub fn check_user_range(&self, space: AddressSpace, addr: VirtAddr, len: u32) -> MmResult<()> {
        if len == 0 {
            return Ok(());
        }
        let first = addr.as_u32() & !(PAGE_SIZE - 1);
        let last = addr.as_u32().checked_add(len - 1).ok_or(MmError::InvalidParameter)? & !(PAGE_SIZE - 1);
        let mut page = first;
        loop {
            if !self.is_mapped(space, VirtAddr::new(page)) {
                return Err(MmError::NotMapped);
            }
            if page == last {
                return Ok(());
            }
            page += PAGE_SIZE;
        }
    }

    /// Copia `data` para `dst` no espaço `space`.
    pub fn copy_to_user(&mut self, space: AddressSpace, dst: VirtAddr, data: &[u8]) -> MmResult<()> {
        let mut done = 0usize;
        while done < data.len() {
            let va = dst.add(done as u32);
            let phys = self.translate(space, va).ok_or(MmError::NotMapped)?;
            let room = (PAGE_SIZE - va.page_offset()) as usize;
            let n = core::cmp::min(room, data.len() - done);
            self.mem.write_bytes(phys, &data[done..done + n]);
            done += n;
        }
        Ok(())
    }

    /// Copia de `src` no espaço `space` para `buf`.
    pub fn copy_from_user(&self, space: AddressSpace, src: VirtAddr, buf: &mut [u8]) -> MmResult<()> {
        let mut done = 0usize;
        while done < buf.len() {
            let va = src.add(done as u32);
            let phys = self.translate(space, va).ok_or(MmError::NotMapped)?;
            let room = (PAGE_SIZE - va.page_offset()) as usize;
            let n = core::cmp::min(room, buf.len() - done);
            self.mem.read_bytes(phys, &mut buf[done..done + n]);
            done += n;
        }
        Ok(())
    }

    pub fn read_user_u32(&self, space: AddressSpace, addr: VirtAddr) -> MmResult<u32> {
        let mut word = [0u8; 4];
        self.copy_from_user(space, addr, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    pub fn write_user_u32(&mut self, space: AddressSpace, addr: VirtAddr, value: u32) -> MmResult<()> {
        self.copy_to_user(space, addr, &value.to_le_bytes())
    }

    /// Lê uma string terminada em NUL (sem o NUL).
    ///
    /// Mais de `max` bytes sem terminador é `InvalidParameter`.
    pub fn read_user_cstr(&self, space: AddressSpace, addr: VirtAddr, max: usize) -> MmResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut va = addr;
        loop {
            let phys = self.translate(space, va).ok_or(MmError::NotMapped)?;
            let byte = self.mem.read_u8(phys);
            if byte == 0 {
                return Ok(out);
            }
            if out.len() == max {
                return Err(MmError::InvalidParameter);
            }
            out.push(byte);
            va = va.add(1);
        }
    }
}
