//! Syscalls de IO e recepção serial.
//!
//! | Canal | read                                  | write         |
//! |-------|---------------------------------------|---------------|
//! | 0     | console, não bloqueia (`E_NO_DATA`)   | console       |
//! | 1     | COM1, bloqueia até chegar um byte     | COM1          |
//!
//! Leitores bloqueados na serial esperam numa fila FIFO. Cada byte que
//! chega vai para o primeiro leitor vivo; sem leitor, para o buffer. Um
//! `read` só drena o dispositivo depois de conferir o buffer inteiro.

use crate::arch::x86::context::VEC_SERIAL;
use crate::core::kernel::Kernel;
use crate::drivers::{pic, serial};
use crate::klib::queue::QueueId;
use crate::mm::addr::VirtAddr;
use crate::mm::phys::PhysMemory;
use crate::sched::config::SIO_BUFFER_SIZE;
use crate::sched::task::{PcbId, ProcState};
use crate::syscall::abi::is_user_range;
use crate::syscall::error::{SysError, SysResult};
use crate::syscall::numbers::{CHAN_CONSOLE, CHAN_SERIAL};
use alloc::vec;
use alloc::vec::Vec;

/// Bytes copiados por vez entre usuário e dispositivo
const IO_CHUNK: usize = 256;

/// Entrada serial: buffer circular e fila de leitores.
pub struct SerialInput {
    buf: [u8; SIO_BUFFER_SIZE],
    head: usize,
    len: usize,
    pub(crate) readers: Option<QueueId>,
    /// Bytes perdidos com o buffer cheio
    dropped: u32,
}

impl Default for SerialInput {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialInput {
    pub const fn new() -> Self {
        Self {
            buf: [0; SIO_BUFFER_SIZE],
            head: 0,
            len: 0,
            readers: None,
            dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Guarda um byte; `false` (e conta a perda) se estiver cheio.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len == SIO_BUFFER_SIZE {
            self.dropped = self.dropped.wrapping_add(1);
            return false;
        }
        self.buf[(self.head + self.len) % SIO_BUFFER_SIZE] = byte;
        self.len += 1;
        true
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.buf[self.head];
        self.head = (self.head + 1) % SIO_BUFFER_SIZE;
        self.len -= 1;
        Some(byte)
    }
}

impl<M: PhysMemory> Kernel<M> {
    pub(crate) fn sio_init(&mut self) {
        match self.queues.create(&mut self.mm, None) {
            Ok(q) => self.sio.readers = Some(q),
            Err(e) => crate::kpanic!(e.as_str()),
        }
        self.vectors.install(VEC_SERIAL, Self::serial_isr);
        serial::init();
        pic::unmask(pic::IRQ_COM1);
        crate::kinfo!("(Serial) recepção ativa, buffer=", SIO_BUFFER_SIZE);
    }

    pub(crate) fn readers_queue(&self) -> QueueId {
        match self.sio.readers {
            Some(q) => q,
            None => crate::kpanic!("(Serial) fila de leitores inexistente"),
        }
    }

    /// Handler do vetor da COM1: drena a UART.
    fn serial_isr(k: &mut Self, vector: u32, _code: u32) {
        while let Some(byte) = k.serial.read_byte() {
            k.sio_receive(byte);
        }
        pic::send_eoi(vector);
    }

    /// Um byte recebido pela serial.
    pub fn sio_receive(&mut self, byte: u8) {
        let byte = if byte == b'\r' { b'\n' } else { byte };
        let q = self.readers_queue();

        while let Ok(data) = self.queues.remove(self.mm.mem_mut(), q) {
            let reader = PcbId::from_u32(data);
            if self.reclaim_if_killed(reader) {
                continue;
            }
            match self.deliver_byte(reader, byte) {
                Ok(()) => {
                    self.set_ret(reader, 1);
                    self.schedule(reader);
                    return;
                }
                // O leitor leva o erro; o byte segue para o próximo
                Err(e) => {
                    self.set_ret(reader, e.as_i32() as u32);
                    self.schedule(reader);
                }
            }
        }

        if !self.sio.push(byte) {
            crate::ktrace!("(Serial) buffer cheio, byte descartado ", byte);
        }
    }

    /// Grava um byte no buf (ARG 2) de um leitor bloqueado
    fn deliver_byte(&mut self, reader: PcbId, byte: u8) -> SysResult<()> {
        let buf = self.arg(reader, 2);
        let space = self.procs.get(reader).space.ok_or(SysError::Failure)?;
        if !is_user_range(buf, 1) {
            return Err(SysError::BadParam);
        }
        self.mm.copy_to_user(space, VirtAddr::new(buf), &[byte])?;
        Ok(())
    }
}

/// read(canal, buf, len)
pub fn sys_read<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    let (chan, buf, len) = (k.arg(curr, 1), k.arg(curr, 2), k.arg(curr, 3));
    if chan != CHAN_CONSOLE && chan != CHAN_SERIAL {
        return Err(SysError::BadChannel);
    }
    if len == 0 {
        return Ok(Some(0));
    }
    if !is_user_range(buf, len) {
        return Err(SysError::BadParam);
    }
    let space = k.procs.get(curr).space.ok_or(SysError::Failure)?;
    // Nada sai do dispositivo se o buffer não puder receber tudo
    k.mm.check_user_range(space, VirtAddr::new(buf), len)?;

    let mut data = Vec::new();
    if chan == CHAN_CONSOLE {
        while data.len() < len as usize {
            match k.console.read_byte() {
                Some(byte) => data.push(byte),
                None => break,
            }
        }
        if data.is_empty() {
            return Err(SysError::NoData);
        }
    } else {
        while data.len() < len as usize {
            match k.sio.pop() {
                Some(byte) => data.push(byte),
                None => break,
            }
        }
        if data.is_empty() {
            let q = k.readers_queue();
            k.queues.add(&mut k.mm, q, curr.as_u32(), 0)?;
            k.procs.get_mut(curr).state = ProcState::Blocked;
            crate::ktrace!("(Serial) leitor bloqueado pid=", k.procs.get(curr).pid);
            k.dispatch();
            return Ok(None);
        }
    }

    k.mm.copy_to_user(space, VirtAddr::new(buf), &data)?;
    Ok(Some(data.len() as u32))
}

/// write(canal, buf, len): devolve `len`.
pub fn sys_write<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    let (chan, buf, len) = (k.arg(curr, 1), k.arg(curr, 2), k.arg(curr, 3));
    if chan != CHAN_CONSOLE && chan != CHAN_SERIAL {
        return Err(SysError::BadChannel);
    }
    if len == 0 {
        return Ok(Some(0));
    }
    if !is_user_range(buf, len) {
        return Err(SysError::BadParam);
    }
    let space = k.procs.get(curr).space.ok_or(SysError::Failure)?;

    let mut chunk = vec![0u8; IO_CHUNK];
    let mut done = 0u32;
    while done < len {
        let n = core::cmp::min(IO_CHUNK as u32, len - done) as usize;
        k.mm.copy_from_user(space, VirtAddr::new(buf + done), &mut chunk[..n])?;
        let device = if chan == CHAN_CONSOLE { &mut k.console } else { &mut k.serial };
        device.write(&chunk[..n]);
        done += n as u32;
    }
    Ok(Some(len))
}
