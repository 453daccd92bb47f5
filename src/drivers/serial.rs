// =============================================================================
// SERIAL DRIVER - ZERO OVERHEAD
// =============================================================================
//
// Porta serial COM1 (UART 16550): saída de log do kernel e canal 1 das
// syscalls read/write.
//
// ARQUITETURA:
// - SEM Mutex/Spinlock - escrita direta via portas de I/O
// - SEM core::fmt - números formatados à mão
// - SEM alocação - apenas strings e inteiros
//
// ONDE OS BYTES VÃO:
// - bare-metal: COM1 (0x3F8), com busy wait no LSR
// - cargo test: stderr
// - outros alvos de host: descartados
//
// FUNÇÕES DISPONÍVEIS:
// - emit(byte)       : Envia um byte
// - emit_str(s)      : Envia string
// - emit_hex(v)      : Envia valor em hexadecimal (0x...)
// - emit_dec(v)      : Envia valor em decimal
// - emit_nl()        : Envia newline (\r\n)
//
// =============================================================================

use crate::arch::x86::port::{inb, outb};
use crate::drivers::chardev::CharDevice;

// Porta de dados da COM1
const COM1_DATA: u16 = 0x3F8;

// Line Status Register
const COM1_STATUS: u16 = COM1_DATA + 5;

// Bits do LSR
const LSR_DATA_READY: u8 = 0x01;
const LSR_THR_EMPTY: u8 = 0x20;

// =============================================================================
// INICIALIZAÇÃO
// =============================================================================

/// Inicializa a COM1: 38400 baud, 8N1, FIFO, interrupção de recepção.
pub fn init() {
    // Interrupções desligadas durante a programação
    outb(COM1_DATA + 1, 0x00);

    // DLAB para o divisor
    outb(COM1_DATA + 3, 0x80);
    outb(COM1_DATA, 0x03);
    outb(COM1_DATA + 1, 0x00);

    // 8 bits, sem paridade, 1 stop bit
    outb(COM1_DATA + 3, 0x03);

    // FIFO ligado, limpo, limiar de 14 bytes
    outb(COM1_DATA + 2, 0xC7);

    // OUT2 + RTS/DSR (OUT2 libera a IRQ para o PIC)
    outb(COM1_DATA + 4, 0x0B);

    // Interrupção só de "dado recebido"
    outb(COM1_DATA + 1, 0x01);
}

// =============================================================================
// ESCRITA
// =============================================================================

/// Envia um único byte.
#[inline(always)]
pub fn emit(byte: u8) {
    #[cfg(all(target_arch = "x86", target_os = "none"))]
    {
        while inb(COM1_STATUS) & LSR_THR_EMPTY == 0 {
            core::hint::spin_loop();
        }
        outb(COM1_DATA, byte);
    }
    #[cfg(test)]
    {
        extern crate std;
        std::eprint!("{}", byte as char);
    }
    #[cfg(not(any(test, all(target_arch = "x86", target_os = "none"))))]
    {
        let _ = byte;
    }
}

/// Envia uma string.
#[inline(never)]
pub fn emit_str(s: &str) {
    #[cfg(test)]
    {
        extern crate std;
        std::eprint!("{}", s);
    }
    #[cfg(not(test))]
    for b in s.bytes() {
        emit(b);
    }
}

/// Envia bytes arbitrários (saída das syscalls).
pub fn emit_bytes(data: &[u8]) {
    for &b in data {
        emit(b);
    }
}

/// Envia uma nova linha (CRLF).
#[inline(never)]
pub fn emit_nl() {
    emit_str("\r\n");
}

/// Envia `value` em hexadecimal, sem zeros à esquerda: 0x1F
#[inline(never)]
pub fn emit_hex(value: u64) {
    let mut buf = [0u8; 18];
    emit_str(format_hex(value, &mut buf));
}

/// Envia `value` em decimal.
#[inline(never)]
pub fn emit_dec(value: u64) {
    let mut buf = [0u8; 20];
    emit_str(format_dec(value, &mut buf));
}

fn format_hex(mut value: u64, buf: &mut [u8; 18]) -> &str {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = DIGITS[(value & 0xF) as usize];
        value >>= 4;
        if value == 0 {
            break;
        }
    }
    i -= 1;
    buf[i] = b'x';
    i -= 1;
    buf[i] = b'0';
    // Só dígitos ASCII
    core::str::from_utf8(&buf[i..]).unwrap_or("0x?")
}

fn format_dec(mut value: u64, buf: &mut [u8; 20]) -> &str {
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    core::str::from_utf8(&buf[i..]).unwrap_or("?")
}

// =============================================================================
// DISPOSITIVO DE CARACTERE
// =============================================================================

/// COM1 vista como dispositivo (canal 1 de read/write).
pub struct SerialPort;

impl CharDevice for SerialPort {
    fn read_byte(&mut self) -> Option<u8> {
        if cfg!(all(target_arch = "x86", target_os = "none"))
            && inb(COM1_STATUS) & LSR_DATA_READY != 0
        {
            Some(inb(COM1_DATA))
        } else {
            None
        }
    }

    fn write(&mut self, data: &[u8]) {
        emit_bytes(data);
    }
}

/// Console sem vídeo nem teclado (canal 0): a saída vai para a COM1 e
/// a leitura nunca tem dados.
pub struct SerialConsole;

impl CharDevice for SerialConsole {
    fn read_byte(&mut self) -> Option<u8> {
        None
    }

    fn write(&mut self, data: &[u8]) {
        emit_bytes(data);
    }
}
