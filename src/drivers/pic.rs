//! Driver do 8259 PIC (Programmable Interrupt Controller).
//!
//! # Remapeamento
//! Por padrão o PIC usa vetores 0-15, que conflitam com exceções da CPU.
//! Remapeamos para 0x20-0x2F: IRQ0 (PIT) = 0x20, IRQ4 (COM1) = 0x24.

use crate::arch::x86::port::{inb, io_wait, outb};

const PIC1_CMD: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_CMD: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const PIC_EOI: u8 = 0x20;

/// Vetor da IRQ 0 no mestre
pub const PIC1_OFFSET: u8 = 0x20;

/// Vetor da IRQ 8 no escravo
pub const PIC2_OFFSET: u8 = 0x28;

pub const IRQ_TIMER: u8 = 0;
pub const IRQ_COM1: u8 = 4;

/// Inicializa e remapeia, com todas as IRQs mascaradas.
pub fn init() {
    crate::kdebug!("(PIC) init: remapeando IRQs para ", PIC1_OFFSET);

    // ICW1: início + ICW4
    outb(PIC1_CMD, 0x11);
    io_wait();
    outb(PIC2_CMD, 0x11);
    io_wait();

    // ICW2: offsets
    outb(PIC1_DATA, PIC1_OFFSET);
    io_wait();
    outb(PIC2_DATA, PIC2_OFFSET);
    io_wait();

    // ICW3: cascata na IRQ2
    outb(PIC1_DATA, 4);
    io_wait();
    outb(PIC2_DATA, 2);
    io_wait();

    // ICW4: modo 8086
    outb(PIC1_DATA, 0x01);
    io_wait();
    outb(PIC2_DATA, 0x01);
    io_wait();

    // Tudo mascarado, menos a cascata
    outb(PIC1_DATA, 0xFB);
    outb(PIC2_DATA, 0xFF);

    crate::kinfo!("(PIC) Inicializado e Remapeado");
}

/// Habilita (unmask) uma IRQ (0-15).
pub fn unmask(irq: u8) {
    let port = if irq < 8 { PIC1_DATA } else { PIC2_DATA };
    let value = inb(port);
    outb(port, value & !(1 << (irq % 8)));
}

/// Vetor de CPU correspondente a uma IRQ
pub const fn irq_vector(irq: u8) -> u32 {
    PIC1_OFFSET as u32 + irq as u32
}

/// "End of Interrupt" para o vetor atendido.
/// Deve ser chamado ao final de todo handler de IRQ.
pub fn send_eoi(vector: u32) {
    if vector >= PIC2_OFFSET as u32 {
        outb(PIC2_CMD, PIC_EOI);
    }
    outb(PIC1_CMD, PIC_EOI);
}
