//! # Kernel Driver Layer
//!
//! Apenas o necessário para o núcleo: saída de diagnóstico, os canais de
//! read/write e o hardware que gera as interrupções do escalonador.
//!
//! | Driver    | Arquivo      | Papel                                   |
//! |-----------|--------------|-----------------------------------------|
//! | Serial    | `serial.rs`  | Logs do kernel + canal 1 (COM1)         |
//! | Chardev   | `chardev.rs` | Trait dos canais + dispositivos em RAM  |
//! | PIC       | `pic.rs`     | Remapeamento, máscaras e EOI            |
//! | Timer     | `timer/`     | PIT 8254 a 1000 Hz                      |
//!
//! ```text
//!   PIT ──IRQ0──▶ PIC ──0x20──▶ clock  ──▶ escalonador
//!   COM1 ─IRQ4──▶ PIC ──0x24──▶ serial ──▶ leitores bloqueados
//! ```

pub mod chardev;
pub mod pic; // 8259 PIC - Interrupções legacy
pub mod serial; // UART 16550 - Logs
pub mod timer; // PIT 8254
