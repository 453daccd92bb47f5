//! Panic Handler.
//!
//! # Comportamento
//! 1. Desabilita interrupções (evita loop de panics).
//! 2. Loga local e mensagem na serial.
//! 3. Trava a CPU (hlt loop).

use crate::arch::{Cpu, CpuOps};
use crate::core::logging::{emit_record, LogArg, P_ERROR};
use crate::drivers::serial;
use core::fmt::{self, Write};
use core::panic::PanicInfo;

/// `fmt::Write` direto na COM1; só o panic usa formatação.
struct SerialWriter;

impl Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        serial::emit_str(s);
        Ok(())
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    Cpu::disable_interrupts();

    emit_record(P_ERROR, &[LogArg::Str("================ KERNEL PANIC ================")]);
    match info.location() {
        Some(location) => emit_record(
            P_ERROR,
            &[
                LogArg::Str("Location: "),
                LogArg::Str(location.file()),
                LogArg::Str(":"),
                LogArg::Dec(location.line() as u64),
            ],
        ),
        None => emit_record(P_ERROR, &[LogArg::Str("Location: Unknown")]),
    }

    serial::emit_str(P_ERROR);
    let _ = write!(SerialWriter, "Reason:   {}", info.message());
    serial::emit_nl();

    Cpu::hang();
}
