//! Timer PIT (Programmable Interval Timer)
//!
//! Driver para o 8253/8254 PIT. Canal 0 gera a IRQ 0 periódica que move
//! o clock do escalonador.

use crate::arch::x86::port::outb;

const PIT_CHANNEL_0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

/// Frequência base do cristal (Hz)
pub const PIT_FREQUENCY: u32 = 1_193_182;

/// Divisor de 16 bits para `frequency` Hz (0 significa 65536 no hardware).
pub const fn divisor_for(frequency: u32) -> u16 {
    let div = PIT_FREQUENCY / frequency;
    if div > 0xFFFF {
        0
    } else {
        div as u16
    }
}

/// Inicializa o PIT com frequência especificada
pub fn init(frequency: u32) {
    let divisor = divisor_for(frequency);

    // Canal 0, lobyte/hibyte, modo 3 (onda quadrada)
    outb(PIT_COMMAND, 0x36);
    outb(PIT_CHANNEL_0, (divisor & 0xFF) as u8);
    outb(PIT_CHANNEL_0, (divisor >> 8) as u8);

    crate::kinfo!("(PIT) frequência=", frequency, " divisor=", divisor);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_khz_divisor() {
        assert_eq!(divisor_for(1000), 1193);
        assert_eq!(divisor_for(10), 0);
    }
}
