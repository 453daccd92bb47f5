//! Portas de I/O legadas (PIC, PIT, UART).
//!
//! No host as escritas são descartadas e as leituras retornam 0.

/// Lê um byte de uma porta
#[inline]
pub fn inb(port: u16) -> u8 {
    #[cfg(all(target_arch = "x86", target_os = "none"))]
    {
        let value: u8;
        // SAFETY: acesso a porta não toca memória
        unsafe {
            core::arch::asm!(
                "in al, dx",
                in("dx") port,
                out("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
        value
    }
    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    {
        let _ = port;
        0
    }
}

/// Escreve um byte numa porta
#[inline]
pub fn outb(port: u16, value: u8) {
    #[cfg(all(target_arch = "x86", target_os = "none"))]
    // SAFETY: acesso a porta não toca memória
    unsafe {
        core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") value,
            options(nomem, nostack, preserves_flags)
        );
    }
    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    {
        let _ = (port, value);
    }
}

/// Pequeno atraso de barramento (escrita na porta 0x80)
#[inline]
pub fn io_wait() {
    outb(0x80, 0);
}
