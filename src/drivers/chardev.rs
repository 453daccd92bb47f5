//! Dispositivos de caractere usados pelos canais de read/write.

/// Um dispositivo byte a byte.
pub trait CharDevice: Send {
    /// Próximo byte recebido, sem bloquear.
    fn read_byte(&mut self) -> Option<u8>;

    fn write(&mut self, data: &[u8]);
}
