//! Bitmap de tamanho fixo

/// Bitmap com armazenamento embutido de `WORDS` palavras de 32 bits.
///
/// Só os primeiros `len` bits são usados.
#[derive(Clone)]
pub struct Bitmap<const WORDS: usize> {
    words: [u32; WORDS],
    len: usize,
}

impl<const WORDS: usize> Bitmap<WORDS> {
    /// Bitmap vazio (len = 0)
    pub const fn empty() -> Self {
        Self {
            words: [0; WORDS],
            len: 0,
        }
    }

    /// Capacidade máxima em bits
    pub const fn capacity() -> usize {
        WORDS * 32
    }

    /// Reinicia com `bits` bits, todos zerados.
    pub fn reset(&mut self, bits: usize) {
        debug_assert!(bits <= Self::capacity());
        self.words = [0; WORDS];
        self.len = bits;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Define um bit
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.words[index / 32] |= 1 << (index % 32);
    }

    /// Limpa um bit
    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.words[index / 32] &= !(1 << (index % 32));
    }

    /// Testa um bit
    pub fn test(&self, index: usize) -> bool {
        debug_assert!(index < self.len);
        (self.words[index / 32] & (1 << (index % 32))) != 0
    }

    /// Encontra primeiro bit livre (0)
    pub fn find_first_zero(&self) -> Option<usize> {
        let used_words = (self.len + 31) / 32;
        for (i, &word) in self.words[..used_words].iter().enumerate() {
            if word != u32::MAX {
                let index = i * 32 + word.trailing_ones() as usize;
                if index < self.len {
                    return Some(index);
                }
            }
        }
        None
    }

    /// Quantos bits estão setados
    pub fn count_ones(&self) -> usize {
        (0..self.len).filter(|&i| self.test(i)).count()
    }
}
