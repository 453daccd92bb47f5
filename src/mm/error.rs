//! Tipos de Erro do Subsistema de Memória
//!
//! Define erros estruturados para diagnóstico preciso de falhas em MM.

/// Erros do subsistema de memória
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// Sem frames/páginas/slices disponíveis (OOM)
    OutOfMemory,
    /// Endereço virtual sem mapeamento
    NotMapped,
    /// Parâmetro inválido (contagem zero, endereço desalinhado...)
    InvalidParameter,
}

impl MmError {
    /// Retorna descrição legível do erro
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OOM: sem memória física disponível",
            Self::NotMapped => "Região não mapeada",
            Self::InvalidParameter => "Parâmetro inválido",
        }
    }
}

impl core::fmt::Display for MmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tipo Result específico para operações de memória
pub type MmResult<T> = Result<T, MmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_its_own_message() {
        let all = [MmError::OutOfMemory, MmError::NotMapped, MmError::InvalidParameter];
        for (i, a) in all.iter().enumerate() {
            assert!(!a.as_str().is_empty());
            for b in &all[i + 1..] {
                assert_ne!(a.as_str(), b.as_str());
            }
        }
        assert_eq!(alloc::format!("{}", MmError::NotMapped), "Região não mapeada");
    }
}
