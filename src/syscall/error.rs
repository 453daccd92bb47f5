//! Códigos de erro das syscalls
//!
//! Erros voltam como valores negativos no `eax` salvo do processo; 0 e
//! positivos são sucesso.

use crate::klib::queue::QueueError;
use crate::mm::error::MmError;

/// Sucesso sem valor
pub const SUCCESS: i32 = 0;

/// Erros do sistema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SysError {
    /// Falha genérica (ex.: imagem de exec inválida)
    Failure = -1,
    /// Sem memória
    NoMemory = -2,
    /// Fila vazia
    Empty = -3,
    /// Argumento inválido ou ponteiro de usuário ruim
    BadParam = -4,
    /// Nada para ler no console
    NoData = -5,
    /// Canal de IO inexistente
    BadChannel = -6,
    /// Tabela de processos cheia
    NoProcs = -7,
    /// Processo não encontrado
    NotFound = -8,
    /// wait sem filhos
    NoChildren = -9,
    /// Status de saída de quem foi morto por kill
    Killed = -10,
}

impl SysError {
    /// Converte para o valor gravado em `eax`
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Converte de volta a partir do código
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Failure),
            -2 => Some(Self::NoMemory),
            -3 => Some(Self::Empty),
            -4 => Some(Self::BadParam),
            -5 => Some(Self::NoData),
            -6 => Some(Self::BadChannel),
            -7 => Some(Self::NoProcs),
            -8 => Some(Self::NotFound),
            -9 => Some(Self::NoChildren),
            -10 => Some(Self::Killed),
            _ => None,
        }
    }

    /// Nome do erro para debug
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failure => "E_FAILURE",
            Self::NoMemory => "E_NO_MEMORY",
            Self::Empty => "E_EMPTY",
            Self::BadParam => "E_BAD_PARAM",
            Self::NoData => "E_NO_DATA",
            Self::BadChannel => "E_BAD_CHAN",
            Self::NoProcs => "E_NO_PROCS",
            Self::NotFound => "E_NOT_FOUND",
            Self::NoChildren => "E_NO_CHILDREN",
            Self::Killed => "E_KILLED",
        }
    }
}

impl From<MmError> for SysError {
    fn from(e: MmError) -> Self {
        match e {
            MmError::OutOfMemory => Self::NoMemory,
            _ => Self::BadParam,
        }
    }
}

impl From<QueueError> for SysError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::OutOfMemory => Self::NoMemory,
            QueueError::Empty => Self::Empty,
        }
    }
}

/// Resultado de um handler.
///
/// `Ok(Some(v))` grava `v` no `eax` do chamador; `Ok(None)` significa que
/// o chamador saiu ou bloqueou e quem o acordar grava o retorno.
pub type SysResult<T> = Result<T, SysError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_and_stay_negative() {
        for code in -10..=-1 {
            let e = SysError::from_code(code).unwrap();
            assert_eq!(e.as_i32(), code);
            assert!(e.as_str().starts_with("E_"));
        }
        assert_eq!(SysError::from_code(SUCCESS), None);
        assert_eq!(SysError::from_code(-11), None);
    }

    #[test]
    fn subsystem_errors_map_to_status_codes() {
        assert_eq!(SysError::from(MmError::OutOfMemory), SysError::NoMemory);
        assert_eq!(SysError::from(MmError::NotMapped), SysError::BadParam);
        assert_eq!(SysError::from(QueueError::Empty), SysError::Empty);
    }
}
