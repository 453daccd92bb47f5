//! Interface de carregadores de programa

use crate::mm::addr::PhysAddr;
use crate::mm::error::MmError;
use crate::mm::phys::PhysMemory;
use crate::mm::{AddressSpace, MemoryManager};

/// Erro de carga
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// Não começa com `\x7fELF`
    BadMagic,
    /// Classe, endianness, máquina ou tipo não suportados
    Unsupported,
    /// Segmento fora da região de usuário ou com tamanhos incoerentes
    BadSegment,
    /// Entry point fora dos segmentos carregados
    BadEntry,
    OutOfMemory,
}

impl ExecError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadMagic => "exec: assinatura ELF inválida",
            Self::Unsupported => "exec: formato não suportado",
            Self::BadSegment => "exec: segmento inválido",
            Self::BadEntry => "exec: entry point inválido",
            Self::OutOfMemory => "exec: sem memória",
        }
    }
}

impl From<MmError> for ExecError {
    fn from(e: MmError) -> Self {
        match e {
            MmError::OutOfMemory => ExecError::OutOfMemory,
            _ => ExecError::BadSegment,
        }
    }
}

/// Carrega a imagem em `image` dentro de `space` e devolve o entry point.
///
/// Em erro as páginas novas já foram devolvidas, mas `space` pode ter
/// perdido mapeamentos herdados. Quem precisa preservar a imagem atual
/// carrega numa cópia do espaço.
pub trait ProgramLoader<M: PhysMemory>: Send {
    fn load(
        &self,
        mm: &mut MemoryManager<M>,
        space: AddressSpace,
        image: PhysAddr,
    ) -> Result<u32, ExecError>;
}
