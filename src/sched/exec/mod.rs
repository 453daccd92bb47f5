//! Carga de programas.
//!
//! `execp` recebe o endereço físico de uma imagem já presente na memória e
//! delega a um [`ProgramLoader`]. O carregador padrão é [`Elf32Loader`].

pub mod elf;
pub mod loader;

pub use elf::Elf32Loader;
pub use loader::{ExecError, ProgramLoader};
