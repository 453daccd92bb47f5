//! # System Call Interface
//!
//! Fronteira entre processos e núcleo. Um processo faz `int 0x80` com o
//! número em `eax` e os argumentos na stack; o dispatcher indexa a
//! tabela e grava o retorno no `eax` salvo.
//!
//! | Módulo      | Conteúdo                                   |
//! |-------------|--------------------------------------------|
//! | `numbers`   | Números fixos e canais                     |
//! | `error`     | Códigos de status (`E_*`)                  |
//! | `abi`       | ARG(n), retorno e validação de ponteiros   |
//! | `dispatch`  | Vetor 0x80 e tabela de handlers            |
//! | `process`   | exit, fork, execp, kill, wait              |
//! | `time`      | sleep, gettime                             |
//! | `io`        | read, write e recepção serial              |
//! | `system`    | sysstat, getpid, getppid, getprio          |
//!
//! Handlers que bloqueiam ou terminam o chamador não gravam retorno; quem
//! acordar o processo grava.

pub mod abi;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod numbers;
pub mod process;
pub mod system;
pub mod time;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{SysError, SysResult, SUCCESS};
pub use numbers::*;
