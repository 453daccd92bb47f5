//! # Processos e Escalonamento
//!
//! | Módulo      | Responsabilidade                                        |
//! |-------------|---------------------------------------------------------|
//! | `task`      | PCB, estados, prioridades e a tabela de processos.      |
//! | `stack`     | Pool de stacks de 16 KiB, janela fixa, setup de argv.   |
//! | `scheduler` | Filas MLQ por prioridade, `schedule` e `dispatch`.      |
//! | `clock`     | Tick do PIT: quantum, preempção e fila de dormentes.   |
//! | `exec`      | Carregador ELF32 usado por `execp`.                     |
//!
//! Todo o estado vive dentro do [`Kernel`](crate::core::kernel::Kernel);
//! os módulos só acrescentam métodos a ele.

pub mod clock;
pub mod config;
pub mod exec;
pub mod scheduler;
pub mod stack;
pub mod task;

#[cfg(any(test, feature = "self_test"))]
pub mod test;
