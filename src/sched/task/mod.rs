//! Processos: estados, PCBs e a tabela de processos

pub mod pcb;
pub mod state;
pub mod table;

pub use pcb::{Pcb, PcbId};
pub use state::{Priority, ProcState, N_STATES};
pub use table::ProcessTable;
