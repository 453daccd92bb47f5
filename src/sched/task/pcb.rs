//! Process Control Block

use super::state::{Priority, ProcState};
use crate::mm::AddressSpace;
use crate::sched::config::Q_DEFAULT;
use crate::sched::stack::Stack;

/// Índice de um PCB no pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcbId(u32);

impl PcbId {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Valor guardado nos qnodes das filas
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn from_u32(value: u32) -> Self {
        Self(value)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Descritor de processo.
#[derive(Debug, Clone, Copy)]
pub struct Pcb {
    pub pid: u32,
    pub ppid: u32,
    pub state: ProcState,
    pub prio: Priority,
    /// Ticks restantes do quantum
    pub ticks: u32,
    /// Tick de acordar (Sleeping)
    pub wakeup: u32,
    pub exit_status: i32,
    /// Offset do contexto salvo dentro da stack
    pub context: u32,
    pub stack: Option<Stack>,
    pub space: Option<AddressSpace>,
}

impl Pcb {
    pub const EMPTY: Pcb = Pcb {
        pid: 0,
        ppid: 0,
        state: ProcState::Free,
        prio: Priority::User,
        ticks: Q_DEFAULT,
        wakeup: 0,
        exit_status: 0,
        context: 0,
        stack: None,
        space: None,
    };

    pub fn clear(&mut self) {
        *self = Self::EMPTY;
    }

    pub fn dump(&self) {
        crate::kdebug!(
            "(Proc) pid=", self.pid,
            " ppid=", self.ppid,
            " state=", self.state as u8,
            " prio=", self.prio as u8
        );
        crate::kdebug!(
            "(Proc)   ticks=", self.ticks,
            " wakeup=", self.wakeup,
            " status=", self.exit_status,
            " ctx=", self.context
        );
        if let Some(stack) = self.stack {
            crate::kdebug!("(Proc)   stack=", stack.base().as_u32());
        }
        if let Some(space) = self.space {
            crate::kdebug!("(Proc)   dir=", space.directory().as_u32());
        }
    }
}
