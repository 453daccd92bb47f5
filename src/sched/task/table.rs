//! Pool de PCBs e tabela de processos ativos.
//!
//! Os PCBs vivem num pool fixo (arena) com uma pilha de índices livres;
//! nunca voltam ao heap. A tabela de processos guarda até `N_PROCS`
//! índices ativos, na ordem de inserção por slot.

use super::pcb::{Pcb, PcbId};
use super::state::{ProcState, N_STATES};
use crate::sched::config::{FIRST_PID, N_PROCS};
use alloc::vec::Vec;

pub struct ProcessTable {
    pool: Vec<Pcb>,
    free: Vec<PcbId>,
    slots: [Option<PcbId>; N_PROCS],
    count: usize,
    next_pid: u32,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    /// Tabela sem pool (não aloca; o pool nasce em `init`).
    pub const fn new() -> Self {
        Self {
            pool: Vec::new(),
            free: Vec::new(),
            slots: [None; N_PROCS],
            count: 0,
            next_pid: FIRST_PID,
        }
    }

    /// Cria o pool de `N_PROCS` PCBs.
    pub fn init(&mut self) {
        self.pool = alloc::vec![Pcb::EMPTY; N_PROCS];
        // Índices baixos saem primeiro
        self.free = (0..N_PROCS as u32).rev().map(PcbId::new).collect();
        crate::kinfo!("(Proc) pool de PCBs, entradas=", N_PROCS);
    }

    /// Tabela com pool pronto
    pub fn with_pool() -> Self {
        let mut table = Self::new();
        table.init();
        table
    }

    // =========================================================================
    // POOL
    // =========================================================================

    /// PCB limpo no estado New
    pub fn pcb_alloc(&mut self) -> Option<PcbId> {
        let id = self.free.pop()?;
        let pcb = &mut self.pool[id.index()];
        pcb.clear();
        pcb.state = ProcState::New;
        Some(id)
    }

    pub fn pcb_free(&mut self, id: PcbId) {
        crate::kassert!(
            1,
            self.pool[id.index()].state != ProcState::Free,
            "(Proc) free de PCB já livre"
        );
        crate::kassert!(3, self.slot_of(id).is_none(), "(Proc) free de PCB ainda na tabela");
        self.pool[id.index()].clear();
        self.free.push(id);
    }

    pub fn free_pcbs(&self) -> usize {
        self.free.len()
    }

    pub fn get(&self, id: PcbId) -> &Pcb {
        &self.pool[id.index()]
    }

    pub fn get_mut(&mut self, id: PcbId) -> &mut Pcb {
        &mut self.pool[id.index()]
    }

    /// Próximo PID livre
    pub fn next_pid(&mut self) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    // =========================================================================
    // TABELA
    // =========================================================================

    /// Coloca na primeira entrada livre. Devolve o slot.
    pub fn insert(&mut self, id: PcbId) -> Option<usize> {
        let slot = self.slots.iter().position(|s| s.is_none())?;
        self.slots[slot] = Some(id);
        self.count += 1;
        Some(slot)
    }

    pub fn remove(&mut self, id: PcbId) -> bool {
        match self.slot_of(id) {
            Some(slot) => {
                self.slots[slot] = None;
                self.count -= 1;
                true
            }
            None => false,
        }
    }

    fn slot_of(&self, id: PcbId) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(id))
    }

    /// Processos na tabela
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_full(&self) -> bool {
        self.count >= N_PROCS
    }

    /// PCB no slot `slot` da tabela
    pub fn slot(&self, slot: usize) -> Option<PcbId> {
        self.slots.get(slot).copied().flatten()
    }

    /// Índices ativos, na ordem dos slots
    pub fn active(&self) -> impl Iterator<Item = PcbId> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub fn pcb_find(&self, pid: u32) -> Option<PcbId> {
        self.active().find(|&id| self.get(id).pid == pid)
    }

    /// Filhos de `pid` (em qualquer estado)
    pub fn children(&self, pid: u32) -> impl Iterator<Item = PcbId> + '_ {
        self.active().filter(move |&id| self.get(id).ppid == pid)
    }

    /// Contagem por estado; devolve o total de ativos.
    pub fn pcount(&self, counts: &mut [u32; N_STATES]) -> usize {
        *counts = [0; N_STATES];
        for id in self.active() {
            counts[self.get(id).state.index()] += 1;
        }
        self.count
    }

    pub fn ptable_dump(&self) {
        crate::kdebug!("(Proc) tabela: ativos=", self.count, " livres=", self.free.len());
        for (slot, id) in self.slots.iter().enumerate() {
            if let Some(id) = id {
                crate::kdebug!("(Proc) slot=", slot, " pcb=", id.as_u32());
                self.get(*id).dump();
            }
        }
    }
}
