//! Escalonador de filas multinível.
//!
//! Uma fila FIFO de prontos por classe de prioridade. `dispatch` varre da
//! classe mais alta para a mais baixa e pega a frente da primeira fila não
//! vazia; dentro de uma classe é round-robin pelo quantum do clock.
//!
//! # Terminação preguiçosa
//!
//! Um processo pode ser marcado `Killed` enquanto ainda está numa fila (ou
//! é o corrente). Ele só é recolhido quando alguém o tira de uma fila:
//! `schedule`, `dispatch` e o leitor serial passam todos por
//! [`Kernel::reclaim_if_killed`].

use crate::core::kernel::Kernel;
use crate::klib::queue::QueueId;
use crate::mm::phys::PhysMemory;
use crate::sched::config::{N_PRIOS, Q_DEFAULT};
use crate::sched::task::{PcbId, Priority, ProcState, N_STATES};

/// Filas de prontos e processo corrente.
pub struct Scheduler {
    pub(crate) ready: [Option<QueueId>; N_PRIOS],
    pub(crate) current: Option<PcbId>,
    /// Despachos desde o boot
    pub(crate) dispatches: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            ready: [None; N_PRIOS],
            current: None,
            dispatches: 0,
        }
    }

    pub fn ready_queue(&self, prio: Priority) -> Option<QueueId> {
        self.ready[prio.index()]
    }

    pub fn dispatches(&self) -> u32 {
        self.dispatches
    }
}

impl<M: PhysMemory> Kernel<M> {
    pub(crate) fn sched_init(&mut self) {
        for prio in Priority::ALL {
            match self.queues.create(&mut self.mm, None) {
                Ok(q) => self.sched.ready[prio.index()] = Some(q),
                Err(e) => crate::kpanic!(e.as_str()),
            }
        }
        crate::kinfo!("(Sched) filas de prontos criadas, classes=", N_PRIOS);
    }

    pub(crate) fn ready_queue(&self, prio: Priority) -> QueueId {
        match self.sched.ready[prio.index()] {
            Some(q) => q,
            None => crate::kpanic!("(Sched) fila de prontos inexistente prio=", prio.index()),
        }
    }

    /// Recolhe `id` se estiver marcado `Killed`. `true` se recolheu.
    pub(crate) fn reclaim_if_killed(&mut self, id: PcbId) -> bool {
        if self.procs.get(id).state != ProcState::Killed {
            return false;
        }
        crate::kdebug!("(Sched) recolhendo processo morto pid=", self.procs.get(id).pid);
        self.perform_exit(id);
        true
    }

    /// Põe `id` no fim da fila da sua classe (ou o recolhe, se morto).
    pub fn schedule(&mut self, id: PcbId) {
        if self.reclaim_if_killed(id) {
            return;
        }

        let pcb = self.procs.get_mut(id);
        pcb.state = ProcState::Ready;
        let (pid, prio) = (pcb.pid, pcb.prio);

        let q = self.ready_queue(prio);
        if let Err(e) = self.queues.add(&mut self.mm, q, id.as_u32(), 0) {
            crate::kpanic!(e.as_str(), pid);
        }
        crate::ktrace!("(Sched) schedule pid=", pid, " prio=", prio.index());
    }

    /// Frente da fila não vazia de maior prioridade
    fn next_ready(&mut self) -> Option<PcbId> {
        for prio in Priority::ALL {
            let q = self.ready_queue(prio);
            if let Ok(data) = self.queues.remove(self.mm.mem_mut(), q) {
                return Some(PcbId::from_u32(data));
            }
        }
        None
    }

    /// Escolhe e instala o próximo processo corrente.
    ///
    /// Sempre existe alguém pronto (o idle, na classe mais baixa); fila
    /// toda vazia é estado impossível.
    pub fn dispatch(&mut self) {
        loop {
            let id = match self.next_ready() {
                Some(id) => id,
                None => crate::kpanic!("(Sched) nenhum processo pronto para despacho"),
            };
            if self.reclaim_if_killed(id) {
                continue;
            }

            crate::kassert!(
                2,
                self.procs.get(id).state == ProcState::Ready,
                "(Sched) processo despachado fora do estado Ready"
            );
            let pcb = self.procs.get_mut(id);
            pcb.state = ProcState::Running;
            pcb.ticks = Q_DEFAULT;
            let pid = pcb.pid;

            self.sched.current = Some(id);
            self.sched.dispatches = self.sched.dispatches.wrapping_add(1);
            crate::ktrace!("(Sched) dispatch pid=", pid);
            return;
        }
    }

    /// Processos nas filas de prontos
    pub fn ready_count(&self) -> u32 {
        Priority::ALL
            .iter()
            .map(|&prio| self.queues.length(self.mm.mem(), self.ready_queue(prio)))
            .sum()
    }

    /// Confere filas contra estados:
    /// - prontos e dormindo estão todos nas suas filas
    /// - bloqueados estão na fila de leitores da serial, que só guarda
    ///   bloqueados e mortos à espera de recolhimento
    /// - o corrente é o único Running
    /// - todo zumbi tem pai vivo na tabela
    pub fn sched_accounting_ok(&self) -> bool {
        let mut counts = [0u32; N_STATES];
        self.procs.pcount(&mut counts);
        let count = |state: ProcState| counts[state.index()];

        let sleeping = match self.clock.sleepq {
            Some(q) => self.queues.length(self.mm.mem(), q),
            None => 0,
        };
        let (mut readers_blocked, mut readers_stray) = (0u32, 0u32);
        if let Some(q) = self.sio.readers {
            for (_, data) in self.queues.entries(self.mm.mem(), q) {
                match self.procs.get(PcbId::from_u32(data)).state {
                    ProcState::Blocked => readers_blocked += 1,
                    ProcState::Killed => {}
                    _ => readers_stray += 1,
                }
            }
        }
        let orphan_zombies = self
            .procs
            .active()
            .filter(|&id| {
                let pcb = self.procs.get(id);
                pcb.state == ProcState::Zombie && self.procs.pcb_find(pcb.ppid).is_none()
            })
            .count();

        let ready_ok = self.ready_count() == count(ProcState::Ready);
        let sleep_ok = sleeping == count(ProcState::Sleeping);
        let blocked_ok = readers_stray == 0 && readers_blocked == count(ProcState::Blocked);
        let running_ok = count(ProcState::Running) == 1
            && self.sched.current.map(|id| self.procs.get(id).state) == Some(ProcState::Running);
        let zombie_ok = orphan_zombies == 0;

        if !(ready_ok && sleep_ok && blocked_ok && running_ok && zombie_ok) {
            crate::kwarn!(
                "(Sched) contabilidade: prontos=", self.ready_count(),
                " dormindo=", sleeping,
                " bloqueados=", readers_blocked,
                " correntes=", count(ProcState::Running),
                " zumbis órfãos=", orphan_zombies
            );
            return false;
        }
        true
    }

    /// Estado das filas e da tabela
    pub fn sched_dump(&self) {
        for prio in Priority::ALL {
            let q = self.ready_queue(prio);
            crate::kdebug!("(Sched) fila prio=", prio.index(), " tamanho=", self.queues.length(self.mm.mem(), q));
            self.queues.dump(self.mm.mem(), q);
        }
        if let Some(curr) = self.sched.current {
            crate::kdebug!("(Sched) corrente pid=", self.procs.get(curr).pid);
        }
        self.procs.ptable_dump();
    }
}
