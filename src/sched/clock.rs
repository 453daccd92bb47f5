//! Clock: tempo do sistema, sono e preempção.
//!
//! A cada tick (IRQ 0, `CLOCK_FREQUENCY` Hz):
//!
//! 1. `time += 1`
//! 2. acorda, em ordem, todo dormente cuja chave (tick de acordar) já
//!    passou; eles voltam pelo `schedule` normal
//! 3. gasta um tick do quantum do corrente; esgotado, ele vai para o fim
//!    da sua fila e outro é despachado
//! 4. EOI só depois de tudo
//!
//! A fila de sono é ordenada por `wrapping_ascending`: mesmos ticks saem
//! na ordem em que dormiram, e a volta do contador não embaralha a fila.
//! Um sono nunca passa de `MAX_SLEEP_TICKS`.

use crate::arch::x86::context::VEC_TIMER;
use crate::core::kernel::Kernel;
use crate::drivers::{pic, timer};
use crate::klib::queue::{OrderId, QueueId};
use crate::mm::phys::PhysMemory;
use crate::sched::config::{CLOCK_FREQUENCY, STATUS_INTERVAL};
use crate::sched::task::{PcbId, ProcState};

/// `true` se o tick `deadline` já chegou em `now` (com volta do contador).
pub fn deadline_reached(deadline: u32, now: u32) -> bool {
    (deadline.wrapping_sub(now) as i32) <= 0
}

pub struct Clock {
    /// Ticks desde o boot
    pub(crate) time: u32,
    pub(crate) sleepq: Option<QueueId>,
    /// Ordem da fila de sono
    pub(crate) order: Option<OrderId>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub const fn new() -> Self {
        Self {
            time: 0,
            sleepq: None,
            order: None,
        }
    }

    pub fn sleep_queue(&self) -> Option<QueueId> {
        self.sleepq
    }
}

impl<M: PhysMemory> Kernel<M> {
    pub(crate) fn clock_init(&mut self) {
        let q = match self.queues.create(&mut self.mm, self.clock.order) {
            Ok(q) => q,
            Err(e) => crate::kpanic!(e.as_str()),
        };
        self.clock.sleepq = Some(q);
        self.vectors.install(VEC_TIMER, Self::clock_isr);
        timer::init_pit(CLOCK_FREQUENCY);
        pic::unmask(pic::IRQ_TIMER);
        crate::kinfo!("(Clock) ativo, Hz=", CLOCK_FREQUENCY);
    }

    pub(crate) fn sleep_queue(&self) -> QueueId {
        match self.clock.sleepq {
            Some(q) => q,
            None => crate::kpanic!("(Clock) fila de sono inexistente"),
        }
    }

    /// Põe `id` para dormir até o tick `wakeup`. Falha de memória na fila
    /// vira um simples yield.
    pub(crate) fn sleep_until(&mut self, id: PcbId, wakeup: u32) {
        let q = self.sleep_queue();
        let pcb = self.procs.get_mut(id);
        pcb.state = ProcState::Sleeping;
        pcb.wakeup = wakeup;

        if let Err(e) = self.queues.add(&mut self.mm, q, id.as_u32(), wakeup) {
            crate::kwarn!("(Clock) fila de sono sem memória, cedendo a vez pid=", self.procs.get(id).pid);
            crate::kdebug!(e.as_str());
            self.schedule(id);
            return;
        }
        crate::ktrace!("(Clock) dormindo pid=", self.procs.get(id).pid, " até=", wakeup);
    }

    /// Handler do vetor do timer
    pub(crate) fn clock_isr(k: &mut Self, vector: u32, _code: u32) {
        k.tick();
        pic::send_eoi(vector);
    }

    /// Um tick do relógio (sem o EOI).
    pub fn tick(&mut self) {
        self.clock.time = self.clock.time.wrapping_add(1);
        let now = self.clock.time;

        // Acorda quem venceu
        let q = self.sleep_queue();
        while self.queues.peek(self.mm.mem(), q).is_some() {
            let key = self.queues.peek_key(self.mm.mem(), q);
            if !deadline_reached(key, now) {
                break;
            }
            let id = match self.queues.remove(self.mm.mem_mut(), q) {
                Ok(data) => PcbId::from_u32(data),
                Err(_) => break,
            };
            crate::ktrace!("(Clock) acordando pid=", self.procs.get(id).pid, " tick=", now);
            self.schedule(id);
        }

        // Quantum do corrente
        if let Some(curr) = self.sched.current {
            let pcb = self.procs.get_mut(curr);
            pcb.ticks = pcb.ticks.saturating_sub(1);
            if pcb.ticks < 1 && pcb.state == ProcState::Running {
                self.schedule(curr);
                self.dispatch();
            }
        }

        if STATUS_INTERVAL != 0 && now % STATUS_INTERVAL == 0 {
            crate::kdebug!("(Clock) tick=", now, " ativos=", self.procs.count());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::deadline_reached;
    use crate::sched::config::Q_DEFAULT;
    use crate::sched::task::{PcbId, Priority, ProcState};
    use crate::syscall::test_support::{booted_kernel, spawn_ready, TestKernel};

    #[test]
    fn quantum_expiry_rotates_within_the_class() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        // mesmo nível do init
        let peer = spawn_ready(&mut k, Priority::System);

        for _ in 0..Q_DEFAULT - 1 {
            k.tick();
            assert_eq!(k.current(), Some(init));
        }
        k.tick();
        assert_eq!(k.current(), Some(peer));
        assert_eq!(k.pcb(init).state, ProcState::Ready);
        assert_eq!(k.pcb(peer).ticks, Q_DEFAULT);
        assert!(k.sched_accounting_ok());
    }

    #[test]
    fn lone_process_keeps_the_cpu_with_a_fresh_quantum() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        for _ in 0..Q_DEFAULT * 3 {
            k.tick();
        }
        assert_eq!(k.current(), Some(init));
        assert_eq!(k.time(), Q_DEFAULT * 3);
        assert!(k.sched_accounting_ok());
    }

    #[test]
    fn sleepers_wake_exactly_on_their_tick() {
        let mut k = booted_kernel();
        let a = spawn_ready(&mut k, Priority::User);
        let q = k.ready_queue(Priority::User);
        k.queues.remove_specific(k.mm.mem_mut(), q, a.as_u32()).unwrap();
        k.sleep_until(a, 3);

        k.tick();
        k.tick();
        assert_eq!(k.pcb(a).state, ProcState::Sleeping);
        k.tick();
        assert_eq!(k.pcb(a).state, ProcState::Ready);
        assert!(k.sched_accounting_ok());
    }

    /// Tira `id` da fila de prontos e o põe para dormir até `wakeup`.
    fn park(k: &mut TestKernel, id: PcbId, wakeup: u32) {
        let q = k.ready_queue(Priority::User);
        k.queues.remove_specific(k.mm.mem_mut(), q, id.as_u32()).unwrap();
        k.sleep_until(id, wakeup);
    }

    #[test]
    fn wakeup_on_tick_zero_after_the_counter_wraps() {
        let mut k = booted_kernel();
        let a = spawn_ready(&mut k, Priority::User);
        let b = spawn_ready(&mut k, Priority::User);
        k.clock.time = u32::MAX;
        park(&mut k, a, u32::MAX.wrapping_add(1));
        park(&mut k, b, 2);

        k.tick();
        assert_eq!(k.time(), 0);
        assert_eq!(k.pcb(a).state, ProcState::Ready);
        assert_eq!(k.pcb(b).state, ProcState::Sleeping);
        k.tick();
        k.tick();
        assert_eq!(k.pcb(b).state, ProcState::Ready);
        assert!(k.sched_accounting_ok());
    }

    #[test]
    fn wrapped_deadline_neither_wakes_early_nor_blocks_older_ones() {
        let mut k = booted_kernel();
        let a = spawn_ready(&mut k, Priority::User);
        let c = spawn_ready(&mut k, Priority::User);
        k.clock.time = u32::MAX - 1;
        // a vence no tick 3 (depois da volta); c, que dormiu depois, no MAX
        park(&mut k, a, (u32::MAX - 1).wrapping_add(5));
        park(&mut k, c, u32::MAX);
        assert_eq!(k.queues.peek(k.mm.mem(), k.sleep_queue()), Some(c.as_u32()));

        k.tick();
        assert_eq!(k.pcb(c).state, ProcState::Ready);
        assert_eq!(k.pcb(a).state, ProcState::Sleeping);
        for _ in 0..3 {
            k.tick();
            assert_eq!(k.pcb(a).state, ProcState::Sleeping);
        }
        k.tick();
        assert_eq!(k.time(), 3);
        assert_eq!(k.pcb(a).state, ProcState::Ready);
        assert!(k.sched_accounting_ok());
    }

    #[test]
    fn deadline_comparison_survives_the_wrap() {
        assert!(deadline_reached(5, 5));
        assert!(deadline_reached(4, 5));
        assert!(!deadline_reached(6, 5));
        assert!(deadline_reached(u32::MAX, 0));
        assert!(!deadline_reached(2, u32::MAX));
    }
}
