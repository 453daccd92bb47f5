//! # Testes do Escalonador
//!
//! Suite de boot sobre o núcleo vivo. Nenhum caso mexe em processos
//! reais: filas e stacks usados são criados e devolvidos no próprio caso.

use crate::arch::x86::context::Context;
use crate::arch::x86::trap::exit_trampoline;
use crate::core::kernel::Kernel;
use crate::klib::test_framework::{run_test_suite, SuiteReport, TestCase, TestResult};
use crate::mm::config::STACK_SIZE;
use crate::mm::phys::PhysMemory;
use crate::sched::config::N_PROCS;
use crate::sched::stack::{Stack, StackManager};
use crate::sched::task::Priority;
use alloc::vec;

pub fn cases<M: PhysMemory>() -> [TestCase<Kernel<M>>; 4] {
    [
        TestCase::new("sched_accounting", test_accounting::<M>),
        TestCase::new("sched_pcb_pool", test_pcb_pool::<M>),
        TestCase::new("sched_ordered_queue", test_ordered_queue::<M>),
        TestCase::new("sched_stack_setup", test_stack_setup::<M>),
    ]
}

pub fn run<M: PhysMemory>(k: &mut Kernel<M>) -> SuiteReport {
    run_test_suite("sched", k, &cases::<M>())
}

/// Filas de prontos, corrente e estados batem.
fn test_accounting<M: PhysMemory>(k: &mut Kernel<M>) -> TestResult {
    if !k.sched_accounting_ok() {
        k.sched_dump();
        return TestResult::Fail;
    }
    if k.current_pcb().map(|p| p.prio) != Some(Priority::System) {
        crate::kwarn!("(Sched) corrente no boot não é o init");
        return TestResult::Skip;
    }
    TestResult::Pass
}

fn test_pcb_pool<M: PhysMemory>(k: &mut Kernel<M>) -> TestResult {
    let procs = k.procs();
    if procs.free_pcbs() + procs.count() == N_PROCS {
        TestResult::Pass
    } else {
        crate::kerror!("(Proc) PCBs perdidos, livres=", procs.free_pcbs(), " ativos=", procs.count());
        TestResult::Fail
    }
}

/// Fila com a ordem do clock: chaves saem crescentes, empates em FIFO.
fn test_ordered_queue<M: PhysMemory>(k: &mut Kernel<M>) -> TestResult {
    let order = match k.clock.order {
        Some(order) => order,
        None => return TestResult::Skip,
    };
    let q = match k.queues.create(&mut k.mm, Some(order)) {
        Ok(q) => q,
        Err(_) => return TestResult::Skip,
    };

    let mut ok = true;
    for (data, key) in [(1, 30), (2, 10), (3, 20), (4, 10)] {
        ok &= k.queues.add(&mut k.mm, q, data, key).is_ok();
    }
    ok &= k.queues.is_consistent(k.mm.mem(), q);
    ok &= k.queues.peek_key(k.mm.mem(), q) == 10;

    let mut drained = vec![];
    while let Ok(data) = k.queues.remove(k.mm.mem_mut(), q) {
        drained.push(data);
    }
    k.queues.delete(k.mm.mem_mut(), q);

    ok &= drained == [2, 4, 3, 1];
    if ok {
        TestResult::Pass
    } else {
        TestResult::Fail
    }
}

/// Stack avulsa: argv e contexto inicial montados onde devem.
fn test_stack_setup<M: PhysMemory>(k: &mut Kernel<M>) -> TestResult {
    let in_use = k.stacks().in_use();
    let stack = match k.stacks.stack_alloc(&mut k.mm, None) {
        Ok(stack) => stack,
        Err(_) => return TestResult::Skip,
    };
    let args = [b"self".to_vec(), b"test".to_vec()];
    let entry = 0x0040_0000;

    let ok = match StackManager::stack_setup(k.mm.mem_mut(), stack, entry, &args) {
        Ok(ctx_at) => {
            let mem = k.mm.mem();
            let ctx = Context::load(mem, stack.phys(ctx_at));
            let sp = Stack::offset_of(ctx.esp).unwrap_or(STACK_SIZE);
            ctx.eip == entry
                && sp < STACK_SIZE
                && mem.read_u32(stack.phys(sp)) == exit_trampoline()
                && mem.read_u32(stack.phys(sp + 4)) == 2
        }
        Err(_) => false,
    };

    k.stacks.stack_free(k.mm.mem_mut(), stack);
    if ok && k.stacks().in_use() == in_use {
        TestResult::Pass
    } else {
        TestResult::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::test_support::booted_kernel;

    #[test]
    fn scheduler_suite_passes_on_a_booted_kernel() {
        let mut k = booted_kernel();
        let live = k.queues().live_queues();
        let report = run(&mut k);
        assert_eq!(report.failed, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(k.queues().live_queues(), live);
        assert!(k.sched_accounting_ok());
    }
}
