//! # Self-tests do núcleo
//!
//! `run_all` junta as suites de boot de memória e de escalonamento.
//! `scenarios` (só em `cargo test`) exercita o núcleo de ponta a ponta
//! através de syscalls simuladas.

use crate::core::kernel::Kernel;
use crate::klib::test_framework::SuiteReport;
use crate::mm::phys::PhysMemory;


/// Roda todas as suites de boot sobre o núcleo já inicializado.
pub fn run_all<M: PhysMemory>(k: &mut Kernel<M>) -> SuiteReport {
    let report = crate::mm::test::run(k.mm_mut()).merge(crate::sched::test::run(k));
    crate::kinfo!(
        "(Test) self-tests: passed=", report.passed,
        " failed=", report.failed,
        " skipped=", report.skipped
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::test_support::booted_kernel;

    #[test]
    fn boot_self_tests_pass_on_the_simulated_machine() {
        let mut k = booted_kernel();
        let report = run_all(&mut k);
        assert_eq!(report.failed, 0);
        assert!(report.passed >= 10);
        assert!(k.sched_accounting_ok());
    }
}
