//! Framework de testes do kernel
//!
//! Suites rodam no boot (feature `self_test`) e também num teste de host.
//! Cada caso recebe o contexto da suite (em geral `&mut Kernel<M>`).

use crate::core::logging::{emit_record, LogArg, P_ERROR, P_INFO, P_WARN};

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
    Skip,
}

/// Um caso de teste
pub struct TestCase<C> {
    pub name: &'static str,
    pub func: fn(&mut C) -> TestResult,
}

impl<C> TestCase<C> {
    pub const fn new(name: &'static str, func: fn(&mut C) -> TestResult) -> Self {
        Self { name, func }
    }
}

/// Placar de uma suite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuiteReport {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SuiteReport {
    pub fn merge(self, other: Self) -> Self {
        Self {
            passed: self.passed + other.passed,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Linha "rótulo + nome" (os macros só aceitam literais + inteiros)
fn log_named(prefix: &str, label: &str, name: &str) {
    if cfg!(not(feature = "no_logs")) {
        emit_record(prefix, &[LogArg::Str(label), LogArg::Str(name)]);
    }
}

/// Executa suite de testes
pub fn run_test_suite<C>(name: &str, ctx: &mut C, tests: &[TestCase<C>]) -> SuiteReport {
    log_named(P_INFO, "=== Executando suite: ", name);

    let mut report = SuiteReport::default();
    for test in tests {
        match (test.func)(ctx) {
            TestResult::Pass => {
                log_named(P_INFO, "[PASS] ", test.name);
                report.passed += 1;
            }
            TestResult::Fail => {
                log_named(P_ERROR, "[FAIL] ", test.name);
                report.failed += 1;
            }
            TestResult::Skip => {
                log_named(P_WARN, "[SKIP] ", test.name);
                report.skipped += 1;
            }
        }
    }

    crate::kinfo!("Resultados: passed=", report.passed, " failed=", report.failed);
    report
}
