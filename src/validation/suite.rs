// src/validation/suite.rs
//! Verification suite over the golden reference cases
//!
//! Runs every registered case, keeps going past failures and collects
//! one [`ValidationResult`] per case.

use serde::{Deserialize, Serialize};

use crate::validation::golden_reference::{GoldenReference, ValidationResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub results: Vec<ValidationResult>,
    pub total: usize,
    pub passed: usize,
}

impl SuiteReport {
    pub fn from_results(results: Vec<ValidationResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total: results.len(),
            passed,
            results,
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn failed_cases(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.test_name.as_str())
            .collect()
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.passed as f64 / self.total as f64 * 100.0
    }
}

pub struct VerificationSuite {
    pub golden_reference: GoldenReference,
}

impl VerificationSuite {
    pub fn new() -> Self {
        Self {
            golden_reference: GoldenReference::with_default_cases(),
        }
    }

    pub fn with_reference(golden_reference: GoldenReference) -> Self {
        Self { golden_reference }
    }

    pub fn run_all_tests(&self) -> SuiteReport {
        self.run_matching("")
    }

    /// Run the cases whose name starts with `prefix`.
    pub fn run_matching(&self, prefix: &str) -> SuiteReport {
        log::info!("running verification suite");

        let results: Vec<ValidationResult> = self
            .golden_reference
            .list_available_tests()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| self.run_single_test(&name))
            .collect();

        let report = SuiteReport::from_results(results);
        log::info!(
            "suite finished: {}/{} passed ({:.1}%)",
            report.passed,
            report.total,
            report.pass_rate()
        );
        report
    }

    pub fn run_single_test(&self, test_name: &str) -> ValidationResult {
        log::debug!("running case {}", test_name);
        let result = self.golden_reference.run_and_validate(test_name);

        if result.passed {
            log::info!("PASSED {} shape {:?}", test_name, result.output_shape);
        } else {
            log::warn!(
                "FAILED {} - {}",
                test_name,
                result.error_message.as_deref().unwrap_or("Unknown error")
            );
        }
        result
    }

    pub fn list_available_tests(&self) -> Vec<String> {
        self.golden_reference.list_available_tests()
    }

    pub fn print_test_summary(&self, report: &SuiteReport) {
        println!("Verification Suite Summary");
        println!("==========================");
        for result in &report.results {
            let status = if result.passed { "PASS" } else { "FAIL" };
            println!("  [{}] {}", status, result.test_name);
            if let Some(message) = &result.error_message {
                println!("         {}", message);
            }
        }
        println!("Total cases: {}", report.total);
        println!("Passed cases: {} ({:.1}%)", report.passed, report.pass_rate());
        println!("Failed cases: {}", report.failed());
    }
}

impl Default for VerificationSuite {
    fn default() -> Self {
        Self::new()
    }
}
