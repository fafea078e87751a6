// src/validation/comparator.rs
//! Element-wise comparison of integer sequences
//!
//! Mismatches are values, not errors: every call returns a
//! [`ComparisonReport`] so a batch keeps going past failing filters.

use serde::{Deserialize, Serialize};

use crate::tensor::{Accum, OutputTensor};
use crate::trace::DecodedTrace;

/// First position where a comparison went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub index: usize,
    /// `None` when the expected sequence ended first.
    pub expected: Option<Accum>,
    /// `None` when the actual sequence ended first.
    pub actual: Option<Accum>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub filter_id: usize,
    pub expected: Vec<Accum>,
    pub actual: Vec<Accum>,
    /// Empty when the lengths differ.
    pub elementwise_abs_diff: Vec<u128>,
    pub max_diff: u128,
    pub tolerance: u64,
    pub passed: bool,
    pub first_divergence: Option<Divergence>,
    pub error_message: Option<String>,
}

/// Compare one filter's sequence. Default tolerance is 0: bit-exact.
pub fn verify(filter_id: usize, expected: &[Accum], actual: &[Accum], tolerance: u64) -> ComparisonReport {
    if expected.len() != actual.len() {
        let index = expected
            .iter()
            .zip(actual)
            .position(|(e, a)| e != a)
            .unwrap_or_else(|| expected.len().min(actual.len()));

        return ComparisonReport {
            filter_id,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
            elementwise_abs_diff: Vec::new(),
            max_diff: 0,
            tolerance,
            passed: false,
            first_divergence: Some(Divergence {
                index,
                expected: expected.get(index).copied(),
                actual: actual.get(index).copied(),
            }),
            error_message: Some(format!(
                "Length mismatch - expected {}, got {}",
                expected.len(),
                actual.len()
            )),
        };
    }

    let diffs: Vec<u128> = expected.iter().zip(actual).map(|(e, a)| e.abs_diff(*a)).collect();
    let max_diff = diffs.iter().copied().max().unwrap_or(0);
    let passed = max_diff <= u128::from(tolerance);

    let first_divergence = diffs
        .iter()
        .position(|&d| d > u128::from(tolerance))
        .map(|index| Divergence {
            index,
            expected: Some(expected[index]),
            actual: Some(actual[index]),
        });

    let error_message = (!passed).then(|| {
        format!("Max difference {} exceeds tolerance {}", max_diff, tolerance)
    });

    ComparisonReport {
        filter_id,
        expected: expected.to_vec(),
        actual: actual.to_vec(),
        elementwise_abs_diff: diffs,
        max_diff,
        tolerance,
        passed,
        first_divergence,
        error_message,
    }
}

/// How trace samples line up with output positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceAlignment {
    /// The n-th recorded change is output position n.
    ChangeOrder,
    /// Output position n is the value held at `start + n * period`.
    Sampled { start: u64, period: u64 },
}

/// Pass/fail tally over a batch of reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub failed_filters: Vec<usize>,
}

impl BatchSummary {
    pub fn from_reports(reports: &[ComparisonReport]) -> Self {
        let failed_filters: Vec<usize> = reports
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.filter_id)
            .collect();

        Self {
            total: reports.len(),
            passed: reports.len() - failed_filters.len(),
            failed: failed_filters.len(),
            failed_filters,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Comparator with a fixed tolerance, for whole tensors and traces.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    pub tolerance: u64,
}

impl Comparator {
    pub fn new(tolerance: u64) -> Self {
        Self { tolerance }
    }

    pub fn verify(&self, filter_id: usize, expected: &[Accum], actual: &[Accum]) -> ComparisonReport {
        verify(filter_id, expected, actual, self.tolerance)
    }

    /// One report per filter of `expected`. Filters missing from `actual`
    /// compare against an empty sequence.
    pub fn verify_tensor(&self, expected: &OutputTensor, actual: &OutputTensor) -> Vec<ComparisonReport> {
        (0..expected.filters())
            .map(|f| {
                let actual_row: &[Accum] = if f < actual.filters() { actual.filter(f) } else { &[] };
                self.verify(f, expected.filter(f), actual_row)
            })
            .collect()
    }

    /// Compare golden output against a decoded hardware trace.
    ///
    /// Trace field `f` carries filter `f`. Filters beyond the bus dimension
    /// compare against an empty sequence and fail.
    pub fn verify_trace(
        &self,
        golden: &OutputTensor,
        trace: &DecodedTrace,
        alignment: TraceAlignment,
    ) -> Vec<ComparisonReport> {
        (0..golden.filters())
            .map(|f| {
                let raw = match alignment {
                    TraceAlignment::ChangeOrder => trace.field_changes(f),
                    TraceAlignment::Sampled { start, period } => {
                        trace.field_sampled(f, start, period, golden.len())
                    }
                };
                let actual: Vec<Accum> = raw.into_iter().map(Accum::from).collect();
                self.verify(f, golden.filter(f), &actual)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(entries: Vec<(u64, Vec<i64>)>) -> DecodedTrace {
        let mut trace = DecodedTrace::new();
        for (time, values) in entries {
            trace.insert(time, values);
        }
        trace
    }

    #[test]
    fn test_exact_match() {
        let report = verify(0, &[6, 9, 12], &[6, 9, 12], 0);
        assert!(report.passed);
        assert_eq!(report.max_diff, 0);
        assert_eq!(report.elementwise_abs_diff, vec![0, 0, 0]);
        assert!(report.first_divergence.is_none());
        assert!(report.error_message.is_none());
    }

    #[test]
    fn test_tolerance_boundary() {
        let strict = verify(2, &[6, 9, 12], &[6, 11, 12], 0);
        assert!(!strict.passed);
        assert_eq!(strict.max_diff, 2);
        assert_eq!(
            strict.first_divergence,
            Some(Divergence { index: 1, expected: Some(9), actual: Some(11) })
        );

        assert!(verify(2, &[6, 9, 12], &[6, 11, 12], 2).passed);
        assert!(!verify(2, &[6, 9, 12], &[6, 11, 12], 1).passed);
    }

    #[test]
    fn test_length_mismatch_is_reported() {
        let report = verify(1, &[6, 9, 12], &[6, 9], 100);
        assert!(!report.passed);
        assert!(report.elementwise_abs_diff.is_empty());
        assert_eq!(
            report.first_divergence,
            Some(Divergence { index: 2, expected: Some(12), actual: None })
        );
        assert!(report.error_message.unwrap().contains("Length mismatch"));
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let report = verify(0, &[i128::MIN], &[i128::MAX], 0);
        assert_eq!(report.max_diff, u128::MAX);
        assert!(!report.passed);
    }

    #[test]
    fn test_batch_summary() {
        let reports = vec![
            verify(0, &[1], &[1], 0),
            verify(1, &[1], &[2], 0),
            verify(2, &[1], &[], 0),
        ];
        let summary = BatchSummary::from_reports(&reports);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed_filters, vec![1, 2]);
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_verify_trace_change_order() {
        let golden = OutputTensor::from_rows(vec![vec![6, 9, 12], vec![-1, -2, -3]]).unwrap();
        let trace = trace(vec![(10, vec![6, -1]), (20, vec![9, -2]), (30, vec![12, -3])]);

        let reports = Comparator::new(0).verify_trace(&golden, &trace, TraceAlignment::ChangeOrder);
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.passed));
    }

    #[test]
    fn test_verify_trace_sampled_holds_repeated_values() {
        // Positions 1 and 2 are equal, so the bus changes only twice.
        let golden = OutputTensor::from_rows(vec![vec![5, 7, 7, 4]]).unwrap();
        let trace = trace(vec![(0, vec![5]), (10, vec![7]), (30, vec![4])]);

        let comparator = Comparator::default();
        let by_change = comparator.verify_trace(&golden, &trace, TraceAlignment::ChangeOrder);
        assert!(!by_change[0].passed);

        let sampled = comparator.verify_trace(
            &golden,
            &trace,
            TraceAlignment::Sampled { start: 0, period: 10 },
        );
        assert!(sampled[0].passed);
    }

    #[test]
    fn test_verify_trace_narrow_bus() {
        let golden = OutputTensor::from_rows(vec![vec![1], vec![2]]).unwrap();
        let trace = trace(vec![(0, vec![1])]);
        let reports = Comparator::default().verify_trace(&golden, &trace, TraceAlignment::ChangeOrder);
        assert!(reports[0].passed);
        assert!(!reports[1].passed);
    }
}
