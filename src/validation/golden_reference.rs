// src/validation/golden_reference.rs
//! Golden reference validation framework
//!
//! Named reference cases: a configuration, the vectors to drive it with,
//! and optionally a pinned expected output that the model must reproduce.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{ConfigError, ConvParams};
use crate::kernels::{Conv1dGoldenModel, EngineError};
use crate::report::ReportError;
use crate::tensor::{Accum, OutputTensor};
use crate::validation::comparator::{BatchSummary, Comparator, ComparisonReport};
use crate::vectors::{BiasPattern, InputPattern, PatternError, VectorSpec, WeightPattern};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCase {
    pub description: String,
    pub params: ConvParams,
    pub vectors: VectorSpec,
    /// One row per filter; `None` for compute-only cases.
    pub expected_output: Option<Vec<Vec<Accum>>>,
    pub tolerance: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub test_name: String,
    pub passed: bool,
    pub output_shape: Option<(usize, usize)>,
    pub reports: Vec<ComparisonReport>,
    pub error_message: Option<String>,
}

impl ValidationResult {
    pub fn failure(test_name: String, error: String) -> Self {
        Self {
            test_name,
            passed: false,
            output_shape: None,
            reports: Vec::new(),
            error_message: Some(error),
        }
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_reports(&self.reports)
    }
}

/// Failures that stop a case from producing output at all.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("no reference data found for test: {0}")]
    UnknownCase(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub struct GoldenReference {
    references: BTreeMap<String, ReferenceCase>,
}

impl GoldenReference {
    pub fn new() -> Self {
        Self {
            references: BTreeMap::new(),
        }
    }

    pub fn with_default_cases() -> Self {
        let mut reference = Self::new();
        reference.add_default_references();
        reference
    }

    fn add_default_references(&mut self) {
        self.add_pattern_references();
        self.add_worked_examples();
        self.add_unique_value_references();
    }

    /// Testbench pattern suite: I[c][t] = ((c+t) % 5) + 1, W[f][c][k] = ((f+k) % 5) + 1.
    fn add_pattern_references(&mut self) {
        let modular = VectorSpec {
            input: InputPattern::modular(),
            weights: WeightPattern::modular(),
            bias: None,
        };
        let params = |ic, len, k, filters, stride, padding| ConvParams {
            input_channels: ic,
            temporal_length: len,
            kernel_size: k,
            filter_number: filters,
            stride,
            padding,
            ..ConvParams::default()
        };

        self.add_reference("pattern_basic", ReferenceCase {
            description: "Basic convolution, kernel 3, stride 1, no padding".to_string(),
            params: params(1, 16, 3, 1, 1, 0),
            vectors: modular.clone(),
            expected_output: Some(vec![vec![14, 20, 26, 17, 13, 14, 20, 26, 17, 13, 14, 20, 26, 17]]),
            tolerance: 0,
        });

        self.add_reference("pattern_stride_2", ReferenceCase {
            description: "Stride 2 with kernel 4".to_string(),
            params: params(1, 16, 4, 1, 2, 0),
            vectors: modular.clone(),
            expected_output: Some(vec![vec![30, 30, 25, 40, 25, 30, 30]]),
            tolerance: 0,
        });

        self.add_reference("pattern_padding_2", ReferenceCase {
            description: "Zero padding of 2 on each side".to_string(),
            params: params(1, 16, 3, 1, 1, 2),
            vectors: modular.clone(),
            expected_output: Some(vec![vec![
                3, 8, 14, 20, 26, 17, 13, 14, 20, 26, 17, 13, 14, 20, 26, 17, 7, 1,
            ]]),
            tolerance: 0,
        });

        self.add_reference("pattern_kernel_7", ReferenceCase {
            description: "Kernel size 7 over 32 samples".to_string(),
            params: params(1, 32, 7, 1, 1, 0),
            vectors: modular.clone(),
            expected_output: Some(vec![vec![
                60, 53, 51, 54, 52, 60, 53, 51, 54, 52, 60, 53, 51, 54, 52, 60, 53, 51, 54, 52, 60,
                53, 51, 54, 52, 60,
            ]]),
            tolerance: 0,
        });

        self.add_reference("pattern_channels_4", ReferenceCase {
            description: "Accumulation across 4 input channels".to_string(),
            params: params(4, 16, 3, 1, 1, 0),
            vectors: modular.clone(),
            expected_output: Some(vec![vec![77, 76, 70, 64, 73, 77, 76, 70, 64, 73, 77, 76, 70, 64]]),
            tolerance: 0,
        });

        self.add_reference("pattern_channels_70", ReferenceCase {
            description: "Block-based weight loading across 70 channels".to_string(),
            params: params(70, 16, 3, 1, 1, 0),
            vectors: modular.clone(),
            expected_output: Some(vec![vec![1260; 14]]),
            tolerance: 0,
        });

        // Large tables are computed, not pinned.
        self.add_reference("pattern_complex", ReferenceCase {
            description: "64 channels, 64 filters, kernel 16, stride 2, padding 1".to_string(),
            params: params(64, 64, 16, 64, 2, 1),
            vectors: modular.clone(),
            expected_output: None,
            tolerance: 0,
        });

        self.add_reference("pattern_filters_32", ReferenceCase {
            description: "32 filters over 16 channels, kernel 4, stride 2, padding 1".to_string(),
            params: params(16, 16, 4, 32, 2, 1),
            vectors: modular,
            expected_output: None,
            tolerance: 0,
        });
    }

    fn add_worked_examples(&mut self) {
        self.add_reference("simple_sum", ReferenceCase {
            description: "Single channel [1..5] with a summation kernel".to_string(),
            params: ConvParams {
                temporal_length: 5,
                ..ConvParams::default()
            },
            vectors: VectorSpec {
                input: InputPattern::Explicit { rows: vec![vec![1, 2, 3, 4, 5]] },
                weights: WeightPattern::AllOnes,
                bias: None,
            },
            expected_output: Some(vec![vec![6, 9, 12]]),
            tolerance: 0,
        });

        // Filter 0, position 0: channel 0 window [0,1,2] = 3, channel 1 window [0,11,12] = 23.
        self.add_reference("testbench_padded", ReferenceCase {
            description: "Two channels, padding 1, all-ones weights, zero bias".to_string(),
            params: ConvParams {
                input_channels: 2,
                temporal_length: 10,
                kernel_size: 3,
                filter_number: 2,
                stride: 1,
                padding: 1,
                use_bias: true,
                ..ConvParams::default()
            },
            vectors: VectorSpec {
                input: InputPattern::additive(10, 1),
                weights: WeightPattern::AllOnes,
                bias: Some(BiasPattern::Zero),
            },
            expected_output: Some(vec![vec![26, 42, 48, 54, 60, 66, 72, 78, 84, 58]; 2]),
            tolerance: 0,
        });

        self.add_reference("testbench_first_channel", ReferenceCase {
            description: "Channel 0 only, input channel*100 + position".to_string(),
            params: ConvParams {
                input_channels: 2,
                temporal_length: 10,
                kernel_size: 3,
                filter_number: 2,
                stride: 0,
                padding: 1,
                accumulation: crate::config::AccumulationMode::FirstChannelOnly,
                ..ConvParams::default()
            },
            vectors: VectorSpec {
                input: InputPattern::additive(100, 0),
                weights: WeightPattern::AllOnes,
                bias: None,
            },
            expected_output: Some(vec![vec![1, 3, 6, 9, 12, 15, 18, 21, 24, 17]; 2]),
            tolerance: 0,
        });
    }

    /// Distinct values per channel and filter: input (c+1)*10 + t.
    fn add_unique_value_references(&mut self) {
        let unique = |bias| VectorSpec {
            input: InputPattern::additive(10, 10),
            weights: WeightPattern::unique(),
            bias: Some(bias),
        };

        self.add_reference("unique_basic", ReferenceCase {
            description: "Stride 1, padding 1, zero bias".to_string(),
            params: ConvParams {
                input_channels: 2,
                temporal_length: 8,
                kernel_size: 3,
                padding: 1,
                use_bias: true,
                ..ConvParams::default()
            },
            vectors: unique(BiasPattern::Zero),
            expected_output: Some(vec![vec![1291, 1951, 2068, 2185, 2302, 2419, 2536, 1685]]),
            tolerance: 0,
        });

        self.add_reference("unique_high_padding", ReferenceCase {
            description: "Padding 7 exceeds the 7-sample input, stride 2".to_string(),
            params: ConvParams {
                input_channels: 2,
                temporal_length: 7,
                kernel_size: 4,
                stride: 2,
                padding: 7,
                use_bias: true,
                ..ConvParams::default()
            },
            vectors: unique(BiasPattern::Zero),
            expected_output: Some(vec![vec![0, 0, 670, 2047, 2910, 3230, 1609, 0, 0]]),
            tolerance: 0,
        });

        self.add_reference("unique_filter_bias", ReferenceCase {
            description: "Three filters with bias (f+1)*100".to_string(),
            params: ConvParams {
                input_channels: 2,
                temporal_length: 8,
                kernel_size: 3,
                filter_number: 3,
                use_bias: true,
                ..ConvParams::default()
            },
            vectors: unique(BiasPattern::FilterScaled { scale: 100 }),
            expected_output: Some(vec![
                vec![2051, 2168, 2285, 2402, 2519, 2636],
                vec![3111, 3288, 3465, 3642, 3819, 3996],
                vec![4171, 4408, 4645, 4882, 5119, 5356],
            ]),
            tolerance: 0,
        });
    }

    pub fn add_reference(&mut self, name: &str, reference: ReferenceCase) {
        self.references.insert(name.to_string(), reference);
    }

    pub fn get_reference(&self, name: &str) -> Option<&ReferenceCase> {
        self.references.get(name)
    }

    /// Test names in sorted order.
    pub fn list_available_tests(&self) -> Vec<String> {
        self.references.keys().cloned().collect()
    }

    /// Build the model for a case, load its vectors and compute.
    pub fn run_case(&self, name: &str) -> Result<Conv1dGoldenModel, CaseError> {
        let case = self
            .get_reference(name)
            .ok_or_else(|| CaseError::UnknownCase(name.to_string()))?;

        let config = case.params.validate().map_err(ConfigError::from)?;
        let vectors = case.vectors.generate(&config)?;

        let mut model = Conv1dGoldenModel::new(config);
        model.load_vectors(vectors).map_err(EngineError::from)?;
        model.compute()?;
        Ok(model)
    }

    /// Judge `actual` against the case's pinned expectation.
    ///
    /// Cases without a pinned expectation only check the output shape.
    pub fn validate_output(&self, test_name: &str, actual: &OutputTensor) -> ValidationResult {
        let reference = match self.get_reference(test_name) {
            Some(ref_data) => ref_data,
            None => {
                return ValidationResult::failure(
                    test_name.to_string(),
                    format!("No reference data found for test: {}", test_name),
                )
            }
        };

        let expected_shape = match reference.params.validate() {
            Ok(config) => (config.filter_number(), config.output_length()),
            Err(e) => return ValidationResult::failure(test_name.to_string(), e.to_string()),
        };
        if actual.shape() != expected_shape {
            return ValidationResult {
                test_name: test_name.to_string(),
                passed: false,
                output_shape: Some(actual.shape()),
                reports: Vec::new(),
                error_message: Some(format!(
                    "Output shape mismatch. Expected: {:?}, Got: {:?}",
                    expected_shape,
                    actual.shape()
                )),
            };
        }

        let reports = match &reference.expected_output {
            Some(rows) => match OutputTensor::from_rows(rows.clone()) {
                Ok(expected) => Comparator::new(reference.tolerance).verify_tensor(&expected, actual),
                Err(e) => return ValidationResult::failure(test_name.to_string(), e.to_string()),
            },
            None => Vec::new(),
        };

        let summary = BatchSummary::from_reports(&reports);
        ValidationResult {
            test_name: test_name.to_string(),
            passed: summary.all_passed(),
            output_shape: Some(actual.shape()),
            error_message: (!summary.all_passed())
                .then(|| format!("Output mismatch in filters {:?}", summary.failed_filters)),
            reports,
        }
    }

    /// Run a case and validate it in one step.
    pub fn run_and_validate(&self, name: &str) -> ValidationResult {
        match self.run_case(name) {
            Ok(model) => match model.output() {
                Some(output) => self.validate_output(name, output),
                None => ValidationResult::failure(name.to_string(), "model produced no output".to_string()),
            },
            Err(e) => ValidationResult::failure(name.to_string(), e.to_string()),
        }
    }

    pub fn export_references<P: AsRef<Path>>(&self, path: P) -> Result<(), ReportError> {
        crate::report::save_json(&self.references, path.as_ref())?;
        log::info!("golden references exported to {}", path.as_ref().display());
        Ok(())
    }

    pub fn import_references<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ReportError> {
        let content = std::fs::read_to_string(path.as_ref())?;

        let references: BTreeMap<String, ReferenceCase> = serde_json::from_str(&content)
            .map_err(|e| ReportError::Serialize(e.to_string()))?;

        log::info!(
            "imported {} golden references from {}",
            references.len(),
            path.as_ref().display()
        );
        self.references.extend(references);
        Ok(())
    }
}

impl Default for GoldenReference {
    fn default() -> Self {
        Self::with_default_cases()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_reference_creation() {
        let reference = GoldenReference::with_default_cases();
        assert!(!reference.references.is_empty());
        assert!(reference.get_reference("simple_sum").is_some());
    }

    #[test]
    fn test_every_default_case_passes() {
        let reference = GoldenReference::with_default_cases();
        for name in reference.list_available_tests() {
            let result = reference.run_and_validate(&name);
            assert!(result.passed, "{} failed: {:?}", name, result.error_message);
        }
    }

    #[test]
    fn test_output_validation_failure() {
        let reference = GoldenReference::with_default_cases();
        let wrong = OutputTensor::from_rows(vec![vec![6, 10, 12]]).unwrap();

        let result = reference.validate_output("simple_sum", &wrong);
        assert!(!result.passed);
        assert_eq!(result.reports.len(), 1);
        assert_eq!(result.reports[0].first_divergence.as_ref().unwrap().index, 1);
    }

    #[test]
    fn test_shape_mismatch() {
        let reference = GoldenReference::with_default_cases();
        let short = OutputTensor::from_rows(vec![vec![6, 9]]).unwrap();

        let result = reference.validate_output("simple_sum", &short);
        assert!(!result.passed);
        assert!(result.error_message.unwrap().contains("shape"));
    }

    #[test]
    fn test_nonexistent_reference() {
        let reference = GoldenReference::with_default_cases();
        let output = OutputTensor::from_rows(vec![vec![1]]).unwrap();

        let result = reference.validate_output("nonexistent_test", &output);
        assert!(!result.passed);
        assert!(result.error_message.is_some());
        assert!(matches!(reference.run_case("nonexistent_test"), Err(CaseError::UnknownCase(_))));
    }

    #[test]
    fn test_compute_only_cases_have_expected_shape() {
        let reference = GoldenReference::with_default_cases();
        let model = reference.run_case("pattern_complex").unwrap();
        assert_eq!(model.output().unwrap().shape(), (64, 26));
    }
}
