// src/config/mod.rs
//! Convolution configuration system
//! Handles shape validation, output-length derivation and TOML run files

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::vectors::VectorSpec;

/// Which input channels feed the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulationMode {
    /// Sum over every input channel (the production datapath).
    #[default]
    AllChannels,
    /// Only channel 0 is convolved; the remaining channels are stored but ignored.
    FirstChannelOnly,
}

/// How the final accumulator is narrowed to `data_width` bits.
///
/// `Unbounded` keeps the full wide result. The other two modes are opt-in
/// models of a fixed-width accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowMode {
    #[default]
    Unbounded,
    /// Two's-complement wraparound modulo `2^data_width`.
    Wrap,
    /// Clamp into the signed `data_width`-bit range.
    Saturate,
}

impl OverflowMode {
    /// Apply this overflow policy to a finished accumulator value.
    ///
    /// Widths outside `1..128` leave the value unchanged; `validate` only
    /// admits `1..=64` for the narrowing modes.
    pub fn apply(self, value: i128, data_width: u32) -> i128 {
        if data_width == 0 || data_width >= 128 {
            return value;
        }
        match self {
            OverflowMode::Unbounded => value,
            OverflowMode::Wrap => {
                let shift = 128 - data_width;
                (value << shift) >> shift
            }
            OverflowMode::Saturate => {
                let max = (1i128 << (data_width - 1)) - 1;
                let min = -(1i128 << (data_width - 1));
                value.clamp(min, max)
            }
        }
    }
}

/// Shape and configuration violations.
///
/// Raised where a shape is declared (configuration validation or tensor
/// assignment), never deferred to computation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("{field} must be at least 1, got {value}")]
    BelowMinimum { field: &'static str, value: i64 },

    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: i64 },

    #[error("data_width must be in 1..=64 for {mode:?} overflow handling, got {width}")]
    DataWidth { width: u32, mode: OverflowMode },

    #[error("{tensor} shape mismatch: expected {expected:?}, got {actual:?}")]
    Mismatch {
        tensor: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("{axis} index {index} out of range (must be < {bound})")]
    IndexOutOfRange {
        axis: &'static str,
        index: usize,
        bound: usize,
    },

    #[error("padded length overflows: temporal_length {temporal_length} + 2 * padding {padding}")]
    PaddedLength { temporal_length: i64, padding: i64 },

    #[error("{tensor} rows are ragged: row {row} has length {actual}, expected {expected}")]
    Ragged {
        tensor: &'static str,
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Raw configuration fields, as written in a run file or built in code.
///
/// Fields are signed so that negative values reach `validate` and are
/// reported, instead of being rejected by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvParams {
    pub input_channels: i64,
    pub temporal_length: i64,
    pub kernel_size: i64,
    pub filter_number: i64,
    pub stride: i64,
    pub padding: i64,
    pub use_bias: bool,
    pub data_width: u32,
    pub accumulation: AccumulationMode,
    pub overflow: OverflowMode,
}

impl Default for ConvParams {
    fn default() -> Self {
        Self {
            input_channels: 1,
            temporal_length: 16,
            kernel_size: 3,
            filter_number: 1,
            stride: 1,
            padding: 0,
            use_bias: false,
            data_width: 16,
            accumulation: AccumulationMode::AllChannels,
            overflow: OverflowMode::Unbounded,
        }
    }
}

impl ConvParams {
    /// Validate and normalize into an immutable [`ConvConfig`].
    pub fn validate(&self) -> Result<ConvConfig, ShapeError> {
        let input_channels = at_least_one("input_channels", self.input_channels)?;
        let kernel_size = at_least_one("kernel_size", self.kernel_size)?;
        let filter_number = at_least_one("filter_number", self.filter_number)?;
        let temporal_length = non_negative("temporal_length", self.temporal_length)?;
        let padding = non_negative("padding", self.padding)?;
        if self
            .padding
            .checked_mul(2)
            .and_then(|p| p.checked_add(self.temporal_length))
            .is_none()
        {
            return Err(ShapeError::PaddedLength {
                temporal_length: self.temporal_length,
                padding: self.padding,
            });
        }
        let stride = match non_negative("stride", self.stride)? {
            // Reserved hardware encoding: a zero stride field means unit stride.
            0 => {
                log::warn!("stride 0 normalized to 1");
                1
            }
            s => s,
        };

        if self.overflow != OverflowMode::Unbounded && !(1..=64).contains(&self.data_width) {
            return Err(ShapeError::DataWidth {
                width: self.data_width,
                mode: self.overflow,
            });
        }

        Ok(ConvConfig {
            input_channels,
            temporal_length,
            kernel_size,
            filter_number,
            stride,
            padding,
            use_bias: self.use_bias,
            data_width: self.data_width,
            accumulation: self.accumulation,
            overflow: self.overflow,
        })
    }
}

fn at_least_one(field: &'static str, value: i64) -> Result<usize, ShapeError> {
    if value < 1 {
        return Err(ShapeError::BelowMinimum { field, value });
    }
    Ok(value as usize)
}

fn non_negative(field: &'static str, value: i64) -> Result<usize, ShapeError> {
    if value < 0 {
        return Err(ShapeError::Negative { field, value });
    }
    Ok(value as usize)
}

/// Output length of a 1-D convolution.
///
/// `floor(max(0, L + 2P - K) / S) + 1`. The clamp models the hardware
/// saturating a negative window count to zero, so the result is never below 1.
pub fn output_length(temporal_length: usize, padding: usize, kernel_size: usize, stride: usize) -> usize {
    let padded = temporal_length.saturating_add(padding.saturating_mul(2));
    let numerator = padded.saturating_sub(kernel_size);
    numerator / stride.max(1) + 1
}

/// A validated convolution configuration. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvConfig {
    input_channels: usize,
    temporal_length: usize,
    kernel_size: usize,
    filter_number: usize,
    stride: usize,
    padding: usize,
    use_bias: bool,
    data_width: u32,
    accumulation: AccumulationMode,
    overflow: OverflowMode,
}

impl ConvConfig {
    /// Shorthand for the common case: no bias, default data width, all channels.
    pub fn new(
        input_channels: i64,
        temporal_length: i64,
        kernel_size: i64,
        filter_number: i64,
        stride: i64,
        padding: i64,
    ) -> Result<Self, ShapeError> {
        ConvParams {
            input_channels,
            temporal_length,
            kernel_size,
            filter_number,
            stride,
            padding,
            ..ConvParams::default()
        }
        .validate()
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn temporal_length(&self) -> usize {
        self.temporal_length
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn filter_number(&self) -> usize {
        self.filter_number
    }

    /// Effective stride (a configured 0 reads back as 1).
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn use_bias(&self) -> bool {
        self.use_bias
    }

    pub fn data_width(&self) -> u32 {
        self.data_width
    }

    pub fn accumulation(&self) -> AccumulationMode {
        self.accumulation
    }

    pub fn overflow(&self) -> OverflowMode {
        self.overflow
    }

    /// Derived from the current fields on every call.
    pub fn output_length(&self) -> usize {
        output_length(self.temporal_length, self.padding, self.kernel_size, self.stride)
    }

    pub fn padded_length(&self) -> usize {
        self.temporal_length + 2 * self.padding
    }

    /// Channel loop bound used by the engine.
    pub fn active_channels(&self) -> usize {
        match self.accumulation {
            AccumulationMode::AllChannels => self.input_channels,
            AccumulationMode::FirstChannelOnly => 1,
        }
    }

    /// Back to raw fields, e.g. for serialization.
    pub fn params(&self) -> ConvParams {
        ConvParams {
            input_channels: self.input_channels as i64,
            temporal_length: self.temporal_length as i64,
            kernel_size: self.kernel_size as i64,
            filter_number: self.filter_number as i64,
            stride: self.stride as i64,
            padding: self.padding as i64,
            use_bias: self.use_bias,
            data_width: self.data_width,
            accumulation: self.accumulation,
            overflow: self.overflow,
        }
    }
}

/// Expectations attached to a run file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySpec {
    pub tolerance: u64,
    /// One row per filter. When absent the run only computes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Vec<Vec<i64>>>,
}

/// A complete run file: configuration, test vectors and expectations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub conv: ConvParams,
    pub vectors: VectorSpec,
    #[serde(default)]
    pub verify: VerifySpec,
}

impl RunConfig {
    /// Load run configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// The worked testbench example: two channels, padding 1, all-ones weights.
    pub fn default_run() -> Self {
        use crate::vectors::{BiasPattern, InputPattern, WeightPattern};

        Self {
            conv: ConvParams {
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
            verify: VerifySpec {
                tolerance: 0,
                expected: Some(vec![
                    vec![26, 42, 48, 54, 60, 66, 72, 78, 84, 58],
                    vec![26, 42, 48, 54, 60, 66, 72, 78, 84, 58],
                ]),
            },
        }
    }

    /// Validate the convolution fields and the vector patterns together.
    pub fn validate(&self) -> Result<ConvConfig, ConfigError> {
        let config = self.conv.validate()?;
        self.vectors
            .check()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if let Some(expected) = &self.verify.expected {
            if expected.len() != config.filter_number() {
                return Err(ConfigError::Validation(format!(
                    "expected output has {} rows but filter_number is {}",
                    expected.len(),
                    config.filter_number()
                )));
            }
        }

        Ok(config)
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml_str = self.to_toml_string()?;
        std::fs::write(path.as_ref(), toml_str)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}
