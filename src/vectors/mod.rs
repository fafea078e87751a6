// src/vectors/mod.rs
//! Deterministic test-vector generation
//!
//! Every pattern is a pure function of tensor indices (or of an explicit
//! seed), so the same configuration produces bit-identical vectors on every
//! run and every platform. Patterns are serde-tagged so run files can select
//! them by name.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ConvConfig;
use crate::tensor::{BiasVector, InputTensor, Sample, WeightTensor};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("modulus must be at least 1, got {0}")]
    Modulus(i64),

    #[error("empty random range: low {low} > high {high}")]
    EmptyRange { low: i64, high: i64 },

    #[error("explicit {tensor} shape mismatch: expected {expected:?}, got {actual:?}")]
    ExplicitShape {
        tensor: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// Input sample families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputPattern {
    /// `input[c][t] = c * channel_scale + t + offset`
    AdditiveIndex { channel_scale: i64, offset: i64 },
    /// `input[c][t] = ((c + t) mod modulus) + 1`
    Modular { modulus: i64 },
    Constant { value: i64 },
    /// Uniform in `low..=high`, from a seeded generator.
    SeededRandom { seed: u64, low: i64, high: i64 },
    /// One row per channel.
    Explicit { rows: Vec<Vec<i64>> },
}

impl InputPattern {
    pub fn additive(channel_scale: i64, offset: i64) -> Self {
        InputPattern::AdditiveIndex { channel_scale, offset }
    }

    /// The bounded, repeating testbench pattern.
    pub fn modular() -> Self {
        InputPattern::Modular { modulus: 5 }
    }
}

/// Weight families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightPattern {
    /// `weight[f][c][k] = f * filter_scale + c * channel_scale + k + offset`
    AdditiveIndex {
        filter_scale: i64,
        channel_scale: i64,
        offset: i64,
    },
    /// `weight[f][c][k] = ((f + k) mod modulus) + 1`
    Modular { modulus: i64 },
    /// Plain summation kernel.
    AllOnes,
    Constant { value: i64 },
    SeededRandom { seed: u64, low: i64, high: i64 },
    /// `filter -> channel -> taps`.
    Explicit { values: Vec<Vec<Vec<i64>>> },
}

impl WeightPattern {
    pub fn modular() -> Self {
        WeightPattern::Modular { modulus: 5 }
    }

    /// Distinct per filter, channel and tap: `(f+1)*10 + (c+1)*5 + k + 1`.
    pub fn unique() -> Self {
        WeightPattern::AdditiveIndex {
            filter_scale: 10,
            channel_scale: 5,
            offset: 16,
        }
    }
}

/// Bias families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BiasPattern {
    Zero,
    /// The same scalar for every filter.
    Uniform { value: i64 },
    /// `bias[f] = (f + 1) * scale`
    FilterScaled { scale: i64 },
    SeededRandom { seed: u64, low: i64, high: i64 },
    Explicit { values: Vec<i64> },
}

/// Pattern selection for all three tensors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorSpec {
    pub input: InputPattern,
    pub weights: WeightPattern,
    /// Used only when the configuration enables bias; defaults to zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias: Option<BiasPattern>,
}

/// Tensors produced from a [`VectorSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVectors {
    pub input: InputTensor,
    pub weights: WeightTensor,
    pub bias: Option<BiasVector>,
}

impl VectorSpec {
    /// Shape-independent parameter checks.
    pub fn check(&self) -> Result<(), PatternError> {
        match &self.input {
            InputPattern::Modular { modulus } => check_modulus(*modulus)?,
            InputPattern::SeededRandom { low, high, .. } => check_range(*low, *high)?,
            _ => {}
        }
        match &self.weights {
            WeightPattern::Modular { modulus } => check_modulus(*modulus)?,
            WeightPattern::SeededRandom { low, high, .. } => check_range(*low, *high)?,
            _ => {}
        }
        if let Some(BiasPattern::SeededRandom { low, high, .. }) = &self.bias {
            check_range(*low, *high)?;
        }
        Ok(())
    }

    pub fn generate(&self, config: &ConvConfig) -> Result<GeneratedVectors, PatternError> {
        let bias = if config.use_bias() {
            let pattern = self.bias.clone().unwrap_or(BiasPattern::Zero);
            Some(generate_bias(config, &pattern)?)
        } else {
            None
        };

        Ok(GeneratedVectors {
            input: generate_input(config, &self.input)?,
            weights: generate_weights(config, &self.weights)?,
            bias,
        })
    }
}

fn check_modulus(modulus: i64) -> Result<(), PatternError> {
    if modulus < 1 {
        return Err(PatternError::Modulus(modulus));
    }
    Ok(())
}

fn check_range(low: i64, high: i64) -> Result<(), PatternError> {
    if low > high {
        return Err(PatternError::EmptyRange { low, high });
    }
    Ok(())
}

fn seeded(seed: u64, low: i64, high: i64, count: usize) -> Result<Vec<Sample>, PatternError> {
    check_range(low, high)?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok((0..count).map(|_| rng.gen_range(low..=high)).collect())
}

/// Input tensor of shape `(input_channels, temporal_length)`.
pub fn generate_input(config: &ConvConfig, pattern: &InputPattern) -> Result<InputTensor, PatternError> {
    let channels = config.input_channels();
    let length = config.temporal_length();

    let tensor = match pattern {
        InputPattern::AdditiveIndex { channel_scale, offset } => {
            InputTensor::from_fn(channels, length, |c, t| c as i64 * channel_scale + t as i64 + offset)
        }
        InputPattern::Modular { modulus } => {
            check_modulus(*modulus)?;
            InputTensor::from_fn(channels, length, |c, t| ((c + t) as i64 % modulus) + 1)
        }
        InputPattern::Constant { value } => InputTensor::from_fn(channels, length, |_, _| *value),
        InputPattern::SeededRandom { seed, low, high } => {
            let values = seeded(*seed, *low, *high, channels * length)?;
            InputTensor::from_fn(channels, length, |c, t| values[c * length + t])
        }
        InputPattern::Explicit { rows } => {
            let tensor = InputTensor::from_rows(rows.clone()).map_err(|_| explicit_input_error(rows, channels, length))?;
            if tensor.shape() != (channels, length) {
                return Err(explicit_input_error(rows, channels, length));
            }
            tensor
        }
    };
    Ok(tensor)
}

fn explicit_input_error(rows: &[Vec<i64>], channels: usize, length: usize) -> PatternError {
    PatternError::ExplicitShape {
        tensor: "input",
        expected: vec![channels, length],
        actual: vec![rows.len(), rows.first().map_or(0, Vec::len)],
    }
}

/// Weight tensor of shape `(filter_number, input_channels, kernel_size)`.
pub fn generate_weights(config: &ConvConfig, pattern: &WeightPattern) -> Result<WeightTensor, PatternError> {
    let filters = config.filter_number();
    let channels = config.input_channels();
    let taps = config.kernel_size();

    let tensor = match pattern {
        WeightPattern::AdditiveIndex {
            filter_scale,
            channel_scale,
            offset,
        } => WeightTensor::from_fn(filters, channels, taps, |f, c, k| {
            f as i64 * filter_scale + c as i64 * channel_scale + k as i64 + offset
        }),
        WeightPattern::Modular { modulus } => {
            check_modulus(*modulus)?;
            WeightTensor::from_fn(filters, channels, taps, |f, _, k| ((f + k) as i64 % modulus) + 1)
        }
        WeightPattern::AllOnes => WeightTensor::filled(filters, channels, taps, 1),
        WeightPattern::Constant { value } => WeightTensor::filled(filters, channels, taps, *value),
        WeightPattern::SeededRandom { seed, low, high } => {
            let values = seeded(*seed, *low, *high, filters * channels * taps)?;
            let mut iter = values.into_iter();
            WeightTensor::from_fn(filters, channels, taps, |_, _, _| iter.next().unwrap_or_default())
        }
        WeightPattern::Explicit { values } => {
            let expected = vec![filters, channels, taps];
            let shape_error = || PatternError::ExplicitShape {
                tensor: "weights",
                expected: expected.clone(),
                actual: vec![
                    values.len(),
                    values.first().map_or(0, Vec::len),
                    values.first().and_then(|f| f.first()).map_or(0, Vec::len),
                ],
            };
            let tensor = WeightTensor::from_nested(values.clone()).map_err(|_| shape_error())?;
            if tensor.shape() != (filters, channels, taps) {
                return Err(shape_error());
            }
            tensor
        }
    };
    Ok(tensor)
}

/// One bias per filter.
pub fn generate_bias(config: &ConvConfig, pattern: &BiasPattern) -> Result<BiasVector, PatternError> {
    let filters = config.filter_number();

    let bias = match pattern {
        BiasPattern::Zero => BiasVector::zeros(filters),
        BiasPattern::Uniform { value } => BiasVector::uniform(filters, *value),
        BiasPattern::FilterScaled { scale } => {
            BiasVector::new((0..filters).map(|f| (f as i64 + 1) * scale).collect())
        }
        BiasPattern::SeededRandom { seed, low, high } => BiasVector::new(seeded(*seed, *low, *high, filters)?),
        BiasPattern::Explicit { values } => {
            if values.len() != filters {
                return Err(PatternError::ExplicitShape {
                    tensor: "bias",
                    expected: vec![filters],
                    actual: vec![values.len()],
                });
            }
            BiasVector::new(values.clone())
        }
    };
    Ok(bias)
}
