// src/kernels/conv1d.rs
//! 1D convolution golden model
//!
//! Reproduces the accelerator's functional datapath: optional zero padding on
//! the temporal axis, an accumulator seeded with the filter bias, and a
//! channel-major then tap-order multiply-accumulate per output position.

use std::borrow::Cow;

use crate::config::{ConvConfig, OverflowMode, ShapeError};
use crate::kernels::{ConvMetrics, EngineError};
use crate::tensor::{Accum, BiasVector, InputTensor, OutputTensor, Sample, WeightTensor};
use crate::validation::comparator::{verify, ComparisonReport};
use crate::vectors::GeneratedVectors;

/// Stateless convolution.
///
/// Shapes are checked against `config` up front. `bias` is required when the
/// configuration enables bias and ignored otherwise.
pub fn conv1d(
    input: &InputTensor,
    weights: &WeightTensor,
    bias: Option<&BiasVector>,
    config: &ConvConfig,
) -> Result<OutputTensor, EngineError> {
    check_input(config, input)?;
    check_weights(config, weights)?;
    let bias = if config.use_bias() {
        let bias = bias.ok_or(EngineError::MissingData("bias"))?;
        check_bias(config, bias)?;
        Some(bias)
    } else {
        None
    };

    convolve(input, weights, bias, config)
}

/// The accumulation loop. Callers have already validated shapes.
///
/// Under `Wrap` the sum is taken modulo 2^128, which agrees with the final
/// reduction to `data_width` bits. Other modes fail with
/// [`EngineError::Overflow`] instead of leaving the 128-bit range.
fn convolve(
    input: &InputTensor,
    weights: &WeightTensor,
    bias: Option<&BiasVector>,
    config: &ConvConfig,
) -> Result<OutputTensor, EngineError> {
    let padding = config.padding();
    let padded: Cow<'_, InputTensor> = if padding > 0 {
        log::debug!("padding {} zero samples on each side of {} channels", padding, input.channels());
        Cow::Owned(input.padded(padding))
    } else {
        Cow::Borrowed(input)
    };

    let filters = config.filter_number();
    let output_length = config.output_length();
    let stride = config.stride();
    let channels = config.active_channels();
    let overflow = config.overflow();
    let data_width = config.data_width();
    let wrapping = overflow == OverflowMode::Wrap;

    let mut data = Vec::with_capacity(filters * output_length);
    for f in 0..filters {
        // Accumulator seed, once per filter, before any summation.
        let seed = bias.map_or(0, |b| Accum::from(b.get(f)));
        let mut accumulators = vec![seed; output_length];

        for (t, acc) in accumulators.iter_mut().enumerate() {
            let window_start = t * stride;
            for c in 0..channels {
                let row = padded.channel(c);
                for (k, &w) in weights.taps(f, c).iter().enumerate() {
                    // Only reachable past the end when the output-length clamp applied.
                    let x: Sample = row.get(window_start + k).copied().unwrap_or(0);
                    // An i64 x i64 product always fits in i128; only the sum can overflow.
                    let product = Accum::from(x) * Accum::from(w);
                    *acc = if wrapping {
                        acc.wrapping_add(product)
                    } else {
                        acc.checked_add(product)
                            .ok_or(EngineError::Overflow { filter: f, position: t })?
                    };
                }
            }
        }

        data.extend(accumulators.into_iter().map(|acc| overflow.apply(acc, data_width)));
    }

    Ok(OutputTensor::from_raw(filters, output_length, data))
}

fn check_input(config: &ConvConfig, input: &InputTensor) -> Result<(), ShapeError> {
    let expected = (config.input_channels(), config.temporal_length());
    if input.shape() != expected {
        return Err(ShapeError::Mismatch {
            tensor: "input",
            expected: vec![expected.0, expected.1],
            actual: vec![input.channels(), input.len()],
        });
    }
    Ok(())
}

fn check_weights(config: &ConvConfig, weights: &WeightTensor) -> Result<(), ShapeError> {
    let expected = (config.filter_number(), config.input_channels(), config.kernel_size());
    let actual = weights.shape();
    if actual != expected {
        return Err(ShapeError::Mismatch {
            tensor: "weights",
            expected: vec![expected.0, expected.1, expected.2],
            actual: vec![actual.0, actual.1, actual.2],
        });
    }
    Ok(())
}

fn check_bias(config: &ConvConfig, bias: &BiasVector) -> Result<(), ShapeError> {
    if bias.len() != config.filter_number() {
        return Err(ShapeError::Mismatch {
            tensor: "bias",
            expected: vec![config.filter_number()],
            actual: vec![bias.len()],
        });
    }
    Ok(())
}

/// Stateful golden model: one configuration, its tensors, and the last output.
///
/// Tensors are shape-checked when assigned. `compute` always reads the
/// current tensors and replaces the stored output.
#[derive(Debug, Clone)]
pub struct Conv1dGoldenModel {
    config: ConvConfig,
    input: Option<InputTensor>,
    weights: Option<WeightTensor>,
    bias: Option<BiasVector>,
    output: Option<OutputTensor>,
}

impl Conv1dGoldenModel {
    pub fn new(config: ConvConfig) -> Self {
        Self {
            config,
            input: None,
            weights: None,
            bias: None,
            output: None,
        }
    }

    pub fn config(&self) -> &ConvConfig {
        &self.config
    }

    pub fn set_input(&mut self, input: InputTensor) -> Result<(), ShapeError> {
        check_input(&self.config, &input)?;
        self.input = Some(input);
        Ok(())
    }

    pub fn set_weights(&mut self, weights: WeightTensor) -> Result<(), ShapeError> {
        check_weights(&self.config, &weights)?;
        self.weights = Some(weights);
        Ok(())
    }

    pub fn set_bias(&mut self, bias: BiasVector) -> Result<(), ShapeError> {
        check_bias(&self.config, &bias)?;
        if !self.config.use_bias() {
            log::warn!("bias assigned while use_bias is false; it will not be applied");
        }
        self.bias = Some(bias);
        Ok(())
    }

    /// Load one input channel. Unloaded channels read as zero.
    pub fn load_input_channel(&mut self, channel: usize, data: &[Sample]) -> Result<(), ShapeError> {
        let (channels, length) = (self.config.input_channels(), self.config.temporal_length());
        self.input
            .get_or_insert_with(|| InputTensor::zeros(channels, length))
            .set_channel(channel, data)
    }

    /// Load the taps of one `(filter, channel)` pair. Unloaded taps read as zero.
    pub fn load_weight_taps(&mut self, filter: usize, channel: usize, taps: &[Sample]) -> Result<(), ShapeError> {
        let shape = (
            self.config.filter_number(),
            self.config.input_channels(),
            self.config.kernel_size(),
        );
        self.weights
            .get_or_insert_with(|| WeightTensor::zeros(shape.0, shape.1, shape.2))
            .set_taps(filter, channel, taps)
    }

    /// Assign everything a generator produced.
    pub fn load_vectors(&mut self, vectors: GeneratedVectors) -> Result<(), ShapeError> {
        self.set_input(vectors.input)?;
        self.set_weights(vectors.weights)?;
        if let Some(bias) = vectors.bias {
            self.set_bias(bias)?;
        }
        Ok(())
    }

    pub fn input(&self) -> Option<&InputTensor> {
        self.input.as_ref()
    }

    pub fn weights(&self) -> Option<&WeightTensor> {
        self.weights.as_ref()
    }

    pub fn bias(&self) -> Option<&BiasVector> {
        self.bias.as_ref()
    }

    /// Run the convolution and store the result.
    pub fn compute(&mut self) -> Result<&OutputTensor, EngineError> {
        let input = self.input.as_ref().ok_or(EngineError::MissingData("input"))?;
        let weights = self.weights.as_ref().ok_or(EngineError::MissingData("weights"))?;
        let bias = if self.config.use_bias() {
            Some(self.bias.as_ref().ok_or(EngineError::MissingData("bias"))?)
        } else {
            None
        };

        let output = convolve(input, weights, bias, &self.config)?;
        log::debug!(
            "computed {} filters x {} positions",
            output.filters(),
            output.len()
        );
        Ok(self.output.insert(output))
    }

    /// Output of the last `compute`, if any.
    pub fn output(&self) -> Option<&OutputTensor> {
        self.output.as_ref()
    }

    pub fn filter_output(&self, filter: usize) -> Option<&[Accum]> {
        self.output
            .as_ref()
            .filter(|out| filter < out.filters())
            .map(|out| out.filter(filter))
    }

    /// Compare one filter of the stored output against `expected`.
    pub fn verify_filter(
        &self,
        filter: usize,
        expected: &[Accum],
        tolerance: u64,
    ) -> Result<ComparisonReport, EngineError> {
        let output = self.output.as_ref().ok_or(EngineError::MissingData("output"))?;
        if filter >= output.filters() {
            return Err(ShapeError::IndexOutOfRange {
                axis: "filter",
                index: filter,
                bound: output.filters(),
            }
            .into());
        }
        Ok(verify(filter, expected, output.filter(filter), tolerance))
    }

    pub fn metrics(&self) -> ConvMetrics {
        ConvMetrics::for_config(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccumulationMode, ConvParams, OverflowMode};

    fn simple_model() -> Conv1dGoldenModel {
        let mut model = Conv1dGoldenModel::new(ConvConfig::new(1, 5, 3, 1, 1, 0).unwrap());
        model.load_input_channel(0, &[1, 2, 3, 4, 5]).unwrap();
        model.load_weight_taps(0, 0, &[1, 1, 1]).unwrap();
        model
    }

    #[test]
    fn test_simple_summation() {
        let mut model = simple_model();
        let output = model.compute().unwrap();
        assert_eq!(output.filter(0), &[6, 9, 12]);
        assert_eq!(model.filter_output(0), Some(&[6, 9, 12][..]));
        assert_eq!(model.filter_output(1), None);
    }

    #[test]
    fn test_missing_data() {
        let mut model = Conv1dGoldenModel::new(ConvConfig::new(1, 5, 3, 1, 1, 0).unwrap());
        assert_eq!(model.compute().unwrap_err(), EngineError::MissingData("input"));

        model.load_input_channel(0, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(model.compute().unwrap_err(), EngineError::MissingData("weights"));
    }

    #[test]
    fn test_missing_bias_when_enabled() {
        let config = ConvParams { temporal_length: 5, use_bias: true, ..ConvParams::default() }
            .validate()
            .unwrap();
        let mut model = Conv1dGoldenModel::new(config);
        model.load_input_channel(0, &[1, 2, 3, 4, 5]).unwrap();
        model.load_weight_taps(0, 0, &[1, 1, 1]).unwrap();

        assert_eq!(model.compute().unwrap_err(), EngineError::MissingData("bias"));

        model.set_bias(BiasVector::uniform(1, 10)).unwrap();
        assert_eq!(model.compute().unwrap().filter(0), &[16, 19, 22]);
    }

    #[test]
    fn test_bias_ignored_when_disabled() {
        let mut model = simple_model();
        model.set_bias(BiasVector::uniform(1, 10)).unwrap();
        assert_eq!(model.compute().unwrap().filter(0), &[6, 9, 12]);
    }

    #[test]
    fn test_shape_checked_at_assignment() {
        let mut model = Conv1dGoldenModel::new(ConvConfig::new(2, 4, 3, 1, 1, 0).unwrap());

        let err = model.set_input(InputTensor::zeros(1, 4)).unwrap_err();
        assert_eq!(
            err,
            ShapeError::Mismatch { tensor: "input", expected: vec![2, 4], actual: vec![1, 4] }
        );
        assert!(model.set_weights(WeightTensor::zeros(1, 2, 2)).is_err());
        assert!(model.set_bias(BiasVector::zeros(3)).is_err());
        assert!(model.input().is_none());
    }

    #[test]
    fn test_recompute_reads_current_tensors() {
        let mut model = simple_model();
        model.compute().unwrap();

        model.load_weight_taps(0, 0, &[2, 0, 0]).unwrap();
        assert_eq!(model.compute().unwrap().filter(0), &[2, 4, 6]);
        assert_eq!(model.output().unwrap().filter(0), &[2, 4, 6]);
    }

    #[test]
    fn test_window_past_padded_input_reads_zero() {
        let mut model = Conv1dGoldenModel::new(ConvConfig::new(1, 2, 5, 1, 1, 0).unwrap());
        model.load_input_channel(0, &[3, 4]).unwrap();
        model.load_weight_taps(0, 0, &[1, 1, 1, 1, 1]).unwrap();
        assert_eq!(model.compute().unwrap().filter(0), &[7]);
    }

    #[test]
    fn test_first_channel_only() {
        let config = ConvParams {
            input_channels: 2,
            temporal_length: 10,
            kernel_size: 3,
            filter_number: 2,
            padding: 1,
            accumulation: AccumulationMode::FirstChannelOnly,
            ..ConvParams::default()
        }
        .validate()
        .unwrap();
        let input = InputTensor::from_fn(2, 10, |c, t| (c * 100 + t) as i64);
        let weights = WeightTensor::filled(2, 2, 3, 1);

        let output = conv1d(&input, &weights, None, &config).unwrap();
        assert_eq!(output.filter(0), &[1, 3, 6, 9, 12, 15, 18, 21, 24, 17]);
        assert_eq!(output.filter(0), output.filter(1));
    }

    #[test]
    fn test_wrap_and_saturate() {
        let base = ConvParams { temporal_length: 3, data_width: 8, ..ConvParams::default() };
        let input = InputTensor::from_rows(vec![vec![100, 100, 100]]).unwrap();
        let weights = WeightTensor::filled(1, 1, 3, 1);

        let wrap = ConvParams { overflow: OverflowMode::Wrap, ..base.clone() }.validate().unwrap();
        assert_eq!(conv1d(&input, &weights, None, &wrap).unwrap().filter(0), &[300 - 256]);

        let sat = ConvParams { overflow: OverflowMode::Saturate, ..base.clone() }.validate().unwrap();
        assert_eq!(conv1d(&input, &weights, None, &sat).unwrap().filter(0), &[127]);

        let wide = base.validate().unwrap();
        assert_eq!(conv1d(&input, &weights, None, &wide).unwrap().filter(0), &[300]);
    }

    #[test]
    fn test_extreme_values_overflow_accumulator() {
        // Each tap contributes 2^126, so two taps leave the i128 range.
        let base = ConvParams { temporal_length: 2, kernel_size: 2, data_width: 64, ..ConvParams::default() };
        let input = InputTensor::from_rows(vec![vec![i64::MIN, i64::MIN]]).unwrap();
        let weights = WeightTensor::filled(1, 1, 2, i64::MIN);

        // 2^127 mod 2^64 is 0.
        let wrap = ConvParams { overflow: OverflowMode::Wrap, ..base.clone() }.validate().unwrap();
        assert_eq!(conv1d(&input, &weights, None, &wrap).unwrap().filter(0), &[0]);

        let overflow = Err(EngineError::Overflow { filter: 0, position: 0 });
        let sat = ConvParams { overflow: OverflowMode::Saturate, ..base.clone() }.validate().unwrap();
        assert_eq!(conv1d(&input, &weights, None, &sat), overflow);

        let mut model = Conv1dGoldenModel::new(base.validate().unwrap());
        model.set_input(input).unwrap();
        model.set_weights(weights).unwrap();
        assert_eq!(model.compute().cloned(), overflow);
        assert!(model.output().is_none());
    }

    #[test]
    fn test_verify_filter() {
        let mut model = simple_model();
        assert_eq!(model.verify_filter(0, &[6, 9, 12], 0), Err(EngineError::MissingData("output")));

        model.compute().unwrap();
        assert!(model.verify_filter(0, &[6, 9, 12], 0).unwrap().passed);

        let report = model.verify_filter(0, &[6, 9, 13], 0).unwrap();
        assert!(!report.passed);
        assert_eq!(report.first_divergence.unwrap().index, 2);

        assert!(matches!(
            model.verify_filter(1, &[6, 9, 12], 0),
            Err(EngineError::Shape(ShapeError::IndexOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_metrics() {
        let model = Conv1dGoldenModel::new(ConvConfig::new(2, 10, 3, 2, 1, 1).unwrap());
        let metrics = model.metrics();
        assert_eq!(metrics.output_elements, 20);
        assert_eq!(metrics.padded_length, 12);
        assert_eq!(metrics.mac_operations, 2 * 10 * 2 * 3);
    }
}
