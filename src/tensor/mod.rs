// src/tensor/mod.rs
//! Integer tensors consumed and produced by the golden model
//!
//! All tensors are dense, row-major and shape-checked on construction.
//! Samples and weights are `i64`; accumulators and outputs are `i128` so the
//! golden arithmetic never overflows for any realistic configuration.

use serde::{Deserialize, Serialize};

use crate::config::ShapeError;

/// Input samples and weights.
pub type Sample = i64;
/// Accumulator and output values.
pub type Accum = i128;

/// `(input_channels, temporal_length)` signed samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTensor {
    channels: usize,
    length: usize,
    data: Vec<Sample>,
}

impl InputTensor {
    pub fn zeros(channels: usize, length: usize) -> Self {
        Self {
            channels,
            length,
            data: vec![0; channels * length],
        }
    }

    /// Build from an index formula `f(channel, t)`.
    pub fn from_fn(channels: usize, length: usize, mut f: impl FnMut(usize, usize) -> Sample) -> Self {
        let mut data = Vec::with_capacity(channels * length);
        for c in 0..channels {
            for t in 0..length {
                data.push(f(c, t));
            }
        }
        Self { channels, length, data }
    }

    /// Build from one row per channel. Rows must all have the same length.
    pub fn from_rows(rows: Vec<Vec<Sample>>) -> Result<Self, ShapeError> {
        let length = rows.first().map_or(0, Vec::len);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != length {
                return Err(ShapeError::Ragged {
                    tensor: "input",
                    row,
                    expected: length,
                    actual: values.len(),
                });
            }
        }
        Ok(Self {
            channels: rows.len(),
            length,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.channels, self.length)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn channel(&self, c: usize) -> &[Sample] {
        &self.data[c * self.length..(c + 1) * self.length]
    }

    pub fn get(&self, c: usize, t: usize) -> Sample {
        self.data[c * self.length + t]
    }

    /// Overwrite one channel.
    pub fn set_channel(&mut self, c: usize, values: &[Sample]) -> Result<(), ShapeError> {
        if c >= self.channels {
            return Err(ShapeError::IndexOutOfRange {
                axis: "channel",
                index: c,
                bound: self.channels,
            });
        }
        if values.len() != self.length {
            return Err(ShapeError::Mismatch {
                tensor: "input channel",
                expected: vec![self.length],
                actual: vec![values.len()],
            });
        }
        self.data[c * self.length..(c + 1) * self.length].copy_from_slice(values);
        Ok(())
    }

    /// Copy with `padding` zeros prepended and appended on the temporal axis.
    pub fn padded(&self, padding: usize) -> Self {
        let length = self.length + 2 * padding;
        let mut data = Vec::with_capacity(self.channels * length);
        for c in 0..self.channels {
            data.extend(std::iter::repeat(0).take(padding));
            data.extend_from_slice(self.channel(c));
            data.extend(std::iter::repeat(0).take(padding));
        }
        Self {
            channels: self.channels,
            length,
            data,
        }
    }

    pub fn to_rows(&self) -> Vec<Vec<Sample>> {
        (0..self.channels).map(|c| self.channel(c).to_vec()).collect()
    }
}

/// `(filter_number, input_channels, kernel_size)` signed weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightTensor {
    filters: usize,
    channels: usize,
    taps: usize,
    data: Vec<Sample>,
}

impl WeightTensor {
    pub fn zeros(filters: usize, channels: usize, taps: usize) -> Self {
        Self::filled(filters, channels, taps, 0)
    }

    pub fn filled(filters: usize, channels: usize, taps: usize, value: Sample) -> Self {
        Self {
            filters,
            channels,
            taps,
            data: vec![value; filters * channels * taps],
        }
    }

    /// Build from an index formula `f(filter, channel, tap)`.
    pub fn from_fn(
        filters: usize,
        channels: usize,
        taps: usize,
        mut f: impl FnMut(usize, usize, usize) -> Sample,
    ) -> Self {
        let mut data = Vec::with_capacity(filters * channels * taps);
        for fi in 0..filters {
            for c in 0..channels {
                for k in 0..taps {
                    data.push(f(fi, c, k));
                }
            }
        }
        Self { filters, channels, taps, data }
    }

    /// Build from `filter -> channel -> taps` nesting.
    pub fn from_nested(nested: Vec<Vec<Vec<Sample>>>) -> Result<Self, ShapeError> {
        let channels = nested.first().map_or(0, Vec::len);
        let taps = nested
            .first()
            .and_then(|f| f.first())
            .map_or(0, Vec::len);

        let filters = nested.len();
        let mut data = Vec::with_capacity(filters * channels * taps);
        for (fi, filter) in nested.into_iter().enumerate() {
            if filter.len() != channels {
                return Err(ShapeError::Ragged {
                    tensor: "weights",
                    row: fi,
                    expected: channels,
                    actual: filter.len(),
                });
            }
            for row in filter {
                if row.len() != taps {
                    return Err(ShapeError::Ragged {
                        tensor: "weights",
                        row: fi,
                        expected: taps,
                        actual: row.len(),
                    });
                }
                data.extend(row);
            }
        }

        Ok(Self { filters, channels, taps, data })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.filters, self.channels, self.taps)
    }

    /// Kernel taps for one `(filter, channel)` pair.
    pub fn taps(&self, filter: usize, channel: usize) -> &[Sample] {
        let start = (filter * self.channels + channel) * self.taps;
        &self.data[start..start + self.taps]
    }

    pub fn get(&self, filter: usize, channel: usize, tap: usize) -> Sample {
        self.data[(filter * self.channels + channel) * self.taps + tap]
    }

    pub fn set_taps(&mut self, filter: usize, channel: usize, values: &[Sample]) -> Result<(), ShapeError> {
        if filter >= self.filters {
            return Err(ShapeError::IndexOutOfRange {
                axis: "filter",
                index: filter,
                bound: self.filters,
            });
        }
        if channel >= self.channels {
            return Err(ShapeError::IndexOutOfRange {
                axis: "channel",
                index: channel,
                bound: self.channels,
            });
        }
        if values.len() != self.taps {
            return Err(ShapeError::Mismatch {
                tensor: "weight taps",
                expected: vec![self.taps],
                actual: vec![values.len()],
            });
        }
        let start = (filter * self.channels + channel) * self.taps;
        self.data[start..start + self.taps].copy_from_slice(values);
        Ok(())
    }
}

/// One bias per filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasVector {
    values: Vec<Sample>,
}

impl BiasVector {
    pub fn new(values: Vec<Sample>) -> Self {
        Self { values }
    }

    pub fn zeros(filters: usize) -> Self {
        Self::uniform(filters, 0)
    }

    /// Broadcast a scalar to every filter.
    pub fn uniform(filters: usize, value: Sample) -> Self {
        Self {
            values: vec![value; filters],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, filter: usize) -> Sample {
        self.values[filter]
    }

    pub fn values(&self) -> &[Sample] {
        &self.values
    }
}

/// `(filter_number, output_length)` results of one computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTensor {
    filters: usize,
    length: usize,
    data: Vec<Accum>,
}

impl OutputTensor {
    pub(crate) fn from_raw(filters: usize, length: usize, data: Vec<Accum>) -> Self {
        debug_assert_eq!(data.len(), filters * length);
        Self { filters, length, data }
    }

    /// Build from one row per filter, e.g. a pinned expectation.
    pub fn from_rows(rows: Vec<Vec<Accum>>) -> Result<Self, ShapeError> {
        let length = rows.first().map_or(0, Vec::len);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != length {
                return Err(ShapeError::Ragged {
                    tensor: "output",
                    row,
                    expected: length,
                    actual: values.len(),
                });
            }
        }
        Ok(Self {
            filters: rows.len(),
            length,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.filters, self.length)
    }

    pub fn filters(&self) -> usize {
        self.filters
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn filter(&self, f: usize) -> &[Accum] {
        &self.data[f * self.length..(f + 1) * self.length]
    }

    pub fn get(&self, f: usize, t: usize) -> Accum {
        self.data[f * self.length + t]
    }

    /// Every filter's value at output position `t`.
    pub fn column(&self, t: usize) -> Vec<Accum> {
        (0..self.filters).map(|f| self.get(f, t)).collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<Accum>> {
        (0..self.filters).map(|f| self.filter(f).to_vec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_only_touches_temporal_axis() {
        let input = InputTensor::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        let padded = input.padded(2);

        assert_eq!(padded.shape(), (2, 7));
        assert_eq!(padded.channel(0), &[0, 0, 1, 2, 3, 0, 0]);
        assert_eq!(padded.channel(1), &[0, 0, 4, 5, 6, 0, 0]);
        // Original untouched
        assert_eq!(input.channel(0), &[1, 2, 3]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = InputTensor::from_rows(vec![vec![1, 2, 3], vec![4]]).unwrap_err();
        assert_eq!(
            err,
            ShapeError::Ragged { tensor: "input", row: 1, expected: 3, actual: 1 }
        );

        assert!(WeightTensor::from_nested(vec![vec![vec![1, 1]], vec![vec![1]]]).is_err());
        assert!(WeightTensor::from_nested(vec![vec![vec![1]], vec![vec![1], vec![1]]]).is_err());
    }

    #[test]
    fn test_weight_indexing() {
        let weights = WeightTensor::from_fn(2, 3, 4, |f, c, k| (f * 100 + c * 10 + k) as i64);
        assert_eq!(weights.shape(), (2, 3, 4));
        assert_eq!(weights.taps(1, 2), &[120, 121, 122, 123]);
        assert_eq!(weights.get(0, 1, 3), 13);

        let nested = WeightTensor::from_nested(vec![vec![vec![1, 2], vec![3, 4]]]).unwrap();
        assert_eq!(nested.shape(), (1, 2, 2));
        assert_eq!(nested.taps(0, 1), &[3, 4]);
    }

    #[test]
    fn test_row_setters_check_bounds() {
        let mut input = InputTensor::zeros(2, 3);
        input.set_channel(1, &[7, 8, 9]).unwrap();
        assert_eq!(input.get(1, 2), 9);
        assert!(matches!(
            input.set_channel(2, &[1, 2, 3]),
            Err(ShapeError::IndexOutOfRange { axis: "channel", index: 2, bound: 2 })
        ));
        assert!(matches!(input.set_channel(0, &[1]), Err(ShapeError::Mismatch { .. })));

        let mut weights = WeightTensor::zeros(1, 1, 3);
        weights.set_taps(0, 0, &[1, 1, 1]).unwrap();
        assert!(weights.set_taps(1, 0, &[1, 1, 1]).is_err());
        assert!(weights.set_taps(0, 0, &[1, 1]).is_err());
    }

    #[test]
    fn test_output_columns() {
        let output = OutputTensor::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!(output.shape(), (2, 3));
        assert_eq!(output.column(1), vec![2, 5]);
        assert_eq!(output.to_rows()[1], vec![4, 5, 6]);
    }
}
