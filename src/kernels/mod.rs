// src/kernels/mod.rs
//! Golden convolution kernels
//!
//! The reference computation the accelerator is judged against, plus the
//! error type and run metrics shared by its entry points.

pub mod conv1d;

pub use conv1d::{conv1d, Conv1dGoldenModel};

use serde::{Deserialize, Serialize};

use crate::config::{ConvConfig, ShapeError};

/// Structural failures that abort a computation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("{0} not set before compute")]
    MissingData(&'static str),

    #[error("accumulator overflow in filter {filter} at output position {position}")]
    Overflow { filter: usize, position: usize },
}

/// Work performed by one computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvMetrics {
    pub mac_operations: u64,
    pub output_elements: usize,
    pub padded_length: usize,
}

impl ConvMetrics {
    pub fn for_config(config: &ConvConfig) -> Self {
        let output_elements = config.filter_number() * config.output_length();
        let mac_operations =
            (output_elements * config.active_channels() * config.kernel_size()) as u64;

        Self {
            mac_operations,
            output_elements,
            padded_length: config.padded_length(),
        }
    }
}
