pub mod config;
pub mod tensor;
pub mod vectors;
pub mod kernels;
pub mod validation;
pub mod trace;
pub mod report;

pub use config::{AccumulationMode, ConfigError, ConvConfig, ConvParams, OverflowMode, RunConfig, ShapeError};
pub use kernels::{conv1d, Conv1dGoldenModel, ConvMetrics, EngineError};
pub use tensor::{Accum, BiasVector, InputTensor, OutputTensor, Sample, WeightTensor};
pub use validation::{verify, Comparator, ComparisonReport, GoldenReference, VerificationSuite};
pub use vectors::{BiasPattern, InputPattern, VectorSpec, WeightPattern};
