// src/validation/mod.rs
//! Golden reference validation
//!
//! Comparison of golden outputs against expectations and hardware traces,
//! the registry of reference cases and the suite that runs them.

pub mod comparator;
pub mod golden_reference;
pub mod suite;

pub use comparator::{verify, BatchSummary, Comparator, ComparisonReport, Divergence, TraceAlignment};
pub use golden_reference::{CaseError, GoldenReference, ReferenceCase, ValidationResult};
pub use suite::{SuiteReport, VerificationSuite};
