// src/report/mod.rs
//! Text, CSV and JSON rendering of golden model results
//!
//! Everything here consumes finished results. Nothing upstream depends on it.

use serde::Serialize;
use std::path::Path;

use crate::config::ConvConfig;
use crate::kernels::ConvMetrics;
use crate::tensor::{Accum, BiasVector, InputTensor, OutputTensor, WeightTensor};
use crate::validation::comparator::{BatchSummary, ComparisonReport};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Side-by-side table: one row per output position, one column per filter.
pub fn format_table(output: &OutputTensor) -> String {
    let mut table = String::new();

    table.push_str(&format!("{:>10}", "Time_Index"));
    for f in 0..output.filters() {
        table.push_str(&format!(" {:>12}", format!("Filter_{}", f)));
    }
    table.push('\n');
    table.push_str(&"-".repeat(10 + 13 * output.filters()));
    table.push('\n');

    for t in 0..output.len() {
        table.push_str(&format!("{:>10}", t));
        for value in output.column(t) {
            table.push_str(&format!(" {:>12}", value));
        }
        table.push('\n');
    }
    table
}

/// `value` as the two's-complement bit pattern of a `data_width`-bit bus.
///
/// Widths of 0 or 128 and above show the full accumulator.
pub fn to_hex(value: Accum, data_width: u32) -> String {
    let bits = value as u128;
    if data_width == 0 || data_width >= 128 {
        return format!("0x{:032X}", bits);
    }
    let digits = data_width.div_ceil(4) as usize;
    let mask = (1u128 << data_width) - 1;
    format!("0x{:0width$X}", bits & mask, width = digits)
}

/// Per-filter listing with decimal and hex columns.
pub fn format_filter_listing(output: &OutputTensor, data_width: u32) -> String {
    let mut listing = String::new();
    for f in 0..output.filters() {
        listing.push_str(&format!("Filter {}:\n", f));
        for (t, &value) in output.filter(f).iter().enumerate() {
            listing.push_str(&format!(
                "  [{:>4}] {:>12}  {}\n",
                t,
                value,
                to_hex(value, data_width)
            ));
        }
    }
    listing
}

/// CSV with header `Time_Index,Filter_0,...` and base-10 integers.
pub fn to_csv(output: &OutputTensor) -> String {
    let mut csv = String::from("Time_Index");
    for f in 0..output.filters() {
        csv.push_str(&format!(",Filter_{}", f));
    }
    csv.push('\n');

    for t in 0..output.len() {
        csv.push_str(&t.to_string());
        for value in output.column(t) {
            csv.push_str(&format!(",{}", value));
        }
        csv.push('\n');
    }
    csv
}

pub fn save_csv<P: AsRef<Path>>(output: &OutputTensor, path: P) -> Result<(), ReportError> {
    std::fs::write(path.as_ref(), to_csv(output))?;
    log::info!("CSV written to {}", path.as_ref().display());
    Ok(())
}

/// Everything a computation saw and produced.
pub struct RunSummary<'a> {
    pub config: &'a ConvConfig,
    pub input: &'a InputTensor,
    pub weights: &'a WeightTensor,
    pub bias: Option<&'a BiasVector>,
    pub output: &'a OutputTensor,
    pub metrics: ConvMetrics,
}

pub fn format_full_report(run: &RunSummary<'_>) -> String {
    let config = run.config;
    let mut report = String::new();

    report.push_str("1D Convolution Golden Model Report\n");
    report.push_str("==================================\n\n");

    report.push_str("Configuration:\n");
    report.push_str(&format!("  Input channels:  {}\n", config.input_channels()));
    report.push_str(&format!("  Temporal length: {}\n", config.temporal_length()));
    report.push_str(&format!("  Kernel size:     {}\n", config.kernel_size()));
    report.push_str(&format!("  Filters:         {}\n", config.filter_number()));
    report.push_str(&format!("  Stride:          {}\n", config.stride()));
    report.push_str(&format!("  Padding:         {}\n", config.padding()));
    report.push_str(&format!("  Use bias:        {}\n", config.use_bias()));
    report.push_str(&format!("  Data width:      {}\n", config.data_width()));
    report.push_str(&format!("  Accumulation:    {:?}\n", config.accumulation()));
    report.push_str(&format!("  Overflow:        {:?}\n", config.overflow()));
    report.push_str(&format!("  Output length:   {}\n\n", config.output_length()));

    report.push_str("Metrics:\n");
    report.push_str(&format!("  MAC operations:  {}\n", run.metrics.mac_operations));
    report.push_str(&format!("  Output elements: {}\n", run.metrics.output_elements));
    report.push_str(&format!("  Padded length:   {}\n\n", run.metrics.padded_length));

    report.push_str("Input:\n");
    for c in 0..run.input.channels() {
        report.push_str(&format!("  Channel {}: {:?}\n", c, run.input.channel(c)));
    }

    report.push_str("\nWeights:\n");
    let (filters, channels, _) = run.weights.shape();
    for f in 0..filters {
        for c in 0..channels {
            report.push_str(&format!("  Filter {} Channel {}: {:?}\n", f, c, run.weights.taps(f, c)));
        }
    }

    match run.bias {
        Some(bias) => report.push_str(&format!("\nBias: {:?}\n", bias.values())),
        None => report.push_str("\nBias: none\n"),
    }

    report.push_str("\nOutput:\n");
    report.push_str(&format_filter_listing(run.output, config.data_width()));
    report
}

pub fn format_comparison(reports: &[ComparisonReport]) -> String {
    let mut text = String::new();
    for r in reports {
        let status = if r.passed { "PASS" } else { "FAIL" };
        text.push_str(&format!(
            "Filter {:>3}: {} (max diff {}, tolerance {})\n",
            r.filter_id, status, r.max_diff, r.tolerance
        ));
        if let Some(div) = &r.first_divergence {
            text.push_str(&format!(
                "  first divergence at index {}: expected {}, got {}\n",
                div.index,
                div.expected.map_or("<none>".to_string(), |v| v.to_string()),
                div.actual.map_or("<none>".to_string(), |v| v.to_string()),
            ));
        }
        if let Some(message) = &r.error_message {
            text.push_str(&format!("  {}\n", message));
        }
    }

    let summary = BatchSummary::from_reports(reports);
    text.push_str(&format!("{}/{} filters passed\n", summary.passed, summary.total));
    text
}

pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ReportError::Serialize(e.to_string()))?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn save_text<P: AsRef<Path>>(content: &str, path: P) -> Result<(), ReportError> {
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::comparator::verify;

    fn two_filters() -> OutputTensor {
        OutputTensor::from_rows(vec![vec![6, 9, 12], vec![-1, 0, 255]]).unwrap()
    }

    #[test]
    fn test_csv_layout() {
        let csv = to_csv(&two_filters());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Time_Index,Filter_0,Filter_1");
        assert_eq!(lines[1], "0,6,-1");
        assert_eq!(lines[3], "2,12,255");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_hex_masked_to_width() {
        assert_eq!(to_hex(-1, 16), "0xFFFF");
        assert_eq!(to_hex(255, 8), "0xFF");
        assert_eq!(to_hex(256, 8), "0x00");
        assert_eq!(to_hex(5, 10), "0x005");
        assert_eq!(to_hex(-1, 0), format!("0x{}", "F".repeat(32)));
    }

    #[test]
    fn test_table_has_row_per_position() {
        let table = format_table(&two_filters());
        assert!(table.contains("Filter_1"));
        assert_eq!(table.lines().count(), 2 + 3);
    }

    #[test]
    fn test_comparison_text() {
        let reports = vec![verify(0, &[1, 2], &[1, 2], 0), verify(1, &[1, 2], &[1], 0)];
        let text = format_comparison(&reports);
        assert!(text.contains("Filter   1: FAIL"));
        assert!(text.contains("expected 2, got <none>"));
        assert!(text.ends_with("1/2 filters passed\n"));
    }

    #[test]
    fn test_save_csv_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        save_csv(&two_filters(), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), to_csv(&two_filters()));
    }
}
