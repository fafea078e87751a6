// tests/trace_compare_test.rs
//! Hardware trace comparison
//! Builds VCD dumps of a packed output bus and checks them against the golden model

#[cfg(test)]
mod tests {
    use conv1d_golden::config::ConvConfig;
    use conv1d_golden::kernels::Conv1dGoldenModel;
    use conv1d_golden::tensor::{Accum, OutputTensor};
    use conv1d_golden::trace::{TraceDecoder, TraceError, DEFAULT_DIMENSION, DEFAULT_SIGNAL};
    use conv1d_golden::validation::{Comparator, TraceAlignment};

    const WIDTH: u32 = 16;

    /// One column as bus bits, MSB first. Field 0 lands in the low bits;
    /// lanes past the last filter are zero.
    fn pack(column: &[Accum], lanes: usize) -> String {
        (0..lanes)
            .rev()
            .map(|lane| {
                let field = column.get(lane).map_or(0, |&v| (v as u64) & ((1u64 << WIDTH) - 1));
                format!("{:0width$b}", field, width = WIDTH as usize)
            })
            .collect()
    }

    /// A dump of `signal` with one bus change every 10 time units, starting at 10.
    fn vcd_on_bus(output: &OutputTensor, signal: &str, lanes: usize) -> String {
        let bus = lanes as u32 * WIDTH;
        let mut vcd = String::new();
        vcd.push_str("$timescale 1ns $end\n");
        vcd.push_str("$scope module tb $end\n$scope module dut $end\n");
        vcd.push_str(&format!("$var wire {} % {} [{}:0] $end\n", bus, signal, bus - 1));
        vcd.push_str("$upscope $end\n$upscope $end\n$enddefinitions $end\n");
        vcd.push_str("#0\n$dumpvars\nbx %\n$end\n");
        for t in 0..output.len() {
            vcd.push_str(&format!("#{}\nb{} %\n", (t + 1) * 10, pack(&output.column(t), lanes)));
        }
        vcd
    }

    fn vcd_for(output: &OutputTensor) -> String {
        vcd_on_bus(output, "data_out", output.filters())
    }

    fn golden() -> OutputTensor {
        let mut model = Conv1dGoldenModel::new(ConvConfig::new(1, 5, 3, 2, 1, 0).unwrap());
        model.load_input_channel(0, &[1, -2, 3, -4, 5]).unwrap();
        model.load_weight_taps(0, 0, &[1, 1, 1]).unwrap();
        model.load_weight_taps(1, 0, &[-1, 2, -3]).unwrap();
        model.compute().unwrap().clone()
    }

    #[test]
    fn test_trace_matches_golden_model() {
        let output = golden();
        assert_eq!(output.filter(0), &[2, -3, 4]);
        assert_eq!(output.filter(1), &[-14, 20, -26]);

        let decoder = TraceDecoder::new("data_out", 2, WIDTH).unwrap();
        let trace = decoder.parse_str(&vcd_for(&output)).unwrap();
        assert_eq!(trace.len(), 3);

        let reports = Comparator::new(0).verify_trace(&output, &trace, TraceAlignment::ChangeOrder);
        assert!(reports.iter().all(|r| r.passed));
    }

    #[test]
    fn test_trace_from_file() {
        let output = golden();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.vcd");
        std::fs::write(&path, vcd_for(&output)).unwrap();

        let trace = TraceDecoder::new("data_out", 2, WIDTH).unwrap().parse_file(&path).unwrap();
        let reports = Comparator::default().verify_trace(
            &output,
            &trace,
            TraceAlignment::Sampled { start: 10, period: 10 },
        );
        assert!(reports.iter().all(|r| r.passed));
    }

    #[test]
    fn test_corrupted_field_is_located() {
        let output = golden();
        let mut rows = output.to_rows();
        rows[1][2] += 1;
        let hardware = OutputTensor::from_rows(rows).unwrap();

        let trace = TraceDecoder::new("data_out", 2, WIDTH)
            .unwrap()
            .parse_str(&vcd_for(&hardware))
            .unwrap();

        let reports = Comparator::new(0).verify_trace(&output, &trace, TraceAlignment::ChangeOrder);
        assert!(reports[0].passed);
        assert!(!reports[1].passed);

        let divergence = reports[1].first_divergence.as_ref().unwrap();
        assert_eq!(divergence.index, 2);
        assert_eq!(divergence.expected, Some(-26));
        assert_eq!(divergence.actual, Some(-25));

        let tolerant = Comparator::new(1).verify_trace(&output, &trace, TraceAlignment::ChangeOrder);
        assert!(tolerant.iter().all(|r| r.passed));
    }

    #[test]
    fn test_missing_signal() {
        let output = golden();
        let result = TraceDecoder::new("result_bus", 2, WIDTH)
            .unwrap()
            .parse_str(&vcd_for(&output));
        assert!(matches!(result, Err(TraceError::MissingSignal(name)) if name == "result_bus"));
    }

    #[test]
    fn test_bus_width_checked() {
        let output = golden();
        let result = TraceDecoder::new("data_out", 3, WIDTH)
            .unwrap()
            .parse_str(&vcd_for(&output));
        assert!(matches!(result, Err(TraceError::BusWidth { expected: 48, actual: 32, .. })));
    }

    #[test]
    fn test_single_filter_on_full_width_bus() {
        let mut model = Conv1dGoldenModel::new(ConvConfig::new(1, 5, 3, 1, 1, 0).unwrap());
        model.load_input_channel(0, &[1, 2, 3, 4, 5]).unwrap();
        model.load_weight_taps(0, 0, &[1, 1, 1]).unwrap();
        let output = model.compute().unwrap().clone();

        let vcd = vcd_on_bus(&output, DEFAULT_SIGNAL, DEFAULT_DIMENSION);
        assert!(vcd.contains("$var wire 256 % output_result [255:0] $end"));

        // A decoder sized to the filter count rejects the full bus.
        let narrow = TraceDecoder::new(DEFAULT_SIGNAL, 1, WIDTH).unwrap().parse_str(&vcd);
        assert!(matches!(narrow, Err(TraceError::BusWidth { expected: 16, actual: 256, .. })));

        let trace = TraceDecoder::new(DEFAULT_SIGNAL, DEFAULT_DIMENSION, WIDTH)
            .unwrap()
            .parse_str(&vcd)
            .unwrap();
        assert_eq!(trace.field_changes(0), vec![6, 9, 12]);
        assert_eq!(trace.field_changes(15), vec![0, 0, 0]);

        let reports = Comparator::new(0).verify_trace(&output, &trace, TraceAlignment::ChangeOrder);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].passed);
    }
}
