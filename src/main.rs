// src/main.rs
//! 1D convolution golden model CLI
//! Runs configurations, the reference suite and trace comparisons

use clap::{Arg, ArgMatches, Command};
use std::path::Path;

use conv1d_golden::config::RunConfig;
use conv1d_golden::kernels::Conv1dGoldenModel;
use conv1d_golden::report::{self, RunSummary};
use conv1d_golden::tensor::{Accum, OutputTensor};
use conv1d_golden::trace::{TraceDecoder, DEFAULT_SIGNAL};
use conv1d_golden::validation::{Comparator, GoldenReference, TraceAlignment, VerificationSuite};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("run", sub_matches)) => {
            cmd_run(sub_matches)?;
        }
        Some(("validate", sub_matches)) => {
            cmd_validate(sub_matches)?;
        }
        Some(("suite", sub_matches)) => {
            cmd_suite(sub_matches)?;
        }
        Some(("config-gen", sub_matches)) => {
            cmd_config_gen(sub_matches)?;
        }
        Some(("compare", sub_matches)) => {
            cmd_compare(sub_matches)?;
        }
        _ => {
            println!("conv1d-golden v0.1");
            println!("Use --help for available commands");
        }
    }

    Ok(())
}

// Matches `trace::DEFAULT_DIMENSION`.
const DEFAULT_BUS_LANES: &str = "16";

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Run configuration file (TOML)")
        .default_value("config/conv1d.toml")
}

fn tolerance_arg() -> Arg {
    Arg::new("tolerance")
        .short('t')
        .long("tolerance")
        .help("Maximum allowed absolute difference, overrides the run file")
}

fn cli() -> Command {
    Command::new("conv1d-golden")
        .version("0.1.0")
        .about("Golden reference model for a 1D convolution accelerator")
        .subcommand(
            Command::new("run")
                .about("Compute a run configuration and report the output")
                .arg(config_arg())
                .arg(Arg::new("format")
                    .short('f')
                    .long("format")
                    .help("Output format")
                    .value_parser(["table", "hex", "csv", "report", "json"])
                    .default_value("table"))
                .arg(Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_name("FILE")
                    .help("Write the output to a file instead of stdout"))
                .arg(tolerance_arg())
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a run configuration file")
                .arg(Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Run configuration file to validate")
                    .required(true))
        )
        .subcommand(
            Command::new("suite")
                .about("Run the golden reference suite")
                .arg(Arg::new("filter")
                    .long("filter")
                    .help("Only run cases whose name starts with this prefix")
                    .default_value(""))
                .arg(Arg::new("import")
                    .long("import")
                    .value_name("FILE")
                    .help("Add reference cases from a JSON file"))
                .arg(Arg::new("export")
                    .long("export")
                    .value_name("FILE")
                    .help("Write the suite report as JSON"))
                .arg(Arg::new("export-references")
                    .long("export-references")
                    .value_name("FILE")
                    .help("Write the reference cases as JSON"))
        )
        .subcommand(
            Command::new("config-gen")
                .about("Generate default run configuration file")
                .arg(Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_name("FILE")
                    .help("Output file path")
                    .default_value("config/conv1d-default.toml"))
        )
        .subcommand(
            Command::new("compare")
                .about("Compare a VCD trace from the hardware against the golden model")
                .arg(config_arg())
                .arg(Arg::new("vcd")
                    .long("vcd")
                    .value_name("FILE")
                    .help("VCD dump from the simulator")
                    .required(true))
                .arg(Arg::new("signal")
                    .short('s')
                    .long("signal")
                    .help("Packed output bus signal name")
                    .default_value(DEFAULT_SIGNAL))
                .arg(Arg::new("dimension")
                    .short('d')
                    .long("dimension")
                    .help("Number of lanes on the output bus")
                    .default_value(DEFAULT_BUS_LANES))
                .arg(Arg::new("start")
                    .long("start")
                    .help("Sample the bus from this time instead of following changes"))
                .arg(Arg::new("period")
                    .long("period")
                    .help("Sampling period, used with --start")
                    .default_value("10"))
                .arg(tolerance_arg())
        )
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String, Box<dyn std::error::Error>> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| format!("missing argument --{}", name).into())
}

fn load_run_config(config_path: &str) -> Result<RunConfig, Box<dyn std::error::Error>> {
    if Path::new(config_path).exists() {
        Ok(RunConfig::from_file(config_path)?)
    } else {
        log::warn!("{} not found, using the default run configuration", config_path);
        Ok(RunConfig::default_run())
    }
}

fn build_model(run: &RunConfig) -> Result<Conv1dGoldenModel, Box<dyn std::error::Error>> {
    let config = run.validate()?;
    let vectors = run.vectors.generate(&config)?;

    let mut model = Conv1dGoldenModel::new(config);
    model.load_vectors(vectors)?;
    model.compute()?;
    Ok(model)
}

fn tolerance(matches: &ArgMatches, run: &RunConfig) -> Result<u64, Box<dyn std::error::Error>> {
    match matches.get_one::<String>("tolerance") {
        Some(t) => Ok(t.parse()?),
        None => Ok(run.verify.tolerance),
    }
}

fn cmd_run(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let run = load_run_config(required(matches, "config")?)?;
    let model = build_model(&run)?;
    let output = model.output().ok_or("model produced no output")?;

    let rendered = match required(matches, "format")?.as_str() {
        "hex" => report::format_filter_listing(output, model.config().data_width()),
        "csv" => report::to_csv(output),
        "json" => serde_json::to_string_pretty(output)?,
        "report" => {
            let summary = RunSummary {
                config: model.config(),
                input: model.input().ok_or("input missing")?,
                weights: model.weights().ok_or("weights missing")?,
                bias: model.bias().filter(|_| model.config().use_bias()),
                output,
                metrics: model.metrics(),
            };
            report::format_full_report(&summary)
        }
        _ => report::format_table(output),
    };

    match matches.get_one::<String>("output") {
        Some(path) => {
            report::save_text(&rendered, path)?;
            println!("✓ Output written to {}", path);
        }
        None => print!("{}", rendered),
    }

    if let Some(rows) = &run.verify.expected {
        let expected = OutputTensor::from_rows(
            rows.iter()
                .map(|row| row.iter().map(|&v| Accum::from(v)).collect())
                .collect(),
        )?;
        let reports = Comparator::new(tolerance(matches, &run)?).verify_tensor(&expected, output);
        println!("\n{}", report::format_comparison(&reports));
        if reports.iter().any(|r| !r.passed) {
            std::process::exit(1);
        }
    }

    Ok(())
}

fn cmd_validate(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = required(matches, "config")?;

    println!("Validating run configuration: {}", config_path);

    match RunConfig::from_file(config_path) {
        Ok(run) => {
            let config = run.validate()?;
            println!("✓ Configuration is valid");
            println!("  Input: {} channels x {} samples", config.input_channels(), config.temporal_length());
            println!("  Filters: {} x kernel {}", config.filter_number(), config.kernel_size());
            println!("  Stride {} / padding {}", config.stride(), config.padding());
            println!("  Output length: {}", config.output_length());
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn cmd_suite(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let mut reference = GoldenReference::with_default_cases();
    if let Some(path) = matches.get_one::<String>("import") {
        reference.import_references(path)?;
    }
    if let Some(path) = matches.get_one::<String>("export-references") {
        reference.export_references(path)?;
    }

    let suite = VerificationSuite::with_reference(reference);
    let suite_report = suite.run_matching(required(matches, "filter")?);
    suite.print_test_summary(&suite_report);

    if let Some(path) = matches.get_one::<String>("export") {
        report::save_json(&suite_report, Path::new(path))?;
        println!("✓ Suite report written to {}", path);
    }

    if !suite_report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_config_gen(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let output_path = required(matches, "output")?;

    println!("Generating default run configuration: {}", output_path);

    let config = RunConfig::default_run();

    if let Some(parent) = Path::new(output_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_to_file(output_path)?;

    println!("✓ Configuration saved to {}", output_path);
    println!("  Use 'conv1d-golden run -c {}' to compute it", output_path);

    Ok(())
}

fn cmd_compare(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let run = load_run_config(required(matches, "config")?)?;
    let model = build_model(&run)?;
    let output = model.output().ok_or("model produced no output")?;

    let dimension: usize = required(matches, "dimension")?.parse()?;
    if dimension < model.config().filter_number() {
        log::warn!(
            "bus has {} lanes but the run has {} filters; the extra filters will fail",
            dimension,
            model.config().filter_number()
        );
    }

    let decoder = TraceDecoder::new(
        required(matches, "signal")?,
        dimension,
        model.config().data_width(),
    )?;
    let trace = decoder.parse_file(required(matches, "vcd")?)?;
    log::info!("decoded {} bus samples", trace.len());

    let alignment = match matches.get_one::<String>("start") {
        Some(start) => TraceAlignment::Sampled {
            start: start.parse()?,
            period: required(matches, "period")?.parse()?,
        },
        None => TraceAlignment::ChangeOrder,
    };

    let reports = Comparator::new(tolerance(matches, &run)?).verify_trace(output, &trace, alignment);
    print!("{}", report::format_comparison(&reports));

    if reports.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}
