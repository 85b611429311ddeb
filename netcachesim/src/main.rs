use std::fs::File;
use std::io::{BufReader, Write};
use std::time::{Duration, Instant};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use netcachelib::config::read_descriptors;
use netcachelib::simulator::{run_queue, ExperimentStatus};

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Network content caching simulator: runs a queue of experiments and prints their metrics"))]
struct Args {
    /// JSON file holding one experiment descriptor or an array of them
    experiments: String,

    /// Write the results here instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,

    /// Log filter, RUST_LOG takes precedence when set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .map_err(|e| format!("Invalid log level {}: {e}", args.log_level))?;
    // Logs on stderr, results on stdout
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let experiments_file =
        File::open(&args.experiments).map_err(|e| format!("Couldn't open the experiments file at path {}: {e}", args.experiments))?;
    let descriptors = read_descriptors(BufReader::new(experiments_file)).map_err(|e| format!("Couldn't read the experiments file: {e}"))?;
    info!("Read {} experiments from {}", descriptors.len(), args.experiments);
    let outcomes = run_queue(&descriptors).map_err(|e| format!("Simulation aborted: {e}"))?;

    let output = serde_json::to_string_pretty(&outcomes).map_err(|e| format!("Couldn't serialise the output {e}"))?;
    match &args.output {
        Some(path) => {
            let mut file = File::create(path).map_err(|e| format!("Couldn't create the output file at path {path}: {e}"))?;
            writeln!(file, "{output}").map_err(|e| format!("Couldn't write the output file: {e}"))?;
            info!("Results written to {path}");
        }
        None => println!("{output}"),
    }

    if args.performance {
        let end = Instant::now();
        let simulation_time: Duration = outcomes.iter().filter_map(|o| o.result()).map(|r| r.simulation_time).sum();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed experiments: {descriptors:?}");
        for (index, outcome) in outcomes.iter().enumerate() {
            match &outcome.status {
                ExperimentStatus::Results(result) => {
                    let formatted = result
                        .replications
                        .iter()
                        .map(|r| format!("{:?}", r.capacities))
                        .reduce(|a, b| format!("{a}, {b}"))
                        .unwrap_or_default();
                    println!("Experiment {index} cache capacities by replication: ({formatted})");
                }
                ExperimentStatus::Error(e) => println!("Experiment {index} failed: {e}"),
            }
        }
    }
    Ok(())
}
