//! tcad - run a command-record circuit
//!
//! Reads `circuit_element` records, solves the DC operating point and,
//! when a stop time is given, a transient. Node values are printed as
//! whitespace-separated columns.
//!
//! # Usage
//!
//! ```bash
//! tcad divider.cmd
//! tcad rc.cmd --tstop 1e-3 --tstep 1e-5 --method trbdf2
//! tcad rc.cmd --ac 1e3 --output out
//! RUST_LOG=debug tcad rc.cmd
//! ```

use std::path::PathBuf;

use clap::Parser;
use tcad_core::{
    circuit::Circuit, device::Device, dsl, error::Result, solver::TransientMethod, Simulator,
    TransientConfig,
};
use tracing_subscriber::EnvFilter;

/// Coupled device/circuit solver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the command record file
    #[arg(value_name = "COMMAND_FILE")]
    command_file: PathBuf,

    /// Transient stop time in seconds; DC only when absent
    #[arg(long)]
    tstop: Option<f64>,

    /// Transient step in seconds
    #[arg(long, default_value_t = 1e-6)]
    tstep: f64,

    /// Integration method: bdf1, tr or trbdf2
    #[arg(long, default_value = "bdf1")]
    method: String,

    /// Small-signal frequencies in Hz, solved about the DC point
    #[arg(long, value_delimiter = ',')]
    ac: Vec<f64>,

    /// Circuit node reported by the AC analysis
    #[arg(long, default_value = "out")]
    output: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Parse the command file
    let records = dsl::parse_file(&args.command_file)?;

    // Build the circuit; device regions come from a mesh and are not
    // described by records.
    let circuit = Circuit::from_records(&records)?;
    let mut simulator = Simulator::new(Device::new("device"), circuit)?;

    let names: Vec<String> = simulator
        .circuit()
        .nodes()
        .names()
        .map(str::to_string)
        .collect();

    match args.tstop {
        None => {
            simulator.dc_operating_point()?;
            for name in &names {
                println!("{} {:e}", name, simulator.circuit_node_value(name)?);
            }
        }
        Some(tstop) => {
            let method: TransientMethod = args.method.parse()?;
            let config = TransientConfig::new()
                .with_tstop(tstop)
                .with_tstep(args.tstep)
                .with_min_step(args.tstep * 1e-6)
                .with_method(method);
            let base = simulator.device().equation_count();
            let circuit = simulator.circuit();
            let columns: Vec<usize> = names
                .iter()
                .filter_map(|n| circuit.node(n).and_then(|n| n.number()))
                .map(|i| base + i)
                .collect();

            println!("time {}", names.join(" "));
            simulator.transient(&config, |t, x| {
                let values: Vec<String> = columns.iter().map(|&i| format!("{:e}", x[i])).collect();
                println!("{:e} {}", t, values.join(" "));
            })?;
        }
    }

    if !args.ac.is_empty() {
        if args.tstop.is_some() {
            simulator.dc_operating_point()?;
        }
        for (f, v) in simulator.ac_sweep(&args.output, &args.ac)? {
            println!("{:e} {:e} {:e}", f, v.norm(), v.arg());
        }
    }

    Ok(())
}
