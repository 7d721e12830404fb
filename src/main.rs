//! COW VM - Main Entry Point
//!
//! Usage: cow-vm [OPTIONS] <script>
//!
//! Runs an instruction script (`r <vpn>`, `w <vpn> [value]`, `s <pid>`,
//! `show`) against a simulated MMU and prints one trace line per
//! instruction.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::info;

use cow_vm::constants::{INIT_PID, NR_FRAMES};
use cow_vm::io::{read_script, write_trace};
use cow_vm::logger;
use cow_vm::simulator::Simulator;

/// Simulate paging, page faults and copy-on-write fork
#[derive(Parser, Debug)]
#[command(name = "cow-vm", version)]
struct Cli {
    /// Instruction script to run
    script: PathBuf,

    /// Write the trace here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of physical frames
    #[arg(long, default_value_t = NR_FRAMES)]
    frames: usize,

    /// Pid of the process booted before the script starts
    #[arg(long, default_value_t = INIT_PID)]
    init_pid: u32,

    /// Dump every page table after the run
    #[arg(long)]
    dump: bool,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init(logger::level_for_verbosity(cli.verbose)) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    // Run the simulation and handle any errors
    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Step 1: Parse the script
    let instructions = read_script(&cli.script).map_err(|e| anyhow!(e))?;
    info!("{} instructions from {}", instructions.len(), cli.script.display());

    // Step 2: Boot and run
    let mut sim = Simulator::new(cli.frames, cli.init_pid).context("boot failed")?;
    let trace = sim.run(&instructions).context("simulation aborted")?;

    // Step 3: Write the trace
    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    write_trace(&mut out, &trace).context("Failed to write trace")?;

    if cli.dump {
        for process in sim.machine().processes() {
            write!(out, "{}", process)?;
        }
        out.flush()?;
    }

    if let Some(path) = &cli.output {
        info!("trace written to {}", path.display());
    }

    Ok(())
}
