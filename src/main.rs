//! Directory-based cache coherence simulator CLI.
//!
//! Replays a memory-access trace against a simulated cluster and prints
//! per-node cache/directory state plus global coherence traffic counters.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dircoh_sim::config::RunConfig;
use dircoh_sim::driver;
use dircoh_sim::error::Error;

/// Simulate a directory-based MESI coherence protocol over a replayed trace.
#[derive(Parser, Debug)]
#[command(name = "dircoh-sim", author, version, about)]
struct Cli {
    /// Trace file: one `<procId> <R|W> <address>` record per line.
    trace: PathBuf,

    /// Optional TOML file overriding cluster/cache geometry defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Restrict the printed summary to these sections (comma-separated:
    /// node, directory, global). Default: all sections.
    #[arg(long, value_delimiter = ',')]
    sections: Vec<String>,

    /// Override the number of processor nodes (`NUM_PROCESSORS`).
    #[arg(long)]
    processors: Option<usize>,

    /// Override the directory entries per home node (`NUM_LINES`).
    #[arg(long)]
    lines: Option<usize>,

    /// Override the set-index bits (`S`); the cache has `2^S` sets.
    #[arg(long)]
    sets: Option<u32>,

    /// Override the associativity (`E`); lines per set.
    #[arg(long)]
    ways: Option<usize>,

    /// Override the block-offset bits (`B`); `2^B` bytes per cache line.
    #[arg(long = "block-bits")]
    block_bits: Option<u32>,

    /// Raise logging from `warn` to `debug`.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<RunConfig, Error> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(n) = self.processors {
            config.num_processors = n;
        }
        if let Some(n) = self.lines {
            config.num_lines = n;
        }
        if let Some(s) = self.sets {
            config.s = s;
        }
        if let Some(e) = self.ways {
            config.e = e;
        }
        if let Some(b) = self.block_bits {
            config.b = b;
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("dircoh-sim: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let config = cli.resolve_config()?;
    driver::run(&cli.trace, &config, &cli.sections)
}
