use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use jspack::{config::Config, orchestrator::BundleOrchestrator};
use log::{LevelFilter, error};

#[derive(Parser, Debug)]
#[command(name = "jspack", version, about, long_about = None)]
#[command(group(ArgGroup::new("destination").required(true).args(["output", "stdout"])))]
struct Cli {
    /// Entry point module
    #[arg(short, long, value_name = "PATH")]
    entry: PathBuf,

    /// Where to write the bundle
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Print the bundle to stdout instead of writing a file
    #[arg(long)]
    stdout: bool,

    /// Give each canonical path a single module id
    #[arg(long)]
    dedupe: bool,

    /// Fail once more than this many modules are discovered
    #[arg(long, value_name = "N")]
    max_modules: Option<usize>,

    /// Config file to use instead of ./jspack.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if self.dedupe {
            config.dedupe = true;
        }
        if let Some(max_modules) = self.max_modules {
            config.max_modules = max_modules;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let orchestrator = BundleOrchestrator::new(config);
    match &cli.output {
        Some(output) => orchestrator.bundle(&cli.entry, output),
        None => {
            let bundle = orchestrator.bundle_to_string(&cli.entry)?;
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(bundle.as_bytes())
                .and_then(|()| stdout.flush())
                .context("Failed to write bundle to stdout")
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp(None);
    if std::env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    }
    builder.init();
}
