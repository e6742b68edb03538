//! # opguard CLI
//!
//! Drives the instrumentation layer against real system calls.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use opguard_config::{log_cli_debug, log_cli_info, log_cli_warn, Config};
use opguard_core::{parse_call, Instrumentor, Severity};

mod copy;
mod counter;
mod probe;

/// opguard - errno-aware call instrumentation
#[derive(Parser)]
#[command(name = "opguard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Drop guard lines below this severity (TRACE..PROMPT)
    #[arg(long, global = true)]
    min_severity: Option<Severity>,

    /// Skip the pre-call trace line
    #[arg(long, global = true)]
    no_trace_calls: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the label derived from a call expression
    Label {
        #[arg(value_name = "EXPR")]
        expr: String,

        /// Also print the assignment target and callee
        #[arg(short, long)]
        verbose: bool,
    },

    /// Open a path once and report failure with errno context
    Probe {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Open for writing instead of reading
        #[arg(short, long)]
        write: bool,
    },

    /// Copy a file through guarded read/write calls
    Copy {
        #[arg(value_name = "SRC")]
        src: PathBuf,

        #[arg(value_name = "DST")]
        dst: PathBuf,

        /// Buffer size in bytes
        #[arg(long, default_value_t = copy::DEFAULT_CHUNK)]
        chunk: usize,
    },

    /// Hammer one atomic counter from several threads
    Counter {
        #[arg(short = 't', long, default_value_t = 4)]
        threads: u64,

        #[arg(short = 'k', long, default_value_t = 100_000)]
        iters: u64,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print config file locations
    Path,
}

fn main() -> Result<()> {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = Cli::parse();

    let (mut config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    if let Some(min) = cli.min_severity {
        config.guard.min_severity = min.as_str().to_string();
    }
    if cli.no_trace_calls {
        config.guard.trace_calls = false;
    }

    opguard_config::logging::init_from_config(&config.log);
    if let Some(e) = load_error {
        log_cli_warn!("Config load failed, using defaults", error = tracing::field::display(&e));
    }

    let inst = Instrumentor::from_config(&config);
    opguard_core::logger::install(inst.logger().clone());
    log_cli_debug!(
        "Instrumentor ready",
        min_severity = tracing::field::display(inst.logger().min_severity()),
        trace_calls = config.guard.trace_calls
    );

    match cli.command {
        Commands::Label { expr, verbose } => {
            let shape = parse_call(&expr);
            println!("{}", shape.label(config.guard.label_max));
            if verbose {
                println!("target: {}", shape.target.unwrap_or("-"));
                println!("callee: {}", shape.callee.unwrap_or("-"));
            }
        }
        Commands::Probe { path, write } => {
            if !probe::probe(&inst, &path, write) {
                bail!("probe failed: {}", path.display());
            }
            println!("ok: {}", path.display());
        }
        Commands::Copy { src, dst, chunk } => {
            if chunk == 0 {
                bail!("--chunk must be greater than zero");
            }
            let copied = copy::copy_file(&inst, &src, &dst, chunk)
                .with_context(|| format!("copy {} -> {}", src.display(), dst.display()))?;
            log_cli_info!("Copy complete", bytes = copied);
            println!("copied {} bytes", copied);
        }
        Commands::Counter { threads, iters } => {
            let report = counter::run(threads, iters)?;
            println!(
                "threads={} iters={} final={} expected={} distinct={} max={}",
                report.threads,
                report.iters,
                report.final_value,
                report.expected,
                report.distinct,
                report.max_seen
            );
            if !report.is_consistent() {
                bail!("counter lost updates: {:?}", report);
            }
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                print!("{}", config.to_toml()?);
            }
            ConfigCommands::Path => {
                match Config::global_config_path() {
                    Some(p) => println!("Global:  {}", p.display()),
                    None => println!("Global:  (no home directory)"),
                }
                println!("Project: {}", opguard_config::PROJECT_CONFIG_PATH);
            }
        },
    }

    Ok(())
}
