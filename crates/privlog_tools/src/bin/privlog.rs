#![forbid(unsafe_code)]

//! `privlog` console: seeds an in-memory store from CSV, then runs one
//! command from the arguments or reads commands from stdin.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use privlog_os::clock::SystemClock;
use privlog_os::config::PrivlogConfig;
use privlog_os::PrivlogRuntime;
use privlog_tools::console::execute_console_command;
use privlog_tools::seed;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "privlog")]
#[command(about = "Audited applicant store console", long_about = None)]
struct Cli {
    /// JSON config file (overrides PRIVLOG_CONFIG_PATH).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Applicant dataset CSV.
    #[arg(long)]
    applicants: Option<PathBuf>,

    /// Employee roster CSV (first_name,last_name,email,phone).
    #[arg(long)]
    employees: Option<PathBuf>,

    /// Load at most this many applicant rows.
    #[arg(long)]
    rows: Option<usize>,

    /// A single console command; omit to read commands from stdin.
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("privlog=info")),
        )
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = PrivlogConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let rt = PrivlogRuntime::in_memory(Arc::new(SystemClock), config);

    let actor = match &cli.employees {
        Some(path) => {
            let ids = seed::load_employees_file(&rt.gateway, path)
                .with_context(|| format!("loading employees from {}", path.display()))?;
            match ids.first() {
                Some(id) => *id,
                None => seed::ensure_seed_actor(&rt.gateway)?,
            }
        }
        None => seed::ensure_seed_actor(&rt.gateway)?,
    };
    if let Some(path) = &cli.applicants {
        let added = seed::load_applicants_file(&rt.gateway, actor, path, cli.rows)
            .with_context(|| format!("loading applicants from {}", path.display()))?;
        tracing::info!(added, "seed complete");
    }

    if !cli.command.is_empty() {
        let line = cli.command.join(" ");
        let output = execute_console_command(&rt, actor, &line).map_err(anyhow::Error::msg)?;
        if !output.is_empty() {
            println!("{output}");
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        if matches!(line.trim(), "quit" | "exit") {
            break;
        }
        match execute_console_command(&rt, actor, &line) {
            Ok(output) if output.is_empty() => {}
            Ok(output) => writeln!(stdout, "{output}")?,
            Err(err) => eprintln!("error: {err}"),
        }
    }
    Ok(())
}
