//! Port Arranger CLI - Run dev servers side by side without port conflicts
//!
//! Picks a free port, injects it into the command, starts the process in the
//! background and keeps track of it for `list`, `stop` and the dashboard.

mod commands;
mod tui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use port_arranger_core::Registry;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pa")]
#[command(
    author,
    version,
    about = "Run multiple dev servers simultaneously without port conflicts"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Registry file (default: ~/.port-arranger/state.json)
    #[arg(long, global = true, env = "PORT_ARRANGER_STATE", value_name = "PATH")]
    state: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a development server on a free port
    Run {
        /// Command to execute (quote it, or pass it after `--`)
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,

        /// Project name (default: current directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Preferred port number
        #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
        port: Option<u16>,

        /// Print the plan without executing
        #[arg(long)]
        dry_run: bool,
    },

    /// List tracked processes
    #[command(alias = "ls")]
    List,

    /// Stop a tracked process
    Stop {
        /// Name of the process to stop
        #[arg(required_unless_present = "all")]
        name: Option<String>,

        /// Stop all processes
        #[arg(short, long, conflicts_with = "name")]
        all: bool,
    },

    /// Open the interactive dashboard
    Ui,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let interactive = match cli.command {
        Some(Commands::Ui) => true,
        None => atty::is(atty::Stream::Stdout) && !cli.json,
        Some(_) => false,
    };
    // Log lines would corrupt the dashboard.
    if !interactive {
        init_logging(cli.verbose);
    }

    let registry = match cli.state {
        Some(path) => Registry::with_path(path),
        None => Registry::new()?,
    };
    debug!(path = %registry.path().display(), "Using registry");

    match cli.command {
        Some(Commands::Run {
            command,
            name,
            port,
            dry_run,
        }) => {
            commands::run::run(registry, command.join(" "), name, port, dry_run, cli.json).await?;
        }
        Some(Commands::List) => {
            commands::list::run(registry, cli.json).await?;
        }
        Some(Commands::Stop { name, all }) => {
            if all {
                commands::stop::all(registry, cli.json).await?;
            } else if let Some(name) = name {
                commands::stop::one(registry, &name, cli.json).await?;
            }
        }
        Some(Commands::Ui) => {
            commands::ui::run(registry).await?;
        }
        None => {
            // Default: dashboard on a terminal, listing otherwise
            if interactive {
                commands::ui::run(registry).await?;
            } else {
                commands::list::run(registry, cli.json).await?;
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
