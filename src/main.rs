use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deepreport::ConfigLoader;
use deepreport::cli::commands::{cache, config, generate};
use deepreport::pipeline::RunStatus;

#[derive(Parser)]
#[command(name = "deepreport")]
#[command(
    version,
    about = "Multi-stage research report generator backed by web search"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Configuration file (merged over global and project config)")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a research report for a topic
    Generate {
        #[arg(help = "Research topic")]
        topic: String,
        #[arg(long, short, help = "Write the report export (JSON) to this file")]
        output: Option<PathBuf>,
        #[arg(long = "no-validation", help = "Skip section validation and quality checks")]
        no_validation: bool,
        #[arg(long, help = "Print and export run metrics after completion")]
        metrics: bool,
    },

    /// Inspect or maintain the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache location and usage
    Stats,
    /// Remove expired entries
    Sweep,
    /// Remove every entry
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "Render as JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mdeepreport encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = ConfigLoader::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            topic,
            output,
            no_validation,
            metrics,
        } => {
            let rt = Runtime::new()?;
            let state = rt.block_on(generate::run(
                &settings,
                generate::GenerateOptions {
                    topic,
                    output,
                    validate: !no_validation,
                    show_metrics: metrics,
                },
            ))?;

            if state.status != RunStatus::Completed {
                anyhow::bail!(
                    "Research report failed: {}",
                    state.error_messages.join("; ")
                );
            }
        }
        Commands::Cache { action } => {
            let rt = Runtime::new()?;
            match action {
                CacheAction::Stats => rt.block_on(cache::stats(&settings))?,
                CacheAction::Sweep => rt.block_on(cache::sweep(&settings))?,
                CacheAction::Clear => rt.block_on(cache::clear(&settings))?,
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => config::show(&settings, json)?,
            ConfigAction::Path => config::path(&settings)?,
        },
    }

    Ok(())
}
