//! CLI binary entry point for dwh-etl

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use dwh_etl::cli::commands::init::{InitArgs, handle_init_config};
#[cfg(feature = "cli")]
use dwh_etl::cli::commands::pipeline::{
    PipelineArgs, handle_create_tables, handle_etl, handle_run,
};
#[cfg(feature = "cli")]
use dwh_etl::cli::commands::plan::{PlanArgs, handle_plan};
#[cfg(feature = "cli")]
use dwh_etl::cli::commands::report::{ReportArgs, handle_report};
#[cfg(feature = "cli")]
use dwh_etl::cli::logging::init_logging;
#[cfg(feature = "cli")]
use dwh_etl::config::CONFIG_FILENAME;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "dwh-etl")]
#[command(about = "Build and load the song-play star schema on Redshift")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Log filter, e.g. info or dwh_etl=debug (RUST_LOG wins when set)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Write a sample configuration file
    InitConfig {
        /// Output path (default: the --config path)
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the statements a run would execute, without connecting
    Plan {
        /// Only this phase (drop, create, copy, insert)
        #[arg(short, long)]
        phase: Option<String>,
        /// SQL dialect (redshift, postgres); defaults to the configured one
        #[arg(short, long)]
        dialect: Option<String>,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Drop and recreate every table
    CreateTables,

    /// Copy raw data into staging, then populate the star schema
    Etl {
        /// Skip the COPY phase and load from whatever staging holds
        #[arg(long)]
        skip_copy: bool,
    },

    /// Drop, create, copy and insert, then print table counts
    Run {
        /// Skip the COPY phase and load from whatever staging holds
        #[arg(long)]
        skip_copy: bool,
    },

    /// Print the row count of every star-schema table
    Report {
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::InitConfig { path, force } => {
            let args = InitArgs {
                path: path.unwrap_or(cli.config),
                force,
            };
            handle_init_config(&args)
        }

        Commands::Plan {
            phase,
            dialect,
            format,
        } => {
            let args = PlanArgs {
                config: cli.config,
                phase,
                dialect,
                format,
            };
            handle_plan(&args)
        }

        Commands::CreateTables => {
            let args = PipelineArgs {
                config: cli.config,
                skip_copy: false,
            };
            handle_create_tables(&args)
        }

        Commands::Etl { skip_copy } => {
            let args = PipelineArgs {
                config: cli.config,
                skip_copy,
            };
            handle_etl(&args)
        }

        Commands::Run { skip_copy } => {
            let args = PipelineArgs {
                config: cli.config,
                skip_copy,
            };
            handle_run(&args)
        }

        Commands::Report { format } => {
            let args = ReportArgs {
                config: cli.config,
                format,
            };
            handle_report(&args)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
