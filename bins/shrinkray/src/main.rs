//! shrinkray: re-encode images to a quality preference or a byte budget.

use clap::{Parser, Subcommand};
use shrinkray_cli::output::Status;
use shrinkray_core::config::Config;
use shrinkray_telemetry::TelemetryConfig;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

use commands::{compress, detect, plan, RequestArgs};

#[derive(Parser)]
#[command(name = "shrinkray")]
#[command(about = "Re-encode images to a quality or a byte budget")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress an image
    Compress {
        /// Input image
        input: PathBuf,

        /// Output path (defaults to <input><suffix>.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Suffix for the default output path
        #[arg(long, default_value = "-min")]
        suffix: String,

        #[command(flatten)]
        request: RequestArgs,

        /// Print the result summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect the format of an image file
    Detect {
        /// Input image
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how a byte budget would seed the search, without encoding
    Plan {
        /// Input image
        input: PathBuf,

        #[command(flatten)]
        request: RequestArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            Status::report(&e);
            return exit_code(e.exit_code());
        }
    };

    let level = match cli.verbose {
        0 => config.schema.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    if let Err(e) = shrinkray_telemetry::init_with_config(TelemetryConfig::with_level(level)) {
        Status::warning(&format!("Logging disabled: {e}"));
    }

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            suffix,
            request,
            json,
        } => {
            compress::run(
                compress::CompressArgs {
                    input,
                    output,
                    suffix,
                    request,
                    json,
                },
                &config,
            )
            .await
        }
        Commands::Detect { input, json } => detect::run(&input, json),
        Commands::Plan {
            input,
            request,
            json,
        } => plan::run(&input, &request, json, &config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Status::report(&e);
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
