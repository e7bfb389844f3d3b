//! VAST tracking CLI.
//!
//! This tool provides commands for:
//! - Validating VAST tracking settings files
//! - Injecting tracking beacons into a VAST document or a whole bid response

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

mod config;
mod error;
mod inject;

use error::CliError;
use inject::InjectTarget;

#[derive(Parser)]
#[command(name = "vastcli")]
#[command(about = "VAST tracking injection and settings validation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inject tracking beacons into VAST markup
    Inject(InjectArgs),

    /// Validate a settings file
    Validate {
        /// Path to the TOML settings file
        #[arg(long, short, env = "VAST_TRACKING_CONFIG")]
        config: PathBuf,
    },
}

#[derive(Args)]
struct InjectArgs {
    /// Path to the TOML settings file
    #[arg(long, short, env = "VAST_TRACKING_CONFIG")]
    config: PathBuf,

    /// Path to the OpenRTB bid request JSON the macros are taken from
    #[arg(long, short)]
    request: PathBuf,

    /// Path to a VAST document to inject into
    #[arg(long, requires = "bidder", conflicts_with = "response")]
    vast: Option<PathBuf>,

    /// Seat that returned the VAST document
    #[arg(long, requires = "vast")]
    bidder: Option<String>,

    /// Bid ID exposed to templates as PBS_BIDID
    #[arg(long, default_value = "")]
    bid_id: String,

    /// Win notice URL used when the VAST document is empty
    #[arg(long, default_value = "")]
    nurl: String,

    /// Path to an OpenRTB bid response whose VAST bids are rewritten
    #[arg(long, required_unless_present = "vast")]
    response: Option<PathBuf>,

    /// Write the result here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl InjectArgs {
    fn target(&self) -> Result<InjectTarget, CliError> {
        match (&self.vast, &self.bidder, &self.response) {
            (Some(vast), Some(bidder), None) => Ok(InjectTarget::Markup {
                vast: vast.clone(),
                bidder: bidder.clone(),
                bid_id: self.bid_id.clone(),
                nurl: self.nurl.clone(),
            }),
            (None, None, Some(response)) => Ok(InjectTarget::Response(response.clone())),
            _ => Err(CliError::Input(
                "pass either --vast with --bidder, or --response".to_string(),
            )),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if let Err(e) = vast_tracking_common::logging::init_logging(level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Commands::Inject(args) => inject::run(
            &args.config,
            &args.request,
            &args.target()?,
            args.output.as_deref(),
        ),
        Commands::Validate { config: file } => config::validate(file, cli.verbose),
    }
}
