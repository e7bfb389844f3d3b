//! Settings commands.
//!
//! Settings are loaded from TOML files and merged with environment variables
//! prefixed with `VAST_TRACKING__`. For example, `VAST_TRACKING__MACROS__REPLACER`
//! will override `macros.replacer` in the TOML file.

use std::fs;
use std::path::Path;

use vast_tracking_common::settings::Settings;

use crate::error::CliError;

/// Load, merge and validate settings from a TOML file.
pub(crate) fn load_settings(file: &Path) -> Result<Settings, CliError> {
    let content = fs::read_to_string(file)?;
    log::debug!("Loading settings from: {}", file.display());

    let settings = Settings::load(&content)?;
    Ok(settings)
}

/// Validate a settings file and print a summary of what it configures.
pub fn validate(file: &Path, verbose: bool) -> Result<(), CliError> {
    let settings = load_settings(file)?;
    let merged_toml = settings.to_canonical_toml()?;

    println!("Configuration is valid");
    println!("  File: {}", file.display());
    println!("  Replacer: {:?}", settings.macros.replacer);
    println!("  Delimiter: {}", settings.macros.delimiter);
    println!("  Default tracking events: {}", settings.vast_events.tracking.len());

    if !settings.bidders.is_empty() {
        println!("\nBidders:");
        for (seat, bidder) in &settings.bidders {
            let status = if bidder.enabled { "enabled" } else { "disabled" };
            println!("  - {} ({})", seat, status);
        }
    }

    if verbose {
        let value: toml::Value = toml::from_str(&merged_toml)?;
        if let Some(table) = value.as_table() {
            println!("\nSections found:");
            for key in table.keys() {
                println!("  - [{}]", key);
            }
        }

        println!("\nMerged configuration:");
        println!("---");
        println!("{}", merged_toml);
        println!("---");
    }

    Ok(())
}
