//! Beacon and macro settings.
//!
//! Settings are read from TOML and may be overridden per key with
//! `VAST_TRACKING__<SECTION>__<KEY>` environment variables.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::VastTrackingError;
use crate::macros::{build_replacer, Replacer, ReplacerKind, DEFAULT_DELIMITER};
use crate::vast::VastEvents;

/// Prefix for environment overrides.
pub const ENVIRONMENT_PREFIX: &str = "VAST_TRACKING";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct MacroSettings {
    #[serde(default)]
    pub replacer: ReplacerKind,

    /// Token delimiter, e.g. `##` for `##PBS_BIDID##`.
    #[serde(default = "default_delimiter")]
    #[validate(length(min = 1))]
    pub delimiter: String,
}

impl Default for MacroSettings {
    fn default() -> Self {
        Self {
            replacer: ReplacerKind::default(),
            delimiter: default_delimiter(),
        }
    }
}

impl MacroSettings {
    /// Builds the configured replacer. Call once and share the handle.
    #[must_use]
    pub fn build_replacer(&self) -> Arc<dyn Replacer> {
        build_replacer(self.replacer, &self.delimiter)
    }
}

/// Per-bidder override of the default beacons.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct BidderTracking {
    /// When false, this bidder's markup is passed through untouched.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    #[validate(nested)]
    pub vast_events: VastEvents,
}

impl Default for BidderTracking {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            vast_events: VastEvents::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate(nested)]
    pub macros: MacroSettings,

    /// Beacons for bidders without their own entry.
    #[serde(default)]
    #[validate(nested)]
    pub vast_events: VastEvents,

    /// Keyed by seat name.
    #[serde(default)]
    #[validate(custom(function = "validate_bidders"))]
    pub bidders: BTreeMap<String, BidderTracking>,
}

impl Settings {
    /// Loads the settings bundled with the crate, with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`VastTrackingError::Configuration`] if the bundled file cannot
    /// be parsed or fails validation.
    pub fn new() -> Result<Self, Report<VastTrackingError>> {
        let toml_str = include_str!("../../../vast-tracking.toml");
        Self::load(toml_str)
    }

    /// Parses settings from TOML and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`VastTrackingError::Configuration`] if the TOML is invalid or
    /// does not match the settings shape.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<VastTrackingError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_PREFIX)
            .separator("__");

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(VastTrackingError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        config
            .try_deserialize()
            .change_context(VastTrackingError::Configuration {
                message: "Failed to deserialize configuration".to_string(),
            })
    }

    /// Parses and validates settings.
    ///
    /// # Errors
    ///
    /// Returns [`VastTrackingError::Configuration`] if parsing or validation
    /// fails.
    pub fn load(toml_str: &str) -> Result<Self, Report<VastTrackingError>> {
        let settings = Self::from_toml(toml_str)?;
        settings
            .validate()
            .change_context(VastTrackingError::Configuration {
                message: "Settings validation failed".to_string(),
            })?;

        log::info!(
            "Loaded VAST tracking settings: replacer={:?}, {} bidder overrides",
            settings.macros.replacer,
            settings.bidders.len()
        );
        Ok(settings)
    }

    /// Serializes the effective settings, overrides applied, back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`VastTrackingError::Configuration`] if serialization fails.
    pub fn to_canonical_toml(&self) -> Result<String, Report<VastTrackingError>> {
        toml::to_string(self).change_context(VastTrackingError::Configuration {
            message: "Failed to serialize settings".to_string(),
        })
    }
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_enabled() -> bool {
    true
}

fn validate_bidders(bidders: &BTreeMap<String, BidderTracking>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for (seat, bidder) in bidders {
        if seat.trim().is_empty() {
            return Err(ValidationError::new("empty_bidder_name"));
        }
        // Seats are matched case-insensitively.
        if !seen.insert(seat.to_ascii_lowercase()) {
            let mut err = ValidationError::new("duplicate_bidder");
            err.add_param("bidder".into(), seat);
            return Err(err);
        }
        if bidder.validate().is_err() {
            let mut err = ValidationError::new("invalid_bidder");
            err.add_param("bidder".into(), seat);
            return Err(err);
        }
    }
    Ok(())
}
