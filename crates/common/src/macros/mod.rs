//! Macro resolution for beacon URL templates.
//!
//! A beacon template such as `https://t.example/imp?bid=##PBS_BIDID##` carries
//! delimiter-wrapped macro tokens. A [`MacroProvider`] holds the values for the
//! current auction and bid, and a [`Replacer`] substitutes them.
//!
//! Two caching strategies are available, plus a no-op:
//!
//! - [`StringIndexReplacer`]: records token spans once per template and
//!   splices values in on every call.
//! - [`TemplateReplacer`]: compiles each template with handlebars once and
//!   renders it on every call.
//! - [`NoopReplacer`]: returns templates untouched.
//!
//! Both caches are keyed by the literal template text and shared by every
//! caller of the replacer instance.

use std::sync::Arc;

use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::error::VastTrackingError;

pub mod index_replacer;
pub mod provider;
pub mod template_replacer;

pub use index_replacer::StringIndexReplacer;
pub use provider::MacroProvider;
pub use template_replacer::TemplateReplacer;

/// Default token delimiter, e.g. `##PBS_BIDID##`.
pub const DEFAULT_DELIMITER: &str = "##";

pub const MACRO_BID_ID: &str = "PBS_BIDID";
pub const MACRO_BIDDER: &str = "PBS_BIDDER";
pub const MACRO_APP_BUNDLE: &str = "PBS_APPBUNDLE";
pub const MACRO_DOMAIN: &str = "PBS_DOMAIN";
pub const MACRO_PUB_DOMAIN: &str = "PBS_PUBDOMAIN";
pub const MACRO_PAGE_URL: &str = "PBS_PAGEURL";
pub const MACRO_ACCOUNT_ID: &str = "PBS_ACCOUNTID";
pub const MACRO_LIMIT_AD_TRACKING: &str = "PBS_LIMITADTRACKING";
pub const MACRO_CONSENT: &str = "PBS_GDPRCONSENT";
pub const MACRO_INTEGRATION: &str = "PBS_INTEGRATION";
pub const MACRO_CHANNEL: &str = "PBS_CHANNEL";
pub const MACRO_AUCTION_ID: &str = "PBS_AUCTIONID";
pub const MACRO_TIMESTAMP: &str = "PBS_TIMESTAMP";
pub const MACRO_VAST_CREATIVE_ID: &str = "PBS_VASTCRTID";
pub const MACRO_EVENT_TYPE: &str = "PBS_EVENTTYPE";
pub const MACRO_VAST_EVENT: &str = "PBS_VASTEVENT";

/// Prefix applied to publisher supplied custom macros so they can never
/// shadow a built-in key.
pub const CUSTOM_MACRO_PREFIX: &str = "PBS_MACRO_";

/// Custom macro values longer than this many characters are truncated.
pub const CUSTOM_MACRO_MAX_LENGTH: usize = 100;

/// Substitutes macro tokens in beacon URL templates.
pub trait Replacer: Send + Sync {
    /// Returns `template` with every macro token replaced by its URL-escaped
    /// value from `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`VastTrackingError::TemplateCompile`] if the strategy has to
    /// compile the template and it is malformed.
    fn replace(
        &self,
        template: &str,
        provider: &MacroProvider,
    ) -> Result<String, Report<VastTrackingError>>;

    /// Appends the resolved template to `out`.
    ///
    /// # Errors
    ///
    /// Same as [`Replacer::replace`]; nothing is written on error.
    fn replace_into(
        &self,
        out: &mut String,
        template: &str,
        provider: &MacroProvider,
    ) -> Result<(), Report<VastTrackingError>> {
        let resolved = self.replace(template, provider)?;
        out.push_str(&resolved);
        Ok(())
    }
}

/// Replacer used when macro substitution is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReplacer;

impl Replacer for NoopReplacer {
    fn replace(
        &self,
        template: &str,
        _provider: &MacroProvider,
    ) -> Result<String, Report<VastTrackingError>> {
        Ok(template.to_string())
    }
}

/// Which replacer strategy the host configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacerKind {
    None,
    #[default]
    Index,
    Template,
}

/// Builds the configured replacer. Construct once at startup and share the
/// returned handle so every caller hits the same cache.
#[must_use]
pub fn build_replacer(kind: ReplacerKind, delimiter: &str) -> Arc<dyn Replacer> {
    log::info!(
        "Building {:?} macro replacer with delimiter '{}'",
        kind,
        delimiter
    );

    match kind {
        ReplacerKind::None => Arc::new(NoopReplacer),
        ReplacerKind::Index => Arc::new(StringIndexReplacer::new(delimiter)),
        ReplacerKind::Template => Arc::new(TemplateReplacer::new(delimiter)),
    }
}
