//! Error types for VAST tracking.
//!
//! Errors are carried in [`error_stack::Report`] so callers can add context as
//! they propagate. Only configuration loading, template compilation, and
//! request decoding can fail; malformed VAST markup and missing macro values
//! degrade gracefully instead.

use derive_more::Display;

/// Errors raised by the VAST tracking crate.
#[derive(Debug, Display)]
pub enum VastTrackingError {
    /// Settings could not be loaded or failed validation.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// A beacon URL template could not be compiled by the template replacer.
    #[display("Failed to compile macro template: {template}")]
    TemplateCompile { template: String },

    /// A compiled beacon URL template failed to render.
    #[display("Failed to render macro template: {template}")]
    TemplateRender { template: String },

    /// Input that should have been an OpenRTB request or response was not.
    #[display("Invalid request: {message}")]
    InvalidRequest { message: String },
}

impl core::error::Error for VastTrackingError {}
