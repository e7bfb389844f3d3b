//! VAST tracking injection for auction responses.
//!
//! This crate inserts tracking beacons (impression, error, tracking event and
//! click URLs) into bidder VAST markup without re-serializing it, and resolves
//! the macros in each beacon URL from the auction request and the bid.
//!
//! # Modules
//!
//! - [`bid_response`]: Applies injection to every VAST bid of a response
//! - [`error`]: Error types and error handling utilities
//! - [`logging`]: Log dispatcher setup for binaries
//! - [`macros`]: Macro provider and the replacer strategies
//! - [`openrtb`]: The OpenRTB request and response fields this crate reads
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing utilities and fixtures
//! - [`vast`]: Structural scanner and tracker injector

pub mod bid_response;
pub mod error;
pub mod logging;
pub mod macros;
pub mod openrtb;
pub mod settings;
pub mod test_support;
pub mod vast;
