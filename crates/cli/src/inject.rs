//! Tracker injection commands.

use std::fs;
use std::path::{Path, PathBuf};

use vast_tracking_common::bid_response::VastBidInjector;
use vast_tracking_common::macros::MacroProvider;
use vast_tracking_common::openrtb::{OpenRtbRequest, OpenRtbResponse};
use vast_tracking_common::settings::Settings;

use crate::config::load_settings;
use crate::error::CliError;

/// What to inject into.
#[derive(Debug)]
pub enum InjectTarget {
    /// A single VAST document returned by `bidder`.
    Markup {
        vast: PathBuf,
        bidder: String,
        bid_id: String,
        nurl: String,
    },
    /// Every VAST bid of an OpenRTB bid response.
    Response(PathBuf),
}

/// Inject trackers and print the result, or write it to `output`.
pub fn run(
    config: &Path,
    request: &Path,
    target: &InjectTarget,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let request = OpenRtbRequest::from_json(&fs::read_to_string(request)?)?;

    let result = match target {
        InjectTarget::Markup {
            vast,
            bidder,
            bid_id,
            nurl,
        } => {
            let vast_xml = fs::read_to_string(vast)?;
            inject_markup(&settings, &request, &vast_xml, bidder, bid_id, nurl)
        }
        InjectTarget::Response(response) => {
            inject_response(&settings, &request, &fs::read_to_string(response)?)?
        }
    };

    match output {
        Some(path) => {
            fs::write(path, &result)?;
            log::info!("Wrote {} bytes to {}", result.len(), path.display());
        }
        None => println!("{}", result),
    }
    Ok(())
}

/// Injects the beacons configured for `bidder` into one VAST document.
///
/// A bidder with injection disabled gets its markup back unchanged.
pub(crate) fn inject_markup(
    settings: &Settings,
    request: &OpenRtbRequest,
    vast_xml: &str,
    bidder: &str,
    bid_id: &str,
    nurl: &str,
) -> String {
    let injectors = VastBidInjector::new(settings, &settings.macros.build_replacer());
    let Some(injector) = injectors.injector_for(bidder) else {
        log::info!("VAST tracking is disabled for bidder '{}'", bidder);
        return vast_xml.to_string();
    };

    let mut provider = MacroProvider::new(request);
    provider.set_context(bid_id, request.imp.first(), bidder);

    injector.build(&mut provider, vast_xml, nurl)
}

/// Rewrites every VAST bid of a JSON bid response and re-encodes it.
pub(crate) fn inject_response(
    settings: &Settings,
    request: &OpenRtbRequest,
    response_json: &str,
) -> Result<String, CliError> {
    let mut response = OpenRtbResponse::from_json(response_json)?;

    let injector = VastBidInjector::new(settings, &settings.macros.build_replacer());
    let rewritten = injector.inject(&mut response, request);
    log::info!("Injected trackers into {} bids", rewritten);

    Ok(serde_json::to_string_pretty(&response)?)
}
