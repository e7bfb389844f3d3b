//! Applies tracking injection to every VAST bid of an OpenRTB response.

use std::collections::HashMap;
use std::sync::Arc;

use crate::macros::{MacroProvider, Replacer};
use crate::openrtb::{Bid, Imp, OpenRtbRequest, OpenRtbResponse};
use crate::settings::Settings;
use crate::vast::{BufferPool, TrackerInjector};

/// OpenRTB `mtype` for video markup.
pub const MTYPE_VIDEO: u8 = 2;

/// Per-seat injectors built once from settings.
///
/// All injectors share one replacer, and therefore one template cache, and
/// one output buffer pool.
pub struct VastBidInjector {
    default: TrackerInjector,
    /// Keyed by lowercased seat name; `None` disables injection for the seat.
    bidders: HashMap<String, Option<TrackerInjector>>,
}

impl VastBidInjector {
    #[must_use]
    pub fn new(settings: &Settings, replacer: &Arc<dyn Replacer>) -> Self {
        let pool = Arc::new(BufferPool::new());
        let injector = |events| {
            TrackerInjector::with_pool(Arc::clone(replacer), events, Arc::clone(&pool))
        };

        let bidders = settings
            .bidders
            .iter()
            .map(|(seat, bidder)| {
                let tracker = bidder
                    .enabled
                    .then(|| injector(bidder.vast_events.clone()));
                (seat.to_ascii_lowercase(), tracker)
            })
            .collect();

        Self {
            default: injector(settings.vast_events.clone()),
            bidders,
        }
    }

    /// Injector for `seat`, or `None` when the seat has injection disabled.
    #[must_use]
    pub fn injector_for(&self, seat: &str) -> Option<&TrackerInjector> {
        match self.bidders.get(&seat.to_ascii_lowercase()) {
            Some(tracker) => tracker.as_ref(),
            None => Some(&self.default),
        }
    }

    /// Rewrites the markup of every VAST bid in `response` in place and
    /// returns how many bids were rewritten.
    ///
    /// Bids are handled one after another with a single provider built from
    /// `request`, so each bid's identity replaces the previous one.
    pub fn inject(&self, response: &mut OpenRtbResponse, request: &OpenRtbRequest) -> usize {
        let mut provider = MacroProvider::new(request);
        let mut rewritten = 0;

        for seat_bid in &mut response.seatbid {
            let seat = seat_bid.seat.as_deref().unwrap_or_default();
            let Some(injector) = self.injector_for(seat) else {
                log::debug!("VAST tracking disabled for seat '{}'", seat);
                continue;
            };

            for bid in &mut seat_bid.bid {
                let Some(adm) = injectable_markup(bid) else {
                    continue;
                };
                provider.set_context(&bid.id, find_imp(request, bid), seat);

                let nurl = bid.nurl.as_deref().unwrap_or_default();
                let injected = injector.build(&mut provider, adm, nurl);
                log::debug!("Injected VAST trackers into bid '{}' from seat '{}'", bid.id, seat);
                bid.adm = Some(injected);
                rewritten += 1;
            }
        }

        log::debug!(
            "Rewrote {} VAST bids in response '{}'",
            rewritten,
            response.id
        );
        rewritten
    }
}

/// Builds the per-seat injectors and rewrites `response` in one call.
///
/// Long-lived callers should build a [`VastBidInjector`] once instead.
pub fn inject_vast_trackers(
    response: &mut OpenRtbResponse,
    request: &OpenRtbRequest,
    settings: &Settings,
    replacer: &Arc<dyn Replacer>,
) -> usize {
    VastBidInjector::new(settings, replacer).inject(response, request)
}

/// True for markup that is a VAST document, with or without an XML prolog.
#[must_use]
pub fn is_vast_markup(adm: &str) -> bool {
    let adm = adm.trim_start();
    adm.starts_with("<VAST") || (adm.starts_with("<?xml") && adm.contains("<VAST"))
}

/// Markup to inject into, or `None` for bids that are not VAST.
///
/// A video bid with no markup but a win notice URL yields empty markup, which
/// the injector turns into a wrapper around the URL.
fn injectable_markup(bid: &Bid) -> Option<&str> {
    match bid.adm.as_deref() {
        Some(adm) if !adm.trim().is_empty() => is_vast_markup(adm).then_some(adm),
        _ => {
            let has_nurl = bid.nurl.as_deref().is_some_and(|nurl| !nurl.is_empty());
            (has_nurl && bid.mtype == Some(MTYPE_VIDEO)).then_some("")
        }
    }
}

fn find_imp<'a>(request: &'a OpenRtbRequest, bid: &Bid) -> Option<&'a Imp> {
    let impid = bid.impid.as_deref()?;
    request.imp.iter().find(|imp| imp.id == impid)
}
