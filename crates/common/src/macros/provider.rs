//! Per-auction macro value table.

use std::collections::HashMap;

use crate::openrtb::{Imp, OpenRtbRequest};

use super::{
    CUSTOM_MACRO_MAX_LENGTH, CUSTOM_MACRO_PREFIX, MACRO_ACCOUNT_ID, MACRO_APP_BUNDLE,
    MACRO_AUCTION_ID, MACRO_BIDDER, MACRO_BID_ID, MACRO_CHANNEL, MACRO_CONSENT, MACRO_DOMAIN,
    MACRO_EVENT_TYPE, MACRO_INTEGRATION, MACRO_LIMIT_AD_TRACKING, MACRO_PAGE_URL,
    MACRO_PUB_DOMAIN, MACRO_TIMESTAMP, MACRO_VAST_CREATIVE_ID, MACRO_VAST_EVENT,
};

/// Holds raw (unescaped) macro values for one auction.
///
/// Request-scoped values are filled once by [`MacroProvider::new`]. The
/// bid-scoped values are replaced by [`MacroProvider::set_context`] before each
/// bid, and the event-scoped ones by [`MacroProvider::populate_event_macros`]
/// while beacons are written. Because both mutate the table, one provider must
/// not be used for two bids at the same time.
#[derive(Debug, Clone, Default)]
pub struct MacroProvider {
    macros: HashMap<String, String>,
}

impl MacroProvider {
    /// Builds the request-scoped macro table from an OpenRTB request.
    ///
    /// Missing or malformed request fragments simply leave their macros unset.
    #[must_use]
    pub fn new(request: &OpenRtbRequest) -> Self {
        let mut provider = Self::default();
        provider.populate_request_macros(request);
        provider
    }

    fn populate_request_macros(&mut self, request: &OpenRtbRequest) {
        self.insert(
            MACRO_TIMESTAMP,
            chrono::Utc::now().timestamp().to_string(),
        );
        self.insert(MACRO_AUCTION_ID, request.id.clone());

        if let Some(prebid) = request.request_ext().and_then(|ext| ext.prebid) {
            for (key, value) in &prebid.macros {
                self.insert(
                    &format!("{CUSTOM_MACRO_PREFIX}{key}"),
                    truncate_chars(value, CUSTOM_MACRO_MAX_LENGTH).to_string(),
                );
            }
            if let Some(integration) = prebid.integration {
                self.insert(MACRO_INTEGRATION, integration);
            }
            if let Some(channel) = prebid.channel.and_then(|c| c.name) {
                self.insert(MACRO_CHANNEL, channel);
            }
        }

        let mut account_id = None;

        if let Some(app) = &request.app {
            self.insert_opt(MACRO_APP_BUNDLE, app.bundle.as_deref());
            self.insert_opt(MACRO_DOMAIN, app.domain.as_deref());
            if let Some(publisher) = &app.publisher {
                self.insert_opt(MACRO_PUB_DOMAIN, publisher.domain.as_deref());
                account_id = non_empty(publisher.id.as_deref());
            }
        }

        // Site values win when a (malformed) request carries both objects.
        if let Some(site) = &request.site {
            self.insert_opt(MACRO_DOMAIN, site.domain.as_deref());
            self.insert_opt(MACRO_PAGE_URL, site.page.as_deref());
            if let Some(publisher) = &site.publisher {
                self.insert_opt(MACRO_PUB_DOMAIN, publisher.domain.as_deref());
                account_id = non_empty(publisher.id.as_deref()).or(account_id);
            }
        }

        let account_id = account_id.unwrap_or(request.id.as_str()).to_string();
        self.insert(MACRO_ACCOUNT_ID, account_id);

        if let Some(consent) = request.user_ext().and_then(|ext| ext.consent) {
            self.insert(MACRO_CONSENT, consent);
        }

        let lmt = request
            .device
            .as_ref()
            .and_then(|device| device.lmt)
            .or_else(|| request.device_ext().and_then(|ext| ext.lmt));
        if let Some(lmt) = lmt {
            self.insert(MACRO_LIMIT_AD_TRACKING, lmt.to_string());
        }
    }

    /// Primes the bid-scoped macros for the next bid.
    ///
    /// The previous bid's id and seat are always removed first, so a bid that
    /// supplies neither never inherits them. `_imp` is accepted for callers
    /// that have it at hand; no macro is derived from it.
    pub fn set_context(&mut self, bid_id: &str, _imp: Option<&Imp>, seat: &str) {
        self.macros.remove(MACRO_BID_ID);
        self.macros.remove(MACRO_BIDDER);

        self.insert_opt(MACRO_BID_ID, Some(bid_id));
        self.insert_opt(MACRO_BIDDER, Some(seat));
    }

    /// Sets the event-scoped macros read by tracking beacon templates.
    pub fn populate_event_macros(&mut self, creative_id: &str, event_type: &str, vast_event: &str) {
        self.insert(MACRO_VAST_CREATIVE_ID, creative_id.to_string());
        self.insert(MACRO_EVENT_TYPE, event_type.to_string());
        self.insert(MACRO_VAST_EVENT, vast_event.to_string());
    }

    /// Returns the URL-escaped value of `key`, or an empty string if unset.
    #[must_use]
    pub fn get_macro(&self, key: &str) -> String {
        self.macros
            .get(key)
            .map(|value| urlencoding::encode(value).into_owned())
            .unwrap_or_default()
    }

    /// Batch form of [`MacroProvider::get_macro`]; every requested key is
    /// present in the result.
    #[must_use]
    pub fn get_all_macros<S: AsRef<str>>(&self, keys: &[S]) -> HashMap<String, String> {
        keys.iter()
            .map(|key| (key.as_ref().to_string(), self.get_macro(key.as_ref())))
            .collect()
    }

    fn insert(&mut self, key: &str, value: String) {
        self.macros.insert(key.to_string(), value);
    }

    fn insert_opt(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = non_empty(value) {
            self.insert(key, value.to_string());
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Truncates to at most `max` characters without splitting a code point.
fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
