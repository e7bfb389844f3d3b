use std::collections::HashMap;

use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VastTrackingError;

/// Minimal subset of OpenRTB 2.x bid request used to seed tracking macros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenRtbRequest {
    /// Unique ID of the bid request, provided by the exchange.
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imp: Vec<Imp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Kept as raw JSON; [`RequestExt`] is decoded lazily so a malformed
    /// extension never fails the whole request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imp {
    pub id: String,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct App {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Publisher {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    /// Limit ad tracking signal, 0 or 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lmt: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

/// Typed view of `user.ext`.
#[derive(Debug, Default, Deserialize)]
pub struct UserExt {
    #[serde(default)]
    pub consent: Option<String>,
}

/// Typed view of `device.ext`.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceExt {
    #[serde(default)]
    pub lmt: Option<i8>,
}

/// Typed view of the request `ext`.
#[derive(Debug, Default, Deserialize)]
pub struct RequestExt {
    #[serde(default)]
    pub prebid: Option<PrebidExt>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PrebidExt {
    #[serde(default)]
    pub integration: Option<String>,
    #[serde(default)]
    pub channel: Option<Channel>,
    /// Publisher supplied macros, exposed as `PBS_MACRO_<key>`.
    #[serde(default)]
    pub macros: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub name: Option<String>,
}

impl OpenRtbRequest {
    /// Parses a JSON bid request.
    ///
    /// # Errors
    ///
    /// Returns [`VastTrackingError::InvalidRequest`] if `json` is not a bid
    /// request.
    pub fn from_json(json: &str) -> Result<Self, Report<VastTrackingError>> {
        serde_json::from_str(json).change_context(VastTrackingError::InvalidRequest {
            message: "Failed to parse OpenRTB bid request".to_string(),
        })
    }

    /// Decodes `ext`, returning `None` when absent or not shaped as expected.
    #[must_use]
    pub fn request_ext(&self) -> Option<RequestExt> {
        decode_ext(self.ext.as_ref(), "request.ext")
    }

    /// Decodes `user.ext`, returning `None` when absent or not shaped as expected.
    #[must_use]
    pub fn user_ext(&self) -> Option<UserExt> {
        decode_ext(self.user.as_ref()?.ext.as_ref(), "user.ext")
    }

    /// Decodes `device.ext`, returning `None` when absent or not shaped as expected.
    #[must_use]
    pub fn device_ext(&self) -> Option<DeviceExt> {
        decode_ext(self.device.as_ref()?.ext.as_ref(), "device.ext")
    }
}

fn decode_ext<T: serde::de::DeserializeOwned>(value: Option<&Value>, name: &str) -> Option<T> {
    let value = value?;
    match T::deserialize(value) {
        Ok(ext) => Some(ext),
        Err(e) => {
            log::debug!("Ignoring malformed {}: {}", name, e);
            None
        }
    }
}

/// Minimal subset of OpenRTB 2.x bid response whose markup gets trackers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenRtbResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seatbid: Vec<SeatBid>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatBid {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bid: Vec<Bid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bid {
    #[serde(default)]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nurl: Option<String>,
    /// Markup type: 1 banner, 2 video, 3 audio, 4 native.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtype: Option<u8>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl OpenRtbResponse {
    /// Parses a JSON bid response.
    ///
    /// # Errors
    ///
    /// Returns [`VastTrackingError::InvalidRequest`] if `json` is not a bid
    /// response.
    pub fn from_json(json: &str) -> Result<Self, Report<VastTrackingError>> {
        serde_json::from_str(json).change_context(VastTrackingError::InvalidRequest {
            message: "Failed to parse OpenRTB bid response".to_string(),
        })
    }
}
