use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Beacon URL templates to inject into VAST markup, per event kind.
///
/// Templates are written in the order they are listed here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct VastEvents {
    #[serde(default)]
    #[validate(custom(function = "validate_templates"))]
    pub impression: Vec<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_templates"))]
    pub error: Vec<String>,

    /// `<ClickTracking>` beacons inside `<VideoClicks>` of linear creatives.
    #[serde(default)]
    #[validate(custom(function = "validate_templates"))]
    pub video_click: Vec<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_templates"))]
    pub nonlinear_click_tracking: Vec<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_templates"))]
    pub companion_click_through: Vec<String>,

    /// `<Tracking event="...">` beacons for linear and non-linear creatives.
    #[serde(default)]
    #[validate(nested)]
    pub tracking: Vec<TrackingEvent>,
}

/// Beacons for one `<Tracking>` event type such as `start` or `firstQuartile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct TrackingEvent {
    #[validate(length(min = 1))]
    pub event: String,

    #[serde(default)]
    #[validate(custom(function = "validate_templates"))]
    pub urls: Vec<String>,
}

impl VastEvents {
    /// True when no beacon of any kind is configured, so injection can skip
    /// scanning the markup.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.impression.is_empty()
            && self.error.is_empty()
            && self.video_click.is_empty()
            && self.nonlinear_click_tracking.is_empty()
            && self.companion_click_through.is_empty()
            && self.tracking.iter().all(|t| t.urls.is_empty())
    }
}

fn validate_templates(templates: &[String]) -> Result<(), ValidationError> {
    if templates.iter().any(|t| t.trim().is_empty()) {
        return Err(ValidationError::new("empty_template"));
    }
    Ok(())
}
