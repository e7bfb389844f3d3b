//! Single-pass structural scan of VAST markup.
//!
//! The scanner never builds a tree. It walks the token stream once and, on
//! each closing tag it cares about, records the byte offset where tracking
//! markup may later be spliced in:
//!
//! - `Impression` / `Error`: just past the closing tag, so new beacons become
//!   following siblings.
//! - every other element: at the `<` of the closing tag, so new markup becomes
//!   the element's last child.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Insertion offsets recorded for one `<Ad>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdRecord {
    /// Just past the last `</Impression>`.
    pub impression_end: Option<usize>,
    /// Just past the last `</Error>`.
    pub error_end: Option<usize>,
    /// Start of `</InLine>` or `</Wrapper>`.
    pub wrapper_or_inline_end: Option<usize>,
    pub creatives: Vec<CreativeRecord>,
}

/// Insertion offsets recorded for one `<Creative>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreativeRecord {
    /// `adId` attribute of the `<Creative>` tag, or its `id` when absent.
    pub id: Option<String>,
    pub kind: Option<CreativeKind>,
}

/// The creative types are mutually exclusive within one `<Creative>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreativeKind {
    Linear {
        tracking_events: Option<usize>,
        video_clicks: Option<usize>,
        linear_end: usize,
    },
    NonLinearAds {
        tracking_events: Option<usize>,
        non_linears: Vec<usize>,
        non_linear_ads_end: usize,
    },
    CompanionAds {
        companions: Vec<usize>,
        companion_ads_end: usize,
    },
}

/// Accumulators for elements whose owner has not closed yet.
#[derive(Debug, Default)]
struct ScanState {
    ads: Vec<AdRecord>,
    ad: AdRecord,
    creative: CreativeRecord,
    tracking_events: Option<usize>,
    video_clicks: Option<usize>,
    non_linears: Vec<usize>,
    companions: Vec<usize>,
}

impl ScanState {
    /// `tag_start` is the offset of the closing tag's `<`, `tag_end` the
    /// offset just past its `>`.
    fn close(&mut self, name: &[u8], tag_start: usize, tag_end: usize) {
        match name {
            b"Ad" => {
                self.ads.push(std::mem::take(&mut self.ad));
                self.creative = CreativeRecord::default();
                self.clear_pending();
            }
            b"Impression" => self.ad.impression_end = Some(tag_end),
            b"Error" => self.ad.error_end = Some(tag_end),
            b"InLine" | b"Wrapper" => self.ad.wrapper_or_inline_end = Some(tag_start),
            b"TrackingEvents" => self.tracking_events = Some(tag_start),
            b"VideoClicks" => self.video_clicks = Some(tag_start),
            b"NonLinear" => self.non_linears.push(tag_start),
            b"Companion" => self.companions.push(tag_start),
            b"Linear" => {
                self.creative.kind = Some(CreativeKind::Linear {
                    tracking_events: self.tracking_events.take(),
                    video_clicks: self.video_clicks.take(),
                    linear_end: tag_start,
                });
            }
            b"NonLinearAds" => {
                self.creative.kind = Some(CreativeKind::NonLinearAds {
                    tracking_events: self.tracking_events.take(),
                    non_linears: std::mem::take(&mut self.non_linears),
                    non_linear_ads_end: tag_start,
                });
            }
            b"CompanionAds" => {
                self.creative.kind = Some(CreativeKind::CompanionAds {
                    companions: std::mem::take(&mut self.companions),
                    companion_ads_end: tag_start,
                });
                // <TrackingEvents> inside a <Companion> belongs to it.
                self.tracking_events = None;
            }
            b"Creative" => {
                self.ad.creatives.push(std::mem::take(&mut self.creative));
                self.clear_pending();
            }
            _ => {}
        }
    }

    fn open(&mut self, start: &BytesStart<'_>) {
        if start.local_name().as_ref() == b"Creative" {
            self.creative.id = creative_id(start);
        }
    }

    fn clear_pending(&mut self) {
        self.tracking_events = None;
        self.video_clicks = None;
        self.non_linears.clear();
        self.companions.clear();
    }
}

/// Scans `xml` once and returns the offsets of every fully closed `<Ad>`.
///
/// A tokenizer error ends the scan early; ads closed before the error are
/// still returned and everything after it is left for the caller to copy
/// through untouched.
#[must_use]
pub fn scan(xml: &[u8]) -> Vec<AdRecord> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().check_end_names = false;

    let mut state = ScanState::default();

    loop {
        match reader.read_event() {
            Ok(Event::End(end)) => {
                let tag_end = reader.buffer_position() as usize;
                let tag_start = closing_tag_start(xml, tag_end);
                state.close(end.local_name().as_ref(), tag_start, tag_end);
            }
            Ok(Event::Start(start)) => state.open(&start),
            Ok(Event::Empty(empty)) => {
                // A self-closing <Impression/> or <Error/> still marks where
                // sibling beacons go; other empty elements cannot take children.
                let tag_end = reader.buffer_position() as usize;
                match empty.local_name().as_ref() {
                    b"Impression" => state.ad.impression_end = Some(tag_end),
                    b"Error" => state.ad.error_end = Some(tag_end),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!(
                    "Stopped VAST scan at byte {}: {}",
                    reader.buffer_position(),
                    e
                );
                break;
            }
        }
    }

    state.ads
}

fn closing_tag_start(xml: &[u8], tag_end: usize) -> usize {
    let tag_end = tag_end.min(xml.len());
    xml[..tag_end]
        .iter()
        .rposition(|&b| b == b'<')
        .unwrap_or(tag_end)
}

fn creative_id(start: &BytesStart<'_>) -> Option<String> {
    let mut id = None;
    for attr in start.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"adId" | b"adid" | b"AdID" => {
                return Some(String::from_utf8_lossy(&attr.value).into_owned());
            }
            b"id" => id = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            _ => {}
        }
    }
    id
}
