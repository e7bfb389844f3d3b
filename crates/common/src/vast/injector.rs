//! Splices tracking beacons into VAST markup.
//!
//! The injector scans the markup once, turns every recorded offset into an
//! insertion job, and then copies the input into a pooled buffer, writing
//! beacon markup at each job's position. Bytes outside the inserted markup are
//! never altered, reordered, or dropped.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use quick_xml::escape::escape;

use crate::macros::{MacroProvider, Replacer};

use super::events::VastEvents;
use super::scanner::{scan, AdRecord, CreativeKind};

/// Markup returned for a bid that has a win notice URL but no creative.
const EMPTY_ADM_WRAPPER_START: &str = r#"<VAST version="3.0"><Ad><Wrapper><AdSystem>prebid.org wrapper</AdSystem><VASTAdTagURI><![CDATA["#;
const EMPTY_ADM_WRAPPER_END: &str =
    "]]></VASTAdTagURI><Creatives></Creatives></Wrapper></Ad></VAST>";

/// Idle buffers kept by a [`BufferPool`]; extra returns are dropped.
const MAX_IDLE_BUFFERS: usize = 64;

/// Kind of beacon an insertion job writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Impression,
    Error,
    Tracking,
    ClickTracking,
    NonLinearClickTracking,
    CompanionClickThrough,
}

impl EventKind {
    /// Value exposed to templates as `PBS_VASTEVENT`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Impression => "impression",
            Self::Error => "error",
            Self::Tracking => "tracking",
            Self::ClickTracking => "clicktracking",
            Self::NonLinearClickTracking => "nonlinearclicktracking",
            Self::CompanionClickThrough => "companionclickthrough",
        }
    }

    fn beacon_tags(self) -> (&'static str, &'static str) {
        match self {
            Self::Impression => ("<Impression><![CDATA[", "]]></Impression>"),
            Self::Error => ("<Error><![CDATA[", "]]></Error>"),
            Self::Tracking => ("", "]]></Tracking>"),
            Self::ClickTracking => ("<ClickTracking><![CDATA[", "]]></ClickTracking>"),
            Self::NonLinearClickTracking => (
                "<NonLinearClickTracking><![CDATA[",
                "]]></NonLinearClickTracking>",
            ),
            Self::CompanionClickThrough => (
                "<CompanionClickThrough><![CDATA[",
                "]]></CompanionClickThrough>",
            ),
        }
    }

    /// Parent element synthesized when the job has no existing container.
    fn parent_tags(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Tracking => Some(("<TrackingEvents>", "</TrackingEvents>")),
            Self::ClickTracking => Some(("<VideoClicks>", "</VideoClicks>")),
            Self::CompanionClickThrough => Some(("<Companion>", "</Companion>")),
            Self::Impression | Self::Error | Self::NonLinearClickTracking => None,
        }
    }
}

/// One pending insertion at a byte offset of the input markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionJob<'a> {
    pub position: usize,
    pub kind: EventKind,
    pub wrap_parent: bool,
    pub creative_id: &'a str,
}

/// Adds tracking beacons to VAST markup.
pub trait Injector {
    /// Returns `vast_xml` with the configured beacons inserted.
    ///
    /// `provider` is updated with event-scoped macros while beacons are
    /// written; its request and bid-scoped macros are left as they were.
    fn inject(&self, provider: &mut MacroProvider, vast_xml: &str, nurl: &str) -> String;
}

/// Pool of reusable output buffers.
#[derive(Debug, Default)]
pub struct BufferPool {
    buffers: Mutex<Vec<String>>,
}

impl BufferPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out an empty buffer that returns to the pool when dropped.
    #[must_use]
    pub fn checkout(&self) -> PooledBuffer<'_> {
        let mut buf = self
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        buf.clear();
        PooledBuffer { pool: self, buf }
    }

    /// Number of buffers waiting to be reused.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn give_back(&self, buf: String) {
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() < MAX_IDLE_BUFFERS {
            buffers.push(buf);
        }
    }
}

/// Exclusive loan of a [`BufferPool`] buffer.
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: String,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}

/// Injects one bidder's configured beacons into VAST markup.
pub struct TrackerInjector {
    replacer: Arc<dyn Replacer>,
    events: VastEvents,
    pool: Arc<BufferPool>,
}

impl TrackerInjector {
    #[must_use]
    pub fn new(replacer: Arc<dyn Replacer>, events: VastEvents) -> Self {
        Self::with_pool(replacer, events, Arc::new(BufferPool::new()))
    }

    /// Creates an injector that draws output buffers from a shared pool.
    #[must_use]
    pub fn with_pool(
        replacer: Arc<dyn Replacer>,
        events: VastEvents,
        pool: Arc<BufferPool>,
    ) -> Self {
        Self {
            replacer,
            events,
            pool,
        }
    }

    /// Returns `vast_xml` with the configured beacons spliced in.
    ///
    /// Empty markup with an empty `nurl` yields an empty string. Empty markup
    /// with a `nurl` is first replaced by a minimal wrapper pointing at it.
    /// Markup that fails to tokenize part way is injected up to the failure
    /// and copied through unchanged after it.
    #[must_use]
    pub fn build(&self, provider: &mut MacroProvider, vast_xml: &str, nurl: &str) -> String {
        if vast_xml.is_empty() {
            if nurl.is_empty() {
                log::debug!("No VAST markup or win notice URL; nothing to inject");
                return String::new();
            }
            let wrapper = format!("{EMPTY_ADM_WRAPPER_START}{nurl}{EMPTY_ADM_WRAPPER_END}");
            return self.splice(provider, &wrapper);
        }
        self.splice(provider, vast_xml)
    }

    fn splice(&self, provider: &mut MacroProvider, xml: &str) -> String {
        if self.events.is_empty() {
            return xml.to_string();
        }

        let ads = scan(xml.as_bytes());
        let jobs = build_jobs(&ads);
        log::debug!("Injecting {} beacon groups into {} ads", jobs.len(), ads.len());

        let mut out = self.pool.checkout();
        out.reserve(xml.len() + jobs.len() * 128);

        let mut cursor = 0;
        for job in &jobs {
            out.push_str(&xml[cursor..job.position]);
            self.emit(&mut out, provider, job);
            cursor = job.position;
        }
        out.push_str(&xml[cursor..]);

        out.as_str().to_owned()
    }

    fn has_templates(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Impression => !self.events.impression.is_empty(),
            EventKind::Error => !self.events.error.is_empty(),
            EventKind::Tracking => self.events.tracking.iter().any(|t| !t.urls.is_empty()),
            EventKind::ClickTracking => !self.events.video_click.is_empty(),
            EventKind::NonLinearClickTracking => !self.events.nonlinear_click_tracking.is_empty(),
            EventKind::CompanionClickThrough => !self.events.companion_click_through.is_empty(),
        }
    }

    /// Writes the beacons for one job. Kinds with no configured templates
    /// write nothing, not even a synthesized parent.
    fn emit(&self, out: &mut String, provider: &mut MacroProvider, job: &InsertionJob<'_>) {
        if !self.has_templates(job.kind) {
            return;
        }

        let parent = if job.wrap_parent {
            job.kind.parent_tags()
        } else {
            None
        };
        if let Some((open, _)) = parent {
            out.push_str(open);
        }

        let (open, close) = job.kind.beacon_tags();
        match job.kind {
            EventKind::Impression => {
                provider.populate_event_macros("", "", job.kind.as_str());
                self.write_beacons(out, provider, &self.events.impression, open, close);
            }
            EventKind::Error => {
                provider.populate_event_macros("", "", job.kind.as_str());
                self.write_beacons(out, provider, &self.events.error, open, close);
            }
            EventKind::Tracking => {
                for tracking in self.events.tracking.iter().filter(|t| !t.urls.is_empty()) {
                    provider.populate_event_macros(
                        job.creative_id,
                        &tracking.event,
                        job.kind.as_str(),
                    );
                    let open = format!(
                        r#"<Tracking event="{}"><![CDATA["#,
                        escape(tracking.event.as_str())
                    );
                    self.write_beacons(out, provider, &tracking.urls, &open, close);
                }
            }
            EventKind::ClickTracking => {
                provider.populate_event_macros(job.creative_id, "", job.kind.as_str());
                self.write_beacons(out, provider, &self.events.video_click, open, close);
            }
            EventKind::NonLinearClickTracking => {
                provider.populate_event_macros(job.creative_id, "", job.kind.as_str());
                self.write_beacons(
                    out,
                    provider,
                    &self.events.nonlinear_click_tracking,
                    open,
                    close,
                );
            }
            EventKind::CompanionClickThrough => {
                provider.populate_event_macros(job.creative_id, "", job.kind.as_str());
                self.write_beacons(
                    out,
                    provider,
                    &self.events.companion_click_through,
                    open,
                    close,
                );
            }
        }

        if let Some((_, close)) = parent {
            out.push_str(close);
        }
    }

    fn write_beacons(
        &self,
        out: &mut String,
        provider: &MacroProvider,
        templates: &[String],
        open: &str,
        close: &str,
    ) {
        for template in templates {
            let mark = out.len();
            out.push_str(open);
            match self.replacer.replace_into(out, template, provider) {
                Ok(()) => out.push_str(close),
                Err(e) => {
                    out.truncate(mark);
                    log::warn!("Skipping beacon for template {}: {:?}", template, e);
                }
            }
        }
    }
}

impl Injector for TrackerInjector {
    fn inject(&self, provider: &mut MacroProvider, vast_xml: &str, nurl: &str) -> String {
        self.build(provider, vast_xml, nurl)
    }
}

/// Turns scanned offsets into insertion jobs ordered by position.
///
/// Jobs at the same position keep the order they were created in.
#[must_use]
pub fn build_jobs(ads: &[AdRecord]) -> Vec<InsertionJob<'_>> {
    let mut jobs = Vec::new();

    for ad in ads {
        let ad_jobs = [
            (EventKind::Impression, ad.impression_end),
            (EventKind::Error, ad.error_end),
        ];
        for (kind, own_end) in ad_jobs {
            if let Some(position) = own_end.or(ad.wrapper_or_inline_end) {
                jobs.push(InsertionJob {
                    position,
                    kind,
                    wrap_parent: false,
                    creative_id: "",
                });
            }
        }

        for creative in &ad.creatives {
            let creative_id = creative.id.as_deref().unwrap_or_default();
            let mut push = |position: usize, kind: EventKind, wrap_parent: bool| {
                jobs.push(InsertionJob {
                    position,
                    kind,
                    wrap_parent,
                    creative_id,
                });
            };

            match &creative.kind {
                Some(CreativeKind::Linear {
                    tracking_events,
                    video_clicks,
                    linear_end,
                }) => {
                    match tracking_events {
                        Some(position) => push(*position, EventKind::Tracking, false),
                        None => push(*linear_end, EventKind::Tracking, true),
                    }
                    match video_clicks {
                        Some(position) => push(*position, EventKind::ClickTracking, false),
                        None => push(*linear_end, EventKind::ClickTracking, true),
                    }
                }
                Some(CreativeKind::NonLinearAds {
                    tracking_events,
                    non_linears,
                    non_linear_ads_end,
                }) => {
                    match tracking_events {
                        Some(position) => push(*position, EventKind::Tracking, false),
                        None => push(*non_linear_ads_end, EventKind::Tracking, true),
                    }
                    if non_linears.is_empty() {
                        push(*non_linear_ads_end, EventKind::NonLinearClickTracking, true);
                    }
                    for position in non_linears {
                        push(*position, EventKind::NonLinearClickTracking, false);
                    }
                }
                Some(CreativeKind::CompanionAds {
                    companions,
                    companion_ads_end,
                }) => {
                    if companions.is_empty() {
                        push(*companion_ads_end, EventKind::CompanionClickThrough, true);
                    }
                    for position in companions {
                        push(*position, EventKind::CompanionClickThrough, false);
                    }
                }
                None => {}
            }
        }
    }

    jobs.sort_by_key(|job| job.position);
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::{NoopReplacer, StringIndexReplacer, TemplateReplacer, DEFAULT_DELIMITER};
    use crate::vast::events::TrackingEvent;

    fn provider() -> MacroProvider {
        let mut provider = MacroProvider::default();
        provider.set_context("bid123", None, "seatX");
        provider
    }

    fn injector(events: VastEvents) -> TrackerInjector {
        TrackerInjector::new(Arc::new(StringIndexReplacer::new(DEFAULT_DELIMITER)), events)
    }

    fn tracking(event: &str, url: &str) -> TrackingEvent {
        TrackingEvent {
            event: event.to_string(),
            urls: vec![url.to_string()],
        }
    }

    #[test]
    fn impression_is_added_before_inline_close() {
        let events = VastEvents {
            impression: vec!["http://t.example/i?bid=##PBS_BIDID##".to_string()],
            ..Default::default()
        };
        let xml = r#"<VAST version="3.0"><Ad id="1"><InLine><AdSystem>x</AdSystem></InLine></Ad></VAST>"#;

        let out = injector(events).build(&mut provider(), xml, "");

        assert_eq!(
            out,
            concat!(
                r#"<VAST version="3.0"><Ad id="1"><InLine><AdSystem>x</AdSystem>"#,
                "<Impression><![CDATA[http://t.example/i?bid=bid123]]></Impression>",
                "</InLine></Ad></VAST>"
            )
        );
    }

    #[test]
    fn impression_follows_existing_impression() {
        let events = VastEvents {
            impression: vec!["http://t.example/i".to_string()],
            error: vec!["http://t.example/e".to_string()],
            ..Default::default()
        };
        let xml = "<VAST><Ad><Wrapper><Impression>old</Impression><Creatives></Creatives></Wrapper></Ad></VAST>";

        let out = injector(events).build(&mut provider(), xml, "");

        assert_eq!(
            out,
            concat!(
                "<VAST><Ad><Wrapper><Impression>old</Impression>",
                "<Impression><![CDATA[http://t.example/i]]></Impression>",
                "<Creatives></Creatives>",
                "<Error><![CDATA[http://t.example/e]]></Error>",
                "</Wrapper></Ad></VAST>"
            )
        );
    }

    #[test]
    fn tracking_is_appended_inside_existing_tracking_events() {
        let events = VastEvents {
            tracking: vec![tracking("start", "http://t.example/s")],
            ..Default::default()
        };
        let xml = concat!(
            "<VAST><Ad><InLine><Creatives><Creative><Linear>",
            r#"<TrackingEvents><Tracking event="start">old</Tracking></TrackingEvents>"#,
            "<VideoClicks></VideoClicks>",
            "</Linear></Creative></Creatives></InLine></Ad></VAST>"
        );

        let out = injector(events).build(&mut provider(), xml, "");

        assert!(out.contains(concat!(
            r#"<TrackingEvents><Tracking event="start">old</Tracking>"#,
            r#"<Tracking event="start"><![CDATA[http://t.example/s]]></Tracking>"#,
            "</TrackingEvents>"
        )));
        assert_eq!(out.matches("<TrackingEvents>").count(), 1);
        assert_eq!(out.matches("<VideoClicks>").count(), 1);
    }

    #[test]
    fn linear_without_containers_gets_synthesized_parents() {
        let events = VastEvents {
            video_click: vec!["http://t.example/c".to_string()],
            tracking: vec![
                tracking("start", "http://t.example/s"),
                tracking("complete", "http://t.example/done"),
            ],
            ..Default::default()
        };
        let xml = "<VAST><Ad><InLine><Creatives><Creative><Linear><Duration>5</Duration></Linear></Creative></Creatives></InLine></Ad></VAST>";

        let out = injector(events).build(&mut provider(), xml, "");

        assert!(out.contains(concat!(
            "<Duration>5</Duration>",
            "<TrackingEvents>",
            r#"<Tracking event="start"><![CDATA[http://t.example/s]]></Tracking>"#,
            r#"<Tracking event="complete"><![CDATA[http://t.example/done]]></Tracking>"#,
            "</TrackingEvents>",
            "<VideoClicks><ClickTracking><![CDATA[http://t.example/c]]></ClickTracking></VideoClicks>",
            "</Linear>"
        )));
    }

    #[test]
    fn non_linear_click_tracking_is_never_wrapped() {
        let events = VastEvents {
            nonlinear_click_tracking: vec!["http://t.example/nl".to_string()],
            ..Default::default()
        };
        let beacon = "<NonLinearClickTracking><![CDATA[http://t.example/nl]]></NonLinearClickTracking>";

        let with_children = "<VAST><Ad><InLine><Creatives><Creative><NonLinearAds><NonLinear>a</NonLinear><NonLinear>b</NonLinear></NonLinearAds></Creative></Creatives></InLine></Ad></VAST>";
        let out = injector(events.clone()).build(&mut provider(), with_children, "");
        assert!(out.contains(&format!(
            "<NonLinear>a{beacon}</NonLinear><NonLinear>b{beacon}</NonLinear>"
        )));

        let without_children = "<VAST><Ad><InLine><Creatives><Creative><NonLinearAds></NonLinearAds></Creative></Creatives></InLine></Ad></VAST>";
        let out = injector(events).build(&mut provider(), without_children, "");
        assert!(out.contains(&format!("<NonLinearAds>{beacon}</NonLinearAds>")));
        assert!(!out.contains("<NonLinear>"));
    }

    #[test]
    fn non_linear_tracking_uses_or_synthesizes_tracking_events() {
        let events = VastEvents {
            tracking: vec![tracking("creativeView", "http://t.example/cv")],
            ..Default::default()
        };
        let beacon = r#"<Tracking event="creativeView"><![CDATA[http://t.example/cv]]></Tracking>"#;

        let without_container = concat!(
            "<VAST><Ad><InLine><Creatives><Creative><NonLinearAds>",
            "<NonLinear>a</NonLinear>",
            "</NonLinearAds></Creative></Creatives></InLine></Ad></VAST>"
        );
        let out = injector(events.clone()).build(&mut provider(), without_container, "");
        assert!(out.contains(&format!(
            "<NonLinear>a</NonLinear><TrackingEvents>{beacon}</TrackingEvents></NonLinearAds>"
        )));

        let with_container = concat!(
            "<VAST><Ad><InLine><Creatives><Creative><NonLinearAds>",
            r#"<TrackingEvents><Tracking event="start">old</Tracking></TrackingEvents>"#,
            "<NonLinear>a</NonLinear>",
            "</NonLinearAds></Creative></Creatives></InLine></Ad></VAST>"
        );
        let out = injector(events).build(&mut provider(), with_container, "");
        assert!(out.contains(&format!(
            r#"<Tracking event="start">old</Tracking>{beacon}</TrackingEvents><NonLinear>a</NonLinear>"#
        )));
        assert_eq!(out.matches("<TrackingEvents>").count(), 1);
    }

    #[test]
    fn companion_click_through_synthesizes_companion() {
        let events = VastEvents {
            companion_click_through: vec!["http://t.example/cc".to_string()],
            ..Default::default()
        };
        let xml = "<VAST><Ad><InLine><Creatives><Creative><CompanionAds></CompanionAds></Creative></Creatives></InLine></Ad></VAST>";

        let out = injector(events).build(&mut provider(), xml, "");

        assert!(out.contains(concat!(
            "<CompanionAds><Companion>",
            "<CompanionClickThrough><![CDATA[http://t.example/cc]]></CompanionClickThrough>",
            "</Companion></CompanionAds>"
        )));
    }

    #[test]
    fn event_macros_describe_each_beacon() {
        let events = VastEvents {
            impression: vec![
                "http://t.example/i?ev=##PBS_VASTEVENT##&cr=##PBS_VASTCRTID##".to_string(),
            ],
            tracking: vec![tracking(
                "firstQuartile",
                "http://t.example/t?cr=##PBS_VASTCRTID##&type=##PBS_EVENTTYPE##&ev=##PBS_VASTEVENT##",
            )],
            ..Default::default()
        };
        let xml = r#"<VAST><Ad><InLine><Creatives><Creative adId="cr-7"><Linear><TrackingEvents></TrackingEvents></Linear></Creative></Creatives></InLine></Ad></VAST>"#;

        let out = injector(events).build(&mut provider(), xml, "");

        assert!(out.contains("http://t.example/t?cr=cr-7&type=firstQuartile&ev=tracking"));
        assert!(out.contains("http://t.example/i?ev=impression&cr="));
    }

    #[test]
    fn removing_beacons_restores_the_input() {
        let events = VastEvents {
            impression: vec!["http://t.example/i".to_string()],
            tracking: vec![tracking("start", "http://t.example/s")],
            ..Default::default()
        };
        let xml = r#"<?xml version="1.0"?><VAST><Ad><InLine><Impression>a</Impression><Creatives><Creative><Linear><TrackingEvents></TrackingEvents></Linear></Creative></Creatives></InLine></Ad></VAST>"#;

        let out = injector(events).build(&mut provider(), xml, "");

        assert!(out.len() > xml.len());
        let stripped = out
            .replace("<Impression><![CDATA[http://t.example/i]]></Impression>", "")
            .replace(r#"<Tracking event="start"><![CDATA[http://t.example/s]]></Tracking>"#, "");
        assert_eq!(stripped, xml);
    }

    #[test]
    fn malformed_remainder_is_copied_through() {
        let events = VastEvents {
            impression: vec!["http://t.example/i".to_string()],
            ..Default::default()
        };
        let xml = "<VAST><Ad><InLine></InLine></Ad><Ad><InLine><Impression";

        let out = injector(events).build(&mut provider(), xml, "");

        assert_eq!(
            out,
            concat!(
                "<VAST><Ad><InLine>",
                "<Impression><![CDATA[http://t.example/i]]></Impression>",
                "</InLine></Ad><Ad><InLine><Impression"
            )
        );
    }

    #[test]
    fn ad_without_inline_or_wrapper_is_untouched() {
        let events = VastEvents {
            impression: vec!["http://t.example/i".to_string()],
            ..Default::default()
        };
        let xml = "<VAST><Ad></Ad></VAST>";

        assert_eq!(injector(events).build(&mut provider(), xml, ""), xml);
    }

    #[test]
    fn running_twice_adds_a_second_set() {
        let events = VastEvents {
            impression: vec!["http://t.example/i".to_string()],
            ..Default::default()
        };
        let injector = injector(events);
        let xml = "<VAST><Ad><InLine></InLine></Ad></VAST>";

        let once = injector.build(&mut provider(), xml, "");
        let twice = injector.build(&mut provider(), &once, "");

        assert_eq!(once.matches("http://t.example/i").count(), 1);
        assert_eq!(twice.matches("http://t.example/i").count(), 2);
    }

    #[test]
    fn empty_markup_uses_win_notice_wrapper() {
        let events = VastEvents {
            impression: vec!["http://t.example/i?bid=##PBS_BIDID##".to_string()],
            ..Default::default()
        };
        let injector = injector(events);

        assert_eq!(injector.build(&mut provider(), "", ""), "");

        let out = injector.build(&mut provider(), "", "http://win.example/n");
        assert_eq!(
            out,
            concat!(
                r#"<VAST version="3.0"><Ad><Wrapper><AdSystem>prebid.org wrapper</AdSystem>"#,
                "<VASTAdTagURI><![CDATA[http://win.example/n]]></VASTAdTagURI>",
                "<Creatives></Creatives>",
                "<Impression><![CDATA[http://t.example/i?bid=bid123]]></Impression>",
                "</Wrapper></Ad></VAST>"
            )
        );
    }

    #[test]
    fn failed_template_skips_only_that_beacon() {
        let events = VastEvents {
            impression: vec![
                "http://t.example/bad?bid=##PBS_BIDID".to_string(),
                "http://t.example/good?bid=##PBS_BIDID##".to_string(),
            ],
            ..Default::default()
        };
        let injector = TrackerInjector::new(
            Arc::new(TemplateReplacer::new(DEFAULT_DELIMITER)),
            events,
        );
        let xml = "<VAST><Ad><InLine></InLine></Ad></VAST>";

        let out = injector.build(&mut provider(), xml, "");

        assert_eq!(
            out,
            "<VAST><Ad><InLine><Impression><![CDATA[http://t.example/good?bid=bid123]]></Impression></InLine></Ad></VAST>"
        );
    }

    #[test]
    fn noop_replacer_leaves_templates_raw() {
        let events = VastEvents {
            error: vec!["http://t.example/e?bid=##PBS_BIDID##".to_string()],
            ..Default::default()
        };
        let injector = TrackerInjector::new(Arc::new(NoopReplacer), events);

        let out = injector.inject(&mut provider(), "<VAST><Ad><InLine></InLine></Ad></VAST>", "");

        assert!(out.contains("<Error><![CDATA[http://t.example/e?bid=##PBS_BIDID##]]></Error>"));
    }

    #[test]
    fn no_configured_beacons_returns_markup_unchanged() {
        let injector = injector(VastEvents::default());
        let xml = "<VAST><Ad><InLine><Creatives><Creative><Linear></Linear></Creative></Creatives></InLine></Ad></VAST>";

        assert_eq!(injector.build(&mut provider(), xml, ""), xml);
        assert_eq!(injector.pool.idle(), 0);

        let out = injector.build(&mut provider(), "", "http://win.example/n");
        assert!(out.starts_with("<VAST version=\"3.0\"><Ad><Wrapper>"));
        assert!(!out.contains("<Impression>"));
    }

    #[test]
    fn jobs_are_sorted_by_position() {
        let xml = "<VAST><Ad><InLine><Creatives><Creative><Linear></Linear></Creative></Creatives><Impression/></InLine></Ad></VAST>";
        let ads = scan(xml.as_bytes());
        let jobs = build_jobs(&ads);

        let positions: Vec<_> = jobs.iter().map(|job| job.position).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
        assert_eq!(jobs[0].kind, EventKind::Tracking);
        assert_eq!(jobs[1].kind, EventKind::ClickTracking);
    }

    #[test]
    fn buffers_return_to_the_pool() {
        let pool = Arc::new(BufferPool::new());
        let injector = TrackerInjector::with_pool(
            Arc::new(NoopReplacer),
            VastEvents::default(),
            Arc::clone(&pool),
        );

        let _ = injector.build(&mut provider(), "<VAST></VAST>", "");
        let _ = injector.build(&mut provider(), "<VAST></VAST>", "");

        assert_eq!(pool.idle(), 1);
        {
            let buf = pool.checkout();
            assert!(buf.is_empty());
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);
    }
}
