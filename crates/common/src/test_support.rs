#[cfg(test)]
pub mod tests {
    use crate::openrtb::OpenRtbRequest;
    use crate::settings::Settings;

    /// Linear in-line ad with existing tracking containers and a companion.
    pub const SAMPLE_VAST: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        r#"<VAST version="4.0"><Ad id="ad-1"><InLine>"#,
        "<AdSystem>Example</AdSystem><AdTitle>Sample</AdTitle>",
        "<Impression><![CDATA[https://adserver.example/imp]]></Impression>",
        r#"<Creatives><Creative id="c-1" adId="cr-1"><Linear><Duration>00:00:15</Duration>"#,
        r#"<TrackingEvents><Tracking event="start"><![CDATA[https://adserver.example/start]]></Tracking></TrackingEvents>"#,
        "<VideoClicks><ClickThrough><![CDATA[https://advertiser.example/]]></ClickThrough></VideoClicks>",
        r#"<MediaFiles><MediaFile delivery="progressive" type="video/mp4" width="640" height="360"><![CDATA[https://cdn.example/v.mp4]]></MediaFile></MediaFiles>"#,
        "</Linear></Creative>",
        r#"<Creative adId="cr-2"><CompanionAds><Companion width="300" height="250"><StaticResource creativeType="image/png"><![CDATA[https://cdn.example/c.png]]></StaticResource></Companion></CompanionAds></Creative>"#,
        "</Creatives></InLine></Ad></VAST>"
    );

    pub fn crate_test_settings_str() -> String {
        r###"
            [macros]
            replacer = "index"
            delimiter = "##"

            [vast_events]
            impression = ["https://t.example/imp?b=##PBS_BIDID##&s=##PBS_BIDDER##&d=##PBS_PUBDOMAIN##"]
            error = ["https://t.example/err?b=##PBS_BIDID##"]
            video_click = ["https://t.example/click?cr=##PBS_VASTCRTID##"]
            companion_click_through = ["https://t.example/cc?cr=##PBS_VASTCRTID##"]

            [[vast_events.tracking]]
            event = "start"
            urls = ["https://t.example/ev?e=##PBS_EVENTTYPE##&cr=##PBS_VASTCRTID##"]

            [[vast_events.tracking]]
            event = "complete"
            urls = ["https://t.example/ev?e=##PBS_EVENTTYPE##&cr=##PBS_VASTCRTID##"]
            "###
        .to_string()
    }

    pub fn create_test_settings() -> Settings {
        let toml_str = crate_test_settings_str();
        toml::from_str(&toml_str).expect("Invalid config")
    }

    pub fn sample_request() -> OpenRtbRequest {
        serde_json::from_value(serde_json::json!({
            "id": "auction-1",
            "imp": [{ "id": "imp-1", "video": { "mimes": ["video/mp4"] } }],
            "site": {
                "domain": "www.pub.example",
                "page": "https://www.pub.example/watch?v=1",
                "publisher": { "id": "acct-9", "domain": "pub.example" }
            },
            "user": { "ext": { "consent": "CONSENT123" } },
            "device": { "lmt": 0 },
            "ext": { "prebid": { "integration": "web", "macros": { "PLACEMENT": "pre roll" } } }
        }))
        .expect("request should decode")
    }

    #[test]
    fn test_settings_keep_default_delimiter() {
        let settings = create_test_settings();
        assert_eq!(settings.macros.delimiter, "##");
        assert_eq!(settings.vast_events.tracking.len(), 2);
    }
}
