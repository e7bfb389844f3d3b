//! Benchmarks for tracker injection and macro replacement.
//!
//! Run with: cargo bench -p vast-tracking-common

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vast_tracking_common::macros::{build_replacer, MacroProvider, ReplacerKind};
use vast_tracking_common::openrtb::OpenRtbRequest;
use vast_tracking_common::settings::Settings;
use vast_tracking_common::vast::TrackerInjector;

/// VAST document with `ads` in-line linear ads.
fn build_vast(ads: usize) -> String {
    let mut xml = String::from(r#"<VAST version="4.0">"#);
    for i in 0..ads {
        xml.push_str(&format!(
            concat!(
                r#"<Ad id="{i}"><InLine><AdSystem>bench</AdSystem>"#,
                "<Impression><![CDATA[https://adserver.example/imp/{i}]]></Impression>",
                r#"<Creatives><Creative adId="cr-{i}"><Linear><Duration>00:00:15</Duration>"#,
                r#"<TrackingEvents><Tracking event="start"><![CDATA[https://adserver.example/s]]></Tracking></TrackingEvents>"#,
                "</Linear></Creative></Creatives></InLine></Ad>"
            ),
            i = i
        ));
    }
    xml.push_str("</VAST>");
    xml
}

fn provider() -> MacroProvider {
    let request: OpenRtbRequest = serde_json::from_str(
        r#"{"id":"auction-1","site":{"domain":"pub.example","publisher":{"id":"acct-1"}}}"#,
    )
    .expect("request should decode");
    let mut provider = MacroProvider::new(&request);
    provider.set_context("bid-1", None, "seat-1");
    provider
}

fn bench_injection(c: &mut Criterion) {
    let settings = Settings::new().expect("bundled settings should load");
    let mut group = c.benchmark_group("inject");

    for kind in [ReplacerKind::Index, ReplacerKind::Template] {
        let injector = TrackerInjector::new(
            build_replacer(kind, &settings.macros.delimiter),
            settings.vast_events.clone(),
        );
        let mut provider = provider();

        for ads in [1, 10] {
            let xml = build_vast(ads);
            group.bench_with_input(
                BenchmarkId::new(format!("{kind:?}"), ads),
                &xml,
                |b, xml| {
                    b.iter(|| black_box(injector.build(&mut provider, black_box(xml), "")));
                },
            );
        }
    }

    group.finish();
}

fn bench_replace(c: &mut Criterion) {
    let template = "https://events.example.com/e?b=##PBS_BIDID##&a=##PBS_ACCOUNTID##&d=##PBS_DOMAIN##";
    let provider = provider();
    let mut group = c.benchmark_group("replace");

    for kind in [ReplacerKind::Index, ReplacerKind::Template] {
        let replacer = build_replacer(kind, "##");
        group.bench_function(format!("{kind:?}"), |b| {
            b.iter(|| black_box(replacer.replace(black_box(template), &provider)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_injection, bench_replace);
criterion_main!(benches);
