//! Chrome-backed runs against the fixture site in `tests/site`

#![cfg(feature = "cdp")]

use layoutprobe::cdp::CdpLauncher;
use layoutprobe::harness::{self, CancelHandle};
use layoutprobe::predicate::{CardPairing, ImageChild, Predicate, StackedOrder};
use layoutprobe::serve::StaticServer;
use layoutprobe::suite::{Filter, PageCheck, PageSpec, Suite};
use layoutprobe::{HarnessConfig, Status, ViewportProfile};

fn start_site() -> (StaticServer, HarnessConfig) {
    let server = StaticServer::start("tests/site", "127.0.0.1:0").expect("Failed to start server");
    let config = HarnessConfig {
        base_url: server.base_url(),
        concurrency: 2,
        ..Default::default()
    };
    (server, config)
}

fn fixture_suite() -> Suite {
    let mobile = ViewportProfile::mobile();
    Suite {
        harness: None,
        viewports: vec![ViewportProfile::desktop(), mobile.clone()],
        pages: vec![
            PageSpec::new("home.html")
                .with_layout_basics()
                .check(PageCheck::only_on(
                    "mobile",
                    Predicate::StackedOrder(StackedOrder::default()),
                )),
            PageSpec::new("Contact_us.html")
                .with_layout_basics()
                .check(PageCheck::always(Predicate::CardPairing(CardPairing::default()))),
            PageSpec::new("training.html")
                .fragment("ttp")
                .viewport(mobile)
                .check(PageCheck::always(Predicate::StackedOrder(StackedOrder {
                    container: "#ttp .container".into(),
                    image_child: ImageChild::First,
                    ..StackedOrder::default()
                }))),
        ],
    }
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_fixture_site_passes() {
    let (_server, config) = start_site();
    let report = harness::run_suite(
        &fixture_suite(),
        &Filter::default(),
        &config,
        CdpLauncher::new(),
        CancelHandle::new(),
    )
    .await
    .expect("run failed");

    assert_eq!(report.total_cases, 5);
    assert_eq!(report.exit_code(), 0, "{}", report.render_text(true));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_overflow_is_detected() {
    let (_server, config) = start_site();
    let suite = Suite {
        harness: None,
        viewports: vec![ViewportProfile::mobile()],
        pages: vec![PageSpec::new("overflow.html").with_layout_basics()],
    };
    let report = harness::run_suite(&suite, &Filter::default(), &config, CdpLauncher::new(), CancelHandle::new())
        .await
        .expect("run failed");

    let overflow = report
        .results
        .iter()
        .find(|r| r.predicate == "no-horizontal-overflow")
        .expect("overflow result");
    match &overflow.status {
        Status::Failed { measurements, .. } => {
            assert!(measurements["scroll_width"] >= 3000.0);
        }
        other => panic!("expected overflow failure, got {:?}", other),
    }
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_missing_page_is_infrastructure_error() {
    let (_server, config) = start_site();
    let suite = Suite {
        harness: None,
        viewports: vec![ViewportProfile::desktop()],
        pages: vec![PageSpec::new("does-not-exist.html").with_layout_basics()],
    };
    let report = harness::run_suite(&suite, &Filter::default(), &config, CdpLauncher::new(), CancelHandle::new())
        .await
        .expect("run failed");

    let s = report.summary();
    assert_eq!(s.failed, 0);
    assert_eq!(s.errors, 3);
}
