// tests/poller_e2e.rs
//
// Full wiring from settings: three feeds and three sinks behind local
// stand-ins, driven one cycle at a time.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use common::{dead_url, MockApi};
use imperva_events::{build_poller, ConfigError, Settings};

const INFRA_PATH: &str = "/api/v1/infra/events";
const AUDIT_PATH: &str = "/audit-trail/v2/events";
const BILLING_PATH: &str = "/usage-report/api/v1/billing-summary";

fn clear_env() {
    for (k, _) in std::env::vars() {
        if k.starts_with("IMPERVA_") {
            std::env::remove_var(k);
        }
    }
}

fn infra_body() -> String {
    let fmt = |d: ChronoDuration| (Utc::now() - d).format("%Y-%m-%d %H:%M:%S UTC").to_string();
    serde_json::json!({
        "events": [
            {"eventTime": fmt(ChronoDuration::minutes(1)), "eventType": "DDOS_STOP_IP_RANGE", "eventTarget": "203.0.113.0/24", "reportedByPop": "ams"},
            {"eventTime": fmt(ChronoDuration::minutes(90)), "eventType": "DDOS_START_IP_RANGE", "eventTarget": "203.0.113.0/24", "reportedByPop": "ams"},
            {"eventTime": fmt(ChronoDuration::minutes(2)), "eventType": "DDOS_START_IP_RANGE", "eventTarget": "198.51.100.0/24", "reportedByPop": "fra"}
        ],
        "res": 0,
        "res_message": "OK"
    })
    .to_string()
}

#[serial_test::serial]
#[tokio::test]
async fn cycle_fans_out_every_event_to_every_sink() {
    clear_env();
    let feeds = MockApi::new();
    feeds.respond(INFRA_PATH, 200, infra_body());
    feeds.respond(AUDIT_PATH, 503, r#"{"code":503,"message":"unavailable"}"#);
    feeds.respond(
        BILLING_PATH,
        200,
        r#"{"data":[{"name":"Clean bandwidth","status":"open","usage":95,"purchasedQuantity":100,"unit":"Mbps","month":"2024-05"}]}"#,
    );
    let feeds_url = feeds.start().await;

    let grafana = MockApi::new();
    grafana.respond("/api/annotations", 200, r#"{"id":1}"#);
    let grafana_url = grafana.start().await;
    let slack_url = dead_url().await;

    let settings = Settings::try_parse_from([
        "imperva-events",
        "--api-id",
        "id",
        "--api-token",
        "token",
        "--account-id",
        "12345",
        "--init-interval",
        "10",
        "--infra-url",
        feeds_url.as_str(),
        "--api-url",
        feeds_url.as_str(),
        "--slack-url",
        slack_url.as_str(),
        "--slack-token",
        "xoxb",
        "--slack-channel",
        "#sec",
        "--grafana-url",
        grafana_url.as_str(),
        "--grafana-api-key",
        "k",
        "--sink-timeout",
        "5",
    ])
    .unwrap();

    let poller = build_poller(&settings).expect("valid settings");
    assert_eq!(poller.sources().len(), 3);

    let report = poller.run_cycle().await;
    // infra: 2 inside the lookback, audit: failed, billing: 1 alert
    assert_eq!(report.new_events(), 3);
    assert_eq!(report.feed_errors(), 1);
    // console + slack + grafana for each of the 3 events; slack is unreachable
    assert_eq!(report.deliveries.attempted, 9);
    assert_eq!(report.deliveries.failed, 3);
    assert_eq!(grafana.hits("/api/annotations").len(), 3);

    // Audit recovers; infra has nothing new; billing sits in its window.
    let recent = (Utc::now() - ChronoDuration::seconds(30)).timestamp_millis();
    feeds.respond(
        AUDIT_PATH,
        200,
        format!(r#"{{"elements":[{{"time":{recent},"type_description":"User logged in","user_details":"ops@example.com"}}]}}"#),
    );
    let second = poller.run_cycle().await;
    assert_eq!(second.new_events(), 1);
    assert_eq!(second.feed_errors(), 0);
    assert_eq!(feeds.hits(BILLING_PATH).len(), 1);
    assert_eq!(grafana.hits("/api/annotations").len(), 4);
}

#[serial_test::serial]
#[tokio::test]
async fn without_account_billing_is_not_registered() {
    clear_env();
    let settings =
        Settings::try_parse_from(["imperva-events", "--api-id", "id", "--api-token", "t"]).unwrap();
    let poller = build_poller(&settings).unwrap();
    let names: Vec<_> = poller.sources().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["infra", "audit"]);
}

#[serial_test::serial]
#[test]
fn missing_credentials_are_fatal() {
    clear_env();
    let settings = Settings::try_parse_from(["imperva-events", "--api-id", "id"]).unwrap();
    assert_eq!(
        build_poller(&settings).err(),
        Some(ConfigError::Missing("IMPERVA_API_TOKEN"))
    );
}
