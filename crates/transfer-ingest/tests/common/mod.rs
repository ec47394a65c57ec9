//! Shared fixtures for ingestion integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use transfer_common::{Source, TransferRecord};
use transfer_ingest::config::{FetchConfig, IngestConfig};
use transfer_ingest::schema::parse_source_date;
use transfer_ingest::IngestionOrchestrator;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LEAGUE_PATH: &str = "/tournaments/league_transfers";

/// One listing row
#[derive(Debug, Clone, Copy)]
pub struct Row {
    pub player: &'static str,
    pub date: &'static str,
    pub club: &'static str,
    pub contract: &'static str,
}

pub fn signing(player: &'static str, date: &'static str) -> Row {
    Row {
        player,
        date,
        club: "Red Lions",
        contract: "Classic Contract",
    }
}

pub fn release(player: &'static str, date: &'static str) -> Row {
    Row {
        player,
        date,
        club: "Blue Sharks",
        contract: "Contract Cancel",
    }
}

/// Render a listing page; `last_page` adds a pagination control
pub fn listing_page(rows: &[Row], last_page: Option<u32>) -> String {
    let body: String = rows
        .iter()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td><a href=\"/players/{}\">{}</a></td><td>{}</td><td>Transfer</td><td>{}</td></tr>\n",
                r.date, r.player, r.player, r.club, r.contract
            )
        })
        .collect();

    let pagination = match last_page {
        Some(last) => {
            let items: String = (1..=last)
                .map(|p| format!("<li><a href=\"?page={}\">{}</a></li>", p, p))
                .collect();
            format!("<ul class=\"pagination\">{}</ul>", items)
        },
        None => String::new(),
    };

    format!(
        r#"<html><body>
        <table>
          <thead><tr><th>Date</th><th>Player</th><th>Club</th><th>Transfer Type</th><th>Contract Type</th></tr></thead>
          <tbody>
          {}
          </tbody>
        </table>
        {}
        </body></html>"#,
        body, pagination
    )
}

/// Serve `html` for one page of a source, expecting exactly `times` requests
pub async fn mount_page(server: &MockServer, source_id: &str, page: u32, html: String, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", LEAGUE_PATH, source_id)))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .expect(times)
        .mount(server)
        .await;
}

/// Answer every request for a source with `status`, expecting `times` requests
pub async fn mount_status(server: &MockServer, source_id: &str, status: u16, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", LEAGUE_PATH, source_id)))
        .respond_with(ResponseTemplate::new(status))
        .expect(times)
        .mount(server)
        .await;
}

pub fn fast_fetch() -> FetchConfig {
    FetchConfig {
        retry_delay_ms: 10,
        timeout_secs: 5,
        ..FetchConfig::default()
    }
}

pub fn config(server: &MockServer, sources: Vec<Source>) -> IngestConfig {
    IngestConfig::builder()
        .base_url(Url::parse(&server.uri()).unwrap())
        .sources(sources)
        .fetch(fast_fetch())
        .build()
}

pub fn orchestrator(config: &IngestConfig) -> IngestionOrchestrator {
    IngestionOrchestrator::from_config(config).unwrap()
}

/// The record the pipeline produces for `row` when served by `server`
pub fn expected_record(server: &MockServer, league: &str, row: &Row) -> TransferRecord {
    TransferRecord::new(
        league,
        row.player,
        format!("{}/players/{}", server.uri(), row.player),
        parse_source_date(row.date).unwrap(),
        row.club,
        row.contract,
    )
    .unwrap()
}

pub fn players(records: &[TransferRecord]) -> Vec<&str> {
    records.iter().map(|r| r.player()).collect()
}

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,transfer_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}
