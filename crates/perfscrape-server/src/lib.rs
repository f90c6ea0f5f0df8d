//! HTTP exposition server: Prometheus text format.
//!
//! Every `GET /metrics` runs one scrape on a blocking thread and returns the
//! records as Prometheus text. The scrape deadline follows the scraper's
//! `X-Prometheus-Scrape-Timeout-Seconds` header minus the configured margin,
//! so the reply beats the caller's own timeout.

pub mod text;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};

use perfscrape_core::{ScrapeConfig, ScrapeReport, Scraper, TaskReport};

pub use text::{encode_text, metric_families, text_content_type};

/// Header carrying the caller's scrape timeout in seconds.
pub const TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

/// Default number of scrapes allowed to run at once.
pub const DEFAULT_MAX_REQUESTS: usize = 5;

/// Shared server state.
struct AppState {
    scraper: Arc<Scraper>,
    config: ScrapeConfig,
    permits: Arc<Semaphore>,
    last: Mutex<Option<LastScrape>>,
}

/// What `/health` reports about the most recent scrape.
#[derive(Clone, Serialize)]
struct LastScrape {
    id: String,
    elapsed: f64,
    records: usize,
    dropped_records: u64,
    tasks: BTreeMap<String, TaskReport>,
}

impl From<&ScrapeReport> for LastScrape {
    fn from(report: &ScrapeReport) -> Self {
        Self {
            id: report.id.to_string(),
            elapsed: report.elapsed.as_secs_f64(),
            records: report.records.len(),
            dropped_records: report.dropped_records,
            tasks: report.tasks.clone(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    provider: &'static str,
    collectors: Vec<&'static str>,
    in_flight: usize,
    stragglers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_scrape: Option<LastScrape>,
}

async fn handle_metrics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let Ok(_permit) = Arc::clone(&state.permits).try_acquire_owned() else {
        warn!("rejecting scrape: too many concurrent requests");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "too many concurrent scrapes\n",
        )
            .into_response();
    };

    let requested = headers
        .get(TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok());
    let deadline = state.config.deadline_for(requested);
    let filter: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| key == "collect[]")
        .map(|(_, value)| value)
        .collect();

    let scraper = Arc::clone(&state.scraper);
    let outcome = tokio::task::spawn_blocking(move || {
        let filter = (!filter.is_empty()).then_some(filter);
        scraper.run_scrape_filtered(deadline, filter.as_deref())
    })
    .await;

    match outcome {
        Ok(Ok(report)) => {
            *state.last.lock().await = Some(LastScrape::from(&report));
            match encode_text(&report.records) {
                Ok(body) => (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, text_content_type())],
                    body,
                )
                    .into_response(),
                Err(e) => {
                    error!("scrape {}: encoding failed: {e}", report.id);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("encoding failed: {e}\n"),
                    )
                        .into_response()
                }
            }
        }
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("scrape failed: {e}\n"),
        )
            .into_response(),
        Err(e) => {
            error!("scrape worker did not complete: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "scrape worker did not complete\n",
            )
                .into_response()
        }
    }
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let last = state.last.lock().await.clone();
    let status = match &last {
        None => "idle",
        Some(l) if l.tasks.values().all(TaskReport::succeeded) => "healthy",
        Some(_) => "degraded",
    };
    Json(HealthResponse {
        status: status.to_string(),
        provider: state.scraper.provider_name(),
        collectors: state.scraper.task_names(),
        in_flight: state.scraper.in_flight(),
        stragglers: state.scraper.stragglers(),
        last_scrape: last,
    })
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let collectors = state.scraper.task_names();
    Json(serde_json::json!({
        "name": "perfscrape",
        "version": perfscrape_core::VERSION,
        "provider": state.scraper.provider_name(),
        "collectors": collectors,
        "timeout_secs": state.config.timeout_secs,
        "endpoints": {
            "/": "This API index",
            "/metrics": {
                "method": "GET",
                "description": "Run one scrape and return Prometheus text",
                "params": {
                    "collect[]": format!("Restrict to the named collectors (repeatable). Available: {}", collectors.join(", ")),
                },
                "headers": {
                    TIMEOUT_HEADER: "Caller timeout in seconds; the scrape deadline is this minus the configured margin",
                },
            },
            "/health": "Last scrape summary",
        },
        "examples": {
            "all": "/metrics",
            "single_collector": format!("/metrics?collect[]={}", collectors.first().copied().unwrap_or("cpu")),
        }
    }))
}

/// Build the axum router.
pub fn build_router(scraper: Arc<Scraper>, config: ScrapeConfig, max_requests: usize) -> Router {
    let state = Arc::new(AppState {
        scraper,
        config,
        permits: Arc::new(Semaphore::new(max_requests)),
        last: Mutex::new(None),
    });

    Router::new()
        .route("/", get(handle_index))
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Run the HTTP exposition server until it fails.
pub async fn run_server(
    scraper: Arc<Scraper>,
    config: ScrapeConfig,
    host: &str,
    port: u16,
    max_requests: usize,
) -> std::io::Result<()> {
    let app = build_router(scraper, config, max_requests);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{addr}/metrics");
    axum::serve(listener, app).await
}
