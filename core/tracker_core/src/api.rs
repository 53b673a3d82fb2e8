//! HTTP surface polled by the UI. The core never pushes; clients poll
//! `/stats` on their own timer.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::lookback::Lookback;
use crate::model::format_timestamp;
use crate::stats::fmt_hms;
use crate::tracker::TrackerHandle;

#[derive(Clone)]
pub struct AppState {
    tracker: TrackerHandle,
    window_visible: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(tracker: TrackerHandle, shutdown: CancellationToken) -> Self {
        Self {
            tracker,
            window_visible: Arc::new(AtomicBool::new(true)),
            shutdown,
        }
    }
}

#[derive(Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Serialize)]
struct ErrResponse {
    ok: bool,
    error: &'static str,
}

fn ok<T: Serialize>(data: Option<T>) -> Response {
    Json(OkResponse { ok: true, data }).into_response()
}

fn err(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrResponse { ok: false, error })).into_response()
}

#[derive(Deserialize)]
pub struct StatsQuery {
    /// Preset key (`all`, `24h`, `48h`, `week`, `month`, `year`) or a custom
    /// span such as `90m`. Absent means all time.
    #[serde(default)]
    range: Option<String>,
}

#[derive(Serialize)]
struct RangeInfo {
    key: String,
    label: String,
}

#[derive(Serialize)]
struct StatsRow {
    app: String,
    seconds: f64,
    hms: String,
}

#[derive(Serialize)]
struct StatsView {
    range: String,
    label: String,
    generated_at: String,
    items: Vec<StatsRow>,
}

#[derive(Serialize)]
struct NowView {
    app: String,
    title: String,
    start: String,
    end: String,
    seconds: f64,
}

#[derive(Serialize)]
struct WindowView {
    visible: bool,
}

#[derive(Serialize)]
struct HealthInfo {
    service: &'static str,
    version: &'static str,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/ranges", get(get_ranges))
        .route("/stats", get(get_stats))
        .route("/now", get(get_now))
        .route("/window", get(get_window))
        .route("/window/show", post(post_window_show).options(options_ok))
        .route("/window/hide", post(post_window_hide).options(options_ok))
        .route("/app/exit", post(post_app_exit).options(options_ok))
        .with_state(state)
        .layer(cors)
}

async fn options_ok() -> impl IntoResponse {
    StatusCode::OK
}

async fn health() -> Response {
    ok(Some(HealthInfo {
        service: "tracker_core",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_ranges() -> Response {
    let ranges: Vec<RangeInfo> = Lookback::PRESETS
        .iter()
        .map(|l| RangeInfo {
            key: l.to_string(),
            label: l.label(),
        })
        .collect();
    ok(Some(ranges))
}

async fn get_stats(State(state): State<AppState>, Query(q): Query<StatsQuery>) -> Response {
    let lookback = match q.range.as_deref() {
        None => Lookback::AllTime,
        Some(raw) => match raw.parse::<Lookback>() {
            Ok(l) => l,
            Err(_) => return err(StatusCode::BAD_REQUEST, "invalid_range"),
        },
    };

    let generated_at = format_timestamp(state.tracker.now());
    let items = state
        .tracker
        .stats(lookback.duration())
        .await
        .into_iter()
        .map(|t| StatsRow {
            hms: fmt_hms(t.seconds),
            app: t.app,
            seconds: t.seconds,
        })
        .collect();

    ok(Some(StatsView {
        range: lookback.to_string(),
        label: lookback.label(),
        generated_at,
        items,
    }))
}

async fn get_now(State(state): State<AppState>) -> Response {
    let current = state.tracker.current().await.map(|e| NowView {
        seconds: e.duration().num_milliseconds() as f64 / 1000.0,
        start: format_timestamp(e.start),
        end: format_timestamp(e.end),
        app: e.app,
        title: e.title,
    });
    ok(current)
}

async fn get_window(State(state): State<AppState>) -> Response {
    ok(Some(WindowView {
        visible: state.window_visible.load(Ordering::SeqCst),
    }))
}

async fn post_window_show(State(state): State<AppState>) -> Response {
    state.window_visible.store(true, Ordering::SeqCst);
    ok(Some(WindowView { visible: true }))
}

async fn post_window_hide(State(state): State<AppState>) -> Response {
    state.window_visible.store(false, Ordering::SeqCst);
    ok(Some(WindowView { visible: false }))
}

async fn post_app_exit(State(state): State<AppState>) -> Response {
    info!("exit requested over http");
    state.shutdown.cancel();
    ok::<()>(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::TrackerConfig;
    use crate::model::Event;
    use crate::store::EventStore;
    use crate::tracker::ActivityTracker;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use focus_probe::{FocusProbe, FocusSample, ProbeError};
    use serde_json::Value;

    struct FixedProbe;

    impl FocusProbe for FixedProbe {
        fn sample(&self, _now: NaiveDateTime) -> Result<FocusSample, ProbeError> {
            Ok(FocusSample::new("Terminal", "bash"))
        }
    }

    fn t(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + TimeDelta::seconds(secs)
    }

    async fn state_with_history() -> (ActivityTracker, AppState) {
        let history = vec![
            Event {
                app: "Code".to_string(),
                title: "main.rs".to_string(),
                start: t(0),
                end: t(3_600),
            },
            Event {
                app: "Firefox".to_string(),
                title: "Docs".to_string(),
                start: t(3_601),
                end: t(3_661),
            },
        ];
        let clock = std::sync::Arc::new(ManualClock::new(t(90_000)));
        let tracker = ActivityTracker::new(
            EventStore::open_in_memory().unwrap(),
            history,
            std::sync::Arc::new(FixedProbe),
            clock as std::sync::Arc<dyn Clock>,
            TrackerConfig::default(),
        );
        tracker.tick().await;
        let state = AppState::new(tracker.handle(), CancellationToken::new());
        (tracker, state)
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn stats_are_ordered_and_formatted() {
        let (_tracker, state) = state_with_history().await;
        let resp = get_stats(State(state), Query(StatsQuery { range: None })).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["range"], "all");
        let items = body["data"]["items"].as_array().unwrap();
        assert_eq!(items[0]["app"], "Code");
        assert_eq!(items[0]["hms"], "01:00:00");
        assert_eq!(items[1]["app"], "Firefox");
        assert_eq!(items[1]["seconds"], 60.0);
        // Open event has zero length so far.
        assert_eq!(items[2]["app"], "Terminal");
    }

    #[tokio::test]
    async fn stats_respect_range() {
        let (_tracker, state) = state_with_history().await;
        // now = t(90_000); 24h window starts at t(3_600).
        let resp = get_stats(
            State(state),
            Query(StatsQuery {
                range: Some("24h".to_string()),
            }),
        )
        .await;
        let body = body_json(resp).await;
        let items = body["data"]["items"].as_array().unwrap();
        let apps: Vec<&str> = items.iter().map(|i| i["app"].as_str().unwrap()).collect();
        assert_eq!(apps, vec!["Firefox", "Code", "Terminal"]);
        assert_eq!(items[1]["seconds"], 0.0);
    }

    #[tokio::test]
    async fn unknown_range_is_rejected() {
        let (_tracker, state) = state_with_history().await;
        let resp = get_stats(
            State(state),
            Query(StatsQuery {
                range: Some("fortnight".to_string()),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "invalid_range");
    }

    #[tokio::test]
    async fn now_reports_open_event() {
        let (_tracker, state) = state_with_history().await;
        let body = body_json(get_now(State(state)).await).await;
        assert_eq!(body["data"]["app"], "Terminal");
        assert_eq!(body["data"]["title"], "bash");
    }

    #[tokio::test]
    async fn window_visibility_toggles() {
        let (_tracker, state) = state_with_history().await;
        post_window_hide(State(state.clone())).await;
        let body = body_json(get_window(State(state.clone())).await).await;
        assert_eq!(body["data"]["visible"], false);
        post_window_show(State(state.clone())).await;
        let body = body_json(get_window(State(state)).await).await;
        assert_eq!(body["data"]["visible"], true);
    }

    #[tokio::test]
    async fn exit_cancels_shutdown_token() {
        let (_tracker, state) = state_with_history().await;
        let token = state.shutdown.clone();
        post_app_exit(State(state)).await;
        assert!(token.is_cancelled());
    }
}
