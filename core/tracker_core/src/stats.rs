//! Time-per-application aggregation over an event snapshot.

use std::collections::HashMap;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::model::Event;

/// Application label → accumulated seconds. No ordering.
pub type StatsSnapshot = HashMap<String, f64>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppTotal {
    pub app: String,
    pub seconds: f64,
}

/// Sum durations per application. With a `lookback`, events ending before
/// `now - lookback` are ignored and overlapping events are clipped to the
/// window. Negative durations (clock skew, bad rows) are dropped.
pub fn compute_stats(
    events: &[Event],
    lookback: Option<TimeDelta>,
    now: NaiveDateTime,
) -> StatsSnapshot {
    let window_start = lookback.and_then(|d| now.checked_sub_signed(d));

    let mut stats = StatsSnapshot::new();
    for e in events {
        let duration = match window_start {
            None => e.end - e.start,
            Some(ws) => {
                if e.end < ws {
                    continue;
                }
                e.end - e.start.max(ws)
            }
        };
        if duration < TimeDelta::zero() {
            continue;
        }
        *stats.entry(e.app_label().to_string()).or_insert(0.0) += seconds(duration);
    }
    stats
}

/// Descending by seconds, ties broken by label so output is stable.
pub fn ranked(stats: StatsSnapshot) -> Vec<AppTotal> {
    let mut out: Vec<AppTotal> = stats
        .into_iter()
        .map(|(app, seconds)| AppTotal { app, seconds })
        .collect();
    out.sort_by(|a, b| {
        b.seconds
            .total_cmp(&a.seconds)
            .then_with(|| a.app.cmp(&b.app))
    });
    out
}

fn seconds(d: TimeDelta) -> f64 {
    match d.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => d.num_seconds() as f64,
    }
}

/// `HH:MM:SS`, hours unbounded.
pub fn fmt_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{h:02}:{m:02}:{s:02}")
}
