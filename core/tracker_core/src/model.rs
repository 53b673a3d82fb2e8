use chrono::{DateTime, NaiveDateTime, TimeDelta};
use focus_probe::FocusSample;

pub use focus_probe::UNKNOWN_APP;

/// Stored timestamp layout: naive local time, ISO-8601, microsecond precision.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// A closed interval attributed to one focus target. Never mutated once it
/// has been appended to the sequence or the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub app: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Event {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Label used for aggregation; empty labels from legacy rows count as
    /// [`UNKNOWN_APP`].
    pub fn app_label(&self) -> &str {
        if self.app.is_empty() {
            UNKNOWN_APP
        } else {
            &self.app
        }
    }
}

/// The single event still accumulating time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenEvent {
    app: String,
    title: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl OpenEvent {
    pub fn begin(sample: FocusSample, now: NaiveDateTime) -> Self {
        Self {
            app: sample.app,
            title: sample.title,
            start: now,
            end: now,
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Exact, case-sensitive identity comparison.
    pub fn same_target(&self, sample: &FocusSample) -> bool {
        self.app == sample.app && self.title == sample.title
    }

    /// `end` never moves backwards, so `end >= start` holds even if the wall
    /// clock is stepped back.
    pub fn extend(&mut self, now: NaiveDateTime) {
        if now > self.end {
            self.end = now;
        }
    }

    /// Copy with the current `end`, for snapshots.
    pub fn to_event(&self) -> Event {
        Event {
            app: self.app.clone(),
            title: self.title.clone(),
            start: self.start,
            end: self.end,
        }
    }

    pub fn close(self) -> Event {
        Event {
            app: self.app,
            title: self.title,
            start: self.start,
            end: self.end,
        }
    }
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts `T` or space separators, optional
/// fractional seconds, and RFC 3339 strings carrying an offset.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ts);
    }
    DateTime::parse_from_rfc3339(s).ok().map(|t| t.naive_local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn timestamps_accept_isoformat_variants() {
        assert_eq!(parse_timestamp("2026-02-15T09:30:00"), Some(at(9, 30, 0)));
        assert_eq!(parse_timestamp("2026-02-15 09:30:00"), Some(at(9, 30, 0)));
        assert_eq!(
            parse_timestamp("2026-02-15T09:30:00.250000"),
            Some(at(9, 30, 0) + TimeDelta::milliseconds(250))
        );
        assert_eq!(
            parse_timestamp("2026-02-15T09:30:00+08:00"),
            Some(at(9, 30, 0))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn formatted_timestamp_parses_back() {
        let ts = at(23, 59, 58) + TimeDelta::microseconds(123_456);
        let s = format_timestamp(ts);
        assert_eq!(s, "2026-02-15T23:59:58.123456");
        assert_eq!(parse_timestamp(&s), Some(ts));
    }

    #[test]
    fn open_event_end_never_moves_backwards() {
        let mut open = OpenEvent::begin(FocusSample::new("Code", "main.rs"), at(10, 0, 0));
        open.extend(at(10, 0, 5));
        open.extend(at(9, 59, 0));
        assert_eq!(open.end(), at(10, 0, 5));
        let e = open.close();
        assert!(e.end >= e.start);
        assert_eq!(e.duration(), TimeDelta::seconds(5));
    }

    #[test]
    fn identity_is_case_sensitive() {
        let open = OpenEvent::begin(FocusSample::new("Code", "main.rs"), at(10, 0, 0));
        assert!(open.same_target(&FocusSample::new("Code", "main.rs")));
        assert!(!open.same_target(&FocusSample::new("code", "main.rs")));
        assert!(!open.same_target(&FocusSample::new("Code", "Main.rs")));
    }

    #[test]
    fn empty_app_label_counts_as_unknown() {
        let e = Event {
            app: String::new(),
            title: String::new(),
            start: at(1, 0, 0),
            end: at(1, 0, 1),
        };
        assert_eq!(e.app_label(), "Unknown");
    }
}
