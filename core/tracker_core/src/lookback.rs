use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;

/// How far back from "now" a stats query looks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lookback {
    #[default]
    AllTime,
    Last24Hours,
    Last48Hours,
    LastWeek,
    LastMonth,
    LastYear,
    Custom(TimeDelta),
}

impl Lookback {
    /// The ranges offered by front ends, in menu order.
    pub const PRESETS: [Lookback; 6] = [
        Lookback::AllTime,
        Lookback::Last24Hours,
        Lookback::Last48Hours,
        Lookback::LastWeek,
        Lookback::LastMonth,
        Lookback::LastYear,
    ];

    /// `None` means no lower bound.
    pub fn duration(&self) -> Option<TimeDelta> {
        match self {
            Lookback::AllTime => None,
            Lookback::Last24Hours => Some(TimeDelta::hours(24)),
            Lookback::Last48Hours => Some(TimeDelta::hours(48)),
            Lookback::LastWeek => Some(TimeDelta::weeks(1)),
            Lookback::LastMonth => Some(TimeDelta::days(30)),
            Lookback::LastYear => Some(TimeDelta::days(365)),
            Lookback::Custom(d) => Some(*d),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Lookback::AllTime => "All time".to_string(),
            Lookback::Last24Hours => "24 hours".to_string(),
            Lookback::Last48Hours => "48 hours".to_string(),
            Lookback::LastWeek => "Week".to_string(),
            Lookback::LastMonth => "Month".to_string(),
            Lookback::LastYear => "Year".to_string(),
            Lookback::Custom(d) => format!("Last {}", custom_key(*d)),
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::AllTime => f.write_str("all"),
            Lookback::Last24Hours => f.write_str("24h"),
            Lookback::Last48Hours => f.write_str("48h"),
            Lookback::LastWeek => f.write_str("week"),
            Lookback::LastMonth => f.write_str("month"),
            Lookback::LastYear => f.write_str("year"),
            Lookback::Custom(d) => f.write_str(&custom_key(*d)),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown range '{0}' (expected all, 24h, 48h, week, month, year, or <n>s|m|h|d|w)")]
pub struct LookbackParseError(String);

impl FromStr for Lookback {
    type Err = LookbackParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let preset = match key.as_str() {
            "all" | "all-time" | "all time" => Some(Lookback::AllTime),
            "24h" | "24 hours" | "day" => Some(Lookback::Last24Hours),
            "48h" | "48 hours" => Some(Lookback::Last48Hours),
            "week" | "1w" => Some(Lookback::LastWeek),
            "month" | "30d" => Some(Lookback::LastMonth),
            "year" | "365d" => Some(Lookback::LastYear),
            _ => None,
        };
        if let Some(p) = preset {
            return Ok(p);
        }
        parse_custom(&key)
            .map(Lookback::Custom)
            .ok_or_else(|| LookbackParseError(s.to_string()))
    }
}

fn parse_custom(key: &str) -> Option<TimeDelta> {
    let (unit_at, _) = key.char_indices().last()?;
    let (num, unit) = key.split_at(unit_at);
    let n: i64 = num.trim().parse().ok()?;
    if n <= 0 {
        return None;
    }
    let secs_per_unit = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 7 * 86_400,
        _ => return None,
    };
    TimeDelta::try_seconds(n.checked_mul(secs_per_unit)?)
}

fn custom_key(d: TimeDelta) -> String {
    let secs = d.num_seconds();
    if secs > 0 && secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs > 0 && secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
