use std::time::Duration;

pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Cadence of the sampling loop.
    pub sample_interval: Duration,
    /// Upper bound on one probe call; a slower probe counts as Idle.
    pub probe_timeout: Duration,
}

impl TrackerConfig {
    /// Build from millisecond settings. Zero intervals are raised to 1ms; a
    /// missing probe timeout defaults to one tick.
    pub fn from_millis(sample_ms: u64, probe_timeout_ms: Option<u64>) -> Self {
        let sample_interval = Duration::from_millis(sample_ms.max(1));
        let probe_timeout = probe_timeout_ms
            .map(|ms| Duration::from_millis(ms.max(1)))
            .unwrap_or(sample_interval);
        Self {
            sample_interval,
            probe_timeout,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_millis(DEFAULT_SAMPLE_INTERVAL_MS, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_samples_once_per_second() {
        let cfg = TrackerConfig::default();
        assert_eq!(cfg.sample_interval, Duration::from_secs(1));
        assert_eq!(cfg.probe_timeout, Duration::from_secs(1));
    }

    #[test]
    fn zero_values_are_raised() {
        let cfg = TrackerConfig::from_millis(0, Some(0));
        assert_eq!(cfg.sample_interval, Duration::from_millis(1));
        assert_eq!(cfg.probe_timeout, Duration::from_millis(1));
    }
}
