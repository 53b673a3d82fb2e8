//! Foreground-window probe.
//!
//! The tracker only sees this crate through [`FocusProbe`]: given the sampling
//! instant, report which application (and window title) holds input focus.

use chrono::NaiveDateTime;

#[cfg(windows)]
mod windows;

/// Label reported when no focusable window exists.
pub const IDLE_APP: &str = "Idle";

/// Label substituted for an empty or missing application name.
pub const UNKNOWN_APP: &str = "Unknown";

/// The focus target observed by one sample: `(app, title)` is the identity the
/// tracker compares between ticks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FocusSample {
    pub app: String,
    pub title: String,
}

impl FocusSample {
    pub fn new(app: impl Into<String>, title: impl Into<String>) -> Self {
        let app = app.into();
        let app = if app.is_empty() {
            UNKNOWN_APP.to_string()
        } else {
            app
        };
        Self {
            app,
            title: title.into(),
        }
    }

    pub fn idle() -> Self {
        Self {
            app: IDLE_APP.to_string(),
            title: String::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.app == IDLE_APP && self.title.is_empty()
    }
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("focus probing is not supported on this platform")]
    Unsupported,
    #[error("no process owns the foreground window")]
    NoForegroundProcess,
    #[error("os call failed: {0}")]
    Os(String),
}

/// Platform call returning the current focus target.
///
/// Implementations must not block indefinitely. Errors are not fatal: the
/// caller records the tick as [`FocusSample::idle`].
pub trait FocusProbe: Send + Sync {
    fn sample(&self, now: NaiveDateTime) -> Result<FocusSample, ProbeError>;
}

/// Probe backed by the operating system's foreground window.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeProbe;

impl NativeProbe {
    pub fn new() -> Self {
        Self
    }
}

impl FocusProbe for NativeProbe {
    #[cfg(windows)]
    fn sample(&self, _now: NaiveDateTime) -> Result<FocusSample, ProbeError> {
        windows::foreground_sample()
    }

    #[cfg(not(windows))]
    fn sample(&self, _now: NaiveDateTime) -> Result<FocusSample, ProbeError> {
        Err(ProbeError::Unsupported)
    }
}

/// Derive an application label from an executable path: the file name, or
/// [`UNKNOWN_APP`] when there is none.
pub fn label_from_exe_path(exe_path: &str) -> String {
    let name = exe_path
        .rsplit(['\\', '/'])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() {
        UNKNOWN_APP.to_string()
    } else {
        name.to_string()
    }
}
