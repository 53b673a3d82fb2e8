//! Sample → decide state machine. Pure: no timer, no I/O, no lock.

use chrono::NaiveDateTime;
use focus_probe::FocusSample;

use crate::model::{Event, OpenEvent};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FocusState {
    /// Before the first sample.
    #[default]
    Empty,
    Open(OpenEvent),
}

impl FocusState {
    pub fn open_event(&self) -> Option<&OpenEvent> {
        match self {
            FocusState::Empty => None,
            FocusState::Open(open) => Some(open),
        }
    }

    /// Close whatever is open, leaving nothing behind.
    pub fn close(self) -> Option<Event> {
        match self {
            FocusState::Empty => None,
            FocusState::Open(open) => Some(open.close()),
        }
    }
}

/// Apply one sample taken at `now`. Returns the next state and the event that
/// was closed by this sample, if the focus target changed.
pub fn transition(
    state: FocusState,
    sample: FocusSample,
    now: NaiveDateTime,
) -> (FocusState, Option<Event>) {
    match state {
        FocusState::Empty => (FocusState::Open(OpenEvent::begin(sample, now)), None),
        FocusState::Open(mut open) if open.same_target(&sample) => {
            open.extend(now);
            (FocusState::Open(open), None)
        }
        FocusState::Open(open) => {
            let closed = open.close();
            (
                FocusState::Open(OpenEvent::begin(sample, now)),
                Some(closed),
            )
        }
    }
}
