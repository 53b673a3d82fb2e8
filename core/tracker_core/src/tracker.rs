//! The sampling loop and the guarded event state it mutates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use focus_probe::{FocusProbe, FocusSample};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::model::Event;
use crate::session::{transition, FocusState};
use crate::stats::{compute_stats, ranked, AppTotal};
use crate::store::EventStore;

/// Everything the sampling loop mutates. Only reachable through the mutex in
/// [`Shared`], which also makes the tracker the store's only writer.
struct Timeline {
    state: FocusState,
    events: Vec<Event>,
    store: Option<EventStore>,
}

impl Timeline {
    fn apply(&mut self, sample: FocusSample, now: NaiveDateTime) {
        let state = std::mem::take(&mut self.state);
        let (next, closed) = transition(state, sample, now);
        self.state = next;
        if let Some(e) = closed {
            self.commit(e);
        }
    }

    /// Append to the in-memory sequence and persist. A failed write is logged
    /// and the event stays in memory for the rest of the session.
    fn commit(&mut self, e: Event) {
        match self.store.as_ref() {
            Some(store) => {
                if let Err(err) = store.append(&e) {
                    error!("persisting event for '{}' failed: {err}", e.app);
                }
            }
            None => error!("event store closed; '{}' kept in memory only", e.app),
        }
        self.events.push(e);
    }

    fn snapshot(&self) -> Vec<Event> {
        let mut out = Vec::with_capacity(self.events.len() + 1);
        out.extend(self.events.iter().cloned());
        if let Some(open) = self.state.open_event() {
            out.push(open.to_event());
        }
        out
    }
}

struct Shared {
    timeline: Mutex<Timeline>,
    probe: Arc<dyn FocusProbe>,
    clock: Arc<dyn Clock>,
    probe_timeout: Duration,
    /// Set while a probe call is running on the blocking pool, including one
    /// that outlived its timeout.
    probe_busy: Arc<AtomicBool>,
}

/// Clears the busy flag when the probe call returns or unwinds.
struct ProbeCall(Arc<AtomicBool>);

impl Drop for ProbeCall {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Read access for the presentation layer. Cheap to clone; every read copies
/// under the tracker's lock and never hands out a live reference.
#[derive(Clone)]
pub struct TrackerHandle {
    shared: Arc<Shared>,
}

impl TrackerHandle {
    /// Closed events plus the open one (with its current `end`), in order.
    pub async fn snapshot(&self) -> Vec<Event> {
        self.shared.timeline.lock().await.snapshot()
    }

    pub async fn current(&self) -> Option<Event> {
        let timeline = self.shared.timeline.lock().await;
        timeline.state.open_event().map(|open| open.to_event())
    }

    /// Ordered per-application totals over `lookback` (`None` = all time).
    pub async fn stats(&self, lookback: Option<TimeDelta>) -> Vec<AppTotal> {
        let events = self.snapshot().await;
        ranked(compute_stats(&events, lookback, self.now()))
    }

    pub fn now(&self) -> NaiveDateTime {
        self.shared.clock.now()
    }

    /// One sample → decide → act cycle. A no-op once the store is released.
    pub(crate) async fn tick(&self) {
        let now = self.shared.clock.now();
        let sample = self.sample(now).await;
        let mut timeline = self.shared.timeline.lock().await;
        if timeline.store.is_none() {
            debug!("tracker stopped; ignoring sample for '{}'", sample.app);
            return;
        }
        timeline.apply(sample, now);
    }

    async fn sample(&self, now: NaiveDateTime) -> FocusSample {
        if self.shared.probe_busy.swap(true, Ordering::AcqRel) {
            debug!("previous focus probe still running, recording Idle");
            return FocusSample::idle();
        }
        let probe = Arc::clone(&self.shared.probe);
        let busy = ProbeCall(Arc::clone(&self.shared.probe_busy));
        let call = tokio::task::spawn_blocking(move || {
            let _busy = busy;
            probe.sample(now)
        });
        match tokio::time::timeout(self.shared.probe_timeout, call).await {
            Ok(Ok(Ok(sample))) => sample,
            Ok(Ok(Err(err))) => {
                debug!("focus probe failed, recording Idle: {err}");
                FocusSample::idle()
            }
            Ok(Err(err)) => {
                error!("focus probe worker failed, recording Idle: {err}");
                FocusSample::idle()
            }
            Err(_) => {
                warn!(
                    "focus probe timed out (> {}ms), recording Idle",
                    self.shared.probe_timeout.as_millis()
                );
                FocusSample::idle()
            }
        }
    }
}

/// Owns the sampling loop. Start once, stop once.
pub struct ActivityTracker {
    handle: TrackerHandle,
    sample_interval: Duration,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl ActivityTracker {
    /// `history` is what the store already holds; it seeds the in-memory
    /// sequence so stats cover previous sessions.
    pub fn new(
        store: EventStore,
        history: Vec<Event>,
        probe: Arc<dyn FocusProbe>,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Self {
        let shared = Shared {
            timeline: Mutex::new(Timeline {
                state: FocusState::Empty,
                events: history,
                store: Some(store),
            }),
            probe,
            clock,
            probe_timeout: config.probe_timeout,
            probe_busy: Arc::new(AtomicBool::new(false)),
        };
        Self {
            handle: TrackerHandle {
                shared: Arc::new(shared),
            },
            sample_interval: config.sample_interval,
            cancel: CancellationToken::new(),
            worker: None,
        }
    }

    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    /// Spawn the sampling loop on the current tokio runtime.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            warn!("sampling loop already running; ignoring start");
            return;
        }
        info!(
            "sampling loop started ({}ms cadence)",
            self.sample_interval.as_millis()
        );
        self.worker = Some(tokio::spawn(sampling_loop(
            self.handle.clone(),
            self.sample_interval,
            self.cancel.clone(),
        )));
    }

    pub async fn tick(&self) {
        self.handle.tick().await;
    }

    pub async fn snapshot(&self) -> Vec<Event> {
        self.handle.snapshot().await
    }

    /// Let the loop finish its current tick, then close and persist the open
    /// event and release the store, all under the same lock as a tick.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                error!("sampling loop ended abnormally: {err}");
            }
        }

        let mut timeline = self.handle.shared.timeline.lock().await;
        if let Some(last) = std::mem::take(&mut timeline.state).close() {
            info!("flushing open event for '{}'", last.app);
            timeline.commit(last);
        }
        if let Some(store) = timeline.store.take() {
            if let Err(err) = store.close() {
                error!("closing event store failed: {err}");
            }
        }
    }
}

async fn sampling_loop(handle: TrackerHandle, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => handle.tick().await,
            _ = cancel.cancelled() => {
                info!("sampling loop shutting down");
                break;
            }
        }
    }
}
