//! Periodic, cancellation-safe supporter feed.
//!
//! At most one fetch is in flight. A new `load()` aborts the outstanding
//! task and bumps the generation; completions carrying an older generation
//! are discarded without touching state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::model::{normalize, FeedState};
use super::source::FeedSource;
use crate::error::{FeedErrorKind, FetchError};
use crate::events::Event;
use crate::timer::next_tick;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// A finished fetch, tagged with the generation it was issued under.
#[derive(Debug)]
pub struct FeedCompletion {
    pub generation: u64,
    pub result: Result<Value, FetchError>,
}

/// What woke the poller.
#[derive(Debug)]
pub enum FeedWake {
    IntervalElapsed,
    Completed(FeedCompletion),
}

/// Outcome of `load()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Offline; state left untouched.
    Skipped,
    Issued { generation: u64, superseded: bool },
}

/// Outcome of applying a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Published { supporters: usize, dropped: usize },
    Failed(FeedErrorKind),
    /// Superseded or cancelled; state untouched.
    Stale,
}

pub struct DonationFeedPoller {
    source: Arc<dyn FeedSource>,
    refresh_interval: Duration,
    state: FeedState,
    generation: u64,
    in_flight: Option<(u64, JoinHandle<()>)>,
    interval: Option<Interval>,
    completions_tx: mpsc::UnboundedSender<FeedCompletion>,
    completions_rx: mpsc::UnboundedReceiver<FeedCompletion>,
}

impl DonationFeedPoller {
    /// A zero `refresh_interval` falls back to [`DEFAULT_REFRESH_INTERVAL`].
    pub fn new(source: Arc<dyn FeedSource>, refresh_interval: Duration) -> Self {
        let refresh_interval = if refresh_interval.is_zero() {
            tracing::warn!(
                default_ms = DEFAULT_REFRESH_INTERVAL.as_millis() as u64,
                "zero feed refresh interval, using default"
            );
            DEFAULT_REFRESH_INTERVAL
        } else {
            refresh_interval
        };
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            source,
            refresh_interval,
            state: FeedState::default(),
            generation: 0,
            in_flight: None,
            interval: None,
            completions_tx,
            completions_rx,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Load immediately and (re)start the refresh interval.
    pub fn activate(&mut self, online: bool) -> LoadOutcome {
        let period = self.refresh_interval;
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.load(online)
    }

    /// Issue a fetch, superseding any outstanding one. No-op while offline.
    pub fn load(&mut self, online: bool) -> LoadOutcome {
        if !online {
            tracing::debug!("offline, skipping feed cycle");
            return LoadOutcome::Skipped;
        }

        let superseded = self.cancel_in_flight();
        if superseded {
            tracing::debug!(generation = self.generation, "superseding outstanding feed fetch");
        }

        self.generation += 1;
        let generation = self.generation;
        let source = Arc::clone(&self.source);
        let tx = self.completions_tx.clone();
        let handle = tokio::spawn(async move {
            let result = source.fetch().await;
            // Receiver lives as long as the poller; a send error means teardown.
            let _ = tx.send(FeedCompletion { generation, result });
        });
        self.in_flight = Some((generation, handle));

        LoadOutcome::Issued {
            generation,
            superseded,
        }
    }

    /// Abort the outstanding fetch without touching state.
    pub fn cancel_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Resolves on the next interval tick or fetch completion.
    pub async fn wake(&mut self) -> FeedWake {
        tokio::select! {
            completion = self.completions_rx.recv() => match completion {
                Some(completion) => FeedWake::Completed(completion),
                None => std::future::pending::<FeedWake>().await,
            },
            () = next_tick(&mut self.interval) => FeedWake::IntervalElapsed,
        }
    }

    /// Fold a completion into state.
    ///
    /// Only the fetch currently in flight may publish. Anything else was
    /// superseded or cancelled after it had already finished, and is dropped.
    pub fn apply(&mut self, completion: FeedCompletion) -> Applied {
        let pending = self.in_flight.as_ref().map(|(generation, _)| *generation);
        if pending != Some(completion.generation) {
            tracing::debug!(
                stale = completion.generation,
                latest = self.generation,
                "discarding stale feed completion"
            );
            return Applied::Stale;
        }
        self.in_flight = None;

        let outcome = completion
            .result
            .map_err(|e| {
                tracing::warn!(error = %e, "supporter feed unavailable");
                FeedErrorKind::from(&e)
            })
            .and_then(|payload| {
                normalize(&payload).inspect_err(|_| {
                    tracing::warn!("supporter feed payload is not a list");
                })
            });

        match outcome {
            Ok(normalized) => {
                let applied = Applied::Published {
                    supporters: normalized.supporters.len(),
                    dropped: normalized.dropped,
                };
                self.state = FeedState::published(normalized.supporters);
                applied
            }
            Err(kind) => {
                self.state = FeedState::failed(kind);
                Applied::Failed(kind)
            }
        }
    }

    /// Stop the interval and abort any outstanding fetch.
    pub fn teardown(&mut self) {
        self.interval = None;
        self.cancel_in_flight();
    }
}

impl Drop for DonationFeedPoller {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}

impl LoadOutcome {
    pub fn to_event(self) -> Option<Event> {
        match self {
            LoadOutcome::Skipped => None,
            LoadOutcome::Issued {
                generation,
                superseded,
            } => Some(Event::FeedRequested {
                generation,
                superseded,
                at: Utc::now(),
            }),
        }
    }
}

impl Applied {
    pub fn to_event(self, generation: u64) -> Option<Event> {
        match self {
            Applied::Published {
                supporters,
                dropped,
            } => Some(Event::FeedUpdated {
                generation,
                supporters,
                dropped,
                at: Utc::now(),
            }),
            Applied::Failed(error) => Some(Event::FeedFailed {
                generation,
                error,
                at: Utc::now(),
            }),
            Applied::Stale => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Source returning scripted results, each after its own delay.
    struct ScriptedSource {
        script: Mutex<Vec<(Duration, Result<Value, FetchError>)>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<(Duration, Result<Value, FetchError>)>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl FeedSource for ScriptedSource {
        async fn fetch(&self) -> Result<Value, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, result) = {
                let script = self.script.lock().unwrap();
                script[n.min(script.len() - 1)].clone()
            };
            tokio::time::sleep(delay).await;
            result
        }
    }

    async fn next_completion(poller: &mut DonationFeedPoller) -> FeedCompletion {
        loop {
            if let FeedWake::Completed(c) = poller.wake().await {
                return c;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_sorted_snapshot() {
        let source = ScriptedSource::new(vec![(
            Duration::from_millis(10),
            Ok(json!([
                {"name": "A", "amount": 5},
                {"name": "B", "amount": 10},
                {"name": "C", "amount": 5},
            ])),
        )]);
        let mut poller = DonationFeedPoller::new(source, DEFAULT_REFRESH_INTERVAL);
        assert!(poller.state().loading);

        assert!(matches!(poller.activate(true), LoadOutcome::Issued { generation: 1, .. }));
        let completion = next_completion(&mut poller).await;
        assert_eq!(
            poller.apply(completion),
            Applied::Published {
                supporters: 3,
                dropped: 0
            }
        );

        let names: Vec<_> = poller.state().supporters.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["B", "A", "C"]);
        assert!(!poller.state().loading);
        assert_eq!(poller.state().error, None);
        assert!(!poller.is_fetching());
    }

    #[tokio::test(start_paused = true)]
    async fn second_load_supersedes_first() {
        let source = ScriptedSource::new(vec![
            (Duration::from_secs(5), Ok(json!([{"name": "Old", "amount": 1}]))),
            (Duration::from_secs(1), Ok(json!([{"name": "New", "amount": 2}]))),
        ]);
        let mut poller = DonationFeedPoller::new(source.clone(), DEFAULT_REFRESH_INTERVAL);

        poller.load(true);
        while source.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        let second = poller.load(true);
        assert_eq!(
            second,
            LoadOutcome::Issued {
                generation: 2,
                superseded: true
            }
        );

        let completion = next_completion(&mut poller).await;
        assert_eq!(completion.generation, 2);
        poller.apply(completion);
        assert_eq!(poller.state().supporters[0].name, "New");

        // The aborted first fetch never reports back.
        let late = tokio::time::timeout(Duration::from_secs(10), next_completion(&mut poller)).await;
        assert!(late.is_err());
        assert_eq!(poller.state().supporters[0].name, "New");
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completion_is_a_noop() {
        let source = ScriptedSource::new(vec![(Duration::ZERO, Ok(json!([])))]);
        let mut poller = DonationFeedPoller::new(source, DEFAULT_REFRESH_INTERVAL);
        poller.load(true);
        poller.load(true);

        let before = poller.state().clone();
        let stale = FeedCompletion {
            generation: 1,
            result: Err(FetchError::Status(500)),
        };
        assert_eq!(poller.apply(stale), Applied::Stale);
        assert_eq!(poller.state(), &before);
        assert!(poller.state().loading, "stale completion must not clear loading");
        assert_eq!(poller.state().error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_fetch_cannot_publish() {
        let source = ScriptedSource::new(vec![(Duration::ZERO, Ok(json!([])))]);
        let mut poller = DonationFeedPoller::new(source, DEFAULT_REFRESH_INTERVAL);
        let LoadOutcome::Issued { generation, .. } = poller.load(true) else {
            panic!("expected fetch to be issued");
        };
        assert!(poller.cancel_in_flight());

        let finished_before_cancel = FeedCompletion {
            generation,
            result: Ok(json!([{"name": "A", "amount": 1}])),
        };
        assert_eq!(poller.apply(finished_before_cancel), Applied::Stale);
        assert!(poller.state().loading);
        assert!(poller.state().supporters.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_empties_list() {
        let source = ScriptedSource::new(vec![
            (Duration::ZERO, Ok(json!([{"name": "A", "amount": 1}]))),
            (Duration::ZERO, Err(FetchError::Status(404))),
        ]);
        let mut poller = DonationFeedPoller::new(source, DEFAULT_REFRESH_INTERVAL);

        poller.load(true);
        let c = next_completion(&mut poller).await;
        poller.apply(c);
        assert_eq!(poller.state().supporters.len(), 1);

        poller.load(true);
        let c = next_completion(&mut poller).await;
        assert_eq!(poller.apply(c), Applied::Failed(FeedErrorKind::NotFound));
        assert_eq!(poller.state(), &FeedState::failed(FeedErrorKind::NotFound));
        assert_eq!(poller.state().message(), Some("Failed to load supporters"));
    }

    #[tokio::test(start_paused = true)]
    async fn non_array_payload_is_format_error() {
        let source = ScriptedSource::new(vec![(Duration::ZERO, Ok(json!({"a": 1})))]);
        let mut poller = DonationFeedPoller::new(source, DEFAULT_REFRESH_INTERVAL);
        poller.load(true);
        let c = next_completion(&mut poller).await;
        assert_eq!(poller.apply(c), Applied::Failed(FeedErrorKind::FormatError));
    }

    #[tokio::test(start_paused = true)]
    async fn offline_skips_without_touching_state() {
        let source = ScriptedSource::new(vec![(Duration::ZERO, Ok(json!([])))]);
        let mut poller = DonationFeedPoller::new(source.clone(), DEFAULT_REFRESH_INTERVAL);
        assert_eq!(poller.activate(false), LoadOutcome::Skipped);
        assert_eq!(poller.generation(), 0);
        assert!(poller.state().loading);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_wakes_periodically_until_teardown() {
        let source = ScriptedSource::new(vec![(Duration::ZERO, Ok(json!([])))]);
        let mut poller = DonationFeedPoller::new(source, Duration::from_secs(30));
        poller.activate(false);

        let start = Instant::now();
        assert!(matches!(poller.wake().await, FeedWake::IntervalElapsed));
        assert!(start.elapsed() >= Duration::from_secs(30));

        poller.teardown();
        assert!(!poller.is_active());
        let after = tokio::time::timeout(Duration::from_secs(120), poller.wake()).await;
        assert!(after.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_uses_default_period() {
        let source = ScriptedSource::new(vec![(Duration::ZERO, Ok(json!([])))]);
        let mut poller = DonationFeedPoller::new(source, Duration::ZERO);
        assert_eq!(poller.refresh_interval(), DEFAULT_REFRESH_INTERVAL);
        poller.activate(false);

        let start = Instant::now();
        assert!(matches!(poller.wake().await, FeedWake::IntervalElapsed));
        assert!(start.elapsed() >= DEFAULT_REFRESH_INTERVAL);
    }
}
