//! Integration tests for the session event loop.
//!
//! Runs real sessions on paused virtual time with scripted feed and
//! notifier doubles, and checks the published snapshots and events.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use paycoffee_core::error::{FetchError, PaymentRejected};
use paycoffee_core::feed::{FeedSource, DEFAULT_REFRESH_INTERVAL};
use paycoffee_core::notify::{NotificationToken, Notifier, VisitInfo, VisitPhase};
use paycoffee_core::payment::{BlockReason, ConfirmationPolicy, PaymentData, PaymentPhase};
use paycoffee_core::{
    CommandError, Config, Event, FeedErrorKind, NotificationError, SessionDeps, SessionHandle,
    SessionOrchestrator, SessionReport, SessionSettings, Theme,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

type Step = (Duration, Result<Value, FetchError>);

/// Feed that plays back a script, repeating the last entry.
struct ScriptedFeed {
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: AtomicUsize,
}

impl ScriptedFeed {
    fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch(&self) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(step) = next {
                *last = Some(step);
            }
            last.clone().expect("script is never empty")
        };
        sleep(step.0).await;
        step.1
    }
}

/// Notifier that records every message it is asked to send.
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    delay: Duration,
    fail: bool,
}

impl RecordingNotifier {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            delay: Duration::from_millis(50),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            delay: Duration::from_millis(50),
            fail: true,
        })
    }

    fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        sleep(self.delay).await;
        self.sent.lock().unwrap().push(text.to_string());
        if self.fail {
            Err(NotificationError::Http {
                status: 500,
                body: "boom".into(),
            })
        } else {
            Ok(())
        }
    }
}

struct Running {
    handle: SessionHandle,
    task: JoinHandle<SessionReport>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl Running {
    async fn finish(self) -> (SessionReport, Vec<Event>) {
        self.handle.shutdown().unwrap();
        let report = self.task.await.unwrap();
        let mut events = self.events;
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        (report, seen)
    }
}

fn settings() -> SessionSettings {
    SessionSettings {
        initial_duration: "10:00".into(),
        config_valid: true,
        ..SessionSettings::default()
    }
}

fn start(
    settings: SessionSettings,
    feed: Arc<ScriptedFeed>,
    notifier: Arc<RecordingNotifier>,
    token: NotificationToken,
) -> Running {
    let (tx, events) = mpsc::unbounded_channel();
    let deps = SessionDeps {
        feed,
        notifier,
        visit: VisitInfo::new("https://example.org/donate"),
        token,
        events: Some(tx),
    };
    let (session, handle) = SessionOrchestrator::new(settings, deps);
    let task = tokio::spawn(session.run());
    Running {
        handle,
        task,
        events,
    }
}

fn empty_feed() -> Arc<ScriptedFeed> {
    ScriptedFeed::new(vec![(Duration::from_millis(10), Ok(json!([])))])
}

#[tokio::test(start_paused = true)]
async fn test_feed_not_found_end_to_end() {
    let feed = ScriptedFeed::new(vec![(Duration::from_millis(10), Err(FetchError::Status(404)))]);
    let session = start(settings(), feed, RecordingNotifier::ok(), NotificationToken::default());

    assert_eq!(
        session.handle.snapshot().feed_message.as_deref(),
        Some("Loading supporters...")
    );
    sleep(Duration::from_millis(100)).await;

    let snapshot = session.handle.snapshot();
    assert!(snapshot.feed.supporters.is_empty());
    assert_eq!(snapshot.feed.error, Some(FeedErrorKind::NotFound));
    assert!(!snapshot.feed.loading);
    assert_eq!(snapshot.feed_message.as_deref(), Some("Failed to load supporters"));

    let (_, events) = session.finish().await;
    assert!(events.iter().any(|e| matches!(
        e,
        Event::FeedFailed {
            error: FeedErrorKind::NotFound,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_empty_feed_invites_first_donation() {
    let session = start(settings(), empty_feed(), RecordingNotifier::ok(), NotificationToken::default());
    sleep(Duration::from_millis(100)).await;
    assert_eq!(
        session.handle.snapshot().feed_message.as_deref(),
        Some("No donations yet. Be the first!")
    );
    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_feed_refreshes_on_interval() {
    let feed = ScriptedFeed::new(vec![
        (Duration::from_millis(10), Ok(json!([{"name": "A", "amount": 5}]))),
        (
            Duration::from_millis(10),
            Ok(json!([{"name": "A", "amount": 5}, {"name": "B", "amount": 10}])),
        ),
    ]);
    let session = start(settings(), feed.clone(), RecordingNotifier::ok(), NotificationToken::default());

    sleep(Duration::from_millis(100)).await;
    assert_eq!(session.handle.snapshot().feed.supporters.len(), 1);

    sleep(Duration::from_secs(30)).await;
    let names: Vec<_> = session
        .handle
        .snapshot()
        .feed
        .supporters
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, ["B", "A"]);
    assert_eq!(feed.calls(), 2);
    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_supersedes_slow_fetch() {
    let feed = ScriptedFeed::new(vec![
        (Duration::from_secs(5), Ok(json!([{"name": "Old", "amount": 1}]))),
        (Duration::from_millis(100), Ok(json!([{"name": "New", "amount": 2}]))),
    ]);
    let session = start(settings(), feed.clone(), RecordingNotifier::ok(), NotificationToken::default());

    sleep(Duration::from_millis(10)).await;
    assert_eq!(feed.calls(), 1);
    session.handle.retry_feed_load().unwrap();

    sleep(Duration::from_secs(1)).await;
    assert_eq!(session.handle.snapshot().feed.supporters[0].name, "New");

    sleep(Duration::from_secs(10)).await;
    assert_eq!(session.handle.snapshot().feed.supporters[0].name, "New");

    let (_, events) = session.finish().await;
    assert!(events.iter().any(|e| matches!(
        e,
        Event::FeedRequested {
            superseded: true,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_offline_start_rejects_payments_and_skips_feed() {
    let feed = empty_feed();
    let offline = SessionSettings {
        initial_online: false,
        ..settings()
    };
    let session = start(offline, feed.clone(), RecordingNotifier::ok(), NotificationToken::default());

    assert_eq!(
        session.handle.start_payment("open-aba-scanner-btn").await,
        Err(CommandError::Rejected(PaymentRejected {
            reason: BlockReason::Offline
        }))
    );
    sleep(Duration::from_secs(1)).await;

    let snapshot = session.handle.snapshot();
    assert!(!snapshot.is_online);
    assert!(snapshot.payment.disabled);
    assert!(snapshot.feed.loading);
    assert_eq!(feed.calls(), 0);

    session.handle.set_online(true).unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(feed.calls(), 1);
    assert!(!session.handle.snapshot().feed.loading);
    assert!(session.handle.start_payment("open-aba-scanner-btn").await.is_ok());
    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_simulated_payment_acknowledges_then_clears() {
    let notifier = RecordingNotifier::ok();
    let no_visit = SessionSettings {
        notify_visit: false,
        ..settings()
    };
    let session = start(no_visit, empty_feed(), notifier.clone(), NotificationToken::default());

    session.handle.start_payment("open-aba-scanner-btn").await.unwrap();
    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.payment.phase, PaymentPhase::InFlight);
    assert!(snapshot.payment.disabled);
    assert_eq!(
        session.handle.start_payment("open-acleda-scanner-btn").await,
        Err(CommandError::Rejected(PaymentRejected {
            reason: BlockReason::InProgress
        }))
    );

    sleep(Duration::from_millis(2100)).await;
    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.payment.phase, PaymentPhase::Acknowledged);
    let ack = snapshot.payment.acknowledgement.unwrap();
    assert_eq!(ack.payment, PaymentData::simulated("open-aba-scanner-btn"));
    assert!(snapshot.payment.last_success_at.is_some());

    sleep(Duration::from_secs(5)).await;
    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.payment.phase, PaymentPhase::Idle);
    assert!(snapshot.payment.last_success_at.is_some());

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Payment Alert"));

    let (report, _) = session.finish().await;
    assert_eq!(report.payments, 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_success_rearms_thank_you_window() {
    let no_visit = SessionSettings {
        notify_visit: false,
        ..settings()
    };
    let session = start(no_visit, empty_feed(), RecordingNotifier::ok(), NotificationToken::default());

    session.handle.start_payment("open-aba-scanner-btn").await.unwrap();
    sleep(Duration::from_millis(2200)).await;
    assert_eq!(session.handle.snapshot().payment.phase, PaymentPhase::Acknowledged);

    // Confirms at ~4.2 s, so the window now closes at ~9.2 s instead of ~7.0 s.
    session.handle.start_payment("open-acleda-scanner-btn").await.unwrap();
    sleep(Duration::from_millis(2100)).await;
    let ack = session.handle.snapshot().payment.acknowledgement.unwrap();
    assert_eq!(ack.payment.button_id, "open-acleda-scanner-btn");

    sleep(Duration::from_secs(3)).await;
    assert_eq!(session.handle.snapshot().payment.phase, PaymentPhase::Acknowledged);

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(session.handle.snapshot().payment.phase, PaymentPhase::Idle);

    let (report, events) = session.finish().await;
    assert_eq!(report.payments, 2);
    let cleared = events
        .iter()
        .filter(|e| matches!(e, Event::AcknowledgementCleared { .. }))
        .count();
    assert_eq!(cleared, 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_refresh_interval_keeps_session_alive() {
    let config = Config::from_toml_str("[app]\nrefresh_interval_ms = 0\n").unwrap();
    let from_config = SessionSettings {
        notify_visit: false,
        ..SessionSettings::from_config(&config)
    };
    assert_eq!(from_config.refresh_interval, DEFAULT_REFRESH_INTERVAL);

    let raw_zero = SessionSettings {
        refresh_interval: Duration::ZERO,
        ..from_config
    };
    let feed = empty_feed();
    let session = start(raw_zero, feed.clone(), RecordingNotifier::ok(), NotificationToken::default());

    sleep(Duration::from_millis(100)).await;
    assert_eq!(feed.calls(), 1);
    assert_eq!(session.handle.snapshot().recipient_name, config.app.recipient_name);
    assert!(session.handle.start_payment("open-aba-scanner-btn").await.is_ok());

    sleep(DEFAULT_REFRESH_INTERVAL).await;
    assert_eq!(feed.calls(), 2);
    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_going_offline_mid_payment_abandons_it() {
    let session = start(settings(), empty_feed(), RecordingNotifier::ok(), NotificationToken::default());

    session.handle.start_payment("open-aba-scanner-btn").await.unwrap();
    sleep(Duration::from_millis(500)).await;
    session.handle.set_online(false).unwrap();
    sleep(Duration::from_millis(1)).await;

    let snapshot = session.handle.snapshot();
    assert!(!snapshot.payment.in_flight);
    assert!(snapshot.payment.acknowledgement.is_none());
    assert!(snapshot.payment.disabled);

    // The simulated confirmation was cancelled along with the payment.
    sleep(Duration::from_secs(5)).await;
    assert!(session.handle.snapshot().payment.last_success_at.is_none());

    let (report, events) = session.finish().await;
    assert_eq!(report.last_success_at, None);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::PaymentAbandoned {
            reason: BlockReason::Offline,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_expiry_locks_payments() {
    let short = SessionSettings {
        initial_duration: "00:03".into(),
        confirmation: ConfirmationPolicy::External,
        ..settings()
    };
    let session = start(short, empty_feed(), RecordingNotifier::ok(), NotificationToken::default());
    assert_eq!(session.handle.snapshot().remaining_time_display, "00:03");

    session.handle.start_payment("open-aba-scanner-btn").await.unwrap();
    sleep(Duration::from_millis(3500)).await;

    let snapshot = session.handle.snapshot();
    assert!(snapshot.is_expired);
    assert_eq!(snapshot.theme, Theme::Expired);
    assert_eq!(snapshot.remaining_time_display, "Expired");
    assert_eq!(snapshot.payment.phase, PaymentPhase::Locked);
    assert!(!snapshot.payment.in_flight);

    // A confirmation arriving after expiry is ignored.
    session
        .handle
        .confirm_payment(PaymentData::simulated("open-aba-scanner-btn"))
        .unwrap();
    assert_eq!(
        session.handle.start_payment("open-aba-scanner-btn").await,
        Err(CommandError::Rejected(PaymentRejected {
            reason: BlockReason::Expired
        }))
    );

    let (report, events) = session.finish().await;
    assert_eq!(report.last_success_at, None);
    let expiries = events
        .iter()
        .filter(|e| matches!(e, Event::TimerExpired { .. }))
        .count();
    assert_eq!(expiries, 1);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::PaymentAbandoned {
            reason: BlockReason::Expired,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_zero_duration_is_expired_at_mount() {
    let zero = SessionSettings {
        initial_duration: "00:00".into(),
        ..settings()
    };
    let session = start(zero, empty_feed(), RecordingNotifier::ok(), NotificationToken::default());
    sleep(Duration::from_millis(1)).await;
    assert!(session.handle.snapshot().is_expired);
    assert_eq!(session.handle.snapshot().theme, Theme::Expired);
    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_visit_notification_sent_once() {
    let notifier = RecordingNotifier::ok();
    let session = start(settings(), empty_feed(), notifier.clone(), NotificationToken::default());

    sleep(Duration::from_millis(1000)).await;
    assert!(notifier.messages().is_empty());
    assert_eq!(session.handle.snapshot().visit, VisitPhase::Scheduled);

    sleep(Duration::from_secs(60)).await;
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Website Visit Alert"));
    assert!(messages[0].contains("https://example.org/donate"));
    assert_eq!(session.handle.snapshot().visit, VisitPhase::Delivered);

    let (report, _) = session.finish().await;
    assert!(report.token.sent);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_skips_visit_notification() {
    let notifier = RecordingNotifier::ok();
    let invalid = SessionSettings {
        config_valid: false,
        ..settings()
    };
    let session = start(invalid, empty_feed(), notifier.clone(), NotificationToken::default());
    sleep(Duration::from_secs(5)).await;
    assert!(notifier.messages().is_empty());

    let (report, _) = session.finish().await;
    assert!(!report.token.sent);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_before_settle_cancels_visit() {
    let notifier = RecordingNotifier::ok();
    let session = start(settings(), empty_feed(), notifier.clone(), NotificationToken::default());

    sleep(Duration::from_secs(1)).await;
    let (report, _) = session.finish().await;
    assert!(!report.token.sent);

    sleep(Duration::from_secs(5)).await;
    assert!(notifier.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_mid_dispatch_leaves_token_unsent() {
    let notifier = RecordingNotifier::ok();
    let session = start(settings(), empty_feed(), notifier.clone(), NotificationToken::default());

    // Settle delay is 1.5s; the send itself takes 50ms.
    sleep(Duration::from_millis(1520)).await;
    let (report, _) = session.finish().await;
    assert!(!report.token.sent);

    sleep(Duration::from_secs(1)).await;
    assert!(notifier.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_visit_retries_on_next_load_only() {
    let failing = RecordingNotifier::failing();
    let first = start(settings(), empty_feed(), failing.clone(), NotificationToken::default());
    sleep(Duration::from_secs(30)).await;
    assert_eq!(failing.messages().len(), 1);
    assert_eq!(first.handle.snapshot().visit, VisitPhase::Failed);
    let (report, events) = first.finish().await;
    assert!(!report.token.sent);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::VisitNotificationFailed { .. })));

    let notifier = RecordingNotifier::ok();
    let second = start(settings(), empty_feed(), notifier.clone(), report.token);
    sleep(Duration::from_secs(2)).await;
    let (report, _) = second.finish().await;
    assert!(report.token.sent);
    assert_eq!(notifier.messages().len(), 1);

    let third_notifier = RecordingNotifier::ok();
    let third = start(settings(), empty_feed(), third_notifier.clone(), report.token);
    sleep(Duration::from_secs(5)).await;
    third.finish().await;
    assert!(third_notifier.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_ends_session() {
    let session = start(settings(), empty_feed(), RecordingNotifier::ok(), NotificationToken::default());
    let Running { handle, task, .. } = session;
    let mut watcher = handle.subscribe();
    drop(handle);

    let report = task.await.unwrap();
    assert!(!report.token.sent);
    // The snapshot channel closes with the session.
    while watcher.changed().await.is_ok() {}
}
