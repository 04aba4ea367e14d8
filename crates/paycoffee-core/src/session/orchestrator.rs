//! The session event loop.
//!
//! One task owns every component and applies one discrete update per wake:
//! an inbox message, a countdown tick, a feed wake, a delay firing, or a
//! notification finishing. The snapshot is republished after each update.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, Interval};
use uuid::Uuid;

use super::handle::{Command, SessionHandle};
use super::snapshot::{SessionSnapshot, Theme};
use crate::connectivity::{ConnectivityMonitor, Transition};
use crate::error::{NotificationError, PaymentError, PaymentRejected};
use crate::events::Event;
use crate::feed::{DonationFeedPoller, FeedSource, FeedWake, LoadOutcome};
use crate::notify::{
    payment_message, visit_message, NotificationToken, Notifier, VisitInfo, VisitNotifier,
};
use crate::payment::{BlockReason, ConfirmationPolicy, GateInputs, PaymentData, PaymentGate};
use crate::storage::{Config, ConfirmationMode};
use crate::timer::{next_tick, CountdownTimer, DelaySlot, TaskSlot};

const TICK: Duration = Duration::from_secs(1);

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Name shown on the donation page.
    pub recipient_name: String,
    /// Countdown input, `MM:SS` or seconds.
    pub initial_duration: String,
    pub refresh_interval: Duration,
    pub thank_you_window: Duration,
    pub visit_settle_delay: Duration,
    pub confirmation: ConfirmationPolicy,
    /// The configuration-valid signal.
    pub config_valid: bool,
    /// Platform-reported connectivity at mount.
    pub initial_online: bool,
    pub notify_visit: bool,
    pub notify_payments: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            recipient_name: "Ozo. Designer".into(),
            initial_duration: "10:53".into(),
            refresh_interval: crate::feed::DEFAULT_REFRESH_INTERVAL,
            thank_you_window: Duration::from_secs(5),
            visit_settle_delay: crate::notify::DEFAULT_SETTLE_DELAY,
            confirmation: ConfirmationPolicy::default(),
            config_valid: false,
            initial_online: true,
            notify_visit: true,
            notify_payments: true,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        let confirmation = match config.payment.confirmation {
            ConfirmationMode::Simulated => ConfirmationPolicy::Simulated {
                delay: Duration::from_millis(config.payment.confirmation_delay_ms),
            },
            ConfirmationMode::External => ConfirmationPolicy::External,
        };
        Self {
            recipient_name: config.app.recipient_name.clone(),
            initial_duration: config.app.default_timer.clone(),
            refresh_interval: config.refresh_interval(),
            thank_you_window: Duration::from_millis(config.payment.thank_you_ms),
            visit_settle_delay: Duration::from_millis(config.notifications.settle_delay_ms),
            confirmation,
            config_valid: config.is_valid(),
            initial_online: true,
            notify_visit: config.notifications.visit,
            notify_payments: config.notifications.payments,
        }
    }
}

/// External collaborators.
pub struct SessionDeps {
    pub feed: Arc<dyn FeedSource>,
    pub notifier: Arc<dyn Notifier>,
    pub visit: VisitInfo,
    /// Token returned by the previous load's report, or a fresh one.
    pub token: NotificationToken,
    pub events: Option<mpsc::UnboundedSender<Event>>,
}

/// What survives a session: the token for the next load, plus a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub token: NotificationToken,
    pub last_success_at: Option<DateTime<Utc>>,
    pub payments: u32,
}

type Dispatch = Result<(), NotificationError>;

enum Wake {
    Command(Option<Command>),
    Tick,
    Feed(FeedWake),
    ConfirmDue,
    ThankYouElapsed,
    VisitSettled,
    VisitDispatched(Option<Dispatch>),
    PaymentNotified(Option<Dispatch>),
}

pub struct SessionOrchestrator {
    id: Uuid,
    settings: SessionSettings,
    countdown: CountdownTimer,
    clock: Option<Interval>,
    connectivity: ConnectivityMonitor,
    feed: DonationFeedPoller,
    gate: PaymentGate,
    payments: u32,
    visit: VisitNotifier,
    visit_info: VisitInfo,
    notifier: Arc<dyn Notifier>,
    confirm: DelaySlot,
    thank_you: DelaySlot,
    visit_settle: DelaySlot,
    visit_dispatch: TaskSlot<Dispatch>,
    payment_notify: TaskSlot<Dispatch>,
    inbox: mpsc::UnboundedReceiver<Command>,
    snapshot: watch::Sender<SessionSnapshot>,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl SessionOrchestrator {
    pub fn new(settings: SessionSettings, deps: SessionDeps) -> (Self, SessionHandle) {
        let (commands, inbox) = mpsc::unbounded_channel();
        let countdown = CountdownTimer::new(&settings.initial_duration);
        let connectivity = ConnectivityMonitor::new(settings.initial_online);
        let feed = DonationFeedPoller::new(deps.feed, settings.refresh_interval);
        let visit = VisitNotifier::new(deps.token, settings.visit_settle_delay);
        let gate = PaymentGate::new();

        let initial = build_snapshot(
            &settings.recipient_name,
            &countdown,
            &connectivity,
            &feed,
            &gate,
            &visit,
        );
        let (snapshot, snapshot_rx) = watch::channel(initial);

        let orchestrator = Self {
            id: Uuid::new_v4(),
            settings,
            countdown,
            clock: None,
            connectivity,
            feed,
            gate,
            payments: 0,
            visit,
            visit_info: deps.visit,
            notifier: deps.notifier,
            confirm: DelaySlot::new(),
            thank_you: DelaySlot::new(),
            visit_settle: DelaySlot::new(),
            visit_dispatch: TaskSlot::new(),
            payment_notify: TaskSlot::new(),
            inbox,
            snapshot,
            events: deps.events,
        };
        (orchestrator, SessionHandle::new(commands, snapshot_rx))
    }

    /// Drive the session until shutdown or until every handle is dropped.
    pub async fn run(mut self) -> SessionReport {
        tracing::info!(session = %self.id, "session started");
        self.mount();
        self.publish();

        loop {
            let wake = tokio::select! {
                biased;
                command = self.inbox.recv() => Wake::Command(command),
                () = next_tick(&mut self.clock) => Wake::Tick,
                woke = self.feed.wake() => Wake::Feed(woke),
                () = self.confirm.fired() => Wake::ConfirmDue,
                () = self.thank_you.fired() => Wake::ThankYouElapsed,
                () = self.visit_settle.fired() => Wake::VisitSettled,
                result = self.visit_dispatch.join() => Wake::VisitDispatched(result),
                result = self.payment_notify.join() => Wake::PaymentNotified(result),
            };

            match wake {
                Wake::Command(None) | Wake::Command(Some(Command::Shutdown)) => break,
                Wake::Command(Some(command)) => self.handle_command(command),
                Wake::Tick => self.on_tick(),
                Wake::Feed(woke) => self.on_feed(woke),
                Wake::ConfirmDue => self.on_confirm_due(),
                Wake::ThankYouElapsed => {
                    if self.gate.clear_acknowledgement() {
                        self.emit(Event::AcknowledgementCleared { at: Utc::now() });
                    }
                }
                Wake::VisitSettled => self.on_visit_settled(),
                Wake::VisitDispatched(result) => self.on_visit_dispatched(result),
                Wake::PaymentNotified(result) => {
                    if let Err(e) = result.unwrap_or(Err(NotificationError::Aborted)) {
                        tracing::warn!(error = %e, "payment notification failed");
                    }
                }
            }
            self.publish();
        }

        self.teardown()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    fn mount(&mut self) {
        self.emit(self.countdown.start_event());
        if self.countdown.is_expired() {
            self.on_expired();
        } else {
            self.clock = Some(interval_at(Instant::now() + TICK, TICK));
        }

        let online = self.connectivity.is_online();
        let outcome = self.feed.activate(online);
        self.emit_load(outcome);

        if self.settings.notify_visit {
            if let Some(delay) = self.visit.evaluate(self.settings.config_valid) {
                self.visit_settle.arm(delay);
                self.emit(Event::VisitNotificationScheduled {
                    delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    at: Utc::now(),
                });
            } else if !self.settings.config_valid {
                tracing::debug!("configuration incomplete, visit notification not scheduled");
            }
        }
    }

    fn teardown(&mut self) -> SessionReport {
        self.clock = None;
        self.feed.teardown();
        self.confirm.cancel();
        self.thank_you.cancel();
        self.visit_settle.cancel();
        self.visit_dispatch.cancel();
        self.payment_notify.cancel();
        if self.visit.teardown() {
            tracing::debug!("pending visit notification cancelled");
        }
        self.emit(Event::SessionEnded { at: Utc::now() });
        self.publish();
        tracing::info!(session = %self.id, "session ended");

        SessionReport {
            session_id: self.id,
            token: self.visit.token(),
            last_success_at: self.gate.last_success_at(),
            payments: self.payments,
        }
    }

    // ── Handlers ─────────────────────────────────────────────────────

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartPayment { button_id, reply } => self.start_payment(button_id, reply),
            Command::ConfirmPayment(payment) => self.succeed(payment),
            Command::RetryFeedLoad => {
                let outcome = self.feed.load(self.connectivity.is_online());
                self.emit_load(outcome);
            }
            Command::SetOnline(online) => self.on_connectivity(online),
            Command::Shutdown => {}
        }
    }

    fn gate_inputs(&self) -> GateInputs {
        GateInputs {
            expired: self.countdown.is_expired(),
            online: self.connectivity.is_online(),
        }
    }

    fn start_payment(
        &mut self,
        button_id: String,
        reply: oneshot::Sender<Result<(), PaymentRejected>>,
    ) {
        let inputs = self.gate_inputs();
        let decision = match self.gate.start(&button_id, inputs, Utc::now()) {
            Ok(pending) => {
                tracing::info!(button = %pending.button_id, "payment started");
                self.emit(Event::PaymentStarted {
                    button_id: button_id.clone(),
                    at: Utc::now(),
                });
                if let ConfirmationPolicy::Simulated { delay } = self.settings.confirmation {
                    self.confirm.arm(delay);
                }
                Ok(())
            }
            Err(rejected) => {
                tracing::info!(button = %button_id, reason = %rejected.reason, "payment rejected");
                self.emit(Event::PaymentRejected {
                    button_id,
                    reason: rejected.reason,
                    at: Utc::now(),
                });
                Err(rejected)
            }
        };
        // The caller may have stopped waiting.
        let _ = reply.send(decision);
    }

    fn on_confirm_due(&mut self) {
        if let Some(button_id) = self.gate.pending().map(|p| p.button_id.clone()) {
            self.succeed(PaymentData::simulated(button_id));
        }
    }

    fn succeed(&mut self, payment: PaymentData) {
        let now = Utc::now();
        match self.gate.succeed(payment.clone(), now) {
            Ok(_) => {}
            Err(PaymentError::NotInFlight) => {
                tracing::debug!(button = %payment.button_id, "ignoring confirmation with no payment in flight");
                return;
            }
        }

        self.confirm.cancel();
        self.thank_you.arm(self.settings.thank_you_window);
        self.payments += 1;
        tracing::info!(button = %payment.button_id, amount = payment.amount, "payment succeeded");

        if self.settings.notify_payments {
            let notifier = Arc::clone(&self.notifier);
            let text = payment_message(&payment, now);
            self.payment_notify
                .replace(tokio::spawn(async move { notifier.send(&text).await }));
        }
        self.emit(Event::PaymentSucceeded { payment, at: now });
    }

    fn on_tick(&mut self) {
        if let Some(event) = self.countdown.tick() {
            self.emit(event);
            self.on_expired();
        }
    }

    fn on_expired(&mut self) {
        tracing::info!("countdown expired, payments locked");
        self.clock = None;
        self.confirm.cancel();
        self.thank_you.cancel();
        if let Some(abandoned) = self.gate.expire() {
            self.emit(Event::PaymentAbandoned {
                button_id: abandoned.button_id,
                reason: BlockReason::Expired,
                at: Utc::now(),
            });
        }
    }

    fn on_connectivity(&mut self, online: bool) {
        let Some(transition) = self.connectivity.set_online(online) else {
            return;
        };
        self.emit(Event::ConnectivityChanged {
            online,
            at: Utc::now(),
        });

        match transition {
            Transition::WentOffline => {
                tracing::info!("connectivity lost");
                if self.feed.cancel_in_flight() {
                    tracing::debug!("cancelled outstanding feed fetch");
                }
                if let Some(abandoned) = self.gate.connectivity_lost() {
                    self.confirm.cancel();
                    tracing::info!(button = %abandoned.button_id, "payment abandoned while offline");
                    self.emit(Event::PaymentAbandoned {
                        button_id: abandoned.button_id,
                        reason: BlockReason::Offline,
                        at: Utc::now(),
                    });
                }
            }
            Transition::WentOnline => {
                tracing::info!("connectivity restored");
                let outcome = self.feed.activate(true);
                self.emit_load(outcome);
            }
        }
    }

    fn on_feed(&mut self, woke: FeedWake) {
        match woke {
            FeedWake::IntervalElapsed => {
                let outcome = self.feed.load(self.connectivity.is_online());
                self.emit_load(outcome);
            }
            FeedWake::Completed(completion) => {
                let generation = completion.generation;
                if let Some(event) = self.feed.apply(completion).to_event(generation) {
                    self.emit(event);
                }
            }
        }
    }

    fn on_visit_settled(&mut self) {
        if !self.visit.settle_elapsed() {
            return;
        }
        let notifier = Arc::clone(&self.notifier);
        let text = visit_message(&self.visit_info, Utc::now());
        self.visit_dispatch
            .replace(tokio::spawn(async move { notifier.send(&text).await }));
    }

    fn on_visit_dispatched(&mut self, result: Option<Dispatch>) {
        let result = result.unwrap_or(Err(NotificationError::Aborted));
        self.visit.record(&result);
        match result {
            Ok(()) => {
                tracing::info!(channel = self.notifier.name(), "visit notification delivered");
                self.emit(Event::VisitNotificationSent { at: Utc::now() });
            }
            Err(e) => {
                tracing::warn!(channel = self.notifier.name(), error = %e, "visit notification failed");
                self.emit(Event::VisitNotificationFailed {
                    error: e.to_string(),
                    at: Utc::now(),
                });
            }
        }
    }

    // ── Output ───────────────────────────────────────────────────────

    fn emit(&self, event: Event) {
        tracing::trace!(kind = event.kind(), "event");
        if let Some(events) = &self.events {
            // A host that stopped listening does not stop the session.
            let _ = events.send(event);
        }
    }

    fn emit_load(&self, outcome: LoadOutcome) {
        if let Some(event) = outcome.to_event() {
            self.emit(event);
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(build_snapshot(
            &self.settings.recipient_name,
            &self.countdown,
            &self.connectivity,
            &self.feed,
            &self.gate,
            &self.visit,
        ));
    }
}

fn build_snapshot(
    recipient_name: &str,
    countdown: &CountdownTimer,
    connectivity: &ConnectivityMonitor,
    feed: &DonationFeedPoller,
    gate: &PaymentGate,
    visit: &VisitNotifier,
) -> SessionSnapshot {
    let is_expired = countdown.is_expired();
    let is_online = connectivity.is_online();
    let feed = feed.state().clone();
    SessionSnapshot {
        recipient_name: recipient_name.to_string(),
        is_expired,
        is_online,
        theme: Theme::for_expiry(is_expired),
        remaining_time_display: countdown.display(),
        feed_message: feed.message().map(str::to_string),
        feed,
        payment: gate.session(GateInputs {
            expired: is_expired,
            online: is_online,
        }),
        visit: visit.phase(),
        at: Utc::now(),
    }
}
