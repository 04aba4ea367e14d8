//! Payment gate and payment session lifecycle.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> InFlight -> Acknowledged -> Idle
//! InFlight -> Idle            (connectivity lost, no acknowledgement)
//! any -> Locked               (countdown expired; terminal)
//! ```
//!
//! `disabled` and `Locked` are derived from [`GateInputs`] on every read and
//! never stored, so the gate cannot drift out of sync with the countdown or
//! connectivity.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, PaymentRejected};

/// Amount reported by simulated confirmations.
pub const SIMULATED_AMOUNT: f64 = 5.00;

/// Outside facts the gate depends on, read at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateInputs {
    pub expired: bool,
    pub online: bool,
}

/// Why a payment action is not permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Expired,
    Offline,
    InProgress,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockReason::Expired => "expired",
            BlockReason::Offline => "offline",
            BlockReason::InProgress => "payment in progress",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPhase {
    Idle,
    InFlight,
    Acknowledged,
    Locked,
}

/// Confirmation payload, from the simulated confirmer or an external hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentData {
    pub button_id: String,
    pub amount: f64,
}

impl PaymentData {
    pub fn simulated(button_id: impl Into<String>) -> Self {
        Self {
            button_id: button_id.into(),
            amount: SIMULATED_AMOUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub button_id: String,
    pub started_at: DateTime<Utc>,
}

/// Transient "thank you" shown after a confirmed payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub payment: PaymentData,
    pub at: DateTime<Utc>,
}

/// Read model for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub phase: PaymentPhase,
    pub in_flight: bool,
    pub pending_button: Option<String>,
    pub acknowledgement: Option<Acknowledgement>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub disabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentGate {
    in_flight: Option<PendingPayment>,
    acknowledgement: Option<Acknowledgement>,
    last_success_at: Option<DateTime<Utc>>,
}

impl PaymentGate {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// First applicable reason, in priority order expired, offline, in progress.
    pub fn block_reason(&self, inputs: GateInputs) -> Option<BlockReason> {
        if inputs.expired {
            Some(BlockReason::Expired)
        } else if !inputs.online {
            Some(BlockReason::Offline)
        } else if self.in_flight.is_some() {
            Some(BlockReason::InProgress)
        } else {
            None
        }
    }

    /// `expired || !online || in_flight`
    pub fn is_disabled(&self, inputs: GateInputs) -> bool {
        self.block_reason(inputs).is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn pending(&self) -> Option<&PendingPayment> {
        self.in_flight.as_ref()
    }

    pub fn acknowledgement(&self) -> Option<&Acknowledgement> {
        self.acknowledgement.as_ref()
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at
    }

    pub fn phase(&self, inputs: GateInputs) -> PaymentPhase {
        if inputs.expired {
            PaymentPhase::Locked
        } else if self.in_flight.is_some() {
            PaymentPhase::InFlight
        } else if self.acknowledgement.is_some() {
            PaymentPhase::Acknowledged
        } else {
            PaymentPhase::Idle
        }
    }

    pub fn session(&self, inputs: GateInputs) -> PaymentSession {
        PaymentSession {
            phase: self.phase(inputs),
            in_flight: self.in_flight.is_some(),
            pending_button: self.in_flight.as_ref().map(|p| p.button_id.clone()),
            acknowledgement: self.acknowledgement.clone(),
            last_success_at: self.last_success_at,
            disabled: self.is_disabled(inputs),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a payment. Rejected whenever the gate is disabled.
    pub fn start(
        &mut self,
        button_id: &str,
        inputs: GateInputs,
        now: DateTime<Utc>,
    ) -> Result<&PendingPayment, PaymentRejected> {
        if let Some(reason) = self.block_reason(inputs) {
            return Err(PaymentRejected { reason });
        }
        Ok(&*self.in_flight.insert(PendingPayment {
            button_id: button_id.to_string(),
            started_at: now,
        }))
    }

    /// Confirm the in-flight payment and raise the acknowledgement.
    ///
    /// The caller owns the acknowledgement's display window and must
    /// re-arm it, replacing any window still pending.
    pub fn succeed(
        &mut self,
        payment: PaymentData,
        now: DateTime<Utc>,
    ) -> Result<&Acknowledgement, PaymentError> {
        if self.in_flight.take().is_none() {
            return Err(PaymentError::NotInFlight);
        }
        self.last_success_at = Some(now);
        Ok(&*self.acknowledgement.insert(Acknowledgement { payment, at: now }))
    }

    /// Display window over. Returns `true` if an acknowledgement was showing.
    pub fn clear_acknowledgement(&mut self) -> bool {
        self.acknowledgement.take().is_some()
    }

    /// Connectivity dropped: abandon the in-flight payment, no acknowledgement.
    pub fn connectivity_lost(&mut self) -> Option<PendingPayment> {
        self.in_flight.take()
    }

    /// Countdown expired: abandon any payment and clear the acknowledgement.
    pub fn expire(&mut self) -> Option<PendingPayment> {
        self.acknowledgement = None;
        self.in_flight.take()
    }
}
