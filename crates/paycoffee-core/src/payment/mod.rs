mod gate;

pub use gate::{
    Acknowledgement, BlockReason, GateInputs, PaymentData, PaymentGate, PaymentPhase,
    PaymentSession, PendingPayment, SIMULATED_AMOUNT,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How an in-flight payment gets confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConfirmationPolicy {
    /// Confirm automatically after `delay` with a mock payload.
    Simulated { delay: Duration },
    /// Wait for the host to call `confirm_payment`.
    External,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        ConfirmationPolicy::Simulated {
            delay: Duration::from_secs(2),
        }
    }
}
