use tokio::sync::{mpsc, oneshot, watch};

use super::snapshot::SessionSnapshot;
use crate::error::{CommandError, PaymentRejected};
use crate::payment::PaymentData;

/// Inbox message. Connectivity edges travel here too, so every input is
/// applied in the order it was sent.
#[derive(Debug)]
pub(crate) enum Command {
    StartPayment {
        button_id: String,
        reply: oneshot::Sender<Result<(), PaymentRejected>>,
    },
    ConfirmPayment(PaymentData),
    RetryFeedLoad,
    SetOnline(bool),
    Shutdown,
}

/// Cloneable front door to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        snapshot: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self { commands, snapshot }
    }

    fn send(&self, command: Command) -> Result<(), CommandError> {
        self.commands
            .send(command)
            .map_err(|_| CommandError::SessionClosed)
    }

    /// Ask the gate to start a payment and wait for its decision.
    pub async fn start_payment(&self, button_id: impl Into<String>) -> Result<(), CommandError> {
        let (reply, decision) = oneshot::channel();
        self.send(Command::StartPayment {
            button_id: button_id.into(),
            reply,
        })?;
        decision
            .await
            .map_err(|_| CommandError::SessionClosed)?
            .map_err(CommandError::from)
    }

    /// Deliver an external payment confirmation. Ignored if nothing is in flight.
    pub fn confirm_payment(&self, payment: PaymentData) -> Result<(), CommandError> {
        self.send(Command::ConfirmPayment(payment))
    }

    pub fn retry_feed_load(&self) -> Result<(), CommandError> {
        self.send(Command::RetryFeedLoad)
    }

    /// Platform connectivity edge.
    pub fn set_online(&self, online: bool) -> Result<(), CommandError> {
        self.send(Command::SetOnline(online))
    }

    pub fn shutdown(&self) -> Result<(), CommandError> {
        self.send(Command::Shutdown)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
