//! Online/offline tracking.
//!
//! Edge-triggered and last-write-wins: no polling, no debounce. The session
//! loop is the single writer; anything else reads through [`ConnectivityMonitor::subscribe`].

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub online: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOnline,
    WentOffline,
}

#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    /// Seed with the platform-reported connectivity.
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(ConnectivityState { online });
        Self { state }
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().online
    }

    /// Record a platform edge. Returns `None` when the value did not change.
    pub fn set_online(&self, online: bool) -> Option<Transition> {
        let changed = self.state.send_if_modified(|state| {
            if state.online == online {
                false
            } else {
                state.online = online;
                true
            }
        });
        match (changed, online) {
            (false, _) => None,
            (true, true) => Some(Transition::WentOnline),
            (true, false) => Some(Transition::WentOffline),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }
}
