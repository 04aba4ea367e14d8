//! Session orchestration: composes the countdown, connectivity, feed,
//! payment gate, and visit notifier behind one event loop.

mod handle;
mod orchestrator;
mod snapshot;

pub use handle::SessionHandle;
pub use orchestrator::{SessionDeps, SessionOrchestrator, SessionReport, SessionSettings};
pub use snapshot::{SessionSnapshot, Theme};
