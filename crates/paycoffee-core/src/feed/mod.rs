//! Supporter feed: model, sources, and the periodic poller.

mod model;
mod poller;
mod source;

pub use model::{normalize, FeedState, Normalized, Supporter, EMPTY_MESSAGE, LOADING_MESSAGE};
pub use poller::{
    Applied, DonationFeedPoller, FeedCompletion, FeedWake, LoadOutcome, DEFAULT_REFRESH_INTERVAL,
};
pub use source::{FeedSource, HttpFeedSource};
