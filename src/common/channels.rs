//! Channel type definitions for inter-task communication

use tokio::sync::mpsc;

use super::types::FeedEvent;

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Create a new feed event channel with the default buffer size
pub fn create_feed_channel() -> (mpsc::Sender<FeedEvent>, mpsc::Receiver<FeedEvent>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}
