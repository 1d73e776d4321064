//! Channel type definitions for inter-task communication

use tokio::sync::mpsc;

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Create a channel carrying relayed text frames
pub fn create_relay_channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

