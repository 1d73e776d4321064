//! Streaming relay from exchange sockets to client sockets

pub mod downstream;
pub mod session;
pub mod upstream;

pub use downstream::{ChannelDownstream, Downstream, WebSocketDownstream};
pub use session::{RelayHandle, RelayReport, StreamRelay, TerminationReason};
pub use upstream::ChannelSubscription;
