//! # Livecast Signaling
//!
//! Wire protocol and reconnecting rendezvous client for livecast. The client
//! owns the connect/retry lifecycle of the out-of-band signaling channel and
//! exposes an inbound event stream plus an outbound send operation; messages
//! sent while the channel is down are queued and flushed on reconnect.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod protocol;

// Re-export main types
pub use client::{ClientEvent, SignalingClient, SignalingConfig, SignalingSender, TransportState};
pub use protocol::{PeerRole, SignalingMessage};
