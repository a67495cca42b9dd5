//! Broadcast configuration

use livecast_signaling::SignalingConfig;
use std::time::Duration;

/// Configuration for a broadcasting endpoint
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Signaling channel settings: rendezvous URL, reconnect delay, outbound
    /// queue depth
    pub signaling: SignalingConfig,
    /// How long a session may negotiate before it is closed as stalled
    pub negotiation_timeout: Duration,
    /// Sender name attached to outbound chat messages
    pub display_name: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            signaling: SignalingConfig::default(),
            negotiation_timeout: Duration::from_secs(30),
            display_name: "broadcaster".to_string(),
        }
    }
}
