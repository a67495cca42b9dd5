//! Error types for livecast

use std::time::Duration;
use thiserror::Error;

/// Main error type for livecast operations
#[derive(Error, Debug)]
pub enum CastError {
    /// Signaling or media transport fault
    #[error("Transport error: {reason}")]
    Transport {
        /// Reason for transport error
        reason: String,
    },

    /// An internal channel was closed before the send completed
    #[error("Channel closed: {channel}")]
    ChannelClosed {
        /// Name of the closed channel
        channel: String,
    },

    /// Negotiation with a single viewer failed
    #[error("Negotiation with viewer {viewer_id} failed: {reason}")]
    Negotiation {
        /// Viewer the failed session belongs to
        viewer_id: String,
        /// Reason negotiation failed
        reason: String,
    },

    /// Local media capture was denied by the user or platform
    #[error("Media access denied: {reason}")]
    MediaAccessDenied {
        /// Reason access was denied
        reason: String,
    },

    /// Invalid state error
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Operation timed out error
    #[error("Operation timed out: {operation} after {duration:?}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Duration after which timeout occurred
        duration: Duration,
    },
}

impl CastError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> String {
        match self {
            CastError::Transport { .. } => "TRANSPORT_ERROR".to_string(),
            CastError::ChannelClosed { .. } => "CHANNEL_CLOSED".to_string(),
            CastError::Negotiation { .. } => "NEGOTIATION_FAILED".to_string(),
            CastError::MediaAccessDenied { .. } => "MEDIA_ACCESS_DENIED".to_string(),
            CastError::InvalidState { .. } => "INVALID_STATE".to_string(),
            CastError::Timeout { .. } => "TIMEOUT".to_string(),
        }
    }
}
