//! Signaling protocol messages
//!
//! Every wire message is a JSON object with a `type` tag plus payload fields.
//! Directed negotiation messages carry `to` when sent and `from` when
//! received; the rendezvous service rewrites the addressing on the way
//! through. Dispatch is an exhaustive match over the closed variant set, so
//! an added message kind is a compile error at every dispatch site.

use livecast_core::{SessionDescription, TransportCandidate, ViewerId};
use serde::{Deserialize, Serialize};

/// Declared role of an endpoint, announced in the `join` message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    /// Sends local media to every viewer
    Broadcaster,
    /// Receives the broadcaster's media
    Viewer,
}

/// Signaling messages exchanged with the rendezvous service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingMessage {
    /// Announce this endpoint's role; sent once per connection epoch
    Join {
        /// Role this endpoint plays
        role: PeerRole,
    },
    /// Session description offer
    Offer {
        /// Offer description
        sdp: SessionDescription,
        /// Addressee when sending
        #[serde(skip_serializing_if = "Option::is_none", default)]
        to: Option<ViewerId>,
        /// Originator when receiving
        #[serde(skip_serializing_if = "Option::is_none", default)]
        from: Option<ViewerId>,
    },
    /// Session description answer
    Answer {
        /// Answer description
        sdp: SessionDescription,
        /// Addressee when sending
        #[serde(skip_serializing_if = "Option::is_none", default)]
        to: Option<ViewerId>,
        /// Originator when receiving
        #[serde(skip_serializing_if = "Option::is_none", default)]
        from: Option<ViewerId>,
    },
    /// Transport candidate discovered during negotiation
    Candidate {
        /// The candidate
        candidate: TransportCandidate,
        /// Addressee when sending
        #[serde(skip_serializing_if = "Option::is_none", default)]
        to: Option<ViewerId>,
        /// Originator when receiving
        #[serde(skip_serializing_if = "Option::is_none", default)]
        from: Option<ViewerId>,
    },
    /// Chat text relayed to all participants
    ChatMessage {
        /// Display name of the sender
        sender: String,
        /// Message body
        text: String,
    },
    /// Current viewer count reported by the rendezvous service
    ViewerCount {
        /// Number of connected viewers
        count: u32,
    },
    /// A viewer joined and expects an offer
    NewViewer {
        /// Identity assigned to the viewer
        #[serde(rename = "viewerId")]
        viewer_id: ViewerId,
    },
    /// A viewer left; its session should be discarded
    ViewerLeft {
        /// Identity of the departed viewer
        #[serde(rename = "viewerId")]
        viewer_id: ViewerId,
    },
}

impl SignalingMessage {
    /// The wire tag of this message
    pub fn message_type(&self) -> &'static str {
        match self {
            SignalingMessage::Join { .. } => "join",
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::Candidate { .. } => "candidate",
            SignalingMessage::ChatMessage { .. } => "chat_message",
            SignalingMessage::ViewerCount { .. } => "viewer_count",
            SignalingMessage::NewViewer { .. } => "new_viewer",
            SignalingMessage::ViewerLeft { .. } => "viewer_left",
        }
    }
}
