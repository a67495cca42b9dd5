//! Peer identity and the negotiated-transport seam
//!
//! The session manager never talks to a concrete media transport. It drives
//! the [`PeerTransport`] trait, which a WebRTC (or other) backend implements;
//! traversal-server configuration lives with the [`PeerTransportFactory`]
//! implementation and is opaque here.

use crate::error::CastError;
use crate::media::MediaTrack;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Opaque, server-assigned token identifying one viewer for the lifetime of
/// its session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(String);

impl ViewerId {
    /// Wrap a raw identity token
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ViewerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which half of the offer/answer exchange a description is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// Offer from the initiating side
    Offer,
    /// Answer from the responding side
    Answer,
}

/// A local or remote session description exchanged during negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Offer or answer
    #[serde(rename = "type")]
    pub kind: SdpKind,
    /// Description payload
    pub sdp: String,
}

/// One discovered network path usable for the direct media transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportCandidate {
    /// Candidate description line
    pub candidate: String,
    /// Media section identifier the candidate belongs to
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sdp_mid: Option<String>,
    /// Media section index the candidate belongs to
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sdp_m_line_index: Option<u16>,
}

/// One negotiated media transport to a single remote peer
///
/// Exclusively owned by its peer session. Implementations must tolerate
/// `close` being the last call; no method is invoked after it. Candidates are
/// only added after a remote description has been applied; the session layer
/// guarantees this ordering structurally.
#[async_trait]
pub trait PeerTransport: Send {
    /// Create and apply the local offer description
    async fn create_offer(&mut self) -> Result<SessionDescription, CastError>;

    /// Create and apply the local answer description
    async fn create_answer(&mut self) -> Result<SessionDescription, CastError>;

    /// Apply the remote peer's description
    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<(), CastError>;

    /// Apply one remote transport candidate
    async fn add_candidate(&mut self, candidate: TransportCandidate) -> Result<(), CastError>;

    /// Attach a local media track for sending
    async fn attach_track(&mut self, track: MediaTrack) -> Result<(), CastError>;

    /// Tear the transport down; releases all underlying resources
    async fn close(&mut self);
}

/// Factory for per-viewer transports
///
/// `local_candidates` receives transport candidates discovered locally while
/// the connection establishes; the session forwards them to the remote peer
/// over signaling.
#[async_trait]
pub trait PeerTransportFactory: Send + Sync {
    /// Create a transport for the given viewer
    async fn create(
        &self,
        viewer_id: &ViewerId,
        local_candidates: mpsc::UnboundedSender<TransportCandidate>,
    ) -> Result<Box<dyn PeerTransport>, CastError>;
}
