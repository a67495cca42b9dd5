//! Media-acquisition boundary
//!
//! Capturing camera and microphone input is outside the session manager's
//! scope. The manager only needs opaque track handles it can hand to peer
//! transports, and a way to ask the platform for them.

use crate::error::CastError;
use async_trait::async_trait;

/// Kind of a captured media track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

/// Opaque handle to one captured media track
///
/// Shared read-only across sessions; each session attaches a track to its
/// peer transport at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    /// Track identifier assigned by the capture provider
    pub id: String,
    /// Kind of media this track carries
    pub kind: MediaKind,
}

/// The local capture stream: the set of tracks this endpoint broadcasts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalMedia {
    tracks: Vec<MediaTrack>,
}

impl LocalMedia {
    /// Create a local media stream from captured tracks
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    /// Tracks carried by this stream
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }
}

/// Provider of local capture tracks
///
/// Implementations fail with [`CastError::MediaAccessDenied`] when the user
/// or platform refuses capture permission; the failure is surfaced to the
/// user and never retried automatically.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Acquire the local media stream
    async fn acquire(&self) -> Result<LocalMedia, CastError>;
}
