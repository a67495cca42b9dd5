//! Events surfaced to the presentation layer
//!
//! The session manager never touches a rendering surface; the UI subscribes
//! to this stream for session lifecycle, chat, and viewer-count updates.

use livecast_core::ViewerId;
use tokio::sync::mpsc;

/// Events that occur during a broadcast
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The signaling channel opened (first connect or after a reconnect)
    SignalingConnected,
    /// A viewer session was created
    SessionCreated {
        /// Identity of the viewer
        viewer_id: ViewerId,
    },
    /// A viewer session was closed and removed
    SessionClosed {
        /// Identity of the viewer
        viewer_id: ViewerId,
    },
    /// A chat message arrived
    ChatReceived {
        /// Display name of the sender
        sender: String,
        /// Message body
        text: String,
    },
    /// The rendezvous service reported a new viewer count
    ViewerCountChanged {
        /// Number of connected viewers
        count: u32,
    },
    /// Local media could not be acquired; the broadcast continues without
    /// tracks and the user should be prompted
    MediaAccessDenied {
        /// Reason capture was refused
        reason: String,
    },
}

impl Event {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::SignalingConnected => "signaling_connected",
            Event::SessionCreated { .. } => "session_created",
            Event::SessionClosed { .. } => "session_closed",
            Event::ChatReceived { .. } => "chat_received",
            Event::ViewerCountChanged { .. } => "viewer_count_changed",
            Event::MediaAccessDenied { .. } => "media_access_denied",
        }
    }
}

/// Stream of [`Event`]s delivered to the presentation layer
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { rx }
    }

    /// Next event; returns `None` once the broadcaster has shut down
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
