//! Minimal broadcast demo
//!
//! Runs a broadcaster against a local rendezvous service with stubbed media
//! and transport, and prints the events it observes. Start a signaling
//! server on ws://localhost:8080, then:
//!
//! ```bash
//! cargo run --example broadcast_demo
//! ```

use async_trait::async_trait;
use livecast::{BroadcastConfig, Broadcaster};
use livecast_core::{
    CastError, LocalMedia, MediaKind, MediaSource, MediaTrack, PeerTransport,
    PeerTransportFactory, SdpKind, SessionDescription, TransportCandidate, ViewerId,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

struct StubCamera;

#[async_trait]
impl MediaSource for StubCamera {
    async fn acquire(&self) -> Result<LocalMedia, CastError> {
        Ok(LocalMedia::new(vec![
            MediaTrack {
                id: "camera".to_string(),
                kind: MediaKind::Video,
            },
            MediaTrack {
                id: "microphone".to_string(),
                kind: MediaKind::Audio,
            },
        ]))
    }
}

struct StubFactory;

#[async_trait]
impl PeerTransportFactory for StubFactory {
    async fn create(
        &self,
        viewer_id: &ViewerId,
        _local_candidates: mpsc::UnboundedSender<TransportCandidate>,
    ) -> Result<Box<dyn PeerTransport>, CastError> {
        Ok(Box::new(StubTransport {
            viewer: viewer_id.to_string(),
        }))
    }
}

struct StubTransport {
    viewer: String,
}

#[async_trait]
impl PeerTransport for StubTransport {
    async fn create_offer(&mut self) -> Result<SessionDescription, CastError> {
        Ok(SessionDescription {
            kind: SdpKind::Offer,
            sdp: format!("demo offer for {}", self.viewer),
        })
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, CastError> {
        Ok(SessionDescription {
            kind: SdpKind::Answer,
            sdp: format!("demo answer for {}", self.viewer),
        })
    }

    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<(), CastError> {
        info!(viewer = %self.viewer, kind = ?desc.kind, "remote description applied");
        Ok(())
    }

    async fn add_candidate(&mut self, candidate: TransportCandidate) -> Result<(), CastError> {
        info!(viewer = %self.viewer, candidate = %candidate.candidate, "candidate added");
        Ok(())
    }

    async fn attach_track(&mut self, track: MediaTrack) -> Result<(), CastError> {
        info!(viewer = %self.viewer, track = %track.id, "track attached");
        Ok(())
    }

    async fn close(&mut self) {
        info!(viewer = %self.viewer, "transport closed");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let (broadcaster, mut events) = Broadcaster::start(
        BroadcastConfig::default(),
        Arc::new(StubCamera),
        Arc::new(StubFactory),
    )
    .await;

    if let Err(e) = broadcaster.send_chat("demo broadcaster online") {
        info!(error = %e, "chat not sent");
    }

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => info!(event = event.event_type(), "{event:?}"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("stopping broadcast");
                broadcaster.shutdown().await;
                break;
            }
        }
    }
}
