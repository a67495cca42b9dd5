//! # Livecast Core
//!
//! Shared types and seams for the livecast session manager: the error
//! taxonomy, viewer identity, session descriptions and transport candidates,
//! and the trait boundaries to the negotiated media transport and the
//! media-acquisition provider.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod media;
pub mod peer;

// Re-export main types
pub use error::CastError;
pub use media::{LocalMedia, MediaKind, MediaSource, MediaTrack};
pub use peer::{
    PeerTransport, PeerTransportFactory, SdpKind, SessionDescription, TransportCandidate, ViewerId,
};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio_test::assert_ok;

    #[test]
    fn test_viewer_id_roundtrip() {
        let id = ViewerId::new("viewer-42");
        assert_eq!(id.as_str(), "viewer-42");
        assert_eq!(id.to_string(), "viewer-42");

        // Transparent serde representation: just the token
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"viewer-42\"");
        let back: ViewerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_session_description_wire_shape() {
        let desc = SessionDescription {
            kind: SdpKind::Offer,
            sdp: "v=0".to_string(),
        };
        let json = serde_json::to_string(&desc).unwrap();
        assert!(json.contains("\"type\":\"offer\""));
        assert!(json.contains("\"sdp\":\"v=0\""));
    }

    #[test]
    fn test_candidate_wire_shape() {
        let candidate = TransportCandidate {
            candidate: "candidate:1 1 udp 2122260223 192.0.2.1 54400 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
        };
        let json = serde_json::to_string(&candidate).unwrap();
        assert!(json.contains("\"sdpMid\":\"0\""));
        assert!(json.contains("\"sdpMLineIndex\":0"));

        // Optional fields may be absent on the wire
        let bare: TransportCandidate =
            serde_json::from_str(r#"{"candidate":"candidate:2"}"#).unwrap();
        assert_eq!(bare.sdp_mid, None);
        assert_eq!(bare.sdp_m_line_index, None);
    }

    #[test]
    fn test_error_codes() {
        let err = CastError::Negotiation {
            viewer_id: "v1".to_string(),
            reason: "bad sdp".to_string(),
        };
        assert_eq!(err.error_code(), "NEGOTIATION_FAILED");
        assert!(err.to_string().contains("v1"));
    }

    struct NoopTransport;

    #[async_trait]
    impl PeerTransport for NoopTransport {
        async fn create_offer(&mut self) -> Result<SessionDescription, CastError> {
            Ok(SessionDescription {
                kind: SdpKind::Offer,
                sdp: String::new(),
            })
        }

        async fn create_answer(&mut self) -> Result<SessionDescription, CastError> {
            Ok(SessionDescription {
                kind: SdpKind::Answer,
                sdp: String::new(),
            })
        }

        async fn set_remote_description(
            &mut self,
            _desc: SessionDescription,
        ) -> Result<(), CastError> {
            Ok(())
        }

        async fn add_candidate(&mut self, _candidate: TransportCandidate) -> Result<(), CastError> {
            Ok(())
        }

        async fn attach_track(&mut self, _track: MediaTrack) -> Result<(), CastError> {
            Ok(())
        }

        async fn close(&mut self) {}
    }

    #[test]
    fn test_transport_is_object_safe() {
        // The session layer drives transports exclusively through trait
        // objects; keep the seam object safe.
        let mut transport: Box<dyn PeerTransport> = Box::new(NoopTransport);
        let offer = tokio_test::block_on(transport.create_offer());
        assert_eq!(tokio_test::assert_ok!(offer).kind, SdpKind::Offer);
    }
}
