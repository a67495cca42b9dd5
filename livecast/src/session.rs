//! Per-viewer negotiation state machine
//!
//! One [`PeerSession`] exists per viewer identity. Each session runs on its
//! own task with a FIFO inbox, so events for one viewer are applied strictly
//! in arrival order while other viewers' sessions make progress
//! concurrently. The session exclusively owns its peer transport and
//! releases it exactly once, on close.

use chrono::{DateTime, Utc};
use livecast_core::{
    CastError, LocalMedia, PeerTransport, SessionDescription, TransportCandidate, ViewerId,
};
use livecast_signaling::SignalingMessage;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Negotiation state of one peer session
///
/// Ordered by progress: the state only moves forward, except for the
/// terminal transition to `Closed`, which is reachable from any state and
/// idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NegotiationState {
    /// Session created, no description exchanged yet
    New,
    /// Local offer created and sent; waiting for the answer
    OfferSent,
    /// Remote offer applied; an answer is being created
    OfferReceived,
    /// Local answer created and sent
    AnswerSent,
    /// Remote answer is being applied
    AnswerReceived,
    /// Negotiation complete; media flows over the established transport
    Stable,
    /// Session torn down; the transport handle has been released
    Closed,
}

impl NegotiationState {
    /// Whether this state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Closed)
    }
}

/// Which side starts the offer/answer exchange for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    /// This side creates and sends the offer (broadcaster toward a newly
    /// announced viewer)
    Initiator,
    /// The remote side sent the offer first; this side answers
    Responder,
}

/// Negotiation state and transport ownership for one viewer
pub struct PeerSession {
    viewer_id: ViewerId,
    role: NegotiationRole,
    state: NegotiationState,
    transport: Option<Box<dyn PeerTransport>>,
    pending_candidates: Vec<TransportCandidate>,
    remote_description_set: bool,
    media_attached: bool,
    outbound: mpsc::UnboundedSender<SignalingMessage>,
    created_at: DateTime<Utc>,
}

impl PeerSession {
    /// Create a session owning the given transport
    pub fn new(
        viewer_id: ViewerId,
        role: NegotiationRole,
        transport: Box<dyn PeerTransport>,
        outbound: mpsc::UnboundedSender<SignalingMessage>,
    ) -> Self {
        Self {
            viewer_id,
            role,
            state: NegotiationState::New,
            transport: Some(transport),
            pending_candidates: Vec::new(),
            remote_description_set: false,
            media_attached: false,
            outbound,
            created_at: Utc::now(),
        }
    }

    /// Identity of the viewer this session belongs to
    pub fn viewer_id(&self) -> &ViewerId {
        &self.viewer_id
    }

    /// Negotiation role of this side
    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    /// Current negotiation state
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// When the session was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Candidates received before the remote description was set
    pub fn pending_candidates(&self) -> &[TransportCandidate] {
        &self.pending_candidates
    }

    /// Attach the local media tracks to the transport; once per session
    pub async fn attach_media(&mut self, media: &LocalMedia) -> Result<(), CastError> {
        if self.state.is_terminal() || self.media_attached {
            return Ok(());
        }
        for track in media.tracks() {
            self.transport_mut()?.attach_track(track.clone()).await?;
        }
        self.media_attached = true;
        debug!(viewer = %self.viewer_id, tracks = media.tracks().len(), "local media attached");
        Ok(())
    }

    /// Create the local offer and send it to the viewer
    pub async fn initiate(&mut self) -> Result<(), CastError> {
        if self.state != NegotiationState::New {
            debug!(viewer = %self.viewer_id, state = ?self.state, "initiate ignored");
            return Ok(());
        }
        let offer = self.transport_mut()?.create_offer().await?;
        self.send(SignalingMessage::Offer {
            sdp: offer,
            to: Some(self.viewer_id.clone()),
            from: None,
        });
        self.advance(NegotiationState::OfferSent);
        Ok(())
    }

    /// Apply a remote offer, answer it, and settle
    pub async fn handle_offer(&mut self, sdp: SessionDescription) -> Result<(), CastError> {
        if self.state != NegotiationState::New {
            debug!(viewer = %self.viewer_id, state = ?self.state, "offer ignored");
            return Ok(());
        }
        self.apply_remote_description(sdp).await?;
        self.advance(NegotiationState::OfferReceived);
        let answer = self.transport_mut()?.create_answer().await?;
        self.send(SignalingMessage::Answer {
            sdp: answer,
            to: Some(self.viewer_id.clone()),
            from: None,
        });
        self.advance(NegotiationState::AnswerSent);
        self.advance(NegotiationState::Stable);
        Ok(())
    }

    /// Apply the remote answer to a sent offer and settle
    pub async fn handle_answer(&mut self, sdp: SessionDescription) -> Result<(), CastError> {
        if self.state != NegotiationState::OfferSent {
            debug!(viewer = %self.viewer_id, state = ?self.state, "answer ignored");
            return Ok(());
        }
        self.advance(NegotiationState::AnswerReceived);
        self.apply_remote_description(sdp).await?;
        self.advance(NegotiationState::Stable);
        Ok(())
    }

    /// Apply a remote transport candidate, buffering it if the remote
    /// description is not set yet
    pub async fn handle_candidate(&mut self, candidate: TransportCandidate) -> Result<(), CastError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        if self.remote_description_set {
            self.transport_mut()?.add_candidate(candidate).await?;
        } else {
            debug!(viewer = %self.viewer_id, "buffering candidate until remote description");
            self.pending_candidates.push(candidate);
        }
        Ok(())
    }

    /// Forward a locally discovered candidate to the viewer
    pub fn send_local_candidate(&self, candidate: TransportCandidate) {
        if self.state.is_terminal() {
            return;
        }
        self.send(SignalingMessage::Candidate {
            candidate,
            to: Some(self.viewer_id.clone()),
            from: None,
        });
    }

    /// Tear the session down; releases the transport exactly once
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        if self.state != NegotiationState::Closed {
            self.state = NegotiationState::Closed;
            debug!(viewer = %self.viewer_id, "session closed");
        }
    }

    async fn apply_remote_description(&mut self, sdp: SessionDescription) -> Result<(), CastError> {
        self.transport_mut()?.set_remote_description(sdp).await?;
        self.remote_description_set = true;
        // Replay buffered candidates in arrival order now that applying
        // them is legal.
        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!(viewer = %self.viewer_id, count = pending.len(), "replaying buffered candidates");
        }
        let transport = self.transport_mut()?;
        for candidate in pending {
            transport.add_candidate(candidate).await?;
        }
        Ok(())
    }

    fn advance(&mut self, next: NegotiationState) {
        debug_assert!(next >= self.state);
        debug!(viewer = %self.viewer_id, from = ?self.state, to = ?next, "negotiation state");
        self.state = next;
    }

    fn transport_mut(&mut self) -> Result<&mut Box<dyn PeerTransport>, CastError> {
        self.transport.as_mut().ok_or_else(|| CastError::InvalidState {
            expected: "owned transport".to_string(),
            actual: "released".to_string(),
        })
    }

    fn send(&self, msg: SignalingMessage) {
        if self.outbound.send(msg).is_err() {
            debug!(viewer = %self.viewer_id, "outbound signaling channel closed");
        }
    }
}

/// Inputs delivered to a session task, processed strictly in arrival order
#[derive(Debug)]
pub(crate) enum SessionInput {
    Offer(SessionDescription),
    Answer(SessionDescription),
    Candidate(TransportCandidate),
    AttachMedia(LocalMedia),
    Close,
}

/// Why a session task ended
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// Closed on request: viewer left, or manager shutdown
    Closed,
    /// Negotiation failed or timed out; the session closed itself and must
    /// not be retried
    Failed(CastError),
}

/// Sent to the manager when a session task ends, so the table entry can be
/// removed. Carries the session's generation: a viewer id can be reused
/// after a leave, and a notice must never tear down a newer session that
/// took over the same id.
#[derive(Debug)]
pub(crate) struct SessionNotice {
    pub viewer_id: ViewerId,
    pub generation: u64,
    pub end: SessionEnd,
}

/// Handle to a running session task
pub(crate) struct SessionHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    task: JoinHandle<()>,
    generation: u64,
}

impl SessionHandle {
    /// Queue an input for the session; a no-op if the task already ended
    pub(crate) fn deliver(&self, input: SessionInput) {
        let _ = self.inputs.send(input);
    }

    /// Generation this handle belongs to
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the task to finish; the transport is released by then
    pub(crate) async fn join(self) {
        let _ = self.task.await;
    }

    #[cfg(test)]
    pub(crate) fn stub() -> Self {
        let (inputs, _rx) = mpsc::unbounded_channel();
        Self {
            inputs,
            task: tokio::spawn(async {}),
            generation: 0,
        }
    }
}

/// Spawn the session's task: attach initial media, initiate when this side
/// leads, then drain the inbox until close, failure, or timeout.
pub(crate) fn spawn_session(
    session: PeerSession,
    generation: u64,
    local_candidates: mpsc::UnboundedReceiver<TransportCandidate>,
    negotiation_timeout: Duration,
    initial_media: Option<LocalMedia>,
    notices: mpsc::UnboundedSender<SessionNotice>,
) -> SessionHandle {
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut session = session;
        let viewer_id = session.viewer_id().clone();
        let end = run_session(
            &mut session,
            input_rx,
            local_candidates,
            negotiation_timeout,
            initial_media,
        )
        .await;
        session.close().await;
        let _ = notices.send(SessionNotice {
            viewer_id,
            generation,
            end,
        });
    });
    SessionHandle {
        inputs: input_tx,
        task,
        generation,
    }
}

async fn run_session(
    session: &mut PeerSession,
    mut inputs: mpsc::UnboundedReceiver<SessionInput>,
    mut local_candidates: mpsc::UnboundedReceiver<TransportCandidate>,
    negotiation_timeout: Duration,
    initial_media: Option<LocalMedia>,
) -> SessionEnd {
    if let Some(media) = initial_media {
        if let Err(e) = session.attach_media(&media).await {
            return SessionEnd::Failed(e);
        }
    }
    if session.role() == NegotiationRole::Initiator {
        if let Err(e) = session.initiate().await {
            return SessionEnd::Failed(e);
        }
    }

    let deadline = tokio::time::sleep(negotiation_timeout);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            input = inputs.recv() => {
                let result = match input {
                    Some(SessionInput::Offer(sdp)) => session.handle_offer(sdp).await,
                    Some(SessionInput::Answer(sdp)) => session.handle_answer(sdp).await,
                    Some(SessionInput::Candidate(candidate)) => {
                        session.handle_candidate(candidate).await
                    }
                    Some(SessionInput::AttachMedia(media)) => session.attach_media(&media).await,
                    Some(SessionInput::Close) | None => return SessionEnd::Closed,
                };
                if let Err(e) = result {
                    return SessionEnd::Failed(e);
                }
            }
            Some(candidate) = local_candidates.recv() => {
                session.send_local_candidate(candidate);
            }
            _ = &mut deadline, if session.state() < NegotiationState::Stable => {
                warn!(
                    viewer = %session.viewer_id(),
                    created_at = %session.created_at(),
                    state = ?session.state(),
                    "negotiation timed out"
                );
                return SessionEnd::Failed(CastError::Timeout {
                    operation: "negotiation".to_string(),
                    duration: negotiation_timeout,
                });
            }
        }
    }
}
