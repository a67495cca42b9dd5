//! Signaling-driven session manager
//!
//! One task owns the session table and reacts to three inputs: inbound
//! signaling events, local commands (chat, media-ready, shutdown), and
//! end-of-session notices from session tasks. Each input is dispatched to
//! completion before the next, so the table is never mutated concurrently;
//! per-viewer work that may suspend lives in the session tasks.

use crate::config::BroadcastConfig;
use crate::event::Event;
use crate::session::{
    spawn_session, NegotiationRole, PeerSession, SessionEnd, SessionHandle, SessionInput,
    SessionNotice,
};
use crate::table::SessionTable;
use livecast_core::{LocalMedia, PeerTransportFactory, SessionDescription, ViewerId};
use livecast_signaling::{ClientEvent, PeerRole, SignalingMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Commands from the broadcaster handle
#[derive(Debug)]
pub(crate) enum Command {
    SendChat { text: String },
    LocalMediaReady(LocalMedia),
    Shutdown,
}

pub(crate) struct SessionManager {
    config: BroadcastConfig,
    factory: Arc<dyn PeerTransportFactory>,
    table: SessionTable,
    local_media: Option<LocalMedia>,
    outbound: mpsc::UnboundedSender<SignalingMessage>,
    events: mpsc::UnboundedSender<Event>,
    notices_tx: mpsc::UnboundedSender<SessionNotice>,
    notices_rx: Option<mpsc::UnboundedReceiver<SessionNotice>>,
    next_generation: u64,
}

impl SessionManager {
    pub(crate) fn new(
        config: BroadcastConfig,
        factory: Arc<dyn PeerTransportFactory>,
        outbound: mpsc::UnboundedSender<SignalingMessage>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        Self {
            config,
            factory,
            table: SessionTable::default(),
            local_media: None,
            outbound,
            events,
            notices_tx,
            notices_rx: Some(notices_rx),
            next_generation: 0,
        }
    }

    /// Drive the manager until shutdown or until the signaling event stream
    /// ends
    pub(crate) async fn run(
        mut self,
        mut client_events: mpsc::UnboundedReceiver<ClientEvent>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut notices = match self.notices_rx.take() {
            Some(notices) => notices,
            None => return,
        };
        info!("session manager running");
        loop {
            tokio::select! {
                event = client_events.recv() => match event {
                    Some(ClientEvent::Opened) => self.on_signaling_open(),
                    Some(ClientEvent::Message(msg)) => self.on_inbound(msg).await,
                    None => {
                        debug!("signaling event stream ended");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::SendChat { text }) => self.send(SignalingMessage::ChatMessage {
                        sender: self.config.display_name.clone(),
                        text,
                    }),
                    Some(Command::LocalMediaReady(media)) => self.on_local_media_ready(media),
                    Some(Command::Shutdown) | None => break,
                },
                notice = notices.recv() => {
                    if let Some(notice) = notice {
                        self.on_session_end(notice);
                    }
                }
            }
        }
        self.shutdown().await;
    }

    fn on_signaling_open(&mut self) {
        info!("signaling open; announcing broadcaster role");
        self.send(SignalingMessage::Join {
            role: PeerRole::Broadcaster,
        });
        self.emit(Event::SignalingConnected);
    }

    async fn on_inbound(&mut self, msg: SignalingMessage) {
        match msg {
            SignalingMessage::NewViewer { viewer_id } => {
                info!(viewer = %viewer_id, "new viewer");
                self.create_session(viewer_id, NegotiationRole::Initiator).await;
            }
            SignalingMessage::Offer { sdp, from, .. } => match from {
                Some(from) => self.on_offer(from, sdp).await,
                None => warn!("offer without sender; dropping"),
            },
            SignalingMessage::Answer { sdp, from, .. } => match from {
                Some(from) => self.deliver_existing(&from, SessionInput::Answer(sdp), "answer"),
                None => warn!("answer without sender; dropping"),
            },
            SignalingMessage::Candidate { candidate, from, .. } => match from {
                Some(from) => {
                    self.deliver_existing(&from, SessionInput::Candidate(candidate), "candidate")
                }
                None => warn!("candidate without sender; dropping"),
            },
            SignalingMessage::ViewerLeft { viewer_id } => self.on_viewer_left(viewer_id),
            SignalingMessage::ChatMessage { sender, text } => {
                self.emit(Event::ChatReceived { sender, text })
            }
            SignalingMessage::ViewerCount { count } => {
                self.emit(Event::ViewerCountChanged { count })
            }
            SignalingMessage::Join { .. } => debug!("ignoring inbound join"),
        }
    }

    async fn on_offer(&mut self, from: ViewerId, sdp: SessionDescription) {
        // A viewer-initiated offer: respond, creating the session if this is
        // the first we hear of the viewer.
        self.create_session(from.clone(), NegotiationRole::Responder).await;
        if let Some(handle) = self.table.get(&from) {
            handle.deliver(SessionInput::Offer(sdp));
        }
    }

    async fn create_session(&mut self, viewer_id: ViewerId, role: NegotiationRole) {
        if self.table.get(&viewer_id).is_some() {
            debug!(viewer = %viewer_id, "session already exists");
            return;
        }
        let (candidate_tx, candidate_rx) = mpsc::unbounded_channel();
        let transport = match self.factory.create(&viewer_id, candidate_tx).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!(viewer = %viewer_id, error = %e, "peer transport creation failed");
                return;
            }
        };
        let session = PeerSession::new(
            viewer_id.clone(),
            role,
            transport,
            self.outbound.clone(),
        );
        self.next_generation += 1;
        let handle = spawn_session(
            session,
            self.next_generation,
            candidate_rx,
            self.config.negotiation_timeout,
            self.local_media.clone(),
            self.notices_tx.clone(),
        );
        let (_, created) = self.table.create_or_get(&viewer_id, || handle);
        debug_assert!(created);
        if created {
            self.emit(Event::SessionCreated { viewer_id });
        }
    }

    fn deliver_existing(&self, from: &ViewerId, input: SessionInput, what: &str) {
        match self.table.get(from) {
            Some(handle) => handle.deliver(input),
            // Expected under reordering, e.g. a leave raced this message.
            None => warn!(viewer = %from, message = what, "no session for inbound message; dropping"),
        }
    }

    fn on_viewer_left(&mut self, viewer_id: ViewerId) {
        match self.table.remove(&viewer_id) {
            Some(handle) => {
                info!(viewer = %viewer_id, "viewer left; closing session");
                handle.deliver(SessionInput::Close);
                self.emit(Event::SessionClosed { viewer_id });
            }
            None => debug!(viewer = %viewer_id, "viewer left with no session"),
        }
    }

    fn on_local_media_ready(&mut self, media: LocalMedia) {
        info!(tracks = media.tracks().len(), "local media ready");
        self.local_media = Some(media.clone());
        for handle in self.table.handles() {
            handle.deliver(SessionInput::AttachMedia(media.clone()));
        }
    }

    fn on_session_end(&mut self, notice: SessionNotice) {
        match &notice.end {
            SessionEnd::Closed => debug!(viewer = %notice.viewer_id, "session ended"),
            SessionEnd::Failed(e) => {
                warn!(viewer = %notice.viewer_id, error = %e, "negotiation failed; session discarded")
            }
        }
        // A viewer id can be reused: only the generation that is actually in
        // the table gets cleaned up here. A stale notice means the entry was
        // already removed by a leave or replaced by a newer session.
        let current = self
            .table
            .get(&notice.viewer_id)
            .map(SessionHandle::generation);
        if current != Some(notice.generation) {
            debug!(
                viewer = %notice.viewer_id,
                generation = notice.generation,
                "stale session notice"
            );
            return;
        }
        self.table.remove(&notice.viewer_id);
        self.emit(Event::SessionClosed {
            viewer_id: notice.viewer_id,
        });
    }

    async fn shutdown(&mut self) {
        info!(sessions = self.table.len(), "shutting down session manager");
        for (viewer_id, handle) in self.table.drain() {
            handle.deliver(SessionInput::Close);
            handle.join().await;
            self.emit(Event::SessionClosed { viewer_id });
        }
    }

    fn send(&self, msg: SignalingMessage) {
        if self.outbound.send(msg).is_err() {
            debug!("outbound signaling channel closed");
        }
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }
}
