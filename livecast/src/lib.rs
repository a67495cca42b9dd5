//! One-to-many broadcast endpoint
//!
//! This crate drives a live broadcast toward any number of viewers. It owns
//! a reconnecting signaling channel to the rendezvous service, one
//! negotiation session per viewer, and the local media handed to each
//! session. The media transport itself is behind the
//! [`PeerTransportFactory`](livecast_core::PeerTransportFactory) seam, so a
//! WebRTC backend (or a test double) plugs in without this crate knowing its
//! details.
//!
//! [`Broadcaster::start`] connects, acquires local media, and returns a
//! handle plus an [`EventStream`] the presentation layer consumes for
//! session lifecycle, chat, and viewer-count updates.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod event;
pub mod session;

mod manager;
mod table;

pub use config::BroadcastConfig;
pub use event::{Event, EventStream};
pub use session::{NegotiationRole, NegotiationState, PeerSession};

use crate::manager::{Command, SessionManager};
use livecast_core::{CastError, LocalMedia, MediaSource, PeerTransportFactory};
use livecast_signaling::SignalingClient;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Handle to a running broadcast
///
/// Dropping the handle without calling [`shutdown`](Broadcaster::shutdown)
/// leaves the background tasks running until their channels close.
pub struct Broadcaster {
    commands: mpsc::UnboundedSender<Command>,
    manager_task: JoinHandle<()>,
    client: SignalingClient,
}

impl Broadcaster {
    /// Start broadcasting: connect to the rendezvous service, acquire local
    /// media, and serve viewer sessions until shutdown.
    ///
    /// A refused media capture does not abort the start; the broadcast runs
    /// without tracks and [`Event::MediaAccessDenied`] tells the caller to
    /// prompt the user.
    pub async fn start(
        config: BroadcastConfig,
        media_source: Arc<dyn MediaSource>,
        factory: Arc<dyn PeerTransportFactory>,
    ) -> (Broadcaster, EventStream) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let (client, client_events) = SignalingClient::connect(config.signaling.clone());

        // Pump session-manager output into the signaling channel, which
        // queues it while the channel is down.
        let sender = client.sender();
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if sender.send(msg).is_err() {
                    break;
                }
            }
        });

        match media_source.acquire().await {
            Ok(media) => {
                let _ = command_tx.send(Command::LocalMediaReady(media));
            }
            Err(e) => {
                warn!(error = %e, "local media unavailable; broadcasting without tracks");
                let _ = event_tx.send(Event::MediaAccessDenied {
                    reason: e.to_string(),
                });
            }
        }

        let manager = SessionManager::new(config, factory, outbound_tx, event_tx);
        let manager_task = tokio::spawn(manager.run(client_events, command_rx));
        info!("broadcaster started");

        (
            Self {
                commands: command_tx,
                manager_task,
                client,
            },
            EventStream::new(event_rx),
        )
    }

    /// Send a chat message to every connected participant
    pub fn send_chat(&self, text: impl Into<String>) -> Result<(), CastError> {
        self.command(Command::SendChat { text: text.into() })
    }

    /// Provide local media after start; it attaches to every session that
    /// does not carry tracks yet, and to all future sessions
    pub fn set_local_media(&self, media: LocalMedia) -> Result<(), CastError> {
        self.command(Command::LocalMediaReady(media))
    }

    /// Stop broadcasting: close every viewer session, then the signaling
    /// channel. The event stream ends once everything is down.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.manager_task.await;
        self.client.shutdown().await;
        info!("broadcaster stopped");
    }

    fn command(&self, command: Command) -> Result<(), CastError> {
        self.commands
            .send(command)
            .map_err(|_| CastError::ChannelClosed {
                channel: "broadcast commands".to_string(),
            })
    }
}
