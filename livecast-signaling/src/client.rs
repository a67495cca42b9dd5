//! Reconnecting signaling client
//!
//! One task owns the WebSocket connection and every piece of mutable state
//! attached to it: the connection itself, the transport state machine, and
//! the bounded queue of outbound messages awaiting an open channel. Handles
//! talk to the task over channels, which serializes queue access between the
//! local-send and reconnect contexts.

use crate::protocol::SignalingMessage;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use livecast_core::CastError;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for the signaling channel
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Rendezvous service URL (`ws://` or `wss://`)
    pub url: String,
    /// Delay before the single reconnect attempt scheduled after an
    /// unexpected closure
    pub retry_delay: Duration,
    /// Maximum outbound messages held while the channel is not open; the
    /// oldest message is dropped once the limit is exceeded
    pub max_queue_depth: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080".to_string(),
            retry_delay: Duration::from_secs(3),
            max_queue_depth: 64,
        }
    }
}

/// Connection lifecycle of the signaling channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// A connection attempt is in flight
    Connecting,
    /// The channel is open and passing messages
    Open,
    /// The channel closed unexpectedly; one reconnect attempt is scheduled
    RetryWait,
    /// The channel was shut down explicitly and will not reconnect
    Closed,
}

/// Inbound notifications delivered to the client's consumer
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A connection epoch opened (first connect or reconnect); ordering of
    /// messages is only guaranteed within one epoch
    Opened,
    /// A signaling message arrived on the current epoch
    Message(SignalingMessage),
}

#[derive(Debug)]
enum Command {
    Send(SignalingMessage),
    Shutdown,
}

/// Bounded FIFO for outbound messages awaiting an open channel
struct OutboundQueue {
    items: VecDeque<SignalingMessage>,
    max_depth: usize,
}

impl OutboundQueue {
    fn new(max_depth: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_depth,
        }
    }

    /// Append a message; returns the oldest message if it had to be dropped
    /// to stay within the depth limit
    fn push(&mut self, msg: SignalingMessage) -> Option<SignalingMessage> {
        self.items.push_back(msg);
        if self.items.len() > self.max_depth {
            self.items.pop_front()
        } else {
            None
        }
    }

    /// Put a message back at the head after a failed flush
    fn requeue_front(&mut self, msg: SignalingMessage) {
        self.items.push_front(msg);
    }

    fn pop(&mut self) -> Option<SignalingMessage> {
        self.items.pop_front()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Handle to the signaling channel task
pub struct SignalingClient {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<RwLock<TransportState>>,
    task: JoinHandle<()>,
}

/// Cloneable sender half for outbound signaling messages
#[derive(Clone)]
pub struct SignalingSender {
    commands: mpsc::UnboundedSender<Command>,
}

impl SignalingSender {
    /// Enqueue a message for sending; it is queued for retry while the
    /// channel is not open. Fails only after shutdown.
    pub fn send(&self, msg: SignalingMessage) -> Result<(), CastError> {
        self.commands
            .send(Command::Send(msg))
            .map_err(|_| CastError::ChannelClosed {
                channel: "signaling outbound".to_string(),
            })
    }
}

impl SignalingClient {
    /// Start the channel task and return the handle plus the inbound event
    /// stream. Connecting happens in the background; sends before the first
    /// open are queued.
    pub fn connect(config: SignalingConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(TransportState::Connecting));
        let task = tokio::spawn(run(config, command_rx, event_tx, Arc::clone(&state)));
        (
            Self {
                commands: command_tx,
                state,
                task,
            },
            event_rx,
        )
    }

    /// Current transport state
    pub fn state(&self) -> TransportState {
        *self.state.read()
    }

    /// Cloneable outbound sender
    pub fn sender(&self) -> SignalingSender {
        SignalingSender {
            commands: self.commands.clone(),
        }
    }

    /// Enqueue a message for sending
    pub fn send(&self, msg: SignalingMessage) -> Result<(), CastError> {
        self.sender().send(msg)
    }

    /// Stop the channel; cancels any pending reconnect and ends the inbound
    /// stream
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }
}

enum ConnectionEnd {
    Shutdown,
    Lost,
}

async fn run(
    config: SignalingConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ClientEvent>,
    state: Arc<RwLock<TransportState>>,
) {
    let mut queue = OutboundQueue::new(config.max_queue_depth);
    'run: loop {
        *state.write() = TransportState::Connecting;
        debug!(url = %config.url, "connecting to rendezvous service");
        // Sends issued while the connect is in flight go through the bounded
        // queue, same as during the retry wait.
        let connect = connect_async(&config.url);
        tokio::pin!(connect);
        let connected = loop {
            tokio::select! {
                result = &mut connect => break result,
                cmd = commands.recv() => match cmd {
                    Some(Command::Send(msg)) => enqueue(&mut queue, msg),
                    Some(Command::Shutdown) | None => break 'run,
                },
            }
        };
        match connected {
            Ok((ws, _)) => {
                let epoch = Uuid::new_v4();
                info!(%epoch, "signaling channel open");
                *state.write() = TransportState::Open;
                if events.send(ClientEvent::Opened).is_err() {
                    break;
                }
                match serve_connection(ws, &mut commands, &events, &mut queue).await {
                    ConnectionEnd::Shutdown => {
                        info!(%epoch, "signaling channel shut down");
                        break;
                    }
                    ConnectionEnd::Lost => {
                        warn!(%epoch, "signaling channel lost");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "connect to rendezvous service failed");
            }
        }

        *state.write() = TransportState::RetryWait;
        debug!(delay = ?config.retry_delay, "reconnect scheduled");
        if !wait_retry(config.retry_delay, &mut commands, &mut queue).await {
            break;
        }
    }
    *state.write() = TransportState::Closed;
}

async fn serve_connection(
    ws: WsStream,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<ClientEvent>,
    queue: &mut OutboundQueue,
) -> ConnectionEnd {
    let (mut sink, mut stream) = ws.split();

    // Flush messages queued while the channel was down, oldest first.
    let backlog = queue.len();
    if backlog > 0 {
        debug!(backlog, "flushing queued outbound messages");
    }
    while let Some(msg) = queue.pop() {
        if let Err(e) = send_frame(&mut sink, &msg).await {
            warn!(error = %e, "flush failed; keeping message for next epoch");
            queue.requeue_front(msg);
            return ConnectionEnd::Lost;
        }
    }

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Send(msg)) => {
                    if let Err(e) = send_frame(&mut sink, &msg).await {
                        warn!(error = %e, "send failed; queueing for retry");
                        enqueue(queue, msg);
                        return ConnectionEnd::Lost;
                    }
                }
                Some(Command::Shutdown) | None => {
                    let _ = sink.close().await;
                    return ConnectionEnd::Shutdown;
                }
            },
            frame = next_inbound(&mut stream) => match frame {
                Inbound::Message(msg) => {
                    if events.send(ClientEvent::Message(msg)).is_err() {
                        return ConnectionEnd::Shutdown;
                    }
                }
                Inbound::Ignored => {}
                Inbound::Ended => return ConnectionEnd::Lost,
            },
        }
    }
}

enum Inbound {
    Message(SignalingMessage),
    Ignored,
    Ended,
}

async fn next_inbound(stream: &mut SplitStream<WsStream>) -> Inbound {
    match stream.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<SignalingMessage>(&text) {
            Ok(msg) => Inbound::Message(msg),
            Err(e) => {
                warn!(error = %e, "ignoring malformed signaling frame");
                Inbound::Ignored
            }
        },
        Some(Ok(Message::Close(_))) | None => {
            debug!("rendezvous service closed the connection");
            Inbound::Ended
        }
        Some(Err(e)) => {
            error!(error = %e, "signaling channel error");
            Inbound::Ended
        }
        Some(Ok(_)) => {
            // Binary, Ping, Pong
            Inbound::Ignored
        }
    }
}

async fn send_frame(
    sink: &mut SplitSink<WsStream, Message>,
    msg: &SignalingMessage,
) -> Result<(), tungstenite::Error> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "failed to serialize outbound message");
            return Ok(());
        }
    };
    sink.send(Message::Text(json)).await
}

fn enqueue(queue: &mut OutboundQueue, msg: SignalingMessage) {
    if let Some(dropped) = queue.push(msg) {
        warn!(
            dropped = dropped.message_type(),
            "outbound queue full; dropped oldest message"
        );
    }
}

/// Waits out the retry delay, queueing sends that arrive meanwhile.
/// Returns `false` if shutdown arrived first.
async fn wait_retry(
    delay: Duration,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    queue: &mut OutboundQueue,
) -> bool {
    let retry = tokio::time::sleep(delay);
    tokio::pin!(retry);
    loop {
        tokio::select! {
            _ = &mut retry => return true,
            cmd = commands.recv() => match cmd {
                Some(Command::Send(msg)) => enqueue(queue, msg),
                Some(Command::Shutdown) | None => return false,
            },
        }
    }
}
