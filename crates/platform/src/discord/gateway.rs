//! Gateway session: identify, heartbeat, guild tracking, presence sends.
//!
//! The session runs as a spawned task that owns the socket. Handles talk to
//! it through a command channel and observe it through watch channels; once
//! the session ends for any reason it flips `closed` and never reconnects.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use tickerbot_core::{GroupId, UpdateError};

use crate::discord::protocol::{self, opcode, GatewayFrame};
use crate::discord::ConnectError;

/// Gateway endpoint (API v10, JSON encoding).
const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// How long to wait for the server's Hello before giving up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared between the session task and connection handles.
pub(crate) struct Shared {
    pub(crate) ready: watch::Sender<bool>,
    pub(crate) closed: watch::Sender<bool>,
    pub(crate) guilds: RwLock<BTreeSet<GroupId>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        let (ready, _) = watch::channel(false);
        let (closed, _) = watch::channel(false);
        Self {
            ready,
            closed,
            guilds: RwLock::new(BTreeSet::new()),
        }
    }
}

/// Requests a handle can push into the session.
pub(crate) enum Command {
    Presence(String, oneshot::Sender<Result<(), UpdateError>>),
}

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

/// Perform the handshake (Hello, then Identify) and spawn the session task.
///
/// Authentication is asynchronous: a rejected token surfaces as the gateway
/// closing the connection before READY, not as an error here.
pub(crate) async fn connect(
    token: &str,
    shared: Arc<Shared>,
) -> Result<mpsc::Sender<Command>, ConnectError> {
    let (mut ws, _) = tokio_tungstenite::connect_async(GATEWAY_URL)
        .await
        .map_err(|e| ConnectError::Handshake(e.to_string()))?;

    let hello = read_hello(&mut ws).await?;
    debug!(heartbeat_ms = hello.heartbeat_interval, "gateway said hello");

    let identify = protocol::Identify {
        token,
        intents: protocol::INTENT_GUILDS,
        properties: protocol::ConnectionProperties::default(),
    };
    let text = protocol::encode(opcode::IDENTIFY, &identify)
        .map_err(|e| ConnectError::Setup(format!("identify encode: {}", e)))?;
    ws.send(Message::Text(text))
        .await
        .map_err(|e| ConnectError::Setup(format!("identify send: {}", e)))?;

    let (commands, rx) = mpsc::channel(16);
    let session = Session {
        ws,
        shared,
        commands: rx,
        heartbeat: tokio::time::interval(Duration::from_millis(hello.heartbeat_interval.max(1))),
        last_seq: None,
        awaiting_ack: false,
    };
    tokio::spawn(session.run());

    Ok(commands)
}

/// Read frames until the server's Hello arrives.
async fn read_hello(ws: &mut WsStream) -> Result<protocol::Hello, ConnectError> {
    let hello = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        while let Some(msg) = ws.next().await {
            let msg = msg.map_err(|e| ConnectError::Handshake(e.to_string()))?;
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    return Err(ConnectError::Handshake(format!(
                        "gateway closed during handshake: {:?}",
                        frame
                    )));
                }
                _ => continue,
            };

            let frame: GatewayFrame = serde_json::from_str(&text)
                .map_err(|e| ConnectError::Handshake(format!("undecodable frame: {}", e)))?;
            if frame.op != opcode::HELLO {
                return Err(ConnectError::Handshake(format!(
                    "expected hello, got op {}",
                    frame.op
                )));
            }
            return serde_json::from_value(frame.d)
                .map_err(|e| ConnectError::Handshake(format!("malformed hello: {}", e)));
        }
        Err(ConnectError::Handshake(
            "gateway closed during handshake".to_string(),
        ))
    })
    .await;

    match hello {
        Ok(result) => result,
        Err(_) => Err(ConnectError::Handshake(
            "timed out waiting for hello".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// What the next loop iteration should do.
enum Step {
    Beat,
    Command(Option<Command>),
    Socket(Option<Result<Message, WsError>>),
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

struct Session {
    ws: WsStream,
    shared: Arc<Shared>,
    commands: mpsc::Receiver<Command>,
    heartbeat: tokio::time::Interval,
    last_seq: Option<u64>,
    awaiting_ack: bool,
}

impl Session {
    async fn run(mut self) {
        loop {
            let step = tokio::select! {
                _ = self.heartbeat.tick() => Step::Beat,
                cmd = self.commands.recv() => Step::Command(cmd),
                msg = self.ws.next() => Step::Socket(msg),
            };

            let flow = match step {
                Step::Beat => self.beat().await,
                Step::Command(Some(Command::Presence(label, ack))) => {
                    let result = self.send_presence(&label).await;
                    let flow = if result.is_err() {
                        Flow::Stop
                    } else {
                        Flow::Continue
                    };
                    let _ = ack.send(result);
                    flow
                }
                // All handles dropped; nothing left to serve.
                Step::Command(None) => Flow::Stop,
                Step::Socket(Some(Ok(Message::Text(text)))) => self.handle_frame(&text).await,
                Step::Socket(Some(Ok(Message::Close(frame)))) => {
                    info!(?frame, "gateway sent close");
                    Flow::Stop
                }
                // Ping/pong is answered by tungstenite itself; binary frames
                // never appear with the JSON encoding.
                Step::Socket(Some(Ok(_))) => Flow::Continue,
                Step::Socket(Some(Err(e))) => {
                    warn!(error = %e, "gateway socket error");
                    Flow::Stop
                }
                Step::Socket(None) => Flow::Stop,
            };

            if flow == Flow::Stop {
                break;
            }
        }

        let _ = self.ws.close(None).await;
        self.shared.closed.send_replace(true);
        info!("gateway session ended");
    }

    /// Periodic heartbeat; a missing ack since the last beat means the
    /// connection is a zombie and gets torn down.
    async fn beat(&mut self) -> Flow {
        if self.awaiting_ack {
            warn!("heartbeat went unacknowledged, closing gateway");
            return Flow::Stop;
        }
        let text = match protocol::encode(opcode::HEARTBEAT, &self.last_seq) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "heartbeat encode failed");
                return Flow::Stop;
            }
        };
        if let Err(e) = self.ws.send(Message::Text(text)).await {
            warn!(error = %e, "heartbeat send failed");
            return Flow::Stop;
        }
        self.awaiting_ack = true;
        Flow::Continue
    }

    async fn send_presence(&mut self, label: &str) -> Result<(), UpdateError> {
        let update = protocol::PresenceUpdate::watching(label);
        let text = protocol::encode(opcode::PRESENCE_UPDATE, &update)
            .map_err(|e| UpdateError::Unknown(format!("presence encode: {}", e)))?;
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|e| UpdateError::Transient(format!("gateway send: {}", e)))
    }

    async fn handle_frame(&mut self, text: &str) -> Flow {
        let frame: GatewayFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "ignoring undecodable gateway frame");
                return Flow::Continue;
            }
        };
        if let Some(seq) = frame.s {
            self.last_seq = Some(seq);
        }

        match frame.op {
            opcode::DISPATCH => self.handle_dispatch(frame).await,
            // The server may request an immediate beat.
            opcode::HEARTBEAT => self.beat().await,
            opcode::HEARTBEAT_ACK => {
                self.awaiting_ack = false;
                Flow::Continue
            }
            opcode::RECONNECT => {
                info!("gateway requested reconnect, treating as closure");
                Flow::Stop
            }
            opcode::INVALID_SESSION => {
                warn!("gateway invalidated the session");
                Flow::Stop
            }
            other => {
                debug!(op = other, "ignoring gateway frame");
                Flow::Continue
            }
        }
    }

    async fn handle_dispatch(&mut self, frame: GatewayFrame) -> Flow {
        match frame.t.as_deref().unwrap_or_default() {
            "READY" => match serde_json::from_value::<protocol::Ready>(frame.d) {
                Ok(ready) => {
                    {
                        let mut guilds = self.shared.guilds.write().await;
                        for guild in &ready.guilds {
                            if let Ok(id) = guild.id.parse::<GroupId>() {
                                guilds.insert(id);
                            }
                        }
                    }
                    info!(
                        user = %ready.user.username,
                        session = %ready.session_id,
                        guilds = ready.guilds.len(),
                        "gateway ready"
                    );
                    self.shared.ready.send_replace(true);
                }
                Err(e) => warn!(error = %e, "undecodable READY payload"),
            },
            "GUILD_CREATE" => {
                if let Ok(guild) = serde_json::from_value::<protocol::GuildRef>(frame.d) {
                    if let Ok(id) = guild.id.parse::<GroupId>() {
                        debug!(guild = id, "guild available");
                        self.shared.guilds.write().await.insert(id);
                    }
                }
            }
            "GUILD_DELETE" => {
                if let Ok(guild) = serde_json::from_value::<protocol::GuildRef>(frame.d) {
                    // unavailable means an outage, not a removal from the guild
                    if !guild.unavailable {
                        if let Ok(id) = guild.id.parse::<GroupId>() {
                            debug!(guild = id, "guild removed");
                            self.shared.guilds.write().await.remove(&id);
                        }
                    }
                }
            }
            _ => {}
        }
        Flow::Continue
    }
}
