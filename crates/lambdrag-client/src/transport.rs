//! WebSocket transport: derives the socket endpoint from the page origin,
//! decodes inbound text frames into snapshots and encodes outbound updates.
//!
//! The transport never retries. A failed send is logged and dropped; the
//! next local change produces a fresh update anyway. Writes happen on a
//! separate task behind a one-slot [`Outbox`], so a slow socket never holds
//! up snapshot or input handling.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use lambdrag_core::{Snapshot, TokenUpdate, WireError};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

/// Fixed socket path, resolved against the page origin.
pub const SOCKET_PATH: &str = "/ws";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unsupported origin scheme: {0}")]
    UnsupportedScheme(String),

    #[error("cannot derive socket url from {0}")]
    BadOrigin(String),

    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Map a page origin onto the socket endpoint: `http` becomes `ws`,
/// `https` becomes `wss`, the path is replaced by [`SOCKET_PATH`] and any
/// query or fragment is dropped. Host and port are kept.
pub fn ws_url_from_origin(origin: &Url) -> Result<Url, TransportError> {
    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(TransportError::UnsupportedScheme(other.to_string())),
    };
    if origin.host_str().is_none() {
        return Err(TransportError::BadOrigin(origin.to_string()));
    }
    let mut url = origin.clone();
    url.set_scheme(scheme)
        .map_err(|()| TransportError::BadOrigin(origin.to_string()))?;
    url.set_path(SOCKET_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// One inbound event after frame-level filtering.
#[derive(Debug)]
pub enum Inbound {
    Snapshot(Snapshot),
    /// The frame could not be decoded; state must stay untouched.
    Malformed(WireError),
}

/// An open connection. Split it before handing the halves to `select!`.
pub struct Connection {
    ws: WsStream,
}

impl Connection {
    pub async fn connect(url: &Url) -> Result<Self, TransportError> {
        let (ws, _resp) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::info!(%url, "connected");
        Ok(Self { ws })
    }

    pub fn split(self) -> (Sender, Receiver) {
        let (tx, rx) = self.ws.split();
        (Sender { tx }, Receiver { rx })
    }
}

/// Outbound half.
pub struct Sender {
    tx: SplitSink<WsStream, Message>,
}

impl Sender {
    pub async fn send(&mut self, update: &TokenUpdate) -> Result<(), TransportError> {
        let text = update.encode()?;
        tracing::trace!(token = update.token_id, x = update.x, y = update.y, "send");
        self.tx.send(Message::Text(text)).await?;
        Ok(())
    }

    pub async fn close(&mut self) {
        let _ = self.tx.send(Message::Close(None)).await;
    }
}

// ---------------------------------------------------------------------------
// Writer task
// ---------------------------------------------------------------------------

/// Counters reported by the writer task when it exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterStats {
    pub sent: u64,
    pub send_failures: u64,
}

/// Latest-wins handoff to the writer task. Posting never waits: an update
/// the writer has not picked up yet is replaced by the newer one.
pub struct Outbox {
    slot: watch::Sender<Option<TokenUpdate>>,
}

impl Outbox {
    pub fn post(&self, update: TokenUpdate) {
        self.slot.send_replace(Some(update));
    }
}

/// Move the outbound half onto its own task. The task drains the slot until
/// the [`Outbox`] is dropped, then closes the socket.
pub fn spawn_writer(sender: Sender) -> (Outbox, JoinHandle<WriterStats>) {
    let (slot, rx) = watch::channel(None);
    let handle = tokio::spawn(run_writer(sender, rx));
    (Outbox { slot }, handle)
}

async fn run_writer(
    mut sender: Sender,
    mut rx: watch::Receiver<Option<TokenUpdate>>,
) -> WriterStats {
    let mut stats = WriterStats::default();
    while rx.changed().await.is_ok() {
        let Some(update) = rx.borrow_and_update().clone() else {
            continue;
        };
        match sender.send(&update).await {
            Ok(()) => stats.sent += 1,
            Err(e) => {
                stats.send_failures += 1;
                tracing::warn!(error = %e, token = update.token_id, "send failed");
            }
        }
    }
    sender.close().await;
    stats
}

/// Inbound half.
pub struct Receiver {
    rx: SplitStream<WsStream>,
}

impl Receiver {
    /// Next decoded event. `None` once the peer closed or the stream failed.
    pub async fn recv(&mut self) -> Option<Inbound> {
        loop {
            let msg = match self.rx.next().await {
                Some(Ok(m)) => m,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "ws read error");
                    return None;
                }
                None => {
                    tracing::info!("server closed the stream");
                    return None;
                }
            };
            let text = match msg {
                Message::Text(t) => t,
                Message::Binary(b) => match String::from_utf8(b) {
                    Ok(t) => t,
                    Err(_) => {
                        tracing::debug!("ignoring non-utf8 binary frame");
                        continue;
                    }
                },
                Message::Close(frame) => {
                    tracing::info!(?frame, "server sent close frame");
                    return None;
                }
                // Pings are answered by tungstenite on the next write.
                _ => continue,
            };
            return Some(match Snapshot::decode(&text) {
                Ok(s) => Inbound::Snapshot(s),
                Err(e) => Inbound::Malformed(e),
            });
        }
    }
}
