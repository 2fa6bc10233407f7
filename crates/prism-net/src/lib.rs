// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transports for prism.
//!
//! Every transport runs as a tokio task that exclusively owns its sockets.
//! The rest of the system talks to it through a [`TransportHandle`]: sends
//! are fire-and-forget message handoffs, inbound traffic arrives at the
//! designated owner as [`TransportNotice`] values. Single-peer connectors
//! ([`tcp`], [`unix`], [`ws`]) forward raw bytes and leave frame recovery to
//! the recipient; the multi-renderer [`server`] runs a per-peer
//! [`prism_proto::FrameBuffer`] and forwards only complete frames.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

mod client;
pub mod server;
pub mod tcp;
#[cfg(unix)]
pub mod unix;
pub mod ws;

/// Where (and how) to reach the remote renderer(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum TransportSpec {
    /// Listen for renderers on `host:port` and broadcast to all of them.
    TcpServer {
        #[serde(default = "default_bind_host")]
        host: String,
        port: u16,
    },
    /// Connect out to a single renderer at `host:port`.
    Tcp { host: String, port: u16 },
    /// Connect out to a single renderer over a Unix-domain socket.
    UnixSocket { path: PathBuf },
    /// Connect out to a single renderer over a WebSocket (binary frames).
    WebSocket { url: String },
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

impl TransportSpec {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportSpec::TcpServer { .. } => TransportKind::Server,
            _ => TransportKind::Client,
        }
    }
}

/// Whether a handle fronts a listener or a single outbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Client,
    Server,
}

/// Identifies one remote renderer on a transport.
///
/// Single-peer transports always report [`PeerId::CLIENT`]; the server
/// allocates ids as it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u64);

impl PeerId {
    /// The only peer of a single-peer transport.
    pub const CLIENT: PeerId = PeerId(0);
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Inbound traffic and lifecycle signals, delivered to the owner.
#[derive(Debug)]
pub enum TransportNotice {
    /// Raw bytes from a single-peer transport. The recipient runs frame
    /// extraction over its own buffer.
    Data { peer: PeerId, bytes: Bytes },
    /// A complete frame (header included) from a server peer.
    Frame { peer: PeerId, frame: Bytes },
    /// The peer went away cleanly or was removed.
    Closed { peer: PeerId },
    /// The peer died with an error.
    Error { peer: PeerId, reason: String },
}

/// Sender half the transport delivers notices to.
pub type OwnerTx = mpsc::UnboundedSender<TransportNotice>;

/// Construction failures. Everything after a successful connect/bind is
/// reported through [`TransportNotice`] instead.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bind {endpoint} failed: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("websocket handshake with {url} failed: {reason}")]
    WebSocket { url: String, reason: String },
}

pub(crate) enum Cmd {
    Send(Bytes),
    SetOwner(OwnerTx),
    Disconnect,
}

/// Channel front for a transport actor.
///
/// Dropping the handle does not stop the actor; call
/// [`TransportHandle::disconnect`] for that.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    kind: TransportKind,
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    /// Live peer count; 0 or 1 for single-peer transports.
    peers: Arc<AtomicUsize>,
    local_addr: Option<SocketAddr>,
}

impl TransportHandle {
    pub(crate) fn new(
        kind: TransportKind,
        cmd_tx: mpsc::UnboundedSender<Cmd>,
        peers: Arc<AtomicUsize>,
        local_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            kind,
            cmd_tx,
            peers,
            local_addr,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// The bound address of a server transport.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Queue a frame for the peer (or, on a server, every peer). Silently a
    /// no-op once the actor is gone; delivery failures surface as notices.
    pub fn send(&self, frame: Bytes) {
        let _ = self.cmd_tx.send(Cmd::Send(frame));
    }

    /// Redirect future notices to a new recipient.
    pub fn transfer_ownership(&self, owner: OwnerTx) {
        let _ = self.cmd_tx.send(Cmd::SetOwner(owner));
    }

    /// Stop the actor: peers first, then the listener (if any).
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Cmd::Disconnect);
    }

    /// True while at least one peer is alive.
    pub fn is_connected(&self) -> bool {
        self.peers.load(Ordering::SeqCst) > 0
    }

    /// Live peer count: 0 or 1 on single-peer transports, the number of
    /// accepted renderers on a server.
    pub fn peer_count(&self) -> usize {
        self.peers.load(Ordering::SeqCst)
    }

    /// A loopback handle for driving engine code without sockets: frames
    /// passed to [`TransportHandle::send`] pop out of the returned receiver.
    pub fn in_memory() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let peers = Arc::new(AtomicUsize::new(1));
        let flag = Arc::clone(&peers);
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                match cmd {
                    Cmd::Send(frame) => {
                        if sent_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Cmd::SetOwner(_) => {}
                    Cmd::Disconnect => break,
                }
            }
            flag.store(0, Ordering::SeqCst);
        });
        (
            Self::new(TransportKind::Client, cmd_tx, peers, None),
            sent_rx,
        )
    }
}

/// Build the transport named by `spec` and hand inbound traffic to `owner`.
pub async fn connect(
    spec: &TransportSpec,
    owner: OwnerTx,
) -> Result<TransportHandle, TransportError> {
    match spec {
        TransportSpec::TcpServer { host, port } => server::listen(host, *port, owner).await,
        TransportSpec::Tcp { host, port } => tcp::connect(host, *port, owner).await,
        #[cfg(unix)]
        TransportSpec::UnixSocket { path } => unix::connect(path, owner).await,
        #[cfg(not(unix))]
        TransportSpec::UnixSocket { path } => Err(TransportError::Connect {
            endpoint: path.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix sockets are not available on this platform",
            ),
        }),
        TransportSpec::WebSocket { url } => ws::connect(url, owner).await,
    }
}
