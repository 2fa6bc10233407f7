// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Multi-renderer TCP listener.
//!
//! One actor owns the listener and the peer map. Every accepted renderer
//! gets a reader task (socket → actor), a writer task (outbox → socket), and
//! a [`FrameBuffer`] living in the actor, so inbound bytes from concurrent
//! peers never interleave: the owner only ever sees complete frames tagged
//! with the peer that sent them.
//!
//! A broadcast sweeps every peer and removes the ones it could not reach
//! after the sweep; the call itself never fails. Peer loss leaves the
//! listener running.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use prism_proto::FrameBuffer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{Cmd, OwnerTx, PeerId, TransportError, TransportHandle, TransportKind, TransportNotice};

const READ_CHUNK: usize = 16 * 1024;

/// Outbound frames queued per peer before it counts as unreachable.
const OUTBOX_DEPTH: usize = 256;

/// Bind `host:port` and start accepting renderers.
pub async fn listen(
    host: &str,
    port: u16,
    owner: OwnerTx,
) -> Result<TransportHandle, TransportError> {
    let endpoint = format!("{host}:{port}");
    let listener = TcpListener::bind(&endpoint)
        .await
        .map_err(|source| TransportError::Bind {
            endpoint: endpoint.clone(),
            source,
        })?;
    let local_addr = listener.local_addr().ok();
    info!(%endpoint, "listening for renderers");

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let peers = Arc::new(AtomicUsize::new(0));
    tokio::spawn(run(listener, owner, cmd_rx, Arc::clone(&peers)));
    Ok(TransportHandle::new(
        TransportKind::Server,
        cmd_tx,
        peers,
        local_addr,
    ))
}

struct Peer {
    buf: FrameBuffer,
    outbox: mpsc::Sender<Bytes>,
    addr: std::net::SocketAddr,
    reader: JoinHandle<()>,
}

enum PeerMsg {
    Read { peer: PeerId, bytes: Bytes },
    /// Reader or writer lost the socket; `reason` is `None` on clean close.
    Gone { peer: PeerId, reason: Option<String> },
}

async fn run(
    listener: TcpListener,
    mut owner: OwnerTx,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
    peer_count: Arc<AtomicUsize>,
) {
    let mut peers: HashMap<PeerId, Peer> = HashMap::new();
    let mut next_peer: u64 = 1;
    let (peer_tx, mut peer_rx) = mpsc::unbounded_channel::<PeerMsg>();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let _ = stream.set_nodelay(true);
                    let id = PeerId(next_peer);
                    next_peer += 1;
                    let (read_half, write_half) = stream.into_split();
                    let (out_tx, out_rx) = mpsc::channel(OUTBOX_DEPTH);
                    let reader = tokio::spawn(peer_reader(id, read_half, peer_tx.clone()));
                    tokio::spawn(peer_writer(id, write_half, out_rx, peer_tx.clone()));
                    peers.insert(id, Peer {
                        buf: FrameBuffer::new(),
                        outbox: out_tx,
                        addr,
                        reader,
                    });
                    peer_count.store(peers.len(), Ordering::SeqCst);
                    info!(%id, %addr, "renderer connected");
                }
                Err(err) => {
                    warn!(%err, "accept failed");
                }
            },
            Some(msg) = peer_rx.recv() => match msg {
                PeerMsg::Read { peer, bytes } => {
                    let mut oversized = false;
                    if let Some(p) = peers.get_mut(&peer) {
                        p.buf.extend(&bytes);
                        loop {
                            match p.buf.next_frame() {
                                Ok(Some(frame)) => {
                                    let _ = owner.send(TransportNotice::Frame { peer, frame });
                                }
                                Ok(None) => break,
                                Err(err) => {
                                    warn!(%peer, %err, "dropping renderer");
                                    oversized = true;
                                    break;
                                }
                            }
                        }
                    }
                    if oversized {
                        remove_peer(&mut peers, peer, &peer_count);
                        let _ = owner.send(TransportNotice::Closed { peer });
                    }
                }
                PeerMsg::Gone { peer, reason } => {
                    if remove_peer(&mut peers, peer, &peer_count) {
                        match &reason {
                            Some(reason) => warn!(%peer, %reason, "renderer lost"),
                            None => info!(%peer, "renderer disconnected"),
                        }
                        let notice = match reason {
                            Some(reason) => TransportNotice::Error { peer, reason },
                            None => TransportNotice::Closed { peer },
                        };
                        let _ = owner.send(notice);
                    }
                }
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(Cmd::Send(frame)) => {
                    let mut failed = Vec::new();
                    for (id, p) in &peers {
                        if p.outbox.try_send(frame.clone()).is_err() {
                            failed.push(*id);
                        }
                    }
                    // Removal happens after the sweep so surviving peers all
                    // saw the same broadcast.
                    for id in failed {
                        warn!(peer = %id, "broadcast failed, removing renderer");
                        remove_peer(&mut peers, id, &peer_count);
                        let _ = owner.send(TransportNotice::Closed { peer: id });
                    }
                }
                Some(Cmd::SetOwner(tx)) => owner = tx,
                Some(Cmd::Disconnect) | None => break,
            },
        }
    }

    // Shutdown order: peers first, then the listener.
    for (_, peer) in peers.drain() {
        peer.reader.abort();
    }
    peer_count.store(0, Ordering::SeqCst);
    info!("listener stopped");
}

fn remove_peer(
    peers: &mut HashMap<PeerId, Peer>,
    id: PeerId,
    peer_count: &AtomicUsize,
) -> bool {
    let removed = peers.remove(&id);
    peer_count.store(peers.len(), Ordering::SeqCst);
    match removed {
        Some(peer) => {
            // Aborting the reader drops the read half; the writer exits when
            // its outbox closes, dropping the write half.
            peer.reader.abort();
            debug!(peer = %id, addr = %peer.addr, "peer state released");
            true
        }
        None => false,
    }
}

async fn peer_reader(
    peer: PeerId,
    mut read_half: OwnedReadHalf,
    tx: mpsc::UnboundedSender<PeerMsg>,
) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                let _ = tx.send(PeerMsg::Gone { peer, reason: None });
                break;
            }
            Ok(n) => {
                let bytes = Bytes::copy_from_slice(&buf[..n]);
                if tx.send(PeerMsg::Read { peer, bytes }).is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = tx.send(PeerMsg::Gone {
                    peer,
                    reason: Some(format!("read error: {err}")),
                });
                break;
            }
        }
    }
}

async fn peer_writer(
    peer: PeerId,
    mut write_half: OwnedWriteHalf,
    mut outbox: mpsc::Receiver<Bytes>,
    tx: mpsc::UnboundedSender<PeerMsg>,
) {
    while let Some(frame) = outbox.recv().await {
        if let Err(err) = write_half.write_all(&frame).await {
            let _ = tx.send(PeerMsg::Gone {
                peer,
                reason: Some(format!("write error: {err}")),
            });
            return;
        }
    }
    let _ = write_half.shutdown().await;
}
