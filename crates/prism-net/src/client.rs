// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared actor loop for single-peer byte-stream transports (TCP and Unix
//! sockets). The actor owns both socket halves; inbound bytes are forwarded
//! verbatim and frame recovery is the recipient's job.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{Cmd, OwnerTx, PeerId, TransportHandle, TransportKind, TransportNotice};

const READ_CHUNK: usize = 16 * 1024;

/// Spawn the actor for an established byte-stream connection and return its
/// handle.
pub(crate) fn spawn<R, W>(reader: R, writer: W, owner: OwnerTx) -> TransportHandle
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let peers = Arc::new(AtomicUsize::new(1));
    tokio::spawn(run(reader, writer, owner, cmd_rx, Arc::clone(&peers)));
    TransportHandle::new(TransportKind::Client, cmd_tx, peers, None)
}

async fn run<R, W>(
    mut reader: R,
    mut writer: W,
    mut owner: OwnerTx,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
    peers: Arc<AtomicUsize>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Cmd::Send(frame)) => {
                    if let Err(err) = writer.write_all(&frame).await {
                        warn!(%err, "transport write failed");
                        let _ = owner.send(TransportNotice::Error {
                            peer: PeerId::CLIENT,
                            reason: err.to_string(),
                        });
                        break;
                    }
                }
                Some(Cmd::SetOwner(tx)) => owner = tx,
                Some(Cmd::Disconnect) | None => {
                    debug!("transport disconnect requested");
                    break;
                }
            },
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    debug!("remote closed the connection");
                    let _ = owner.send(TransportNotice::Closed { peer: PeerId::CLIENT });
                    break;
                }
                Ok(n) => {
                    let _ = owner.send(TransportNotice::Data {
                        peer: PeerId::CLIENT,
                        bytes: Bytes::copy_from_slice(&buf[..n]),
                    });
                }
                Err(err) => {
                    warn!(%err, "transport read failed");
                    let _ = owner.send(TransportNotice::Error {
                        peer: PeerId::CLIENT,
                        reason: err.to_string(),
                    });
                    break;
                }
            },
        }
    }
    peers.store(0, Ordering::SeqCst);
    let _ = writer.shutdown().await;
}
