// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Outbound WebSocket connector (single renderer, binary frames only).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::{Cmd, OwnerTx, PeerId, TransportError, TransportHandle, TransportKind, TransportNotice};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Connect to a renderer at a `ws://` or `wss://` URL.
pub async fn connect(url: &str, owner: OwnerTx) -> Result<TransportHandle, TransportError> {
    let (ws_stream, _response) =
        tokio_tungstenite::connect_async(url)
            .await
            .map_err(|err| TransportError::WebSocket {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
    info!(%url, "websocket connected to renderer");

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let peers = Arc::new(AtomicUsize::new(1));
    tokio::spawn(run(ws_stream, owner, cmd_rx, Arc::clone(&peers)));
    Ok(TransportHandle::new(
        TransportKind::Client,
        cmd_tx,
        peers,
        None,
    ))
}

async fn run(
    ws_stream: WsStream,
    mut owner: OwnerTx,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
    peers: Arc<AtomicUsize>,
) {
    let (mut sink, mut stream) = ws_stream.split();
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Cmd::Send(frame)) => {
                    if let Err(err) = sink.send(Message::Binary(frame.to_vec())).await {
                        warn!(%err, "websocket send failed");
                        let _ = owner.send(TransportNotice::Error {
                            peer: PeerId::CLIENT,
                            reason: err.to_string(),
                        });
                        break;
                    }
                }
                Some(Cmd::SetOwner(tx)) => owner = tx,
                Some(Cmd::Disconnect) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Binary(data))) => {
                    let _ = owner.send(TransportNotice::Data {
                        peer: PeerId::CLIENT,
                        bytes: Bytes::from(data),
                    });
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("websocket closed by remote");
                    let _ = owner.send(TransportNotice::Closed { peer: PeerId::CLIENT });
                    break;
                }
                Some(Ok(Message::Text(_))) => {
                    warn!("ignoring text frame on binary protocol");
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%err, "websocket read failed");
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
}
