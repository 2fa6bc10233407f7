// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Multi-renderer listener behavior over real loopback sockets.

use std::net::SocketAddr;
use std::time::Duration;

use prism_net::{connect, TransportHandle, TransportNotice, TransportSpec};
use prism_proto::wire::encode_frame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

async fn listen_any() -> (
    TransportHandle,
    mpsc::UnboundedReceiver<TransportNotice>,
    SocketAddr,
) {
    let (owner_tx, owner_rx) = mpsc::unbounded_channel();
    let spec = TransportSpec::TcpServer {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let handle = connect(&spec, owner_tx).await.expect("bind");
    let addr = handle.local_addr().expect("bound address");
    (handle, owner_rx, addr)
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

async fn next_notice(rx: &mut mpsc::UnboundedReceiver<TransportNotice>) -> TransportNotice {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("notice within 2s")
        .expect("owner channel open")
}

#[tokio::test]
async fn two_peers_receive_every_broadcast_byte_for_byte() {
    let (handle, _owner_rx, addr) = listen_any().await;
    let mut a = TcpStream::connect(addr).await.unwrap();
    let mut b = TcpStream::connect(addr).await.unwrap();
    wait_until(|| handle.peer_count() == 2).await;

    let first = encode_frame(0x03, &[]);
    let second = encode_frame(0x01, b"\x00\x00\x00\x02idscript");
    handle.send(first.clone());
    handle.send(second.clone());

    let expected = [first.as_ref(), second.as_ref()].concat();
    for peer in [&mut a, &mut b] {
        let mut got = vec![0u8; expected.len()];
        timeout(Duration::from_secs(2), peer.read_exact(&mut got))
            .await
            .expect("read within 2s")
            .expect("read ok");
        assert_eq!(got, expected);
    }
}

#[tokio::test]
async fn frame_split_across_writes_is_forwarded_once_complete() {
    let (handle, mut owner_rx, addr) = listen_any().await;
    let mut peer = TcpStream::connect(addr).await.unwrap();
    wait_until(|| handle.peer_count() == 1).await;

    let frame = encode_frame(0x05, &[0, 0, 3, 32, 0, 0, 9, 96]);
    peer.write_all(&frame[..3]).await.unwrap();
    peer.flush().await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert!(
        owner_rx.try_recv().is_err(),
        "no frame may surface before the payload completes"
    );

    peer.write_all(&frame[3..]).await.unwrap();
    match next_notice(&mut owner_rx).await {
        TransportNotice::Frame { frame: got, .. } => assert_eq!(got, frame),
        other => panic!("expected frame, got {other:?}"),
    }
}

#[tokio::test]
async fn frames_in_one_write_are_forwarded_in_order() {
    let (handle, mut owner_rx, addr) = listen_any().await;
    let mut peer = TcpStream::connect(addr).await.unwrap();
    wait_until(|| handle.peer_count() == 1).await;

    let ready = encode_frame(0x06, &[]);
    let stats = encode_frame(0x01, &1024u64.to_be_bytes());
    peer.write_all(&[ready.as_ref(), stats.as_ref()].concat())
        .await
        .unwrap();

    for expected in [ready, stats] {
        match next_notice(&mut owner_rx).await {
            TransportNotice::Frame { frame, .. } => assert_eq!(frame, expected),
            other => panic!("expected frame, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn transfer_ownership_redirects_peer_frames_to_the_new_owner() {
    let (handle, mut old_rx, addr) = listen_any().await;
    let mut peer = TcpStream::connect(addr).await.unwrap();
    wait_until(|| handle.peer_count() == 1).await;

    let (new_tx, mut new_rx) = mpsc::unbounded_channel();
    handle.transfer_ownership(new_tx);
    // Let the actor process the handoff before traffic arrives.
    sleep(Duration::from_millis(50)).await;

    let frame = encode_frame(0x06, &[]);
    peer.write_all(&frame).await.unwrap();
    match next_notice(&mut new_rx).await {
        TransportNotice::Frame { frame: got, .. } => assert_eq!(got, frame),
        other => panic!("expected frame, got {other:?}"),
    }
    assert!(old_rx.try_recv().is_err(), "old owner must see nothing");
}

#[tokio::test]
async fn closing_one_peer_leaves_the_other_functional() {
    let (handle, mut owner_rx, addr) = listen_any().await;
    let a = TcpStream::connect(addr).await.unwrap();
    let mut b = TcpStream::connect(addr).await.unwrap();
    wait_until(|| handle.peer_count() == 2).await;

    drop(a);
    match next_notice(&mut owner_rx).await {
        TransportNotice::Closed { .. } => {}
        other => panic!("expected closed, got {other:?}"),
    }
    wait_until(|| handle.peer_count() == 1).await;
    assert!(handle.is_connected());

    let frame = encode_frame(0x06, &[]);
    handle.send(frame.clone());
    let mut got = vec![0u8; frame.len()];
    timeout(Duration::from_secs(2), b.read_exact(&mut got))
        .await
        .expect("read within 2s")
        .expect("read ok");
    assert_eq!(got, frame.to_vec());
}

#[tokio::test]
async fn oversized_frame_header_drops_the_peer() {
    let (handle, mut owner_rx, addr) = listen_any().await;
    let mut peer = TcpStream::connect(addr).await.unwrap();
    wait_until(|| handle.peer_count() == 1).await;

    // Header declares a 4 GiB payload.
    peer.write_all(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF]).await.unwrap();
    match next_notice(&mut owner_rx).await {
        TransportNotice::Closed { .. } => {}
        other => panic!("expected closed, got {other:?}"),
    }
    wait_until(|| handle.peer_count() == 0).await;
    assert!(!handle.is_connected());

    // The listener itself survives.
    let _replacement = TcpStream::connect(addr).await.unwrap();
    wait_until(|| handle.peer_count() == 1).await;
}

#[tokio::test]
async fn disconnect_stops_the_listener_and_peers() {
    let (handle, _owner_rx, addr) = listen_any().await;
    let mut peer = TcpStream::connect(addr).await.unwrap();
    wait_until(|| handle.peer_count() == 1).await;

    handle.disconnect();
    wait_until(|| !handle.is_connected()).await;

    // Peer socket closes...
    let mut scratch = [0u8; 1];
    let n = timeout(Duration::from_secs(2), peer.read(&mut scratch))
        .await
        .expect("read within 2s")
        .unwrap_or(0);
    assert_eq!(n, 0);

    // ...and nobody is accepting anymore.
    sleep(Duration::from_millis(50)).await;
    let refused = TcpStream::connect(addr).await;
    if let Ok(mut stream) = refused {
        // The OS may still complete the handshake on a dying listener; the
        // connection must at least be dead on arrival.
        let n = timeout(Duration::from_secs(2), stream.read(&mut scratch))
            .await
            .expect("read within 2s")
            .unwrap_or(0);
        assert_eq!(n, 0);
    }
}
