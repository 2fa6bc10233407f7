// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Full-stack driver tests over real sockets, playing the renderer side of
//! the documented connection lifecycle: connect → READY → sync burst →
//! reshape → fit transform → steady state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use prism_driver::{Driver, DriverConfig, Host, HostInput, ImageAsset, MediaRefs};
use prism_net::TransportSpec;
use prism_proto::cmd::code as cmd_code;
use prism_proto::event::code as ev_code;
use prism_proto::{wire, FrameBuffer, Ident};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

/// A host with a fixed scene: one script per entry, no assets unless given.
#[derive(Default)]
struct StubHost {
    scripts: Mutex<Vec<(Ident, Vec<u8>)>>,
    fonts: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    refs: Mutex<HashMap<Vec<u8>, MediaRefs>>,
    inputs: Mutex<Vec<HostInput>>,
}

impl Host for StubHost {
    fn fetch_script(&self, id: &Ident) -> Option<Vec<u8>> {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .find(|(i, _)| i == id)
            .map(|(_, body)| body.clone())
    }

    fn live_script_ids(&self) -> Vec<Ident> {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .map(|(i, _)| i.clone())
            .collect()
    }

    fn media_refs(&self, script: &[u8]) -> MediaRefs {
        self.refs
            .lock()
            .unwrap()
            .get(script)
            .cloned()
            .unwrap_or_default()
    }

    fn load_font(&self, id: &Ident) -> Option<Vec<u8>> {
        self.fonts.lock().unwrap().get(&id.to_bytes()).cloned()
    }

    fn load_image(&self, _id: &Ident) -> Option<ImageAsset> {
        None
    }

    fn load_stream_frame(&self, _id: &Ident) -> Option<ImageAsset> {
        None
    }

    fn send_input(&self, input: HostInput) {
        self.inputs.lock().unwrap().push(input);
    }
}

/// The remote end: a TCP socket plus frame recovery.
struct Renderer {
    stream: TcpStream,
    buf: FrameBuffer,
}

impl Renderer {
    async fn connect(port: u16) -> Renderer {
        for _ in 0..200 {
            if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
                return Renderer::new(stream);
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("driver never started listening on port {port}");
    }

    fn new(stream: TcpStream) -> Renderer {
        Renderer {
            stream,
            buf: FrameBuffer::new(),
        }
    }

    async fn send_event(&mut self, code: u8, payload: &[u8]) {
        self.stream
            .write_all(&wire::encode_frame(code, payload))
            .await
            .unwrap();
    }

    async fn next_frame(&mut self) -> Bytes {
        loop {
            if let Some(frame) = self.buf.next_frame().unwrap() {
                return frame;
            }
            let mut chunk = [0u8; 4096];
            let n = timeout(Duration::from_secs(2), self.stream.read(&mut chunk))
                .await
                .expect("frame within 2s")
                .expect("socket read");
            assert!(n > 0, "driver closed the connection unexpectedly");
            self.buf.extend(&chunk[..n]);
        }
    }

    async fn read_until_render(&mut self) -> Vec<Bytes> {
        let mut frames = Vec::new();
        loop {
            let frame = self.next_frame().await;
            let code = frame[0];
            frames.push(frame);
            if code == cmd_code::RENDER {
                return frames;
            }
        }
    }

    async fn expect_eof(&mut self) {
        let mut scratch = [0u8; 64];
        loop {
            let n = timeout(Duration::from_secs(2), self.stream.read(&mut scratch))
                .await
                .expect("eof within 2s")
                .unwrap_or(0);
            if n == 0 {
                return;
            }
        }
    }
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn codes(frames: &[Bytes]) -> Vec<u8> {
    frames.iter().map(|f| f[0]).collect()
}

fn be_f32(b: &[u8]) -> f32 {
    f32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[tokio::test]
async fn renderer_lifecycle_ready_sync_reshape_quit() {
    init_tracing();
    let port = free_port();
    let host = Arc::new(StubHost::default());
    host.scripts
        .lock()
        .unwrap()
        .push((Ident::from("main"), b"main-body".to_vec()));
    host.fonts
        .lock()
        .unwrap()
        .insert(b"sans".to_vec(), b"sans-bytes".to_vec());
    host.refs.lock().unwrap().insert(
        b"main-body".to_vec(),
        MediaRefs {
            fonts: vec![Ident::from("sans")],
            ..Default::default()
        },
    );

    let config = DriverConfig {
        transport: TransportSpec::TcpServer {
            host: "127.0.0.1".to_string(),
            port,
        },
        reconnect_interval_ms: 100,
        design_size: (1080, 2400),
    };
    let driver = Driver::spawn(config, Arc::clone(&host)).expect("config is valid");

    let mut renderer = Renderer::connect(port).await;

    // (2) READY triggers (3): the asset/script burst plus one render.
    renderer.send_event(ev_code::READY, &[]).await;
    let burst = renderer.read_until_render().await;
    assert_eq!(
        codes(&burst),
        vec![cmd_code::PUT_FONT, cmd_code::PUT_SCRIPT, cmd_code::RENDER]
    );
    // The script frame carries the id and the body.
    let script_frame = &burst[1];
    let payload = &script_frame[5..];
    let id_len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    assert_eq!(&payload[4..4 + id_len], b"main");
    assert_eq!(&payload[4 + id_len..], b"main-body");

    // (4) Reshape yields (5): GLOBAL_TX then a render.
    let mut reshape = Vec::new();
    reshape.extend_from_slice(&1179u32.to_be_bytes());
    reshape.extend_from_slice(&2556u32.to_be_bytes());
    renderer.send_event(ev_code::RESHAPE, &reshape).await;

    let tx_frame = renderer.next_frame().await;
    assert_eq!(tx_frame[0], cmd_code::GLOBAL_TX);
    let p = &tx_frame[5..];
    assert!((be_f32(&p[0..]) - 1.065).abs() < 1e-3);
    assert!((be_f32(&p[16..]) - 14.4).abs() < 1e-3);
    assert!(be_f32(&p[20..]).abs() < 1e-3);
    assert_eq!(renderer.next_frame().await[0], cmd_code::RENDER);

    assert_eq!(
        host.inputs.lock().unwrap().as_slice(),
        &[HostInput::Viewport {
            width: 1179,
            height: 2556
        }]
    );

    // Shutdown: renderers get a QUIT, then the socket closes.
    driver.stop();
    assert_eq!(renderer.next_frame().await[0], cmd_code::QUIT);
    renderer.expect_eof().await;
}

#[tokio::test]
async fn late_renderer_ready_rebroadcasts_to_everyone() {
    init_tracing();
    let port = free_port();
    let host = Arc::new(StubHost::default());
    host.scripts
        .lock()
        .unwrap()
        .push((Ident::from("scene"), b"scene-body".to_vec()));

    let config = DriverConfig {
        transport: TransportSpec::TcpServer {
            host: "127.0.0.1".to_string(),
            port,
        },
        reconnect_interval_ms: 100,
        design_size: (800, 600),
    };
    let driver = Driver::spawn(config, Arc::clone(&host)).expect("config is valid");

    let mut first = Renderer::connect(port).await;
    first.send_event(ev_code::READY, &[]).await;
    assert_eq!(
        codes(&first.read_until_render().await),
        vec![cmd_code::PUT_SCRIPT, cmd_code::RENDER]
    );

    // A second renderer joins and reports READY: the sync burst is a
    // broadcast, so both see it.
    let mut second = Renderer::connect(port).await;
    second.send_event(ev_code::READY, &[]).await;
    assert_eq!(
        codes(&second.read_until_render().await),
        vec![cmd_code::PUT_SCRIPT, cmd_code::RENDER]
    );
    assert_eq!(
        codes(&first.read_until_render().await),
        vec![cmd_code::PUT_SCRIPT, cmd_code::RENDER]
    );

    driver.stop();
}

#[tokio::test]
async fn outbound_driver_reconnects_after_connection_loss() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let host = Arc::new(StubHost::default());
    host.scripts
        .lock()
        .unwrap()
        .push((Ident::from("scene"), b"scene-body".to_vec()));

    let config = DriverConfig {
        transport: TransportSpec::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        },
        reconnect_interval_ms: 100,
        design_size: (800, 600),
    };
    let driver = Driver::spawn(config, Arc::clone(&host)).expect("config is valid");

    // First connection dies immediately.
    let (first, _) = timeout(Duration::from_secs(2), listener.accept())
        .await
        .expect("first connect")
        .unwrap();
    drop(first);

    // The engine comes back on its fixed interval; the renderer then drives
    // a normal sync.
    let (stream, _) = timeout(Duration::from_secs(2), listener.accept())
        .await
        .expect("reconnect within 2s")
        .unwrap();
    let mut renderer = Renderer::new(stream);
    renderer.send_event(ev_code::READY, &[]).await;
    assert_eq!(
        codes(&renderer.read_until_render().await),
        vec![cmd_code::PUT_SCRIPT, cmd_code::RENDER]
    );

    driver.stop();
    assert_eq!(renderer.next_frame().await[0], cmd_code::QUIT);
}
