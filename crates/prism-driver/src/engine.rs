// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The driver engine: one task owning all connection and scene-sync state.
//!
//! The host framework drives it through a [`Driver`] handle (fire-and-forget
//! calls), the transport feeds it [`TransportNotice`]s, and a reconnect
//! timer wakes it while disconnected. Nothing else touches engine state.
//!
//! Connection lifecycle:
//!
//! ```text
//!    Init ─ connect ok ─► Connected ─ Ready ─► Synced
//!      │ err                  │ close/error        │
//!      ▼                      ▼                    ▼
//!   Scheduled ◄── after reconnect_interval ── Scheduled
//! ```

use std::time::Duration;

use prism_net::{
    OwnerTx, PeerId, TransportHandle, TransportKind, TransportNotice, TransportSpec,
};
use prism_proto::event::touch_action;
use prism_proto::{wire, Command, Event, FrameBuffer, Ident};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, DriverConfig};
use crate::host::{Host, HostColor, HostInput, KeyAction, Mods, PointerButton};
use crate::media::MediaCache;
use crate::{stats, viewport};

enum HostCall {
    ResetScene,
    ClearColor(HostColor),
    UpdateScripts(Vec<Ident>),
    DelScripts(Vec<Ident>),
    RequestInput(u32),
    Stop,
}

/// Handle the host framework drives the engine through. Calls are
/// fire-and-forget handoffs to the engine task; a stopped engine swallows
/// them silently.
#[derive(Debug, Clone)]
pub struct Driver {
    call_tx: mpsc::UnboundedSender<HostCall>,
}

impl Driver {
    /// Validate `config` and start the engine task. Must run inside a tokio
    /// runtime. Configuration problems are the only error the host ever
    /// sees from the driver.
    pub fn spawn<H: Host>(config: DriverConfig, host: H) -> Result<Driver, ConfigError> {
        config.validate()?;
        let (call_tx, call_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(config, host, call_rx));
        Ok(Driver { call_tx })
    }

    /// The host scene was reset: renderers drop everything.
    pub fn reset_scene(&self) {
        let _ = self.call_tx.send(HostCall::ResetScene);
    }

    pub fn clear_color(&self, color: HostColor) {
        let _ = self.call_tx.send(HostCall::ClearColor(color));
    }

    /// Scripts whose bodies changed; assets they reference travel first,
    /// one render closes the batch.
    pub fn update_scripts(&self, ids: Vec<Ident>) {
        let _ = self.call_tx.send(HostCall::UpdateScripts(ids));
    }

    pub fn del_scripts(&self, ids: Vec<Ident>) {
        let _ = self.call_tx.send(HostCall::DelScripts(ids));
    }

    /// Renderers send input unsolicited; this exists to satisfy the host's
    /// driver contract.
    pub fn request_input(&self, flags: u32) {
        let _ = self.call_tx.send(HostCall::RequestInput(flags));
    }

    /// Graceful shutdown: renderers get a `Quit`, then the transport closes
    /// and the engine task exits.
    pub fn stop(&self) {
        let _ = self.call_tx.send(HostCall::Stop);
    }
}

async fn run<H: Host>(
    config: DriverConfig,
    host: H,
    mut call_rx: mpsc::UnboundedReceiver<HostCall>,
) {
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
    let mut engine = Engine::new(config, host, notice_tx);
    engine.try_connect().await;

    'main: loop {
        if engine.transport.is_none() {
            // Scheduled: wait out the interval, serving calls meanwhile
            // (their sends drop silently).
            let deadline = tokio::time::Instant::now() + engine.reconnect;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        engine.try_connect().await;
                        break;
                    }
                    call = call_rx.recv() => match call {
                        Some(HostCall::Stop) | None => break 'main,
                        Some(call) => engine.handle_call(call),
                    },
                    Some(notice) = notice_rx.recv() => engine.handle_notice(notice),
                }
            }
        } else {
            tokio::select! {
                call = call_rx.recv() => match call {
                    Some(HostCall::Stop) | None => break 'main,
                    Some(call) => engine.handle_call(call),
                },
                Some(notice) = notice_rx.recv() => engine.handle_notice(notice),
            }
        }
    }

    engine.shutdown();
}

struct Engine<H: Host> {
    host: H,
    spec: TransportSpec,
    reconnect: Duration,
    design_size: (u32, u32),
    transport: Option<TransportHandle>,
    connected: bool,
    media: MediaCache,
    /// Frame recovery for transports that deliver raw bytes.
    recv: FrameBuffer,
    notice_tx: OwnerTx,
}

impl<H: Host> Engine<H> {
    fn new(config: DriverConfig, host: H, notice_tx: OwnerTx) -> Self {
        Self {
            host,
            spec: config.transport,
            reconnect: Duration::from_millis(config.reconnect_interval_ms),
            design_size: config.design_size,
            transport: None,
            connected: false,
            media: MediaCache::new(),
            recv: FrameBuffer::new(),
            notice_tx,
        }
    }

    async fn try_connect(&mut self) {
        match prism_net::connect(&self.spec, self.notice_tx.clone()).await {
            Ok(handle) => {
                info!(kind = ?handle.kind(), "transport up, awaiting renderer ready");
                self.transport = Some(handle);
                self.connected = true;
                self.media.clear();
                self.recv.clear();
            }
            Err(err) => {
                warn!(%err, retry_in = ?self.reconnect, "connect failed");
                self.transport = None;
                self.connected = false;
            }
        }
    }

    fn handle_call(&mut self, call: HostCall) {
        match call {
            HostCall::ResetScene => {
                self.media.clear();
                self.send(Command::Reset);
            }
            HostCall::ClearColor(color) => {
                let [r, g, b, a] = color.normalize();
                self.send(Command::ClearColor { r, g, b, a });
            }
            HostCall::UpdateScripts(ids) => {
                for id in &ids {
                    self.put_script(id);
                }
                self.send(Command::Render);
            }
            HostCall::DelScripts(ids) => {
                for id in &ids {
                    self.send(Command::DelScript { id: id.to_bytes() });
                }
            }
            // Input arrives unsolicited; nothing to forward.
            HostCall::RequestInput(_) => {}
            // Handled by the run loop.
            HostCall::Stop => {}
        }
    }

    /// Fetch, prepare assets for, and transmit one script.
    fn put_script(&mut self, id: &Ident) {
        let Some(script) = self.host.fetch_script(id) else {
            debug!(?id, "script vanished before send, skipping");
            return;
        };
        self.ensure_media(&script);
        self.send(Command::PutScript {
            id: id.to_bytes(),
            script,
        });
    }

    /// Transmit every asset `script` references that the current connection
    /// has not seen yet. Unloadable assets stay uncached so the next update
    /// retries them.
    fn ensure_media(&mut self, script: &[u8]) {
        let refs = self.host.media_refs(script);
        for font in &refs.fonts {
            let key = font.to_bytes();
            if self.media.contains_font(&key) {
                continue;
            }
            let Some(data) = self.host.load_font(font) else {
                debug!(?font, "font unavailable, skipping");
                continue;
            };
            self.send(Command::PutFont {
                name: key.clone(),
                data,
            });
            self.media.insert_font(key);
        }
        for image in &refs.images {
            let key = image.to_bytes();
            if self.media.contains_image(&key) {
                continue;
            }
            let Some(asset) = self.host.load_image(image) else {
                debug!(?image, "image unavailable, skipping");
                continue;
            };
            self.send(Command::PutImage {
                id: key.clone(),
                format: asset.format,
                width: asset.width,
                height: asset.height,
                data: asset.data,
            });
            self.media.insert_image(key);
        }
        for stream in &refs.streams {
            let key = stream.to_bytes();
            if self.media.contains_stream(&key) {
                continue;
            }
            let Some(asset) = self.host.load_stream_frame(stream) else {
                debug!(?stream, "stream unavailable, skipping");
                continue;
            };
            self.send(Command::PutImage {
                id: key.clone(),
                format: asset.format,
                width: asset.width,
                height: asset.height,
                data: asset.data,
            });
            self.media.insert_stream(key);
        }
    }

    fn send(&self, cmd: Command) {
        let transport = match (&self.transport, self.connected) {
            (Some(transport), true) => transport,
            _ => {
                debug!(code = cmd.code(), "dropping command while disconnected");
                return;
            }
        };
        transport.send(cmd.encode());
    }

    fn handle_notice(&mut self, notice: TransportNotice) {
        match notice {
            TransportNotice::Data { bytes, .. } => {
                self.recv.extend(&bytes);
                loop {
                    match self.recv.next_frame() {
                        Ok(Some(frame)) => self.handle_frame(&frame),
                        Ok(None) => break,
                        Err(err) => {
                            warn!(%err, "renderer sent an oversized frame, resetting connection");
                            self.drop_transport();
                            break;
                        }
                    }
                }
            }
            TransportNotice::Frame { frame, .. } => self.handle_frame(&frame),
            TransportNotice::Closed { peer } => self.peer_down(peer, None),
            TransportNotice::Error { peer, reason } => self.peer_down(peer, Some(reason)),
        }
    }

    fn peer_down(&mut self, peer: PeerId, reason: Option<String>) {
        let serving = matches!(
            self.transport.as_ref().map(TransportHandle::kind),
            Some(TransportKind::Server)
        );
        if serving {
            // The listener stays up; remaining peers carry the session.
            match reason {
                Some(reason) => warn!(%peer, %reason, "renderer dropped"),
                None => info!(%peer, "renderer disconnected"),
            }
            return;
        }
        match reason {
            Some(reason) => warn!(%reason, "connection lost, scheduling reconnect"),
            None => info!("renderer closed the connection, scheduling reconnect"),
        }
        self.drop_transport();
    }

    fn drop_transport(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.disconnect();
        }
        self.connected = false;
        self.media.clear();
        self.recv.clear();
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        let Some((code, _len, payload)) = wire::decode_header(frame) else {
            debug!(len = frame.len(), "short frame dropped");
            return;
        };
        self.handle_event(Event::decode(code, payload));
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Ready => self.resync(),
            Event::Reshape { width, height } => {
                self.host.send_input(HostInput::Viewport { width, height });
                let tx = viewport::fit_transform(self.design_size, (width, height));
                self.send(Command::GlobalTx(tx));
                self.send(Command::Render);
            }
            Event::Stats { bytes_received } => stats::record_renderer_bytes(bytes_received),
            Event::Touch { action, x, y } => match action {
                touch_action::DOWN => self.host.send_input(HostInput::CursorButton {
                    button: PointerButton::Left,
                    pressed: true,
                    mods: Vec::new(),
                    position: (x, y),
                }),
                touch_action::UP => self.host.send_input(HostInput::CursorButton {
                    button: PointerButton::Left,
                    pressed: false,
                    mods: Vec::new(),
                    position: (x, y),
                }),
                touch_action::MOVE => self.host.send_input(HostInput::CursorPos {
                    position: (x, y),
                }),
                other => debug!(action = other, "unknown touch action dropped"),
            },
            Event::Key {
                key,
                scancode,
                action,
                mods,
            } => self.host.send_input(HostInput::Key {
                key,
                scancode,
                action: KeyAction::from_wire(action),
                mods: Mods(mods).tags(),
            }),
            Event::Codepoint { codepoint, mods } => self.host.send_input(HostInput::Codepoint {
                codepoint,
                mods: Mods(mods).tags(),
            }),
            Event::CursorPos { x, y } => self.host.send_input(HostInput::CursorPos {
                position: (x, y),
            }),
            Event::MouseButton {
                button,
                action,
                mods,
                x,
                y,
            } => self.host.send_input(HostInput::CursorButton {
                button: PointerButton::from_wire(button),
                pressed: action != 0,
                mods: Mods(mods).tags(),
                position: (x, y),
            }),
            Event::Scroll {
                x_offset,
                y_offset,
                x,
                y,
            } => self.host.send_input(HostInput::CursorScroll {
                offset: (x_offset, y_offset),
                position: (x, y),
            }),
            Event::CursorEnter { entered } => {
                debug!(entered, "cursor_enter not forwarded");
            }
            Event::LogInfo { message } => {
                info!(target: "renderer", "{}", String::from_utf8_lossy(&message));
            }
            Event::LogWarn { message } => {
                warn!(target: "renderer", "{}", String::from_utf8_lossy(&message));
            }
            Event::LogError { message } => {
                error!(target: "renderer", "{}", String::from_utf8_lossy(&message));
            }
            Event::Unknown { code, payload } => {
                debug!(code, len = payload.len(), "unknown event dropped");
            }
        }
    }

    /// A renderer reported READY: converge it on the current scene. The
    /// media cache resets because the renderer may be brand new.
    fn resync(&mut self) {
        info!("renderer ready, syncing scene");
        self.media.clear();
        let ids = self.host.live_script_ids();
        for id in &ids {
            self.put_script(id);
        }
        self.send(Command::Render);
    }

    fn shutdown(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.send(Command::Quit.encode());
            transport.disconnect();
        }
        self.connected = false;
        info!("driver engine stopped");
    }
}
