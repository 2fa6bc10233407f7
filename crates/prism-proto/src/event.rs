// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Renderer-sent events and their decoder table.
//!
//! Decoding is total: unknown codes and payloads whose size does not match
//! the variant's fixed layout come back as [`Event::Unknown`], never an
//! error. A renderer running ahead of this protocol revision degrades to
//! debug noise instead of killing the connection.

/// Wire codes for renderer → driver events.
pub mod code {
    pub const STATS: u8 = 0x01;
    pub const RESHAPE: u8 = 0x05;
    pub const READY: u8 = 0x06;
    pub const TOUCH: u8 = 0x08;
    pub const KEY: u8 = 0x0A;
    pub const CODEPOINT: u8 = 0x0B;
    pub const CURSOR_POS: u8 = 0x0C;
    pub const MOUSE_BUTTON: u8 = 0x0D;
    pub const SCROLL: u8 = 0x0E;
    pub const CURSOR_ENTER: u8 = 0x0F;
    pub const LOG_INFO: u8 = 0xA0;
    pub const LOG_WARN: u8 = 0xA1;
    pub const LOG_ERROR: u8 = 0xA2;
}

/// Touch action values carried by [`Event::Touch`].
pub mod touch_action {
    pub const DOWN: u8 = 0;
    pub const UP: u8 = 1;
    pub const MOVE: u8 = 2;
}

/// An event decoded from a renderer frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Total bytes the renderer has received on this connection.
    Stats { bytes_received: u64 },
    /// The renderer's drawable size changed (or was first reported).
    Reshape { width: u32, height: u32 },
    /// The renderer is up and wants the full scene.
    Ready,
    /// Touch contact; `action` is one of [`touch_action`].
    Touch { action: u8, x: f32, y: f32 },
    /// Physical key; `action` 0=release, 1=press, 2=repeat.
    Key {
        key: u32,
        scancode: u32,
        action: i32,
        mods: u32,
    },
    /// Translated character input.
    Codepoint { codepoint: u32, mods: u32 },
    CursorPos {
        x: f32,
        y: f32,
    },
    MouseButton {
        button: u32,
        action: u32,
        mods: u32,
        x: f32,
        y: f32,
    },
    Scroll {
        x_offset: f32,
        y_offset: f32,
        x: f32,
        y: f32,
    },
    CursorEnter {
        entered: bool,
    },
    /// Renderer-side log lines, relayed verbatim.
    LogInfo { message: Vec<u8> },
    LogWarn { message: Vec<u8> },
    LogError { message: Vec<u8> },
    /// Anything this revision does not understand.
    Unknown { code: u8, payload: Vec<u8> },
}

impl Event {
    /// Decode an event from its wire code and payload.
    pub fn decode(code_byte: u8, payload: &[u8]) -> Event {
        let p = payload;
        match (code_byte, p.len()) {
            (code::STATS, 8) => Event::Stats {
                bytes_received: u64::from_be_bytes([
                    p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7],
                ]),
            },
            (code::RESHAPE, 8) => Event::Reshape {
                width: be_u32(&p[0..]),
                height: be_u32(&p[4..]),
            },
            (code::READY, 0) => Event::Ready,
            (code::TOUCH, 9) => Event::Touch {
                action: p[0],
                x: be_f32(&p[1..]),
                y: be_f32(&p[5..]),
            },
            (code::KEY, 16) => Event::Key {
                key: be_u32(&p[0..]),
                scancode: be_u32(&p[4..]),
                action: be_u32(&p[8..]) as i32,
                mods: be_u32(&p[12..]),
            },
            (code::CODEPOINT, 8) => Event::Codepoint {
                codepoint: be_u32(&p[0..]),
                mods: be_u32(&p[4..]),
            },
            (code::CURSOR_POS, 8) => Event::CursorPos {
                x: be_f32(&p[0..]),
                y: be_f32(&p[4..]),
            },
            (code::MOUSE_BUTTON, 20) => Event::MouseButton {
                button: be_u32(&p[0..]),
                action: be_u32(&p[4..]),
                mods: be_u32(&p[8..]),
                x: be_f32(&p[12..]),
                y: be_f32(&p[16..]),
            },
            (code::SCROLL, 16) => Event::Scroll {
                x_offset: be_f32(&p[0..]),
                y_offset: be_f32(&p[4..]),
                x: be_f32(&p[8..]),
                y: be_f32(&p[12..]),
            },
            (code::CURSOR_ENTER, 1) => Event::CursorEnter { entered: p[0] != 0 },
            (code::LOG_INFO, _) => Event::LogInfo {
                message: p.to_vec(),
            },
            (code::LOG_WARN, _) => Event::LogWarn {
                message: p.to_vec(),
            },
            (code::LOG_ERROR, _) => Event::LogError {
                message: p.to_vec(),
            },
            _ => Event::Unknown {
                code: code_byte,
                payload: p.to_vec(),
            },
        }
    }
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn be_f32(b: &[u8]) -> f32 {
    f32::from_be_bytes([b[0], b[1], b[2], b[3]])
}
