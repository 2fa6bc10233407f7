// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Renderer-bound commands and their frame encoders.
//!
//! Every variable-length field except the last carries a `u32` byte-length
//! prefix; the final field consumes the payload remainder. Numerics are
//! big-endian, floats IEEE-754 single precision.

use bytes::{BufMut, Bytes, BytesMut};

use crate::wire::encode_frame;

/// Wire codes for driver → renderer commands.
pub mod code {
    pub const PUT_SCRIPT: u8 = 0x01;
    pub const DEL_SCRIPT: u8 = 0x02;
    pub const RESET: u8 = 0x03;
    pub const GLOBAL_TX: u8 = 0x04;
    pub const CURSOR_TX: u8 = 0x05;
    pub const RENDER: u8 = 0x06;
    pub const CLEAR_COLOR: u8 = 0x08;
    pub const REQUEST_INPUT: u8 = 0x0A;
    pub const QUIT: u8 = 0x20;
    pub const PUT_FONT: u8 = 0x40;
    pub const PUT_IMAGE: u8 = 0x41;
}

/// Pixel layout of a transmitted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ImageFormat {
    /// Compressed blob (png/jpeg/...); the renderer's decoder picks it apart.
    Encoded = 0,
    Gray = 1,
    GrayA = 2,
    Rgb = 3,
    Rgba = 4,
}

impl ImageFormat {
    pub fn as_wire(self) -> u32 {
        self as u32
    }

    /// Map a wire code back to a format; unrecognized codes fall back to
    /// [`ImageFormat::Encoded`].
    pub fn from_wire(value: u32) -> Self {
        match value {
            1 => ImageFormat::Gray,
            2 => ImageFormat::GrayA,
            3 => ImageFormat::Rgb,
            4 => ImageFormat::Rgba,
            _ => ImageFormat::Encoded,
        }
    }

    /// Map a symbolic name to a format; unrecognized names fall back to
    /// [`ImageFormat::Encoded`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "gray" | "g" => ImageFormat::Gray,
            "gray_alpha" | "ga" => ImageFormat::GrayA,
            "rgb" => ImageFormat::Rgb,
            "rgba" => ImageFormat::Rgba,
            _ => ImageFormat::Encoded,
        }
    }
}

/// A renderer-bound command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Install or replace a serialized scene script under `id`.
    PutScript { id: Vec<u8>, script: Vec<u8> },
    /// Remove the script stored under `id`.
    DelScript { id: Vec<u8> },
    /// Drop all scripts and cached assets on the renderer.
    Reset,
    /// Set the root 2×3 affine `(a b c d e f)` mapping design space to
    /// device pixels.
    GlobalTx([f32; 6]),
    /// Set the cursor-layer 2×3 affine.
    CursorTx([f32; 6]),
    /// Present the current scene.
    Render,
    /// Background color, channels normalized 0..1.
    ClearColor { r: f32, g: f32, b: f32, a: f32 },
    /// Declare interest in input classes (renderers send input unsolicited;
    /// the flags are advisory).
    RequestInput { flags: u32 },
    /// Ask the renderer to shut down.
    Quit,
    /// Transmit a font blob under a name scripts reference.
    PutFont { name: Vec<u8>, data: Vec<u8> },
    /// Transmit an image under an id scripts reference.
    PutImage {
        id: Vec<u8>,
        format: ImageFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
}

impl Command {
    /// The wire code this command is framed with.
    pub fn code(&self) -> u8 {
        match self {
            Command::PutScript { .. } => code::PUT_SCRIPT,
            Command::DelScript { .. } => code::DEL_SCRIPT,
            Command::Reset => code::RESET,
            Command::GlobalTx(_) => code::GLOBAL_TX,
            Command::CursorTx(_) => code::CURSOR_TX,
            Command::Render => code::RENDER,
            Command::ClearColor { .. } => code::CLEAR_COLOR,
            Command::RequestInput { .. } => code::REQUEST_INPUT,
            Command::Quit => code::QUIT,
            Command::PutFont { .. } => code::PUT_FONT,
            Command::PutImage { .. } => code::PUT_IMAGE,
        }
    }

    /// Encode into a complete frame (header included).
    pub fn encode(&self) -> Bytes {
        match self {
            Command::PutScript { id, script } => {
                let mut p = BytesMut::with_capacity(4 + id.len() + script.len());
                p.put_u32(id.len() as u32);
                p.put_slice(id);
                p.put_slice(script);
                encode_frame(code::PUT_SCRIPT, &p)
            }
            Command::DelScript { id } => encode_frame(code::DEL_SCRIPT, id),
            Command::Reset => encode_frame(code::RESET, &[]),
            Command::GlobalTx(tx) => encode_frame(code::GLOBAL_TX, &affine_payload(tx)),
            Command::CursorTx(tx) => encode_frame(code::CURSOR_TX, &affine_payload(tx)),
            Command::Render => encode_frame(code::RENDER, &[]),
            Command::ClearColor { r, g, b, a } => {
                let mut p = BytesMut::with_capacity(16);
                p.put_f32(*r);
                p.put_f32(*g);
                p.put_f32(*b);
                p.put_f32(*a);
                encode_frame(code::CLEAR_COLOR, &p)
            }
            Command::RequestInput { flags } => {
                encode_frame(code::REQUEST_INPUT, &flags.to_be_bytes())
            }
            Command::Quit => encode_frame(code::QUIT, &[]),
            Command::PutFont { name, data } => {
                let mut p = BytesMut::with_capacity(4 + name.len() + data.len());
                p.put_u32(name.len() as u32);
                p.put_slice(name);
                p.put_slice(data);
                encode_frame(code::PUT_FONT, &p)
            }
            Command::PutImage {
                id,
                format,
                width,
                height,
                data,
            } => {
                let mut p = BytesMut::with_capacity(20 + id.len() + data.len());
                p.put_u32(id.len() as u32);
                p.put_u32(data.len() as u32);
                p.put_u32(*width);
                p.put_u32(*height);
                p.put_u32(format.as_wire());
                p.put_slice(id);
                p.put_slice(data);
                encode_frame(code::PUT_IMAGE, &p)
            }
        }
    }
}

fn affine_payload(tx: &[f32; 6]) -> BytesMut {
    let mut p = BytesMut::with_capacity(24);
    for v in tx {
        p.put_f32(*v);
    }
    p
}
