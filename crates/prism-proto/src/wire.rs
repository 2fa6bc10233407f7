// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frame envelope: `type:u8 || length:u32 BE || payload`.

use bytes::{BufMut, Bytes, BytesMut};

/// Frame header size: 1 byte type + 4 bytes big-endian payload length.
pub const HEADER_LEN: usize = 5;

/// Wrap a payload in the 5-byte frame header.
///
/// `length` in the header always equals `payload.len()`.
pub fn encode_frame(code: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(code);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Parse a frame header.
///
/// Returns `None` while fewer than [`HEADER_LEN`] bytes are available;
/// otherwise `(code, payload_len, rest)` where `rest` starts at the payload
/// and may still be shorter than `payload_len`.
pub fn decode_header(buf: &[u8]) -> Option<(u8, u32, &[u8])> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let code = buf[0];
    let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    Some((code, len, &buf[HEADER_LEN..]))
}
