// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The engine's seam to the host framework.
//!
//! The host scene graph is opaque to prism: scripts are byte blobs, assets
//! are byte blobs with format tags, and input goes back through a single
//! sink method. [`Host`] is the whole contract.

use std::sync::Arc;

use prism_proto::{Ident, ImageFormat};

/// Asset references a script declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaRefs {
    pub fonts: Vec<Ident>,
    pub images: Vec<Ident>,
    pub streams: Vec<Ident>,
}

/// An image or stream frame as loaded from the host's asset store.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// A color in any of the host's channel conventions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostColor {
    Rgb8(u8, u8, u8),
    Rgba8(u8, u8, u8, u8),
    RgbF(f32, f32, f32),
    RgbaF(f32, f32, f32, f32),
}

impl HostColor {
    /// Normalize to `[r, g, b, a]` in 0..1: integer channels divide by 255,
    /// float channels pass through, missing alpha becomes 1.0.
    pub fn normalize(self) -> [f32; 4] {
        match self {
            HostColor::Rgb8(r, g, b) => [unit(r), unit(g), unit(b), 1.0],
            HostColor::Rgba8(r, g, b, a) => [unit(r), unit(g), unit(b), unit(a)],
            HostColor::RgbF(r, g, b) => [r, g, b, 1.0],
            HostColor::RgbaF(r, g, b, a) => [r, g, b, a],
        }
    }
}

fn unit(channel: u8) -> f32 {
    f32::from(channel) / 255.0
}

/// Modifier-key bitmask as renderers report it; [`Mods::tags`] decodes it
/// into the tag set host inputs carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mods(pub u32);

/// One modifier tag out of a [`Mods`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Shift,
    Ctrl,
    Alt,
    Meta,
    CapsLock,
    NumLock,
}

impl Mods {
    pub const SHIFT: u32 = 0x01;
    pub const CTRL: u32 = 0x02;
    pub const ALT: u32 = 0x04;
    pub const META: u32 = 0x08;
    pub const CAPS_LOCK: u32 = 0x10;
    pub const NUM_LOCK: u32 = 0x20;

    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// The set as individual tags, in bit order.
    pub fn tags(self) -> Vec<Modifier> {
        const TABLE: [(u32, Modifier); 6] = [
            (Mods::SHIFT, Modifier::Shift),
            (Mods::CTRL, Modifier::Ctrl),
            (Mods::ALT, Modifier::Alt),
            (Mods::META, Modifier::Meta),
            (Mods::CAPS_LOCK, Modifier::CapsLock),
            (Mods::NUM_LOCK, Modifier::NumLock),
        ];
        TABLE
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, tag)| *tag)
            .collect()
    }
}

/// Key transition reported by a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Release,
    Press,
    Repeat,
}

impl KeyAction {
    /// Wire integer to tag; anything unexpected reads as a press.
    pub fn from_wire(action: i32) -> Self {
        match action {
            0 => KeyAction::Release,
            2 => KeyAction::Repeat,
            _ => KeyAction::Press,
        }
    }
}

/// Pointer button, renderer codes passed through when unmapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
    Other(u32),
}

impl PointerButton {
    pub fn from_wire(button: u32) -> Self {
        match button {
            0 => PointerButton::Left,
            1 => PointerButton::Right,
            2 => PointerButton::Middle,
            other => PointerButton::Other(other),
        }
    }
}

/// Input events the engine feeds back into the host framework. Modifier
/// bitmasks arrive decoded into [`Modifier`] tag sets.
#[derive(Debug, Clone, PartialEq)]
pub enum HostInput {
    /// The renderer's drawable size (from a reshape).
    Viewport { width: u32, height: u32 },
    CursorButton {
        button: PointerButton,
        pressed: bool,
        mods: Vec<Modifier>,
        position: (f32, f32),
    },
    CursorPos {
        position: (f32, f32),
    },
    Key {
        key: u32,
        scancode: u32,
        action: KeyAction,
        mods: Vec<Modifier>,
    },
    Codepoint {
        codepoint: u32,
        mods: Vec<Modifier>,
    },
    CursorScroll {
        offset: (f32, f32),
        position: (f32, f32),
    },
}

/// What the engine needs from the host framework.
///
/// Implementations are queried from the engine task only; interior
/// mutability is the implementor's business.
pub trait Host: Send + 'static {
    /// Serialized script body for `id`, or `None` if it is gone.
    fn fetch_script(&self, id: &Ident) -> Option<Vec<u8>>;

    /// Every script id currently live in the host viewport (for re-sync).
    fn live_script_ids(&self) -> Vec<Ident>;

    /// Asset references declared by a script body.
    fn media_refs(&self, script: &[u8]) -> MediaRefs;

    fn load_font(&self, id: &Ident) -> Option<Vec<u8>>;

    fn load_image(&self, id: &Ident) -> Option<ImageAsset>;

    /// Latest frame of a streamed texture.
    fn load_stream_frame(&self, id: &Ident) -> Option<ImageAsset>;

    /// Deliver a translated input event.
    fn send_input(&self, input: HostInput);
}

impl<T: Host + Sync> Host for Arc<T> {
    fn fetch_script(&self, id: &Ident) -> Option<Vec<u8>> {
        self.as_ref().fetch_script(id)
    }

    fn live_script_ids(&self) -> Vec<Ident> {
        self.as_ref().live_script_ids()
    }

    fn media_refs(&self, script: &[u8]) -> MediaRefs {
        self.as_ref().media_refs(script)
    }

    fn load_font(&self, id: &Ident) -> Option<Vec<u8>> {
        self.as_ref().load_font(id)
    }

    fn load_image(&self, id: &Ident) -> Option<ImageAsset> {
        self.as_ref().load_image(id)
    }

    fn load_stream_frame(&self, id: &Ident) -> Option<ImageAsset> {
        self.as_ref().load_stream_frame(id)
    }

    fn send_input(&self, input: HostInput) {
        self.as_ref().send_input(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_channels_normalize_and_alpha_defaults() {
        let [r, g, b, a] = HostColor::Rgb8(255, 0, 51).normalize();
        assert!((r - 1.0).abs() < 1e-6);
        assert!(g.abs() < 1e-6);
        assert!((b - 0.2).abs() < 1e-3);
        assert!((a - 1.0).abs() < 1e-6);
    }

    #[test]
    fn float_channels_pass_through() {
        assert_eq!(
            HostColor::RgbaF(0.5, 0.25, 0.75, 0.9).normalize(),
            [0.5, 0.25, 0.75, 0.9]
        );
        assert_eq!(HostColor::RgbF(0.1, 0.2, 0.3).normalize()[3], 1.0);
    }

    #[test]
    fn mods_decode_to_tags_in_bit_order() {
        let mods = Mods(Mods::SHIFT | Mods::ALT | Mods::NUM_LOCK);
        assert_eq!(
            mods.tags(),
            vec![Modifier::Shift, Modifier::Alt, Modifier::NumLock]
        );
        assert!(mods.contains(Mods::SHIFT));
        assert!(!mods.contains(Mods::CTRL));
    }

    #[test]
    fn key_action_defaults_to_press() {
        assert_eq!(KeyAction::from_wire(0), KeyAction::Release);
        assert_eq!(KeyAction::from_wire(1), KeyAction::Press);
        assert_eq!(KeyAction::from_wire(2), KeyAction::Repeat);
        assert_eq!(KeyAction::from_wire(77), KeyAction::Press);
    }

    #[test]
    fn pointer_buttons_pass_unknown_codes_through() {
        assert_eq!(PointerButton::from_wire(0), PointerButton::Left);
        assert_eq!(PointerButton::from_wire(2), PointerButton::Middle);
        assert_eq!(PointerButton::from_wire(9), PointerButton::Other(9));
    }
}
