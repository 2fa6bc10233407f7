// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The prism driver engine.
//!
//! Sits between a scene-graph host framework and remote renderers: host
//! scene updates become framed commands fanned out over a
//! [`prism_net`] transport, renderer events come back and turn into host
//! input. The engine owns the connection state machine — reconnect on loss,
//! full scene re-sync when a renderer reports READY, letterbox viewport
//! fitting on reshape.

pub mod config;
pub mod engine;
pub mod host;
pub mod media;
pub mod stats;
pub mod viewport;

pub use config::{ConfigError, DriverConfig};
pub use engine::Driver;
pub use host::{
    Host, HostColor, HostInput, ImageAsset, KeyAction, MediaRefs, Modifier, Mods, PointerButton,
};
