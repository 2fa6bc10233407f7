// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Observability counters.

use std::sync::atomic::{AtomicU64, Ordering};

static RENDERER_BYTES: AtomicU64 = AtomicU64::new(0);

/// Fold a renderer's reported receive total into the process-wide gauge.
/// `fetch_max` keeps it monotonic even with several renderers reporting.
pub(crate) fn record_renderer_bytes(n: u64) {
    RENDERER_BYTES.fetch_max(n, Ordering::Relaxed);
}

/// Largest byte count any renderer has reported receiving.
pub fn renderer_bytes() -> u64 {
    RENDERER_BYTES.load(Ordering::Relaxed)
}
