//! Shared test helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use textflow::client::{HighlightClient, HighlightEvent};
use textflow::config::HighlightConfig;

/// Bytes drawn mostly from CR / LF plus a few multi-byte sequences
pub fn random_text(rng: &mut StdRng, len: usize) -> Vec<u8> {
    const PIECES: &[&[u8]] = &[
        b"\r",
        b"\n",
        b"\r\n",
        b"a",
        b"xyz",
        "é".as_bytes(),
        "日本".as_bytes(),
        "🙂".as_bytes(),
        b"\t",
    ];
    let mut out = Vec::with_capacity(len + 4);
    while out.len() < len {
        let piece = PIECES[rng.random_range(0..PIECES.len())];
        out.extend_from_slice(piece);
    }
    out
}

/// Seeded generator so failures reproduce
pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A client on a real worker thread, already past readiness
pub fn ready_client() -> HighlightClient {
    let mut client = HighlightClient::spawn(&HighlightConfig::default()).expect("spawn worker");
    client.wait_ready().expect("worker ready");
    client
}

/// Collect events until `done` matches one, failing after a generous timeout
pub fn events_until(
    client: &mut HighlightClient,
    mut done: impl FnMut(&HighlightEvent) -> bool,
) -> Vec<HighlightEvent> {
    let mut events = Vec::new();
    loop {
        let event = client
            .next_event(Duration::from_secs(10))
            .expect("worker alive")
            .expect("event before timeout");
        let finished = done(&event);
        events.push(event);
        if finished {
            return events;
        }
    }
}
