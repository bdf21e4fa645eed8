//! Line-break scanning
//!
//! Finds the byte offsets of line terminators in arbitrary byte buffers.
//! A break is recorded at every `\n`, at every lone `\r`, and once per
//! `\r\n` pair (at the `\n`).
//!
//! ## Strategies
//!
//! ```text
//! Baseline   byte loop with one-byte lookahead (reference)
//! Assisted   memchr2 over '\r' / '\n'
//! Lanes16    16-byte chunks, u16 match masks
//! Lanes32    32-byte chunks, u32 match masks
//! Wide128    128-byte chunks, u128 match masks
//! Parallel   contiguous partitions on scoped threads, any inner strategy
//! ```
//!
//! Every strategy returns a byte-identical [`BreakResult`] for the same
//! input. [`verify::cross_check`] asserts this for a given buffer.

mod assisted;
mod baseline;
mod lanes;
mod parallel;
pub mod verify;

use std::time::Instant;

use serde::{Deserialize, Serialize};

pub use assisted::Assisted;
pub use baseline::Baseline;
pub use lanes::{Lanes16, Lanes32, Wide128};
pub use parallel::{Parallel, DEFAULT_MIN_PARTITION};

/// Ordered byte offsets of line terminators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakResult {
    breaks: Vec<usize>,
}

impl BreakResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            breaks: Vec::with_capacity(capacity),
        }
    }

    /// Clear all offsets, keeping the allocation for the next scan
    pub fn reset(&mut self) {
        self.breaks.clear();
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.breaks
    }

    pub fn len(&self) -> usize {
        self.breaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breaks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.breaks.iter()
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.breaks
    }

    /// Number of logical lines (a buffer with no breaks still has one line)
    pub fn line_count(&self) -> usize {
        self.breaks.len() + 1
    }

    /// Byte offset where each line starts
    pub fn line_starts(&self) -> Vec<usize> {
        let mut starts = Vec::with_capacity(self.breaks.len() + 1);
        starts.push(0);
        starts.extend(self.breaks.iter().map(|&b| b + 1));
        starts
    }

    #[inline]
    pub(crate) fn push(&mut self, offset: usize) {
        debug_assert!(self.breaks.last().map_or(true, |&last| last < offset));
        self.breaks.push(offset);
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<usize> {
        self.breaks.pop()
    }

    pub(crate) fn last(&self) -> Option<usize> {
        self.breaks.last().copied()
    }

    pub(crate) fn extend_shifted(&mut self, other: &BreakResult, base: usize) {
        self.breaks.extend(other.breaks.iter().map(|&b| b + base));
    }
}

impl<'a> IntoIterator for &'a BreakResult {
    type Item = &'a usize;
    type IntoIter = std::slice::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.breaks.iter()
    }
}

impl From<Vec<usize>> for BreakResult {
    fn from(breaks: Vec<usize>) -> Self {
        Self { breaks }
    }
}

/// A line-break scanning strategy
pub trait LineBreakScanner: Send + Sync {
    /// Short identifier used in logs and mismatch reports
    fn name(&self) -> &'static str;

    /// Reset `out` and fill it with the breaks found in `bytes`
    fn scan_into(&self, bytes: &[u8], out: &mut BreakResult);

    fn scan(&self, bytes: &[u8]) -> BreakResult {
        let mut out = BreakResult::new();
        self.scan_into(bytes, &mut out);
        out
    }
}

/// Collects CR / LF events in increasing offset order and applies the
/// CRLF merge rule.
///
/// At most one CR is held back. It is flushed as a lone break when any
/// later event arrives that is not the LF directly after it, so chunk and
/// partition boundaries never split a CRLF pair as long as events keep
/// flowing through the same sink.
pub(crate) struct BreakSink<'a> {
    out: &'a mut BreakResult,
    pending_cr: Option<usize>,
}

impl<'a> BreakSink<'a> {
    pub(crate) fn new(out: &'a mut BreakResult) -> Self {
        out.reset();
        Self {
            out,
            pending_cr: None,
        }
    }

    #[inline]
    pub(crate) fn carriage_return(&mut self, offset: usize) {
        if let Some(cr) = self.pending_cr.replace(offset) {
            self.out.push(cr);
        }
    }

    #[inline]
    pub(crate) fn line_feed(&mut self, offset: usize) {
        if let Some(cr) = self.pending_cr.take() {
            if cr + 1 != offset {
                self.out.push(cr);
            }
        }
        self.out.push(offset);
    }

    /// Scalar path for tails shorter than a full chunk
    #[inline]
    pub(crate) fn feed_bytes(&mut self, bytes: &[u8], base: usize) {
        for (i, &byte) in bytes.iter().enumerate() {
            match byte {
                b'\n' => self.line_feed(base + i),
                b'\r' => self.carriage_return(base + i),
                _ => {}
            }
        }
    }

    pub(crate) fn finish(self) {
        if let Some(cr) = self.pending_cr {
            self.out.push(cr);
        }
    }
}

/// Named scanning strategies, selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    Baseline,
    Assisted,
    Lanes16,
    Lanes32,
    #[default]
    Wide128,
}

impl Algorithm {
    /// Every single-threaded strategy
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Baseline,
        Algorithm::Assisted,
        Algorithm::Lanes16,
        Algorithm::Lanes32,
        Algorithm::Wide128,
    ];

    pub fn scanner(self) -> Box<dyn LineBreakScanner> {
        match self {
            Algorithm::Baseline => Box::new(Baseline),
            Algorithm::Assisted => Box::new(Assisted),
            Algorithm::Lanes16 => Box::new(Lanes16),
            Algorithm::Lanes32 => Box::new(Lanes32),
            Algorithm::Wide128 => Box::new(Wide128),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Baseline => "baseline",
            Algorithm::Assisted => "assisted",
            Algorithm::Lanes16 => "lanes16",
            Algorithm::Lanes32 => "lanes32",
            Algorithm::Wide128 => "wide128",
        }
    }

    /// Parse a kebab-case algorithm name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }
}

/// Build the scanner described by a scanner config
pub fn scanner_for(config: &crate::config::ScannerConfig) -> Box<dyn LineBreakScanner> {
    if config.threads > 1 {
        Box::new(
            Parallel::new(config.algorithm, config.threads)
                .with_min_partition(config.min_partition),
        )
    } else {
        config.algorithm.scanner()
    }
}

/// Scan with the default strategy
pub fn scan(bytes: &[u8]) -> BreakResult {
    Wide128.scan(bytes)
}

/// Time every single-threaded strategy on `sample` and return the fastest.
///
/// Each strategy runs `rounds` times; the minimum duration is compared so a
/// single scheduler hiccup does not decide the outcome.
pub fn calibrate(sample: &[u8], rounds: usize) -> Algorithm {
    let rounds = rounds.max(1);
    let mut out = BreakResult::with_capacity(sample.len() / 32);
    let mut best = (Algorithm::default(), u128::MAX);

    for algorithm in Algorithm::ALL {
        let scanner = algorithm.scanner();
        let mut fastest = u128::MAX;
        for _ in 0..rounds {
            let start = Instant::now();
            scanner.scan_into(sample, &mut out);
            fastest = fastest.min(start.elapsed().as_nanos());
        }
        tracing::trace!("calibrate: {} took {}ns", algorithm.name(), fastest);
        if fastest < best.1 {
            best = (algorithm, fastest);
        }
    }

    tracing::debug!(
        "calibrate: picked {} for {} byte sample",
        best.0.name(),
        sample.len()
    );
    best.0
}
