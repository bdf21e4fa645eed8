//! Multithreaded scanning over contiguous partitions

use std::thread;

use super::{Algorithm, BreakResult, LineBreakScanner};

/// Default smallest partition handed to a thread
pub const DEFAULT_MIN_PARTITION: usize = 64 * 1024;

/// Splits the buffer into one contiguous partition per thread, scans each
/// with a single-threaded strategy and stitches the results in order.
///
/// A partition that ends in `\r` reports it as a lone break. When the next
/// partition starts with `\n`, the merge drops that tentative entry so the
/// pair counts once, at the `\n`.
#[derive(Debug, Clone, Copy)]
pub struct Parallel {
    inner: Algorithm,
    threads: usize,
    min_partition: usize,
}

impl Parallel {
    pub fn new(inner: Algorithm, threads: usize) -> Self {
        let available = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            inner,
            threads: threads.clamp(1, available.max(2) * 2),
            min_partition: DEFAULT_MIN_PARTITION,
        }
    }

    /// Lower the partition floor (tests use tiny partitions to force seams)
    pub fn with_min_partition(mut self, min_partition: usize) -> Self {
        self.min_partition = min_partition.max(1);
        self
    }

    pub fn inner(&self) -> Algorithm {
        self.inner
    }

    /// Partition start offsets (the first is always 0)
    fn partition_starts(&self, len: usize) -> Vec<usize> {
        let count = self.threads.min(len / self.min_partition).max(1);
        let size = len.div_ceil(count);
        (0..count).map(|i| i * size).filter(|&s| s < len.max(1)).collect()
    }
}

impl LineBreakScanner for Parallel {
    fn name(&self) -> &'static str {
        match self.inner {
            Algorithm::Baseline => "parallel-baseline",
            Algorithm::Assisted => "parallel-assisted",
            Algorithm::Lanes16 => "parallel-lanes16",
            Algorithm::Lanes32 => "parallel-lanes32",
            Algorithm::Wide128 => "parallel-wide128",
        }
    }

    fn scan_into(&self, bytes: &[u8], out: &mut BreakResult) {
        out.reset();
        let starts = self.partition_starts(bytes.len());
        if starts.len() <= 1 {
            self.inner.scanner().scan_into(bytes, out);
            return;
        }

        let partials: Vec<BreakResult> = thread::scope(|scope| {
            let handles: Vec<_> = starts
                .iter()
                .enumerate()
                .map(|(i, &start)| {
                    let end = starts.get(i + 1).copied().unwrap_or(bytes.len());
                    let slice = &bytes[start..end];
                    let inner = self.inner;
                    scope.spawn(move || inner.scanner().scan(slice))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(partial) => partial,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        });

        for (partial, &start) in partials.iter().zip(&starts) {
            if start > 0
                && bytes[start] == b'\n'
                && bytes[start - 1] == b'\r'
                && out.last() == Some(start - 1)
            {
                out.pop();
            }
            out.extend_shifted(partial, start);
        }

        tracing::trace!(
            "parallel scan: {} partitions, {} breaks",
            starts.len(),
            out.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::Baseline;

    #[test]
    fn test_partition_starts_cover_buffer() {
        let scanner = Parallel::new(Algorithm::Baseline, 4).with_min_partition(1);
        assert_eq!(scanner.partition_starts(10), vec![0, 3, 6, 9]);
        assert_eq!(scanner.partition_starts(0), vec![0]);
        assert_eq!(scanner.partition_starts(2), vec![0, 1]);
    }

    #[test]
    fn test_small_input_stays_single_threaded() {
        let scanner = Parallel::new(Algorithm::Lanes16, 8);
        assert_eq!(scanner.partition_starts(100), vec![0]);
        assert_eq!(scanner.scan(b"a\r\nb").as_slice(), &[2]);
    }

    #[test]
    fn test_crlf_across_partition_seam() {
        // len 8, 2 threads -> partitions [0, 4) and [4, 8)
        let bytes = b"abc\r\nfgh";
        let scanner = Parallel::new(Algorithm::Assisted, 2).with_min_partition(1);
        assert_eq!(scanner.partition_starts(bytes.len()), vec![0, 4]);
        assert_eq!(scanner.scan(bytes).as_slice(), &[4]);
    }

    #[test]
    fn test_cr_at_seam_without_lf() {
        let bytes = b"abc\rxfgh";
        let scanner = Parallel::new(Algorithm::Wide128, 2).with_min_partition(1);
        assert_eq!(scanner.scan(bytes).as_slice(), &[3]);
    }

    #[test]
    fn test_every_seam_position_matches_baseline() {
        let bytes = b"\r\n\r\r\n\n\ra\r\n\n\r";
        let expected = Baseline.scan(bytes);
        for threads in 2..=bytes.len() {
            for inner in Algorithm::ALL {
                let scanner = Parallel::new(inner, threads).with_min_partition(1);
                assert_eq!(
                    scanner.scan(bytes),
                    expected,
                    "{} with {} threads",
                    scanner.name(),
                    threads
                );
            }
        }
    }
}
