//! Fixed-width lane scanners
//!
//! Each chunk is compared lane-by-lane against `\r` and `\n`, producing one
//! bit per lane. The compare loops are branch-free over a fixed-size chunk so
//! the compiler lowers them to vector compares + movemask. Set bits are then
//! walked lowest-first and fed through the shared [`BreakSink`], which
//! carries a trailing `\r` into the next chunk.

use super::{BreakResult, BreakSink, LineBreakScanner};

/// One bit per byte lane of a chunk
pub(crate) trait LaneMask: Copy {
    const LANES: usize;

    fn matches(chunk: &[u8], needle: u8) -> Self;
    fn union(self, other: Self) -> Self;
    fn is_empty(self) -> bool;
    fn lowest(self) -> usize;
    fn without_lowest(self) -> Self;
    fn has(self, lane: usize) -> bool;
}

macro_rules! lane_mask {
    ($($ty:ty),*) => {$(
        impl LaneMask for $ty {
            const LANES: usize = <$ty>::BITS as usize;

            #[inline(always)]
            fn matches(chunk: &[u8], needle: u8) -> Self {
                debug_assert_eq!(chunk.len(), Self::LANES);
                let mut mask: $ty = 0;
                for (lane, &byte) in chunk.iter().enumerate() {
                    mask |= <$ty>::from(byte == needle) << lane;
                }
                mask
            }

            #[inline(always)]
            fn union(self, other: Self) -> Self {
                self | other
            }

            #[inline(always)]
            fn is_empty(self) -> bool {
                self == 0
            }

            #[inline(always)]
            fn lowest(self) -> usize {
                self.trailing_zeros() as usize
            }

            #[inline(always)]
            fn without_lowest(self) -> Self {
                self & (self - 1)
            }

            #[inline(always)]
            fn has(self, lane: usize) -> bool {
                (self >> lane) & 1 == 1
            }
        }
    )*};
}

lane_mask!(u16, u32, u128);

fn scan_masked<M: LaneMask>(bytes: &[u8], out: &mut BreakResult) {
    let mut sink = BreakSink::new(out);
    let mut chunks = bytes.chunks_exact(M::LANES);
    let mut base = 0;

    for chunk in &mut chunks {
        let cr = M::matches(chunk, b'\r');
        let lf = M::matches(chunk, b'\n');
        let mut hits = cr.union(lf);
        while !hits.is_empty() {
            let lane = hits.lowest();
            if lf.has(lane) {
                sink.line_feed(base + lane);
            } else {
                sink.carriage_return(base + lane);
            }
            hits = hits.without_lowest();
        }
        base += M::LANES;
    }

    sink.feed_bytes(chunks.remainder(), base);
    sink.finish();
}

/// 16-byte chunks
#[derive(Debug, Clone, Copy, Default)]
pub struct Lanes16;

/// 32-byte chunks
#[derive(Debug, Clone, Copy, Default)]
pub struct Lanes32;

/// 128-byte chunks with a 128-bit match mask
#[derive(Debug, Clone, Copy, Default)]
pub struct Wide128;

impl LineBreakScanner for Lanes16 {
    fn name(&self) -> &'static str {
        "lanes16"
    }

    fn scan_into(&self, bytes: &[u8], out: &mut BreakResult) {
        scan_masked::<u16>(bytes, out);
    }
}

impl LineBreakScanner for Lanes32 {
    fn name(&self) -> &'static str {
        "lanes32"
    }

    fn scan_into(&self, bytes: &[u8], out: &mut BreakResult) {
        scan_masked::<u32>(bytes, out);
    }
}

impl LineBreakScanner for Wide128 {
    fn name(&self) -> &'static str {
        "wide128"
    }

    fn scan_into(&self, bytes: &[u8], out: &mut BreakResult) {
        scan_masked::<u128>(bytes, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `\r` as the last lane of chunk 0, `\n` as the first lane of chunk 1
    fn crlf_across(width: usize) -> Vec<u8> {
        let mut bytes = vec![b'x'; width * 2];
        bytes[width - 1] = b'\r';
        bytes[width] = b'\n';
        bytes
    }

    #[test]
    fn test_lanes16_crlf_across_chunk_boundary() {
        assert_eq!(Lanes16.scan(&crlf_across(16)).as_slice(), &[16]);
    }

    #[test]
    fn test_lanes32_crlf_across_chunk_boundary() {
        assert_eq!(Lanes32.scan(&crlf_across(32)).as_slice(), &[32]);
    }

    #[test]
    fn test_wide128_crlf_across_chunk_boundary() {
        assert_eq!(Wide128.scan(&crlf_across(128)).as_slice(), &[128]);
    }

    #[test]
    fn test_cr_at_chunk_end_then_plain_byte() {
        let mut bytes = vec![b'x'; 40];
        bytes[31] = b'\r';
        assert_eq!(Lanes32.scan(&bytes).as_slice(), &[31]);
    }

    #[test]
    fn test_crlf_split_between_chunk_and_tail() {
        // 16 full bytes then a 1-byte remainder
        let mut bytes = vec![b'y'; 17];
        bytes[15] = b'\r';
        bytes[16] = b'\n';
        assert_eq!(Lanes16.scan(&bytes).as_slice(), &[16]);
    }

    #[test]
    fn test_multibyte_text_has_no_breaks_at_any_alignment() {
        let text = "日本語テキスト🙂é".repeat(20);
        for shift in 0..4 {
            let mut bytes = vec![b'a'; shift];
            bytes.extend_from_slice(text.as_bytes());
            assert!(Lanes16.scan(&bytes).is_empty());
            assert!(Lanes32.scan(&bytes).is_empty());
            assert!(Wide128.scan(&bytes).is_empty());
        }
    }

    #[test]
    fn test_mask_helpers() {
        let chunk: Vec<u8> = (0..16u8).map(|i| if i % 5 == 0 { b'\n' } else { b'a' }).collect();
        let mask = u16::matches(&chunk, b'\n');
        assert_eq!(mask, 0b1000_0100_0010_0001);
        assert_eq!(mask.lowest(), 0);
        assert_eq!(mask.without_lowest().lowest(), 5);
        assert!(mask.has(10));
        assert!(!mask.has(11));
    }
}
