//! memchr-backed scanner

use memchr::memchr2_iter;

use super::{BreakResult, BreakSink, LineBreakScanner};

/// Jumps between terminator candidates with `memchr2`
#[derive(Debug, Clone, Copy, Default)]
pub struct Assisted;

impl LineBreakScanner for Assisted {
    fn name(&self) -> &'static str {
        "assisted"
    }

    fn scan_into(&self, bytes: &[u8], out: &mut BreakResult) {
        let mut sink = BreakSink::new(out);
        for pos in memchr2_iter(b'\r', b'\n', bytes) {
            if bytes[pos] == b'\n' {
                sink.line_feed(pos);
            } else {
                sink.carriage_return(pos);
            }
        }
        sink.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_and_lone_cr() {
        assert_eq!(Assisted.scan(b"x\r\ny\rz\n").as_slice(), &[2, 4, 6]);
    }

    #[test]
    fn test_trailing_cr() {
        assert_eq!(Assisted.scan(b"abc\r").as_slice(), &[3]);
    }
}
