//! Reference byte-by-byte scanner

use super::{BreakResult, LineBreakScanner};

/// Single pass with one byte of lookahead after `\r`
#[derive(Debug, Clone, Copy, Default)]
pub struct Baseline;

impl LineBreakScanner for Baseline {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn scan_into(&self, bytes: &[u8], out: &mut BreakResult) {
        out.reset();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    out.push(i);
                    i += 1;
                }
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        out.push(i + 1);
                        i += 2;
                    } else {
                        out.push(i);
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lf_only() {
        assert_eq!(Baseline.scan(b"a\nbb\n\nc").as_slice(), &[1, 4, 5]);
    }

    #[test]
    fn test_lone_cr() {
        assert_eq!(Baseline.scan(b"a\rb\r").as_slice(), &[1, 3]);
    }

    #[test]
    fn test_lf_cr_is_two_breaks() {
        assert_eq!(Baseline.scan(b"\n\r").as_slice(), &[0, 1]);
    }

    #[test]
    fn test_mixed_terminators() {
        assert_eq!(Baseline.scan(b"a\r\r\nb\n\r\n").as_slice(), &[1, 3, 5, 7]);
    }
}
