//! Every scanning strategy must return exactly what the baseline returns

mod common;

use common::{random_text, rng};
use textflow::scan::{self, verify, Algorithm, Baseline, BreakResult, LineBreakScanner, Parallel};

#[test]
fn test_documented_cases_for_every_scanner() {
    for scanner in verify::all_scanners(4) {
        assert_eq!(scanner.scan(b"a\r\nb").as_slice(), &[2], "{}", scanner.name());
        assert_eq!(
            scanner.scan(b"\r\n\r\n").as_slice(),
            &[1, 3],
            "{}",
            scanner.name()
        );
        assert!(scanner.scan(b"").is_empty(), "{}", scanner.name());
    }
}

#[test]
fn test_randomized_inputs_agree() {
    let mut rng = rng(0x5eed);
    for round in 0..200 {
        let len = 1 + round * 7;
        let bytes = random_text(&mut rng, len);
        assert_eq!(verify::cross_check(&bytes), Ok(()), "round {}", round);
    }
}

#[test]
fn test_crlf_on_every_chunk_boundary() {
    // A CR right before each lane boundary, LF right after
    for width in [16usize, 32, 128] {
        for boundary in [width, width * 2, width * 3] {
            let mut bytes = vec![b'x'; width * 4];
            bytes[boundary - 1] = b'\r';
            bytes[boundary] = b'\n';
            let expected = Baseline.scan(&bytes);
            assert_eq!(expected.as_slice(), &[boundary]);
            assert_eq!(verify::cross_check(&bytes), Ok(()), "width {}", width);
        }
    }
}

#[test]
fn test_crlf_on_every_partition_seam() {
    let bytes: Vec<u8> = b"abc\r\ndef\r\nghi\r\njkl\r\n".repeat(8);
    let expected = Baseline.scan(&bytes);
    for threads in 2..=8 {
        for min_partition in [1, 3, 5, 7] {
            let scanner =
                Parallel::new(Algorithm::Lanes16, threads).with_min_partition(min_partition);
            assert_eq!(
                scanner.scan(&bytes),
                expected,
                "threads {} min_partition {}",
                threads,
                min_partition
            );
        }
    }
}

#[test]
fn test_multibyte_only_text_has_no_breaks() {
    let text = "日本語のテキスト🙂é".repeat(40);
    for shift in 0..8 {
        let bytes = &text.as_bytes()[shift..];
        for scanner in verify::all_scanners(bytes.len()) {
            assert!(
                scanner.scan(bytes).is_empty(),
                "{} at shift {}",
                scanner.name(),
                shift
            );
        }
    }
}

#[test]
fn test_lone_carriage_returns() {
    let bytes = b"a\rb\r\rc\r";
    assert_eq!(scan::scan(bytes).as_slice(), &[1, 3, 4, 6]);
    assert_eq!(verify::cross_check(bytes), Ok(()));
}

#[test]
fn test_reused_result_is_reset_between_scans() {
    let mut out = BreakResult::new();
    let scanner = Algorithm::Wide128.scanner();
    scanner.scan_into(b"\n\n\n", &mut out);
    scanner.scan_into(b"x\n", &mut out);
    assert_eq!(out.as_slice(), &[1]);
}
