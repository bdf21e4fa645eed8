//! Cross-strategy equivalence checks

use thiserror::Error;

use super::{Algorithm, Baseline, BreakResult, LineBreakScanner, Parallel};

/// Two strategies disagreed on the same input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{scanner} diverged from baseline at break #{index}: expected {expected:?}, got {actual:?}"
)]
pub struct ScanMismatch {
    pub scanner: &'static str,
    /// Index of the first differing entry
    pub index: usize,
    pub expected: Option<usize>,
    pub actual: Option<usize>,
}

/// Every strategy, including parallel wrappers with partitions small
/// enough to put seams inside `bytes`
pub fn all_scanners(len: usize) -> Vec<Box<dyn LineBreakScanner>> {
    let mut scanners: Vec<Box<dyn LineBreakScanner>> =
        Algorithm::ALL.iter().map(|a| a.scanner()).collect();
    let min_partition = (len / 4).max(1);
    for inner in Algorithm::ALL {
        scanners.push(Box::new(
            Parallel::new(inner, 4).with_min_partition(min_partition),
        ));
    }
    scanners
}

/// Compare every strategy against [`Baseline`]
pub fn cross_check(bytes: &[u8]) -> Result<(), ScanMismatch> {
    let expected = Baseline.scan(bytes);
    let mut actual = BreakResult::with_capacity(expected.len());

    for scanner in all_scanners(bytes.len()) {
        scanner.scan_into(bytes, &mut actual);
        if actual != expected {
            let index = first_difference(expected.as_slice(), actual.as_slice());
            let mismatch = ScanMismatch {
                scanner: scanner.name(),
                index,
                expected: expected.as_slice().get(index).copied(),
                actual: actual.as_slice().get(index).copied(),
            };
            tracing::error!("{}", mismatch);
            return Err(mismatch);
        }
    }
    Ok(())
}

fn first_difference(a: &[usize], b: &[usize]) -> usize {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .unwrap_or(a.len().min(b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_check_passes_on_mixed_input() {
        let text = "fn main() {\r\n    println!(\"héllo\");\r}\n\n\r\n".repeat(17);
        assert_eq!(cross_check(text.as_bytes()), Ok(()));
    }

    #[test]
    fn test_first_difference() {
        assert_eq!(first_difference(&[1, 2, 3], &[1, 2, 4]), 2);
        assert_eq!(first_difference(&[1, 2], &[1, 2, 3]), 2);
        assert_eq!(first_difference(&[], &[]), 0);
    }

    #[test]
    fn test_all_scanners_includes_parallel_wrappers() {
        let names: Vec<_> = all_scanners(64).iter().map(|s| s.name()).collect();
        assert!(names.contains(&"baseline"));
        assert!(names.contains(&"parallel-wide128"));
        assert_eq!(names.len(), Algorithm::ALL.len() * 2);
    }
}
