//! One-time digit lock generation.
//!
//! Each axis of a locked grid carries a random permutation of 0-9 fixing
//! which last-digit score maps to which row/column. The permutation must be
//! fixed before any score exists so nobody can pick squares against a known
//! outcome, and it must come from a CSPRNG so it cannot be guessed.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;

/// One uniformly-random permutation of the digits 0-9.
pub fn generate_axis() -> [u8; 10] {
    let mut digits = [0u8, 1, 2, 3, 4, 5, 6, 7, 8, 9];
    digits.shuffle(&mut OsRng);
    digits
}

/// Two independent permutations, one per axis. Pure generation, no shared
/// state across pools.
pub fn generate_pair() -> ([u8; 10], [u8; 10]) {
    (generate_axis(), generate_axis())
}

/// Each digit 0-9 appears exactly once.
pub fn is_permutation(digits: &[u8]) -> bool {
    if digits.len() != 10 {
        return false;
    }
    let mut seen = [false; 10];
    for &d in digits {
        if d > 9 || seen[d as usize] {
            return false;
        }
        seen[d as usize] = true;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_is_permutation() {
        for _ in 0..100 {
            assert!(is_permutation(&generate_axis()));
        }
    }

    #[test]
    fn test_pair_axes_independent() {
        // Both axes are valid permutations; with 100 draws at least one
        // pair should differ (p of failure ~ (1/3628800)^100).
        let mut any_differ = false;
        for _ in 0..100 {
            let (cols, rows) = generate_pair();
            assert!(is_permutation(&cols));
            assert!(is_permutation(&rows));
            if cols != rows {
                any_differ = true;
            }
        }
        assert!(any_differ);
    }

    #[test]
    fn test_is_permutation_rejects_bad_input() {
        assert!(!is_permutation(&[0, 1, 2, 3, 4, 5, 6, 7, 8]));
        assert!(!is_permutation(&[0, 0, 2, 3, 4, 5, 6, 7, 8, 9]));
        assert!(!is_permutation(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 10]));
    }
}
