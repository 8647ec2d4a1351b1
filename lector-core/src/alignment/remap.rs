//! Projection of character offsets between original and normalized text.
//!
//! The normalizer records a sparse list of `(original, normalized)` boundary
//! pairs, one before and one after every expansion. Between two boundaries the
//! text is assumed to stretch linearly, which is exact for untouched runs and
//! a good approximation inside an expansion ("Dr." → "Doctor").

use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Clone, Copy)]
enum Direction {
    ToNormalized,
    ToOriginal,
}

#[derive(Clone, Copy)]
enum Rounding {
    Floor,
    Ceil,
}

/// Maps an offset in the original text to the normalized text.
///
/// An offset sitting exactly on a boundary returns that boundary's normalized
/// position. Inside a segment the position is interpolated and rounded up.
/// Offsets before the first boundary snap to it, offsets past the last one
/// continue with the final segment's ratio. An empty mapping is the identity.
pub fn map_to_normalized(original_offset: usize, mapping: &[(usize, usize)]) -> usize {
    project(original_offset, mapping, Direction::ToNormalized, Rounding::Ceil)
}

/// The inverse of [`map_to_normalized`], with the same boundary rules.
pub fn map_to_original(normalized_offset: usize, mapping: &[(usize, usize)]) -> usize {
    project(normalized_offset, mapping, Direction::ToOriginal, Rounding::Ceil)
}

fn project(offset: usize, mapping: &[(usize, usize)], direction: Direction, rounding: Rounding) -> usize {
    let key = |index: usize| -> (usize, usize) {
        let (original, normalized) = mapping[index];
        match direction {
            Direction::ToNormalized => (original, normalized),
            Direction::ToOriginal => (normalized, original),
        }
    };

    if mapping.is_empty() {
        return offset;
    }

    let idx = partition_by(mapping.len(), |i| key(i).0 < offset);
    if idx < mapping.len() && key(idx).0 == offset {
        return key(idx).1;
    }

    if idx == 0 {
        return key(0).1;
    }

    if idx == mapping.len() {
        let (last_from, last_to) = key(idx - 1);
        let delta = offset - last_from;
        if idx < 2 {
            return last_to + delta;
        }
        let (prev_from, prev_to) = key(idx - 2);
        let from_len = last_from.saturating_sub(prev_from);
        let to_len = last_to.saturating_sub(prev_to);
        if from_len == 0 {
            return last_to + delta;
        }
        return last_to + scale(delta, to_len, from_len, rounding);
    }

    let (from_start, to_start) = key(idx - 1);
    let (from_end, to_end) = key(idx);
    let from_len = from_end - from_start;
    let to_len = to_end.saturating_sub(to_start);
    to_start + scale(offset - from_start, to_len, from_len, rounding)
}

/// `slice::partition_point` over indices, so both projection directions can
/// share one search without building a swapped copy of the mapping.
fn partition_by(len: usize, pred: impl Fn(usize) -> bool) -> usize {
    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

fn scale(value: usize, numerator: usize, denominator: usize, rounding: Rounding) -> usize {
    match rounding {
        Rounding::Ceil => (value * numerator + denominator - 1) / denominator,
        Rounding::Floor => value * numerator / denominator,
    }
}

/// Boundary list plus the lengths of both texts, so projections can be
/// clamped to valid offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetMapping {
    boundaries: Vec<(usize, usize)>,
    original_len: usize,
    normalized_len: usize,
}

impl OffsetMapping {
    pub fn new(boundaries: Vec<(usize, usize)>, original_len: usize, normalized_len: usize) -> Self {
        Self {
            boundaries,
            original_len,
            normalized_len,
        }
    }

    pub fn identity(len: usize) -> Self {
        Self::new(vec![(0, 0), (len, len)], len, len)
    }

    pub fn boundaries(&self) -> &[(usize, usize)] {
        &self.boundaries
    }

    pub fn original_len(&self) -> usize {
        self.original_len
    }

    pub fn normalized_len(&self) -> usize {
        self.normalized_len
    }

    pub fn to_normalized(&self, original_offset: usize) -> usize {
        map_to_normalized(original_offset, &self.boundaries).min(self.normalized_len)
    }

    pub fn to_original(&self, normalized_offset: usize) -> usize {
        map_to_original(normalized_offset, &self.boundaries).min(self.original_len)
    }

    /// Widest normalized span covering `original`: start rounds down, end up.
    pub fn normalized_range(&self, original: Range<usize>) -> Range<usize> {
        let start = project(original.start, &self.boundaries, Direction::ToNormalized, Rounding::Floor)
            .min(self.normalized_len);
        let end = self.to_normalized(original.end).max(start);
        start..end
    }

    /// Widest original span covering `normalized`: start rounds down, end up.
    pub fn original_range(&self, normalized: Range<usize>) -> Range<usize> {
        let start = project(normalized.start, &self.boundaries, Direction::ToOriginal, Rounding::Floor)
            .min(self.original_len);
        let end = self.to_original(normalized.end).max(start);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DOCTOR: [(usize, usize); 2] = [(0, 0), (4, 7)];

    #[rstest]
    #[case(0, 0)]
    #[case(4, 7)]
    #[case(3, 6)]
    #[case(1, 2)]
    fn test_inside_and_on_boundaries(#[case] original: usize, #[case] expected: usize) {
        assert_eq!(map_to_normalized(original, &DOCTOR), expected);
    }

    #[test]
    fn test_empty_mapping_is_identity() {
        for offset in [0, 1, 17, 400] {
            assert_eq!(map_to_normalized(offset, &[]), offset);
            assert_eq!(map_to_original(offset, &[]), offset);
        }
    }

    #[test]
    fn test_before_first_boundary_snaps_to_it() {
        let mapping = [(5, 9), (10, 14)];
        assert_eq!(map_to_normalized(0, &mapping), 9);
        assert_eq!(map_to_normalized(4, &mapping), 9);
    }

    #[test]
    fn test_past_last_boundary_continues_final_ratio() {
        // Final segment stretches 4 original chars to 7 normalized ones.
        assert_eq!(map_to_normalized(8, &DOCTOR), 14);
        assert_eq!(map_to_normalized(5, &DOCTOR), 9);

        // A single boundary continues with the identity ratio.
        assert_eq!(map_to_normalized(10, &[(2, 5)]), 13);
    }

    #[test]
    fn test_monotone_over_typical_mapping() {
        let mapping = [(0, 0), (3, 6), (9, 12), (15, 30), (20, 35)];
        let mut previous = 0;
        for offset in 0..30 {
            let mapped = map_to_normalized(offset, &mapping);
            assert!(mapped >= previous, "offset {offset} went backwards");
            previous = mapped;
        }
    }

    #[test]
    fn test_inverse_projection() {
        assert_eq!(map_to_original(7, &DOCTOR), 4);
        assert_eq!(map_to_original(0, &DOCTOR), 0);
        // 1.75 normalized chars per original char, so 6 / 1.75 = 3.43 rounds up.
        assert_eq!(map_to_original(6, &DOCTOR), 4);
    }

    #[test]
    fn test_mapping_wrapper_clamps_and_widens() {
        let mapping = OffsetMapping::new(vec![(0, 0), (3, 6), (9, 12)], 9, 12);
        assert_eq!(mapping.to_normalized(40), 12);
        assert_eq!(mapping.to_original(40), 9);

        // The "r" of "Doctor" still lands on the original abbreviation.
        assert_eq!(mapping.original_range(5..6), 2..3);
        assert_eq!(mapping.normalized_range(0..3), 0..6);
        assert_eq!(mapping.normalized_range(4..9), 7..12);
    }

    #[test]
    fn test_identity_mapping() {
        let mapping = OffsetMapping::identity(10);
        assert_eq!(mapping.original_range(2..5), 2..5);
        assert_eq!(mapping.to_normalized(10), 10);
    }
}
