//! Monotone sequence codecs and their select/rank support structures.

mod codes;
mod darray;
mod ef;
mod fast_ef;
mod indexed_codewords;
mod pef;
mod pointers;
mod prefix_summed;

pub use darray::{DArray0, DArray1};
pub use ef::EfSequence;
pub use fast_ef::FastEfSequence;
pub use indexed_codewords::IndexedCodewordsSequence;
pub use pef::UniformPefSequence;
pub use pointers::PointerSequence;
pub use prefix_summed::PrefixSummedSequence;

pub(crate) use codes::{read_delta, read_gamma, write_delta, write_gamma};

use std::io::{Read, Write};

use crate::Result;

/// Child offsets of a parent entry: positions `[begin, end)` in the next
/// order's arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerRange {
    pub begin: u64,
    pub end: u64,
}

impl PointerRange {
    pub fn len(&self) -> u64 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.begin
    }
}

/// Codec for the per-order token-id sequences of a trie.
///
/// Builders consume the per-parent ids together with the parent pointer
/// offsets; the stored sequence is made globally monotone by shifting each
/// parent's block by the running upper bound of the previous block.
pub trait GramSequence: Sized {
    fn build(ids: &[u64], pointers: &[u64], order: u8) -> Result<Self>;

    fn access(&self, i: u64) -> u64;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the id inside its parent's range.
    ///
    /// `id` is an offset from the running upper bound at `range.begin - 1`
    /// (zero when the range starts the sequence).
    fn find(&self, range: PointerRange, id: u64) -> Option<u64>;

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()>;

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self>;
}

/// Codec for the per-gram rank sequences (count ranks or interleaved
/// prob/back-off ranks).
pub trait RankSequence: Sized {
    fn build(values: &[u64], order: u8) -> Result<Self>;

    fn access(&self, i: u64) -> u64;

    fn len(&self) -> u64;

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()>;

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self>;
}

/// Monotone codecs usable under a prefix-sum wrapper.
pub trait MonotoneSequence: Sized {
    fn build_monotone(values: &[u64], universe: u64, order: u8) -> Result<Self>;

    fn access(&self, i: u64) -> u64;

    fn len(&self) -> u64;

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()>;

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self>;
}

// Interleaved prob/back-off rank words are small and read on every score
// step; plain fixed-width packing beats a compressed codec there.
impl RankSequence for crate::vectors::CompactVector {
    fn build(values: &[u64], _order: u8) -> Result<Self> {
        Ok(Self::from_slice(values))
    }

    fn access(&self, i: u64) -> u64 {
        self.get(i)
    }

    fn len(&self) -> u64 {
        crate::vectors::CompactVector::len(self)
    }

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        crate::vectors::CompactVector::save(self, w)
    }

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        crate::vectors::CompactVector::load(r)
    }
}

/// Shift per-parent ids into one globally monotone sequence: each parent
/// block is offset by the last value of the preceding non-empty block.
pub(crate) fn to_monotone(ids: &[u64], pointers: &[u64]) -> Vec<u64> {
    debug_assert!(!pointers.is_empty());
    if ids.is_empty() {
        return Vec::new();
    }
    let mut values = Vec::with_capacity(ids.len());
    let mut prev_upper = 0u64;
    let mut ptr = 1usize;
    let mut end = pointers[1];
    let mut within = 0u64;
    for &id in ids {
        while within == end - pointers[ptr - 1] {
            within = 0;
            loop {
                ptr += 1;
                end = pointers[ptr];
                if end != pointers[ptr - 1] {
                    break;
                }
            }
            prev_upper = values.last().copied().unwrap_or(0);
        }
        values.push(id + prev_upper);
        within += 1;
    }
    debug_assert_eq!(values.len(), ids.len());
    values
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn monotone_offsetting_skips_empty_ranges() {
        // parents: [0,2) [2,2) [2,5) [5,6)
        let pointers = [0u64, 2, 2, 5, 6];
        let ids = [3u64, 7, 0, 1, 4, 2];
        let values = to_monotone(&ids, &pointers);
        assert_eq!(values, vec![3, 7, 7, 8, 11, 13]);
    }

    #[test]
    fn monotone_offsetting_single_range() {
        let pointers = [0u64, 4];
        let ids = [0u64, 2, 5, 9];
        assert_eq!(to_monotone(&ids, &pointers), vec![0, 2, 5, 9]);
    }
}
