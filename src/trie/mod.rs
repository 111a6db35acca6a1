//! The per-order sorted arrays and the trie models built over them.

mod count;
pub(crate) mod mapper;
mod prob;

pub use count::{TrieCountBuilder, TrieCountLm};
pub use prob::{TrieProbBuilder, TrieProbLm};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::sequences::{GramSequence, PointerRange, PointerSequence, RankSequence};

/// Which per-gram value a sorted array carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueKind {
    Count,
    ProbBackoff,
    None,
}

/// One order of the trie: the token-id sequence, the parallel rank
/// sequence and the child pointers into the next order.
///
/// The unigram array stores no grams (the vocabulary is the index) and the
/// terminal array keeps an empty pointer sequence.
#[derive(Debug)]
pub struct SortedArray<G, R> {
    size: u64,
    grams: Option<G>,
    ranks: Option<R>,
    pointers: PointerSequence,
}

impl<G: GramSequence, R: RankSequence> SortedArray<G, R> {
    pub(crate) fn new(size: u64, grams: Option<G>, ranks: Option<R>) -> Self {
        Self {
            size,
            grams,
            ranks,
            pointers: PointerSequence::default(),
        }
    }

    pub(crate) fn set_pointers(&mut self, pointers: PointerSequence) {
        self.pointers = pointers;
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Child offsets of the entry at `pos` in the next order's arrays.
    #[inline]
    pub fn range(&self, pos: u64) -> PointerRange {
        debug_assert!(pos < self.size);
        self.pointers.range(pos)
    }

    /// Position of the child with the given id inside its parent's range.
    #[inline]
    pub fn position(&self, r: PointerRange, id: u64) -> Option<u64> {
        if r.is_empty() {
            return None;
        }
        self.grams.as_ref().and_then(|g| g.find(r, id))
    }

    /// Locate the child and step `r` down to its own child range.
    #[inline]
    pub fn next(&self, r: &mut PointerRange, id: u64) -> Option<u64> {
        let pos = self.position(*r, id)?;
        *r = self.range(pos);
        Some(pos)
    }

    /// The stored rank word at `pos` (a count rank, or interleaved
    /// prob|back-off ranks).
    #[inline]
    pub fn rank(&self, pos: u64) -> u64 {
        debug_assert!(pos < self.size);
        self.ranks.as_ref().expect("rank table present").access(pos)
    }

    pub(crate) fn save<W: Write>(
        &self,
        w: &mut W,
        order: u8,
        kind: ValueKind,
    ) -> std::io::Result<()> {
        w.write_u64::<LittleEndian>(self.size)?;
        if order != 1 {
            self.grams.as_ref().expect("grams present").save(w)?;
        }
        if kind != ValueKind::None {
            self.ranks.as_ref().expect("ranks present").save(w)?;
        }
        self.pointers.save(w)
    }

    pub(crate) fn load<RD: Read>(r: &mut RD, order: u8, kind: ValueKind) -> std::io::Result<Self> {
        let size = r.read_u64::<LittleEndian>()?;
        let grams = if order != 1 { Some(G::load(r)?) } else { None };
        let ranks = if kind != ValueKind::None { Some(R::load(r)?) } else { None };
        let pointers = PointerSequence::load(r)?;
        Ok(Self {
            size,
            grams,
            ranks,
            pointers,
        })
    }
}
