//! Parent-pointer sequence: an Elias-Fano code over child start offsets.

use std::io::{Read, Write};

use crate::Result;

use super::{EfSequence, PointerRange};

#[derive(Debug, Default)]
pub struct PointerSequence {
    pointers: EfSequence,
}

impl PointerSequence {
    /// `pointers` holds one start offset per parent plus the final total,
    /// non-decreasing; entry i opens the child range of parent i.
    pub fn build(pointers: &[u64]) -> Result<Self> {
        let universe = pointers.last().copied().unwrap_or(0);
        Ok(Self {
            pointers: EfSequence::new(pointers, universe, false)?,
        })
    }

    #[inline]
    pub fn range(&self, i: u64) -> PointerRange {
        let (begin, end) = self.pointers.pair(i);
        PointerRange { begin, end }
    }

    pub fn len(&self) -> u64 {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    pub fn universe(&self) -> u64 {
        self.pointers.universe()
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        self.pointers.save(w)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            pointers: EfSequence::load(r)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ranges_follow_offsets() {
        let offsets = [0u64, 2, 2, 7, 7, 7, 10];
        let ps = PointerSequence::build(&offsets).unwrap();
        assert_eq!(ps.len(), 7);
        assert_eq!(ps.range(0), PointerRange { begin: 0, end: 2 });
        assert_eq!(ps.range(1), PointerRange { begin: 2, end: 2 });
        assert_eq!(ps.range(2), PointerRange { begin: 2, end: 7 });
        assert_eq!(ps.range(5), PointerRange { begin: 7, end: 10 });
        assert_eq!(ps.universe(), 10);
    }
}
