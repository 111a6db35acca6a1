//! Variable-length codewords with a bit index of boundaries.
//!
//! A value v is written as the codeword `v + 2 - 2^len` of width
//! `len = floor(log2(v + 2))`; a parallel bit vector marks codeword starts
//! and a trailing sentinel 1 delimits the last one, so
//! `select1(i+1) - select1(i)` yields the i-th codeword's width.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bits;
use crate::vectors::{BitVector, BitVectorBuilder, UnaryIterator};
use crate::Result;

use super::darray::DArray1;
use super::RankSequence;

#[derive(Debug, Default)]
pub struct IndexedCodewordsSequence {
    size: u64,
    codewords: BitVector,
    index: BitVector,
    index_d1: DArray1,
}

impl IndexedCodewordsSequence {
    pub fn new(values: &[u64]) -> Self {
        let total_bits: u64 = values.iter().map(|&v| u64::from(bits::floor_log2(v + 2))).sum();
        let mut index = BitVectorBuilder::with_size(total_bits + 1);
        let mut codewords = BitVectorBuilder::with_size(total_bits);

        let mut pos = 0u64;
        for &v in values {
            let len = bits::floor_log2(v + 2);
            let cw = v + 2 - (1u64 << len);
            codewords.set_bits(pos, cw, len);
            index.set(pos, true);
            pos += u64::from(len);
        }
        debug_assert_eq!(pos, total_bits);
        // sentinel delimiting the last codeword
        index.set(pos, true);

        let index = index.build();
        let index_d1 = DArray1::new(&index);
        Self {
            size: values.len() as u64,
            codewords: codewords.build(),
            index,
            index_d1,
        }
    }

    #[inline]
    pub fn get(&self, i: u64) -> u64 {
        debug_assert!(i < self.size);
        let pos = self.index_d1.select(&self.index, i);
        let mut e = UnaryIterator::new(&self.index, pos + 1);
        let len = (e.next() - pos) as u32;
        debug_assert!(len <= 64);
        let cw = self.codewords.get_bits(pos, len);
        cw + (1u64 << len) - 2
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl RankSequence for IndexedCodewordsSequence {
    fn build(values: &[u64], _order: u8) -> Result<Self> {
        Ok(Self::new(values))
    }

    fn access(&self, i: u64) -> u64 {
        self.get(i)
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LittleEndian>(self.size)?;
        self.codewords.save(w)?;
        self.index.save(w)?;
        self.index_d1.save(w)
    }

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let size = r.read_u64::<LittleEndian>()?;
        let codewords = BitVector::load(r)?;
        let index = BitVector::load(r)?;
        let index_d1 = DArray1::load(r)?;
        Ok(Self {
            size,
            codewords,
            index,
            index_d1,
        })
    }
}
