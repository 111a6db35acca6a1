//! Two-level select index over a bit vector.
//!
//! Blocks of 1024 positions; dense blocks keep a stride-32 sub-inventory
//! of offsets, sparse blocks (span >= 2^16) spill explicit positions into
//! an overflow table.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bits;
use crate::vectors::BitVector;

const BLOCK_SIZE: usize = 1024;
const SUBBLOCK_SIZE: usize = 32;
const MAX_IN_BLOCK_DISTANCE: u64 = 1 << 16;

#[derive(Debug, Default, Clone)]
struct DArrayIndex {
    positions: u64,
    block_inventory: Vec<i64>,
    subblock_inventory: Vec<u16>,
    overflow_positions: Vec<u64>,
}

impl DArrayIndex {
    fn build(bv: &BitVector, over_zeros: bool) -> Self {
        let data = bv.words();
        let mut cur_block_positions: Vec<u64> = Vec::new();
        let mut block_inventory: Vec<i64> = Vec::new();
        let mut subblock_inventory: Vec<u16> = Vec::new();
        let mut overflow_positions: Vec<u64> = Vec::new();
        let mut positions = 0u64;

        for (word_idx, &raw) in data.iter().enumerate() {
            let mut cur_pos = (word_idx as u64) << 6;
            let mut cur_word = if over_zeros { !raw } else { raw };
            while let Some(l) = bits::lsb(cur_word) {
                cur_pos += u64::from(l);
                cur_word >>= l;
                if cur_pos >= bv.len() {
                    break;
                }

                cur_block_positions.push(cur_pos);
                if cur_block_positions.len() == BLOCK_SIZE {
                    Self::flush_block(
                        &mut cur_block_positions,
                        &mut block_inventory,
                        &mut subblock_inventory,
                        &mut overflow_positions,
                    );
                }

                // shifting by l + 1 could be 64
                cur_word >>= 1;
                cur_pos += 1;
                positions += 1;
            }
        }
        if !cur_block_positions.is_empty() {
            Self::flush_block(
                &mut cur_block_positions,
                &mut block_inventory,
                &mut subblock_inventory,
                &mut overflow_positions,
            );
        }

        Self {
            positions,
            block_inventory,
            subblock_inventory,
            overflow_positions,
        }
    }

    fn flush_block(
        cur_block_positions: &mut Vec<u64>,
        block_inventory: &mut Vec<i64>,
        subblock_inventory: &mut Vec<u16>,
        overflow_positions: &mut Vec<u64>,
    ) {
        let first = *cur_block_positions.first().unwrap();
        let last = *cur_block_positions.last().unwrap();
        if last - first < MAX_IN_BLOCK_DISTANCE {
            block_inventory.push(first as i64);
            for chunk in cur_block_positions.chunks(SUBBLOCK_SIZE) {
                subblock_inventory.push((chunk[0] - first) as u16);
            }
        } else {
            block_inventory.push(-(overflow_positions.len() as i64) - 1);
            overflow_positions.extend_from_slice(cur_block_positions);
            for _ in cur_block_positions.chunks(SUBBLOCK_SIZE) {
                subblock_inventory.push(u16::MAX);
            }
        }
        cur_block_positions.clear();
    }

    fn select(&self, bv: &BitVector, idx: u64, over_zeros: bool) -> u64 {
        debug_assert!(idx < self.positions);
        let block = (idx as usize) / BLOCK_SIZE;
        let block_pos = self.block_inventory[block];
        if block_pos < 0 {
            let overflow = (-block_pos - 1) as usize;
            return self.overflow_positions[overflow + (idx as usize & (BLOCK_SIZE - 1))];
        }

        let subblock = (idx as usize) / SUBBLOCK_SIZE;
        let start_pos = block_pos as u64 + u64::from(self.subblock_inventory[subblock]);
        let mut remainder = idx & (SUBBLOCK_SIZE as u64 - 1);
        if remainder == 0 {
            return start_pos;
        }

        let data = bv.words();
        let mut word_idx = (start_pos >> 6) as usize;
        let word_shift = start_pos & 63;
        let getter = |i: usize| if over_zeros { !data[i] } else { data[i] };
        let mut word = getter(word_idx) & (u64::MAX << word_shift);
        loop {
            let popcnt = u64::from(word.count_ones());
            if remainder < popcnt {
                break;
            }
            remainder -= popcnt;
            word_idx += 1;
            word = getter(word_idx);
        }
        ((word_idx as u64) << 6) + bits::select_in_word(word, remainder)
    }

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LittleEndian>(self.positions)?;
        w.write_u64::<LittleEndian>(self.block_inventory.len() as u64)?;
        for &v in &self.block_inventory {
            w.write_i64::<LittleEndian>(v)?;
        }
        w.write_u64::<LittleEndian>(self.subblock_inventory.len() as u64)?;
        for &v in &self.subblock_inventory {
            w.write_u16::<LittleEndian>(v)?;
        }
        w.write_u64::<LittleEndian>(self.overflow_positions.len() as u64)?;
        for &v in &self.overflow_positions {
            w.write_u64::<LittleEndian>(v)?;
        }
        Ok(())
    }

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let positions = r.read_u64::<LittleEndian>()?;
        let n = r.read_u64::<LittleEndian>()? as usize;
        let mut block_inventory = Vec::with_capacity(n);
        for _ in 0..n {
            block_inventory.push(r.read_i64::<LittleEndian>()?);
        }
        let n = r.read_u64::<LittleEndian>()? as usize;
        let mut subblock_inventory = Vec::with_capacity(n);
        for _ in 0..n {
            subblock_inventory.push(r.read_u16::<LittleEndian>()?);
        }
        let n = r.read_u64::<LittleEndian>()? as usize;
        let mut overflow_positions = Vec::with_capacity(n);
        for _ in 0..n {
            overflow_positions.push(r.read_u64::<LittleEndian>()?);
        }
        Ok(Self {
            positions,
            block_inventory,
            subblock_inventory,
            overflow_positions,
        })
    }
}

/// `select1` support: position of the i-th set bit.
#[derive(Debug, Default, Clone)]
pub struct DArray1(DArrayIndex);

impl DArray1 {
    pub fn new(bv: &BitVector) -> Self {
        Self(DArrayIndex::build(bv, false))
    }

    #[inline]
    pub fn select(&self, bv: &BitVector, idx: u64) -> u64 {
        self.0.select(bv, idx, false)
    }

    pub fn num_positions(&self) -> u64 {
        self.0.positions
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        self.0.save(w)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        Ok(Self(DArrayIndex::load(r)?))
    }
}

/// `select0` support: position of the i-th zero bit.
#[derive(Debug, Default, Clone)]
pub struct DArray0(DArrayIndex);

impl DArray0 {
    pub fn new(bv: &BitVector) -> Self {
        Self(DArrayIndex::build(bv, true))
    }

    #[inline]
    pub fn select(&self, bv: &BitVector, idx: u64) -> u64 {
        self.0.select(bv, idx, true)
    }

    pub fn num_positions(&self) -> u64 {
        self.0.positions
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        self.0.save(w)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        Ok(Self(DArrayIndex::load(r)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vectors::BitVectorBuilder;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn select_matches_naive(ones: &[u64], len: u64) {
        let mut b = BitVectorBuilder::with_size(len);
        for &i in ones {
            b.set(i, true);
        }
        let bv = b.build();
        let d1 = DArray1::new(&bv);
        assert_eq!(d1.num_positions(), ones.len() as u64);
        for (k, &pos) in ones.iter().enumerate() {
            assert_eq!(d1.select(&bv, k as u64), pos);
        }
    }

    #[test]
    fn dense_blocks() {
        let ones: Vec<u64> = (0..5000).map(|i| i * 3).collect();
        select_matches_naive(&ones, 15001);
    }

    #[test]
    fn sparse_blocks_use_overflow() {
        // blocks span far more than 2^16 bits
        let ones: Vec<u64> = (0..2048).map(|i| i * 100_000).collect();
        select_matches_naive(&ones, 2048 * 100_000);
    }

    #[test]
    fn random_bits_and_select0() {
        let mut rng = SmallRng::seed_from_u64(7);
        let len = 70_000u64;
        let mut b = BitVectorBuilder::with_size(len);
        let mut ones = Vec::new();
        let mut zeros = Vec::new();
        for i in 0..len {
            if rng.gen_bool(0.3) {
                b.set(i, true);
                ones.push(i);
            } else {
                zeros.push(i);
            }
        }
        let bv = b.build();
        let d1 = DArray1::new(&bv);
        let d0 = DArray0::new(&bv);
        for (k, &pos) in ones.iter().enumerate().step_by(17) {
            assert_eq!(d1.select(&bv, k as u64), pos);
        }
        for (k, &pos) in zeros.iter().enumerate().step_by(29) {
            assert_eq!(d0.select(&bv, k as u64), pos);
        }
    }

    #[test]
    fn roundtrip() {
        let ones: Vec<u64> = (0..300).map(|i| i * 7 + 1).collect();
        let mut b = BitVectorBuilder::with_size(2200);
        for &i in &ones {
            b.set(i, true);
        }
        let bv = b.build();
        let d1 = DArray1::new(&bv);
        let mut bytes = Vec::new();
        d1.save(&mut bytes).unwrap();
        let loaded = DArray1::load(&mut bytes.as_slice()).unwrap();
        for k in 0..ones.len() as u64 {
            assert_eq!(loaded.select(&bv, k), d1.select(&bv, k));
        }
    }
}
