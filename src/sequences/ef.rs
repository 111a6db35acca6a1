//! Classical Elias-Fano encoding of a monotone sequence.

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bits;
use crate::vectors::{BitVector, BitVectorBuilder, UnaryIterator};
use crate::{Error, Result};

use super::darray::{DArray0, DArray1};
use super::MonotoneSequence;

#[derive(Debug, Default, Clone)]
pub struct EfSequence {
    l: u8,
    high_bits: BitVector,
    high_bits_d1: DArray1,
    high_bits_d0: DArray0,
    low_bits: BitVector,
    size: u64,
}

impl EfSequence {
    /// Encode `n = values.len()` sorted values with universe `u`.
    ///
    /// `index_on_zeros` additionally builds the `select0` index needed to
    /// map values back to positions; the hot query path never uses it.
    pub fn new(values: &[u64], u: u64, index_on_zeros: bool) -> Result<Self> {
        let n = values.len() as u64;
        let l = if n > 0 && u / n > 0 {
            bits::msb(u / n) as u8
        } else {
            0
        };
        let mut high = BitVectorBuilder::with_size(n + (u >> l) + 1);
        let mut low = BitVectorBuilder::default();
        low.reserve(n * u64::from(l));

        let low_mask = (1u64 << l) - 1;
        let mut last = 0u64;
        for (i, &v) in values.iter().enumerate() {
            if i > 0 && v < last {
                return Err(Error::MalformedInput {
                    order: 0,
                    msg: format!("sequence is not sorted at position {i}: {v} < {last}"),
                });
            }
            if l > 0 {
                low.append_bits(v & low_mask, u32::from(l));
            }
            high.set((v >> l) + i as u64, true);
            last = v;
        }

        let high_bits = high.build();
        let low_bits = low.build();
        let high_bits_d1 = DArray1::new(&high_bits);
        let high_bits_d0 = if index_on_zeros {
            DArray0::new(&high_bits)
        } else {
            DArray0::default()
        };
        Ok(Self {
            l,
            high_bits,
            high_bits_d1,
            high_bits_d0,
            low_bits,
            size: n,
        })
    }

    #[inline]
    pub fn get(&self, i: u64) -> u64 {
        debug_assert!(i < self.size);
        ((self.high_bits_d1.select(&self.high_bits, i) - i) << self.l)
            | self.low_bits.get_bits(i * u64::from(self.l), u32::from(self.l))
    }

    #[inline]
    pub fn pair(&self, i: u64) -> (u64, u64) {
        (self.get(i), self.get(i + 1))
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn universe(&self) -> u64 {
        self.get(self.size - 1)
    }

    pub fn num_ones(&self) -> u64 {
        self.high_bits_d1.num_positions()
    }

    pub fn iter(&self) -> EfIterator<'_> {
        EfIterator::new(self, 0)
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u8(self.l)?;
        self.high_bits.save(w)?;
        self.high_bits_d1.save(w)?;
        self.high_bits_d0.save(w)?;
        self.low_bits.save(w)?;
        w.write_u64::<byteorder::LittleEndian>(self.size)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let l = r.read_u8()?;
        let high_bits = BitVector::load(r)?;
        let high_bits_d1 = DArray1::load(r)?;
        let high_bits_d0 = DArray0::load(r)?;
        let low_bits = BitVector::load(r)?;
        let size = r.read_u64::<byteorder::LittleEndian>()?;
        Ok(Self {
            l,
            high_bits,
            high_bits_d1,
            high_bits_d0,
            low_bits,
            size,
        })
    }
}

impl MonotoneSequence for EfSequence {
    fn build_monotone(values: &[u64], universe: u64, _order: u8) -> Result<Self> {
        Self::new(values, universe, false)
    }

    fn access(&self, i: u64) -> u64 {
        self.get(i)
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        EfSequence::save(self, w)
    }

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        EfSequence::load(r)
    }
}

/// Sequential decoder; one select to start, unary stepping afterwards.
pub struct EfIterator<'a> {
    ef: &'a EfSequence,
    i: u64,
    high_enum: Option<UnaryIterator<'a>>,
    low_buf: u64,
    low_mask: u64,
    chunks_in_word: u64,
    chunks_avail: u64,
}

impl<'a> EfIterator<'a> {
    fn new(ef: &'a EfSequence, i: u64) -> Self {
        let l = u64::from(ef.l);
        let low_mask = (1u64 << l) - 1;
        let (chunks_in_word, chunks_avail) = if l > 0 { (64 / l, 0) } else { (0, ef.num_ones()) };
        let high_enum = if ef.num_ones() > 0 {
            let pos = ef.high_bits_d1.select(&ef.high_bits, i);
            Some(UnaryIterator::new(&ef.high_bits, pos))
        } else {
            None
        };
        Self {
            ef,
            i,
            high_enum,
            low_buf: 0,
            low_mask,
            chunks_in_word,
            chunks_avail,
        }
    }

    pub fn next_value(&mut self) -> u64 {
        let l = u64::from(self.ef.l);
        if self.chunks_avail == 0 {
            self.low_buf = self.ef.low_bits.get_word64(self.i * l);
            self.chunks_avail = self.chunks_in_word;
        }
        self.chunks_avail -= 1;

        let high = self.high_enum.as_mut().unwrap().next();
        let low = self.low_buf & self.low_mask;
        let value = ((high - self.i) << l) | low;
        self.i += 1;
        self.low_buf >>= l;
        value
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_sorted(n: usize, universe: u64, seed: u64) -> Vec<u64> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut v: Vec<u64> = (0..n).map(|_| rng.gen_range(0..=universe)).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn random_access_matches_input() {
        for (n, u, seed) in [(1usize, 0u64, 1u64), (100, 1000, 2), (5000, 1 << 40, 3)] {
            let values = random_sorted(n, u, seed);
            let ef = EfSequence::new(&values, *values.last().unwrap(), false).unwrap();
            for (i, &v) in values.iter().enumerate() {
                assert_eq!(ef.get(i as u64), v, "n={n} i={i}");
            }
        }
    }

    #[test]
    fn iterator_matches_access() {
        let values = random_sorted(3000, 1 << 25, 4);
        let ef = EfSequence::new(&values, *values.last().unwrap(), false).unwrap();
        let mut it = ef.iter();
        for &v in &values {
            assert_eq!(it.next_value(), v);
        }
    }

    #[test]
    fn empty_and_dense() {
        let ef = EfSequence::new(&[], 0, false).unwrap();
        assert!(ef.is_empty());

        // dense: universe == n - 1 forces l == 0
        let values: Vec<u64> = (0..256).collect();
        let ef = EfSequence::new(&values, 255, false).unwrap();
        for &v in &values {
            assert_eq!(ef.get(v), v);
        }
    }

    #[test]
    fn rejects_unsorted() {
        assert!(EfSequence::new(&[3, 2, 5], 5, false).is_err());
    }

    #[test]
    fn roundtrip() {
        let values = random_sorted(777, 1 << 30, 5);
        let ef = EfSequence::new(&values, *values.last().unwrap(), true).unwrap();
        let mut bytes = Vec::new();
        EfSequence::save(&ef, &mut bytes).unwrap();
        let loaded = EfSequence::load(&mut bytes.as_slice()).unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(loaded.get(i as u64), v);
        }
    }
}
