//! Elias-Fano augmented with per-range sampled search trees.
//!
//! Parent ranges holding at least [`SAMPLING_THRESHOLD`] elements carry a
//! BFS-ordered tree of midpoint samples, located through an MPH keyed on
//! the range's begin offset; the descent replaces the upper levels of the
//! binary search. Short ranges binary-search directly, and the last
//! [`LINEAR_SCAN_THRESHOLD`] elements are resolved by a split high/low-bit
//! scan.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::VecDeque;
use std::io::{Read, Write};

use crate::bits;
use crate::mph::UintMpht;
use crate::vectors::{BitVector, BitVectorBuilder, UnaryIterator};
use crate::{Error, Result};

use super::darray::DArray1;
use super::{to_monotone, GramSequence, PointerRange};

pub const SAMPLING_THRESHOLD: u64 = 128;
const LOG2_SAMPLING_THRESHOLD: u32 = 7;
const LINEAR_SCAN_THRESHOLD: u64 = 64;

#[derive(Debug, Default)]
pub struct FastEfSequence {
    size: u64,
    offsets: UintMpht,
    samplings: Vec<u64>,
    high_bits: BitVector,
    high_bits_d1: DArray1,
    low_bits: BitVector,
    l: u8,
}

impl FastEfSequence {
    fn build_inner(values: &[u64], pointers: &[u64]) -> Result<Self> {
        let mut from = Vec::new();
        let mut to = Vec::new();
        let mut samplings = Vec::new();

        let mut ptr_begin = pointers[0];
        for &ptr_end in &pointers[1..] {
            let range = ptr_end - ptr_begin;
            if range >= SAMPLING_THRESHOLD {
                from.push(ptr_begin);
                to.push(samplings.len() as u64);
                let tree_height = bits::ceil_log2(range) - LOG2_SAMPLING_THRESHOLD;
                // the previous range's upper bound comes first
                samplings.push(if ptr_begin > 0 { values[ptr_begin as usize - 1] } else { 0 });
                fill_samplings(ptr_begin, ptr_end, tree_height, values, &mut samplings);
            }
            ptr_begin = ptr_end;
        }

        let offsets = if from.is_empty() {
            UintMpht::default()
        } else {
            UintMpht::build(&from, &to)?
        };

        let n = values.len() as u64;
        let u = values.last().copied().unwrap_or(0);
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
        let high_bits_d1 = DArray1::new(&high_bits);
        Ok(Self {
            size: n,
            offsets,
            samplings,
            high_bits,
            high_bits_d1,
            low_bits: low.build(),
            l,
        })
    }

    #[inline]
    pub fn get(&self, i: u64) -> u64 {
        debug_assert!(i < self.size);
        ((self.high_bits_d1.select(&self.high_bits, i) - i) << self.l)
            | self.low_bits.get_bits(i * u64::from(self.l), u32::from(self.l))
    }

    pub fn num_ones(&self) -> u64 {
        self.high_bits_d1.num_positions()
    }

    pub fn universe(&self) -> u64 {
        self.get(self.size - 1)
    }

    fn bsearch_scan(&self, mut lo: u64, mut hi: u64, id: u64, mut lower_bound: u64) -> Option<u64> {
        while hi - lo > LINEAR_SCAN_THRESHOLD {
            let mid = (lo + hi) >> 1;
            let v = self.get(mid);
            if id == v {
                return Some(mid);
            }
            if id < v {
                hi = mid;
            } else {
                lo = mid + 1;
                lower_bound = v;
            }
        }
        self.scan(lo, hi, id, lower_bound)
    }

    /// Scan `[lo, hi)` for the absolute value `id`, knowing every element
    /// is >= `lower_bound`. Checks the high part first, then only the low
    /// bits of the elements sharing it.
    fn scan(&self, mut lo: u64, hi: u64, id: u64, lower_bound: u64) -> Option<u64> {
        if lo >= hi {
            return None;
        }
        let l = u32::from(self.l);

        let begin = lo + (lower_bound >> l); // ones plus zeros below the bound
        let mut it = UnaryIterator::new(&self.high_bits, begin);
        let high_id = id >> l;
        let mut v = it.next();
        while v - lo < high_id {
            lo += 1;
            if lo == hi {
                return None;
            }
            v = it.next();
        }
        if v - lo > high_id {
            return None;
        }

        let (chunks_in_word, mut chunks_avail) = if l > 0 {
            (64 / u64::from(l), 0)
        } else {
            (0, self.num_ones())
        };
        let low_mask = if l > 0 { (1u64 << l) - 1 } else { 0 };
        let low_id = id & low_mask;
        let mut word = 0u64;

        it.skip0(1);
        // elements sharing the high part found above
        let run = (it.position() - v).min(hi - lo);

        for _ in 0..run {
            if chunks_avail == 0 {
                word = self.low_bits.get_word64(lo * u64::from(l));
                chunks_avail = chunks_in_word;
            }
            chunks_avail -= 1;
            let cur_low = word & low_mask;
            if cur_low == low_id {
                debug_assert_eq!(self.get(lo), id);
                return Some(lo);
            }
            if cur_low > low_id {
                break;
            }
            word >>= l;
            lo += 1;
        }
        None
    }
}

fn fill_samplings(lo: u64, hi: u64, tree_height: u32, values: &[u64], samplings: &mut Vec<u64>) {
    let mut ranges: VecDeque<(u64, u64)> = VecDeque::with_capacity(1 << tree_height);
    ranges.push_back((lo, hi));
    for level in 0..tree_height {
        for _ in 0..1u64 << level {
            let (lo, hi) = ranges.pop_front().unwrap();
            let mid = (lo + hi) >> 1;
            samplings.push(values[mid as usize]);
            ranges.push_back((lo, mid));
            ranges.push_back((mid + 1, hi));
        }
    }
}

impl GramSequence for FastEfSequence {
    fn build(ids: &[u64], pointers: &[u64], _order: u8) -> Result<Self> {
        let values = to_monotone(ids, pointers);
        Self::build_inner(&values, pointers)
    }

    fn access(&self, i: u64) -> u64 {
        self.get(i)
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn find(&self, r: PointerRange, id: u64) -> Option<u64> {
        debug_assert!(r.end > r.begin);
        debug_assert!(r.end <= self.size);

        let mut lo = r.begin;
        let mut hi = r.end;
        let run = hi - lo;

        if run >= SAMPLING_THRESHOLD {
            let base = self.offsets.lookup(lo) as usize;
            let prev_upper = self.samplings[base];
            let target = id + prev_upper;
            let mut lower_bound = prev_upper;
            let tree_height = bits::ceil_log2(run) - LOG2_SAMPLING_THRESHOLD;

            let mut i = 1usize;
            for _ in 0..tree_height {
                let sample = self.samplings[base + i];
                let mid = (lo + hi) >> 1;
                debug_assert_eq!(sample, self.get(mid));
                if target == sample {
                    return Some(mid);
                }
                if target < sample {
                    hi = mid;
                    i <<= 1;
                } else {
                    lo = mid + 1;
                    lower_bound = sample;
                    i = (i << 1) + 1;
                }
            }
            return self.bsearch_scan(lo, hi, target, lower_bound);
        }

        let prev_upper = if lo > 0 { self.get(lo - 1) } else { 0 };
        self.bsearch_scan(lo, hi, id + prev_upper, prev_upper)
    }

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LittleEndian>(self.size)?;
        self.offsets.save(w)?;
        crate::vectors::save_u64_slice(w, &self.samplings)?;
        self.high_bits.save(w)?;
        self.high_bits_d1.save(w)?;
        self.low_bits.save(w)?;
        w.write_u8(self.l)
    }

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let size = r.read_u64::<LittleEndian>()?;
        let offsets = UintMpht::load(r)?;
        let samplings = crate::vectors::load_u64_vec(r)?;
        let high_bits = BitVector::load(r)?;
        let high_bits_d1 = DArray1::load(r)?;
        let low_bits = BitVector::load(r)?;
        let l = r.read_u8()?;
        Ok(Self {
            size,
            offsets,
            samplings,
            high_bits,
            high_bits_d1,
            low_bits,
            l,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    /// Per-parent strictly increasing ids plus their pointer offsets.
    fn make_ranges(range_lens: &[u64], seed: u64) -> (Vec<u64>, Vec<u64>) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut ids = Vec::new();
        let mut pointers = vec![0u64];
        for &len in range_lens {
            let mut next = 0u64;
            for _ in 0..len {
                next += rng.gen_range(1..5);
                ids.push(next);
            }
            pointers.push(ids.len() as u64);
        }
        (ids, pointers)
    }

    #[test]
    fn access_roundtrips_monotone_values() {
        let (ids, pointers) = make_ranges(&[3, 0, 200, 64, 1000], 11);
        let values = to_monotone(&ids, &pointers);
        let seq = FastEfSequence::build(&ids, &pointers, 2).unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(seq.get(i as u64), v);
        }
    }

    #[test]
    fn find_locates_every_id() {
        let (ids, pointers) = make_ranges(&[1, 5, 127, 128, 129, 700, 4096], 13);
        let seq = FastEfSequence::build(&ids, &pointers, 3).unwrap();
        for w in pointers.windows(2) {
            let r = PointerRange {
                begin: w[0],
                end: w[1],
            };
            if r.is_empty() {
                continue;
            }
            for pos in r.begin..r.end {
                let id = ids[pos as usize];
                assert_eq!(seq.find(r, id), Some(pos), "range {r:?} id {id}");
            }
        }
    }

    #[test]
    fn find_rejects_absent_ids() {
        let (ids, pointers) = make_ranges(&[64, 300, 2000], 17);
        let seq = FastEfSequence::build(&ids, &pointers, 3).unwrap();
        for w in pointers.windows(2) {
            let r = PointerRange {
                begin: w[0],
                end: w[1],
            };
            let present: std::collections::HashSet<u64> =
                ids[r.begin as usize..r.end as usize].iter().copied().collect();
            let max = *ids[r.begin as usize..r.end as usize].iter().max().unwrap();
            for id in 0..=max + 2 {
                if !present.contains(&id) {
                    assert_eq!(seq.find(r, id), None, "range {r:?} id {id}");
                }
            }
        }
    }

    #[test]
    fn roundtrip() {
        let (ids, pointers) = make_ranges(&[10, 500, 129], 19);
        let seq = FastEfSequence::build(&ids, &pointers, 2).unwrap();
        let mut bytes = Vec::new();
        seq.save(&mut bytes).unwrap();
        let loaded = FastEfSequence::load(&mut bytes.as_slice()).unwrap();
        assert_eq!(loaded.len(), seq.len());
        for w in pointers.windows(2) {
            let r = PointerRange {
                begin: w[0],
                end: w[1],
            };
            for pos in r.begin..r.end {
                assert_eq!(loaded.find(r, ids[pos as usize]), Some(pos));
            }
        }
    }
}
