//! Value tables: distinct counts for count models, averaged quantization
//! bins for probability models.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::vectors::CompactVector;
use crate::{Error, Result};

/// Per-order distinct raw counts, ranked by descending frequency so that
/// common counts get small ranks.
#[derive(Debug, Default)]
pub struct DistinctCounts {
    sequences: Vec<CompactVector>,
}

#[derive(Debug, Default)]
pub struct DistinctCountsBuilder {
    sequences: Vec<CompactVector>,
    // per order: (value, rank) sorted by value for binary search
    by_value: Vec<Vec<(u64, u64)>>,
}

impl DistinctCountsBuilder {
    pub fn new(orders: usize) -> Self {
        Self {
            sequences: Vec::with_capacity(orders),
            by_value: Vec::with_capacity(orders),
        }
    }

    /// Digest the counts of the next order.
    pub fn add_order(&mut self, counts: &[u64]) {
        let mut freq: std::collections::HashMap<u64, u64> = std::collections::HashMap::new();
        for &c in counts {
            *freq.entry(c).or_insert(0) += 1;
        }

        let mut pairs: Vec<(u64, u64)> = freq.into_iter().collect();
        // most frequent counts first
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let distinct: Vec<u64> = pairs.iter().map(|&(v, _)| v).collect();
        for (rank, p) in pairs.iter_mut().enumerate() {
            p.1 = rank as u64;
        }
        pairs.sort_by_key(|&(v, _)| v);

        self.sequences.push(CompactVector::from_slice(&distinct));
        self.by_value.push(pairs);
    }

    /// Rank of a raw count within its order.
    pub fn rank(&self, order_m1: usize, value: u64) -> Result<u64> {
        let pairs = &self.by_value[order_m1];
        pairs
            .binary_search_by_key(&value, |&(v, _)| v)
            .map(|i| pairs[i].1)
            .map_err(|_| Error::ValueNotFound(value))
    }

    pub fn num_distinct(&self, order_m1: usize) -> usize {
        self.sequences[order_m1].len() as usize
    }

    pub fn build(self) -> DistinctCounts {
        DistinctCounts {
            sequences: self.sequences,
        }
    }
}

impl DistinctCounts {
    #[inline]
    pub fn access(&self, order_m1: usize, rank: u64) -> u64 {
        self.sequences[order_m1].get(rank)
    }

    pub fn num_distinct(&self, order_m1: usize) -> usize {
        self.sequences[order_m1].len() as usize
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        for s in &self.sequences {
            s.save(w)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(r: &mut R, orders: usize) -> std::io::Result<Self> {
        let mut sequences = Vec::with_capacity(orders);
        for _ in 0..orders {
            sequences.push(CompactVector::load(r)?);
        }
        Ok(Self { sequences })
    }
}

/// Per-order fixed-size bin tables of averaged log10 values; a rank
/// indexes its bin center.
#[derive(Debug, Default)]
pub struct QuantizedValues {
    quantization_bits: Vec<u8>,
    sequences: Vec<Vec<f32>>,
}

#[derive(Debug, Default)]
pub struct QuantizedValuesBuilder {
    quantization_bits: Vec<u8>,
    sequences: Vec<Vec<f32>>,
}

fn check_quantization_bits(q: u8) -> Result<()> {
    if !(2..=32).contains(&q) {
        return Err(Error::InvalidQuantizationBits(q));
    }
    Ok(())
}

fn make_bins(sorted: &[f32], averages: &mut Vec<f32>, num_bins: u64) {
    let mut start = 0usize;
    for i in 0..num_bins {
        let finish = (sorted.len() as u64 * (i + 1) / num_bins) as usize;
        if finish == start {
            let filler = if i > 0 {
                *averages.last().unwrap()
            } else {
                f32::NEG_INFINITY
            };
            averages.push(filler);
        } else {
            let sum: f64 = sorted[start..finish].iter().map(|&v| f64::from(v)).sum();
            averages.push((sum / (finish - start) as f64) as f32);
        }
        start = finish;
    }
}

impl QuantizedValuesBuilder {
    pub fn new(orders: usize) -> Self {
        Self {
            quantization_bits: Vec::with_capacity(orders),
            sequences: Vec::with_capacity(orders),
        }
    }

    /// Quantize the probabilities of the next order into 2^q averaged bins.
    /// Orders with fewer values than bins pad the leading bins with
    /// never-ranked fillers.
    pub fn add_probs(&mut self, mut values: Vec<f32>, q: u8) -> Result<()> {
        check_quantization_bits(q)?;
        values.sort_by(f32::total_cmp);
        let num_bins = 1u64 << q;
        let mut averages = Vec::with_capacity(num_bins as usize);
        make_bins(&values, &mut averages, num_bins);
        debug_assert_eq!(averages.len() as u64, num_bins);
        self.quantization_bits.push(q);
        self.sequences.push(averages);
        Ok(())
    }

    /// Like [`add_probs`](Self::add_probs) but bin 0 is pinned to the exact
    /// back-off weight 0.0; `values` holds the non-zero back-offs only.
    pub fn add_backoffs(&mut self, mut values: Vec<f32>, q: u8) -> Result<()> {
        check_quantization_bits(q)?;
        values.sort_by(f32::total_cmp);
        let num_bins = 1u64 << q;
        let mut averages = Vec::with_capacity(num_bins as usize);
        averages.push(0.0);
        make_bins(&values, &mut averages, num_bins - 1);
        debug_assert_eq!(averages.len() as u64, num_bins);
        self.quantization_bits.push(q);
        self.sequences.push(averages);
        Ok(())
    }

    /// Rank of `value`: the nearest bin center. `reserved` is 1 for
    /// back-off tables, whose bin 0 holds the exact 0.0.
    pub fn rank(&self, order_m1: usize, value: f32, reserved: usize) -> u64 {
        if reserved == 1 && value == 0.0 {
            return 0;
        }
        let data = &self.sequences[order_m1];
        let tail = &data[reserved..];
        let above = tail.partition_point(|&x| x < value);
        if above == 0 {
            return reserved as u64;
        }
        if above == tail.len() {
            return data.len() as u64 - 1;
        }
        let above_idx = reserved + above;
        let closer_to_prev = value - data[above_idx - 1] < data[above_idx] - value;
        above_idx as u64 - u64::from(closer_to_prev)
    }

    pub fn quantization_bits(&self, order_m1: usize) -> u8 {
        self.quantization_bits[order_m1]
    }

    pub fn build(self) -> QuantizedValues {
        QuantizedValues {
            quantization_bits: self.quantization_bits,
            sequences: self.sequences,
        }
    }
}

impl QuantizedValues {
    #[inline]
    pub fn access(&self, order_m1: usize, i: u64) -> f32 {
        self.sequences[order_m1][i as usize]
    }

    pub fn quantization_bits(&self, order_m1: usize) -> u8 {
        self.quantization_bits[order_m1]
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        for &q in &self.quantization_bits {
            w.write_u8(q)?;
        }
        for s in &self.sequences {
            w.write_u64::<LittleEndian>(s.len() as u64)?;
            for &v in s {
                w.write_f32::<LittleEndian>(v)?;
            }
        }
        Ok(())
    }

    pub fn load<R: Read>(r: &mut R, orders: usize) -> std::io::Result<Self> {
        let mut quantization_bits = Vec::with_capacity(orders);
        for _ in 0..orders {
            quantization_bits.push(r.read_u8()?);
        }
        let mut sequences = Vec::with_capacity(orders);
        for _ in 0..orders {
            let n = r.read_u64::<LittleEndian>()? as usize;
            let mut s = Vec::with_capacity(n);
            for _ in 0..n {
                s.push(r.read_f32::<LittleEndian>()?);
            }
            sequences.push(s);
        }
        Ok(Self {
            quantization_bits,
            sequences,
        })
    }
}
