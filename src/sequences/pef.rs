//! Uniform-partition Elias-Fano sequence.
//!
//! The input is cut into partitions of 2^p values, each encoded as EF
//! relative to its own base and upper bound. An outer compact vector holds
//! the partition bounds and fixed-width endpoints locate each partition in
//! the inner bit stream. Queries are stateless: the partition holding a
//! position is re-derived per call from a handful of word reads.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bits;
use crate::vectors::{BitVector, BitVectorBuilder, BitsIterator, CompactVector, UnaryIterator};
use crate::{Error, Result};

use super::{
    read_delta, read_gamma, to_monotone, write_delta, write_gamma, GramSequence, MonotoneSequence,
    PointerRange,
};

#[derive(Debug, Default)]
pub struct UniformPefSequence {
    size: u64,
    universe: u64,
    partitions: u64,
    upper_bounds: CompactVector,
    data: BitVector,
    log_partition_size: u8,
    // derived at build/load time, not serialized
    meta: Meta,
}

#[derive(Debug, Default, Clone, Copy)]
struct Meta {
    // single-partition: payload location and bounds
    base: u64,
    upper: u64,
    payload_offset: u64,
    // multi-partition: endpoint directory
    endpoint_bits: u32,
    endpoints_offset: u64,
    sequences_offset: u64,
}

/// EF payload of one partition: `n * l` low bits followed by
/// `n + (u >> l) + 1` unary high bits.
#[derive(Debug, Clone, Copy)]
struct PartitionView {
    n: u64,
    l: u32,
    low_offset: u64,
    high_offset: u64,
}

impl PartitionView {
    fn parse(offset: u64, u: u64, n: u64) -> Self {
        let l = if n > 0 && u / n > 0 { bits::msb(u / n) } else { 0 };
        Self {
            n,
            l,
            low_offset: offset,
            high_offset: offset + n * u64::from(l),
        }
    }

    fn access(&self, data: &BitVector, i: u64) -> u64 {
        debug_assert!(i < self.n);
        let mut it = UnaryIterator::new(data, self.high_offset);
        it.skip(i);
        let high = it.position() - self.high_offset;
        let low = data.get_bits(self.low_offset + i * u64::from(self.l), self.l);
        ((high - i) << self.l) | low
    }

    /// First local index whose value is >= `x`, or `n` when none is.
    fn next_geq(&self, data: &BitVector, x: u64) -> u64 {
        let mut lo = 0u64;
        let mut hi = self.n;
        while lo < hi {
            let mid = (lo + hi) >> 1;
            if self.access(data, mid) >= x {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }
}

fn write_partition(bvb: &mut BitVectorBuilder, deltas: &[u64], u: u64) {
    let n = deltas.len() as u64;
    let l = if n > 0 && u / n > 0 { bits::msb(u / n) } else { 0 };
    let low_mask = if l > 0 { (1u64 << l) - 1 } else { 0 };
    for &v in deltas {
        bvb.append_bits(v & low_mask, l);
    }
    let high_len = n + (u >> l) + 1;
    let mut next = 0u64;
    for (i, &v) in deltas.iter().enumerate() {
        let pos = (v >> l) + i as u64;
        bvb.zero_extend(pos - next);
        bvb.append_bits(1, 1);
        next = pos + 1;
    }
    bvb.zero_extend(high_len - next);
}

impl UniformPefSequence {
    pub fn log_partition_size_for(order: u8) -> u8 {
        if order <= 2 {
            6
        } else {
            7
        }
    }

    /// Encode `values` (monotone, non-decreasing) with the given partition
    /// size exponent.
    pub fn with_log_partition_size(
        values: &[u64],
        universe: u64,
        log_partition_size: u8,
    ) -> Result<Self> {
        let n = values.len() as u64;
        if n == 0 {
            return Ok(Self::default());
        }
        for (i, w) in values.windows(2).enumerate() {
            if w[1] < w[0] {
                return Err(Error::MalformedInput {
                    order: 0,
                    msg: format!("sequence is not sorted at position {}: {} < {}", i + 1, w[1], w[0]),
                });
            }
        }

        let partition_size = 1u64 << log_partition_size;
        let partitions = (n + partition_size - 1) / partition_size;

        let mut bvb = BitVectorBuilder::default();
        let mut upper_bounds = CompactVector::default();

        if partitions == 1 {
            let base = values[0];
            let deltas: Vec<u64> = values.iter().map(|&v| v - base).collect();
            let universe_bits = bits::ceil_log2(universe);
            bvb.append_bits(base, universe_bits);
            if n > 1 {
                write_delta(&mut bvb, *deltas.last().unwrap());
            }
            write_partition(&mut bvb, &deltas, deltas.last().unwrap() + 1);
        } else {
            let mut sequences = BitVectorBuilder::default();
            let mut endpoints = Vec::with_capacity(partitions as usize);
            let mut bounds = Vec::with_capacity(partitions as usize + 1);

            let mut cur_base = values[0];
            bounds.push(cur_base);
            for chunk in values.chunks(partition_size as usize) {
                let deltas: Vec<u64> = chunk.iter().map(|&v| v - cur_base).collect();
                let upper = *chunk.last().unwrap();
                write_partition(&mut sequences, &deltas, deltas.last().unwrap() + 1);
                endpoints.push(sequences.size());
                bounds.push(upper);
                cur_base = upper;
            }

            upper_bounds = CompactVector::from_slice(&bounds);
            let endpoint_bits = bits::ceil_log2(sequences.size() + 1);
            write_gamma(&mut bvb, u64::from(endpoint_bits));
            for &e in endpoints.iter().take(partitions as usize - 1) {
                bvb.append_bits(e, endpoint_bits);
            }
            bvb.append(&sequences);
        }

        let mut seq = Self {
            size: n,
            universe,
            partitions,
            upper_bounds,
            data: bvb.build(),
            log_partition_size,
            meta: Meta::default(),
        };
        seq.derive_meta();
        Ok(seq)
    }

    pub fn write(values: &[u64], universe: u64, order: u8) -> Result<Self> {
        Self::with_log_partition_size(values, universe, Self::log_partition_size_for(order))
    }

    fn derive_meta(&mut self) {
        if self.size == 0 {
            return;
        }
        let mut it = BitsIterator::new(&self.data, 0);
        if self.partitions == 1 {
            let universe_bits = bits::ceil_log2(self.universe);
            let base = it.get_bits(universe_bits);
            let upper = if self.size > 1 { base + read_delta(&mut it) } else { base };
            self.meta = Meta {
                base,
                upper,
                payload_offset: it.position(),
                ..Meta::default()
            };
        } else {
            let endpoint_bits = read_gamma(&mut it) as u32;
            let endpoints_offset = it.position();
            let sequences_offset =
                endpoints_offset + u64::from(endpoint_bits) * (self.partitions - 1);
            self.meta = Meta {
                endpoint_bits,
                endpoints_offset,
                sequences_offset,
                ..Meta::default()
            };
        }
    }

    fn partition_base(&self, p: u64) -> u64 {
        if self.partitions == 1 {
            self.meta.base
        } else {
            self.upper_bounds.get(p)
        }
    }

    fn partition_upper(&self, p: u64) -> u64 {
        if self.partitions == 1 {
            self.meta.upper
        } else {
            self.upper_bounds.get(p + 1)
        }
    }

    fn partition_len(&self, p: u64) -> u64 {
        let begin = p << self.log_partition_size;
        (self.size - begin).min(1u64 << self.log_partition_size)
    }

    fn partition_view(&self, p: u64) -> PartitionView {
        let base = self.partition_base(p);
        let upper = self.partition_upper(p);
        let n = self.partition_len(p);
        let offset = if self.partitions == 1 {
            self.meta.payload_offset
        } else {
            let endpoint = if p == 0 {
                0
            } else {
                self.data.get_bits(
                    self.meta.endpoints_offset + (p - 1) * u64::from(self.meta.endpoint_bits),
                    self.meta.endpoint_bits,
                )
            };
            self.meta.sequences_offset + endpoint
        };
        PartitionView::parse(offset, upper - base + 1, n)
    }

    #[inline]
    pub fn get(&self, i: u64) -> u64 {
        debug_assert!(i < self.size);
        let p = i >> self.log_partition_size;
        let view = self.partition_view(p);
        self.partition_base(p) + view.access(&self.data, i - (p << self.log_partition_size))
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn universe(&self) -> u64 {
        self.universe
    }

    pub fn num_partitions(&self) -> u64 {
        self.partitions
    }

    /// First position in `[range.begin, range.end)` whose value is >= `x`,
    /// with its value. Values are absolute, not range offsets.
    pub fn next_geq(&self, range: PointerRange, x: u64) -> Option<(u64, u64)> {
        debug_assert!(range.end > range.begin);
        debug_assert!(range.end <= self.size);
        let lps = self.log_partition_size;
        let mut p = range.begin >> lps;
        let last_p = (range.end - 1) >> lps;

        if x > self.partition_upper(p) {
            if p == last_p || x > self.partition_upper(last_p) {
                return None;
            }
            let mut lo = p + 1;
            let mut hi = last_p;
            while lo < hi {
                let mid = (lo + hi) >> 1;
                if self.partition_upper(mid) >= x {
                    hi = mid;
                } else {
                    lo = mid + 1;
                }
            }
            p = lo;
        }

        let view = self.partition_view(p);
        let base = self.partition_base(p);
        let part_begin = p << lps;
        let local_begin = range.begin.saturating_sub(part_begin);
        let local = if x <= base {
            local_begin
        } else {
            view.next_geq(&self.data, x - base).max(local_begin)
        };
        if local >= view.n {
            return None;
        }
        let pos = part_begin + local;
        if pos >= range.end {
            return None;
        }
        let value = base + view.access(&self.data, local);
        debug_assert!(value >= x);
        Some((pos, value))
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LittleEndian>(self.size)?;
        w.write_u64::<LittleEndian>(self.universe)?;
        w.write_u64::<LittleEndian>(self.partitions)?;
        self.upper_bounds.save(w)?;
        self.data.save(w)?;
        w.write_u8(self.log_partition_size)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let size = r.read_u64::<LittleEndian>()?;
        let universe = r.read_u64::<LittleEndian>()?;
        let partitions = r.read_u64::<LittleEndian>()?;
        let upper_bounds = CompactVector::load(r)?;
        let data = BitVector::load(r)?;
        let log_partition_size = r.read_u8()?;
        let mut seq = Self {
            size,
            universe,
            partitions,
            upper_bounds,
            data,
            log_partition_size,
            meta: Meta::default(),
        };
        seq.derive_meta();
        Ok(seq)
    }
}

impl GramSequence for UniformPefSequence {
    fn build(ids: &[u64], pointers: &[u64], order: u8) -> Result<Self> {
        let values = to_monotone(ids, pointers);
        let universe = values.last().copied().unwrap_or(0);
        Self::write(&values, universe, order)
    }

    fn access(&self, i: u64) -> u64 {
        self.get(i)
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn find(&self, range: PointerRange, id: u64) -> Option<u64> {
        debug_assert!(range.end > range.begin);
        debug_assert!(range.end <= self.size);
        let prev_upper = if range.begin > 0 { self.get(range.begin - 1) } else { 0 };
        let target = id + prev_upper;
        match self.next_geq(range, target) {
            Some((pos, value)) if value == target => Some(pos),
            _ => None,
        }
    }

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        UniformPefSequence::save(self, w)
    }

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        UniformPefSequence::load(r)
    }
}

impl MonotoneSequence for UniformPefSequence {
    fn build_monotone(values: &[u64], universe: u64, order: u8) -> Result<Self> {
        Self::write(values, universe, order)
    }

    fn access(&self, i: u64) -> u64 {
        self.get(i)
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        UniformPefSequence::save(self, w)
    }

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        UniformPefSequence::load(r)
    }
}
