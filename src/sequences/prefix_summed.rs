//! Stores a small-valued sequence as the cumulative sums of its elements
//! inside a monotone codec; elements come back as successive differences.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::Result;

use super::{MonotoneSequence, RankSequence};

#[derive(Debug, Default)]
pub struct PrefixSummedSequence<S> {
    size: u64,
    sequence: S,
}

impl<S: MonotoneSequence> RankSequence for PrefixSummedSequence<S> {
    fn build(values: &[u64], order: u8) -> Result<Self> {
        let mut sums = Vec::with_capacity(values.len());
        let mut last = 0u64;
        for &v in values {
            last += v;
            sums.push(last);
        }
        let universe = sums.last().copied().unwrap_or(0);
        Ok(Self {
            size: values.len() as u64,
            sequence: S::build_monotone(&sums, universe, order)?,
        })
    }

    fn access(&self, i: u64) -> u64 {
        let cur = self.sequence.access(i);
        if i == 0 {
            cur
        } else {
            cur - self.sequence.access(i - 1)
        }
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LittleEndian>(self.size)?;
        self.sequence.save(w)
    }

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let size = r.read_u64::<LittleEndian>()?;
        let sequence = S::load(r)?;
        Ok(Self { size, sequence })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sequences::{EfSequence, UniformPefSequence};

    #[test]
    fn differences_recover_elements() {
        let values = [5u64, 0, 0, 3, 1, 7, 0, 2, 40, 1];
        let seq = <PrefixSummedSequence<EfSequence> as RankSequence>::build(&values, 2).unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(seq.access(i as u64), v);
        }
    }

    #[test]
    fn over_partitioned_codec() {
        let values: Vec<u64> = (0..500).map(|i| (i * 13) % 37).collect();
        let seq =
            <PrefixSummedSequence<UniformPefSequence> as RankSequence>::build(&values, 3).unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(seq.access(i as u64), v);
        }
    }

    #[test]
    fn roundtrip() {
        let values = [1u64, 1, 1, 2, 0, 9];
        let seq = <PrefixSummedSequence<EfSequence> as RankSequence>::build(&values, 2).unwrap();
        let mut bytes = Vec::new();
        seq.save(&mut bytes).unwrap();
        let loaded =
            <PrefixSummedSequence<EfSequence> as RankSequence>::load(&mut bytes.as_slice()).unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(loaded.access(i as u64), v);
        }
    }
}
