//! Hash-table count model.

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bits;
use crate::config::BuildConfig;
use crate::mph::SingleValuedMpht;
use crate::reader::counts::CountSource;
use crate::values::{DistinctCounts, DistinctCountsBuilder};
use crate::Result;

/// One single-valued MPH table per order; a gram's order is read off its
/// whitespace count, the table maps it to a count rank.
#[derive(Debug)]
pub struct MphCountLm {
    order: u8,
    distinct_counts: DistinctCounts,
    tables: Vec<SingleValuedMpht>,
}

impl MphCountLm {
    pub fn build<S: CountSource>(source: &S, config: &BuildConfig) -> Result<Self> {
        config.validate()?;
        let order = config.order;
        let hash_bits = u32::from(config.hash_key_bytes) * 8;

        let mut counts_builder = DistinctCountsBuilder::new(order as usize);
        for ord in 1..=order {
            let mut reader = source.open(ord)?;
            tracing::info!(order = ord, grams = reader.num_grams(), "reading gram counts");
            let mut counts = Vec::with_capacity(reader.num_grams() as usize);
            for _ in 0..reader.num_grams() {
                counts.push(reader.next_record()?.count);
            }
            counts_builder.add_order(&counts);
        }

        let mut tables = Vec::with_capacity(order as usize);
        for ord in 1..=order {
            tracing::info!(order = ord, "building grams");
            let mut reader = source.open(ord)?;
            let n = reader.num_grams() as usize;
            let mut grams = Vec::with_capacity(n);
            let mut ranks = Vec::with_capacity(n);
            for _ in 0..n {
                let record = reader.next_record()?;
                ranks.push(counts_builder.rank(ord as usize - 1, record.count)?);
                grams.push(record.gram);
            }
            let max_rank = counts_builder.num_distinct(ord as usize - 1) as u64;
            tables.push(SingleValuedMpht::build(
                &grams,
                &ranks,
                bits::ceil_log2(max_rank + 1).max(1),
                hash_bits,
            )?);
        }

        Ok(Self {
            order,
            distinct_counts: counts_builder.build(),
            tables,
        })
    }

    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn hash_key_bytes(&self) -> u8 {
        (self.tables[0].hash_bits() / 8) as u8
    }

    pub fn len(&self) -> u64 {
        self.tables.iter().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, gram: &str) -> Option<u64> {
        let order_m1 = gram.split_ascii_whitespace().count().checked_sub(1)?;
        if order_m1 >= self.order as usize {
            return None;
        }
        let rank = self.tables[order_m1].lookup(gram.as_bytes())?;
        Some(self.distinct_counts.access(order_m1, rank))
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u8(self.order)?;
        self.distinct_counts.save(w)?;
        for t in &self.tables {
            t.save(w)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let order = r.read_u8()?;
        let distinct_counts = DistinctCounts::load(r, order as usize)?;
        let mut tables = Vec::with_capacity(order as usize);
        for _ in 0..order {
            tables.push(SingleValuedMpht::load(r)?);
        }
        Ok(Self {
            order,
            distinct_counts,
            tables,
        })
    }
}
