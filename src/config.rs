//! Build-time configuration.

use crate::{
    Error, Result, DEFAULT_BACKOFFS_QUANTIZATION_BITS, DEFAULT_PROBS_QUANTIZATION_BITS,
    DEFAULT_UNK_PROB, MAX_ORDER, MAX_REMAPPING_ORDER,
};

/// Index layout of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStructureType {
    /// One MPH table per order.
    Hash,
    /// Elias-Fano trie with sampled-tree search.
    EfTrie,
    /// Partitioned Elias-Fano trie.
    PefTrie,
}

/// What a model stores per gram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Count,
    ProbBackoff,
}

/// Codec for the count-rank sequences of count tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RanksType {
    /// Indexed codewords.
    IndexedCodewords,
    /// Prefix sums in an Elias-Fano sequence.
    PrefixSummedEf,
    /// Prefix sums in a partitioned Elias-Fano sequence.
    PrefixSummedPef,
}

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub order: u8,
    pub data_structure: DataStructureType,
    pub value_type: ValueType,
    pub remapping_order: u8,
    pub ranks_type: RanksType,
    pub probs_quantization_bits: u8,
    pub backoffs_quantization_bits: u8,
    pub unk_prob: f32,
    /// Verification-hash bytes per slot of hash models (4 or 8).
    pub hash_key_bytes: u8,
}

impl BuildConfig {
    pub fn new(order: u8, data_structure: DataStructureType, value_type: ValueType) -> Self {
        Self {
            order,
            data_structure,
            value_type,
            remapping_order: 0,
            ranks_type: RanksType::IndexedCodewords,
            probs_quantization_bits: DEFAULT_PROBS_QUANTIZATION_BITS,
            backoffs_quantization_bits: DEFAULT_BACKOFFS_QUANTIZATION_BITS,
            unk_prob: DEFAULT_UNK_PROB,
            hash_key_bytes: 8,
        }
    }

    /// Validate every field before any input is read or allocated.
    pub fn validate(&self) -> Result<()> {
        if self.order == 0 || self.order > MAX_ORDER {
            return Err(Error::InvalidOrder(u64::from(self.order)));
        }
        if self.remapping_order > MAX_REMAPPING_ORDER {
            return Err(Error::InvalidRemappingOrder(u64::from(self.remapping_order)));
        }
        if self.value_type == ValueType::ProbBackoff {
            for q in [self.probs_quantization_bits, self.backoffs_quantization_bits] {
                if !(2..=32).contains(&q) {
                    return Err(Error::InvalidQuantizationBits(q));
                }
            }
            if self.unk_prob >= 0.0 {
                return Err(Error::InvalidUnkProb(self.unk_prob));
            }
        }
        if self.data_structure == DataStructureType::Hash
            && self.hash_key_bytes != 4
            && self.hash_key_bytes != 8
        {
            return Err(Error::CorruptModel(format!(
                "hash key bytes must be 4 or 8, got {}",
                self.hash_key_bytes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bounds_are_enforced() {
        let mut c = BuildConfig::new(3, DataStructureType::EfTrie, ValueType::Count);
        c.validate().unwrap();

        c.order = 9;
        assert!(matches!(c.validate(), Err(Error::InvalidOrder(9))));
        c.order = 0;
        assert!(matches!(c.validate(), Err(Error::InvalidOrder(0))));
        c.order = 3;

        c.remapping_order = 3;
        assert!(matches!(c.validate(), Err(Error::InvalidRemappingOrder(3))));
        c.remapping_order = 2;
        c.validate().unwrap();

        let mut p = BuildConfig::new(2, DataStructureType::EfTrie, ValueType::ProbBackoff);
        p.probs_quantization_bits = 1;
        assert!(matches!(p.validate(), Err(Error::InvalidQuantizationBits(1))));
        p.probs_quantization_bits = 8;
        p.unk_prob = 0.5;
        assert!(matches!(p.validate(), Err(Error::InvalidUnkProb(_))));
    }
}
