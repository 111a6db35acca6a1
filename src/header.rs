//! Binary format header.
//!
//! Byte 0 names the model kind:
//!
//! ```text
//!                        2 bits          2 bits       1 bit     2 bits
//!                  ---------------------------------------------------------
//!   count trie     |   ranks_type | remapping_order | value | data_structure|
//!                  ---------------------------------------------------------
//!   prob trie      |              | remapping_order | value | data_structure|
//!                  ---------------------------------------------------------
//!   hash model     |              |  hash_key_bytes | value | data_structure|
//!                  ---------------------------------------------------------
//! ```
//!
//! Byte 1 is the format version; a mismatch rejects the file at load.

use crate::config::{BuildConfig, DataStructureType, RanksType, ValueType};
use crate::{Error, Result};

pub const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub data_structure: DataStructureType,
    pub value_type: ValueType,
    pub remapping_order: u8,
    pub ranks_type: RanksType,
    pub hash_key_bytes: u8,
}

impl FormatHeader {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            data_structure: config.data_structure,
            value_type: config.value_type,
            remapping_order: config.remapping_order,
            ranks_type: config.ranks_type,
            hash_key_bytes: config.hash_key_bytes,
        }
    }

    pub fn encode(&self) -> u8 {
        let mut header = match self.data_structure {
            DataStructureType::Hash => 0u8,
            DataStructureType::EfTrie => 1,
            DataStructureType::PefTrie => 2,
        };
        header |= match self.value_type {
            ValueType::Count => 0,
            ValueType::ProbBackoff => 1 << 2,
        };
        match self.data_structure {
            DataStructureType::Hash => {
                header |= (self.hash_key_bytes / 4 - 1) << 3;
            }
            _ => {
                header |= self.remapping_order << 3;
                if self.value_type == ValueType::Count {
                    header |= match self.ranks_type {
                        RanksType::IndexedCodewords => 0,
                        RanksType::PrefixSummedEf => 1 << 5,
                        RanksType::PrefixSummedPef => 2 << 5,
                    };
                }
            }
        }
        header
    }

    pub fn decode(byte: u8) -> Result<Self> {
        let data_structure = match byte & 3 {
            0 => DataStructureType::Hash,
            1 => DataStructureType::EfTrie,
            2 => DataStructureType::PefTrie,
            _ => {
                return Err(Error::CorruptModel(format!(
                    "unknown data structure tag in header byte {byte:#04x}"
                )))
            }
        };
        let value_type = if byte >> 2 & 1 == 1 {
            ValueType::ProbBackoff
        } else {
            ValueType::Count
        };

        let mut header = Self {
            data_structure,
            value_type,
            remapping_order: 0,
            ranks_type: RanksType::IndexedCodewords,
            hash_key_bytes: 8,
        };

        if data_structure == DataStructureType::Hash {
            header.hash_key_bytes = ((byte >> 3 & 1) + 1) * 4;
        } else {
            header.remapping_order = byte >> 3 & 3;
            if value_type == ValueType::Count {
                header.ranks_type = match byte >> 5 & 3 {
                    0 => RanksType::IndexedCodewords,
                    1 => RanksType::PrefixSummedEf,
                    2 => RanksType::PrefixSummedPef,
                    _ => {
                        return Err(Error::CorruptModel(format!(
                            "unknown ranks tag in header byte {byte:#04x}"
                        )))
                    }
                };
            }
        }
        Ok(header)
    }

    /// Human-readable model kind, e.g. `ef_rtrie_PSEF_ranks_count`.
    pub fn describe(&self) -> String {
        let mut name = match (self.data_structure, self.remapping_order) {
            (DataStructureType::Hash, _) => {
                format!("hash{}", u32::from(self.hash_key_bytes) * 8)
            }
            (DataStructureType::EfTrie, 0) => "ef_trie".into(),
            (DataStructureType::EfTrie, _) => "ef_rtrie".into(),
            (DataStructureType::PefTrie, 0) => "pef_trie".into(),
            (DataStructureType::PefTrie, _) => "pef_rtrie".into(),
        };
        if self.data_structure != DataStructureType::Hash
            && self.value_type == ValueType::Count
        {
            name.push_str(match self.ranks_type {
                RanksType::IndexedCodewords => "_IC_ranks",
                RanksType::PrefixSummedEf => "_PSEF_ranks",
                RanksType::PrefixSummedPef => "_PSPEF_ranks",
            });
        }
        name.push_str(match self.value_type {
            ValueType::Count => "_count",
            ValueType::ProbBackoff => "_prob",
        });
        name
    }
}
