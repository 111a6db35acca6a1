//! MPH-backed lookup tables.
//!
//! A perfect hash function alone is undefined on non-keys; every slot
//! therefore stores a mixed verification hash next to its values, turning
//! the function into a safe map over arbitrary inputs.

use std::io::{Read, Write};

use crate::vectors::{
    CompactVector, CompactVectorBuilder, HashCompactVector, HashCompactVectorBuilder,
    TripletVector, TripletVectorBuilder,
};
use crate::{bits, Result};

use super::Mphf;

/// One value per key, guarded by a verification hash of 4 or 8 bytes.
#[derive(Debug, Default)]
pub struct SingleValuedMpht {
    h: Mphf,
    data: HashCompactVector,
}

impl SingleValuedMpht {
    pub fn build<K: AsRef<[u8]>>(
        keys: &[K],
        values: &[u64],
        value_bits: u32,
        hash_bits: u32,
    ) -> Result<Self> {
        assert_eq!(keys.len(), values.len());
        let h = Mphf::build(keys)?;
        let mut data = HashCompactVectorBuilder::new(keys.len() as u64, hash_bits, value_bits);
        for (key, &value) in keys.iter().zip(values) {
            let hashes = h.hashes(key.as_ref());
            data.set(h.lookup(hashes), h.mix(hashes), value);
        }
        Ok(Self {
            h,
            data: data.build(),
        })
    }

    /// The stored value, or `None` when `key` was not in the build set.
    #[inline]
    pub fn lookup(&self, key: &[u8]) -> Option<u64> {
        let hashes = self.h.hashes(key);
        let (stored, value) = self.data.get(self.h.lookup(hashes));
        (stored == self.data.verification_hash(self.h.mix(hashes))).then_some(value)
    }

    pub fn len(&self) -> u64 {
        self.h.len()
    }

    pub fn is_empty(&self) -> bool {
        self.h.is_empty()
    }

    pub fn hash_bits(&self) -> u32 {
        self.data.hash_bits()
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        self.h.save(w)?;
        self.data.save(w)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let h = Mphf::load(r)?;
        let data = HashCompactVector::load(r)?;
        Ok(Self { h, data })
    }
}

/// Two values per key packed bit-exactly next to a 64-bit verification
/// hash; carries the prob-trie vocabulary (token id + packed unigram
/// values).
#[derive(Debug, Default)]
pub struct DoubleValuedMpht {
    h: Mphf,
    data: TripletVector,
}

impl DoubleValuedMpht {
    pub fn build<K: AsRef<[u8]>>(
        keys: &[K],
        values1: &[u64],
        values2: &[u64],
        value1_bits: u32,
        value2_bits: u32,
    ) -> Result<Self> {
        assert_eq!(keys.len(), values1.len());
        assert_eq!(keys.len(), values2.len());
        let h = Mphf::build(keys)?;
        let mut data = TripletVectorBuilder::new(keys.len() as u64, 64, value1_bits, value2_bits);
        for (i, key) in keys.iter().enumerate() {
            let hashes = h.hashes(key.as_ref());
            data.set(h.lookup(hashes), (h.mix(hashes), values1[i], values2[i]));
        }
        Ok(Self {
            h,
            data: data.build(),
        })
    }

    #[inline]
    pub fn lookup_pair(&self, key: &[u8]) -> Option<(u64, u64)> {
        let hashes = self.h.hashes(key);
        let (stored, v1, v2) = self.data.get(self.h.lookup(hashes));
        (stored == self.h.mix(hashes)).then_some((v1, v2))
    }

    #[inline]
    pub fn lookup(&self, key: &[u8]) -> Option<u64> {
        self.lookup_pair(key).map(|(v1, _)| v1)
    }

    pub fn len(&self) -> u64 {
        self.h.len()
    }

    pub fn is_empty(&self) -> bool {
        self.h.is_empty()
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        self.h.save(w)?;
        self.data.save(w)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let h = Mphf::load(r)?;
        let data = TripletVector::load(r)?;
        Ok(Self { h, data })
    }
}

/// Unverified u64 -> u64 map for internal keys that are always present
/// (the sampled-tree offsets of the fast Elias-Fano sequence).
#[derive(Debug, Default)]
pub struct UintMpht {
    h: Mphf,
    values: CompactVector,
}

impl UintMpht {
    pub fn build(from: &[u64], to: &[u64]) -> Result<Self> {
        assert_eq!(from.len(), to.len());
        let keys: Vec<[u8; 8]> = from.iter().map(|&x| x.to_le_bytes()).collect();
        let h = Mphf::build(&keys)?;
        let max = to.iter().copied().max().unwrap_or(0);
        let mut values = CompactVectorBuilder::new(to.len() as u64, bits::ceil_log2(max + 1));
        for (key, &t) in keys.iter().zip(to) {
            values.set(h.lookup(h.hashes(key)), t);
        }
        Ok(Self {
            h,
            values: values.build(),
        })
    }

    #[inline]
    pub fn lookup(&self, x: u64) -> u64 {
        self.values.get(self.h.lookup(self.h.hashes(&x.to_le_bytes())))
    }

    pub fn len(&self) -> u64 {
        self.h.len()
    }

    pub fn is_empty(&self) -> bool {
        self.h.is_empty()
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        self.h.save(w)?;
        self.values.save(w)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let h = Mphf::load(r)?;
        let values = CompactVector::load(r)?;
        Ok(Self { h, values })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_valued_accepts_keys_rejects_others() {
        let keys: Vec<String> = (0..300).map(|i| format!("w{i}")).collect();
        let values: Vec<u64> = (0..300).map(|i| i * 3).collect();
        let t = SingleValuedMpht::build(&keys, &values, 12, 64).unwrap();
        for (k, &v) in keys.iter().zip(&values) {
            assert_eq!(t.lookup(k.as_bytes()), Some(v));
        }
        assert_eq!(t.lookup(b"absent"), None);
        assert_eq!(t.lookup(b""), None);
    }

    #[test]
    fn double_valued_pairs() {
        let keys = ["alpha", "beta", "gamma"];
        let t = DoubleValuedMpht::build(&keys, &[0, 1, 2], &[100, 200, 300], 2, 9).unwrap();
        assert_eq!(t.lookup_pair(b"alpha"), Some((0, 100)));
        assert_eq!(t.lookup_pair(b"gamma"), Some((2, 300)));
        assert_eq!(t.lookup_pair(b"delta"), None);
        assert_eq!(t.lookup(b"beta"), Some(1));
    }

    #[test]
    fn uint_table() {
        let from = [0u64, 128, 999, 1 << 33];
        let to = [0u64, 7, 14, 21];
        let t = UintMpht::build(&from, &to).unwrap();
        for (&f, &v) in from.iter().zip(&to) {
            assert_eq!(t.lookup(f), v);
        }
    }

    #[test]
    fn roundtrip() {
        let keys: Vec<String> = (0..50).map(|i| format!("k{i}")).collect();
        let values: Vec<u64> = (0..50).collect();
        let t = SingleValuedMpht::build(&keys, &values, 6, 32).unwrap();
        let mut bytes = Vec::new();
        t.save(&mut bytes).unwrap();
        let loaded = SingleValuedMpht::load(&mut bytes.as_slice()).unwrap();
        for (k, &v) in keys.iter().zip(&values) {
            assert_eq!(loaded.lookup(k.as_bytes()), Some(v));
        }
        assert_eq!(loaded.lookup(b"zzz"), None);
    }
}
