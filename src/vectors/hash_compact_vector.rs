//! Per-slot (verification hash, value) storage for MPH tables.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use super::{BitVector, BitVectorBuilder};

/// Packed slots of `hash_bits + value_bits` bits. The hash field rejects
/// non-keys after the perfect-hash lookup; see the MPH tables.
#[derive(Debug, Default, Clone)]
pub struct HashCompactVector {
    size: u64,
    hash_bits: u32,
    value_bits: u32,
    bits: BitVector,
}

pub struct HashCompactVectorBuilder {
    size: u64,
    hash_bits: u32,
    value_bits: u32,
    bits: BitVectorBuilder,
}

impl HashCompactVectorBuilder {
    pub fn new(n: u64, hash_bits: u32, value_bits: u32) -> Self {
        assert!(hash_bits == 32 || hash_bits == 64);
        assert!(value_bits > 0 && value_bits <= 64, "value width must be in (0, 64]");
        Self {
            size: n,
            hash_bits,
            value_bits,
            bits: BitVectorBuilder::with_size(n * u64::from(hash_bits + value_bits)),
        }
    }

    pub fn set(&mut self, i: u64, hash: u64, value: u64) {
        debug_assert!(i < self.size);
        let pos = i * u64::from(self.hash_bits + self.value_bits);
        self.bits.set_bits(pos, truncate(hash, self.hash_bits), self.hash_bits);
        self.bits.set_bits(pos + u64::from(self.hash_bits), value, self.value_bits);
    }

    pub fn build(self) -> HashCompactVector {
        HashCompactVector {
            size: self.size,
            hash_bits: self.hash_bits,
            value_bits: self.value_bits,
            bits: self.bits.build(),
        }
    }
}

#[inline]
fn truncate(hash: u64, hash_bits: u32) -> u64 {
    if hash_bits == 64 {
        hash
    } else {
        hash & ((1u64 << hash_bits) - 1)
    }
}

impl HashCompactVector {
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    /// Truncate a full mixed hash to the stored verification width.
    #[inline]
    pub fn verification_hash(&self, mixed: u64) -> u64 {
        truncate(mixed, self.hash_bits)
    }

    #[inline]
    pub fn get(&self, i: u64) -> (u64, u64) {
        debug_assert!(i < self.size);
        let pos = i * u64::from(self.hash_bits + self.value_bits);
        let hash = self.bits.get_bits(pos, self.hash_bits);
        let value = self.bits.get_bits(pos + u64::from(self.hash_bits), self.value_bits);
        (hash, value)
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LittleEndian>(self.size)?;
        w.write_u32::<LittleEndian>(self.hash_bits)?;
        w.write_u32::<LittleEndian>(self.value_bits)?;
        self.bits.save(w)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let size = r.read_u64::<LittleEndian>()?;
        let hash_bits = r.read_u32::<LittleEndian>()?;
        let value_bits = r.read_u32::<LittleEndian>()?;
        let bits = BitVector::load(r)?;
        Ok(Self {
            size,
            hash_bits,
            value_bits,
            bits,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slots_hold_hash_and_value() {
        let mut b = HashCompactVectorBuilder::new(10, 64, 17);
        b.set(0, 0xdead_beef_cafe_f00d, 1 << 16);
        b.set(9, u64::MAX, 0x1_ffff);
        b.set(5, 42, 0);
        let v = b.build();
        assert_eq!(v.get(0), (0xdead_beef_cafe_f00d, 1 << 16));
        assert_eq!(v.get(9), (u64::MAX, 0x1_ffff));
        assert_eq!(v.get(5), (42, 0));
        assert_eq!(v.get(3), (0, 0));
    }

    #[test]
    fn narrow_hash_truncates() {
        let mut b = HashCompactVectorBuilder::new(4, 32, 40);
        b.set(2, 0xaaaa_bbbb_cccc_dddd, 1u64 << 39);
        let v = b.build();
        assert_eq!(v.get(2), (0xcccc_dddd, 1u64 << 39));
        assert_eq!(v.verification_hash(0xaaaa_bbbb_cccc_dddd), 0xcccc_dddd);
    }

    #[test]
    fn roundtrip() {
        let mut b = HashCompactVectorBuilder::new(3, 64, 33);
        for i in 0..3 {
            b.set(i, i * 7 + 1, i << 30);
        }
        let v = b.build();
        let mut bytes = Vec::new();
        v.save(&mut bytes).unwrap();
        let loaded = HashCompactVector::load(&mut bytes.as_slice()).unwrap();
        for i in 0..3 {
            assert_eq!(loaded.get(i), v.get(i));
        }
    }
}
