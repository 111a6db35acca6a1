//! Bit-exact (hash, value1, value2) triplet storage for double-valued
//! MPH tables.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use super::{BitVector, BitVectorBuilder};

#[derive(Debug, Default, Clone)]
pub struct TripletVector {
    size: u64,
    widths: [u32; 3],
    bits: BitVector,
}

pub struct TripletVectorBuilder {
    size: u64,
    widths: [u32; 3],
    bits: BitVectorBuilder,
}

impl TripletVectorBuilder {
    pub fn new(n: u64, w1: u32, w2: u32, w3: u32) -> Self {
        let widths = [widen(w1), widen(w2), widen(w3)];
        for w in widths {
            assert!(w <= 64, "field width must be <= 64, got {w}");
        }
        let slot: u32 = widths.iter().sum();
        Self {
            size: n,
            widths,
            bits: BitVectorBuilder::with_size(n * u64::from(slot)),
        }
    }

    pub fn set(&mut self, i: u64, triplet: (u64, u64, u64)) {
        debug_assert!(i < self.size);
        let slot: u32 = self.widths.iter().sum();
        let mut pos = i * u64::from(slot);
        self.bits.set_bits(pos, triplet.0, self.widths[0]);
        pos += u64::from(self.widths[0]);
        self.bits.set_bits(pos, triplet.1, self.widths[1]);
        pos += u64::from(self.widths[1]);
        self.bits.set_bits(pos, triplet.2, self.widths[2]);
    }

    pub fn build(self) -> TripletVector {
        TripletVector {
            size: self.size,
            widths: self.widths,
            bits: self.bits.build(),
        }
    }
}

#[inline]
fn widen(w: u32) -> u32 {
    if w == 0 {
        1
    } else {
        w
    }
}

impl TripletVector {
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn get(&self, i: u64) -> (u64, u64, u64) {
        debug_assert!(i < self.size);
        let slot: u32 = self.widths.iter().sum();
        let mut pos = i * u64::from(slot);
        let a = self.bits.get_bits(pos, self.widths[0]);
        pos += u64::from(self.widths[0]);
        let b = self.bits.get_bits(pos, self.widths[1]);
        pos += u64::from(self.widths[1]);
        let c = self.bits.get_bits(pos, self.widths[2]);
        (a, b, c)
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LittleEndian>(self.size)?;
        for width in self.widths {
            w.write_u32::<LittleEndian>(width)?;
        }
        self.bits.save(w)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let size = r.read_u64::<LittleEndian>()?;
        let mut widths = [0u32; 3];
        for width in &mut widths {
            *width = r.read_u32::<LittleEndian>()?;
        }
        let bits = BitVector::load(r)?;
        Ok(Self { size, widths, bits })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn triplets_roundtrip_in_memory() {
        let mut b = TripletVectorBuilder::new(5, 64, 20, 64);
        b.set(0, (u64::MAX, 0xf_ffff, 7));
        b.set(4, (1, 0, u64::MAX));
        let v = b.build();
        assert_eq!(v.get(0), (u64::MAX, 0xf_ffff, 7));
        assert_eq!(v.get(4), (1, 0, u64::MAX));
        assert_eq!(v.get(2), (0, 0, 0));
    }

    #[test]
    fn roundtrip() {
        let mut b = TripletVectorBuilder::new(2, 32, 10, 33);
        b.set(0, (0xffff_ffff, 1023, 1u64 << 32));
        b.set(1, (5, 1, 2));
        let v = b.build();
        let mut bytes = Vec::new();
        v.save(&mut bytes).unwrap();
        let loaded = TripletVector::load(&mut bytes.as_slice()).unwrap();
        assert_eq!(loaded.get(0), v.get(0));
        assert_eq!(loaded.get(1), v.get(1));
    }
}
