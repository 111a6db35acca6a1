mod bit_vector;
mod compact_vector;
mod hash_compact_vector;
mod triplet_vector;

pub use bit_vector::{BitVector, BitVectorBuilder, BitsIterator, UnaryIterator};
pub use compact_vector::{CompactVector, CompactVectorBuilder};
pub use hash_compact_vector::{HashCompactVector, HashCompactVectorBuilder};
pub use triplet_vector::{TripletVector, TripletVectorBuilder};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub(crate) fn save_u64_slice<W: Write>(w: &mut W, data: &[u64]) -> std::io::Result<()> {
    w.write_u64::<LittleEndian>(data.len() as u64)?;
    for &v in data {
        w.write_u64::<LittleEndian>(v)?;
    }
    Ok(())
}

pub(crate) fn load_u64_vec<R: Read>(r: &mut R) -> std::io::Result<Vec<u64>> {
    let len = r.read_u64::<LittleEndian>()? as usize;
    let mut data = Vec::with_capacity(len);
    for _ in 0..len {
        data.push(r.read_u64::<LittleEndian>()?);
    }
    Ok(data)
}
