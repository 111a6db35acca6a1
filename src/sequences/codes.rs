//! γ and δ codes for the partitioned sequence metadata.

use crate::bits;
use crate::vectors::{BitVectorBuilder, BitsIterator};

pub(crate) fn write_gamma(bvb: &mut BitVectorBuilder, n: u64) {
    let nn = n + 1;
    let l = bits::msb(nn);
    let hb = 1u64 << l;
    bvb.append_bits(hb, l + 1);
    bvb.append_bits(nn ^ hb, l);
}

pub(crate) fn read_gamma(it: &mut BitsIterator<'_>) -> u64 {
    let l = it.skip_zeros() as u32;
    (it.get_bits(l) | (1u64 << l)) - 1
}

pub(crate) fn write_delta(bvb: &mut BitVectorBuilder, n: u64) {
    let nn = n + 1;
    let l = bits::msb(nn);
    let hb = 1u64 << l;
    write_gamma(bvb, u64::from(l));
    bvb.append_bits(nn ^ hb, l);
}

pub(crate) fn read_delta(it: &mut BitsIterator<'_>) -> u64 {
    let l = read_gamma(it) as u32;
    (it.get_bits(l) | (1u64 << l)) - 1
}
