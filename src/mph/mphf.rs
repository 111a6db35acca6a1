//! Minimal perfect hashing by 3-hypergraph peeling.
//!
//! Each key spans a hyperedge over three disjoint node thirds. A random
//! hypergraph of 1.23n nodes peels with high probability: repeatedly remove
//! a node of degree one together with its edge. Assigning 2-bit node values
//! in reverse peeling order makes `(g0 + g1 + g2) mod 3` select each key's
//! own peeled node, and ranking assigned nodes yields a bijection to
//! `[0, n)`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::vectors::{load_u64_vec, save_u64_slice};
use crate::{Error, Result};

use super::Jenkins64;

const SPACE_FACTOR: f64 = 1.23;
const MAX_TRIALS: usize = 64;
const SEED_STATE: u64 = 37;

#[derive(Debug, Default)]
pub struct Mphf {
    n: u64,
    hash_domain: u64,
    hasher: Jenkins64,
    values: RankedPairVector,
}

impl Mphf {
    /// Build over `n` distinct byte strings. Retries with fresh seeds when
    /// the hypergraph does not peel; past the cap the build fails.
    pub fn build<K: AsRef<[u8]>>(keys: &[K]) -> Result<Self> {
        let n = keys.len() as u64;
        let hash_domain = ((n as f64 * SPACE_FACTOR).ceil() as u64 + 2) / 3;
        let hash_domain = hash_domain.max(1);
        let nodes = (hash_domain * 3) as usize;

        let mut seed_state = SEED_STATE;
        for trial in 0..MAX_TRIALS {
            let hasher = Jenkins64::new(splitmix64(&mut seed_state));
            tracing::debug!(trial, "hypergraph generation");

            let edges: Vec<[u64; 3]> = keys
                .iter()
                .map(|k| edge_of(hasher.hash(k.as_ref()), hash_domain))
                .collect();

            if let Some(peel_order) = peel(&edges, nodes) {
                let mut values = vec![0u8; nodes];
                for &(edge_idx, peeled) in peel_order.iter().rev() {
                    let edge = &edges[edge_idx];
                    let target = edge.iter().position(|&v| v == peeled).unwrap() as u8;
                    let assigned: u8 =
                        edge.iter().map(|&v| values[v as usize] % 3).sum::<u8>()
                            - values[peeled as usize] % 3;
                    let g = (target + 9 - assigned) % 3;
                    // zero marks unassigned nodes, so an assigned zero is stored as 3
                    values[peeled as usize] = if g == 0 { 3 } else { g };
                }
                return Ok(Self {
                    n,
                    hash_domain,
                    hasher,
                    values: RankedPairVector::new(&values),
                });
            }
        }
        Err(Error::MphBuildFailure(MAX_TRIALS))
    }

    pub fn len(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn hashes(&self, key: &[u8]) -> (u64, u64, u64) {
        self.hasher.hash(key)
    }

    /// Slot of a key given its hash triple. Any triple maps to some slot;
    /// only the stored verification hash tells keys from non-keys.
    #[inline]
    pub fn lookup(&self, hashes: (u64, u64, u64)) -> u64 {
        let nodes = [
            hashes.0 % self.hash_domain,
            self.hash_domain + hashes.1 % self.hash_domain,
            2 * self.hash_domain + hashes.2 % self.hash_domain,
        ];
        let hidx = (self.values.value(nodes[0])
            + self.values.value(nodes[1])
            + self.values.value(nodes[2]))
            % 3;
        self.values.rank(nodes[hidx as usize])
    }

    /// Mix a hash triple into the per-slot verification hash.
    #[inline]
    pub fn mix(&self, hashes: (u64, u64, u64)) -> u64 {
        let mut hash = 17u64;
        hash = hash.wrapping_mul(31).wrapping_add(hashes.0);
        hash = hash.wrapping_mul(31).wrapping_add(hashes.1);
        hash.wrapping_mul(31).wrapping_add(hashes.2)
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LittleEndian>(self.n)?;
        w.write_u64::<LittleEndian>(self.hash_domain)?;
        w.write_u64::<LittleEndian>(self.hasher.seed())?;
        self.values.save(w)
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let n = r.read_u64::<LittleEndian>()?;
        let hash_domain = r.read_u64::<LittleEndian>()?;
        let hasher = Jenkins64::new(r.read_u64::<LittleEndian>()?);
        let values = RankedPairVector::load(r)?;
        Ok(Self {
            n,
            hash_domain,
            hasher,
            values,
        })
    }
}

#[inline]
fn edge_of(hashes: (u64, u64, u64), hash_domain: u64) -> [u64; 3] {
    [
        hashes.0 % hash_domain,
        hash_domain + hashes.1 % hash_domain,
        2 * hash_domain + hashes.2 % hash_domain,
    ]
}

/// Peel the hypergraph; returns `(edge index, peeled node)` in peel order,
/// or `None` when a 2-core remains (duplicate keys or an unlucky seed).
fn peel(edges: &[[u64; 3]], nodes: usize) -> Option<Vec<(usize, u64)>> {
    let mut degree = vec![0u32; nodes];
    let mut edge_xor = vec![0usize; nodes];
    for (e, edge) in edges.iter().enumerate() {
        for &v in edge {
            degree[v as usize] += 1;
            edge_xor[v as usize] ^= e;
        }
    }

    let mut queue: Vec<u64> = (0..nodes as u64).filter(|&v| degree[v as usize] == 1).collect();
    let mut order = Vec::with_capacity(edges.len());

    while let Some(v) = queue.pop() {
        if degree[v as usize] != 1 {
            continue;
        }
        let e = edge_xor[v as usize];
        order.push((e, v));
        for &u in &edges[e] {
            degree[u as usize] -= 1;
            edge_xor[u as usize] ^= e;
            if degree[u as usize] == 1 {
                queue.push(u);
            }
        }
    }

    (order.len() == edges.len()).then_some(order)
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// 2-bit values per node with ranking over the non-zero ones.
#[derive(Debug, Default)]
struct RankedPairVector {
    n_pairs: u64,
    words: Vec<u64>,
    // non-zero pairs before each word
    block_ranks: Vec<u64>,
}

const PAIR_LOW_MASK: u64 = 0x5555_5555_5555_5555;

impl RankedPairVector {
    fn new(values: &[u8]) -> Self {
        let n_pairs = values.len() as u64;
        let mut words = vec![0u64; (values.len() + 31) / 32];
        for (i, &v) in values.iter().enumerate() {
            debug_assert!(v <= 3);
            words[i / 32] |= u64::from(v) << (2 * (i % 32));
        }
        let mut block_ranks = Vec::with_capacity(words.len());
        let mut total = 0u64;
        for &w in &words {
            block_ranks.push(total);
            total += nonzero_pairs(w);
        }
        Self {
            n_pairs,
            words,
            block_ranks,
        }
    }

    #[inline]
    fn value(&self, i: u64) -> u8 {
        debug_assert!(i < self.n_pairs);
        ((self.words[(i / 32) as usize] >> (2 * (i % 32))) & 3) as u8 % 3
    }

    /// Number of assigned (non-zero) pairs before position `i`.
    #[inline]
    fn rank(&self, i: u64) -> u64 {
        let block = (i / 32) as usize;
        let offset = (i % 32) as u32;
        let mask = if offset == 0 { 0 } else { (1u64 << (2 * offset)) - 1 };
        self.block_ranks[block] + nonzero_pairs(self.words[block] & mask)
    }

    fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LittleEndian>(self.n_pairs)?;
        save_u64_slice(w, &self.words)
    }

    fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let n_pairs = r.read_u64::<LittleEndian>()?;
        let words = load_u64_vec(r)?;
        let mut block_ranks = Vec::with_capacity(words.len());
        let mut total = 0u64;
        for &w in &words {
            block_ranks.push(total);
            total += nonzero_pairs(w);
        }
        Ok(Self {
            n_pairs,
            words,
            block_ranks,
        })
    }
}

#[inline]
fn nonzero_pairs(w: u64) -> u64 {
    u64::from(((w | (w >> 1)) & PAIR_LOW_MASK).count_ones())
}
