//! Forward trie over gram counts.

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bits;
use crate::config::BuildConfig;
use crate::mph::SingleValuedMpht;
use crate::reader::counts::CountSource;
use crate::reader::split_last_token;
use crate::sequences::{GramSequence, PointerSequence, RankSequence};
use crate::values::{DistinctCounts, DistinctCountsBuilder};
use crate::{Error, Result, MAX_ORDER};

use super::{mapper, SortedArray, ValueKind};

/// Count model: `lookup("a b c")` returns the stored count of the gram,
/// or `None` when the gram (or any of its tokens) is absent.
#[derive(Debug)]
pub struct TrieCountLm<G, R> {
    order: u8,
    remapping_order: u8,
    distinct_counts: DistinctCounts,
    vocab: SingleValuedMpht,
    arrays: Vec<SortedArray<G, R>>,
}

impl<G: GramSequence, R: RankSequence> TrieCountLm<G, R> {
    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn remapping_order(&self) -> u8 {
        self.remapping_order
    }

    /// Number of grams across all orders.
    pub fn len(&self) -> u64 {
        self.arrays.iter().map(|a| a.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, gram: &str) -> Option<u64> {
        let mut word_ids = [0u64; MAX_ORDER as usize];
        let o = mapper::map_query(
            gram,
            |token| self.vocab.lookup(token.as_bytes()),
            &self.arrays,
            self.remapping_order,
            &mut word_ids,
        )?;
        if o >= self.order as usize {
            return None;
        }

        let mut pos = word_ids[0];
        for i in 1..=o {
            let r = self.arrays[i - 1].range(pos);
            pos = self.arrays[i].position(r, word_ids[i])?;
        }
        let rank = self.arrays[o].rank(pos);
        Some(self.distinct_counts.access(o, rank))
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u8(self.order)?;
        w.write_u8(self.remapping_order)?;
        self.distinct_counts.save(w)?;
        self.vocab.save(w)?;
        for (i, array) in self.arrays.iter().enumerate() {
            array.save(w, i as u8 + 1, ValueKind::Count)?;
        }
        Ok(())
    }

    pub fn load<RD: Read>(r: &mut RD) -> std::io::Result<Self> {
        let order = r.read_u8()?;
        let remapping_order = r.read_u8()?;
        let distinct_counts = DistinctCounts::load(r, order as usize)?;
        let vocab = SingleValuedMpht::load(r)?;
        let mut arrays = Vec::with_capacity(order as usize);
        for i in 0..order {
            arrays.push(SortedArray::load(r, i + 1, ValueKind::Count)?);
        }
        Ok(Self {
            order,
            remapping_order,
            distinct_counts,
            vocab,
            arrays,
        })
    }
}

/// Builds a count trie from sorted count files, order by order.
pub struct TrieCountBuilder;

impl TrieCountBuilder {
    pub fn build<S, G, R>(source: &S, config: &BuildConfig) -> Result<TrieCountLm<G, R>>
    where
        S: CountSource,
        G: GramSequence,
        R: RankSequence,
    {
        config.validate()?;
        let order = config.order;
        let remapping_order = config.remapping_order;

        // distinct counts per order
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

        tracing::info!("building vocabulary");
        let mut reader = source.open(1)?;
        let n = reader.num_grams();
        let mut tokens = Vec::with_capacity(n as usize);
        let mut unigram_ranks = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let record = reader.next_record()?;
            unigram_ranks.push(counts_builder.rank(0, record.count)?);
            tokens.push(record.gram);
        }
        let ids: Vec<u64> = (0..n).collect();
        let vocab = SingleValuedMpht::build(&tokens, &ids, bits::ceil_log2(n + 1).max(1), 64)?;

        let mut arrays: Vec<SortedArray<G, R>> = Vec::with_capacity(order as usize);
        arrays.push(SortedArray::new(
            n,
            None,
            Some(R::build(&unigram_ranks, 1)?),
        ));

        for ord in 2..=order {
            tracing::info!(order = ord, "building grams");
            let mut cur = source.open(ord)?;
            let mut prv = source.open(ord - 1)?;
            let n_cur = cur.num_grams();
            let n_prv = prv.num_grams();

            let mut pointers: Vec<u64> = Vec::with_capacity(n_prv as usize + 1);
            pointers.push(0);
            let mut ids: Vec<u64> = Vec::with_capacity(n_cur as usize);
            let mut ranks: Vec<u64> = Vec::with_capacity(n_cur as usize);

            let mut prev_gram = prv.next_record()?.gram;
            let mut consumed_prv = 1u64;
            let mut pointer = 0u64;

            for _ in 0..n_cur {
                let record = cur.next_record()?;
                let (pattern, token) =
                    split_last_token(&record.gram).ok_or_else(|| Error::MalformedInput {
                        order: ord,
                        msg: format!("'{}' has fewer than {} tokens", record.gram, ord),
                    })?;

                // every skipped previous-order gram closes an empty range
                while prev_gram != pattern {
                    pointers.push(pointer);
                    if consumed_prv == n_prv {
                        return Err(Error::MalformedInput {
                            order: ord,
                            msg: format!(
                                "'{pattern}' should have been found among the {}-grams",
                                ord - 1
                            ),
                        });
                    }
                    prev_gram = prv.next_record()?.gram;
                    consumed_prv += 1;
                }
                pointer += 1;

                let token_id =
                    vocab.lookup(token.as_bytes()).ok_or_else(|| Error::MalformedInput {
                        order: ord,
                        msg: format!("token '{token}' is not in the vocabulary"),
                    })?;

                let stored_id = if remapping_order > 0 && ord > remapping_order + 1 {
                    let raw = Self::raw_ids(&record.gram, &vocab, ord)?;
                    mapper::remap_forward(
                        token_id,
                        &raw,
                        ord as usize - 1,
                        &arrays,
                        remapping_order,
                    )
                    .ok_or_else(|| Error::MalformedInput {
                        order: ord,
                        msg: format!(
                            "'{token}' should have been found among the children of '{pattern}'"
                        ),
                    })?
                } else {
                    token_id
                };

                ids.push(stored_id);
                ranks.push(counts_builder.rank(ord as usize - 1, record.count)?);
            }

            while pointers.len() < n_prv as usize + 1 {
                pointers.push(pointer);
            }
            debug_assert_eq!(*pointers.last().unwrap(), n_cur);

            tracing::info!(order = ord, "writing grams");
            let grams = G::build(&ids, &pointers, ord)?;
            let rank_seq = R::build(&ranks, ord)?;
            arrays.push(SortedArray::new(n_cur, Some(grams), Some(rank_seq)));

            let pointer_seq = PointerSequence::build(&pointers)?;
            arrays[ord as usize - 2].set_pointers(pointer_seq);
        }

        Ok(TrieCountLm {
            order,
            remapping_order,
            distinct_counts: counts_builder.build(),
            vocab,
            arrays,
        })
    }

    fn raw_ids(
        gram: &str,
        vocab: &SingleValuedMpht,
        order: u8,
    ) -> Result<[u64; MAX_ORDER as usize]> {
        let mut raw = [0u64; MAX_ORDER as usize];
        let mut k = 0usize;
        for token in gram.split_ascii_whitespace() {
            if k == MAX_ORDER as usize {
                return Err(Error::MalformedInput {
                    order,
                    msg: format!("'{gram}' has more than {MAX_ORDER} tokens"),
                });
            }
            raw[k] = vocab.lookup(token.as_bytes()).ok_or_else(|| Error::MalformedInput {
                order,
                msg: format!("token '{token}' is not in the vocabulary"),
            })?;
            k += 1;
        }
        Ok(raw)
    }
}
