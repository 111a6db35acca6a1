//! Reversed trie over quantized probabilities and back-off weights.
//!
//! Grams are indexed right to left so that scoring can extend a word's
//! history one context token at a time. Unigram values stay unquantized,
//! packed into the vocabulary slots; higher orders store interleaved
//! prob|back-off quantization ranks.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bits::{self, pack_prob_backoff, unpack_prob_backoff};
use crate::config::BuildConfig;
use crate::mph::DoubleValuedMpht;
use crate::reader::arpa::ArpaSections;
use crate::reader::split_first_token;
use crate::sequences::{GramSequence, PointerRange, PointerSequence, RankSequence};
use crate::state::ScoreState;
use crate::values::{QuantizedValues, QuantizedValuesBuilder};
use crate::vectors::CompactVector;
use crate::{Error, Result, DEFAULT_UNK_PROB, MAX_ORDER};

use super::{mapper, SortedArray, ValueKind};

const UNK: &str = "<unk>";
// word-buffer sentinel for out-of-vocabulary words; never dereferenced
// because the match length is reset to zero first
const OOV_WORD: u64 = u64::MAX;

/// Probability model: `score` walks the reversed trie and composes
/// Katz-style back-off weights across calls through a [`ScoreState`].
#[derive(Debug)]
pub struct TrieProbLm<G> {
    order: u8,
    remapping_order: u8,
    unk_prob: f32,
    probs_avg: QuantizedValues,
    backoffs_avg: QuantizedValues,
    vocab: DoubleValuedMpht,
    arrays: Vec<SortedArray<G, CompactVector>>,
}

impl<G: GramSequence> TrieProbLm<G> {
    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn remapping_order(&self) -> u8 {
        self.remapping_order
    }

    pub fn unk_prob(&self) -> f32 {
        self.unk_prob
    }

    pub fn len(&self) -> u64 {
        self.arrays.iter().map(|a| a.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> ScoreState {
        ScoreState::new(self.order)
    }

    /// Log10 probability of `word` given the history in `state`, and
    /// whether the word was out of vocabulary.
    pub fn score(&self, state: &mut ScoreState, word: &str) -> (f32, bool) {
        let mut is_oov = false;
        let mut longest_match = 0u8;
        let mut order_m1 = 1usize;
        let mut prob;

        match self.vocab.lookup_pair(word.as_bytes()) {
            Some((word_id, packed)) => {
                state.add_word(word_id);
                let (p, backoff) = unpack_prob_backoff(packed);
                prob = p;
                state.add_backoff(backoff);
                if backoff != 0.0 {
                    longest_match = 1;
                }

                let mut prev_id = word_id;
                let mut prev_prev_id = prev_id;
                let mut range = if self.order > 1 {
                    self.arrays[0].range(word_id)
                } else {
                    PointerRange { begin: 0, end: 0 }
                };

                while order_m1 <= state.length as usize {
                    state.advance();
                    if range.is_empty() {
                        // no extension to the left in the reversed trie
                        break;
                    }

                    // the word order_m1 steps behind the one just added
                    let raw_id = *state.words.latest(order_m1);
                    let id = if self.remapping_order > 0
                        && order_m1 > self.remapping_order as usize
                    {
                        match mapper::remap_state(
                            prev_id,
                            prev_prev_id,
                            raw_id,
                            &self.arrays,
                            self.remapping_order,
                        ) {
                            Some(id) => id,
                            None => break,
                        }
                    } else {
                        raw_id
                    };

                    let pos = match self.arrays[order_m1].position(range, id) {
                        Some(pos) => pos,
                        None => break,
                    };

                    let q = self.probs_avg.quantization_bits(order_m1 - 1);
                    let word_rank = self.arrays[order_m1].rank(pos);
                    let prob_rank = word_rank & ((1u64 << q) - 1);
                    let backoff_rank = word_rank >> q;
                    prob = self.probs_avg.access(order_m1 - 1, prob_rank);

                    if order_m1 != self.order as usize - 1 {
                        let backoff = self.backoffs_avg.access(order_m1 - 1, backoff_rank);
                        state.add_backoff(backoff);
                        range = self.arrays[order_m1].range(pos);
                        if backoff != 0.0 {
                            longest_match = order_m1 as u8 + 1;
                        }
                    }

                    prev_prev_id = prev_id;
                    prev_id = raw_id;
                    order_m1 += 1;
                }
            }
            None => {
                state.add_word(OOV_WORD);
                state.oovs += 1;
                is_oov = true;
                prob = self.unk_prob;
                state.add_backoff(0.0);
            }
        }

        // contexts that dropped out of the longest match contribute their
        // back-off weights from the previous call
        for i in order_m1 - 1..state.length as usize {
            prob += state.backoff(i);
        }

        state.length = longest_match;
        state.finalize();
        debug_assert!(prob < 0.0);
        (prob, is_oov)
    }

    /// Score a whitespace-tokenized sentence from a fresh state; returns
    /// the summed log10 probability and the number of OOV words.
    pub fn score_sentence(&self, state: &mut ScoreState, sentence: &str) -> (f32, u64) {
        state.init();
        let mut total = 0.0;
        for word in sentence.split_ascii_whitespace() {
            total += self.score(state, word).0;
        }
        (total, state.oovs)
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u8(self.order)?;
        w.write_u8(self.remapping_order)?;
        w.write_f32::<LittleEndian>(self.unk_prob)?;
        self.probs_avg.save(w)?;
        self.backoffs_avg.save(w)?;
        self.vocab.save(w)?;
        self.arrays[0].save(w, 1, ValueKind::None)?;
        for (i, array) in self.arrays.iter().enumerate().skip(1) {
            array.save(w, i as u8 + 1, ValueKind::ProbBackoff)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let order = r.read_u8()?;
        let remapping_order = r.read_u8()?;
        let unk_prob = r.read_f32::<LittleEndian>()?;
        let probs_avg = QuantizedValues::load(r, order as usize - 1)?;
        let backoffs_avg = QuantizedValues::load(r, (order as usize).saturating_sub(2))?;
        let vocab = DoubleValuedMpht::load(r)?;
        let mut arrays = Vec::with_capacity(order as usize);
        arrays.push(SortedArray::load(r, 1, ValueKind::None)?);
        for i in 1..order {
            arrays.push(SortedArray::load(r, i + 1, ValueKind::ProbBackoff)?);
        }
        Ok(Self {
            order,
            remapping_order,
            unk_prob,
            probs_avg,
            backoffs_avg,
            vocab,
            arrays,
        })
    }
}

/// Builds a prob trie from suffix-sorted ARPA sections.
pub struct TrieProbBuilder;

impl TrieProbBuilder {
    pub fn build<G: GramSequence>(
        sections: &ArpaSections,
        config: &BuildConfig,
    ) -> Result<TrieProbLm<G>> {
        config.validate()?;
        let order = config.order;
        let remapping_order = config.remapping_order;
        if order > sections.order() {
            return Err(Error::MalformedInput {
                order,
                msg: format!("the arpa file only holds {} orders", sections.order()),
            });
        }

        let mut probs_builder = QuantizedValuesBuilder::new(order as usize - 1);
        let mut backoffs_builder = QuantizedValuesBuilder::new((order as usize).saturating_sub(2));
        for ord in 2..=order {
            let section = &sections.sections[ord as usize - 1];
            let probs: Vec<f32> = section.iter().map(|r| r.prob).collect();
            probs_builder.add_probs(probs, config.probs_quantization_bits)?;
            if ord != order {
                // zero back-offs are pinned to the reserved bin
                let backoffs: Vec<f32> = section
                    .iter()
                    .map(|r| r.backoff)
                    .filter(|&b| b != 0.0)
                    .collect();
                backoffs_builder.add_backoffs(backoffs, config.backoffs_quantization_bits)?;
            }
        }

        tracing::info!("building vocabulary");
        let unigrams = &sections.sections[0];
        let n = unigrams.len() as u64;
        let mut unk_prob = config.unk_prob;
        let mut tokens = Vec::with_capacity(unigrams.len());
        let mut packed = Vec::with_capacity(unigrams.len());
        for record in unigrams {
            if record.gram == UNK && unk_prob == DEFAULT_UNK_PROB {
                unk_prob = record.prob;
                tracing::info!(prob = f64::from(unk_prob), "<unk> probability found");
            }
            tokens.push(record.gram.as_str());
            packed.push(pack_prob_backoff(record.prob, record.backoff));
        }
        let ids: Vec<u64> = (0..n).collect();
        let vocab =
            DoubleValuedMpht::build(&tokens, &ids, &packed, bits::ceil_log2(n + 1).max(1), 64)?;

        let mut arrays: Vec<SortedArray<G, CompactVector>> = Vec::with_capacity(order as usize);
        arrays.push(SortedArray::new(n, None, None));

        for ord in 2..=order {
            tracing::info!(order = ord, "building grams");
            let cur = &sections.sections[ord as usize - 1];
            let prv = &sections.sections[ord as usize - 2];
            let n_cur = cur.len() as u64;

            let mut pointers: Vec<u64> = Vec::with_capacity(prv.len() + 1);
            pointers.push(0);
            let mut ids: Vec<u64> = Vec::with_capacity(cur.len());
            let mut rank_words: Vec<u64> = Vec::with_capacity(cur.len());

            let q = probs_builder.quantization_bits(ord as usize - 2);
            let mut j = 0usize;
            let mut pos = 0u64;

            for record in cur {
                let (token, pattern) =
                    split_first_token(&record.gram).ok_or_else(|| Error::MalformedInput {
                        order: ord,
                        msg: format!("'{}' has fewer than {} tokens", record.gram, ord),
                    })?;

                // in a reversed trie the parent of a gram is its suffix
                while j < prv.len() && prv[j].gram != pattern {
                    pointers.push(pos);
                    j += 1;
                }
                if j == prv.len() {
                    return Err(Error::MalformedInput {
                        order: ord,
                        msg: format!(
                            "'{pattern}' should have been found within the {}-grams",
                            ord - 1
                        ),
                    });
                }
                pos += 1;

                let token_id =
                    vocab.lookup(token.as_bytes()).ok_or_else(|| Error::MalformedInput {
                        order: ord,
                        msg: format!("token '{token}' is not in the vocabulary"),
                    })?;

                let stored_id = if remapping_order > 0 && ord > remapping_order + 1 {
                    let raw = Self::raw_ids(&record.gram, &vocab, ord)?;
                    mapper::remap_backward(token_id, &raw, &arrays, remapping_order).ok_or_else(
                        || Error::MalformedInput {
                            order: ord,
                            msg: format!(
                                "'{token}' should have been found among the children of \
                                 '{pattern}'"
                            ),
                        },
                    )?
                } else {
                    token_id
                };
                ids.push(stored_id);

                let prob_rank = probs_builder.rank(ord as usize - 2, record.prob, 0);
                let mut rank = prob_rank;
                if ord != order {
                    let backoff_rank =
                        backoffs_builder.rank(ord as usize - 2, record.backoff, 1);
                    // prob and back-off ranks ride in one word
                    rank |= backoff_rank << q;
                }
                rank_words.push(rank);
            }

            while pointers.len() < prv.len() + 1 {
                pointers.push(pos);
            }
            debug_assert_eq!(*pointers.last().unwrap(), n_cur);

            tracing::info!(order = ord, "writing grams");
            let grams = G::build(&ids, &pointers, ord)?;
            let rank_seq = <CompactVector as RankSequence>::build(&rank_words, ord)?;
            arrays.push(SortedArray::new(n_cur, Some(grams), Some(rank_seq)));

            let pointer_seq = PointerSequence::build(&pointers)?;
            arrays[ord as usize - 2].set_pointers(pointer_seq);
        }

        Ok(TrieProbLm {
            order,
            remapping_order,
            unk_prob,
            probs_avg: probs_builder.build(),
            backoffs_avg: backoffs_builder.build(),
            vocab,
            arrays,
        })
    }

    fn raw_ids(
        gram: &str,
        vocab: &DoubleValuedMpht,
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
