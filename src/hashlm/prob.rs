//! Hash-table probability model.
//!
//! Scores like the prob trie, but every context extension is a fresh
//! whole-gram probe: the state keeps the history tokens and the gram key
//! grows leftwards one token per step.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bits::{pack_prob_backoff, unpack_prob_backoff};
use crate::config::BuildConfig;
use crate::mph::SingleValuedMpht;
use crate::reader::arpa::ArpaSections;
use crate::state::ScoreState;
use crate::values::{QuantizedValues, QuantizedValuesBuilder};
use crate::{Error, Result, DEFAULT_UNK_PROB};

const UNK: &str = "<unk>";

#[derive(Debug)]
pub struct MphProbLm {
    order: u8,
    unk_prob: f32,
    probs_avg: QuantizedValues,
    backoffs_avg: QuantizedValues,
    tables: Vec<SingleValuedMpht>,
}

impl MphProbLm {
    pub fn build(sections: &ArpaSections, config: &BuildConfig) -> Result<Self> {
        config.validate()?;
        let order = config.order;
        let hash_bits = u32::from(config.hash_key_bytes) * 8;
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
            probs_builder.add_probs(
                section.iter().map(|r| r.prob).collect(),
                config.probs_quantization_bits,
            )?;
            if ord != order {
                backoffs_builder.add_backoffs(
                    section.iter().map(|r| r.backoff).filter(|&b| b != 0.0).collect(),
                    config.backoffs_quantization_bits,
                )?;
            }
        }

        tracing::info!("building vocabulary");
        let unigrams = &sections.sections[0];
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
        let mut tables = Vec::with_capacity(order as usize);
        // unigram values ride unquantized in the full 64-bit slot
        tables.push(SingleValuedMpht::build(&tokens, &packed, 64, hash_bits)?);

        for ord in 2..=order {
            tracing::info!(order = ord, "building grams");
            let section = &sections.sections[ord as usize - 1];
            let q = probs_builder.quantization_bits(ord as usize - 2);
            let value_bits = u32::from(q)
                + if ord != order {
                    u32::from(backoffs_builder.quantization_bits(ord as usize - 2))
                } else {
                    0
                };

            let mut grams = Vec::with_capacity(section.len());
            let mut ranks = Vec::with_capacity(section.len());
            for record in section {
                let mut rank = probs_builder.rank(ord as usize - 2, record.prob, 0);
                if ord != order {
                    rank |= backoffs_builder.rank(ord as usize - 2, record.backoff, 1) << q;
                }
                grams.push(record.gram.as_str());
                ranks.push(rank);
            }
            tables.push(SingleValuedMpht::build(&grams, &ranks, value_bits, hash_bits)?);
        }

        Ok(Self {
            order,
            unk_prob,
            probs_avg: probs_builder.build(),
            backoffs_avg: backoffs_builder.build(),
            tables,
        })
    }

    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn unk_prob(&self) -> f32 {
        self.unk_prob
    }

    pub fn hash_key_bytes(&self) -> u8 {
        (self.tables[0].hash_bits() / 8) as u8
    }

    pub fn len(&self) -> u64 {
        self.tables.iter().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> ScoreState<String> {
        ScoreState::new(self.order)
    }

    pub fn score(&self, state: &mut ScoreState<String>, word: &str) -> (f32, bool) {
        let mut is_oov = false;
        let mut longest_match = 0u8;
        let mut order_m1 = 1usize;
        let mut prob;

        state.add_word(word.to_string());

        match self.tables[0].lookup(word.as_bytes()) {
            Some(packed) => {
                let (p, backoff) = unpack_prob_backoff(packed);
                prob = p;
                state.add_backoff(backoff);
                if backoff != 0.0 {
                    longest_match = 1;
                }

                let mut gram = word.to_string();

                while order_m1 <= state.length as usize && order_m1 < self.order as usize {
                    state.advance();

                    // the key grows one history token to the left
                    gram = format!("{} {}", state.words.latest(order_m1), gram);
                    let rank = match self.tables[order_m1].lookup(gram.as_bytes()) {
                        Some(rank) => rank,
                        None => break,
                    };

                    if order_m1 != self.order as usize - 1 {
                        let q = self.probs_avg.quantization_bits(order_m1 - 1);
                        let prob_rank = rank & ((1u64 << q) - 1);
                        let backoff_rank = rank >> q;
                        prob = self.probs_avg.access(order_m1 - 1, prob_rank);
                        let backoff = self.backoffs_avg.access(order_m1 - 1, backoff_rank);
                        state.add_backoff(backoff);
                        if backoff != 0.0 {
                            longest_match = order_m1 as u8 + 1;
                        }
                    } else {
                        prob = self.probs_avg.access(order_m1 - 1, rank);
                    }

                    order_m1 += 1;
                }
            }
            None => {
                state.oovs += 1;
                is_oov = true;
                prob = self.unk_prob;
                state.add_backoff(0.0);
            }
        }

        for i in order_m1 - 1..state.length as usize {
            prob += state.backoff(i);
        }

        state.length = longest_match;
        state.finalize();
        debug_assert!(prob < 0.0);
        (prob, is_oov)
    }

    pub fn score_sentence(&self, state: &mut ScoreState<String>, sentence: &str) -> (f32, u64) {
        state.init();
        let mut total = 0.0;
        for word in sentence.split_ascii_whitespace() {
            total += self.score(state, word).0;
        }
        (total, state.oovs)
    }

    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u8(self.order)?;
        w.write_f32::<LittleEndian>(self.unk_prob)?;
        self.probs_avg.save(w)?;
        self.backoffs_avg.save(w)?;
        for t in &self.tables {
            t.save(w)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let order = r.read_u8()?;
        let unk_prob = r.read_f32::<LittleEndian>()?;
        let probs_avg = QuantizedValues::load(r, order as usize - 1)?;
        let backoffs_avg = QuantizedValues::load(r, (order as usize).saturating_sub(2))?;
        let mut tables = Vec::with_capacity(order as usize);
        for _ in 0..order {
            tables.push(SingleValuedMpht::load(r)?);
        }
        Ok(Self {
            order,
            unk_prob,
            probs_avg,
            backoffs_avg,
            tables,
        })
    }
}
