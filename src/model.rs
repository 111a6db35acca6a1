//! The tagged set of concrete model kinds and their binary round-trip.
//!
//! The header byte names the model kind; loading dispatches on it into
//! the matching concrete type.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::config::{BuildConfig, DataStructureType, RanksType, ValueType};
use crate::hashlm::{MphCountLm, MphProbLm};
use crate::header::{FormatHeader, FORMAT_VERSION};
use crate::reader::arpa::{ArpaReader, ArpaSections};
use crate::reader::counts::{CountSource, GzDirSource};
use crate::sequences::{
    EfSequence, FastEfSequence, IndexedCodewordsSequence, PrefixSummedSequence, UniformPefSequence,
};
use crate::trie::{TrieCountBuilder, TrieCountLm, TrieProbBuilder, TrieProbLm};
use crate::{Error, Result};

type PsEf = PrefixSummedSequence<EfSequence>;
type PsPef = PrefixSummedSequence<UniformPefSequence>;

pub enum Model {
    EfTrieCountIc(TrieCountLm<FastEfSequence, IndexedCodewordsSequence>),
    EfTrieCountPsef(TrieCountLm<FastEfSequence, PsEf>),
    EfTrieCountPspef(TrieCountLm<FastEfSequence, PsPef>),
    PefTrieCountIc(TrieCountLm<UniformPefSequence, IndexedCodewordsSequence>),
    PefTrieCountPsef(TrieCountLm<UniformPefSequence, PsEf>),
    PefTrieCountPspef(TrieCountLm<UniformPefSequence, PsPef>),
    EfTrieProb(TrieProbLm<FastEfSequence>),
    PefTrieProb(TrieProbLm<UniformPefSequence>),
    HashCount(MphCountLm),
    HashProb(MphProbLm),
}

impl Model {
    /// Build a count model from sorted count files.
    pub fn build_count<S: CountSource>(source: &S, config: &BuildConfig) -> Result<Self> {
        if config.value_type != ValueType::Count {
            return Err(Error::WrongModelKind {
                found: "prob_backoff",
                expected: "count",
            });
        }
        config.validate()?;
        Ok(match (config.data_structure, config.ranks_type) {
            (DataStructureType::Hash, _) => Model::HashCount(MphCountLm::build(source, config)?),
            (DataStructureType::EfTrie, RanksType::IndexedCodewords) => {
                Model::EfTrieCountIc(TrieCountBuilder::build(source, config)?)
            }
            (DataStructureType::EfTrie, RanksType::PrefixSummedEf) => {
                Model::EfTrieCountPsef(TrieCountBuilder::build(source, config)?)
            }
            (DataStructureType::EfTrie, RanksType::PrefixSummedPef) => {
                Model::EfTrieCountPspef(TrieCountBuilder::build(source, config)?)
            }
            (DataStructureType::PefTrie, RanksType::IndexedCodewords) => {
                Model::PefTrieCountIc(TrieCountBuilder::build(source, config)?)
            }
            (DataStructureType::PefTrie, RanksType::PrefixSummedEf) => {
                Model::PefTrieCountPsef(TrieCountBuilder::build(source, config)?)
            }
            (DataStructureType::PefTrie, RanksType::PrefixSummedPef) => {
                Model::PefTrieCountPspef(TrieCountBuilder::build(source, config)?)
            }
        })
    }

    /// Build a count model from a directory of `<k>-grams.sorted.gz` files.
    pub fn build_count_dir<P: AsRef<Path>>(dir: P, config: &BuildConfig) -> Result<Self> {
        Self::build_count(&GzDirSource::new(dir), config)
    }

    /// Build a probability model from parsed ARPA sections.
    pub fn build_prob(sections: &ArpaSections, config: &BuildConfig) -> Result<Self> {
        if config.value_type != ValueType::ProbBackoff {
            return Err(Error::WrongModelKind {
                found: "count",
                expected: "prob_backoff",
            });
        }
        config.validate()?;
        Ok(match config.data_structure {
            DataStructureType::Hash => Model::HashProb(MphProbLm::build(sections, config)?),
            DataStructureType::EfTrie => Model::EfTrieProb(TrieProbBuilder::build(sections, config)?),
            DataStructureType::PefTrie => {
                Model::PefTrieProb(TrieProbBuilder::build(sections, config)?)
            }
        })
    }

    /// Build a probability model from a suffix-sorted ARPA file.
    pub fn build_prob_file<P: AsRef<Path>>(path: P, config: &BuildConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| Error::FileNotFound(path.display().to_string()))?;
        let sections = ArpaReader::new(BufReader::new(file))?.into_sections()?;
        Self::build_prob(&sections, config)
    }

    pub fn header(&self) -> FormatHeader {
        let (data_structure, value_type) = match self {
            Model::EfTrieCountIc(_) | Model::EfTrieCountPsef(_) | Model::EfTrieCountPspef(_) => {
                (DataStructureType::EfTrie, ValueType::Count)
            }
            Model::PefTrieCountIc(_) | Model::PefTrieCountPsef(_) | Model::PefTrieCountPspef(_) => {
                (DataStructureType::PefTrie, ValueType::Count)
            }
            Model::EfTrieProb(_) => (DataStructureType::EfTrie, ValueType::ProbBackoff),
            Model::PefTrieProb(_) => (DataStructureType::PefTrie, ValueType::ProbBackoff),
            Model::HashCount(_) => (DataStructureType::Hash, ValueType::Count),
            Model::HashProb(_) => (DataStructureType::Hash, ValueType::ProbBackoff),
        };
        let ranks_type = match self {
            Model::EfTrieCountPsef(_) | Model::PefTrieCountPsef(_) => RanksType::PrefixSummedEf,
            Model::EfTrieCountPspef(_) | Model::PefTrieCountPspef(_) => RanksType::PrefixSummedPef,
            _ => RanksType::IndexedCodewords,
        };
        let remapping_order = match self {
            Model::EfTrieCountIc(m) => m.remapping_order(),
            Model::EfTrieCountPsef(m) => m.remapping_order(),
            Model::EfTrieCountPspef(m) => m.remapping_order(),
            Model::PefTrieCountIc(m) => m.remapping_order(),
            Model::PefTrieCountPsef(m) => m.remapping_order(),
            Model::PefTrieCountPspef(m) => m.remapping_order(),
            Model::EfTrieProb(m) => m.remapping_order(),
            Model::PefTrieProb(m) => m.remapping_order(),
            Model::HashCount(_) | Model::HashProb(_) => 0,
        };
        let hash_key_bytes = match self {
            Model::HashCount(m) => m.hash_key_bytes(),
            Model::HashProb(m) => m.hash_key_bytes(),
            _ => 8,
        };
        FormatHeader {
            data_structure,
            value_type,
            remapping_order,
            ranks_type,
            hash_key_bytes,
        }
    }

    /// Human-readable model kind.
    pub fn kind(&self) -> String {
        self.header().describe()
    }

    pub fn order(&self) -> u8 {
        match self {
            Model::EfTrieCountIc(m) => m.order(),
            Model::EfTrieCountPsef(m) => m.order(),
            Model::EfTrieCountPspef(m) => m.order(),
            Model::PefTrieCountIc(m) => m.order(),
            Model::PefTrieCountPsef(m) => m.order(),
            Model::PefTrieCountPspef(m) => m.order(),
            Model::EfTrieProb(m) => m.order(),
            Model::PefTrieProb(m) => m.order(),
            Model::HashCount(m) => m.order(),
            Model::HashProb(m) => m.order(),
        }
    }

    /// Number of grams stored across all orders.
    pub fn len(&self) -> u64 {
        match self {
            Model::EfTrieCountIc(m) => m.len(),
            Model::EfTrieCountPsef(m) => m.len(),
            Model::EfTrieCountPspef(m) => m.len(),
            Model::PefTrieCountIc(m) => m.len(),
            Model::PefTrieCountPsef(m) => m.len(),
            Model::PefTrieCountPspef(m) => m.len(),
            Model::EfTrieProb(m) => m.len(),
            Model::PefTrieProb(m) => m.len(),
            Model::HashCount(m) => m.len(),
            Model::HashProb(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count lookup; errors on probability models.
    pub fn lookup(&self, gram: &str) -> Result<Option<u64>> {
        match self {
            Model::EfTrieCountIc(m) => Ok(m.lookup(gram)),
            Model::EfTrieCountPsef(m) => Ok(m.lookup(gram)),
            Model::EfTrieCountPspef(m) => Ok(m.lookup(gram)),
            Model::PefTrieCountIc(m) => Ok(m.lookup(gram)),
            Model::PefTrieCountPsef(m) => Ok(m.lookup(gram)),
            Model::PefTrieCountPspef(m) => Ok(m.lookup(gram)),
            Model::HashCount(m) => Ok(m.lookup(gram)),
            _ => Err(Error::WrongModelKind {
                found: "prob_backoff",
                expected: "count",
            }),
        }
    }

    /// Score a whitespace-tokenized sentence from a fresh state; errors on
    /// count models. Returns the total log10 probability and the OOV count.
    pub fn score_sentence(&self, sentence: &str) -> Result<(f32, u64)> {
        match self {
            Model::EfTrieProb(m) => Ok(m.score_sentence(&mut m.state(), sentence)),
            Model::PefTrieProb(m) => Ok(m.score_sentence(&mut m.state(), sentence)),
            Model::HashProb(m) => Ok(m.score_sentence(&mut m.state(), sentence)),
            _ => Err(Error::WrongModelKind {
                found: "count",
                expected: "prob_backoff",
            }),
        }
    }

    /// Serialize as header byte, version byte, then the component stream.
    /// Returns the number of bytes written.
    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<u64> {
        let mut w = CountingWriter::new(w);
        w.write_u8(self.header().encode())?;
        w.write_u8(FORMAT_VERSION)?;
        match self {
            Model::EfTrieCountIc(m) => m.save(&mut w)?,
            Model::EfTrieCountPsef(m) => m.save(&mut w)?,
            Model::EfTrieCountPspef(m) => m.save(&mut w)?,
            Model::PefTrieCountIc(m) => m.save(&mut w)?,
            Model::PefTrieCountPsef(m) => m.save(&mut w)?,
            Model::PefTrieCountPspef(m) => m.save(&mut w)?,
            Model::EfTrieProb(m) => m.save(&mut w)?,
            Model::PefTrieProb(m) => m.save(&mut w)?,
            Model::HashCount(m) => m.save(&mut w)?,
            Model::HashProb(m) => m.save(&mut w)?,
        }
        Ok(w.written())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        let mut w = BufWriter::new(File::create(path)?);
        let written = self.save(&mut w)?;
        w.flush()?;
        Ok(written)
    }

    pub fn load<R: Read>(r: &mut R) -> Result<Self> {
        let header = FormatHeader::decode(
            r.read_u8()
                .map_err(|_| Error::CorruptModel("empty model stream".into()))?,
        )?;
        let version = r
            .read_u8()
            .map_err(|_| Error::CorruptModel("truncated model stream".into()))?;
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                expected: FORMAT_VERSION,
            });
        }

        let truncated =
            |e: std::io::Error| Error::CorruptModel(format!("truncated model stream: {e}"));
        Ok(match (header.data_structure, header.value_type) {
            (DataStructureType::Hash, ValueType::Count) => {
                Model::HashCount(MphCountLm::load(r).map_err(truncated)?)
            }
            (DataStructureType::Hash, ValueType::ProbBackoff) => {
                Model::HashProb(MphProbLm::load(r).map_err(truncated)?)
            }
            (DataStructureType::EfTrie, ValueType::ProbBackoff) => {
                Model::EfTrieProb(TrieProbLm::load(r).map_err(truncated)?)
            }
            (DataStructureType::PefTrie, ValueType::ProbBackoff) => {
                Model::PefTrieProb(TrieProbLm::load(r).map_err(truncated)?)
            }
            (DataStructureType::EfTrie, ValueType::Count) => match header.ranks_type {
                RanksType::IndexedCodewords => {
                    Model::EfTrieCountIc(TrieCountLm::load(r).map_err(truncated)?)
                }
                RanksType::PrefixSummedEf => {
                    Model::EfTrieCountPsef(TrieCountLm::load(r).map_err(truncated)?)
                }
                RanksType::PrefixSummedPef => {
                    Model::EfTrieCountPspef(TrieCountLm::load(r).map_err(truncated)?)
                }
            },
            (DataStructureType::PefTrie, ValueType::Count) => match header.ranks_type {
                RanksType::IndexedCodewords => {
                    Model::PefTrieCountIc(TrieCountLm::load(r).map_err(truncated)?)
                }
                RanksType::PrefixSummedEf => {
                    Model::PefTrieCountPsef(TrieCountLm::load(r).map_err(truncated)?)
                }
                RanksType::PrefixSummedPef => {
                    Model::PefTrieCountPspef(TrieCountLm::load(r).map_err(truncated)?)
                }
            },
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| Error::FileNotFound(path.display().to_string()))?;
        Self::load(&mut BufReader::new(file))
    }
}

struct CountingWriter<'a, W> {
    inner: &'a mut W,
    written: u64,
}

impl<'a, W: Write> CountingWriter<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self { inner, written: 0 }
    }

    fn written(&self) -> u64 {
        self.written
    }
}

impl<'a, W: Write> Write for CountingWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
