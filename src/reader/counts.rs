//! Readers for sorted count files.
//!
//! A count file holds its number of grams on the first line, then one
//! `<tokens>\t<count>` line per gram, sorted in forward lexicographic
//! order by vocabulary id. On disk the files are gzipped and named
//! `<k>-grams.sorted.gz`.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Lines};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::{Error, Result};

use super::CountRecord;

pub struct CountsReader<B> {
    order: u8,
    lines: Lines<B>,
    num_grams: u64,
    line_num: u64,
}

impl<B: BufRead> CountsReader<B> {
    pub fn new(reader: B, order: u8) -> Result<Self> {
        let mut lines = reader.lines();
        let first = lines
            .next()
            .transpose()?
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| Error::MalformedInput {
                order,
                msg: "the first line must hold the number of grams".into(),
            })?;
        let num_grams = first.trim().parse::<u64>().map_err(|_| Error::MalformedInput {
            order,
            msg: format!("bad gram count on the first line: '{first}'"),
        })?;
        if num_grams == 0 {
            return Err(Error::MalformedInput {
                order,
                msg: "the number of grams must not be 0".into(),
            });
        }
        Ok(Self {
            order,
            lines,
            num_grams,
            line_num: 1,
        })
    }

    pub fn num_grams(&self) -> u64 {
        self.num_grams
    }

    pub fn next_record(&mut self) -> Result<CountRecord> {
        self.line_num += 1;
        let line = self.lines.next().transpose()?.ok_or_else(|| Error::MalformedInput {
            order: self.order,
            msg: format!(
                "expected {} grams but the file ends at line {}",
                self.num_grams, self.line_num
            ),
        })?;
        let (gram, count) = line.split_once('\t').ok_or_else(|| Error::MalformedInput {
            order: self.order,
            msg: format!("line {} has no tab separator", self.line_num),
        })?;
        let count = count.trim().parse::<u64>().map_err(|_| Error::MalformedInput {
            order: self.order,
            msg: format!("line {} has a bad count: '{count}'", self.line_num),
        })?;
        Ok(CountRecord {
            gram: gram.to_string(),
            count,
        })
    }
}

/// Something that can open the count file of each order, repeatedly.
pub trait CountSource {
    type Reader: BufRead;

    fn open(&self, order: u8) -> Result<CountsReader<Self::Reader>>;
}

/// Directory of `<k>-grams.sorted.gz` files.
pub struct GzDirSource {
    dir: PathBuf,
}

impl GzDirSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn filename(&self, order: u8) -> PathBuf {
        self.dir.join(format!("{order}-grams.sorted.gz"))
    }
}

impl CountSource for GzDirSource {
    type Reader = BufReader<GzDecoder<File>>;

    fn open(&self, order: u8) -> Result<CountsReader<Self::Reader>> {
        let path = self.filename(order);
        let file = File::open(&path)
            .map_err(|_| Error::FileNotFound(path.display().to_string()))?;
        CountsReader::new(BufReader::new(GzDecoder::new(file)), order)
    }
}

/// Plain-text in-memory source, one string per order; used by tests and
/// small experiments.
pub struct MemorySource {
    orders: Vec<String>,
}

impl MemorySource {
    /// `orders[k]` is the full text of the (k+1)-gram file.
    pub fn new(orders: Vec<String>) -> Self {
        Self { orders }
    }
}

impl CountSource for MemorySource {
    type Reader = Cursor<Vec<u8>>;

    fn open(&self, order: u8) -> Result<CountsReader<Self::Reader>> {
        let text = self
            .orders
            .get(order as usize - 1)
            .ok_or_else(|| Error::FileNotFound(format!("{order}-grams source")))?;
        CountsReader::new(Cursor::new(text.clone().into_bytes()), order)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_counted_lines() {
        let text = "3\na\t5\na b\t2\nb\t1\n";
        let mut r = CountsReader::new(Cursor::new(text.as_bytes().to_vec()), 1).unwrap();
        assert_eq!(r.num_grams(), 3);
        assert_eq!(
            r.next_record().unwrap(),
            CountRecord {
                gram: "a".into(),
                count: 5
            }
        );
        assert_eq!(r.next_record().unwrap().gram, "a b");
        assert_eq!(r.next_record().unwrap().count, 1);
    }

    #[test]
    fn missing_separator_is_malformed() {
        let mut r = CountsReader::new(Cursor::new(b"1\nno-count-here\n".to_vec()), 2).unwrap();
        assert!(matches!(
            r.next_record(),
            Err(Error::MalformedInput { order: 2, .. })
        ));
    }

    #[test]
    fn empty_or_bad_header_rejected() {
        assert!(CountsReader::new(Cursor::new(b"".to_vec()), 1).is_err());
        assert!(CountsReader::new(Cursor::new(b"zero\n".to_vec()), 1).is_err());
        assert!(CountsReader::new(Cursor::new(b"0\n".to_vec()), 1).is_err());
    }
}
