//! ARPA file reader.
//!
//! An ARPA file opens with a `\data\` section listing one
//! `ngram <order>=<count>` line per order, followed by one
//! `\<order>-grams:` section per order and the terminator `\end\`.
//! Sections are separated by blank lines. Every line of an n-gram section
//! reads `<log10_prob>\t<tokens>[\t<log10_backoff>]`; the highest-order
//! section carries no back-off column. For trie building the sections must
//! be pre-sorted in suffix order.

use std::io::{BufRead, Lines};

use itertools::Itertools;

use super::ProbBackoffRecord;

#[derive(thiserror::Error, Debug)]
pub enum ArpaReadError {
    #[error("The \\data\\ header is missing")]
    DataHeaderMissing,
    #[error("An ngram count line could not be parsed")]
    NgramCountsBroken,
    #[error("NGram counts are missing in the \\data\\ section")]
    NgramCountsMissing,
    #[error("A NGram section is missing its header")]
    SectionHeaderMissing,
    #[error("A NGram section mismatch. Got: {0}; Expected: {1}")]
    SectionHeaderMismatch(String, String),
    #[error("Actual NGram count does not match the header description")]
    NgramCountsMismatch,
    #[error("A boundary between sections is missing; an empty line is expected")]
    SectionBoundaryMissing,
    #[error("Line {0} of a {1}-gram section is malformed")]
    BadSectionLine(u64, u8),
    #[error("The \\end\\ terminator is missing")]
    EndTerminatorMissing,
    #[error("Tried reading a section while being in the wrong state")]
    InvalidReaderState,
    #[error("An IO error occurred while reading the arpa file: {0}")]
    IoError(#[from] std::io::Error),
}

/// All n-gram sections of an ARPA file, one vector per order.
#[derive(Debug)]
pub struct ArpaSections {
    pub counts: Vec<u64>,
    pub sections: Vec<Vec<ProbBackoffRecord>>,
}

impl ArpaSections {
    pub fn order(&self) -> u8 {
        self.counts.len() as u8
    }
}

/// Streaming reader over a [`BufRead`]; parses the count header up front
/// and then one section at a time.
#[derive(Debug)]
pub struct ArpaReader<B> {
    lines: Lines<B>,
    counts: Vec<u64>,
    cur_section: u8,
    line_num: u64,
}

const ARPA_DATA_HEADER: &str = "\\data\\";
const ARPA_NGRAM_KEY: &str = "ngram ";
const ARPA_END: &str = "\\end\\";

impl<B: BufRead> ArpaReader<B> {
    /// Construct the reader and validate the `\data\` count header.
    pub fn new(reader: B) -> Result<Self, ArpaReadError> {
        let mut lines = reader.lines();
        let mut line_num = 0u64;

        loop {
            let line = lines
                .next()
                .transpose()?
                .ok_or(ArpaReadError::DataHeaderMissing)?;
            line_num += 1;
            if line.trim().is_empty() {
                continue;
            }
            if line.trim_end() == ARPA_DATA_HEADER {
                break;
            }
            return Err(ArpaReadError::DataHeaderMissing);
        }

        let mut counts = Vec::new();
        while let Some(line) = lines.next().transpose()? {
            line_num += 1;
            if line.trim().is_empty() {
                break;
            }
            if let Some(suffix) = line.strip_prefix(ARPA_NGRAM_KEY) {
                let (order, cardinality) = suffix
                    .split('=')
                    .map(str::trim)
                    .collect_tuple()
                    .ok_or(ArpaReadError::NgramCountsBroken)?;
                let order: usize = order.parse().map_err(|_| ArpaReadError::NgramCountsBroken)?;
                let cardinality: u64 =
                    cardinality.parse().map_err(|_| ArpaReadError::NgramCountsBroken)?;
                if order != counts.len() + 1 {
                    return Err(ArpaReadError::NgramCountsBroken);
                }
                counts.push(cardinality);
            }
        }
        if counts.is_empty() {
            return Err(ArpaReadError::NgramCountsMissing);
        }

        Ok(Self {
            lines,
            counts,
            cur_section: 1,
            line_num,
        })
    }

    pub fn order(&self) -> u8 {
        self.counts.len() as u8
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Read the next `\k-grams:` section in file order.
    pub fn next_section(&mut self) -> Result<Vec<ProbBackoffRecord>, ArpaReadError> {
        let order = self.cur_section;
        if order > self.order() {
            return Err(ArpaReadError::InvalidReaderState);
        }
        let cardinality = self.counts[order as usize - 1];

        let header = self
            .next_line()?
            .ok_or(ArpaReadError::SectionHeaderMissing)?;
        let expected = format!("\\{order}-grams:");
        if header.trim_end() != expected {
            return Err(ArpaReadError::SectionHeaderMismatch(header, expected));
        }

        let mut records = Vec::with_capacity(cardinality as usize);
        for _ in 0..cardinality {
            match self.next_line()? {
                Some(line) if !line.trim().is_empty() => {
                    records.push(self.parse_record(&line, order)?)
                }
                _ => return Err(ArpaReadError::NgramCountsMismatch),
            }
        }

        if let Some(line) = self.next_line()? {
            if !line.trim().is_empty() {
                return Err(ArpaReadError::SectionBoundaryMissing);
            }
        }
        self.cur_section += 1;
        Ok(records)
    }

    /// Consume the `\end\` terminator.
    pub fn finish(mut self) -> Result<(), ArpaReadError> {
        if self.cur_section != self.order() + 1 {
            return Err(ArpaReadError::InvalidReaderState);
        }
        loop {
            match self.next_line()? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) if line.trim_end() == ARPA_END => return Ok(()),
                _ => return Err(ArpaReadError::EndTerminatorMissing),
            }
        }
    }

    /// Read every section and the terminator.
    pub fn into_sections(mut self) -> Result<ArpaSections, ArpaReadError> {
        let mut sections = Vec::with_capacity(self.order() as usize);
        for _ in 0..self.order() {
            sections.push(self.next_section()?);
        }
        let counts = self.counts.clone();
        self.finish()?;
        Ok(ArpaSections { counts, sections })
    }

    fn next_line(&mut self) -> Result<Option<String>, ArpaReadError> {
        self.line_num += 1;
        Ok(self.lines.next().transpose()?)
    }

    /// `<log10_prob>\t<token1> .. <tokenk>[\t<log10_backoff>]`, split on
    /// whitespace with the token count fixed by the section order.
    fn parse_record(&self, line: &str, order: u8) -> Result<ProbBackoffRecord, ArpaReadError> {
        let bad = || ArpaReadError::BadSectionLine(self.line_num, order);
        let mut pieces = line.split_ascii_whitespace();
        let mut prob: f32 = pieces.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        if prob > 0.0 {
            tracing::warn!(line = self.line_num, prob = f64::from(prob), "positive log10 probability mapped to 0");
            prob = 0.0;
        }

        let mut gram = String::new();
        for i in 0..order {
            let token = pieces.next().ok_or_else(bad)?;
            if i > 0 {
                gram.push(' ');
            }
            gram.push_str(token);
        }

        let backoff = match pieces.next() {
            Some(piece) => piece.parse().map_err(|_| bad())?,
            None => 0.0,
        };
        if pieces.next().is_some() {
            return Err(bad());
        }

        Ok(ProbBackoffRecord { gram, prob, backoff })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    const TINY_ARPA: &str = "\\data\\\nngram 1=3\nngram 2=2\n\n\\1-grams:\n-1.0\t<unk>\n-0.5\ta\t-0.3\n-0.7\tb\t-0.2\n\n\\2-grams:\n-0.25\ta b\n-0.9\tb a\n\n\\end\\\n";

    fn reader(text: &str) -> ArpaReader<Cursor<Vec<u8>>> {
        ArpaReader::new(Cursor::new(text.as_bytes().to_vec())).unwrap()
    }

    #[test]
    fn parses_header_and_sections() {
        let sections = reader(TINY_ARPA).into_sections().unwrap();
        assert_eq!(sections.counts, vec![3, 2]);
        assert_eq!(sections.order(), 2);
        let unigrams = &sections.sections[0];
        assert_eq!(unigrams[0].gram, "<unk>");
        assert_eq!(unigrams[1].backoff, -0.3);
        let bigrams = &sections.sections[1];
        assert_eq!(bigrams[0].gram, "a b");
        assert_eq!(bigrams[0].prob, -0.25);
        assert_eq!(bigrams[0].backoff, 0.0);
    }

    #[test]
    fn missing_data_header() {
        let err = ArpaReader::new(Cursor::new(b"\\1-grams:\n".to_vec())).unwrap_err();
        assert!(matches!(err, ArpaReadError::DataHeaderMissing));
    }

    #[test]
    fn section_header_mismatch() {
        let text = "\\data\\\nngram 1=1\n\n\\2-grams:\n-0.5\ta\n\n\\end\\\n";
        let err = reader(text).into_sections().unwrap_err();
        assert!(matches!(err, ArpaReadError::SectionHeaderMismatch(_, _)));
    }

    #[test]
    fn cardinality_mismatch() {
        let text = "\\data\\\nngram 1=2\n\n\\1-grams:\n-0.5\ta\n\n\\end\\\n";
        let err = reader(text).into_sections().unwrap_err();
        assert!(matches!(err, ArpaReadError::NgramCountsMismatch));
    }

    #[test]
    fn positive_prob_clamped() {
        let text = "\\data\\\nngram 1=1\n\n\\1-grams:\n0.5\ta\n\n\\end\\\n";
        let sections = reader(text).into_sections().unwrap();
        assert_eq!(sections.sections[0][0].prob, 0.0);
    }

    #[test]
    fn missing_end_terminator() {
        let text = "\\data\\\nngram 1=1\n\n\\1-grams:\n-0.5\ta\n\n";
        let err = reader(text).into_sections().unwrap_err();
        assert!(matches!(err, ArpaReadError::EndTerminatorMissing));
    }
}
