//! End-to-end coverage of probability models: scoring against a reference
//! Katz back-off implementation, OOV handling, and binary round-trips.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use approx::assert_abs_diff_eq;
use gramdex::reader::arpa::ArpaReader;
use gramdex::{BuildConfig, DataStructureType, Model, ValueType};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const TINY_ARPA: &str = "\\data\\\nngram 1=3\nngram 2=1\n\n\\1-grams:\n-5\t<unk>\n-1\ta\t-0.3\n-1\tb\t-0.2\n\n\\2-grams:\n-0.5\ta b\n\n\\end\\\n";

fn build(text: &str, config: &BuildConfig) -> Model {
    let sections = ArpaReader::new(Cursor::new(text.as_bytes().to_vec()))
        .unwrap()
        .into_sections()
        .unwrap();
    Model::build_prob(&sections, config).unwrap()
}

fn prob_config(order: u8, ds: DataStructureType) -> BuildConfig {
    BuildConfig::new(order, ds, ValueType::ProbBackoff)
}

#[test]
fn bigram_scoring() {
    for ds in [
        DataStructureType::EfTrie,
        DataStructureType::PefTrie,
        DataStructureType::Hash,
    ] {
        let model = build(TINY_ARPA, &prob_config(2, ds));
        // prob(a) + prob(b | a), the bigram is present
        let (score, oovs) = model.score_sentence("a b").unwrap();
        assert_abs_diff_eq!(score, -1.5, epsilon = 1e-5);
        assert_eq!(oovs, 0);

        // prob(a) + backoff(a) + prob(b): the bigram "a a" is absent
        let (score, oovs) = model.score_sentence("a a").unwrap();
        assert_abs_diff_eq!(score, -1.0 + (-0.3) + (-1.0), epsilon = 1e-5);
        assert_eq!(oovs, 0);
    }
}

#[test]
fn oov_takes_unk_prob() {
    for ds in [
        DataStructureType::EfTrie,
        DataStructureType::PefTrie,
        DataStructureType::Hash,
    ] {
        let model = build(TINY_ARPA, &prob_config(2, ds));
        // x is unseen: <unk> prob from the file, then b backs off through
        // a zero weight
        let (score, oovs) = model.score_sentence("x b").unwrap();
        assert_abs_diff_eq!(score, -5.0 + -1.0, epsilon = 1e-5);
        assert_eq!(oovs, 1);
        assert!(score < 0.0);
    }
}

#[test]
fn unk_prob_override() {
    let mut config = prob_config(2, DataStructureType::EfTrie);
    config.unk_prob = -9.5;
    let model = build(TINY_ARPA, &config);
    let (score, oovs) = model.score_sentence("x").unwrap();
    assert_abs_diff_eq!(score, -9.5, epsilon = 1e-5);
    assert_eq!(oovs, 1);
}

/// Reference textbook Katz scorer over the raw ARPA maps.
struct RefLm {
    vocab: HashSet<String>,
    probs: HashMap<String, f32>,
    backoffs: HashMap<String, f32>,
    unk_prob: f32,
    order: usize,
}

impl RefLm {
    fn backoff_sum(&self, hist: &[String], shorter_than: usize) -> f32 {
        let mut sum = 0.0;
        for start in 0..hist.len() - shorter_than {
            let context = hist[start..].join(" ");
            sum += self.backoffs.get(&context).copied().unwrap_or(0.0);
        }
        sum
    }

    fn score_word(&self, hist: &[String], word: &str) -> f32 {
        if !self.vocab.contains(word) {
            return self.unk_prob + self.backoff_sum(hist, 0);
        }
        for l in (0..=hist.len()).rev() {
            let mut gram = hist[hist.len() - l..].join(" ");
            if !gram.is_empty() {
                gram.push(' ');
            }
            gram.push_str(word);
            if let Some(&p) = self.probs.get(&gram) {
                return p + self.backoff_sum(hist, l);
            }
        }
        unreachable!("every known word has a unigram entry");
    }

    fn score_sentence(&self, sentence: &[&str]) -> (f32, u64) {
        let mut hist: Vec<String> = Vec::new();
        let mut total = 0.0;
        let mut oovs = 0;
        for &w in sentence {
            total += self.score_word(&hist, w);
            if !self.vocab.contains(w) {
                oovs += 1;
            }
            hist.push(w.to_string());
            if hist.len() > self.order - 1 {
                hist.remove(0);
            }
        }
        (total, oovs)
    }
}

/// A synthetic order-3 model in suffix-sorted ARPA form, with every
/// higher-order context carrying a non-zero back-off.
fn synthetic_arpa() -> (String, RefLm) {
    let tokens = ["<unk>", "a", "b", "c", "d", "e"];

    let uni_prob = |i: usize| -1.0 - 0.05 * i as f32;
    let uni_backoff = |i: usize| -0.2 - 0.01 * i as f32;

    let mut bigrams: Vec<(usize, usize)> = Vec::new();
    for x in 1..tokens.len() {
        for y in 1..tokens.len() {
            if (x + 2 * y) % 3 != 0 {
                bigrams.push((x, y));
            }
        }
    }
    // suffix order: by last token id, then first token id
    bigrams.sort_by_key(|&(x, y)| (y, x));
    let bi_prob = |x: usize, y: usize| -0.3 - 0.07 * x as f32 - 0.11 * y as f32;

    let bigram_set: HashSet<(usize, usize)> = bigrams.iter().copied().collect();
    let mut trigrams: Vec<(usize, usize, usize)> = Vec::new();
    for &(x, y) in &bigrams {
        for z in 1..tokens.len() {
            if bigram_set.contains(&(y, z)) && (x + y + z) % 2 == 0 {
                trigrams.push((x, y, z));
            }
        }
    }
    let bigram_pos: HashMap<(usize, usize), usize> =
        bigrams.iter().enumerate().map(|(i, &p)| (p, i)).collect();
    trigrams.sort_by_key(|&(x, y, z)| (bigram_pos[&(y, z)], x));
    let tri_prob =
        |x: usize, y: usize, z: usize| -0.2 - 0.03 * x as f32 - 0.05 * y as f32 - 0.07 * z as f32;

    let tri_contexts: HashSet<(usize, usize)> =
        trigrams.iter().map(|&(x, y, _)| (x, y)).collect();
    let bi_backoff = |x: usize, y: usize| {
        if tri_contexts.contains(&(x, y)) {
            -0.1 - 0.01 * x as f32 - 0.02 * y as f32
        } else {
            0.0
        }
    };

    let mut text = String::new();
    text.push_str("\\data\\\n");
    text.push_str(&format!("ngram 1={}\n", tokens.len()));
    text.push_str(&format!("ngram 2={}\n", bigrams.len()));
    text.push_str(&format!("ngram 3={}\n", trigrams.len()));
    text.push_str("\n\\1-grams:\n");
    text.push_str("-4.5\t<unk>\n");
    for (i, t) in tokens.iter().enumerate().skip(1) {
        text.push_str(&format!("{}\t{}\t{}\n", uni_prob(i), t, uni_backoff(i)));
    }
    text.push_str("\n\\2-grams:\n");
    for &(x, y) in &bigrams {
        let backoff = bi_backoff(x, y);
        if backoff != 0.0 {
            text.push_str(&format!(
                "{}\t{} {}\t{}\n",
                bi_prob(x, y),
                tokens[x],
                tokens[y],
                backoff
            ));
        } else {
            text.push_str(&format!("{}\t{} {}\n", bi_prob(x, y), tokens[x], tokens[y]));
        }
    }
    text.push_str("\n\\3-grams:\n");
    for &(x, y, z) in &trigrams {
        text.push_str(&format!(
            "{}\t{} {} {}\n",
            tri_prob(x, y, z),
            tokens[x],
            tokens[y],
            tokens[z]
        ));
    }
    text.push_str("\n\\end\\\n");

    let mut probs = HashMap::new();
    let mut backoffs = HashMap::new();
    probs.insert("<unk>".to_string(), -4.5f32);
    for (i, t) in tokens.iter().enumerate().skip(1) {
        probs.insert(t.to_string(), uni_prob(i));
        backoffs.insert(t.to_string(), uni_backoff(i));
    }
    for &(x, y) in &bigrams {
        let gram = format!("{} {}", tokens[x], tokens[y]);
        probs.insert(gram.clone(), bi_prob(x, y));
        if bi_backoff(x, y) != 0.0 {
            backoffs.insert(gram, bi_backoff(x, y));
        }
    }
    for &(x, y, z) in &trigrams {
        probs.insert(
            format!("{} {} {}", tokens[x], tokens[y], tokens[z]),
            tri_prob(x, y, z),
        );
    }

    let reference = RefLm {
        vocab: tokens.iter().map(|t| t.to_string()).collect(),
        probs,
        backoffs,
        unk_prob: -4.5,
        order: 3,
    };
    (text, reference)
}

#[test]
fn trigram_models_match_reference_scorer() {
    let (text, reference) = synthetic_arpa();
    let words = ["a", "b", "c", "d", "e", "zz"];
    let mut rng = SmallRng::seed_from_u64(11);

    for ds in [
        DataStructureType::EfTrie,
        DataStructureType::PefTrie,
        DataStructureType::Hash,
    ] {
        let model = build(&text, &prob_config(3, ds));
        for _ in 0..40 {
            let len = rng.gen_range(1..15);
            let sentence: Vec<&str> =
                (0..len).map(|_| words[rng.gen_range(0..words.len())]).collect();
            let joined = sentence.join(" ");

            let (expected, expected_oovs) = reference.score_sentence(&sentence);
            let (got, got_oovs) = model.score_sentence(&joined).unwrap();
            assert_abs_diff_eq!(got, expected, epsilon = 1e-4);
            assert_eq!(got_oovs, expected_oovs, "sentence '{joined}'");

            // re-scoring from a fresh state is deterministic
            let (again, _) = model.score_sentence(&joined).unwrap();
            assert_eq!(got, again);
        }
    }
}

#[test]
fn remapped_prob_trie_matches_plain() {
    let (text, _) = synthetic_arpa();
    let plain = build(&text, &prob_config(3, DataStructureType::EfTrie));
    for remapping in [1u8, 2] {
        let mut config = prob_config(3, DataStructureType::EfTrie);
        config.remapping_order = remapping;
        let remapped = build(&text, &config);
        for sentence in ["a b c", "c d e a", "e e e e e", "b zz c d"] {
            let (p1, o1) = plain.score_sentence(sentence).unwrap();
            let (p2, o2) = remapped.score_sentence(sentence).unwrap();
            assert_abs_diff_eq!(p1, p2, epsilon = 1e-6);
            assert_eq!(o1, o2);
        }
    }
}

#[test]
fn save_load_roundtrip_scores_agree() {
    let (text, _) = synthetic_arpa();
    for ds in [
        DataStructureType::EfTrie,
        DataStructureType::PefTrie,
        DataStructureType::Hash,
    ] {
        let model = build(&text, &prob_config(3, ds));
        let mut bytes = Vec::new();
        let written = model.save(&mut bytes).unwrap();
        assert_eq!(written, bytes.len() as u64);

        let reloaded = Model::load(&mut bytes.as_slice()).unwrap();
        assert_eq!(reloaded.kind(), model.kind());
        for sentence in ["a b c d e", "e d c b a", "a zz b", "c"] {
            let (p1, o1) = model.score_sentence(sentence).unwrap();
            let (p2, o2) = reloaded.score_sentence(sentence).unwrap();
            assert_eq!(p1, p2, "sentence '{sentence}'");
            assert_eq!(o1, o2);
        }
    }
}

#[test]
fn count_model_refuses_scoring_and_vice_versa() {
    let (text, _) = synthetic_arpa();
    let prob = build(&text, &prob_config(3, DataStructureType::EfTrie));
    assert!(prob.lookup("a b").is_err());

    let source = gramdex::reader::counts::MemorySource::new(vec!["1\na\t1\n".into()]);
    let count = Model::build_count(
        &source,
        &BuildConfig::new(1, DataStructureType::EfTrie, ValueType::Count),
    )
    .unwrap();
    assert!(count.score_sentence("a").is_err());
}
