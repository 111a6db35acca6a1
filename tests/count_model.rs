//! End-to-end coverage of count models over tiny inline corpora.

use gramdex::reader::counts::MemorySource;
use gramdex::{BuildConfig, DataStructureType, Model, RanksType, ValueType};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn tiny_source() -> MemorySource {
    MemorySource::new(vec![
        "3\na\t3\nb\t2\nc\t1\n".into(),
        "3\na b\t2\na c\t1\nb c\t1\n".into(),
        "1\na b c\t1\n".into(),
    ])
}

fn all_trie_configs(order: u8, remapping: u8) -> Vec<BuildConfig> {
    let mut configs = Vec::new();
    for ds in [DataStructureType::EfTrie, DataStructureType::PefTrie] {
        for rt in [
            RanksType::IndexedCodewords,
            RanksType::PrefixSummedEf,
            RanksType::PrefixSummedPef,
        ] {
            let mut c = BuildConfig::new(order, ds, ValueType::Count);
            c.remapping_order = remapping;
            c.ranks_type = rt;
            configs.push(c);
        }
    }
    configs
}

#[test]
fn tiny_corpus_lookups() {
    for config in all_trie_configs(3, 0) {
        let model = Model::build_count(&tiny_source(), &config).unwrap();
        assert_eq!(model.lookup("a b c").unwrap(), Some(1));
        assert_eq!(model.lookup("a b").unwrap(), Some(2));
        assert_eq!(model.lookup("a c").unwrap(), Some(1));
        assert_eq!(model.lookup("b c").unwrap(), Some(1));
        assert_eq!(model.lookup("a").unwrap(), Some(3));
        assert_eq!(model.lookup("b").unwrap(), Some(2));
        assert_eq!(model.lookup("c").unwrap(), Some(1));

        assert_eq!(model.lookup("b a").unwrap(), None);
        assert_eq!(model.lookup("c c").unwrap(), None);
        assert_eq!(model.lookup("a b b").unwrap(), None);
        assert_eq!(model.lookup("d").unwrap(), None);
        assert_eq!(model.lookup("d a").unwrap(), None);
        assert_eq!(model.lookup("a b c a").unwrap(), None);
    }
}

#[test]
fn tiny_corpus_with_remapping() {
    for remapping in [1u8, 2] {
        for config in all_trie_configs(3, remapping) {
            let model = Model::build_count(&tiny_source(), &config).unwrap();
            assert_eq!(model.lookup("a b c").unwrap(), Some(1), "remapping {remapping}");
            assert_eq!(model.lookup("a b").unwrap(), Some(2));
            assert_eq!(model.lookup("a").unwrap(), Some(3));
            assert_eq!(model.lookup("b a").unwrap(), None);
            assert_eq!(model.lookup("a c b").unwrap(), None);
        }
    }
}

#[test]
fn hash_model_matches_trie() {
    let mut hash_config = BuildConfig::new(3, DataStructureType::Hash, ValueType::Count);
    for key_bytes in [4u8, 8] {
        hash_config.hash_key_bytes = key_bytes;
        let model = Model::build_count(&tiny_source(), &hash_config).unwrap();
        assert_eq!(model.lookup("a b c").unwrap(), Some(1));
        assert_eq!(model.lookup("b c").unwrap(), Some(1));
        assert_eq!(model.lookup("b").unwrap(), Some(2));
        assert_eq!(model.lookup("b a").unwrap(), None);
        assert_eq!(model.lookup("z").unwrap(), None);
    }
}

#[test]
fn order_one_model() {
    let source = MemorySource::new(vec!["2\nhello\t10\nworld\t4\n".into()]);
    let config = BuildConfig::new(1, DataStructureType::EfTrie, ValueType::Count);
    let model = Model::build_count(&source, &config).unwrap();
    assert_eq!(model.lookup("hello").unwrap(), Some(10));
    assert_eq!(model.lookup("world").unwrap(), Some(4));
    assert_eq!(model.lookup("nope").unwrap(), None);
    assert_eq!(model.lookup("hello world").unwrap(), None);
}

/// A corpus wide enough to exercise the sampled search trees (one parent
/// with hundreds of children) and both partition-size regimes.
fn wide_corpus() -> (MemorySource, Vec<(String, u64)>) {
    let n_tokens = 300usize;
    let tokens: Vec<String> = (0..n_tokens).map(|i| format!("w{i:03}")).collect();

    let mut unigrams = String::new();
    unigrams.push_str(&format!("{n_tokens}\n"));
    let mut grams: Vec<(String, u64)> = Vec::new();
    for (i, t) in tokens.iter().enumerate() {
        let count = (n_tokens - i) as u64;
        unigrams.push_str(&format!("{t}\t{count}\n"));
        grams.push((t.clone(), count));
    }

    // parent w000 gets 200 children, the rest a few each
    let mut bigram_lines: Vec<(String, u64)> = Vec::new();
    for j in 1..=200usize {
        bigram_lines.push((format!("w000 {}", tokens[j]), (j % 7 + 1) as u64));
    }
    for i in 1..60usize {
        for j in (i..i + 9).step_by(3) {
            bigram_lines.push((format!("{} {}", tokens[i], tokens[j % n_tokens]), (i % 5 + 1) as u64));
        }
    }
    let mut bigrams = String::new();
    bigrams.push_str(&format!("{}\n", bigram_lines.len()));
    for (g, c) in &bigram_lines {
        bigrams.push_str(&format!("{g}\t{c}\n"));
        grams.push((g.clone(), *c));
    }

    // trigrams whose suffix bigrams all exist, so context remapping can
    // resolve every last token
    let mut trigram_lines: Vec<(String, u64)> = Vec::new();
    for i in 1..60usize {
        for j in (i..i + 9).step_by(3) {
            trigram_lines.push((
                format!("w000 {} {}", tokens[i], tokens[j % n_tokens]),
                (j % 3 + 1) as u64,
            ));
        }
    }
    let mut trigrams = String::new();
    trigrams.push_str(&format!("{}\n", trigram_lines.len()));
    for (g, c) in &trigram_lines {
        trigrams.push_str(&format!("{g}\t{c}\n"));
        grams.push((g.clone(), *c));
    }

    (
        MemorySource::new(vec![unigrams, bigrams, trigrams]),
        grams,
    )
}

#[test]
fn wide_corpus_all_grams_found() {
    let (source, grams) = wide_corpus();
    for remapping in [0u8, 1] {
        for config in all_trie_configs(3, remapping) {
            let model = Model::build_count(&source, &config).unwrap();
            for (gram, count) in &grams {
                assert_eq!(
                    model.lookup(gram).unwrap(),
                    Some(*count),
                    "gram '{gram}' remapping {remapping}"
                );
            }
            assert_eq!(model.lookup("w000 w000").unwrap(), None);
            assert_eq!(model.lookup("w299 w299 w299").unwrap(), None);
        }
    }
}

#[test]
fn save_load_roundtrip_agrees_on_random_grams() {
    let (source, grams) = wide_corpus();
    let mut config = BuildConfig::new(3, DataStructureType::EfTrie, ValueType::Count);
    config.ranks_type = RanksType::PrefixSummedEf;

    let model = Model::build_count(&source, &config).unwrap();
    let mut bytes = Vec::new();
    let written = model.save(&mut bytes).unwrap();
    assert_eq!(written, bytes.len() as u64);

    let reloaded = Model::load(&mut bytes.as_slice()).unwrap();
    assert_eq!(reloaded.kind(), model.kind());
    assert_eq!(reloaded.order(), model.order());
    assert_eq!(reloaded.len(), model.len());

    let mut rng = SmallRng::seed_from_u64(42);
    for _ in 0..1000 {
        let (gram, _) = &grams[rng.gen_range(0..grams.len())];
        assert_eq!(reloaded.lookup(gram).unwrap(), model.lookup(gram).unwrap());
    }
    // absent grams agree too
    for _ in 0..200 {
        let gram = format!("w{:03} w{:03}", rng.gen_range(200..300), rng.gen_range(200..300));
        assert_eq!(reloaded.lookup(&gram).unwrap(), model.lookup(&gram).unwrap());
    }
}

#[test]
fn corrupt_streams_are_rejected() {
    let source = tiny_source();
    let config = BuildConfig::new(3, DataStructureType::EfTrie, ValueType::Count);
    let model = Model::build_count(&source, &config).unwrap();
    let mut bytes = Vec::new();
    model.save(&mut bytes).unwrap();

    // bad version byte
    let mut tampered = bytes.clone();
    tampered[1] = 0xee;
    assert!(matches!(
        Model::load(&mut tampered.as_slice()),
        Err(gramdex::Error::UnsupportedVersion { .. })
    ));

    // truncated stream
    let truncated = &bytes[..bytes.len() / 2];
    assert!(Model::load(&mut &truncated[..]).is_err());

    // empty stream
    assert!(Model::load(&mut &[][..]).is_err());
}

#[test]
fn malformed_inputs_abort_the_build() {
    // bigram whose context is missing from the unigram file
    let source = MemorySource::new(vec![
        "2\na\t2\nb\t1\n".into(),
        "1\nz b\t1\n".into(),
    ]);
    let config = BuildConfig::new(2, DataStructureType::EfTrie, ValueType::Count);
    assert!(matches!(
        Model::build_count(&source, &config),
        Err(gramdex::Error::MalformedInput { order: 2, .. })
    ));

    // gram count header larger than the actual line count
    let source = MemorySource::new(vec!["3\na\t2\nb\t1\n".into()]);
    let config = BuildConfig::new(1, DataStructureType::EfTrie, ValueType::Count);
    assert!(Model::build_count(&source, &config).is_err());
}
