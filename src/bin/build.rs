use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use gramdex::{BuildConfig, Model};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DataStructure {
    EfTrie,
    PefTrie,
    Hash,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Value {
    Count,
    ProbBackoff,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Ranks {
    Ic,
    Psef,
    Pspef,
}

/// Build a compressed n-gram model and write it to a single binary file.
#[derive(Parser, Debug)]
struct Args {
    #[clap(value_enum)]
    data_structure: DataStructure,
    /// Maximum n-gram order, in [1, 8].
    order: u8,
    #[clap(value_enum)]
    value_type: Value,
    /// Directory with <k>-grams.sorted.gz count files (count models).
    #[clap(long, default_value = ".")]
    dir: PathBuf,
    /// Suffix-sorted ARPA file (prob models).
    #[clap(long)]
    arpa: Option<PathBuf>,
    /// Context remapping order, in [0, 2].
    #[clap(long, default_value_t = 0)]
    remapping: u8,
    /// Codec for count ranks.
    #[clap(long, value_enum, default_value_t = Ranks::Ic)]
    ranks: Ranks,
    /// Probability quantization bits, in [2, 32].
    #[clap(long = "p", default_value_t = gramdex::DEFAULT_PROBS_QUANTIZATION_BITS)]
    probs_quantization_bits: u8,
    /// Back-off quantization bits, in [2, 32].
    #[clap(long = "b", default_value_t = gramdex::DEFAULT_BACKOFFS_QUANTIZATION_BITS)]
    backoffs_quantization_bits: u8,
    /// Log10 probability for <unk>; must be negative.
    #[clap(long = "u", default_value_t = gramdex::DEFAULT_UNK_PROB)]
    unk_prob: f32,
    /// Verification-hash bytes per slot of hash models (4 or 8).
    #[clap(long, default_value_t = 8)]
    hash_key_bytes: u8,
    /// Output file; defaults to <model kind>.bin.
    #[clap(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let data_structure = match args.data_structure {
        DataStructure::EfTrie => gramdex::DataStructureType::EfTrie,
        DataStructure::PefTrie => gramdex::DataStructureType::PefTrie,
        DataStructure::Hash => gramdex::DataStructureType::Hash,
    };
    let value_type = match args.value_type {
        Value::Count => gramdex::ValueType::Count,
        Value::ProbBackoff => gramdex::ValueType::ProbBackoff,
    };

    let mut config = BuildConfig::new(args.order, data_structure, value_type);
    config.remapping_order = args.remapping;
    config.ranks_type = match args.ranks {
        Ranks::Ic => gramdex::RanksType::IndexedCodewords,
        Ranks::Psef => gramdex::RanksType::PrefixSummedEf,
        Ranks::Pspef => gramdex::RanksType::PrefixSummedPef,
    };
    config.probs_quantization_bits = args.probs_quantization_bits;
    config.backoffs_quantization_bits = args.backoffs_quantization_bits;
    config.unk_prob = args.unk_prob;
    config.hash_key_bytes = args.hash_key_bytes;

    let model = match value_type {
        gramdex::ValueType::Count => {
            if args.arpa.is_some() {
                tracing::warn!("option '--arpa' ignored with value type 'count'");
            }
            Model::build_count_dir(&args.dir, &config)?
        }
        gramdex::ValueType::ProbBackoff => {
            let arpa = args
                .arpa
                .context("building a prob model requires --arpa <file>")?;
            Model::build_prob_file(arpa, &config)?
        }
    };

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(format!("{}.bin", model.kind())));
    let bytes = model.save_to_file(&out)?;
    tracing::info!(
        model = %model.kind(),
        grams = model.len(),
        bytes,
        out = %out.display(),
        "model written"
    );
    Ok(())
}
