//! Compressed, read-optimized storage for large n-gram language models.
//!
//! A model is built once from pre-sorted text sources (gzipped count files
//! or an ARPA file), serialized into a single binary and then kept
//! memory-resident for lookups. Count models answer `lookup(gram) -> count`;
//! probability models answer `score(state, word) -> log10 prob` with
//! Katz-style back-off.
//!
//! The index is a trie of per-order sorted arrays: token-id sequences packed
//! as (partitioned) Elias-Fano codes, linked by Elias-Fano parent-pointer
//! sequences, with a minimal-perfect-hash vocabulary in front and quantized
//! value tables behind. See [`Model`] for the entry points.

pub mod bits;
pub mod config;
pub mod hashlm;
pub mod header;
pub mod model;
pub mod mph;
pub mod reader;
pub mod sequences;
pub mod state;
pub mod trie;
pub mod values;
pub mod vectors;

pub use config::{BuildConfig, DataStructureType, RanksType, ValueType};
pub use model::Model;
pub use reader::arpa::ArpaReadError;
pub use state::ScoreState;

/// Largest supported n-gram order.
pub const MAX_ORDER: u8 = 8;

/// Largest supported context-remapping order.
pub const MAX_REMAPPING_ORDER: u8 = 2;

/// Log10 probability assigned to `<unk>` when the ARPA file does not
/// provide one and the caller does not override it.
pub const DEFAULT_UNK_PROB: f32 = -100.0;

pub const DEFAULT_PROBS_QUANTIZATION_BITS: u8 = 8;
pub const DEFAULT_BACKOFFS_QUANTIZATION_BITS: u8 = 8;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Order must be in [1, {}], got {0}", MAX_ORDER)]
    InvalidOrder(u64),
    #[error("Remapping order must be in [0, {}], got {0}", MAX_REMAPPING_ORDER)]
    InvalidRemappingOrder(u64),
    #[error("Quantization bits must be in [2, 32], got {0}")]
    InvalidQuantizationBits(u8),
    #[error("The <unk> probability must be negative, got {0}")]
    InvalidUnkProb(f32),
    #[error("Malformed {order}-gram input: {msg}")]
    MalformedInput { order: u8, msg: String },
    #[error("Minimal-perfect-hash construction failed after {0} trials")]
    MphBuildFailure(usize),
    #[error("Rank table has no entry for value {0}; the input or the model is corrupt")]
    ValueNotFound(u64),
    #[error("Not a recognized model file: {0}")]
    CorruptModel(String),
    #[error("Model format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },
    #[error("The model file holds a {found} model but a {expected} model was requested")]
    WrongModelKind {
        found: &'static str,
        expected: &'static str,
    },
    #[error(transparent)]
    Arpa(#[from] reader::arpa::ArpaReadError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
