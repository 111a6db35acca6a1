//! MPH-only models: one hash table per order keyed on whole-gram bytes.
//! Larger than the tries but with single-probe lookups.

mod count;
mod prob;

pub use count::MphCountLm;
pub use prob::MphProbLm;
