//! Minimal-perfect-hash function and the keyed tables built on it.

mod jenkins;
mod mphf;
mod tables;

pub use jenkins::Jenkins64;
pub use mphf::Mphf;
pub use tables::{DoubleValuedMpht, SingleValuedMpht, UintMpht};
