#![doc = include_str!("../README.md")]

pub mod common;
pub use common::*;
// Public re-export so downstream crates can access `seqflake` via
// `seqflake_tonic_core::seqflake`
pub use seqflake;
