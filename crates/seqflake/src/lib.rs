#![doc = include_str!("../README.md")]

mod backoff;
mod error;
mod futures;
mod generator;
mod id;
mod machine;
mod pool;
mod sequence;
mod status;
mod store;
mod time;

pub use crate::backoff::*;
pub use crate::error::*;
pub use crate::futures::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::machine::*;
pub use crate::pool::*;
pub use crate::sequence::*;
pub use crate::status::*;
pub use crate::store::*;
pub use crate::time::*;
