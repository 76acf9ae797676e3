//! Id, clock and generator types shared by the server and its clients.
//!
//! The id layout is fixed at compile time: 1 unused bit, 41 bits of
//! milliseconds since the configured epoch, 10 bits of machine id and 12 bits
//! of sequence. A client decoding `GetUUID` responses relies on this
//! contract.

use seqflake::{BasicSnowflakeGenerator, SystemClock};

pub use seqflake::SnowflakeId;

/// Wall clock used by the uuid worker.
pub type Clock = SystemClock;

/// The generator owned by the uuid worker.
pub type Generator = BasicSnowflakeGenerator<Clock>;
