use core::fmt;

/// A 64-bit Snowflake identifier.
///
/// ```text
///  Bit Index:  63           63 62            22 21             12 11             0
///              +--------------+----------------+-----------------+---------------+
///  Field:      | reserved (1) | timestamp (41) | machine ID (10) | sequence (12) |
///              +--------------+----------------+-----------------+---------------+
///              |<----------- MSB ---------- 64 bits ----------- LSB ------------>|
/// ```
///
/// The reserved bit is always zero, so the id fits a signed 64-bit column and
/// sorts by generation time.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnowflakeId {
    id: u64,
}

impl SnowflakeId {
    pub const SEQUENCE_BITS: u64 = 12;
    pub const MACHINE_ID_BITS: u64 = 10;
    pub const TIMESTAMP_BITS: u64 = 41;

    pub const SEQUENCE_SHIFT: u64 = 0;
    pub const MACHINE_ID_SHIFT: u64 = Self::SEQUENCE_SHIFT + Self::SEQUENCE_BITS;
    pub const TIMESTAMP_SHIFT: u64 = Self::MACHINE_ID_SHIFT + Self::MACHINE_ID_BITS;

    pub const SEQUENCE_MASK: u64 = (1 << Self::SEQUENCE_BITS) - 1;
    pub const MACHINE_ID_MASK: u64 = (1 << Self::MACHINE_ID_BITS) - 1;
    pub const TIMESTAMP_MASK: u64 = (1 << Self::TIMESTAMP_BITS) - 1;

    /// Packs the components into an id. Each component is masked to its
    /// field width.
    pub const fn from_components(timestamp: u64, machine_id: u64, sequence: u64) -> Self {
        let t = (timestamp & Self::TIMESTAMP_MASK) << Self::TIMESTAMP_SHIFT;
        let m = (machine_id & Self::MACHINE_ID_MASK) << Self::MACHINE_ID_SHIFT;
        let s = (sequence & Self::SEQUENCE_MASK) << Self::SEQUENCE_SHIFT;
        Self { id: t | m | s }
    }

    /// Extracts bits [62:22].
    pub const fn timestamp(&self) -> u64 {
        (self.id >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK
    }

    /// Extracts bits [21:12].
    pub const fn machine_id(&self) -> u64 {
        (self.id >> Self::MACHINE_ID_SHIFT) & Self::MACHINE_ID_MASK
    }

    /// Extracts bits [11:0].
    pub const fn sequence(&self) -> u64 {
        (self.id >> Self::SEQUENCE_SHIFT) & Self::SEQUENCE_MASK
    }

    pub const fn max_timestamp() -> u64 {
        Self::TIMESTAMP_MASK
    }

    pub const fn max_machine_id() -> u64 {
        Self::MACHINE_ID_MASK
    }

    pub const fn max_sequence() -> u64 {
        Self::SEQUENCE_MASK
    }

    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    /// Returns `true` if another id fits in the current millisecond.
    pub const fn has_sequence_room(&self) -> bool {
        self.sequence() < Self::max_sequence()
    }

    /// Same millisecond, next sequence. Callers check
    /// [`Self::has_sequence_room`] first.
    pub const fn increment_sequence(&self) -> Self {
        Self::from_components(self.timestamp(), self.machine_id(), self.sequence() + 1)
    }

    /// Moves to a later millisecond and restarts the sequence at zero.
    pub const fn rollover_to_timestamp(&self, timestamp: u64) -> Self {
        Self::from_components(timestamp, self.machine_id(), 0)
    }
}

impl From<SnowflakeId> for u64 {
    fn from(id: SnowflakeId) -> Self {
        id.to_raw()
    }
}

impl From<u64> for SnowflakeId {
    fn from(raw: u64) -> Self {
        Self::from_raw(raw)
    }
}

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeId")
            .field("id", &self.id)
            .field("timestamp", &self.timestamp())
            .field("machine_id", &self.machine_id())
            .field("sequence", &self.sequence())
            .finish()
    }
}
