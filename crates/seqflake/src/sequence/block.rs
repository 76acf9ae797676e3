/// Values reserved from a named counter but not yet handed out.
///
/// A block covers the contiguous range `first..=last` produced by one CAS
/// round and is drained front to back. Whatever is left when the process
/// exits is lost, leaving a gap in the counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingBlock {
    next: i64,
    last: i64,
    empty: bool,
}

impl Default for PendingBlock {
    fn default() -> Self {
        Self::empty()
    }
}

impl PendingBlock {
    pub const fn empty() -> Self {
        Self {
            next: 0,
            last: 0,
            empty: true,
        }
    }

    /// Replaces the contents with `previous + 1 ..= current`, the values a
    /// successful CAS from `previous` to `current` reserved.
    pub fn refill(&mut self, previous: i64, current: i64) {
        debug_assert!(current > previous, "a reservation must advance the counter");
        *self = Self {
            next: previous + 1,
            last: current,
            empty: false,
        };
    }

    /// Takes the lowest reserved value.
    pub fn pop(&mut self) -> Option<i64> {
        if self.empty {
            return None;
        }
        let value = self.next;
        if value == self.last {
            self.empty = true;
        } else {
            self.next += 1;
        }
        Some(value)
    }

    pub const fn is_empty(&self) -> bool {
        self.empty
    }

    pub const fn remaining(&self) -> u64 {
        if self.empty {
            0
        } else {
            self.last.abs_diff(self.next) + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_order() {
        let mut block = PendingBlock::empty();
        assert_eq!(block.pop(), None);

        block.refill(100, 105);
        assert_eq!(block.remaining(), 5);

        let drained: Vec<_> = core::iter::from_fn(|| block.pop()).collect();
        assert_eq!(drained, vec![101, 102, 103, 104, 105]);
        assert!(block.is_empty());
        assert_eq!(block.remaining(), 0);
    }

    #[test]
    fn single_value_block() {
        let mut block = PendingBlock::empty();
        block.refill(7, 8);
        assert_eq!(block.pop(), Some(8));
        assert_eq!(block.pop(), None);
    }

    #[test]
    fn reaches_i64_max_without_overflow() {
        let mut block = PendingBlock::empty();
        block.refill(i64::MAX - 2, i64::MAX);
        assert_eq!(block.pop(), Some(i64::MAX - 1));
        assert_eq!(block.pop(), Some(i64::MAX));
        assert_eq!(block.pop(), None);
    }
}
