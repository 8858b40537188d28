//! Identities of watched entities and CPU masks.

use serde::{Deserialize, Serialize};

/// Opaque identity of an OS task.
///
/// Platforms decide how task ids map onto their scheduler; the watchdog only
/// compares them for equality and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Wrap a raw task id.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw task id.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Handle returned when a named user subscribes to the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserHandle(u64);

impl UserHandle {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

/// Key of a watched entity: either a task or a named user.
///
/// Ordering places all tasks before all users, each ascending by id, which
/// is the order diagnostics are printed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Identity {
    /// An OS task.
    Task(TaskId),
    /// A named logical user.
    User(UserHandle),
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task(task) => task.fmt(f),
            Self::User(user) => user.fmt(f),
        }
    }
}

/// Bitmask of CPU cores. Bit `n` stands for core `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoreMask(u32);

impl CoreMask {
    /// No cores.
    pub const EMPTY: Self = Self(0);

    /// Highest core count a mask can describe.
    pub const MAX_CORES: u32 = u32::BITS;

    /// Mask from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Mask containing only `core`; empty if `core` is out of range.
    #[must_use]
    pub fn single(core: u32) -> Self {
        Self(1u32.checked_shl(core).unwrap_or(0))
    }

    /// Mask containing cores `0..count`.
    #[must_use]
    pub fn all(count: u32) -> Self {
        match 1u32.checked_shl(count) {
            Some(bit) => Self(bit.wrapping_sub(1)),
            None => Self(u32::MAX),
        }
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether no core is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether `core` is set.
    #[must_use]
    pub fn contains(self, core: u32) -> bool {
        !Self::single(core).is_empty() && self.0 & Self::single(core).0 != 0
    }

    /// Whether every core of `other` is also set in `self`.
    #[must_use]
    pub const fn is_superset_of(self, other: Self) -> bool {
        other.0 & !self.0 == 0
    }

    /// Set `core`.
    pub fn insert(&mut self, core: u32) {
        self.0 |= Self::single(core).0;
    }

    /// Clear `core`.
    pub fn remove(&mut self, core: u32) {
        self.0 &= !Self::single(core).0;
    }

    /// Cores set in either mask.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Cores set in `self` but not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Number of cores set.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate over the set cores in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u32> {
        (0..Self::MAX_CORES).filter(move |core| self.contains(*core))
    }
}

impl std::fmt::Display for CoreMask {
    /// Formats as `0/1/3`, or `-` for an empty mask.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        for (i, core) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{core}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_mask_bits() {
        assert_eq!(CoreMask::single(0).bits(), 0b1);
        assert_eq!(CoreMask::single(3).bits(), 0b1000);
        assert!(CoreMask::single(32).is_empty());
        assert_eq!(CoreMask::all(2).bits(), 0b11);
        assert_eq!(CoreMask::all(0), CoreMask::EMPTY);
        assert_eq!(CoreMask::all(32).bits(), u32::MAX);
        assert_eq!(CoreMask::all(40).bits(), u32::MAX);
    }

    #[test]
    fn test_core_mask_set_operations() {
        let mut mask = CoreMask::EMPTY;
        mask.insert(1);
        mask.insert(4);
        assert!(mask.contains(1));
        assert!(!mask.contains(0));
        assert!(!mask.contains(99));
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![1, 4]);

        mask.remove(1);
        assert_eq!(mask.bits(), 0b1_0000);

        let other = CoreMask::from_bits(0b1_0011);
        assert_eq!(mask.union(other).bits(), 0b1_0011);
        assert_eq!(other.difference(mask).bits(), 0b11);
        assert!(CoreMask::all(8).is_superset_of(other));
        assert!(!CoreMask::all(2).is_superset_of(other));
    }

    #[test]
    fn test_core_mask_display() {
        assert_eq!(CoreMask::EMPTY.to_string(), "-");
        assert_eq!(CoreMask::single(0).to_string(), "0");
        assert_eq!(CoreMask::from_bits(0b1011).to_string(), "0/1/3");
    }

    #[test]
    fn test_identity_ordering_puts_tasks_first() {
        let mut ids = [
            Identity::User(UserHandle::new(1)),
            Identity::Task(TaskId::from_raw(9)),
            Identity::Task(TaskId::from_raw(2)),
            Identity::User(UserHandle::new(0)),
        ];
        ids.sort();
        assert_eq!(
            ids,
            [
                Identity::Task(TaskId::from_raw(2)),
                Identity::Task(TaskId::from_raw(9)),
                Identity::User(UserHandle::new(0)),
                Identity::User(UserHandle::new(1)),
            ]
        );
        assert_eq!(ids[0].to_string(), "task#2");
        assert_eq!(ids[3].to_string(), "user#1");
    }
}
