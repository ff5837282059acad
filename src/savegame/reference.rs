//! Persisting relationships between pooled entities.
//!
//! Live references are pool indices. On disk they are `u16` values with
//! [`NO_REFERENCE`] standing for "none". Absolute tick counts are stored
//! relative to the clock of the call that wrote them.

use log::warn;

/// Encoded "no reference".
pub const NO_REFERENCE: u16 = 0xFFFF;

/// Index newtype of a fixed-capacity pool.
pub trait PoolIndex: Copy {
    const CAPACITY: usize;
    const POOL: &'static str;

    fn index(self) -> usize;
    fn from_index(index: usize) -> Self;
}

pub fn encode<R: PoolIndex>(reference: Option<R>) -> u16 {
    match reference {
        Some(r) => r.index() as u16,
        None => NO_REFERENCE,
    }
}

/// Indices outside the pool decode to `None` rather than failing the load.
pub fn decode<R: PoolIndex>(raw: u16) -> Option<R> {
    if raw == NO_REFERENCE {
        return None;
    }
    if (raw as usize) < R::CAPACITY {
        Some(R::from_index(raw as usize))
    } else {
        warn!(
            "Dropping out-of-range {} reference {} (capacity {})",
            R::POOL,
            raw,
            R::CAPACITY
        );
        None
    }
}

/// Store an absolute tick as its distance from `clock`.
pub fn clock_delta(clock: u32, absolute: u32) -> u32 {
    clock.wrapping_sub(absolute)
}

/// Rebuild an absolute tick from a stored distance and the current clock.
pub fn clock_absolute(clock: u32, delta: u32) -> u32 {
    clock.wrapping_sub(delta)
}

/// A value decoded while its consumer is not ready yet.
///
/// Loaders [`stage`](Deferred::stage) it and a later initialisation phase
/// [`take`](Deferred::take)s it to apply to the live field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred<V> {
    pending: Option<V>,
}

impl<V> Default for Deferred<V> {
    fn default() -> Self {
        Deferred { pending: None }
    }
}

impl<V> Deferred<V> {
    pub fn stage(&mut self, value: V) {
        self.pending = Some(value);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn take(&mut self) -> Option<V> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Slot(usize);

    impl PoolIndex for Slot {
        const CAPACITY: usize = 8;
        const POOL: &'static str = "slot";

        fn index(self) -> usize {
            self.0
        }

        fn from_index(index: usize) -> Self {
            Slot(index)
        }
    }

    #[test_log::test]
    fn references_round_trip() {
        assert_eq!(decode::<Slot>(encode(Some(Slot(5)))), Some(Slot(5)));
        assert_eq!(encode::<Slot>(None), NO_REFERENCE);
        assert_eq!(decode::<Slot>(NO_REFERENCE), None);
    }

    #[test_log::test]
    fn out_of_range_decodes_to_none() {
        assert_eq!(decode::<Slot>(7), Some(Slot(7)));
        assert_eq!(decode::<Slot>(8), None);
        assert_eq!(decode::<Slot>(0x1234), None);
    }

    #[test_log::test]
    fn clock_relative_ticks_follow_the_clock() {
        let delta = clock_delta(10_000, 9_250);
        assert_eq!(delta, 750);
        assert_eq!(clock_absolute(50, delta), 50u32.wrapping_sub(750));
        assert_eq!(clock_absolute(10_000, delta), 9_250);
    }

    #[test_log::test]
    fn deferred_values_are_taken_once() {
        let mut deferred = Deferred::default();
        assert!(!deferred.is_pending());
        deferred.stage(3u16);
        assert!(deferred.is_pending());
        assert_eq!(deferred.take(), Some(3));
        assert_eq!(deferred.take(), None);
    }
}
