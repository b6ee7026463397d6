//! An atomic sampling reservoir.

use std::{
    cell::RefCell,
    sync::atomic::{
        AtomicU64, AtomicUsize,
        Ordering::{Acquire, Relaxed, Release},
    },
};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::snapshot::Snapshot;

/// Number of samples a reservoir retains unless configured otherwise.
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

thread_local! {
    static FAST_RNG: RefCell<Xoshiro256StarStar> =
        RefCell::new(Xoshiro256StarStar::from_rng(&mut rand::rng()));
}

fn fastrand(upper: usize) -> usize {
    FAST_RNG.with(|rng| rng.borrow_mut().random_range(0..upper))
}

/// A uniform sampling reservoir.
///
/// Retains at most `capacity` values.  Once full, the `n`th value pushed replaces a random slot
/// with probability `capacity / n`, so the retained values are a uniform sample of everything
/// ever pushed.  Reading does not reset the reservoir.
pub struct UniformReservoir {
    values: Box<[AtomicU64]>,
    count: AtomicUsize,
}

impl UniformReservoir {
    /// Creates a reservoir that retains at most `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        // Slots start as NaN so that a slot claimed but not yet written is skipped on read.
        let values = (0..capacity).map(|_| AtomicU64::new(f64::NAN.to_bits())).collect::<Vec<_>>();

        Self { values: values.into_boxed_slice(), count: AtomicUsize::new(0) }
    }

    /// Pushes a value into the reservoir.
    pub fn push(&self, value: f64) {
        let idx = self.count.fetch_add(1, Relaxed);
        if idx < self.values.len() {
            self.values[idx].store(value.to_bits(), Release);
        } else {
            let maybe_idx = fastrand(idx + 1);
            if maybe_idx < self.values.len() {
                self.values[maybe_idx].store(value.to_bits(), Release);
            }
        }
    }

    /// Number of values ever pushed.
    pub fn count(&self) -> usize {
        self.count.load(Relaxed)
    }

    /// Maximum number of values retained.
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Takes a sorted snapshot of the retained values.
    pub fn snapshot(&self) -> Snapshot {
        let len = self.count().min(self.values.len());
        let values = self.values[..len].iter().map(|v| f64::from_bits(v.load(Acquire))).collect();
        Snapshot::new(values)
    }
}

impl Default for UniformReservoir {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RESERVOIR_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::UniformReservoir;

    #[test]
    fn test_reservoir_under_capacity() {
        let reservoir = UniformReservoir::with_capacity(8);
        for value in [3.0, 1.0, 2.0] {
            reservoir.push(value);
        }

        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(reservoir.count(), 3);

        // Reading is not destructive.
        assert_eq!(reservoir.snapshot().len(), 3);
    }

    #[test]
    fn test_reservoir_over_capacity() {
        let reservoir = UniformReservoir::with_capacity(100);
        for value in 0..10_000 {
            reservoir.push(f64::from(value));
        }

        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert_eq!(reservoir.count(), 10_000);
        assert!(snapshot.values().iter().all(|v| (0.0..10_000.0).contains(v)));

        // With 10,000 values pushed into 100 slots, it is vanishingly unlikely that every
        // original value survived.
        assert!(snapshot.max() >= 100.0);
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let reservoir = UniformReservoir::with_capacity(0);
        reservoir.push(1.0);
        assert_eq!(reservoir.capacity(), 1);
        assert_eq!(reservoir.snapshot().values(), &[1.0]);
    }
}
