//! Backing storage for registry-created instruments.
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use quanta::Clock;

use crate::{
    handles::{Counter, HistogramFn, Histogram, Meter, MeterFn, Rates, Timer, TimerFn},
    id::MetricId,
    snapshot::Snapshot,
};

mod meter;
pub use self::meter::{EwmaMeter, TICK_INTERVAL};

mod reservoir;
pub use self::reservoir::{UniformReservoir, DEFAULT_RESERVOIR_SIZE};

/// Defines the underlying storage for metrics as well as how to create them.
///
/// Gauges are always supplied by the caller, so there is no gauge constructor.
pub trait Storage: Send + Sync {
    /// Creates an empty counter.
    fn counter(&self, id: &MetricId) -> Counter;

    /// Creates an empty histogram.
    fn histogram(&self, id: &MetricId) -> Histogram;

    /// Creates an empty meter.
    fn meter(&self, id: &MetricId) -> Meter;

    /// Creates an empty timer.
    fn timer(&self, id: &MetricId) -> Timer;
}

/// Atomic metric storage.
///
/// Utilizes atomics for storing the value(s) of a given metric.  Shared access to the actual atomic
/// is handled via `Arc`.
#[derive(Clone, Debug)]
pub struct AtomicStorage {
    clock: Clock,
    reservoir_size: usize,
}

impl AtomicStorage {
    /// Creates an `AtomicStorage` with the default reservoir size and the system clock.
    pub fn new() -> Self {
        AtomicStorage { clock: Clock::new(), reservoir_size: DEFAULT_RESERVOIR_SIZE }
    }

    /// Sets the number of samples retained by each histogram and timer.
    ///
    /// Defaults to 1028.
    #[must_use]
    pub fn with_reservoir_size(mut self, size: usize) -> Self {
        self.reservoir_size = size;
        self
    }

    /// Sets the clock used by meters and timers to compute rates.
    ///
    /// Mostly useful in tests, paired with [`Clock::mock`].
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for AtomicStorage {
    fn default() -> Self {
        AtomicStorage::new()
    }
}

impl Storage for AtomicStorage {
    fn counter(&self, _: &MetricId) -> Counter {
        Counter::from_arc(Arc::new(AtomicU64::new(0)))
    }

    fn histogram(&self, _: &MetricId) -> Histogram {
        Histogram::from_arc(Arc::new(AtomicHistogram::with_reservoir_size(self.reservoir_size)))
    }

    fn meter(&self, _: &MetricId) -> Meter {
        Meter::from_arc(Arc::new(EwmaMeter::new(self.clock.clone())))
    }

    fn timer(&self, _: &MetricId) -> Timer {
        Timer::from_arc(Arc::new(AtomicTimer::new(self.clock.clone(), self.reservoir_size)))
    }
}

/// A histogram with an exact count and sum, and a sampled reservoir of values.
pub struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    reservoir: UniformReservoir,
}

impl AtomicHistogram {
    /// Creates an `AtomicHistogram` retaining at most `size` samples.
    pub fn with_reservoir_size(size: usize) -> Self {
        AtomicHistogram {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0.0f64.to_bits()),
            reservoir: UniformReservoir::with_capacity(size),
        }
    }
}

impl Default for AtomicHistogram {
    fn default() -> Self {
        AtomicHistogram::with_reservoir_size(DEFAULT_RESERVOIR_SIZE)
    }
}

impl HistogramFn for AtomicHistogram {
    fn update(&self, value: f64) {
        self.count.fetch_add(1, Ordering::AcqRel);
        let _ = self.sum.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |curr| {
            Some((f64::from_bits(curr) + value).to_bits())
        });
        self.reservoir.push(value);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    fn sum(&self) -> f64 {
        f64::from_bits(self.sum.load(Ordering::Acquire))
    }

    fn snapshot(&self) -> Snapshot {
        self.reservoir.snapshot()
    }
}

/// A timer: a nanosecond histogram of durations plus a meter of how often they are recorded.
pub struct AtomicTimer {
    elapsed_ns: AtomicU64,
    durations: AtomicHistogram,
    meter: EwmaMeter,
}

impl AtomicTimer {
    /// Creates an `AtomicTimer` reading time from `clock` and retaining at most `reservoir_size`
    /// samples.
    pub fn new(clock: Clock, reservoir_size: usize) -> Self {
        AtomicTimer {
            elapsed_ns: AtomicU64::new(0),
            durations: AtomicHistogram::with_reservoir_size(reservoir_size),
            meter: EwmaMeter::new(clock),
        }
    }
}

impl TimerFn for AtomicTimer {
    fn update(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_ns.fetch_add(nanos, Ordering::AcqRel);
        self.durations.update(nanos as f64);
        self.meter.mark(1);
    }

    fn count(&self) -> u64 {
        self.durations.count()
    }

    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::Acquire))
    }

    fn snapshot(&self) -> Snapshot {
        self.durations.snapshot()
    }

    fn rates(&self) -> Rates {
        self.meter.rates()
    }
}
