//! Throughput tracking with exponentially-weighted moving averages.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::Mutex;
use quanta::{Clock, Instant};

use crate::handles::{MeterFn, Rates};

/// How often the moving averages are decayed.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// An exponentially-weighted moving average of a per-second rate.
#[derive(Debug)]
struct Ewma {
    alpha: f64,
    rate: f64,
    initialized: bool,
}

impl Ewma {
    fn over_minutes(minutes: f64) -> Self {
        let alpha = 1.0 - (-TICK_INTERVAL.as_secs_f64() / 60.0 / minutes).exp();
        Ewma { alpha, rate: 0.0, initialized: false }
    }

    fn tick(&mut self, count: u64) {
        let instant_rate = count as f64 / TICK_INTERVAL.as_secs_f64();
        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }
}

#[derive(Debug)]
struct Averages {
    last_tick: Instant,
    one_minute: Ewma,
    five_minute: Ewma,
    fifteen_minute: Ewma,
}

/// A meter backed by atomics and 1/5/15-minute moving averages.
///
/// Marks are accumulated without locking.  The averages are brought up to date lazily, whenever a
/// mark or a read notices that one or more tick intervals have elapsed.
#[derive(Debug)]
pub struct EwmaMeter {
    clock: Clock,
    start: Instant,
    count: AtomicU64,
    uncounted: AtomicU64,
    averages: Mutex<Averages>,
}

impl EwmaMeter {
    /// Creates an `EwmaMeter` that reads time from `clock`.
    pub fn new(clock: Clock) -> Self {
        let start = clock.now();
        EwmaMeter {
            clock,
            start,
            count: AtomicU64::new(0),
            uncounted: AtomicU64::new(0),
            averages: Mutex::new(Averages {
                last_tick: start,
                one_minute: Ewma::over_minutes(1.0),
                five_minute: Ewma::over_minutes(5.0),
                fifteen_minute: Ewma::over_minutes(15.0),
            }),
        }
    }

    fn tick_if_necessary(&self) {
        let now = self.clock.now();
        let mut averages = self.averages.lock();
        let age = now.duration_since(averages.last_tick);
        let ticks = age.as_nanos() / TICK_INTERVAL.as_nanos();
        if ticks == 0 {
            return;
        }

        averages.last_tick = averages.last_tick + TICK_INTERVAL * ticks as u32;

        // Everything marked since the last tick lands in the first elapsed interval; any further
        // intervals saw no events.
        let mut pending = self.uncounted.swap(0, Ordering::AcqRel);
        for _ in 0..ticks {
            averages.one_minute.tick(pending);
            averages.five_minute.tick(pending);
            averages.fifteen_minute.tick(pending);
            pending = 0;
        }
    }

    fn mean_rate(&self, count: u64) -> f64 {
        if count == 0 {
            return 0.0;
        }

        let elapsed = self.clock.now().duration_since(self.start).as_secs_f64();
        if elapsed <= 0.0 {
            0.0
        } else {
            count as f64 / elapsed
        }
    }
}

impl Default for EwmaMeter {
    fn default() -> Self {
        EwmaMeter::new(Clock::new())
    }
}

impl MeterFn for EwmaMeter {
    fn mark(&self, n: u64) {
        self.tick_if_necessary();
        self.count.fetch_add(n, Ordering::AcqRel);
        self.uncounted.fetch_add(n, Ordering::AcqRel);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    fn rates(&self) -> Rates {
        self.tick_if_necessary();
        let count = self.count();
        let averages = self.averages.lock();
        Rates {
            mean: self.mean_rate(count),
            one_minute: averages.one_minute.rate,
            five_minute: averages.five_minute.rate,
            fifteen_minute: averages.fifteen_minute.rate,
        }
    }
}
