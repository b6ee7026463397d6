use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use quanta::Instant;

use crate::{metadata::MetricType, snapshot::Snapshot};

/// Throughput rates, in events per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rates {
    /// Rate since the instrument was created.
    pub mean: f64,
    /// Exponentially-weighted moving average over one minute.
    pub one_minute: f64,
    /// Exponentially-weighted moving average over five minutes.
    pub five_minute: f64,
    /// Exponentially-weighted moving average over fifteen minutes.
    pub fifteen_minute: f64,
}

/// A counter handler.
pub trait CounterFn: Send + Sync {
    /// Adds `value`.
    fn increment(&self, value: u64);

    /// Gets the current count.
    fn count(&self) -> u64;
}

/// A gauge handler.
pub trait GaugeFn: Send + Sync {
    /// Gets the current value.
    fn value(&self) -> f64;
}

/// A histogram handler.
pub trait HistogramFn: Send + Sync {
    /// Adds a sample.
    fn update(&self, value: f64);

    /// Gets the number of values recorded.
    fn count(&self) -> u64;

    /// Gets the sum of every value recorded.
    fn sum(&self) -> f64;

    /// Gets a snapshot of the retained samples.
    fn snapshot(&self) -> Snapshot;
}

/// A meter handler.
pub trait MeterFn: Send + Sync {
    /// Marks the occurrence of `n` events.
    fn mark(&self, n: u64);

    /// Gets the number of events marked.
    fn count(&self) -> u64;

    /// Gets the current throughput rates.
    fn rates(&self) -> Rates;
}

/// A timer handler.
pub trait TimerFn: Send + Sync {
    /// Records a duration.
    fn update(&self, duration: Duration);

    /// Gets the number of durations recorded.
    fn count(&self) -> u64;

    /// Gets the sum of every duration recorded.
    fn elapsed(&self) -> Duration;

    /// Gets a snapshot of the retained samples, in nanoseconds.
    fn snapshot(&self) -> Snapshot;

    /// Gets the current throughput rates.
    fn rates(&self) -> Rates;
}

impl CounterFn for AtomicU64 {
    fn increment(&self, value: u64) {
        let _ = self.fetch_add(value, Ordering::Release);
    }

    fn count(&self) -> u64 {
        self.load(Ordering::Acquire)
    }
}

impl<F> GaugeFn for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn value(&self) -> f64 {
        (self)()
    }
}

/// A gauge whose value is set directly by the caller.
#[derive(Debug, Default)]
pub struct AtomicGauge(AtomicU64);

impl AtomicGauge {
    /// Creates an `AtomicGauge` holding `value`.
    pub fn new(value: f64) -> Self {
        AtomicGauge(AtomicU64::new(value.to_bits()))
    }

    /// Replaces the current value.
    pub fn set(&self, value: f64) {
        let _ = self.0.swap(value.to_bits(), Ordering::AcqRel);
    }

    /// Adds `value`.
    pub fn increment(&self, value: f64) {
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |curr| {
            Some((f64::from_bits(curr) + value).to_bits())
        });
    }

    /// Subtracts `value`.
    pub fn decrement(&self, value: f64) {
        self.increment(-value);
    }
}

impl GaugeFn for AtomicGauge {
    fn value(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}

/// A counter.
#[derive(Clone)]
pub struct Counter {
    inner: Arc<dyn CounterFn>,
}

/// A gauge.
#[derive(Clone)]
pub struct Gauge {
    inner: Arc<dyn GaugeFn>,
}

/// A histogram.
#[derive(Clone)]
pub struct Histogram {
    inner: Arc<dyn HistogramFn>,
}

/// A meter.
#[derive(Clone)]
pub struct Meter {
    inner: Arc<dyn MeterFn>,
}

/// A timer.
#[derive(Clone)]
pub struct Timer {
    inner: Arc<dyn TimerFn>,
}

impl Counter {
    /// Wraps a shared counter backend.
    pub fn from_arc<F: CounterFn + 'static>(a: Arc<F>) -> Self {
        Self { inner: a }
    }

    /// Adds one.
    pub fn inc(&self) {
        self.inner.increment(1)
    }

    /// Adds `value` to the count.
    pub fn increment(&self, value: u64) {
        self.inner.increment(value)
    }

    /// Gets the current count.
    pub fn count(&self) -> u64 {
        self.inner.count()
    }

    /// Whether or not both handles point at the same underlying counter.
    pub fn ptr_eq(&self, other: &Counter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Gauge {
    /// Wraps a shared gauge backend.
    pub fn from_arc<F: GaugeFn + 'static>(a: Arc<F>) -> Self {
        Self { inner: a }
    }

    /// Creates a `Gauge` that reads its value from `f`.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Gets the current value.
    pub fn value(&self) -> f64 {
        self.inner.value()
    }
}

impl Histogram {
    /// Wraps a shared histogram backend.
    pub fn from_arc<F: HistogramFn + 'static>(a: Arc<F>) -> Self {
        Self { inner: a }
    }

    /// Adds a sample.
    pub fn update<T: Into<f64>>(&self, value: T) {
        self.inner.update(value.into())
    }

    /// Gets the number of values recorded.
    pub fn count(&self) -> u64 {
        self.inner.count()
    }

    /// Gets the sum of every value recorded.
    pub fn sum(&self) -> f64 {
        self.inner.sum()
    }

    /// Gets a snapshot of the retained samples.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot()
    }
}

impl Meter {
    /// Creates a `Meter` based on a shared handler.
    pub fn from_arc<F: MeterFn + 'static>(a: Arc<F>) -> Self {
        Self { inner: a }
    }

    /// Marks a single event.
    pub fn mark(&self) {
        self.inner.mark(1)
    }

    /// Marks `n` events.
    pub fn mark_n(&self, n: u64) {
        self.inner.mark(n)
    }

    /// Gets the number of events marked.
    pub fn count(&self) -> u64 {
        self.inner.count()
    }

    /// Gets the current throughput rates.
    pub fn rates(&self) -> Rates {
        self.inner.rates()
    }

    /// Gets the mean rate since creation, in events per second.
    pub fn mean_rate(&self) -> f64 {
        self.rates().mean
    }

    /// Gets the one-minute moving average rate, in events per second.
    pub fn one_minute_rate(&self) -> f64 {
        self.rates().one_minute
    }

    /// Gets the five-minute moving average rate, in events per second.
    pub fn five_minute_rate(&self) -> f64 {
        self.rates().five_minute
    }

    /// Gets the fifteen-minute moving average rate, in events per second.
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.rates().fifteen_minute
    }
}

impl Timer {
    /// Creates a `Timer` based on a shared handler.
    pub fn from_arc<F: TimerFn + 'static>(a: Arc<F>) -> Self {
        Self { inner: a }
    }

    /// Records a duration.
    pub fn update(&self, duration: Duration) {
        self.inner.update(duration)
    }

    /// Runs `f`, recording how long it took.
    pub fn time<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let context = self.start();
        let result = f();
        context.stop();
        result
    }

    /// Starts timing, recording the elapsed duration when the returned context is stopped or
    /// dropped.
    pub fn start(&self) -> TimerContext {
        TimerContext { timer: self.clone(), started: Instant::now(), stopped: false }
    }

    /// Gets the number of durations recorded.
    pub fn count(&self) -> u64 {
        self.inner.count()
    }

    /// Gets the sum of every duration recorded.
    pub fn elapsed(&self) -> Duration {
        self.inner.elapsed()
    }

    /// Gets a snapshot of the retained samples, in nanoseconds.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot()
    }

    /// Gets the current throughput rates.
    pub fn rates(&self) -> Rates {
        self.inner.rates()
    }
}

/// An in-flight timing started by [`Timer::start`].
pub struct TimerContext {
    timer: Timer,
    started: Instant,
    stopped: bool,
}

impl TimerContext {
    /// Stops timing and records the elapsed duration.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let elapsed = Instant::now().duration_since(self.started);
        if !self.stopped {
            self.stopped = true;
            self.timer.update(elapsed);
        }
        elapsed
    }
}

impl Drop for TimerContext {
    fn drop(&mut self) {
        if !self.stopped {
            let _ = self.record();
        }
    }
}

/// A live instrument of any type.
#[derive(Clone)]
pub enum Metric {
    /// A counter.
    Counter(Counter),
    /// A gauge.
    Gauge(Gauge),
    /// A histogram.
    Histogram(Histogram),
    /// A meter.
    Meter(Meter),
    /// A timer.
    Timer(Timer),
}

impl Metric {
    /// Gets the type of this instrument.
    pub fn metric_type(&self) -> MetricType {
        match self {
            Metric::Counter(_) => MetricType::Counter,
            Metric::Gauge(_) => MetricType::Gauge,
            Metric::Histogram(_) => MetricType::Histogram,
            Metric::Meter(_) => MetricType::Meter,
            Metric::Timer(_) => MetricType::Timer,
        }
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Metric({})", self.metric_type())
    }
}

/// A concrete instrument handle that can be stored as a [`Metric`].
pub trait Instrument: Into<Metric> + Clone {
    /// The type of metric this handle is.
    const METRIC_TYPE: MetricType;

    /// Extracts the handle from `metric`, or returns `None` if it is another type.
    fn from_metric(metric: Metric) -> Option<Self>;
}

macro_rules! impl_instrument {
    ($($handle:ident),*) => {
        $(
            impl From<$handle> for Metric {
                fn from(handle: $handle) -> Metric {
                    Metric::$handle(handle)
                }
            }

            impl Instrument for $handle {
                const METRIC_TYPE: MetricType = MetricType::$handle;

                fn from_metric(metric: Metric) -> Option<Self> {
                    match metric {
                        Metric::$handle(handle) => Some(handle),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_instrument!(Counter, Gauge, Histogram, Meter, Timer);

/// An externally-constructed object that may implement one or more instrument capabilities.
///
/// Used to register third-party instruments whose type is not known statically.  Each method
/// returns the handle for one capability, or `None` if the object does not provide it.
pub trait DynamicInstrument: Send + Sync {
    /// The counter capability.
    fn as_counter(&self) -> Option<Counter> {
        None
    }

    /// The gauge capability.
    fn as_gauge(&self) -> Option<Gauge> {
        None
    }

    /// The histogram capability.
    fn as_histogram(&self) -> Option<Histogram> {
        None
    }

    /// The meter capability.
    fn as_meter(&self) -> Option<Meter> {
        None
    }

    /// The timer capability.
    fn as_timer(&self) -> Option<Timer> {
        None
    }
}

/// Lists every capability `instrument` provides, in [`MetricType`] order.
pub(crate) fn capabilities(instrument: &dyn DynamicInstrument) -> Vec<Metric> {
    let mut found = Vec::new();
    if let Some(c) = instrument.as_counter() {
        found.push(Metric::Counter(c));
    }
    if let Some(g) = instrument.as_gauge() {
        found.push(Metric::Gauge(g));
    }
    if let Some(h) = instrument.as_histogram() {
        found.push(Metric::Histogram(h));
    }
    if let Some(m) = instrument.as_meter() {
        found.push(Metric::Meter(m));
    }
    if let Some(t) = instrument.as_timer() {
        found.push(Metric::Timer(t));
    }
    found
}
