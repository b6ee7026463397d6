/// A point-in-time, sorted view over the samples held by a histogram or timer.
///
/// Statistics are computed over the retained samples only.  When the underlying reservoir has
/// overflowed, they describe a uniform sample of everything recorded, not every value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    values: Vec<f64>,
}

impl Snapshot {
    /// Creates a `Snapshot` from unsorted samples.
    pub fn new(mut values: Vec<f64>) -> Self {
        values.retain(|v| !v.is_nan());
        values.sort_by(|a, b| a.total_cmp(b));
        Snapshot { values }
    }

    /// Gets the value at the given quantile using the nearest-rank method.
    ///
    /// The result is the smallest sample such that at least `q * len` samples are less than or
    /// equal to it.  Returns `0.0` for an empty snapshot.
    pub fn quantile(&self, q: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        let q = q.clamp(0.0, 1.0);
        let rank = (q * self.values.len() as f64).ceil() as usize;
        let idx = rank.saturating_sub(1).min(self.values.len() - 1);
        self.values[idx]
    }

    /// Gets the median.
    pub fn median(&self) -> f64 {
        self.quantile(0.5)
    }

    /// Gets the smallest sample, or `0.0` if empty.
    pub fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    /// Gets the largest sample, or `0.0` if empty.
    pub fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    /// Gets the arithmetic mean, or `0.0` if empty.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Gets the sample standard deviation, or `0.0` with fewer than two samples.
    pub fn stddev(&self) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }

        let mean = self.mean();
        let sum_of_squares = self
            .values
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>();
        (sum_of_squares / (self.values.len() - 1) as f64).sqrt()
    }

    /// Number of samples in this snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether or not this snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The sorted samples.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}
