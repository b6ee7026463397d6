/// A quantile in `[0, 1]` paired with its percentile label.
///
/// Exporters key summary lines by the raw value (`quantile="0.99"`) and JSON statistics by the
/// label (`p99`).  The label is the percentile with its decimal point dropped, so `0.999` is
/// labelled `p999`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantile {
    value: f64,
    label: String,
}

impl Quantile {
    /// Creates a `Quantile`, clamping `value` into `[0, 1]`.
    pub fn new(value: f64) -> Quantile {
        let value = value.clamp(0.0, 1.0);

        // 0.999 * 100.0 is 99.89999..., so round to a fixed precision first.
        let percentile = (value * 1e8).round() / 1e6;
        let digits: String = percentile.to_string().chars().filter(|c| *c != '.').collect();

        Quantile { value, label: format!("p{}", digits) }
    }

    /// Percentile label, such as `p50`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Raw value in `[0, 1]`.
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Quantiles rendered for every histogram and timer.
pub const DEFAULT_QUANTILES: [f64; 6] = [0.5, 0.75, 0.95, 0.98, 0.99, 0.999];

/// Converts raw values into [`Quantile`]s, preserving order.
pub fn parse_quantiles(values: &[f64]) -> Vec<Quantile> {
    values.iter().copied().map(Quantile::new).collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_quantiles, Quantile, DEFAULT_QUANTILES};

    #[test]
    fn test_labels() {
        let cases = &[
            (0.5, 0.5, "p50"),
            (0.99, 0.99, "p99"),
            (0.999, 0.999, "p999"),
            (-1.0, 0.0, "p0"),
            (1.2, 1.0, "p100"),
        ];

        for (input, value, label) in cases {
            let quantile = Quantile::new(*input);
            assert_eq!(quantile.value(), *value);
            assert_eq!(quantile.label(), *label);
        }
    }

    #[test]
    fn test_default_quantile_labels() {
        let labels = parse_quantiles(&DEFAULT_QUANTILES)
            .iter()
            .map(|q| q.label().to_string())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["p50", "p75", "p95", "p98", "p99", "p999"]);
    }
}
