//! Rendering shared by the Prometheus and OpenMetrics text formats.
use metrics_registry::{sanitize, unit_suffix, Metadata, MetricType, Rates, Scope, Tag};

use crate::{
    exposition::{collect_groups, Distribution, Group, Reading, Selection},
    formatting::write_metric_line,
    settings::ExportSettings,
};

/// The parts of a text format that differ between Prometheus and OpenMetrics.
pub(crate) trait TextSyntax {
    /// Builds the sanitized base name of a metric in `scope`.
    fn base_name(&self, scope: &Scope, name: &str) -> String;

    /// Splits a counter's name into its declared family name and its sample name.
    fn counter_names(&self, stem: &str) -> (String, String);

    /// Writes the header lines of a family.  `help` is only given for the first family of a
    /// group.
    fn write_header(&self, buffer: &mut String, family: &Family, help: Option<&str>);

    /// Finishes the document.
    fn finish(&self, _buffer: &mut String) {}
}

/// A single metric family: one header, then every sample of every instrument in the group.
pub(crate) struct Family {
    pub name: String,
    pub kind: &'static str,
    /// Unit of the family, when its name ends with it.
    pub unit: Option<String>,
    samples: Vec<Sample>,
}

struct Sample {
    name: String,
    tags: Vec<Tag>,
    additional_label: Option<(&'static str, f64)>,
    value: f64,
}

impl Family {
    fn new(name: String, kind: &'static str, unit: Option<&str>) -> Self {
        let unit = unit.filter(|u| name.ends_with(&format!("_{}", u))).map(str::to_string);
        Family { name, kind, unit, samples: Vec::new() }
    }

    fn push(&mut self, name: &str, tags: &[Tag], value: f64) {
        self.samples.push(Sample {
            name: name.to_string(),
            tags: tags.to_vec(),
            additional_label: None,
            value,
        });
    }

    fn push_quantile(&mut self, tags: &[Tag], quantile: f64, value: f64) {
        self.samples.push(Sample {
            name: self.name.clone(),
            tags: tags.to_vec(),
            additional_label: Some(("quantile", quantile)),
            value,
        });
    }
}

fn with_suffix(base: &str, suffix: &str) -> String {
    if base.ends_with(&format!("_{}", suffix)) {
        base.to_string()
    } else {
        format!("{}_{}", base, suffix)
    }
}

/// The families of a meter, or the rate families of a timer.
struct RateFamilies {
    families: [Family; 4],
}

impl RateFamilies {
    fn new(base: &str) -> Self {
        let gauge = |suffix: &str| Family::new(format!("{}_{}", base, suffix), "gauge", None);
        RateFamilies {
            families: [
                gauge("rate_per_second"),
                gauge("one_min_rate_per_second"),
                gauge("five_min_rate_per_second"),
                gauge("fifteen_min_rate_per_second"),
            ],
        }
    }

    fn push(&mut self, tags: &[Tag], rates: &Rates) {
        let values = [rates.mean, rates.one_minute, rates.five_minute, rates.fifteen_minute];
        for (family, value) in self.families.iter_mut().zip(values) {
            let name = family.name.clone();
            family.push(&name, tags, value);
        }
    }
}

/// The families of a histogram, or the distribution families of a timer.
struct DistributionFamilies {
    summary: Family,
    stats: [Family; 4],
}

impl DistributionFamilies {
    /// `summary` is the full summary name; statistic gauges are named `<stem>_<stat>` followed by
    /// `unit_tail` if given.
    fn new(summary: String, stem: &str, unit_tail: Option<&str>, unit: Option<&str>) -> Self {
        let stat = |stat: &str| {
            let name = match unit_tail {
                Some(tail) => format!("{}_{}_{}", stem, stat, tail),
                None => format!("{}_{}", stem, stat),
            };
            Family::new(name, "gauge", unit)
        };

        DistributionFamilies {
            summary: Family::new(summary, "summary", unit),
            stats: [stat("min"), stat("max"), stat("mean"), stat("stddev")],
        }
    }

    fn push(&mut self, tags: &[Tag], distribution: &Distribution) {
        let summary = &mut self.summary;
        let count_name = format!("{}_count", summary.name);
        let sum_name = format!("{}_sum", summary.name);
        summary.push(&count_name, tags, distribution.count as f64);
        summary.push(&sum_name, tags, distribution.sum);
        for (quantile, value) in &distribution.quantiles {
            summary.push_quantile(tags, quantile.value(), *value);
        }

        let values = [distribution.min, distribution.max, distribution.mean, distribution.stddev];
        for (family, value) in self.stats.iter_mut().zip(values) {
            let name = family.name.clone();
            family.push(&name, tags, value);
        }
    }

    fn into_families(self) -> impl Iterator<Item = Family> {
        std::iter::once(self.summary).chain(self.stats)
    }
}

/// Builds every family for `group`, in rendering order.
pub(crate) fn families<S: TextSyntax>(syntax: &S, scope: &Scope, group: &Group) -> Vec<Family> {
    let metadata: &Metadata = &group.metadata;
    let base = syntax.base_name(scope, metadata.name());
    let unit = unit_suffix(metadata.unit()).map(|u| sanitize(&u));
    let unit = unit.as_deref();

    match metadata.metric_type() {
        MetricType::Counter => {
            let stem = match unit {
                Some(unit) => with_suffix(&base, unit),
                None => base,
            };
            let (declared, sample) = syntax.counter_names(&stem);
            let mut family = Family::new(declared, "counter", unit);
            for member in &group.members {
                if let Reading::Counter(count) = member.reading {
                    family.push(&sample, &member.tags, count);
                }
            }
            vec![family]
        }
        MetricType::Gauge => {
            let name = match unit {
                Some(unit) => with_suffix(&base, unit),
                None => base,
            };
            let mut family = Family::new(name, "gauge", unit);
            for member in &group.members {
                if let Reading::Gauge(value) = member.reading {
                    let name = family.name.clone();
                    family.push(&name, &member.tags, value);
                }
            }
            vec![family]
        }
        MetricType::Meter => {
            let (declared, sample) = syntax.counter_names(&base);
            let mut total = Family::new(declared, "counter", None);
            let mut rates = RateFamilies::new(&base);
            for member in &group.members {
                if let Reading::Meter { count, rates: meter_rates } = &member.reading {
                    total.push(&sample, &member.tags, *count as f64);
                    rates.push(&member.tags, meter_rates);
                }
            }
            std::iter::once(total).chain(rates.families).collect()
        }
        MetricType::Histogram => {
            let summary = match unit {
                Some(unit) => with_suffix(&base, unit),
                None => base.clone(),
            };
            let mut distributions = DistributionFamilies::new(summary, &base, unit, unit);
            for member in &group.members {
                if let Reading::Histogram(distribution) = &member.reading {
                    distributions.push(&member.tags, distribution);
                }
            }
            distributions.into_families().collect()
        }
        MetricType::Timer => {
            let summary = with_suffix(&base, "seconds");
            let mut distributions =
                DistributionFamilies::new(summary.clone(), &summary, None, Some("seconds"));
            let mut rates = RateFamilies::new(&base);
            for member in &group.members {
                if let Reading::Timer { distribution, rates: timer_rates } = &member.reading {
                    distributions.push(&member.tags, distribution);
                    rates.push(&member.tags, timer_rates);
                }
            }
            distributions.into_families().chain(rates.families).collect()
        }
    }
}

/// Renders `group` into `buffer`.
pub(crate) fn write_group<S: TextSyntax>(
    syntax: &S,
    buffer: &mut String,
    scope: &Scope,
    group: &Group,
    settings: &ExportSettings,
) {
    let mut help = if settings.help { group.metadata.description() } else { None };
    for family in families(syntax, scope, group) {
        syntax.write_header(buffer, &family, help.take());
        for sample in &family.samples {
            write_metric_line(
                buffer,
                &sample.name,
                &sample.tags,
                sample.additional_label,
                sample.value,
            );
        }
    }
}

/// Renders every group covered by `selection`, or `None` if it names a scope that does not
/// exist.
pub(crate) fn render<S: TextSyntax>(
    syntax: &S,
    registries: &metrics_registry::Registries,
    selection: Selection<'_>,
    settings: &ExportSettings,
) -> Option<String> {
    let mut buffer = String::new();
    for (scope, registry) in selection.resolve(registries)? {
        for group in collect_groups(&registry, selection.name(), &settings.global_tags) {
            write_group(syntax, &mut buffer, &scope, &group, settings);
        }
    }
    syntax.finish(&mut buffer);
    Some(buffer)
}
