use std::fmt;

use crate::tag::{IntoTags, Tag};

/// The identity of a single instrument: a metric name plus a set of tags.
///
/// Tags are held sorted by key, and keys are unique, so two identities built from the same pairs
/// in a different order are equal, hash identically, and sort identically.  When the same key is
/// given more than once, the last value wins.
///
/// Ordering is lexicographic by name, and then by the sorted tag pairs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricId {
    name: String,
    tags: Vec<Tag>,
}

impl MetricId {
    /// Creates a `MetricId` from a name.
    pub fn from_name<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        MetricId { name: name.into(), tags: Vec::new() }
    }

    /// Creates a `MetricId` from a name and a set of tags.
    pub fn new<N, T>(name: N, tags: T) -> Self
    where
        N: Into<String>,
        T: IntoTags,
    {
        MetricId { name: name.into(), tags: canonicalize(tags.into_tags()) }
    }

    /// Name of this identity.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Tags of this identity, sorted by key.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Whether or not this identity carries any tags.
    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    /// Returns a copy of this identity with `extra` tags merged in.
    ///
    /// Tags already present on this identity take precedence over `extra` tags with the same key.
    pub fn with_defaults(&self, extra: &[Tag]) -> MetricId {
        let mut tags = extra
            .iter()
            .filter(|tag| !self.tags.iter().any(|own| own.key() == tag.key()))
            .cloned()
            .collect::<Vec<_>>();
        tags.extend(self.tags.iter().cloned());
        MetricId { name: self.name.clone(), tags: canonicalize(tags) }
    }

    /// Consumes this `MetricId`, returning the name and the tags.
    pub fn into_parts(self) -> (String, Vec<Tag>) {
        (self.name, self.tags)
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.tags.is_empty() {
            f.write_str("{")?;
            for (i, tag) in self.tags.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", tag)?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}

impl From<&str> for MetricId {
    fn from(name: &str) -> MetricId {
        MetricId::from_name(name)
    }
}

impl From<String> for MetricId {
    fn from(name: String) -> MetricId {
        MetricId::from_name(name)
    }
}

fn canonicalize(mut tags: Vec<Tag>) -> Vec<Tag> {
    // Stable sort keeps input order among equal keys, so the last duplicate is the one we keep.
    tags.sort_by(|a, b| a.key().cmp(b.key()));
    let mut deduped: Vec<Tag> = Vec::with_capacity(tags.len());
    for tag in tags {
        match deduped.last_mut() {
            Some(last) if last.key() == tag.key() => *last = tag,
            _ => deduped.push(tag),
        }
    }
    deduped
}
