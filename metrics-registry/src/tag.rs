use std::fmt;

use thiserror::Error;

/// Errors that can occur while parsing a textual tag expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The expression could not be split into `key=value` pairs.
    #[error("malformed tag expression `{input}`: {reason}")]
    MalformedTags {
        /// The full expression that failed to parse.
        input: String,
        /// Why the expression was rejected.
        reason: String,
    },
}

/// A key/value pair attached to a metric.
///
/// Tags distinguish otherwise identically-named metrics from one another: a counter named
/// `requests` tagged with `method=GET` is a different instrument than the same counter tagged
/// with `method=POST`.
///
/// Values may contain any character.  Escaping is the concern of the wire format doing the
/// rendering, not of the tag itself.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    key: String,
    value: String,
}

impl Tag {
    /// Creates a [`Tag`] from a key and value.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Tag { key: key.into(), value: value.into() }
    }

    /// Key of this tag.
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Value of this tag.
    pub fn value(&self) -> &str {
        self.value.as_str()
    }

    /// Consumes this [`Tag`], returning the key and value.
    pub fn into_parts(self) -> (String, String) {
        (self.key, self.value)
    }

    /// Parses a comma-separated list of `key=value` pairs.
    ///
    /// A literal comma inside a value can be written as `\,`.  Whitespace around keys is
    /// ignored.  An empty (or all-whitespace) expression yields no tags.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedTags`] if any pair is missing its `=`, has an empty key, or
    /// has a key that isn't a valid tag name (`[A-Za-z_][A-Za-z0-9_]*`).
    pub fn parse_list(input: &str) -> Result<Vec<Tag>, ParseError> {
        let malformed =
            |reason: String| ParseError::MalformedTags { input: input.to_string(), reason };

        if input.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut tags = Vec::new();
        for segment in split_unescaped(input) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| malformed(format!("`{}` is not a key=value pair", segment)))?;

            let key = key.trim();
            if key.is_empty() {
                return Err(malformed(format!("`{}` has an empty key", segment)));
            }
            if !is_valid_tag_key(key) {
                return Err(malformed(format!("`{}` is not a valid tag name", key)));
            }

            tags.push(Tag::new(key, value));
        }

        Ok(tags)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl<K, V> From<(K, V)> for Tag
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pair: (K, V)) -> Tag {
        Tag::new(pair.0, pair.1)
    }
}

impl From<&Tag> for Tag {
    fn from(tag: &Tag) -> Tag {
        tag.clone()
    }
}

/// A value that can be converted to [`Tag`]s.
pub trait IntoTags {
    /// Consumes this value, turning it into a vector of [`Tag`]s.
    fn into_tags(self) -> Vec<Tag>;
}

impl IntoTags for Vec<Tag> {
    fn into_tags(self) -> Vec<Tag> {
        self
    }
}

impl IntoTags for &[Tag] {
    fn into_tags(self) -> Vec<Tag> {
        self.to_vec()
    }
}

impl IntoTags for &Vec<Tag> {
    fn into_tags(self) -> Vec<Tag> {
        self.clone()
    }
}

impl<T, const N: usize> IntoTags for [T; N]
where
    T: Into<Tag>,
{
    fn into_tags(self) -> Vec<Tag> {
        self.into_iter().map(Into::into).collect()
    }
}

impl IntoTags for () {
    fn into_tags(self) -> Vec<Tag> {
        Vec::new()
    }
}

/// Whether or not `key` is a valid tag name.
pub fn is_valid_tag_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_unescaped(input: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => segments.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    segments.push(current);

    segments
}
