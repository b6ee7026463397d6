//! Name sanitization shared by every text exporter.

/// Converts an arbitrary metric name into the lower-case, underscore-separated token syntax used
/// by the text exposition formats.
///
/// - a lower-case letter directly followed by an upper-case letter gets an underscore between
///   them, so `FooBar` becomes `foo_bar`
/// - everything is lower-cased
/// - any run of characters outside of `[a-z0-9:]` collapses into a single underscore
/// - an underscore directly after a colon is dropped, so `base:_foo` becomes `base:foo`
///
/// Sanitizing an already-sanitized name returns it unchanged.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;
    // Whether the last character pushed was an underscore we emitted, or a colon (after which
    // underscores are dropped entirely).
    let mut suppress_underscore = false;

    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if previous_lower {
                push_separator(&mut out, &mut suppress_underscore);
            }
            out.push(c.to_ascii_lowercase());
            suppress_underscore = false;
            previous_lower = false;
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            suppress_underscore = false;
            previous_lower = c.is_ascii_lowercase();
        } else if c == ':' {
            out.push(':');
            suppress_underscore = true;
            previous_lower = false;
        } else {
            push_separator(&mut out, &mut suppress_underscore);
            previous_lower = false;
        }
    }

    out
}

fn push_separator(out: &mut String, suppress: &mut bool) {
    if !*suppress {
        out.push('_');
        *suppress = true;
    }
}

/// Sanitizes a tag key to be a valid label name under the Prometheus [data model].
///
/// [data model]: https://prometheus.io/docs/concepts/data_model/#metric-names-and-labels
pub fn sanitize_label_key(key: &str) -> String {
    // `[a-zA-Z_][a-zA-Z0-9_]*`; anything else becomes `_`.
    key.chars()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 && valid_label_key_start_character(c)
                || i != 0 && valid_label_key_character(c)
            {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Escapes a tag value for use inside a double-quoted label value.
///
/// Backslashes, double quotes, and line feeds are escaped.
pub fn escape_label_value(value: &str) -> String {
    escape(value, true)
}

/// Escapes a description for use in a help line.
///
/// Backslashes and line feeds are escaped.  Double quotes are left alone unless `quotes` is set,
/// which OpenMetrics requires.
pub fn escape_help(value: &str, quotes: bool) -> String {
    escape(value, quotes)
}

fn escape(value: &str, quotes: bool) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '"' if quotes => escaped.push_str("\\\""),
            c => escaped.push(c),
        }
    }
    escaped
}

#[inline]
fn valid_label_key_start_character(c: char) -> bool {
    // [a-zA-Z_]
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn valid_label_key_character(c: char) -> bool {
    // [a-zA-Z0-9_]
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::{escape_help, escape_label_value, sanitize, sanitize_label_key};
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_known_cases() {
        let cases = &[
            ("FooBar", "foo_bar"),
            ("fooBarBaz", "foo_bar_baz"),
            ("HTTPServer", "httpserver"),
            ("my.counter", "my_counter"),
            ("a..--b", "a_b"),
            ("a__b", "a_b"),
            ("base:_heap", "base:heap"),
            ("base:__heap", "base:heap"),
            ("vendor:Heap Used", "vendor:heap_used"),
            ("counter2_total", "counter2_total"),
            ("trailing.", "trailing_"),
            ("requestCount2", "request_count2"),
            ("count2Total", "count2total"),
        ];

        for (input, expected) in cases {
            let result = sanitize(input);
            assert_eq!(expected, &result, "input: {:?}", input);
        }
    }

    #[test]
    fn test_sanitize_label_key_known_cases() {
        let cases = &[
            ("*", "_"),
            (":", "_"),
            ("foo_bar", "foo_bar"),
            ("1foobar", "_foobar"),
            ("foo1bar2", "foo1bar2"),
        ];

        for (input, expected) in cases {
            let result = sanitize_label_key(input);
            assert_eq!(expected, &result);
        }
    }

    #[test]
    fn test_escape_known_cases() {
        assert_eq!(escape_label_value("plain"), "plain");
        assert_eq!(escape_label_value("a\"b"), "a\\\"b");
        assert_eq!(escape_label_value("a\\b"), "a\\\\b");
        assert_eq!(escape_label_value("a\nb"), "a\\nb");
        assert_eq!(escape_help("say \"hi\"\n", false), "say \"hi\"\\n");
        assert_eq!(escape_help("say \"hi\"", true), "say \\\"hi\\\"");
    }

    proptest! {
        #[test]
        fn test_sanitize_is_idempotent(input in ".*") {
            let once = sanitize(&input);
            let twice = sanitize(&once);
            prop_assert_eq!(&once, &twice);
        }

        #[test]
        fn test_sanitize_output_charset(input in ".*") {
            let result = sanitize(&input);
            prop_assert!(result
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == ':'));
            prop_assert!(!result.contains("__"));
            prop_assert!(!result.contains(":_"));
        }

        #[test]
        fn test_escape_label_value_leaves_no_raw_specials(input in "[\n\"\\\\]?.*[\n\"\\\\]?") {
            let result = escape_label_value(&input);

            // Escaping leaves no raw newline behind.
            prop_assert!(!result.contains('\n'), "raw/unescaped newlines present");

            // Every quote must be preceded by an odd run of backslashes.
            let chars = result.chars().collect::<Vec<_>>();
            for (i, c) in chars.iter().enumerate() {
                if *c == '"' {
                    let run = chars[..i].iter().rev().take_while(|c| **c == '\\').count();
                    prop_assert!(run % 2 == 1, "unescaped quote in {:?}", result);
                }
            }
        }
    }
}
