//! Helpers for rendering metrics in the Prometheus and OpenMetrics text formats.

use metrics_registry::{escape_help, escape_label_value, sanitize_label_key, Tag};

/// Writes a help (description) line.
///
/// OpenMetrics requires double quotes in the description to be escaped; the Prometheus text
/// format does not.
pub fn write_help_line(buffer: &mut String, name: &str, desc: &str, escape_quotes: bool) {
    buffer.push_str("# HELP ");
    buffer.push_str(name);
    buffer.push(' ');
    buffer.push_str(&escape_help(desc, escape_quotes));
    buffer.push('\n');
}

/// Writes a metric type line.
pub fn write_type_line(buffer: &mut String, name: &str, metric_type: &str) {
    buffer.push_str("# TYPE ");
    buffer.push_str(name);
    buffer.push(' ');
    buffer.push_str(metric_type);
    buffer.push('\n');
}

/// Writes a unit line.
pub fn write_unit_line(buffer: &mut String, name: &str, unit: &str) {
    buffer.push_str("# UNIT ");
    buffer.push_str(name);
    buffer.push(' ');
    buffer.push_str(unit);
    buffer.push('\n');
}

/// Writes a sample line.
///
/// Tags are rendered in the order given, followed by `additional_label` if any.
pub fn write_metric_line(
    buffer: &mut String,
    name: &str,
    tags: &[Tag],
    additional_label: Option<(&'static str, f64)>,
    value: f64,
) {
    buffer.push_str(name);

    if !tags.is_empty() || additional_label.is_some() {
        buffer.push('{');

        let mut first = true;
        for tag in tags {
            if first {
                first = false;
            } else {
                buffer.push(',');
            }
            buffer.push_str(&sanitize_label_key(tag.key()));
            buffer.push_str("=\"");
            buffer.push_str(&escape_label_value(tag.value()));
            buffer.push('"');
        }

        if let Some((name, value)) = additional_label {
            if !first {
                buffer.push(',');
            }
            buffer.push_str(name);
            buffer.push_str("=\"");
            push_value(buffer, value);
            buffer.push('"');
        }

        buffer.push('}');
    }

    buffer.push(' ');
    push_value(buffer, value);
    buffer.push('\n');
}

/// Writes a sample value: `ryu` for finite values, `NaN`, `+Inf` or `-Inf` otherwise.
fn push_value(buffer: &mut String, value: f64) {
    if value.is_nan() {
        buffer.push_str("NaN");
    } else if value.is_infinite() {
        buffer.push_str(if value.is_sign_positive() { "+Inf" } else { "-Inf" });
    } else {
        let mut ryu = ryu::Buffer::new();
        buffer.push_str(ryu.format_finite(value));
    }
}

#[cfg(test)]
mod tests {
    use metrics_registry::Tag;
    use proptest::prelude::*;

    use super::{push_value, write_help_line, write_metric_line, write_type_line};

    fn format_value(value: f64) -> String {
        let mut buffer = String::new();
        push_value(&mut buffer, value);
        buffer
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(2.0), "2.0");
        assert_eq!(format_value(3600.0), "3600.0");
        assert_eq!(format_value(0.999), "0.999");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn test_metric_line() {
        let mut buffer = String::new();
        let tags = vec![Tag::new("color", "blue"), Tag::new("path", "a\"b")];
        write_metric_line(&mut buffer, "x_seconds", &tags, Some(("quantile", 0.5)), 3.0);
        assert_eq!(buffer, "x_seconds{color=\"blue\",path=\"a\\\"b\",quantile=\"0.5\"} 3.0\n");

        let mut buffer = String::new();
        write_metric_line(&mut buffer, "bare", &[], None, 1.0);
        assert_eq!(buffer, "bare 1.0\n");
    }

    #[test]
    fn test_header_lines() {
        let mut buffer = String::new();
        write_help_line(&mut buffer, "x", "a \"b\"\nc", false);
        write_type_line(&mut buffer, "x", "gauge");
        assert_eq!(buffer, "# HELP x a \"b\"\\nc\n# TYPE x gauge\n");
    }

    proptest! {
        #[test]
        fn test_metric_line_has_no_raw_newlines(
            key in "[a-z]{1,8}",
            value in ".*",
            sample in any::<f64>()
        ) {
            let mut buffer = String::new();
            write_metric_line(&mut buffer, "m", &[Tag::new(key, value)], None, sample);
            prop_assert_eq!(buffer.matches('\n').count(), 1);
            prop_assert!(buffer.ends_with('\n'));
        }
    }
}
