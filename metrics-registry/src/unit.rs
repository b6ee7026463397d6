//! Units of measure and their conversion to a canonical base unit.
//!
//! Every exporter funnels values through [`scale_to_base`] so that a histogram declared in
//! milliseconds, or a gauge declared in kilobytes, is rendered the same way regardless of the wire
//! format: time in seconds, memory in bytes.
use std::borrow::Cow;

use crate::metadata::NONE;

/// Canonical base unit for time-based units.
pub const SECONDS: &str = "seconds";

/// Canonical base unit for memory-based units.
pub const BYTES: &str = "bytes";

/// Units with a known conversion to a base unit.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Unit {
    /// An eighth of a byte.
    Bits,
    /// 1000 bits.
    Kilobits,
    /// 10^6 bits.
    Megabits,
    /// 10^9 bits.
    Gigabits,
    /// 1024 bits.
    Kibibits,
    /// 2^20 bits.
    Mebibits,
    /// 2^30 bits.
    Gibibits,
    /// The memory base unit.
    Bytes,
    /// 1000 bytes.
    Kilobytes,
    /// 10^6 bytes.
    Megabytes,
    /// 10^9 bytes.
    Gigabytes,
    /// 1024 bytes.
    Kibibytes,
    /// 2^20 bytes.
    Mebibytes,
    /// 2^30 bytes.
    Gibibytes,
    /// 10^-9 seconds.
    Nanoseconds,
    /// 10^-6 seconds.
    Microseconds,
    /// 10^-3 seconds.
    Milliseconds,
    /// The time base unit.
    Seconds,
    /// 60 seconds.
    Minutes,
    /// 3600 seconds.
    Hours,
    /// 86400 seconds.
    Days,
}

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

impl Unit {
    /// Lowercase name of the unit, as it appears in metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Bits => "bits",
            Unit::Kilobits => "kilobits",
            Unit::Megabits => "megabits",
            Unit::Gigabits => "gigabits",
            Unit::Kibibits => "kibibits",
            Unit::Mebibits => "mebibits",
            Unit::Gibibits => "gibibits",
            Unit::Bytes => "bytes",
            Unit::Kilobytes => "kilobytes",
            Unit::Megabytes => "megabytes",
            Unit::Gigabytes => "gigabytes",
            Unit::Kibibytes => "kibibytes",
            Unit::Mebibytes => "mebibytes",
            Unit::Gibibytes => "gibibytes",
            Unit::Nanoseconds => "nanoseconds",
            Unit::Microseconds => "microseconds",
            Unit::Milliseconds => "milliseconds",
            Unit::Seconds => "seconds",
            Unit::Minutes => "minutes",
            Unit::Hours => "hours",
            Unit::Days => "days",
        }
    }

    /// Looks up a unit by name.
    ///
    /// Matching is case-insensitive, so `"HOURS"` and `"hours"` are the same unit.
    pub fn from_string(s: &str) -> Option<Unit> {
        let unit = match s.to_ascii_lowercase().as_str() {
            "bits" => Unit::Bits,
            "kilobits" => Unit::Kilobits,
            "megabits" => Unit::Megabits,
            "gigabits" => Unit::Gigabits,
            "kibibits" => Unit::Kibibits,
            "mebibits" => Unit::Mebibits,
            "gibibits" => Unit::Gibibits,
            "bytes" => Unit::Bytes,
            "kilobytes" => Unit::Kilobytes,
            "megabytes" => Unit::Megabytes,
            "gigabytes" => Unit::Gigabytes,
            "kibibytes" => Unit::Kibibytes,
            "mebibytes" => Unit::Mebibytes,
            "gibibytes" => Unit::Gibibytes,
            "nanoseconds" => Unit::Nanoseconds,
            "microseconds" => Unit::Microseconds,
            "milliseconds" => Unit::Milliseconds,
            "seconds" => Unit::Seconds,
            "minutes" => Unit::Minutes,
            "hours" => Unit::Hours,
            "days" => Unit::Days,
            _ => return None,
        };
        Some(unit)
    }

    /// Returns `true` for units of duration.
    pub fn is_time_based(&self) -> bool {
        matches!(
            self,
            Unit::Nanoseconds
                | Unit::Microseconds
                | Unit::Milliseconds
                | Unit::Seconds
                | Unit::Minutes
                | Unit::Hours
                | Unit::Days
        )
    }

    /// Returns `true` for bit and byte units.
    pub fn is_data_based(&self) -> bool {
        !self.is_time_based()
    }

    /// Gets the canonical base unit: `"seconds"` for time, `"bytes"` for data.
    pub fn base(&self) -> &'static str {
        if self.is_time_based() {
            SECONDS
        } else {
            BYTES
        }
    }

    /// Gets the conversion to the base unit as a `(numerator, denominator)` pair.
    ///
    /// Keeping the factor as a ratio lets sub-unit conversions divide by an exact power of ten
    /// rather than multiply by an inexact reciprocal.
    fn ratio(&self) -> (f64, f64) {
        match self {
            Unit::Bits => (1.0, 8.0),
            Unit::Kilobits => (1e3, 8.0),
            Unit::Megabits => (1e6, 8.0),
            Unit::Gigabits => (1e9, 8.0),
            Unit::Kibibits => (KIB, 8.0),
            Unit::Mebibits => (MIB, 8.0),
            Unit::Gibibits => (GIB, 8.0),
            Unit::Bytes => (1.0, 1.0),
            Unit::Kilobytes => (1e3, 1.0),
            Unit::Megabytes => (1e6, 1.0),
            Unit::Gigabytes => (1e9, 1.0),
            Unit::Kibibytes => (KIB, 1.0),
            Unit::Mebibytes => (MIB, 1.0),
            Unit::Gibibytes => (GIB, 1.0),
            Unit::Nanoseconds => (1.0, 1e9),
            Unit::Microseconds => (1.0, 1e6),
            Unit::Milliseconds => (1.0, 1e3),
            Unit::Seconds => (1.0, 1.0),
            Unit::Minutes => (60.0, 1.0),
            Unit::Hours => (3600.0, 1.0),
            Unit::Days => (86400.0, 1.0),
        }
    }

    /// Scales `value`, expressed in this unit, to the base unit.
    pub fn scale(&self, value: f64) -> f64 {
        let (numerator, denominator) = self.ratio();
        if numerator == 1.0 && denominator == 1.0 {
            value
        } else if denominator == 1.0 {
            value * numerator
        } else {
            value * numerator / denominator
        }
    }
}

/// Maps a declared unit to its canonical base unit.
///
/// Memory units map to `"bytes"`, time units to `"seconds"`, and anything else is returned as
/// given.  An absent unit maps to `"none"`.
pub fn canonical_unit(declared: Option<&str>) -> Cow<'_, str> {
    match declared {
        None => Cow::Borrowed(NONE),
        Some(unit) => match Unit::from_string(unit) {
            Some(known) => Cow::Borrowed(known.base()),
            None => Cow::Borrowed(unit),
        },
    }
}

/// Scales `value`, expressed in the declared unit, to the canonical base unit.
///
/// Values whose unit is absent or unrecognized are returned unchanged.
pub fn scale_to_base(declared: Option<&str>, value: f64) -> f64 {
    match declared.and_then(Unit::from_string) {
        Some(unit) => unit.scale(value),
        None => value,
    }
}

/// Gets the unit suffix, if any, to append to an exported metric name.
///
/// `"none"` and absent units produce no suffix.
pub fn unit_suffix(declared: Option<&str>) -> Option<Cow<'_, str>> {
    let canonical = canonical_unit(declared);
    if canonical.eq_ignore_ascii_case(NONE) || canonical.is_empty() {
        None
    } else {
        Some(canonical)
    }
}
