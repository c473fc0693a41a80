//! Conversion of raw string values into typed configuration fields.
//!
//! Every helper treats an absent value and a value consisting only of whitespace
//! the same way: the declared default is used.

use std::str::FromStr;

/// Values which are considered `true` (compared case-insensitively).
const TRUTHY_VALUES: [&str; 3] = ["true", "1", "yes"];

/// Separator used for list valued settings like `CORS_ORIGIN`.
pub const DEFAULT_LIST_SEPARATOR: char = ',';

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Parses a boolean flag.
///
/// Any non-empty value outside of [`TRUTHY_VALUES`] yields `false`.
pub fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match non_empty(value) {
        Some(value) => TRUTHY_VALUES
            .iter()
            .any(|truthy| value.eq_ignore_ascii_case(truthy)),
        None => default,
    }
}

/// Parses a number, falling back to `default` if the value is absent or not numeric.
///
/// The value must be a plain literal of `T`: for integer settings like `APP_PORT`,
/// fractions (`3000.0`) and exponents (`1e3`) count as non-numeric. Non-numeric values
/// are reported as warning but never fail the configuration.
pub fn parse_number<T: FromStr>(value: Option<&str>, default: T) -> T {
    match non_empty(value) {
        Some(raw) => match raw.parse() {
            Ok(number) => number,
            Err(_) => {
                tracing::warn!("Ignoring non-numeric configuration value '{}'", raw);
                default
            }
        },
        None => default,
    }
}

/// Returns the trimmed value or `default`.
pub fn parse_string(value: Option<&str>, default: &str) -> String {
    non_empty(value).unwrap_or(default).to_string()
}

/// Splits the value on `separator`, trims each segment and drops empty ones.
pub fn parse_list(value: Option<&str>, separator: char) -> Vec<String> {
    value
        .map(|value| {
            value
                .split(separator)
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values_are_case_insensitive() {
        for value in ["true", "TRUE", "True", "1", "yes", "YES", " yes "] {
            assert!(parse_bool(Some(value), false), "{value} should be true");
        }
    }

    #[test]
    fn other_values_are_false() {
        assert!(!parse_bool(Some("false"), true));
        assert!(!parse_bool(Some("0"), true));
        assert!(!parse_bool(Some("on"), true));
    }

    #[test]
    fn absent_or_empty_bool_uses_default() {
        assert!(parse_bool(None, true));
        assert!(!parse_bool(None, false));
        assert!(parse_bool(Some(""), true));
        assert!(parse_bool(Some("   "), true));
    }

    #[test]
    fn parse_number_accepts_numeric_input() {
        assert_eq!(parse_number(Some("123"), 0_i64), 123);
        assert_eq!(parse_number(Some(" 8080 "), 0_i64), 8080);
        assert_eq!(parse_number(Some("70000"), 0_i64), 70000);
    }

    #[test]
    fn non_numeric_input_resolves_to_default() {
        assert_eq!(parse_number(Some("abc"), 3000_i64), 3000);
        assert_eq!(parse_number(Some("12abc"), 3000_i64), 3000);
        assert_eq!(parse_number(None, 3000_i64), 3000);
        assert_eq!(parse_number(Some(""), 3000_i64), 3000);
    }

    #[test]
    fn integers_reject_fractions_and_exponents() {
        assert_eq!(parse_number(Some("3000.0"), 8080_i64), 8080);
        assert_eq!(parse_number(Some("1e3"), 8080_i64), 8080);
        assert_eq!(parse_number(Some("1e3"), 0.0_f64), 1000.0);
    }

    #[test]
    fn parse_string_trims_and_defaults() {
        assert_eq!(parse_string(None, "default"), "default");
        assert_eq!(parse_string(Some("  "), "default"), "default");
        assert_eq!(parse_string(Some(" custom "), "default"), "custom");
    }

    #[test]
    fn parse_list_drops_empty_segments() {
        assert_eq!(parse_list(Some("a,b,c"), ','), vec!["a", "b", "c"]);
        assert_eq!(parse_list(Some(" a , ,b,"), ','), vec!["a", "b"]);
        assert_eq!(parse_list(Some("a;b"), ';'), vec!["a", "b"]);
        assert!(parse_list(None, ',').is_empty());
        assert!(parse_list(Some(" , "), ',').is_empty());
    }
}
