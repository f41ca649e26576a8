//! CLI argument validators.
//!
//! Shared validation functions for CLI argument parsing.

/// Parse a float that must be at least `min` (inclusive) or strictly above
/// it when `inclusive` is false.
pub fn parse_lower_bounded_float(
    s: &str,
    min: f64,
    inclusive: bool,
    name: &str,
) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    let in_range = value.is_finite() && if inclusive { value >= min } else { value > min };
    if !in_range {
        let bound = if inclusive { "at least" } else { "greater than" };
        return Err(format!("{name} must be {bound} {min}, got {value}"));
    }

    Ok(value)
}

/// Parse a duration in seconds (>= 0).
pub fn parse_seconds(s: &str) -> Result<f64, String> {
    parse_lower_bounded_float(s, 0.0, true, "duration")
}

/// Parse a strictly positive threshold.
pub fn parse_threshold(s: &str) -> Result<f64, String> {
    parse_lower_bounded_float(s, 0.0, false, "threshold")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("0").ok(), Some(0.0));
        assert_eq!(parse_seconds("2.5").ok(), Some(2.5));
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("soon").is_err());
        assert!(parse_seconds("inf").is_err());
    }

    #[test]
    fn test_parse_threshold_is_strictly_positive() {
        assert_eq!(parse_threshold("5").ok(), Some(5.0));
        assert!(parse_threshold("0").is_err());
        assert!(parse_threshold("-3").is_err());
    }

    #[test]
    fn test_error_message_names_bound() {
        let err = parse_seconds("-2").unwrap_err();
        assert!(err.contains("at least 0"));
    }
}
