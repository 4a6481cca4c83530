//! Batch numbers derived from file paths.
//!
//! The configured pattern's capturing groups are concatenated in order and
//! read as one base-10 integer, so `(\d{4})(\d{2})(\d{2})` turns a dated
//! file name into `20240102`.

use regex::Regex;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchParseError {
    #[error("invalid batch pattern: {0}")]
    InvalidPattern(String),

    #[error("batch pattern did not match '{0}'")]
    NoMatch(String),

    #[error("capturing group {0} did not participate in the match")]
    MissingGroup(usize),

    #[error("captured text '{0}' is not numeric")]
    NonNumeric(String),

    #[error("batch pattern captured nothing")]
    Empty,

    #[error("batch number '{0}' is out of range")]
    OutOfRange(String),
}

/// Compile `pattern` and extract the batch number from `path`.
pub fn parse_batch(path: &str, pattern: &str) -> Result<i64, BatchParseError> {
    let re = Regex::new(pattern).map_err(|e| BatchParseError::InvalidPattern(e.to_string()))?;
    parse_batch_with(path, &re)
}

/// Extract the batch number using an already compiled pattern.
///
/// Uses the first match. Every capturing group must participate and contain
/// only ASCII digits; empty groups contribute nothing.
pub fn parse_batch_with(path: &str, pattern: &Regex) -> Result<i64, BatchParseError> {
    let captures = pattern
        .captures(path)
        .ok_or_else(|| BatchParseError::NoMatch(path.to_string()))?;

    let mut digits = String::new();
    for (index, group) in captures.iter().enumerate().skip(1) {
        let text = group.ok_or(BatchParseError::MissingGroup(index))?.as_str();
        if !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BatchParseError::NonNumeric(text.to_string()));
        }
        digits.push_str(text);
    }

    if digits.is_empty() {
        return Err(BatchParseError::Empty);
    }
    digits
        .parse::<i64>()
        .map_err(|_| BatchParseError::OutOfRange(digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_all_groups() {
        assert_eq!(
            parse_batch("file_20240102_003.csv", r"(\d{4})(\d{2})(\d{2})"),
            Ok(20240102)
        );
    }

    #[test]
    fn groups_joined_across_separators() {
        assert_eq!(
            parse_batch("s3://raw/2024/01/02/part.csv", r"(\d{4})/(\d{2})/(\d{2})"),
            Ok(20240102)
        );
    }

    #[test]
    fn no_match_fails() {
        assert_eq!(
            parse_batch("nomatch.csv", r"(\d+)"),
            Err(BatchParseError::NoMatch("nomatch.csv".into()))
        );
    }

    #[test]
    fn non_numeric_group_fails() {
        assert_eq!(
            parse_batch("batch_abc.csv", r"batch_(\w+)\.csv"),
            Err(BatchParseError::NonNumeric("abc".into()))
        );
    }

    #[test]
    fn optional_group_must_participate() {
        assert_eq!(
            parse_batch("run_12.csv", r"run_(\d+)(?:_(\d+))?"),
            Err(BatchParseError::MissingGroup(2))
        );
    }

    #[test]
    fn pattern_without_groups_fails() {
        assert_eq!(parse_batch("run_12.csv", r"\d+"), Err(BatchParseError::Empty));
    }

    #[test]
    fn overflow_fails() {
        assert!(matches!(
            parse_batch("id_99999999999999999999.csv", r"(\d+)"),
            Err(BatchParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn invalid_pattern_fails() {
        assert!(matches!(
            parse_batch("x", r"(\d+"),
            Err(BatchParseError::InvalidPattern(_))
        ));
    }
}
