//! Checks applied to a range expression before any file is touched

use regex::Regex;
use std::sync::OnceLock;

use super::{is_number, parse_index, split_span};
use crate::error::{Result, UnlockError};

static RANGE_GRAMMAR: OnceLock<Regex> = OnceLock::new();

/// Reject expressions ending in a dangling `,` or `-`
pub fn validate_termination(expr: &str) -> bool {
    !(expr.ends_with(',') || expr.ends_with('-'))
}

/// Comma-separated numbers or `start-end` pairs, no leading zeros, no blanks
pub fn validate_grammar(expr: &str) -> bool {
    let grammar = RANGE_GRAMMAR.get_or_init(|| {
        Regex::new(r"^[1-9][0-9]*(?:-[1-9][0-9]*)?(?:,[1-9][0-9]*(?:-[1-9][0-9]*)?)*$")
            .expect("range grammar is a valid regex")
    });
    grammar.is_match(expr)
}

/// Reject any `start-end` pair where start is greater than end
pub fn validate_format(expr: &str) -> bool {
    expr.split(',').all(|token| match split_span(token) {
        Some((start, end)) => match (parse_index(expr, start), parse_index(expr, end)) {
            (Ok(start), Ok(end)) => start <= end,
            _ => false,
        },
        None => true,
    })
}

/// Reject expressions naming a sheet past `sheet_count`.
///
/// Only the largest endpoint is computed, spans are never expanded.
pub fn validate_bounds(expr: &str, sheet_count: usize) -> Result<bool> {
    Ok(match max_index(expr)? {
        Some(max) => (max as usize) <= sheet_count,
        None => false,
    })
}

/// Largest index named by `expr`, `None` when it names none
pub(crate) fn max_index(expr: &str) -> Result<Option<u32>> {
    let mut max = None;
    for token in expr.split(',') {
        let candidate = match split_span(token) {
            Some((start, end)) => {
                let start = parse_index(expr, start)?;
                let end = parse_index(expr, end)?;
                if start > end {
                    return Err(UnlockError::malformed(
                        expr,
                        format!("range {}-{} starts after it ends", start, end),
                    ));
                }
                end
            }
            None if is_number(token) => parse_index(expr, token)?,
            None => continue,
        };
        if candidate > 0 {
            max = max.max(Some(candidate));
        }
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination() {
        assert!(validate_termination("1,2"));
        assert!(validate_termination("1-3"));
        assert!(!validate_termination("1,2,"));
        assert!(!validate_termination("1-"));
        assert!(!validate_termination("4,5-"));
        assert!(!validate_termination(","));
    }

    #[test]
    fn test_grammar() {
        assert!(validate_grammar("1"));
        assert!(validate_grammar("1,3,5-8"));
        assert!(validate_grammar("10-12,2"));
        assert!(!validate_grammar(""));
        assert!(!validate_grammar("01"));
        assert!(!validate_grammar("1, 2"));
        assert!(!validate_grammar("1,,2"));
        assert!(!validate_grammar("1-2-3"));
        assert!(!validate_grammar("0"));
        assert!(!validate_grammar("a"));
    }

    #[test]
    fn test_format() {
        assert!(validate_format("1,3,5-8"));
        assert!(validate_format("3-3"));
        assert!(!validate_format("8-5"));
        assert!(!validate_format("1,9-2,4"));
        assert!(!validate_format("1-x"));
    }

    #[test]
    fn test_bounds() {
        assert!(!validate_bounds("1-10", 5).unwrap());
        assert!(validate_bounds("1-5", 5).unwrap());
        assert!(validate_bounds("2,4", 5).unwrap());
        assert!(!validate_bounds("7", 5).unwrap());
    }

    #[test]
    fn test_bounds_does_not_expand_huge_spans() {
        assert!(!validate_bounds("1-4000000000", 5).unwrap());
        assert_eq!(max_index("3,1-4000000000").unwrap(), Some(4_000_000_000));
    }

    #[test]
    fn test_max_index_ignores_noise() {
        assert_eq!(max_index("2,abc,5").unwrap(), Some(5));
        assert_eq!(max_index("abc").unwrap(), None);
    }
}
