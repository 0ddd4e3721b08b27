//! Sheet range expressions such as `1,3,5-8`

pub mod validate;

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Result, UnlockError};

pub use validate::{validate_bounds, validate_format, validate_grammar, validate_termination};

/// Sorted, de-duplicated 1-based sheet indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SheetIndexSet(Vec<u32>);

impl SheetIndexSet {
    /// Every sheet of a document with `count` sheets
    pub fn all(count: usize) -> Self {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        Self((1..=count).collect())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u32> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn max(&self) -> Option<u32> {
        self.0.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for SheetIndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for index in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}", index)?;
            first = false;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SheetIndexSet {
    type Item = &'a u32;
    type IntoIter = std::slice::Iter<'a, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Parse a range expression into sheet indices.
///
/// Tokens are separated by `,`. A token with `-` expands to the inclusive
/// span `start..=end`; any other token is kept when it is a plain number and
/// silently dropped otherwise. Zero is never a sheet index and is dropped too.
pub fn parse(expr: &str) -> Result<SheetIndexSet> {
    let mut indices = BTreeSet::new();

    for token in expr.split(',') {
        if let Some((start, end)) = split_span(token) {
            let start = parse_index(expr, start)?;
            let end = parse_index(expr, end)?;
            if start > end {
                return Err(UnlockError::malformed(
                    expr,
                    format!("range {}-{} starts after it ends", start, end),
                ));
            }
            indices.extend(start..=end);
        } else if is_number(token) {
            let index = parse_index(expr, token)?;
            indices.insert(index);
        }
    }

    indices.remove(&0);
    Ok(SheetIndexSet(indices.into_iter().collect()))
}

/// Split a `start-end` token at its first hyphen
pub(crate) fn split_span(token: &str) -> Option<(&str, &str)> {
    token.split_once('-')
}

pub(crate) fn is_number(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn parse_index(expr: &str, token: &str) -> Result<u32> {
    if !is_number(token) {
        return Err(UnlockError::malformed(
            expr,
            format!("'{}' is not a sheet number", token),
        ));
    }
    token
        .parse::<u32>()
        .map_err(|_| UnlockError::malformed(expr, format!("'{}' is too large", token)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(expr: &str) -> Vec<u32> {
        parse(expr).unwrap().into_vec()
    }

    #[test]
    fn test_parse_mixed_forms() {
        assert_eq!(indices("1,3,5-8"), vec![1, 3, 5, 6, 7, 8]);
    }

    #[test]
    fn test_parse_sorts_and_deduplicates() {
        assert_eq!(indices("3,1,1-3"), vec![1, 2, 3]);
        assert_eq!(indices("9,2-4,3"), vec![2, 3, 4, 9]);
    }

    #[test]
    fn test_parse_single_element_span() {
        assert_eq!(indices("4-4"), vec![4]);
    }

    #[test]
    fn test_parse_drops_non_numeric_tokens() {
        assert_eq!(indices("2,abc,5"), vec![2, 5]);
        assert_eq!(indices("1,,2"), vec![1, 2]);
    }

    #[test]
    fn test_parse_rejects_reversed_span() {
        let err = parse("5-2").unwrap_err();
        assert!(matches!(err, UnlockError::MalformedRange { .. }));
    }

    #[test]
    fn test_parse_rejects_broken_span() {
        assert!(parse("1-").is_err());
        assert!(parse("a-3").is_err());
        assert!(parse("1-2-3").is_err());
    }

    #[test]
    fn test_canonical_form_is_stable() {
        let canonical = "1,2,5,7";
        let rendered = parse(canonical).unwrap().to_string();
        assert_eq!(rendered, canonical);
        assert_eq!(parse(&rendered).unwrap().to_string(), canonical);

        assert_eq!(parse("7,5,1-2").unwrap().to_string(), canonical);
    }

    #[test]
    fn test_all_sheets() {
        assert_eq!(SheetIndexSet::all(3).into_vec(), vec![1, 2, 3]);
        assert!(SheetIndexSet::all(0).is_empty());
        assert_eq!(SheetIndexSet::all(4).max(), Some(4));
    }
}
