//! Invoice numbering
//!
//! Invoice numbers are human-readable identifiers of the form
//! `{PREFIX}/{YEAR}/{SEQ}`, e.g. `BH/2025/3`:
//!
//! - `PREFIX` is a fixed two-letter uppercase code
//! - `YEAR` is the four-digit calendar year the invoice was created in
//! - `SEQ` starts at 1 every year and is never zero-padded
//!
//! Sequence numbers are handed out by the store through a per-year counter.
//! The helpers here parse and format numbers and compute the highest sequence
//! already used by historical invoices, which seeds a year's counter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Prefix used when none is configured
pub const DEFAULT_INVOICE_PREFIX: &str = "BH";

/// Errors raised when parsing numbering components
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NumberingError {
    #[error("Invalid invoice prefix '{0}': expected exactly two uppercase letters")]
    InvalidPrefix(String),

    #[error("Malformed invoice number '{0}': expected PREFIX/YEAR/SEQ")]
    MalformedNumber(String),

    #[error("Year {0} cannot be rendered with four digits")]
    YearOutOfRange(i32),
}

/// The two-letter code every invoice number starts with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoicePrefix(String);

impl InvoicePrefix {
    pub fn new(code: impl Into<String>) -> Result<Self, NumberingError> {
        let code = code.into();
        if code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(code))
        } else {
            Err(NumberingError::InvalidPrefix(code))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `{PREFIX}/{YEAR}/` scope shared by every number of `year`
    pub fn scope(&self, year: i32) -> String {
        format!("{}/{}/", self.0, year)
    }
}

impl Default for InvoicePrefix {
    fn default() -> Self {
        Self(DEFAULT_INVOICE_PREFIX.to_string())
    }
}

impl fmt::Display for InvoicePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InvoicePrefix {
    type Err = NumberingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for InvoicePrefix {
    type Error = NumberingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InvoicePrefix> for String {
    fn from(prefix: InvoicePrefix) -> String {
        prefix.0
    }
}

/// A parsed `PREFIX/YEAR/SEQ` invoice number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceNumber {
    prefix: InvoicePrefix,
    year: i32,
    sequence: u64,
}

impl InvoiceNumber {
    /// Builds a number, rejecting years that are not four digits long
    pub fn new(prefix: InvoicePrefix, year: i32, sequence: u64) -> Result<Self, NumberingError> {
        if !(1000..=9999).contains(&year) {
            return Err(NumberingError::YearOutOfRange(year));
        }
        Ok(Self {
            prefix,
            year,
            sequence,
        })
    }

    pub fn prefix(&self) -> &InvoicePrefix {
        &self.prefix
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.prefix, self.year, self.sequence)
    }
}

impl FromStr for InvoiceNumber {
    type Err = NumberingError;

    /// Parses `^[A-Z]{2}/\d{4}/\d+$` with a year from 1000 to 9999
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || NumberingError::MalformedNumber(s.to_string());

        let mut parts = s.split('/');
        let (Some(prefix), Some(year), Some(sequence), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let prefix = InvoicePrefix::new(prefix).map_err(|_| malformed())?;
        if year.len() != 4 || !is_ascii_digits(year) || !is_ascii_digits(sequence) {
            return Err(malformed());
        }
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let sequence: u64 = sequence.parse().map_err(|_| malformed())?;

        Self::new(prefix, year, sequence)
    }
}

impl TryFrom<String> for InvoiceNumber {
    type Error = NumberingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InvoiceNumber> for String {
    fn from(number: InvoiceNumber) -> String {
        number.to_string()
    }
}

fn is_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Returns the highest sequence used by `numbers` within `prefix`/`year`
///
/// Identifiers outside the scope are ignored. Identifiers inside the scope
/// that do not parse are logged and skipped; they can never be handed out
/// again because counters only move forward and numbers are unique.
pub fn highest_sequence<'a, I>(prefix: &InvoicePrefix, year: i32, numbers: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    let scope = prefix.scope(year);

    numbers
        .into_iter()
        .filter(|n| n.starts_with(&scope))
        .filter_map(|n| match n.parse::<InvoiceNumber>() {
            Ok(parsed) => Some(parsed.sequence()),
            Err(_) => {
                warn!(invoice_number = %n, "Skipping malformed invoice number while seeding sequence");
                None
            }
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bh() -> InvoicePrefix {
        InvoicePrefix::default()
    }

    #[test]
    fn test_format_has_no_padding() {
        let number = InvoiceNumber::new(bh(), 2025, 3).unwrap();
        assert_eq!(number.to_string(), "BH/2025/3");
    }

    #[test]
    fn test_parse_round_trip() {
        let number: InvoiceNumber = "BH/2025/42".parse().unwrap();
        assert_eq!(number.year(), 2025);
        assert_eq!(number.sequence(), 42);
        assert_eq!(number.prefix().as_str(), "BH");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["BH/2025/", "BH/25/1", "bh/2025/1", "BHX/2025/1", "BH/2025/1a", "BH/2025/1/2", "BH/2025/-1"] {
            assert!(bad.parse::<InvoiceNumber>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_prefix_validation() {
        assert!(InvoicePrefix::new("BH").is_ok());
        assert!(InvoicePrefix::new("B").is_err());
        assert!(InvoicePrefix::new("Bh").is_err());
        assert!(InvoicePrefix::new("ÉH").is_err());
    }

    #[test]
    fn test_year_must_have_four_digits() {
        assert!(matches!(
            InvoiceNumber::new(bh(), 12025, 1),
            Err(NumberingError::YearOutOfRange(12025))
        ));
    }

    #[test]
    fn test_parse_applies_year_range() {
        assert!(matches!(
            "BH/0000/1".parse::<InvoiceNumber>(),
            Err(NumberingError::YearOutOfRange(0))
        ));
        assert!(matches!(
            "BH/0999/4".parse::<InvoiceNumber>(),
            Err(NumberingError::YearOutOfRange(999))
        ));
        assert!("BH/1000/4".parse::<InvoiceNumber>().is_ok());
    }

    #[test]
    fn test_highest_sequence_is_numeric_not_lexicographic() {
        let numbers = ["BH/2025/9", "BH/2025/10", "BH/2025/2"];
        assert_eq!(highest_sequence(&bh(), 2025, numbers), 10);
    }

    #[test]
    fn test_highest_sequence_ignores_other_years_and_prefixes() {
        let numbers = ["BH/2024/77", "XY/2025/50", "BH/2025/4"];
        assert_eq!(highest_sequence(&bh(), 2025, numbers), 4);
    }

    #[test]
    fn test_highest_sequence_skips_malformed() {
        let numbers = ["BH/2025/abc", "BH/2025/7", "BH/2025/"];
        assert_eq!(highest_sequence(&bh(), 2025, numbers), 7);
    }

    #[test]
    fn test_highest_sequence_empty_scope() {
        assert_eq!(highest_sequence(&bh(), 2025, std::iter::empty()), 0);
    }
}
