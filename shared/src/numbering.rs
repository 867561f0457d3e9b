//! Item code and document number formats
//!
//! Item codes are `BRG` followed by a zero-padded sequence (`BRG001`).
//! Document numbers are `{prefix}/{YYYYMMDD}/{seq}` (`BL/20240301/001`),
//! numbered per calendar day and document kind.
//!
//! Sequences have at most nine digits. Longer numbers may be supplied by
//! callers but never take part in generation.

use chrono::NaiveDate;

use crate::models::DocumentKind;

pub const ITEM_CODE_PREFIX: &str = "BRG";

pub const MAX_SEQUENCE_DIGITS: usize = 9;

/// Highest sequence number a scope can hand out
pub const MAX_SEQUENCE: i32 = 999_999_999;

/// Sequence a generated number is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberScope {
    ItemCode,
    Document { kind: DocumentKind, date: NaiveDate },
}

impl NumberScope {
    pub fn document(kind: DocumentKind, date: NaiveDate) -> Self {
        NumberScope::Document { kind, date }
    }

    /// Stable key of the counter row backing this scope
    pub fn key(&self) -> String {
        match self {
            NumberScope::ItemCode => ITEM_CODE_PREFIX.to_string(),
            NumberScope::Document { kind, date } => {
                format!("{}/{}", kind.prefix(), date.format("%Y%m%d"))
            }
        }
    }

    /// Render sequence number `seq` in this scope
    pub fn format(&self, seq: i32) -> String {
        match self {
            NumberScope::ItemCode => format!("{}{:03}", ITEM_CODE_PREFIX, seq),
            NumberScope::Document { .. } => format!("{}/{:03}", self.key(), seq),
        }
    }

    /// Sequence number of `value` if it belongs to this scope
    pub fn parse_sequence(&self, value: &str) -> Option<i32> {
        let digits = match self {
            NumberScope::ItemCode => value.strip_prefix(ITEM_CODE_PREFIX)?,
            NumberScope::Document { .. } => value.strip_prefix(&self.key())?.strip_prefix('/')?,
        };
        if digits.is_empty()
            || digits.len() > MAX_SEQUENCE_DIGITS
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        digits.parse().ok()
    }

    /// POSIX regex matching the numbers of this scope
    pub fn sql_pattern(&self) -> String {
        match self {
            NumberScope::ItemCode => {
                format!("^{}[0-9]{{1,{}}}$", ITEM_CODE_PREFIX, MAX_SEQUENCE_DIGITS)
            }
            NumberScope::Document { .. } => {
                format!("^{}/[0-9]{{1,{}}}$", self.key(), MAX_SEQUENCE_DIGITS)
            }
        }
    }
}

/// Next sequence number given the stored counter and the highest number
/// already in use. Never reuses a number seen by either. `None` once the
/// scope is past [`MAX_SEQUENCE`].
pub fn next_sequence(counter: Option<i32>, max_existing: i32) -> Option<i32> {
    counter
        .unwrap_or(0)
        .max(max_existing)
        .checked_add(1)
        .filter(|next| *next <= MAX_SEQUENCE)
}

/// Highest sequence number of `scope` among `values`, 0 if none
pub fn max_sequence<'a, I>(scope: &NumberScope, values: I) -> i32
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .filter_map(|v| scope.parse_sequence(v))
        .max()
        .unwrap_or(0)
}
