//! Document distances measured in sentences, paragraphs, sections and documents.
//!
//! A [`ContextualRange`] is a count per [`RangeUnit`]. Counts may be negative
//! (after subtraction) or fractional (after confidence weighting). Ranges are
//! ordered lexicographically from the coarsest unit down, so one section is
//! always farther than any number of paragraphs:
//!
//! ```
//! use layered_records::ContextualRange;
//!
//! let many_paragraphs = ContextualRange::paragraph() * 100.0;
//! assert!(many_paragraphs < ContextualRange::section());
//! assert!(ContextualRange::zero() < ContextualRange::sentence());
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Granularity of a document distance, finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeUnit {
    Sentence,
    Paragraph,
    Section,
    Document,
}

impl RangeUnit {
    /// All units, finest first.
    pub const ALL: [RangeUnit; 4] = [
        RangeUnit::Sentence,
        RangeUnit::Paragraph,
        RangeUnit::Section,
        RangeUnit::Document,
    ];

    /// All units, coarsest first. This is the comparison order.
    pub const BY_MAGNITUDE: [RangeUnit; 4] = [
        RangeUnit::Document,
        RangeUnit::Section,
        RangeUnit::Paragraph,
        RangeUnit::Sentence,
    ];

    fn slot(self) -> usize {
        match self {
            RangeUnit::Sentence => 0,
            RangeUnit::Paragraph => 1,
            RangeUnit::Section => 2,
            RangeUnit::Document => 3,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RangeUnit::Sentence => "Sentence",
            RangeUnit::Paragraph => "Paragraph",
            RangeUnit::Section => "Section",
            RangeUnit::Document => "Document",
        }
    }
}

/// Right-hand side of [`ContextualRange::divide`].
#[derive(Debug, Clone, Copy)]
pub enum RangeDivisor {
    Number(f64),
    Range(ContextualRange),
}

impl From<f64> for RangeDivisor {
    fn from(value: f64) -> Self {
        RangeDivisor::Number(value)
    }
}

impl From<ContextualRange> for RangeDivisor {
    fn from(value: ContextualRange) -> Self {
        RangeDivisor::Range(value)
    }
}

/// A multiset of unit counts. Absent units count as zero.
#[derive(Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContextualRange {
    counts: [f64; 4],
}

impl ContextualRange {
    /// The empty range, identity for addition.
    pub fn zero() -> Self {
        Self::default()
    }

    /// `count` units of `unit`.
    pub fn of(unit: RangeUnit, count: f64) -> Self {
        let mut range = Self::zero();
        range.counts[unit.slot()] = count;
        range
    }

    pub fn sentence() -> Self {
        Self::of(RangeUnit::Sentence, 1.0)
    }

    pub fn paragraph() -> Self {
        Self::of(RangeUnit::Paragraph, 1.0)
    }

    pub fn section() -> Self {
        Self::of(RangeUnit::Section, 1.0)
    }

    /// One whole document. Default reach of a contextual field.
    pub fn document() -> Self {
        Self::of(RangeUnit::Document, 1.0)
    }

    /// Count for a single unit.
    pub fn count(&self, unit: RangeUnit) -> f64 {
        self.counts[unit.slot()]
    }

    /// True when every unit count is zero.
    pub fn is_zero(&self) -> bool {
        self.counts.iter().all(|c| *c == 0.0)
    }

    /// Non-zero unit counts, finest first.
    pub fn constituents(&self) -> impl Iterator<Item = (RangeUnit, f64)> + '_ {
        RangeUnit::ALL
            .iter()
            .map(move |unit| (*unit, self.count(*unit)))
            .filter(|(_, count)| *count != 0.0)
    }

    /// Multiply every count by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        let mut counts = self.counts;
        for count in counts.iter_mut() {
            *count *= factor;
        }
        Self { counts }
    }

    /// Divide by a number. Dividing by another range, by zero or by a
    /// non-finite number is rejected.
    pub fn divide(&self, divisor: impl Into<RangeDivisor>) -> Result<Self, RecordError> {
        match divisor.into() {
            RangeDivisor::Number(value) if value == 0.0 || !value.is_finite() => {
                Err(RecordError::InvalidOperation(format!(
                    "a ContextualRange cannot be divided by {}",
                    value
                )))
            }
            RangeDivisor::Number(value) => Ok(self.scale(1.0 / value)),
            RangeDivisor::Range(_) => Err(RecordError::InvalidOperation(
                "a ContextualRange can only be divided by a number".to_string(),
            )),
        }
    }
}

impl PartialEq for ContextualRange {
    fn eq(&self, other: &Self) -> bool {
        self.counts
            .iter()
            .zip(other.counts.iter())
            .all(|(a, b)| a == b)
    }
}

impl PartialOrd for ContextualRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        for unit in RangeUnit::BY_MAGNITUDE.iter() {
            match self.count(*unit).partial_cmp(&other.count(*unit))? {
                Ordering::Equal => continue,
                decided => return Some(decided),
            }
        }
        Some(Ordering::Equal)
    }
}

impl Add for ContextualRange {
    type Output = ContextualRange;

    fn add(self, rhs: Self) -> Self::Output {
        let mut counts = self.counts;
        for (count, other) in counts.iter_mut().zip(rhs.counts.iter()) {
            *count += other;
        }
        Self { counts }
    }
}

impl Neg for ContextualRange {
    type Output = ContextualRange;

    fn neg(self) -> Self::Output {
        self.scale(-1.0)
    }
}

impl Sub for ContextualRange {
    type Output = ContextualRange;

    fn sub(self, rhs: Self) -> Self::Output {
        self + (-rhs)
    }
}

impl Mul<f64> for ContextualRange {
    type Output = ContextualRange;

    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}

impl Mul<ContextualRange> for f64 {
    type Output = ContextualRange;

    fn mul(self, rhs: ContextualRange) -> Self::Output {
        rhs.scale(self)
    }
}

/// Plain float division. [`ContextualRange::divide`] rejects zero divisors.
impl Div<f64> for ContextualRange {
    type Output = ContextualRange;

    fn div(self, rhs: f64) -> Self::Output {
        self.scale(1.0 / rhs)
    }
}

impl Sum for ContextualRange {
    fn sum<I: Iterator<Item = ContextualRange>>(iter: I) -> Self {
        iter.fold(ContextualRange::zero(), |acc, range| acc + range)
    }
}

impl fmt::Debug for ContextualRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextualRange({})", self)
    }
}

impl fmt::Display for ContextualRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let mut first = true;
        for unit in RangeUnit::BY_MAGNITUDE.iter() {
            let count = self.count(*unit);
            if count == 0.0 {
                continue;
            }
            if !first {
                write!(f, " + ")?;
            }
            first = false;
            write!(f, "{} {}", count, unit.label())?;
        }
        Ok(())
    }
}
