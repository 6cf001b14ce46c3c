//! Candidate production and the driver's scan state.

use layered_records::{PatternContext, Record};

use crate::element::Element;
use crate::error::ResolveResult;

/// Produces candidate records for document elements.
///
/// Implementations see the patterns widened by definitions in this and
/// earlier elements of the current pass.
pub trait CandidateResolver {
    /// Candidate records for the element at `index`.
    fn element_records(
        &self,
        index: usize,
        element: &Element,
        patterns: &PatternContext,
    ) -> ResolveResult<Vec<Record>>;

    /// Candidate records for one sentence of the element.
    fn sentence_records(
        &self,
        element: &Element,
        sentence: usize,
        patterns: &PatternContext,
    ) -> ResolveResult<Vec<Record>>;
}

/// Returns the records already attached to each element.
#[derive(Debug, Clone, Copy, Default)]
pub struct Precomputed;

impl CandidateResolver for Precomputed {
    fn element_records(
        &self,
        _index: usize,
        element: &Element,
        _patterns: &PatternContext,
    ) -> ResolveResult<Vec<Record>> {
        Ok(element.records.clone())
    }

    fn sentence_records(
        &self,
        element: &Element,
        sentence: usize,
        _patterns: &PatternContext,
    ) -> ResolveResult<Vec<Record>> {
        Ok(element
            .sentences
            .get(sentence)
            .map(|s| s.records.clone())
            .unwrap_or_default())
    }
}

/// Where the driver stands relative to the last heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No heading context applies.
    Scanning,
    /// A heading directly following another heading.
    InsideHeadingRun,
    /// The element directly after the one that set the head record.
    PostHeading,
}

impl ScanState {
    /// State for the element at `index`, given the index of the element that
    /// set the head record.
    pub fn at(elements: &[Element], index: usize, head_index: Option<usize>) -> Self {
        if elements[index].is_heading() && index > 0 && elements[index - 1].is_heading() {
            ScanState::InsideHeadingRun
        } else if head_index.map_or(false, |h| h + 1 == index) {
            ScanState::PostHeading
        } else {
            ScanState::Scanning
        }
    }
}
