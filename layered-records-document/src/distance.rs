//! Distance between two elements of a document.

use layered_records::ContextualRange;

use crate::config::ResolverConfig;
use crate::element::{Element, ElementKind};

/// Text of the nearest heading or title at or before `index`.
pub fn section_name(elements: &[Element], index: usize) -> Option<&str> {
    elements
        .get(..=index)?
        .iter()
        .rev()
        .find(|el| el.kind.names_section())
        .map(|el| el.text.as_str())
}

/// Distance between the elements at indices `a` and `b`.
///
/// The same element is one sentence apart. Otherwise the elements after the
/// earlier index, up to and including the later one, are counted: a heading
/// adds a section and restarts the paragraph count, any other element adds
/// a paragraph. Sections configured as adjacent count no sections.
pub fn element_distance(
    elements: &[Element],
    a: usize,
    b: usize,
    config: &ResolverConfig,
) -> ContextualRange {
    if a == b {
        return ContextualRange::sentence();
    }
    let (start, end) = if a < b { (a, b) } else { (b, a) };

    let mut sections = 0.0;
    let mut paragraphs = 0.0;
    for el in &elements[start + 1..=end] {
        if el.kind == ElementKind::Heading {
            paragraphs = 0.0;
            sections += 1.0;
        } else {
            paragraphs += 1.0;
        }
    }

    if let (Some(section_a), Some(section_b)) =
        (section_name(elements, start), section_name(elements, end))
    {
        if config.are_adjacent_sections(section_a, section_b) {
            sections = 0.0;
        }
    }

    ContextualRange::section() * sections + ContextualRange::paragraph() * paragraphs
}
