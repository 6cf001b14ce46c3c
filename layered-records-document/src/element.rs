//! Document elements and the candidate data attached to them.

use layered_records::{Definition, Record};
use serde::{Deserialize, Serialize};

/// Classification of a document element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Title,
    Heading,
    Paragraph,
    Caption,
    Table,
    Figure,
    Footnote,
    Citation,
    MetaData,
    Other,
}

impl ElementKind {
    /// Headings and titles name the section that follows them.
    pub fn names_section(self) -> bool {
        matches!(self, ElementKind::Heading | ElementKind::Title)
    }
}

/// An abbreviation declared in the text, e.g. "tetrahydrofuran (THF)".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbbreviationDefinition {
    pub short: String,
    pub long: String,
    /// Entity tag of the long form. `CM` marks a chemical mention.
    pub tag: String,
}

impl AbbreviationDefinition {
    pub fn new(short: impl Into<String>, long: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            long: long.into(),
            tag: tag.into(),
        }
    }

    pub fn is_chemical(&self) -> bool {
        self.tag == CHEMICAL_TAG
    }
}

/// Abbreviation tag for chemical mentions.
pub const CHEMICAL_TAG: &str = "CM";

/// A sentence of a paragraph with its candidate records.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    pub text: String,
    pub records: Vec<Record>,
}

impl Sentence {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            records: Vec::new(),
        }
    }

    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }
}

/// One element of a document, as produced by upstream parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub text: String,
    pub records: Vec<Record>,
    pub sentences: Vec<Sentence>,
    pub definitions: Vec<Definition>,
    pub abbreviations: Vec<AbbreviationDefinition>,
}

impl Element {
    pub fn new(kind: ElementKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            records: Vec::new(),
            sentences: Vec::new(),
            definitions: Vec::new(),
            abbreviations: Vec::new(),
        }
    }

    pub fn title(text: impl Into<String>) -> Self {
        Self::new(ElementKind::Title, text)
    }

    pub fn heading(text: impl Into<String>) -> Self {
        Self::new(ElementKind::Heading, text)
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(ElementKind::Paragraph, text)
    }

    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }

    /// Append a sentence. Its records are also added to the element's records.
    pub fn with_sentence(mut self, sentence: Sentence) -> Self {
        self.records.extend(sentence.records.iter().cloned());
        self.sentences.push(sentence);
        self
    }

    pub fn with_definition(mut self, definition: Definition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn with_abbreviation(mut self, abbreviation: AbbreviationDefinition) -> Self {
        self.abbreviations.push(abbreviation);
        self
    }

    pub fn is_heading(&self) -> bool {
        self.kind == ElementKind::Heading
    }

    pub fn is_paragraph(&self) -> bool {
        self.kind == ElementKind::Paragraph
    }

    /// Number of sentences. A paragraph without explicit sentences counts
    /// as one.
    pub fn sentence_count(&self) -> usize {
        if self.sentences.is_empty() && self.is_paragraph() {
            1
        } else {
            self.sentences.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layered_records::chemistry;

    #[test]
    fn test_sentence_records_join_element() {
        let compound = Record::of(&chemistry::registry(), chemistry::COMPOUND)
            .unwrap()
            .with("names", ["benzene"])
            .unwrap();
        let element = Element::paragraph("Benzene was dried. It melted at 5 °C.")
            .with_sentence(Sentence::new("Benzene was dried.").with_record(compound.clone()))
            .with_sentence(Sentence::new("It melted at 5 °C."));

        assert_eq!(element.records, vec![compound]);
        assert_eq!(element.sentence_count(), 2);
    }

    #[test]
    fn test_sentence_count() {
        assert_eq!(Element::paragraph("One sentence.").sentence_count(), 1);
        assert_eq!(Element::heading("Results").sentence_count(), 0);
    }

    #[test]
    fn test_element_kind_serde() {
        let kinds: Vec<ElementKind> = serde_json::from_str(r#"["Heading","MetaData"]"#).unwrap();
        assert_eq!(kinds, vec![ElementKind::Heading, ElementKind::MetaData]);
        assert!(ElementKind::Title.names_section());
        assert!(!ElementKind::Caption.names_section());
    }

    #[test]
    fn test_chemical_abbreviation() {
        assert!(AbbreviationDefinition::new("THF", "tetrahydrofuran", "CM").is_chemical());
        assert!(!AbbreviationDefinition::new("NMR", "nuclear magnetic resonance", "O").is_chemical());
    }
}
