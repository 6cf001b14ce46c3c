//! Per-pass widening of updatable field patterns.
//!
//! A field marked `updatable` carries a base regular expression. While a
//! document is resolved, inline definitions such as "melting point (Tm)"
//! widen that expression with the defined specifier so later elements can
//! match it. The widened state lives here rather than on the shared
//! [`Schema`], and [`PatternContext::reset`] returns every field to its base
//! form at the end of the pass.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RecordError, RecordResult};
use crate::field::RecordTypeId;
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefinitionKind {
    /// A property specifier, e.g. `Tm` for "melting point".
    Specifier,
    /// A label standing for a chemical, e.g. `3a`.
    ChemicalLabel,
}

/// An inline definition found in a document element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// The short form being defined.
    pub specifier: String,
    /// The text the definition was found in.
    pub text: String,
    pub kind: DefinitionKind,
}

impl Definition {
    pub fn specifier(specifier: impl Into<String>, text: impl Into<String>) -> Self {
        Definition {
            specifier: specifier.into(),
            text: text.into(),
            kind: DefinitionKind::Specifier,
        }
    }

    pub fn chemical_label(label: impl Into<String>, text: impl Into<String>) -> Self {
        Definition {
            specifier: label.into(),
            text: text.into(),
            kind: DefinitionKind::ChemicalLabel,
        }
    }
}

/// A field's base pattern plus the alternatives added during the pass.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    base: Option<String>,
    additions: Vec<String>,
    regex: Option<Regex>,
}

impl FieldPattern {
    fn new(field: &str, base: Option<String>) -> RecordResult<Self> {
        let mut pattern = FieldPattern {
            base,
            additions: Vec::new(),
            regex: None,
        };
        pattern.compile(field)?;
        Ok(pattern)
    }

    /// The combined expression, or `None` when the pattern matches nothing.
    pub fn source(&self) -> Option<String> {
        let alternatives: Vec<String> = self
            .base
            .iter()
            .chain(self.additions.iter())
            .map(|alternative| format!("(?:{})", alternative))
            .collect();
        if alternatives.is_empty() {
            None
        } else {
            Some(alternatives.join("|"))
        }
    }

    pub fn additions(&self) -> &[String] {
        &self.additions
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().map_or(false, |regex| regex.is_match(text))
    }

    fn widen(&mut self, field: &str, alternative: String) -> RecordResult<bool> {
        if self.additions.contains(&alternative) {
            return Ok(false);
        }
        self.additions.push(alternative);
        self.compile(field)?;
        Ok(true)
    }

    fn compile(&mut self, field: &str) -> RecordResult<()> {
        self.regex = match self.source() {
            Some(source) => Some(Regex::new(&source).map_err(|source| RecordError::Pattern {
                field: field.to_string(),
                source,
            })?),
            None => None,
        };
        Ok(())
    }
}

/// Widened patterns for one document pass, keyed by record type and field.
#[derive(Debug, Clone, Default)]
pub struct PatternContext {
    patterns: HashMap<(RecordTypeId, usize), FieldPattern>,
    updated: HashSet<RecordTypeId>,
}

impl PatternContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any field of the type was widened during this pass.
    pub fn is_updated(&self, record_type: RecordTypeId) -> bool {
        self.updated.contains(&record_type)
    }

    /// The widened pattern of a field, if it was widened during this pass.
    pub fn widened(&self, schema: &Schema, field: &str) -> RecordResult<Option<&FieldPattern>> {
        let index = schema.require(field)?;
        Ok(self.patterns.get(&(schema.id(), index)))
    }

    /// Current source of a field's pattern: widened if updated, else the base.
    pub fn source(&self, schema: &Schema, field: &str) -> RecordResult<Option<String>> {
        let index = schema.require(field)?;
        Ok(match self.patterns.get(&(schema.id(), index)) {
            Some(pattern) => pattern.source(),
            None => schema.spec(index).pattern.clone(),
        })
    }

    /// Test `text` against the field's current pattern.
    pub fn is_match(&self, schema: &Schema, field: &str, text: &str) -> RecordResult<bool> {
        let index = schema.require(field)?;
        self.matches_at(schema, index, text)
    }

    fn matches_at(&self, schema: &Schema, index: usize, text: &str) -> RecordResult<bool> {
        if let Some(pattern) = self.patterns.get(&(schema.id(), index)) {
            return Ok(pattern.is_match(text));
        }
        match &schema.spec(index).pattern {
            Some(base) => Regex::new(base)
                .map(|regex| regex.is_match(text))
                .map_err(|source| RecordError::Pattern {
                    field: schema.field_name(index).to_string(),
                    source,
                }),
            None => Ok(false),
        }
    }

    /// Widen the type's updatable fields with `definitions`.
    ///
    /// Identity types add every chemical-label definition to their labels
    /// field. Other types add each specifier definition to every updatable
    /// field whose current pattern matches the definition text. Returns
    /// whether anything was widened.
    pub fn update(
        &mut self,
        schema: &Schema,
        definitions: &[Definition],
        strict: bool,
    ) -> RecordResult<bool> {
        let mut widened = false;
        if let Some(identity) = schema.identity() {
            for definition in definitions {
                if definition.kind != DefinitionKind::ChemicalLabel {
                    continue;
                }
                widened |= self.widen(schema, identity.labels, &definition.specifier, strict)?;
            }
        } else {
            for definition in definitions {
                if definition.kind != DefinitionKind::Specifier {
                    continue;
                }
                for index in 0..schema.len() {
                    let spec = schema.spec(index);
                    if !spec.updatable || spec.pattern.is_none() {
                        continue;
                    }
                    if self.matches_at(schema, index, &definition.text)? {
                        widened |= self.widen(schema, index, &definition.specifier, strict)?;
                    }
                }
            }
        }
        if widened {
            self.updated.insert(schema.id());
        }
        Ok(widened)
    }

    fn widen(
        &mut self,
        schema: &Schema,
        index: usize,
        specifier: &str,
        strict: bool,
    ) -> RecordResult<bool> {
        let field = schema.field_name(index);
        let escaped = regex::escape(specifier);
        let alternative = if strict {
            word_bounded(specifier, &escaped)
        } else {
            format!("(?i:{})", escaped)
        };
        let key = (schema.id(), index);
        if !self.patterns.contains_key(&key) {
            let base = FieldPattern::new(field, schema.spec(index).pattern.clone())?;
            self.patterns.insert(key, base);
        }
        let changed = match self.patterns.get_mut(&key) {
            Some(pattern) => pattern.widen(field, alternative)?,
            None => false,
        };
        if changed {
            log::debug!("widened {}.{} with {:?}", schema.name(), field, specifier);
        }
        Ok(changed)
    }

    /// Return every field to its base pattern.
    pub fn reset(&mut self) {
        self.patterns.clear();
        self.updated.clear();
    }
}

/// `escaped` with a word boundary on each side whose edge character is a
/// word character. `\b` beside punctuation never matches.
fn word_bounded(specifier: &str, escaped: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let start = if specifier.chars().next().map_or(false, is_word) { r"\b" } else { "" };
    let end = if specifier.chars().last().map_or(false, is_word) { r"\b" } else { "" };
    format!("{}{}{}", start, escaped, end)
}
