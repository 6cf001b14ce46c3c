//! Resolver configuration, loadable from TOML.
//!
//! ```toml
//! models = ["MeltingPoint", "Compound"]
//! skip_elements = ["Citation", "MetaData"]
//! adjust_by_confidence = true
//!
//! [[adjacent_sections_for_merging]]
//! first = ["experimental"]
//! second = ["synthesis", "characterisation"]
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::element::ElementKind;
use crate::error::ConfigError;

/// Two groups of section-name substrings. A section matching one group and
/// a section matching the other are treated as adjacent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionPair {
    pub first: Vec<String>,
    pub second: Vec<String>,
}

impl SectionPair {
    pub fn new<A, B>(first: A, second: B) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        Self {
            first: first.into_iter().map(Into::into).collect(),
            second: second.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the two section names fall one in each group, in either order.
    /// Matching is case-insensitive.
    pub fn joins(&self, section_a: &str, section_b: &str) -> bool {
        let a = section_a.to_lowercase();
        let b = section_b.to_lowercase();
        (contains_any(&self.first, &a) && contains_any(&self.second, &b))
            || (contains_any(&self.second, &a) && contains_any(&self.first, &b))
    }
}

fn contains_any(substrings: &[String], parent: &str) -> bool {
    substrings
        .iter()
        .any(|substring| parent.contains(&substring.to_lowercase()))
}

/// Settings for one document resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Record type names to keep. Empty keeps every type.
    pub models: Vec<String>,
    /// Element kinds ignored entirely.
    pub skip_elements: Vec<ElementKind>,
    /// Section pairs whose distance counts no sections.
    pub adjacent_sections_for_merging: Vec<SectionPair>,
    /// Widened patterns match whole words, case-sensitively.
    pub strict_definitions: bool,
    /// Rank merge candidates by distance over confidence.
    pub adjust_by_confidence: bool,
    /// Drop output records that also appear nested in another output record.
    pub remove_merged_subrecords: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            skip_elements: Vec::new(),
            adjacent_sections_for_merging: Vec::new(),
            strict_definitions: true,
            adjust_by_confidence: true,
            remove_merged_subrecords: false,
        }
    }
}

impl ResolverConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            origin: "configuration string".to_string(),
            source,
        })
    }

    /// Load from a TOML file. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            origin: path.display().to_string(),
            source,
        })
    }

    /// Whether records of `type_name` are kept.
    pub fn keeps_model(&self, type_name: &str) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| m == type_name)
    }

    pub fn skips(&self, kind: ElementKind) -> bool {
        self.skip_elements.contains(&kind)
    }

    /// Whether the two sections are configured as adjacent.
    pub fn are_adjacent_sections(&self, section_a: &str, section_b: &str) -> bool {
        self.adjacent_sections_for_merging
            .iter()
            .any(|pair| pair.joins(section_a, section_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert!(config.strict_definitions);
        assert!(config.adjust_by_confidence);
        assert!(!config.remove_merged_subrecords);
        assert!(config.keeps_model("Anything"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResolverConfig::load(&dir.path().join("resolver.toml")).unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
models = ["MeltingPoint"]
skip_elements = ["Citation"]
strict_definitions = false

[[adjacent_sections_for_merging]]
first = ["Experimental"]
second = ["synthesis"]
"#
        )
        .unwrap();

        let config = ResolverConfig::load(file.path()).unwrap();
        assert!(config.keeps_model("MeltingPoint"));
        assert!(!config.keeps_model("Compound"));
        assert!(config.skips(ElementKind::Citation));
        assert!(!config.skips(ElementKind::Paragraph));
        assert!(!config.strict_definitions);
        assert!(config.adjust_by_confidence);
        assert!(config.are_adjacent_sections("2. Experimental details", "Synthesis of 3a"));
        assert!(config.are_adjacent_sections("Synthesis of 3a", "EXPERIMENTAL"));
        assert!(!config.are_adjacent_sections("Results", "Synthesis"));
    }

    #[test]
    fn test_parse_error() {
        let err = ResolverConfig::from_toml_str("models = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
