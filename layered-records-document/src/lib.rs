#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! Document-level resolution for layered-records.
//!
//! Takes the candidate records found in each element of a document and
//! resolves them into one cleaned list: unidentified property records get
//! the compound the surrounding text is about, records are merged with
//! their nearest neighbours, and incomplete or duplicate records are
//! dropped.
//!
//! ## Core Types
//!
//! - [`Document`] - The elements of one document and how to resolve them
//! - [`Element`] / [`Sentence`] - Classified text with candidate records and definitions
//! - [`ResolverConfig`] - Model filter, skipped elements, adjacent sections (TOML-loadable)
//! - [`CandidateResolver`] - Produces candidate records, seeing patterns widened so far
//!
//! ## Example
//!
//! ```
//! use layered_records::{chemistry, Record};
//! use layered_records_document::{Document, Element};
//!
//! let registry = chemistry::registry();
//! let x = Record::of(&registry, "Compound").unwrap().with("names", ["X"]).unwrap();
//! let mp = Record::of(&registry, "MeltingPoint")
//!     .unwrap()
//!     .with("raw_value", "89-90")
//!     .unwrap()
//!     .with("raw_units", "°C")
//!     .unwrap();
//!
//! let doc = Document::new(
//!     &registry,
//!     vec![
//!         Element::heading("Synthesis of X").with_record(x),
//!         Element::paragraph("Melting point was 89-90°C.").with_record(mp),
//!     ],
//! );
//! let records = doc.records().unwrap();
//! let mp = records.iter().find(|r| r.type_name() == "MeltingPoint").unwrap();
//! assert!(mp.identity_record().unwrap().names().contains("X"));
//! ```

mod config;
mod distance;
mod document;
mod element;
mod error;
mod resolution;

// Document types
pub use document::Document;
pub use element::{AbbreviationDefinition, Element, ElementKind, Sentence, CHEMICAL_TAG};

// Configuration
pub use config::{ResolverConfig, SectionPair};

// Resolution
pub use distance::{element_distance, section_name};
pub use error::{ConfigError, ResolveError, ResolveResult};
pub use resolution::{CandidateResolver, Precomputed, ScanState};

pub use layered_records::{Definition, DefinitionKind};

#[cfg(test)]
mod tests {
    mod identity;
    mod merging;
    mod scenarios;
}
