#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! Typed extraction records and the merge engine that resolves them.
//!
//! Candidate records come out of per-element parsers partially filled. This
//! crate holds them and decides when two of them describe the same thing.
//!
//! ## Record Model
//!
//! - [`RegistryBuilder`] - Declares record types once, with forward and cyclic references
//! - [`FieldSpec`] - Per-field kind, requiredness and contextual reach
//! - [`Record`] - A typed record with keypath access, confidences and JSON output
//!
//! ## Distances
//!
//! - [`ContextualRange`] - How far apart two records were found (sentences, paragraphs, sections)
//!
//! ## Merging
//!
//! - [`Record::merge_contextual`] - Fill contextual fields from a nearby record
//! - [`Record::merge_all`] - Fill any field
//! - [`remove_subsets`] - Collapse duplicates and subsets of a result set
//!
//! ## Example
//!
//! ```
//! use layered_records::{chemistry, ContextualRange, Record};
//!
//! let registry = chemistry::registry();
//! let mut mp = Record::of(&registry, "MeltingPoint")
//!     .unwrap()
//!     .with("raw_value", "89-90")
//!     .unwrap()
//!     .with("raw_units", "°C")
//!     .unwrap();
//! let compound = Record::of(&registry, "Compound")
//!     .unwrap()
//!     .with("names", ["H2O"])
//!     .unwrap();
//!
//! assert!(mp.merge_contextual(&compound, ContextualRange::paragraph()));
//! assert!(mp.get("apparatus").unwrap().is_none());
//! let names = mp.identity_record().unwrap().names();
//! assert!(names.contains("H2O"));
//! ```

mod contextual_range;
mod error;
mod field;
mod identity;
mod merge;
mod pattern;
mod record;
mod record_list;
mod schema;

// Built-in record types
pub mod chemistry;
// Confidence pooling functions
pub mod pooling;

pub use contextual_range::{ContextualRange, RangeDivisor, RangeUnit};
pub use error::{RecordError, RecordResult, SchemaError};
pub use field::{
    FieldKind, FieldSpec, FieldValue, FromFieldValue, RawValue, RecordTypeId, Scalar, ScalarKind,
};
pub use identity::PRODUCT_ROLE;
pub use pattern::{Definition, DefinitionKind, FieldPattern, PatternContext};
pub use record::{Record, SELF_KEY};
pub use record_list::{
    dedup_push, merge_list_contextual, remove_subsets, remove_used_subrecords,
    sort_merge_candidates, MergeCandidate, CONFIDENCE_EPSILON,
};
pub use schema::{IdentityFields, Registry, RegistryBuilder, Schema, SchemaBuilder};

#[cfg(test)]
mod tests {
    mod distance;
    mod merge_engine;
    mod record_model;
    mod record_set;
    mod serialization;
}
