//! Built-in chemistry record types.
//!
//! ```
//! use layered_records::{chemistry, Record};
//!
//! let registry = chemistry::registry();
//! let mp = Record::of(&registry, "MeltingPoint")
//!     .unwrap()
//!     .with("raw_value", "89-90")
//!     .unwrap()
//!     .with("raw_units", "°C")
//!     .unwrap();
//! assert!(mp.is_unidentified());
//! ```

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::SchemaError;
use crate::field::{FieldSpec, RecordTypeId, ScalarKind};
use crate::schema::{Registry, SchemaBuilder};

pub const COMPOUND: &str = "Compound";
pub const APPARATUS: &str = "Apparatus";
pub const MELTING_POINT: &str = "MeltingPoint";
pub const GLASS_TRANSITION: &str = "GlassTransition";
pub const IR_PEAK: &str = "IrPeak";
pub const IR_SPECTRUM: &str = "IrSpectrum";
pub const NMR_PEAK: &str = "NmrPeak";
pub const NMR_SPECTRUM: &str = "NmrSpectrum";
pub const INTERATOMIC_DISTANCE: &str = "InteratomicDistance";

static REGISTRY: Lazy<Arc<Registry>> =
    Lazy::new(|| build().expect("built-in chemistry catalog is valid"));

/// The shared catalog registry, built on first use.
pub fn registry() -> Arc<Registry> {
    Arc::clone(&REGISTRY)
}

fn quantity() -> SchemaBuilder {
    SchemaBuilder::new()
        .field("raw_value", FieldSpec::text().required().contextual())
        .field("raw_units", FieldSpec::text().required().contextual())
        .field(
            "value",
            FieldSpec::list_of_scalar(ScalarKind::Number).contextual(),
        )
        .field("units", FieldSpec::text().contextual())
        .field("error", FieldSpec::number().contextual())
        .field("specifier", FieldSpec::text())
}

fn text() -> FieldSpec {
    FieldSpec::text()
}

fn contextual_text() -> FieldSpec {
    FieldSpec::text().contextual()
}

/// Build a fresh copy of the catalog.
pub fn build() -> Result<Arc<Registry>, SchemaError> {
    let mut builder = Registry::builder();
    let compound = builder.declare(COMPOUND);
    let apparatus = builder.declare(APPARATUS);
    let ir_peak = builder.declare(IR_PEAK);
    let nmr_peak = builder.declare(NMR_PEAK);

    builder.define(
        compound,
        SchemaBuilder::new()
            .field("names", FieldSpec::set_of(ScalarKind::Text).updatable())
            .field("labels", FieldSpec::set_of(ScalarKind::Text).updatable())
            .field("roles", FieldSpec::set_of(ScalarKind::Text))
            .identity("names", "labels", "roles"),
    )?;
    builder.define(apparatus, SchemaBuilder::new().field("name", text()))?;

    builder.register(
        MELTING_POINT,
        SchemaBuilder::new()
            .embed(&quantity())
            .field(
                "specifier",
                FieldSpec::text()
                    .updatable()
                    .pattern(r"(?i)\b(?:m\.\s?p\.|mp|melting\s+points?|melting\s+temperatures?)\b"),
            )
            .field("solvent", contextual_text())
            .field("concentration", contextual_text())
            .field("concentration_units", contextual_text())
            .field("apparatus", FieldSpec::nested(apparatus).contextual())
            .field("compound", FieldSpec::nested(compound).contextual()),
    )?;

    builder.register(
        GLASS_TRANSITION,
        SchemaBuilder::new()
            .field("value", text())
            .field("units", contextual_text())
            .field("method", contextual_text())
            .field("concentration", contextual_text())
            .field("concentration_units", contextual_text())
            .field("compound", FieldSpec::nested(compound)),
    )?;

    builder.define(
        ir_peak,
        SchemaBuilder::new()
            .field("value", text())
            .field("units", contextual_text())
            .field("strength", text())
            .field("bond", text()),
    )?;
    builder.register(
        IR_SPECTRUM,
        spectrum(apparatus, compound, ir_peak, &[]),
    )?;

    builder.define(
        nmr_peak,
        SchemaBuilder::new()
            .field("shift", text())
            .field("intensity", text())
            .field("multiplicity", text())
            .field("coupling", text())
            .field("coupling_units", contextual_text())
            .field("number", text())
            .field("assignment", text()),
    )?;
    builder.register(
        NMR_SPECTRUM,
        spectrum(
            apparatus,
            compound,
            nmr_peak,
            &["nucleus", "frequency", "frequency_units", "standard"],
        ),
    )?;

    builder.register(
        INTERATOMIC_DISTANCE,
        SchemaBuilder::new()
            .embed(&quantity())
            .field(
                "specifier",
                FieldSpec::text()
                    .contextual()
                    .pattern(r"(?i)\bbond\s+distances?\b"),
            )
            .field("species", FieldSpec::text().required())
            .field("compound", FieldSpec::nested(compound).required().contextual()),
    )?;

    builder.build()
}

fn spectrum(
    apparatus: RecordTypeId,
    compound: RecordTypeId,
    peak: RecordTypeId,
    extra: &[&str],
) -> SchemaBuilder {
    let mut schema = SchemaBuilder::new();
    for name in extra {
        schema = schema.field(*name, contextual_text());
    }
    schema
        .field("solvent", contextual_text())
        .field("temperature", contextual_text())
        .field("temperature_units", contextual_text())
        .field("concentration", contextual_text())
        .field("concentration_units", contextual_text())
        .field("apparatus", FieldSpec::nested(apparatus).contextual())
        .field("peaks", FieldSpec::list_of(peak))
        .field("compound", FieldSpec::nested(compound))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[test]
    fn test_catalog_types() {
        let registry = registry();
        let names: Vec<&str> = registry.schemas().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "Compound",
                "Apparatus",
                "IrPeak",
                "NmrPeak",
                "MeltingPoint",
                "GlassTransition",
                "IrSpectrum",
                "NmrSpectrum",
                "InteratomicDistance",
            ]
        );
    }

    #[test]
    fn test_identity_fields() {
        let registry = registry();
        let compound = registry.schema(registry.id(COMPOUND).unwrap());
        assert!(compound.is_identity());

        let mp = registry.schema(registry.id(MELTING_POINT).unwrap());
        assert_eq!(mp.identity_field(), mp.index_of("compound"));

        let apparatus = registry.schema(registry.id(APPARATUS).unwrap());
        assert_eq!(apparatus.identity_field(), None);
    }

    #[test]
    fn test_flatten_closure() {
        let registry = registry();
        let spectrum = Record::of(&registry, NMR_SPECTRUM).unwrap();
        let names: Vec<&str> = spectrum
            .flatten()
            .iter()
            .map(|id| registry.schema(*id).name())
            .collect();
        assert_eq!(names, vec!["NmrSpectrum", "Apparatus", "NmrPeak", "Compound"]);
    }

    #[test]
    fn test_registry_is_shared() {
        assert!(Arc::ptr_eq(&registry(), &registry()));
        assert!(!Arc::ptr_eq(&registry(), &build().unwrap()));
    }
}
