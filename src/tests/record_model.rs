use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    chemistry, FieldSpec, RawValue, Record, RecordError, Registry, SchemaBuilder,
};

/// `Holder` points at `Target` through a single and a list field. `Other`
/// has the same shape as `Target` but is a distinct type.
fn registry() -> Arc<Registry> {
    let mut builder = Registry::builder();
    let target = builder.declare("Target");
    let other = builder.declare("Other");
    builder
        .define(target, SchemaBuilder::new().field("name", FieldSpec::text()))
        .unwrap();
    builder
        .define(other, SchemaBuilder::new().field("name", FieldSpec::text()))
        .unwrap();
    builder
        .register(
            "Holder",
            SchemaBuilder::new()
                .field("id", FieldSpec::text().required())
                .field("note", FieldSpec::text().required().requiredness(0.5))
                .field("target", FieldSpec::nested(target).contextual())
                .field("targets", FieldSpec::list_of(target)),
        )
        .unwrap();
    builder.build().unwrap()
}

fn record(registry: &Arc<Registry>, type_name: &str, name: &str) -> Record {
    Record::of(registry, type_name)
        .unwrap()
        .with("name", name)
        .unwrap()
}

#[test]
fn nested_field_accepts_only_declared_type() {
    let registry = registry();
    let mut holder = Record::of(&registry, "Holder").unwrap();

    holder.set("target", record(&registry, "Other", "o")).unwrap();
    assert!(holder.get("target").unwrap().is_none());

    holder.set("target", record(&registry, "Target", "t")).unwrap();
    assert_eq!(holder.get_as::<String>("target.name").unwrap().as_deref(), Some("t"));
}

#[test]
fn nested_field_rejects_scalars() {
    let registry = registry();
    let mut holder = Record::of(&registry, "Holder").unwrap();
    holder.set("target", "just text").unwrap();
    assert!(holder.get("target").unwrap().is_none());
}

#[test]
fn nested_list_drops_wrong_types() {
    let registry = registry();
    let mut holder = Record::of(&registry, "Holder").unwrap();
    holder
        .set(
            "targets",
            vec![
                RawValue::from(record(&registry, "Target", "a")),
                RawValue::from(record(&registry, "Other", "b")),
                RawValue::from(record(&registry, "Target", "c")),
            ],
        )
        .unwrap();

    let targets = holder.get_as::<Vec<Record>>("targets").unwrap().unwrap();
    let names: Vec<String> = targets
        .iter()
        .map(|t| t.get_as::<String>("name").unwrap().unwrap())
        .collect();
    assert_eq!(names, vec!["a", "c"]);

    holder
        .set("targets", vec![record(&registry, "Other", "x")])
        .unwrap();
    assert!(holder.get("targets").unwrap().is_none());
}

#[test]
fn single_record_wraps_into_list() {
    let registry = registry();
    let mut holder = Record::of(&registry, "Holder").unwrap();
    holder.set("targets", record(&registry, "Target", "solo")).unwrap();
    assert_eq!(
        holder.get_as::<Vec<Record>>("targets").unwrap().map(|v| v.len()),
        Some(1)
    );
}

#[test]
fn every_nested_value_matches_its_declared_type() {
    let registry = chemistry::registry();
    let types: Vec<String> = registry.schemas().map(|s| s.name().to_string()).collect();

    for holder_type in &types {
        let schema = registry.schema(registry.id(holder_type).unwrap());
        for (field, spec) in schema.fields() {
            let Some(declared) = spec.kind.record_type() else {
                continue;
            };
            for candidate_type in &types {
                let candidate = Record::of(&registry, candidate_type).unwrap();
                let mut holder = Record::of(&registry, holder_type).unwrap();
                holder.set(field, candidate).unwrap();
                let stored = holder.get(field).unwrap();
                if registry.id(candidate_type).unwrap() != declared {
                    assert!(stored.is_none(), "{} accepted {}", field, candidate_type);
                }
                for nested in stored.into_iter().flat_map(|v| v.records()) {
                    assert_eq!(nested.type_id(), declared);
                }
            }
        }
    }
}

#[test]
fn unknown_keypath_is_not_found() {
    let registry = chemistry::registry();
    let mut mp = Record::of(&registry, "MeltingPoint").unwrap();

    assert!(matches!(mp.get("boiling"), Err(RecordError::NotFound { .. })));
    assert!(matches!(
        mp.get("compound.formula"),
        Err(RecordError::NotFound { .. })
    ));
    assert!(matches!(
        mp.set("raw_value.inner", "1"),
        Err(RecordError::NotFound { .. })
    ));
    assert!(matches!(
        Record::of(&registry, "BoilingPoint"),
        Err(RecordError::NotFound { .. })
    ));
}

#[test]
fn empty_intermediate_record_reads_as_none() {
    let registry = chemistry::registry();
    let mp = Record::of(&registry, "MeltingPoint").unwrap();
    assert!(mp.get("compound.names").unwrap().is_none());
}

#[test]
fn keypath_set_creates_intermediate_records() {
    let registry = chemistry::registry();
    let mut mp = Record::of(&registry, "MeltingPoint").unwrap();
    mp.set("compound.names", ["benzene"]).unwrap();

    let names = mp.get_as::<BTreeSet<String>>("compound.names").unwrap().unwrap();
    assert!(names.contains("benzene"));

    mp.clear("compound.names").unwrap();
    assert!(mp.get("compound").unwrap().is_none());
}

#[test]
fn invalid_scalar_is_rejected() {
    let registry = chemistry::registry();
    let mut mp = Record::of(&registry, "MeltingPoint").unwrap();
    assert!(matches!(
        mp.set("value", ["abc"]),
        Err(RecordError::InvalidValue { .. })
    ));
    mp.set("value", ["89", "90"]).unwrap();
    assert_eq!(
        mp.get_as::<Vec<f64>>("value").unwrap(),
        Some(vec![89.0, 90.0])
    );
}

#[test]
fn soft_requiredness_discounts_confidence() {
    let registry = registry();
    let holder = Record::of(&registry, "Holder")
        .unwrap()
        .with("id", "h1")
        .unwrap();

    assert!(holder.required_fulfilled());
    assert_eq!(holder.requiredness_factor(), 0.5);
    assert_eq!(holder.total_confidence(), 0.5);

    let complete = holder.clone().with("note", "n").unwrap();
    assert_eq!(complete.total_confidence(), 1.0);
}

#[test]
fn hard_requiredness_fails_fulfilment() {
    let registry = registry();
    let holder = Record::of(&registry, "Holder")
        .unwrap()
        .with("note", "n")
        .unwrap();
    assert!(!holder.required_fulfilled());
}

#[test]
fn explicit_self_confidence_wins() {
    let registry = registry();
    let mut holder = Record::of(&registry, "Holder")
        .unwrap()
        .with("id", "h1")
        .unwrap();
    holder.set_confidence("id", 0.8).unwrap();
    assert_eq!(holder.confidence("id").unwrap(), Some(0.8));
    assert_eq!(holder.total_confidence(), 0.4);

    holder.set_self_confidence(0.9);
    assert_eq!(holder.confidence("self").unwrap(), Some(0.9));
    assert_eq!(holder.total_confidence(), 0.9);
}

#[test]
fn contextual_required_fields_are_lenient() {
    let registry = chemistry::registry();
    let mut distance = Record::of(&registry, "InteratomicDistance")
        .unwrap()
        .with("raw_value", "1.5")
        .unwrap()
        .with("raw_units", "Å")
        .unwrap()
        .with("species", "Fe-O")
        .unwrap()
        .with("compound.names", ["FeO"])
        .unwrap();
    assert!(distance.required_fulfilled());

    distance.clear("compound").unwrap();
    assert!(!distance.required_fulfilled());
    assert!(distance.noncontextual_required_fulfilled());
}

#[test]
fn clean_resets_unfulfilled_nested_records() {
    let mut builder = Registry::builder();
    let inner = builder.declare("Inner");
    builder
        .define(
            inner,
            SchemaBuilder::new()
                .field("code", FieldSpec::text().required())
                .field("extra", FieldSpec::text()),
        )
        .unwrap();
    builder
        .register(
            "Outer",
            SchemaBuilder::new()
                .field("name", FieldSpec::text())
                .field("inner", FieldSpec::nested(inner))
                .field("inners", FieldSpec::list_of(inner)),
        )
        .unwrap();
    let registry = builder.build().unwrap();

    let complete = Record::of(&registry, "Inner").unwrap().with("code", "c1").unwrap();
    let partial = Record::of(&registry, "Inner").unwrap().with("extra", "x").unwrap();
    let mut outer = Record::of(&registry, "Outer")
        .unwrap()
        .with("name", "o")
        .unwrap()
        .with("inner", partial.clone())
        .unwrap()
        .with("inners", vec![complete.clone(), partial])
        .unwrap();
    assert!(outer.required_fulfilled());

    outer.clean(true);
    assert!(outer.get("inner").unwrap().is_none());
    assert_eq!(
        outer.get_as::<Vec<Record>>("inners").unwrap(),
        Some(vec![complete])
    );
}

#[test]
fn flatten_instance_lists_nested_records() {
    let registry = chemistry::registry();
    let mp = Record::of(&registry, "MeltingPoint")
        .unwrap()
        .with("compound.names", ["X"])
        .unwrap()
        .with("apparatus.name", "Buchi")
        .unwrap();
    let types: Vec<&str> = mp.flatten_instance().iter().map(|r| r.type_name()).collect();
    assert_eq!(types, vec!["MeltingPoint", "Apparatus", "Compound"]);
}

#[test]
fn contextual_fulfilment_follows_contextual_nested_fields_only() {
    let mut builder = Registry::builder();
    let peak = builder.declare("Peak");
    builder
        .define(
            peak,
            SchemaBuilder::new()
                .field("shift", FieldSpec::text())
                .field("units", FieldSpec::text().contextual()),
        )
        .unwrap();
    builder
        .register(
            "Spectrum",
            SchemaBuilder::new()
                .field("solvent", FieldSpec::text().contextual())
                .field("reference", FieldSpec::nested(peak).contextual())
                .field("peaks", FieldSpec::list_of(peak)),
        )
        .unwrap();
    let registry = builder.build().unwrap();

    let bare_peak = Record::of(&registry, "Peak")
        .unwrap()
        .with("shift", "7.26")
        .unwrap();
    let full_peak = bare_peak.clone().with("units", "ppm").unwrap();

    let mut spectrum = Record::of(&registry, "Spectrum")
        .unwrap()
        .with("solvent", "CDCl3")
        .unwrap()
        .with("reference", full_peak)
        .unwrap()
        .with("peaks", vec![bare_peak.clone()])
        .unwrap();
    assert!(spectrum.contextual_fulfilled());

    spectrum.set("reference", bare_peak).unwrap();
    assert!(!spectrum.contextual_fulfilled());
}

#[test]
fn record_type_from_another_registry_is_not_found() {
    let foreign = registry();
    let holder = foreign.id("Holder").unwrap();
    let result = Record::new(&registry(), holder);
    assert!(matches!(result, Err(RecordError::NotFound { .. })));
    assert!(Record::new(&foreign, holder).is_ok());
}
