use crate::{chemistry, FieldSpec, Record, Registry, SchemaBuilder};

fn melting_point() -> Record {
    Record::of(&chemistry::registry(), "MeltingPoint")
        .unwrap()
        .with("raw_value", "89-90")
        .unwrap()
        .with("raw_units", "°C")
        .unwrap()
        .with("value", vec![89.0, 90.0])
        .unwrap()
        .with("compound.names", ["X"])
        .unwrap()
}

#[test]
fn nested_record_serializes_under_type_name() {
    let json = serde_json::to_string_pretty(&melting_point().serialize()).unwrap();
    insta::assert_snapshot!(json, @r###"
    {
      "MeltingPoint": {
        "compound": {
          "Compound": {
            "names": [
              "X"
            ]
          }
        },
        "raw_units": "°C",
        "raw_value": "89-90",
        "value": [
          89.0,
          90.0
        ]
      }
    }
    "###);
}

#[test]
fn nested_lists_serialize_as_arrays() {
    let registry = chemistry::registry();
    let peak = Record::of(&registry, "NmrPeak")
        .unwrap()
        .with("shift", "7.26")
        .unwrap()
        .with("multiplicity", "s")
        .unwrap();
    let spectrum = Record::of(&registry, "NmrSpectrum")
        .unwrap()
        .with("nucleus", "1H")
        .unwrap()
        .with("peaks", vec![peak])
        .unwrap();
    insta::assert_snapshot!(
        spectrum.to_json(),
        @r###"{"NmrSpectrum":{"nucleus":"1H","peaks":[{"NmrPeak":{"multiplicity":"s","shift":"7.26"}}]}}"###
    );
}

#[test]
fn sets_serialize_sorted() {
    let compound = Record::of(&chemistry::registry(), "Compound")
        .unwrap()
        .with("names", ["toluene", "benzene"])
        .unwrap()
        .with("labels", ["2", "1"])
        .unwrap();
    insta::assert_snapshot!(
        compound.to_json(),
        @r###"{"Compound":{"labels":["1","2"],"names":["benzene","toluene"]}}"###
    );
}

#[test]
fn null_fields_serialize_when_empty() {
    let mut builder = Registry::builder();
    builder
        .register(
            "Reading",
            SchemaBuilder::new()
                .field("value", FieldSpec::text())
                .field("units", FieldSpec::text().null()),
        )
        .unwrap();
    let registry = builder.build().unwrap();

    let reading = Record::of(&registry, "Reading").unwrap();
    insta::assert_snapshot!(reading.to_json(), @r###"{"Reading":{"units":null}}"###);
}

#[test]
fn serde_matches_serialize() {
    let record = melting_point();
    assert_eq!(serde_json::to_string(&record).unwrap(), record.to_json());
}

#[test]
fn deserialize_inverts_serialize() {
    let registry = chemistry::registry();
    let record = melting_point().with("apparatus.name", "Buchi").unwrap();
    let restored = Registry::deserialize(&registry, &record.serialize()).unwrap();
    assert_eq!(restored, record);
}

#[test]
fn deserialize_rejects_unknown_types() {
    let registry = chemistry::registry();
    let value = serde_json::json!({"BoilingPoint": {"raw_value": "100"}});
    assert!(Registry::deserialize(&registry, &value).is_err());
}
