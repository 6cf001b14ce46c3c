use layered_records::{chemistry, Record};

use crate::{AbbreviationDefinition, Document, Element, Sentence};

fn compound(names: &[&str], labels: &[&str]) -> Record {
    let mut record = Record::of(&chemistry::registry(), chemistry::COMPOUND).unwrap();
    if !names.is_empty() {
        record.set("names", names.to_vec()).unwrap();
    }
    if !labels.is_empty() {
        record.set("labels", labels.to_vec()).unwrap();
    }
    record
}

fn melting_point(raw_value: &str) -> Record {
    Record::of(&chemistry::registry(), chemistry::MELTING_POINT)
        .unwrap()
        .with("raw_value", raw_value)
        .unwrap()
        .with("raw_units", "°C")
        .unwrap()
}

fn resolved_compound(elements: Vec<Element>) -> Option<Record> {
    let records = Document::new(&chemistry::registry(), elements).records().unwrap();
    records
        .into_iter()
        .find(|r| r.type_name() == chemistry::MELTING_POINT)
        .and_then(|mp| mp.get_as::<Record>("compound").unwrap())
}

#[test]
fn heading_takes_precedence_right_after_heading() {
    let compound = resolved_compound(vec![
        Element::heading("Synthesis of X").with_record(compound(&["X"], &[])),
        Element::paragraph("Compound 1 melted at 90 °C.")
            .with_record(compound(&[], &["1"]))
            .with_record(melting_point("90")),
    ])
    .unwrap();
    assert!(compound.names().contains("X"));
}

#[test]
fn labelled_compound_takes_precedence_later_on() {
    let compound = resolved_compound(vec![
        Element::heading("Synthesis of X").with_record(compound(&["X"], &[])),
        Element::paragraph("The mixture was stirred."),
        Element::paragraph("Compound 1 melted at 90 °C.")
            .with_record(compound(&[], &["1"]))
            .with_record(melting_point("90")),
    ])
    .unwrap();
    assert!(compound.labels().contains("1"));
    assert!(compound.names().is_empty());
}

#[test]
fn title_is_last_resort() {
    let compound = resolved_compound(vec![
        Element::title("Properties of Y").with_record(compound(&["Y"], &[])),
        Element::heading("Results"),
        Element::heading("Discussion"),
        Element::paragraph("It melted at 90 °C.").with_record(melting_point("90")),
    ])
    .unwrap();
    assert!(compound.names().contains("Y"));
}

#[test]
fn heading_without_records_clears_head() {
    let product = compound(&["P"], &[]).with("roles", ["product"]).unwrap();
    let apparatus = Record::of(&chemistry::registry(), chemistry::APPARATUS)
        .unwrap()
        .with("name", "Buchi B-545")
        .unwrap();

    let compound = resolved_compound(vec![
        Element::heading("Synthesis of X").with_record(compound(&["X"], &[])),
        Element::paragraph("P was isolated on a Buchi B-545.")
            .with_record(product)
            .with_record(apparatus),
        Element::heading("General remarks"),
        Element::paragraph("It melted at 90 °C.").with_record(melting_point("90")),
    ])
    .unwrap();
    assert!(compound.names().contains("P"));
    assert!(!compound.names().contains("X"));
}

#[test]
fn consecutive_headings_share_identity() {
    let records = Document::new(
        &chemistry::registry(),
        vec![
            Element::heading("Compound 1").with_record(compound(&[], &["1"])),
            Element::heading("2-methylbenzene-1,4-diol")
                .with_record(compound(&["2-methylbenzene-1,4-diol"], &[])),
            Element::paragraph("It melted at 90 °C.").with_record(melting_point("90")),
        ],
    )
    .records()
    .unwrap();

    let compounds: Vec<&Record> = records
        .iter()
        .filter(|r| r.type_name() == chemistry::COMPOUND)
        .collect();
    assert_eq!(compounds.len(), 1);
    insta::assert_snapshot!(
        compounds[0].to_json(),
        @r###"{"Compound":{"labels":["1"],"names":["2-methylbenzene-1,4-diol"]}}"###
    );

    let mp = records
        .iter()
        .find(|r| r.type_name() == chemistry::MELTING_POINT)
        .unwrap();
    let identity = mp.identity_record().unwrap();
    assert!(identity.labels().contains("1"));
    assert!(identity.names().contains("2-methylbenzene-1,4-diol"));
}

#[test]
fn long_name_in_first_sentence_sets_head() {
    let paragraph = Element::paragraph("2-methylbenzene-1,4-diol. It melted at 90 °C.")
        .with_sentence(
            Sentence::new("2-methylbenzene-1,4-diol.")
                .with_record(compound(&["2-methylbenzene-1,4-diol"], &[])),
        )
        .with_sentence(Sentence::new("It melted at 90 °C.").with_record(melting_point("90")));

    let compound = resolved_compound(vec![paragraph]).unwrap();
    assert!(compound.names().contains("2-methylbenzene-1,4-diol"));
}

#[test]
fn short_name_in_long_sentence_does_not_set_head() {
    let paragraph = Element::paragraph("A solution in THF was stirred for two hours. It melted at 90 °C.")
        .with_sentence(
            Sentence::new("A solution in THF was stirred for two hours.")
                .with_record(compound(&["THF"], &[])),
        )
        .with_sentence(Sentence::new("It melted at 90 °C.").with_record(melting_point("90")));

    assert!(resolved_compound(vec![paragraph]).is_none());
}

#[test]
fn chemical_abbreviations_extend_names() {
    let records = Document::new(
        &chemistry::registry(),
        vec![Element::paragraph("Tetrahydrofuran (THF) was distilled.")
            .with_record(compound(&["tetrahydrofuran"], &[]))
            .with_abbreviation(AbbreviationDefinition::new("THF", "tetrahydrofuran", "CM"))
            .with_abbreviation(AbbreviationDefinition::new("RT", "room temperature", "O"))],
    )
    .records()
    .unwrap();

    assert_eq!(records.len(), 1);
    insta::assert_snapshot!(
        records[0].to_json(),
        @r###"{"Compound":{"names":["THF","tetrahydrofuran"]}}"###
    );
}

#[test]
fn identities_sharing_a_name_merge_across_elements() {
    let records = Document::new(
        &chemistry::registry(),
        vec![
            Element::paragraph("Benzene was distilled.").with_record(compound(&["Benzene"], &["1"])),
            Element::paragraph("The benzene was dried.").with_record(compound(&["benzene"], &[])),
        ],
    )
    .records()
    .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].labels().len(), 1);
    assert_eq!(records[0].names().len(), 2);
}
