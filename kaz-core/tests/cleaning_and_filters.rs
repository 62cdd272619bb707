//! Properties of the cleaning pipeline and the filter engine over a realistic
//! geo-dvf extract.

use std::collections::BTreeSet;

use kaz_core::{
    CleaningStep, FilterSpec, PlausibilityBand, PropertyType, QueryOutcome, TypeFilter, clean,
    code_for_name, entries, name_for_code, read_csv,
};

const EXTRACT: &str = "\
id_mutation,date_mutation,nature_mutation,valeur_fonciere,adresse_numero,adresse_nom_voie,code_postal,code_commune,nom_commune,type_local,surface_reelle_bati,nombre_pieces_principales,latitude,longitude
2024-100,2024-03-01,Vente,150000,12,RUE DES LILAS,97400,97411,Saint-Benoît,Maison,50,3,-21.03,55.71
2024-101,2024-04-11,Vente,210000,4,CHEMIN MORANGE,97470,97411,Saint-Benoît,Appartement,70,3,-21.04,55.72
2024-102,2024-02-07,Vente,95000,,RUE AMIRAL BOUVET,97470,97411,Saint-Benoît,Appartement,38,2,,
2024-103,2024-06-19,Vente,320000,8,ALLEE DES BADAMIERS,97470,97411,Saint-Benoît,Maison,110,5,-21.02,55.70
2024-104,2024-06-20,Vente,45000,,LIEU DIT BEBOUR,97470,97411,Saint-Benoît,Dépendance,,,-21.05,55.69
2024-105,2024-07-02,Vente,not-a-number,3,RUE DU STADE,97470,97411,Saint-Benoît,Maison,80,4,-21.03,55.71
2024-106,2024-13-45,Vente,180000,5,RUE DU STADE,97470,97411,Saint-Benoît,Maison,80,4,-21.03,55.71
2024-107,2024-08-15,Vente,260000,2,RUE DU STADE,97470,97411,Saint-Benoît,Maison,0,4,-21.03,55.71
2024-108,2024-09-30,Vente,1500,1,RUE DU STADE,97470,97411,Saint-Benoît,Maison,90,4,-21.03,55.71
2024-109,2024-10-01,Vente,880000,6,RUE DU STADE,97470,97411,Saint-Benoît,Appartement,100,4,-21.03,55.71
2024-110,2024-11-12,Vente,175000,7,RUE DU STADE,,97411,Saint-Benoît,Maison,60,3,-21.03,55.71
2024-111,2024-12-03,Vente,199000,9,RUE DU STADE,97470,97411,Saint-Benoît,Maison,surface,3,-21.03,55.71
";

fn cleaned(band: PlausibilityBand) -> kaz_core::Cleaned {
    let raw = read_csv(EXTRACT.as_bytes()).expect("fixture is valid CSV");
    clean(&raw, band)
}

#[test]
fn retained_rows_satisfy_invariants() {
    for band in [PlausibilityBand::LOCAL_FILE, PlausibilityBand::REMOTE] {
        let table = cleaned(band);
        assert!(!table.records.is_empty(), "fixture keeps rows under {band}");
        for record in &table.records {
            assert!(record.built_area > 0.0, "positive area: {record:?}");
            assert!(band.contains(record.price_per_area), "inside {band}: {record:?}");
            assert!(
                PropertyType::ALL.contains(&record.property_type),
                "residential: {record:?}"
            );
        }
    }
}

#[test]
fn expected_rows_survive_the_remote_band() {
    let table = cleaned(PlausibilityBand::REMOTE);
    let ids: Vec<&str> = table
        .records
        .iter()
        .filter_map(|record| record.mutation_id.as_deref())
        .collect();
    // 104 dependency, 105 value, 106 date, 107 zero area, 108 and 109 band,
    // 110 postal code, 111 area text.
    assert_eq!(ids, ["2024-100", "2024-101", "2024-102", "2024-103"]);

    let counts: Vec<(CleaningStep, usize)> = table.report.counts.clone();
    assert_eq!(counts.len(), CleaningStep::SEQUENCE.len());
    assert_eq!(table.report.input_rows, 12);
}

#[test]
fn wide_band_keeps_expensive_apartment() {
    let table = cleaned(PlausibilityBand::LOCAL_FILE);
    assert!(
        table
            .records
            .iter()
            .any(|record| record.mutation_id.as_deref() == Some("2024-109")),
        "8800 €/m² is plausible in the wide band"
    );
}

#[test]
fn cleaning_is_idempotent() {
    let raw = read_csv(EXTRACT.as_bytes()).expect("fixture is valid CSV");
    let first = clean(&raw, PlausibilityBand::REMOTE);
    let second = clean(&raw, PlausibilityBand::REMOTE);
    assert_eq!(first, second);
}

#[test]
fn any_type_is_the_union_of_both_types() {
    let table = cleaned(PlausibilityBand::LOCAL_FILE);
    let mut spec = FilterSpec::defaults_for(&table.records);

    let any: Vec<_> = spec.apply(&table.records).iter().collect();

    spec.property_type = TypeFilter::House;
    let houses: Vec<_> = spec.apply(&table.records).iter().collect();
    spec.property_type = TypeFilter::Apartment;
    let apartments: Vec<_> = spec.apply(&table.records).iter().collect();

    assert_eq!(any.len(), houses.len() + apartments.len());
    for record in houses.iter().chain(apartments.iter()) {
        assert!(any.contains(record), "{record:?} also passes Any");
    }
}

#[test]
fn narrowing_the_price_range_never_adds_rows() {
    let table = cleaned(PlausibilityBand::LOCAL_FILE);
    let mut spec = FilterSpec::defaults_for(&table.records);
    let mut previous = spec.apply(&table.records).len();

    for step in 1..=20 {
        spec.min_value = f64::from(step) * 10_000.0;
        spec.max_value -= 20_000.0;
        let count = spec.apply(&table.records).len();
        assert!(count <= previous, "count grew from {previous} to {count}");
        previous = count;
    }
}

#[test]
fn postal_code_filter_is_exact() {
    let table = cleaned(PlausibilityBand::REMOTE);
    let mut spec = FilterSpec::defaults_for(&table.records);
    assert_eq!(
        spec.postal_codes,
        BTreeSet::from(["97400".to_owned(), "97470".to_owned()])
    );

    spec.postal_codes = BTreeSet::from(["97400".to_owned()]);
    let view = spec.apply(&table.records);
    assert_eq!(view.len(), 1);

    spec.postal_codes.clear();
    assert!(spec.apply(&table.records).is_empty());
}

#[test]
fn price_floor_above_every_sale_matches_nothing() {
    let table = cleaned(PlausibilityBand::REMOTE);
    let dataset_max = FilterSpec::defaults_for(&table.records).max_value;
    let mut spec = FilterSpec::defaults_for(&table.records);
    spec.min_value = dataset_max + 1.0;

    let view = spec.apply(&table.records);
    assert!(view.is_empty());
    assert!(view.summary().is_none(), "no statistics over an empty selection");
}

#[test]
fn directory_round_trips_all_codes() {
    let codes: Vec<String> = entries().map(|entry| entry.code).collect();
    assert_eq!(codes.len(), 24);
    for code in codes {
        let name = name_for_code(&code).expect("listed code");
        assert_eq!(code_for_name(name).expect("listed name"), code);
    }
}

#[test]
fn query_outcome_matches_view() {
    let table = cleaned(PlausibilityBand::REMOTE);
    let spec = FilterSpec::defaults_for(&table.records);
    let view = spec.apply(&table.records);
    let outcome = match view.summary() {
        Some(summary) => QueryOutcome::Matched { view, summary },
        None => QueryOutcome::NoMatch,
    };
    let QueryOutcome::Matched { summary, .. } = outcome else {
        panic!("fixture rows match the default filter");
    };
    assert_eq!(summary.transaction_count, 4);
}
