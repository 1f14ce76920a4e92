use crate::types::{ApplicationRecord, Dataset, MunicipalityAggregate, MunicipalityFeature};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinReport {
    /// Features that received an aggregate.
    pub matched: usize,
    /// Distinct record codes that no feature carries.
    pub orphan_codes: usize,
}

/// Fold records into one aggregate per municipality code, keeping source
/// order inside each aggregate.
pub fn build_index(records: &[ApplicationRecord]) -> HashMap<String, MunicipalityAggregate> {
    let mut index: HashMap<String, MunicipalityAggregate> = HashMap::new();
    for record in records {
        index
            .entry(record.municipality_code.clone())
            .or_insert_with(|| MunicipalityAggregate::seed(record))
            .push(record.clone());
    }
    index
}

/// Attach aggregates to features by code. Any aggregate left from an earlier
/// load is cleared first; features without applications end up with none.
pub fn join(features: &mut [MunicipalityFeature], records: &[ApplicationRecord]) -> JoinReport {
    let index = build_index(records);
    let mut matched = 0usize;

    for feature in features.iter_mut() {
        feature.aggregate = index.get(&feature.properties.municipality_code).cloned();
        if feature.aggregate.is_some() {
            matched += 1;
        }
    }
    let seen: HashSet<&str> = features
        .iter()
        .map(|f| f.properties.municipality_code.as_str())
        .collect();
    let orphan_codes = index.keys().filter(|code| !seen.contains(code.as_str())).count();

    let report = JoinReport {
        matched,
        orphan_codes,
    };
    tracing::info!(matched, orphan_codes, "join complete");
    report
}

impl Dataset {
    pub fn join(&mut self) -> JoinReport {
        join(&mut self.features, &self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureProperties;
    use proptest::prelude::*;

    fn feature(code: &str, name: &str) -> MunicipalityFeature {
        MunicipalityFeature {
            kind: "Feature".into(),
            properties: FeatureProperties {
                municipality_code: code.into(),
                name: name.into(),
                province_name: String::new(),
                province_abbrev: String::new(),
                region_code: "19".into(),
            },
            geometry: serde_json::Value::Null,
            aggregate: None,
        }
    }

    fn record(code: &str, municipality: &str, cup: &str, amount: f64) -> ApplicationRecord {
        ApplicationRecord {
            region: "Sicilia".into(),
            province: "Palermo".into(),
            municipality: municipality.into(),
            municipality_code: code.into(),
            cup_code: cup.into(),
            call_name: "Avviso".into(),
            submission_date: String::new(),
            funding_date: String::new(),
            funding_amount: amount,
        }
    }

    #[test]
    fn aggregates_keep_source_order_and_totals() {
        let mut features = vec![feature("082053", "Palermo"), feature("082001", "Alcamo")];
        let records = vec![
            record("082053", "Palermo", "A", 100.0),
            record("099999", "Altrove", "X", 5.0),
            record("082053", "Palermo", "B", 50.0),
        ];
        let report = join(&mut features, &records);
        assert_eq!(report, JoinReport { matched: 1, orphan_codes: 1 });

        let agg = features[0].aggregate.as_ref().expect("palermo matched");
        assert_eq!(agg.count, 2);
        assert_eq!(agg.total_amount, 150.0);
        assert_eq!(agg.municipality, "Palermo");
        let cups: Vec<&str> = agg.records.iter().map(|r| r.cup_code.as_str()).collect();
        assert_eq!(cups, vec!["A", "B"]);
        assert!(features[1].aggregate.is_none());
    }

    #[test]
    fn rejoin_clears_previous_aggregates() {
        let mut features = vec![feature("082053", "Palermo")];
        join(&mut features, &[record("082053", "Palermo", "A", 1.0)]);
        join(&mut features, &[]);
        assert!(features[0].aggregate.is_none());
    }

    proptest! {
        #[test]
        fn totals_are_conserved(amounts in prop::collection::vec((0usize..5, 0u32..1_000_000), 0..60)) {
            let codes = ["000001", "000002", "000003", "000004", "000005"];
            let mut features: Vec<_> = codes.iter().map(|c| feature(c, c)).collect();
            let records: Vec<_> = amounts
                .iter()
                .map(|(i, cents)| record(codes[*i], codes[*i], "", f64::from(*cents) / 100.0))
                .collect();
            join(&mut features, &records);

            let joined: f64 = features.iter().filter_map(|f| f.aggregate.as_ref()).map(|a| a.total_amount).sum();
            let raw: f64 = records.iter().map(|r| r.funding_amount).sum();
            prop_assert!((joined - raw).abs() < 1e-6);
            let count: usize = features.iter().filter_map(|f| f.aggregate.as_ref()).map(|a| a.count).sum();
            prop_assert_eq!(count, records.len());
        }
    }
}
