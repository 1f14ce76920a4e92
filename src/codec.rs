//! Snapshot encoding with short property names.
//!
//! The compact schema renames every long key to a one to three letter alias.
//! Decoding sniffs for the alias of the municipality code to tell a compact
//! blob from a legacy one; there are only ever these two schemas.

use crate::error::CodecError;
use crate::types::{ApplicationRecord, Dataset, FeatureProperties, MunicipalityFeature};
use crate::util::{de_amount, de_string_or_number};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
struct CompactDatasetRef<'a> {
    #[serde(rename = "comuniData")]
    features: Vec<CompactFeatureRef<'a>>,
    #[serde(rename = "candidatureData")]
    records: Vec<CompactRecordRef<'a>>,
}

#[derive(Serialize)]
struct CompactFeatureRef<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    properties: CompactPropertiesRef<'a>,
    geometry: &'a Value,
}

#[derive(Serialize)]
struct CompactPropertiesRef<'a> {
    p: &'a str,
    c: &'a str,
    d: &'a str,
    s: &'a str,
    r: &'a str,
}

#[derive(Serialize)]
struct CompactRecordRef<'a> {
    r: &'a str,
    p: &'a str,
    c: &'a str,
    cc: &'a str,
    cup: &'a str,
    a: &'a str,
    dic: &'a str,
    df: &'a str,
    imp: f64,
}

#[derive(Deserialize)]
struct CompactDataset {
    #[serde(rename = "comuniData")]
    features: Vec<CompactFeature>,
    #[serde(rename = "candidatureData")]
    records: Vec<CompactRecord>,
}

#[derive(Deserialize)]
struct CompactFeature {
    #[serde(rename = "type", default)]
    kind: String,
    properties: CompactProperties,
    #[serde(default)]
    geometry: Value,
}

#[derive(Deserialize)]
struct CompactProperties {
    #[serde(deserialize_with = "de_string_or_number")]
    p: String,
    #[serde(default)]
    c: String,
    #[serde(default)]
    d: String,
    #[serde(default)]
    s: String,
    #[serde(default, deserialize_with = "de_string_or_number")]
    r: String,
}

#[derive(Deserialize)]
struct CompactRecord {
    #[serde(default)]
    r: String,
    #[serde(default)]
    p: String,
    #[serde(default)]
    c: String,
    #[serde(deserialize_with = "de_string_or_number")]
    cc: String,
    #[serde(default)]
    cup: String,
    #[serde(default)]
    a: String,
    #[serde(default)]
    dic: String,
    #[serde(default)]
    df: String,
    #[serde(default, deserialize_with = "de_amount")]
    imp: f64,
}

impl<'a> From<&'a MunicipalityFeature> for CompactFeatureRef<'a> {
    fn from(f: &'a MunicipalityFeature) -> Self {
        let props = &f.properties;
        Self {
            kind: &f.kind,
            properties: CompactPropertiesRef {
                p: &props.municipality_code,
                c: &props.name,
                d: &props.province_name,
                s: &props.province_abbrev,
                r: &props.region_code,
            },
            geometry: &f.geometry,
        }
    }
}

impl<'a> From<&'a ApplicationRecord> for CompactRecordRef<'a> {
    fn from(r: &'a ApplicationRecord) -> Self {
        Self {
            r: &r.region,
            p: &r.province,
            c: &r.municipality,
            cc: &r.municipality_code,
            cup: &r.cup_code,
            a: &r.call_name,
            dic: &r.submission_date,
            df: &r.funding_date,
            imp: r.funding_amount,
        }
    }
}

impl From<CompactFeature> for MunicipalityFeature {
    fn from(f: CompactFeature) -> Self {
        Self {
            kind: f.kind,
            properties: FeatureProperties {
                municipality_code: f.properties.p,
                name: f.properties.c,
                province_name: f.properties.d,
                province_abbrev: f.properties.s,
                region_code: f.properties.r,
            },
            geometry: f.geometry,
            aggregate: None,
        }
    }
}

impl From<CompactRecord> for ApplicationRecord {
    fn from(r: CompactRecord) -> Self {
        Self {
            region: r.r,
            province: r.p,
            municipality: r.c,
            municipality_code: r.cc,
            cup_code: r.cup,
            call_name: r.a,
            submission_date: r.dic,
            funding_date: r.df,
            funding_amount: r.imp,
        }
    }
}

/// Serialize the pre-join dataset in the compact schema. Aggregates are not
/// written; they are rebuilt by the join after a restore.
pub fn encode(dataset: &Dataset) -> Result<Vec<u8>, CodecError> {
    let compact = CompactDatasetRef {
        features: dataset.features.iter().map(CompactFeatureRef::from).collect(),
        records: dataset.records.iter().map(CompactRecordRef::from).collect(),
    };
    Ok(serde_json::to_vec(&compact)?)
}

/// Decode either schema. A blob that is not valid JSON or does not have the
/// expected shape is an error; there is no partial result.
pub fn decode(blob: &[u8]) -> Result<Dataset, CodecError> {
    let value: Value = serde_json::from_slice(blob)?;
    if is_compact(&value) {
        let compact: CompactDataset = serde_json::from_value(value)?;
        Ok(Dataset {
            features: compact.features.into_iter().map(Into::into).collect(),
            records: compact.records.into_iter().map(Into::into).collect(),
        })
    } else {
        Ok(serde_json::from_value(value)?)
    }
}

fn is_compact(value: &Value) -> bool {
    match value.pointer("/comuniData/0") {
        Some(first) => first.pointer("/properties/p").is_some(),
        None => value.pointer("/candidatureData/0/cc").is_some(),
    }
}
