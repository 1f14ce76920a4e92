use crate::util::{de_amount, de_string_or_number};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

pub const COL_REGION: &str = "regione";
pub const COL_PROVINCE: &str = "provincia";
pub const COL_MUNICIPALITY: &str = "comune";
pub const COL_MUNICIPALITY_CODE: &str = "cod_comune";
pub const COL_CUP: &str = "codice_cup";
pub const COL_CALL: &str = "avviso";
pub const COL_SUBMISSION_DATE: &str = "data_invio_candidatura";
pub const COL_FUNDING_DATE: &str = "data_finanziamento";
pub const COL_AMOUNT: &str = "importo_finanziamento";

/// One funding application ("candidatura") after normalization.
///
/// The serde names are the column names of the tabular source, which is also
/// the legacy (uncompressed) snapshot schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    #[serde(rename = "regione", default)]
    pub region: String,
    #[serde(rename = "provincia", default)]
    pub province: String,
    #[serde(rename = "comune", default)]
    pub municipality: String,
    #[serde(rename = "cod_comune", deserialize_with = "de_string_or_number")]
    pub municipality_code: String,
    #[serde(rename = "codice_cup", default)]
    pub cup_code: String,
    #[serde(rename = "avviso", default)]
    pub call_name: String,
    #[serde(rename = "data_invio_candidatura", default)]
    pub submission_date: String,
    #[serde(rename = "data_finanziamento", default)]
    pub funding_date: String,
    #[serde(
        rename = "importo_finanziamento",
        default,
        deserialize_with = "de_amount"
    )]
    pub funding_amount: f64,
}

/// Per-municipality aggregate attached to a feature by the join.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalityAggregate {
    pub records: Vec<ApplicationRecord>,
    pub total_amount: f64,
    pub count: usize,
    pub region: String,
    pub province: String,
    pub municipality: String,
}

impl MunicipalityAggregate {
    pub fn seed(first: &ApplicationRecord) -> Self {
        Self {
            records: Vec::new(),
            total_amount: 0.0,
            count: 0,
            region: first.region.clone(),
            province: first.province.clone(),
            municipality: first.municipality.clone(),
        }
    }

    pub fn push(&mut self, record: ApplicationRecord) {
        self.total_amount += record.funding_amount;
        self.count += 1;
        self.records.push(record);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    #[serde(rename = "pro_com_t", deserialize_with = "de_string_or_number")]
    pub municipality_code: String,
    #[serde(rename = "comune", default)]
    pub name: String,
    #[serde(rename = "den_uts", default)]
    pub province_name: String,
    #[serde(rename = "sigla", default)]
    pub province_abbrev: String,
    #[serde(rename = "cod_reg", default, deserialize_with = "de_string_or_number")]
    pub region_code: String,
}

/// One municipality polygon. Geometry is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityFeature {
    #[serde(rename = "type", default = "feature_kind")]
    pub kind: String,
    pub properties: FeatureProperties,
    #[serde(default)]
    pub geometry: serde_json::Value,
    #[serde(skip)]
    pub aggregate: Option<MunicipalityAggregate>,
}

fn feature_kind() -> String {
    "Feature".to_string()
}

/// The geographic source as fetched.
#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<MunicipalityFeature>,
}

/// Both halves of the dashboard data. Serializes to the legacy snapshot schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(rename = "comuniData")]
    pub features: Vec<MunicipalityFeature>,
    #[serde(rename = "candidatureData")]
    pub records: Vec<ApplicationRecord>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TableRow {
    #[tabled(rename = "Regione")]
    pub region: String,
    #[tabled(rename = "Provincia")]
    pub province: String,
    #[tabled(rename = "Comune")]
    pub municipality: String,
    #[tabled(rename = "Codice CUP")]
    pub cup: String,
    #[tabled(rename = "Avviso")]
    pub call: String,
    #[tabled(rename = "Data Invio")]
    pub submitted: String,
    #[tabled(rename = "Data Finanziamento")]
    pub funded: String,
    #[tabled(rename = "Importo")]
    pub amount: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ChartRow {
    #[tabled(rename = "#")]
    pub rank: usize,
    #[tabled(rename = "Voce")]
    pub label: String,
    #[tabled(rename = "Importo")]
    pub amount: String,
    #[tabled(rename = "Progetti")]
    pub count: usize,
    #[tabled(rename = "Colore")]
    pub color: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StatsRow {
    #[tabled(rename = "Regioni")]
    pub regions: usize,
    #[tabled(rename = "Comuni")]
    pub municipalities: usize,
    #[tabled(rename = "Progetti")]
    pub applications: usize,
    #[tabled(rename = "Importo")]
    pub total_amount: String,
}
