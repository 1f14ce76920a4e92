use crate::types::ApplicationRecord;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dimension {
    Region,
    Province,
    Municipality,
    Call,
}

impl Dimension {
    pub fn of(self, record: &ApplicationRecord) -> &str {
        match self {
            Dimension::Region => &record.region,
            Dimension::Province => &record.province,
            Dimension::Municipality => &record.municipality,
            Dimension::Call => &record.call_name,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Region => "regione",
            Dimension::Province => "provincia",
            Dimension::Municipality => "comune",
            Dimension::Call => "avviso",
        }
    }
}

/// The four cascading filters. An empty string means "any".
///
/// Region clears province and municipality, province clears municipality,
/// call stands alone. Values are not validated here; callers offer only the
/// options from [`FilterOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    region: String,
    province: String,
    municipality: String,
    call: String,
}

impl FilterState {
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn province(&self) -> &str {
        &self.province
    }

    pub fn municipality(&self) -> &str {
        &self.municipality
    }

    pub fn call(&self) -> &str {
        &self.call
    }

    pub fn get(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Region => &self.region,
            Dimension::Province => &self.province,
            Dimension::Municipality => &self.municipality,
            Dimension::Call => &self.call,
        }
    }

    pub fn set_region(&mut self, value: impl Into<String>) {
        self.region = value.into();
        self.province.clear();
        self.municipality.clear();
    }

    pub fn set_province(&mut self, value: impl Into<String>) {
        self.province = value.into();
        self.municipality.clear();
    }

    pub fn set_municipality(&mut self, value: impl Into<String>) {
        self.municipality = value.into();
    }

    pub fn set_call(&mut self, value: impl Into<String>) {
        self.call = value.into();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        !(self.region.is_empty()
            && self.province.is_empty()
            && self.municipality.is_empty()
            && self.call.is_empty())
    }

    /// Exact, case-sensitive match on every non-empty field.
    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        self.matches_except(record, None)
    }

    /// Like [`matches`](Self::matches) but ignoring one dimension.
    pub fn matches_except(&self, record: &ApplicationRecord, ignored: Option<Dimension>) -> bool {
        [
            Dimension::Region,
            Dimension::Province,
            Dimension::Municipality,
            Dimension::Call,
        ]
        .into_iter()
        .filter(|d| Some(*d) != ignored)
        .all(|d| {
            let wanted = self.get(d);
            wanted.is_empty() || d.of(record) == wanted
        })
    }
}

/// Option lists for the four filter widgets, each sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub regions: Vec<String>,
    pub provinces: Vec<String>,
    pub municipalities: Vec<String>,
    pub calls: Vec<String>,
}

impl FilterOptions {
    /// Provinces follow the selected region; municipalities follow region
    /// and/or province. Regions and calls always list everything.
    pub fn derive(records: &[ApplicationRecord], filter: &FilterState) -> Self {
        let distinct = |dimension: Dimension, keep: &dyn Fn(&ApplicationRecord) -> bool| {
            records
                .iter()
                .filter(|r| keep(*r))
                .map(|r| dimension.of(r).to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>()
        };
        let in_region = |r: &ApplicationRecord| filter.region.is_empty() || r.region == filter.region;
        let in_province =
            |r: &ApplicationRecord| filter.province.is_empty() || r.province == filter.province;

        Self {
            regions: distinct(Dimension::Region, &|_: &ApplicationRecord| true),
            provinces: distinct(Dimension::Province, &in_region),
            municipalities: distinct(Dimension::Municipality, &|r: &ApplicationRecord| {
                in_region(r) && in_province(r)
            }),
            calls: distinct(Dimension::Call, &|_: &ApplicationRecord| true),
        }
    }

    pub fn for_dimension(&self, dimension: Dimension) -> &[String] {
        match dimension {
            Dimension::Region => &self.regions,
            Dimension::Province => &self.provinces,
            Dimension::Municipality => &self.municipalities,
            Dimension::Call => &self.calls,
        }
    }
}

/// Result of narrowing an option list with a typed search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OptionSearch<'a> {
    Matches(Vec<&'a str>),
    NoResults,
}

/// Case-insensitive substring search. An empty term keeps every option.
pub fn search_options<'a>(options: &'a [String], term: &str) -> OptionSearch<'a> {
    let needle = term.trim().to_lowercase();
    let hits: Vec<&str> = options
        .iter()
        .filter(|o| needle.is_empty() || o.to_lowercase().contains(&needle))
        .map(String::as_str)
        .collect();
    if hits.is_empty() {
        OptionSearch::NoResults
    } else {
        OptionSearch::Matches(hits)
    }
}
