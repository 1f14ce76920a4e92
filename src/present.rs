//! Formatting and styling consumed by the rendering layer.

use crate::filter::{Dimension, FilterState};
use crate::types::{ApplicationRecord, MunicipalityFeature};
use crate::util::{format_number, parse_date_safe};
use crate::view::ChartMode;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const OPENCUP_BASE_URL: &str = "https://www.opencup.gov.it/portale/it/web/opencup/home/progetto/-/cup/";
pub const FALLBACK_COLOR: &str = "#64748B";
pub const CALL_DISPLAY_LEN: usize = 50;

static REGION_NAME_TO_CODE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Piemonte", "1"),
        ("Valle d'Aosta/Vallée d'Aoste", "2"),
        ("Lombardia", "3"),
        ("Trentino-Alto Adige/Südtirol", "4"),
        ("Veneto", "5"),
        ("Friuli-Venezia Giulia", "6"),
        ("Liguria", "7"),
        ("Emilia-Romagna", "8"),
        ("Toscana", "9"),
        ("Umbria", "10"),
        ("Marche", "11"),
        ("Lazio", "12"),
        ("Abruzzo", "13"),
        ("Molise", "14"),
        ("Campania", "15"),
        ("Puglia", "16"),
        ("Basilicata", "17"),
        ("Calabria", "18"),
        ("Sicilia", "19"),
        ("Sardegna", "20"),
    ])
});

static REGION_COLORS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("1", "#EF4444"),
        ("2", "#06B6D4"),
        ("3", "#3B82F6"),
        ("4", "#10B981"),
        ("5", "#F59E0B"),
        ("6", "#8B5CF6"),
        ("7", "#14B8A6"),
        ("8", "#F97316"),
        ("9", "#A855F7"),
        ("10", "#0EA5E9"),
        ("11", "#FB923C"),
        ("12", "#22C55E"),
        ("13", "#EC4899"),
        ("14", "#6366F1"),
        ("15", "#84CC16"),
        ("16", "#FBBF24"),
        ("17", "#F87171"),
        ("18", "#60A5FA"),
        ("19", "#FACC15"),
        ("20", "#34D399"),
    ])
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyStyle {
    /// `1.5M€`, `2.5k€`, `€999`.
    #[default]
    Abbreviated,
    /// Whole euros with Italian grouping: `1.500.000 €`.
    Locale,
}

impl CurrencyStyle {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "abbreviated" | "short" => Some(Self::Abbreviated),
            "locale" | "it" => Some(Self::Locale),
            _ => None,
        }
    }
}

pub fn format_currency(value: f64, style: CurrencyStyle) -> String {
    match style {
        CurrencyStyle::Abbreviated => {
            if value >= 1_000_000.0 {
                format!("{:.1}M€", value / 1_000_000.0)
            } else if value >= 1_000.0 {
                format!("{:.1}k€", value / 1_000.0)
            } else {
                format!("€{:.0}", value)
            }
        }
        CurrencyStyle::Locale => format!("{}\u{a0}€", format_number(value.round(), 0)),
    }
}

/// `dd/mm/yyyy` for anything that parses, `-` for empty, the input otherwise.
pub fn format_date(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "-".to_string();
    }
    match parse_date_safe(Some(raw)) {
        Some(dt) => dt.format("%d/%m/%Y").to_string(),
        None => raw.to_string(),
    }
}

/// OpenCUP project page for a CUP code, or `None` when there is no code.
pub fn cup_link(cup: &str) -> Option<String> {
    let cup = cup.trim();
    if cup.is_empty() || cup == "-" {
        return None;
    }
    let encoded: String = cup
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&b) {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect();
    Some(format!("{OPENCUP_BASE_URL}{encoded}"))
}

pub fn truncate_call(call: &str) -> String {
    if call.chars().count() > CALL_DISPLAY_LEN {
        let head: String = call.chars().take(CALL_DISPLAY_LEN).collect();
        format!("{head}...")
    } else {
        call.to_string()
    }
}

pub fn region_color(region_code: &str) -> &'static str {
    REGION_COLORS
        .get(region_code.trim())
        .copied()
        .unwrap_or(FALLBACK_COLOR)
}

pub fn region_color_by_name(region: &str) -> &'static str {
    REGION_NAME_TO_CODE
        .get(region)
        .map(|code| region_color(code))
        .unwrap_or(FALLBACK_COLOR)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStyle {
    pub fill_color: &'static str,
    pub fill_opacity: f64,
}

/// Whether a feature should be highlighted under the current filters.
///
/// Region and province are checked against the aggregate, municipality
/// against the feature name, call against any of the aggregated records.
pub fn feature_matches(feature: &MunicipalityFeature, filter: &FilterState) -> bool {
    let agg = feature.aggregate.as_ref();
    if let Some(agg) = agg {
        if !filter.region().is_empty() && agg.region != filter.region() {
            return false;
        }
        if !filter.province().is_empty() && agg.province != filter.province() {
            return false;
        }
        if !filter.call().is_empty() && !agg.records.iter().any(|r| r.call_name == filter.call()) {
            return false;
        }
    }
    filter.municipality().is_empty() || feature.properties.name == filter.municipality()
}

pub fn feature_style(feature: &MunicipalityFeature, filter: &FilterState) -> FeatureStyle {
    let highlighted = feature.aggregate.is_some() && feature_matches(feature, filter);
    FeatureStyle {
        fill_color: region_color(&feature.properties.region_code),
        fill_opacity: if highlighted { 0.8 } else { 0.2 },
    }
}

pub fn chart_title(mode: ChartMode, grouped_by: Dimension, filter: &FilterState, top: usize) -> String {
    match mode {
        ChartMode::ByMunicipality => format!("Top {top} Comuni per importo"),
        ChartMode::ByCall => "Importi finanziati per avviso".to_string(),
        ChartMode::Dynamic => match grouped_by {
            Dimension::Call => format!(
                "Importi finanziati per avviso - Comune: {}",
                filter.municipality()
            ),
            Dimension::Municipality => format!(
                "Importi finanziati per comune - Provincia: {}",
                filter.province()
            ),
            Dimension::Province => format!(
                "Importi finanziati per provincia - Regione: {}",
                filter.region()
            ),
            Dimension::Region => "Importi finanziati per regione".to_string(),
        },
    }
}

/// Info panel content for one municipality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalityDetail<'a> {
    pub name: &'a str,
    pub province: &'a str,
    pub province_abbrev: &'a str,
    pub region: Option<&'a str>,
    pub count: usize,
    pub total_amount: f64,
    pub records: &'a [ApplicationRecord],
}

pub fn municipality_detail(feature: &MunicipalityFeature) -> MunicipalityDetail<'_> {
    let agg = feature.aggregate.as_ref();
    MunicipalityDetail {
        name: &feature.properties.name,
        province: &feature.properties.province_name,
        province_abbrev: &feature.properties.province_abbrev,
        region: agg.map(|a| a.region.as_str()),
        count: agg.map_or(0, |a| a.count),
        total_amount: agg.map_or(0.0, |a| a.total_amount),
        records: agg.map_or(&[][..], |a| a.records.as_slice()),
    }
}
