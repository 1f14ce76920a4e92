use crate::csv_parse::{CsvParser, CsvRow};
use crate::types::{
    ApplicationRecord, COL_AMOUNT, COL_CALL, COL_CUP, COL_FUNDING_DATE, COL_MUNICIPALITY,
    COL_MUNICIPALITY_CODE, COL_PROVINCE, COL_REGION, COL_SUBMISSION_DATE,
};
use crate::util::{parse_amount, parse_u64_safe};
use serde::Serialize;

/// Code used by the feed for applications not tied to a municipality.
pub const SENTINEL_CODE: &str = "000000";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub total_rows: usize,
    pub short_rows: usize,
    pub rejected_codes: usize,
    pub accepted: usize,
}

/// Zero-pad a numeric municipality code to six digits. Anything that is not a
/// plain number is returned trimmed but otherwise untouched.
pub fn normalize_municipality_code(raw: &str) -> String {
    let trimmed = raw.trim();
    match parse_u64_safe(Some(trimmed)) {
        Some(n) => format!("{:06}", n),
        None => trimmed.to_string(),
    }
}

/// Turn one header-keyed row into a record, or `None` when the municipality
/// code is missing or the sentinel.
pub fn normalize_row(row: &CsvRow) -> Option<ApplicationRecord> {
    let field = |name: &str| row.get(name).cloned().unwrap_or_default();

    let municipality_code = normalize_municipality_code(&field(COL_MUNICIPALITY_CODE));
    if municipality_code.is_empty() || municipality_code == SENTINEL_CODE {
        return None;
    }

    Some(ApplicationRecord {
        region: field(COL_REGION),
        province: field(COL_PROVINCE),
        municipality: field(COL_MUNICIPALITY),
        municipality_code,
        cup_code: field(COL_CUP),
        call_name: field(COL_CALL),
        submission_date: field(COL_SUBMISSION_DATE),
        funding_date: field(COL_FUNDING_DATE),
        funding_amount: parse_amount(&field(COL_AMOUNT)),
    })
}

/// Parse and clean the candidature CSV. Bad rows are counted and skipped;
/// nothing here aborts the load.
pub fn load_and_clean(text: &str) -> (Vec<ApplicationRecord>, IngestReport) {
    let doc = CsvParser::default().parse_document(text);
    let mut rejected_codes = 0usize;
    let mut records = Vec::with_capacity(doc.rows.len());

    for row in &doc.rows {
        match normalize_row(row) {
            Some(record) => records.push(record),
            None => rejected_codes += 1,
        }
    }

    let report = IngestReport {
        total_rows: doc.rows.len() + doc.short_rows,
        short_rows: doc.short_rows,
        rejected_codes,
        accepted: records.len(),
    };
    tracing::debug!(?report, headers = doc.headers.len(), "candidature cleaned");
    (records, report)
}
