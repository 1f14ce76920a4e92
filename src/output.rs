use crate::error::ExportError;
use crate::filter::FilterState;
use crate::types::ApplicationRecord;
use chrono::NaiveDate;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub const EXPORT_HEADER: [&str; 8] = [
    "Regione",
    "Provincia",
    "Comune",
    "Codice CUP",
    "Avviso",
    "Data Invio Candidatura",
    "Data Finanziamento",
    "Importo Finanziamento",
];

/// Render the filtered records as CSV, values as stored (amounts unformatted).
pub fn export_csv(rows: &[&ApplicationRecord]) -> Result<String, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::NoRows);
    }
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(EXPORT_HEADER)?;
    for r in rows {
        let amount = r.funding_amount.to_string();
        wtr.write_record([
            r.region.as_str(),
            r.province.as_str(),
            r.municipality.as_str(),
            r.cup_code.as_str(),
            r.call_name.as_str(),
            r.submission_date.as_str(),
            r.funding_date.as_str(),
            amount.as_str(),
        ])?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `pa_digitale_2026_filtrati[_<regione>][_<provincia>][_<comune>]_<data>.csv`
pub fn export_file_name(filter: &FilterState, today: NaiveDate) -> String {
    let mut name = String::from("pa_digitale_2026_filtrati");
    for part in [filter.region(), filter.province(), filter.municipality()] {
        if !part.is_empty() {
            name.push('_');
            name.push_str(&sanitize(part));
        }
    }
    name.push('_');
    name.push_str(&today.format("%Y-%m-%d").to_string());
    name.push_str(".csv");
    name
}

pub fn write_export(path: &Path, rows: &[&ApplicationRecord]) -> Result<(), ExportError> {
    let body = export_csv(rows)?;
    std::fs::write(path, body)?;
    Ok(())
}

/// Markdown table of at most `max_rows` rows.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(nessun dato)\n".to_string();
    }
    format!("{}\n", Table::new(slice).with(Style::markdown()))
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", render_table(rows, max_rows));
}
