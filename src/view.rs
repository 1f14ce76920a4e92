//! Read-only projections of the dataset under the current filters.
//!
//! Everything here is a pure function of `(records, filter)` and cheap enough
//! to recompute from scratch after every filter change.

use crate::filter::{Dimension, FilterState};
use crate::types::ApplicationRecord;
use crate::util::parse_date_safe;
use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_TOP_MUNICIPALITIES: usize = 50;
pub const DEFAULT_PAGE_SIZE: usize = 50;

pub fn filtered_records<'a>(
    records: &'a [ApplicationRecord],
    filter: &FilterState,
) -> Vec<&'a ApplicationRecord> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub regions: usize,
    /// Distinct municipality names; homonymous towns count once.
    pub municipalities: usize,
    pub applications: usize,
    pub total_amount: f64,
}

pub fn statistics(records: &[ApplicationRecord], filter: &FilterState) -> Statistics {
    let filtered = filtered_records(records, filter);
    let regions: HashSet<&str> = filtered.iter().map(|r| r.region.as_str()).collect();
    let municipalities: HashSet<&str> = filtered.iter().map(|r| r.municipality.as_str()).collect();
    Statistics {
        regions: regions.len(),
        municipalities: municipalities.len(),
        applications: filtered.len(),
        total_amount: filtered.iter().map(|r| r.funding_amount).sum(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartMode {
    /// Drill down one level below the most specific active filter.
    Dynamic,
    ByMunicipality,
    ByCall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub amount: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub mode: ChartMode,
    pub grouped_by: Dimension,
    pub points: Vec<ChartPoint>,
}

/// The dimension the dynamic chart groups on for a given filter.
pub fn drill_dimension(filter: &FilterState) -> Dimension {
    if !filter.municipality().is_empty() {
        Dimension::Call
    } else if !filter.province().is_empty() {
        Dimension::Municipality
    } else if !filter.region().is_empty() {
        Dimension::Province
    } else {
        Dimension::Region
    }
}

/// Build the bar chart series. Groups are sorted by amount, largest first;
/// equal amounts keep the order in which groups were first seen.
pub fn chart_series(
    records: &[ApplicationRecord],
    filter: &FilterState,
    mode: ChartMode,
    top_municipalities: usize,
) -> ChartSeries {
    let (grouped_by, ignored, limit) = match mode {
        ChartMode::Dynamic => (drill_dimension(filter), None, None),
        ChartMode::ByMunicipality => (
            Dimension::Municipality,
            Some(Dimension::Municipality),
            Some(top_municipalities),
        ),
        ChartMode::ByCall => (Dimension::Call, Some(Dimension::Call), None),
    };

    let selected = records.iter().filter(|r| filter.matches_except(r, ignored));
    let mut points = group_amounts(selected, grouped_by);
    if let Some(limit) = limit {
        points.truncate(limit);
    }
    ChartSeries {
        mode,
        grouped_by,
        points,
    }
}

fn group_amounts<'a>(
    records: impl Iterator<Item = &'a ApplicationRecord>,
    dimension: Dimension,
) -> Vec<ChartPoint> {
    let mut slots: HashMap<&'a str, usize> = HashMap::new();
    let mut points: Vec<ChartPoint> = Vec::new();
    for record in records {
        let key = dimension.of(record);
        let slot = *slots.entry(key).or_insert_with(|| {
            points.push(ChartPoint {
                label: key.to_string(),
                amount: 0.0,
                count: 0,
            });
            points.len() - 1
        });
        points[slot].amount += record.funding_amount;
        points[slot].count += 1;
    }
    // stable: ties stay in first-seen order
    points.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    points
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortColumn {
    Region,
    Province,
    Municipality,
    CupCode,
    Call,
    SubmissionDate,
    FundingDate,
    Amount,
}

impl SortColumn {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "regione" | "region" => Self::Region,
            "provincia" | "province" => Self::Province,
            "comune" | "municipality" => Self::Municipality,
            "codice_cup" | "cup" => Self::CupCode,
            "avviso" | "call" => Self::Call,
            "data_invio_candidatura" | "submitted" => Self::SubmissionDate,
            "data_finanziamento" | "funded" => Self::FundingDate,
            "importo_finanziamento" | "importo" | "amount" => Self::Amount,
            _ => return None,
        })
    }

    fn text(self, record: &ApplicationRecord) -> &str {
        match self {
            Self::Region => &record.region,
            Self::Province => &record.province,
            Self::Municipality => &record.municipality,
            Self::CupCode => &record.cup_code,
            Self::Call => &record.call_name,
            Self::SubmissionDate => &record.submission_date,
            Self::FundingDate => &record.funding_date,
            Self::Amount => "",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableQuery {
    pub sort: Option<(SortColumn, SortDirection)>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePage<'a> {
    pub rows: Vec<&'a ApplicationRecord>,
    pub page: usize,
    pub page_size: usize,
    pub total_records: usize,
    pub total_pages: usize,
}

/// Sort the filtered records and cut out one page.
///
/// Amounts compare numerically, the two date columns by parsed date (rows
/// whose date does not parse sort before all dated rows), everything else
/// case-insensitively. Sorting is stable in both directions.
pub fn table_view<'a>(
    records: &'a [ApplicationRecord],
    filter: &FilterState,
    query: TableQuery,
) -> TablePage<'a> {
    let rows = sorted_records(records, filter, query.sort);
    let page_size = query.page_size.max(1);
    let total_records = rows.len();
    let total_pages = total_records.div_ceil(page_size);
    let page = query.page.max(1);
    let start = (page - 1).saturating_mul(page_size).min(total_records);
    let end = page.saturating_mul(page_size).min(total_records);

    TablePage {
        rows: rows[start..end].to_vec(),
        page,
        page_size,
        total_records,
        total_pages,
    }
}

/// The filtered records in table order.
pub fn sorted_records<'a>(
    records: &'a [ApplicationRecord],
    filter: &FilterState,
    sort: Option<(SortColumn, SortDirection)>,
) -> Vec<&'a ApplicationRecord> {
    let mut rows = filtered_records(records, filter);
    if let Some((column, direction)) = sort {
        sort_rows(&mut rows, column, direction);
    }
    rows
}

fn sort_rows(rows: &mut [&ApplicationRecord], column: SortColumn, direction: SortDirection) {
    match column {
        SortColumn::Amount => rows.sort_by(|a, b| {
            let ord = a.funding_amount.total_cmp(&b.funding_amount);
            directed(ord, direction)
        }),
        SortColumn::SubmissionDate | SortColumn::FundingDate => {
            let key = |r: &&ApplicationRecord| parse_date_safe(Some(column.text(r)));
            match direction {
                SortDirection::Asc => rows.sort_by_cached_key(key),
                SortDirection::Desc => rows.sort_by_cached_key(|r| Reverse(key(r))),
            }
        }
        _ => {
            let key = |r: &&ApplicationRecord| column.text(r).to_lowercase();
            match direction {
                SortDirection::Asc => rows.sort_by_cached_key(key),
                SortDirection::Desc => rows.sort_by_cached_key(|r| Reverse(key(r))),
            }
        }
    }
}

fn directed(ord: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

/// Sort and paging state of the data table widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableState {
    pub sort: Option<(SortColumn, SortDirection)>,
    pub page: usize,
    pub page_size: usize,
}

impl TableState {
    pub fn new(page_size: usize) -> Self {
        Self {
            sort: None,
            page: 1,
            page_size: page_size.max(1),
        }
    }

    /// Same column flips the direction; a new column starts ascending.
    /// Either way the table goes back to the first page.
    pub fn toggle_sort(&mut self, column: SortColumn) {
        let direction = match self.sort {
            Some((current, dir)) if current == column => dir.flipped(),
            _ => SortDirection::Asc,
        };
        self.sort = Some((column, direction));
        self.page = 1;
    }

    /// Move to `page` if it exists. Returns whether the page changed.
    pub fn change_page(&mut self, page: usize, total_pages: usize) -> bool {
        if page >= 1 && page <= total_pages && page != self.page {
            self.page = page;
            true
        } else {
            false
        }
    }

    pub fn reset_page(&mut self) {
        self.page = 1;
    }

    pub fn query(&self) -> TableQuery {
        TableQuery {
            sort: self.sort,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageButton {
    Page(usize),
    Ellipsis,
}

/// Page buttons to show: at most `max_visible` consecutive pages around the
/// current one, plus the first and last page with ellipses when there is a gap.
pub fn page_window(current: usize, total_pages: usize, max_visible: usize) -> Vec<PageButton> {
    if total_pages <= 1 || max_visible == 0 {
        return Vec::new();
    }
    let current = current.clamp(1, total_pages);
    let mut start = current.saturating_sub(max_visible / 2).max(1);
    let end = (start + max_visible - 1).min(total_pages);
    if end + 1 - start < max_visible {
        start = (end + 1).saturating_sub(max_visible).max(1);
    }

    let mut buttons = Vec::new();
    if start > 1 {
        buttons.push(PageButton::Page(1));
        if start > 2 {
            buttons.push(PageButton::Ellipsis);
        }
    }
    buttons.extend((start..=end).map(PageButton::Page));
    if end < total_pages {
        if end + 1 < total_pages {
            buttons.push(PageButton::Ellipsis);
        }
        buttons.push(PageButton::Page(total_pages));
    }
    buttons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(region: &str, province: &str, municipality: &str, code: &str, call: &str, date: &str, amount: f64) -> ApplicationRecord {
        ApplicationRecord {
            region: region.into(),
            province: province.into(),
            municipality: municipality.into(),
            municipality_code: code.into(),
            cup_code: String::new(),
            call_name: call.into(),
            submission_date: date.into(),
            funding_date: String::new(),
            funding_amount: amount,
        }
    }

    fn data() -> Vec<ApplicationRecord> {
        vec![
            rec("Sicilia", "Palermo", "Palermo", "082053", "Avviso 1.2", "2023-03-01", 1_000_000.0),
            rec("Sicilia", "Catania", "Catania", "087015", "Avviso 1.4.1", "2022-12-01", 300_000.0),
            rec("Sicilia", "Palermo", "Monreale", "082049", "Avviso 1.2", "bad", 200_000.0),
            rec("Lazio", "Roma", "Roma", "058091", "Avviso 1.2", "2023-01-15", 500_000.0),
            rec("Sicilia", "Catania", "Acireale", "087004", "Avviso 1.4.1", "", 0.0),
        ]
    }

    #[test]
    fn statistics_without_filters() {
        let stats = statistics(&data(), &FilterState::default());
        assert_eq!(stats.regions, 2);
        assert_eq!(stats.municipalities, 5);
        assert_eq!(stats.applications, 5);
        assert_eq!(stats.total_amount, 2_000_000.0);
    }

    #[test]
    fn homonymous_municipalities_count_once() {
        let records = vec![
            rec("Piemonte", "Torino", "Samone", "001234", "Avviso 1.2", "", 10.0),
            rec("Trentino-Alto Adige/Südtirol", "Trento", "Samone", "022165", "Avviso 1.2", "", 20.0),
        ];
        let stats = statistics(&records, &FilterState::default());
        assert_eq!(stats.municipalities, 1);
        assert_eq!(stats.regions, 2);
        assert_eq!(stats.applications, 2);
    }

    #[test]
    fn dynamic_chart_drills_from_region_to_province() {
        let mut filter = FilterState::default();
        let top = chart_series(&data(), &filter, ChartMode::Dynamic, 50);
        assert_eq!(top.grouped_by, Dimension::Region);
        assert_eq!(top.points[0].label, "Sicilia");
        assert_eq!(top.points[0].amount, 1_500_000.0);

        filter.set_region("Sicilia");
        let series = chart_series(&data(), &filter, ChartMode::Dynamic, 50);
        assert_eq!(series.grouped_by, Dimension::Province);
        let labels: Vec<_> = series.points.iter().map(|p| (p.label.as_str(), p.amount, p.count)).collect();
        assert_eq!(labels, vec![("Palermo", 1_200_000.0, 2), ("Catania", 300_000.0, 2)]);

        filter.set_province("Palermo");
        assert_eq!(drill_dimension(&filter), Dimension::Municipality);
        filter.set_municipality("Palermo");
        let series = chart_series(&data(), &filter, ChartMode::Dynamic, 50);
        assert_eq!(series.grouped_by, Dimension::Call);
        assert_eq!(series.points.len(), 1);
    }

    #[test]
    fn municipality_chart_ignores_municipality_filter_and_truncates() {
        let mut filter = FilterState::default();
        filter.set_region("Sicilia");
        filter.set_municipality("Palermo");
        let series = chart_series(&data(), &filter, ChartMode::ByMunicipality, 2);
        let labels: Vec<_> = series.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Palermo", "Catania"]);
    }

    #[test]
    fn call_chart_ignores_call_filter() {
        let mut filter = FilterState::default();
        filter.set_call("Avviso 1.2");
        filter.set_region("Sicilia");
        let series = chart_series(&data(), &filter, ChartMode::ByCall, 50);
        let labels: Vec<_> = series.points.iter().map(|p| (p.label.as_str(), p.amount)).collect();
        assert_eq!(labels, vec![("Avviso 1.2", 1_200_000.0), ("Avviso 1.4.1", 300_000.0)]);
    }

    #[test]
    fn equal_amounts_keep_first_seen_order() {
        let records = vec![
            rec("B", "x", "x", "000001", "c", "", 10.0),
            rec("A", "x", "x", "000002", "c", "", 10.0),
            rec("C", "x", "x", "000003", "c", "", 20.0),
        ];
        let series = chart_series(&records, &FilterState::default(), ChartMode::Dynamic, 50);
        let labels: Vec<_> = series.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["C", "B", "A"]);
    }

    #[test]
    fn table_sorts_and_pages() {
        let all = data();
        let filter = FilterState::default();
        let query = TableQuery {
            sort: Some((SortColumn::Amount, SortDirection::Desc)),
            page: 1,
            page_size: 2,
        };
        let page = table_view(&all, &filter, query);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_records, 5);
        let names: Vec<_> = page.rows.iter().map(|r| r.municipality.as_str()).collect();
        assert_eq!(names, vec!["Palermo", "Roma"]);

        let last = table_view(&all, &filter, TableQuery { page: 3, ..query });
        assert_eq!(last.rows.len(), 1);
        assert_eq!(last.rows[0].municipality, "Acireale");

        let beyond = table_view(&all, &filter, TableQuery { page: 9, ..query });
        assert!(beyond.rows.is_empty());
    }

    #[test]
    fn huge_page_numbers_yield_an_empty_page() {
        let all = data();
        let page = table_view(
            &all,
            &FilterState::default(),
            TableQuery { sort: None, page: usize::MAX, page_size: 50 },
        );
        assert!(page.rows.is_empty());
        assert_eq!(page.page, usize::MAX);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_records, 5);
    }

    #[test]
    fn sort_column_names() {
        assert_eq!(SortColumn::parse("importo"), Some(SortColumn::Amount));
        assert_eq!(SortColumn::parse(" Importo_Finanziamento "), Some(SortColumn::Amount));
        assert_eq!(SortColumn::parse("data_finanziamento"), Some(SortColumn::FundingDate));
        assert_eq!(SortColumn::parse("colore"), None);
    }

    #[test]
    fn table_sorts_dates_and_text() {
        let all = data();
        let filter = FilterState::default();
        let by_date = table_view(
            &all,
            &filter,
            TableQuery { sort: Some((SortColumn::SubmissionDate, SortDirection::Asc)), page: 1, page_size: 10 },
        );
        let names: Vec<_> = by_date.rows.iter().map(|r| r.municipality.as_str()).collect();
        assert_eq!(names, vec!["Monreale", "Acireale", "Catania", "Roma", "Palermo"]);

        let mixed = vec![
            rec("x", "x", "bari", "1", "c", "", 0.0),
            rec("x", "x", "Ancona", "2", "c", "", 0.0),
            rec("x", "x", "Como", "3", "c", "", 0.0),
        ];
        let by_name = table_view(
            &mixed,
            &filter,
            TableQuery { sort: Some((SortColumn::Municipality, SortDirection::Desc)), page: 1, page_size: 10 },
        );
        let names: Vec<_> = by_name.rows.iter().map(|r| r.municipality.as_str()).collect();
        assert_eq!(names, vec!["Como", "bari", "Ancona"]);
    }

    #[test]
    fn sort_toggling_and_page_changes() {
        let mut state = TableState::new(50);
        state.page = 3;
        state.toggle_sort(SortColumn::Amount);
        assert_eq!(state.sort, Some((SortColumn::Amount, SortDirection::Asc)));
        assert_eq!(state.page, 1);
        state.toggle_sort(SortColumn::Amount);
        assert_eq!(state.sort, Some((SortColumn::Amount, SortDirection::Desc)));
        state.toggle_sort(SortColumn::Region);
        assert_eq!(state.sort, Some((SortColumn::Region, SortDirection::Asc)));

        assert!(state.change_page(2, 4));
        assert!(!state.change_page(5, 4));
        assert!(!state.change_page(0, 4));
        assert_eq!(state.page, 2);
    }

    #[test]
    fn page_window_with_ellipses() {
        use PageButton::{Ellipsis, Page};
        assert!(page_window(1, 1, 5).is_empty());
        assert_eq!(page_window(1, 3, 5), vec![Page(1), Page(2), Page(3)]);
        assert_eq!(
            page_window(1, 10, 5),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Ellipsis, Page(10)]
        );
        assert_eq!(
            page_window(6, 10, 5),
            vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Page(7), Page(8), Ellipsis, Page(10)]
        );
        assert_eq!(
            page_window(10, 10, 5),
            vec![Page(1), Ellipsis, Page(6), Page(7), Page(8), Page(9), Page(10)]
        );
    }
}
