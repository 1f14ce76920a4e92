//! Dashboard session state.
//!
//! [`Dashboard`] owns the loaded dataset together with the filter, chart and
//! table state. Every mutation returns a fresh [`DashboardView`] so the
//! caller always renders statistics, options, chart and table from the same
//! filter.

use crate::error::ExportError;
use crate::filter::{FilterOptions, FilterState};
use crate::output;
use crate::present::{
    chart_title, feature_style, format_currency, format_date, municipality_detail,
    region_color_by_name, truncate_call, CurrencyStyle, FeatureStyle, MunicipalityDetail,
};
use crate::types::{ApplicationRecord, ChartRow, Dataset, StatsRow, TableRow};
use crate::util::format_int;
use crate::view::{
    chart_series, page_window, sorted_records, statistics, table_view, ChartMode, ChartSeries,
    PageButton, SortColumn, Statistics, TablePage, TableState, DEFAULT_PAGE_SIZE,
    DEFAULT_TOP_MUNICIPALITIES,
};
use chrono::NaiveDate;

pub const PAGE_BUTTONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewConfig {
    pub top_municipalities: usize,
    pub currency: CurrencyStyle,
    pub page_size: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            top_municipalities: DEFAULT_TOP_MUNICIPALITIES,
            currency: CurrencyStyle::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    Region(String),
    Province(String),
    Municipality(String),
    Call(String),
    Reset,
}

#[derive(Debug)]
pub struct DashboardView<'a> {
    pub statistics: Statistics,
    pub options: FilterOptions,
    pub chart: ChartSeries,
    pub chart_title: String,
    pub table: TablePage<'a>,
    pub pages: Vec<PageButton>,
}

#[derive(Debug)]
pub struct Dashboard {
    dataset: Dataset,
    filter: FilterState,
    table: TableState,
    chart_mode: ChartMode,
    config: ViewConfig,
}

impl Dashboard {
    pub fn new(dataset: Dataset, config: ViewConfig) -> Self {
        Self {
            dataset,
            filter: FilterState::default(),
            table: TableState::new(config.page_size),
            chart_mode: ChartMode::Dynamic,
            config,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn chart_mode(&self) -> ChartMode {
        self.chart_mode
    }

    pub fn config(&self) -> ViewConfig {
        self.config
    }

    /// Swap in a freshly loaded dataset. Filters are kept; the table goes
    /// back to page one.
    pub fn replace_dataset(&mut self, dataset: Dataset) {
        self.dataset = dataset;
        self.table.reset_page();
    }

    pub fn apply(&mut self, change: FilterChange) -> DashboardView<'_> {
        match change {
            FilterChange::Region(v) => self.filter.set_region(v),
            FilterChange::Province(v) => self.filter.set_province(v),
            FilterChange::Municipality(v) => self.filter.set_municipality(v),
            FilterChange::Call(v) => self.filter.set_call(v),
            FilterChange::Reset => self.filter.reset(),
        }
        self.table.reset_page();
        self.view()
    }

    pub fn set_chart_mode(&mut self, mode: ChartMode) -> ChartSeries {
        self.chart_mode = mode;
        self.chart()
    }

    pub fn sort_by(&mut self, column: SortColumn) -> TablePage<'_> {
        self.table.toggle_sort(column);
        self.table_page()
    }

    /// Move the table to `page`. Out-of-range pages leave it where it is.
    pub fn change_page(&mut self, page: usize) -> TablePage<'_> {
        let total = self.table_page().total_pages;
        self.table.change_page(page, total);
        self.table_page()
    }

    pub fn chart(&self) -> ChartSeries {
        chart_series(
            &self.dataset.records,
            &self.filter,
            self.chart_mode,
            self.config.top_municipalities,
        )
    }

    pub fn table_page(&self) -> TablePage<'_> {
        table_view(&self.dataset.records, &self.filter, self.table.query())
    }

    pub fn view(&self) -> DashboardView<'_> {
        let chart = self.chart();
        let table = self.table_page();
        DashboardView {
            statistics: statistics(&self.dataset.records, &self.filter),
            options: FilterOptions::derive(&self.dataset.records, &self.filter),
            chart_title: chart_title(
                self.chart_mode,
                chart.grouped_by,
                &self.filter,
                self.config.top_municipalities,
            ),
            chart,
            pages: page_window(table.page, table.total_pages, PAGE_BUTTONS),
            table,
        }
    }

    /// Every filtered record, in the table's current sort order.
    pub fn filtered(&self) -> Vec<&ApplicationRecord> {
        sorted_records(&self.dataset.records, &self.filter, self.table.sort)
    }

    pub fn export_csv(&self) -> Result<String, ExportError> {
        output::export_csv(&self.filtered())
    }

    pub fn export_file_name(&self, today: NaiveDate) -> String {
        output::export_file_name(&self.filter, today)
    }

    /// Detail for the feature matching the selected municipality, if any.
    pub fn selected_municipality_detail(&self) -> Option<MunicipalityDetail<'_>> {
        let name = self.filter.municipality();
        if name.is_empty() {
            return None;
        }
        self.dataset
            .features
            .iter()
            .find(|f| {
                f.properties.name == name
                    && f.aggregate
                        .as_ref()
                        .map_or(true, |a| self.filter.region().is_empty() || a.region == self.filter.region())
            })
            .map(municipality_detail)
    }

    pub fn feature_styles(&self) -> Vec<(&str, FeatureStyle)> {
        self.dataset
            .features
            .iter()
            .map(|f| (f.properties.municipality_code.as_str(), feature_style(f, &self.filter)))
            .collect()
    }

    pub fn stats_row(&self, stats: &Statistics) -> StatsRow {
        StatsRow {
            regions: stats.regions,
            municipalities: stats.municipalities,
            applications: stats.applications,
            total_amount: format_currency(stats.total_amount, self.config.currency),
        }
    }

    pub fn chart_rows(&self, series: &ChartSeries) -> Vec<ChartRow> {
        series
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| ChartRow {
                rank: i + 1,
                label: truncate_call(&p.label),
                amount: format_currency(p.amount, self.config.currency),
                count: p.count,
                color: region_color_by_name(&p.label).to_string(),
            })
            .collect()
    }

    pub fn table_rows(&self, page: &TablePage<'_>) -> Vec<TableRow> {
        page.rows
            .iter()
            .map(|r| TableRow {
                region: r.region.clone(),
                province: r.province.clone(),
                municipality: r.municipality.clone(),
                cup: if r.cup_code.trim().is_empty() {
                    "-".to_string()
                } else {
                    r.cup_code.clone()
                },
                call: truncate_call(&r.call_name),
                submitted: format_date(&r.submission_date),
                funded: format_date(&r.funding_date),
                amount: format_currency(r.funding_amount, self.config.currency),
            })
            .collect()
    }
}

/// `1.234 comuni` style counter used in console summaries.
pub fn count_label(n: usize, noun: &str) -> String {
    format!("{} {}", format_int(n), noun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureProperties, MunicipalityFeature};
    use crate::view::SortDirection;

    fn rec(region: &str, province: &str, municipality: &str, code: &str, call: &str, amount: f64) -> ApplicationRecord {
        ApplicationRecord {
            region: region.into(),
            province: province.into(),
            municipality: municipality.into(),
            municipality_code: code.into(),
            cup_code: String::new(),
            call_name: call.into(),
            submission_date: "2023-01-10".into(),
            funding_date: String::new(),
            funding_amount: amount,
        }
    }

    fn feature(code: &str, name: &str, region_code: &str) -> MunicipalityFeature {
        MunicipalityFeature {
            kind: "Feature".into(),
            properties: FeatureProperties {
                municipality_code: code.into(),
                name: name.into(),
                province_name: name.into(),
                province_abbrev: String::new(),
                region_code: region_code.into(),
            },
            geometry: serde_json::Value::Null,
            aggregate: None,
        }
    }

    fn dashboard() -> Dashboard {
        let mut dataset = Dataset {
            features: vec![
                feature("082053", "Palermo", "19"),
                feature("087015", "Catania", "19"),
                feature("058091", "Roma", "12"),
            ],
            records: vec![
                rec("Sicilia", "Palermo", "Palermo", "082053", "Avviso 1.2", 1_000_000.0),
                rec("Sicilia", "Catania", "Catania", "087015", "Avviso 1.4.1", 500_000.0),
                rec("Lazio", "Roma", "Roma", "058091", "Avviso 1.2", 200_000.0),
            ],
        };
        dataset.join();
        Dashboard::new(dataset, ViewConfig::default())
    }

    #[test]
    fn selecting_a_region_narrows_everything() {
        let mut d = dashboard();
        let view = d.apply(FilterChange::Region("Sicilia".into()));
        assert_eq!(view.statistics.applications, 2);
        assert_eq!(view.statistics.municipalities, 2);
        assert_eq!(view.options.provinces, vec!["Catania", "Palermo"]);
        assert_eq!(view.chart_title, "Importi finanziati per provincia - Regione: Sicilia");
        assert_eq!(view.table.total_records, 2);
        let stats = view.statistics;
        assert_eq!(d.stats_row(&stats).total_amount, "1.5M€");
    }

    #[test]
    fn reset_restores_the_full_view() {
        let mut d = dashboard();
        d.apply(FilterChange::Call("Avviso 1.2".into()));
        let view = d.apply(FilterChange::Reset);
        assert_eq!(view.statistics.applications, 3);
        assert_eq!(view.chart.points.len(), 2);
        assert!(!d.filter().is_active());
    }

    #[test]
    fn chart_mode_and_rows() {
        let mut d = dashboard();
        let series = d.set_chart_mode(ChartMode::ByCall);
        let rows = d.chart_rows(&series);
        assert_eq!(rows[0].label, "Avviso 1.2");
        assert_eq!(rows[0].amount, "1.2M€");
        assert_eq!(rows[0].rank, 1);

        let series = d.set_chart_mode(ChartMode::Dynamic);
        let rows = d.chart_rows(&series);
        assert_eq!(rows[0].label, "Sicilia");
        assert_eq!(rows[0].color, "#FACC15");
    }

    #[test]
    fn sorting_and_paging() {
        let mut d = Dashboard::new(dashboard().dataset().clone(), ViewConfig { page_size: 2, ..ViewConfig::default() });
        let page = d.sort_by(SortColumn::Amount);
        assert_eq!(page.rows[0].municipality, "Roma");
        assert_eq!(page.total_pages, 2);
        let page = d.change_page(2);
        assert_eq!(page.page, 2);
        assert_eq!(page.rows.len(), 1);
        let page = d.change_page(7);
        assert_eq!(page.page, 2);
        assert_eq!(d.sort_by(SortColumn::Amount).page, 1);
        assert_eq!(d.table.sort, Some((SortColumn::Amount, SortDirection::Desc)));
        let page = d.table_page();
        assert_eq!(page.rows[0].municipality, "Palermo");
        let rows = d.table_rows(&page);
        assert_eq!(rows[0].cup, "-");
        assert_eq!(rows[0].submitted, "10/01/2023");
    }

    #[test]
    fn filter_change_returns_to_first_page() {
        let mut d = Dashboard::new(dashboard().dataset().clone(), ViewConfig { page_size: 1, ..ViewConfig::default() });
        d.change_page(3);
        assert_eq!(d.table_page().page, 3);
        let view = d.apply(FilterChange::Region("Sicilia".into()));
        assert_eq!(view.table.page, 1);
    }

    #[test]
    fn municipality_detail_and_styles() {
        let mut d = dashboard();
        assert!(d.selected_municipality_detail().is_none());
        d.apply(FilterChange::Region("Sicilia".into()));
        d.apply(FilterChange::Municipality("Palermo".into()));
        let detail = d.selected_municipality_detail().expect("palermo");
        assert_eq!(detail.count, 1);
        assert_eq!(detail.total_amount, 1_000_000.0);

        let styles = d.feature_styles();
        let opacity: Vec<f64> = styles.iter().map(|(_, s)| s.fill_opacity).collect();
        assert_eq!(opacity, vec![0.8, 0.2, 0.2]);
    }

    #[test]
    fn export_follows_filters() {
        let mut d = dashboard();
        d.apply(FilterChange::Region("Lazio".into()));
        let csv = d.export_csv().expect("rows");
        assert_eq!(csv.lines().count(), 2);
        d.apply(FilterChange::Call("Avviso 9".into()));
        assert!(matches!(d.export_csv(), Err(ExportError::NoRows)));
        let day = NaiveDate::from_ymd_opt(2025, 1, 2).expect("date");
        assert_eq!(d.export_file_name(day), "pa_digitale_2026_filtrati_Lazio_2025-01-02.csv");
    }

    #[test]
    fn export_follows_table_order() {
        let mut d = dashboard();
        let municipalities = |csv: &str| -> Vec<String> {
            csv.lines()
                .skip(1)
                .map(|l| l.split(',').nth(2).unwrap_or_default().to_string())
                .collect()
        };
        let unsorted = d.export_csv().expect("rows");
        assert_eq!(municipalities(&unsorted), vec!["Palermo", "Catania", "Roma"]);

        d.sort_by(SortColumn::Amount);
        let ascending = d.export_csv().expect("rows");
        assert_eq!(municipalities(&ascending), vec!["Roma", "Catania", "Palermo"]);

        d.sort_by(SortColumn::Municipality);
        d.sort_by(SortColumn::Municipality);
        let by_name_desc = d.export_csv().expect("rows");
        assert_eq!(municipalities(&by_name_desc), vec!["Roma", "Palermo", "Catania"]);
    }

    #[test]
    fn count_labels_use_italian_grouping() {
        assert_eq!(count_label(7904, "comuni"), "7.904 comuni");
    }
}
