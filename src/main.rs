// Command-line front end for the dashboard core.
//
// One-shot subcommands print a single projection of the dataset under the
// filters given as flags. `interactive` keeps the dataset in memory and runs
// a menu loop over it, the way a browser session would.
use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pa_digitale::app::{count_label, Dashboard, FilterChange};
use pa_digitale::config::AppConfig;
use pa_digitale::debounce::{Debouncer, CHART_DEBOUNCE};
use pa_digitale::filter::{search_options, Dimension, FilterOptions, OptionSearch};
use pa_digitale::loader::{DatasetLoader, LoadedDataset};
use pa_digitale::output::{self, preview_table_rows, render_table};
use pa_digitale::present::{cup_link, format_currency, CurrencyStyle};
use pa_digitale::remote::HttpSource;
use pa_digitale::view::{ChartMode, SortColumn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pa-digitale")]
#[command(about = "PA Digitale 2026 funding dashboard")]
struct Cli {
    /// Municipality GeoJSON (URL or local path).
    #[arg(long, global = true)]
    geo_url: Option<String>,
    /// Candidature CSV (URL or local path).
    #[arg(long, global = true)]
    csv_url: Option<String>,
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Ignore and do not write snapshots.
    #[arg(long, global = true)]
    no_cache: bool,
    #[arg(long, global = true, value_enum)]
    currency: Option<CurrencyArg>,
    /// Bars in the per-municipality chart.
    #[arg(long, global = true)]
    top: Option<usize>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CurrencyArg {
    Abbreviated,
    Locale,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Dynamic,
    Comuni,
    Avvisi,
}

impl From<ModeArg> for ChartMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Dynamic => ChartMode::Dynamic,
            ModeArg::Comuni => ChartMode::ByMunicipality,
            ModeArg::Avvisi => ChartMode::ByCall,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DimensionArg {
    Regione,
    Provincia,
    Comune,
    Avviso,
}

impl From<DimensionArg> for Dimension {
    fn from(d: DimensionArg) -> Self {
        match d {
            DimensionArg::Regione => Dimension::Region,
            DimensionArg::Provincia => Dimension::Province,
            DimensionArg::Comune => Dimension::Municipality,
            DimensionArg::Avviso => Dimension::Call,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
struct FilterArgs {
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    province: Option<String>,
    #[arg(long)]
    municipality: Option<String>,
    #[arg(long)]
    call: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Headline statistics.
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Bar chart data.
    Chart {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value = "dynamic")]
        mode: ModeArg,
    },
    /// One page of the application table.
    Table {
        #[command(flatten)]
        filter: FilterArgs,
        /// Column to sort by (e.g. importo, comune, data_finanziamento).
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Write the filtered applications as CSV.
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Defaults to the dated file name in the current directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Values available for one filter.
    Options {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(value_enum)]
        dimension: DimensionArg,
        #[arg(long)]
        search: Option<String>,
    },
    /// Applications of one municipality.
    Detail {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Remove stored snapshots.
    ClearCache,
    /// Menu-driven session.
    Interactive,
}

impl Cli {
    fn config(&self) -> AppConfig {
        let mut cfg = AppConfig::from_env();
        if let Some(url) = &self.geo_url {
            cfg.geo_url = url.clone();
        }
        if let Some(url) = &self.csv_url {
            cfg.csv_url = url.clone();
        }
        if let Some(dir) = &self.cache_dir {
            cfg.cache_dir = dir.clone();
        }
        if self.no_cache {
            cfg.cache = pa_digitale::config::CacheStrategy::Disabled;
        }
        if let Some(c) = self.currency {
            cfg.currency = match c {
                CurrencyArg::Abbreviated => CurrencyStyle::Abbreviated,
                CurrencyArg::Locale => CurrencyStyle::Locale,
            };
        }
        if let Some(top) = self.top.filter(|t| *t > 0) {
            cfg.top_municipalities = top;
        }
        cfg
    }
}

fn apply_filters(dashboard: &mut Dashboard, args: &FilterArgs) {
    // Order matters: each level clears the ones below it.
    if let Some(v) = &args.region {
        dashboard.apply(FilterChange::Region(v.clone()));
    }
    if let Some(v) = &args.province {
        dashboard.apply(FilterChange::Province(v.clone()));
    }
    if let Some(v) = &args.municipality {
        dashboard.apply(FilterChange::Municipality(v.clone()));
    }
    if let Some(v) = &args.call {
        dashboard.apply(FilterChange::Call(v.clone()));
    }
}

async fn load(loader: &DatasetLoader) -> Result<LoadedDataset> {
    let loaded = loader.load().await.context("loading dataset")?;
    if let Some(ingest) = &loaded.ingest {
        println!(
            "Processing dataset... ({} loaded, {} skipped)",
            count_label(ingest.accepted, "candidature"),
            count_label(ingest.rejected_codes + ingest.short_rows, "rows"),
        );
    }
    println!(
        "{} joined to the map ({} without a boundary).\n",
        count_label(loaded.join.matched, "comuni"),
        loaded.join.orphan_codes
    );
    Ok(loaded)
}

fn print_summary(dashboard: &Dashboard) {
    let view = dashboard.view();
    println!("Riepilogo\n");
    preview_table_rows(&[dashboard.stats_row(&view.statistics)], 1);
}

fn print_chart(dashboard: &Dashboard) {
    let view = dashboard.view();
    println!("{}\n", view.chart_title);
    let rows = dashboard.chart_rows(&view.chart);
    preview_table_rows(&rows, rows.len());
}

fn print_table(dashboard: &Dashboard) {
    let page = dashboard.table_page();
    let rows = dashboard.table_rows(&page);
    println!(
        "Pagina {} di {} ({} risultati)\n",
        page.page,
        page.total_pages.max(1),
        page.total_records
    );
    preview_table_rows(&rows, rows.len());
}

fn print_detail(dashboard: &Dashboard) -> Result<()> {
    let Some(detail) = dashboard.selected_municipality_detail() else {
        bail!("select a municipality with --municipality");
    };
    let currency = dashboard.config().currency;
    println!(
        "{} ({} {}) - {}\n{} progetti, {}\n",
        detail.name,
        detail.province,
        detail.province_abbrev,
        detail.region.unwrap_or("-"),
        detail.count,
        format_currency(detail.total_amount, currency)
    );
    for r in detail.records {
        println!(
            "  {} | {} | {}",
            r.call_name,
            format_currency(r.funding_amount, currency),
            cup_link(&r.cup_code).unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

fn print_options(options: &FilterOptions, dimension: Dimension, search: Option<&str>) {
    match search_options(options.for_dimension(dimension), search.unwrap_or("")) {
        OptionSearch::Matches(values) => {
            println!("{} ({})", dimension.label(), values.len());
            for v in values {
                println!("  {}", v);
            }
        }
        OptionSearch::NoResults => println!("Nessun risultato"),
    }
}

fn export(dashboard: &Dashboard, out: Option<PathBuf>) -> Result<()> {
    let path = out.unwrap_or_else(|| {
        PathBuf::from(dashboard.export_file_name(Local::now().date_naive()))
    });
    let rows = dashboard.filtered();
    match output::write_export(&path, &rows) {
        Ok(()) => {
            println!("(Filtered table exported to {})", path.display());
            Ok(())
        }
        Err(pa_digitale::ExportError::NoRows) => {
            println!("Nessun dato da scaricare");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("writing {}", path.display())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = cli.config();
    let source = HttpSource::new(cfg.source_config()).context("building http client")?;
    let loader = DatasetLoader::new(Arc::new(source), cfg.build_cache());

    let command = cli.command.unwrap_or(Commands::Interactive);
    if let Commands::ClearCache = command {
        match loader.cache() {
            Some(cache) => {
                cache.clear().await.context("clearing snapshot cache")?;
                println!("Cache cleared.");
            }
            None => println!("Caching is disabled."),
        }
        return Ok(());
    }

    let loaded = load(&loader).await?;
    let mut dashboard = Dashboard::new(loaded.dataset, cfg.view_config());

    match command {
        Commands::Summary { filter } => {
            apply_filters(&mut dashboard, &filter);
            print_summary(&dashboard);
        }
        Commands::Chart { filter, mode } => {
            apply_filters(&mut dashboard, &filter);
            dashboard.set_chart_mode(mode.into());
            print_chart(&dashboard);
        }
        Commands::Table {
            filter,
            sort,
            desc,
            page,
        } => {
            apply_filters(&mut dashboard, &filter);
            if let Some(name) = sort {
                let column = SortColumn::parse(&name)
                    .with_context(|| format!("unknown sort column {name:?}"))?;
                dashboard.sort_by(column);
                if desc {
                    dashboard.sort_by(column);
                }
            }
            dashboard.change_page(page);
            print_table(&dashboard);
        }
        Commands::Export { filter, out } => {
            apply_filters(&mut dashboard, &filter);
            export(&dashboard, out)?;
        }
        Commands::Options {
            filter,
            dimension,
            search,
        } => {
            apply_filters(&mut dashboard, &filter);
            print_options(&dashboard.view().options, dimension.into(), search.as_deref());
        }
        Commands::Detail { filter } => {
            apply_filters(&mut dashboard, &filter);
            print_detail(&dashboard)?;
        }
        Commands::Interactive => interactive(&loader, dashboard).await?,
        Commands::ClearCache => {}
    }
    Ok(())
}

type Input = Lines<BufReader<Stdin>>;

/// Read a single line of input after printing `prompt`. `None` on EOF.
async fn read_line(input: &mut Input, prompt: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;
    Ok(input.next_line().await?.map(|l| l.trim().to_string()))
}

/// Schedule a chart redraw; a burst of filter changes prints only once.
fn schedule_chart(debouncer: &mut Debouncer, dashboard: &Dashboard) {
    let view = dashboard.view();
    let rendered = format!(
        "{}\n\n{}",
        view.chart_title,
        render_table(&dashboard.chart_rows(&view.chart), view.chart.points.len())
    );
    debouncer.call(async move {
        println!("\n{}", rendered);
    });
}

async fn pick_filter(
    input: &mut Input,
    dashboard: &Dashboard,
    dimension: Dimension,
) -> Result<Option<String>> {
    let options = dashboard.view().options;
    let term = read_line(input, &format!("Search {} (empty = all): ", dimension.label()))
        .await?
        .unwrap_or_default();
    let values = match search_options(options.for_dimension(dimension), &term) {
        OptionSearch::Matches(values) => values,
        OptionSearch::NoResults => {
            println!("Nessun risultato\n");
            return Ok(None);
        }
    };
    println!("[0] Tutti");
    for (i, v) in values.iter().enumerate() {
        println!("[{}] {}", i + 1, v);
    }
    let choice = read_line(input, "Enter choice: ").await?.unwrap_or_default();
    match choice.parse::<usize>() {
        Ok(0) => Ok(Some(String::new())),
        Ok(n) if n <= values.len() => Ok(Some(values[n - 1].to_string())),
        _ => {
            println!("Invalid choice.\n");
            Ok(None)
        }
    }
}

async fn interactive(loader: &DatasetLoader, mut dashboard: Dashboard) -> Result<()> {
    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();
    let mut debouncer = Debouncer::new(CHART_DEBOUNCE);

    loop {
        println!("Select an option:");
        println!("[1] Summary");
        println!("[2] Filter by region");
        println!("[3] Filter by province");
        println!("[4] Filter by municipality");
        println!("[5] Filter by call");
        println!("[6] Reset filters");
        println!("[7] Chart mode (dynamic / comuni / avvisi)");
        println!("[8] Table (n = next page, p = previous, s <column> = sort)");
        println!("[9] Export CSV");
        println!("[r] Reload data");
        println!("[q] Quit\n");
        let Some(choice) = read_line(&mut input, "Enter choice: ").await? else {
            break;
        };
        match choice.as_str() {
            "1" => print_summary(&dashboard),
            "2" | "3" | "4" | "5" => {
                let dimension = match choice.as_str() {
                    "2" => Dimension::Region,
                    "3" => Dimension::Province,
                    "4" => Dimension::Municipality,
                    _ => Dimension::Call,
                };
                if let Some(value) = pick_filter(&mut input, &dashboard, dimension).await? {
                    let change = match dimension {
                        Dimension::Region => FilterChange::Region(value),
                        Dimension::Province => FilterChange::Province(value),
                        Dimension::Municipality => FilterChange::Municipality(value),
                        Dimension::Call => FilterChange::Call(value),
                    };
                    dashboard.apply(change);
                    print_summary(&dashboard);
                    schedule_chart(&mut debouncer, &dashboard);
                }
            }
            "6" => {
                dashboard.apply(FilterChange::Reset);
                print_summary(&dashboard);
                schedule_chart(&mut debouncer, &dashboard);
            }
            "7" => {
                let mode = read_line(&mut input, "Mode: ").await?.unwrap_or_default();
                let mode = match mode.as_str() {
                    "comuni" => ChartMode::ByMunicipality,
                    "avvisi" => ChartMode::ByCall,
                    _ => ChartMode::Dynamic,
                };
                dashboard.set_chart_mode(mode);
                schedule_chart(&mut debouncer, &dashboard);
            }
            "8" => {
                print_table(&dashboard);
                let cmd = read_line(&mut input, "Table: ").await?.unwrap_or_default();
                let current = dashboard.table_page().page;
                match cmd.split_once(' ') {
                    Some(("s", column)) => match SortColumn::parse(column) {
                        Some(column) => {
                            dashboard.sort_by(column);
                        }
                        None => println!("Unknown column {column:?}.\n"),
                    },
                    _ if cmd == "n" => {
                        dashboard.change_page(current + 1);
                    }
                    _ if cmd == "p" => {
                        dashboard.change_page(current.saturating_sub(1));
                    }
                    _ => {}
                }
                print_table(&dashboard);
            }
            "9" => export(&dashboard, None)?,
            "r" => match loader.load().await {
                Ok(loaded) => {
                    dashboard.replace_dataset(loaded.dataset);
                    print_summary(&dashboard);
                }
                Err(e) => eprintln!("Failed to reload: {:#}\n", anyhow::Error::from(e)),
            },
            "q" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice.\n"),
        }
    }
    Ok(())
}
