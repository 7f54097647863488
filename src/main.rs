// Entry point and high-level CLI flow.
//
// - Without a subcommand the binary runs an interactive menu: option [1]
//   loads and cleans a sheet, option [2] walks through the selectors and
//   prints the dashboard, option [3] forgets the loaded data.
// - `report` prints one dashboard for a file and a set of filters, which is
//   handy for scripts.
// - `layouts` lists the column layouts that can be used.
mod dashboard;
mod error;
mod filter;
mod kpi;
mod layout;
mod loader;
mod output;
mod session;
mod settings;
mod types;
mod util;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use dashboard::DashboardView;
use filter::FilterSelection;
use layout::Layout;
use session::Session;
use settings::{AppConfig, DEFAULT_CONFIG_FILE};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Revenue, cost and margin KPIs for service sheets", long_about = None)]
struct Cli {
    /// Configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Column layout to read the sheet with (overrides the configuration).
    #[arg(long, global = true)]
    layout: Option<String>,

    /// How many lines the revenue and margin rankings keep.
    #[arg(long, global = true)]
    top_n: Option<usize>,

    /// Load this file before showing the interactive menu.
    #[arg(long, short)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (the default).
    Menu {
        /// Load this file before showing the menu.
        #[arg(long, short)]
        file: Option<PathBuf>,
    },
    /// Print the dashboard once.
    Report(ReportArgs),
    /// List the available column layouts.
    Layouts,
}

#[derive(Args)]
struct ReportArgs {
    /// Spreadsheet (.xlsx, .xls, .ods) or .csv file.
    #[arg(long, short)]
    file: PathBuf,

    /// Keep only rows where FIELD equals VALUE. Repeatable.
    #[arg(long = "filter", value_name = "FIELD=VALUE", value_parser = parse_filter)]
    filters: Vec<(String, String)>,

    /// First day of the date range (YYYY-MM-DD), inclusive.
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day of the date range (YYYY-MM-DD), inclusive.
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Also write the KPI lines (CSV) and the summary (JSON).
    #[arg(long)]
    export: bool,

    /// Maximum rows printed per ranking table.
    #[arg(long, default_value_t = 15)]
    rows: usize,
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{s}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{s}'"));
    }
    Ok((field.to_string(), value.trim().to_string()))
}

/// Settings resolved once at startup and shared by every handler.
struct AppContext {
    config: AppConfig,
    layout: Layout,
}

/// Read a single line after printing `prompt`. `None` on end of input.
fn prompt_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask the user whether to go back to the menu after a dashboard.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        let Some(resp) = prompt_line("Back to Menu (Y/N): ") else {
            return false;
        };
        match resp.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: load and clean a file into the session.
fn handle_load(ctx: &AppContext, session: &mut Session, path: &Path) {
    match session.load(path, &ctx.layout) {
        Ok(report) => output::print_load_report(report),
        Err(e) => {
            error!(path = %path.display(), error = %e, "load failed");
            eprintln!("Failed to load file: {}\n", e);
        }
    }
}

/// Let the user pick a value for every selector, outermost first.
fn prompt_selection(session: &Session) -> Option<FilterSelection> {
    let dataset = session.dataset().ok()?;
    let layout = &dataset.layout;
    let mut selection = FilterSelection::default();

    for (level, field) in layout.filters.iter().enumerate() {
        let options = dashboard::selector_options(dataset, &selection, level);
        println!("Select {}:", field);
        for (idx, opt) in options.iter().enumerate() {
            println!("[{}] {}", idx, opt);
        }
        loop {
            let input = prompt_line("Enter choice: ")?;
            let picked = if input.is_empty() {
                Some(0)
            } else {
                input.parse::<usize>().ok()
            };
            match picked.and_then(|i| options.get(i)) {
                Some(value) => {
                    selection.select(field, value);
                    break;
                }
                None => println!("Invalid choice. Enter a number from the list."),
            }
        }
        println!();
    }

    if layout.date_column().is_some() {
        if let Some((lo, hi)) = filter::date_bounds(&dataset.records, layout) {
            println!("Dates in the data range from {} to {}.", lo, hi);
        }
        let from = prompt_date("From date (YYYY-MM-DD, blank for none): ")?;
        let to = prompt_date("To date (YYYY-MM-DD, blank for none): ")?;
        selection = selection.with_dates(from, to);
        println!();
    }
    Some(selection)
}

fn prompt_date(prompt: &str) -> Option<Option<NaiveDate>> {
    loop {
        let input = prompt_line(prompt)?;
        if input.is_empty() {
            return Some(None);
        }
        match util::parse_date_safe(Some(&input)) {
            Some(d) => return Some(Some(d)),
            None => println!("Invalid date '{}'.", input),
        }
    }
}

/// Handle option [2]: selectors, then the dashboard and its exports.
fn handle_dashboard(ctx: &AppContext, session: &Session) {
    if let Err(e) = session.dataset().and_then(|_| session.source()) {
        println!("Error: {} (option 1).\n", e);
        return;
    }
    let Some(selection) = prompt_selection(session) else {
        return;
    };
    match dashboard::from_session(session, &selection, ctx.config.top_n) {
        Ok(view) => {
            output::print_dashboard(&view, ctx.config.top_n);
            if let Err(e) = export(ctx, session, &view) {
                eprintln!("Write error: {:#}", e);
            }
        }
        Err(e) => println!("Error: {}\n", e),
    }
}

fn export(ctx: &AppContext, session: &Session, view: &DashboardView) -> Result<()> {
    let dataset = session.dataset()?;
    let source = session.source().ok().map(|p| p.display().to_string());
    let out = &ctx.config.output;

    output::write_csv(&out.kpi_csv, &output::kpi_rows(&view.report.lines))
        .with_context(|| format!("failed to write {}", out.kpi_csv.display()))?;
    output::write_json(&out.summary_json, &view.summary(dataset, source))
        .with_context(|| format!("failed to write {}", out.summary_json.display()))?;
    info!(
        csv = %out.kpi_csv.display(),
        json = %out.summary_json.display(),
        "exported dashboard"
    );
    println!(
        "(KPI lines exported to {}, summary to {})\n",
        out.kpi_csv.display(),
        out.summary_json.display()
    );
    Ok(())
}

fn run_menu(ctx: &AppContext, preload: Option<PathBuf>) {
    let mut session = Session::new();
    if let Some(path) = preload {
        handle_load(ctx, &mut session, &path);
    }
    loop {
        println!(
            "Select an option ({} layout, {}):",
            ctx.layout.name,
            if session.is_loaded() { "data loaded" } else { "no data" }
        );
        println!("[1] Load the file");
        println!("[2] Dashboard");
        println!("[3] Reset session\n");
        let Some(choice) = prompt_line("Enter choice: ") else {
            println!("Exiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => {
                let Some(path) = prompt_line("Enter file path: ") else {
                    break;
                };
                if path.is_empty() {
                    println!("No file given.\n");
                    continue;
                }
                handle_load(ctx, &mut session, Path::new(&path));
            }
            "2" => {
                println!();
                handle_dashboard(ctx, &session);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => {
                session.reset();
                println!("Session cleared.\n");
            }
            _ => println!("Invalid choice. Please enter 1, 2 or 3.\n"),
        }
    }
}

/// Turn `--filter`/`--from`/`--to` into a selection. Only mapped text
/// columns can be filtered on.
fn report_selection(layout: &Layout, args: &ReportArgs) -> Result<FilterSelection> {
    let mut selection = FilterSelection::default().with_dates(args.from, args.to);
    for (field, value) in &args.filters {
        if !layout.has_column(field) {
            return Err(anyhow!(
                "'{}' is not a column of the {} layout",
                field,
                layout.name
            ));
        }
        if !layout.is_text_column(field) {
            return Err(anyhow!(
                "'{}' is a numeric column and cannot be used as a filter",
                field
            ));
        }
        selection = selection.with(field, value);
    }
    Ok(selection)
}

fn run_report(ctx: &AppContext, args: ReportArgs) -> Result<()> {
    let loaded = loader::load_and_clean(&args.file, &ctx.layout)
        .with_context(|| format!("failed to load {}", args.file.display()))?;
    output::print_load_report(&loaded.report);
    let mut session = Session::new();
    session.install(args.file.clone(), loaded);

    let dataset = session.dataset()?;
    let selection = report_selection(&dataset.layout, &args)?;
    if (args.from.is_some() || args.to.is_some()) && dataset.layout.date_column().is_none() {
        println!(
            "Warning: the {} layout has no date filter; --from/--to ignored.\n",
            dataset.layout.name
        );
    }

    let view = dashboard::from_session(&session, &selection, ctx.config.top_n)?;
    output::print_dashboard(&view, args.rows);
    if args.export {
        export(ctx, &session, &view)?;
    }
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut app_config = settings::load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    if let Some(name) = cli.layout {
        app_config.layout = name;
    }
    if let Some(n) = cli.top_n {
        app_config.top_n = n;
    }
    app_config.validate()?;
    init_tracing(&app_config.log_level);

    let layout = app_config.active_layout()?;
    info!(layout = %layout.name, top_n = app_config.top_n, "starting");
    let ctx = AppContext {
        config: app_config,
        layout,
    };

    match cli.command {
        None => run_menu(&ctx, cli.file),
        Some(Commands::Menu { file }) => run_menu(&ctx, file.or(cli.file)),
        Some(Commands::Report(args)) => run_report(&ctx, args)?,
        Some(Commands::Layouts) => {
            for name in ctx.config.layout_names() {
                let layout = ctx.config.layout_by_name(&name)?;
                let marker = if name == ctx.layout.name { "*" } else { " " };
                println!(
                    "{} {:<12} columns: {}  filters: {}{}",
                    marker,
                    name,
                    layout
                        .columns
                        .iter()
                        .map(|c| format!("{}={}", c.column, c.name))
                        .collect::<Vec<_>>()
                        .join(" "),
                    layout.filters.join(if layout.cascading { " > " } else { ", " }),
                    if layout.date_filter { " + date range" } else { "" }
                );
            }
        }
    }
    Ok(())
}
