// Entry point and high-level CLI flow.
//
// - Load the export once and print a short load report.
// - Build the sectioned breakdown for the chosen dates and print it.
// - Optionally write the xlsx/JSON/CSV exports.
// - In interactive mode, keep asking for a new labor rate and re-price the
//   same report without reading or aggregating the file again.
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wo_cost_report::aggregate::available_dates;
use wo_cost_report::loader::load_table;
use wo_cost_report::output;
use wo_cost_report::util::parse_date_permissive;
use wo_cost_report::{
    AppConfig, CanonicalField, DateSelection, GroupBy, Rate, ReportPayload, ReportPipeline,
    ReportRequest,
};

#[derive(Parser)]
#[command(name = "wo-cost-report")]
#[command(author, version, about = "Work order labor cost breakdown", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Time-on-work-order export (.xlsx, .xls, .ods or .csv)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Labor rate per hour
    #[arg(short, long, env = "WO_COST_LABOR_RATE")]
    rate: Option<f64>,

    /// Production date to include; repeat for several. Omit for all data
    #[arg(short, long = "date", value_name = "DATE", value_parser = parse_date_arg)]
    dates: Vec<NaiveDate>,

    /// Section the report by a field: auto, none, or a field name
    #[arg(short, long, value_parser = parse_group_by)]
    group_by: Option<GroupBy>,

    /// Field used for the per-section breakdown (default Type)
    #[arg(long, value_parser = parse_field)]
    breakdown_by: Option<CanonicalField>,

    /// Zero-indexed worksheet to read
    #[arg(long)]
    sheet: Option<usize>,

    /// Fail when this field has no column; repeatable
    #[arg(long = "require", value_name = "FIELD", value_parser = parse_field)]
    required: Vec<CanonicalField>,

    /// Print the production dates found in the file and exit
    #[arg(long)]
    list_dates: bool,

    /// Write the breakdown workbook (.xlsx)
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Write the whole report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the full detail table as CSV
    #[arg(long)]
    detail_csv: Option<PathBuf>,

    /// Write the breakdown rows as CSV
    #[arg(long)]
    breakdown_csv: Option<PathBuf>,

    /// Prompt for new labor rates after printing the report
    #[arg(short, long)]
    interactive: bool,
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date_permissive(s).ok_or_else(|| format!("'{}' is not a date", s))
}

fn parse_group_by(s: &str) -> Result<GroupBy, String> {
    s.parse().map_err(|e: wo_cost_report::ReportError| e.to_string())
}

fn parse_field(s: &str) -> Result<CanonicalField, String> {
    s.parse().map_err(|e: wo_cost_report::ReportError| e.to_string())
}

/// Read a single line after printing `prompt`. `None` on EOF.
fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask for a new rate until a valid one (or nothing) is entered.
///
/// Returns `None` when the user leaves the prompt empty.
fn prompt_rate() -> Option<Rate> {
    loop {
        let input = read_line("New labor rate (blank to exit): ")?;
        if input.is_empty() {
            return None;
        }
        match input.trim_start_matches('$').parse::<f64>() {
            Ok(v) => match Rate::new(v) {
                Ok(rate) => return Some(rate),
                Err(e) => println!("{}", e),
            },
            Err(_) => println!("Invalid rate. Please enter a number like 75.00."),
        }
    }
}

fn write_exports(cli: &Cli, payload: &ReportPayload, currency: &str) -> Result<()> {
    if let Some(path) = &cli.export {
        output::write_breakdown_xlsx(path, payload, currency)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("(Breakdown exported to {})", path.display());
    }
    if let Some(path) = &cli.json {
        output::write_json(path, payload).with_context(|| format!("writing {}", path.display()))?;
        println!("(Report JSON written to {})", path.display());
    }
    if let Some(path) = &cli.detail_csv {
        output::write_detail_csv(path, &payload.full_detail)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("(Detail table exported to {})", path.display());
    }
    if let Some(path) = &cli.breakdown_csv {
        output::write_csv(path, &output::breakdown_rows(payload, currency))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("(Breakdown rows exported to {})", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let mut cfg = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(sheet) = cli.sheet {
        cfg.sheet = sheet;
    }
    if let Some(group_by) = cli.group_by {
        cfg.group_by = group_by;
    }
    if let Some(field) = cli.breakdown_by {
        cfg.breakdown_by = field;
    }
    cfg.required_fields.extend(cli.required.iter().copied());
    let rate = Rate::new(cli.rate.unwrap_or(cfg.labor_rate))?;

    let pipeline = ReportPipeline::from_config(&cfg);
    let table = load_table(&cli.file, cfg.sheet)
        .with_context(|| format!("Error reading file {}", cli.file.display()))?;
    let normalized = pipeline.prepare(&table)?;
    println!("{}", output::render_stats(&normalized.stats));

    if cli.list_dates {
        print!("{}", output::render_dates(&available_dates(&normalized.rows)));
        return Ok(());
    }

    let request = ReportRequest {
        rate,
        dates: if cli.dates.is_empty() {
            DateSelection::All
        } else {
            DateSelection::only(cli.dates.iter().copied())
        },
        group_by: cfg.group_by,
        breakdown_by: cfg.breakdown_by,
    };
    let mut payload = pipeline.report(&normalized, &request);
    print!("{}", output::render_report(&payload, &cfg.currency));
    write_exports(&cli, &payload, &cfg.currency)?;

    if cli.interactive {
        while let Some(new_rate) = prompt_rate() {
            info!(rate = new_rate.value(), "re-pricing report");
            payload = payload.reprice(new_rate);
            println!();
            print!("{}", output::render_report(&payload, &cfg.currency));
            write_exports(&cli, &payload, &cfg.currency)?;
        }
        println!("Exiting the program.");
    }

    Ok(())
}
