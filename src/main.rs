use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use training_matrix::{
    config::DEFAULT_CONFIG_FILE, expired_by_training, logging, projection::flat_rows,
    upcoming_expirations, ComplianceTable, ExportFormat, InputSnapshot, Pipeline, RecordFilter,
    Settings, Status, StatusMatrix, StatusSummary,
};

#[derive(Parser)]
#[command(author, version, about = "Training compliance matrix")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Trainings report (overrides the config file)
    #[arg(long)]
    trainings: Option<PathBuf>,

    /// Employee roster (overrides the config file)
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Reference date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Status counts, join report and expiry rankings
    Summary,

    /// Detail list, optionally filtered
    List {
        /// Status filter, repeatable or comma separated (valid, soon_expiring, expired, unknown)
        #[arg(long, value_delimiter = ',', value_parser = parse_status)]
        status: Vec<Status>,

        /// Employee name
        #[arg(long)]
        employee: Option<String>,

        /// Training label
        #[arg(long)]
        training: Option<String>,
    },

    /// Employee × training matrix of status codes
    Matrix,

    /// Write an export file
    Export {
        #[arg(long, value_enum, default_value = "details-csv")]
        format: ExportFormat,

        /// Output path. Defaults to a dated file name; "-" writes to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_status(raw: &str) -> Result<Status, String> {
    Status::from_label(raw).ok_or_else(|| {
        format!("unknown status '{raw}' (expected valid, soon_expiring, expired or unknown)")
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    let mut settings = Settings::load(&cli.config)?;
    if let Some(path) = &cli.trainings {
        settings.sources.trainings_path = path.clone();
    }
    if let Some(path) = &cli.roster {
        settings.sources.roster_path = path.clone();
    }

    // Fatal load errors stop here; the pipeline never runs on partial input
    let snapshot = match InputSnapshot::load(&settings) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(error = %e, "failed to load sources");
            eprintln!("❌ {}", e);
            eprintln!(
                "   Expected trainings at {} and roster at {}",
                settings.sources.trainings_path.display(),
                settings.sources.roster_path.display()
            );
            std::process::exit(1);
        }
    };

    let now: NaiveDateTime = match cli.today {
        Some(date) => date.and_time(chrono::NaiveTime::MIN),
        None => Local::now().naive_local(),
    };

    let pipeline = Pipeline::from_settings(&settings);
    let table = pipeline.run(&snapshot, now);

    match cli.command {
        Command::Summary => print_summary(&table, &settings),
        Command::List {
            status,
            employee,
            training,
        } => {
            let filter = RecordFilter {
                statuses: status,
                employee,
                training,
            };
            print_list(&table, &filter);
        }
        Command::Matrix => print_matrix(&table),
        Command::Export { format, out } => run_export(&table, format, out)?,
    }

    Ok(())
}

fn print_summary(table: &ComplianceTable, settings: &Settings) {
    let summary = StatusSummary::from_table(table);

    println!("📚 Training compliance as of {}", summary.as_of);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("👥 Employees:        {}", summary.roster_size);
    println!("📚 Trainings:        {}", summary.distinct_trainings);
    println!("🔴 Expired:          {}", summary.counts.expired);
    println!("🟡 Soon expiring:    {}", summary.counts.soon_expiring);
    println!("🟢 Valid:            {}", summary.counts.valid);
    println!("⚪ Unknown:          {}", summary.counts.unknown);
    println!();
    println!("🔗 Join: {}", table.join.summary());
    if !table.join.unmatched_names.is_empty() {
        println!("   Unmatched names: {}", table.join.unmatched_names.join(", "));
    }

    let ranking = expired_by_training(table, settings.classification.expired_top_n);
    if !ranking.is_empty() {
        println!();
        println!("Most expired trainings:");
        for entry in ranking {
            println!("   {:>4}  {}", entry.count, entry.training_label);
        }
    }

    let horizon = settings.classification.upcoming_horizon_days;
    let upcoming = upcoming_expirations(table, horizon);
    println!();
    if upcoming.is_empty() {
        println!("No trainings expire in the next {} days", horizon);
    } else {
        println!("Expiring in the next {} days:", horizon);
        for record in upcoming {
            println!(
                "   {}  {:>4}d  {} – {}",
                record
                    .effective_valid_until()
                    .map(|d| d.format("%d.%m.%Y").to_string())
                    .unwrap_or_default(),
                record.remaining_days.unwrap_or_default(),
                record.participant_name(),
                record.training_label()
            );
        }
    }
}

fn print_list(table: &ComplianceTable, filter: &RecordFilter) {
    let rows = flat_rows(filter.apply(table));

    println!(
        "{:<28} {:<32} {:<12} {:<12} {:<14} {:>6}",
        "Employee", "Training", "Completed", "Valid until", "Status", "Days"
    );
    for row in &rows {
        println!(
            "{:<28} {:<32} {:<12} {:<12} {:<14} {:>6}",
            row.participant_name,
            row.training_label,
            format_date(row.completion_date),
            format_date(row.effective_valid_until),
            row.status.label(),
            row.remaining_days.map(|d| d.to_string()).unwrap_or_default()
        );
    }
    println!();
    println!("Showing {} entries", rows.len());
}

fn print_matrix(table: &ComplianceTable) {
    let matrix = StatusMatrix::build(&table.rows);

    let name_width = matrix
        .rows
        .iter()
        .map(|row| row.employee.chars().count())
        .max()
        .unwrap_or(8)
        .max(8);

    print!("{:<width$}", "Employee", width = name_width);
    for (i, _) in matrix.trainings.iter().enumerate() {
        print!(" {:>3}", i + 1);
    }
    println!();

    for row in &matrix.rows {
        print!("{:<width$}", row.employee, width = name_width);
        for cell in &row.cells {
            match cell {
                Some(status) => print!(" {:>3}", status.code()),
                None => print!(" {:>3}", "·"),
            }
        }
        println!();
    }

    println!();
    for (i, training) in matrix.trainings.iter().enumerate() {
        println!("{:>3}  {}", i + 1, training);
    }
    println!("Codes: 1 valid, 2 soon expiring, 3 expired, 0 unknown, · not completed");
}

fn run_export(table: &ComplianceTable, format: ExportFormat, out: Option<PathBuf>) -> Result<()> {
    let content = format.render(table)?;

    match out {
        Some(path) if path.as_os_str() == "-" => {
            print!("{}", content);
        }
        other => {
            let path = other.unwrap_or_else(|| PathBuf::from(format.file_name(table.as_of)));
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Wrote {} rows to {}", table.len(), path.display());
        }
    }

    Ok(())
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_default()
}
