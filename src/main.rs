use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::{ColoredString, Colorize};
use eyre::{Context, Result, eyre};
use maintlog::export;
use maintlog::input;
use maintlog::text::{short_date, stamp_date, thousands};
use maintlog::{
    Config, DueState, Issue, IssueDraft, IssueQuery, MaintenanceQuery, MaintenanceRecord, Priority, Schedule, Store,
    Tracker, TypeFilter, VehicleUpdate,
};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maintlog")]
#[command(about = "Maintenance log, issue tracker and service schedule for one vehicle")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Directory holding the .maintlog store (default: config store_dir, else current directory)
    #[arg(short, long, global = true)]
    store_path: Option<PathBuf>,

    /// Config file (default: <config dir>/maintlog/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or update the vehicle
    Vehicle {
        #[command(subcommand)]
        action: VehicleCommand,
    },

    /// Maintenance log
    Log {
        #[command(subcommand)]
        action: LogCommand,
    },

    /// Issue tracker
    Issue {
        #[command(subcommand)]
        action: IssueCommand,
    },

    /// Due status of oil change, valve adjustment, tune-up and brakes
    Schedule {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Vehicle, schedule, maintenance log and issues in one page
    Status {
        /// Only show maintenance of this type ("all" or e.g. "oil-change")
        #[arg(short = 't', long = "type", default_value = "all")]
        filter: TypeFilter,
    },

    /// Export issues
    Export {
        #[arg(value_enum)]
        format: ExportFormat,

        /// Write to this file instead of stdout (csv defaults to a dated file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rebuild the SQLite cache from the JSONL files
    Sync,
}

#[derive(Subcommand)]
enum VehicleCommand {
    Show,
    Update {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        make: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        vin: Option<String>,
        /// Current odometer reading
        #[arg(long)]
        mileage: Option<String>,
    },
}

#[derive(Subcommand)]
enum LogCommand {
    /// Record a completed service
    Add {
        /// YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(short = 't', long = "type")]
        service_type: String,
        #[arg(short, long)]
        mileage: String,
        #[arg(short, long, default_value = "")]
        notes: String,
        #[arg(long, default_value = "")]
        cost: String,
    },
    List {
        #[arg(short = 't', long = "type", default_value = "all")]
        filter: TypeFilter,
        /// Types whose name contains this text, e.g. "brake"
        #[arg(long)]
        matching: Option<String>,
        #[arg(long)]
        exclude_type: Option<String>,
        /// Odometer at or above
        #[arg(long)]
        from: Option<u64>,
        /// Odometer below
        #[arg(long)]
        before: Option<u64>,
    },
    Rm {
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args)]
struct IssueFields {
    /// YYYY-MM-DD (default: today, or unchanged when editing)
    #[arg(long)]
    date: Option<String>,
    #[arg(short, long)]
    description: Option<String>,
    /// low, medium, high or critical
    #[arg(short, long)]
    priority: Option<String>,
}

#[derive(Subcommand)]
enum IssueCommand {
    Add {
        #[command(flatten)]
        fields: IssueFields,
    },
    List {
        /// Exact priority
        #[arg(short, long)]
        priority: Option<String>,
        /// Higher than this priority
        #[arg(long, conflicts_with = "priority")]
        above: Option<String>,
        /// This priority or higher
        #[arg(long, conflicts_with = "priority")]
        at_least: Option<String>,
        /// This priority or lower
        #[arg(long, conflicts_with = "priority")]
        at_most: Option<String>,
        #[arg(long, conflicts_with = "resolved")]
        open: bool,
        #[arg(long)]
        resolved: bool,
    },
    Edit {
        id: String,
        #[command(flatten)]
        fields: IssueFields,
    },
    /// Resolve an open issue or reopen a resolved one
    Toggle { id: String },
    Rm {
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Report,
    Email,
    Csv,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::resolve(cli.config.as_deref())?;
    let store_path = match cli.store_path {
        Some(path) => path,
        None => config.store_dir(Path::new(".")),
    };
    debug!(store_path = ?store_path, "Opening store");

    let store = Store::open(&store_path)?;
    let mut tracker = Tracker::open(store, config.interval_table());
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Vehicle { action } => match action {
            VehicleCommand::Show => print_vehicle(&tracker),
            VehicleCommand::Update {
                year,
                make,
                model,
                vin,
                mileage,
            } => {
                let update = VehicleUpdate {
                    year,
                    make,
                    model,
                    vin,
                    mileage: mileage.as_deref().map(input::coerce_mileage),
                };
                if update.is_empty() {
                    return Err(eyre!("Nothing to update"));
                }
                tracker.update_vehicle(update)?;
                println!("{}", "Vehicle updated".green());
                print_vehicle(&tracker);
            }
        },

        Commands::Log { action } => match action {
            LogCommand::Add {
                date,
                service_type,
                mileage,
                notes,
                cost,
            } => {
                let date = date.unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
                let draft = input::maintenance_draft(&date, &service_type, &mileage, &notes, &cost)?;
                let record = tracker.add_maintenance(draft)?;
                println!("{} {}", "Added".green(), record.id.dimmed());
                print_maintenance(&[&record]);
            }
            LogCommand::List {
                filter,
                matching,
                exclude_type,
                from,
                before,
            } => {
                let query = MaintenanceQuery {
                    service_type: filter,
                    type_matching: matching,
                    exclude_type: exclude_type.as_deref().map(input::parse_service_type).transpose()?,
                    from_mileage: from,
                    before_mileage: before,
                };
                let records: Vec<MaintenanceRecord> = tracker.persistence().list(&query.filters())?;
                print_maintenance(&records.iter().collect::<Vec<_>>());
            }
            LogCommand::Rm { id, yes } => {
                let Some(record) = tracker.ledger().all_maintenance().iter().find(|m| m.id == id) else {
                    return Err(eyre!("No maintenance record with id {}", id));
                };
                let prompt = format!(
                    "Delete {} on {} at {} miles?",
                    record.service_type,
                    short_date(record.date),
                    thousands(record.mileage)
                );
                if yes || confirm(&prompt)? {
                    tracker.delete_maintenance(&id)?;
                    println!("{}", "Deleted".green());
                }
            }
        },

        Commands::Issue { action } => match action {
            IssueCommand::Add { fields } => {
                let date = fields.date.unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
                let description = fields.description.unwrap_or_default();
                let priority = fields.priority.unwrap_or_else(|| Priority::Medium.as_str().to_string());
                let draft = input::issue_draft(&date, &description, &priority)?;
                let issue = tracker.add_issue(draft)?;
                println!("{} {}", "Added".green(), issue.id.dimmed());
                print_issues(&[&issue]);
            }
            IssueCommand::List {
                priority,
                above,
                at_least,
                at_most,
                open,
                resolved,
            } => {
                let parse = |raw: Option<String>| raw.as_deref().map(input::parse_priority).transpose();
                let query = IssueQuery {
                    priority: parse(priority)?,
                    above: parse(above)?,
                    at_least: parse(at_least)?,
                    at_most: parse(at_most)?,
                    resolved: (open || resolved).then_some(resolved),
                };

                let mut issues: Vec<Issue> = tracker.persistence().list(&query.filters())?;
                issues.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
                print_issues(&issues.iter().collect::<Vec<_>>());
            }
            IssueCommand::Edit { id, fields } => {
                let Some(current) = tracker.ledger().issue(&id) else {
                    return Err(eyre!("No issue with id {}", id));
                };
                let draft = IssueDraft {
                    date: match fields.date {
                        Some(raw) => input::parse_date(&raw)?,
                        None => current.date,
                    },
                    description: fields.description.unwrap_or_else(|| current.description.clone()),
                    priority: match fields.priority {
                        Some(raw) => input::parse_priority(&raw)?,
                        None => current.priority,
                    },
                };
                if let Some(issue) = tracker.edit_issue(&id, draft)? {
                    println!("{}", "Issue updated".green());
                    print_issues(&[&issue]);
                }
            }
            IssueCommand::Toggle { id } => match tracker.toggle_issue(&id)? {
                Some(issue) if issue.resolved => println!("{} {}", "Resolved".green(), issue.description),
                Some(issue) => println!("{} {}", "Reopened".yellow(), issue.description),
                None => return Err(eyre!("No issue with id {}", id)),
            },
            IssueCommand::Rm { id, yes } => {
                let Some(issue) = tracker.ledger().issue(&id) else {
                    return Err(eyre!("No issue with id {}", id));
                };
                let prompt = format!("Delete issue \"{}\"?", issue.description);
                if yes || confirm(&prompt)? {
                    tracker.delete_issue(&id)?;
                    println!("{}", "Deleted".green());
                }
            }
        },

        Commands::Schedule { json } => {
            let schedule = tracker.schedule();
            if json {
                println!("{}", serde_json::to_string_pretty(&schedule)?);
            } else {
                print_schedule(&schedule);
            }
        }

        Commands::Status { filter } => {
            print_vehicle(&tracker);
            let view = tracker.view(filter);

            println!();
            print_schedule(&view.schedule);

            println!("\n{}", "Maintenance log".bold());
            print_maintenance(&view.maintenance);

            println!("\n{} ({})", "Active issues".bold(), view.active_issues.len());
            print_issues(&view.active_issues);

            println!("\n{} ({})", "Resolved issues".bold(), view.resolved_issues.len());
            print_issues(&view.resolved_issues);
        }

        Commands::Export { format, output } => {
            let vehicle = tracker.ledger().vehicle();
            let issues = tracker.ledger().issues();

            match format {
                ExportFormat::Report => {
                    let report = export::issues_report(vehicle, issues, &Local::now());
                    write_output(output.as_deref(), &report)?;
                }
                ExportFormat::Email => {
                    let email = export::email_report(vehicle, issues, today);
                    let text = format!(
                        "Subject: {}\n\n{}\n{}\n",
                        email.subject,
                        email.body,
                        email.mailto_link()
                    );
                    write_output(output.as_deref(), &text)?;
                }
                ExportFormat::Csv => {
                    let path = output.unwrap_or_else(|| PathBuf::from(export::csv_file_name(vehicle, today)));
                    fs::write(&path, export::issues_csv(issues, &Local))
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("{} {}", "Wrote".green(), path.display());
                }
            }
        }

        Commands::Sync => {
            println!("Syncing database from JSONL files...");
            tracker.persistence_mut().sync()?;
            println!("Sync complete");
        }
    }

    Ok(())
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "Wrote".green(), path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

// ============================================================================
// Rendering
// ============================================================================

fn styled(state: DueState) -> ColoredString {
    let text = state.to_string();
    match state.class() {
        "overdue" => text.red().bold(),
        "due" => text.yellow(),
        "completed" => text.green(),
        _ => text.dimmed(),
    }
}

fn styled_priority(priority: Priority) -> ColoredString {
    let label = priority.label();
    match priority {
        Priority::Critical => label.red().bold(),
        Priority::High => label.red(),
        Priority::Medium => label.yellow(),
        Priority::Low => label.normal(),
    }
}

fn print_vehicle<P: maintlog::Persistence>(tracker: &Tracker<P>) {
    let vehicle = tracker.ledger().vehicle();
    println!("{}", vehicle.title().bold());
    if !vehicle.vin.is_empty() {
        println!("VIN/Chassis: {}", vehicle.vin);
    }
    println!("Mileage: {}", thousands(vehicle.mileage));
    if let Some(saved) = tracker.ledger().last_saved().and_then(stamp_date) {
        println!("{}", format!("Last saved {}", short_date(saved)).dimmed());
    }
}

fn print_schedule(schedule: &Schedule) {
    for (service, status) in schedule.iter() {
        println!(
            "{:<18} {:<28} next {:<16} {}",
            service.label().bold(),
            status.last_done_text(),
            status.next_due_text(),
            styled(status.state)
        );
    }
    match schedule.attention_count() {
        0 => {}
        n => println!("{}", format!("{} service(s) need attention", n).yellow()),
    }
}

fn print_maintenance(records: &[&MaintenanceRecord]) {
    if records.is_empty() {
        println!("{}", "No maintenance records.".dimmed());
        return;
    }
    for record in records {
        println!(
            "{:<10} {:<18} {:>10} mi  ${:>8.2}  {}",
            short_date(record.date),
            record.service_type.display_name(),
            thousands(record.mileage),
            record.cost,
            record.id.dimmed()
        );
        if !record.notes.is_empty() {
            println!("           {}", record.notes);
        }
    }
}

fn print_issues(issues: &[&Issue]) {
    if issues.is_empty() {
        println!("{}", "No issues.".dimmed());
        return;
    }
    for issue in issues {
        let state = match issue.resolved_at.and_then(stamp_date) {
            Some(on) if issue.resolved => format!("resolved {}", short_date(on)).green(),
            _ if issue.resolved => "resolved".green(),
            _ => "open".yellow(),
        };
        println!(
            "{:<10} {:<8} {:<14} {}  {}",
            short_date(issue.date),
            styled_priority(issue.priority),
            state,
            issue.description,
            issue.id.dimmed()
        );
    }
}
