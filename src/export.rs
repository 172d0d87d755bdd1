// Read-only issue exports: printable report, email and CSV

use crate::models::{Issue, VehicleInfo};
use crate::text::{short_date, stamp_date_in, thousands};
use chrono::{DateTime, NaiveDate, TimeZone};
use std::fmt::Write;

const RULE_WIDTH: usize = 80;
const CSV_HEADER: &str = "Date,Description,Priority,Status,Resolved Date";

fn vin_text(vehicle: &VehicleInfo) -> &str {
    if vehicle.vin.is_empty() { "Not specified" } else { &vehicle.vin }
}

fn mileage_text(vehicle: &VehicleInfo) -> String {
    match vehicle.mileage {
        0 => "Not specified".to_string(),
        miles => thousands(miles),
    }
}

// Resolution dates are shown in the same zone as the report itself
fn resolved_text<Tz: TimeZone>(issue: &Issue, tz: &Tz) -> Option<String> {
    issue.resolved_at.and_then(|ms| stamp_date_in(ms, tz)).map(short_date)
}

fn generated_text<Tz: TimeZone>(generated: &DateTime<Tz>) -> String {
    generated.naive_local().format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// Full report with active and resolved issues, for printing
pub fn issues_report<Tz: TimeZone>(vehicle: &VehicleInfo, issues: &[Issue], generated: &DateTime<Tz>) -> String {
    let tz = generated.timezone();
    let active: Vec<&Issue> = issues.iter().filter(|i| i.is_open()).collect();
    let resolved: Vec<&Issue> = issues.iter().filter(|i| i.resolved).collect();
    let rule = "-".repeat(RULE_WIDTH);

    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "{} ISSUES REPORT", vehicle.title().to_uppercase());
    let _ = writeln!(out, "Generated: {}", generated_text(generated));
    let _ = writeln!(out, "VIN/Chassis: {}", vin_text(vehicle));
    let _ = writeln!(out, "Current Mileage: {} miles", mileage_text(vehicle));
    let _ = writeln!(out);

    let _ = writeln!(out, "ACTIVE ISSUES ({})", active.len());
    let _ = writeln!(out, "{}", rule);
    if active.is_empty() {
        let _ = writeln!(out, "No active issues.");
    }
    for (n, issue) in active.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} - PRIORITY: {}",
            n + 1,
            short_date(issue.date),
            issue.priority.as_str().to_uppercase()
        );
        let _ = writeln!(out, "   {}", issue.description);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "RESOLVED ISSUES ({})", resolved.len());
    let _ = writeln!(out, "{}", rule);
    if resolved.is_empty() {
        let _ = writeln!(out, "No resolved issues.");
    }
    for (n, issue) in resolved.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} - RESOLVED: {}",
            n + 1,
            short_date(issue.date),
            resolved_text(issue, &tz).unwrap_or_else(|| "Unknown".to_string())
        );
        let _ = writeln!(out, "   {}", issue.description);
    }

    out
}

/// Email subject and body; the body lists active issues only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailReport {
    pub subject: String,
    pub body: String,
}

impl EmailReport {
    pub fn mailto_link(&self) -> String {
        format!(
            "mailto:?subject={}&body={}",
            urlencoding::encode(&self.subject),
            urlencoding::encode(&self.body)
        )
    }
}

pub fn email_report(vehicle: &VehicleInfo, issues: &[Issue], today: NaiveDate) -> EmailReport {
    let active: Vec<&Issue> = issues.iter().filter(|i| i.is_open()).collect();

    let mut body = String::new();
    let _ = writeln!(body, "{} ISSUES REPORT", vehicle.title().to_uppercase());
    let _ = writeln!(body);
    let _ = writeln!(body, "Generated: {}", short_date(today));
    let _ = writeln!(body, "VIN/Chassis: {}", vin_text(vehicle));
    let _ = writeln!(body, "Current Mileage: {} miles", mileage_text(vehicle));
    let _ = writeln!(body);
    let _ = writeln!(body, "ACTIVE ISSUES ({}):", active.len());
    let _ = writeln!(body);

    if active.is_empty() {
        let _ = writeln!(body, "No active issues.");
    }
    for (n, issue) in active.iter().enumerate() {
        let _ = writeln!(
            body,
            "{}. {} - PRIORITY: {}",
            n + 1,
            short_date(issue.date),
            issue.priority.as_str().to_uppercase()
        );
        let _ = writeln!(body, "   {}", issue.description);
        let _ = writeln!(body);
    }

    EmailReport {
        subject: format!("{} Issues Report", vehicle.title()),
        body,
    }
}

/// One row per issue under a fixed header; resolution dates as seen in `tz`
pub fn issues_csv<Tz: TimeZone>(issues: &[Issue], tz: &Tz) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for issue in issues {
        let _ = writeln!(
            out,
            "{},\"{}\",{},{},{}",
            short_date(issue.date),
            issue.description.replace('"', "\"\""),
            issue.priority.as_str(),
            if issue.resolved { "Resolved" } else { "Active" },
            resolved_text(issue, tz).unwrap_or_default()
        );
    }

    out
}

/// e.g. `volkswagen_beetle_issues_2024-03-10.csv`
pub fn csv_file_name(vehicle: &VehicleInfo, today: NaiveDate) -> String {
    let slug: String = format!("{}_{}", vehicle.make, vehicle.model)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_issues_{}.csv", slug, today.format("%Y-%m-%d"))
}
