// Ingestion boundary: raw text from the command line into typed drafts
//
// Numeric fields are coerced here (negative or garbage becomes 0) so the
// ledger only ever sees non-negative values. Everything else that is
// missing or malformed is reported as a `LedgerError`.

use crate::ledger::{IssueDraft, LedgerError, MaintenanceDraft};
use crate::models::{Priority, ServiceType};
use chrono::NaiveDate;

/// Leading integer of `raw`, or 0 when absent or negative
pub fn coerce_mileage(raw: &str) -> u64 {
    let s = raw.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if negative || end == 0 {
        return 0;
    }
    // Too many digits to fit is not a plausible odometer reading
    digits[..end].parse().unwrap_or(0)
}

/// Leading decimal of `raw`, or 0 when absent, negative or not finite
pub fn coerce_cost(raw: &str) -> f64 {
    let s = raw.trim().trim_start_matches('$');
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '0'..='9' => end = i + 1,
            '.' if !seen_dot => seen_dot = true,
            '-' | '+' if i == 0 => {}
            _ => break,
        }
    }
    match s[..end].parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// `YYYY-MM-DD`
pub fn parse_date(raw: &str) -> Result<NaiveDate, LedgerError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(LedgerError::MissingField("date"));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| LedgerError::InvalidField {
        field: "date",
        reason: format!("{:?}: {}", s, e),
    })
}

pub fn parse_service_type(raw: &str) -> Result<ServiceType, LedgerError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(LedgerError::MissingField("type"));
    }
    ServiceType::parse(s).ok_or_else(|| LedgerError::InvalidField {
        field: "type",
        reason: format!("unknown service type {:?}", s),
    })
}

pub fn parse_priority(raw: &str) -> Result<Priority, LedgerError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(LedgerError::MissingField("priority"));
    }
    Priority::parse(&s.to_lowercase()).ok_or_else(|| LedgerError::InvalidField {
        field: "priority",
        reason: format!("expected low, medium, high or critical, got {:?}", s),
    })
}

pub fn maintenance_draft(
    date: &str,
    service_type: &str,
    mileage: &str,
    notes: &str,
    cost: &str,
) -> Result<MaintenanceDraft, LedgerError> {
    Ok(MaintenanceDraft {
        date: parse_date(date)?,
        service_type: parse_service_type(service_type)?,
        mileage: coerce_mileage(mileage),
        notes: notes.trim().to_string(),
        cost: coerce_cost(cost),
    })
}

pub fn issue_draft(date: &str, description: &str, priority: &str) -> Result<IssueDraft, LedgerError> {
    let date = parse_date(date)?;
    let description = description.trim();
    if description.is_empty() {
        return Err(LedgerError::MissingField("description"));
    }
    Ok(IssueDraft {
        date,
        description: description.to_string(),
        priority: parse_priority(priority)?,
    })
}
