// In-memory record store for one vehicle
//
// The ledger owns vehicle info, maintenance records and issues. Every
// mutation validates first and only then applies, so a rejected call leaves
// the ledger exactly as it was. Timestamps are passed in by the caller.

use crate::filter::TypeFilter;
use crate::models::{Issue, MaintenanceRecord, Priority, ServiceType, Snapshot, VehicleInfo};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Validation failures; the ledger is unchanged when one is returned
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Duplicate id: {0}")]
    DuplicateId(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Input for a new maintenance record
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceDraft {
    pub date: NaiveDate,
    pub service_type: ServiceType,
    pub mileage: u64,
    pub notes: String,
    pub cost: f64,
}

/// Input for creating or editing an issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub date: NaiveDate,
    pub description: String,
    pub priority: Priority,
}

/// Partial update of the vehicle; `None` leaves a field as it is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleUpdate {
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub vin: Option<String>,
    pub mileage: Option<u64>,
}

impl VehicleUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    vehicle: VehicleInfo,
    maintenance: Vec<MaintenanceRecord>,
    issues: Vec<Issue>,
    last_saved: Option<i64>,
    retired: BTreeSet<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from a loaded snapshot
    ///
    /// Rows repeating an earlier id are dropped, and an issue whose resolved
    /// flag and stamp disagree is normalized, so the ledger's invariants hold
    /// even for hand-edited files.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut seen = HashSet::new();
        let maintenance = snapshot
            .maintenance
            .into_iter()
            .filter(|record| {
                let fresh = seen.insert(record.id.clone());
                if !fresh {
                    warn!(id = %record.id, "Dropping maintenance record with duplicate id");
                }
                fresh
            })
            .collect();

        let mut seen = HashSet::new();
        let issues = snapshot
            .issues
            .into_iter()
            .filter(|issue| {
                let fresh = seen.insert(issue.id.clone());
                if !fresh {
                    warn!(id = %issue.id, "Dropping issue with duplicate id");
                }
                fresh
            })
            .map(|mut issue| {
                match (issue.resolved, issue.resolved_at) {
                    (true, None) => {
                        warn!(id = %issue.id, "Resolved issue without resolution stamp");
                        issue.resolved_at = Some(issue.updated_at.max(issue.created_at));
                    }
                    (false, Some(_)) => issue.resolved_at = None,
                    _ => {}
                }
                issue
            })
            .collect();

        Self {
            vehicle: snapshot.vehicle,
            maintenance,
            issues,
            last_saved: snapshot.last_saved,
            retired: snapshot.retired_ids,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            vehicle: self.vehicle.clone(),
            maintenance: self.maintenance.clone(),
            issues: self.issues.clone(),
            last_saved: self.last_saved,
            retired_ids: self.retired.clone(),
        }
    }

    pub fn vehicle(&self) -> &VehicleInfo {
        &self.vehicle
    }

    pub fn last_saved(&self) -> Option<i64> {
        self.last_saved
    }

    pub fn mark_saved(&mut self, at: i64) {
        self.last_saved = Some(at);
    }

    // ========================================================================
    // Vehicle
    // ========================================================================

    pub fn update_vehicle(&mut self, update: VehicleUpdate) -> Result<()> {
        match update.year {
            Some(year) if year < 1886 => {
                return Err(LedgerError::InvalidField {
                    field: "year",
                    reason: format!("{} is before the first automobile", year),
                });
            }
            _ => {}
        }
        let make = update.make.map(|m| m.trim().to_string());
        if make.as_deref() == Some("") {
            return Err(LedgerError::MissingField("make"));
        }
        let model = update.model.map(|m| m.trim().to_string());
        if model.as_deref() == Some("") {
            return Err(LedgerError::MissingField("model"));
        }

        if let Some(year) = update.year {
            self.vehicle.year = year;
        }
        if let Some(make) = make {
            self.vehicle.make = make;
        }
        if let Some(model) = model {
            self.vehicle.model = model;
        }
        if let Some(vin) = update.vin {
            self.vehicle.vin = vin.trim().to_string();
        }
        if let Some(mileage) = update.mileage {
            self.vehicle.mileage = mileage;
        }

        debug!(mileage = self.vehicle.mileage, "Vehicle updated");
        Ok(())
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Add a maintenance record at the front of the log
    pub fn add_maintenance(&mut self, id: String, draft: MaintenanceDraft, created_at: i64) -> Result<&MaintenanceRecord> {
        Self::validate_new_id(&id, self.maintenance.iter().map(|m| m.id.as_str()), &self.retired)?;
        // Zero is what the input boundary produces for a blank odometer field
        if draft.mileage == 0 {
            return Err(LedgerError::MissingField("mileage"));
        }
        if !draft.cost.is_finite() || draft.cost < 0.0 {
            return Err(LedgerError::InvalidField {
                field: "cost",
                reason: format!("{} is not a non-negative amount", draft.cost),
            });
        }

        let record = MaintenanceRecord {
            id,
            date: draft.date,
            service_type: draft.service_type,
            mileage: draft.mileage,
            notes: draft.notes.trim().to_string(),
            cost: draft.cost,
            created_at,
        };
        debug!(id = %record.id, service_type = record.service_type.as_str(), "Maintenance record added");

        self.maintenance.insert(0, record);
        Ok(&self.maintenance[0])
    }

    /// Remove a record; `None` when no record has that id
    ///
    /// The id is retired and will not be accepted again.
    pub fn delete_maintenance(&mut self, id: &str) -> Option<MaintenanceRecord> {
        let pos = self.maintenance.iter().position(|m| m.id == id)?;
        self.retired.insert(id.to_string());
        Some(self.maintenance.remove(pos))
    }

    pub fn all_maintenance(&self) -> &[MaintenanceRecord] {
        &self.maintenance
    }

    /// Records matching the filter, in log order
    pub fn maintenance(&self, filter: TypeFilter) -> Vec<&MaintenanceRecord> {
        self.maintenance
            .iter()
            .filter(|m| filter.matches(m.service_type))
            .collect()
    }

    // ========================================================================
    // Issues
    // ========================================================================

    /// Open a new issue at the front of the list
    pub fn add_issue(&mut self, id: String, draft: IssueDraft, created_at: i64) -> Result<&Issue> {
        Self::validate_new_id(&id, self.issues.iter().map(|i| i.id.as_str()), &self.retired)?;
        let description = Self::required_description(&draft.description)?;

        let issue = Issue {
            id,
            date: draft.date,
            description,
            priority: draft.priority,
            resolved: false,
            resolved_at: None,
            last_modified: None,
            created_at,
            updated_at: created_at,
        };
        debug!(id = %issue.id, priority = issue.priority.as_str(), "Issue opened");

        self.issues.insert(0, issue);
        Ok(&self.issues[0])
    }

    pub fn issue(&self, id: &str) -> Option<&Issue> {
        self.issues.iter().find(|i| i.id == id)
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Replace date, description and priority; `Ok(None)` when the id is unknown
    pub fn edit_issue(&mut self, id: &str, draft: IssueDraft, at: i64) -> Result<Option<&Issue>> {
        let Some(pos) = self.issues.iter().position(|i| i.id == id) else {
            return Ok(None);
        };
        let description = Self::required_description(&draft.description)?;

        let issue = &mut self.issues[pos];
        issue.date = draft.date;
        issue.description = description;
        issue.priority = draft.priority;
        issue.last_modified = Some(at);
        issue.updated_at = at.max(issue.updated_at.saturating_add(1));

        debug!(id, "Issue edited");
        Ok(Some(&self.issues[pos]))
    }

    /// Flip between open and resolved; `None` when the id is unknown
    pub fn toggle_issue(&mut self, id: &str, at: i64) -> Option<&Issue> {
        let issue = self.issues.iter_mut().find(|i| i.id == id)?;

        issue.resolved = !issue.resolved;
        issue.resolved_at = issue.resolved.then_some(at);
        issue.updated_at = at.max(issue.updated_at.saturating_add(1));

        debug!(id, resolved = issue.resolved, "Issue toggled");
        Some(issue)
    }

    pub fn delete_issue(&mut self, id: &str) -> Option<Issue> {
        let pos = self.issues.iter().position(|i| i.id == id)?;
        self.retired.insert(id.to_string());
        Some(self.issues.remove(pos))
    }

    pub fn active_issues(&self) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.is_open()).collect()
    }

    pub fn resolved_issues(&self) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.resolved).collect()
    }

    // ========================================================================
    // Validation
    // ========================================================================

    // Ids stay unique for the life of the store, deleted ones included
    fn validate_new_id<'a>(
        id: &str,
        mut existing: impl Iterator<Item = &'a str>,
        retired: &BTreeSet<String>,
    ) -> Result<()> {
        if id.trim().is_empty() {
            return Err(LedgerError::MissingField("id"));
        }
        if retired.contains(id) || existing.any(|other| other == id) {
            return Err(LedgerError::DuplicateId(id.to_string()));
        }
        Ok(())
    }

    fn required_description(raw: &str) -> Result<String> {
        let description = raw.trim();
        if description.is_empty() {
            return Err(LedgerError::MissingField("description"));
        }
        Ok(description.to_string())
    }
}
