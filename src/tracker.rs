// Tracker - the ledger plus a persistence backend
//
// Every successful mutation is followed by a full save. A failed save is
// returned to the caller; the in-memory change is kept and not retried.

use crate::filter::TypeFilter;
use crate::ledger::{IssueDraft, Ledger, MaintenanceDraft, VehicleUpdate};
use crate::models::{Issue, MaintenanceRecord, now_ms};
use crate::persist::Persistence;
use crate::schedule::{IntervalTable, Schedule};
use eyre::{Context, Result};
use tracing::{debug, info, warn};

/// Everything the CLI renders in one pass
#[derive(Debug)]
pub struct View<'a> {
    pub maintenance: Vec<&'a MaintenanceRecord>,
    pub active_issues: Vec<&'a Issue>,
    pub resolved_issues: Vec<&'a Issue>,
    pub schedule: Schedule,
}

pub struct Tracker<P: Persistence> {
    ledger: Ledger,
    persistence: P,
    intervals: IntervalTable,
}

impl<P: Persistence> Tracker<P> {
    /// Load saved state, falling back to defaults when loading fails
    pub fn open(mut persistence: P, intervals: IntervalTable) -> Self {
        let ledger = match persistence.load() {
            Ok(Some(snapshot)) => {
                info!(
                    maintenance = snapshot.maintenance.len(),
                    issues = snapshot.issues.len(),
                    "Loaded saved state"
                );
                Ledger::from_snapshot(snapshot)
            }
            Ok(None) => {
                debug!("No saved state, starting fresh");
                Ledger::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load saved state, starting from defaults");
                Ledger::new()
            }
        };

        Self {
            ledger,
            persistence,
            intervals,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut P {
        &mut self.persistence
    }

    pub fn intervals(&self) -> &IntervalTable {
        &self.intervals
    }

    fn persist(&mut self) -> Result<()> {
        let at = now_ms();
        let mut snapshot = self.ledger.snapshot();
        snapshot.last_saved = Some(at);

        self.persistence.save(&snapshot).context("Failed to save changes")?;
        self.ledger.mark_saved(at);
        Ok(())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn update_vehicle(&mut self, update: VehicleUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        self.ledger.update_vehicle(update)?;
        self.persist()
    }

    pub fn add_maintenance(&mut self, draft: MaintenanceDraft) -> Result<MaintenanceRecord> {
        let id = uuid::Uuid::now_v7().to_string();
        let record = self.ledger.add_maintenance(id, draft, now_ms())?.clone();
        self.persist()?;
        Ok(record)
    }

    /// `false` when no record has that id; nothing is saved then
    pub fn delete_maintenance(&mut self, id: &str) -> Result<bool> {
        if self.ledger.delete_maintenance(id).is_none() {
            debug!(id, "No maintenance record to delete");
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn add_issue(&mut self, draft: IssueDraft) -> Result<Issue> {
        let id = uuid::Uuid::now_v7().to_string();
        let issue = self.ledger.add_issue(id, draft, now_ms())?.clone();
        self.persist()?;
        Ok(issue)
    }

    pub fn edit_issue(&mut self, id: &str, draft: IssueDraft) -> Result<Option<Issue>> {
        let Some(issue) = self.ledger.edit_issue(id, draft, now_ms())?.cloned() else {
            return Ok(None);
        };
        self.persist()?;
        Ok(Some(issue))
    }

    pub fn toggle_issue(&mut self, id: &str) -> Result<Option<Issue>> {
        let Some(issue) = self.ledger.toggle_issue(id, now_ms()).cloned() else {
            return Ok(None);
        };
        self.persist()?;
        Ok(Some(issue))
    }

    pub fn delete_issue(&mut self, id: &str) -> Result<bool> {
        if self.ledger.delete_issue(id).is_none() {
            debug!(id, "No issue to delete");
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    pub fn schedule(&self) -> Schedule {
        Schedule::compute(
            self.ledger.all_maintenance(),
            self.ledger.vehicle().mileage,
            &self.intervals,
        )
    }

    pub fn view(&self, filter: TypeFilter) -> View<'_> {
        View {
            maintenance: self.ledger.maintenance(filter),
            active_issues: self.ledger.active_issues(),
            resolved_issues: self.ledger.resolved_issues(),
            schedule: self.schedule(),
        }
    }
}
