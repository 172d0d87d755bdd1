// maintlog - Maintenance log, issue tracker and service schedule for one vehicle

pub mod config;
pub mod export;
pub mod filter;
pub mod input;
pub mod jsonl;
pub mod ledger;
pub mod models;
pub mod persist;
pub mod record;
pub mod schedule;
pub mod store;
pub mod text;
pub mod tracker;

// Re-export main types for convenience
pub use config::Config;
pub use filter::{Filter, FilterOp, IssueQuery, MaintenanceQuery, TypeFilter};
pub use ledger::{IssueDraft, Ledger, LedgerError, MaintenanceDraft, VehicleUpdate};
pub use models::{Issue, MaintenanceRecord, Priority, ServiceType, Snapshot, VehicleInfo, now_ms};
pub use persist::{MemoryPersistence, Persistence};
pub use record::{IndexValue, Record};
pub use schedule::{DueState, IntervalTable, Schedule, ServiceStatus, TrackedService};
pub use store::Store;
pub use tracker::{Tracker, View};
