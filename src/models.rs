// Data models for maintlog

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The vehicle being tracked
///
/// `mileage` is the current odometer reading and the only mileage used when
/// computing the service schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleInfo {
    pub year: i32,
    pub make: String,
    pub model: String,
    pub vin: String,
    pub mileage: u64,
}

impl Default for VehicleInfo {
    fn default() -> Self {
        Self {
            year: 1969,
            make: "Volkswagen".to_string(),
            model: "Beetle".to_string(),
            vin: String::new(),
            mileage: 0,
        }
    }
}

impl VehicleInfo {
    /// "1969 Volkswagen Beetle"
    pub fn title(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

/// Category of a maintenance event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    OilChange,
    ValveAdjustment,
    TuneUp,
    Brakes,
    BrakeInspection,
    Electrical,
    Engine,
    Transmission,
    Suspension,
    Other,
}

impl ServiceType {
    pub const ALL: [Self; 10] = [
        Self::OilChange,
        Self::ValveAdjustment,
        Self::TuneUp,
        Self::Brakes,
        Self::BrakeInspection,
        Self::Electrical,
        Self::Engine,
        Self::Transmission,
        Self::Suspension,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OilChange => "oil-change",
            Self::ValveAdjustment => "valve-adjustment",
            Self::TuneUp => "tune-up",
            Self::Brakes => "brakes",
            Self::BrakeInspection => "brake-inspection",
            Self::Electrical => "electrical",
            Self::Engine => "engine",
            Self::Transmission => "transmission",
            Self::Suspension => "suspension",
            Self::Other => "other",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OilChange => "Oil Change",
            Self::ValveAdjustment => "Valve Adjustment",
            Self::TuneUp => "Tune-Up",
            Self::Brakes => "Brakes",
            Self::BrakeInspection => "Brake Inspection",
            Self::Electrical => "Electrical",
            Self::Engine => "Engine",
            Self::Transmission => "Transmission",
            Self::Suspension => "Suspension",
            Self::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A completed maintenance event. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// Odometer reading at the time of service
    pub mileage: u64,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub cost: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    /// Numeric rank used for range queries against the index
    pub const fn rank(self) -> i64 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A defect or observation that is not tied to a service interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    /// Date the issue was noticed
    pub date: NaiveDate,
    pub description: String,
    pub priority: Priority,
    #[serde(default)]
    pub resolved: bool,
    /// Set exactly when `resolved` is true
    #[serde(default)]
    pub resolved_at: Option<i64>,
    #[serde(default)]
    pub last_modified: Option<i64>,
    pub created_at: i64,
    /// Revision stamp, bumped on every mutation
    #[serde(default)]
    pub updated_at: i64,
}

impl Issue {
    pub fn is_open(&self) -> bool {
        !self.resolved
    }
}

/// Full persisted state of the ledger
///
/// Every field falls back to its default when missing, so partially written
/// or older snapshots merge over the defaults on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub vehicle: VehicleInfo,
    pub maintenance: Vec<MaintenanceRecord>,
    pub issues: Vec<Issue>,
    pub last_saved: Option<i64>,
    /// Ids of deleted records; never handed out again
    pub retired_ids: BTreeSet<String>,
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
