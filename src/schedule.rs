// Service schedule: most-recent selection, interval lookup and due status

use crate::models::{MaintenanceRecord, ServiceType};
use crate::text::{short_date, thousands};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Mileage between services, keyed by service type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTable(BTreeMap<ServiceType, u64>);

impl Default for IntervalTable {
    fn default() -> Self {
        Self::empty()
            .with(ServiceType::OilChange, 3000)
            .with(ServiceType::ValveAdjustment, 6000)
            .with(ServiceType::TuneUp, 12_000)
            .with(ServiceType::BrakeInspection, 12_000)
            .with(ServiceType::Brakes, 12_000)
    }
}

impl IntervalTable {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, service_type: ServiceType, miles: u64) -> Self {
        self.0.insert(service_type, miles);
        self
    }

    pub fn with_overrides(mut self, overrides: &BTreeMap<ServiceType, u64>) -> Self {
        self.0.extend(overrides.iter().map(|(k, v)| (*k, *v)));
        self
    }

    pub fn get(&self, service_type: ServiceType) -> Option<u64> {
        self.0.get(&service_type).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ServiceType, u64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Interval for a record looked up under `lookup`
    ///
    /// The caller's key is tried first, then the record's own type. When both
    /// resolve to different intervals the caller's key wins.
    pub fn resolve(&self, lookup: ServiceType, record_type: ServiceType) -> Option<u64> {
        match (self.get(lookup), self.get(record_type)) {
            (Some(by_key), Some(by_record)) if by_key != by_record => {
                warn!(
                    lookup = lookup.as_str(),
                    record_type = record_type.as_str(),
                    by_key,
                    by_record,
                    "Interval lookup disagrees with record type, using lookup key"
                );
                Some(by_key)
            }
            (Some(by_key), _) => Some(by_key),
            (None, by_record) => by_record,
        }
    }
}

/// The four services shown in the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackedService {
    OilChange,
    ValveAdjustment,
    TuneUp,
    Brakes,
}

impl TrackedService {
    pub const ALL: [Self; 4] = [Self::OilChange, Self::ValveAdjustment, Self::TuneUp, Self::Brakes];

    /// Key used for the interval lookup
    pub const fn service_type(self) -> ServiceType {
        match self {
            Self::OilChange => ServiceType::OilChange,
            Self::ValveAdjustment => ServiceType::ValveAdjustment,
            Self::TuneUp => ServiceType::TuneUp,
            Self::Brakes => ServiceType::Brakes,
        }
    }

    /// Record types that count as this service having been done
    pub const fn accepts(self) -> &'static [ServiceType] {
        match self {
            Self::OilChange => &[ServiceType::OilChange],
            Self::ValveAdjustment => &[ServiceType::ValveAdjustment],
            Self::TuneUp => &[ServiceType::TuneUp],
            Self::Brakes => &[ServiceType::Brakes, ServiceType::BrakeInspection],
        }
    }

    pub const fn label(self) -> &'static str {
        self.service_type().display_name()
    }
}

/// Most recent record of one type: latest date, then latest creation
pub fn select_most_recent(records: &[MaintenanceRecord], service_type: ServiceType) -> Option<&MaintenanceRecord> {
    select_most_recent_of(records, &[service_type])
}

/// Most recent record whose type is any of `types`
pub fn select_most_recent_of<'a>(
    records: &'a [MaintenanceRecord],
    types: &[ServiceType],
) -> Option<&'a MaintenanceRecord> {
    records
        .iter()
        .filter(|r| types.contains(&r.service_type))
        .max_by(|a, b| recency(a, b))
}

// Id is the last resort so the choice never depends on container order
fn recency(a: &MaintenanceRecord, b: &MaintenanceRecord) -> Ordering {
    a.date
        .cmp(&b.date)
        .then(a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum DueState {
    /// No record, or no interval for it
    Unknown,
    Overdue { miles: u64 },
    DueSoon { miles: u64 },
    Ok { miles: u64 },
}

impl DueState {
    /// Short class name for styling
    pub const fn class(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Overdue { .. } => "overdue",
            Self::DueSoon { .. } => "due",
            Self::Ok { .. } => "completed",
        }
    }

    pub const fn needs_attention(self) -> bool {
        matches!(self, Self::Overdue { .. } | Self::DueSoon { .. })
    }
}

impl fmt::Display for DueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Overdue { miles } => write!(f, "Overdue by {} miles", thousands(*miles)),
            Self::DueSoon { miles } => write!(f, "Due soon ({} miles)", thousands(*miles)),
            Self::Ok { miles } => write!(f, "OK ({} miles remaining)", thousands(*miles)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LastDone {
    pub date: NaiveDate,
    pub mileage: u64,
}

/// Due status of one service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub last_done: Option<LastDone>,
    pub next_due_mileage: Option<u64>,
    pub state: DueState,
}

impl ServiceStatus {
    pub fn last_done_text(&self) -> String {
        match self.last_done {
            Some(done) => format!("{} ({} miles)", short_date(done.date), thousands(done.mileage)),
            None => "Not recorded".to_string(),
        }
    }

    pub fn next_due_text(&self) -> String {
        match self.next_due_mileage {
            Some(miles) => format!("{} miles", thousands(miles)),
            None => "Not calculated".to_string(),
        }
    }
}

/// Due status for `record`, looked up under `lookup`
pub fn compute_status(
    record: Option<&MaintenanceRecord>,
    lookup: ServiceType,
    current_mileage: u64,
    intervals: &IntervalTable,
) -> ServiceStatus {
    let Some(record) = record else {
        return ServiceStatus {
            last_done: None,
            next_due_mileage: None,
            state: DueState::Unknown,
        };
    };

    let last_done = Some(LastDone {
        date: record.date,
        mileage: record.mileage,
    });

    let Some(interval) = intervals.resolve(lookup, record.service_type) else {
        return ServiceStatus {
            last_done,
            next_due_mileage: None,
            state: DueState::Unknown,
        };
    };

    let next_due = record.mileage.saturating_add(interval);
    let remaining = i128::from(next_due) - i128::from(current_mileage);

    // remaining < interval / 10, kept in integers
    let state = if remaining < 0 {
        DueState::Overdue {
            miles: remaining.unsigned_abs() as u64,
        }
    } else if remaining * 10 < i128::from(interval) {
        DueState::DueSoon { miles: remaining as u64 }
    } else {
        DueState::Ok { miles: remaining as u64 }
    };

    ServiceStatus {
        last_done,
        next_due_mileage: Some(next_due),
        state,
    }
}

/// Status of every tracked service, derived from scratch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule(BTreeMap<TrackedService, ServiceStatus>);

impl Schedule {
    pub fn compute(records: &[MaintenanceRecord], current_mileage: u64, intervals: &IntervalTable) -> Self {
        let statuses = TrackedService::ALL
            .into_iter()
            .map(|service| {
                let record = select_most_recent_of(records, service.accepts());
                let status = compute_status(record, service.service_type(), current_mileage, intervals);
                (service, status)
            })
            .collect();
        Self(statuses)
    }

    pub fn get(&self, service: TrackedService) -> Option<&ServiceStatus> {
        self.0.get(&service)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackedService, &ServiceStatus)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn attention_count(&self) -> usize {
        self.0.values().filter(|s| s.state.needs_attention()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(id: &str, service_type: ServiceType, mileage: u64, on: NaiveDate, created_at: i64) -> MaintenanceRecord {
        MaintenanceRecord {
            id: id.to_string(),
            date: on,
            service_type,
            mileage,
            notes: String::new(),
            cost: 0.0,
            created_at,
        }
    }

    fn oil_at_10k() -> MaintenanceRecord {
        record("m1", ServiceType::OilChange, 10_000, date(2024, 1, 1), 1)
    }

    fn oil_status(current: u64) -> ServiceStatus {
        let rec = oil_at_10k();
        compute_status(Some(&rec), ServiceType::OilChange, current, &IntervalTable::default())
    }

    #[test]
    fn test_due_soon_within_ten_percent() {
        let status = oil_status(12_900);
        assert_eq!(status.next_due_mileage, Some(13_000));
        assert_eq!(status.state, DueState::DueSoon { miles: 100 });
        assert_eq!(status.state.to_string(), "Due soon (100 miles)");
        assert_eq!(status.state.class(), "due");
    }

    #[test]
    fn test_overdue() {
        let status = oil_status(13_500);
        assert_eq!(status.state, DueState::Overdue { miles: 500 });
        assert_eq!(status.state.to_string(), "Overdue by 500 miles");
        assert_eq!(status.state.class(), "overdue");
    }

    #[test]
    fn test_ok_with_remaining() {
        let status = oil_status(11_000);
        assert_eq!(status.state, DueState::Ok { miles: 2000 });
        assert_eq!(status.state.to_string(), "OK (2,000 miles remaining)");
        assert_eq!(status.state.class(), "completed");
        assert_eq!(status.last_done_text(), "1/1/2024 (10,000 miles)");
        assert_eq!(status.next_due_text(), "13,000 miles");
    }

    #[test]
    fn test_threshold_boundaries() {
        // Exactly at next due: nothing remaining, not yet overdue
        assert_eq!(oil_status(13_000).state, DueState::DueSoon { miles: 0 });
        // One past
        assert_eq!(oil_status(13_001).state, DueState::Overdue { miles: 1 });
        // Exactly 10% remaining is still OK
        assert_eq!(oil_status(12_700).state, DueState::Ok { miles: 300 });
        assert_eq!(oil_status(12_701).state, DueState::DueSoon { miles: 299 });
    }

    #[test]
    fn test_classification_matches_definition_across_inputs() {
        let intervals = [1u64, 7, 10, 3000, 6000, 12_000];
        for interval in intervals {
            let table = IntervalTable::empty().with(ServiceType::TuneUp, interval);
            let rec = record("t", ServiceType::TuneUp, 5000, date(2024, 1, 1), 1);
            let next_due = 5000 + interval;
            for current in (0..=next_due + 20).step_by(((next_due / 50).max(1)) as usize) {
                let status = compute_status(Some(&rec), ServiceType::TuneUp, current, &table);
                let remaining = next_due as i64 - current as i64;
                let overdue = current > next_due;
                let due_soon = remaining >= 0 && (remaining as f64) < 0.10 * interval as f64;
                match status.state {
                    DueState::Overdue { .. } => assert!(overdue),
                    DueState::DueSoon { .. } => assert!(due_soon, "interval {interval} current {current}"),
                    DueState::Ok { .. } => assert!(!overdue && !due_soon),
                    DueState::Unknown => panic!("interval is defined"),
                }
            }
        }
    }

    #[test]
    fn test_no_record_is_unknown() {
        let status = compute_status(None, ServiceType::OilChange, 12_900, &IntervalTable::default());
        assert_eq!(status.state, DueState::Unknown);
        assert_eq!(status.last_done_text(), "Not recorded");
        assert_eq!(status.next_due_text(), "Not calculated");
        assert_eq!(status.state.class(), "unknown");
    }

    #[test]
    fn test_interval_falls_back_to_record_type() {
        let table = IntervalTable::empty().with(ServiceType::BrakeInspection, 12_000);
        let rec = record("b", ServiceType::BrakeInspection, 40_000, date(2024, 1, 1), 1);

        let status = compute_status(Some(&rec), ServiceType::Brakes, 45_000, &table);
        assert_eq!(status.next_due_mileage, Some(52_000));
        assert_eq!(status.state, DueState::Ok { miles: 7000 });
    }

    #[test]
    fn test_lookup_key_wins_when_both_resolve() {
        let table = IntervalTable::empty()
            .with(ServiceType::Brakes, 10_000)
            .with(ServiceType::BrakeInspection, 12_000);

        assert_eq!(table.resolve(ServiceType::Brakes, ServiceType::BrakeInspection), Some(10_000));
        assert_eq!(table.resolve(ServiceType::Engine, ServiceType::BrakeInspection), Some(12_000));
        assert_eq!(table.resolve(ServiceType::Engine, ServiceType::Other), None);
    }

    #[test]
    fn test_unresolvable_interval_is_unknown_but_reports_last_done() {
        let rec = record("e", ServiceType::Engine, 30_000, date(2023, 6, 1), 1);
        let status = compute_status(Some(&rec), ServiceType::Engine, 31_000, &IntervalTable::default());

        assert_eq!(status.state, DueState::Unknown);
        assert_eq!(status.next_due_mileage, None);
        assert_eq!(status.last_done.unwrap().mileage, 30_000);
    }

    #[test]
    fn test_compute_is_pure() {
        let records = vec![oil_at_10k()];
        let table = IntervalTable::default();
        assert_eq!(
            Schedule::compute(&records, 12_900, &table),
            Schedule::compute(&records, 12_900, &table)
        );
    }

    #[test]
    fn test_select_most_recent_by_date_not_order() {
        let records = vec![
            record("old", ServiceType::OilChange, 7000, date(2023, 6, 1), 30),
            record("new", ServiceType::OilChange, 10_000, date(2024, 1, 1), 10),
            record("tune", ServiceType::TuneUp, 11_000, date(2024, 2, 1), 40),
        ];

        assert_eq!(select_most_recent(&records, ServiceType::OilChange).unwrap().id, "new");

        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(select_most_recent(&reversed, ServiceType::OilChange).unwrap().id, "new");
    }

    #[test]
    fn test_select_most_recent_tie_uses_created_at() {
        let records = vec![
            record("first", ServiceType::OilChange, 10_000, date(2024, 1, 1), 100),
            record("second", ServiceType::OilChange, 10_050, date(2024, 1, 1), 200),
        ];
        assert_eq!(select_most_recent(&records, ServiceType::OilChange).unwrap().id, "second");

        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(select_most_recent(&reversed, ServiceType::OilChange).unwrap().id, "second");
    }

    #[test]
    fn test_select_most_recent_none() {
        let records = vec![record("t", ServiceType::TuneUp, 1, date(2024, 1, 1), 1)];
        assert!(select_most_recent(&records, ServiceType::OilChange).is_none());
        assert!(select_most_recent(&[], ServiceType::OilChange).is_none());
    }

    #[test]
    fn test_schedule_covers_tracked_services() {
        let records = vec![
            oil_at_10k(),
            record("b", ServiceType::BrakeInspection, 2000, date(2023, 1, 1), 2),
        ];
        let schedule = Schedule::compute(&records, 13_500, &IntervalTable::default());

        assert_eq!(schedule.iter().count(), 4);
        assert_eq!(
            schedule.get(TrackedService::OilChange).unwrap().state,
            DueState::Overdue { miles: 500 }
        );
        assert_eq!(
            schedule.get(TrackedService::ValveAdjustment).unwrap().state,
            DueState::Unknown
        );
        assert_eq!(
            schedule.get(TrackedService::Brakes).unwrap().state,
            DueState::DueSoon { miles: 500 }
        );
        assert_eq!(schedule.attention_count(), 2);
    }

    #[test]
    fn test_default_table_covers_tracked_services() {
        let table = IntervalTable::default();
        for service in TrackedService::ALL {
            assert!(table.get(service.service_type()).is_some(), "{:?}", service);
        }
        assert_eq!(table.get(ServiceType::OilChange), Some(3000));
        assert_eq!(table.get(ServiceType::ValveAdjustment), Some(6000));
    }
}
