// Storable record trait and the implementations for maintlog's collections

use crate::models::{Issue, MaintenanceRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Core trait that any storable record must implement
pub trait Record: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync + 'static {
    /// Unique identifier for this record
    fn id(&self) -> &str;

    /// Revision timestamp (milliseconds since epoch); the highest one wins on sync
    fn updated_at(&self) -> i64;

    /// Collection name for this record type (e.g., "maintenance", "issues")
    /// Determines the JSONL filename: {collection}.jsonl
    fn collection_name() -> &'static str
    where
        Self: Sized;

    /// Fields to index for filtering
    /// Return empty HashMap if no fields should be indexed
    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }
}

/// Value types that can be indexed for filtering
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl std::fmt::Display for IndexValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexValue::String(s) => write!(f, "{}", s),
            IndexValue::Int(i) => write!(f, "{}", i),
            IndexValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl Record for MaintenanceRecord {
    fn id(&self) -> &str {
        &self.id
    }

    // Maintenance records are immutable, so the creation stamp is the revision
    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "maintenance"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert(
            "service_type".to_string(),
            IndexValue::String(self.service_type.as_str().to_string()),
        );
        fields.insert("mileage".to_string(), IndexValue::Int(self.mileage as i64));
        fields
    }
}

impl Record for Issue {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "issues"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert(
            "priority".to_string(),
            IndexValue::String(self.priority.as_str().to_string()),
        );
        fields.insert("priority_rank".to_string(), IndexValue::Int(self.priority.rank()));
        fields.insert("resolved".to_string(), IndexValue::Bool(self.resolved));
        fields
    }
}
