// Query filtering for stored records

use crate::models::{Priority, ServiceType};
use crate::record::IndexValue;
use std::str::FromStr;

/// Filter for querying records
#[derive(Debug, Clone)]
pub struct Filter {
    /// Field name to filter on
    pub field: String,
    /// Comparison operator
    pub op: FilterOp,
    /// Value to compare against
    pub value: IndexValue,
}

impl Filter {
    pub fn new(field: &str, op: FilterOp, value: IndexValue) -> Self {
        Self {
            field: field.to_string(),
            op,
            value,
        }
    }

    pub fn eq(field: &str, value: IndexValue) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }
}

/// Comparison operators for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,       // ==
    Ne,       // !=
    Gt,       // >
    Lt,       // <
    Gte,      // >=
    Lte,      // <=
    Contains, // LIKE %value%
}

impl FilterOp {
    pub(crate) fn to_sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Lt => "<",
            FilterOp::Gte => ">=",
            FilterOp::Lte => "<=",
            FilterOp::Contains => "LIKE",
        }
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_sql())
    }
}

/// Exact-match filter on a maintenance record's type, "all" by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TypeFilter {
    #[default]
    All,
    Only(ServiceType),
}

impl TypeFilter {
    pub fn matches(self, service_type: ServiceType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(wanted) => wanted == service_type,
        }
    }
}

impl FromStr for TypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(TypeFilter::All);
        }
        ServiceType::parse(s)
            .map(TypeFilter::Only)
            .ok_or_else(|| format!("unknown service type: {}", s))
    }
}

fn mileage_value(miles: u64) -> IndexValue {
    IndexValue::Int(i64::try_from(miles).unwrap_or(i64::MAX))
}

/// Indexed query over the maintenance collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceQuery {
    pub service_type: TypeFilter,
    /// Substring of the type name, e.g. "brake" for both brake types
    pub type_matching: Option<String>,
    pub exclude_type: Option<ServiceType>,
    /// Odometer at or above
    pub from_mileage: Option<u64>,
    /// Odometer strictly below
    pub before_mileage: Option<u64>,
}

impl MaintenanceQuery {
    pub fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let TypeFilter::Only(service_type) = self.service_type {
            filters.push(Filter::eq("service_type", IndexValue::String(service_type.as_str().to_string())));
        }
        if let Some(text) = &self.type_matching {
            filters.push(Filter::new("service_type", FilterOp::Contains, IndexValue::String(text.clone())));
        }
        if let Some(service_type) = self.exclude_type {
            filters.push(Filter::new(
                "service_type",
                FilterOp::Ne,
                IndexValue::String(service_type.as_str().to_string()),
            ));
        }
        if let Some(miles) = self.from_mileage {
            filters.push(Filter::new("mileage", FilterOp::Gte, mileage_value(miles)));
        }
        if let Some(miles) = self.before_mileage {
            filters.push(Filter::new("mileage", FilterOp::Lt, mileage_value(miles)));
        }
        filters
    }
}

/// Indexed query over the issues collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueQuery {
    pub priority: Option<Priority>,
    pub above: Option<Priority>,
    pub at_least: Option<Priority>,
    pub at_most: Option<Priority>,
    pub resolved: Option<bool>,
}

impl IssueQuery {
    pub fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(priority) = self.priority {
            filters.push(Filter::eq("priority", IndexValue::String(priority.as_str().to_string())));
        }
        let ranks = [
            (self.above, FilterOp::Gt),
            (self.at_least, FilterOp::Gte),
            (self.at_most, FilterOp::Lte),
        ];
        for (priority, op) in ranks {
            if let Some(priority) = priority {
                filters.push(Filter::new("priority_rank", op, IndexValue::Int(priority.rank())));
            }
        }
        if let Some(resolved) = self.resolved {
            filters.push(Filter::eq("resolved", IndexValue::Bool(resolved)));
        }
        filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_creation() {
        let filter = Filter::eq("priority", IndexValue::String("high".to_string()));

        assert_eq!(filter.field, "priority");
        assert_eq!(filter.op, FilterOp::Eq);
    }

    #[test]
    fn test_filter_op_to_sql() {
        assert_eq!(FilterOp::Eq.to_sql(), "=");
        assert_eq!(FilterOp::Ne.to_sql(), "!=");
        assert_eq!(FilterOp::Gt.to_sql(), ">");
        assert_eq!(FilterOp::Lt.to_sql(), "<");
        assert_eq!(FilterOp::Gte.to_sql(), ">=");
        assert_eq!(FilterOp::Lte.to_sql(), "<=");
        assert_eq!(FilterOp::Contains.to_sql(), "LIKE");
    }

    #[test]
    fn test_filter_op_display() {
        assert_eq!(FilterOp::Eq.to_string(), "=");
        assert_eq!(FilterOp::Ne.to_string(), "!=");
    }

    #[test]
    fn test_type_filter_parse() {
        assert_eq!("all".parse::<TypeFilter>(), Ok(TypeFilter::All));
        assert_eq!(
            "oil-change".parse::<TypeFilter>(),
            Ok(TypeFilter::Only(ServiceType::OilChange))
        );
        assert!("wipers".parse::<TypeFilter>().is_err());
    }

    #[test]
    fn test_type_filter_matches_exactly() {
        let brakes = TypeFilter::Only(ServiceType::Brakes);
        assert!(brakes.matches(ServiceType::Brakes));
        assert!(!brakes.matches(ServiceType::BrakeInspection));
        assert!(TypeFilter::All.matches(ServiceType::Other));
    }

    #[test]
    fn test_maintenance_query_filters() {
        assert!(MaintenanceQuery::default().filters().is_empty());

        let query = MaintenanceQuery {
            service_type: TypeFilter::Only(ServiceType::OilChange),
            exclude_type: Some(ServiceType::Other),
            from_mileage: Some(10_000),
            before_mileage: Some(u64::MAX),
            ..MaintenanceQuery::default()
        };
        let filters = query.filters();

        assert_eq!(filters.len(), 4);
        assert_eq!(filters[0].value, IndexValue::String("oil-change".to_string()));
        assert_eq!(filters[1].op, FilterOp::Ne);
        assert_eq!((filters[2].op, &filters[2].value), (FilterOp::Gte, &IndexValue::Int(10_000)));
        assert_eq!((filters[3].op, &filters[3].value), (FilterOp::Lt, &IndexValue::Int(i64::MAX)));
    }

    #[test]
    fn test_issue_query_filters() {
        let query = IssueQuery {
            above: Some(Priority::Low),
            at_most: Some(Priority::High),
            resolved: Some(false),
            ..IssueQuery::default()
        };
        let filters = query.filters();

        assert_eq!(filters.len(), 3);
        assert_eq!((filters[0].op, &filters[0].value), (FilterOp::Gt, &IndexValue::Int(1)));
        assert_eq!((filters[1].op, &filters[1].value), (FilterOp::Lte, &IndexValue::Int(3)));
        assert_eq!(filters[2].value, IndexValue::Bool(false));
    }
}
