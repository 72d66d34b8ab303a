//! Built-in list screen definitions
//!
//! A definition names everything that differs between list screens: the
//! filter fields and their kinds, paired date ranges, defaults, parameters
//! every request must carry, and the REST paths backing the screen.

use crate::models::{FilterMap, FilterValue, ParamMap};

/// How a filter field is edited and parsed from the address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Text,
    Select,
    Date,
}

/// A single filter control on a list screen
#[derive(Debug, Clone, PartialEq)]
pub struct FilterField {
    pub name: String,
    pub label: String,
    pub kind: FilterKind,
    pub default: Option<FilterValue>,
}

impl FilterField {
    pub fn new(name: &str, label: &str, kind: FilterKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, value: FilterValue) -> Self {
        self.default = Some(value);
        self
    }
}

/// Start/end date fields that must be chronologically ordered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
        }
    }
}

/// REST paths, relative to the API base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenEndpoints {
    pub list: String,
    pub columns: String,
    pub dropdowns: String,
}

/// Configuration for one family of list screens
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenDefinition {
    /// Stable identity, also the filter-cache key
    pub key: String,
    pub title: String,
    pub filters: Vec<FilterField>,
    pub date_ranges: Vec<DateRange>,
    pub required_params: ParamMap,
    /// Value of `columnFor` sent to the column endpoints
    pub column_for: String,
    pub endpoints: ScreenEndpoints,
}

impl ScreenDefinition {
    pub fn new(key: &str, title: &str) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            filters: Vec::new(),
            date_ranges: Vec::new(),
            required_params: ParamMap::new(),
            column_for: key.to_string(),
            endpoints: ScreenEndpoints {
                list: key.to_string(),
                columns: format!("{}/column-name-list", key),
                dropdowns: format!("{}/drop-down-data", key),
            },
        }
    }

    pub fn with_filter(mut self, field: FilterField) -> Self {
        self.filters.push(field);
        self
    }

    pub fn with_date_range(mut self, start: &str, end: &str) -> Self {
        self.date_ranges.push(DateRange::new(start, end));
        self
    }

    pub fn with_required_param(mut self, name: &str, value: &str) -> Self {
        self.required_params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_column_for(mut self, column_for: &str) -> Self {
        self.column_for = column_for.to_string();
        self
    }

    pub fn with_endpoints(mut self, list: &str, columns: &str, dropdowns: &str) -> Self {
        self.endpoints = ScreenEndpoints {
            list: list.to_string(),
            columns: columns.to_string(),
            dropdowns: dropdowns.to_string(),
        };
        self
    }

    pub fn field(&self, name: &str) -> Option<&FilterField> {
        self.filters.iter().find(|field| field.name == name)
    }

    /// Values the draft returns to on reset
    pub fn defaults(&self) -> FilterMap {
        self.filters
            .iter()
            .filter_map(|field| {
                field
                    .default
                    .as_ref()
                    .map(|value| (field.name.clone(), value.clone()))
            })
            .collect()
    }
}

pub fn credit_limits() -> ScreenDefinition {
    ScreenDefinition::new("credit-limits", "Credit Limit List")
        .with_filter(FilterField::new("entityType", "Entity Type", FilterKind::Select))
        .with_filter(FilterField::new("startDate", "Expiry Date From", FilterKind::Date))
        .with_filter(FilterField::new("endDate", "Expiry Date To", FilterKind::Date))
        .with_date_range("startDate", "endDate")
        .with_column_for("credit-limit")
        .with_endpoints(
            "credit-limits",
            "credit-limits/column-name-list",
            "credit-limits/entity-type-list",
        )
}

pub fn debtors() -> ScreenDefinition {
    ScreenDefinition::new("debtors", "Debtor List")
        .with_filter(FilterField::new("entityType", "Entity Type", FilterKind::Select))
        .with_filter(FilterField::new("startDate", "Created From", FilterKind::Date))
        .with_filter(FilterField::new("endDate", "Created To", FilterKind::Date))
        .with_date_range("startDate", "endDate")
        .with_column_for("debtor")
}

pub fn applications() -> ScreenDefinition {
    ScreenDefinition::new("applications", "Application List")
        .with_filter(FilterField::new("entity", "Entity", FilterKind::Select))
        .with_filter(FilterField::new("clientId", "Client", FilterKind::Select))
        .with_filter(FilterField::new("debtorId", "Debtor", FilterKind::Select))
        .with_filter(FilterField::new("status", "Status", FilterKind::Select))
        .with_filter(FilterField::new("minCreditLimit", "Minimum Credit Limit", FilterKind::Text))
        .with_filter(FilterField::new("maxCreditLimit", "Maximum Credit Limit", FilterKind::Text))
        .with_filter(FilterField::new("startDate", "Date From", FilterKind::Date))
        .with_filter(FilterField::new("endDate", "Date To", FilterKind::Date))
        .with_date_range("startDate", "endDate")
        .with_column_for("application")
}

pub fn dashboard_tasks() -> ScreenDefinition {
    ScreenDefinition::new("dashboard-tasks", "My Tasks")
        .with_filter(
            FilterField::new("isCompleted", "Show Completed", FilterKind::Select)
                .with_default(FilterValue::select("No", "false")),
        )
        .with_filter(FilterField::new("priority", "Priority", FilterKind::Select))
        .with_filter(FilterField::new("startDate", "Due Date From", FilterKind::Date))
        .with_filter(FilterField::new("endDate", "Due Date To", FilterKind::Date))
        .with_date_range("startDate", "endDate")
        .with_required_param("columnFor", "task")
        .with_column_for("task")
        .with_endpoints("dashboard/task", "dashboard/column-name-list", "task/drop-down-data")
}

/// All screen definitions shipped with the crate
pub fn builtin() -> Vec<ScreenDefinition> {
    vec![credit_limits(), debtors(), applications(), dashboard_tasks()]
}

/// Look up a built-in screen by key
pub fn find(key: &str) -> Option<ScreenDefinition> {
    builtin().into_iter().find(|screen| screen.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_keys_are_unique() {
        let screens = builtin();
        let mut keys: Vec<_> = screens.iter().map(|s| s.key.clone()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), screens.len());
    }

    #[test]
    fn test_defaults_only_include_fields_with_defaults() {
        let tasks = dashboard_tasks();
        let defaults = tasks.defaults();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults["isCompleted"].to_param(), "false");
        assert!(credit_limits().defaults().is_empty());
    }

    #[test]
    fn test_find_screen() {
        let screen = find("credit-limits").unwrap();
        assert_eq!(screen.field("entityType").map(|f| f.kind), Some(FilterKind::Select));
        assert!(find("unknown").is_none());
    }
}
