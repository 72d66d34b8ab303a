use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filter values keyed by filter-field name. Ordered so that request
/// fingerprints and address parameters come out in a stable order.
pub type FilterMap = BTreeMap<String, FilterValue>;

/// Flat key/value parameters as they appear in the address or a request
pub type ParamMap = BTreeMap<String, String>;

/// Dropdown option sets keyed by filter-field name
pub type FilterOptions = BTreeMap<String, Vec<SelectOption>>;

/// A single list record as returned by the server
pub type Record = serde_json::Map<String, serde_json::Value>;

/// One entry of a dropdown filter
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

// Options are identified by value; the label is display-only and may be
// resolved after the value was read from the address.
impl PartialEq for SelectOption {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// A date filter value. Calendar days and instants are both accepted and
/// written back in the form they were read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterDate {
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

impl FilterDate {
    pub fn parse(input: &str) -> Result<Self, chrono::ParseError> {
        let input = input.trim();
        if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            return Ok(FilterDate::Day(day));
        }
        DateTime::parse_from_rfc3339(input).map(|dt| FilterDate::Instant(dt.with_timezone(&Utc)))
    }

    /// Point in time used for range comparisons; a day means midnight UTC
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            FilterDate::Day(day) => Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)),
            FilterDate::Instant(instant) => *instant,
        }
    }

    pub fn is_after(&self, other: &FilterDate) -> bool {
        self.instant() > other.instant()
    }

    pub fn to_param(&self) -> String {
        match self {
            FilterDate::Day(day) => day.format("%Y-%m-%d").to_string(),
            FilterDate::Instant(instant) => instant.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl TryFrom<String> for FilterDate {
    type Error = chrono::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FilterDate::parse(&value)
    }
}

impl From<FilterDate> for String {
    fn from(value: FilterDate) -> Self {
        value.to_param()
    }
}

/// Value of a single filter field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    Text(String),
    Select(SelectOption),
    Date(FilterDate),
}

impl FilterValue {
    pub fn text(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }

    pub fn select(label: &str, value: &str) -> Self {
        FilterValue::Select(SelectOption::new(label, value))
    }

    pub fn date(value: FilterDate) -> Self {
        FilterValue::Date(value)
    }

    /// Blank values are treated exactly like absent ones
    pub fn is_blank(&self) -> bool {
        match self {
            FilterValue::Text(text) => text.trim().is_empty(),
            FilterValue::Select(option) => option.value.trim().is_empty(),
            FilterValue::Date(_) => false,
        }
    }

    pub fn as_date(&self) -> Option<FilterDate> {
        match self {
            FilterValue::Date(date) => Some(*date),
            _ => None,
        }
    }

    /// Wire representation used for both the address and server requests
    pub fn to_param(&self) -> String {
        match self {
            FilterValue::Text(text) => text.trim().to_string(),
            FilterValue::Select(option) => option.value.trim().to_string(),
            FilterValue::Date(date) => date.to_param(),
        }
    }
}

/// Drop blank values so that "no filter" and "explicitly empty filter"
/// compare equal.
pub fn normalize_filters(filters: &FilterMap) -> FilterMap {
    filters
        .iter()
        .filter(|(_, value)| !value.is_blank())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Column descriptor for a list table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub label: String,
    #[serde(rename = "isChecked", default)]
    pub visible: bool,
}

impl ColumnDescriptor {
    pub fn new(name: &str, label: &str, visible: bool) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            visible,
        }
    }
}

/// Default and user-chosen column sets as stored by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSet {
    #[serde(default)]
    pub default_fields: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub custom_fields: Vec<ColumnDescriptor>,
}

/// Table header as reported alongside list records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHeader {
    pub name: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// One page of list data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub docs: Vec<Record>,
    #[serde(default)]
    pub headers: Vec<ColumnHeader>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u32,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

fn first_page() -> u32 {
    1
}

/// Everything sent with one list fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub filters: FilterMap,
    pub page: u32,
    pub limit: u32,
    pub required: ParamMap,
}

impl QueryRequest {
    pub fn new(filters: &FilterMap, page: u32, limit: u32, required: &ParamMap) -> Self {
        Self {
            filters: normalize_filters(filters),
            page: page.max(1),
            limit,
            required: required.clone(),
        }
    }

    /// Flattened request parameters; required screen parameters win over
    /// filter keys of the same name.
    pub fn to_params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("page".to_string(), self.page.to_string());
        params.insert("limit".to_string(), self.limit.to_string());
        for (name, value) in &self.filters {
            params.insert(name.clone(), value.to_param());
        }
        for (name, value) in &self.required {
            params.insert(name.clone(), value.clone());
        }
        params
    }
}
