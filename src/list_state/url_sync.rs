//! Mapping between list state and the navigable address

use tracing::warn;

use crate::list_state::pagination::LimitPolicy;
use crate::models::{FilterDate, FilterMap, FilterValue, ParamMap};
use crate::screens::{FilterField, FilterKind};

pub const PAGE_PARAM: &str = "page";
pub const LIMIT_PARAM: &str = "limit";

/// Page, limit and filters recovered on mount
#[derive(Debug, Clone, PartialEq)]
pub struct SeedState {
    pub page: u32,
    pub limit: u32,
    pub filters: FilterMap,
}

#[derive(Debug, Clone)]
pub struct UrlSynchronizer {
    fields: Vec<FilterField>,
    limits: LimitPolicy,
    last_written: Option<ParamMap>,
}

impl UrlSynchronizer {
    pub fn new(fields: Vec<FilterField>, limits: LimitPolicy) -> Self {
        Self {
            fields,
            limits,
            last_written: None,
        }
    }

    /// Recover state on mount. Per filter key the address wins over the
    /// cached last-applied filter, which wins over the screen defaults.
    pub fn read(&self, params: &ParamMap, cached: Option<&FilterMap>, defaults: &FilterMap) -> SeedState {
        let page = params
            .get(PAGE_PARAM)
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1);
        let limit = self.limits.resolve(params.get(LIMIT_PARAM).map(String::as_str));

        let mut filters = FilterMap::new();
        for field in &self.fields {
            let from_address = params
                .get(&field.name)
                .filter(|raw| !raw.trim().is_empty())
                .and_then(|raw| parse_filter_value(field, raw));
            let value = from_address
                .or_else(|| cached.and_then(|cache| cache.get(&field.name).cloned()))
                .or_else(|| defaults.get(&field.name).cloned());
            if let Some(value) = value.filter(|value| !value.is_blank()) {
                filters.insert(field.name.clone(), value);
            }
        }

        SeedState {
            page,
            limit,
            filters,
        }
    }

    /// Address parameters for the given state; blank values are omitted
    pub fn params_for(&self, page: u32, limit: u32, applied: &FilterMap) -> ParamMap {
        let mut params = filter_params(applied);
        params.insert(PAGE_PARAM.to_string(), page.max(1).to_string());
        params.insert(LIMIT_PARAM.to_string(), limit.to_string());
        params
    }

    /// Record `params` as written; returns false when they equal the last
    /// write so the address is not rewritten needlessly
    pub fn mark_written(&mut self, params: &ParamMap) -> bool {
        if self.last_written.as_ref() == Some(params) {
            return false;
        }
        self.last_written = Some(params.clone());
        true
    }
}

/// Filter values as flat parameters, blank values omitted
pub fn filter_params(filters: &FilterMap) -> ParamMap {
    filters
        .iter()
        .filter(|(_, value)| !value.is_blank())
        .map(|(name, value)| (name.clone(), value.to_param()))
        .collect()
}

/// Parse a raw parameter for `field`; unparsable dates are skipped
pub fn parse_filter_value(field: &FilterField, raw: &str) -> Option<FilterValue> {
    match field.kind {
        FilterKind::Text => Some(FilterValue::text(raw)),
        // The label is not part of the address; it is resolved once the
        // dropdown options are known.
        FilterKind::Select => Some(FilterValue::select(raw, raw)),
        FilterKind::Date => match FilterDate::parse(raw) {
            Ok(date) => Some(FilterValue::date(date)),
            Err(e) => {
                warn!("Ignoring unparsable date '{}' for {}: {}", raw, field.name, e);
                None
            }
        },
    }
}
