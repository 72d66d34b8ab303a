//! Two-phase filter state: the draft the user edits and the filter that was
//! applied with the last successful fetch.

use tracing::debug;

use crate::errors::{ListError, ListResult};
use crate::models::{normalize_filters, FilterMap, FilterOptions, FilterValue};
use crate::screens::DateRange;

pub const INVALID_DATE_RANGE: &str = "Please enter a valid date range";

/// Phase of the filter editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPhase {
    /// Draft matches the applied filter and the editor is closed
    Idle,
    /// Editor open or draft diverges from the applied filter
    Editing,
    /// A fetch carrying a draft snapshot is in flight
    Applying,
}

/// Whether `begin_apply` should refetch when nothing changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Forced,
    IfChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    draft: FilterMap,
    applied: FilterMap,
    defaults: FilterMap,
    date_ranges: Vec<DateRange>,
    phase: FilterPhase,
}

impl FilterState {
    pub fn new(defaults: FilterMap, date_ranges: Vec<DateRange>) -> Self {
        Self {
            draft: FilterMap::new(),
            applied: FilterMap::new(),
            defaults,
            date_ranges,
            phase: FilterPhase::Idle,
        }
    }

    pub fn draft(&self) -> &FilterMap {
        &self.draft
    }

    pub fn applied(&self) -> &FilterMap {
        &self.applied
    }

    pub fn defaults(&self) -> &FilterMap {
        &self.defaults
    }

    pub fn phase(&self) -> FilterPhase {
        self.phase
    }

    /// Whether the draft would send a different filter than the applied one
    pub fn is_dirty(&self) -> bool {
        normalize_filters(&self.draft) != self.applied
    }

    /// Replace the draft with values recovered on mount
    pub fn seed(&mut self, values: FilterMap) {
        self.draft = values;
        self.phase = if self.is_dirty() {
            FilterPhase::Editing
        } else {
            FilterPhase::Idle
        };
    }

    /// Open the filter editor
    pub fn open(&mut self) {
        if self.phase == FilterPhase::Idle {
            self.phase = FilterPhase::Editing;
        }
    }

    /// Store a draft value; `None` clears the field
    pub fn update_draft(&mut self, field: &str, value: Option<FilterValue>) {
        match value {
            Some(value) => {
                self.draft.insert(field.to_string(), value);
            }
            None => {
                self.draft.remove(field);
            }
        }
        if self.phase == FilterPhase::Idle {
            self.phase = FilterPhase::Editing;
        }
    }

    /// Validate the draft and snapshot it for a fetch.
    ///
    /// Returns `Ok(None)` when nothing needs to be fetched. On a validation
    /// failure the draft is kept and the phase is `Editing`.
    pub fn begin_apply(&mut self, mode: ApplyMode) -> ListResult<Option<FilterMap>> {
        if mode == ApplyMode::IfChanged && self.phase == FilterPhase::Idle && !self.is_dirty() {
            return Ok(None);
        }

        if let Err(err) = validate_date_ranges(&self.draft, &self.date_ranges) {
            if self.phase != FilterPhase::Applying {
                self.phase = FilterPhase::Editing;
            }
            return Err(err);
        }

        self.phase = FilterPhase::Applying;
        Ok(Some(normalize_filters(&self.draft)))
    }

    /// The fetch for `candidate` succeeded; it becomes the applied filter
    pub fn commit_apply(&mut self, candidate: FilterMap) {
        self.applied = candidate;
        self.phase = if self.is_dirty() {
            FilterPhase::Editing
        } else {
            FilterPhase::Idle
        };
    }

    /// The fetch failed or was abandoned; the draft stays as the user left it
    pub fn fail_apply(&mut self) {
        if self.phase == FilterPhase::Applying {
            self.phase = FilterPhase::Editing;
        }
    }

    /// Return the draft to the field defaults
    pub fn reset_draft(&mut self) {
        self.draft = self.defaults.clone();
        if self.phase == FilterPhase::Idle {
            self.phase = FilterPhase::Editing;
        }
    }

    /// Discard the draft
    pub fn close(&mut self) {
        self.draft = self.applied.clone();
        if self.phase != FilterPhase::Applying {
            self.phase = FilterPhase::Idle;
        }
    }

    /// Fill in option labels for select values whose label is unknown, as
    /// happens for values rehydrated from the address
    pub fn resolve_labels(&mut self, options: &FilterOptions) {
        for (name, value) in self.draft.iter_mut() {
            if let FilterValue::Select(selected) = value {
                let resolved = options
                    .get(name)
                    .and_then(|set| set.iter().find(|option| option.value == selected.value));
                if let Some(option) = resolved {
                    if option.label != selected.label {
                        debug!("Resolved label for {}={} -> {}", name, selected.value, option.label);
                        selected.label = option.label.clone();
                    }
                }
            }
        }
    }
}

/// Check that no start date is after its paired end date
pub fn validate_date_ranges(filters: &FilterMap, ranges: &[DateRange]) -> ListResult<()> {
    for range in ranges {
        let start = filters.get(&range.start).and_then(FilterValue::as_date);
        let end = filters.get(&range.end).and_then(FilterValue::as_date);
        if let (Some(start), Some(end)) = (start, end) {
            if start.is_after(&end) {
                return Err(ListError::Validation(INVALID_DATE_RANGE.to_string()));
            }
        }
    }
    Ok(())
}
