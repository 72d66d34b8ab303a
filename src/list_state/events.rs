//! Change notifications published by a list screen

use crate::errors::ListError;
use crate::list_state::filter::FilterPhase;
use crate::models::{FilterMap, ParamMap};

/// Events a renderer subscribes to instead of polling the screen state
#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent {
    /// A list fetch was issued
    Loading { version: u64 },
    /// The result of `version` was applied
    Loaded { version: u64, page: u32, total: u64 },
    /// The applied result has no records
    Empty,
    /// The latest fetch failed
    FetchFailed(ListError),

    // Filter events
    /// Draft values or the editor phase changed
    DraftChanged(FilterPhase),
    /// A new filter was committed
    FilterApplied(FilterMap),
    /// Dropdown option sets arrived
    OptionsLoaded,

    // Column events
    /// Column selection or its busy flags changed
    ColumnsChanged,

    /// Address parameters were rewritten
    AddressWritten(ParamMap),
    /// The screen stopped accepting changes
    Unmounted,
}
