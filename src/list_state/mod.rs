//! List-view state management
//!
//! Each list screen owns a filter state machine, a query coordinator, a
//! column selection and an address synchronizer. `ListScreen` ties them
//! together and exposes the operations a screen wires to its controls.

pub mod columns;
pub mod events;
pub mod filter;
pub mod pagination;
pub mod query;
pub mod screen;
pub mod url_sync;


pub use columns::ColumnSelection;
pub use events::ListEvent;
pub use filter::{FilterPhase, FilterState};
pub use pagination::{LimitPolicy, PaginationState};
pub use query::QueryCoordinator;
pub use screen::{FetchOutcome, ListScreen, ListSnapshot, ScreenServices};
pub use url_sync::UrlSynchronizer;
