//! List-view state management for credit management screens
//!
//! Filter drafts and applied filters, request versioning, column selection
//! and address synchronization for paginated, filterable list screens.

pub mod config;
pub mod errors;
pub mod list_state;
pub mod models;
pub mod output;
pub mod screens;
pub mod services;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use errors::{ListError, ListResult};
pub use list_state::{FetchOutcome, ListEvent, ListScreen, ListSnapshot, ScreenServices};
