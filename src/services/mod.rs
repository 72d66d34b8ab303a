//! Collaborator contracts consumed by list screens
//!
//! List state never talks to the network, the address bar or the toast area
//! directly; it goes through these traits so screens can be driven by the
//! HTTP client in production and by fakes in tests.

pub mod address;
pub mod http;
pub mod notify;

use async_trait::async_trait;

use crate::errors::ListError;
use crate::models::{ColumnDescriptor, ColumnSet, FilterOptions, ListPage, ParamMap, QueryRequest};

pub use address::MemoryAddress;
pub use http::{ApiClient, ScreenApi};
pub use notify::TracingNotifier;

/// Fetches one page of list records
#[async_trait]
pub trait ListService: Send + Sync {
    async fn fetch(&self, request: &QueryRequest) -> Result<ListPage, ListError>;
}

/// Reads and persists the user's column choice
#[async_trait]
pub trait ColumnService: Send + Sync {
    async fn get(&self) -> Result<ColumnSet, ListError>;

    async fn save(&self, fields: &[ColumnDescriptor]) -> Result<(), ListError>;

    async fn reset_to_default(&self) -> Result<(), ListError>;
}

/// Loads dropdown option sets for filter controls
#[async_trait]
pub trait FilterOptionsService: Send + Sync {
    async fn get(&self) -> Result<FilterOptions, ListError>;
}

/// Fire-and-forget user notifications
pub trait NotificationService: Send + Sync {
    fn error(&self, message: &str);

    fn warning(&self, message: &str);

    fn success(&self, message: &str);
}

/// How a parameter write affects navigation history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    Push,
    Replace,
}

/// Read/write access to the navigable address's query parameters
pub trait AddressBar: Send + Sync {
    fn params(&self) -> ParamMap;

    fn set_params(&self, params: &ParamMap, mode: NavigationMode);
}
