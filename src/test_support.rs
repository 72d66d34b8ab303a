//! In-memory collaborators for driving list screens in tests

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::errors::ListError;
use crate::list_state::pagination::{LimitPolicy, PaginationState};
use crate::list_state::{ListScreen, ScreenServices};
use crate::models::{
    ColumnDescriptor, ColumnSet, FilterOptions, ListPage, QueryRequest, Record, SelectOption,
};
use crate::screens::ScreenDefinition;
use crate::services::{
    ColumnService, FilterOptionsService, ListService, MemoryAddress, NotificationService,
};
use crate::storage::{FilterCache, MemoryFilterCache};

#[derive(Default)]
struct Script {
    gate: Option<oneshot::Receiver<()>>,
    failure: Option<ListError>,
}

/// List service that answers from a record count, echoing the requested
/// page and limit. Calls can be held open or made to fail.
pub struct FakeListService {
    total: AtomicU64,
    calls: Mutex<Vec<QueryRequest>>,
    scripts: Mutex<VecDeque<Script>>,
}

impl FakeListService {
    pub fn new(total: u64) -> Self {
        Self {
            total: AtomicU64::new(total),
            calls: Mutex::new(Vec::new()),
            scripts: Mutex::new(VecDeque::new()),
        }
    }

    /// Change how many records later calls see
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    /// Hold the next call open until the returned sender fires
    pub fn gate_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.scripts.lock().unwrap().push_back(Script {
            gate: Some(rx),
            failure: None,
        });
        tx
    }

    /// Fail the next call with `err`
    pub fn fail_next(&self, err: ListError) {
        self.scripts.lock().unwrap().push_back(Script {
            gate: None,
            failure: Some(err),
        });
    }

    pub fn calls(&self) -> Vec<QueryRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> QueryRequest {
        self.calls().pop().unwrap()
    }

    fn page_for(&self, request: &QueryRequest) -> ListPage {
        let total = self.total.load(Ordering::SeqCst);
        let limit = u64::from(request.limit);
        let start = u64::from(request.page - 1) * limit;
        let count = total.saturating_sub(start).min(limit);
        let docs: Vec<Record> = (start..start + count)
            .filter_map(|i| match json!({"_id": i.to_string(), "entityName": format!("Entity {}", i)}) {
                serde_json::Value::Object(record) => Some(record),
                _ => None,
            })
            .collect();

        ListPage {
            docs,
            headers: Vec::new(),
            total,
            pages: PaginationState::pages_for(total, request.limit),
            page: request.page,
            limit: request.limit,
        }
    }
}

#[async_trait]
impl ListService for FakeListService {
    async fn fetch(&self, request: &QueryRequest) -> Result<ListPage, ListError> {
        self.calls.lock().unwrap().push(request.clone());
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();

        if let Some(gate) = script.gate {
            let _ = gate.await;
        }
        match script.failure {
            Some(err) => Err(err),
            None => Ok(self.page_for(request)),
        }
    }
}

/// Column service backed by an in-memory set. The next save or reset can
/// be held open or made to fail.
pub struct FakeColumnService {
    set: Mutex<ColumnSet>,
    saves: Mutex<Vec<Vec<ColumnDescriptor>>>,
    resets: AtomicUsize,
    script: Mutex<Script>,
}

impl FakeColumnService {
    pub fn new(set: ColumnSet) -> Self {
        Self {
            set: Mutex::new(set),
            saves: Mutex::new(Vec::new()),
            resets: AtomicUsize::new(0),
            script: Mutex::new(Script::default()),
        }
    }

    pub fn gate_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().gate = Some(rx);
        tx
    }

    pub fn fail_next(&self, err: ListError) {
        self.script.lock().unwrap().failure = Some(err);
    }

    /// Wait on a pending gate, then surface a scripted failure
    async fn run_script(&self) -> Result<(), ListError> {
        let script = std::mem::take(&mut *self.script.lock().unwrap());
        if let Some(gate) = script.gate {
            let _ = gate.await;
        }
        match script.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn saves(&self) -> Vec<Vec<ColumnDescriptor>> {
        self.saves.lock().unwrap().clone()
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ColumnService for FakeColumnService {
    async fn get(&self) -> Result<ColumnSet, ListError> {
        Ok(self.set.lock().unwrap().clone())
    }

    async fn save(&self, fields: &[ColumnDescriptor]) -> Result<(), ListError> {
        self.run_script().await?;
        self.saves.lock().unwrap().push(fields.to_vec());
        self.set.lock().unwrap().custom_fields = fields.to_vec();
        Ok(())
    }

    async fn reset_to_default(&self) -> Result<(), ListError> {
        self.run_script().await?;
        self.resets.fetch_add(1, Ordering::SeqCst);
        let mut set = self.set.lock().unwrap();
        set.custom_fields = set.default_fields.clone();
        Ok(())
    }
}

pub struct FakeOptions(pub FilterOptions);

#[async_trait]
impl FilterOptionsService for FakeOptions {
    async fn get(&self) -> Result<FilterOptions, ListError> {
        Ok(self.0.clone())
    }
}

/// Notifier that records every message by level
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingNotifier {
    fn record(&self, level: &'static str, message: &str) {
        self.messages.lock().unwrap().push((level, message.to_string()));
    }

    pub fn of_level(&self, level: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.of_level("error")
    }

    pub fn warnings(&self) -> Vec<String> {
        self.of_level("warning")
    }

    pub fn successes(&self) -> Vec<String> {
        self.of_level("success")
    }
}

impl NotificationService for RecordingNotifier {
    fn error(&self, message: &str) {
        self.record("error", message);
    }

    fn warning(&self, message: &str) {
        self.record("warning", message);
    }

    fn success(&self, message: &str) {
        self.record("success", message);
    }
}

pub fn sample_columns() -> ColumnSet {
    ColumnSet {
        default_fields: vec![
            ColumnDescriptor::new("entityName", "Entity Name", true),
            ColumnDescriptor::new("creditLimit", "Credit Limit", true),
            ColumnDescriptor::new("expiryDate", "Expiry Date", true),
        ],
        custom_fields: Vec::new(),
    }
}

pub fn sample_options() -> FilterOptions {
    let mut options = FilterOptions::new();
    options.insert(
        "entityType".to_string(),
        vec![SelectOption::new("Trust", "TRUST"), SelectOption::new("Company", "COMPANY")],
    );
    options
}

/// A screen wired to fakes, plus handles to inspect them
pub struct Harness {
    pub screen: ListScreen,
    pub list: Arc<FakeListService>,
    pub columns: Arc<FakeColumnService>,
    pub notifier: Arc<RecordingNotifier>,
    pub address: Arc<MemoryAddress>,
    pub cache: Arc<MemoryFilterCache>,
}

impl Harness {
    pub fn new(definition: ScreenDefinition, query: &str) -> Self {
        Self::with_cache(definition, query, Arc::new(MemoryFilterCache::new()))
    }

    pub fn with_cache(definition: ScreenDefinition, query: &str, cache: Arc<MemoryFilterCache>) -> Self {
        let list = Arc::new(FakeListService::new(100));
        let columns = Arc::new(FakeColumnService::new(sample_columns()));
        let notifier = Arc::new(RecordingNotifier::default());
        let path = format!("/{}", definition.key);
        let address = Arc::new(MemoryAddress::with_query(&path, query).unwrap());

        let services = ScreenServices {
            list: list.clone(),
            columns: columns.clone(),
            options: Arc::new(FakeOptions(sample_options())),
            notifier: notifier.clone(),
            address: address.clone(),
            cache: cache.clone() as Arc<dyn FilterCache>,
        };
        let screen = ListScreen::new(definition, LimitPolicy::default(), services);

        Self {
            screen,
            list,
            columns,
            notifier,
            address,
            cache,
        }
    }

    /// Yield until the list service has seen `count` calls
    pub async fn wait_for_calls(&self, count: usize) {
        while self.list.call_count() < count {
            tokio::task::yield_now().await;
        }
    }
}
