//! List screen controller
//!
//! `ListScreen` wires the filter state machine, the query coordinator, the
//! column selection and the address synchronizer to the collaborator
//! services. It is a cheap handle: clones drive the same screen instance.
//!
//! All state lives behind one mutex that is never held across an await.
//! Server calls happen between two short critical sections, and results are
//! only applied when the coordinator still considers them current.

use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{ListError, ListResult, NoticeLevel};
use crate::list_state::columns::ColumnSelection;
use crate::list_state::events::ListEvent;
use crate::list_state::filter::{validate_date_ranges, ApplyMode, FilterPhase, FilterState};
use crate::list_state::pagination::{LimitPolicy, PaginationState};
use crate::list_state::query::{QueryCoordinator, Settlement};
use crate::list_state::url_sync::{filter_params, UrlSynchronizer};
use crate::models::{
    ColumnHeader, FilterMap, FilterOptions, FilterValue, ParamMap, QueryRequest, Record,
};
use crate::screens::{DateRange, ScreenDefinition};
use crate::services::{
    AddressBar, ColumnService, FilterOptionsService, ListService, NavigationMode,
    NotificationService,
};
use crate::storage::{FilterCache, VersionedCacheWriter};

const EVENT_CAPACITY: usize = 64;
const COLUMNS_SAVED: &str = "Columns updated successfully.";
const COLUMNS_RESET: &str = "Columns reset to default.";
pub const COLUMNS_BUSY: &str = "A column update is already in progress.";

/// Collaborators a screen talks to
#[derive(Clone)]
pub struct ScreenServices {
    pub list: Arc<dyn ListService>,
    pub columns: Arc<dyn ColumnService>,
    pub options: Arc<dyn FilterOptionsService>,
    pub notifier: Arc<dyn NotificationService>,
    pub address: Arc<dyn AddressBar>,
    pub cache: Arc<dyn FilterCache>,
}

impl ScreenServices {
    /// Use one backend for the list, column and dropdown services
    pub fn with_backend<B>(
        backend: Arc<B>,
        notifier: Arc<dyn NotificationService>,
        address: Arc<dyn AddressBar>,
        cache: Arc<dyn FilterCache>,
    ) -> Self
    where
        B: ListService + ColumnService + FilterOptionsService + 'static,
    {
        Self {
            list: backend.clone(),
            columns: backend.clone(),
            options: backend,
            notifier,
            address,
            cache,
        }
    }
}

/// What happened to the fetch an operation issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result was applied to the list state
    Applied,
    /// An identical fetch was already in flight and its result was applied
    Joined,
    /// A newer request was issued before this one completed
    Superseded,
    /// Nothing needed fetching
    Unchanged,
    /// The screen was unmounted while the fetch was in flight
    Discarded,
}

/// Immutable copy of a screen's state for rendering
#[derive(Debug, Clone)]
pub struct ListSnapshot {
    pub screen: String,
    pub docs: Vec<Record>,
    pub headers: Vec<ColumnHeader>,
    pub pagination: PaginationState,
    pub draft: FilterMap,
    pub applied: FilterMap,
    pub phase: FilterPhase,
    pub options: FilterOptions,
    pub columns: ColumnSelection,
    pub loading: bool,
    pub has_loaded: bool,
    pub last_error: Option<ListError>,
}

impl ListSnapshot {
    /// A fetch succeeded and returned no records
    pub fn is_empty(&self) -> bool {
        self.has_loaded && self.docs.is_empty()
    }
}

enum FetchStep {
    Done(ListResult<FetchOutcome>),
    /// Response `after` was for a page past the end; fetch `page` instead
    Refetch {
        page: u32,
        limit: u32,
        commit: Option<FilterMap>,
        after: u64,
    },
}

struct PendingCommit {
    version: u64,
    filters: FilterMap,
}

struct ScreenState {
    mounted: bool,
    unmounted: bool,
    filter: FilterState,
    pagination: PaginationState,
    query: QueryCoordinator,
    columns: ColumnSelection,
    url: UrlSynchronizer,
    docs: Vec<Record>,
    headers: Vec<ColumnHeader>,
    options: FilterOptions,
    /// Filter snapshot carried by the latest apply, committed when its fetch succeeds
    pending: Option<PendingCommit>,
    last_error: Option<ListError>,
}

struct Inner {
    id: Uuid,
    definition: ScreenDefinition,
    limits: LimitPolicy,
    services: ScreenServices,
    state: Mutex<ScreenState>,
    events: broadcast::Sender<ListEvent>,
    cache_writer: VersionedCacheWriter,
}

/// Handle to one mounted list screen
#[derive(Clone)]
pub struct ListScreen {
    inner: Arc<Inner>,
}

impl ListScreen {
    pub fn new(definition: ScreenDefinition, limits: LimitPolicy, services: ScreenServices) -> Self {
        let state = ScreenState {
            mounted: false,
            unmounted: false,
            filter: FilterState::new(definition.defaults(), definition.date_ranges.clone()),
            pagination: PaginationState::new(limits.default_limit()),
            query: QueryCoordinator::new(),
            columns: ColumnSelection::new(),
            url: UrlSynchronizer::new(definition.filters.clone(), limits.clone()),
            docs: Vec::new(),
            headers: Vec::new(),
            options: FilterOptions::new(),
            pending: None,
            last_error: None,
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let cache_writer = VersionedCacheWriter::new(Arc::clone(&services.cache));

        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                definition,
                limits,
                services,
                state: Mutex::new(state),
                events,
                cache_writer,
            }),
        }
    }

    pub fn definition(&self) -> &ScreenDefinition {
        &self.inner.definition
    }

    pub fn key(&self) -> &str {
        &self.inner.definition.key
    }

    /// Receive change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.inner.events.subscribe()
    }

    fn state(&self) -> MutexGuard<'_, ScreenState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ListEvent) {
        // Having no subscribers is normal
        let _ = self.inner.events.send(event);
    }

    fn report(&self, err: &ListError) {
        let notifier = &self.inner.services.notifier;
        match err.notice_level() {
            NoticeLevel::Error => {
                warn!("[{}] {}", self.key(), err);
                notifier.error(&err.user_message());
            }
            NoticeLevel::Warning => {
                info!("[{}] {}", self.key(), err);
                notifier.warning(&err.user_message());
            }
            NoticeLevel::Silent => debug!("[{}] {}", self.key(), err),
        }
    }

    /// Run `f` against the state of an active screen and report its error
    fn update<T>(&self, f: impl FnOnce(&mut ScreenState) -> ListResult<T>) -> ListResult<T> {
        let result = {
            let mut guard = self.state();
            if guard.unmounted {
                Err(ListError::Unmounted(self.key().to_string()))
            } else {
                f(&mut *guard)
            }
        };
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    /// Seed state from the address, the filter cache and the screen
    /// defaults, then load the list, the columns and the filter options
    /// concurrently.
    pub async fn mount(&self) -> ListResult<()> {
        let key = self.key().to_string();
        {
            let state = self.state();
            if state.unmounted {
                return Err(ListError::Unmounted(key));
            }
            if state.mounted {
                debug!("[{}] Already mounted", key);
                return Ok(());
            }
        }

        let params = self.inner.services.address.params();
        let cached = match self.inner.services.cache.get(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("[{}] Filter cache unavailable: {}", key, e);
                None
            }
        };

        let seeded = self.update(|state| {
            if state.mounted {
                return Ok(None);
            }
            let mut seed = state
                .url
                .read(&params, cached.as_ref(), state.filter.defaults());
            drop_inverted_ranges(&mut seed.filters, &self.inner.definition.date_ranges);

            state.mounted = true;
            state.filter.seed(seed.filters);
            state.pagination = PaginationState::new(seed.limit);
            state.pagination.page = seed.page;
            let candidate = state.filter.begin_apply(ApplyMode::Forced)?;
            Ok(Some((seed.page, seed.limit, candidate)))
        })?;

        // Another handle finished mounting while the cache was read
        let Some((page, limit, candidate)) = seeded else {
            return Ok(());
        };

        info!(
            "[{}] Mounting screen {} (page {}, limit {})",
            key, self.inner.id, page, limit
        );

        let (list, _, _) = tokio::join!(
            self.fetch(page, limit, candidate),
            self.load_columns(),
            self.load_options()
        );
        list.map(|_| ())
    }

    /// Stop accepting changes; responses still in flight are discarded
    pub fn unmount(&self) {
        let mut state = self.state();
        if state.unmounted {
            return;
        }
        state.unmounted = true;
        state.pending = None;
        info!("[{}] Unmounted screen {}", self.key(), self.inner.id);
        self.emit(ListEvent::Unmounted);
    }

    // Filter operations

    /// Set a draft value; `None` clears the field
    pub fn update_filter(&self, field: &str, value: Option<FilterValue>) -> ListResult<()> {
        self.update(|state| {
            if self.inner.definition.field(field).is_none() {
                return Err(ListError::UnknownFilter(field.to_string()));
            }
            state.filter.update_draft(field, value);
            self.emit(ListEvent::DraftChanged(state.filter.phase()));
            Ok(())
        })
    }

    pub fn clear_filter(&self, field: &str) -> ListResult<()> {
        self.update_filter(field, None)
    }

    pub fn open_filters(&self) -> ListResult<()> {
        self.update(|state| {
            state.filter.open();
            self.emit(ListEvent::DraftChanged(state.filter.phase()));
            Ok(())
        })
    }

    /// Discard the draft without fetching
    pub fn close_filters(&self) -> ListResult<()> {
        self.update(|state| {
            state.filter.close();
            self.emit(ListEvent::DraftChanged(state.filter.phase()));
            Ok(())
        })
    }

    /// Validate the draft and fetch page 1 with it
    pub async fn apply_filters(&self) -> ListResult<FetchOutcome> {
        self.apply(ApplyMode::Forced, false).await
    }

    /// Like `apply_filters`, but skip the fetch when the draft equals the
    /// applied filter and the editor is closed
    pub async fn apply_filters_if_changed(&self) -> ListResult<FetchOutcome> {
        self.apply(ApplyMode::IfChanged, false).await
    }

    /// Return the draft to the screen defaults and apply it
    pub async fn reset_filters(&self) -> ListResult<FetchOutcome> {
        self.apply(ApplyMode::Forced, true).await
    }

    async fn apply(&self, mode: ApplyMode, reset: bool) -> ListResult<FetchOutcome> {
        let (candidate, limit) = self.update(|state| {
            if reset {
                state.filter.reset_draft();
            }
            let candidate = state.filter.begin_apply(mode);
            self.emit(ListEvent::DraftChanged(state.filter.phase()));
            candidate.map(|candidate| (candidate, state.pagination.limit))
        })?;

        match candidate {
            Some(filters) => {
                debug!("[{}] Applying {} filter(s)", self.key(), filters.len());
                self.fetch(1, limit, Some(filters)).await
            }
            None => Ok(FetchOutcome::Unchanged),
        }
    }

    // Pagination operations

    /// Fetch `page`, clamped into the known page range
    pub async fn go_to_page(&self, page: u32) -> ListResult<FetchOutcome> {
        let (target, limit) =
            self.update(|state| Ok((state.pagination.clamp_page(page), state.pagination.limit)))?;
        self.fetch(target, limit, None).await
    }

    pub async fn next_page(&self) -> ListResult<FetchOutcome> {
        let target = self.update(|state| {
            let pagination = &state.pagination;
            Ok(pagination.has_next().then(|| pagination.page + 1))
        })?;
        match target {
            Some(page) => self.go_to_page(page).await,
            None => Ok(FetchOutcome::Unchanged),
        }
    }

    pub async fn previous_page(&self) -> ListResult<FetchOutcome> {
        let target = self.update(|state| {
            let pagination = &state.pagination;
            Ok(pagination.has_previous().then(|| pagination.page - 1))
        })?;
        match target {
            Some(page) => self.go_to_page(page).await,
            None => Ok(FetchOutcome::Unchanged),
        }
    }

    /// Switch the page size and go back to page 1
    pub async fn change_limit(&self, limit: u32) -> ListResult<FetchOutcome> {
        let limits = &self.inner.limits;
        self.update(|_| {
            if limits.is_supported(limit) {
                Ok(())
            } else {
                Err(ListError::Validation(format!("Unsupported page size: {}", limit)))
            }
        })?;
        self.fetch(1, limit, None).await
    }

    /// Refetch the current page with the applied filter
    pub async fn refresh(&self) -> ListResult<FetchOutcome> {
        let (page, limit) =
            self.update(|state| Ok((state.pagination.page, state.pagination.limit)))?;
        self.fetch(page, limit, None).await
    }

    // Column operations

    /// Flip a column's visibility; returns the new value
    pub fn toggle_column(&self, name: &str) -> ListResult<bool> {
        self.update(|state| {
            let visible = state.columns.toggle(name)?;
            self.emit(ListEvent::ColumnsChanged);
            Ok(visible)
        })
    }

    pub fn set_column_visible(&self, name: &str, visible: bool) -> ListResult<()> {
        self.update(|state| {
            state.columns.set_visible(name, visible)?;
            self.emit(ListEvent::ColumnsChanged);
            Ok(())
        })
    }

    pub fn reorder_column(&self, from: usize, to: usize) -> ListResult<()> {
        self.update(|state| {
            state.columns.reorder(from, to)?;
            self.emit(ListEvent::ColumnsChanged);
            Ok(())
        })
    }

    /// Close the column editor without saving
    pub fn cancel_column_edit(&self) -> ListResult<()> {
        self.update(|state| {
            state.columns.cancel();
            self.emit(ListEvent::ColumnsChanged);
            Ok(())
        })
    }

    /// Persist the current column choice and refetch the list once
    pub async fn save_columns(&self) -> ListResult<FetchOutcome> {
        let fields = self.update(|state| {
            if state.columns.saving || state.columns.resetting {
                return Err(ListError::NoOp(COLUMNS_BUSY.to_string()));
            }
            let fields = state.columns.prepare_save()?;
            state.columns.saving = true;
            self.emit(ListEvent::ColumnsChanged);
            Ok(fields)
        })?;

        let result = self.inner.services.columns.save(&fields).await;

        self.update(|state| {
            state.columns.saving = false;
            self.emit(ListEvent::ColumnsChanged);
            result?;
            state.columns.mark_saved(fields);
            Ok(())
        })?;

        self.inner.services.notifier.success(COLUMNS_SAVED);
        self.refresh().await
    }

    /// Make the defaults the user's column choice and refetch the list once
    pub async fn reset_columns(&self) -> ListResult<FetchOutcome> {
        self.update(|state| {
            if state.columns.saving || state.columns.resetting {
                return Err(ListError::NoOp(COLUMNS_BUSY.to_string()));
            }
            state.columns.resetting = true;
            self.emit(ListEvent::ColumnsChanged);
            Ok(())
        })?;

        let result = self.inner.services.columns.reset_to_default().await;

        self.update(|state| {
            state.columns.resetting = false;
            self.emit(ListEvent::ColumnsChanged);
            result?;
            state.columns.mark_reset();
            Ok(())
        })?;

        self.inner.services.notifier.success(COLUMNS_RESET);
        self.refresh().await
    }

    async fn load_columns(&self) -> ListResult<()> {
        let result = self.inner.services.columns.get().await;
        self.update(|state| {
            state.columns.load(result?);
            self.emit(ListEvent::ColumnsChanged);
            Ok(())
        })
    }

    async fn load_options(&self) -> ListResult<()> {
        let result = self.inner.services.options.get().await;
        self.update(|state| {
            let options = result?;
            state.filter.resolve_labels(&options);
            state.options = options;
            self.emit(ListEvent::OptionsLoaded);
            Ok(())
        })
    }

    // Read-only views

    /// Parameters an export of the current list would send: the applied
    /// filter plus the screen's required parameters, without paging
    pub fn export_params(&self) -> ParamMap {
        let state = self.state();
        let mut params = filter_params(state.filter.applied());
        params.extend(self.inner.definition.required_params.clone());
        params
    }

    pub fn snapshot(&self) -> ListSnapshot {
        let state = self.state();
        ListSnapshot {
            screen: self.key().to_string(),
            docs: state.docs.clone(),
            headers: state.headers.clone(),
            pagination: state.pagination,
            draft: state.filter.draft().clone(),
            applied: state.filter.applied().clone(),
            phase: state.filter.phase(),
            options: state.options.clone(),
            columns: state.columns.clone(),
            loading: state.query.is_loading(),
            has_loaded: state.query.has_loaded(),
            last_error: state.last_error.clone(),
        }
    }

    /// Issue a list fetch and apply its result if it is still current.
    /// `commit` carries the filter snapshot of an apply; without it the
    /// applied filter is refetched.
    async fn fetch(&self, page: u32, limit: u32, commit: Option<FilterMap>) -> ListResult<FetchOutcome> {
        let mut step = self.fetch_page(page, limit, commit, None).await;
        loop {
            match step {
                FetchStep::Done(outcome) => return outcome,
                FetchStep::Refetch {
                    page,
                    limit,
                    commit,
                    after,
                } => {
                    step = self.fetch_page(page, limit, commit, Some(after)).await;
                }
            }
        }
    }

    /// One request/settle round. A response for a page past the last one is
    /// not stored; the last page is requested instead, once, unless a newer
    /// request was issued in between. `retry_of` is the version being
    /// replaced by such a refetch.
    async fn fetch_page(
        &self,
        page: u32,
        limit: u32,
        commit: Option<FilterMap>,
        retry_of: Option<u64>,
    ) -> FetchStep {
        let key = self.key().to_string();

        let ticket = {
            let mut guard = self.state();
            let state = &mut *guard;
            if state.unmounted {
                return FetchStep::Done(Err(ListError::Unmounted(key)));
            }
            if let Some(after) = retry_of {
                if state.query.latest_version() != after {
                    debug!("[{}] Refetch after v{} superseded", key, after);
                    return FetchStep::Done(Ok(FetchOutcome::Superseded));
                }
                // The commit travels with the refetch
                state.pending = None;
            }

            let filters = commit.clone().unwrap_or_else(|| state.filter.applied().clone());
            let request = QueryRequest::new(&filters, page, limit, &self.inner.definition.required_params);
            let outgoing = request.clone();
            let service = Arc::clone(&self.inner.services.list);
            let ticket = state.query.issue(&request, move || {
                async move { service.fetch(&outgoing).await }.boxed()
            });

            if ticket.joined {
                debug!("[{}] Joining in-flight fetch v{}", key, ticket.version);
            } else {
                if let Some(previous) = state.pending.take() {
                    debug!("[{}] Apply v{} superseded by v{}", key, previous.version, ticket.version);
                    if commit.is_none() {
                        state.filter.fail_apply();
                    }
                }
                debug!("[{}] Fetching v{} {:?}", key, ticket.version, ticket.fingerprint);
                self.emit(ListEvent::Loading {
                    version: ticket.version,
                });
            }

            if let Some(filters) = commit {
                state.pending = Some(PendingCommit {
                    version: ticket.version,
                    filters,
                });
            }
            ticket
        };

        let result = ticket.wait().await;

        let mut committed = None;
        let outcome = {
            let mut guard = self.state();
            let state = &mut *guard;
            if state.unmounted {
                debug!("[{}] Discarding response v{} after unmount", key, ticket.version);
                return FetchStep::Done(Ok(FetchOutcome::Discarded));
            }

            match state.query.settle(ticket.version) {
                Settlement::Stale => {
                    debug!("[{}] {}", key, ListError::StaleResponse(ticket.version));
                    return FetchStep::Done(Ok(FetchOutcome::Superseded));
                }
                // The caller that started the fetch has applied or reported it
                Settlement::AlreadySettled => return FetchStep::Done(result.map(|_| FetchOutcome::Joined)),
                Settlement::Accept => {}
            }

            let pending = state
                .pending
                .take()
                .filter(|pending| pending.version == ticket.version);

            match result {
                Ok(loaded) => {
                    let page_limit = if loaded.limit > 0 { loaded.limit } else { limit };
                    let last = PaginationState::pages_for(loaded.total, page_limit);
                    if retry_of.is_none() && last > 0 && loaded.page > last {
                        info!(
                            "[{}] Page {} is past the last page, fetching page {}",
                            key, loaded.page, last
                        );
                        let commit = pending.as_ref().map(|pending| pending.filters.clone());
                        state.pending = pending;
                        return FetchStep::Refetch {
                            page: last,
                            limit: page_limit,
                            commit,
                            after: ticket.version,
                        };
                    }

                    state.pagination.limit = limit;
                    state.pagination.apply_response(loaded.page, loaded.limit, loaded.total);
                    state.docs = loaded.docs;
                    state.headers = loaded.headers;
                    state.query.mark_loaded();
                    state.last_error = None;

                    if let Some(pending) = pending {
                        state.filter.commit_apply(pending.filters.clone());
                        self.emit(ListEvent::FilterApplied(pending.filters.clone()));
                        committed = Some(pending.filters);
                    }

                    let params = state.url.params_for(
                        state.pagination.page,
                        state.pagination.limit,
                        state.filter.applied(),
                    );
                    if state.url.mark_written(&params) {
                        self.inner.services.address.set_params(&params, NavigationMode::Replace);
                        self.emit(ListEvent::AddressWritten(params));
                    }

                    info!(
                        "[{}] Page {} of {} ({} of {} records)",
                        key,
                        state.pagination.page,
                        state.pagination.pages,
                        state.docs.len(),
                        state.pagination.total
                    );
                    self.emit(ListEvent::Loaded {
                        version: ticket.version,
                        page: state.pagination.page,
                        total: state.pagination.total,
                    });
                    if state.docs.is_empty() {
                        self.emit(ListEvent::Empty);
                    }
                    Ok(FetchOutcome::Applied)
                }
                Err(err) => {
                    if pending.is_some() {
                        state.filter.fail_apply();
                    }
                    // Last good data stays; before the first success the list is still empty
                    state.last_error = Some(err.clone());
                    self.emit(ListEvent::FetchFailed(err.clone()));
                    Err(err)
                }
            }
        };

        if let Some(filters) = committed {
            if let Err(e) = self.inner.cache_writer.write(ticket.version, &key, &filters).await {
                warn!("[{}] Failed to cache applied filters: {}", key, e);
            }
        }

        if let Err(err) = &outcome {
            self.report(err);
        }
        FetchStep::Done(outcome)
    }
}

/// Seeded values can come from a hand-edited address; an inverted pair is
/// dropped so mounting still fetches
fn drop_inverted_ranges(filters: &mut FilterMap, ranges: &[DateRange]) {
    for range in ranges {
        if let Err(err) = validate_date_ranges(filters, std::slice::from_ref(range)) {
            warn!(
                "Dropping seeded range {}..{}: {}",
                range.start, range.end, err
            );
            filters.remove(&range.start);
            filters.remove(&range.end);
        }
    }
}
