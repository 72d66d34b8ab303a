//! Request versioning for list fetches
//!
//! Every issued fetch gets a monotonically increasing version. Only the
//! result of the most recently issued version is accepted into state; older
//! results are discarded when they arrive. A request whose fingerprint equals
//! the one already in flight joins that fetch instead of starting another.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;

use crate::errors::ListError;
use crate::models::{ListPage, QueryRequest};

/// Shared handle to a list fetch; every joined caller gets the same result
pub type SharedFetch = Shared<BoxFuture<'static, Result<ListPage, ListError>>>;

/// Normalized identity of a request
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(request: &QueryRequest) -> Self {
        // `to_params` is ordered and omits blank filters; length prefixes keep
        // keys and values from running into each other.
        let mut key = String::new();
        for (name, value) in request.to_params() {
            key.push_str(&format!("{}:{}={}:{};", name.len(), name, value.len(), value));
        }
        Fingerprint(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}

struct InFlight {
    version: u64,
    fingerprint: Fingerprint,
    fetch: SharedFetch,
}

/// Handle returned when a fetch is issued or joined
pub struct Ticket {
    pub version: u64,
    pub fingerprint: Fingerprint,
    /// True when this caller joined an identical fetch already in flight
    pub joined: bool,
    fetch: SharedFetch,
}

impl Ticket {
    /// Future resolving to the fetch result
    pub fn wait(&self) -> SharedFetch {
        self.fetch.clone()
    }
}

/// What to do with a result that just arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Latest request; apply the result to state
    Accept,
    /// Latest request, but another caller sharing it already applied it
    AlreadySettled,
    /// A newer request was issued since; discard
    Stale,
}

#[derive(Default)]
pub struct QueryCoordinator {
    latest: u64,
    last_settled: u64,
    in_flight: Option<InFlight>,
    loading: bool,
    loaded_once: bool,
}

impl QueryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether any fetch has ever succeeded on this screen instance
    pub fn has_loaded(&self) -> bool {
        self.loaded_once
    }

    pub fn latest_version(&self) -> u64 {
        self.latest
    }

    /// Issue `request`, starting a new fetch with `start` unless an identical
    /// one is already in flight
    pub fn issue<F>(&mut self, request: &QueryRequest, start: F) -> Ticket
    where
        F: FnOnce() -> BoxFuture<'static, Result<ListPage, ListError>>,
    {
        let fingerprint = Fingerprint::of(request);

        if let Some(in_flight) = &self.in_flight {
            if in_flight.fingerprint == fingerprint && in_flight.version == self.latest {
                return Ticket {
                    version: in_flight.version,
                    fingerprint,
                    joined: true,
                    fetch: in_flight.fetch.clone(),
                };
            }
        }

        self.latest += 1;
        let fetch = start().shared();
        self.in_flight = Some(InFlight {
            version: self.latest,
            fingerprint: fingerprint.clone(),
            fetch: fetch.clone(),
        });
        self.loading = true;

        Ticket {
            version: self.latest,
            fingerprint,
            joined: false,
            fetch,
        }
    }

    /// Decide what happens to the result of `version`
    pub fn settle(&mut self, version: u64) -> Settlement {
        if version != self.latest {
            return Settlement::Stale;
        }
        if self.last_settled == version {
            return Settlement::AlreadySettled;
        }
        self.last_settled = version;
        self.in_flight = None;
        self.loading = false;
        Settlement::Accept
    }

    pub fn mark_loaded(&mut self) {
        self.loaded_once = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterMap, FilterValue, ParamMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn request(filters: &FilterMap, page: u32) -> QueryRequest {
        QueryRequest::new(filters, page, 15, &ParamMap::new())
    }

    fn ok_fetch(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> BoxFuture<'static, Result<ListPage, ListError>> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(ListPage::default()) }.boxed()
        }
    }

    #[test]
    fn test_fingerprint_ignores_blank_filters() {
        let empty = FilterMap::new();
        let mut blank = FilterMap::new();
        blank.insert("entityType".into(), FilterValue::select("", ""));
        blank.insert("name".into(), FilterValue::text("   "));

        assert_eq!(Fingerprint::of(&request(&empty, 1)), Fingerprint::of(&request(&blank, 1)));
        assert_ne!(Fingerprint::of(&request(&empty, 1)), Fingerprint::of(&request(&empty, 2)));
    }

    #[tokio::test]
    async fn test_identical_requests_join_in_flight_fetch() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut coordinator = QueryCoordinator::new();

        let first = coordinator.issue(&request(&FilterMap::new(), 1), ok_fetch(&counter));
        let second = coordinator.issue(&request(&FilterMap::new(), 1), ok_fetch(&counter));

        assert!(!first.joined);
        assert!(second.joined);
        assert_eq!(first.version, second.version);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let (a, b) = futures::join!(first.wait(), second.wait());
        assert_eq!(a, b);
        assert_eq!(coordinator.settle(first.version), Settlement::Accept);
        assert_eq!(coordinator.settle(second.version), Settlement::AlreadySettled);
    }

    #[test]
    fn test_newer_request_makes_older_one_stale() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut coordinator = QueryCoordinator::new();

        let older = coordinator.issue(&request(&FilterMap::new(), 1), ok_fetch(&counter));
        let newer = coordinator.issue(&request(&FilterMap::new(), 2), ok_fetch(&counter));
        assert!(coordinator.is_loading());

        assert_eq!(coordinator.settle(newer.version), Settlement::Accept);
        assert!(!coordinator.is_loading());
        assert_eq!(coordinator.settle(older.version), Settlement::Stale);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_request_after_settlement_starts_new_fetch() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut coordinator = QueryCoordinator::new();

        let first = coordinator.issue(&request(&FilterMap::new(), 1), ok_fetch(&counter));
        coordinator.settle(first.version);
        let again = coordinator.issue(&request(&FilterMap::new(), 1), ok_fetch(&counter));

        assert!(!again.joined);
        assert!(again.version > first.version);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
