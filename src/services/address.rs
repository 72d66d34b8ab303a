//! In-process address bar backed by a URL

use anyhow::{Context, Result};
use reqwest::Url;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::{AddressBar, NavigationMode};
use crate::models::ParamMap;

const PLACEHOLDER_ORIGIN: &str = "app://creditdesk/";

struct AddressState {
    current: Url,
    history: Vec<Url>,
}

/// Address holder with browser-like push/replace semantics
pub struct MemoryAddress {
    state: Mutex<AddressState>,
}

impl MemoryAddress {
    pub fn new(url: Url) -> Self {
        Self {
            state: Mutex::new(AddressState {
                history: vec![url.clone()],
                current: url,
            }),
        }
    }

    /// Parse a full URL
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid address: {}", url))?;
        Ok(Self::new(url))
    }

    /// Address for `path` on a placeholder origin with the given query string
    pub fn with_query(path: &str, query: &str) -> Result<Self> {
        let mut url = Url::parse(PLACEHOLDER_ORIGIN)?;
        url.set_path(path);
        let query = query.trim_start_matches('?');
        url.set_query(if query.is_empty() { None } else { Some(query) });
        Ok(Self::new(url))
    }

    fn lock(&self) -> MutexGuard<'_, AddressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> Url {
        self.lock().current.clone()
    }

    /// Number of history entries, including the initial one
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }
}

impl AddressBar for MemoryAddress {
    fn params(&self) -> ParamMap {
        self.lock()
            .current
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    fn set_params(&self, params: &ParamMap, mode: NavigationMode) {
        let mut state = self.lock();
        let mut next = state.current.clone();
        if params.is_empty() {
            next.set_query(None);
        } else {
            next.query_pairs_mut().clear().extend_pairs(params.iter());
        }
        debug!("Address {:?} -> {}", mode, next);

        match mode {
            NavigationMode::Push => state.history.push(next.clone()),
            NavigationMode::Replace => {
                if let Some(last) = state.history.last_mut() {
                    *last = next.clone();
                }
            }
        }
        state.current = next;
    }
}
