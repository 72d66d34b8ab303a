//! Page and page-size bookkeeping

/// Page sizes offered by every list screen
pub const PAGE_SIZES: [u32; 6] = [10, 15, 20, 25, 50, 100];

/// Page size used when nothing else is known
pub const DEFAULT_LIMIT: u32 = 15;

/// Which page sizes are accepted and which one is used by default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitPolicy {
    sizes: Vec<u32>,
    default_limit: u32,
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self::new(PAGE_SIZES.to_vec(), DEFAULT_LIMIT)
    }
}

impl LimitPolicy {
    pub fn new(sizes: Vec<u32>, default_limit: u32) -> Self {
        Self {
            sizes,
            default_limit,
        }
    }

    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    pub fn is_supported(&self, limit: u32) -> bool {
        self.sizes.contains(&limit)
    }

    /// Parse a limit read from the address, falling back to the default for
    /// missing, malformed or unsupported values
    pub fn resolve(&self, raw: Option<&str>) -> u32 {
        raw.and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|limit| self.is_supported(*limit))
            .unwrap_or(self.default_limit)
    }
}

/// Current page position of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
}

impl PaginationState {
    pub fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit,
            total: 0,
            pages: 0,
        }
    }

    pub fn pages_for(total: u64, limit: u32) -> u32 {
        if limit == 0 {
            return 0;
        }
        let pages = total.div_ceil(u64::from(limit));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Clamp a requested page into `1..=pages` (or `1..` while the page
    /// count is still unknown)
    pub fn clamp_page(&self, requested: u32) -> u32 {
        let page = requested.max(1);
        if self.pages > 0 {
            page.min(self.pages)
        } else {
            page
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Store the page position reported by the server. The page count is
    /// derived from `total` and `limit` so the page invariant holds even when
    /// the server omits or misreports `pages`.
    pub fn apply_response(&mut self, page: u32, limit: u32, total: u64) {
        if limit > 0 {
            self.limit = limit;
        }
        self.total = total;
        self.pages = Self::pages_for(total, self.limit);
        self.page = self.clamp_page(page);
    }

    /// Number of the first record on the current page (1-based, 0 if empty)
    pub fn first_record(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            u64::from(self.page - 1) * u64::from(self.limit) + 1
        }
    }

    /// Number of the last record on the current page
    pub fn last_record(&self) -> u64 {
        (u64::from(self.page) * u64::from(self.limit)).min(self.total)
    }
}
