//! `SearchController` - One live list view
//!
//! `TigerStyle`: Two modes, one fetch slot.
//!
//! - Browse: visible items are derived from the registry (filter, scope,
//!   sort, slice to `pages * page_size`); remote pages are fetched only to
//!   extend what the registry holds.
//! - Search: results come from server-executed queries, appended page by
//!   page and kept apart from the browse list.
//!
//! Fetches run as spawned tasks and report back through the view's own
//! channel. `pump` applies them on the caller's task; an outcome whose ticket
//! is no longer current is discarded.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::flight::{FetchHandle, FetchOutcome, FetchPurpose, FetchSlot, FetchTicket};
use crate::config::CacheConfig;
use crate::constants::{PAGINATION_PAGE_SIZE_MAX, QUERY_BYTES_MAX};
use crate::entity::{EntityKind, EntityRef};
use crate::events::{ChangeEvent, ChangeKind};
use crate::pagination::{compute_total, signature_for, CursorCache, Pagination};
use crate::query::{build_request, Clause, FilterBy, LocalFilter, PageRequest, Request, SortBy};
use crate::registry::{EntityRegistry, Registries};
use crate::source::{EntitySource, Envelope, FetchError};
use crate::tree::Tree;

// =============================================================================
// View state types
// =============================================================================

/// Which part of the registry a view lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListScope {
    /// Every entity of the kind
    #[default]
    All,
    /// Entities without a parent
    Roots,
    /// Direct children of one parent
    Children(String),
}

impl ListScope {
    /// Children of `parent_id`.
    #[must_use]
    pub fn children(parent_id: impl Into<String>) -> Self {
        Self::Children(parent_id.into())
    }

    /// Parent the view is scoped to.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            Self::Children(parent_id) => Some(parent_id),
            Self::All | Self::Roots => None,
        }
    }

    fn clause(&self) -> Option<Clause> {
        match self {
            Self::All => None,
            Self::Roots => Some(Clause::is_null("ParentID")),
            Self::Children(parent_id) => Some(Clause::equals("ParentID", parent_id.as_str())),
        }
    }
}

/// Current mode of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Registry-derived list
    Browse,
    /// Server-executed search results
    Search,
}

/// What applying a fetch outcome did.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// A browse page was merged
    Browse {
        /// Server page merged
        page: usize,
        /// Items added to the visible list
        added: usize,
        /// Cursor after the merge
        pagination: Pagination,
    },
    /// A search page was merged
    Search {
        /// Server page merged
        page: usize,
        /// Items appended to the results
        added: usize,
        /// Search cursor after the merge
        pagination: Pagination,
    },
    /// The fetch failed; lists and cursors are untouched
    Failed(FetchError),
    /// The outcome belonged to a cancelled fetch
    Discarded,
}

/// Answer to an open/scroll/search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// A fetch is already in flight; nothing issued
    Pending,
    /// A fetch was issued
    Fetching(FetchTicket),
    /// More items shown from the registry, no fetch needed
    Advanced,
    /// Every page has been fetched and shown
    Exhausted,
    /// Browse state restored from the cursor cache
    Resumed,
    /// Nothing to do (no active search query)
    Idle,
}

enum Woke {
    Outcome(Option<FetchOutcome>),
    TaskEnded { cancelled: bool },
}

// =============================================================================
// SearchController
// =============================================================================

/// Controller of one list view.
pub struct SearchController<S: EntitySource> {
    kind: EntityKind,
    source: Arc<S>,
    registry: EntityRegistry,
    cursors: CursorCache,
    cursor_prefix: String,
    page_size: usize,

    scope: ListScope,
    filter: FilterBy,
    sort: SortBy,
    mode: ViewMode,

    browse_cursor: Option<Pagination>,
    browse_pages: usize,
    visible: Vec<EntityRef>,

    search_query: Option<String>,
    search_cursor: Option<Pagination>,
    results: Vec<EntityRef>,

    slot: FetchSlot,
    outcome_tx: mpsc::UnboundedSender<FetchOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<FetchOutcome>,
}

impl<S: EntitySource> SearchController<S> {
    /// Create a browse view over `kind`.
    ///
    /// # Panics
    /// Panics if the configured page size is out of range.
    #[must_use]
    pub fn new(
        kind: EntityKind,
        source: Arc<S>,
        registries: &Registries,
        cursors: CursorCache,
        config: &CacheConfig,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            kind,
            source,
            registry: registries.for_kind(kind),
            cursors,
            cursor_prefix: format!("{}:{}", config.cursor_prefix, kind.as_str()),
            page_size: checked_page_size(config.page_size),
            scope: ListScope::All,
            filter: FilterBy::new(),
            sort: SortBy::new(),
            mode: ViewMode::Browse,
            browse_cursor: None,
            browse_pages: 0,
            visible: Vec::new(),
            search_query: None,
            search_cursor: None,
            results: Vec::new(),
            slot: FetchSlot::new(),
            outcome_tx,
            outcome_rx,
        }
    }

    /// Restrict the view to a scope.
    #[must_use]
    pub fn with_scope(mut self, scope: ListScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the browse filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterBy) -> Self {
        self.filter = filter;
        self
    }

    /// Set the sort; an empty sort means `OrderIndex`, then `Title`.
    #[must_use]
    pub fn with_sort(mut self, sort: SortBy) -> Self {
        self.sort = sort;
        self
    }

    /// Override the page size.
    ///
    /// # Panics
    /// Panics if `page_size` is out of range.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = checked_page_size(page_size);
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Kind listed by the view.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Scope of the view.
    #[must_use]
    pub fn scope(&self) -> &ListScope {
        &self.scope
    }

    /// Records per page.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Browse list as currently shown.
    #[must_use]
    pub fn visible(&self) -> &[EntityRef] {
        &self.visible
    }

    /// Search results fetched so far.
    #[must_use]
    pub fn results(&self) -> &[EntityRef] {
        &self.results
    }

    /// Active search query.
    #[must_use]
    pub fn search_query(&self) -> Option<&str> {
        self.search_query.as_deref()
    }

    /// Cursor of the last fetched browse page.
    #[must_use]
    pub fn browse_cursor(&self) -> Option<Pagination> {
        self.browse_cursor
    }

    /// Cursor of the last fetched search page.
    #[must_use]
    pub fn search_cursor(&self) -> Option<Pagination> {
        self.search_cursor
    }

    /// Records the server has delivered for the browse query so far.
    #[must_use]
    pub fn loaded_total(&self) -> usize {
        self.browse_cursor
            .map_or(0, |cursor| compute_total(cursor.page_number, &cursor))
    }

    /// Records the server has delivered for the search query so far.
    #[must_use]
    pub fn search_loaded_total(&self) -> usize {
        self.search_cursor
            .map_or(0, |cursor| compute_total(cursor.page_number, &cursor))
    }

    /// Whether a fetch is in flight.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.slot.is_busy()
    }

    /// Ticket of the fetch in flight.
    #[must_use]
    pub fn current_ticket(&self) -> Option<FetchTicket> {
        self.slot.current_ticket()
    }

    /// Cursor-cache signature of the browse query.
    #[must_use]
    pub fn signature(&self) -> String {
        signature_for(&self.browse_request(), &self.cursor_prefix)
    }

    // =========================================================================
    // Browse mode
    // =========================================================================

    /// Enter browse mode.
    ///
    /// Resumes from the cursor cache when this exact query was fetched
    /// before; otherwise shows what the registry holds and fetches page 1.
    pub fn open(&mut self) -> ScrollOutcome {
        self.slot.cancel();
        self.mode = ViewMode::Browse;
        self.reset_search();

        let signature = self.signature();
        if let Some(cursor) = self.cursors.get_signature(&signature) {
            self.browse_cursor = Some(cursor);
            self.browse_pages = cursor.page_number.max(1);
            self.derive_browse();
            tracing::debug!(kind = %self.kind, %signature, page = cursor.page_number, "browse resumed");
            return ScrollOutcome::Resumed;
        }

        self.browse_cursor = None;
        self.browse_pages = 1;
        self.derive_browse();
        ScrollOutcome::Fetching(self.fetch_browse(1, 1))
    }

    /// Replace the browse filter and reopen.
    pub fn set_filter(&mut self, filter: FilterBy) -> ScrollOutcome {
        self.filter = filter;
        self.open()
    }

    /// Replace the sort and reopen.
    pub fn set_sort(&mut self, sort: SortBy) -> ScrollOutcome {
        self.sort = sort;
        self.open()
    }

    /// Infinite-scroll request.
    ///
    /// Never issues a second fetch while one is in flight, and never asks
    /// for page N+1 before page N was merged.
    pub fn load_more(&mut self) -> ScrollOutcome {
        if self.slot.is_busy() {
            return ScrollOutcome::Pending;
        }
        match self.mode {
            ViewMode::Browse => self.load_more_browse(),
            ViewMode::Search => self.load_more_search(),
        }
    }

    fn load_more_browse(&mut self) -> ScrollOutcome {
        let Some(cursor) = self.browse_cursor else {
            let show_pages = self.browse_pages.max(1);
            return ScrollOutcome::Fetching(self.fetch_browse(1, show_pages));
        };

        let matching = self.matching_browse().len();
        let next_limit = (self.browse_pages + 1).saturating_mul(self.page_size);
        let has_hidden = matching > self.visible.len();

        if matching >= next_limit || (cursor.is_exhausted() && has_hidden) {
            self.browse_pages += 1;
            self.derive_browse();
            return ScrollOutcome::Advanced;
        }
        if cursor.is_exhausted() {
            return ScrollOutcome::Exhausted;
        }
        ScrollOutcome::Fetching(self.fetch_browse(cursor.next_page(), self.browse_pages + 1))
    }

    /// Recompute the browse list from the registry.
    ///
    /// Returns the number of visible items.
    pub fn derive_browse(&mut self) -> usize {
        let limit = self.browse_pages.saturating_mul(self.page_size);
        let mut items = self.matching_browse();
        items.truncate(limit);
        self.visible = items;
        self.visible.len()
    }

    fn effective_sort(&self) -> SortBy {
        if self.sort.is_empty() {
            SortBy::tree_default()
        } else {
            self.sort.clone()
        }
    }

    fn browse_filter(&self) -> FilterBy {
        let mut filter = self.filter.clone();
        if let Some(clause) = self.scope.clause() {
            filter.and.push(clause);
        }
        filter
    }

    fn browse_request(&self) -> Request {
        build_request(self.browse_filter(), self.effective_sort(), None)
    }

    fn search_request(&self, query: &str) -> Request {
        let filter = FilterBy {
            query: Some(query.to_string()),
            and: self.browse_filter().and,
        };
        build_request(filter, self.effective_sort(), None)
    }

    /// Every registry entry the browse query matches, sorted.
    fn matching_browse(&self) -> Vec<EntityRef> {
        let filter = LocalFilter::new(&self.browse_filter());
        let sort = self.effective_sort();

        let parent = self
            .scope
            .parent_id()
            .and_then(|id| self.registry.get(id))
            .map(|handle| handle.read().clone());
        let mut items = match parent {
            Some(parent) => Tree::new(&self.registry).children_sorted_by(&parent, &sort),
            None => {
                let mut items = self.registry.find(|entity| filter.matches(entity));
                items.sort_by(|a, b| sort.compare(&a.read(), &b.read()));
                items
            }
        };
        items.retain(|handle| filter.matches(&handle.read()));
        items
    }

    // =========================================================================
    // Search mode
    // =========================================================================

    /// Enter search mode with empty results.
    pub fn open_search(&mut self) {
        self.slot.cancel();
        self.mode = ViewMode::Search;
        self.reset_search();
    }

    /// Start a new server-side search, cancelling any fetch in flight.
    ///
    /// A blank query only clears the results.
    pub fn start_search(&mut self, query: &str) -> ScrollOutcome {
        self.slot.cancel();
        self.mode = ViewMode::Search;
        self.reset_search();

        let query = bounded_query(query.trim());
        if query.is_empty() {
            return ScrollOutcome::Idle;
        }

        self.search_query = Some(query.to_string());
        ScrollOutcome::Fetching(self.fetch_search(query.to_string(), 1))
    }

    /// Empty the results, staying in search mode.
    pub fn clear_search(&mut self) {
        self.cancel_search_fetch();
        self.mode = ViewMode::Search;
        self.reset_search();
    }

    /// Leave search mode and restore the browse list.
    pub fn cancel_search(&mut self) {
        self.cancel_search_fetch();
        self.mode = ViewMode::Browse;
        self.reset_search();
        self.derive_browse();
    }

    fn load_more_search(&mut self) -> ScrollOutcome {
        let Some(query) = self.search_query.clone() else {
            return ScrollOutcome::Idle;
        };
        match self.search_cursor {
            Some(cursor) if cursor.is_exhausted() => ScrollOutcome::Exhausted,
            Some(cursor) => ScrollOutcome::Fetching(self.fetch_search(query, cursor.next_page())),
            None => ScrollOutcome::Fetching(self.fetch_search(query, 1)),
        }
    }

    fn reset_search(&mut self) {
        self.search_query = None;
        self.search_cursor = None;
        self.results.clear();
    }

    fn cancel_search_fetch(&mut self) {
        if matches!(self.slot.current_purpose(), Some(FetchPurpose::Search { .. })) {
            self.slot.cancel();
        }
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Abort the fetch in flight; returns whether there was one.
    ///
    /// Idempotent and safe after the fetch completed.
    pub fn cancel(&mut self) -> bool {
        self.slot.cancel()
    }

    fn fetch_browse(&mut self, page: usize, show_pages: usize) -> FetchTicket {
        let request = self
            .browse_request()
            .with_page(PageRequest::new(page, self.page_size));
        self.fetch(FetchPurpose::Browse { page, show_pages }, request)
    }

    fn fetch_search(&mut self, query: String, page: usize) -> FetchTicket {
        let request = self
            .search_request(&query)
            .with_page(PageRequest::new(page, self.page_size));
        self.fetch(FetchPurpose::Search { page }, request)
    }

    fn fetch(&mut self, purpose: FetchPurpose, request: Request) -> FetchTicket {
        let ticket = self.slot.issue();
        let source = Arc::clone(&self.source);
        let outcome_tx = self.outcome_tx.clone();
        let kind = self.kind;

        tracing::debug!(kind = %kind, %ticket, ?purpose, "fetch issued");
        let task = tokio::spawn(async move {
            let result = source.search(kind, &request).await;
            if outcome_tx
                .send(FetchOutcome {
                    ticket,
                    purpose,
                    result,
                })
                .is_err()
            {
                tracing::trace!(%ticket, "view dropped before fetch completed");
            }
        });

        self.slot.install(FetchHandle {
            ticket,
            purpose,
            task,
        });
        ticket
    }

    /// Wait for the fetch in flight and apply its outcome.
    ///
    /// Queued outcomes of cancelled fetches are returned first, as
    /// `Discarded`. Returns `None` when nothing is in flight or queued.
    pub async fn pump(&mut self) -> Option<ViewUpdate> {
        if let Ok(outcome) = self.outcome_rx.try_recv() {
            return Some(self.apply_outcome(outcome));
        }

        let handle = self.slot.current_mut()?;
        let ticket = handle.ticket;
        let woke = tokio::select! {
            biased;
            outcome = self.outcome_rx.recv() => Woke::Outcome(outcome),
            joined = &mut handle.task => Woke::TaskEnded {
                cancelled: joined.as_ref().is_err_and(tokio::task::JoinError::is_cancelled),
            },
        };

        match woke {
            Woke::Outcome(Some(outcome)) => Some(self.apply_outcome(outcome)),
            Woke::Outcome(None) => None,
            Woke::TaskEnded { cancelled } => {
                // The task sends before it ends
                while let Ok(outcome) = self.outcome_rx.try_recv() {
                    if outcome.ticket == ticket {
                        return Some(self.apply_outcome(outcome));
                    }
                    tracing::debug!(ticket = %outcome.ticket, "stale fetch outcome discarded");
                }
                self.slot.finish(ticket);
                tracing::warn!(kind = %self.kind, %ticket, cancelled, "fetch task ended without an outcome");
                let err = if cancelled {
                    FetchError::Cancelled
                } else {
                    FetchError::remote("fetch task ended without an outcome")
                };
                Some(ViewUpdate::Failed(err))
            }
        }
    }

    /// Apply an outcome that already arrived, without waiting.
    pub fn try_pump(&mut self) -> Option<ViewUpdate> {
        let outcome = self.outcome_rx.try_recv().ok()?;
        Some(self.apply_outcome(outcome))
    }

    /// Pump until nothing is in flight or queued.
    pub async fn settle(&mut self) -> Vec<ViewUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.pump().await {
            updates.push(update);
        }
        updates
    }

    /// Apply one fetch outcome.
    ///
    /// Stale tickets are discarded; failures leave lists and cursors
    /// untouched.
    #[tracing::instrument(level = "debug", skip(self, outcome), fields(kind = %self.kind, ticket = %outcome.ticket))]
    pub fn apply_outcome(&mut self, outcome: FetchOutcome) -> ViewUpdate {
        if self.slot.finish(outcome.ticket).is_none() {
            tracing::debug!("stale fetch outcome discarded");
            return ViewUpdate::Discarded;
        }

        let envelope = match outcome.result {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(error = %err, transient = err.is_transient(), "fetch failed");
                return ViewUpdate::Failed(err);
            }
        };

        match outcome.purpose {
            FetchPurpose::Browse { page, show_pages } => self.merge_browse(&envelope, page, show_pages),
            FetchPurpose::Search { page } => self.merge_search(&envelope, page),
        }
    }

    /// Upsert a page into the registry; malformed objects are skipped.
    fn merge(&self, envelope: &Envelope, page: usize) -> (Vec<EntityRef>, Pagination) {
        let mut merged = Vec::with_capacity(envelope.objects.len());
        for raw in &envelope.objects {
            match self.registry.update(raw.clone()) {
                Ok(handle) => merged.push(handle),
                Err(err) => {
                    tracing::warn!(kind = %self.kind, error = %err, "malformed object skipped");
                }
            }
        }

        let mut cursor = match envelope.pagination {
            Some(remote) if remote.page_size != self.page_size => {
                tracing::warn!(
                    kind = %self.kind,
                    requested = self.page_size,
                    answered = remote.page_size,
                    "server page size differs; cursor kept on the requested size"
                );
                Pagination::from_totals(remote.total_records, self.page_size, page)
            }
            Some(_) => Pagination::get_default(Some(envelope)),
            None => Pagination::from_totals(
                (page - 1) * self.page_size + envelope.objects.len(),
                self.page_size,
                page,
            ),
        };
        cursor.page_number = page;
        (merged, cursor)
    }

    fn merge_browse(&mut self, envelope: &Envelope, page: usize, show_pages: usize) -> ViewUpdate {
        let before = self.visible.len();
        let (_, cursor) = self.merge(envelope, page);

        self.cursors.set(self.signature(), cursor);
        self.browse_cursor = Some(cursor);
        self.browse_pages = self.browse_pages.max(show_pages);
        self.derive_browse();

        ViewUpdate::Browse {
            page,
            added: self.visible.len().saturating_sub(before),
            pagination: cursor,
        }
    }

    fn merge_search(&mut self, envelope: &Envelope, page: usize) -> ViewUpdate {
        let (merged, cursor) = self.merge(envelope, page);
        let before = self.results.len();

        for handle in merged {
            if !self.results.iter().any(|existing| Arc::ptr_eq(existing, &handle)) {
                self.results.push(handle);
            }
        }
        self.search_cursor = Some(cursor);

        ViewUpdate::Search {
            page,
            added: self.results.len() - before,
            pagination: cursor,
        }
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// React to a change event already applied to the registry.
    ///
    /// Returns whether the visible list or the results were touched.
    pub fn handle_change(&mut self, event: &ChangeEvent) -> bool {
        if event.entity_kind() != Some(self.kind) {
            return false;
        }

        match event.kind {
            ChangeKind::Deleted => {
                let before = self.visible.len() + self.results.len();
                self.visible.retain(|handle| handle.read().id != event.id);
                self.results.retain(|handle| handle.read().id != event.id);
                before != self.visible.len() + self.results.len()
            }
            ChangeKind::Created | ChangeKind::Updated => {
                self.rederive_if_touched(&event.id, &[event.parent_id()])
            }
            ChangeKind::Moved => {
                self.rederive_if_touched(&event.id, &[event.parent_id(), event.old_parent_id()])
            }
        }
    }

    /// Re-derive when the event concerns this view's scope: the scoped parent
    /// itself, an entity it shows, or an entity now filed under it.
    fn rederive_if_touched(&mut self, id: &str, parents: &[Option<&str>]) -> bool {
        let Some(parent_id) = self.scope.parent_id() else {
            self.derive_browse();
            return true;
        };

        let current_parent = self
            .registry
            .get(id)
            .and_then(|handle| handle.read().parent_id().map(str::to_string));
        let touched = id == parent_id
            || current_parent.as_deref() == Some(parent_id)
            || parents.iter().flatten().any(|p| *p == parent_id)
            || self.visible.iter().any(|handle| handle.read().id == id);
        if !touched {
            return false;
        }

        // Scoped views show the parent's children wholesale
        let children = self.matching_browse();
        self.browse_pages = self.browse_pages.max(children.len().div_ceil(self.page_size));
        self.visible = children;
        true
    }
}

fn checked_page_size(page_size: usize) -> usize {
    // Precondition
    assert!(
        (1..=PAGINATION_PAGE_SIZE_MAX).contains(&page_size),
        "page_size must be in [1, {PAGINATION_PAGE_SIZE_MAX}], got {page_size}"
    );
    page_size
}

/// Cut a query to `QUERY_BYTES_MAX` on a character boundary.
fn bounded_query(query: &str) -> &str {
    if query.len() <= QUERY_BYTES_MAX {
        return query;
    }
    let mut end = QUERY_BYTES_MAX;
    while !query.is_char_boundary(end) {
        end -= 1;
    }
    tracing::warn!(bytes = query.len(), "search query truncated");
    &query[..end]
}
