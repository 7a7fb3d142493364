//! In-memory paginated mirror of a dream query.
//!
//! A `ViewCache` holds the rows one screen shows. Writes go through the
//! repository first; on success the cache publishes a `DreamEvent` and every
//! cache on the bus (this one included) reacts:
//!
//! - `Updated`: merge the changed fields into the cached row by id
//! - `Deleted`: drop the cached row by id
//! - `Created`: reload, since only the store knows where the new row sorts
//!
//! Reads recover locally (error captured, rows kept). Writes capture the
//! error and also return it.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{debug, warn};
use tokio::sync::watch;

use crate::cache::filters::CacheFilters;
use crate::domain::{Dream, DreamEvent, DreamPatch, EventKind, NewDream};
use crate::error::{DreamError, Result};
use crate::events::{EventBus, Subscription};
use crate::store::{DEFAULT_LIMIT, DreamRepository, UpdateOutcome};

/// Point-in-time copy of a cache's state for rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub items: Vec<Dream>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Pages loaded under the current filters; 0 means none yet
    pub current_page: u32,
    pub has_more: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    items: Vec<Dream>,
    error: Option<String>,
    current_page: u32,
    has_more: bool,
    filters: CacheFilters,

    /// Bumped by every refresh; page results from an older generation are dropped
    generation: u64,
    /// Store reads currently awaiting a result
    reads_in_flight: u32,
    /// A `load_next_page` is awaiting its result
    page_in_flight: bool,
    /// Cached rows removed by delete events since the last full reload
    removed: u32,
    /// An event invalidated the rows; `refresh_if_stale` will reload
    stale: bool,
    /// This cache is publishing `Created` itself and reloads inline
    publishing_create: bool,
}

struct Inner {
    repo: Arc<dyn DreamRepository>,
    bus: EventBus,
    page_size: u32,
    state: Mutex<CacheState>,
    revision: watch::Sender<u64>,
}

/// Paginated, filtered list of dreams kept in step with the store.
///
/// Subscriptions to the bus are released when the cache is dropped.
pub struct ViewCache {
    inner: Arc<Inner>,
    _subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for ViewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCache")
            .field("page_size", &self.inner.page_size)
            .field("state", &*self.inner.lock())
            .finish_non_exhaustive()
    }
}

impl ViewCache {
    /// Cache with the default page size of 20
    pub fn new(repo: Arc<dyn DreamRepository>, bus: EventBus) -> Self {
        Self::with_page_size(repo, bus, DEFAULT_LIMIT)
    }

    pub fn with_page_size(repo: Arc<dyn DreamRepository>, bus: EventBus, page_size: u32) -> Self {
        let (revision, _) = watch::channel(0);
        let inner = Arc::new(Inner {
            repo,
            bus: bus.clone(),
            page_size: page_size.max(1),
            state: Mutex::new(CacheState {
                has_more: true,
                ..CacheState::default()
            }),
            revision,
        });

        let subscriptions = vec![
            subscribe(&bus, &inner, EventKind::Created, Inner::on_created),
            subscribe(&bus, &inner, EventKind::Updated, Inner::on_updated),
            subscribe(&bus, &inner, EventKind::Deleted, Inner::on_deleted),
        ];

        Self {
            inner,
            _subscriptions: subscriptions,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.inner.page_size
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> CacheSnapshot {
        let state = self.inner.lock();
        CacheSnapshot {
            items: state.items.clone(),
            is_loading: state.reads_in_flight > 0,
            error: state.error.clone(),
            current_page: state.current_page,
            has_more: state.has_more,
        }
    }

    pub fn items(&self) -> Vec<Dream> {
        self.inner.lock().items.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().reads_in_flight > 0
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    /// Filters last passed to `refresh`
    pub fn filters(&self) -> CacheFilters {
        self.inner.lock().filters.clone()
    }

    pub fn is_stale(&self) -> bool {
        self.inner.lock().stale
    }

    /// Receiver that ticks on every state change, for UI re-rendering
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Load the first page under `filters`, replacing the cached rows.
    pub async fn refresh(&self, filters: CacheFilters) {
        self.inner.refresh(filters).await
    }

    /// Reload under the last filters if an event marked the cache stale.
    ///
    /// Returns whether a reload ran.
    pub async fn refresh_if_stale(&self) -> bool {
        self.inner.refresh_if_stale().await
    }

    /// Wait until no event-triggered reload is pending or running.
    pub async fn settle(&self) {
        let mut changes = self.inner.revision.subscribe();
        loop {
            if self.inner.refresh_if_stale().await {
                continue;
            }
            if self.inner.lock().reads_in_flight == 0 {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// Append the next page under the last filters.
    ///
    /// Returns whether more rows may follow. A short page ends the list and
    /// later calls return `false` without querying until the next refresh.
    pub async fn load_next_page(&self) -> bool {
        self.inner.load_next_page().await
    }

    /// Insert a dream, then reload every cache on the bus.
    pub async fn create_dream(&self, dream: NewDream) -> Result<Dream> {
        let created = self.inner.capture(self.inner.repo.create_dream(dream).await)?;

        self.inner.lock().publishing_create = true;
        self.inner.bus.publish(&DreamEvent::Created);
        self.inner.lock().publishing_create = false;

        let filters = self.filters();
        self.inner.refresh(filters).await;
        Ok(created)
    }

    /// Apply a partial update, then merge it into every cache on the bus.
    pub async fn update_dream(&self, id: &str, patch: DreamPatch) -> Result<()> {
        let outcome = self.inner.capture(self.inner.repo.update_dream(id, &patch).await)?;
        match outcome {
            UpdateOutcome::Updated { updated_at } => {
                self.inner.bus.publish(&DreamEvent::updated(id, patch, updated_at));
                Ok(())
            }
            UpdateOutcome::NotFound => self.inner.capture(Err(DreamError::NotFound(id.to_string()))),
        }
    }

    /// Delete a dream, then drop it from every cache on the bus.
    pub async fn delete_dream(&self, id: &str) -> Result<()> {
        let existed = self.inner.capture(self.inner.repo.delete_dream(id).await)?;
        if !existed {
            debug!("delete_dream: {} was already gone", id);
        }
        self.inner.bus.publish(&DreamEvent::deleted(id));
        Ok(())
    }

    /// Flip the stored favorite flag. Returns the new value.
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool> {
        let current = self.inner.capture(self.inner.repo.get_dream_by_id(id).await)?;
        let Some(dream) = current else {
            return self.inner.capture(Err(DreamError::NotFound(id.to_string())));
        };
        let favorite = !dream.favorite;
        self.update_dream(id, DreamPatch::new().favorite(favorite)).await?;
        Ok(favorite)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Record a write-path error before handing it back.
    fn capture<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("Dream write failed: {}", e);
            self.lock().error = Some(e.to_string());
            self.notify();
        }
        result
    }

    async fn refresh(&self, filters: CacheFilters) {
        let (generation, options) = {
            let mut state = self.lock();
            state.generation += 1;
            state.reads_in_flight += 1;
            state.stale = false;
            state.filters = filters;
            (state.generation, state.filters.list_options(self.page_size, 0))
        };
        self.notify();

        let result = self.repo.list_dreams(&options).await;

        {
            let mut state = self.lock();
            state.reads_in_flight -= 1;
            if state.generation != generation {
                debug!("Dropping superseded refresh (generation {})", generation);
            } else {
                match result {
                    Ok(page) => {
                        state.has_more = page.len() as u32 == self.page_size;
                        state.items = page;
                        state.current_page = 1;
                        state.removed = 0;
                        state.error = None;
                    }
                    Err(e) => {
                        warn!("Refresh failed, keeping {} cached dreams: {}", state.items.len(), e);
                        // Rows on screen no longer match the filters; the next
                        // page load starts over from offset 0
                        state.current_page = 0;
                        state.has_more = true;
                        state.error = Some(e.to_string());
                    }
                }
            }
        }
        self.notify();
    }

    async fn refresh_if_stale(&self) -> bool {
        let filters = {
            let state = self.lock();
            if !state.stale {
                return false;
            }
            state.filters.clone()
        };
        self.refresh(filters).await;
        true
    }

    async fn load_next_page(&self) -> bool {
        let (generation, options, first_page) = {
            let mut state = self.lock();
            if state.page_in_flight || (state.current_page > 0 && !state.has_more) {
                return state.has_more && state.current_page > 0;
            }
            state.page_in_flight = true;
            state.reads_in_flight += 1;
            let offset = (state.current_page * self.page_size).saturating_sub(state.removed);
            (
                state.generation,
                state.filters.list_options(self.page_size, offset),
                state.current_page == 0,
            )
        };
        self.notify();

        let result = self.repo.list_dreams(&options).await;

        let has_more = {
            let mut state = self.lock();
            state.reads_in_flight -= 1;
            state.page_in_flight = false;
            if state.generation != generation {
                debug!("Dropping page loaded under superseded filters");
            } else {
                match result {
                    Ok(page) => {
                        state.has_more = page.len() as u32 == self.page_size;
                        if first_page {
                            state.items = page;
                            state.current_page = 1;
                            state.removed = 0;
                        } else {
                            let fresh: Vec<Dream> = page
                                .into_iter()
                                .filter(|d| !state.items.iter().any(|cached| cached.id == d.id))
                                .collect();
                            state.items.extend(fresh);
                            state.current_page += 1;
                        }
                        state.error = None;
                    }
                    Err(e) => {
                        warn!("Loading page {} failed: {}", state.current_page + 1, e);
                        state.error = Some(e.to_string());
                    }
                }
            }
            state.has_more
        };
        self.notify();
        has_more
    }

    fn on_created(self: &Arc<Self>, _event: &DreamEvent) -> Result<()> {
        {
            let mut state = self.lock();
            if state.publishing_create {
                return Ok(());
            }
            state.stale = true;
        }
        self.notify();
        self.schedule_reload();
        Ok(())
    }

    fn on_updated(self: &Arc<Self>, event: &DreamEvent) -> Result<()> {
        let DreamEvent::Updated { id, changes, updated_at } = event else {
            return Ok(());
        };

        let reload = {
            let mut state = self.lock();
            if let Some(item) = state.items.iter_mut().find(|d| d.id == *id) {
                item.apply(changes);
                item.updated_at = updated_at.clone();
            }
            let affected = state.filters.affected_by(changes);
            if affected {
                state.stale = true;
            }
            affected
        };
        self.notify();
        if reload {
            debug!("Update to {} touches this view's order or filters; reloading", id);
            self.schedule_reload();
        }
        Ok(())
    }

    fn on_deleted(self: &Arc<Self>, event: &DreamEvent) -> Result<()> {
        let DreamEvent::Deleted { id } = event else {
            return Ok(());
        };

        {
            let mut state = self.lock();
            let before = state.items.len();
            state.items.retain(|d| d.id != *id);
            if state.items.len() < before {
                state.removed += 1;
            }
        }
        self.notify();
        Ok(())
    }

    /// Reload in the background if a tokio runtime is around; otherwise the
    /// cache stays stale until someone calls `refresh_if_stale`.
    fn schedule_reload(self: &Arc<Self>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let weak = Arc::downgrade(self);
                handle.spawn(async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.refresh_if_stale().await;
                    }
                });
            }
            Err(_) => debug!("No async runtime; cache left stale"),
        }
    }
}

/// Subscribe a cache method, holding the cache weakly so a dropped cache
/// ignores late events.
fn subscribe(
    bus: &EventBus,
    inner: &Arc<Inner>,
    kind: EventKind,
    handler: fn(&Arc<Inner>, &DreamEvent) -> Result<()>,
) -> Subscription {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    bus.subscribe(kind, move |event| match weak.upgrade() {
        Some(inner) => handler(&inner, event),
        None => Ok(()),
    })
}
