use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::backup::{self, BackupError};
use crate::codec::{CodecError, SearchableCodec};
use crate::config::Config;
use crate::favorites_store::{FavoritesQuery, FavoritesStore, StoreError, TypeFilter};
use crate::model::{FavoriteRecord, Searchable, TYPE_CALENDAR};
use crate::ranking::{fill_quota, merge, RankingRequest, DEFAULT_LIMIT};
use crate::settings::{LauncherSettings, SettingsStore, MAX_GRID_COLUMNS};

const CLEANUP_PAGE_SIZE: usize = 100;
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(30);

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("background task failed: {0}")]
    Task(String),
}

/// One emission of a favorites stream.
pub type FavoritesUpdate = Result<Arc<Vec<Searchable>>, Arc<RepositoryError>>;

/// Completion handle of a fire-and-forget mutation. Dropping it does not
/// cancel the mutation; failures are logged either way.
pub type Mutation = JoinHandle<Result<(), RepositoryError>>;

/// Live view of the merged favorites list.
///
/// Clones share the same driver; the driver stops once every clone has been
/// dropped.
#[derive(Clone)]
pub struct FavoritesStream {
    rx: watch::Receiver<Option<FavoritesUpdate>>,
}

impl FavoritesStream {
    /// Waits for the next snapshot. Returns `None` once the driver is gone.
    pub async fn next(&mut self) -> Option<FavoritesUpdate> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(update) = self.rx.borrow_and_update().clone() {
                return Some(update);
            }
        }
    }

    /// Latest published snapshot, if one was computed already.
    pub fn latest(&self) -> Option<FavoritesUpdate> {
        self.rx.borrow().clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Quiet period after an upstream change before recomputing.
    pub debounce: Duration,
    /// Upper bound on the number of items in a merged list.
    pub limit: usize,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl RepositoryOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            debounce: Duration::from_millis(cfg.recompute_debounce_ms),
            limit: cfg.max_favorites.max(1) as usize,
        }
    }
}

#[derive(Clone)]
pub struct FavoritesRepository {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<FavoritesStore>,
    settings: Arc<SettingsStore>,
    codec: SearchableCodec,
    runtime: Handle,
    options: RepositoryOptions,
}

impl FavoritesRepository {
    pub fn new(
        store: Arc<FavoritesStore>,
        settings: Arc<SettingsStore>,
        codec: SearchableCodec,
        runtime: Handle,
    ) -> Self {
        Self::with_options(store, settings, codec, runtime, RepositoryOptions::default())
    }

    pub fn with_options(
        store: Arc<FavoritesStore>,
        settings: Arc<SettingsStore>,
        codec: SearchableCodec,
        runtime: Handle,
        options: RepositoryOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                settings,
                codec,
                runtime,
                options,
            }),
        }
    }

    pub fn store(&self) -> &Arc<FavoritesStore> {
        &self.inner.store
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.inner.settings
    }

    /// Grid favorites for `columns` columns, recomputed whenever the store
    /// or the grid-column preference changes.
    pub fn get_favorites(&self, columns: usize) -> FavoritesStream {
        self.spawn_driver(self.grid_request(columns))
    }

    pub fn get_favorites_with(
        &self,
        request: RankingRequest,
    ) -> Result<FavoritesStream, RepositoryError> {
        request.validate().map_err(RepositoryError::InvalidRequest)?;
        Ok(self.spawn_driver(request))
    }

    /// One-shot computation of the grid with the current settings.
    pub async fn favorites_snapshot(
        &self,
        columns: usize,
    ) -> Result<Vec<Searchable>, RepositoryError> {
        let request = self.grid_request(columns);
        let settings = self.inner.settings.current();
        self.compute(request, settings).await
    }

    /// Pinned calendar events, which the grid leaves out.
    pub fn pinned_calendar_events(&self) -> FavoritesStream {
        let request = RankingRequest::pinned_calendar_events().with_limit(self.inner.options.limit);
        self.spawn_driver(request)
    }

    /// One-shot ranked query; ignores the "show favorites" toggle.
    pub async fn query(
        &self,
        request: RankingRequest,
    ) -> Result<Vec<Searchable>, RepositoryError> {
        request.validate().map_err(RepositoryError::InvalidRequest)?;
        self.blocking(move |inner| inner.merged_favorites(&request))
            .await
    }

    pub fn pin_item(&self, item: &Searchable) -> Mutation {
        let item = item.clone();
        self.dispatch("pin", move |inner| {
            let record = inner.record_for(&item)?;
            inner.store.pin(&record)?;
            Ok(())
        })
    }

    pub fn unpin_item(&self, item: &Searchable) -> Mutation {
        let key = item.key();
        self.dispatch("unpin", move |inner| Ok(inner.store.unpin(&key)?))
    }

    pub fn hide_item(&self, item: &Searchable) -> Mutation {
        let item = item.clone();
        self.dispatch("hide", move |inner| {
            let record = inner.record_for(&item)?;
            inner.store.hide(&record)?;
            Ok(())
        })
    }

    pub fn unhide_item(&self, item: &Searchable) -> Mutation {
        let key = item.key();
        self.dispatch("unhide", move |inner| Ok(inner.store.unhide(&key)?))
    }

    pub fn increment_launch_counter(&self, item: &Searchable) -> Mutation {
        let item = item.clone();
        self.dispatch("launch", move |inner| {
            let record = inner.record_for(&item)?;
            let alpha = inner.settings.current().weight_factor.alpha();
            inner.store.touch(&record, alpha)?;
            Ok(())
        })
    }

    /// Ensures the item has a row, leaving existing state untouched.
    pub fn save(&self, item: &Searchable) -> Mutation {
        let item = item.clone();
        self.dispatch("save", move |inner| {
            let record = inner.record_for(&item)?;
            inner.store.insert_skip_existing(&record)?;
            Ok(())
        })
    }

    pub fn remove(&self, item: &Searchable) -> Mutation {
        let key = item.key();
        self.dispatch("remove", move |inner| Ok(inner.store.delete(&key)?))
    }

    /// Unpins the item and forgets its launch count.
    pub fn remove_from_favorites(&self, item: &Searchable) -> Mutation {
        let key = item.key();
        self.dispatch("remove_from_favorites", move |inner| {
            Ok(inner.store.reset_pin_and_launch_count(&key)?)
        })
    }

    /// Replaces the pin layout: `manually_sorted` in the given order, then
    /// `automatically_sorted`; everything else becomes unpinned.
    pub fn update_favorites(
        &self,
        manually_sorted: Vec<Searchable>,
        automatically_sorted: Vec<Searchable>,
    ) -> Mutation {
        self.dispatch("update_favorites", move |inner| {
            let manual = inner.records_for(&manually_sorted)?;
            let automatic = inner.records_for(&automatically_sorted)?;
            inner.store.replace_pins(&manual, &automatic)?;
            Ok(())
        })
    }

    pub async fn is_pinned(&self, item: &Searchable) -> Result<bool, RepositoryError> {
        let key = item.key();
        self.blocking(move |inner| Ok(inner.store.is_pinned(&key)?))
            .await
    }

    pub async fn is_hidden(&self, item: &Searchable) -> Result<bool, RepositoryError> {
        let key = item.key();
        self.blocking(move |inner| Ok(inner.store.is_hidden(&key)?))
            .await
    }

    pub async fn hidden_items(&self) -> Result<Vec<Searchable>, RepositoryError> {
        self.blocking(|inner| {
            let records = inner.store.hidden_records()?;
            Ok(inner.resolve(records)?.0)
        })
        .await
    }

    pub async fn hidden_item_keys(&self) -> Result<Vec<String>, RepositoryError> {
        self.blocking(|inner| Ok(inner.store.hidden_keys(&TypeFilter::All)?))
            .await
    }

    pub async fn hidden_calendar_event_keys(&self) -> Result<Vec<String>, RepositoryError> {
        self.blocking(|inner| {
            let calendar = TypeFilter::Include(vec![TYPE_CALENDAR.to_string()]);
            Ok(inner.store.hidden_keys(&calendar)?)
        })
        .await
    }

    /// Known keys with at least one launch, most launched first.
    pub async fn sort_by_relevance(
        &self,
        keys: Vec<String>,
    ) -> Result<Vec<String>, RepositoryError> {
        self.blocking(move |inner| Ok(inner.store.sort_by_relevance(&keys)?))
            .await
    }

    /// Known keys, highest launch weight first.
    pub async fn sort_by_weight(
        &self,
        keys: Vec<String>,
    ) -> Result<Vec<String>, RepositoryError> {
        self.blocking(move |inner| Ok(inner.store.sort_by_weight(&keys)?))
            .await
    }

    pub async fn get_from_keys(
        &self,
        keys: Vec<String>,
    ) -> Result<Vec<Searchable>, RepositoryError> {
        self.blocking(move |inner| {
            let records = inner.store.get_many(&keys)?;
            Ok(inner.resolve(records)?.0)
        })
        .await
    }

    /// Deletes rows that no longer resolve, or resolve to a different key.
    pub async fn cleanup_database(&self) -> Result<usize, RepositoryError> {
        self.blocking(|inner| inner.cleanup()).await
    }

    pub async fn export(&self, dir: PathBuf) -> Result<usize, RepositoryError> {
        self.blocking(move |inner| Ok(backup::export(&inner.store, &dir)?))
            .await
    }

    pub async fn import(&self, dir: PathBuf) -> Result<usize, RepositoryError> {
        self.blocking(move |inner| Ok(backup::import(&inner.store, &dir)?))
            .await
    }

    fn grid_request(&self, columns: usize) -> RankingRequest {
        let columns = columns.clamp(1, MAX_GRID_COLUMNS as usize);
        RankingRequest::grid(columns).with_limit(self.inner.options.limit)
    }

    fn spawn_driver(&self, request: RankingRequest) -> FavoritesStream {
        let (tx, rx) = watch::channel(None);
        let repository = self.clone();
        self.inner.runtime.spawn(drive(repository, request, tx));
        FavoritesStream { rx }
    }

    async fn compute(
        &self,
        request: RankingRequest,
        settings: LauncherSettings,
    ) -> Result<Vec<Searchable>, RepositoryError> {
        if request.follows_visibility && !settings.show_favorites {
            return Ok(Vec::new());
        }
        self.blocking(move |inner| inner.merged_favorites(&request))
            .await
    }

    fn dispatch<F>(&self, operation: &'static str, apply: F) -> Mutation
    where
        F: FnOnce(&Inner) -> Result<(), RepositoryError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn_blocking(move || {
            let result = apply(&inner);
            match &result {
                Ok(()) => debug!(operation, "favorites mutation applied"),
                Err(error) => warn!(operation, %error, "favorites mutation failed"),
            }
            result
        })
    }

    async fn blocking<T, F>(&self, read: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Inner) -> Result<T, RepositoryError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner
            .runtime
            .spawn_blocking(move || read(&inner))
            .await
            .map_err(|error| RepositoryError::Task(error.to_string()))?
    }
}

impl Inner {
    fn record_for(&self, item: &Searchable) -> Result<FavoriteRecord, CodecError> {
        let (item_type, payload) = self.codec.serialize(item)?;
        Ok(FavoriteRecord::new(&item.key(), &item_type, &payload))
    }

    fn records_for(&self, items: &[Searchable]) -> Result<Vec<FavoriteRecord>, CodecError> {
        items.iter().map(|item| self.record_for(item)).collect()
    }

    /// Decodes `records` in order, deleting the ones that no longer resolve.
    /// Returns the live items and the number of pruned rows.
    fn resolve(
        &self,
        records: Vec<FavoriteRecord>,
    ) -> Result<(Vec<Searchable>, usize), StoreError> {
        let mut items = Vec::with_capacity(records.len());
        let mut pruned = 0;
        for record in records {
            match self.codec.deserialize(&record.item_type, &record.serialized) {
                Some(item) => items.push(item),
                None => {
                    debug!(key = %record.key, "pruning favorite that no longer resolves");
                    self.store.delete(&record.key)?;
                    pruned += 1;
                }
            }
        }
        Ok((items, pruned))
    }

    fn merged_favorites(
        &self,
        request: &RankingRequest,
    ) -> Result<Vec<Searchable>, RepositoryError> {
        let pinned = if request.include_manual || request.include_auto {
            let query = FavoritesQuery {
                manually_sorted: request.include_manual,
                automatically_sorted: request.include_auto,
                frequently_used: false,
                types: request.types.clone(),
                limit: request.limit,
            };
            self.resolve(self.store.query(&query)?)?.0
        } else {
            Vec::new()
        };

        if !request.include_frequent {
            return Ok(pinned);
        }

        let slots = fill_quota(pinned.len(), request.columns).min(request.limit);
        let wanted = slots.saturating_sub(pinned.len());
        let automatic = if wanted == 0 {
            Vec::new()
        } else {
            // Pruned rows are gone after `resolve`, so a refetch surfaces the
            // next candidates in line.
            loop {
                let records = self
                    .store
                    .query(&FavoritesQuery::frequent(request.types.clone(), wanted))?;
                let fetched = records.len();
                let (items, pruned) = self.resolve(records)?;
                if pruned == 0 || fetched < wanted {
                    break items;
                }
            }
        };

        trace!(
            pinned = pinned.len(),
            automatic = automatic.len(),
            slots,
            "merged favorites"
        );
        Ok(merge(pinned, automatic, slots))
    }

    fn cleanup(&self) -> Result<usize, RepositoryError> {
        let mut invalid = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.store.page(CLEANUP_PAGE_SIZE, offset)?;
            for record in &page {
                let valid = self
                    .codec
                    .deserialize(&record.item_type, &record.serialized)
                    .is_some_and(|item| item.key() == record.key);
                if !valid {
                    invalid.push(record.key.clone());
                }
            }
            if page.len() < CLEANUP_PAGE_SIZE {
                break;
            }
            offset += CLEANUP_PAGE_SIZE;
        }

        for key in &invalid {
            self.store.delete(key)?;
            info!(%key, "cleanup removed invalid favorite");
        }
        Ok(invalid.len())
    }
}

enum Wake {
    Upstream,
    Closed,
}

/// Recomputes and publishes the merged list until every subscriber is gone.
///
/// An upstream change that lands while a recompute is in flight discards that
/// recompute. Bursts of changes are coalesced by the debounce delay.
async fn drive(
    repository: FavoritesRepository,
    mut request: RankingRequest,
    tx: watch::Sender<Option<FavoritesUpdate>>,
) {
    let mut revisions = repository.inner.store.subscribe();
    let mut settings = repository.inner.settings.subscribe();
    let mut seen_columns = settings.borrow_and_update().grid_columns;
    revisions.borrow_and_update();

    loop {
        let current = *settings.borrow_and_update();
        revisions.borrow_and_update();
        if current.grid_columns != seen_columns {
            seen_columns = current.grid_columns;
            request.columns = current.grid_columns.max(1);
        }

        let job = repository.compute(request.clone(), current);
        tokio::pin!(job);
        let outcome = tokio::select! {
            _ = tx.closed() => return,
            result = &mut job => Some(result),
            changed = revisions.changed() => match changed {
                Ok(()) => None,
                Err(_) => return,
            },
            changed = settings.changed() => match changed {
                Ok(()) => None,
                Err(_) => return,
            },
        };

        match outcome {
            Some(result) => {
                publish(&tx, result);
                let wake = tokio::select! {
                    _ = tx.closed() => Wake::Closed,
                    changed = revisions.changed() => match changed {
                        Ok(()) => Wake::Upstream,
                        Err(_) => Wake::Closed,
                    },
                    changed = settings.changed() => match changed {
                        Ok(()) => Wake::Upstream,
                        Err(_) => Wake::Closed,
                    },
                };
                if let Wake::Closed = wake {
                    return;
                }
            }
            None => trace!("upstream changed during recompute; restarting"),
        }

        tokio::select! {
            _ = tx.closed() => return,
            _ = tokio::time::sleep(repository.inner.options.debounce) => {}
        }
    }
}

fn publish(
    tx: &watch::Sender<Option<FavoritesUpdate>>,
    result: Result<Vec<Searchable>, RepositoryError>,
) {
    if let Err(error) = &result {
        warn!(%error, "favorites recompute failed");
    }
    let update: FavoritesUpdate = result.map(Arc::new).map_err(Arc::new);
    tx.send_if_modified(|current| {
        let unchanged = matches!(
            (current.as_ref(), &update),
            (Some(Ok(previous)), Ok(next)) if previous == next
        );
        if !unchanged {
            *current = Some(update);
        }
        !unchanged
    });
}
