//! The dataset handle.
//!
//! A [`Dataset`] ties one catalog resource to an in-memory [`Snapshot`] and,
//! optionally, to a cache file and a background refresh task.
//!
//! # Loading policy
//!
//! | `cache` | `force_load` | initial population                              |
//! |---------|--------------|-------------------------------------------------|
//! | false   | any          | network                                         |
//! | true    | true         | network, then the cache file is overwritten     |
//! | true    | false        | cache file; network if the cache is unavailable |
//!
//! Only [`DatasetError::CacheUnavailable`] triggers the network fallback. Any
//! error from the network path itself is returned to the caller.
//!
//! # Consistency
//!
//! The table and its `last_updated` time always travel together as one
//! immutable [`Snapshot`] behind an `Arc`. Reloads build a complete new
//! snapshot and swap it in, so a reader holding the result of
//! [`Dataset::snapshot`] never observes a mix of old and new data. Reloads on
//! one handle are serialized, whether they come from the caller or from the
//! refresh task.

mod refresh;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache;
use crate::catalog::{CatalogClient, CatalogConfig};
use crate::error::DatasetError;
use crate::table::Table;

use refresh::RefreshTask;

/// A table together with the local time it was fetched.
///
/// This is also the unit persisted in cache files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub last_updated: NaiveDateTime,
    pub table: Table,
}

/// Options controlling how a [`Dataset`] is populated and kept fresh.
#[derive(Clone, Debug, Default)]
pub struct DatasetOptions {
    /// How often to check the catalog for a newer version. Zero disables the
    /// refresh task.
    pub refresh: Duration,
    /// Read and write a local cache file.
    pub cache: bool,
    /// Ignore an existing cache file at construction. Only meaningful with
    /// `cache`.
    pub force_load: bool,
    /// Directory for the cache file. Defaults to the working directory.
    pub cache_dir: Option<PathBuf>,
}

/// Result of one staleness check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The catalog reported a newer day and the data was reloaded.
    Reloaded,
    /// The catalog's last modification is not on a later day than ours.
    UpToDate { remote: NaiveDateTime },
    /// The catalog reported no modification time, so nothing was compared.
    NoTimestamp,
}

/// Whether a resource modified at `remote_modified` is newer than data fetched
/// at `last_updated`.
///
/// The comparison is by calendar day only: a change later on the same day as
/// the last fetch is not detected until the following day.
pub fn is_stale(remote_modified: NaiveDateTime, last_updated: NaiveDateTime) -> bool {
    remote_modified.date() > last_updated.date()
}

struct Inner {
    name: String,
    sub_package: String,
    cache: bool,
    filename: Mutex<PathBuf>,
    catalog: CatalogClient,
    snapshot: RwLock<Arc<Snapshot>>,
    reload_lock: Mutex<()>,
}

/// Handle to one sub-resource of a catalog dataset.
pub struct Dataset {
    inner: Arc<Inner>,
    refresh: Duration,
    refresher: Mutex<Option<RefreshTask>>,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.inner.name)
            .field("sub_package", &self.inner.sub_package)
            .field("cache", &self.inner.cache)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

impl Dataset {
    /// Opens `sub_package` of dataset `name` on the default catalog.
    ///
    /// # Example
    /// ```no_run
    /// use wprdc::{Dataset, DatasetOptions};
    ///
    /// let crashes = Dataset::open(
    ///     "allegheny-county-crash-data",
    ///     "2011 Crash Data",
    ///     DatasetOptions { cache: true, ..Default::default() },
    /// )?;
    /// println!("{} rows", crashes.snapshot().table.len());
    /// # Ok::<(), wprdc::DatasetError>(())
    /// ```
    pub fn open(
        name: impl Into<String>,
        sub_package: impl Into<String>,
        options: DatasetOptions,
    ) -> Result<Self, DatasetError> {
        let catalog = CatalogClient::new(&CatalogConfig::default())?;
        Self::open_with(catalog, name, sub_package, options)
    }

    /// Opens `sub_package` of dataset `name` through an explicit catalog client.
    pub fn open_with(
        catalog: CatalogClient,
        name: impl Into<String>,
        sub_package: impl Into<String>,
        options: DatasetOptions,
    ) -> Result<Self, DatasetError> {
        let name = name.into();
        let sub_package = sub_package.into();
        if name.trim().is_empty() {
            return Err(DatasetError::InvalidIdentifier { field: "name" });
        }
        if sub_package.trim().is_empty() {
            return Err(DatasetError::InvalidIdentifier {
                field: "sub_package",
            });
        }

        let filename = cache::cache_path(options.cache_dir.as_deref(), &name, &sub_package);
        let initial = initial_snapshot(&catalog, &name, &sub_package, &filename, &options)?;

        let inner = Arc::new(Inner {
            name,
            sub_package,
            cache: options.cache,
            filename: Mutex::new(filename),
            catalog,
            snapshot: RwLock::new(Arc::new(initial)),
            reload_lock: Mutex::new(()),
        });

        let refresher = if options.refresh.is_zero() {
            None
        } else {
            Some(RefreshTask::spawn(Arc::downgrade(&inner), options.refresh)?)
        };

        Ok(Self {
            inner,
            refresh: options.refresh,
            refresher: Mutex::new(refresher),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn sub_package(&self) -> &str {
        &self.inner.sub_package
    }

    /// Whether this handle reads and writes a cache file.
    pub fn is_cached(&self) -> bool {
        self.inner.cache
    }

    /// Current cache file path.
    pub fn filename(&self) -> PathBuf {
        self.inner.filename.lock().clone()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh
    }

    /// The catalog URL this handle resolves its metadata from.
    pub fn catalog_url(&self) -> Result<Url, DatasetError> {
        self.inner.catalog.package_show_url(&self.inner.name)
    }

    /// The current table and its fetch time, as one consistent pair.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.read().clone()
    }

    pub fn last_updated(&self) -> NaiveDateTime {
        self.inner.snapshot.read().last_updated
    }

    /// Fetches the resource again and replaces the snapshot.
    ///
    /// If the fetch fails the previous snapshot is kept. With caching enabled
    /// the new snapshot is written to the cache file after it is swapped in.
    pub fn reload(&self) -> Result<Arc<Snapshot>, DatasetError> {
        self.inner.reload()
    }

    /// Compares the catalog's last modification day with ours and reloads if
    /// the catalog is newer.
    pub fn check_for_update(&self) -> Result<RefreshOutcome, DatasetError> {
        self.inner.check_for_update()
    }

    /// Writes the current snapshot to the cache file.
    ///
    /// If `path` is given it becomes this handle's cache file for all later
    /// writes and reads.
    pub fn save_to_file(&self, path: Option<&Path>) -> Result<(), DatasetError> {
        let _guard = self.inner.reload_lock.lock();
        let path = self.inner.select_file(path);
        let snapshot = self.snapshot();
        cache::write_cache(&path, &snapshot)?;
        debug!(path = %path.display(), "cache written");
        Ok(())
    }

    /// Replaces the snapshot with the record stored in the cache file.
    ///
    /// If `path` is given it becomes this handle's cache file. Unlike at
    /// construction, an unavailable cache is an error here.
    pub fn load_from_file(&self, path: Option<&Path>) -> Result<Arc<Snapshot>, DatasetError> {
        let _guard = self.inner.reload_lock.lock();
        let path = self.inner.select_file(path);
        let snapshot = Arc::new(cache::read_cache(&path)?);
        *self.inner.snapshot.write() = Arc::clone(&snapshot);
        Ok(snapshot)
    }

    /// Whether the background refresh task is running.
    pub fn is_refreshing(&self) -> bool {
        self.refresher.lock().is_some()
    }

    /// Stops the background refresh task and waits for it to exit.
    ///
    /// Calling this more than once, or on a handle without a refresh task, is
    /// a no-op.
    pub fn stop_refresh(&self) {
        let task = self.refresher.lock().take();
        if let Some(task) = task {
            task.stop();
        }
    }

    /// Stops the refresh task and releases the handle.
    pub fn close(self) {
        self.stop_refresh();
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        // Disconnects the stop channel. The thread is not joined.
        self.refresher.get_mut().take();
    }
}

impl Inner {
    fn select_file(&self, path: Option<&Path>) -> PathBuf {
        let mut filename = self.filename.lock();
        if let Some(path) = path {
            *filename = path.to_path_buf();
        }
        filename.clone()
    }

    fn reload(&self) -> Result<Arc<Snapshot>, DatasetError> {
        let _guard = self.reload_lock.lock();

        let snapshot = Arc::new(fetch_remote(&self.catalog, &self.name, &self.sub_package)?);
        *self.snapshot.write() = Arc::clone(&snapshot);

        if self.cache {
            let path = self.filename.lock().clone();
            cache::write_cache(&path, &snapshot)?;
        }

        Ok(snapshot)
    }

    fn check_for_update(&self) -> Result<RefreshOutcome, DatasetError> {
        debug!(name = %self.name, sub_package = %self.sub_package, "checking for update");

        let resource = self.catalog.resolve(&self.name, &self.sub_package)?;
        let Some(remote) = resource.last_modified_at()? else {
            return Ok(RefreshOutcome::NoTimestamp);
        };

        let last_updated = self.snapshot.read().last_updated;
        if is_stale(remote, last_updated) {
            info!(
                name = %self.name,
                sub_package = %self.sub_package,
                %remote,
                %last_updated,
                "catalog has newer data"
            );
            self.reload()?;
            Ok(RefreshOutcome::Reloaded)
        } else {
            Ok(RefreshOutcome::UpToDate { remote })
        }
    }
}

fn initial_snapshot(
    catalog: &CatalogClient,
    name: &str,
    sub_package: &str,
    filename: &Path,
    options: &DatasetOptions,
) -> Result<Snapshot, DatasetError> {
    if options.cache && !options.force_load {
        match cache::read_cache(filename) {
            Ok(snapshot) => {
                debug!(path = %filename.display(), "loaded from cache");
                return Ok(snapshot);
            }
            Err(err) if err.is_cache_unavailable() => {
                warn!(error = %err, "cache unavailable, loading from catalog");
            }
            Err(err) => return Err(err),
        }
    }

    let snapshot = fetch_remote(catalog, name, sub_package)?;
    if options.cache {
        cache::write_cache(filename, &snapshot)?;
    }
    Ok(snapshot)
}

fn fetch_remote(
    catalog: &CatalogClient,
    name: &str,
    sub_package: &str,
) -> Result<Snapshot, DatasetError> {
    let resource = catalog.resolve(name, sub_package)?;
    info!(url = %resource.url, "loading resource");
    let table = catalog.fetch_table(&resource)?;

    Ok(Snapshot {
        last_updated: Local::now().naive_local(),
        table,
    })
}
