//! Process-wide lifecycle management for shared cache stores.

use crate::{
    error::{Error, Result},
    key::{ForkBlock, NodeKey},
    remote::RemoteChainSource,
    resolve,
    session::ForkSession,
    store::CacheStore,
};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Registry of open cache stores, keyed by location path.
///
/// Exactly one underlying store exists per location per registry; every
/// [`CacheHandle`] and [`ForkSession`] holds one counted reference to it.
/// When the last reference is released the store is flushed and closed.
///
/// The registry is an explicit value rather than a hidden global so that
/// lifetimes and close ordering stay observable; clones share the same set
/// of open stores.
#[derive(Clone, Debug, Default)]
pub struct NetworkCache {
    inner: Arc<Mutex<HashMap<PathBuf, LocationEntry>>>,
}

#[derive(Debug)]
struct LocationEntry {
    store: Arc<CacheStore>,
    refs: usize,
}

impl NetworkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the store at `location`, creating it if absent, or bumps the
    /// refcount of the store already open for that location.
    pub fn acquire(&self, location: impl AsRef<Path>) -> Result<CacheHandle> {
        let location = location.as_ref().to_path_buf();
        let mut inner = self.inner.lock();
        let store = match inner.get_mut(&location) {
            Some(entry) => {
                entry.refs += 1;
                Arc::clone(&entry.store)
            }
            None => {
                let store = Arc::new(CacheStore::open(&location)?);
                trace!(target: "fork::cache", location = ?location, "opened cache location");
                inner.insert(
                    location.clone(),
                    LocationEntry { store: Arc::clone(&store), refs: 1 },
                );
                store
            }
        };
        Ok(CacheHandle { registry: Some((self.clone(), location)), store, released: false })
    }

    /// Removes all persisted data for `location`.
    ///
    /// Rejected while a handle for the location is open in this process;
    /// the caller retries after releasing existing handles.
    pub fn delete_location(&self, location: impl AsRef<Path>) -> Result<()> {
        let location = location.as_ref();
        let inner = self.inner.lock();
        if inner.contains_key(location) {
            return Err(Error::ConcurrentOpen { location: location.to_path_buf() });
        }
        match fs::remove_file(location) {
            Ok(()) => {
                trace!(target: "fork::cache", ?location, "deleted cache location");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Number of live references to `location` held in this process.
    pub fn ref_count(&self, location: impl AsRef<Path>) -> usize {
        self.inner.lock().get(location.as_ref()).map_or(0, |entry| entry.refs)
    }

    /// Whether a store handle for `location` is currently open.
    pub fn is_open(&self, location: impl AsRef<Path>) -> bool {
        self.inner.lock().contains_key(location.as_ref())
    }

    fn bump(&self, location: &Path) {
        if let Some(entry) = self.inner.lock().get_mut(location) {
            entry.refs += 1;
        }
    }

    fn release(&self, location: &Path) -> Result<()> {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.get_mut(location) else { return Ok(()) };
        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(());
        }
        // flush under the registry lock so a concurrent reopen of the same
        // location cannot read a half-written document
        let Some(entry) = inner.remove(location) else { return Ok(()) };
        trace!(target: "fork::cache", ?location, "closing cache location");
        entry.store.flush()
    }
}

/// A counted reference to the shared store of one cache location.
///
/// Cloning bumps the location's refcount; dropping releases it. The last
/// release flushes pending mutations and closes the store.
#[derive(Debug)]
pub struct CacheHandle {
    /// Registry bookkeeping; `None` for in-memory stores.
    registry: Option<(NetworkCache, PathBuf)>,
    store: Arc<CacheStore>,
    released: bool,
}

impl CacheHandle {
    /// A transient store that never touches disk.
    ///
    /// This is the fallback when a persistent location cannot be opened:
    /// sessions still get ancestry-aware get/put, nothing is remembered
    /// across processes.
    pub fn in_memory() -> Self {
        Self { registry: None, store: Arc::new(CacheStore::transient()), released: false }
    }

    /// Starts a fork session for `block`, locating or creating its ancestry
    /// node (see [`RemoteChainSource`] for the probe capability this needs).
    pub async fn resolve(
        &self,
        block: ForkBlock,
        source: &dyn RemoteChainSource,
    ) -> Result<ForkSession> {
        let node = resolve::resolve(&self.store, block, source).await?;
        Ok(ForkSession::new(self.clone(), node))
    }

    /// Whether `self` and `other` share the same underlying store.
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    /// Returns `true` if this is a transient store and nothing will be
    /// flushed.
    pub fn is_transient(&self) -> bool {
        self.store.is_transient()
    }

    /// Snapshot of the ancestry index: node key to child keys.
    pub fn index_snapshot(&self) -> BTreeMap<NodeKey, Vec<NodeKey>> {
        self.store.forest.read().to_index()
    }

    /// Writes pending mutations out without closing the store.
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    /// Releases this reference, flushing and closing the store if it was the
    /// last one. Dropping does the same but logs flush errors instead of
    /// returning them.
    pub fn close(mut self) -> Result<()> {
        self.release_once()
    }

    pub(crate) fn store(&self) -> &CacheStore {
        &self.store
    }

    pub(crate) fn release_once(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match &self.registry {
            Some((registry, location)) => registry.release(location),
            None => Ok(()),
        }
    }
}

impl Clone for CacheHandle {
    fn clone(&self) -> Self {
        if let Some((registry, location)) = &self.registry {
            registry.bump(location);
        }
        Self { registry: self.registry.clone(), store: Arc::clone(&self.store), released: false }
    }
}

impl Drop for CacheHandle {
    fn drop(&mut self) {
        if let Err(err) = self.release_once() {
            error!(target: "fork::cache", %err, "failed to flush cache store on close");
        }
    }
}
