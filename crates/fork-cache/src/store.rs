//! On-disk store for one cache location.
//!
//! A location is a single JSON document holding the ancestry index namespace
//! and one partition namespace per node. Loading is lenient: malformed
//! entries are treated as absent and heal on the next successful resolve,
//! and a wholly unreadable document degrades to an empty store.

use crate::{ancestry::Forest, error::Result, key::NodeKey};
use alloy_primitives::{hex, Bytes};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

/// Version of the persisted document layout.
const FORMAT_VERSION: u64 = 1;

pub(crate) type Partition = BTreeMap<Bytes, Bytes>;

/// The shared store backing every session open against one cache location.
#[derive(Debug)]
pub(crate) struct CacheStore {
    /// Where the store flushes to. `None` marks a transient store.
    path: Option<PathBuf>,
    pub(crate) forest: RwLock<Forest>,
    pub(crate) partitions: RwLock<BTreeMap<NodeKey, Partition>>,
    dirty: AtomicBool,
    /// Serializes resolve/rebalance per forest (single-writer discipline).
    pub(crate) resolve_gate: tokio::sync::Mutex<()>,
}

impl CacheStore {
    /// An in-memory store that is never flushed.
    pub(crate) fn transient() -> Self {
        Self::with_contents(None, Forest::default(), BTreeMap::new())
    }

    /// Opens the store at `path`, creating an empty one if nothing is
    /// persisted there yet.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let raw = match fs::read(path) {
            Ok(contents) => match serde_json::from_slice::<RawDocument>(&contents) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(target: "fork::cache", %err, ?path, "unreadable cache document, starting empty");
                    RawDocument::default()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => RawDocument::default(),
            Err(err) => return Err(err.into()),
        };
        let (forest, partitions) = raw.decode();
        trace!(target: "fork::cache", ?path, nodes = forest.len(), "opened cache location");
        Ok(Self::with_contents(Some(path.to_path_buf()), forest, partitions))
    }

    fn with_contents(
        path: Option<PathBuf>,
        forest: Forest,
        partitions: BTreeMap<NodeKey, Partition>,
    ) -> Self {
        Self {
            path,
            forest: RwLock::new(forest),
            partitions: RwLock::new(partitions),
            dirty: AtomicBool::new(false),
            resolve_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn is_transient(&self) -> bool {
        self.path.is_none()
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Writes the document out if anything changed since the last flush.
    pub(crate) fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        // clear the flag first so writes racing the flush keep theirs
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        if let Err(err) = self.write_document(path) {
            self.dirty.store(true, Ordering::Release);
            return Err(err);
        }
        trace!(target: "fork::cache", ?path, "flushed cache document");
        Ok(())
    }

    fn write_document(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        let forest = self.forest.read();
        let partitions = self.partitions.read();
        let document = Document {
            version: FORMAT_VERSION,
            index: forest.to_index(),
            partitions: &*partitions,
        };
        serde_json::to_writer(&mut writer, &document)?;
        writer.flush()?;
        Ok(())
    }
}

/// Serialized shape of a cache location.
#[derive(Serialize)]
struct Document<'a> {
    version: u64,
    index: BTreeMap<NodeKey, Vec<NodeKey>>,
    partitions: &'a BTreeMap<NodeKey, Partition>,
}

/// String-keyed mirror of [`Document`], decoded entry by entry so one corrupt
/// entry does not discard the rest.
#[derive(Default, Deserialize)]
struct RawDocument {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    index: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    partitions: BTreeMap<String, BTreeMap<String, String>>,
}

impl RawDocument {
    fn decode(self) -> (Forest, BTreeMap<NodeKey, Partition>) {
        if self.version != FORMAT_VERSION {
            if self.version != 0 || !self.index.is_empty() {
                warn!(
                    target: "fork::cache",
                    version = self.version,
                    "unknown cache document version, starting empty"
                );
            }
            return (Forest::default(), BTreeMap::new());
        }

        let mut entries = Vec::with_capacity(self.index.len());
        for (key, children) in self.index {
            let Ok(key) = key.parse::<NodeKey>() else {
                warn!(target: "fork::cache", %key, "skipping corrupt index entry");
                continue;
            };
            let children = children
                .into_iter()
                .filter_map(|child| match child.parse::<NodeKey>() {
                    Ok(child) => Some(child),
                    Err(_) => {
                        warn!(target: "fork::cache", %key, %child, "skipping corrupt child key");
                        None
                    }
                })
                .collect();
            entries.push((key, children));
        }
        let forest = Forest::from_index(entries);

        let mut partitions = BTreeMap::new();
        for (key, raw_entries) in self.partitions {
            let Ok(key) = key.parse::<NodeKey>() else {
                warn!(target: "fork::cache", %key, "skipping partition with corrupt node key");
                continue;
            };
            if !forest.contains(&key) {
                warn!(target: "fork::cache", %key, "dropping partition for unknown node");
                continue;
            }
            let mut partition = Partition::new();
            for (entry_key, entry_value) in raw_entries {
                let (Ok(decoded_key), Ok(decoded_value)) =
                    (hex::decode(&entry_key), hex::decode(&entry_value))
                else {
                    warn!(target: "fork::cache", %key, %entry_key, "skipping corrupt cache entry");
                    continue;
                };
                partition.insert(Bytes::from(decoded_key), Bytes::from(decoded_value));
            }
            partitions.insert(key, partition);
        }
        (forest, partitions)
    }
}
