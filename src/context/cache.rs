//! Bounded cache from file path to line-split source contents.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use indexmap::IndexMap;
use tracing::debug;

/// Default maximum number of files kept in the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

#[derive(Clone)]
enum CacheEntry {
    Lines(Arc<Vec<String>>),
    /// The file was looked up and could not be read; remembered so repeated
    /// lookups do not retry the I/O.
    Unreadable,
}

/// LRU cache of source files, with negative entries for unreadable ones.
///
/// Lookups touch the entry (most recently used last); inserting past the
/// capacity evicts the least recently used entry. `file://`-prefixed paths
/// are resolved to plain filesystem paths before reading.
pub struct SourceCache {
    entries: Mutex<IndexMap<String, CacheEntry>>,
    capacity: usize,
    file_reads: AtomicUsize,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SourceCache {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
            file_reads: AtomicUsize::new(0),
        }
    }

    /// Returns the file's lines, reading and caching them on first access.
    ///
    /// `None` means the file is unreadable; the miss is cached too, so the
    /// next lookup answers without touching the filesystem.
    pub fn get_lines(&self, filename: &str) -> Option<Arc<Vec<String>>> {
        let mut entries = self.entries.lock().unwrap();

        if let Some(entry) = entries.shift_remove(filename) {
            // Reinsert at the back: touched entries become most recent.
            entries.insert(filename.to_string(), entry.clone());
            return match entry {
                CacheEntry::Lines(lines) => Some(lines),
                CacheEntry::Unreadable => None,
            };
        }

        let entry = self.read_entry(filename);
        entries.insert(filename.to_string(), entry.clone());
        while entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                debug!(file = %evicted, "evicted least recently used source file");
            }
        }

        match entry {
            CacheEntry::Lines(lines) => Some(lines),
            CacheEntry::Unreadable => None,
        }
    }

    fn read_entry(&self, filename: &str) -> CacheEntry {
        self.file_reads.fetch_add(1, Ordering::SeqCst);
        let path = filename.strip_prefix("file://").unwrap_or(filename);
        match fs::read_to_string(path) {
            Ok(contents) => {
                CacheEntry::Lines(Arc::new(contents.lines().map(str::to_string).collect()))
            }
            Err(error) => {
                debug!(
                    file = %filename,
                    error = %error,
                    "source file unreadable; caching the miss"
                );
                CacheEntry::Unreadable
            }
        }
    }

    /// Number of real file reads attempted since this cache was created.
    /// Cache hits, positive or negative, do not count.
    pub fn file_read_count(&self) -> usize {
        self.file_reads.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries unconditionally. The read counter keeps counting.
    pub fn reset(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new()
    }
}

static FILE_CACHE: OnceLock<Arc<SourceCache>> = OnceLock::new();

/// The process-wide source cache used by frame enrichment.
pub fn file_cache() -> Arc<SourceCache> {
    Arc::clone(FILE_CACHE.get_or_init(|| Arc::new(SourceCache::new())))
}

/// Clears the process-wide source cache.
pub fn reset_file_cache() {
    file_cache().reset();
}
