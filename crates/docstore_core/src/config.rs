//! Collection configuration.

/// Number of data files parsed per unit of work during an index rebuild.
pub const DEFAULT_REBUILD_CHUNK_SIZE: usize = 20;

/// Configuration for opening a collection.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the collection directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether every commit rewrites the index file.
    pub save_index_on_commit: bool,

    /// Whether initialization falls back to rebuilding from data files when
    /// the index file is unreadable, or missing while data files exist.
    pub rebuild_on_corruption: bool,

    /// Data files per parallel unit of work during a rebuild.
    pub rebuild_chunk_size: usize,

    /// Whether to fsync data and index files after writing them.
    pub sync_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            save_index_on_commit: true,
            rebuild_on_corruption: true,
            rebuild_chunk_size: DEFAULT_REBUILD_CHUNK_SIZE,
            sync_writes: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the collection if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether commits persist the index file.
    #[must_use]
    pub const fn save_index_on_commit(mut self, value: bool) -> Self {
        self.save_index_on_commit = value;
        self
    }

    /// Sets whether a broken index file triggers a rebuild.
    #[must_use]
    pub const fn rebuild_on_corruption(mut self, value: bool) -> Self {
        self.rebuild_on_corruption = value;
        self
    }

    /// Sets the rebuild chunk size. Zero is treated as one.
    #[must_use]
    pub const fn rebuild_chunk_size(mut self, size: usize) -> Self {
        self.rebuild_chunk_size = if size == 0 { 1 } else { size };
        self
    }

    /// Sets whether writes are fsynced.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }
}
