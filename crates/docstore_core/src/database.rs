//! Database facade.

use crate::config::Config;
use crate::dir::CollectionDir;
use crate::editor::Editor;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::processor::Processor;
use crate::query::Query;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle of a [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, not yet initialized.
    Uninitialized,
    /// Index loaded; edits and queries are accepted.
    Initialized,
    /// Disposed; nothing is accepted any more.
    Disposed,
}

enum State<T: Entity> {
    Uninitialized,
    Initialized(Arc<Processor<T>>),
    Disposed,
}

/// A file-backed collection of entities of one type.
///
/// `Database` moves through `Uninitialized → Initialized → Disposed` and never
/// back. Edits and queries are only accepted while initialized.
///
/// # Example
///
/// ```rust,ignore
/// use docstore_core::Database;
///
/// let db: Database<Note> = Database::new("notes");
/// db.initialize()?;
///
/// let mut editor = db.edit()?;
/// editor.write(&note)?;
/// editor.commit()?;
///
/// let result = db.query()?.filter(|doc| doc["Title"] == "groceries").get_result()?;
/// ```
pub struct Database<T: Entity> {
    root: PathBuf,
    config: Config,
    state: RwLock<State<T>>,
}

impl<T: Entity> Database<T> {
    /// Creates an uninitialized database rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, Config::default())
    }

    /// Creates an uninitialized database with custom configuration.
    pub fn with_config(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
            state: RwLock::new(State::Uninitialized),
        }
    }

    /// Opens the collection and loads its index.
    ///
    /// Returns `false` without doing anything if already initialized. When
    /// `rebuild_on_corruption` is set, an unreadable index file, or a missing
    /// one next to existing data files, is replaced by a rebuild from the data
    /// files.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Disposed`] after [`Database::dispose`], and
    /// propagates failures to open the layout or load the index.
    pub fn initialize(&self) -> CoreResult<bool> {
        let mut state = self.state.write();
        match *state {
            State::Initialized(_) => return Ok(false),
            State::Disposed => return Err(CoreError::disposed("database")),
            State::Uninitialized => {}
        }

        let processor = Processor::open(CollectionDir::new(&self.root), self.config.clone())?;
        self.load_or_rebuild(&processor)?;

        info!(
            root = %self.root.display(),
            entries = processor.len()?,
            "database initialized"
        );
        *state = State::Initialized(Arc::new(processor));
        Ok(true)
    }

    /// Starts a new editor.
    pub fn edit(&self) -> CoreResult<Editor<T>> {
        Ok(Editor::new(self.processor()?))
    }

    /// Starts a new query.
    pub fn query(&self) -> CoreResult<Query<T>> {
        Ok(Query::new(self.processor()?))
    }

    /// Returns the shared processor.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] or [`CoreError::Disposed`]
    /// outside the initialized state.
    pub fn processor(&self) -> CoreResult<Arc<Processor<T>>> {
        match &*self.state.read() {
            State::Initialized(processor) => Ok(Arc::clone(processor)),
            State::Uninitialized => Err(CoreError::NotInitialized),
            State::Disposed => Err(CoreError::disposed("database")),
        }
    }

    /// Releases the processor. Irreversible and idempotent.
    ///
    /// Editors and results created earlier fail from now on.
    pub fn dispose(&self) {
        let mut state = self.state.write();
        if let State::Initialized(processor) = &*state {
            processor.dispose();
        }
        *state = State::Disposed;
    }

    /// Returns the current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        match &*self.state.read() {
            State::Uninitialized => Lifecycle::Uninitialized,
            State::Initialized(_) => Lifecycle::Initialized,
            State::Disposed => Lifecycle::Disposed,
        }
    }

    /// Returns true while edits and queries are accepted.
    pub fn is_initialized(&self) -> bool {
        self.lifecycle() == Lifecycle::Initialized
    }

    /// Returns the collection root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn load_or_rebuild(&self, processor: &Processor<T>) -> CoreResult<()> {
        let had_index = processor.dir().has_index();
        let mut guard = processor.lock()?;

        match guard.load_index() {
            Ok(()) if had_index || !self.config.rebuild_on_corruption => Ok(()),
            Ok(()) => {
                if processor.dir().list_data_ids()?.is_empty() {
                    return Ok(());
                }
                warn!(root = %self.root.display(), "index file missing, rebuilding from data files");
                guard.rebuild_index()?;
                guard.save_index()
            }
            Err(e) if self.config.rebuild_on_corruption && e.is_integrity() => {
                warn!(root = %self.root.display(), error = %e, "index file unreadable, rebuilding from data files");
                guard.rebuild_index()?;
                guard.save_index()
            }
            Err(e) => Err(e),
        }
    }
}

impl<T: Entity> std::fmt::Debug for Database<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("root", &self.root)
            .field("lifecycle", &self.lifecycle())
            .finish_non_exhaustive()
    }
}

impl<T: Entity> Drop for Database<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}
