//! The directory-backed store.

use crate::archive::extract_archive;
use crate::entity::{directory_record, DirectoryEntity, DirectoryParser};
use crate::error::{StoreError, StoreResult};
use crate::feed::{ChangeFeed, StoreEvent};
use crate::storage::DirectoryStorage;
use docstore_codec::Value;
use docstore_core::{
    document_id, Config, CoreError, Database, EntityId, Processor, ProcessorGuard, Query,
    HASH_FIELD,
};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Subdirectory of the store root holding the collection.
pub const DATABASE_DIR: &str = "database";
/// Subdirectory of the store root holding one directory per entity.
pub const STORAGE_DIR: &str = "storage";
/// Subdirectory of the store root used to stage imports.
pub const STAGING_DIR: &str = "staging";

/// Configuration for a [`DirectoryStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Configuration of the underlying collection.
    pub database: Config,
    /// Whether [`DirectoryStore::reload`] first restores backup siblings.
    pub restore_backups_on_reload: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: Config::default(),
            restore_backups_on_reload: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collection configuration.
    #[must_use]
    pub fn database(mut self, config: Config) -> Self {
        self.database = config;
        self
    }

    /// Sets whether reloads restore backups.
    #[must_use]
    pub fn restore_backups_on_reload(mut self, value: bool) -> Self {
        self.restore_backups_on_reload = value;
        self
    }
}

/// What a [`DirectoryStore::reload`] found and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Index entries after the reload.
    pub entries: usize,
    /// Backup siblings renamed back into place.
    pub restored_backups: usize,
    /// Orphaned directories registered under a new ID.
    pub adopted: usize,
    /// Index entries given back their content hash after a rebuild.
    pub rehashed: usize,
    /// Unrecognisable directories deleted.
    pub discarded: usize,
}

/// Entities stored as directories, indexed by a collection of the same type.
///
/// ```text
/// <root>/database/        collection (index.dbi, data/)
/// <root>/storage/<id>/    content of one entity
/// <root>/staging/         imports being unpacked
/// ```
///
/// Every mutation runs inside the collection lock, so the index and the
/// storage directories change together. Change events are sent before the
/// lock is released, in commit order.
///
/// # Example
///
/// ```rust,ignore
/// let store = DirectoryStore::open("packages", PackageParser)?;
/// let package = store.import(Path::new("download.tar.zst"))?;
/// let events = store.subscribe();
/// store.delete(&package)?;
/// ```
pub struct DirectoryStore<T: DirectoryEntity, P: DirectoryParser<T>> {
    root: PathBuf,
    config: StoreConfig,
    parser: P,
    storage: DirectoryStorage,
    staging: PathBuf,
    database: RwLock<Database<T>>,
    feed: ChangeFeed,
}

impl<T: DirectoryEntity, P: DirectoryParser<T>> DirectoryStore<T, P> {
    /// Opens the store at `root` and reloads it.
    pub fn open(root: impl Into<PathBuf>, parser: P) -> StoreResult<Self> {
        Self::open_with_config(root, parser, StoreConfig::default())
    }

    /// Opens the store with custom configuration and reloads it.
    pub fn open_with_config(
        root: impl Into<PathBuf>,
        parser: P,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let storage = DirectoryStorage::open(root.join(STORAGE_DIR))?;
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        let database = Database::with_config(root.join(DATABASE_DIR), config.database.clone());

        let store = Self {
            root,
            config,
            parser,
            storage,
            staging,
            database: RwLock::new(database),
            feed: ChangeFeed::new(),
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-initializes the collection and registers orphaned directories.
    ///
    /// Restores backup siblings first when configured, and clears the
    /// staging area. Index entries without a content hash, as left by a
    /// rebuild from data files, get it back from their record. A storage directory whose name is not an indexed ID is
    /// an orphan: it is parsed, moved to a fresh ID and indexed. Orphans the
    /// parser does not recognise are deleted.
    pub fn reload(&self) -> StoreResult<ReloadSummary> {
        let mut summary = ReloadSummary::default();
        if self.config.restore_backups_on_reload {
            summary.restored_backups = self.storage.restore_backups()?;
        }
        self.clear_staging()?;

        let database = Database::with_config(
            self.root.join(DATABASE_DIR),
            self.config.database.clone(),
        );
        database.initialize()?;
        let processor = database.processor()?;
        let previous = std::mem::replace(&mut *self.database.write(), database);
        previous.dispose();

        let save = self.config.database.save_index_on_commit;
        processor.while_locked(|guard| -> StoreResult<()> {
            summary.rehashed = restore_hashes(guard)?;

            let mut added = Vec::new();
            for dir in self.storage.list()? {
                if dir.id.is_some_and(|id| guard.index().contains(id)) {
                    continue;
                }

                let parsed = match self.parser.parse(&dir.path) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!(path = %dir.path.display(), error = %e, "orphaned directory failed to parse");
                        None
                    }
                };
                let Some(mut entity) = parsed else {
                    warn!(path = %dir.path.display(), "deleting unrecognised directory");
                    self.storage.delete_path(&dir.path)?;
                    summary.discarded += 1;
                    continue;
                };

                let id = EntityId::new();
                let target = self.storage.move_into(&dir.path, id)?;
                entity.assign(id, target);
                let record = directory_record(&entity)?;
                guard.write_data(std::slice::from_ref(&record))?;
                if let Some(stale) = dir.id {
                    guard.remove_data(&[stale])?;
                }

                info!(id = %id, from = %dir.path.display(), "adopted orphaned directory");
                added.push(StoreEvent::Added {
                    id,
                    index: record.index,
                });
                summary.adopted += 1;
            }

            if (summary.adopted > 0 || summary.rehashed > 0) && save {
                guard.save_index()?;
            }
            summary.entries = guard.index().len();
            self.feed.emit_batch(added);
            Ok(())
        })?;

        info!(
            root = %self.root.display(),
            entries = summary.entries,
            adopted = summary.adopted,
            rehashed = summary.rehashed,
            discarded = summary.discarded,
            restored = summary.restored_backups,
            "store reloaded"
        );
        Ok(summary)
    }

    /// Imports an archive.
    ///
    /// The archive is unpacked into a staging directory and parsed. If an
    /// indexed entity has the same content hash, the import takes over its
    /// ID and replaces its directory; otherwise a fresh ID is allocated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotImportable`] if the archive cannot be
    /// unpacked or its content is not an entity. Nothing is left behind in
    /// storage, staging or the index in that case.
    pub fn import(&self, archive: &Path) -> StoreResult<T> {
        let processor = self.processor()?;
        let staging = tempfile::Builder::new()
            .prefix("import-")
            .tempdir_in(&self.staging)?;
        let content = staging.path().join("content");

        extract_archive(archive, &content)?;
        let mut entity = match self.parser.parse(&content) {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                return Err(StoreError::not_importable(format!(
                    "{} holds no recognised entity",
                    archive.display()
                )))
            }
            Err(e) => return Err(StoreError::not_importable(e.to_string())),
        };

        let save = self.config.database.save_index_on_commit;
        let entity = processor.while_locked(|guard| -> StoreResult<_> {
            let hash = Value::from(entity.hash_code());
            let existing = guard.index().find_by(HASH_FIELD, &hash).map(|(id, _)| id);
            let id = existing.unwrap_or_else(EntityId::new);
            if existing.is_some() {
                info!(id = %id, hash = entity.hash_code(), "import matches stored content, replacing it");
            }

            let target = self.storage.move_into(&content, id)?;
            entity.assign(id, target);
            let record = directory_record(&entity)?;
            if let Err(e) = guard.write_data(std::slice::from_ref(&record)) {
                if existing.is_none() {
                    if let Err(cleanup) = self.storage.delete(id) {
                        warn!(id = %id, error = %cleanup, "could not remove directory of failed import");
                    }
                }
                return Err(e.into());
            }
            if save {
                guard.save_index()?;
            }
            self.feed.emit(StoreEvent::Added {
                id,
                index: record.index,
            });
            Ok(entity)
        })?;

        debug!(id = %entity.entity_id(), archive = %archive.display(), "imported archive");
        Ok(entity)
    }

    /// Imports every archive, each on its own.
    pub fn import_many<I, A>(&self, archives: I) -> Vec<StoreResult<T>>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<Path>,
    {
        archives
            .into_iter()
            .map(|archive| self.import(archive.as_ref()))
            .collect()
    }

    /// Deletes an entity's index entry and directory.
    pub fn delete(&self, entity: &T) -> StoreResult<bool> {
        self.delete_id(entity.entity_id())
    }

    /// Deletes the directory and then the index entry of `id`.
    ///
    /// If the directory cannot be deleted the index is left untouched.
    /// Returns false if neither existed.
    pub fn delete_id(&self, id: EntityId) -> StoreResult<bool> {
        let save = self.config.database.save_index_on_commit;
        let deleted = self.processor()?.while_locked(|guard| -> StoreResult<bool> {
            let removed_dir = self.storage.delete(id)?;
            let indexed = guard.remove_data(&[id])? > 0;
            if indexed && save {
                guard.save_index()?;
            }
            let deleted = indexed || removed_dir;
            if deleted {
                self.feed.emit(StoreEvent::Removed { id });
            }
            Ok(deleted)
        })?;

        if deleted {
            debug!(id = %id, "deleted entity");
        }
        Ok(deleted)
    }

    /// Deletes every entity and recreates an empty storage root.
    ///
    /// Returns how many entities were indexed.
    pub fn delete_all(&self) -> StoreResult<usize> {
        let save = self.config.database.save_index_on_commit;
        let ids = self.processor()?.while_locked(|guard| -> StoreResult<Vec<EntityId>> {
            let ids: Vec<EntityId> = guard.index().ids().collect();
            self.storage.delete_all()?;
            guard.remove_data(&ids)?;
            if save {
                guard.save_index()?;
            }
            self.feed
                .emit_batch(ids.iter().map(|&id| StoreEvent::Removed { id }));
            Ok(ids)
        })?;

        info!(count = ids.len(), "deleted all entities");
        Ok(ids.len())
    }

    /// Returns every entity whose directory exists.
    pub fn get_all(&self) -> StoreResult<Vec<T>> {
        self.get(|query| query)
    }

    /// Runs a query and returns the entities whose directory exists.
    ///
    /// Entities whose directory or data file is gone are removed from the
    /// index instead of being returned. A directory that outlives its data
    /// file becomes an orphan and is adopted again by the next reload.
    ///
    /// ```rust,ignore
    /// let recent = store.get(|query| query.sort(|a, b| b["Version"].cmp(&a["Version"])).size(5))?;
    /// ```
    pub fn get<F>(&self, build: F) -> StoreResult<Vec<T>>
    where
        F: FnOnce(Query<T>) -> Query<T>,
    {
        let query = self.database.read().query()?;
        let result = build(query).get_result()?;

        let mut found = Vec::with_capacity(result.count());
        let mut missing = Vec::new();
        let mut unreadable = Vec::new();
        for record in result {
            let mut entity = match record {
                Ok(entity) => entity,
                Err(CoreError::DataNotFound { id }) => {
                    unreadable.push(id);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let id = entity.entity_id();
            let directory = self.storage.path_for(id);
            if directory.is_dir() {
                entity.assign(id, directory);
                found.push(entity);
            } else {
                missing.push(id);
            }
        }

        if !missing.is_empty() || !unreadable.is_empty() {
            self.forget_missing(&missing, &unreadable)?;
        }
        Ok(found)
    }

    /// Returns the entity with `id`, if indexed and present on disk.
    pub fn find(&self, id: EntityId) -> StoreResult<Option<T>> {
        let mut found = self.get(|query| query.filter(move |doc| document_id(doc) == Some(id)))?;
        Ok(found.pop())
    }

    /// Number of indexed entities.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.processor()?.len()?)
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Subscribes to committed additions and removals.
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        self.feed.subscribe()
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory storage.
    pub fn storage(&self) -> &DirectoryStorage {
        &self.storage
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the processor of the underlying collection.
    pub fn processor(&self) -> StoreResult<Arc<Processor<T>>> {
        Ok(self.database.read().processor()?)
    }

    /// Disposes the underlying collection. Irreversible.
    pub fn dispose(&self) {
        self.database.read().dispose();
    }

    fn forget_missing(&self, no_directory: &[EntityId], no_data: &[EntityId]) -> StoreResult<()> {
        let save = self.config.database.save_index_on_commit;
        let removed = self.processor()?.while_locked(|guard| -> StoreResult<usize> {
            let mut gone: Vec<EntityId> = no_directory
                .iter()
                .copied()
                .filter(|&id| guard.index().contains(id) && !self.storage.contains(id))
                .collect();
            gone.extend(no_data.iter().copied().filter(|&id| {
                guard.index().contains(id)
                    && matches!(guard.load_raw(id), Err(CoreError::DataNotFound { .. }))
            }));
            if gone.is_empty() {
                return Ok(0);
            }

            guard.remove_data(&gone)?;
            if save {
                guard.save_index()?;
            }
            self.feed
                .emit_batch(gone.iter().map(|&id| StoreEvent::Removed { id }));
            Ok(gone.len())
        })?;

        if removed > 0 {
            warn!(count = removed, "removed index entries whose directory or data file is gone");
        }
        Ok(())
    }

    fn clear_staging(&self) -> StoreResult<()> {
        for entry in fs::read_dir(&self.staging)? {
            let path = entry?.path();
            debug!(path = %path.display(), "clearing staged leftovers");
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Puts [`HASH_FIELD`] back into index entries that lack it.
///
/// Records that cannot be read are skipped; reads remove them later.
fn restore_hashes<T: DirectoryEntity>(guard: &mut ProcessorGuard<'_, T>) -> StoreResult<usize> {
    let unhashed: Vec<EntityId> = guard
        .index()
        .raw()
        .filter(|doc| !doc.contains(HASH_FIELD))
        .filter_map(document_id)
        .collect();

    let mut restored = 0;
    for id in unhashed {
        let entity = match guard.load_data(id) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(id = %id, error = %e, "cannot read record to restore its content hash");
                continue;
            }
        };
        if guard.update_index(directory_record(&entity)?.index)? {
            restored += 1;
        }
    }

    if restored > 0 {
        info!(count = restored, "restored content hashes in index");
    }
    Ok(restored)
}

impl<T: DirectoryEntity, P: DirectoryParser<T>> std::fmt::Debug for DirectoryStore<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryStore")
            .field("root", &self.root)
            .field("subscribers", &self.feed.subscriber_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_directory;
    use docstore_codec::{from_cbor, to_cbor, Document};
    use docstore_core::{CoreResult, Entity};
    use serde::{Deserialize, Serialize};
    use std::io;
    use tar::{Builder, Header};
    use tempfile::{tempdir, TempDir};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Bundle {
        id: EntityId,
        name: String,
        hash: String,
        #[serde(skip)]
        directory: Option<PathBuf>,
    }

    impl Entity for Bundle {
        fn entity_id(&self) -> EntityId {
            self.id
        }

        fn encode(&self) -> CoreResult<Vec<u8>> {
            Ok(to_cbor(self)?)
        }

        fn decode(bytes: &[u8]) -> CoreResult<Self> {
            Ok(from_cbor(bytes)?)
        }

        // No hash field: the store has to add it itself.
        fn index_document(&self) -> Document {
            Document::new().with("Name", self.name.as_str())
        }
    }

    impl DirectoryEntity for Bundle {
        fn hash_code(&self) -> &str {
            &self.hash
        }

        fn directory(&self) -> Option<&Path> {
            self.directory.as_deref()
        }

        fn assign(&mut self, id: EntityId, directory: PathBuf) {
            self.id = id;
            self.directory = Some(directory);
        }
    }

    type Parser = fn(&Path) -> StoreResult<Option<Bundle>>;

    fn parse_bundle(dir: &Path) -> StoreResult<Option<Bundle>> {
        let name = match fs::read_to_string(dir.join("name.txt")) {
            Ok(name) => name,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Bundle {
            id: EntityId::new(),
            name: name.trim().to_string(),
            hash: hash_directory(dir)?,
            directory: None,
        }))
    }

    fn open(temp: &TempDir) -> DirectoryStore<Bundle, Parser> {
        DirectoryStore::open(temp.path().join("store"), parse_bundle as Parser).unwrap()
    }

    fn archive(temp: &TempDir, file: &str, files: &[(&str, &str)]) -> PathBuf {
        let mut builder = Builder::new(Vec::new());
        for (path, data) in files {
            let mut header = Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, data.as_bytes()).unwrap();
        }
        let path = temp.path().join(file);
        fs::write(&path, builder.into_inner().unwrap()).unwrap();
        path
    }

    #[test]
    fn import_assigns_id_and_directory() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let a = archive(&temp, "a.tar", &[("name.txt", "alpha"), ("data.bin", "1")]);

        let bundle = store.import(&a).unwrap();

        let dir = bundle.directory().unwrap();
        assert_eq!(dir, store.storage().path_for(bundle.id));
        assert_eq!(fs::read_to_string(dir.join("name.txt")).unwrap(), "alpha");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn identical_content_is_deduplicated() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let files = [("name.txt", "alpha"), ("data.bin", "1")];
        let first = store.import(&archive(&temp, "a.tar", &files)).unwrap();
        let second = store.import(&archive(&temp, "b.tar", &files)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.storage().list().unwrap().len(), 1);
    }

    #[test]
    fn different_content_gets_new_id() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let first = store
            .import(&archive(&temp, "a.tar", &[("name.txt", "alpha")]))
            .unwrap();
        let second = store
            .import(&archive(&temp, "b.tar", &[("name.txt", "beta")]))
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.get_all().unwrap().len(), 2);
    }

    #[test]
    fn failed_imports_leave_no_residue() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let garbage = temp.path().join("garbage.tar");
        fs::write(&garbage, [b'x'; 2048]).unwrap();
        let unrecognised = archive(&temp, "other.tar", &[("readme.md", "hi")]);

        assert!(matches!(
            store.import(&garbage),
            Err(StoreError::NotImportable { .. })
        ));
        assert!(matches!(
            store.import(&unrecognised),
            Err(StoreError::NotImportable { .. })
        ));

        assert!(store.is_empty().unwrap());
        assert!(store.storage().list().unwrap().is_empty());
        assert_eq!(fs::read_dir(temp.path().join("store/staging")).unwrap().count(), 0);
    }

    #[test]
    fn reload_adopts_orphans_once() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let stray = store.storage().root().join("stray");
        fs::create_dir_all(&stray).unwrap();
        fs::write(stray.join("name.txt"), "orphan").unwrap();

        let summary = store.reload().unwrap();
        assert_eq!(summary.adopted, 1);
        assert!(!stray.exists());

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "orphan");
        assert!(store.storage().contains(all[0].id));

        let again = store.reload().unwrap();
        assert_eq!(again.adopted, 0);
        assert_eq!(again.entries, 1);
    }

    #[test]
    fn reload_deletes_unrecognised_directories() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let junk = store.storage().root().join("junk");
        fs::create_dir_all(&junk).unwrap();
        fs::write(junk.join("random.txt"), "?").unwrap();

        let summary = store.reload().unwrap();

        assert_eq!(summary.discarded, 1);
        assert!(!junk.exists());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn reload_restores_interrupted_replacement() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let bundle = store
            .import(&archive(&temp, "a.tar", &[("name.txt", "alpha")]))
            .unwrap();
        let dir = store.storage().path_for(bundle.id);
        fs::rename(&dir, store.storage().root().join(format!("{}_backup", bundle.id))).unwrap();

        let summary = store.reload().unwrap();

        assert_eq!(summary.restored_backups, 1);
        assert_eq!(summary.adopted, 0);
        assert_eq!(store.get_all().unwrap(), vec![Bundle {
            directory: Some(dir),
            ..bundle
        }]);
    }

    #[test]
    fn missing_directory_heals_index() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let events = store.subscribe();
        let bundle = store
            .import(&archive(&temp, "a.tar", &[("name.txt", "alpha")]))
            .unwrap();
        fs::remove_dir_all(bundle.directory().unwrap()).unwrap();

        assert!(store.get_all().unwrap().is_empty());
        assert!(store.is_empty().unwrap());

        assert!(matches!(events.recv().unwrap(), StoreEvent::Added { .. }));
        assert_eq!(events.recv().unwrap(), StoreEvent::Removed { id: bundle.id });
    }

    #[test]
    fn delete_removes_entry_and_directory() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let bundle = store
            .import(&archive(&temp, "a.tar", &[("name.txt", "alpha")]))
            .unwrap();

        assert!(store.delete(&bundle).unwrap());
        assert!(!store.delete(&bundle).unwrap());
        assert!(store.is_empty().unwrap());
        assert!(!store.storage().contains(bundle.id));
    }

    #[test]
    fn delete_all_wipes_everything() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let results = store.import_many([
            archive(&temp, "a.tar", &[("name.txt", "alpha")]),
            archive(&temp, "b.tar", &[("name.txt", "beta")]),
        ]);
        assert!(results.iter().all(Result::is_ok));

        assert_eq!(store.delete_all().unwrap(), 2);
        assert!(store.is_empty().unwrap());
        assert!(store.storage().list().unwrap().is_empty());
    }

    #[test]
    fn get_applies_query_stages() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        for (file, name) in [("a.tar", "alpha"), ("b.tar", "beta"), ("c.tar", "gamma")] {
            store.import(&archive(&temp, file, &[("name.txt", name)])).unwrap();
        }

        let names: Vec<String> = store
            .get(|query| {
                query
                    .filter(|doc| doc["Name"] != Value::from("beta"))
                    .sort(|a, b| b["Name"].cmp(&a["Name"]))
            })
            .unwrap()
            .into_iter()
            .map(|bundle| bundle.name)
            .collect();

        assert_eq!(names, vec!["gamma", "alpha"]);
    }

    #[test]
    fn find_by_id() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let bundle = store
            .import(&archive(&temp, "a.tar", &[("name.txt", "alpha")]))
            .unwrap();

        assert_eq!(store.find(bundle.id).unwrap().unwrap().name, "alpha");
        assert!(store.find(EntityId::new()).unwrap().is_none());
    }

    #[test]
    fn state_survives_reopen() {
        let temp = tempdir().unwrap();
        let id = {
            let store = open(&temp);
            store
                .import(&archive(&temp, "a.tar", &[("name.txt", "alpha")]))
                .unwrap()
                .id
        };

        let store = open(&temp);
        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
    }

    #[test]
    fn dedup_survives_index_rebuild() {
        let temp = tempdir().unwrap();
        let files = [("name.txt", "alpha"), ("data.bin", "1")];
        let first = {
            let store = open(&temp);
            store.import(&archive(&temp, "a.tar", &files)).unwrap()
        };
        fs::remove_file(temp.path().join("store/database/index.dbi")).unwrap();

        let store = open(&temp);
        let doc = store.processor().unwrap().get(first.id).unwrap().unwrap();
        assert_eq!(doc.get_text(HASH_FIELD), Some(first.hash.as_str()));

        let second = store.import(&archive(&temp, "a.tar", &files)).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.storage().list().unwrap().len(), 1);
    }

    #[test]
    fn reload_reports_restored_hashes() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let bundle = store
            .import(&archive(&temp, "a.tar", &[("name.txt", "alpha")]))
            .unwrap();
        let processor = store.processor().unwrap();
        processor.rebuild_index().unwrap();
        processor.save_index().unwrap();

        let summary = store.reload().unwrap();

        assert_eq!(summary.rehashed, 1);
        assert_eq!(summary.adopted, 0);
        let doc = store.processor().unwrap().get(bundle.id).unwrap().unwrap();
        assert!(doc.contains(HASH_FIELD));
    }

    #[test]
    fn lost_data_file_heals_and_directory_is_adopted() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let bundle = store
            .import(&archive(&temp, "a.tar", &[("name.txt", "alpha")]))
            .unwrap();
        let processor = store.processor().unwrap();
        fs::remove_file(processor.dir().data_path(bundle.id)).unwrap();

        assert!(store.get_all().unwrap().is_empty());
        assert!(store.get_all().unwrap().is_empty());
        assert!(store.is_empty().unwrap());

        let summary = store.reload().unwrap();
        assert_eq!(summary.adopted, 1);
        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "alpha");
        assert_ne!(all[0].id, bundle.id);
    }

    #[test]
    fn adoption_removes_stale_data_file() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let stale = EntityId::new();
        let dir = store.storage().path_for(stale);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name.txt"), "orphan").unwrap();
        let processor = store.processor().unwrap();
        processor.save_index().unwrap();
        processor.dir().write_data(stale, b"left over", false).unwrap();

        let summary = store.reload().unwrap();

        assert_eq!(summary.adopted, 1);
        let processor = store.processor().unwrap();
        assert!(!processor.dir().data_path(stale).exists());
        assert_eq!(processor.dir().list_data_ids().unwrap().len(), 1);
    }

    #[test]
    fn failed_index_write_removes_new_directory() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let data_dir = store.processor().unwrap().dir().data_dir();
        fs::remove_dir_all(&data_dir).unwrap();
        fs::write(&data_dir, b"not a directory").unwrap();

        assert!(store
            .import(&archive(&temp, "a.tar", &[("name.txt", "alpha")]))
            .is_err());

        assert!(store.is_empty().unwrap());
        assert!(store.storage().list().unwrap().is_empty());
    }

    #[test]
    fn events_follow_commit_order_under_contention() {
        let temp = tempdir().unwrap();
        let store = open(&temp);
        let a = archive(&temp, "a.tar", &[("name.txt", "alpha")]);
        let events = store.subscribe();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        let bundle = store.import(&a).unwrap();
                        store.delete(&bundle).unwrap();
                    }
                });
            }
        });

        match events.try_iter().last().unwrap() {
            StoreEvent::Removed { .. } => assert!(store.is_empty().unwrap()),
            StoreEvent::Added { id, .. } => assert!(store.storage().contains(id)),
        }
    }
}
