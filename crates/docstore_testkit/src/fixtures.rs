//! Test fixtures: sample entities, temporary collections and stores, and
//! an archive builder for import tests.

use docstore_codec::{from_cbor, to_cbor, Document};
use docstore_core::{
    CommitSummary, Config, CoreResult, Database, Entity, EntityId, HASH_FIELD,
};
use docstore_dirstore::{
    hash_directory, DirectoryEntity, DirectoryParser, DirectoryStore, StoreConfig, StoreResult,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, Header};
use tempfile::TempDir;

/// File a [`PackageParser`] looks for.
pub const PACKAGE_MANIFEST: &str = "package.txt";

/// A small note. `Title` and `Priority` are indexed; `Body` is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Identifier.
    pub id: EntityId,
    /// Title, indexed as `Title`.
    pub title: String,
    /// Priority, indexed as `Priority`.
    pub priority: i64,
    /// Body, only in the full form.
    pub body: String,
}

impl Note {
    /// Creates a note with a fresh ID and a body derived from the title.
    pub fn new(title: &str, priority: i64) -> Self {
        Self {
            id: EntityId::new(),
            title: title.to_string(),
            priority,
            body: format!("{title} body"),
        }
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }
}

impl Entity for Note {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(to_cbor(self)?)
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        Ok(from_cbor(bytes)?)
    }

    fn index_document(&self) -> Document {
        Document::new()
            .with("Title", self.title.as_str())
            .with("Priority", self.priority)
    }
}

/// A package stored as a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Identifier, also the storage directory name.
    pub id: EntityId,
    /// First line of `package.txt`.
    pub name: String,
    /// Content hash of the package directory.
    pub hash: String,
    /// Where the package lives; assigned by the store.
    #[serde(skip)]
    pub directory: Option<PathBuf>,
}

impl Entity for Package {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(to_cbor(self)?)
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        Ok(from_cbor(bytes)?)
    }

    fn index_document(&self) -> Document {
        Document::new()
            .with("Name", self.name.as_str())
            .with(HASH_FIELD, self.hash.as_str())
    }
}

impl DirectoryEntity for Package {
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

/// Recognises directories containing a [`PACKAGE_MANIFEST`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageParser;

impl DirectoryParser<Package> for PackageParser {
    fn parse(&self, directory: &Path) -> StoreResult<Option<Package>> {
        let manifest = match fs::read_to_string(directory.join(PACKAGE_MANIFEST)) {
            Ok(manifest) => manifest,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let name = manifest.lines().next().unwrap_or_default().trim().to_string();

        Ok(Some(Package {
            id: EntityId::new(),
            name,
            hash: hash_directory(directory)?,
            directory: None,
        }))
    }
}

/// A note collection in a temporary directory.
pub struct TestCollection {
    /// The initialized database.
    pub db: Database<Note>,
    temp_dir: TempDir,
}

impl TestCollection {
    /// Creates an initialized collection with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an initialized collection with custom configuration.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::with_config(temp_dir.path().join("notes"), config);
        db.initialize().expect("Failed to initialize database");
        Self { db, temp_dir }
    }

    /// Collection root.
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().join("notes")
    }

    /// Disposes the database and opens the same directory again.
    pub fn reopen(&mut self) {
        self.db.dispose();
        self.db = Database::with_config(self.path(), self.db.config().clone());
        self.db.initialize().expect("Failed to reinitialize database");
    }

    /// Writes `notes` in one commit.
    pub fn write(&self, notes: &[Note]) -> CommitSummary {
        let mut editor = self.db.edit().expect("Failed to start editor");
        editor.write_range(notes).expect("Failed to buffer writes");
        editor.commit().expect("Failed to commit")
    }

    /// Removes `notes` in one commit.
    pub fn remove(&self, notes: &[Note]) -> CommitSummary {
        let mut editor = self.db.edit().expect("Failed to start editor");
        editor.remove_range(notes).expect("Failed to buffer removals");
        editor.commit().expect("Failed to commit")
    }

    /// Every stored note, in index order.
    pub fn all(&self) -> Vec<Note> {
        self.db
            .query()
            .expect("Failed to start query")
            .get_result()
            .expect("Failed to run query")
            .into_iter()
            .collect::<CoreResult<_>>()
            .expect("Failed to load notes")
    }
}

impl Default for TestCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestCollection {
    type Target = Database<Note>;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// A package store in a temporary directory.
pub struct TestStore {
    /// The open store.
    pub store: DirectoryStore<Package, PackageParser>,
    temp_dir: TempDir,
}

impl TestStore {
    /// Opens an empty store.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = DirectoryStore::open(temp_dir.path().join("store"), PackageParser)
            .expect("Failed to open store");
        Self { store, temp_dir }
    }

    /// Store root.
    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().join("store")
    }

    /// Scratch directory next to the store, for archives and the like.
    pub fn scratch(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Disposes the store and opens the same root again.
    pub fn reopen(&mut self) {
        self.reopen_with_config(StoreConfig::default());
    }

    /// Disposes the store and opens the same root with `config`.
    pub fn reopen_with_config(&mut self, config: StoreConfig) {
        self.store.dispose();
        self.store = DirectoryStore::open_with_config(self.root(), PackageParser, config)
            .expect("Failed to reopen store");
    }

    /// Writes a package archive named `file` into the scratch directory.
    pub fn package_archive(&self, file: &str, name: &str, extra: &[(&str, &[u8])]) -> PathBuf {
        let mut builder = ArchiveBuilder::new().file(PACKAGE_MANIFEST, name.as_bytes());
        for (path, data) in extra {
            builder = builder.file(path, data);
        }
        builder
            .write_to(&self.scratch().join(file))
            .expect("Failed to write archive")
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = DirectoryStore<Package, PackageParser>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Builds tar archives, optionally zstd-compressed.
///
/// Entries get mode `0644` and a zero mtime, so equal inputs give equal
/// archives.
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    files: Vec<(String, Vec<u8>)>,
    compression_level: Option<i32>,
}

impl ArchiveBuilder {
    /// Creates an empty, uncompressed archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a regular file.
    #[must_use]
    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.files.push((path.to_string(), data.to_vec()));
        self
    }

    /// Compresses the archive with zstd at `level`.
    #[must_use]
    pub fn zstd(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    /// Returns the archive bytes.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        match self.compression_level {
            None => self.append_all(Builder::new(Vec::new())),
            Some(level) => {
                let mut buffer = Vec::new();
                {
                    let encoder = zstd::Encoder::new(&mut buffer, level)?.auto_finish();
                    let encoder = self.append_all(Builder::new(encoder))?;
                    drop(encoder);
                }
                Ok(buffer)
            }
        }
    }

    /// Writes the archive to `path` and returns the path.
    pub fn write_to(&self, path: &Path) -> io::Result<PathBuf> {
        let mut file = fs::File::create(path)?;
        file.write_all(&self.to_bytes()?)?;
        Ok(path.to_path_buf())
    }

    fn append_all<W: Write>(&self, mut builder: Builder<W>) -> io::Result<W> {
        for (path, data) in &self.files {
            let mut header = Header::new_gnu();
            header.set_path(path)?;
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_cksum();
            builder.append(&header, data.as_slice())?;
        }
        builder.into_inner()
    }
}
