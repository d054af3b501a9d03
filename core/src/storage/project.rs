use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use clap::crate_version;
use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::storage::file::{read_json, write_json};
use crate::storage::item::{self, read_metadata, write_metadata};
use crate::storage::naming::{resolve_item_path, strip_traversal};
use crate::storage::{
    now_timestamp, Error, ItemDetails, ItemDetailsUpdate, ItemHandle, ItemKind, ItemMetadata, ItemSummary,
    Result, ATTRIBUTES_FILE, DESCRIPTION_FILE, IMAGES_DIR, PROJECT_FILE,
};

/// Name of the directory that holds projects by default.
const DEFAULT_PROJECTS_DIR: &str = "Folio Projects";

/// Contents of `project.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    pub name: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub last_modified: String,
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectManifest {
    fn new(name: &str) -> Self {
        let now = now_timestamp();
        ProjectManifest {
            name: name.to_string(),
            created: now.clone(),
            last_modified: now,
            version: crate_version!().to_string(),
            extra: Map::new(),
        }
    }
}

/// Handle to a project root directory.
///
/// The handle only remembers the root path. Every operation goes to the filesystem, so
/// handles are cheap to create and never go stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    root: PathBuf,
}

/// Default location for new projects: `<documents>/Folio Projects`, falling back to the
/// home directory and then the current directory.
pub fn default_projects_path() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_PROJECTS_DIR)
}

impl Project {
    /// Wraps `root` without checking that it is a project.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Project { root: root.into() }
    }

    /// Returns the root path of the project.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory that holds items of `kind`.
    pub fn kind_dir(&self, kind: ItemKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Resolves the directory of the item called `name`; see [`resolve_item_path`].
    pub fn item_path(&self, kind: ItemKind, name: &str) -> Result<PathBuf> {
        resolve_item_path(&self.root, kind, name)
    }

    /// Checks whether `path` is a project, i.e. has a `project.json` directly under it.
    pub async fn validate(path: &Path) -> bool {
        matches!(fs::metadata(path.join(PROJECT_FILE)).await, Ok(meta) if meta.is_file())
    }

    /// Creates a new project directory `<location>/<name>` with its kind directories and
    /// `project.json`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidName`] if `name` is empty after stripping traversal sequences.
    /// - [`Error::AlreadyExists`] if the target already contains a `project.json`.
    #[instrument(fields(location = %location.display()))]
    pub async fn create(name: &str, location: &Path) -> Result<Project> {
        let folder = strip_traversal(name.trim());
        if folder.is_empty() || folder.contains(['/', '\\']) {
            return Err(Error::InvalidName(name.to_string()));
        }
        let root = location.join(folder);
        let manifest_path = root.join(PROJECT_FILE);

        if fs::try_exists(&manifest_path).await.map_err(Error::Io)? {
            debug!("Project creation failed: '{}' already exists", manifest_path.display());
            return Err(Error::AlreadyExists(root));
        }

        fs::create_dir_all(&root).await.map_err(Error::Io)?;
        for kind in ItemKind::ALL {
            fs::create_dir_all(root.join(kind.dir_name())).await.map_err(Error::Io)?;
        }
        write_json(&manifest_path, &ProjectManifest::new(name.trim())).await?;

        info!("Project created at {}", root.display());
        Ok(Project { root })
    }

    /// Opens an existing project.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `path` does not exist.
    /// - [`Error::NotAProject`] if it has no `project.json`.
    /// - [`Error::Parse`] if `project.json` is malformed.
    #[instrument(fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Project> {
        let meta = fs::metadata(path).await.map_err(|e| Error::from_io(path, e))?;
        if !meta.is_dir() {
            return Err(Error::NotAProject(path.to_path_buf()));
        }
        let root = fs::canonicalize(path).await.map_err(Error::Io)?;

        let project = Project { root };
        project.manifest().await?;
        debug!("Project opened");
        Ok(project)
    }

    /// Reads `project.json`.
    pub async fn manifest(&self) -> Result<ProjectManifest> {
        read_json(&self.root.join(PROJECT_FILE))
            .await?
            .ok_or_else(|| Error::NotAProject(self.root.clone()))
    }

    /// Lists the items of `kind`.
    ///
    /// The kind directory is created if it is missing. Only subdirectories holding a
    /// `metadata.json` count as items; subdirectories whose metadata cannot be parsed are
    /// skipped and logged. Chapters and notes are sorted by display name, characters and
    /// lore keep directory enumeration order.
    ///
    /// # Errors
    ///
    /// Fails as a whole if the kind directory cannot be created or read.
    #[instrument(skip(self), fields(root = %self.root.display(), kind = %kind))]
    pub async fn list_items(&self, kind: ItemKind) -> Result<Vec<ItemSummary>> {
        let dir = self.kind_dir(kind);
        fs::create_dir_all(&dir).await.map_err(|e| {
            warn!("Failed to create kind directory: {}", e);
            Error::Io(e)
        })?;

        let mut read_dir = fs::read_dir(&dir).await.map_err(|e| {
            warn!("Failed to read kind directory: {}", e);
            Error::Io(e)
        })?;

        let mut items = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
            if !entry.file_type().await.map_err(Error::Io)?.is_dir() {
                continue;
            }
            let path = entry.path();
            let metadata = match read_metadata(&path).await {
                Ok(Some(metadata)) => metadata,
                Ok(None) => {
                    debug!("Skipping directory without metadata: {}", path.display());
                    continue;
                }
                Err(e) => {
                    warn!("Skipping item with unreadable metadata '{}': {}", path.display(), e);
                    continue;
                }
            };
            match item::summarize(path.clone(), kind, metadata).await {
                Ok(summary) => items.push(summary),
                Err(e) => warn!("Skipping unreadable item '{}': {}", path.display(), e),
            }
        }

        if kind.sorted_listing() {
            items.sort_by(|a, b| compare_display_names(&a.name, &b.name));
        }
        debug!("Found {} items", items.len());
        Ok(items)
    }

    /// Creates a new item called `name`.
    ///
    /// Writes `metadata.json`, the kind's empty content file and, for chapters and
    /// characters, an empty `description.txt` and `attributes.json`. An `images/`
    /// subdirectory is created for every kind. There is no rollback if a later write fails.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `name` is blank.
    /// - [`Error::AlreadyExists`] if the derived folder already exists.
    #[instrument(skip(self), fields(root = %self.root.display(), kind = %kind))]
    pub async fn create_item(&self, kind: ItemKind, name: &str) -> Result<ItemHandle> {
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument(format!("{} name must not be empty", kind.label())));
        }
        let path = self.item_path(kind, name)?;

        fs::create_dir_all(self.kind_dir(kind)).await.map_err(Error::Io)?;
        if fs::try_exists(&path).await.map_err(Error::Io)? {
            debug!("{} already exists at {}", kind.label(), path.display());
            return Err(Error::AlreadyExists(path));
        }

        // create_dir (not create_dir_all) so a concurrent create of the same name fails
        fs::create_dir(&path).await.map_err(|e| Error::from_io(&path, e))?;
        fs::create_dir(path.join(IMAGES_DIR)).await.map_err(Error::Io)?;

        let now = now_timestamp();
        write_metadata(&path, &ItemMetadata::new(kind, name, &now)).await?;
        fs::write(path.join(kind.content_file()), "").await.map_err(Error::Io)?;
        if kind.seeds_details_files() {
            fs::write(path.join(DESCRIPTION_FILE), "").await.map_err(Error::Io)?;
            write_json(&path.join(ATTRIBUTES_FILE), &crate::storage::Attributes::new()).await?;
        }

        info!("{} '{}' created", kind.label(), name);
        Ok(ItemHandle { path, name: name.to_string(), kind })
    }

    /// Reads content, description and attributes of the item called `name`.
    ///
    /// Missing sidecar files read as empty values. Chapters and characters keep their
    /// content in `content.md`; lore and notes use `content.txt`, falling back to
    /// `content.md` when only that file exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if `attributes.json` exists but is not a JSON object.
    #[instrument(skip(self), fields(root = %self.root.display(), kind = %kind))]
    pub async fn item_details(&self, kind: ItemKind, name: &str) -> Result<ItemDetails> {
        let path = self.item_path(kind, name)?;
        item::read_details(&path, kind).await.inspect_err(|e| {
            warn!("Failed to read item details: {}", e);
        })
    }

    /// Writes the fields present in `update` for the item called `name`.
    ///
    /// Content goes to the kind's content file: `content.md` for chapters and characters,
    /// `content.txt` for lore and notes. The item directory is created if it does not exist.
    /// If the item has a `metadata.json`, its `lastModified` is refreshed.
    #[instrument(skip(self, update), fields(root = %self.root.display(), kind = %kind))]
    pub async fn save_item_details(&self, kind: ItemKind, name: &str, update: ItemDetailsUpdate) -> Result<()> {
        let path = self.item_path(kind, name)?;
        item::write_details(&path, kind, update).await.inspect_err(|e| {
            warn!("Failed to save item details: {}", e);
        })?;
        debug!("Item details saved");
        Ok(())
    }
}

/// Root-locale collator for display names; `None` if the collation data failed to load.
static COLLATOR: LazyLock<Option<CollatorBorrowed<'static>>> = LazyLock::new(|| {
    Collator::try_new(Default::default(), CollatorOptions::default())
        .inspect_err(|e| warn!("Collation data unavailable, sorting by lowercase text: {}", e))
        .ok()
});

/// Locale-aware ordering with the exact text as tie breaker, so accented names sort next to
/// their base letters.
fn compare_display_names(a: &str, b: &str) -> Ordering {
    match COLLATOR.as_ref() {
        Some(collator) => collator.compare(a, b).then_with(|| a.cmp(b)),
        None => compare_lowercase(a, b),
    }
}

/// Case-insensitive ordering with the exact text as tie breaker.
fn compare_lowercase(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}
