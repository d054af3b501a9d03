//! Provides filesystem storage for writing projects: chapters, characters, lore entries and notes.
//!
//! This module owns the on-disk layout convention for a Folio project and exposes typed
//! list/create/read/update/rename/delete operations for every item kind. The filesystem is
//! the only source of truth; nothing here caches state between calls.
//!
//! # Core Concepts
//!
//! *   **[`Project`]:** A root directory containing a `project.json` marker file and one
//!     directory per [`ItemKind`] (`Book Chapters`, `Characters`, `World Lore`, `Notes`).
//!     Projects are created with [`Project::create`] and opened with [`Project::open`];
//!     [`Project::at`] wraps an arbitrary root without any checks.
//! *   **Item:** A subdirectory of its kind directory that contains a `metadata.json` file.
//!     An item has a *display name* (free-form, stored in the metadata) and a *folder name*
//!     derived from it (see [`folder_name`]). Next to `metadata.json` an item holds a small
//!     set of sidecar files:
//!     *   `content.md` (chapters, characters) or `content.txt` (lore, notes)
//!     *   `description.txt`
//!     *   `attributes.json`, an open key/value map of user-defined tags
//!     *   an empty `images/` directory
//! *   **[`DirectoryIndex`]:** A legacy `metadata.json` at kind-directory level that maps flat
//!     files (`{files: [{displayName, fileName, ...}]}`) to display names. It is consulted
//!     only when renaming or deleting flat files inside `Book Chapters` or `Notes`.
//!
//! # Folder Names
//!
//! Folder names are derived by replacing every character outside a permitted class with
//! `_`. Chapters and characters permit `[A-Za-z0-9_-]`, lore and notes only `[A-Za-z0-9]`.
//! The classes differ for historical reasons and are kept, since changing them would move
//! existing items on disk. Two display names with the same folder name collide: creating
//! the second fails with [`Error::AlreadyExists`]. Nothing is suffixed or deduplicated.
//!
//! # Consistency
//!
//! Writes are plain overwrites. There is no rollback: a create that fails half-way leaves
//! the partially created directory behind, and retrying reports [`Error::AlreadyExists`].
//! Mutations of a directory index are serialized per index directory within one process;
//! concurrent writers in separate processes can still lose updates.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use folio_core::storage::{ItemKind, ItemDetailsUpdate, Project};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = tempfile::tempdir()?;
//!     let project = Project::create("My Novel", dir.path()).await?;
//!
//!     let chapter = project.create_item(ItemKind::Chapter, "Opening").await?;
//!     println!("Chapter created at {}", chapter.path.display());
//!
//!     let update = ItemDetailsUpdate { content: Some("It was a dark night.".into()), ..Default::default() };
//!     project.save_item_details(ItemKind::Chapter, "Opening", update).await?;
//!
//!     let chapters = project.list_items(ItemKind::Chapter).await?;
//!     assert_eq!(chapters[0].word_count, Some(5));
//!     Ok(())
//! }
//! ```

pub use self::file::{read_file, save_file};
pub use self::index::{
    add_file_to_metadata, get_directory_metadata, get_display_name_from_file_name,
    get_file_name_from_display_name, remove_file_from_metadata, save_directory_metadata,
    update_file_in_metadata, DirectoryIndex, FileEntry,
};
pub use self::item::{
    delete_item, AttributeValue, Attributes, Deleted, ItemDetails, ItemDetailsUpdate, ItemHandle,
    ItemMetadata, ItemSummary,
};
pub use self::kind::{ItemKind, NameClass};
pub use self::naming::{
    check_name_exists, folder_name, next_available_name, resolve_item_path, strip_traversal,
};
pub use self::project::{default_projects_path, Project, ProjectManifest};
pub use self::rename::{rename_item, Renamed};

mod file;
mod index;
mod item;
mod kind;
mod naming;
mod project;
mod rename;

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker file that makes a directory a project.
pub const PROJECT_FILE: &str = "project.json";
/// Per-item metadata file; at kind-directory level the same name holds the [`DirectoryIndex`].
pub const METADATA_FILE: &str = "metadata.json";
pub const DESCRIPTION_FILE: &str = "description.txt";
pub const ATTRIBUTES_FILE: &str = "attributes.json";
pub const IMAGES_DIR: &str = "images";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("An item already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown item kind: {0:?}")]
    InvalidKind(String),

    #[error("Name does not produce a usable path segment: {0:?}")]
    InvalidName(String),

    #[error("Path is not inside the expected item directory: {0}")]
    InvalidPath(PathBuf),

    #[error("Path is not a valid project (missing 'project.json'): {0}")]
    NotAProject(PathBuf),

    #[error("Malformed JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Metadata serialization error")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable discriminant of an [`Error`], suitable for callers that branch on the failure
/// category rather than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    InvalidPath,
    ParseError,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) | Error::NotAProject(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::InvalidArgument(_) | Error::InvalidKind(_) | Error::InvalidName(_) => {
                ErrorKind::InvalidArgument
            }
            Error::InvalidPath(_) => ErrorKind::InvalidPath,
            Error::Parse { .. } | Error::Serialize(_) => ErrorKind::ParseError,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Maps an I/O error on `path` to [`Error::NotFound`] or [`Error::AlreadyExists`] where
    /// the error kind says so, and to [`Error::Io`] otherwise.
    pub(crate) fn from_io(path: &Path, e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            std::io::ErrorKind::AlreadyExists => Error::AlreadyExists(path.to_path_buf()),
            _ => Error::Io(e),
        }
    }
}

// Define a standard Result type for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Current time as an ISO-8601 UTC string with millisecond precision (`2024-05-01T12:00:00.000Z`).
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
