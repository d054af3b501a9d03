use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::storage::index;
use crate::storage::item::{read_metadata, write_metadata};
use crate::storage::naming::path_segment;
use crate::storage::{now_timestamp, Error, ItemKind, NameClass, Result};

/// Outcome of [`rename_item`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Renamed {
    /// Path of the item after the rename. Unchanged for indexed flat files.
    pub path: PathBuf,
    pub message: String,
}

/// Gives the item at `old_path` the display name `new_name`.
///
/// What happens depends on the shape of the target:
///
/// *   A flat file directly inside `Book Chapters` or `Notes` keeps its file name; only its
///     entry in the directory index is updated (or added).
/// *   A directory has its `metadata.json` name and `lastModified` rewritten (if it has
///     metadata) and is then moved to the folder name derived from `new_name`.
/// *   Any other file is moved to the sanitized new name, keeping its extension.
///
/// The sanitizer class follows the kind of the parent directory and defaults to the
/// `[A-Za-z0-9_-]` class outside kind directories.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] if `new_name` is blank.
/// - [`Error::NotFound`] if `old_path` does not exist.
/// - [`Error::AlreadyExists`] if the destination exists and is a different path, or if
///   another indexed file already has the display name.
#[instrument(fields(path = %old_path.display()))]
pub async fn rename_item(old_path: &Path, new_name: &str) -> Result<Renamed> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(Error::InvalidArgument("New name must not be empty".to_string()));
    }

    let meta = fs::metadata(old_path).await.map_err(|e| {
        warn!("Rename source unavailable: {}", e);
        Error::from_io(old_path, e)
    })?;
    let parent = old_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| Error::InvalidPath(old_path.to_path_buf()))?;
    let parent_kind = parent
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(ItemKind::from_dir_name);

    if meta.is_file() && parent_kind.is_some_and(ItemKind::has_directory_index) {
        return rename_indexed_file(parent, old_path, new_name).await;
    }

    let class = parent_kind.map_or(NameClass::Extended, ItemKind::name_class);
    let segment = path_segment(new_name, class)?;
    let destination = if meta.is_dir() {
        parent.join(segment)
    } else {
        match old_path.extension() {
            Some(ext) => parent.join(format!("{}.{}", segment, ext.to_string_lossy())),
            None => parent.join(segment),
        }
    };

    if destination != old_path && fs::try_exists(&destination).await.map_err(Error::Io)? {
        warn!("Rename destination already exists: {}", destination.display());
        return Err(Error::AlreadyExists(destination));
    }

    if meta.is_dir() {
        if let Some(mut metadata) = read_metadata(old_path).await? {
            metadata.name = Some(new_name.to_string());
            metadata.last_modified = Some(now_timestamp());
            write_metadata(old_path, &metadata).await?;
            debug!("Item metadata renamed");
        }
    }
    if destination != old_path {
        fs::rename(old_path, &destination).await.map_err(|e| Error::from_io(old_path, e))?;
    }

    info!("Renamed to {}", destination.display());
    Ok(Renamed { path: destination, message: "Item renamed successfully".to_string() })
}

async fn rename_indexed_file(dir: &Path, file_path: &Path, new_name: &str) -> Result<Renamed> {
    let file_name = file_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::InvalidPath(file_path.to_path_buf()))?;

    let entry = index::rename_entry(dir, file_name, new_name).await?;
    info!("Display name of '{}' set to '{}'", entry.file_name, entry.display_name);
    Ok(Renamed { path: file_path.to_path_buf(), message: "Display name updated".to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{get_directory_metadata, Project, METADATA_FILE};
    use tempfile::tempdir;

    #[tokio::test]
    async fn renames_item_directory_and_metadata() {
        let dir = tempdir().unwrap();
        let project = Project::at(dir.path());
        let handle = project.create_item(ItemKind::Character, "Ana").await.unwrap();

        let renamed = rename_item(&handle.path, "Ana Vel").await.unwrap();
        assert_eq!(renamed.path, project.kind_dir(ItemKind::Character).join("Ana_Vel"));
        assert!(!handle.path.exists());

        let metadata = read_metadata(&renamed.path).await.unwrap().unwrap();
        assert_eq!(metadata.name.as_deref(), Some("Ana Vel"));
        let listed = project.list_items(ItemKind::Character).await.unwrap();
        assert_eq!(listed[0].name, "Ana Vel");
    }

    #[tokio::test]
    async fn lore_rename_uses_alphanumeric_class() {
        let dir = tempdir().unwrap();
        let project = Project::at(dir.path());
        let handle = project.create_item(ItemKind::Lore, "Map").await.unwrap();

        let renamed = rename_item(&handle.path, "Old-Map").await.unwrap();
        assert_eq!(renamed.path, project.kind_dir(ItemKind::Lore).join("Old_Map"));
    }

    #[tokio::test]
    async fn same_folder_name_only_updates_metadata() {
        let dir = tempdir().unwrap();
        let project = Project::at(dir.path());
        let handle = project.create_item(ItemKind::Chapter, "One Two").await.unwrap();

        // "One_Two" and "One Two" map to the same folder
        let renamed = rename_item(&handle.path, "One_Two").await.unwrap();
        assert_eq!(renamed.path, handle.path);
        let metadata = read_metadata(&handle.path).await.unwrap().unwrap();
        assert_eq!(metadata.name.as_deref(), Some("One_Two"));
    }

    #[tokio::test]
    async fn conflict_leaves_both_items_untouched() {
        let dir = tempdir().unwrap();
        let project = Project::at(dir.path());
        let first = project.create_item(ItemKind::Note, "First").await.unwrap();
        project.create_item(ItemKind::Note, "Second").await.unwrap();

        let result = rename_item(&first.path, "Second").await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        let metadata = read_metadata(&first.path).await.unwrap().unwrap();
        assert_eq!(metadata.name.as_deref(), Some("First"));
    }

    #[tokio::test]
    async fn flat_chapter_file_only_changes_index() {
        let dir = tempdir().unwrap();
        let chapters = dir.path().join("Book Chapters");
        fs::create_dir_all(&chapters).await.unwrap();
        let file = chapters.join("ch01.md");
        fs::write(&file, "text").await.unwrap();

        let renamed = rename_item(&file, "The Beginning").await.unwrap();
        assert_eq!(renamed.path, file);
        assert!(file.exists());

        let index = get_directory_metadata(&chapters).await.unwrap();
        assert_eq!(index.files.len(), 1);
        assert_eq!(index.files[0].display_name, "The Beginning");
        assert_eq!(index.files[0].file_name, "ch01.md");

        rename_item(&file, "The End").await.unwrap();
        let index = get_directory_metadata(&chapters).await.unwrap();
        assert_eq!(index.files.len(), 1);
        assert_eq!(index.files[0].display_name, "The End");
    }

    #[tokio::test]
    async fn other_files_keep_extension() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("draft notes.txt");
        fs::write(&file, "text").await.unwrap();

        let renamed = rename_item(&file, "final draft!").await.unwrap();
        assert_eq!(renamed.path, dir.path().join("final_draft_.txt"));
        assert_eq!(fs::read_to_string(&renamed.path).await.unwrap(), "text");
        assert!(!dir.path().join(METADATA_FILE).exists());
    }

    #[tokio::test]
    async fn rejects_blank_name_and_missing_source() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("Characters").join("Nobody");

        let blank = rename_item(&missing, "  ").await;
        assert!(matches!(blank, Err(Error::InvalidArgument(_))));

        let result = rename_item(&missing, "Somebody").await;
        assert!(matches!(result, Err(Error::NotFound(p)) if p == missing));
    }
}
