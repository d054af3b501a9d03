use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument, warn};

use crate::storage::file::{read_json, write_json};
use crate::storage::{now_timestamp, Error, Result, METADATA_FILE};

/// Directory-level `metadata.json` mapping flat files to display names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryIndex {
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub display_name: String,
    pub file_name: String,
    pub created: String,
    pub last_modified: String,
}

impl DirectoryIndex {
    fn position_by_display_name(&self, display_name: &str) -> Option<usize> {
        self.files.iter().position(|entry| entry.display_name == display_name)
    }

    fn position_by_file_name(&self, file_name: &str) -> Option<usize> {
        self.files.iter().position(|entry| entry.file_name == file_name)
    }
}

// Index mutations are read-modify-write of the whole file. One async mutex per index
// directory keeps writers in this process from overwriting each other.
static INDEX_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>> =
    LazyLock::new(Default::default);

/// Key under which the lock for `dir` is stored, so that different spellings of the same
/// directory share one lock. A directory that does not exist yet is keyed through its
/// canonical parent.
async fn index_lock_key(dir: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(dir).await {
        return canonical;
    }
    match (dir.parent(), dir.file_name()) {
        (Some(parent), Some(name)) => match fs::canonicalize(parent).await {
            Ok(parent) => parent.join(name),
            Err(_) => dir.to_path_buf(),
        },
        _ => dir.to_path_buf(),
    }
}

async fn lock_index(dir: &Path) -> OwnedMutexGuard<()> {
    let key = index_lock_key(dir).await;
    let lock = {
        let mut locks = INDEX_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
        // Entries only the map still references are idle.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key).or_default().clone()
    };
    lock.lock_owned().await
}

/// Reads the index, applies `change` and writes the result back if `change` reports a
/// modification. The whole sequence holds the directory's index lock.
async fn modify_index<T>(
    dir: &Path,
    change: impl FnOnce(&mut DirectoryIndex) -> Result<(T, bool)>,
) -> Result<T> {
    let _guard = lock_index(dir).await;
    let mut index = get_directory_metadata(dir).await?;
    let (value, modified) = change(&mut index)?;
    if modified {
        save_directory_metadata(dir, &index).await?;
    }
    Ok(value)
}

/// Reads the directory index of `dir`. A missing index file is an empty index.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the index file is not valid JSON.
#[instrument(fields(dir = %dir.display()))]
pub async fn get_directory_metadata(dir: &Path) -> Result<DirectoryIndex> {
    let index = read_json(&dir.join(METADATA_FILE)).await.inspect_err(|e| {
        warn!("Failed to read directory index: {}", e);
    })?;
    Ok(index.unwrap_or_default())
}

/// Overwrites the directory index of `dir`.
#[instrument(skip(index), fields(dir = %dir.display(), entries = index.files.len()))]
pub async fn save_directory_metadata(dir: &Path, index: &DirectoryIndex) -> Result<()> {
    write_json(&dir.join(METADATA_FILE), index).await.inspect_err(|e| {
        warn!("Failed to write directory index: {}", e);
    })
}

/// Appends an entry for `file_name` under `display_name`.
///
/// No uniqueness check is made; adding the same display name twice yields two entries.
#[instrument(fields(dir = %dir.display()))]
pub async fn add_file_to_metadata(dir: &Path, display_name: &str, file_name: &str) -> Result<FileEntry> {
    let now = now_timestamp();
    let entry = FileEntry {
        display_name: display_name.to_string(),
        file_name: file_name.to_string(),
        created: now.clone(),
        last_modified: now,
    };
    modify_index(dir, |index| {
        if index.position_by_display_name(display_name).is_some() {
            debug!("Display name '{}' is already indexed; adding another entry", display_name);
        }
        index.files.push(entry.clone());
        Ok((entry, true))
    })
    .await
}

/// Renames the first entry whose display name is `old_display_name`.
///
/// Returns the updated entry, or `None` (after logging) if no entry matches.
#[instrument(fields(dir = %dir.display()))]
pub async fn update_file_in_metadata(
    dir: &Path,
    old_display_name: &str,
    new_display_name: &str,
) -> Result<Option<FileEntry>> {
    modify_index(dir, |index| {
        let Some(pos) = index.position_by_display_name(old_display_name) else {
            warn!("No index entry named '{}'", old_display_name);
            return Ok((None, false));
        };
        let entry = &mut index.files[pos];
        entry.display_name = new_display_name.to_string();
        entry.last_modified = now_timestamp();
        Ok((Some(entry.clone()), true))
    })
    .await
}

/// Looks up the file name indexed under `display_name` (first match).
#[instrument(fields(dir = %dir.display()))]
pub async fn get_file_name_from_display_name(dir: &Path, display_name: &str) -> Result<Option<String>> {
    let index = get_directory_metadata(dir).await?;
    Ok(index
        .position_by_display_name(display_name)
        .map(|pos| index.files[pos].file_name.clone()))
}

/// Looks up the display name indexed for `file_name` (first match).
#[instrument(fields(dir = %dir.display()))]
pub async fn get_display_name_from_file_name(dir: &Path, file_name: &str) -> Result<Option<String>> {
    let index = get_directory_metadata(dir).await?;
    Ok(index
        .position_by_file_name(file_name)
        .map(|pos| index.files[pos].display_name.clone()))
}

/// Removes the first entry whose display name is `display_name`.
///
/// Returns `false` (after logging) if no entry matches.
#[instrument(fields(dir = %dir.display()))]
pub async fn remove_file_from_metadata(dir: &Path, display_name: &str) -> Result<bool> {
    modify_index(dir, |index| match index.position_by_display_name(display_name) {
        Some(pos) => {
            index.files.remove(pos);
            Ok((true, true))
        }
        None => {
            warn!("No index entry named '{}'", display_name);
            Ok((false, false))
        }
    })
    .await
}

/// Removes the entry for `file_name`, if there is one.
pub(crate) async fn remove_entry_by_file_name(dir: &Path, file_name: &str) -> Result<bool> {
    modify_index(dir, |index| match index.position_by_file_name(file_name) {
        Some(pos) => {
            index.files.remove(pos);
            Ok((true, true))
        }
        None => Ok((false, false)),
    })
    .await
}

/// Gives the flat file `file_name` the display name `new_display_name`, adding an entry if
/// the file is not indexed yet.
///
/// # Errors
///
/// Returns [`Error::AlreadyExists`] if another file is already indexed under the new name.
pub(crate) async fn rename_entry(dir: &Path, file_name: &str, new_display_name: &str) -> Result<FileEntry> {
    modify_index(dir, |index| {
        let taken = index
            .files
            .iter()
            .any(|entry| entry.display_name == new_display_name && entry.file_name != file_name);
        if taken {
            return Err(Error::AlreadyExists(dir.join(new_display_name)));
        }

        let now = now_timestamp();
        let entry = match index.position_by_file_name(file_name) {
            Some(pos) => {
                let entry = &mut index.files[pos];
                entry.display_name = new_display_name.to_string();
                entry.last_modified = now;
                entry.clone()
            }
            None => {
                debug!("File '{}' not indexed yet, adding entry", file_name);
                let entry = FileEntry {
                    display_name: new_display_name.to_string(),
                    file_name: file_name.to_string(),
                    created: now.clone(),
                    last_modified: now,
                };
                index.files.push(entry.clone());
                entry
            }
        };
        Ok((entry, true))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_index_is_empty() {
        let dir = tempdir().unwrap();
        let index = get_directory_metadata(dir.path()).await.unwrap();
        assert!(index.files.is_empty());
    }

    #[tokio::test]
    async fn malformed_index_is_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(METADATA_FILE), "[1, 2").await.unwrap();

        let result = get_directory_metadata(dir.path()).await;
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[tokio::test]
    async fn add_update_lookup_sequence() {
        let dir = tempdir().unwrap();
        add_file_to_metadata(dir.path(), "Draft", "draft-01.md").await.unwrap();

        let updated = update_file_in_metadata(dir.path(), "Draft", "Final").await.unwrap();
        assert_eq!(updated.unwrap().file_name, "draft-01.md");

        assert_eq!(
            get_file_name_from_display_name(dir.path(), "Final").await.unwrap().as_deref(),
            Some("draft-01.md")
        );
        assert_eq!(get_file_name_from_display_name(dir.path(), "Draft").await.unwrap(), None);
        assert_eq!(
            get_display_name_from_file_name(dir.path(), "draft-01.md").await.unwrap().as_deref(),
            Some("Final")
        );
    }

    #[tokio::test]
    async fn index_file_uses_camel_case_keys() {
        let dir = tempdir().unwrap();
        add_file_to_metadata(dir.path(), "Draft", "draft.md").await.unwrap();

        let text = fs::read_to_string(dir.path().join(METADATA_FILE)).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let entry = &value["files"][0];
        assert_eq!(entry["displayName"], "Draft");
        assert_eq!(entry["fileName"], "draft.md");
        assert!(entry["lastModified"].is_string());
    }

    #[tokio::test]
    async fn update_and_remove_of_unknown_name_change_nothing() {
        let dir = tempdir().unwrap();
        add_file_to_metadata(dir.path(), "Kept", "kept.md").await.unwrap();

        assert_eq!(update_file_in_metadata(dir.path(), "Nope", "New").await.unwrap(), None);
        assert!(!remove_file_from_metadata(dir.path(), "Nope").await.unwrap());

        let index = get_directory_metadata(dir.path()).await.unwrap();
        assert_eq!(index.files.len(), 1);
        assert_eq!(index.files[0].display_name, "Kept");
    }

    #[tokio::test]
    async fn duplicates_are_tolerated_and_first_match_wins() {
        let dir = tempdir().unwrap();
        add_file_to_metadata(dir.path(), "Same", "one.md").await.unwrap();
        add_file_to_metadata(dir.path(), "Same", "two.md").await.unwrap();

        assert_eq!(
            get_file_name_from_display_name(dir.path(), "Same").await.unwrap().as_deref(),
            Some("one.md")
        );
        assert!(remove_file_from_metadata(dir.path(), "Same").await.unwrap());
        assert_eq!(
            get_file_name_from_display_name(dir.path(), "Same").await.unwrap().as_deref(),
            Some("two.md")
        );
    }

    #[tokio::test]
    async fn rename_entry_adds_missing_and_rejects_taken_names() {
        let dir = tempdir().unwrap();
        add_file_to_metadata(dir.path(), "Taken", "a.md").await.unwrap();

        let entry = rename_entry(dir.path(), "b.md", "Fresh").await.unwrap();
        assert_eq!(entry.display_name, "Fresh");

        let conflict = rename_entry(dir.path(), "b.md", "Taken").await;
        assert!(matches!(conflict, Err(Error::AlreadyExists(_))));

        // Renaming a file to its own current name is fine
        rename_entry(dir.path(), "a.md", "Taken").await.unwrap();
        assert_eq!(get_directory_metadata(dir.path()).await.unwrap().files.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_are_not_lost() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let mut tasks = Vec::new();
        for i in 0..16 {
            let path = path.clone();
            tasks.push(tokio::spawn(async move {
                add_file_to_metadata(&path, &format!("Entry {}", i), &format!("{}.md", i)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let index = get_directory_metadata(&path).await.unwrap();
        assert_eq!(index.files.len(), 16);
    }

    #[tokio::test]
    async fn lock_key_is_shared_by_equivalent_paths() {
        let dir = tempdir().unwrap();
        let notes = dir.path().join("Notes");
        fs::create_dir(&notes).await.unwrap();

        let key = index_lock_key(&notes).await;
        assert_eq!(index_lock_key(&notes.join("..").join("Notes")).await, key);
        assert_eq!(index_lock_key(&notes.join(".")).await, key);

        let missing = dir.path().join("Later");
        let expected = fs::canonicalize(dir.path()).await.unwrap().join("Later");
        assert_eq!(index_lock_key(&missing).await, expected);
    }

    #[tokio::test]
    async fn concurrent_adds_through_different_spellings_are_not_lost() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("Chapters");
        fs::create_dir(&plain).await.unwrap();
        let dotted = plain.join("..").join("Chapters");

        let mut tasks = Vec::new();
        for i in 0..16 {
            let path = if i % 2 == 0 { plain.clone() } else { dotted.clone() };
            tasks.push(tokio::spawn(async move {
                add_file_to_metadata(&path, &format!("Entry {}", i), &format!("{}.md", i)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let index = get_directory_metadata(&plain).await.unwrap();
        assert_eq!(index.files.len(), 16);
    }

    #[tokio::test]
    async fn idle_locks_are_pruned() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        add_file_to_metadata(first.path(), "One", "1.md").await.unwrap();
        add_file_to_metadata(second.path(), "Two", "2.md").await.unwrap();

        let key = index_lock_key(first.path()).await;
        let locks = INDEX_LOCKS.lock().unwrap();
        assert!(!locks.contains_key(&key));
    }
}
