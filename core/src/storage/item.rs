use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::storage::file::{read_json, read_optional_text, write_json};
use crate::storage::index;
use crate::storage::kind::DescriptionSource;
use crate::storage::{now_timestamp, Error, ItemKind, Result, ATTRIBUTES_FILE, DESCRIPTION_FILE, METADATA_FILE};

/// Number of characters of content shown as a summary description.
const EXCERPT_CHARS: usize = 200;

/// Contents of an item's `metadata.json`.
///
/// Fields the store does not know about are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemMetadata {
    /// Metadata for a freshly created item of the given kind.
    pub(crate) fn new(kind: ItemKind, name: &str, now: &str) -> Self {
        let lore_field = || kind.seeds_lore_fields().then(String::new);
        ItemMetadata {
            name: Some(name.to_string()),
            created: Some(now.to_string()),
            last_modified: Some(now.to_string()),
            description: lore_field(),
            category: lore_field(),
            extra: Map::new(),
        }
    }
}

/// One entry of an item listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub name: String,
    pub description: String,
    pub last_modified: Option<String>,
    pub created: Option<String>,
    pub path: PathBuf,
    pub kind: ItemKind,
    /// Whitespace-separated token count of the content; chapters only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
}

/// Returned by a successful create.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemHandle {
    pub path: PathBuf,
    pub name: String,
    pub kind: ItemKind,
}

/// A single attribute value: free text, or the selected entries of a templated choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Choices(Vec<String>),
    /// Any other JSON value found in the file, kept as-is.
    Other(Value),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// The editable body of an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub content: String,
    pub description: String,
    pub attributes: Attributes,
}

/// Partial update of [`ItemDetails`]; `None` fields leave their file untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetailsUpdate {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

/// Outcome of [`delete_item`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deleted {
    pub path: PathBuf,
    /// `false` when the target was already absent (notes only).
    pub removed: bool,
    pub message: String,
}

/// Reads an item's `metadata.json`; `None` if the directory has none.
pub(crate) async fn read_metadata(item_dir: &Path) -> Result<Option<ItemMetadata>> {
    read_json(&item_dir.join(METADATA_FILE)).await
}

pub(crate) async fn write_metadata(item_dir: &Path, metadata: &ItemMetadata) -> Result<()> {
    write_json(&item_dir.join(METADATA_FILE), metadata).await
}

/// Reads the content of an item, preferring the kind's primary content file.
pub(crate) async fn read_content(item_dir: &Path, kind: ItemKind) -> Result<Option<String>> {
    match read_optional_text(&item_dir.join(kind.content_file())).await? {
        Some(content) => Ok(Some(content)),
        None => read_optional_text(&item_dir.join(kind.fallback_content_file())).await,
    }
}

/// Reads content, description and attributes of the item in `item_dir`.
///
/// Missing files yield empty values; a malformed `attributes.json` is an error.
pub(crate) async fn read_details(item_dir: &Path, kind: ItemKind) -> Result<ItemDetails> {
    let content = read_content(item_dir, kind).await?.unwrap_or_default();
    let description = read_optional_text(&item_dir.join(DESCRIPTION_FILE)).await?.unwrap_or_default();
    let attributes = read_json(&item_dir.join(ATTRIBUTES_FILE)).await?.unwrap_or_default();
    Ok(ItemDetails { content, description, attributes })
}

/// Writes the supplied fields of `update` into `item_dir`, creating the directory if needed.
pub(crate) async fn write_details(item_dir: &Path, kind: ItemKind, update: ItemDetailsUpdate) -> Result<()> {
    fs::create_dir_all(item_dir).await.map_err(Error::Io)?;

    if let Some(content) = &update.content {
        fs::write(item_dir.join(kind.content_file()), content).await.map_err(Error::Io)?;
    }
    if let Some(description) = &update.description {
        fs::write(item_dir.join(DESCRIPTION_FILE), description).await.map_err(Error::Io)?;
    }
    if let Some(attributes) = &update.attributes {
        write_json(&item_dir.join(ATTRIBUTES_FILE), attributes).await?;
    }

    if let Some(mut metadata) = read_metadata(item_dir).await? {
        metadata.last_modified = Some(now_timestamp());
        write_metadata(item_dir, &metadata).await?;
    }
    Ok(())
}

/// Builds the listing entry for the item in `item_dir`.
pub(crate) async fn summarize(item_dir: PathBuf, kind: ItemKind, metadata: ItemMetadata) -> Result<ItemSummary> {
    let folder = item_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = metadata.name.filter(|name| !name.is_empty()).unwrap_or(folder);

    let content = if kind.counts_words() || kind.description_source() == DescriptionSource::ContentExcerpt {
        read_content(&item_dir, kind).await?
    } else {
        None
    };

    let preferred = match kind.description_source() {
        DescriptionSource::DescriptionFile => read_optional_text(&item_dir.join(DESCRIPTION_FILE)).await?,
        DescriptionSource::ContentExcerpt => content.as_deref().map(excerpt),
    };
    let description = preferred
        .filter(|text| !text.trim().is_empty())
        .or(metadata.description)
        .unwrap_or_default();

    let word_count = kind
        .counts_words()
        .then(|| content.as_deref().map_or(0, |text| text.split_whitespace().count()));

    Ok(ItemSummary {
        name,
        description,
        last_modified: metadata.last_modified.or_else(|| metadata.created.clone()),
        created: metadata.created,
        path: item_dir,
        kind,
        word_count,
    })
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

/// Whether `path` names an entry below a `kind` directory: a component equal to the kind's
/// directory name followed only by normal components, at least one of them.
fn is_inside_kind_dir(path: &Path, kind: ItemKind) -> bool {
    let kind_dir = Component::Normal(OsStr::new(kind.dir_name()));
    let mut components = path.components();
    if !components.by_ref().any(|component| component == kind_dir) {
        return false;
    }
    let mut below = components.peekable();
    below.peek().is_some() && below.all(|component| matches!(component, Component::Normal(_)))
}

/// Deletes the item at `item_path` after checking that the path lies inside the kind's
/// directory.
///
/// Directories are removed recursively. When a flat file inside `Book Chapters` or `Notes`
/// is removed, its directory index entry is dropped as well.
///
/// # Errors
///
/// - [`Error::InvalidPath`] if the path does not point below the kind directory (including
///   the kind directory itself and paths that climb out with `..`); nothing is touched in
///   that case.
/// - [`Error::NotFound`] if the target is absent, except for notes, which report
///   `Ok(Deleted { removed: false, .. })` instead.
#[instrument(fields(path = %item_path.display()))]
pub async fn delete_item(kind: ItemKind, item_path: &Path) -> Result<Deleted> {
    if !is_inside_kind_dir(item_path, kind) {
        warn!("Refusing to delete path outside '{}'", kind.dir_name());
        return Err(Error::InvalidPath(item_path.to_path_buf()));
    }

    let meta = match fs::symlink_metadata(item_path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && kind.tolerates_missing_on_delete() => {
            debug!("{} already absent", kind.label());
            return Ok(Deleted {
                path: item_path.to_path_buf(),
                removed: false,
                message: format!("{} not found", kind.label()),
            });
        }
        Err(e) => return Err(Error::from_io(item_path, e)),
    };

    if meta.is_dir() {
        fs::remove_dir_all(item_path).await.map_err(|e| Error::from_io(item_path, e))?;
    } else {
        fs::remove_file(item_path).await.map_err(|e| Error::from_io(item_path, e))?;
        if kind.has_directory_index() {
            forget_indexed_file(item_path).await;
        }
    }

    info!("{} deleted", kind.label());
    Ok(Deleted {
        path: item_path.to_path_buf(),
        removed: true,
        message: format!("{} deleted successfully", kind.label()),
    })
}

/// Drops the directory index entry of a deleted flat file. Failures are only logged since
/// the file itself is already gone.
async fn forget_indexed_file(file_path: &Path) {
    let (Some(dir), Some(file_name)) = (file_path.parent(), file_path.file_name().and_then(|n| n.to_str())) else {
        return;
    };
    match index::remove_entry_by_file_name(dir, file_name).await {
        Ok(true) => debug!("Removed directory index entry for '{}'", file_name),
        Ok(false) => {}
        Err(e) => warn!("Failed to update directory index after delete: {}", e),
    }
}
