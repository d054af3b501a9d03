use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::storage::index;
use crate::storage::item::read_metadata;
use crate::storage::{Error, ItemKind, NameClass, Result};

static EXTENDED_UNSAFE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("static pattern is valid"));
static ALPHANUMERIC_UNSAFE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").expect("static pattern is valid"));

/// Derives the on-disk folder name for a display name by replacing every character outside
/// the kind's [`NameClass`] with `_`.
///
/// ```
/// use folio_core::storage::{folder_name, ItemKind};
///
/// assert_eq!(folder_name(ItemKind::Lore, "Dragon's Lair!!"), "Dragon_s_Lair__");
/// assert_eq!(folder_name(ItemKind::Chapter, "Part-1 my_draft"), "Part-1_my_draft");
/// assert_eq!(folder_name(ItemKind::Note, "Part-1 my_draft"), "Part_1_my_draft");
/// ```
pub fn folder_name(kind: ItemKind, display_name: &str) -> String {
    sanitize(display_name, kind.name_class())
}

pub(crate) fn sanitize(name: &str, class: NameClass) -> String {
    let unsafe_chars = match class {
        NameClass::Extended => &*EXTENDED_UNSAFE,
        NameClass::Alphanumeric => &*ALPHANUMERIC_UNSAFE,
    };
    unsafe_chars.replace_all(name, "_").into_owned()
}

/// Strips leading `../`, `./` and separator sequences from a path segment.
pub fn strip_traversal(segment: &str) -> &str {
    fn after_dots<'a>(s: &'a str, dots: &str) -> Option<&'a str> {
        s.strip_prefix(dots)
            .filter(|rest| rest.is_empty() || rest.starts_with(['/', '\\']))
    }

    let mut rest = segment;
    loop {
        let trimmed = rest.trim_start_matches(['/', '\\']);
        let trimmed = after_dots(trimmed, "..")
            .or_else(|| after_dots(trimmed, "."))
            .unwrap_or(trimmed);
        if trimmed.len() == rest.len() {
            return trimmed;
        }
        rest = trimmed;
    }
}

/// Resolves the directory of the item called `name` (display name or folder name).
///
/// The returned path is always `project_root / kind directory / folder name` with a
/// folder name that is a single normal path component.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] if the name yields no usable folder name.
pub fn resolve_item_path(project_root: &Path, kind: ItemKind, name: &str) -> Result<PathBuf> {
    let kind_dir = strip_traversal(kind.dir_name());
    if kind_dir.is_empty() {
        return Err(Error::InvalidName(name.to_string()));
    }
    let folder = path_segment(name, kind.name_class())?;
    Ok(project_root.join(kind_dir).join(folder))
}

/// Sanitizes `name` into a single normal path component.
pub(crate) fn path_segment(name: &str, class: NameClass) -> Result<String> {
    let sanitized = sanitize(name, class);
    let segment = strip_traversal(&sanitized);
    if segment.is_empty() || !is_single_component(segment) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(segment.to_string())
}

fn is_single_component(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

/// Checks whether `name` is taken in `dir` for an item of the given kind.
///
/// A name is taken if its folder name already exists in `dir`, if an item in `dir` carries
/// it as display name, or if the directory index of `dir` maps it to a file.
#[instrument(fields(dir = %dir.display()))]
pub async fn check_name_exists(dir: &Path, name: &str, kind: ItemKind) -> Result<bool> {
    let folder = folder_name(kind, name);
    if !folder.is_empty() && fs::try_exists(dir.join(&folder)).await.map_err(Error::Io)? {
        debug!("Folder name '{}' already exists", folder);
        return Ok(true);
    }

    let mut read_dir = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::Io(e)),
    };
    while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
        if !entry.file_type().await.map_err(Error::Io)?.is_dir() {
            continue;
        }
        match read_metadata(&entry.path()).await {
            Ok(Some(metadata)) if metadata.name.as_deref() == Some(name) => {
                debug!("Display name used by {}", entry.path().display());
                return Ok(true);
            }
            Ok(_) => {}
            Err(e) => warn!("Ignoring unreadable metadata in '{}': {}", entry.path().display(), e),
        }
    }

    match index::get_file_name_from_display_name(dir, name).await {
        Ok(found) => Ok(found.is_some()),
        Err(e) => {
            warn!("Ignoring unreadable directory index: {}", e);
            Ok(false)
        }
    }
}

/// Returns the first of `"{prefix} 1"`, `"{prefix} 2"`, ... that is not taken in `dir`.
#[instrument(fields(dir = %dir.display()))]
pub async fn next_available_name(dir: &Path, prefix: &str, kind: ItemKind) -> Result<String> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(Error::InvalidArgument("Name prefix must not be empty".to_string()));
    }

    let mut n: u64 = 1;
    loop {
        let candidate = format!("{} {}", prefix, n);
        if !check_name_exists(dir, &candidate, kind).await? {
            debug!("Next available name: {}", candidate);
            return Ok(candidate);
        }
        n += 1;
    }
}
