use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::storage::Error;

/// The four kinds of items a project holds. The kind decides the directory an item lives
/// in and which sidecar files it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    #[serde(rename = "chapters")]
    Chapter,
    #[serde(rename = "characters")]
    Character,
    #[serde(rename = "lore")]
    Lore,
    #[serde(rename = "notes")]
    Note,
}

/// Characters kept verbatim when a display name is turned into a folder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameClass {
    /// `[A-Za-z0-9_-]`
    Extended,
    /// `[A-Za-z0-9]`
    Alphanumeric,
}

/// How a listing picks the summary description of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DescriptionSource {
    /// `description.txt`, then `metadata.description`.
    DescriptionFile,
    /// A 200-character excerpt of the content file, then `metadata.description`.
    ContentExcerpt,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [ItemKind::Chapter, ItemKind::Character, ItemKind::Lore, ItemKind::Note];

    /// Name of the kind directory directly under the project root.
    pub fn dir_name(self) -> &'static str {
        match self {
            ItemKind::Chapter => "Book Chapters",
            ItemKind::Character => "Characters",
            ItemKind::Lore => "World Lore",
            ItemKind::Note => "Notes",
        }
    }

    /// Short identifier used by callers (`chapters`, `characters`, `lore`, `notes`).
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Chapter => "chapters",
            ItemKind::Character => "characters",
            ItemKind::Lore => "lore",
            ItemKind::Note => "notes",
        }
    }

    /// Human label used in messages.
    pub fn label(self) -> &'static str {
        match self {
            ItemKind::Chapter => "Chapter",
            ItemKind::Character => "Character",
            ItemKind::Lore => "Lore item",
            ItemKind::Note => "Note",
        }
    }

    /// Looks a kind up by its directory name.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.dir_name() == name)
    }

    pub fn name_class(self) -> NameClass {
        match self {
            ItemKind::Chapter | ItemKind::Character => NameClass::Extended,
            ItemKind::Lore | ItemKind::Note => NameClass::Alphanumeric,
        }
    }

    /// Primary content file of an item of this kind.
    pub fn content_file(self) -> &'static str {
        match self {
            ItemKind::Chapter | ItemKind::Character => "content.md",
            ItemKind::Lore | ItemKind::Note => "content.txt",
        }
    }

    /// Content file read when the primary one is absent (items written by older versions).
    pub(crate) fn fallback_content_file(self) -> &'static str {
        match self {
            ItemKind::Chapter | ItemKind::Character => "content.txt",
            ItemKind::Lore | ItemKind::Note => "content.md",
        }
    }

    /// Whether a new item gets `description.txt` and `attributes.json` next to its content.
    pub(crate) fn seeds_details_files(self) -> bool {
        matches!(self, ItemKind::Chapter | ItemKind::Character)
    }

    /// Whether new metadata carries empty `description` and `category` fields.
    pub(crate) fn seeds_lore_fields(self) -> bool {
        self == ItemKind::Lore
    }

    pub(crate) fn description_source(self) -> DescriptionSource {
        match self {
            ItemKind::Chapter => DescriptionSource::DescriptionFile,
            _ => DescriptionSource::ContentExcerpt,
        }
    }

    /// Chapters and notes are listed sorted by display name, characters and lore in
    /// directory enumeration order.
    pub(crate) fn sorted_listing(self) -> bool {
        matches!(self, ItemKind::Chapter | ItemKind::Note)
    }

    pub(crate) fn counts_words(self) -> bool {
        self == ItemKind::Chapter
    }

    /// Whether deleting an absent item is reported as a soft failure instead of an error.
    pub(crate) fn tolerates_missing_on_delete(self) -> bool {
        self == ItemKind::Note
    }

    /// Whether flat files in the kind directory are tracked by a directory index.
    pub(crate) fn has_directory_index(self) -> bool {
        matches!(self, ItemKind::Chapter | ItemKind::Note)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = Error;

    /// Accepts the plural identifier, its singular form, or the literal directory name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "chapters" | "chapter" => Ok(ItemKind::Chapter),
            "characters" | "character" => Ok(ItemKind::Character),
            "lore" | "lore-item" | "lore-items" => Ok(ItemKind::Lore),
            "notes" | "note" => Ok(ItemKind::Note),
            other => Self::from_dir_name(other).ok_or_else(|| Error::InvalidKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identifiers_and_directory_names() {
        assert_eq!("chapters".parse::<ItemKind>().unwrap(), ItemKind::Chapter);
        assert_eq!("character".parse::<ItemKind>().unwrap(), ItemKind::Character);
        assert_eq!("World Lore".parse::<ItemKind>().unwrap(), ItemKind::Lore);
        assert_eq!(" notes ".parse::<ItemKind>().unwrap(), ItemKind::Note);
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = "timeline".parse::<ItemKind>().unwrap_err();
        assert!(matches!(err, Error::InvalidKind(ref k) if k == "timeline"));
        // Directory names are matched exactly
        assert!("book chapters".parse::<ItemKind>().is_err());
    }

    #[test]
    fn directory_names_round_trip() {
        for kind in ItemKind::ALL {
            assert_eq!(ItemKind::from_dir_name(kind.dir_name()), Some(kind));
        }
        assert_eq!(ItemKind::from_dir_name("Drafts"), None);
    }

    #[test]
    fn serializes_as_plural_identifier() {
        assert_eq!(serde_json::to_string(&ItemKind::Lore).unwrap(), "\"lore\"");
        let kind: ItemKind = serde_json::from_str("\"chapters\"").unwrap();
        assert_eq!(kind, ItemKind::Chapter);
    }
}
