use clap::{Args, Parser, Subcommand};
use folio_core::storage::{AttributeValue, ItemKind};
use std::path::PathBuf;

/// Folio: Manage the chapters, characters, lore and notes of a writing project.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the default project detection (nearest enclosing project).
    #[arg(long, global = true, env = "FOLIO_PROJECT")]
    pub project: Option<PathBuf>,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors and requested data.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print every result as a JSON envelope on stdout.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, open and locate projects.
    Project(ProjectArgs),
    /// List the items of one kind.
    List(ListArgs),
    /// Create a new item.
    Create(CreateArgs),
    /// Show content, description and attributes of an item.
    Show(ShowArgs),
    /// Save content, description or attributes of an item.
    Save(SaveArgs),
    /// Rename an item (or a legacy flat file) by path.
    Rename(RenameArgs),
    /// Delete an item by path.
    Delete(DeleteArgs),
    /// Print a file.
    Read(ReadArgs),
    /// Overwrite a file.
    Write(WriteArgs),
    /// Check and suggest item names.
    Name(NameArgs),
    /// Inspect and edit the directory index of legacy flat files.
    Index(IndexArgs),
}

impl Commands {
    /// Whether the command operates on the current project.
    pub fn needs_project(&self) -> bool {
        matches!(
            self,
            Commands::List(_) | Commands::Create(_) | Commands::Show(_) | Commands::Save(_)
        )
    }
}

// --- Argument Structs for each Subcommand ---

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommands,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a new project directory with its item directories.
    Create {
        /// Name of the project; also used as directory name.
        name: String,
        /// Directory to create the project in. Defaults to the default projects path.
        #[arg(long, short)]
        location: Option<PathBuf>,
    },
    /// Open a project and print its manifest.
    Open {
        path: PathBuf,
    },
    /// Check whether a directory is a project.
    Validate {
        path: PathBuf,
    },
    /// Print the default location for new projects.
    DefaultPath {},
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Item kind: chapters, characters, lore or notes.
    #[arg(value_parser = parse_kind)]
    pub kind: ItemKind,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(value_parser = parse_kind)]
    pub kind: ItemKind,
    /// Display name of the new item.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(value_parser = parse_kind)]
    pub kind: ItemKind,
    /// Display name of the item.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct SaveArgs {
    #[arg(value_parser = parse_kind)]
    pub kind: ItemKind,
    /// Display name of the item.
    pub name: String,

    /// New content.
    #[arg(long, conflicts_with = "content_file")]
    pub content: Option<String>,

    /// Read the new content from a file.
    #[arg(long)]
    pub content_file: Option<PathBuf>,

    /// New description.
    #[arg(long)]
    pub description: Option<String>,

    /// Set an attribute (e.g., --attr mood=tense --attr traits=loyal|vain). Merged into the
    /// existing attributes; `|` separates the entries of a choice.
    #[arg(long = "attr", value_parser = parse_attribute)]
    pub attributes: Vec<(String, AttributeValue)>,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Current path of the item.
    pub path: PathBuf,
    /// New display name.
    pub new_name: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[arg(value_parser = parse_kind)]
    pub kind: ItemKind,
    /// Path of the item to delete.
    pub path: PathBuf,
    /// Skip confirmation.
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    pub path: PathBuf,

    /// Content to write. If neither --content nor --from is given, stdin is read.
    #[arg(long, conflicts_with = "from")]
    pub content: Option<String>,

    /// Copy the content from another file.
    #[arg(long)]
    pub from: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct NameArgs {
    #[command(subcommand)]
    pub command: NameCommands,
}

#[derive(Subcommand, Debug)]
pub enum NameCommands {
    /// Check whether a name is taken in a directory.
    Exists {
        dir: PathBuf,
        name: String,
        #[arg(value_parser = parse_kind)]
        kind: ItemKind,
    },
    /// Suggest the first free "<prefix> N" name in a directory.
    Next {
        dir: PathBuf,
        prefix: String,
        #[arg(value_parser = parse_kind)]
        kind: ItemKind,
    },
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    #[command(subcommand)]
    pub command: IndexCommands,
}

#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Print all entries of a directory index.
    Show {
        dir: PathBuf,
    },
    /// Add an entry.
    Add {
        dir: PathBuf,
        display_name: String,
        file_name: String,
    },
    /// Change the display name of an entry.
    Update {
        dir: PathBuf,
        old_display_name: String,
        new_display_name: String,
    },
    /// Remove an entry by display name.
    Remove {
        dir: PathBuf,
        display_name: String,
    },
    /// Look up the file name for a display name.
    FileName {
        dir: PathBuf,
        display_name: String,
    },
    /// Look up the display name for a file name.
    DisplayName {
        dir: PathBuf,
        file_name: String,
    },
}

fn parse_kind(s: &str) -> Result<ItemKind, String> {
    s.parse::<ItemKind>().map_err(|e| e.to_string())
}

/// Parses `key=value`; a value containing `|` becomes a list of choices.
fn parse_attribute(s: &str) -> Result<(String, AttributeValue), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("attribute key must not be empty in '{}'", s));
    }
    let value = if value.contains('|') {
        AttributeValue::Choices(
            value
                .split('|')
                .map(str::trim)
                .filter(|choice| !choice.is_empty())
                .map(String::from)
                .collect(),
        )
    } else {
        AttributeValue::from(value)
    };
    Ok((key.to_string(), value))
}
