use std::path::{Path, PathBuf};

use anyhow::Context;
use folio_core::storage::{ItemKind, Project};
use tracing::debug;

pub mod cli;
pub mod commands;
pub mod output;

use cli::{Cli, Commands};
use output::Output;

/// What the user is working on: the open project, the selected section and item, and
/// whether the item has unsaved changes.
///
/// The store itself is stateless; this is the only place state lives between the steps of
/// one invocation.
#[derive(Debug, Default)]
pub struct Session {
    project: Option<Project>,
    section: Option<ItemKind>,
    current_item: Option<PathBuf>,
    dirty: bool,
}

impl Session {
    pub fn new(project: Option<Project>) -> Self {
        Session { project, ..Default::default() }
    }

    pub fn project(&self) -> anyhow::Result<&Project> {
        self.project
            .as_ref()
            .context("No project is open (use --project or FOLIO_PROJECT, or run inside a project)")
    }

    pub fn section(&self) -> Option<ItemKind> {
        self.section
    }

    pub fn current_item(&self) -> Option<&Path> {
        self.current_item.as_deref()
    }

    /// Makes `item` of `kind` the current item. Any unsaved state belongs to the previous
    /// item and is dropped.
    pub fn select_item(&mut self, kind: ItemKind, item: PathBuf) {
        self.section = Some(kind);
        self.current_item = Some(item);
        self.dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

pub struct AppContext {
    pub session: Session,
    pub output: Output,
}

/// Opens the project given with `--project`, or searches the current directory and its
/// parents for one.
pub async fn find_project(project_flag: Option<PathBuf>) -> anyhow::Result<Project> {
    if let Some(path) = project_flag {
        return Project::open(&path)
            .await
            .with_context(|| format!("Failed to open project at {}", path.display()));
    }

    let mut dir = std::env::current_dir()?;
    loop {
        if Project::validate(&dir).await {
            return Ok(Project::open(&dir).await?);
        }
        debug!("No project found at {}", dir.display());
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => break,
        }
    }
    anyhow::bail!("No project found in current directory or its parents")
}

/// Runs one parsed command line.
///
/// A command that fails after marking the session dirty still gets the unsaved-changes
/// warning before its error is returned.
pub async fn run(cli: Cli, output: Output) -> anyhow::Result<()> {
    let project = if cli.command.needs_project() {
        Some(find_project(cli.project.clone()).await?)
    } else {
        None
    };
    let mut cx = AppContext { session: Session::new(project), output };

    let result = dispatch(cli.command, &mut cx).await;
    if cx.session.is_dirty() {
        tracing::warn!("Unsaved changes left in {:?}", cx.session.current_item());
    }
    result
}

/// Runs `command` against an already prepared context.
pub async fn dispatch(command: Commands, cx: &mut AppContext) -> anyhow::Result<()> {
    match command {
        Commands::Project(args) => commands::handle_project(args, cx).await,
        Commands::List(args) => commands::handle_list(args, cx).await,
        Commands::Create(args) => commands::handle_create(args, cx).await,
        Commands::Show(args) => commands::handle_show(args, cx).await,
        Commands::Save(args) => commands::handle_save(args, cx).await,
        Commands::Rename(args) => commands::handle_rename(args, cx).await,
        Commands::Delete(args) => commands::handle_delete(args, cx).await,
        Commands::Read(args) => commands::handle_read(args, cx).await,
        Commands::Write(args) => commands::handle_write(args, cx).await,
        Commands::Name(args) => commands::handle_name(args, cx).await,
        Commands::Index(args) => commands::index::handle_index(args, cx).await,
    }
}
