use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use folio_core::storage::{
    self, AttributeValue, Attributes, ItemDetailsUpdate, ItemSummary, Project,
};
use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

// Import argument structs from the cli module
use crate::cli::{
    CreateArgs, DeleteArgs, ListArgs, NameArgs, NameCommands, ProjectArgs, ProjectCommands, ReadArgs,
    RenameArgs, SaveArgs, ShowArgs, WriteArgs,
};
use crate::output::wrap_indented;
use crate::AppContext;

pub mod index;

// --- Handler Functions ---

pub async fn handle_project(args: ProjectArgs, cx: &mut AppContext) -> Result<()> {
    match args.command {
        ProjectCommands::Create { name, location } => {
            let location = location.unwrap_or_else(storage::default_projects_path);
            info!("Creating project '{}' in {}", name, location.display());
            let project = Project::create(&name, &location).await?;
            let data = json!({ "path": project.root() });
            cx.output.emit(&data, Some("Project created"), |_| {
                format!("  Path: {}", project.root().display())
            })
        }
        ProjectCommands::Open { path } => {
            let project = Project::open(&path).await?;
            let manifest = project.manifest().await?;
            let data = json!({ "path": project.root(), "manifest": manifest });
            cx.output.emit(&data, None, |_| {
                format!(
                    "{}\n  Path: {}\n  Created: {}\n  Version: {}",
                    style(&manifest.name).bold(),
                    project.root().display(),
                    manifest.created,
                    manifest.version
                )
            })
        }
        ProjectCommands::Validate { path } => {
            let valid = Project::validate(&path).await;
            cx.output.emit(&json!({ "valid": valid }), None, |_| {
                if valid {
                    format!("{} is a project", path.display())
                } else {
                    format!("{} is not a project", path.display())
                }
            })
        }
        ProjectCommands::DefaultPath {} => {
            let path = storage::default_projects_path();
            cx.output.emit(&json!({ "path": path }), None, |_| path.display().to_string())
        }
    }
}

pub async fn handle_list(args: ListArgs, cx: &mut AppContext) -> Result<()> {
    let project = cx.session.project()?;
    let items = project.list_items(args.kind).await?;
    let dir = project.kind_dir(args.kind);
    cx.session.select_item(args.kind, dir);

    cx.output.emit(&items, None, |items| {
        if items.is_empty() {
            return format!("No {} yet.", args.kind);
        }
        items.iter().map(render_summary).collect::<Vec<_>>().join("\n")
    })
}

fn render_summary(item: &ItemSummary) -> String {
    let mut line = style(&item.name).bold().to_string();
    if let Some(words) = item.word_count {
        line.push_str(&format!(" {}", style(format!("({} words)", words)).dim()));
    }
    if let Some(modified) = &item.last_modified {
        line.push_str(&format!(" {}", style(format!("modified {}", modified)).dim()));
    }
    if !item.description.trim().is_empty() {
        line.push('\n');
        line.push_str(&wrap_indented(item.description.trim(), "    "));
    }
    line
}

pub async fn handle_create(args: CreateArgs, cx: &mut AppContext) -> Result<()> {
    let project = cx.session.project()?;
    let handle = project.create_item(args.kind, &args.name).await?;
    cx.session.select_item(args.kind, handle.path.clone());

    let message = format!("{} created", args.kind.label());
    cx.output.emit(&handle, Some(&message), |handle| {
        format!("  Path: {}", handle.path.display())
    })
}

pub async fn handle_show(args: ShowArgs, cx: &mut AppContext) -> Result<()> {
    let project = cx.session.project()?;
    let path = project.item_path(args.kind, &args.name)?;
    let details = project.item_details(args.kind, &args.name).await?;
    cx.session.select_item(args.kind, path);

    cx.output.emit(&details, None, |details| {
        let mut out = style(&args.name).bold().to_string();
        if !details.description.is_empty() {
            out.push('\n');
            out.push_str(&wrap_indented(&details.description, "  "));
        }
        for (key, value) in &details.attributes {
            out.push_str(&format!("\n  {}: {}", style(key).cyan(), render_attribute(value)));
        }
        if !details.content.is_empty() {
            out.push_str("\n\n");
            out.push_str(&details.content);
        }
        out
    })
}

fn render_attribute(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Text(text) => text.clone(),
        AttributeValue::Choices(choices) => choices.join(", "),
        AttributeValue::Other(other) => other.to_string(),
    }
}

pub async fn handle_save(args: SaveArgs, cx: &mut AppContext) -> Result<()> {
    let project = cx.session.project()?.clone();
    let path = project.item_path(args.kind, &args.name)?;
    cx.session.select_item(args.kind, path);

    let content = match (args.content, args.content_file) {
        (Some(content), _) => Some(content),
        (None, Some(file)) => Some(
            storage::read_file(&file)
                .await
                .with_context(|| format!("Failed to read content from {}", file.display()))?,
        ),
        (None, None) => None,
    };

    let attributes = if args.attributes.is_empty() {
        None
    } else {
        let mut attributes: Attributes = project.item_details(args.kind, &args.name).await?.attributes;
        attributes.extend(args.attributes);
        Some(attributes)
    };

    let update = ItemDetailsUpdate { content, description: args.description, attributes };
    if update == ItemDetailsUpdate::default() {
        anyhow::bail!("Nothing to save (use --content, --content-file, --description or --attr)");
    }

    cx.session.mark_dirty();
    project.save_item_details(args.kind, &args.name, update).await?;
    cx.session.mark_saved();

    let message = format!("{} saved", args.kind.label());
    cx.output.emit(&json!({ "name": args.name }), Some(&message), |_| String::new())
}

pub async fn handle_rename(args: RenameArgs, cx: &mut AppContext) -> Result<()> {
    let renamed = storage::rename_item(&args.path, &args.new_name).await?;
    cx.output.emit(&renamed, Some(&renamed.message), |renamed| {
        format!("  Path: {}", renamed.path.display())
    })
}

pub async fn handle_delete(args: DeleteArgs, cx: &mut AppContext) -> Result<()> {
    if !args.force && !cx.output.json {
        let prompt = format!("Delete {} '{}'?", args.kind.label().to_lowercase(), args.path.display());
        if !confirm(prompt).await? {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    let deleted = storage::delete_item(args.kind, &args.path).await?;
    debug!("Delete finished: removed = {}", deleted.removed);
    if deleted.removed {
        cx.output.emit(&deleted, Some(&deleted.message), |_| String::new())
    } else {
        cx.output.emit(&deleted, None, |deleted| style(&deleted.message).yellow().to_string())
    }
}

async fn confirm(prompt: String) -> Result<bool> {
    let result = tokio::task::spawn_blocking(move || {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation")
    })
    .await;

    result.context("Blocking task failed (panic)")?
}

#[derive(Serialize)]
struct FileContent<'a> {
    path: &'a Path,
    content: String,
}

pub async fn handle_read(args: ReadArgs, cx: &mut AppContext) -> Result<()> {
    let content = storage::read_file(&args.path).await?;
    let data = FileContent { path: &args.path, content };
    cx.output.emit(&data, None, |data| data.content.clone())
}

pub async fn handle_write(args: WriteArgs, cx: &mut AppContext) -> Result<()> {
    let content = match (args.content, args.from) {
        (Some(content), _) => content,
        (None, Some(from)) => storage::read_file(&from).await?,
        (None, None) => {
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .context("Failed to read content from stdin")?;
            content
        }
    };

    storage::save_file(&args.path, &content).await?;
    let data = json!({ "path": args.path, "bytes": content.len() });
    cx.output.emit(&data, Some("File saved"), |_| String::new())
}

pub async fn handle_name(args: NameArgs, cx: &mut AppContext) -> Result<()> {
    match args.command {
        NameCommands::Exists { dir, name, kind } => {
            let exists = storage::check_name_exists(&dir, &name, kind).await?;
            cx.output.emit(&json!({ "name": name, "exists": exists }), None, |_| {
                if exists {
                    format!("'{}' is taken", name)
                } else {
                    format!("'{}' is available", name)
                }
            })
        }
        NameCommands::Next { dir, prefix, kind } => {
            let name = storage::next_available_name(&dir, &prefix, kind).await?;
            cx.output.emit(&json!({ "name": name }), None, |_| name.clone())
        }
    }
}
