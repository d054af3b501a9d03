use anyhow::Result;
use console::style;
use folio_core::storage::{self, DirectoryIndex};
use serde_json::json;

use crate::cli::{IndexArgs, IndexCommands};
use crate::AppContext;

pub async fn handle_index(args: IndexArgs, cx: &mut AppContext) -> Result<()> {
    match args.command {
        IndexCommands::Show { dir } => {
            let index = storage::get_directory_metadata(&dir).await?;
            cx.output.emit(&index, None, render_index)
        }
        IndexCommands::Add { dir, display_name, file_name } => {
            let entry = storage::add_file_to_metadata(&dir, &display_name, &file_name).await?;
            cx.output.emit(&entry, Some("Index entry added"), |_| String::new())
        }
        IndexCommands::Update { dir, old_display_name, new_display_name } => {
            let entry = storage::update_file_in_metadata(&dir, &old_display_name, &new_display_name).await?;
            let message = entry.as_ref().map(|_| "Index entry updated");
            cx.output.emit(&entry, message, |entry| match entry {
                Some(_) => String::new(),
                None => not_indexed(&old_display_name),
            })
        }
        IndexCommands::Remove { dir, display_name } => {
            let removed = storage::remove_file_from_metadata(&dir, &display_name).await?;
            let message = removed.then_some("Index entry removed");
            cx.output.emit(&json!({ "removed": removed }), message, |_| {
                if removed { String::new() } else { not_indexed(&display_name) }
            })
        }
        IndexCommands::FileName { dir, display_name } => {
            let file_name = storage::get_file_name_from_display_name(&dir, &display_name).await?;
            cx.output.emit(&file_name, None, |found| {
                found.clone().unwrap_or_else(|| not_indexed(&display_name))
            })
        }
        IndexCommands::DisplayName { dir, file_name } => {
            let display_name = storage::get_display_name_from_file_name(&dir, &file_name).await?;
            cx.output.emit(&display_name, None, |found| {
                found.clone().unwrap_or_else(|| not_indexed(&file_name))
            })
        }
    }
}

fn not_indexed(name: &str) -> String {
    style(format!("'{}' is not indexed", name)).yellow().to_string()
}

fn render_index(index: &DirectoryIndex) -> String {
    if index.files.is_empty() {
        return "No indexed files.".to_string();
    }
    index
        .files
        .iter()
        .map(|entry| {
            format!(
                "{} {} {}",
                style(&entry.display_name).bold(),
                style("→").dim(),
                entry.file_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
