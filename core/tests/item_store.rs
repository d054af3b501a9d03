use std::path::Path;
use tempfile::tempdir;
use tokio::fs;

use folio_core::storage::{
    add_file_to_metadata, check_name_exists, delete_item, get_file_name_from_display_name, next_available_name,
    read_file, rename_item, save_file, update_file_in_metadata, Error, ErrorKind, ItemDetails, ItemDetailsUpdate,
    ItemKind, Project, METADATA_FILE,
};

// Helper to create dummy file/dir
async fn create_dummy(path: &Path, is_dir: bool) {
    if is_dir {
        fs::create_dir_all(path).await.expect("Test helper: Failed to create dummy dir");
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.expect("Test helper: Failed to create parent dir");
        }
        fs::write(path, "").await.expect("Test helper: Failed to create dummy file");
    }
}

#[tokio::test]
async fn integration_create_open_and_validate_project() {
    let dir = tempdir().unwrap();

    // 1. Create project
    let created = Project::create("Saga", dir.path()).await.expect("Failed to create project");
    assert!(created.root().join("project.json").is_file());

    // 2. Open it again
    let opened = Project::open(created.root()).await.expect("Failed to open existing project");
    assert_eq!(opened.manifest().await.unwrap().name, "Saga");
    assert!(Project::validate(created.root()).await);

    // 3. A plain directory is not a project
    let not_a_project = dir.path().join("plain");
    create_dummy(&not_a_project, true).await;
    let err = Project::open(&not_a_project).await.unwrap_err();
    assert!(matches!(err, Error::NotAProject(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn integration_create_then_read_round_trip() {
    let dir = tempdir().unwrap();
    let project = Project::create("Round Trip", dir.path()).await.unwrap();

    project.create_item(ItemKind::Chapter, "My Chapter").await.unwrap();

    let chapters = project.list_items(ItemKind::Chapter).await.unwrap();
    let chapter = chapters.iter().find(|c| c.name == "My Chapter").expect("Chapter should be listed");
    assert_eq!(chapter.word_count, Some(0));

    let details = project.item_details(ItemKind::Chapter, "My Chapter").await.unwrap();
    assert_eq!(details, ItemDetails::default());
}

#[tokio::test]
async fn integration_duplicate_create_is_rejected() {
    let dir = tempdir().unwrap();
    let project = Project::at(dir.path());
    project.create_item(ItemKind::Chapter, "Twin").await.unwrap();
    let update = ItemDetailsUpdate { description: Some("kept".into()), ..Default::default() };
    project.save_item_details(ItemKind::Chapter, "Twin", update).await.unwrap();

    let err = project.create_item(ItemKind::Chapter, "Twin").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let details = project.item_details(ItemKind::Chapter, "Twin").await.unwrap();
    assert_eq!(details.description, "kept");
}

#[tokio::test]
async fn integration_save_is_field_additive() {
    let dir = tempdir().unwrap();
    let project = Project::at(dir.path());
    project.create_item(ItemKind::Note, "Ideas").await.unwrap();

    let update = ItemDetailsUpdate { description: Some("loose threads".into()), ..Default::default() };
    project.save_item_details(ItemKind::Note, "Ideas", update).await.unwrap();
    let update = ItemDetailsUpdate { content: Some("X".into()), ..Default::default() };
    project.save_item_details(ItemKind::Note, "Ideas", update).await.unwrap();

    let details = project.item_details(ItemKind::Note, "Ideas").await.unwrap();
    assert_eq!(details.content, "X");
    assert_eq!(details.description, "loose threads");
}

#[tokio::test]
async fn integration_lore_scenario() {
    let dir = tempdir().unwrap();
    let project = Project::at(dir.path());

    let handle = project.create_item(ItemKind::Lore, "Dragon's Lair!!").await.unwrap();
    assert_eq!(handle.path, dir.path().join("World Lore").join("Dragon_s_Lair__"));

    let metadata: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(handle.path.join(METADATA_FILE)).await.unwrap()).unwrap();
    assert_eq!(metadata["name"], "Dragon's Lair!!");
    assert_eq!(metadata["description"], "");
    assert_eq!(metadata["category"], "");
    assert_eq!(fs::read_to_string(handle.path.join("content.txt")).await.unwrap(), "");
}

#[tokio::test]
async fn integration_listing_missing_chapters_directory() {
    let dir = tempdir().unwrap();
    let project = Project::at(dir.path());

    let chapters = project.list_items(ItemKind::Chapter).await.unwrap();
    assert!(chapters.is_empty());

    let chapters_dir = dir.path().join("Book Chapters");
    assert!(chapters_dir.is_dir());
    let mut entries = fs::read_dir(&chapters_dir).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none(), "Directory should be empty");
}

#[tokio::test]
async fn integration_index_sequence() {
    let dir = tempdir().unwrap();
    let notes = dir.path().join("Notes");
    create_dummy(&notes.join("n1.txt"), false).await;

    add_file_to_metadata(&notes, "Old", "n1.txt").await.unwrap();
    update_file_in_metadata(&notes, "Old", "New").await.unwrap();

    assert_eq!(get_file_name_from_display_name(&notes, "New").await.unwrap().as_deref(), Some("n1.txt"));
    assert_eq!(get_file_name_from_display_name(&notes, "Old").await.unwrap(), None);
}

#[tokio::test]
async fn integration_delete_validation() {
    let dir = tempdir().unwrap();
    let project = Project::at(dir.path());
    let note = project.create_item(ItemKind::Note, "Keep me").await.unwrap();

    let err = delete_item(ItemKind::Character, &note.path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);
    assert!(note.path.join(METADATA_FILE).exists(), "No filesystem mutation expected");

    let deleted = delete_item(ItemKind::Note, &note.path).await.unwrap();
    assert!(deleted.removed);
    assert!(!note.path.exists());

    // Second delete of the same note is a soft failure
    let again = delete_item(ItemKind::Note, &note.path).await.unwrap();
    assert!(!again.removed);
}

#[tokio::test]
async fn integration_rename_then_list() {
    let dir = tempdir().unwrap();
    let project = Project::at(dir.path());
    let handle = project.create_item(ItemKind::Chapter, "Draft").await.unwrap();

    let renamed = rename_item(&handle.path, "Final Cut").await.unwrap();
    assert!(renamed.path.ends_with("Book Chapters/Final_Cut"));

    let names: Vec<_> = project
        .list_items(ItemKind::Chapter)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["Final Cut"]);

    // Details follow the new display name
    let details = project.item_details(ItemKind::Chapter, "Final Cut").await.unwrap();
    assert_eq!(details.content, "");
    assert!(!project.item_path(ItemKind::Chapter, "Draft").unwrap().exists());
}

#[tokio::test]
async fn integration_name_helpers() {
    let dir = tempdir().unwrap();
    let project = Project::at(dir.path());
    project.create_item(ItemKind::Character, "Character 1").await.unwrap();

    let characters = project.kind_dir(ItemKind::Character);
    assert!(check_name_exists(&characters, "Character 1", ItemKind::Character).await.unwrap());
    assert_eq!(
        next_available_name(&characters, "Character", ItemKind::Character).await.unwrap(),
        "Character 2"
    );
}

#[tokio::test]
async fn integration_raw_file_access() {
    let dir = tempdir().unwrap();
    let project = Project::at(dir.path());
    let handle = project.create_item(ItemKind::Chapter, "Raw").await.unwrap();
    let content = handle.path.join(ItemKind::Chapter.content_file());

    save_file(&content, "Edited in place").await.unwrap();
    assert_eq!(read_file(&content).await.unwrap(), "Edited in place");

    let listed = project.list_items(ItemKind::Chapter).await.unwrap();
    assert_eq!(listed[0].word_count, Some(3));
}
