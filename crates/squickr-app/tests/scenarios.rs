#![allow(clippy::expect_used, clippy::unwrap_used)]
//! End-to-end scenarios driving the journal through its command surface and
//! checking what the projections render.

use std::sync::Arc;

use squickr_app::{
    CreateCollectionRequest, CreateSubTaskRequest, CreateTaskRequest, Journal,
};
use squickr_core::clock::ManualClock;
use squickr_core::{CollectionId, CollectionType, EntryId, EventKind, TaskStatus};
use squickr_store_mem::MemoryEventStore;
use time::macros::datetime;

fn journal() -> Journal<MemoryEventStore> {
    let clock = Arc::new(ManualClock::new(datetime!(2026-02-01 09:00:00 UTC)));
    Journal::in_memory_with_clock(clock)
}

fn task(title: &str, collection: Option<&str>) -> CreateTaskRequest {
    CreateTaskRequest {
        title: title.into(),
        collection_id: collection.map(CollectionId::from_string),
        user_id: None,
    }
}

fn sub_task(title: &str, parent: &EntryId) -> CreateSubTaskRequest {
    CreateSubTaskRequest {
        title: title.into(),
        parent_entry_id: parent.clone(),
        user_id: None,
    }
}

#[tokio::test]
async fn create_then_complete_leaves_one_completed_task() {
    let journal = journal();
    let id = journal
        .task_writer()
        .create_task(task("Buy milk", None))
        .await
        .unwrap();
    journal.task_writer().complete_task(&id).await.unwrap();

    let tasks = journal.entries().tasks().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert!(tasks[0].completed_at.is_some());
    assert!(!tasks[0].order.is_empty());
}

#[tokio::test]
async fn moving_a_parent_drags_every_child_even_previously_moved_ones() {
    let journal = journal();
    let monthly = CollectionId::from_string("monthly-log");

    let parent = journal
        .task_writer()
        .create_task(task("Project", Some("work-projects")))
        .await
        .unwrap();
    let mut children = Vec::new();
    for title in ["A", "B", "C"] {
        children.push(
            journal
                .task_writer()
                .create_sub_task(sub_task(title, &parent))
                .await
                .unwrap(),
        );
    }

    // B wanders off on its own first.
    let moved = journal
        .entry_writer()
        .move_entry_to_collection(&children[1], Some(&CollectionId::from_string("todays-log")))
        .await
        .unwrap();
    assert_eq!(moved, 1);

    // Then the whole tree relocates.
    let moved = journal
        .entry_writer()
        .move_entry_to_collection(&parent, Some(&monthly))
        .await
        .unwrap();
    assert_eq!(moved, 4, "parent plus all three children, one batch");

    for id in std::iter::once(&parent).chain(&children) {
        let entry = journal.entries().entry_by_id(id).await.unwrap().unwrap();
        assert_eq!(
            entry.collection_id(),
            Some(&monthly),
            "{id} must have followed the parent"
        );
    }

    let move_events = journal
        .store()
        .get_all()
        .await
        .into_iter()
        .filter(|event| matches!(event.kind, EventKind::EntryMovedToCollection { .. }))
        .count();
    assert_eq!(move_events, 5, "one for B, then four as one batch");
}

#[tokio::test]
async fn multi_collection_membership_tracks_history_and_allows_orphans() {
    let journal = journal();
    let monthly = CollectionId::from_string("monthly-log");
    let daily = CollectionId::from_string("daily-log");

    let id = journal
        .task_writer()
        .create_task(task("Float between lists", Some("monthly-log")))
        .await
        .unwrap();
    journal
        .task_writer()
        .add_task_to_collection(&id, &daily)
        .await
        .unwrap();
    journal
        .task_writer()
        .remove_task_from_collection(&id, &monthly)
        .await
        .unwrap();

    let current = journal.entries().task_by_id(&id).await.unwrap().unwrap();
    assert_eq!(current.collections, vec![daily.clone()]);
    assert_eq!(current.collection_history.len(), 2);
    assert!(current.collection_history[0].removed_at.is_some());
    assert!(current.collection_history[1].removed_at.is_none());

    // Removing the last membership orphans the task but keeps it reachable.
    journal
        .task_writer()
        .remove_task_from_collection(&id, &daily)
        .await
        .unwrap();
    let orphan = journal.entries().task_by_id(&id).await.unwrap().unwrap();
    assert!(orphan.collections.is_empty());
}

#[tokio::test]
async fn migration_renders_a_ghost_in_the_source_and_an_active_copy_in_the_target() {
    let journal = journal();
    let col_a = CollectionId::from_string("col-a");
    let col_b = CollectionId::from_string("col-b");

    let id = journal
        .task_writer()
        .create_task(task("Ship it", Some("col-a")))
        .await
        .unwrap();
    let outcome = journal
        .task_writer()
        .migrate_task(&id, Some(&col_b))
        .await
        .unwrap();

    let source = journal
        .entries()
        .entries_for_collection_view(&col_a)
        .await
        .unwrap();
    assert_eq!(source.len(), 1);
    assert_eq!(source[0].entry.id(), &id);
    assert!(source[0].render_as_ghost);
    assert_eq!(source[0].ghost_new_location, Some(col_b.clone()));

    let target = journal
        .entries()
        .entries_for_collection_view(&col_b)
        .await
        .unwrap();
    assert_eq!(target.len(), 1);
    assert!(!target[0].render_as_ghost);
    assert_eq!(target[0].entry.id(), &outcome.migrated_to);
    let copy = target[0].entry.as_task().expect("copy is a task");
    assert_eq!(copy.migrated_from, Some(id.clone()));
    assert_eq!(copy.migrated_from_collection_id, Some(col_a.clone()));
    assert_eq!(copy.title, "Ship it");
}

#[tokio::test]
async fn cascaded_migration_mirrors_the_children_in_both_collections() {
    let journal = journal();
    let col_a = CollectionId::from_string("col-a");
    let col_b = CollectionId::from_string("col-b");

    let parent = journal
        .task_writer()
        .create_task(task("Parent", Some("col-a")))
        .await
        .unwrap();
    let child = journal
        .task_writer()
        .create_sub_task(sub_task("Child", &parent))
        .await
        .unwrap();

    let outcome = journal
        .task_writer()
        .migrate_task(&parent, Some(&col_b))
        .await
        .unwrap();
    assert_eq!(outcome.cascaded_children, 1);

    let source = journal
        .entries()
        .entries_for_collection_view(&col_a)
        .await
        .unwrap();
    assert_eq!(source.len(), 2);
    assert!(source.iter().all(|row| row.render_as_ghost));
    assert!(source
        .iter()
        .all(|row| row.ghost_new_location == Some(col_b.clone())));

    let target = journal
        .entries()
        .entries_for_collection_view(&col_b)
        .await
        .unwrap();
    assert_eq!(target.len(), 2);
    assert!(target.iter().all(|row| !row.render_as_ghost));
    let migrated_child = target
        .iter()
        .filter_map(|row| row.entry.as_task())
        .find(|task| task.migrated_from == Some(child.clone()))
        .expect("child copy lives in the target");
    assert_eq!(migrated_child.title, "Child");
}

#[tokio::test]
async fn duplicate_daily_log_creation_returns_the_existing_collection() {
    let journal = journal();
    let first = journal
        .collection_writer()
        .create_collection(CreateCollectionRequest {
            name: "Sat Feb 1".into(),
            collection_type: Some(CollectionType::Daily),
            date: Some("2026-02-01".into()),
            user_id: None,
        })
        .await
        .unwrap();

    let second = journal
        .collection_writer()
        .create_collection(CreateCollectionRequest {
            name: "Other name".into(),
            collection_type: Some(CollectionType::Daily),
            date: Some("2026-02-01".into()),
            user_id: None,
        })
        .await
        .unwrap();

    assert_eq!(second.collection_id, first.collection_id);
    assert!(!second.created);
    assert_eq!(journal.store().get_all().await.len(), 1);

    let daily = journal
        .collections()
        .daily_log_by_date("2026-02-01")
        .await
        .unwrap()
        .expect("daily log resolvable by date");
    assert_eq!(daily.id, first.collection_id);
    assert_eq!(daily.name, "Sat Feb 1");
}

#[tokio::test]
async fn sub_tasks_stop_at_depth_two() {
    let journal = journal();
    let parent = journal
        .task_writer()
        .create_task(task("Parent", None))
        .await
        .unwrap();
    let child = journal
        .task_writer()
        .create_sub_task(sub_task("Child", &parent))
        .await
        .unwrap();

    let err = journal
        .task_writer()
        .create_sub_task(sub_task("Grandchild", &child))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        squickr_app::CommandError::IllegalTransition(_)
    ));

    let children = journal.entries().sub_tasks(&parent).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, child);
}

#[tokio::test]
async fn sub_tasks_inherit_the_parents_collection() {
    let journal = journal();
    let parent = journal
        .task_writer()
        .create_task(task("Parent", Some("work-projects")))
        .await
        .unwrap();
    let child = journal
        .task_writer()
        .create_sub_task(sub_task("Child", &parent))
        .await
        .unwrap();

    let child = journal.entries().task_by_id(&child).await.unwrap().unwrap();
    assert_eq!(
        child.collection_id,
        Some(CollectionId::from_string("work-projects"))
    );
}

#[tokio::test]
async fn moved_entries_ghost_back_to_their_new_home() {
    let journal = journal();
    let work = CollectionId::from_string("work-projects");
    let monthly = CollectionId::from_string("monthly-log");

    let id = journal
        .task_writer()
        .create_task(task("Relocated", Some("work-projects")))
        .await
        .unwrap();
    journal
        .entry_writer()
        .move_entry_to_collection(&id, Some(&monthly))
        .await
        .unwrap();

    let old_home = journal
        .entries()
        .entries_for_collection_view(&work)
        .await
        .unwrap();
    assert_eq!(old_home.len(), 1);
    assert!(old_home[0].render_as_ghost);
    assert_eq!(old_home[0].ghost_new_location, Some(monthly.clone()));

    let new_home = journal
        .entries()
        .entries_for_collection_view(&monthly)
        .await
        .unwrap();
    assert_eq!(new_home.len(), 1);
    assert!(!new_home[0].render_as_ghost);
}
