#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Projection behavior: change notifications, read-time settings migration,
//! and query ordering.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use squickr_app::{
    CreateCollectionRequest, CreateNoteRequest, CreateTaskRequest, Journal, ReorderTaskRequest,
};
use squickr_core::clock::{Clock, ManualClock};
use squickr_core::{
    BehaviorOverride, CollectionSettings, CollectionType, CompletedTaskBehavior, DomainEvent,
    EventKind,
};
use squickr_store_mem::MemoryEventStore;
use time::Duration;
use time::macros::datetime;

fn journal() -> (Journal<MemoryEventStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(datetime!(2026-02-01 09:00:00 UTC)));
    (Journal::in_memory_with_clock(clock.clone()), clock)
}

fn custom(name: &str) -> CreateCollectionRequest {
    CreateCollectionRequest {
        name: name.into(),
        collection_type: Some(CollectionType::Custom),
        date: None,
        user_id: None,
    }
}

#[tokio::test]
async fn projections_renotify_their_own_subscribers_per_store_change() {
    let (journal, _clock) = journal();
    let notifications = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notifications);
    let _subscription = journal.entries().subscribe(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    journal
        .task_writer()
        .create_task(CreateTaskRequest {
            title: "one".into(),
            collection_id: None,
            user_id: None,
        })
        .await
        .unwrap();
    journal
        .entry_writer()
        .create_note(CreateNoteRequest {
            content: "two".into(),
            collection_id: None,
        })
        .await
        .unwrap();

    assert_eq!(notifications.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn legacy_collapse_flag_is_migrated_when_materializing() {
    let (journal, clock) = journal();
    let outcome = journal
        .collection_writer()
        .create_collection(custom("Old settings"))
        .await
        .unwrap();
    let id = outcome.collection_id;

    // A legacy writer recorded the boolean form; the log keeps it verbatim.
    let event = DomainEvent::new(
        &id,
        2,
        clock.now(),
        EventKind::CollectionSettingsUpdated {
            settings: CollectionSettings {
                completed_task_behavior: BehaviorOverride::Unset,
                collapse_completed: Some(true),
            },
        },
    );
    journal.store().append(event).await.unwrap();

    let stored = journal
        .store()
        .get_by_aggregate(&(&id).into())
        .await
        .into_iter()
        .find_map(|event| match event.kind {
            EventKind::CollectionSettingsUpdated { settings } => Some(settings),
            _ => None,
        })
        .expect("settings event in the log");
    assert_eq!(stored.collapse_completed, Some(true));

    let collection = journal
        .collections()
        .collection_by_id(&id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        collection.settings.completed_task_behavior,
        BehaviorOverride::Explicit(CompletedTaskBehavior::Collapse)
    );
    assert_eq!(collection.settings.collapse_completed, None);
}

#[tokio::test]
async fn explicitly_nulled_behavior_overrides_the_legacy_flag() {
    let (journal, clock) = journal();
    let outcome = journal
        .collection_writer()
        .create_collection(custom("Cleared override"))
        .await
        .unwrap();
    let id = outcome.collection_id;

    // A client clears its override while the legacy flag is still present:
    // the wire form carries an explicit `null`, not an absent key.
    let settings: CollectionSettings = serde_json::from_value(serde_json::json!({
        "completedTaskBehavior": null,
        "collapseCompleted": true,
    }))
    .unwrap();
    assert_eq!(
        settings.completed_task_behavior,
        BehaviorOverride::UseDefault
    );

    let event = DomainEvent::new(
        &id,
        2,
        clock.now(),
        EventKind::CollectionSettingsUpdated { settings },
    );
    journal.store().append(event).await.unwrap();

    let collection = journal
        .collections()
        .collection_by_id(&id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        collection.settings.completed_task_behavior,
        BehaviorOverride::UseDefault
    );
    assert_eq!(
        collection.settings.resolved(),
        None,
        "a nulled override defers to the global default instead of the legacy flag"
    );
    assert_eq!(collection.settings.collapse_completed, None);
}

#[tokio::test]
async fn deleted_collections_list_newest_first_and_stay_reachable_by_id() {
    let (journal, clock) = journal();
    let first = journal
        .collection_writer()
        .create_collection(custom("First"))
        .await
        .unwrap();
    let second = journal
        .collection_writer()
        .create_collection(custom("Second"))
        .await
        .unwrap();

    journal
        .collection_writer()
        .delete_collection(&first.collection_id)
        .await
        .unwrap();
    clock.advance(Duration::minutes(1));
    journal
        .collection_writer()
        .delete_collection(&second.collection_id)
        .await
        .unwrap();

    assert!(journal.collections().collections().await.unwrap().is_empty());

    let deleted = journal.collections().deleted_collections().await.unwrap();
    assert_eq!(deleted.len(), 2);
    assert_eq!(deleted[0].id, second.collection_id, "newest deletion first");

    assert!(journal
        .collections()
        .collection_by_id(&first.collection_id)
        .await
        .unwrap()
        .is_none());
    assert!(journal
        .collections()
        .collection_by_id_including_deleted(&first.collection_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn entries_share_one_order_space_across_kinds() {
    let (journal, _clock) = journal();
    let task = journal
        .task_writer()
        .create_task(CreateTaskRequest {
            title: "task".into(),
            collection_id: None,
            user_id: None,
        })
        .await
        .unwrap();
    let note = journal
        .entry_writer()
        .create_note(CreateNoteRequest {
            content: "note".into(),
            collection_id: None,
        })
        .await
        .unwrap();

    // Creation appends, so the task sits first.
    let ids: Vec<_> = journal
        .entries()
        .entries()
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.id().clone())
        .collect();
    assert_eq!(ids, vec![task.clone(), note.clone()]);

    // Reorder the task behind the note, using the note as a neighbour.
    assert!(journal
        .task_writer()
        .reorder_task(ReorderTaskRequest {
            task_id: task.clone(),
            previous_entry_id: Some(note.clone()),
            next_entry_id: None,
        })
        .await
        .unwrap());

    let ids: Vec<_> = journal
        .entries()
        .entries()
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.id().clone())
        .collect();
    assert_eq!(ids, vec![note, task]);
}

#[tokio::test]
async fn task_projection_ignores_notes_and_moves() {
    let (journal, _clock) = journal();
    journal
        .entry_writer()
        .create_note(CreateNoteRequest {
            content: "not a task".into(),
            collection_id: None,
        })
        .await
        .unwrap();
    let task = journal
        .task_writer()
        .create_task(CreateTaskRequest {
            title: "the only task".into(),
            collection_id: None,
            user_id: None,
        })
        .await
        .unwrap();

    let tasks = journal.tasks().tasks().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, task);

    let by_id = journal.tasks().task_by_id(&task).await.unwrap();
    assert!(by_id.is_some());
}
