use std::{collections::HashSet, sync::Arc};

use uuid::Uuid;

use ranked_todo::{
    db::dao::{DaoContext, VersionedDao},
    error::AppError,
    services::{ListFilter, MarkStatus, TodoService, TodoUpdate},
    state::AppState,
    test_helpers::{file_state, memory_state, postgres_state, todo_service},
};

fn titles(items: &[ranked_todo::db::entities::todo::Model]) -> Vec<&str> {
    items.iter().map(|item| item.title.as_str()).collect()
}

fn positions(items: &[ranked_todo::db::entities::todo::Model]) -> Vec<i32> {
    items.iter().map(|item| item.position).collect()
}

async fn seeded(service: &TodoService, person_id: Uuid, titles: &[&str]) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for title in titles {
        let item = service
            .create_item(person_id, title)
            .await
            .expect("create should succeed");
        ids.push(item.entity_id);
    }
    ids
}

#[tokio::test]
async fn creates_keep_ranks_dense_with_newest_first() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();

    seeded(&service, person_id, &["first", "second", "third", "fourth"]).await;

    let list = service
        .get_list(person_id, ListFilter::All)
        .await
        .expect("list should load");
    assert_eq!(titles(&list), vec!["fourth", "third", "second", "first"]);
    assert_eq!(positions(&list), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn create_trims_title_and_starts_incomplete() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();

    let item = service
        .create_item(person_id, "  Buy milk  ")
        .await
        .expect("create should succeed");

    assert_eq!(item.title, "Buy milk");
    assert!(!item.is_completed);
    assert_eq!(item.position, 0);
    assert_eq!(item.previous_version, None);
    assert_eq!(item.changed_by_id, person_id);
}

#[tokio::test]
async fn lists_are_scoped_to_their_owner() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    seeded(&service, alice, &["alice one", "alice two"]).await;
    seeded(&service, bob, &["bob one"]).await;

    let bobs = service
        .get_list(bob, ListFilter::All)
        .await
        .expect("list should load");
    assert_eq!(titles(&bobs), vec!["bob one"]);
    assert_eq!(positions(&bobs), vec![0]);
}

#[tokio::test]
async fn every_filter_returns_items_sorted_by_position() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let ids = seeded(&service, person_id, &["a", "b", "c", "d", "e"]).await;

    service
        .toggle_status(person_id, ids[1])
        .await
        .expect("toggle should succeed");
    service
        .toggle_status(person_id, ids[3])
        .await
        .expect("toggle should succeed");

    for filter in [ListFilter::All, ListFilter::Active, ListFilter::Completed] {
        let list = service
            .get_list(person_id, filter)
            .await
            .expect("list should load");
        let ranks = positions(&list);
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted, "{filter:?} should be sorted");
    }

    let completed = service
        .get_list(person_id, ListFilter::Completed)
        .await
        .expect("list should load");
    assert_eq!(titles(&completed), vec!["d", "b"]);
}

#[tokio::test]
async fn toggle_twice_round_trips_and_chains_versions() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let created = service
        .create_item(person_id, "Buy milk")
        .await
        .expect("create should succeed");

    let once = service
        .toggle_status(person_id, created.entity_id)
        .await
        .expect("toggle should succeed");
    let twice = service
        .toggle_status(person_id, created.entity_id)
        .await
        .expect("toggle should succeed");

    assert!(once.is_completed);
    assert!(!twice.is_completed);
    assert_eq!(once.previous_version, Some(created.version));
    assert_eq!(twice.previous_version, Some(once.version));
    assert_eq!(twice.position, created.position);
}

#[tokio::test]
async fn update_overwrites_fields_and_writes_position_directly() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let ids = seeded(&service, person_id, &["a", "b", "c"]).await;

    let updated = service
        .update_item(
            person_id,
            ids[2],
            TodoUpdate {
                title: "c, renamed".to_string(),
                is_completed: Some(true),
                position: Some(2),
            },
        )
        .await
        .expect("update should succeed");
    assert_eq!(updated.title, "c, renamed");
    assert!(updated.is_completed);
    assert_eq!(updated.position, 2);

    // "a" also sits at 2; nothing else is renumbered and "a" wins the tie
    // by creation time.
    let list = service
        .get_list(person_id, ListFilter::All)
        .await
        .expect("list should load");
    assert_eq!(titles(&list), vec!["b", "a", "c, renamed"]);
    assert_eq!(positions(&list), vec![1, 2, 2]);
}

#[tokio::test]
async fn update_without_flags_keeps_completion_and_rank() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let ids = seeded(&service, person_id, &["a", "b"]).await;
    service
        .toggle_status(person_id, ids[0])
        .await
        .expect("toggle should succeed");

    let updated = service
        .update_item(
            person_id,
            ids[0],
            TodoUpdate {
                title: "a2".to_string(),
                is_completed: None,
                position: None,
            },
        )
        .await
        .expect("update should succeed");

    assert!(updated.is_completed);
    assert_eq!(updated.position, 1);
}

#[tokio::test]
async fn update_validates_input() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let ids = seeded(&service, person_id, &["a"]).await;

    let blank = service
        .update_item(
            person_id,
            ids[0],
            TodoUpdate {
                title: " ".to_string(),
                is_completed: None,
                position: None,
            },
        )
        .await
        .expect_err("blank title should fail");
    assert!(matches!(blank, AppError::BadRequest(_)));

    let missing = service
        .update_item(
            person_id,
            Uuid::new_v4(),
            TodoUpdate {
                title: "x".to_string(),
                is_completed: None,
                position: None,
            },
        )
        .await
        .expect_err("unknown id should fail");
    assert!(matches!(missing, AppError::NotFound(_)));
}

#[tokio::test]
async fn mark_all_empties_the_opposite_filter() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let ids = seeded(&service, person_id, &["a", "b", "c"]).await;
    service
        .toggle_status(person_id, ids[0])
        .await
        .expect("toggle should succeed");

    let changed = service
        .mark_all(person_id, MarkStatus::Completed)
        .await
        .expect("mark all should succeed");
    assert_eq!(titles(&changed), vec!["c", "b"]);
    let active = service
        .get_list(person_id, ListFilter::Active)
        .await
        .expect("list should load");
    assert!(active.is_empty());

    let changed = service
        .mark_all(person_id, MarkStatus::Active)
        .await
        .expect("mark all should succeed");
    assert_eq!(changed.len(), 3);
    let completed = service
        .get_list(person_id, ListFilter::Completed)
        .await
        .expect("list should load");
    assert!(completed.is_empty());
}

#[tokio::test]
async fn mark_all_leaves_items_already_in_target_state_unsaved() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let ids = seeded(&service, person_id, &["a", "b"]).await;
    let done = service
        .toggle_status(person_id, ids[0])
        .await
        .expect("toggle should succeed");

    service
        .mark_all(person_id, MarkStatus::Completed)
        .await
        .expect("mark all should succeed");

    let after = service.get_item(ids[0]).await.expect("item should load");
    assert_eq!(after.version, done.version);
}

#[tokio::test]
async fn delete_completed_keeps_active_positions() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let ids = seeded(&service, person_id, &["a", "b", "c", "d"]).await;
    service
        .toggle_status(person_id, ids[1])
        .await
        .expect("toggle should succeed");
    service
        .toggle_status(person_id, ids[3])
        .await
        .expect("toggle should succeed");
    let before = service
        .get_list(person_id, ListFilter::Active)
        .await
        .expect("list should load");

    let deleted = service
        .delete_completed(person_id)
        .await
        .expect("delete should succeed");

    assert_eq!(deleted, 2);
    let completed = service
        .get_list(person_id, ListFilter::Completed)
        .await
        .expect("list should load");
    assert!(completed.is_empty());
    let after = service
        .get_list(person_id, ListFilter::Active)
        .await
        .expect("list should load");
    assert_eq!(positions(&after), positions(&before));
    assert_eq!(positions(&after), vec![1, 3]);
}

#[tokio::test]
async fn deleted_items_are_gone_for_good() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let ids = seeded(&service, person_id, &["a"]).await;

    service
        .delete_item(person_id, ids[0])
        .await
        .expect("delete should succeed");

    let get = service
        .get_item(ids[0])
        .await
        .expect_err("deleted item should not load");
    assert!(matches!(get, AppError::NotFound(_)));
    let toggle = service
        .toggle_status(person_id, ids[0])
        .await
        .expect_err("deleted item should not toggle");
    assert!(matches!(toggle, AppError::NotFound(_)));
    let again = service
        .delete_item(person_id, ids[0])
        .await
        .expect_err("second delete should fail");
    assert!(matches!(again, AppError::NotFound(_)));
}

#[tokio::test]
async fn reorder_swaps_two_items() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    // Created B then A, so A sits at 0 and B at 1.
    let ids = seeded(&service, person_id, &["B", "A"]).await;
    let (b, a) = (ids[0], ids[1]);

    let reordered = service
        .reorder(person_id, &[b, a])
        .await
        .expect("reorder should succeed");
    assert_eq!(titles(&reordered), vec!["B", "A"]);
    assert_eq!(positions(&reordered), vec![0, 1]);

    let list = service
        .get_list(person_id, ListFilter::All)
        .await
        .expect("list should load");
    assert_eq!(titles(&list), vec!["B", "A"]);
}

#[tokio::test]
async fn reorder_leaves_omitted_items_in_place() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let ids = seeded(&service, person_id, &["c", "b", "a"]).await;
    let c = ids[0];

    service
        .reorder(person_id, &[c])
        .await
        .expect("reorder should succeed");

    let list = service
        .get_list(person_id, ListFilter::All)
        .await
        .expect("list should load");
    assert_eq!(positions(&list), vec![0, 0, 1]);
    assert_eq!(list.iter().find(|item| item.entity_id == c).map(|item| item.position), Some(0));
}

#[tokio::test]
async fn reorder_is_all_or_nothing() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let (person_id, stranger) = (Uuid::new_v4(), Uuid::new_v4());
    let ids = seeded(&service, person_id, &["b", "a"]).await;
    let foreign = seeded(&service, stranger, &["theirs"]).await;

    let err = service
        .reorder(person_id, &[ids[0], foreign[0]])
        .await
        .expect_err("foreign id should fail");
    assert!(matches!(err, AppError::NotFound(_)));

    let list = service
        .get_list(person_id, ListFilter::All)
        .await
        .expect("list should load");
    assert_eq!(titles(&list), vec!["a", "b"]);
    assert_eq!(positions(&list), vec![0, 1]);
}

#[tokio::test]
async fn history_reconstructs_every_version_newest_first() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    let created = service
        .create_item(person_id, "Buy milk")
        .await
        .expect("create should succeed");
    let toggled = service
        .toggle_status(person_id, created.entity_id)
        .await
        .expect("toggle should succeed");
    let renamed = service
        .update_item(
            person_id,
            created.entity_id,
            TodoUpdate {
                title: "Buy oat milk".to_string(),
                is_completed: None,
                position: None,
            },
        )
        .await
        .expect("update should succeed");
    service
        .delete_item(person_id, created.entity_id)
        .await
        .expect("delete should succeed");

    let history = service
        .history(created.entity_id)
        .await
        .expect("history should load");

    assert_eq!(history.len(), 4);
    assert!(!history[0].active);
    assert_eq!(history[0].previous_version, Some(renamed.version));
    assert_eq!(history[1].version, renamed.version);
    assert_eq!(history[2].version, toggled.version);
    assert_eq!(history[3].version, created.version);
    assert_eq!(history[3].previous_version, None);
    for pair in history.windows(2) {
        assert_eq!(pair[0].previous_version, Some(pair[1].version));
    }
    let distinct: HashSet<Uuid> = history.iter().map(|model| model.version).collect();
    assert_eq!(distinct.len(), history.len());
}

#[tokio::test]
async fn saving_a_stale_copy_is_a_conflict() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let dao = DaoContext::new(&state.db).todo();
    let person_id = Uuid::new_v4();
    let stale = service
        .create_item(person_id, "Buy milk")
        .await
        .expect("create should succeed");
    service
        .toggle_status(person_id, stale.entity_id)
        .await
        .expect("toggle should succeed");

    let err = dao
        .save(&state.db, stale.clone(), person_id)
        .await
        .expect_err("stale save should fail");

    assert!(err.is_conflict());
    let current = service
        .get_item(stale.entity_id)
        .await
        .expect("item should load");
    assert!(current.is_completed);
}

const RACING_CREATES: usize = 6;

/// Fires `RACING_CREATES` creates for one person at once and checks that
/// every one of them lands and the ranks stay dense.
async fn racing_creates_stay_dense(state: Arc<AppState>) {
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();
    seeded(&service, person_id, &["seed one", "seed two"]).await;

    let handles: Vec<_> = (0..RACING_CREATES)
        .map(|n| {
            let service = service.clone();
            tokio::spawn(async move {
                let title = format!("racer {n}");
                service.create_item(person_id, &title).await
            })
        })
        .collect();
    for handle in handles {
        handle
            .await
            .expect("create task should not panic")
            .expect("create should succeed after retries");
    }

    let list = service
        .get_list(person_id, ListFilter::All)
        .await
        .expect("list should load");
    let expected: Vec<i32> = (0..).take(RACING_CREATES + 2).collect();
    assert_eq!(positions(&list), expected);
    assert_eq!(titles(&list[RACING_CREATES..]), vec!["seed two", "seed one"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_on_a_shared_sqlite_file_all_succeed() {
    let (state, _file) = file_state(4).await;
    racing_creates_stay_dense(state).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_on_postgres_all_succeed() {
    let Some(state) = postgres_state(8).await else {
        return;
    };
    racing_creates_stay_dense(state).await;
}

#[tokio::test]
async fn walkthrough_of_a_small_list() {
    let state = memory_state().await;
    let service = todo_service(&state);
    let person_id = Uuid::new_v4();

    let milk = service
        .create_item(person_id, "Buy milk")
        .await
        .expect("create should succeed");
    let dentist = service
        .create_item(person_id, "Call dentist")
        .await
        .expect("create should succeed");

    let all = service
        .get_list(person_id, ListFilter::All)
        .await
        .expect("list should load");
    assert_eq!(titles(&all), vec!["Call dentist", "Buy milk"]);
    assert_eq!(positions(&all), vec![0, 1]);

    service
        .toggle_status(person_id, milk.entity_id)
        .await
        .expect("toggle should succeed");
    let completed = service
        .get_list(person_id, ListFilter::Completed)
        .await
        .expect("list should load");
    assert_eq!(titles(&completed), vec!["Buy milk"]);

    service
        .delete_item(person_id, dentist.entity_id)
        .await
        .expect("delete should succeed");
    let gap = service
        .get_list(person_id, ListFilter::All)
        .await
        .expect("list should load");
    assert_eq!(positions(&gap), vec![1]);

    service
        .create_item(person_id, "Walk dog")
        .await
        .expect("create should succeed");
    let all = service
        .get_list(person_id, ListFilter::All)
        .await
        .expect("list should load");
    assert_eq!(titles(&all), vec!["Walk dog", "Buy milk"]);
    assert_eq!(positions(&all), vec![0, 1]);
}
