use std::collections::HashSet;
use std::sync::Arc;

use notes_entity::ItemKind;
use notes_folder::{FolderReconciler, GridState, ReconcilerScope};
use notes_store::{DocumentStore, MemoryStore};

use crate::util::{WORKSPACE, create_folder, file, note, settle, spawn_all};

fn identities(reconciler: &FolderReconciler) -> HashSet<(ItemKind, String, String)> {
  reconciler
    .items()
    .into_iter()
    .map(|item| (item.kind, item.folder_id, item.id))
    .collect()
}

#[tokio::test(start_paused = true)]
async fn replaying_a_snapshot_is_idempotent() {
  let store = Arc::new(MemoryStore::new());
  create_folder(&store, "f1", "Biology").await;
  let reconciler = spawn_all(&store).await;
  settle().await;

  store.upsert_item(WORKSPACE, note("f1", "n1")).await.unwrap();
  settle().await;
  assert_eq!(reconciler.items().len(), 1);

  // Re-upserting the identical item re-delivers the identical snapshot.
  store.upsert_item(WORKSPACE, note("f1", "n1")).await.unwrap();
  settle().await;

  let items = reconciler.items();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].id, "n1");
}

#[tokio::test(start_paused = true)]
async fn partitions_are_isolated_from_each_other() {
  let store = Arc::new(MemoryStore::new());
  create_folder(&store, "f1", "Biology").await;
  create_folder(&store, "f2", "Chemistry").await;
  let reconciler = spawn_all(&store).await;
  settle().await;

  store.upsert_item(WORKSPACE, file("f1", "slides.pdf")).await.unwrap();
  store.upsert_item(WORKSPACE, note("f1", "n1")).await.unwrap();
  store.upsert_item(WORKSPACE, file("f2", "lab.pdf")).await.unwrap();
  settle().await;
  assert_eq!(reconciler.items().len(), 3);

  // Touch only (f1, files); every other partition must survive untouched.
  store.upsert_item(WORKSPACE, file("f1", "summary.pdf")).await.unwrap();
  settle().await;

  let expected: HashSet<_> = [
    (ItemKind::File, "f1".to_string(), "slides.pdf".to_string()),
    (ItemKind::File, "f1".to_string(), "summary.pdf".to_string()),
    (ItemKind::Note, "f1".to_string(), "n1".to_string()),
    (ItemKind::File, "f2".to_string(), "lab.pdf".to_string()),
  ]
  .into_iter()
  .collect();
  assert_eq!(identities(&reconciler), expected);
}

#[tokio::test(start_paused = true)]
async fn no_duplicate_identities_after_updates() {
  let store = Arc::new(MemoryStore::new());
  create_folder(&store, "f1", "Biology").await;
  let reconciler = spawn_all(&store).await;
  settle().await;

  for _ in 0..3 {
    store.upsert_item(WORKSPACE, note("f1", "n1")).await.unwrap();
    store.upsert_item(WORKSPACE, file("f1", "slides.pdf")).await.unwrap();
  }
  settle().await;

  let items = reconciler.items();
  assert_eq!(items.len(), 2);
  assert_eq!(identities(&reconciler).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn empty_workspace_then_empty_folder_grid_states() {
  let store = Arc::new(MemoryStore::new());
  let reconciler = spawn_all(&store).await;
  assert_eq!(reconciler.grid_state(), GridState::NoFolders);

  create_folder(&store, "f1", "Biology").await;
  settle().await;
  assert_eq!(reconciler.grid_state(), GridState::NoItems);

  store.upsert_item(WORKSPACE, file("f1", "slides.pdf")).await.unwrap();
  settle().await;
  assert_eq!(reconciler.grid_state(), GridState::Ready);
}

#[tokio::test(start_paused = true)]
async fn removed_folder_is_unsubscribed_and_purged() {
  let store = Arc::new(MemoryStore::new());
  create_folder(&store, "f1", "Biology").await;
  create_folder(&store, "f2", "Chemistry").await;
  let reconciler = spawn_all(&store).await;
  settle().await;
  assert_eq!(reconciler.subscription_count(), 4);

  store.upsert_item(WORKSPACE, note("f1", "n1")).await.unwrap();
  store.upsert_item(WORKSPACE, note("f2", "n2")).await.unwrap();
  settle().await;
  assert_eq!(reconciler.items().len(), 2);

  store.delete_folder(WORKSPACE, "f2").await.unwrap();
  settle().await;

  assert_eq!(reconciler.subscription_count(), 2);
  let items = reconciler.items();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].folder_id, "f1");
  assert_eq!(reconciler.folder_name("f2"), None);
}

#[tokio::test(start_paused = true)]
async fn newly_created_folder_is_fanned_out_dynamically() {
  let store = Arc::new(MemoryStore::new());
  create_folder(&store, "f1", "Biology").await;
  let reconciler = spawn_all(&store).await;
  settle().await;
  assert_eq!(reconciler.subscription_count(), 2);

  create_folder(&store, "f2", "Chemistry").await;
  settle().await;
  assert_eq!(reconciler.subscription_count(), 4);

  store.upsert_item(WORKSPACE, file("f2", "lab.pdf")).await.unwrap();
  settle().await;
  assert_eq!(reconciler.items().len(), 1);
  assert_eq!(reconciler.folder_name("f2").as_deref(), Some("Chemistry"));
}

#[tokio::test(start_paused = true)]
async fn rename_refreshes_the_name_cache() {
  let store = Arc::new(MemoryStore::new());
  create_folder(&store, "f1", "Biology").await;
  let reconciler = spawn_all(&store).await;
  settle().await;
  assert_eq!(reconciler.folder_name("f1").as_deref(), Some("Biology"));

  store.rename_folder(WORKSPACE, "f1", "Molecular Biology").await.unwrap();
  settle().await;
  assert_eq!(
    reconciler.folder_name("f1").as_deref(),
    Some("Molecular Biology")
  );
}

#[tokio::test(start_paused = true)]
async fn scoped_mode_only_tracks_its_folder() {
  let store = Arc::new(MemoryStore::new());
  create_folder(&store, "f1", "Biology").await;
  create_folder(&store, "f2", "Chemistry").await;
  store.upsert_item(WORKSPACE, note("f1", "n1")).await.unwrap();
  store.upsert_item(WORKSPACE, note("f2", "n2")).await.unwrap();

  let reconciler = FolderReconciler::spawn(
    store.clone(),
    WORKSPACE,
    ReconcilerScope::Folder("f1".to_string()),
  )
  .await
  .unwrap();
  settle().await;

  assert_eq!(reconciler.subscription_count(), 2);
  let items = reconciler.items();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].folder_id, "f1");
  assert_eq!(reconciler.folder_name("f1").as_deref(), Some("Biology"));

  store.upsert_item(WORKSPACE, note("f2", "n3")).await.unwrap();
  settle().await;
  assert_eq!(reconciler.items().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_cancels_every_subscription() {
  let store = Arc::new(MemoryStore::new());
  create_folder(&store, "f1", "Biology").await;
  let reconciler = spawn_all(&store).await;
  settle().await;
  assert_eq!(reconciler.subscription_count(), 2);

  reconciler.close();
  settle().await;

  assert_eq!(reconciler.subscription_count(), 0);
  let before = reconciler.items();
  store.upsert_item(WORKSPACE, note("f1", "n1")).await.unwrap();
  settle().await;
  assert_eq!(reconciler.items(), before);
}
