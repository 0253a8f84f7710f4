use std::time::Duration;

use notes_entity::delta::TextDelta;
use notes_store::{ChannelMessage, DocumentStore, RealtimeTransport};
use notes_sync::SyncState;
use notes_sync::error::SyncError;

use crate::util::SessionTest;

#[tokio::test(start_paused = true)]
async fn open_seeds_from_persisted_snapshot_without_writing_back() {
  let test = SessionTest::new();
  test
    .store
    .set_document(&test.key, "existing notes")
    .await
    .unwrap();

  let session = test.open_session().await;
  assert_eq!(session.content(), "existing notes");
  assert_eq!(session.sync_state(), SyncState::Synced);

  // The programmatic seed load must not schedule a persistence cycle.
  tokio::time::sleep(Duration::from_secs(2)).await;
  assert_eq!(test.store.write_history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_persists_exactly_once_with_final_content() {
  let test = SessionTest::new();
  let session = test.open_session().await;

  session
    .apply_local_edit(&TextDelta::insert_at(0, "h"))
    .unwrap();
  session
    .apply_local_edit(&TextDelta::insert_at(1, "e"))
    .unwrap();
  session
    .apply_local_edit(&TextDelta::insert_at(2, "y"))
    .unwrap();
  assert_eq!(session.sync_state(), SyncState::PendingSave);

  tokio::time::sleep(Duration::from_millis(900)).await;

  let writes = test.store.write_history();
  assert_eq!(writes.len(), 1);
  assert_eq!(writes[0].1, "hey");
  assert_eq!(session.sync_state(), SyncState::Synced);
}

#[tokio::test(start_paused = true)]
async fn edits_in_separate_quiet_periods_persist_separately() {
  let test = SessionTest::new();
  let session = test.open_session().await;

  session
    .apply_local_edit(&TextDelta::insert_at(0, "first"))
    .unwrap();
  tokio::time::sleep(Duration::from_millis(1000)).await;
  session
    .apply_local_edit(&TextDelta::insert_at(5, " second"))
    .unwrap();
  tokio::time::sleep(Duration::from_millis(1000)).await;

  let writes = test.store.write_history();
  assert_eq!(writes.len(), 2);
  assert_eq!(writes[0].1, "first");
  assert_eq!(writes[1].1, "first second");
}

#[tokio::test(start_paused = true)]
async fn remote_delta_applies_without_rebroadcast_or_persist() {
  let test = SessionTest::new();
  let alice = test.open_session().await;
  let bob = test.open_session().await;
  let mut wire = test.transport.channel(test.key.channel_id()).subscribe();

  alice
    .apply_local_edit(&TextDelta::insert_at(0, "hello"))
    .unwrap();
  tokio::time::sleep(Duration::from_millis(10)).await;

  assert_eq!(bob.content(), "hello");

  // Exactly one message crossed the wire: bob applied it without echoing.
  let first = wire.try_recv().unwrap();
  assert_eq!(first.origin, alice.session_id());
  assert!(wire.try_recv().is_err());

  // Only alice's debounced write lands; applying a remote delta never
  // schedules persistence.
  tokio::time::sleep(Duration::from_secs(2)).await;
  assert_eq!(test.store.write_history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn character_budget_rejects_synchronously_and_keeps_content() {
  let test = SessionTest::with_limit(200_000);
  test.budget.shift(199_990);
  let session = test.open_session().await;

  let oversized = TextDelta::insert_at(0, "x".repeat(20));
  match session.apply_local_edit(&oversized) {
    Err(SyncError::CharLimitExceeded { limit }) => assert_eq!(limit, 200_000),
    other => panic!("expected CharLimitExceeded, got {:?}", other),
  }
  assert_eq!(session.content(), "");

  session
    .apply_local_edit(&TextDelta::insert_at(0, "x".repeat(5)))
    .unwrap();
  assert_eq!(session.content(), "xxxxx");
  assert_eq!(test.budget.used(), 199_995);
}

#[tokio::test(start_paused = true)]
async fn persist_failure_is_self_healing_on_the_next_edit() {
  let test = SessionTest::new();
  let session = test.open_session().await;
  test.store.fail_next_writes(1);

  session
    .apply_local_edit(&TextDelta::insert_at(0, "a"))
    .unwrap();
  tokio::time::sleep(Duration::from_millis(1000)).await;

  // The write failed; local content is still authoritative.
  assert!(test.store.write_history().is_empty());
  assert_eq!(session.content(), "a");
  assert_eq!(session.sync_state(), SyncState::PendingSave);

  session
    .apply_local_edit(&TextDelta::insert_at(1, "b"))
    .unwrap();
  tokio::time::sleep(Duration::from_millis(1000)).await;

  let writes = test.store.write_history();
  assert_eq!(writes.len(), 1);
  assert_eq!(writes[0].1, "ab");
  assert_eq!(session.sync_state(), SyncState::Synced);
}

#[tokio::test(start_paused = true)]
async fn undecodable_remote_payload_is_skipped() {
  let test = SessionTest::new();
  let session = test.open_session().await;
  session
    .apply_local_edit(&TextDelta::insert_at(0, "keep"))
    .unwrap();

  let channel = test.transport.channel(test.key.channel_id());
  channel
    .publish(ChannelMessage::new(
      "someone-else",
      serde_json::json!({ "not": "a delta" }),
    ))
    .unwrap();
  tokio::time::sleep(Duration::from_millis(10)).await;

  assert_eq!(session.content(), "keep");
}

#[tokio::test(start_paused = true)]
async fn inapplicable_remote_delta_is_skipped() {
  let test = SessionTest::new();
  let session = test.open_session().await;

  let channel = test.transport.channel(test.key.channel_id());
  let delta = TextDelta::delete_at(3, 10);
  channel
    .publish(ChannelMessage::new(
      "someone-else",
      serde_json::to_value(&delta).unwrap(),
    ))
    .unwrap();
  tokio::time::sleep(Duration::from_millis(10)).await;

  assert_eq!(session.content(), "");
}

#[tokio::test(start_paused = true)]
async fn close_drops_the_pending_write() {
  let test = SessionTest::new();
  let session = test.open_session().await;

  session
    .apply_local_edit(&TextDelta::insert_at(0, "unsaved"))
    .unwrap();
  session.close();
  tokio::time::sleep(Duration::from_secs(2)).await;

  assert!(test.store.write_history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sync_state_watch_reports_the_save_cycle() {
  let test = SessionTest::new();
  let session = test.open_session().await;
  let mut states = session.subscribe_sync_state();

  session
    .apply_local_edit(&TextDelta::insert_at(0, "watch me"))
    .unwrap();
  states.changed().await.unwrap();
  assert_eq!(*states.borrow(), SyncState::PendingSave);

  tokio::time::sleep(Duration::from_millis(900)).await;
  assert_eq!(*states.borrow(), SyncState::Synced);
}
