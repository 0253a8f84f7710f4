use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use notes_entity::DocumentKey;
use notes_entity::delta::TextDelta;
use notes_store::{ChannelMessage, DocumentStore, RealtimeChannel, RealtimeTransport};

use crate::budget::CharBudget;
use crate::error::SyncError;
use crate::state::{InitState, SessionState, SyncState};

/// Quiet period after the last local edit before the full content is
/// persisted.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(850);

/// One open document: holds the local editor content, broadcasts local deltas
/// on the channel keyed by the file id, applies remote deltas without
/// re-emitting them, and persists the full content after a debounce interval.
///
/// Convergence is last write wins: each debounced write replaces the whole
/// persisted snapshot, and remote deltas are replayed in receipt order.
pub struct EditorSession {
  session_id: String,
  key: DocumentKey,
  content: RwLock<String>,
  state: Arc<SessionState>,
  budget: Arc<CharBudget>,
  channel: Arc<dyn RealtimeChannel>,
  pending: mpsc::UnboundedSender<String>,
  shutdown: CancellationToken,
}

impl EditorSession {
  /// Fetches the persisted snapshot, seeds the local content and starts the
  /// remote-apply and persistence loops. Edits are rejected until the seed
  /// load completes, so opening never persists programmatic content.
  pub async fn open(
    store: Arc<dyn DocumentStore>,
    transport: &dyn RealtimeTransport,
    key: DocumentKey,
    budget: Arc<CharBudget>,
  ) -> Result<Arc<Self>, SyncError> {
    let state = Arc::new(SessionState::new(&key.to_string()));
    state.set_init_state(InitState::Loading);
    let snapshot = store.get_document(&key).await?;
    let content = snapshot.map(|doc| doc.content).unwrap_or_default();

    let channel = transport.channel(key.channel_id());
    let (pending_tx, pending_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let session = Arc::new(Self {
      session_id: uuid::Uuid::new_v4().to_string(),
      key: key.clone(),
      content: RwLock::new(content),
      state: state.clone(),
      budget,
      channel: channel.clone(),
      pending: pending_tx,
      shutdown: shutdown.clone(),
    });

    Self::spawn_persist_loop(store, key, state, pending_rx, shutdown.clone());
    Self::spawn_remote_loop(
      Arc::downgrade(&session),
      channel.subscribe(),
      session.session_id.clone(),
      shutdown,
    );

    session.state.set_init_state(InitState::Ready);
    Ok(session)
  }

  /// Applies a local edit: budget pre-check, local commit, best-effort
  /// broadcast, debounced persistence. A budget rejection returns
  /// [SyncError::CharLimitExceeded] with the content untouched.
  pub fn apply_local_edit(&self, delta: &TextDelta) -> Result<(), SyncError> {
    if !self.state.is_ready() {
      return Err(SyncError::NotReady);
    }

    let updated = {
      let mut content = self.content.write();
      let old_len = content.chars().count();
      let next = delta.apply(&content)?;
      let new_len = next.chars().count();
      self.budget.admit(old_len, new_len)?;
      *content = next.clone();
      next
    };

    let payload = serde_json::to_value(delta)?;
    if let Err(err) = self
      .channel
      .publish(ChannelMessage::new(&self.session_id, payload))
    {
      // Best-effort: peers converge from the next persisted snapshot.
      tracing::warn!("{}: delta broadcast failed: {}", self.key, err);
    }

    self.state.set_sync_state(SyncState::PendingSave);
    if self.pending.send(updated).is_err() {
      tracing::warn!("{}: persistence loop is gone", self.key);
    }
    Ok(())
  }

  fn apply_remote(&self, message: ChannelMessage) {
    let delta: TextDelta = match serde_json::from_value(message.payload) {
      Ok(delta) => delta,
      Err(err) => {
        tracing::warn!("{}: undecodable remote delta: {}", self.key, err);
        return;
      },
    };
    let applied = {
      let mut content = self.content.write();
      match delta.apply(&content) {
        Ok(next) => {
          *content = next;
          true
        },
        Err(err) => {
          tracing::warn!("{}: remote delta does not apply: {}", self.key, err);
          false
        },
      }
    };
    if applied {
      self.budget.shift(delta.char_delta());
    }
  }

  fn spawn_persist_loop(
    store: Arc<dyn DocumentStore>,
    key: DocumentKey,
    state: Arc<SessionState>,
    mut pending: mpsc::UnboundedReceiver<String>,
    shutdown: CancellationToken,
  ) {
    tokio::spawn(async move {
      'outer: loop {
        let mut latest = tokio::select! {
          _ = shutdown.cancelled() => break,
          content = pending.recv() => match content {
            Some(content) => content,
            None => break,
          },
        };
        loop {
          tokio::select! {
            _ = shutdown.cancelled() => break 'outer,
            _ = tokio::time::sleep(DEBOUNCE_INTERVAL) => {
              match store.set_document(&key, &latest).await {
                Ok(()) => state.set_sync_state(SyncState::Synced),
                // The local content stays authoritative; the next edit
                // schedules a fresh write with the latest content.
                Err(err) => tracing::error!("{}: persist failed: {}", key, err),
              }
              continue 'outer;
            },
            content = pending.recv() => match content {
              Some(content) => latest = content,
              None => break 'outer,
            },
          }
        }
      }
    });
  }

  fn spawn_remote_loop(
    session: Weak<EditorSession>,
    mut updates: broadcast::Receiver<ChannelMessage>,
    session_id: String,
    shutdown: CancellationToken,
  ) {
    tokio::spawn(async move {
      loop {
        tokio::select! {
          _ = shutdown.cancelled() => break,
          message = updates.recv() => match message {
            Ok(message) => {
              if message.origin == session_id {
                continue;
              }
              let Some(session) = session.upgrade() else { break };
              session.apply_remote(message);
            },
            Err(broadcast::error::RecvError::Lagged(missed)) => {
              tracing::warn!("editor channel lagged, {} deltas dropped", missed);
            },
            Err(broadcast::error::RecvError::Closed) => break,
          },
        }
      }
    });
  }

  pub fn key(&self) -> &DocumentKey {
    &self.key
  }

  /// The origin stamped on every delta this session publishes.
  pub fn session_id(&self) -> &str {
    &self.session_id
  }

  pub fn content(&self) -> String {
    self.content.read().clone()
  }

  pub fn init_state(&self) -> InitState {
    self.state.init_state()
  }

  pub fn sync_state(&self) -> SyncState {
    self.state.sync_state()
  }

  pub fn subscribe_sync_state(&self) -> watch::Receiver<SyncState> {
    self.state.subscribe_sync_state()
  }

  /// Tears down the remote-apply and persistence loops. A write still inside
  /// its debounce window is dropped, matching the editor's unmount behavior.
  pub fn close(&self) {
    self.shutdown.cancel();
  }
}

impl Drop for EditorSession {
  fn drop(&mut self) {
    self.shutdown.cancel();
  }
}
