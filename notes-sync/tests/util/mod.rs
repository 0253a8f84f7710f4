use std::sync::{Arc, Once};

use notes_entity::DocumentKey;
use notes_store::{MemoryStore, MemoryTransport};
use notes_sync::{CharBudget, DEFAULT_CHAR_LIMIT, EditorSession};

pub struct SessionTest {
  pub store: Arc<MemoryStore>,
  pub transport: MemoryTransport,
  pub budget: Arc<CharBudget>,
  pub key: DocumentKey,
}

impl SessionTest {
  pub fn new() -> Self {
    Self::with_limit(DEFAULT_CHAR_LIMIT)
  }

  pub fn with_limit(limit: usize) -> Self {
    setup_log();
    Self {
      store: Arc::new(MemoryStore::new()),
      transport: MemoryTransport::new(),
      budget: Arc::new(CharBudget::new(limit)),
      key: DocumentKey::new("ws-1", "folder-1", "note-1"),
    }
  }

  pub async fn open_session(&self) -> Arc<EditorSession> {
    EditorSession::open(
      self.store.clone(),
      &self.transport,
      self.key.clone(),
      self.budget.clone(),
    )
    .await
    .unwrap()
  }
}

pub fn setup_log() {
  static START: Once = Once::new();
  START.call_once(|| {
    unsafe { std::env::set_var("RUST_LOG", "notes_sync=trace") };
    let subscriber = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_ansi(true)
      .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
  });
}
