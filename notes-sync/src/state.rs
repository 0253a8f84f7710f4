use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::watch;

/// Lifecycle of an [crate::EditorSession]. Edits are only accepted once the
/// persisted snapshot has been applied, so the programmatic seed load never
/// triggers a spurious persistence cycle.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InitState {
  /// The session exists but has not started loading its snapshot.
  Uninitialized = InitState::UNINITIALIZED,
  /// The persisted snapshot fetch is in flight.
  Loading = InitState::LOADING,
  /// The snapshot is applied; local edits are accepted.
  Ready = InitState::READY,
}

impl InitState {
  const UNINITIALIZED: u32 = 0;
  const LOADING: u32 = 1;
  const READY: u32 = 2;

  #[inline]
  pub fn is_ready(&self) -> bool {
    *self == InitState::Ready
  }
}

impl TryFrom<u32> for InitState {
  type Error = u32;

  fn try_from(value: u32) -> Result<Self, Self::Error> {
    match value {
      Self::UNINITIALIZED => Ok(Self::Uninitialized),
      Self::LOADING => Ok(Self::Loading),
      Self::READY => Ok(Self::Ready),
      unknown => Err(unknown),
    }
  }
}

/// Whether the local editor content has converged with the persisted
/// snapshot. [SyncState::PendingSave] from the first unsaved edit until the
/// debounced write lands.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SyncState {
  Synced = SyncState::SYNCED,
  PendingSave = SyncState::PENDING_SAVE,
}

impl SyncState {
  const SYNCED: u32 = 0;
  const PENDING_SAVE: u32 = 1;

  #[inline]
  pub fn is_synced(&self) -> bool {
    *self == SyncState::Synced
  }
}

impl TryFrom<u32> for SyncState {
  type Error = u32;

  fn try_from(value: u32) -> Result<Self, Self::Error> {
    match value {
      Self::SYNCED => Ok(Self::Synced),
      Self::PENDING_SAVE => Ok(Self::PendingSave),
      unknown => Err(unknown),
    }
  }
}

pub struct SessionState {
  document: String,
  init_state: AtomicU32,
  sync_state: AtomicU32,
  pub(crate) sync_state_notifier: Arc<watch::Sender<SyncState>>,
}

impl SessionState {
  pub fn new(document: &str) -> Self {
    let (sync_state_notifier, _) = watch::channel(SyncState::Synced);
    Self {
      document: document.to_string(),
      init_state: AtomicU32::new(InitState::Uninitialized as u32),
      sync_state: AtomicU32::new(SyncState::Synced as u32),
      sync_state_notifier: Arc::new(sync_state_notifier),
    }
  }

  pub fn init_state(&self) -> InitState {
    InitState::try_from(self.init_state.load(Ordering::Acquire)).unwrap()
  }

  pub fn is_ready(&self) -> bool {
    self.init_state().is_ready()
  }

  pub fn sync_state(&self) -> SyncState {
    SyncState::try_from(self.sync_state.load(Ordering::Acquire)).unwrap()
  }

  pub fn set_init_state(&self, state: InitState) {
    let old_state =
      InitState::try_from(self.init_state.swap(state as u32, Ordering::AcqRel)).unwrap();
    if old_state != state {
      tracing::debug!("{} init state {:?} => {:?}", self.document, old_state, state);
    }
  }

  pub fn set_sync_state(&self, new_state: SyncState) {
    let old_state =
      SyncState::try_from(self.sync_state.swap(new_state as u32, Ordering::AcqRel)).unwrap();
    if old_state != new_state {
      tracing::debug!(
        "{} sync state {:?} => {:?}",
        self.document,
        old_state,
        new_state
      );
      let _ = self.sync_state_notifier.send(new_state);
    }
  }

  pub fn subscribe_sync_state(&self) -> watch::Receiver<SyncState> {
    self.sync_state_notifier.subscribe()
  }
}
