use std::collections::HashMap;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use notes_entity::{CollectionSnapshot, FolderInfo, ItemKind, WorkspaceItem};
use notes_store::{DocumentStore, StoreError};

use crate::error::FolderError;

const CHANGE_BUFFER: usize = 100;

/// What the reconciler watches: one folder, or every folder in the
/// workspace, fanned out dynamically as folders appear and disappear.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReconcilerScope {
  AllFolders,
  Folder(String),
}

/// What the grid should render.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GridState {
  /// No folders yet: prompt to create the first one.
  NoFolders,
  /// Folders exist but hold nothing: show the upload affordance.
  NoItems,
  Ready,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReconcilerChange {
  PartitionReplaced { folder_id: String, kind: ItemKind },
  FoldersChanged,
}

/// Merges the per-folder file and note snapshot streams into one
/// render-ready item list.
///
/// Every stream delivers a full snapshot of its `(folder, kind)` partition;
/// merging replaces that partition wholesale, so replays are idempotent and
/// partitions never disturb each other. Subscription handles are owned
/// cancellation tokens in a keyed map; a folder leaving scope cancels its
/// pair and purges its entries.
pub struct FolderReconciler {
  workspace_id: String,
  scope: ReconcilerScope,
  store: Arc<dyn DocumentStore>,
  items: RwLock<Vec<WorkspaceItem>>,
  folder_names: DashMap<String, FolderInfo>,
  known_folders: RwLock<Vec<String>>,
  subscriptions: Mutex<HashMap<(String, ItemKind), CancellationToken>>,
  changes: broadcast::Sender<ReconcilerChange>,
  shutdown: CancellationToken,
}

impl FolderReconciler {
  /// Attaches the subscriptions the scope calls for and waits for their
  /// initial snapshots, so the aggregate list is populated on return.
  pub async fn spawn(
    store: Arc<dyn DocumentStore>,
    workspace_id: impl ToString,
    scope: ReconcilerScope,
  ) -> Result<Arc<Self>, FolderError> {
    let reconciler = Arc::new(Self {
      workspace_id: workspace_id.to_string(),
      scope: scope.clone(),
      store: store.clone(),
      items: RwLock::new(Vec::new()),
      folder_names: DashMap::new(),
      known_folders: RwLock::new(Vec::new()),
      subscriptions: Mutex::new(HashMap::new()),
      changes: broadcast::channel(CHANGE_BUFFER).0,
      shutdown: CancellationToken::new(),
    });
    let weak = Arc::downgrade(&reconciler);

    match &scope {
      ReconcilerScope::Folder(folder_id) => {
        if let Some(folder) = store
          .get_folder(&reconciler.workspace_id, folder_id)
          .await?
        {
          reconciler.folder_names.insert(folder.id.clone(), folder);
        }
        *reconciler.known_folders.write() = vec![folder_id.clone()];
        reconciler.attach_pair(weak, folder_id).await;
      },
      ReconcilerScope::AllFolders => {
        let sub = store.subscribe_folders(&reconciler.workspace_id).await?;
        reconciler.sync_folder_set(weak.clone(), sub.folders).await;
        Self::spawn_folder_loop(weak, sub.updates);
      },
    }
    Ok(reconciler)
  }

  /// Replace-by-partition merge: everything previously held for the
  /// snapshot's `(folder, kind)` goes, the fresh entries come in.
  fn merge(&self, snapshot: CollectionSnapshot) {
    let folder_id = snapshot.folder_id.clone();
    let kind = snapshot.kind;
    {
      let mut items = self.items.write();
      items.retain(|item| item.partition() != (folder_id.as_str(), kind));
      items.extend(snapshot.items);
    }
    let _ = self
      .changes
      .send(ReconcilerChange::PartitionReplaced { folder_id, kind });
  }

  async fn attach_pair(&self, weak: Weak<Self>, folder_id: &str) {
    for kind in [ItemKind::File, ItemKind::Note] {
      self.attach_partition(weak.clone(), folder_id, kind).await;
    }
  }

  async fn attach_partition(&self, weak: Weak<Self>, folder_id: &str, kind: ItemKind) {
    let key = (folder_id.to_string(), kind);
    if self.subscriptions.lock().contains_key(&key) {
      return;
    }
    let sub = match self
      .store
      .subscribe_collection(&self.workspace_id, folder_id, kind)
      .await
    {
      Ok(sub) => sub,
      Err(err) => {
        tracing::error!("{}/{}: subscribe {} failed: {}", self.workspace_id, folder_id, kind, err);
        return;
      },
    };

    let token = self.shutdown.child_token();
    self.subscriptions.lock().insert(key, token.clone());
    self.merge(sub.snapshot);

    let mut updates = sub.updates;
    tokio::spawn(async move {
      loop {
        tokio::select! {
          _ = token.cancelled() => break,
          snapshot = updates.recv() => match snapshot {
            Ok(snapshot) => {
              let Some(reconciler) = weak.upgrade() else { break };
              reconciler.merge(snapshot);
            },
            Err(broadcast::error::RecvError::Lagged(missed)) => {
              // Snapshots are full replacements; the next one supersedes
              // whatever was missed.
              tracing::warn!("collection stream lagged, {} snapshots dropped", missed);
            },
            Err(broadcast::error::RecvError::Closed) => break,
          },
        }
      }
    });
  }

  /// Diffs the desired folder set against the owned subscriptions: cancels
  /// pairs for folders that disappeared (purging their partitions), attaches
  /// pairs for new folders.
  async fn sync_folder_set(&self, weak: Weak<Self>, folders: Vec<FolderInfo>) {
    for folder in &folders {
      self.folder_names.insert(folder.id.clone(), folder.clone());
    }

    let removed: Vec<String> = {
      let subs = self.subscriptions.lock();
      let mut owned: Vec<String> = subs.keys().map(|(folder_id, _)| folder_id.clone()).collect();
      owned.sort();
      owned.dedup();
      owned
        .into_iter()
        .filter(|folder_id| !folders.iter().any(|f| &f.id == folder_id))
        .collect()
    };
    for folder_id in &removed {
      self.detach_pair(folder_id);
      self.folder_names.remove(folder_id);
      let mut items = self.items.write();
      items.retain(|item| &item.folder_id != folder_id);
    }

    *self.known_folders.write() = folders.iter().map(|f| f.id.clone()).collect();
    let _ = self.changes.send(ReconcilerChange::FoldersChanged);

    for folder in &folders {
      self.attach_pair(weak.clone(), &folder.id).await;
    }
  }

  fn detach_pair(&self, folder_id: &str) {
    let mut subs = self.subscriptions.lock();
    for kind in [ItemKind::File, ItemKind::Note] {
      if let Some(token) = subs.remove(&(folder_id.to_string(), kind)) {
        token.cancel();
      }
    }
  }

  fn spawn_folder_loop(weak: Weak<Self>, mut updates: broadcast::Receiver<Vec<FolderInfo>>) {
    tokio::spawn(async move {
      let shutdown = match weak.upgrade() {
        Some(reconciler) => reconciler.shutdown.clone(),
        None => return,
      };
      loop {
        tokio::select! {
          _ = shutdown.cancelled() => break,
          folders = updates.recv() => match folders {
            Ok(folders) => {
              let Some(reconciler) = weak.upgrade() else { break };
              reconciler.sync_folder_set(weak.clone(), folders).await;
            },
            Err(broadcast::error::RecvError::Lagged(missed)) => {
              tracing::warn!("folder stream lagged, {} updates dropped", missed);
            },
            Err(broadcast::error::RecvError::Closed) => break,
          },
        }
      }
    });
  }

  /// The aggregate render-ready list. Never holds two entries with the same
  /// `(kind, folder_id, id)`.
  pub fn items(&self) -> Vec<WorkspaceItem> {
    self.items.read().clone()
  }

  /// Display name for a folder, from the on-demand metadata cache.
  pub fn folder_name(&self, folder_id: &str) -> Option<String> {
    self.folder_names.get(folder_id).map(|f| f.name.clone())
  }

  pub fn grid_state(&self) -> GridState {
    if self.known_folders.read().is_empty() {
      GridState::NoFolders
    } else if self.items.read().is_empty() {
      GridState::NoItems
    } else {
      GridState::Ready
    }
  }

  pub fn scope(&self) -> &ReconcilerScope {
    &self.scope
  }

  pub fn changes(&self) -> broadcast::Receiver<ReconcilerChange> {
    self.changes.subscribe()
  }

  /// Number of live collection subscriptions currently owned.
  pub fn subscription_count(&self) -> usize {
    self.subscriptions.lock().len()
  }

  /// Refreshes one folder's cached metadata from the store.
  pub async fn refresh_folder(&self, folder_id: &str) -> Result<(), FolderError> {
    match self.store.get_folder(&self.workspace_id, folder_id).await? {
      Some(folder) => {
        self.folder_names.insert(folder.id.clone(), folder);
        Ok(())
      },
      None => Err(FolderError::Store(StoreError::RecordNotFound(
        folder_id.to_string(),
      ))),
    }
  }

  /// Cancels every owned subscription.
  pub fn close(&self) {
    self.shutdown.cancel();
    self.subscriptions.lock().clear();
  }
}

impl Drop for FolderReconciler {
  fn drop(&mut self) {
    self.shutdown.cancel();
  }
}
