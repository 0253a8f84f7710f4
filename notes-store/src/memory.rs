use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use notes_entity::{
  CollectionSnapshot, Document, DocumentKey, FolderInfo, ItemKind, WorkspaceItem, timestamp,
};

use crate::error::StoreError;
use crate::store::{BlobStore, CollectionSubscription, DocumentStore, FolderSubscription};
use crate::transport::{
  ChannelMessage, PresenceSpace, RealtimeChannel, RealtimeTransport, SpaceEvent, SpacePayload,
};

const EVENT_BUFFER: usize = 100;

type PartitionKey = (String, String, ItemKind);

/// In-memory reference implementation of [DocumentStore] and [BlobStore].
/// Mirrors the managed backend's listener semantics: every mutation of a
/// `(folder, kind)` collection pushes a full fresh snapshot of that
/// collection to its subscribers.
#[derive(Default)]
pub struct MemoryStore {
  documents: DashMap<DocumentKey, Document>,
  folders: DashMap<String, Vec<FolderInfo>>,
  items: DashMap<PartitionKey, Vec<WorkspaceItem>>,
  partition_senders: DashMap<PartitionKey, broadcast::Sender<CollectionSnapshot>>,
  folder_senders: DashMap<String, broadcast::Sender<Vec<FolderInfo>>>,
  blobs: DashMap<String, Vec<u8>>,
  write_history: Mutex<Vec<(DocumentKey, String)>>,
  failing_writes: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes the next `n` calls to [DocumentStore::set_document] fail, for
  /// exercising the self-healing write path.
  pub fn fail_next_writes(&self, n: usize) {
    self.failing_writes.store(n, Ordering::Release);
  }

  /// Every successful `set_document` call in order, with the content written.
  pub fn write_history(&self) -> Vec<(DocumentKey, String)> {
    self.write_history.lock().clone()
  }

  fn partition_key(&self, workspace_id: &str, folder_id: &str, kind: ItemKind) -> PartitionKey {
    (workspace_id.to_string(), folder_id.to_string(), kind)
  }

  fn build_snapshot(&self, workspace_id: &str, folder_id: &str, kind: ItemKind) -> CollectionSnapshot {
    let key = self.partition_key(workspace_id, folder_id, kind);
    CollectionSnapshot {
      workspace_id: workspace_id.to_string(),
      folder_id: folder_id.to_string(),
      kind,
      items: self.items.get(&key).map(|v| v.clone()).unwrap_or_default(),
    }
  }

  fn emit_partition(&self, workspace_id: &str, folder_id: &str, kind: ItemKind) {
    let key = self.partition_key(workspace_id, folder_id, kind);
    if let Some(tx) = self.partition_senders.get(&key) {
      let _ = tx.send(self.build_snapshot(workspace_id, folder_id, kind));
    }
  }

  fn emit_folders(&self, workspace_id: &str) {
    if let Some(tx) = self.folder_senders.get(workspace_id) {
      let folders = self
        .folders
        .get(workspace_id)
        .map(|v| v.clone())
        .unwrap_or_default();
      let _ = tx.send(folders);
    }
  }

  fn blob_url(workspace_id: &str, folder_id: &str, filename: &str) -> String {
    format!("mem://{}/{}/{}", workspace_id, folder_id, filename)
  }
}

#[async_trait]
impl DocumentStore for MemoryStore {
  async fn get_document(&self, key: &DocumentKey) -> Result<Option<Document>, StoreError> {
    Ok(self.documents.get(key).map(|d| d.clone()))
  }

  async fn set_document(&self, key: &DocumentKey, content: &str) -> Result<(), StoreError> {
    let failing = self.failing_writes.load(Ordering::Acquire);
    if failing > 0 {
      self.failing_writes.store(failing - 1, Ordering::Release);
      return Err(StoreError::Backend("injected write failure".to_string()));
    }

    match self.documents.entry(key.clone()) {
      dashmap::mapref::entry::Entry::Occupied(mut e) => {
        let doc = e.get_mut();
        doc.content = content.to_string();
        doc.updated_at = timestamp();
      },
      dashmap::mapref::entry::Entry::Vacant(e) => {
        e.insert(Document::new(content));
      },
    }

    // A note's content lives on its collection record too, so collection
    // subscribers observe the write.
    let partition = self.partition_key(&key.workspace_id, &key.folder_id, ItemKind::Note);
    let mut emitted = false;
    if let Some(mut items) = self.items.get_mut(&partition) {
      if let Some(item) = items.iter_mut().find(|item| item.id == key.file_id) {
        item.content = Some(content.to_string());
        item.updated_at = timestamp();
        emitted = true;
      }
    }
    if emitted {
      self.emit_partition(&key.workspace_id, &key.folder_id, ItemKind::Note);
    }

    self
      .write_history
      .lock()
      .push((key.clone(), content.to_string()));
    Ok(())
  }

  async fn list_folders(&self, workspace_id: &str) -> Result<Vec<FolderInfo>, StoreError> {
    Ok(
      self
        .folders
        .get(workspace_id)
        .map(|v| v.clone())
        .unwrap_or_default(),
    )
  }

  async fn get_folder(
    &self,
    workspace_id: &str,
    folder_id: &str,
  ) -> Result<Option<FolderInfo>, StoreError> {
    Ok(self.folders.get(workspace_id).and_then(|folders| {
      folders
        .iter()
        .find(|folder| folder.id == folder_id)
        .cloned()
    }))
  }

  async fn create_folder(
    &self,
    workspace_id: &str,
    folder: FolderInfo,
  ) -> Result<(), StoreError> {
    {
      let mut folders = self.folders.entry(workspace_id.to_string()).or_default();
      if folders.iter().any(|f| f.id == folder.id) {
        return Err(StoreError::RecordAlreadyExists(folder.id));
      }
      folders.push(folder);
    }
    self.emit_folders(workspace_id);
    Ok(())
  }

  async fn rename_folder(
    &self,
    workspace_id: &str,
    folder_id: &str,
    name: &str,
  ) -> Result<(), StoreError> {
    {
      let mut folders = self
        .folders
        .get_mut(workspace_id)
        .ok_or_else(|| StoreError::RecordNotFound(workspace_id.to_string()))?;
      let folder = folders
        .iter_mut()
        .find(|f| f.id == folder_id)
        .ok_or_else(|| StoreError::RecordNotFound(folder_id.to_string()))?;
      folder.name = name.to_string();
    }
    self.emit_folders(workspace_id);
    Ok(())
  }

  async fn delete_folder(&self, workspace_id: &str, folder_id: &str) -> Result<(), StoreError> {
    let existed = {
      let mut folders = self
        .folders
        .get_mut(workspace_id)
        .ok_or_else(|| StoreError::RecordNotFound(workspace_id.to_string()))?;
      let before = folders.len();
      folders.retain(|f| f.id != folder_id);
      folders.len() != before
    };
    if !existed {
      return Err(StoreError::RecordNotFound(folder_id.to_string()));
    }

    // Cascade: drop every item of the folder, the blobs behind its files and
    // the documents behind its notes.
    tracing::debug!("{}: deleting folder {} and its contents", workspace_id, folder_id);
    for kind in [ItemKind::File, ItemKind::Note] {
      let key = self.partition_key(workspace_id, folder_id, kind);
      if let Some((_, items)) = self.items.remove(&key) {
        for item in items {
          if let Some(url) = &item.blob_url {
            self.blobs.remove(url);
          }
          if item.kind == ItemKind::Note {
            self
              .documents
              .remove(&DocumentKey::new(workspace_id, folder_id, &item.id));
          }
        }
      }
      self.emit_partition(workspace_id, folder_id, kind);
    }
    self.emit_folders(workspace_id);
    Ok(())
  }

  async fn upsert_item(&self, workspace_id: &str, item: WorkspaceItem) -> Result<(), StoreError> {
    let folder_id = item.folder_id.clone();
    let kind = item.kind;
    {
      let key = self.partition_key(workspace_id, &folder_id, kind);
      let mut items = self.items.entry(key).or_default();
      items.retain(|existing| existing.id != item.id);
      items.push(item);
    }
    self.emit_partition(workspace_id, &folder_id, kind);
    Ok(())
  }

  async fn delete_item(
    &self,
    workspace_id: &str,
    folder_id: &str,
    kind: ItemKind,
    id: &str,
  ) -> Result<(), StoreError> {
    let key = self.partition_key(workspace_id, folder_id, kind);
    let removed = {
      let mut items = self
        .items
        .get_mut(&key)
        .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;
      let pos = items
        .iter()
        .position(|item| item.id == id)
        .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;
      items.remove(pos)
    };
    if let Some(url) = &removed.blob_url {
      self.blobs.remove(url);
    }
    if removed.kind == ItemKind::Note {
      self
        .documents
        .remove(&DocumentKey::new(workspace_id, folder_id, id));
    }
    self.emit_partition(workspace_id, folder_id, kind);
    Ok(())
  }

  async fn subscribe_collection(
    &self,
    workspace_id: &str,
    folder_id: &str,
    kind: ItemKind,
  ) -> Result<CollectionSubscription, StoreError> {
    let key = self.partition_key(workspace_id, folder_id, kind);
    let tx = self
      .partition_senders
      .entry(key)
      .or_insert_with(|| broadcast::channel(EVENT_BUFFER).0);
    Ok(CollectionSubscription {
      snapshot: self.build_snapshot(workspace_id, folder_id, kind),
      updates: tx.subscribe(),
    })
  }

  async fn subscribe_folders(&self, workspace_id: &str) -> Result<FolderSubscription, StoreError> {
    let tx = self
      .folder_senders
      .entry(workspace_id.to_string())
      .or_insert_with(|| broadcast::channel(EVENT_BUFFER).0);
    Ok(FolderSubscription {
      folders: self
        .folders
        .get(workspace_id)
        .map(|v| v.clone())
        .unwrap_or_default(),
      updates: tx.subscribe(),
    })
  }
}

#[async_trait]
impl BlobStore for MemoryStore {
  async fn upload_blob(
    &self,
    workspace_id: &str,
    folder_id: &str,
    filename: &str,
    bytes: Vec<u8>,
  ) -> Result<String, StoreError> {
    let url = Self::blob_url(workspace_id, folder_id, filename);
    self.blobs.insert(url.clone(), bytes);
    Ok(url)
  }

  async fn resolve_blob_url(
    &self,
    workspace_id: &str,
    folder_id: &str,
    filename: &str,
  ) -> Result<String, StoreError> {
    let url = Self::blob_url(workspace_id, folder_id, filename);
    if self.blobs.contains_key(&url) {
      Ok(url)
    } else {
      Err(StoreError::BlobNotFound(url))
    }
  }

  async fn delete_blob(&self, url: &str) -> Result<(), StoreError> {
    self.blobs.remove(url);
    Ok(())
  }
}

/// In-memory realtime transport: named broadcast channels plus presence
/// spaces with a member roster.
#[derive(Default)]
pub struct MemoryTransport {
  channels: DashMap<String, Arc<MemoryChannel>>,
  spaces: DashMap<String, Arc<MemorySpace>>,
}

impl MemoryTransport {
  pub fn new() -> Self {
    Self::default()
  }
}

impl RealtimeTransport for MemoryTransport {
  fn channel(&self, channel_id: &str) -> Arc<dyn RealtimeChannel> {
    self
      .channels
      .entry(channel_id.to_string())
      .or_insert_with(|| Arc::new(MemoryChannel::new()))
      .clone()
  }

  fn space(&self, space_id: &str) -> Arc<dyn PresenceSpace> {
    self
      .spaces
      .entry(space_id.to_string())
      .or_insert_with(|| Arc::new(MemorySpace::new()))
      .clone()
  }
}

struct MemoryChannel {
  tx: broadcast::Sender<ChannelMessage>,
}

impl MemoryChannel {
  fn new() -> Self {
    let (tx, _) = broadcast::channel(EVENT_BUFFER);
    Self { tx }
  }
}

impl RealtimeChannel for MemoryChannel {
  fn publish(&self, message: ChannelMessage) -> Result<(), StoreError> {
    // Best-effort: a channel with no subscribers drops the message.
    let _ = self.tx.send(message);
    Ok(())
  }

  fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
    self.tx.subscribe()
  }
}

struct MemorySpace {
  members: DashMap<String, Value>,
  tx: broadcast::Sender<SpaceEvent>,
}

impl MemorySpace {
  fn new() -> Self {
    let (tx, _) = broadcast::channel(EVENT_BUFFER);
    Self {
      members: DashMap::new(),
      tx,
    }
  }
}

#[async_trait]
impl PresenceSpace for MemorySpace {
  async fn enter(&self, connection_id: &str, profile: Value) -> Result<(), StoreError> {
    self.members.insert(connection_id.to_string(), profile.clone());
    let _ = self.tx.send(SpaceEvent {
      connection_id: connection_id.to_string(),
      payload: SpacePayload::Entered(profile),
    });
    Ok(())
  }

  async fn leave(&self, connection_id: &str) -> Result<(), StoreError> {
    if self.members.remove(connection_id).is_some() {
      let _ = self.tx.send(SpaceEvent {
        connection_id: connection_id.to_string(),
        payload: SpacePayload::Left,
      });
    }
    Ok(())
  }

  fn publish(&self, connection_id: &str, data: Value) -> Result<(), StoreError> {
    if !self.members.contains_key(connection_id) {
      return Err(StoreError::Backend(format!(
        "connection {} published before entering the space",
        connection_id
      )));
    }
    let _ = self.tx.send(SpaceEvent {
      connection_id: connection_id.to_string(),
      payload: SpacePayload::Updated(data),
    });
    Ok(())
  }

  fn subscribe(&self) -> broadcast::Receiver<SpaceEvent> {
    self.tx.subscribe()
  }

  fn members(&self) -> Vec<(String, Value)> {
    self
      .members
      .iter()
      .map(|entry| (entry.key().clone(), entry.value().clone()))
      .collect()
  }
}
