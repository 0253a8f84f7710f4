use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::timestamp;

/// Identity of a document: the `(workspace, folder, file)` triple that keys
/// both the persisted snapshot and the realtime channel carrying its deltas.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
  pub workspace_id: String,
  pub folder_id: String,
  pub file_id: String,
}

impl DocumentKey {
  pub fn new(
    workspace_id: impl ToString,
    folder_id: impl ToString,
    file_id: impl ToString,
  ) -> Self {
    Self {
      workspace_id: workspace_id.to_string(),
      folder_id: folder_id.to_string(),
      file_id: file_id.to_string(),
    }
  }

  /// The realtime channel carrying this document's deltas is keyed by the
  /// file id alone.
  pub fn channel_id(&self) -> &str {
    &self.file_id
  }
}

impl Display for DocumentKey {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}/{}/{}",
      self.workspace_id, self.folder_id, self.file_id
    )
  }
}

/// A persisted document snapshot. The content is the full serialized markup
/// string; concurrent writers converge by last write wins.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Document {
  pub content: String,
  pub updated_at: i64,
}

impl Document {
  pub fn new(content: impl ToString) -> Self {
    Self {
      content: content.to_string(),
      updated_at: timestamp(),
    }
  }

  /// Character count in unicode scalar values, the unit of the workspace
  /// character budget.
  pub fn char_count(&self) -> usize {
    self.content.chars().count()
  }
}

impl Default for Document {
  fn default() -> Self {
    Self::new("")
  }
}
