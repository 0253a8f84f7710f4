use serde::{Deserialize, Serialize};

/// A single operation of a [TextDelta]. Offsets and lengths are measured in
/// unicode scalar values, matching the character-budget unit.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOp {
  /// Keep the next `n` characters.
  Retain(usize),
  /// Insert the given text at the current position.
  Insert(String),
  /// Drop the next `n` characters.
  Delete(usize),
}

/// An ordered, composable edit produced by the editor on each local change.
/// Deltas are ephemeral: they update local state and travel to peers over the
/// realtime channel, but only full-content snapshots are ever persisted.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TextDelta {
  pub ops: Vec<DeltaOp>,
}

impl TextDelta {
  pub fn new(ops: Vec<DeltaOp>) -> Self {
    Self { ops }
  }

  /// A delta inserting `text` at character offset `pos`.
  pub fn insert_at(pos: usize, text: impl ToString) -> Self {
    let mut ops = Vec::with_capacity(2);
    if pos > 0 {
      ops.push(DeltaOp::Retain(pos));
    }
    ops.push(DeltaOp::Insert(text.to_string()));
    Self { ops }
  }

  /// A delta deleting `len` characters starting at character offset `pos`.
  pub fn delete_at(pos: usize, len: usize) -> Self {
    let mut ops = Vec::with_capacity(2);
    if pos > 0 {
      ops.push(DeltaOp::Retain(pos));
    }
    ops.push(DeltaOp::Delete(len));
    Self { ops }
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }

  /// Net character change this delta causes when applied.
  pub fn char_delta(&self) -> i64 {
    let mut delta = 0i64;
    for op in &self.ops {
      match op {
        DeltaOp::Retain(_) => {},
        DeltaOp::Insert(text) => delta += text.chars().count() as i64,
        DeltaOp::Delete(n) => delta -= *n as i64,
      }
    }
    delta
  }

  /// Applies this delta to `content`, producing the new content. Characters
  /// past the last operation are retained implicitly. Fails if a retain or
  /// delete runs past the end of the content.
  pub fn apply(&self, content: &str) -> Result<String, DeltaError> {
    let chars: Vec<char> = content.chars().collect();
    let mut out = String::with_capacity(content.len());
    let mut pos = 0usize;
    for op in &self.ops {
      match op {
        DeltaOp::Retain(n) => {
          let end = pos + n;
          if end > chars.len() {
            return Err(DeltaError::OutOfRange {
              pos: end,
              len: chars.len(),
            });
          }
          out.extend(&chars[pos..end]);
          pos = end;
        },
        DeltaOp::Insert(text) => out.push_str(text),
        DeltaOp::Delete(n) => {
          let end = pos + n;
          if end > chars.len() {
            return Err(DeltaError::OutOfRange {
              pos: end,
              len: chars.len(),
            });
          }
          pos = end;
        },
      }
    }
    out.extend(&chars[pos..]);
    Ok(out)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
  #[error("delta reaches position {pos} but content has {len} characters")]
  OutOfRange { pos: usize, len: usize },

  #[error(transparent)]
  SerdeJson(#[from] serde_json::Error),
}
