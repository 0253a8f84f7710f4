use std::hash::{Hash, Hasher};

use fxhash::FxHasher;

/// The palette cursors and name labels are drawn from.
const CURSOR_PALETTE: [&str; 10] = [
  "#E57373", "#F06292", "#BA68C8", "#9575CD", "#64B5F6", "#4DB6AC", "#81C784", "#FFD54F",
  "#FF8A65", "#A1887F",
];

/// Deterministic color for a user id. FxHasher is unseeded, so the same user
/// renders the same color in every session.
pub fn cursor_color(user_id: &str) -> String {
  let mut hasher = FxHasher::default();
  user_id.hash(&mut hasher);
  let index = (hasher.finish() % CURSOR_PALETTE.len() as u64) as usize;
  CURSOR_PALETTE[index].to_string()
}
