use serde::{Deserialize, Serialize};

/// Identity a client presents when joining a presence space.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Participant {
  pub user_id: String,
  pub name: String,
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avatar_url: Option<String>,
}

impl Participant {
  pub fn new(user_id: impl ToString, name: impl ToString, email: impl ToString) -> Self {
    Self {
      user_id: user_id.to_string(),
      name: name.to_string(),
      email: email.to_string(),
      avatar_url: None,
    }
  }

  pub fn with_avatar(mut self, avatar_url: impl ToString) -> Self {
    self.avatar_url = Some(avatar_url.to_string());
    self
  }
}

/// Ephemeral pointer position broadcast to the presence space, in viewport
/// coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
  pub x: f64,
  pub y: f64,
}

impl CursorPosition {
  pub fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }
}
