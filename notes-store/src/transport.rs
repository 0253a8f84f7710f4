use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;

/// A message published on a realtime channel. The `origin` identifies the
/// publishing session so receivers can drop their own echoes.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelMessage {
  pub origin: String,
  pub payload: Value,
}

impl ChannelMessage {
  pub fn new(origin: impl ToString, payload: Value) -> Self {
    Self {
      origin: origin.to_string(),
      payload,
    }
  }
}

/// A named publish/subscribe channel. Editor deltas travel on channels keyed
/// by file id; delivery is best-effort with no acknowledgement.
pub trait RealtimeChannel: Send + Sync + 'static {
  fn publish(&self, message: ChannelMessage) -> Result<(), StoreError>;
  fn subscribe(&self) -> broadcast::Receiver<ChannelMessage>;
}

/// A change to the member set of a presence space.
#[derive(Clone, Debug, PartialEq)]
pub struct SpaceEvent {
  pub connection_id: String,
  pub payload: SpacePayload,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpacePayload {
  /// A member joined with its profile data.
  Entered(Value),
  /// A member published fresh ephemeral data (cursor position + profile).
  Updated(Value),
  /// A member left the space.
  Left,
}

/// The ephemeral shared-presence primitive: a set of currently-connected
/// members with per-member profile data and cursor broadcast.
#[async_trait]
pub trait PresenceSpace: Send + Sync + 'static {
  async fn enter(&self, connection_id: &str, profile: Value) -> Result<(), StoreError>;
  async fn leave(&self, connection_id: &str) -> Result<(), StoreError>;

  /// Publishes ephemeral member data; fire-and-forget.
  fn publish(&self, connection_id: &str, data: Value) -> Result<(), StoreError>;

  fn subscribe(&self) -> broadcast::Receiver<SpaceEvent>;

  /// Current member roster with the profile each member entered with.
  fn members(&self) -> Vec<(String, Value)>;
}

/// Hands out channels and spaces by name. Channels are keyed by file id for
/// editor deltas; spaces by workspace id for presence.
pub trait RealtimeTransport: Send + Sync + 'static {
  fn channel(&self, channel_id: &str) -> Arc<dyn RealtimeChannel>;
  fn space(&self, space_id: &str) -> Arc<dyn PresenceSpace>;
}
