pub use error::StoreError;
pub use memory::{MemoryStore, MemoryTransport};
pub use store::*;
pub use transport::*;

pub mod error;
mod memory;
mod store;
mod transport;
