pub use budget::{CharBudget, DEFAULT_CHAR_LIMIT};
pub use session::{DEBOUNCE_INTERVAL, EditorSession};
pub use state::{InitState, SessionState, SyncState};

pub mod error;

mod budget;
mod session;
mod state;
