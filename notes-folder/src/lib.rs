pub use reconciler::{FolderReconciler, GridState, ReconcilerChange, ReconcilerScope};

pub mod error;

mod reconciler;
