//! Price synchronization pass.

mod reconciler;
mod summary;

pub use reconciler::{Reconciler, SyncOptions};
pub use summary::SyncSummary;
