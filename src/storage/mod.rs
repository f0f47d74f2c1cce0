pub mod handle;
pub mod tracker;

pub use handle::PersistentHandle;
pub use tracker::{ChangeTracker, SetDecision};
