//! Shard management module
//!
//! The manager owner task and the Twilight fleet it swaps on restart.

mod fleet;
mod manager;

pub use fleet::TwilightLauncher;
pub use manager::{ManagerHandle, ManagerState, ManagerStatus, ShardManager};

#[cfg(test)]
pub(crate) use manager::testing;
