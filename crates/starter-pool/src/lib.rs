//! In-memory pool node inventory and CPU/RAM resource accounting.
//!
//! A [`ResourcePool`] tracks the nodes backing one orchestrator pool and the
//! CPU/RAM currently reserved against them. [`PoolRegistry`] is a thin
//! `pool_id -> ResourcePool` dispatcher used by every other subsystem that
//! needs to allocate, free, lock, or reshape pool capacity.

mod pool;
mod registry;

pub use pool::{PoolError, PoolNode, ResourcePool};
pub use registry::{PoolRegistry, PoolRegistryError};
