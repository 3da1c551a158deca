use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, error, warn};

/// One orchestrator node backing a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolNode {
    pub name: String,
    pub cpu_m: i64,
    pub ram_mi: i64,
}

/// Admission/accounting errors raised by [`ResourcePool`] mutations.
///
/// `PoolLocked`/`PoolCapacityExceeded`/`PoolNoResourcesLeft`/`PoolOverflow`
/// are admission-path errors the caller is expected to handle (mapped to
/// HTTP status codes upstream). `PoolUnderflow`, `NodeAlreadyExists`, and
/// `NodeNotFound` indicate an accounting bug and are logged loudly by the
/// caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool is locked")]
    PoolLocked,
    #[error("requested resources exceed pool capacity: cpu={cpu_req}m/{cpu_limit}m ram={ram_req}Mi/{ram_limit}Mi")]
    PoolCapacityExceeded {
        cpu_req: i64,
        ram_req: i64,
        cpu_limit: i64,
        ram_limit: i64,
    },
    #[error("pool overflowed: cpu={cpu_used}m/{cpu_limit}m ram={ram_used}Mi/{ram_limit}Mi")]
    PoolOverflow {
        cpu_used: i64,
        ram_used: i64,
        cpu_limit: i64,
        ram_limit: i64,
    },
    #[error("no resources left: cpu_req={cpu_req}m cpu_left={cpu_left}m ram_req={ram_req}Mi ram_left={ram_left}Mi")]
    PoolNoResourcesLeft {
        cpu_req: i64,
        ram_req: i64,
        cpu_left: i64,
        ram_left: i64,
    },
    #[error("pool underflow: cpu {cpu_used}m -> {cpu_used_after}m, ram {ram_used}Mi -> {ram_used_after}Mi")]
    PoolUnderflow {
        cpu_used: i64,
        ram_used: i64,
        cpu_used_after: i64,
        ram_used_after: i64,
    },
    #[error("node '{0}' already exists")]
    NodeAlreadyExists(String),
    #[error("node '{0}' not found")]
    NodeNotFound(String),
}

/// One resource pool: its node inventory, lock state, and CPU/RAM
/// used/limit counters.
///
/// Invariants, re-checked on every mutation:
/// - `cpu_used >= 0` and `ram_used >= 0` (underflow is an error, never a
///   silent clamp).
/// - `cpu_limit == sum(nodes.cpu_m)` and `ram_limit == sum(nodes.ram_mi)`.
/// - `allocate` only commits when `!locked && req <= limit && used <= limit
///   && used + req <= limit`, each failure case raising a distinct error.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    id: String,
    nodes: HashMap<String, PoolNode>,
    cpu_limit: i64,
    ram_limit: i64,
    cpu_used: i64,
    ram_used: i64,
    locked: bool,
}

impl ResourcePool {
    pub fn new(id: impl Into<String>, locked: bool) -> Self {
        Self {
            id: id.into(),
            nodes: HashMap::new(),
            cpu_limit: 0,
            ram_limit: 0,
            cpu_used: 0,
            ram_used: 0,
            locked,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cpu_used(&self) -> i64 {
        self.cpu_used
    }

    pub fn ram_used(&self) -> i64 {
        self.ram_used
    }

    pub fn cpu_limit(&self) -> i64 {
        self.cpu_limit
    }

    pub fn ram_limit(&self) -> i64 {
        self.ram_limit
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PoolNode> {
        self.nodes.values()
    }

    pub fn resources_left(&self) -> (i64, i64) {
        (self.cpu_limit - self.cpu_used, self.ram_limit - self.ram_used)
    }

    pub fn add_node(&mut self, name: impl Into<String>, cpu_m: i64, ram_mi: i64) -> Result<(), PoolError> {
        assert!(cpu_m > 0, "cpu must be greater than zero");
        assert!(ram_mi > 0, "ram must be greater than zero");

        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(PoolError::NodeAlreadyExists(name));
        }

        self.cpu_limit += cpu_m;
        self.ram_limit += ram_mi;
        debug!(pool = %self.id, node = %name, cpu_m, ram_mi, "node added");
        self.nodes.insert(name.clone(), PoolNode { name, cpu_m, ram_mi });
        Ok(())
    }

    pub fn remove_node(&mut self, name: &str) -> Result<(), PoolError> {
        let node = self
            .nodes
            .remove(name)
            .ok_or_else(|| PoolError::NodeNotFound(name.to_string()))?;

        self.cpu_limit -= node.cpu_m;
        self.ram_limit -= node.ram_mi;
        debug_assert!(self.cpu_limit >= 0);
        debug_assert!(self.ram_limit >= 0);
        debug!(pool = %self.id, node = %name, "node removed");
        Ok(())
    }

    /// Checked in order: locked, then "cannot ever fit", then "pool shrank
    /// below current usage", then "cannot fit right now". Distinguishing
    /// the last two from "cannot ever fit" is what lets the run-fuzzer
    /// handler decide whether displacement can help.
    pub fn allocate(&mut self, cpu_req: i64, ram_req: i64) -> Result<(), PoolError> {
        if self.locked {
            return Err(PoolError::PoolLocked);
        }

        if cpu_req > self.cpu_limit || ram_req > self.ram_limit {
            warn!(pool = %self.id, cpu_req, ram_req, cpu_limit = self.cpu_limit, ram_limit = self.ram_limit, "capacity exceeded");
            return Err(PoolError::PoolCapacityExceeded {
                cpu_req,
                ram_req,
                cpu_limit: self.cpu_limit,
                ram_limit: self.ram_limit,
            });
        }

        if self.cpu_used > self.cpu_limit || self.ram_used > self.ram_limit {
            warn!(pool = %self.id, "pool overflowed");
            return Err(PoolError::PoolOverflow {
                cpu_used: self.cpu_used,
                ram_used: self.ram_used,
                cpu_limit: self.cpu_limit,
                ram_limit: self.ram_limit,
            });
        }

        if self.cpu_used + cpu_req > self.cpu_limit || self.ram_used + ram_req > self.ram_limit {
            let (cpu_left, ram_left) = self.resources_left();
            debug!(pool = %self.id, cpu_req, ram_req, cpu_left, ram_left, "no resources left");
            return Err(PoolError::PoolNoResourcesLeft {
                cpu_req,
                ram_req,
                cpu_left,
                ram_left,
            });
        }

        self.cpu_used += cpu_req;
        self.ram_used += ram_req;
        debug!(pool = %self.id, cpu_used = self.cpu_used, ram_used = self.ram_used, "resources allocated");
        Ok(())
    }

    pub fn free(&mut self, cpu_req: i64, ram_req: i64) -> Result<(), PoolError> {
        let cpu_used_after = self.cpu_used - cpu_req;
        let ram_used_after = self.ram_used - ram_req;

        if cpu_used_after < 0 || ram_used_after < 0 {
            error!(pool = %self.id, cpu_used_after, ram_used_after, "pool underflow");
            return Err(PoolError::PoolUnderflow {
                cpu_used: self.cpu_used,
                ram_used: self.ram_used,
                cpu_used_after,
                ram_used_after,
            });
        }

        self.cpu_used = cpu_used_after;
        self.ram_used = ram_used_after;
        debug!(pool = %self.id, cpu_used = self.cpu_used, ram_used = self.ram_used, "resources freed");
        Ok(())
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }
}
