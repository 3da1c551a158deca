use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::pool::{PoolError, ResourcePool};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolRegistryError {
    #[error("pool '{0}' not found")]
    PoolNotFound(String),
    #[error("pool '{0}' already exists")]
    PoolAlreadyExists(String),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Thin dispatcher over `pool_id -> ResourcePool`. All pool mutation in the
/// starter goes through here so that a missing pool is always surfaced as
/// [`PoolRegistryError::PoolNotFound`] rather than a panic.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: HashMap<String, ResourcePool>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self { pools: HashMap::new() }
    }

    pub fn create_pool(&mut self, pool_id: impl Into<String>, locked: bool) -> Result<(), PoolRegistryError> {
        let pool_id = pool_id.into();
        if self.pools.contains_key(&pool_id) {
            return Err(PoolRegistryError::PoolAlreadyExists(pool_id));
        }
        debug!(pool = %pool_id, locked, "pool created");
        self.pools.insert(pool_id.clone(), ResourcePool::new(pool_id, locked));
        Ok(())
    }

    pub fn remove_pool(&mut self, pool_id: &str) -> Result<(), PoolRegistryError> {
        self.pools
            .remove(pool_id)
            .map(|_| ())
            .ok_or_else(|| PoolRegistryError::PoolNotFound(pool_id.to_string()))
    }

    pub fn find_pool(&self, pool_id: &str) -> Result<&ResourcePool, PoolRegistryError> {
        self.pools
            .get(pool_id)
            .ok_or_else(|| PoolRegistryError::PoolNotFound(pool_id.to_string()))
    }

    fn find_pool_mut(&mut self, pool_id: &str) -> Result<&mut ResourcePool, PoolRegistryError> {
        self.pools
            .get_mut(pool_id)
            .ok_or_else(|| PoolRegistryError::PoolNotFound(pool_id.to_string()))
    }

    pub fn lock_pool(&mut self, pool_id: &str) -> Result<(), PoolRegistryError> {
        self.find_pool_mut(pool_id)?.lock();
        Ok(())
    }

    pub fn unlock_pool(&mut self, pool_id: &str) -> Result<(), PoolRegistryError> {
        self.find_pool_mut(pool_id)?.unlock();
        Ok(())
    }

    pub fn add_node(&mut self, pool_id: &str, name: impl Into<String>, cpu_m: i64, ram_mi: i64) -> Result<(), PoolRegistryError> {
        self.find_pool_mut(pool_id)?.add_node(name, cpu_m, ram_mi)?;
        Ok(())
    }

    pub fn remove_node(&mut self, pool_id: &str, name: &str) -> Result<(), PoolRegistryError> {
        self.find_pool_mut(pool_id)?.remove_node(name)?;
        Ok(())
    }

    pub fn allocate(&mut self, pool_id: &str, cpu: i64, ram: i64) -> Result<(), PoolRegistryError> {
        self.find_pool_mut(pool_id)?.allocate(cpu, ram)?;
        Ok(())
    }

    pub fn free(&mut self, pool_id: &str, cpu: i64, ram: i64) -> Result<(), PoolRegistryError> {
        self.find_pool_mut(pool_id)?.free(cpu, ram)?;
        Ok(())
    }

    pub fn resources_left(&self, pool_id: &str) -> Result<(i64, i64), PoolRegistryError> {
        Ok(self.find_pool(pool_id)?.resources_left())
    }

    pub fn has_pool(&self, pool_id: &str) -> bool {
        self.pools.contains_key(pool_id)
    }

    pub fn list_pools(&self) -> impl Iterator<Item = &ResourcePool> {
        self.pools.values()
    }
}
