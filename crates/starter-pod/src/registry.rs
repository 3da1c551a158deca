use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::pod::FuzzerPod;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PodRegistryError {
    #[error("pod '{0}' already exists")]
    PodAlreadyExists(String),
    #[error("pod '{0}' not found")]
    PodNotFound(String),
}

/// `pod_name -> FuzzerPod` inventory plus a per-pool count of pods currently
/// marked displaced, used to tell the run-fuzzer handler whether a
/// displacement is already in flight for a pool.
#[derive(Debug, Default)]
pub struct PodRegistry {
    pods: HashMap<String, FuzzerPod>,
    dsp_pools: HashMap<String, i64>,
}

impl PodRegistry {
    pub fn new() -> Self {
        Self {
            pods: HashMap::new(),
            dsp_pools: HashMap::new(),
        }
    }

    pub fn add_pod(&mut self, pod: FuzzerPod) -> Result<(), PodRegistryError> {
        if self.pods.contains_key(&pod.name) {
            return Err(PodRegistryError::PodAlreadyExists(pod.name));
        }

        if pod.displaced {
            *self.dsp_pools.entry(pod.pool_id().to_string()).or_insert(0) += 1;
        }

        debug!(pod = %pod.name, pool = %pod.pool_id(), "pod added");
        self.pods.insert(pod.name.clone(), pod);
        Ok(())
    }

    pub fn remove_pod(&mut self, pod_name: &str) -> Result<FuzzerPod, PodRegistryError> {
        let pod = self
            .pods
            .remove(pod_name)
            .ok_or_else(|| PodRegistryError::PodNotFound(pod_name.to_string()))?;

        if pod.displaced {
            *self.dsp_pools.entry(pod.pool_id().to_string()).or_insert(0) -= 1;
        }

        debug!(pod = %pod_name, "pod removed");
        Ok(pod)
    }

    pub fn find_pod(&self, pod_name: &str) -> Result<&FuzzerPod, PodRegistryError> {
        self.pods
            .get(pod_name)
            .ok_or_else(|| PodRegistryError::PodNotFound(pod_name.to_string()))
    }

    pub fn find_pod_mut(&mut self, pod_name: &str) -> Result<&mut FuzzerPod, PodRegistryError> {
        self.pods
            .get_mut(pod_name)
            .ok_or_else(|| PodRegistryError::PodNotFound(pod_name.to_string()))
    }

    pub fn displace_pod(&mut self, pod_name: &str) -> Result<(), PodRegistryError> {
        let pool_id = self.find_pod(pod_name)?.pool_id().to_string();
        let pod = self.find_pod_mut(pod_name)?;
        pod.displaced = true;
        *self.dsp_pools.entry(pool_id).or_insert(0) += 1;
        Ok(())
    }

    pub fn list_pods(&self) -> impl Iterator<Item = &FuzzerPod> {
        self.pods.values()
    }

    pub fn has_pod(&self, pod_name: &str) -> bool {
        self.pods.contains_key(pod_name)
    }

    pub fn displacement_in_progress(&self, pool_id: &str) -> bool {
        self.dsp_pools.get(pool_id).copied().unwrap_or(0) > 0
    }
}
