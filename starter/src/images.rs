//! Derives fully-qualified container image references from the configured
//! registry URL.

use crate::config::Config;

pub fn sandbox_image_name(config: &Config, image_id: &str) -> String {
    format!("{}/sandbox/{}", config.registry.url, image_id.to_lowercase())
}

pub fn agent_image_name(config: &Config, fuzzer_engine: &str) -> String {
    format!("{}/agents/{}", config.registry.url, fuzzer_engine.to_lowercase())
}

pub fn test_run_image_name(config: &Config) -> String {
    format!("{}/{}", config.registry.url, config.fuzzer_pod.test_run_image.to_lowercase())
}
