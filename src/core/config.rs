use std::fs;
use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Indexing pipeline
    pub index_shards: usize,                  // Worker threads, one queue each
    pub index_queue_capacity: usize,          // Bounded queue size per shard
    pub index_batch_size: usize,              // Events drained per wake-up
    pub index_retry_budget: usize,            // Attempts before an event is dropped
    pub parallel_analysis_threshold: usize,   // Upserts per batch before rayon kicks in

    // Record store
    pub store_partitions: usize,

    // Search
    pub query_cache_size: usize,              // 0 disables the cache
    pub default_analyzer: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            index_shards: num_cpus::get().clamp(1, 8),
            index_queue_capacity: 10_000,
            index_batch_size: 256,
            index_retry_budget: 3,
            parallel_analysis_threshold: 64,
            store_partitions: 16,
            query_cache_size: 512,
            default_analyzer: "standard".to_string(),
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("index_shards", self.index_shards),
            ("index_queue_capacity", self.index_queue_capacity),
            ("index_batch_size", self.index_batch_size),
            ("index_retry_budget", self.index_retry_budget),
            ("store_partitions", self.store_partitions),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("config field '{}' must be greater than zero", name),
                ));
            }
        }
        Ok(())
    }
}
