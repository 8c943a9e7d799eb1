use capalloc_types::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::OptimizerConfig;
use crate::input::OptimizationInput;
use crate::result::OptimizationResult;

/// Hash reference (hex-encoded SHA256)
pub type HashRef = String;

/// Compute SHA256 hash of data
pub fn compute_hash(data: &[u8]) -> HashRef {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute hash of JSON-serialized data
pub fn compute_json_hash<T: Serialize>(data: &T) -> Result<HashRef> {
    let json = serde_json::to_vec(data)?;
    Ok(compute_hash(&json))
}

/// Fingerprint of one run, for reproducibility checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAudit {
    pub input_hash: HashRef,
    pub config_hash: HashRef,
    pub result_hash: HashRef,
}

impl RunAudit {
    pub fn new(input: &OptimizationInput, config: &OptimizerConfig, result: &OptimizationResult) -> Result<Self> {
        Ok(RunAudit {
            input_hash: compute_json_hash(input)?,
            config_hash: compute_json_hash(config)?,
            result_hash: compute_json_hash(result)?,
        })
    }

    /// Same input and configuration
    pub fn same_run(&self, other: &RunAudit) -> bool {
        self.input_hash == other.input_hash && self.config_hash == other.config_hash
    }
}
