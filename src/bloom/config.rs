use super::strategy::OffsetScheme;
use super::{BloomError, BloomResult};
use crate::hash::{HashFunction, optimal_num_bits, optimal_num_hashes};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Hash function cap for filters over an in-process store
pub const DEFAULT_MAX_HASH_FUNCTIONS: usize = 100;
/// Hash function cap for filters over a remote store, where every offset
/// costs a round trip or a pipelined command
pub const DEFAULT_REMOTE_MAX_HASH_FUNCTIONS: usize = 10;

#[derive(Clone, Debug, Builder)]
#[builder(pattern = "owned")]
pub struct BloomFilterConfig {
    /// Expected number of insertions
    #[builder(default = "1")]
    pub capacity: usize,

    /// Target false positive rate (0.0 to 1.0)
    #[builder(default = "0.0000001")]
    pub false_positive_rate: f64,

    /// Upper bound on the number of hash functions. When unset the facade
    /// picks a default for its store.
    #[builder(default = "None", setter(strip_option))]
    pub max_hash_functions: Option<usize>,

    /// Digest function to derive offsets from
    #[builder(default)]
    pub hash_function: HashFunction,

    /// How offsets are derived from digests
    #[builder(default)]
    pub scheme: OffsetScheme,
}

impl Default for BloomFilterConfig {
    fn default() -> Self {
        Self {
            capacity: 1,
            false_positive_rate: 0.0000001,
            max_hash_functions: None,
            hash_function: HashFunction::default(),
            scheme: OffsetScheme::default(),
        }
    }
}

impl BloomFilterConfig {
    pub fn validate(&self) -> BloomResult<()> {
        if self.capacity == 0 {
            return Err(BloomError::InvalidConfig(
                "Capacity must be > 0".into(),
            ));
        }
        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0) {
            return Err(BloomError::InvalidConfig(format!(
                "FPR must be between 0 and 1, got {}",
                self.false_positive_rate
            )));
        }
        if self.max_hash_functions == Some(0) {
            return Err(BloomError::InvalidConfig(
                "Max hash functions must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Sizing for this config, using `default_max` when no cap is set.
    pub fn evaluate(&self, default_max: usize) -> BloomParams {
        BloomParams::evaluate(
            self.capacity,
            self.false_positive_rate,
            self.max_hash_functions.unwrap_or(default_max),
        )
    }
}

/// Derived parameters of a filter.
///
/// A dumped bit buffer carries no header, so these must be kept alongside it
/// to reinterpret the bits later.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloomParams {
    pub capacity: usize,
    pub false_positive_rate: f64,
    pub bit_size: usize,
    pub num_hashes: usize,
}

impl BloomParams {
    pub fn evaluate(
        capacity: usize,
        false_positive_rate: f64,
        max_hash_functions: usize,
    ) -> Self {
        let bit_size = optimal_num_bits(capacity, false_positive_rate);
        let num_hashes = max_hash_functions
            .min(optimal_num_hashes(capacity, bit_size));

        Self {
            capacity,
            false_positive_rate,
            bit_size,
            num_hashes,
        }
    }

    /// Rejects params no filter could have been built with, e.g. when read
    /// back from an edited sidecar. The bit size is checked by the store.
    pub fn validate(&self) -> BloomResult<()> {
        if self.capacity == 0 {
            return Err(BloomError::InvalidConfig(
                "Capacity must be > 0".into(),
            ));
        }
        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0) {
            return Err(BloomError::InvalidConfig(format!(
                "FPR must be between 0 and 1, got {}",
                self.false_positive_rate
            )));
        }
        if self.num_hashes == 0 {
            return Err(BloomError::InvalidConfig(
                "Number of hash functions must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Length in bytes of the backing buffer
    pub fn byte_len(&self) -> usize {
        self.bit_size.div_ceil(8)
    }
}

/// Out-of-band description of a dumped filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSnapshot {
    pub params: BloomParams,
    pub hash_function: HashFunction,
    pub scheme: OffsetScheme,
}

impl FilterSnapshot {
    pub fn to_json(&self) -> BloomResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> BloomResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
