//! TOML node configuration.
//!
//! ```toml
//! [node]
//! validator_id = 0
//! key_type = "ed25519"
//! key_seed = "0101010101010101010101010101010101010101010101010101010101010101"
//!
//! [consensus]
//! request_timeout_ms = 10000
//! round_change_backoff_ms = 1000
//! max_round_change_timeout_ms = 120000
//! max_backlog_per_sender = 64
//! proposer_policy = "round_robin"
//!
//! [[validators]]
//! id = 0
//! public_key = "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c"
//! ```

use ibft_bft::BftConfig;
use ibft_types::{
    KeyError, KeyPair, KeyType, ProposerPolicy, PublicKey, UnknownPolicy, ValidatorId,
    ValidatorInfo, ValidatorSet,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Policy(#[from] UnknownPolicy),

    #[error("Invalid key for {field}: {reason}")]
    InvalidKey { field: String, reason: String },

    #[error("Validator set is empty")]
    EmptyValidatorSet,

    #[error("Validator {0} appears more than once")]
    DuplicateValidator(ValidatorId),

    #[error("Local validator {0} is not in the validator set")]
    NotAValidator(ValidatorId),

    #[error("Signing key does not match the public key listed for {0}")]
    KeyMismatch(ValidatorId),
}

/// Top-level node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,

    #[serde(default)]
    pub consensus: ConsensusSection,

    #[serde(default)]
    pub validators: Vec<ValidatorEntry>,
}

/// Node identity.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    pub validator_id: u64,

    #[serde(default = "default_key_type")]
    pub key_type: String,

    /// Hex-encoded 32-byte seed the signing key is derived from.
    pub key_seed: String,
}

fn default_key_type() -> String {
    "ed25519".to_string()
}

/// Consensus timing and limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusSection {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_round_change_backoff_ms")]
    pub round_change_backoff_ms: u64,

    #[serde(default = "default_max_round_change_timeout_ms")]
    pub max_round_change_timeout_ms: u64,

    #[serde(default = "default_max_backlog_per_sender")]
    pub max_backlog_per_sender: usize,

    #[serde(default = "default_proposer_policy")]
    pub proposer_policy: String,
}

impl Default for ConsensusSection {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            round_change_backoff_ms: default_round_change_backoff_ms(),
            max_round_change_timeout_ms: default_max_round_change_timeout_ms(),
            max_backlog_per_sender: default_max_backlog_per_sender(),
            proposer_policy: default_proposer_policy(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_round_change_backoff_ms() -> u64 {
    1_000
}

fn default_max_round_change_timeout_ms() -> u64 {
    120_000
}

fn default_max_backlog_per_sender() -> usize {
    64
}

fn default_proposer_policy() -> String {
    "round_robin".to_string()
}

/// One committee member.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorEntry {
    pub id: u64,
    /// Hex-encoded public key, of the node's key type.
    pub public_key: String,
}

impl NodeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validator_id(&self) -> ValidatorId {
        ValidatorId(self.node.validator_id)
    }

    pub fn key_type(&self) -> Result<KeyType, ConfigError> {
        Ok(self.node.key_type.parse()?)
    }

    pub fn bft_config(&self) -> BftConfig {
        let c = &self.consensus;
        BftConfig::new()
            .with_request_timeout(Duration::from_millis(c.request_timeout_ms))
            .with_round_change_backoff(Duration::from_millis(c.round_change_backoff_ms))
            .with_max_round_change_timeout(Duration::from_millis(c.max_round_change_timeout_ms))
            .with_max_backlog_per_sender(c.max_backlog_per_sender)
    }

    pub fn signing_key(&self) -> Result<KeyPair, ConfigError> {
        let bytes = hex::decode(&self.node.key_seed).map_err(|e| ConfigError::InvalidKey {
            field: "node.key_seed".to_string(),
            reason: e.to_string(),
        })?;
        let seed: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| ConfigError::InvalidKey {
            field: "node.key_seed".to_string(),
            reason: format!("expected 32 bytes, got {}", b.len()),
        })?;
        Ok(KeyPair::from_seed(self.key_type()?, &seed)?)
    }

    pub fn validator_set(&self) -> Result<ValidatorSet, ConfigError> {
        if self.validators.is_empty() {
            return Err(ConfigError::EmptyValidatorSet);
        }
        let key_type = self.key_type()?;
        let policy: ProposerPolicy = self.consensus.proposer_policy.parse()?;

        let mut infos: Vec<ValidatorInfo> = Vec::with_capacity(self.validators.len());
        for entry in &self.validators {
            let validator_id = ValidatorId(entry.id);
            if infos.iter().any(|v| v.validator_id == validator_id) {
                return Err(ConfigError::DuplicateValidator(validator_id));
            }
            let public_key = PublicKey::from_hex(key_type, &entry.public_key).map_err(|e| {
                ConfigError::InvalidKey {
                    field: format!("validators[{}].public_key", entry.id),
                    reason: e.to_string(),
                }
            })?;
            infos.push(ValidatorInfo {
                validator_id,
                public_key,
            });
        }
        Ok(ValidatorSet::new(infos, policy))
    }

    /// Load everything a node needs and check the local key is a member.
    pub fn resolve(&self) -> Result<(KeyPair, ValidatorSet, BftConfig), ConfigError> {
        let key = self.signing_key()?;
        let validators = self.validator_set()?;
        let id = self.validator_id();
        match validators.public_key(id) {
            None => return Err(ConfigError::NotAValidator(id)),
            Some(listed) if *listed != key.public_key() => {
                return Err(ConfigError::KeyMismatch(id))
            }
            Some(_) => {}
        }
        Ok((key, validators, self.bft_config()))
    }
}
