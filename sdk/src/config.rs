// ============ Protocol Configuration ============
// Where each protocol script lives on-chain, which user locks the SDK can
// build witnesses for, and the fee policy.
//
// Loaded from a TOML file overlaid with environment variables, e.g.
// `CELLSWAP_FEE_RATE=2000` or `CELLSWAP_DEPLOYMENT__SUDT_TYPE__CODE_HASH=0x...`.

use crate::error::{Result, SdkError};
use crate::model::{CellDep, DepType, Hash256, HashType, OutPoint, Script};
use crate::rpc::hex_hash;
use serde::Deserialize;
use std::path::Path;

const ENV_PREFIX: &str = "CELLSWAP";

pub const DEFAULT_FEE_RATE: u64 = 1000;
pub const DEFAULT_MAX_FEE_ITERATIONS: usize = 8;

/// Signature size of secp256k1 recoverable signatures
pub const SECP256K1_WITNESS_LOCK_SIZE: usize = 65;

// ============ Script Deployment ============

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DepConfig {
    #[serde(with = "hex_hash")]
    pub tx_hash: Hash256,
    pub index: u32,
    pub dep_type: DepType,
}

impl DepConfig {
    pub fn cell_dep(&self) -> CellDep {
        CellDep {
            out_point: OutPoint::new(self.tx_hash, self.index),
            dep_type: self.dep_type,
        }
    }
}

/// A deployed script: its identity and the cell dep that provides its code
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ScriptDeployment {
    #[serde(with = "hex_hash")]
    pub code_hash: Hash256,
    pub hash_type: HashType,
    pub cell_dep: DepConfig,
}

impl ScriptDeployment {
    pub fn script(&self, args: Vec<u8>) -> Script {
        Script::new(self.code_hash, self.hash_type, args)
    }

    pub fn matches(&self, script: &Script) -> bool {
        script.code_hash == self.code_hash && script.hash_type == self.hash_type
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DeploymentInfo {
    pub info_type: ScriptDeployment,
    pub info_lock: ScriptDeployment,
    pub sudt_type: ScriptDeployment,
    pub swap_lock: ScriptDeployment,
    pub liquidity_lock: ScriptDeployment,
}

impl DeploymentInfo {
    /// Code hashes of every lock that marks a cell as a pending order
    pub fn order_lock_code_hashes(&self) -> [Hash256; 2] {
        [self.swap_lock.code_hash, self.liquidity_lock.code_hash]
    }

    pub fn is_order_lock(&self, lock: &Script) -> bool {
        self.swap_lock.matches(lock) || self.liquidity_lock.matches(lock)
    }
}

// ============ User Locks ============

/// A lock the SDK can build spends for
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct LockConfig {
    pub name: String,
    #[serde(with = "hex_hash")]
    pub code_hash: Hash256,
    pub hash_type: HashType,
    pub cell_dep: DepConfig,
    #[serde(default = "default_witness_lock_size")]
    pub witness_lock_size: usize,
}

fn default_witness_lock_size() -> usize {
    SECP256K1_WITNESS_LOCK_SIZE
}

fn default_fee_rate() -> u64 {
    DEFAULT_FEE_RATE
}

fn default_max_fee_iterations() -> usize {
    DEFAULT_MAX_FEE_ITERATIONS
}

// ============ Protocol Config ============

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub deployment: DeploymentInfo,
    pub user_locks: Vec<LockConfig>,
    /// Shannons per 1000 serialized bytes
    #[serde(default = "default_fee_rate")]
    pub fee_rate: u64,
    #[serde(default = "default_max_fee_iterations")]
    pub max_fee_iterations: usize,
}

impl ProtocolConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let settings: ProtocolConfig = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fee_rate == 0 {
            return Err(SdkError::Config("fee_rate must be positive".into()));
        }
        if self.max_fee_iterations == 0 {
            return Err(SdkError::Config("max_fee_iterations must be positive".into()));
        }
        if self.user_locks.is_empty() {
            return Err(SdkError::Config("at least one user lock is required".into()));
        }
        Ok(())
    }

    /// Lock configuration for an owner lock; unknown locks cannot be spent
    pub fn lock_config(&self, lock: &Script) -> Result<&LockConfig> {
        self.user_locks
            .iter()
            .find(|l| l.code_hash == lock.code_hash && l.hash_type == lock.hash_type)
            .ok_or_else(|| {
                SdkError::malformed(format!(
                    "unsupported owner lock code hash 0x{}",
                    hex::encode(lock.code_hash)
                ))
            })
    }
}
