// ============ Test Fixtures ============

use crate::config::{DepConfig, DeploymentInfo, LockConfig, ProtocolConfig, ScriptDeployment};
use crate::model::{CellOutput, DepType, HashType, Script, Transaction, TxStatus};

pub const CKB: u64 = 100_000_000;

fn deployment(code: u8, dep_index: u32) -> ScriptDeployment {
    ScriptDeployment {
        code_hash: [code; 32],
        hash_type: HashType::Type,
        cell_dep: DepConfig {
            tx_hash: [0x10; 32],
            index: dep_index,
            dep_type: DepType::Code,
        },
    }
}

pub fn config() -> ProtocolConfig {
    ProtocolConfig {
        deployment: DeploymentInfo {
            info_type: deployment(0x01, 0),
            info_lock: deployment(0x02, 1),
            sudt_type: deployment(0x03, 2),
            swap_lock: deployment(0x04, 3),
            liquidity_lock: deployment(0x05, 4),
        },
        user_locks: vec![LockConfig {
            name: "secp256k1_blake160".into(),
            code_hash: [0x9b; 32],
            hash_type: HashType::Type,
            cell_dep: DepConfig {
                tx_hash: [0x20; 32],
                index: 0,
                dep_type: DepType::DepGroup,
            },
            witness_lock_size: 65,
        }],
        fee_rate: 1000,
        max_fee_iterations: 8,
    }
}

pub fn owner_lock() -> Script {
    Script::new([0x9b; 32], HashType::Type, vec![0x01; 20])
}

pub fn sudt_type(owner_byte: u8) -> Script {
    Script::new([0x03; 32], HashType::Type, vec![owner_byte; 32])
}

/// Committed transaction giving `owner` one plain cell per capacity
pub fn funding_tx(hash: u8, owner: &Script, capacities: &[u64]) -> Transaction {
    Transaction {
        hash: [hash; 32],
        outputs: capacities
            .iter()
            .map(|c| CellOutput::new(*c, owner.clone(), None))
            .collect(),
        outputs_data: vec![Vec::new(); capacities.len()],
        status: TxStatus::Committed,
        ..Default::default()
    }
}

/// Committed transaction giving `owner` one 142 CKB token cell per amount
pub fn token_tx(hash: u8, owner: &Script, token_type: &Script, amounts: &[u128]) -> Transaction {
    Transaction {
        hash: [hash; 32],
        outputs: amounts
            .iter()
            .map(|_| CellOutput::new(142 * CKB, owner.clone(), Some(token_type.clone())))
            .collect(),
        outputs_data: amounts.iter().map(|a| a.to_le_bytes().to_vec()).collect(),
        status: TxStatus::Committed,
        ..Default::default()
    }
}
