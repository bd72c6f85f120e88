// ============ Shared Fixtures ============

use cellswap_sdk::config::{DepConfig, DeploymentInfo, LockConfig, ScriptDeployment};
use cellswap_sdk::model::{CellInput, CellOutput, DepType, HashType, TxStatus};
use cellswap_sdk::repository::MemoryRepository;
use cellswap_sdk::{Cell, CellSwapSDK, ProtocolConfig, Script, Transaction};

pub const CKB: u64 = 100_000_000;

pub const LIQUIDITY_LOCK_CODE: [u8; 32] = [0x05; 32];

fn deployment(code: u8, dep_index: u32) -> ScriptDeployment {
    ScriptDeployment {
        code_hash: [code; 32],
        hash_type: HashType::Type,
        cell_dep: DepConfig {
            tx_hash: [0xD0; 32],
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
                tx_hash: [0xD1; 32],
                index: 0,
                dep_type: DepType::DepGroup,
            },
            witness_lock_size: 65,
        }],
        fee_rate: 1000,
        max_fee_iterations: 8,
    }
}

/// secp256k1 owner lock; `id` varies the 20-byte pubkey hash
pub fn owner(id: u8) -> Script {
    Script::new([0x9b; 32], HashType::Type, vec![id; 20])
}

/// sUDT type script; `id` varies the issuer lock hash
pub fn sudt(id: u8) -> Script {
    Script::new([0x03; 32], HashType::Type, vec![id; 32])
}

pub fn funding_tx(hash: u8, lock: &Script, capacities: &[u64]) -> Transaction {
    Transaction {
        hash: [hash; 32],
        outputs: capacities
            .iter()
            .map(|c| CellOutput::new(*c, lock.clone(), None))
            .collect(),
        outputs_data: vec![Vec::new(); capacities.len()],
        status: TxStatus::Committed,
        ..Default::default()
    }
}

pub fn token_tx(hash: u8, lock: &Script, token_type: &Script, amounts: &[u128]) -> Transaction {
    Transaction {
        hash: [hash; 32],
        outputs: amounts
            .iter()
            .map(|_| CellOutput::new(142 * CKB, lock.clone(), Some(token_type.clone())))
            .collect(),
        outputs_data: amounts.iter().map(|a| a.to_le_bytes().to_vec()).collect(),
        status: TxStatus::Committed,
        ..Default::default()
    }
}

/// SDK whose ledger funds `owner(1)` with plain capacity and tokens of `sudt(0xAA)`
pub fn funded_sdk() -> CellSwapSDK<MemoryRepository> {
    let user = owner(1);
    CellSwapSDK::new(
        config(),
        MemoryRepository::with_transactions(vec![
            funding_tx(0xF1, &user, &[2_000 * CKB, 8_000 * CKB]),
            token_tx(0xF2, &user, &sudt(0xAA), &[5_000, 5_000]),
        ]),
    )
}

/// A committed deal-maker transaction: consumes `cells[i]` at input i and
/// writes `outputs[i]` at output i
pub fn deal(hash: u8, cells: &[&Cell], outputs: Vec<(CellOutput, Vec<u8>)>) -> Transaction {
    let (outputs, outputs_data) = outputs.into_iter().unzip();
    Transaction {
        hash: [hash; 32],
        inputs: cells.iter().map(|c| CellInput::new(c.out_point)).collect(),
        outputs,
        outputs_data,
        status: TxStatus::Committed,
        ..Default::default()
    }
}
