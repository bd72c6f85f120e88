// ============ Transaction Builder ============
// Composes inputs, outputs, cell deps and witness placeholders for every
// pool operation, then settles the fee with a bounded fixed-point loop.
//
// Every operation reduces to a `Plan`: the request outputs it must create,
// the tokens it must spend, any protocol cells it consumes up front and the
// deps those scripts need. `draft` turns a plan plus a fee guess into a
// transaction whose trailing capacity change covers `min change + fee`.

mod cancel;
mod liquidity;
mod pool;
mod swap;

pub use liquidity::{LiquidityRequest, RemoveLiquidityRequest};
pub use pool::PoolIdentity;
pub use swap::SwapRequest;

use crate::collector::CellCollector;
use crate::config::{LockConfig, ProtocolConfig};
use crate::error::{Result, SdkError};
use crate::hash::blake2b_256_parts;
use crate::model::{
    free_cell_capacity, sudt_cell_capacity, witness_placeholder, Cell, CellDep, CellOutput, Hash256,
    OutPoint, Script, Token, TransactionToSign,
};
use crate::repository::CellRepository;
use cellswap_types::{SudtCellData, TipsArgs};
use log::{debug, info};
use std::future::Future;

// ============ Operation Inputs ============

/// Tips paid to the deal-maker, carried in request args and added on top of
/// the request cell's capacity / token amount
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tips {
    pub ckb: u64,
    pub token_x: u128,
    pub token_y: u128,
}

impl From<Tips> for TipsArgs {
    fn from(tips: Tips) -> Self {
        TipsArgs {
            tips_ckb: tips.ckb,
            tips_sudt_x: tips.token_x,
            tips_sudt_y: tips.token_y,
        }
    }
}

/// The two asset-pairing modes every operation is built for. Tokens are
/// held in ascending type-hash order, so the native asset (all-zero hash)
/// always comes first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pairing {
    NativePlusToken { token: Token },
    TokenPlusToken { x: Token, y: Token },
}

impl Pairing {
    pub fn of(a: &Token, b: &Token) -> Result<Self> {
        if a.type_hash == b.type_hash {
            return Err(SdkError::malformed(format!(
                "pairing needs two distinct assets, got 0x{} twice",
                hex::encode(a.type_hash)
            )));
        }
        for token in [a, b] {
            if !token.is_ckb() && token.type_script.is_none() {
                return Err(SdkError::malformed(format!(
                    "token 0x{} has no type script",
                    hex::encode(token.type_hash)
                )));
            }
        }

        let (first, second) = Self::order(a, b, a, b);
        if first.is_ckb() {
            Ok(Pairing::NativePlusToken {
                token: second.clone(),
            })
        } else {
            Ok(Pairing::TokenPlusToken {
                x: first.clone(),
                y: second.clone(),
            })
        }
    }

    /// Reorder a value attached to each of `a` and `b` into pairing order
    pub fn order<T>(a: &Token, b: &Token, value_a: T, value_b: T) -> (T, T) {
        if a.type_hash <= b.type_hash {
            (value_a, value_b)
        } else {
            (value_b, value_a)
        }
    }

    pub fn is_dual_token(&self) -> bool {
        matches!(self, Pairing::TokenPlusToken { .. })
    }

    /// Token type hashes in pairing order; the native asset is `CKB_TYPE_HASH`
    pub fn type_hashes(&self) -> [Hash256; 2] {
        match self {
            Pairing::NativePlusToken { token } => [cellswap_types::CKB_TYPE_HASH, token.type_hash],
            Pairing::TokenPlusToken { x, y } => [x.type_hash, y.type_hash],
        }
    }

    /// Identifies the unordered asset pair
    pub fn pair_hash(&self) -> Hash256 {
        let [first, second] = self.type_hashes();
        blake2b_256_parts(&[&first, &second])
    }

    /// The fungible tokens of the pair
    pub fn sudt_tokens(&self) -> Vec<&Token> {
        match self {
            Pairing::NativePlusToken { token } => vec![token],
            Pairing::TokenPlusToken { x, y } => vec![x, y],
        }
    }
}

/// Sum of capacities that must stay within the u64 shannon range
fn checked_capacity(parts: &[u64], what: &str) -> Result<u64> {
    parts
        .iter()
        .try_fold(0u64, |total, part| total.checked_add(*part))
        .ok_or_else(|| SdkError::malformed(format!("{} overflows the capacity range", what)))
}

fn checked_amount(amount: u128, tip: u128, what: &str) -> Result<u128> {
    amount
        .checked_add(tip)
        .ok_or_else(|| SdkError::malformed(format!("{} overflows the token amount range", what)))
}

fn type_script_of(token: &Token) -> Result<&Script> {
    token.type_script.as_ref().ok_or_else(|| {
        SdkError::malformed(format!("token 0x{} has no type script", hex::encode(token.type_hash)))
    })
}

// ============ Built Transaction ============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltTransaction {
    pub tx: TransactionToSign,
    pub fee: u64,
}

/// A transaction whose change output has not yet paid the fee
#[derive(Clone, Debug)]
struct Draft {
    tx: TransactionToSign,
    change_index: usize,
    min_change: u64,
}

#[derive(Clone, Debug, Default)]
struct Plan {
    label: &'static str,
    /// Protocol cells consumed ahead of the owner's cells
    leading_inputs: Vec<Cell>,
    outputs: Vec<(CellOutput, Vec<u8>)>,
    /// Token amounts to collect from the owner, as balances
    tokens: Vec<Token>,
    cell_deps: Vec<CellDep>,
    /// The first collected input must stay this cell across fee iterations
    pinned_first_input: Option<OutPoint>,
}

// ============ Fee Fixed Point ============

async fn settle_fee<F, Fut>(fee_rate: u64, max_iterations: usize, mut draft: F) -> Result<BuiltTransaction>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Draft>>,
{
    let mut tx_fee = 0;
    for iteration in 1..=max_iterations {
        let Draft {
            mut tx,
            change_index,
            min_change,
        } = draft(tx_fee).await?;

        let fee = tx.fee(fee_rate);
        let change = &mut tx.outputs[change_index].capacity;
        if *change < min_change.saturating_add(fee) {
            debug!(
                "[TransactionBuilder] iteration {}: change {} short of {} + fee {}, retrying",
                iteration, change, min_change, fee
            );
            tx_fee = fee.max(tx_fee.saturating_add(1));
            continue;
        }

        *change -= fee;
        return Ok(BuiltTransaction { tx, fee });
    }

    Err(SdkError::FeeNotConverged {
        iterations: max_iterations,
        last_fee: tx_fee,
    })
}

// ============ Builder ============

pub struct TransactionBuilder<'a, R: CellRepository> {
    config: &'a ProtocolConfig,
    repo: &'a R,
}

impl<'a, R: CellRepository> TransactionBuilder<'a, R> {
    pub fn new(config: &'a ProtocolConfig, repo: &'a R) -> Self {
        Self { config, repo }
    }

    async fn build(&self, owner: &Script, plan: &Plan) -> Result<BuiltTransaction> {
        let lock = self.config.lock_config(owner)?;
        let built = settle_fee(self.config.fee_rate, self.config.max_fee_iterations, |tx_fee| {
            self.draft(owner, lock, plan, tx_fee)
        })
        .await?;

        info!(
            "[TransactionBuilder] built {} tx 0x{}: {} inputs, {} outputs, fee {}",
            plan.label,
            hex::encode(built.tx.hash()),
            built.tx.inputs.len(),
            built.tx.outputs.len(),
            built.fee
        );
        Ok(built)
    }

    async fn draft(&self, owner: &Script, lock: &LockConfig, plan: &Plan, tx_fee: u64) -> Result<Draft> {
        let min_change = free_cell_capacity(owner);
        let request_capacities: Vec<u64> = plan.outputs.iter().map(|(o, _)| o.capacity).collect();
        let request_capacity = checked_capacity(&request_capacities, "request outputs")?;
        let leading_capacities: Vec<u64> = plan.leading_inputs.iter().map(Cell::capacity).collect();
        let leading_capacity = checked_capacity(&leading_capacities, "leading inputs")?;
        let token_change_capacity: u64 = plan
            .tokens
            .iter()
            .filter(|t| t.get_balance() > 0)
            .filter_map(|t| t.type_script.as_ref())
            .map(|ty| sudt_cell_capacity(owner, ty))
            .sum();

        let wide_target = u128::from(request_capacity.saturating_sub(leading_capacity))
            + u128::from(token_change_capacity)
            + u128::from(min_change)
            + u128::from(tx_fee);
        let target = u64::try_from(wide_target).map_err(|_| SdkError::InsufficientFunds {
            asset: "capacity".into(),
            required: wide_target,
            collected: 0,
            owner_lock_hash: hex::encode(owner.hash()),
        })?;

        let collected = CellCollector::new(self.repo)
            .multi_collect(target, owner, &plan.tokens)
            .await?;

        if let Some(pinned) = plan.pinned_first_input {
            let first = collected.cells.first().map(|c| c.out_point);
            if first != Some(pinned) {
                return Err(SdkError::Repository(format!(
                    "first input 0x{}:{} is no longer the first collected cell",
                    hex::encode(pinned.tx_hash),
                    pinned.index
                )));
            }
        }

        let mut outputs = plan.outputs.clone();
        for (token, collected_amount) in plan.tokens.iter().zip(&collected.amounts) {
            let surplus = collected_amount.saturating_sub(token.get_balance());
            if let (true, Some(ty)) = (surplus > 0, token.type_script.as_ref()) {
                outputs.push((
                    CellOutput::new(sudt_cell_capacity(owner, ty), owner.clone(), Some(ty.clone())),
                    SudtCellData::new(surplus).serialize().to_vec(),
                ));
            }
        }

        let input_capacity = checked_capacity(&[leading_capacity, collected.capacity], "inputs")?;
        let output_capacities: Vec<u64> = outputs.iter().map(|(o, _)| o.capacity).collect();
        let spent = checked_capacity(&output_capacities, "outputs")?;
        let change = input_capacity.checked_sub(spent).ok_or_else(|| SdkError::InsufficientFunds {
            asset: "capacity".into(),
            required: spent as u128,
            collected: input_capacity as u128,
            owner_lock_hash: hex::encode(owner.hash()),
        })?;
        outputs.push((CellOutput::new(change, owner.clone(), None), Vec::new()));

        let inputs: Vec<_> = plan
            .leading_inputs
            .iter()
            .chain(&collected.cells)
            .map(Cell::to_input)
            .collect();

        // the owner's lock group signs at its first input
        let mut witnesses = vec![Vec::new(); inputs.len()];
        if let Some(witness) = witnesses.get_mut(plan.leading_inputs.len()) {
            *witness = witness_placeholder(lock.witness_lock_size);
        }

        let mut cell_deps: Vec<CellDep> = Vec::new();
        for dep in plan.cell_deps.iter().cloned().chain([lock.cell_dep.cell_dep()]) {
            if !cell_deps.contains(&dep) {
                cell_deps.push(dep);
            }
        }

        let change_index = outputs.len() - 1;
        let (outputs, outputs_data) = outputs.into_iter().unzip();
        Ok(Draft {
            tx: TransactionToSign {
                cell_deps,
                inputs,
                outputs,
                outputs_data,
                witnesses,
                ..Default::default()
            },
            change_index,
            min_change,
        })
    }

    fn sudt_dep(&self) -> CellDep {
        self.config.deployment.sudt_type.cell_dep.cell_dep()
    }
}
