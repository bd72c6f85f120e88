// ============ Pool Creation ============
// A pool is identified by the first cell its creation transaction spends.
// From that one hash follow the info type script, the info lock (which also
// pins the asset pair) and the LP token type script.

use super::{BuiltTransaction, Pairing, Plan, TransactionBuilder};
use crate::config::DeploymentInfo;
use crate::error::{Result, SdkError};
use crate::hash::blake2b_256_parts;
use crate::model::{Cell, CellOutput, Hash256, OutPoint, Script, Token};
use crate::repository::{CellQuery, CellRepository, DataFilter, ScriptFilter, TypeFilter};
use cellswap_types::{InfoCellArgs, InfoCellData, SudtCellData};
use log::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolIdentity {
    pub pool_id: Hash256,
    pub pair_hash: Hash256,
    pub info_type: Script,
    pub info_type_hash: Hash256,
    pub info_lock: Script,
    pub lp_token_type: Script,
    pub lp_token_type_hash: Hash256,
}

impl PoolIdentity {
    /// Pool id of a pool whose creation spends `first_input` first. Only the
    /// transaction hash counts; the index slot is always zero.
    pub fn pool_id(first_input: &OutPoint) -> Hash256 {
        blake2b_256_parts(&[&first_input.tx_hash, &0u64.to_le_bytes()])
    }

    pub fn derive(deployment: &DeploymentInfo, pool_id: Hash256, pairing: &Pairing) -> Self {
        let pair_hash = pairing.pair_hash();
        let info_type = deployment.info_type.script(pool_id.to_vec());
        let info_type_hash = info_type.hash();
        let info_lock = deployment.info_lock.script(
            InfoCellArgs {
                pair_hash,
                info_type_hash,
            }
            .serialize()
            .to_vec(),
        );
        let lp_token_type = deployment.sudt_type.script(info_lock.hash().to_vec());
        let lp_token_type_hash = lp_token_type.hash();

        Self {
            pool_id,
            pair_hash,
            info_type,
            info_type_hash,
            info_lock,
            lp_token_type,
            lp_token_type_hash,
        }
    }

    pub fn lp_token(&self, balance: u128) -> Token {
        Token::sudt(self.lp_token_type.clone(), balance)
    }

    fn lp_token_type_hash20(&self) -> [u8; 20] {
        let mut hash20 = [0u8; 20];
        hash20.copy_from_slice(&self.lp_token_type_hash[..20]);
        hash20
    }
}

impl<'a, R: CellRepository> TransactionBuilder<'a, R> {
    pub async fn create_liquidity_pool(
        &self,
        token_a: &Token,
        token_b: &Token,
        owner_lock: &Script,
    ) -> Result<(BuiltTransaction, PoolIdentity)> {
        let pairing = Pairing::of(token_a, token_b)?;
        let deployment = &self.config.deployment;

        let mut plan = Plan {
            label: "create-pool",
            cell_deps: vec![deployment.info_type.cell_dep.cell_dep(), self.sudt_dep()],
            ..Default::default()
        };

        // outputs depend on the identity only through args of equal length,
        // so a zero identity sizes the collection exactly
        plan.outputs = pool_outputs(&PoolIdentity::derive(deployment, [0u8; 32], &pairing), &pairing);
        let probe = self.draft(owner_lock, self.config.lock_config(owner_lock)?, &plan, 0).await?;
        let first_input = probe
            .tx
            .inputs
            .first()
            .map(|input| input.previous_output)
            .ok_or_else(|| SdkError::Repository("no cell collected for pool creation".into()))?;

        let identity = PoolIdentity::derive(deployment, PoolIdentity::pool_id(&first_input), &pairing);
        plan.outputs = pool_outputs(&identity, &pairing);
        plan.pinned_first_input = Some(first_input);

        let built = self.build(owner_lock, &plan).await?;
        info!(
            "[TransactionBuilder] pool 0x{} for pair 0x{}",
            hex::encode(identity.pool_id),
            hex::encode(identity.pair_hash)
        );
        Ok((built, identity))
    }

    /// The pool's live info cell and its decoded data
    pub async fn fetch_pool(&self, pool: &PoolIdentity) -> Result<(Cell, InfoCellData)> {
        let query = CellQuery {
            lock: Some(ScriptFilter::exact(pool.info_lock.clone())),
            type_filter: TypeFilter::Script(ScriptFilter::exact(pool.info_type.clone())),
            data: DataFilter::Any,
            limit: Some(1),
        };
        let cell = self
            .repo
            .collect_cells(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SdkError::malformed(format!("pool 0x{} not found", hex::encode(pool.pool_id)))
            })?;

        let data = InfoCellData::deserialize(&cell.data).ok_or_else(|| {
            SdkError::Codec(format!(
                "info cell 0x{}:{} has {} bytes of data",
                hex::encode(cell.out_point.tx_hash),
                cell.out_point.index,
                cell.data.len()
            ))
        })?;
        if data.lp_token_type_hash20 != pool.lp_token_type_hash20() {
            return Err(SdkError::malformed(format!(
                "info cell of pool 0x{} names a different LP token",
                hex::encode(pool.pool_id)
            )));
        }
        Ok((cell, data))
    }
}

/// Info cell first, then one empty reserve cell per fungible token
fn pool_outputs(identity: &PoolIdentity, pairing: &Pairing) -> Vec<(CellOutput, Vec<u8>)> {
    let info_data = InfoCellData {
        ckb_reserve: 0,
        sudt_reserve: 0,
        total_liquidity: 0,
        lp_token_type_hash20: identity.lp_token_type_hash20(),
    }
    .serialize()
    .to_vec();
    let info_type = Some(identity.info_type.clone());
    let mut info = CellOutput::new(0, identity.info_lock.clone(), info_type);
    info.capacity = info.occupied_capacity(info_data.len());

    let mut outputs = vec![(info, info_data)];
    for token in pairing.sudt_tokens() {
        let reserve_data = SudtCellData::new(0).serialize().to_vec();
        let mut reserve = CellOutput::new(0, identity.info_lock.clone(), token.type_script.clone());
        reserve.capacity = reserve.occupied_capacity(reserve_data.len());
        outputs.push((reserve, reserve_data));
    }
    outputs
}
