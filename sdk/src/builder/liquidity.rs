// ============ Liquidity Requests ============
// Genesis, add and remove all lock the deposited assets in a request cell
// under the liquidity lock. A deal-maker later consumes it against the pool
// and writes the LP tokens (or the withdrawn assets) back to the owner, so
// the request also carries the capacity for those settlement cells.

use super::{
    checked_amount, checked_capacity, type_script_of, BuiltTransaction, Pairing, Plan, PoolIdentity, Tips,
    TransactionBuilder,
};
use crate::error::{Result, SdkError};
use crate::model::{sudt_cell_capacity, CellOutput, Script, Token};
use crate::repository::CellRepository;
use cellswap_types::{
    LiquidityFellowArgs, LiquidityRequestArgs, SudtCellData, LIQUIDITY_REQUEST_VERSION,
};

/// Deposit into a pool. The deposit amounts are the tokens' balances; the
/// native asset is `Token::ckb(amount)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiquidityRequest {
    pub pool: PoolIdentity,
    pub token_a: Token,
    pub token_b: Token,
    pub min_a: u128,
    pub min_b: u128,
    pub owner_lock: Script,
    pub tips: Tips,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveLiquidityRequest {
    pub pool: PoolIdentity,
    /// Only the identities of the pool's assets are read
    pub token_a: Token,
    pub token_b: Token,
    pub lp_amount: u128,
    pub min_a: u128,
    pub min_b: u128,
    pub owner_lock: Script,
    pub tips: Tips,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Deposit {
    Genesis,
    Add,
}

impl<'a, R: CellRepository> TransactionBuilder<'a, R> {
    /// First deposit into an empty pool
    pub async fn genesis_liquidity(&self, request: &LiquidityRequest) -> Result<BuiltTransaction> {
        let plan = self.deposit_plan(request, Deposit::Genesis).await?;
        self.build(&request.owner_lock, &plan).await
    }

    pub async fn add_liquidity(&self, request: &LiquidityRequest) -> Result<BuiltTransaction> {
        let plan = self.deposit_plan(request, Deposit::Add).await?;
        self.build(&request.owner_lock, &plan).await
    }

    pub async fn remove_liquidity(&self, request: &RemoveLiquidityRequest) -> Result<BuiltTransaction> {
        if request.lp_amount == 0 {
            return Err(SdkError::malformed("nothing to remove: lp amount is zero"));
        }
        let pairing = Pairing::of(&request.token_a, &request.token_b)?;
        let pool = &request.pool;
        ensure_pair(pool, &pairing)?;

        let (_, info) = self.fetch_pool(pool).await?;
        if info.total_liquidity == 0 {
            return Err(SdkError::malformed(format!(
                "pool 0x{} has no liquidity to remove",
                hex::encode(pool.pool_id)
            )));
        }

        let owner = &request.owner_lock;
        let (min_first, min_second) =
            Pairing::order(&request.token_a, &request.token_b, request.min_a, request.min_b);
        // native pools order the native asset first but encode the token minimum first
        let (sudt_min, ckb_min) = match pairing {
            Pairing::NativePlusToken { .. } => (min_second, min_first),
            Pairing::TokenPlusToken { .. } => (min_first, min_second),
        };
        let args = LiquidityRequestArgs {
            info_type_hash: pool.info_type_hash,
            user_lock_hash: owner.hash(),
            version: LIQUIDITY_REQUEST_VERSION,
            sudt_min,
            ckb_min,
            tips: request.tips.into(),
        };

        let returned: u64 = pairing
            .sudt_tokens()
            .into_iter()
            .map(|token| type_script_of(token).map(|ty| sudt_cell_capacity(owner, ty)))
            .sum::<Result<u64>>()?;

        let lock = self.config.deployment.liquidity_lock.script(args.serialize().to_vec());
        let data = SudtCellData::new(request.lp_amount).serialize().to_vec();
        let mut cell = CellOutput::new(0, lock, Some(pool.lp_token_type.clone()));
        cell.capacity = checked_capacity(
            &[cell.occupied_capacity(data.len()), request.tips.ckb, returned],
            "remove request",
        )?;

        let plan = Plan {
            label: "remove-liquidity",
            outputs: vec![(cell, data)],
            tokens: vec![pool.lp_token(request.lp_amount)],
            cell_deps: vec![self.config.deployment.liquidity_lock.cell_dep.cell_dep(), self.sudt_dep()],
            ..Default::default()
        };
        self.build(owner, &plan).await
    }

    async fn deposit_plan(&self, request: &LiquidityRequest, deposit: Deposit) -> Result<Plan> {
        let pairing = Pairing::of(&request.token_a, &request.token_b)?;
        let pool = &request.pool;
        ensure_pair(pool, &pairing)?;

        let (amount_first, amount_second) = Pairing::order(
            &request.token_a,
            &request.token_b,
            request.token_a.get_balance(),
            request.token_b.get_balance(),
        );
        if amount_first == 0 || amount_second == 0 {
            return Err(SdkError::malformed("both deposit amounts must be positive"));
        }

        let (_, info) = self.fetch_pool(pool).await?;
        let empty = info.total_liquidity == 0;
        match deposit {
            Deposit::Genesis if !empty => {
                return Err(SdkError::malformed(format!(
                    "pool 0x{} already has liquidity",
                    hex::encode(pool.pool_id)
                )))
            }
            Deposit::Add if empty => {
                return Err(SdkError::malformed(format!(
                    "pool 0x{} has no liquidity yet",
                    hex::encode(pool.pool_id)
                )))
            }
            _ => {}
        }

        let owner = &request.owner_lock;
        let (min_first, min_second) =
            Pairing::order(&request.token_a, &request.token_b, request.min_a, request.min_b);
        let tips = request.tips;
        let lp_cell = sudt_cell_capacity(owner, &pool.lp_token_type);
        let liquidity_lock = &self.config.deployment.liquidity_lock;

        let mut plan = Plan {
            label: match deposit {
                Deposit::Genesis => "genesis-liquidity",
                Deposit::Add => "add-liquidity",
            },
            cell_deps: vec![liquidity_lock.cell_dep.cell_dep(), self.sudt_dep()],
            ..Default::default()
        };

        match &pairing {
            Pairing::NativePlusToken { token } => {
                let token_type = type_script_of(token)?;
                let ckb_amount = u64::try_from(amount_first)
                    .map_err(|_| SdkError::malformed("native deposit exceeds the capacity range"))?;
                let token_amount = checked_amount(amount_second, tips.token_x, "token deposit plus tip")?;

                let args = LiquidityRequestArgs {
                    info_type_hash: pool.info_type_hash,
                    user_lock_hash: owner.hash(),
                    version: LIQUIDITY_REQUEST_VERSION,
                    sudt_min: min_second,
                    ckb_min: min_first,
                    tips: tips.into(),
                };
                let data = SudtCellData::new(token_amount).serialize().to_vec();
                let mut cell = CellOutput::new(
                    0,
                    liquidity_lock.script(args.serialize().to_vec()),
                    Some(token_type.clone()),
                );
                // unmatched token comes back to the owner on add
                let refund_cell = match deposit {
                    Deposit::Add => sudt_cell_capacity(owner, token_type),
                    Deposit::Genesis => 0,
                };
                cell.capacity = checked_capacity(
                    &[cell.occupied_capacity(data.len()), ckb_amount, tips.ckb, lp_cell, refund_cell],
                    "liquidity request",
                )?;

                plan.outputs.push((cell, data));
                plan.tokens.push(token.with_balance(token_amount));
            }
            Pairing::TokenPlusToken { x, y } => {
                let (x_type, y_type) = (type_script_of(x)?, type_script_of(y)?);
                let x_amount = checked_amount(amount_first, tips.token_x, "first token deposit plus tip")?;
                let y_amount = checked_amount(amount_second, tips.token_y, "second token deposit plus tip")?;

                let main_args = LiquidityRequestArgs {
                    info_type_hash: pool.info_type_hash,
                    user_lock_hash: owner.hash(),
                    version: LIQUIDITY_REQUEST_VERSION,
                    sudt_min: min_first,
                    ckb_min: min_second,
                    tips: tips.into(),
                };
                let main_lock = liquidity_lock.script(main_args.serialize().to_vec());
                let main_data = SudtCellData::new(x_amount).serialize().to_vec();
                let mut main = CellOutput::new(0, main_lock.clone(), Some(x_type.clone()));
                let refund_cells = match deposit {
                    Deposit::Add => sudt_cell_capacity(owner, x_type) + sudt_cell_capacity(owner, y_type),
                    Deposit::Genesis => 0,
                };
                main.capacity = checked_capacity(
                    &[main.occupied_capacity(main_data.len()), tips.ckb, lp_cell, refund_cells],
                    "liquidity request",
                )?;

                let fellow_args = LiquidityFellowArgs {
                    main_lock_hash: main_lock.hash(),
                    user_lock_hash: owner.hash(),
                    version: LIQUIDITY_REQUEST_VERSION,
                };
                let fellow_data = SudtCellData::new(y_amount).serialize().to_vec();
                let mut fellow = CellOutput::new(
                    0,
                    liquidity_lock.script(fellow_args.serialize().to_vec()),
                    Some(y_type.clone()),
                );
                fellow.capacity = fellow.occupied_capacity(fellow_data.len());

                plan.outputs.push((main, main_data));
                plan.outputs.push((fellow, fellow_data));
                plan.tokens.push(x.with_balance(x_amount));
                plan.tokens.push(y.with_balance(y_amount));
            }
        }
        Ok(plan)
    }
}

fn ensure_pair(pool: &PoolIdentity, pairing: &Pairing) -> Result<()> {
    if pool.pair_hash != pairing.pair_hash() {
        return Err(SdkError::malformed(format!(
            "assets do not match the pair of pool 0x{}",
            hex::encode(pool.pool_id)
        )));
    }
    Ok(())
}
