// ============ Swap Requests ============

use super::{checked_amount, checked_capacity, type_script_of, BuiltTransaction, Pairing, Plan, Tips, TransactionBuilder};
use crate::error::{Result, SdkError};
use crate::model::{occupied_capacity, sudt_cell_capacity, CellOutput, Script, Token};
use crate::repository::CellRepository;
use cellswap_types::{SudtCellData, SwapRequestArgs, SWAP_REQUEST_VERSION};

/// Sell `token_in.balance` of one asset for at least `min_amount_out` of
/// `token_out`. Token tips use `tips.token_x`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapRequest {
    pub token_in: Token,
    pub token_out: Token,
    pub min_amount_out: u128,
    pub owner_lock: Script,
    pub tips: Tips,
}

impl<'a, R: CellRepository> TransactionBuilder<'a, R> {
    pub async fn swap(&self, request: &SwapRequest) -> Result<BuiltTransaction> {
        let pairing = Pairing::of(&request.token_in, &request.token_out)?;
        let amount_in = request.token_in.get_balance();
        if amount_in == 0 {
            return Err(SdkError::malformed("swap amount must be positive"));
        }

        let owner = &request.owner_lock;
        let tips = request.tips;
        let args = SwapRequestArgs {
            token_type_hash: request.token_out.type_hash,
            user_lock_hash: owner.hash(),
            version: SWAP_REQUEST_VERSION,
            min_amount_out: request.min_amount_out,
            tips_ckb: tips.ckb,
            tips_sudt: tips.token_x,
        };
        let lock = self.config.deployment.swap_lock.script(args.serialize().to_vec());

        let mut plan = Plan {
            cell_deps: vec![self.config.deployment.swap_lock.cell_dep.cell_dep(), self.sudt_dep()],
            ..Default::default()
        };

        if request.token_in.is_ckb() {
            // the request cell is rewritten into the bought token cell
            let out_type = type_script_of(&request.token_out)?;
            let amount = u64::try_from(amount_in)
                .map_err(|_| SdkError::malformed("native amount exceeds the capacity range"))?;
            let base = occupied_capacity(&lock, None, 0).max(sudt_cell_capacity(owner, out_type));

            plan.label = "swap-sell-native";
            let capacity = checked_capacity(&[base, amount, tips.ckb], "swap request")?;
            plan.outputs.push((CellOutput::new(capacity, lock, None), Vec::new()));
        } else {
            let in_type = type_script_of(&request.token_in)?;
            let token_amount = checked_amount(amount_in, tips.token_x, "swap amount plus token tip")?;
            let data = SudtCellData::new(token_amount).serialize().to_vec();
            let mut cell = CellOutput::new(0, lock, Some(in_type.clone()));
            let occupied = cell.occupied_capacity(data.len());

            cell.capacity = match &pairing {
                Pairing::NativePlusToken { .. } => {
                    plan.label = "swap-sell-token";
                    checked_capacity(&[occupied, tips.ckb], "swap request")?
                }
                Pairing::TokenPlusToken { .. } => {
                    plan.label = "swap-token-token";
                    let out_type = type_script_of(&request.token_out)?;
                    checked_capacity(&[occupied.max(sudt_cell_capacity(owner, out_type)), tips.ckb], "swap request")?
                }
            };
            plan.outputs.push((cell, data));
            plan.tokens.push(request.token_in.with_balance(token_amount));
        }

        self.build(owner, &plan).await
    }
}
