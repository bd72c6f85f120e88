// ============ Cancel ============
// Spends the request cells of a request transaction back to their owner.
// Only the owner named in the request args may cancel.

use super::{BuiltTransaction, Plan, TransactionBuilder};
use crate::error::{Result, SdkError};
use crate::model::{Cell, CellOutput, Hash256, Script};
use crate::repository::{CellQuery, CellRepository, ScriptFilter};
use cellswap_types::RequestArgs;
use log::warn;

impl<'a, R: CellRepository> TransactionBuilder<'a, R> {
    pub async fn cancel_request(&self, tx_hash: &Hash256, owner_lock: &Script) -> Result<BuiltTransaction> {
        let deployment = &self.config.deployment;
        let tx = self.repo.get_transaction(tx_hash).await?;

        let requests: Vec<Cell> = tx
            .output_cells()
            .filter(|cell| deployment.is_order_lock(cell.lock()))
            .collect();
        if requests.is_empty() {
            return Err(SdkError::malformed(format!(
                "tx 0x{} carries no request cell",
                hex::encode(tx_hash)
            )));
        }

        let owner_hash = owner_lock.hash();
        for cell in &requests {
            let args = RequestArgs::parse(&cell.lock().args).ok_or_else(|| {
                SdkError::malformed(format!(
                    "request args of {} bytes match no known layout",
                    cell.lock().args.len()
                ))
            })?;
            if args.user_lock_hash() != &owner_hash {
                warn!(
                    "[TransactionBuilder] cancel of 0x{}:{} by 0x{} rejected: request belongs to 0x{}",
                    hex::encode(tx_hash),
                    cell.out_point.index,
                    hex::encode(owner_hash),
                    hex::encode(args.user_lock_hash())
                );
                return Err(SdkError::malformed("owner lock does not match the request"));
            }
            self.ensure_live(cell).await?;
        }

        let mut cell_deps = Vec::new();
        for order_lock in [&deployment.swap_lock, &deployment.liquidity_lock] {
            if requests.iter().any(|cell| order_lock.matches(cell.lock())) {
                cell_deps.push(order_lock.cell_dep.cell_dep());
            }
        }
        if requests.iter().any(|cell| cell.type_script().is_some()) {
            cell_deps.push(self.sudt_dep());
        }

        let outputs = requests
            .iter()
            .map(|cell| {
                let returned = CellOutput::new(cell.capacity(), owner_lock.clone(), cell.type_script().cloned());
                (returned, cell.data.clone())
            })
            .collect();

        let plan = Plan {
            label: "cancel",
            leading_inputs: requests,
            outputs,
            cell_deps,
            ..Default::default()
        };
        self.build(owner_lock, &plan).await
    }

    async fn ensure_live(&self, cell: &Cell) -> Result<()> {
        let query = CellQuery {
            lock: Some(ScriptFilter::exact(cell.lock().clone())),
            ..Default::default()
        };
        let live = self.repo.collect_cells(&query).await?;
        if live.iter().any(|c| c.out_point == cell.out_point) {
            Ok(())
        } else {
            Err(SdkError::malformed(format!(
                "request 0x{}:{} is already spent",
                hex::encode(cell.out_point.tx_hash),
                cell.out_point.index
            )))
        }
    }
}
