// ============ Cell Collector ============
// Picks spendable cells for an owner: token cells first (when a token
// amount is requested), then plain capacity cells until the capacity target
// is met. Cells are taken in repository order with no coin-selection policy.

use crate::error::{Result, SdkError};
use crate::model::{Cell, Script, Token};
use crate::repository::{CellQuery, CellRepository};
use log::{debug, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectedCells {
    pub cells: Vec<Cell>,
    pub capacity: u64,
    /// Token amount gathered; `None` when no token was requested
    pub token_amount: Option<u128>,
}

/// Result of collecting several tokens at once
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectedTokens {
    pub cells: Vec<Cell>,
    pub capacity: u64,
    /// Parallel to the requested tokens
    pub amounts: Vec<u128>,
}

pub struct CellCollector<'a, R: CellRepository> {
    repo: &'a R,
}

impl<'a, R: CellRepository> CellCollector<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Collect `token` (if it carries a positive balance) and then enough
    /// capacity to reach `target_capacity`
    pub async fn collect(
        &self,
        target_capacity: u64,
        owner_lock: &Script,
        token: Option<&Token>,
    ) -> Result<CollectedCells> {
        let mut collected = CollectedCells::default();

        if let Some(token) = token.filter(|t| t.get_balance() > 0) {
            let (cells, amount) = self.collect_token(owner_lock, token).await?;
            collected.capacity = cells.iter().map(Cell::capacity).sum();
            collected.cells = cells;
            collected.token_amount = Some(amount);
        }

        self.top_up_capacity(target_capacity, owner_lock, &mut collected.cells, &mut collected.capacity)
            .await?;
        Ok(collected)
    }

    /// Collect each token independently, then top up capacity. Tokens with a
    /// zero balance yield 0 without touching the repository.
    pub async fn multi_collect(
        &self,
        target_capacity: u64,
        owner_lock: &Script,
        tokens: &[Token],
    ) -> Result<CollectedTokens> {
        let mut collected = CollectedTokens::default();

        for token in tokens {
            if token.get_balance() == 0 {
                collected.amounts.push(0);
                continue;
            }
            let (cells, amount) = self.collect_token(owner_lock, token).await?;
            collected.capacity += cells.iter().map(Cell::capacity).sum::<u64>();
            collected.cells.extend(cells);
            collected.amounts.push(amount);
        }

        self.top_up_capacity(target_capacity, owner_lock, &mut collected.cells, &mut collected.capacity)
            .await?;
        Ok(collected)
    }

    async fn collect_token(&self, owner_lock: &Script, token: &Token) -> Result<(Vec<Cell>, u128)> {
        let type_script = token.type_script.as_ref().ok_or_else(|| {
            SdkError::malformed(format!(
                "token 0x{} has no type script",
                hex::encode(token.type_hash)
            ))
        })?;
        let required = token.get_balance();

        let candidates = self
            .repo
            .collect_cells(&CellQuery::token(owner_lock, type_script))
            .await?;

        let mut cells = Vec::new();
        let mut amount: u128 = 0;
        for cell in candidates {
            if amount >= required {
                break;
            }
            let Some(cell_amount) = cell.sudt_amount() else {
                warn!(
                    "[CellCollector] skipping token cell 0x{}:{} with undecodable data",
                    hex::encode(cell.out_point.tx_hash),
                    cell.out_point.index
                );
                continue;
            };
            amount = amount.saturating_add(cell_amount);
            cells.push(cell);
        }

        if amount < required {
            return Err(SdkError::InsufficientFunds {
                asset: format!("token 0x{}", hex::encode(token.type_hash)),
                required,
                collected: amount,
                owner_lock_hash: hex::encode(owner_lock.hash()),
            });
        }

        debug!(
            "[CellCollector] collected {} of token 0x{} from {} cells",
            amount,
            hex::encode(token.type_hash),
            cells.len()
        );
        Ok((cells, amount))
    }

    async fn top_up_capacity(
        &self,
        target_capacity: u64,
        owner_lock: &Script,
        cells: &mut Vec<Cell>,
        capacity: &mut u64,
    ) -> Result<()> {
        if *capacity >= target_capacity {
            return Ok(());
        }

        let candidates = self
            .repo
            .collect_cells(&CellQuery::free_capacity(owner_lock))
            .await?;

        for cell in candidates {
            if *capacity >= target_capacity {
                break;
            }
            if !cell.is_free_capacity() || cells.iter().any(|c| c.out_point == cell.out_point) {
                continue;
            }
            *capacity = capacity.saturating_add(cell.capacity());
            cells.push(cell);
        }

        if *capacity < target_capacity {
            return Err(SdkError::InsufficientFunds {
                asset: "capacity".into(),
                required: target_capacity as u128,
                collected: *capacity as u128,
                owner_lock_hash: hex::encode(owner_lock.hash()),
            });
        }

        debug!(
            "[CellCollector] collected {} shannons in {} cells (target {})",
            capacity,
            cells.len(),
            target_capacity
        );
        Ok(())
    }
}
