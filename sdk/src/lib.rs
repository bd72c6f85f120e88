// ============ CellSwap SDK ============
// Order tracking and transaction building for CellSwap pools on Nervos CKB.
// Builds unsigned transactions that any CKB wallet can sign, and rebuilds
// the history of a user's requests from the ledger.

pub mod bridge;
pub mod builder;
pub mod collector;
pub mod config;
pub mod error;
pub mod hash;
pub mod model;
pub mod order_chain;
pub mod repository;
pub mod rpc;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{
    BuiltTransaction, LiquidityRequest, Pairing, PoolIdentity, RemoveLiquidityRequest, SwapRequest,
    Tips, TransactionBuilder,
};
pub use config::ProtocolConfig;
pub use error::{Result, SdkError};
pub use model::{Cell, Hash256, Script, Token, Transaction, TransactionToSign};
pub use order_chain::{OrderHistory, OrderKind, OrderStatus, OrderTarget, OrderType};

use bridge::BridgeMatcher;
use log::info;
use model::TxStatus;
use order_chain::OrderChainResolver;
use repository::{BridgeRecordSource, CellRepository, QueryOrder, ScriptFilter, TxQuery, TypeFilter};
use std::collections::HashSet;

// ============ CellSwap SDK ============

pub struct CellSwapSDK<R: CellRepository> {
    config: ProtocolConfig,
    repo: R,
}

impl<R: CellRepository> CellSwapSDK<R> {
    pub fn new(config: ProtocolConfig, repo: R) -> Self {
        Self { config, repo }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn builder(&self) -> TransactionBuilder<'_, R> {
        TransactionBuilder::new(&self.config, &self.repo)
    }

    // ============ Pool Operations ============

    pub async fn create_liquidity_pool(
        &self,
        token_a: &Token,
        token_b: &Token,
        owner_lock: &Script,
    ) -> Result<(BuiltTransaction, PoolIdentity)> {
        self.builder().create_liquidity_pool(token_a, token_b, owner_lock).await
    }

    pub async fn genesis_liquidity(&self, request: &LiquidityRequest) -> Result<BuiltTransaction> {
        self.builder().genesis_liquidity(request).await
    }

    pub async fn add_liquidity(&self, request: &LiquidityRequest) -> Result<BuiltTransaction> {
        self.builder().add_liquidity(request).await
    }

    pub async fn remove_liquidity(&self, request: &RemoveLiquidityRequest) -> Result<BuiltTransaction> {
        self.builder().remove_liquidity(request).await
    }

    pub async fn swap(&self, request: &SwapRequest) -> Result<BuiltTransaction> {
        self.builder().swap(request).await
    }

    pub async fn cancel_request(&self, tx_hash: &Hash256, owner_lock: &Script) -> Result<BuiltTransaction> {
        self.builder().cancel_request(tx_hash, owner_lock).await
    }

    /// Submit a signed transaction
    pub async fn send_transaction(&self, tx: &TransactionToSign) -> Result<Hash256> {
        self.repo.send_transaction(tx).await
    }

    // ============ Order History ============

    pub async fn resolve_orders<B: BridgeRecordSource>(
        &self,
        owner_lock: &Script,
        bridge: &B,
    ) -> Result<OrderHistory> {
        let deployment = &self.config.deployment;
        let swap_lock = ScriptFilter::prefix(deployment.swap_lock.script(Vec::new()));
        let liquidity_lock = ScriptFilter::prefix(deployment.liquidity_lock.script(Vec::new()));
        let query = |lock: ScriptFilter| TxQuery {
            lock,
            type_filter: TypeFilter::Any,
            order: QueryOrder::Asc,
        };

        let swap_query = query(swap_lock.clone());
        let liquidity_query = query(liquidity_lock.clone());
        let owner_query = query(ScriptFilter::exact(owner_lock.clone()));

        let (swap_txs, liquidity_txs, owner_txs, records) = tokio::try_join!(
            self.repo.collect_transactions(&swap_query),
            self.repo.collect_transactions(&liquidity_query),
            self.repo.collect_transactions(&owner_query),
            bridge.bridge_records(owner_lock),
        )?;

        // the owner's own transactions tell whether settlements were spent
        let mut seen = HashSet::new();
        let txs: Vec<Transaction> = swap_txs
            .into_iter()
            .chain(liquidity_txs)
            .chain(owner_txs)
            .filter(|tx| seen.insert(tx.hash))
            .collect();

        let matcher = BridgeMatcher::new(records, &deployment.order_lock_code_hashes());
        let owner_hash = owner_lock.hash();
        let target = |lock: ScriptFilter, kind: OrderKind| OrderTarget {
            lock,
            type_script: None,
            kind,
            user_lock_hash: Some(owner_hash),
        };

        let swaps = OrderChainResolver::new(target(swap_lock, OrderKind::Swap))
            .with_bridge(&matcher)
            .resolve(&txs)?;
        let liquidity = OrderChainResolver::new(target(liquidity_lock, OrderKind::Liquidity))
            .with_bridge(&matcher)
            .resolve(&txs)?;
        let cross_chain = OrderHistory::pure_cross_chain(&matcher);

        let pending = txs.iter().filter(|tx| tx.status != TxStatus::Committed).count();
        info!(
            "[CellSwapSDK] owner 0x{}: {} swaps, {} liquidity requests, {} bridge transfers ({} pending txs)",
            hex::encode(owner_hash),
            swaps.len(),
            liquidity.len(),
            cross_chain.len(),
            pending
        );

        Ok(OrderHistory {
            swaps,
            liquidity,
            cross_chain,
        })
    }
}

// ============ Tests ============
