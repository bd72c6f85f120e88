// ============ Cell Repository ============
// The external indexer the SDK reads cells and transactions from, and the
// node it submits transactions to. I/O errors surface as
// `SdkError::Repository` and are never retried here.

use crate::bridge::{BridgeInfo, BridgeRecords};
use crate::error::{Result, SdkError};
use crate::model::{Cell, Hash256, OutPoint, Script, Transaction, TransactionToSign, TxStatus};
use async_trait::async_trait;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

// ============ Queries ============

/// Matches a script exactly, or by prefix of its args when `args_prefix_only`
/// is set (request locks carry variable tails after a fixed prefix)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptFilter {
    pub script: Script,
    pub args_prefix_only: bool,
}

impl ScriptFilter {
    pub fn exact(script: Script) -> Self {
        Self {
            script,
            args_prefix_only: false,
        }
    }

    pub fn prefix(script: Script) -> Self {
        Self {
            script,
            args_prefix_only: true,
        }
    }

    pub fn matches(&self, script: &Script) -> bool {
        if !self.script.same_code(script) {
            return false;
        }
        if self.args_prefix_only {
            script.args.starts_with(&self.script.args)
        } else {
            script.args == self.script.args
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TypeFilter {
    #[default]
    Any,
    Empty,
    Script(ScriptFilter),
}

impl TypeFilter {
    pub fn matches(&self, type_script: Option<&Script>) -> bool {
        match (self, type_script) {
            (TypeFilter::Any, _) => true,
            (TypeFilter::Empty, None) => true,
            (TypeFilter::Empty, Some(_)) => false,
            (TypeFilter::Script(filter), Some(script)) => filter.matches(script),
            (TypeFilter::Script(_), None) => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataFilter {
    #[default]
    Any,
    Empty,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellQuery {
    pub lock: Option<ScriptFilter>,
    pub type_filter: TypeFilter,
    pub data: DataFilter,
    pub limit: Option<usize>,
}

impl CellQuery {
    /// Plain capacity cells of `owner`
    pub fn free_capacity(owner: &Script) -> Self {
        Self {
            lock: Some(ScriptFilter::exact(owner.clone())),
            type_filter: TypeFilter::Empty,
            data: DataFilter::Empty,
            limit: None,
        }
    }

    /// Token cells of `owner` typed by `token_type`
    pub fn token(owner: &Script, token_type: &Script) -> Self {
        Self {
            lock: Some(ScriptFilter::exact(owner.clone())),
            type_filter: TypeFilter::Script(ScriptFilter::exact(token_type.clone())),
            data: DataFilter::Any,
            limit: None,
        }
    }

    pub fn matches(&self, cell: &Cell) -> bool {
        if let Some(lock) = &self.lock {
            if !lock.matches(cell.lock()) {
                return false;
            }
        }
        if !self.type_filter.matches(cell.type_script()) {
            return false;
        }
        match self.data {
            DataFilter::Any => true,
            DataFilter::Empty => cell.data.is_empty(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryOrder {
    #[default]
    Asc,
    Desc,
}

/// Transactions touching a lock (in inputs or outputs)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxQuery {
    pub lock: ScriptFilter,
    pub type_filter: TypeFilter,
    pub order: QueryOrder,
}

// ============ Traits ============

#[async_trait]
pub trait CellRepository: Send + Sync {
    /// Live cells matching `query`, in repository order
    async fn collect_cells(&self, query: &CellQuery) -> Result<Vec<Cell>>;

    async fn collect_transactions(&self, query: &TxQuery) -> Result<Vec<Transaction>>;

    async fn get_transaction(&self, hash: &Hash256) -> Result<Transaction>;

    /// Submit a signed transaction; returns its hash
    async fn send_transaction(&self, tx: &TransactionToSign) -> Result<Hash256>;
}

#[async_trait]
pub trait BridgeRecordSource: Send + Sync {
    async fn bridge_records(&self, owner_lock: &Script) -> Result<BridgeRecords>;
}

// ============ In-Memory Repository ============

/// Repository over an in-memory ledger. Live cells are the outputs of
/// stored transactions that no stored transaction consumes.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    transactions: Arc<RwLock<Vec<Transaction>>>,
    sent: Arc<RwLock<Vec<Hash256>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Arc::new(RwLock::new(transactions)),
            sent: Arc::default(),
        }
    }

    pub async fn insert(&self, tx: Transaction) {
        self.transactions.write().await.push(tx);
    }

    /// Mark a stored transaction committed at `block_number`
    pub async fn commit(&self, hash: &Hash256, block_number: u64) -> Result<()> {
        let mut txs = self.transactions.write().await;
        let tx = txs
            .iter_mut()
            .find(|tx| &tx.hash == hash)
            .ok_or_else(|| SdkError::Repository(format!("unknown tx 0x{}", hex::encode(hash))))?;
        tx.status = TxStatus::Committed;
        tx.block_number = Some(block_number);
        Ok(())
    }

    pub async fn sent_transactions(&self) -> Vec<Hash256> {
        self.sent.read().await.clone()
    }

    fn spent_out_points(txs: &[Transaction]) -> HashSet<OutPoint> {
        txs.iter()
            .flat_map(|tx| tx.inputs.iter().map(|i| i.previous_output))
            .collect()
    }
}

#[async_trait]
impl CellRepository for MemoryRepository {
    async fn collect_cells(&self, query: &CellQuery) -> Result<Vec<Cell>> {
        let txs = self.transactions.read().await;
        let spent = Self::spent_out_points(&txs);

        let cells: Vec<Cell> = txs
            .iter()
            .flat_map(|tx| tx.output_cells())
            .filter(|cell| !spent.contains(&cell.out_point))
            .filter(|cell| query.matches(cell))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        debug!("[MemoryRepository] {} cells match query", cells.len());
        Ok(cells)
    }

    async fn collect_transactions(&self, query: &TxQuery) -> Result<Vec<Transaction>> {
        let txs = self.transactions.read().await;
        let outputs: HashMap<OutPoint, Cell> = txs
            .iter()
            .flat_map(|tx| tx.output_cells())
            .map(|cell| (cell.out_point, cell))
            .collect();

        let touches = |cell: &Cell| {
            query.lock.matches(cell.lock()) && query.type_filter.matches(cell.type_script())
        };

        let mut matched: Vec<Transaction> = txs
            .iter()
            .filter(|tx| {
                tx.output_cells().any(|cell| touches(&cell))
                    || tx
                        .inputs
                        .iter()
                        .filter_map(|input| outputs.get(&input.previous_output))
                        .any(|cell| touches(cell))
            })
            .cloned()
            .collect();

        if query.order == QueryOrder::Desc {
            matched.reverse();
        }
        Ok(matched)
    }

    async fn get_transaction(&self, hash: &Hash256) -> Result<Transaction> {
        self.transactions
            .read()
            .await
            .iter()
            .find(|tx| &tx.hash == hash)
            .cloned()
            .ok_or_else(|| SdkError::Repository(format!("transaction 0x{} not found", hex::encode(hash))))
    }

    async fn send_transaction(&self, tx: &TransactionToSign) -> Result<Hash256> {
        let hash = tx.hash();
        // check and insert under one guard so two sends cannot both pass
        let mut txs = self.transactions.write().await;
        let spent = Self::spent_out_points(&txs);
        if let Some(input) = tx.inputs.iter().find(|i| spent.contains(&i.previous_output)) {
            return Err(SdkError::Repository(format!(
                "input 0x{}:{} already spent",
                hex::encode(input.previous_output.tx_hash),
                input.previous_output.index
            )));
        }
        txs.push(tx.to_transaction(TxStatus::Pending));
        self.sent.write().await.push(hash);
        drop(txs);
        info!("[MemoryRepository] accepted tx 0x{}", hex::encode(hash));
        Ok(hash)
    }
}

/// Fixed bridge records, served to every owner
#[derive(Clone, Debug, Default)]
pub struct MemoryBridgeSource {
    pub eth_to_ckb: Vec<BridgeInfo>,
    pub ckb_to_eth: Vec<BridgeInfo>,
}

#[async_trait]
impl BridgeRecordSource for MemoryBridgeSource {
    async fn bridge_records(&self, _owner_lock: &Script) -> Result<BridgeRecords> {
        Ok(BridgeRecords {
            eth_to_ckb: self.eth_to_ckb.clone(),
            ckb_to_eth: self.ckb_to_eth.clone(),
        })
    }
}
