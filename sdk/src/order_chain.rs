// ============ Order Chain Resolver ============
// Rebuilds the lifecycle of request cells from a set of transactions.
//
// A chain starts at a request cell (the origin) and follows each cell into
// the transaction that consumes it. The consuming transaction pairs input i
// with output i; that output either is the same order rewritten (same lock
// and type script, the chain continues) or the settlement cell handed back
// to the user (the chain ends there).
//
// Nodes live in one arena and link by index, so following never recurses.

use crate::bridge::{BridgeInfo, BridgeMatch, BridgeMatcher};
use crate::error::{Result, SdkError};
use crate::model::{Cell, Hash256, OutPoint, Script, Transaction, TxStatus};
use crate::repository::ScriptFilter;
use cellswap_types::{
    LiquidityFellowArgs, LiquidityRequestArgs, RequestArgs, SwapRequestArgs, CKB_TYPE_HASH,
};
use log::{debug, info};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub type NodeId = usize;

// ============ Targets ============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderKind {
    Swap,
    /// Single-token requests and the main half of token/token requests
    Liquidity,
    /// The second half of token/token liquidity requests
    LiquidityFellow,
}

impl OrderKind {
    pub fn args_len(self) -> usize {
        match self {
            OrderKind::Swap => SwapRequestArgs::SERIALIZED_SIZE,
            OrderKind::Liquidity => LiquidityRequestArgs::SERIALIZED_SIZE,
            OrderKind::LiquidityFellow => LiquidityFellowArgs::SERIALIZED_SIZE,
        }
    }

    pub fn is_liquidity(self) -> bool {
        !matches!(self, OrderKind::Swap)
    }
}

/// Which cells count as chain origins
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderTarget {
    pub lock: ScriptFilter,
    pub type_script: Option<Script>,
    pub kind: OrderKind,
    /// Keep only requests placed by this owner
    pub user_lock_hash: Option<Hash256>,
}

impl OrderTarget {
    fn args_of(&self, cell: &Cell) -> Option<RequestArgs> {
        if !self.lock.matches(cell.lock()) {
            return None;
        }
        if let Some(type_script) = &self.type_script {
            if cell.type_script() != Some(type_script) {
                return None;
            }
        }
        if cell.lock().args.len() != self.kind.args_len() {
            return None;
        }
        let args = RequestArgs::parse(&cell.lock().args)?;
        match self.user_lock_hash {
            Some(owner) if args.user_lock_hash() != &owner => None,
            _ => Some(args),
        }
    }
}

// ============ Status / Type ============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Open,
    Canceling,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum OrderType {
    Order,
    CrossChain,
    CrossChainOrder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ledger {
    Ckb,
    Ethereum,
}

/// One entry of an order's timeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderStep {
    pub ledger: Ledger,
    pub tx_hash: String,
    pub index: Option<u32>,
    pub confirmed: bool,
}

// ============ Arena ============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderNode {
    pub cell: Cell,
    pub tx_status: TxStatus,
    /// Set only by the resolver
    pub next: Option<NodeId>,
    pub is_live: bool,
}

impl OrderNode {
    pub fn tx_hash(&self) -> &Hash256 {
        &self.cell.out_point.tx_hash
    }

    pub fn output_index(&self) -> u32 {
        self.cell.out_point.index
    }

    pub fn data(&self) -> &[u8] {
        &self.cell.data
    }

    fn same_order(&self, cell: &Cell) -> bool {
        self.cell.output.lock == cell.output.lock
            && self.cell.output.type_script == cell.output.type_script
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ChainHead {
    origin: NodeId,
    args: RequestArgs,
    bridge: Option<BridgeMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOrders {
    kind: OrderKind,
    nodes: Vec<OrderNode>,
    heads: Vec<ChainHead>,
}

impl ResolvedOrders {
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&OrderNode> {
        self.nodes.get(id)
    }

    pub fn chains(&self) -> impl Iterator<Item = OrderChain<'_>> {
        self.heads.iter().map(move |head| OrderChain {
            arena: self,
            head,
        })
    }
}

// ============ Chain View ============

pub struct OrderChain<'a> {
    arena: &'a ResolvedOrders,
    head: &'a ChainHead,
}

impl<'a> OrderChain<'a> {
    pub fn origin(&self) -> &'a OrderNode {
        &self.arena.nodes[self.head.origin]
    }

    pub fn nodes(&self) -> Vec<&'a OrderNode> {
        let mut nodes = Vec::new();
        let mut current = Some(self.head.origin);
        while let Some(id) = current {
            let node = &self.arena.nodes[id];
            nodes.push(node);
            current = node.next;
        }
        nodes
    }

    pub fn terminal(&self) -> &'a OrderNode {
        let mut node = self.origin();
        while let Some(next) = node.next {
            node = &self.arena.nodes[next];
        }
        node
    }

    pub fn request_args(&self) -> &'a RequestArgs {
        &self.head.args
    }

    pub fn bridge(&self) -> Option<&'a BridgeInfo> {
        self.head.bridge.as_ref().map(|m| &m.info)
    }

    pub fn status(&self) -> OrderStatus {
        let origin = self.origin();
        let nodes = self.nodes();

        if self.arena.kind.is_liquidity() {
            return if nodes.len() < 2 {
                OrderStatus::Pending
            } else {
                OrderStatus::Completed
            };
        }

        if nodes.len() < 2 {
            return if origin.tx_status == TxStatus::Committed {
                OrderStatus::Open
            } else {
                OrderStatus::Pending
            };
        }

        // a rewrite still carrying the request is judged on what it holds
        let terminal = self.terminal();
        let RequestArgs::Swap(args) = &self.head.args else {
            return OrderStatus::Completed;
        };
        if swap_filled(args, origin, terminal) {
            OrderStatus::Completed
        } else {
            OrderStatus::Canceling
        }
    }

    /// Only an inbound transfer can feed an order. An outbound record on the
    /// origin transaction is the bridge leg leaving the ledger, so the order
    /// itself stays local.
    pub fn order_type(&self) -> OrderType {
        match &self.head.bridge {
            Some(m) if m.is_in && m.is_order => OrderType::CrossChainOrder,
            Some(m) if m.is_in => OrderType::CrossChain,
            _ => OrderType::Order,
        }
    }

    pub fn steps(&self) -> Vec<OrderStep> {
        let mut steps = Vec::new();
        if let Some(m) = self.head.bridge.as_ref().filter(|m| m.is_in && m.is_order) {
            steps.push(OrderStep {
                ledger: Ledger::Ethereum,
                tx_hash: m.info.eth_tx_hash.clone(),
                index: None,
                confirmed: true,
            });
        }
        steps.extend(self.nodes().into_iter().map(|node| OrderStep {
            ledger: Ledger::Ckb,
            tx_hash: format!("0x{}", hex::encode(node.tx_hash())),
            index: Some(node.output_index()),
            confirmed: node.tx_status == TxStatus::Committed,
        }));
        steps
    }
}

/// Whether the settlement delivered at least `min_amount_out`
fn swap_filled(args: &SwapRequestArgs, origin: &OrderNode, terminal: &OrderNode) -> bool {
    if args.token_type_hash == CKB_TYPE_HASH {
        // selling a token: the user is paid in capacity
        let received = terminal.cell.capacity().checked_sub(origin.cell.capacity());
        return matches!(received, Some(delta) if delta as u128 >= args.min_amount_out);
    }
    let received = if terminal.cell.asset_type_hash() == args.token_type_hash {
        terminal.cell.sudt_amount().unwrap_or(0)
    } else {
        0
    };
    received >= args.min_amount_out
}

// ============ Resolver ============

pub struct OrderChainResolver<'a> {
    target: OrderTarget,
    bridge: Option<&'a BridgeMatcher>,
}

impl<'a> OrderChainResolver<'a> {
    pub fn new(target: OrderTarget) -> Self {
        Self {
            target,
            bridge: None,
        }
    }

    pub fn with_bridge(mut self, bridge: &'a BridgeMatcher) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn resolve(&self, txs: &[Transaction]) -> Result<ResolvedOrders> {
        // (previous output) -> (consuming tx, input index)
        let mut consumers: HashMap<OutPoint, (&Transaction, usize)> = HashMap::new();
        for tx in txs {
            for (i, input) in tx.inputs.iter().enumerate() {
                consumers.insert(input.previous_output, (tx, i));
            }
        }

        let mut candidates: Vec<(Cell, TxStatus, RequestArgs)> = Vec::new();
        for tx in txs {
            for cell in tx.output_cells() {
                if let Some(args) = self.target.args_of(&cell) {
                    candidates.push((cell, tx.status, args));
                }
            }
        }

        // a candidate some other candidate flows into is not an origin
        let mut continued: HashSet<OutPoint> = HashSet::new();
        for (cell, _, _) in &candidates {
            if let Some((next, _)) = continuation(&consumers, cell)? {
                continued.insert(next.out_point);
            }
        }

        let mut resolved = ResolvedOrders {
            kind: self.target.kind,
            nodes: Vec::new(),
            heads: Vec::new(),
        };
        let mut tracked: HashSet<OutPoint> = HashSet::new();

        for (cell, status, args) in candidates {
            if continued.contains(&cell.out_point) || tracked.contains(&cell.out_point) {
                continue;
            }
            let bridge = self.bridge.and_then(|b| b.match_tx(&cell.out_point.tx_hash));
            let origin = self.follow(&mut resolved.nodes, &mut tracked, &consumers, cell, status)?;
            resolved.heads.push(ChainHead {
                origin,
                args,
                bridge,
            });
        }

        info!(
            "[OrderChainResolver] resolved {} {:?} chains ({} nodes) from {} transactions",
            resolved.heads.len(),
            self.target.kind,
            resolved.nodes.len(),
            txs.len()
        );
        Ok(resolved)
    }

    fn follow(
        &self,
        nodes: &mut Vec<OrderNode>,
        tracked: &mut HashSet<OutPoint>,
        consumers: &HashMap<OutPoint, (&Transaction, usize)>,
        origin: Cell,
        status: TxStatus,
    ) -> Result<NodeId> {
        let origin_id = push_node(nodes, tracked, origin, status)?;
        let mut current = origin_id;

        loop {
            let cell = nodes[current].cell.clone();
            let Some((next_cell, next_status)) = continuation(consumers, &cell)? else {
                nodes[current].is_live = true;
                break;
            };

            let still_order = nodes[origin_id].same_order(&next_cell);
            let next_id = push_node(nodes, tracked, next_cell, next_status)?;
            nodes[current].next = Some(next_id);
            current = next_id;

            if !still_order {
                // settled into a plain cell; its later history is the user's
                let settled = &nodes[current].cell;
                nodes[current].is_live = !consumers.contains_key(&settled.out_point);
                debug!(
                    "[OrderChainResolver] chain from 0x{} settled in 0x{}",
                    hex::encode(nodes[origin_id].tx_hash()),
                    hex::encode(nodes[current].tx_hash())
                );
                break;
            }
        }

        Ok(origin_id)
    }
}

fn push_node(
    nodes: &mut Vec<OrderNode>,
    tracked: &mut HashSet<OutPoint>,
    cell: Cell,
    tx_status: TxStatus,
) -> Result<NodeId> {
    if !tracked.insert(cell.out_point) {
        return Err(SdkError::protocol(
            &cell.out_point.tx_hash,
            format!("output {} reached twice while following a chain", cell.out_point.index),
        ));
    }
    nodes.push(OrderNode {
        cell,
        tx_status,
        next: None,
        is_live: false,
    });
    Ok(nodes.len() - 1)
}

/// The output continuing `cell`, if some transaction consumes it
fn continuation(
    consumers: &HashMap<OutPoint, (&Transaction, usize)>,
    cell: &Cell,
) -> Result<Option<(Cell, TxStatus)>> {
    let Some((tx, input_index)) = consumers.get(&cell.out_point) else {
        return Ok(None);
    };
    let next = tx.output_cell(*input_index as u32).ok_or_else(|| {
        SdkError::protocol(
            &tx.hash,
            format!(
                "input {} consumes order cell 0x{}:{} but the transaction has no output {}",
                input_index,
                hex::encode(cell.out_point.tx_hash),
                cell.out_point.index,
                input_index
            ),
        )
    })?;
    Ok(Some((next, tx.status)))
}

// ============ Cross-Chain History ============

/// A bridge transfer that never became an order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrossChainTransfer {
    pub is_in: bool,
    pub info: BridgeInfo,
}

impl CrossChainTransfer {
    pub fn order_type(&self) -> OrderType {
        OrderType::CrossChain
    }

    pub fn steps(&self) -> Vec<OrderStep> {
        let eth = OrderStep {
            ledger: Ledger::Ethereum,
            tx_hash: self.info.eth_tx_hash.clone(),
            index: None,
            confirmed: true,
        };
        let ckb = OrderStep {
            ledger: Ledger::Ckb,
            tx_hash: format!("0x{}", hex::encode(self.info.ckb_tx_hash)),
            index: None,
            confirmed: true,
        };
        if self.is_in {
            vec![eth, ckb]
        } else {
            vec![ckb, eth]
        }
    }
}

/// Everything an owner has done: resolved order chains plus bridge
/// transfers that never became orders
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderHistory {
    pub swaps: ResolvedOrders,
    pub liquidity: ResolvedOrders,
    pub cross_chain: Vec<CrossChainTransfer>,
}

impl OrderHistory {
    /// Plain bridge transfers (inbound to a plain lock, and outbound)
    pub fn pure_cross_chain(matcher: &BridgeMatcher) -> Vec<CrossChainTransfer> {
        let inbound = matcher.inbound().iter().map(|info| CrossChainTransfer {
            is_in: true,
            info: info.clone(),
        });
        let outbound = matcher.outbound().iter().map(|info| CrossChainTransfer {
            is_in: false,
            info: info.clone(),
        });
        inbound.chain(outbound).collect()
    }
}
