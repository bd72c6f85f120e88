// ============ Bridge Match-Chain ============
// Classifies a CKB transaction hash against cross-chain bridge records.
//
// Records are split once into three disjoint partitions, probed in a fixed
// order; the first hit wins:
// 1. outbound (CKB -> Ethereum)
// 2. inbound whose recipient is a plain lock
// 3. inbound whose recipient is an order lock (bridged straight into an order)

use crate::model::{Hash256, Script};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeInfo {
    pub ckb_tx_hash: Hash256,
    pub eth_tx_hash: String,
    pub amount: u128,
    pub token_addr: String,
    pub recipient_lock: Script,
}

/// Bridge records as delivered by the record source
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeRecords {
    pub eth_to_ckb: Vec<BridgeInfo>,
    pub ckb_to_eth: Vec<BridgeInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeMatch {
    /// The bridged funds landed in an order request cell
    pub is_order: bool,
    /// Ethereum -> CKB
    pub is_in: bool,
    pub info: BridgeInfo,
}

#[derive(Clone, Debug, Default)]
pub struct BridgeMatcher {
    outbound: Vec<BridgeInfo>,
    inbound: Vec<BridgeInfo>,
    inbound_to_order: Vec<BridgeInfo>,
}

impl BridgeMatcher {
    pub fn new(records: BridgeRecords, order_lock_code_hashes: &[Hash256]) -> Self {
        let (inbound_to_order, inbound): (Vec<_>, Vec<_>) = records
            .eth_to_ckb
            .into_iter()
            .partition(|r| order_lock_code_hashes.contains(&r.recipient_lock.code_hash));

        Self {
            outbound: records.ckb_to_eth,
            inbound,
            inbound_to_order,
        }
    }

    /// `None` means the transaction is unrelated to the bridge
    pub fn match_tx(&self, tx_hash: &Hash256) -> Option<BridgeMatch> {
        let partitions: [(&[BridgeInfo], bool, bool); 3] = [
            (&self.outbound, false, false),
            (&self.inbound, false, true),
            (&self.inbound_to_order, true, true),
        ];

        partitions.iter().find_map(|(records, is_order, is_in)| {
            records
                .iter()
                .find(|r| &r.ckb_tx_hash == tx_hash)
                .map(|info| BridgeMatch {
                    is_order: *is_order,
                    is_in: *is_in,
                    info: info.clone(),
                })
        })
    }

    pub fn outbound(&self) -> &[BridgeInfo] {
        &self.outbound
    }

    pub fn inbound(&self) -> &[BridgeInfo] {
        &self.inbound
    }

    pub fn inbound_to_order(&self) -> &[BridgeInfo] {
        &self.inbound_to_order
    }
}
