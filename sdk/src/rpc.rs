// ============ JSON-RPC Boundary ============
// Conversions between the internal model and the CKB node / indexer
// JSON-RPC types of `ckb_jsonrpc_types`. Byte strings travel as 0x-prefixed
// hex, integers as 0x-prefixed hex quantities.

use crate::error::{Result, SdkError};
use crate::model::*;
use ckb_jsonrpc_types as json;
use ckb_jsonrpc_types::{JsonBytes, Uint32, Uint64};
use ckb_types::H256;
use serde::{Deserialize, Serialize};

/// serde adapter for 0x-hex encoded 32-byte hashes
pub mod hex_hash {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash256, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        H256(*hash).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Hash256, D::Error> {
        Ok(H256::deserialize(deserializer)?.0)
    }
}

// ============ Envelopes ============

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RpcTxStatus {
    pub status: String,
    #[serde(default)]
    pub block_number: Option<Uint64>,
}

/// `get_transaction` response body
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RpcTransactionWithStatus {
    pub transaction: json::TransactionView,
    pub tx_status: RpcTxStatus,
}

/// Indexer `get_cells` item
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RpcCell {
    pub output: json::CellOutput,
    #[serde(default)]
    pub output_data: Option<JsonBytes>,
    pub out_point: json::OutPoint,
    pub block_number: Uint64,
}

/// Hand-off artifact for an external signer. The transaction's field order
/// is the order signers expect.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RpcSignableTransaction {
    pub transaction: json::Transaction,
    pub fee: Uint64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RpcToken {
    pub type_hash: H256,
    #[serde(default)]
    pub type_script: Option<json::Script>,
    #[serde(default)]
    pub info: Option<TokenInfo>,
    #[serde(default)]
    pub shadow_from: Option<ShadowFrom>,
    /// Decimal integer string
    #[serde(default)]
    pub balance: Option<String>,
}

// ============ Model -> Wire ============

impl From<HashType> for json::ScriptHashType {
    fn from(hash_type: HashType) -> Self {
        match hash_type {
            HashType::Data => json::ScriptHashType::Data,
            HashType::Type => json::ScriptHashType::Type,
            HashType::Data1 => json::ScriptHashType::Data1,
        }
    }
}

impl From<DepType> for json::DepType {
    fn from(dep_type: DepType) -> Self {
        match dep_type {
            DepType::Code => json::DepType::Code,
            DepType::DepGroup => json::DepType::DepGroup,
        }
    }
}

impl From<&Script> for json::Script {
    fn from(script: &Script) -> Self {
        json::Script {
            code_hash: H256(script.code_hash),
            hash_type: script.hash_type.into(),
            args: JsonBytes::from_vec(script.args.clone()),
        }
    }
}

impl From<&OutPoint> for json::OutPoint {
    fn from(out_point: &OutPoint) -> Self {
        json::OutPoint {
            tx_hash: H256(out_point.tx_hash),
            index: Uint32::from(out_point.index),
        }
    }
}

impl From<&CellInput> for json::CellInput {
    fn from(input: &CellInput) -> Self {
        json::CellInput {
            since: Uint64::from(input.since),
            previous_output: (&input.previous_output).into(),
        }
    }
}

impl From<&CellOutput> for json::CellOutput {
    fn from(output: &CellOutput) -> Self {
        json::CellOutput {
            capacity: Uint64::from(output.capacity),
            lock: (&output.lock).into(),
            type_: output.type_script.as_ref().map(json::Script::from),
        }
    }
}

impl From<&CellDep> for json::CellDep {
    fn from(dep: &CellDep) -> Self {
        json::CellDep {
            out_point: (&dep.out_point).into(),
            dep_type: dep.dep_type.into(),
        }
    }
}

impl From<&TransactionToSign> for json::Transaction {
    fn from(tx: &TransactionToSign) -> Self {
        json::Transaction {
            version: Uint32::from(tx.version),
            cell_deps: tx.cell_deps.iter().map(json::CellDep::from).collect(),
            header_deps: tx.header_deps.iter().map(|h| H256(*h)).collect(),
            inputs: tx.inputs.iter().map(json::CellInput::from).collect(),
            outputs: tx.outputs.iter().map(json::CellOutput::from).collect(),
            outputs_data: tx.outputs_data.iter().map(|d| JsonBytes::from_vec(d.clone())).collect(),
            witnesses: tx.witnesses.iter().map(|w| JsonBytes::from_vec(w.clone())).collect(),
        }
    }
}

impl From<&Cell> for RpcCell {
    fn from(cell: &Cell) -> Self {
        Self {
            output: (&cell.output).into(),
            output_data: Some(JsonBytes::from_vec(cell.data.clone())),
            out_point: (&cell.out_point).into(),
            block_number: Uint64::from(cell.block_number.unwrap_or(0)),
        }
    }
}

impl From<&Token> for RpcToken {
    fn from(token: &Token) -> Self {
        Self {
            type_hash: H256(token.type_hash),
            type_script: token.type_script.as_ref().map(json::Script::from),
            info: token.info.clone(),
            shadow_from: token.shadow_from.clone(),
            balance: token.balance.map(|b| b.to_string()),
        }
    }
}

// ============ Wire -> Model ============

impl TryFrom<json::ScriptHashType> for HashType {
    type Error = SdkError;

    fn try_from(hash_type: json::ScriptHashType) -> Result<Self> {
        match hash_type {
            json::ScriptHashType::Data => Ok(HashType::Data),
            json::ScriptHashType::Type => Ok(HashType::Type),
            json::ScriptHashType::Data1 => Ok(HashType::Data1),
            #[allow(unreachable_patterns)]
            other => Err(SdkError::Codec(format!("unsupported hash type {:?}", other))),
        }
    }
}

impl From<json::DepType> for DepType {
    fn from(dep_type: json::DepType) -> Self {
        match dep_type {
            json::DepType::Code => DepType::Code,
            json::DepType::DepGroup => DepType::DepGroup,
        }
    }
}

impl TryFrom<&json::Script> for Script {
    type Error = SdkError;

    fn try_from(script: &json::Script) -> Result<Self> {
        Ok(Script {
            code_hash: script.code_hash.0,
            hash_type: script.hash_type.clone().try_into()?,
            args: script.args.as_bytes().to_vec(),
        })
    }
}

impl From<&json::OutPoint> for OutPoint {
    fn from(out_point: &json::OutPoint) -> Self {
        OutPoint {
            tx_hash: out_point.tx_hash.0,
            index: out_point.index.value(),
        }
    }
}

impl From<&json::CellInput> for CellInput {
    fn from(input: &json::CellInput) -> Self {
        CellInput {
            previous_output: (&input.previous_output).into(),
            since: input.since.value(),
        }
    }
}

impl TryFrom<&json::CellOutput> for CellOutput {
    type Error = SdkError;

    fn try_from(output: &json::CellOutput) -> Result<Self> {
        Ok(CellOutput {
            capacity: output.capacity.value(),
            lock: (&output.lock).try_into()?,
            type_script: output.type_.as_ref().map(Script::try_from).transpose()?,
        })
    }
}

impl From<&json::CellDep> for CellDep {
    fn from(dep: &json::CellDep) -> Self {
        CellDep {
            out_point: (&dep.out_point).into(),
            dep_type: dep.dep_type.clone().into(),
        }
    }
}

impl TryFrom<&RpcCell> for Cell {
    type Error = SdkError;

    fn try_from(cell: &RpcCell) -> Result<Self> {
        Ok(Cell {
            output: (&cell.output).try_into()?,
            out_point: (&cell.out_point).into(),
            data: cell
                .output_data
                .as_ref()
                .map(|d| d.as_bytes().to_vec())
                .unwrap_or_default(),
            block_number: Some(cell.block_number.value()),
        })
    }
}

impl TryFrom<&RpcTransactionWithStatus> for Transaction {
    type Error = SdkError;

    fn try_from(rpc: &RpcTransactionWithStatus) -> Result<Self> {
        let view = &rpc.transaction;
        let tx = &view.inner;
        let status = match rpc.tx_status.status.as_str() {
            "pending" => TxStatus::Pending,
            "proposed" => TxStatus::Proposed,
            "committed" => TxStatus::Committed,
            other => return Err(SdkError::Codec(format!("unknown tx status {}", other))),
        };

        Ok(Transaction {
            hash: view.hash.0,
            version: tx.version.value(),
            cell_deps: tx.cell_deps.iter().map(CellDep::from).collect(),
            header_deps: tx.header_deps.iter().map(|h| h.0).collect(),
            inputs: tx.inputs.iter().map(CellInput::from).collect(),
            outputs: tx.outputs.iter().map(CellOutput::try_from).collect::<Result<_>>()?,
            outputs_data: tx.outputs_data.iter().map(|d| d.as_bytes().to_vec()).collect(),
            witnesses: tx.witnesses.iter().map(|w| w.as_bytes().to_vec()).collect(),
            block_number: rpc.tx_status.block_number.as_ref().map(|n| n.value()),
            status,
        })
    }
}

impl TryFrom<&RpcToken> for Token {
    type Error = SdkError;

    fn try_from(token: &RpcToken) -> Result<Self> {
        let balance = token
            .balance
            .as_deref()
            .map(|b| {
                b.parse::<u128>()
                    .map_err(|_| SdkError::malformed(format!("token balance {:?} is not an integer", b)))
            })
            .transpose()?;
        Ok(Token {
            type_hash: token.type_hash.0,
            type_script: token.type_script.as_ref().map(Script::try_from).transpose()?,
            info: token.info.clone(),
            shadow_from: token.shadow_from.clone(),
            balance,
        })
    }
}

impl TransactionToSign {
    pub fn to_rpc(&self, fee: u64) -> RpcSignableTransaction {
        RpcSignableTransaction {
            transaction: self.into(),
            fee: Uint64::from(fee),
        }
    }

    pub fn to_json(&self, fee: u64) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_rpc(fee))?)
    }
}
