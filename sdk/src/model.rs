// ============ Cell / Transaction Model ============
// Ledger-agnostic representation of scripts, cells and transactions.
// These are the canonical internal forms; `rpc` translates them to and
// from the node's JSON field names, and the molecule encodings the ledger
// hashes and sizes come from `ckb_types::packed`.

use cellswap_types::{
    SudtCellData, CAPACITY_FIELD_BYTES, CKB_TYPE_HASH, SCRIPT_FIXED_BYTES, SHANNONS_PER_CKB,
};
use ckb_types::{bytes::Bytes, packed, prelude::Pack};
use molecule::prelude::{Builder, Entity};
use serde::{Deserialize, Serialize};

pub type Hash256 = [u8; 32];

fn hash256(hash: &packed::Byte32) -> Hash256 {
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_slice());
    out
}

fn packed_bytes(data: &[u8]) -> packed::Bytes {
    Bytes::from(data.to_vec()).pack()
}

// ============ Script ============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    Data,
    Type,
    Data1,
}

impl HashType {
    pub fn as_byte(self) -> u8 {
        match self {
            HashType::Data => 0,
            HashType::Type => 1,
            HashType::Data1 => 2,
        }
    }
}

/// Two scripts are the same script iff all three fields are byte-identical
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Script {
    pub code_hash: Hash256,
    pub hash_type: HashType,
    pub args: Vec<u8>,
}

impl Script {
    pub fn new(code_hash: Hash256, hash_type: HashType, args: Vec<u8>) -> Self {
        Self {
            code_hash,
            hash_type,
            args,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        packed::Script::from(self).as_slice().to_vec()
    }

    /// Content-addressed identifier of the script
    pub fn hash(&self) -> Hash256 {
        hash256(&packed::Script::from(self).calc_script_hash())
    }

    /// Bytes this script occupies in a cell's capacity accounting
    pub fn occupied_bytes(&self) -> u64 {
        SCRIPT_FIXED_BYTES + self.args.len() as u64
    }

    pub fn same_code(&self, other: &Script) -> bool {
        self.code_hash == other.code_hash && self.hash_type == other.hash_type
    }
}

// ============ OutPoint / Input / Dep ============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub tx_hash: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(tx_hash: Hash256, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellInput {
    pub previous_output: OutPoint,
    pub since: u64,
}

impl CellInput {
    pub fn new(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            since: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepType {
    Code,
    DepGroup,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellDep {
    pub out_point: OutPoint,
    pub dep_type: DepType,
}

impl DepType {
    pub fn as_byte(self) -> u8 {
        match self {
            DepType::Code => 0,
            DepType::DepGroup => 1,
        }
    }
}

// ============ Output / Cell ============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellOutput {
    pub capacity: u64,
    pub lock: Script,
    pub type_script: Option<Script>,
}

impl CellOutput {
    pub fn new(capacity: u64, lock: Script, type_script: Option<Script>) -> Self {
        Self {
            capacity,
            lock,
            type_script,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        packed::CellOutput::from(self).as_slice().to_vec()
    }

    /// Minimum capacity (shannons) for this output carrying `data_len` bytes
    pub fn occupied_capacity(&self, data_len: usize) -> u64 {
        occupied_capacity(&self.lock, self.type_script.as_ref(), data_len)
    }
}

pub fn occupied_capacity(lock: &Script, type_script: Option<&Script>, data_len: usize) -> u64 {
    let bytes = CAPACITY_FIELD_BYTES
        + lock.occupied_bytes()
        + type_script.map(Script::occupied_bytes).unwrap_or(0)
        + data_len as u64;
    bytes * SHANNONS_PER_CKB
}

/// Capacity of a plain cell owned by `lock`
pub fn free_cell_capacity(lock: &Script) -> u64 {
    occupied_capacity(lock, None, 0)
}

/// Capacity of a token cell owned by `lock` holding a 16-byte amount
pub fn sudt_cell_capacity(lock: &Script, sudt_type: &Script) -> u64 {
    occupied_capacity(lock, Some(sudt_type), SudtCellData::SERIALIZED_SIZE)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub output: CellOutput,
    pub out_point: OutPoint,
    pub data: Vec<u8>,
    pub block_number: Option<u64>,
}

impl Cell {
    pub fn capacity(&self) -> u64 {
        self.output.capacity
    }

    pub fn lock(&self) -> &Script {
        &self.output.lock
    }

    pub fn type_script(&self) -> Option<&Script> {
        self.output.type_script.as_ref()
    }

    /// Plain capacity: no data and no type script
    pub fn is_free_capacity(&self) -> bool {
        self.data.is_empty() && self.output.type_script.is_none()
    }

    /// sUDT amount carried by this cell, if it carries one
    pub fn sudt_amount(&self) -> Option<u128> {
        self.output.type_script.as_ref()?;
        SudtCellData::deserialize(&self.data).map(|d| d.amount)
    }

    /// Type hash naming the asset in this cell; CKB when untyped
    pub fn asset_type_hash(&self) -> Hash256 {
        self.output
            .type_script
            .as_ref()
            .map(Script::hash)
            .unwrap_or(CKB_TYPE_HASH)
    }

    pub fn to_input(&self) -> CellInput {
        CellInput::new(self.out_point)
    }
}

// ============ Transaction ============

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TxStatus {
    #[default]
    Pending,
    Proposed,
    Committed,
}

/// A ledger transaction as returned by the repository
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub hash: Hash256,
    pub version: u32,
    pub cell_deps: Vec<CellDep>,
    pub header_deps: Vec<Hash256>,
    pub inputs: Vec<CellInput>,
    pub outputs: Vec<CellOutput>,
    pub outputs_data: Vec<Vec<u8>>,
    pub witnesses: Vec<Vec<u8>>,
    pub block_number: Option<u64>,
    pub status: TxStatus,
}

impl Transaction {
    pub fn is_committed(&self) -> bool {
        self.status == TxStatus::Committed
    }

    pub fn output_cell(&self, index: u32) -> Option<Cell> {
        let output = self.outputs.get(index as usize)?;
        Some(Cell {
            output: output.clone(),
            out_point: OutPoint::new(self.hash, index),
            data: self.outputs_data.get(index as usize).cloned().unwrap_or_default(),
            block_number: self.block_number,
        })
    }

    pub fn output_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.outputs.len() as u32).filter_map(move |i| self.output_cell(i))
    }
}

// ============ Molecule Encoding ============

impl From<&Script> for packed::Script {
    fn from(script: &Script) -> Self {
        packed::Script::new_builder()
            .code_hash(script.code_hash.pack())
            .hash_type(packed::Byte::new(script.hash_type.as_byte()))
            .args(packed_bytes(&script.args))
            .build()
    }
}

impl From<&OutPoint> for packed::OutPoint {
    fn from(out_point: &OutPoint) -> Self {
        packed::OutPoint::new_builder()
            .tx_hash(out_point.tx_hash.pack())
            .index(out_point.index.pack())
            .build()
    }
}

impl From<&CellInput> for packed::CellInput {
    fn from(input: &CellInput) -> Self {
        packed::CellInput::new_builder()
            .since(input.since.pack())
            .previous_output((&input.previous_output).into())
            .build()
    }
}

impl From<&CellDep> for packed::CellDep {
    fn from(dep: &CellDep) -> Self {
        packed::CellDep::new_builder()
            .out_point((&dep.out_point).into())
            .dep_type(packed::Byte::new(dep.dep_type.as_byte()))
            .build()
    }
}

impl From<&CellOutput> for packed::CellOutput {
    fn from(output: &CellOutput) -> Self {
        let type_script = packed::ScriptOpt::new_builder()
            .set(output.type_script.as_ref().map(packed::Script::from))
            .build();
        packed::CellOutput::new_builder()
            .capacity(output.capacity.pack())
            .lock((&output.lock).into())
            .type_(type_script)
            .build()
    }
}

// ============ Token ============

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(rename = "logoURI")]
    pub logo_uri: String,
}

/// Cross-chain origin of a shadow token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowFrom {
    pub chain: String,
    pub address: String,
}

/// An asset identity plus an optional amount. CKB is the token whose
/// `type_hash` is `CKB_TYPE_HASH` and whose `type_script` is `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub type_hash: Hash256,
    pub type_script: Option<Script>,
    pub info: Option<TokenInfo>,
    pub shadow_from: Option<ShadowFrom>,
    pub balance: Option<u128>,
}

impl Token {
    pub fn ckb(balance: u128) -> Self {
        Self {
            type_hash: CKB_TYPE_HASH,
            type_script: None,
            info: None,
            shadow_from: None,
            balance: Some(balance),
        }
    }

    pub fn sudt(type_script: Script, balance: u128) -> Self {
        Self {
            type_hash: type_script.hash(),
            type_script: Some(type_script),
            info: None,
            shadow_from: None,
            balance: Some(balance),
        }
    }

    pub fn is_ckb(&self) -> bool {
        self.type_hash == CKB_TYPE_HASH
    }

    /// Absent balance reads as zero
    pub fn get_balance(&self) -> u128 {
        self.balance.unwrap_or(0)
    }

    pub fn with_balance(&self, balance: u128) -> Self {
        Self {
            balance: Some(balance),
            ..self.clone()
        }
    }
}

// ============ Transaction To Sign ============

/// WitnessArgs with a zero-filled lock of `lock_size` bytes
pub fn witness_placeholder(lock_size: usize) -> Vec<u8> {
    let lock = packed::BytesOpt::new_builder()
        .set(Some(packed_bytes(&vec![0u8; lock_size])))
        .build();
    packed::WitnessArgs::new_builder().lock(lock).build().as_slice().to_vec()
}

/// The unsigned transaction handed to an external signer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionToSign {
    pub version: u32,
    pub cell_deps: Vec<CellDep>,
    pub header_deps: Vec<Hash256>,
    pub inputs: Vec<CellInput>,
    pub outputs: Vec<CellOutput>,
    pub outputs_data: Vec<Vec<u8>>,
    pub witnesses: Vec<Vec<u8>>,
}

impl TransactionToSign {
    pub fn to_packed_raw(&self) -> packed::RawTransaction {
        let cell_deps = packed::CellDepVec::new_builder()
            .set(self.cell_deps.iter().map(packed::CellDep::from).collect())
            .build();
        let header_deps = packed::Byte32Vec::new_builder()
            .set(self.header_deps.iter().map(|h| h.pack()).collect())
            .build();
        let inputs = packed::CellInputVec::new_builder()
            .set(self.inputs.iter().map(packed::CellInput::from).collect())
            .build();
        let outputs = packed::CellOutputVec::new_builder()
            .set(self.outputs.iter().map(packed::CellOutput::from).collect())
            .build();
        let outputs_data = packed::BytesVec::new_builder()
            .set(self.outputs_data.iter().map(|d| packed_bytes(d)).collect())
            .build();

        packed::RawTransaction::new_builder()
            .version(self.version.pack())
            .cell_deps(cell_deps)
            .header_deps(header_deps)
            .inputs(inputs)
            .outputs(outputs)
            .outputs_data(outputs_data)
            .build()
    }

    pub fn to_packed(&self) -> packed::Transaction {
        let witnesses = packed::BytesVec::new_builder()
            .set(self.witnesses.iter().map(|w| packed_bytes(w)).collect())
            .build();
        packed::Transaction::new_builder()
            .raw(self.to_packed_raw())
            .witnesses(witnesses)
            .build()
    }

    pub fn serialize_raw(&self) -> Vec<u8> {
        self.to_packed_raw().as_slice().to_vec()
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.to_packed().as_slice().to_vec()
    }

    /// Witnesses are not part of the hash
    pub fn hash(&self) -> Hash256 {
        hash256(&self.to_packed_raw().calc_tx_hash())
    }

    /// Size the ledger charges for: the transaction plus its offset in the block
    pub fn serialized_size(&self) -> usize {
        self.to_packed().serialized_size_in_block()
    }

    /// Fee at `fee_rate` shannons per 1000 bytes, rounded up
    pub fn fee(&self, fee_rate: u64) -> u64 {
        let size = self.serialized_size() as u64;
        (size * fee_rate).div_ceil(1000)
    }

    pub fn output_capacity(&self) -> u64 {
        self.outputs.iter().map(|o| o.capacity).sum()
    }

    /// View as a ledger transaction, e.g. to store in a repository once sent
    pub fn to_transaction(&self, status: TxStatus) -> Transaction {
        Transaction {
            hash: self.hash(),
            version: self.version,
            cell_deps: self.cell_deps.clone(),
            header_deps: self.header_deps.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            outputs_data: self.outputs_data.clone(),
            witnesses: self.witnesses.clone(),
            block_number: None,
            status,
        }
    }
}
