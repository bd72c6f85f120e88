// ============ CellSwap Cell Layouts ============
// Fixed-offset encoders/decoders for every cell kind the protocol writes:
// info cells, sUDT pool cells, liquidity requests and swap requests.
// All integers are little-endian; hashes are raw 32-byte values.

#![cfg_attr(feature = "no_std", no_std)]

// ============ Version Constants ============

pub const SWAP_REQUEST_VERSION: u8 = 1;
pub const LIQUIDITY_REQUEST_VERSION: u8 = 1;

// ============ Asset Constants ============

/// Type hash used for the native asset (CKB has no type script)
pub const CKB_TYPE_HASH: [u8; 32] = [0u8; 32];

pub const SHANNONS_PER_CKB: u64 = 100_000_000;

/// Bytes of the `capacity` field every output carries
pub const CAPACITY_FIELD_BYTES: u64 = 8;

/// code_hash (32) + hash_type (1), excluding args
pub const SCRIPT_FIXED_BYTES: u64 = 33;

// ============ Tips ============

/// Deal-maker tips embedded in liquidity request args
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TipsArgs {
    pub tips_ckb: u64,
    pub tips_sudt_x: u128,
    pub tips_sudt_y: u128,
}

impl TipsArgs {
    pub const SERIALIZED_SIZE: usize = 8 + 16 + 16; // 40

    pub fn serialize(&self) -> [u8; Self::SERIALIZED_SIZE] {
        let mut buf = [0u8; Self::SERIALIZED_SIZE];
        buf[0..8].copy_from_slice(&self.tips_ckb.to_le_bytes());
        buf[8..24].copy_from_slice(&self.tips_sudt_x.to_le_bytes());
        buf[24..40].copy_from_slice(&self.tips_sudt_y.to_le_bytes());
        buf
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SERIALIZED_SIZE {
            return None;
        }
        Some(Self {
            tips_ckb: u64::from_le_bytes(data[0..8].try_into().ok()?),
            tips_sudt_x: u128::from_le_bytes(data[8..24].try_into().ok()?),
            tips_sudt_y: u128::from_le_bytes(data[24..40].try_into().ok()?),
        })
    }
}

// ============ Info Cell ============

/// Info cell lock args - binds the info cell to its asset pair and pool identity
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InfoCellArgs {
    pub pair_hash: [u8; 32],
    pub info_type_hash: [u8; 32],
}

impl InfoCellArgs {
    pub const SERIALIZED_SIZE: usize = 32 + 32; // 64

    pub fn serialize(&self) -> [u8; Self::SERIALIZED_SIZE] {
        let mut buf = [0u8; Self::SERIALIZED_SIZE];
        buf[0..32].copy_from_slice(&self.pair_hash);
        buf[32..64].copy_from_slice(&self.info_type_hash);
        buf
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SERIALIZED_SIZE {
            return None;
        }
        Some(Self {
            pair_hash: data[0..32].try_into().ok()?,
            info_type_hash: data[32..64].try_into().ok()?,
        })
    }
}

/// Info cell data - pool reserves and LP token identity.
/// In token/token pools `ckb_reserve` holds the reserve of token X.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InfoCellData {
    pub ckb_reserve: u128,
    pub sudt_reserve: u128,
    pub total_liquidity: u128,
    pub lp_token_type_hash20: [u8; 20],
}

impl InfoCellData {
    pub const SERIALIZED_SIZE: usize = 16 + 16 + 16 + 20; // 68

    pub fn serialize(&self) -> [u8; Self::SERIALIZED_SIZE] {
        let mut buf = [0u8; Self::SERIALIZED_SIZE];
        let mut offset = 0;

        buf[offset..offset + 16].copy_from_slice(&self.ckb_reserve.to_le_bytes());
        offset += 16;
        buf[offset..offset + 16].copy_from_slice(&self.sudt_reserve.to_le_bytes());
        offset += 16;
        buf[offset..offset + 16].copy_from_slice(&self.total_liquidity.to_le_bytes());
        offset += 16;
        buf[offset..offset + 20].copy_from_slice(&self.lp_token_type_hash20);

        buf
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SERIALIZED_SIZE {
            return None;
        }
        let mut offset = 0;
        let mut result = Self::default();

        result.ckb_reserve = u128::from_le_bytes(data[offset..offset + 16].try_into().ok()?);
        offset += 16;
        result.sudt_reserve = u128::from_le_bytes(data[offset..offset + 16].try_into().ok()?);
        offset += 16;
        result.total_liquidity = u128::from_le_bytes(data[offset..offset + 16].try_into().ok()?);
        offset += 16;
        result.lp_token_type_hash20.copy_from_slice(&data[offset..offset + 20]);

        Some(result)
    }
}

// ============ sUDT Cell ============

/// sUDT amount - data of pool cells and every fungible-token cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SudtCellData {
    pub amount: u128,
}

impl SudtCellData {
    pub const SERIALIZED_SIZE: usize = 16;

    pub fn new(amount: u128) -> Self {
        Self { amount }
    }

    pub fn serialize(&self) -> [u8; Self::SERIALIZED_SIZE] {
        self.amount.to_le_bytes()
    }

    /// Trailing bytes past the amount are tolerated (extension data)
    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SERIALIZED_SIZE {
            return None;
        }
        Some(Self {
            amount: u128::from_le_bytes(data[0..16].try_into().ok()?),
        })
    }
}

// ============ Liquidity Request ============

/// Liquidity request lock args (single-token cell, or the main half of a
/// token/token request)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiquidityRequestArgs {
    pub info_type_hash: [u8; 32],
    pub user_lock_hash: [u8; 32],
    pub version: u8,
    pub sudt_min: u128,
    pub ckb_min: u128,
    pub tips: TipsArgs,
}

impl LiquidityRequestArgs {
    pub const SERIALIZED_SIZE: usize = 32 + 32 + 1 + 16 + 16 + TipsArgs::SERIALIZED_SIZE; // 137

    pub fn serialize(&self) -> [u8; Self::SERIALIZED_SIZE] {
        let mut buf = [0u8; Self::SERIALIZED_SIZE];
        let mut offset = 0;

        buf[offset..offset + 32].copy_from_slice(&self.info_type_hash);
        offset += 32;
        buf[offset..offset + 32].copy_from_slice(&self.user_lock_hash);
        offset += 32;
        buf[offset] = self.version;
        offset += 1;
        buf[offset..offset + 16].copy_from_slice(&self.sudt_min.to_le_bytes());
        offset += 16;
        buf[offset..offset + 16].copy_from_slice(&self.ckb_min.to_le_bytes());
        offset += 16;
        buf[offset..offset + TipsArgs::SERIALIZED_SIZE].copy_from_slice(&self.tips.serialize());

        buf
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SERIALIZED_SIZE {
            return None;
        }
        let mut offset = 0;
        let mut result = Self::default();

        result.info_type_hash.copy_from_slice(&data[offset..offset + 32]);
        offset += 32;
        result.user_lock_hash.copy_from_slice(&data[offset..offset + 32]);
        offset += 32;
        result.version = data[offset];
        offset += 1;
        result.sudt_min = u128::from_le_bytes(data[offset..offset + 16].try_into().ok()?);
        offset += 16;
        result.ckb_min = u128::from_le_bytes(data[offset..offset + 16].try_into().ok()?);
        offset += 16;
        result.tips = TipsArgs::deserialize(&data[offset..])?;

        Some(result)
    }
}

/// Lock args of the second half of a token/token liquidity request.
/// Points back at the main cell through its lock script hash.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiquidityFellowArgs {
    pub main_lock_hash: [u8; 32],
    pub user_lock_hash: [u8; 32],
    pub version: u8,
}

impl LiquidityFellowArgs {
    pub const SERIALIZED_SIZE: usize = 32 + 32 + 1; // 65

    pub fn serialize(&self) -> [u8; Self::SERIALIZED_SIZE] {
        let mut buf = [0u8; Self::SERIALIZED_SIZE];
        buf[0..32].copy_from_slice(&self.main_lock_hash);
        buf[32..64].copy_from_slice(&self.user_lock_hash);
        buf[64] = self.version;
        buf
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SERIALIZED_SIZE {
            return None;
        }
        Some(Self {
            main_lock_hash: data[0..32].try_into().ok()?,
            user_lock_hash: data[32..64].try_into().ok()?,
            version: data[64],
        })
    }
}

// ============ Swap Request ============

/// Swap request lock args.
/// `token_type_hash` names the asset the user receives; `CKB_TYPE_HASH`
/// when the user sells a token for CKB.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwapRequestArgs {
    pub token_type_hash: [u8; 32],
    pub user_lock_hash: [u8; 32],
    pub version: u8,
    pub min_amount_out: u128,
    pub tips_ckb: u64,
    pub tips_sudt: u128,
}

impl SwapRequestArgs {
    pub const SERIALIZED_SIZE: usize = 32 + 32 + 1 + 16 + 8 + 16; // 105

    pub fn serialize(&self) -> [u8; Self::SERIALIZED_SIZE] {
        let mut buf = [0u8; Self::SERIALIZED_SIZE];
        let mut offset = 0;

        buf[offset..offset + 32].copy_from_slice(&self.token_type_hash);
        offset += 32;
        buf[offset..offset + 32].copy_from_slice(&self.user_lock_hash);
        offset += 32;
        buf[offset] = self.version;
        offset += 1;
        buf[offset..offset + 16].copy_from_slice(&self.min_amount_out.to_le_bytes());
        offset += 16;
        buf[offset..offset + 8].copy_from_slice(&self.tips_ckb.to_le_bytes());
        offset += 8;
        buf[offset..offset + 16].copy_from_slice(&self.tips_sudt.to_le_bytes());

        buf
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SERIALIZED_SIZE {
            return None;
        }
        let mut offset = 0;
        let mut result = Self::default();

        result.token_type_hash.copy_from_slice(&data[offset..offset + 32]);
        offset += 32;
        result.user_lock_hash.copy_from_slice(&data[offset..offset + 32]);
        offset += 32;
        result.version = data[offset];
        offset += 1;
        result.min_amount_out = u128::from_le_bytes(data[offset..offset + 16].try_into().ok()?);
        offset += 16;
        result.tips_ckb = u64::from_le_bytes(data[offset..offset + 8].try_into().ok()?);
        offset += 8;
        result.tips_sudt = u128::from_le_bytes(data[offset..offset + 16].try_into().ok()?);

        Some(result)
    }
}

// ============ Request Dispatch ============

/// Any request-cell lock args, told apart by exact length
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestArgs {
    Swap(SwapRequestArgs),
    Liquidity(LiquidityRequestArgs),
    LiquidityFellow(LiquidityFellowArgs),
}

impl RequestArgs {
    pub fn parse(args: &[u8]) -> Option<Self> {
        match args.len() {
            SwapRequestArgs::SERIALIZED_SIZE => {
                SwapRequestArgs::deserialize(args).map(RequestArgs::Swap)
            }
            LiquidityRequestArgs::SERIALIZED_SIZE => {
                LiquidityRequestArgs::deserialize(args).map(RequestArgs::Liquidity)
            }
            LiquidityFellowArgs::SERIALIZED_SIZE => {
                LiquidityFellowArgs::deserialize(args).map(RequestArgs::LiquidityFellow)
            }
            _ => None,
        }
    }

    pub fn user_lock_hash(&self) -> &[u8; 32] {
        match self {
            RequestArgs::Swap(args) => &args.user_lock_hash,
            RequestArgs::Liquidity(args) => &args.user_lock_hash,
            RequestArgs::LiquidityFellow(args) => &args.user_lock_hash,
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            RequestArgs::Swap(args) => args.version,
            RequestArgs::Liquidity(args) => args.version,
            RequestArgs::LiquidityFellow(args) => args.version,
        }
    }
}

// ============ Tests ============
