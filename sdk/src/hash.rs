// ============ Blake2b Hashing ============

use blake2b_simd::{Params, State};

/// CKB uses blake2b with personalization "ckb-default-hash" and 32-byte output
const CKB_HASH_PERSONALIZATION: &[u8] = b"ckb-default-hash";

fn new_state() -> State {
    Params::new()
        .hash_length(32)
        .personal(CKB_HASH_PERSONALIZATION)
        .to_state()
}

pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    blake2b_256_parts(&[data])
}

/// Hash the concatenation of `parts` without materializing it
pub fn blake2b_256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut state = new_state();
    for part in parts {
        state.update(part);
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(state.finalize().as_bytes());
    hash
}
