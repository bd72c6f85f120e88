// ============ CellSwap Fuzz / Property-Based Tests ============
// Manual property-based testing using a deterministic PRNG.
// Reproducible from the seed alone.
//
// Each test draws hundreds of random inputs and checks invariants that
// must hold for all of them.

use crate::fixtures::*;
use cellswap_sdk::bridge::{BridgeInfo, BridgeMatcher, BridgeRecords};
use cellswap_sdk::model::{CellOutput, HashType, OutPoint, TxStatus};
use cellswap_sdk::order_chain::OrderChainResolver;
use cellswap_sdk::repository::{MemoryRepository, ScriptFilter};
use cellswap_sdk::{
    CellSwapSDK, OrderKind, OrderStatus, OrderTarget, Script, SdkError, SwapRequest, Tips, Token,
    Transaction,
};
use cellswap_types::{RequestArgs, SwapRequestArgs, TipsArgs, LiquidityRequestArgs, CKB_TYPE_HASH};
use std::collections::HashMap;

// ============ Deterministic PRNG ============

struct TestRng {
    state: u64,
}

impl TestRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn next_u128(&mut self) -> u128 {
        let hi = self.next_u64() as u128;
        let lo = self.next_u64() as u128;
        (hi << 64) | lo
    }

    fn range_u128(&mut self, min: u128, max: u128) -> u128 {
        if min >= max {
            return min;
        }
        min + (self.next_u128() % (max - min))
    }

    fn range_u64(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        min + (self.next_u64() % (max - min))
    }

    fn next_bytes_32(&mut self) -> [u8; 32] {
        let mut buf = [0u8; 32];
        for chunk in buf.chunks_exact_mut(8) {
            chunk.copy_from_slice(&self.next_u64().to_le_bytes());
        }
        buf
    }
}

// ============ Test 1: Request Args Classification ============

#[test]
fn test_fuzz_request_args_classified_by_length() {
    let mut rng = TestRng::new(0xC0FFEE);

    for _ in 0..500 {
        let swap = SwapRequestArgs {
            token_type_hash: rng.next_bytes_32(),
            user_lock_hash: rng.next_bytes_32(),
            version: rng.range_u64(0, 256) as u8,
            min_amount_out: rng.next_u128(),
            tips_ckb: rng.next_u64(),
            tips_sudt: rng.next_u128(),
        };
        let liquidity = LiquidityRequestArgs {
            info_type_hash: rng.next_bytes_32(),
            user_lock_hash: rng.next_bytes_32(),
            version: rng.range_u64(0, 256) as u8,
            sudt_min: rng.next_u128(),
            ckb_min: rng.next_u128(),
            tips: TipsArgs {
                tips_ckb: rng.next_u64(),
                tips_sudt_x: rng.next_u128(),
                tips_sudt_y: rng.next_u128(),
            },
        };

        match RequestArgs::parse(&swap.serialize()) {
            Some(RequestArgs::Swap(parsed)) => assert_eq!(parsed, swap),
            other => panic!("swap args parsed as {:?}", other),
        }
        match RequestArgs::parse(&liquidity.serialize()) {
            Some(RequestArgs::Liquidity(parsed)) => assert_eq!(parsed.user_lock_hash, liquidity.user_lock_hash),
            other => panic!("liquidity args parsed as {:?}", other),
        }

        // any other length is not a request
        let len = rng.range_u64(0, 200) as usize;
        let bytes: Vec<u8> = (0..len).map(|_| rng.next_u64() as u8).collect();
        let parsed = RequestArgs::parse(&bytes);
        if ![65usize, 105, 137].contains(&len) {
            assert!(parsed.is_none(), "length {} parsed", len);
        }
    }
}

// ============ Test 2: Swap Capacity Balance ============

#[tokio::test]
async fn test_fuzz_swap_balances_capacity() {
    let mut rng = TestRng::new(42);
    let user = owner(1);
    let change_min = 61 * CKB;

    for round in 0..150 {
        let cells = rng.range_u64(1, 6) as usize;
        let capacities: Vec<u64> = (0..cells).map(|_| rng.range_u64(61, 800) * CKB).collect();
        let funding = funding_tx(0xF1, &user, &capacities);
        let by_out_point: HashMap<OutPoint, u64> = funding
            .output_cells()
            .map(|c| (c.out_point, c.capacity()))
            .collect();

        let sdk = CellSwapSDK::new(config(), MemoryRepository::with_transactions(vec![funding]));
        let amount = rng.range_u64(1, 1_500) * CKB + rng.range_u64(0, CKB);
        let request = SwapRequest {
            token_in: Token::ckb(amount as u128),
            token_out: Token::sudt(sudt(0xAA), 0),
            min_amount_out: rng.range_u128(1, 1 << 64),
            owner_lock: user.clone(),
            tips: Tips {
                ckb: rng.range_u64(0, 5) * CKB,
                token_x: 0,
                token_y: 0,
            },
        };

        match sdk.swap(&request).await {
            Ok(built) => {
                let tx = &built.tx;
                let consumed: u64 = tx
                    .inputs
                    .iter()
                    .map(|i| by_out_point[&i.previous_output])
                    .sum();
                assert_eq!(consumed, tx.output_capacity() + built.fee, "round {}", round);
                assert_eq!(built.fee, tx.fee(sdk.config().fee_rate), "round {}", round);

                let change = tx.outputs.last().unwrap();
                assert_eq!(change.lock, user);
                assert!(change.capacity >= change_min, "round {}", round);
                assert_eq!(tx.outputs[0].capacity, 146 * CKB + amount + request.tips.ckb);
            }
            Err(SdkError::InsufficientFunds { .. }) | Err(SdkError::FeeNotConverged { .. }) => {
                let total: u64 = capacities.iter().sum();
                assert!(total < 146 * CKB + amount + request.tips.ckb + change_min + CKB, "round {}", round);
            }
            Err(other) => panic!("round {}: unexpected error {:?}", round, other),
        }
    }
}

// ============ Test 3: Chain Integrity ============

fn random_chain(rng: &mut TestRng, rewrites: usize, min_out: u128, settled_delta: Option<u64>) -> Vec<Transaction> {
    let user = owner(1);
    let args = SwapRequestArgs {
        token_type_hash: CKB_TYPE_HASH,
        user_lock_hash: user.hash(),
        version: 1,
        min_amount_out: min_out,
        tips_ckb: 0,
        tips_sudt: 0,
    };
    let lock = config().deployment.swap_lock.script(args.serialize().to_vec());
    let capacity = 227 * CKB;
    let data = |amount: u128| amount.to_le_bytes().to_vec();

    let mut txs = vec![Transaction {
        hash: [0x10; 32],
        outputs: vec![CellOutput::new(capacity, lock.clone(), Some(sudt(0xAA)))],
        outputs_data: vec![data(rng.range_u128(1, 1 << 40))],
        status: TxStatus::Committed,
        ..Default::default()
    }];

    for step in 0..rewrites {
        let previous = txs[txs.len() - 1].output_cell(0).unwrap();
        txs.push(deal(
            0x11 + step as u8,
            &[&previous],
            vec![(
                CellOutput::new(capacity, lock.clone(), Some(sudt(0xAA))),
                data(rng.range_u128(1, 1 << 40)),
            )],
        ));
    }

    if let Some(delta) = settled_delta {
        let last = txs[txs.len() - 1].output_cell(0).unwrap();
        txs.push(deal(
            0xF0,
            &[&last],
            vec![(CellOutput::new(capacity + delta, user, None), Vec::new())],
        ));
    }
    txs
}

#[test]
fn test_fuzz_chain_integrity() {
    let mut rng = TestRng::new(7);
    let target = OrderTarget {
        lock: ScriptFilter::prefix(config().deployment.swap_lock.script(Vec::new())),
        type_script: None,
        kind: OrderKind::Swap,
        user_lock_hash: Some(owner(1).hash()),
    };

    for _ in 0..200 {
        let rewrites = rng.range_u64(0, 12) as usize;
        let min_out = rng.range_u128(1, 10 * CKB as u128);
        let settled = if rng.next_u64() % 4 == 0 {
            None
        } else {
            Some(rng.range_u64(0, 20 * CKB))
        };

        let mut txs = random_chain(&mut rng, rewrites, min_out, settled);
        // ledger order must not matter
        let swaps = rng.range_u64(0, 8);
        for _ in 0..swaps {
            let a = rng.range_u64(0, txs.len() as u64) as usize;
            let b = rng.range_u64(0, txs.len() as u64) as usize;
            txs.swap(a, b);
        }

        let resolved = OrderChainResolver::new(target.clone()).resolve(&txs).unwrap();
        assert_eq!(resolved.len(), 1);
        let chain = resolved.chains().next().unwrap();
        let nodes = chain.nodes();

        let expected_len = rewrites + 1 + settled.map_or(0, |_| 1);
        assert_eq!(nodes.len(), expected_len);
        assert_eq!(chain.origin().tx_hash(), &[0x10; 32]);

        // exactly the terminal is live; every other node links forward
        assert_eq!(nodes.iter().filter(|n| n.is_live).count(), 1);
        assert!(chain.terminal().is_live);
        assert_eq!(nodes.iter().filter(|n| n.next.is_none()).count(), 1);

        // a lone request is open; once consumed, only the capacity paid counts
        let expected = match settled {
            None if rewrites == 0 => OrderStatus::Open,
            None => OrderStatus::Canceling,
            Some(delta) if delta as u128 >= min_out => OrderStatus::Completed,
            Some(_) => OrderStatus::Canceling,
        };
        assert_eq!(chain.status(), expected);
    }
}

// ============ Test 4: Bridge Classification ============

#[test]
fn test_fuzz_bridge_match_is_a_partition() {
    let mut rng = TestRng::new(0xB41D6E);
    let order_codes = config().deployment.order_lock_code_hashes();

    for _ in 0..100 {
        let record = |rng: &mut TestRng| {
            let code = match rng.next_u64() % 3 {
                0 => order_codes[0],
                1 => order_codes[1],
                _ => [0x9b; 32],
            };
            BridgeInfo {
                ckb_tx_hash: rng.next_bytes_32(),
                eth_tx_hash: format!("0x{}", hex::encode(rng.next_bytes_32())),
                amount: rng.next_u128(),
                token_addr: String::new(),
                recipient_lock: Script::new(code, HashType::Type, vec![1; 20]),
            }
        };
        let eth_to_ckb: Vec<_> = (0..rng.range_u64(0, 10)).map(|_| record(&mut rng)).collect();
        let ckb_to_eth: Vec<_> = (0..rng.range_u64(0, 10)).map(|_| record(&mut rng)).collect();

        let matcher = BridgeMatcher::new(
            BridgeRecords {
                eth_to_ckb: eth_to_ckb.clone(),
                ckb_to_eth: ckb_to_eth.clone(),
            },
            &order_codes,
        );

        for info in &ckb_to_eth {
            let m = matcher.match_tx(&info.ckb_tx_hash).unwrap();
            assert!(!m.is_in && !m.is_order);
        }
        for info in &eth_to_ckb {
            let m = matcher.match_tx(&info.ckb_tx_hash).unwrap();
            assert!(m.is_in);
            assert_eq!(m.is_order, order_codes.contains(&info.recipient_lock.code_hash));
        }
        assert!(matcher.match_tx(&rng.next_bytes_32()).is_none());
    }
}
