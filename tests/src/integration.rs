// ============ CellSwap Integration Tests ============
// Full lifecycles against the in-memory ledger: the SDK builds and submits
// requests, a simulated deal-maker settles them, and the order history is
// read back.

use crate::fixtures::*;
use cellswap_sdk::bridge::{BridgeInfo, BridgeMatcher, BridgeRecords};
use cellswap_sdk::model::{CellOutput, TxStatus};
use cellswap_sdk::order_chain::{Ledger, OrderChainResolver};
use cellswap_sdk::repository::{CellRepository, MemoryBridgeSource, ScriptFilter};
use cellswap_sdk::{
    LiquidityRequest, OrderKind, OrderStatus, OrderTarget, OrderType, RemoveLiquidityRequest,
    SdkError, SwapRequest, Tips, Token, Transaction, TransactionBuilder,
};
use cellswap_types::{InfoCellData, SudtCellData, CKB_TYPE_HASH};

fn amount(value: u128) -> Vec<u8> {
    SudtCellData::new(value).serialize().to_vec()
}

// ============ Pool Lifecycle ============

#[tokio::test]
async fn test_native_pool_lifecycle() {
    let sdk = funded_sdk();
    let repo = sdk.repository();
    let user = owner(1);
    let token = Token::sudt(sudt(0xAA), 0);

    // 1. create the pool
    let (create, pool) = sdk
        .create_liquidity_pool(&Token::ckb(0), &token, &user)
        .await
        .unwrap();
    let create_hash = sdk.send_transaction(&create.tx).await.unwrap();
    repo.commit(&create_hash, 1).await.unwrap();

    // 2. first deposit
    let deposit = LiquidityRequest {
        pool: pool.clone(),
        token_a: token.with_balance(1_000),
        token_b: Token::ckb(1_000 * CKB as u128),
        min_a: 0,
        min_b: 0,
        owner_lock: user.clone(),
        tips: Tips::default(),
    };
    let genesis = sdk.genesis_liquidity(&deposit).await.unwrap();
    let genesis_hash = sdk.send_transaction(&genesis.tx).await.unwrap();
    repo.commit(&genesis_hash, 2).await.unwrap();

    let history = sdk
        .resolve_orders(&user, &MemoryBridgeSource::default())
        .await
        .unwrap();
    assert_eq!(history.liquidity.len(), 1);
    assert_eq!(
        history.liquidity.chains().next().unwrap().status(),
        OrderStatus::Pending
    );

    // 3. deal-maker mints LP tokens against the pool
    let request = repo
        .get_transaction(&genesis_hash)
        .await
        .unwrap()
        .output_cell(0)
        .unwrap();
    let (info_cell, _) = TransactionBuilder::new(sdk.config(), repo)
        .fetch_pool(&pool)
        .await
        .unwrap();
    let filled = InfoCellData {
        ckb_reserve: 1_000 * CKB as u128,
        sudt_reserve: 1_000,
        total_liquidity: 1_000,
        lp_token_type_hash20: pool.lp_token_type_hash[..20].try_into().unwrap(),
    };
    repo.insert(deal(
        0xE1,
        &[&request, &info_cell],
        vec![
            (
                CellOutput::new(142 * CKB, user.clone(), Some(pool.lp_token_type.clone())),
                amount(1_000),
            ),
            (info_cell.output.clone(), filled.serialize().to_vec()),
        ],
    ))
    .await;

    let history = sdk
        .resolve_orders(&user, &MemoryBridgeSource::default())
        .await
        .unwrap();
    let chain = history.liquidity.chains().next().unwrap();
    assert_eq!(chain.nodes().len(), 2);
    assert_eq!(chain.status(), OrderStatus::Completed);
    assert!(chain.terminal().is_live);
    assert!(!chain.origin().is_live);

    // 4. the pool now only accepts follow-up deposits
    let err = sdk.genesis_liquidity(&deposit).await.unwrap_err();
    assert!(matches!(err, SdkError::MalformedRequest(_)));
    let add = sdk.add_liquidity(&deposit).await.unwrap();
    assert_eq!(add.tx.outputs[0].lock.code_hash, LIQUIDITY_LOCK_CODE);

    // 5. withdraw part of the LP position
    let remove = sdk
        .remove_liquidity(&RemoveLiquidityRequest {
            pool: pool.clone(),
            token_a: token.clone(),
            token_b: Token::ckb(0),
            lp_amount: 400,
            min_a: 1,
            min_b: 1,
            owner_lock: user.clone(),
            tips: Tips::default(),
        })
        .await
        .unwrap();
    assert_eq!(remove.tx.outputs[0].type_script, Some(pool.lp_token_type.clone()));
    assert_eq!(remove.tx.outputs_data[0], amount(400));
    assert_eq!(remove.tx.outputs_data[1], amount(600));
}

#[tokio::test]
async fn test_dual_token_deposit_links_fellow_cell() {
    let user = owner(1);
    let sdk = cellswap_sdk::CellSwapSDK::new(
        config(),
        cellswap_sdk::repository::MemoryRepository::with_transactions(vec![
            funding_tx(0xF1, &user, &[3_000 * CKB]),
            token_tx(0xF2, &user, &sudt(0xAA), &[800]),
            token_tx(0xF3, &user, &sudt(0xBB), &[900]),
        ]),
    );
    let x = Token::sudt(sudt(0xAA), 0);
    let y = Token::sudt(sudt(0xBB), 0);

    let (create, pool) = sdk.create_liquidity_pool(&x, &y, &user).await.unwrap();
    sdk.send_transaction(&create.tx).await.unwrap();

    let built = sdk
        .genesis_liquidity(&LiquidityRequest {
            pool,
            token_a: y.with_balance(900),
            token_b: x.with_balance(800),
            min_a: 0,
            min_b: 0,
            owner_lock: user.clone(),
            tips: Tips::default(),
        })
        .await
        .unwrap();
    let tx = &built.tx;

    let main = &tx.outputs[0];
    let fellow = &tx.outputs[1];
    assert_eq!(main.lock.args.len(), 137);
    assert_eq!(fellow.lock.args.len(), 65);
    // fellow args start with the main lock hash
    assert_eq!(&fellow.lock.args[..32], &main.lock.hash()[..]);

    let (low, high) = if x.type_hash < y.type_hash { (800, 900) } else { (900, 800) };
    assert_eq!(tx.outputs_data[0], amount(low));
    assert_eq!(tx.outputs_data[1], amount(high));
}

// ============ Swap Settlement ============

async fn sell_native_and_settle(received: u128) -> OrderStatus {
    let sdk = funded_sdk();
    let repo = sdk.repository();
    let user = owner(1);

    let built = sdk
        .swap(&SwapRequest {
            token_in: Token::ckb(100 * CKB as u128),
            token_out: Token::sudt(sudt(0xAA), 0),
            min_amount_out: 50,
            owner_lock: user.clone(),
            tips: Tips::default(),
        })
        .await
        .unwrap();
    let hash = sdk.send_transaction(&built.tx).await.unwrap();
    repo.commit(&hash, 5).await.unwrap();

    let request = built.tx.to_transaction(TxStatus::Committed).output_cell(0).unwrap();
    repo.insert(deal(
        0xE2,
        &[&request],
        vec![(
            CellOutput::new(request.capacity() - 100 * CKB, user.clone(), Some(sudt(0xAA))),
            amount(received),
        )],
    ))
    .await;

    let history = sdk
        .resolve_orders(&user, &MemoryBridgeSource::default())
        .await
        .unwrap();
    assert_eq!(history.swaps.len(), 1);
    let status = history.swaps.chains().next().unwrap().status();
    status
}

#[tokio::test]
async fn test_swap_filled_above_minimum_completes() {
    assert_eq!(sell_native_and_settle(60).await, OrderStatus::Completed);
}

#[tokio::test]
async fn test_swap_filled_below_minimum_is_canceling() {
    assert_eq!(sell_native_and_settle(40).await, OrderStatus::Canceling);
}

// ============ Chain Integrity ============

const REQUEST_CAPACITY: u64 = 227 * CKB;

/// Sell-token request rewritten `rewrites` times, then settled
fn partially_filled_chain(rewrites: usize) -> Vec<Transaction> {
    let user = owner(1);
    let config = config();
    let args = cellswap_types::SwapRequestArgs {
        token_type_hash: CKB_TYPE_HASH,
        user_lock_hash: user.hash(),
        version: 1,
        min_amount_out: 1_000,
        tips_ckb: 0,
        tips_sudt: 0,
    };
    let lock = config.deployment.swap_lock.script(args.serialize().to_vec());

    let origin = Transaction {
        hash: [0xA0; 32],
        outputs: vec![CellOutput::new(REQUEST_CAPACITY, lock.clone(), Some(sudt(0xAA)))],
        outputs_data: vec![amount(1_000)],
        status: TxStatus::Committed,
        ..Default::default()
    };
    let mut txs = vec![origin];

    for step in 0..rewrites {
        let previous = txs[txs.len() - 1].output_cell(0).unwrap();
        txs.push(deal(
            0xA1 + step as u8,
            &[&previous],
            vec![(
                CellOutput::new(REQUEST_CAPACITY, lock.clone(), Some(sudt(0xAA))),
                amount(900 - 100 * step as u128),
            )],
        ));
    }

    let last = txs[txs.len() - 1].output_cell(0).unwrap();
    txs.push(deal(
        0xB0,
        &[&last],
        vec![(
            CellOutput::new(REQUEST_CAPACITY + 1_100, user, None),
            Vec::new(),
        )],
    ));
    txs
}

fn swap_target() -> OrderTarget {
    OrderTarget {
        lock: ScriptFilter::prefix(config().deployment.swap_lock.script(Vec::new())),
        type_script: None,
        kind: OrderKind::Swap,
        user_lock_hash: None,
    }
}

#[test]
fn test_chain_of_rewrites_is_one_path() {
    for rewrites in [0usize, 1, 4] {
        let txs = partially_filled_chain(rewrites);
        let resolved = OrderChainResolver::new(swap_target()).resolve(&txs).unwrap();
        assert_eq!(resolved.len(), 1, "rewrites {}", rewrites);

        let chain = resolved.chains().next().unwrap();
        let nodes = chain.nodes();
        assert_eq!(nodes.len(), rewrites + 2);

        let live: Vec<_> = nodes.iter().filter(|n| n.is_live).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0], &chain.terminal());
        assert_eq!(chain.status(), OrderStatus::Completed);
    }
}

#[test]
fn test_resolution_is_idempotent_and_order_independent() {
    let txs = partially_filled_chain(3);
    let first = OrderChainResolver::new(swap_target()).resolve(&txs).unwrap();
    let second = OrderChainResolver::new(swap_target()).resolve(&txs).unwrap();
    assert_eq!(first, second);

    let mut reversed = txs.clone();
    reversed.reverse();
    let backwards = OrderChainResolver::new(swap_target()).resolve(&reversed).unwrap();
    assert_eq!(backwards.len(), 1);
    assert_eq!(backwards.chains().next().unwrap().nodes().len(), 5);
}

#[test]
fn test_unsettled_rewrite_is_judged_on_terminal() {
    let mut txs = partially_filled_chain(2);
    txs.pop();
    let resolved = OrderChainResolver::new(swap_target()).resolve(&txs).unwrap();
    let chain = resolved.chains().next().unwrap();
    assert_eq!(chain.nodes().len(), 3);
    assert!(chain.terminal().is_live);
    // rewrites so far paid no capacity against a 1000 shannon minimum
    assert_eq!(chain.status(), OrderStatus::Canceling);

    let last = txs.len() - 1;
    txs[last].outputs[0].capacity += 1_000;
    let resolved = OrderChainResolver::new(swap_target()).resolve(&txs).unwrap();
    assert_eq!(resolved.chains().next().unwrap().status(), OrderStatus::Completed);
}

// ============ Cross-Chain ============

#[tokio::test]
async fn test_bridged_order_and_plain_transfers() {
    let sdk = funded_sdk();
    let user = owner(1);

    let built = sdk
        .swap(&SwapRequest {
            token_in: Token::sudt(sudt(0xAA), 700),
            token_out: Token::ckb(0),
            min_amount_out: 1,
            owner_lock: user.clone(),
            tips: Tips::default(),
        })
        .await
        .unwrap();
    let request_hash = sdk.send_transaction(&built.tx).await.unwrap();

    let record = |ckb_tx_hash: [u8; 32], recipient_lock: cellswap_sdk::Script| BridgeInfo {
        ckb_tx_hash,
        eth_tx_hash: format!("0x{}", hex::encode(ckb_tx_hash)),
        amount: 700,
        token_addr: "0x0000000000000000000000000000000000000000".into(),
        recipient_lock,
    };
    let bridge = MemoryBridgeSource {
        eth_to_ckb: vec![
            record(request_hash, built.tx.outputs[0].lock.clone()),
            record([0xC1; 32], user.clone()),
        ],
        ckb_to_eth: vec![record([0xC2; 32], user.clone())],
    };

    let history = sdk.resolve_orders(&user, &bridge).await.unwrap();
    let chain = history.swaps.chains().next().unwrap();
    assert_eq!(chain.order_type(), OrderType::CrossChainOrder);
    assert_eq!(chain.bridge().unwrap().amount, 700);

    let steps = chain.steps();
    assert_eq!(steps[0].ledger, Ledger::Ethereum);
    assert_eq!(steps[1].ledger, Ledger::Ckb);
    assert!(!steps[1].confirmed);

    assert_eq!(history.cross_chain.len(), 2);
    assert!(history.cross_chain.iter().all(|t| t.order_type() == OrderType::CrossChain));
    assert_eq!(history.cross_chain.iter().filter(|t| t.is_in).count(), 1);
}

#[test]
fn test_bridge_partitions_are_exclusive() {
    let order_lock = config().deployment.swap_lock.script(vec![0; 105]);
    let info = |hash: u8, lock: cellswap_sdk::Script| BridgeInfo {
        ckb_tx_hash: [hash; 32],
        eth_tx_hash: String::new(),
        amount: 1,
        token_addr: String::new(),
        recipient_lock: lock,
    };
    let matcher = BridgeMatcher::new(
        BridgeRecords {
            eth_to_ckb: vec![info(1, owner(1)), info(2, order_lock)],
            ckb_to_eth: vec![info(3, owner(1))],
        },
        &config().deployment.order_lock_code_hashes(),
    );
    let total = matcher.outbound().len() + matcher.inbound().len() + matcher.inbound_to_order().len();
    assert_eq!(total, 3);
    for hash in 1..=3u8 {
        let hits = [matcher.outbound(), matcher.inbound(), matcher.inbound_to_order()]
            .iter()
            .filter(|partition| partition.iter().any(|r| r.ckb_tx_hash == [hash; 32]))
            .count();
        assert_eq!(hits, 1);
    }
}

// ============ Signer Hand-off ============

#[tokio::test]
async fn test_signable_json_field_order() {
    let sdk = funded_sdk();
    let built = sdk
        .swap(&SwapRequest {
            token_in: Token::ckb(10 * CKB as u128),
            token_out: Token::sudt(sudt(0xAA), 0),
            min_amount_out: 1,
            owner_lock: owner(1),
            tips: Tips::default(),
        })
        .await
        .unwrap();

    let json = built.tx.to_json(built.fee).unwrap();
    let fields = [
        "\"version\"",
        "\"cell_deps\"",
        "\"header_deps\"",
        "\"inputs\"",
        "\"outputs\"",
        "\"outputs_data\"",
        "\"witnesses\"",
        "\"fee\"",
    ];
    let positions: Vec<usize> = fields.iter().map(|f| json.find(f).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", json);

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["fee"], format!("{:#x}", built.fee));
    assert_eq!(value["transaction"]["outputs"][0]["lock"]["hash_type"], "type");
}
