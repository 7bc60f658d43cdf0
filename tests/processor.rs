use std::sync::Arc;

use parking_lot::RwLock;

use qexec::account::Account;
use qexec::chain::{ChainTip, Tip};
use qexec::common::*;
use qexec::config::ExecutionConfig;
use qexec::contexts::RunMode;
use qexec::errors::{ErrorCode, ExecutionError};
use qexec::processor::Executor;
use qexec::tx::{CallTx, SendTx, Tx, TxInput, TxOutput};
use qexec_tools::dummy::DummyStore;
use qexec_tools::vm::{Behavior, ScriptedVm};

const ALICE: u64 = 0xa;
const BOB: u64 = 0xb;

fn addr(a: u64) -> Addr {
    a.into()
}

fn wei(v: u64) -> Wei {
    v.into()
}

fn setup() -> (Executor<DummyStore>, Arc<ScriptedVm>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = DummyStore::with_accounts(vec![
        Account::new(addr(ALICE), wei(1_000)),
        Account::new(addr(BOB), wei(0)),
    ]);
    let vm = Arc::new(ScriptedVm::new());
    let executor = Executor::new(
        Arc::new(RwLock::new(store)),
        vm.clone(),
        ChainTip::genesis(Hash::hash(b"genesis"), 0),
        ExecutionConfig::default(),
    );
    (executor, vm)
}

fn create(amount: u64, fee: u64) -> Tx {
    CallTx::new(
        TxInput {
            address: addr(ALICE),
            amount: wei(amount),
        },
        None,
        vec![0x60, 0x80].into(),
        wei(fee),
        100_000,
    )
    .into()
}

fn call(to: &Addr, amount: u64, fee: u64) -> Tx {
    CallTx::new(
        TxInput {
            address: addr(ALICE),
            amount: wei(amount),
        },
        Some(to.clone()),
        Bytes::empty(),
        wei(fee),
        100_000,
    )
    .into()
}

fn send(amount: u64) -> Tx {
    SendTx {
        inputs: vec![TxInput {
            address: addr(ALICE),
            amount: wei(amount),
        }],
        outputs: vec![TxOutput {
            address: addr(BOB),
            amount: wei(amount),
        }],
    }
    .into()
}

#[tokio::test]
async fn test_execute_block() {
    let (executor, vm) = setup();
    let contract = create_addr(&addr(ALICE), 1);
    vm.push(Behavior::succeed(vec![0xfe].into(), 5_000));
    vm.push(Behavior::succeed(Bytes::empty(), 700));

    let txs = vec![
        create(10, 1),
        // created by the previous transaction of the same block
        call(&contract, 20, 2),
        send(100),
        // fee larger than amount
        call(&contract, 1, 2),
    ];
    let outcome = executor.execute_block(&txs).await.unwrap();
    assert_eq!(outcome.receipts.len(), 3);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(&outcome.rejected[0].0, txs[3].hash());
    assert_eq!(outcome.rejected[0].1.code(), ErrorCode::InsufficientFunds);

    for (txe, tx) in outcome.receipts.iter().zip(&txs) {
        assert_eq!(txe.tx_hash(), tx.hash());
        assert_eq!(txe.height(), 1);
        assert!(txe.is_success());
    }
    assert_eq!(outcome.receipts[0].result().unwrap().gas_used, 5_000);
    assert_eq!(outcome.receipts[1].result().unwrap().gas_used, 700);
    assert!(outcome.receipts[2].result().is_none());

    let store = executor.store().read();
    assert_eq!(store.balance(&addr(ALICE)), wei(1_000 - 10 - 20 - 100));
    assert_eq!(store.balance(&addr(BOB)), wei(100));
    assert_eq!(store.balance(&contract), wei(9 + 18));
    assert_eq!(&*store.account(&contract).unwrap().code, &[0xfe]);
    assert_eq!(vm.call_count(), 2);
}

#[tokio::test]
async fn test_check_reserves_sequence() {
    let (executor, vm) = setup();
    let tx = create(10, 1);
    let txe = executor.execute(&tx, RunMode::Check).await.unwrap();
    assert!(txe.events().is_empty());
    assert_eq!(vm.call_count(), 0);
    {
        let store = executor.store().read();
        assert_eq!(store.balance(&addr(ALICE)), wei(990));
        assert_eq!(store.sequence(&addr(ALICE)), Some(1));
    }
    // a second checked creation must use the next sequence number
    executor.execute(&create(10, 1), RunMode::Check).await.unwrap();
    assert_eq!(executor.store().read().sequence(&addr(ALICE)), Some(2));
}

#[tokio::test]
async fn test_store_failure_aborts_block() {
    let (executor, _) = setup();
    executor.store().write().set_fail_writes(true);
    let res = executor.execute_block(&[send(1)]).await;
    assert!(res.is_err());
    let res = executor.execute(&send(1), RunMode::Deliver).await;
    assert!(matches!(res, Err(ExecutionError::Store(_))));
}

#[tokio::test]
async fn test_decoded_transactions() {
    let (mut executor, _) = setup();
    let bytes = send(5).encode();
    let tx = Tx::decode(&bytes).unwrap();
    let txe = executor.execute(&tx, RunMode::Deliver).await.unwrap();
    assert_eq!(txe.tx_hash(), &Hash::hash(&bytes));

    executor.commit_block(Hash::hash(b"block1"), 10);
    assert_eq!(executor.tip().last_block_height(), 1);
    let txe = executor.execute(&send(5), RunMode::Deliver).await.unwrap();
    assert_eq!(txe.height(), 2);
    assert_eq!(executor.store().read().balance(&addr(BOB)), wei(10));
}
