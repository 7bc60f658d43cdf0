use std::sync::Arc;

use qexec::account::Account;
use qexec::common::*;
use qexec::errors::{ErrorCode, ExecutionError};
use qexec::state::*;
use qexec_tools::dummy::DummyStore;

fn addr(a: u64) -> Addr {
    a.into()
}

fn wei(v: u64) -> Wei {
    v.into()
}

fn code_of(e: ExecutionError) -> ErrorCode {
    e.exception().expect("domain exception").code()
}

#[tokio::test]
async fn test_mem_store_layers() {
    let base = MemStore::with_accounts(vec![
        Account::new(addr(1), wei(10)),
        Account::new(addr(2), wei(20)),
    ]);
    let mut top = MemStore::new(Arc::new(base));
    let acc = top.get_account(&addr(1)).await.unwrap().unwrap();
    assert_eq!(acc.balance, wei(10));

    top.update_account(Account::new(addr(1), wei(11))).unwrap();
    top.remove_account(&addr(2)).unwrap();
    let acc = top.get_account(&addr(1)).await.unwrap().unwrap();
    assert_eq!(acc.balance, wei(11));
    assert!(top.get_account(&addr(2)).await.unwrap().is_none());
    assert!(top.get_account(&addr(3)).await.unwrap().is_none());
    assert_eq!(top.accounts().count(), 1);

    assert!(EmptyState.get_account(&addr(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_staged_account() {
    let mut store =
        DummyStore::with_accounts(vec![Account::new(addr(1), wei(10))]);
    let acc = store.get_account(&addr(1)).await.unwrap().unwrap();

    let mut staged = StagedAccount::new(acc.clone());
    staged.sub_balance(&wei(4)).unwrap();
    assert_eq!(staged.inc_sequence().unwrap(), 1);
    // dropped without commit
    drop(staged);
    assert_eq!(store.balance(&addr(1)), wei(10));
    assert_eq!(store.writes(), 0);

    let mut staged = StagedAccount::new(acc);
    let e = staged.sub_balance(&wei(11)).unwrap_err();
    assert_eq!(e.code(), ErrorCode::InsufficientBalance);
    staged.add_balance(&wei(5)).unwrap();
    let written = staged.commit(&mut store).unwrap();
    assert_eq!(written.balance, wei(15));
    assert_eq!(store.balance(&addr(1)), wei(15));

    let rich = Account::new(addr(2), Wei::from(U256::MAX));
    let mut staged = StagedAccount::new(rich);
    let e = staged.add_balance(&wei(1)).unwrap_err();
    assert_eq!(e.code(), ErrorCode::IntegerOverflow);
}

#[tokio::test]
async fn test_tx_cache_commit() {
    let mut store = DummyStore::with_accounts(vec![
        Account::new(addr(1), wei(100)),
        Account::new(addr(2), wei(0)),
    ]);
    let mut cache = TxCache::new(&mut store, "test");
    cache.transfer(&addr(1), &addr(2), &wei(30)).await.unwrap();
    assert_eq!(cache.inc_sequence(&addr(1)).await.unwrap(), 1);
    assert_eq!(cache.get_sequence(&addr(1)).await.unwrap(), 1);
    cache.create_account(&addr(3)).await.unwrap();
    cache.init_code(&addr(3), vec![0x00].into()).await.unwrap();
    assert_eq!(&*cache.get_code(&addr(3)).await.unwrap(), &[0x00]);
    assert!(cache.get_code(&addr(4)).await.unwrap().is_empty());
    assert_eq!(cache.pending(), 3);
    assert_eq!(cache.commit().unwrap(), 3);

    assert_eq!(store.balance(&addr(1)), wei(70));
    assert_eq!(store.balance(&addr(2)), wei(30));
    assert_eq!(store.sequence(&addr(1)), Some(1));
    assert!(store.account(&addr(3)).unwrap().is_contract());
    assert_eq!(store.writes(), 3);
}

#[tokio::test]
async fn test_tx_cache_discard() {
    let mut store =
        DummyStore::with_accounts(vec![Account::new(addr(1), wei(100))]);
    let mut cache = TxCache::new(&mut store, "test");
    cache.sub_balance(&addr(1), &wei(100)).await.unwrap();
    cache.remove_account(&addr(1)).unwrap();
    assert!(cache.get_account(&addr(1)).await.unwrap().is_none());
    cache.discard();
    assert_eq!(store.balance(&addr(1)), wei(100));
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_tx_cache_errors() {
    let mut store = DummyStore::with_accounts(vec![
        Account::new(addr(1), wei(5)),
        Account::new(addr(2), wei(0)).with_code(vec![0x01].into()),
    ]);
    let mut cache = TxCache::new(&mut store, "test");
    assert_eq!(
        code_of(cache.create_account(&addr(1)).await.unwrap_err()),
        ErrorCode::DuplicateAddress
    );
    assert_eq!(
        code_of(
            cache.init_code(&addr(2), vec![0x02].into()).await.unwrap_err()
        ),
        ErrorCode::DuplicateAddress
    );
    assert_eq!(
        code_of(cache.sub_balance(&addr(1), &wei(6)).await.unwrap_err()),
        ErrorCode::InsufficientBalance
    );
    assert_eq!(
        code_of(cache.inc_sequence(&addr(9)).await.unwrap_err()),
        ErrorCode::InvalidAddress
    );
    assert_eq!(cache.pending(), 0);
}

#[tokio::test]
async fn test_tx_cache_commit_failure() {
    let mut store =
        DummyStore::with_accounts(vec![Account::new(addr(1), wei(5))]);
    store.set_fail_writes(true);
    let mut cache = TxCache::new(&mut store, "test");
    cache.add_balance(&addr(1), &wei(1)).await.unwrap();
    assert!(cache.commit().is_err());
}
