use qexec::account::Account;
use qexec::chain::ChainTip;
use qexec::common::*;
use qexec::config::ExecutionConfig;
use qexec::contexts::{Context, ExecEnv, RunMode, SendContext};
use qexec::errors::{ErrorCode, ExecutionError};
use qexec::exec::{Event, TxExecution};
use qexec::permission::{AccountPermissions, BasePermissions, PermFlag};
use qexec::tx::{SendTx, TxInput, TxOutput};
use qexec_tools::dummy::DummyStore;
use qexec_tools::vm::ScriptedVm;

fn addr(a: u64) -> Addr {
    a.into()
}

fn wei(v: u64) -> Wei {
    v.into()
}

fn send_tx(inputs: &[(u64, u64)], outputs: &[(u64, u64)]) -> SendTx {
    SendTx {
        inputs: inputs
            .iter()
            .map(|(a, v)| TxInput {
                address: addr(*a),
                amount: wei(*v),
            })
            .collect(),
        outputs: outputs
            .iter()
            .map(|(a, v)| TxOutput {
                address: addr(*a),
                amount: wei(*v),
            })
            .collect(),
    }
}

async fn run(
    store: &mut DummyStore, perms: &AccountPermissions, tx: &SendTx,
    mode: RunMode,
) -> (Result<(), ExecutionError>, TxExecution) {
    let _ = env_logger::builder().is_test(true).try_init();
    let vm = ScriptedVm::new();
    let tip = ChainTip::genesis(Hash::zero().clone(), 0);
    let config = ExecutionConfig::default();
    let env = ExecEnv {
        tip: &tip,
        vm: &vm,
        permissions: perms,
        config: &config,
    };
    let mut txe = TxExecution::new(Hash::zero().clone(), 1);
    let res = SendContext::new(env, store, tx, mode).execute(&mut txe).await;
    (res, txe)
}

fn store() -> DummyStore {
    DummyStore::with_accounts(vec![
        Account::new(addr(1), wei(100)),
        Account::new(addr(2), wei(50)),
        Account::new(addr(3), wei(0)),
    ])
}

fn default_perms() -> AccountPermissions {
    ExecutionConfig::default().permission_checker()
}

fn rejection(res: Result<(), ExecutionError>) -> ErrorCode {
    match res {
        Err(ExecutionError::Exception(e)) => e.code(),
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_simple_transfer() {
    let mut s = store();
    let tx = send_tx(&[(1, 30)], &[(3, 30)]);
    let (res, txe) = run(&mut s, &default_perms(), &tx, RunMode::Deliver).await;
    res.unwrap();
    assert_eq!(s.balance(&addr(1)), wei(70));
    assert_eq!(s.balance(&addr(3)), wei(30));
    let touched: Vec<_> = txe
        .events()
        .iter()
        .map(|ev| match ev {
            Event::Input { address, exception } => {
                assert!(exception.is_none());
                address.clone()
            }
            ev => panic!("unexpected event {:?}", ev),
        })
        .collect();
    assert_eq!(touched, vec![addr(1), addr(3)]);
}

#[tokio::test]
async fn test_multi_party_transfer() {
    let mut s = store();
    let tx = send_tx(&[(1, 40), (2, 10)], &[(3, 45), (1, 5)]);
    let (res, _) = run(&mut s, &default_perms(), &tx, RunMode::Check).await;
    res.unwrap();
    assert_eq!(s.balance(&addr(1)), wei(65));
    assert_eq!(s.balance(&addr(2)), wei(40));
    assert_eq!(s.balance(&addr(3)), wei(45));
}

#[tokio::test]
async fn test_check_emits_no_events() {
    let mut s = store();
    let tx = send_tx(&[(1, 30)], &[(3, 30)]);
    let (res, txe) = run(&mut s, &default_perms(), &tx, RunMode::Check).await;
    res.unwrap();
    assert!(txe.events().is_empty());
    assert_eq!(s.balance(&addr(3)), wei(30));
}

#[tokio::test]
async fn test_creates_output_account() {
    let mut s = store();
    let tx = send_tx(&[(1, 30)], &[(9, 30)]);
    let (res, _) = run(&mut s, &default_perms(), &tx, RunMode::Deliver).await;
    res.unwrap();
    let acc = s.account(&addr(9)).unwrap();
    assert_eq!(acc.balance, wei(30));
    assert!(!acc.is_contract());
}

#[tokio::test]
async fn test_rejections_write_nothing() {
    let cases: Vec<(SendTx, ErrorCode)> = vec![
        (send_tx(&[(7, 1)], &[(3, 1)]), ErrorCode::InvalidAddress),
        (send_tx(&[(1, 101)], &[(3, 101)]), ErrorCode::InsufficientFunds),
        (send_tx(&[(1, 10)], &[(3, 11)]), ErrorCode::InsufficientFunds),
        (send_tx(&[(1, 10)], &[(3, 9)]), ErrorCode::Overpayment),
        (send_tx(&[(1, 1), (1, 1)], &[(3, 2)]), ErrorCode::DuplicateAddress),
        (send_tx(&[(1, 2)], &[(3, 1), (3, 1)]), ErrorCode::DuplicateAddress),
    ];
    for (tx, code) in cases {
        let mut s = store();
        let (res, txe) =
            run(&mut s, &default_perms(), &tx, RunMode::Deliver).await;
        assert_eq!(rejection(res), code);
        assert_eq!(s.writes(), 0);
        assert!(txe.events().is_empty());
    }
}

#[tokio::test]
async fn test_overflowing_outputs() {
    let max = Wei::from(U256::MAX);
    let mut s = DummyStore::with_accounts(vec![
        Account::new(addr(1), wei(10)),
        Account::new(addr(2), max.clone()),
    ]);
    let tx = SendTx {
        inputs: vec![TxInput {
            address: addr(1),
            amount: wei(10),
        }],
        outputs: vec![TxOutput {
            address: addr(2),
            amount: wei(10),
        }],
    };
    let (res, _) = run(&mut s, &default_perms(), &tx, RunMode::Deliver).await;
    assert_eq!(rejection(res), ErrorCode::IntegerOverflow);
    assert_eq!(s.balance(&addr(2)), max);
    assert_eq!(s.writes(), 0);
}

#[tokio::test]
async fn test_send_permissions() {
    let mut s = store();
    let perms =
        AccountPermissions::new(BasePermissions::granting(&[PermFlag::Call]));
    let tx = send_tx(&[(1, 5)], &[(3, 5)]);
    let (res, _) = run(&mut s, &perms, &tx, RunMode::Deliver).await;
    assert_eq!(rejection(res), ErrorCode::PermissionDenied);

    // sending is allowed, creating the receiver is not
    let perms =
        AccountPermissions::new(BasePermissions::granting(&[PermFlag::Send]));
    let tx = send_tx(&[(1, 5)], &[(9, 5)]);
    let (res, _) = run(&mut s, &perms, &tx, RunMode::Deliver).await;
    assert_eq!(rejection(res), ErrorCode::PermissionDenied);
    assert!(s.account(&addr(9)).is_none());
    assert_eq!(s.writes(), 0);

    let tx = send_tx(&[(1, 5)], &[(3, 5)]);
    let (res, _) = run(&mut s, &perms, &tx, RunMode::Deliver).await;
    res.unwrap();
    assert_eq!(s.balance(&addr(3)), wei(5));
}
