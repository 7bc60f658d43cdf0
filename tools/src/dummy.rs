use async_trait::async_trait;
use log::info;

use qexec::account::Account;
use qexec::common::{Addr, Wei};
use qexec::errors::StoreError;
use qexec::state::{AccountStoreR, AccountStoreW, MemStore};

/// In-memory account store that logs every access and can be told to fail.
pub struct DummyStore {
    accounts: MemStore,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
}

impl DummyStore {
    pub fn new() -> Self {
        Self::with_accounts(Vec::new())
    }

    pub fn with_accounts<I: IntoIterator<Item = Account>>(accounts: I) -> Self {
        Self {
            accounts: MemStore::with_accounts(accounts),
            fail_reads: false,
            fail_writes: false,
            writes: 0,
        }
    }

    pub fn account(&self, addr: &Addr) -> Option<&Account> {
        self.accounts.get(addr)
    }

    /// Balance of `addr`, zero if the account does not exist.
    pub fn balance(&self, addr: &Addr) -> Wei {
        self.account(addr)
            .map(|acc| acc.balance.clone())
            .unwrap_or_default()
    }

    pub fn sequence(&self, addr: &Addr) -> Option<u64> {
        self.account(addr).map(|acc| acc.sequence)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.accounts()
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail
    }
}

#[async_trait]
impl AccountStoreR for DummyStore {
    async fn get_account(
        &self, addr: &Addr,
    ) -> Result<Option<Account>, StoreError> {
        info!("get_account({})", addr);
        if self.fail_reads {
            return Err(StoreError::Backend(format!("cannot read {}", addr)))
        }
        self.accounts.get_account(addr).await
    }
}

impl AccountStoreW for DummyStore {
    fn update_account(&mut self, account: Account) -> Result<(), StoreError> {
        info!(
            "update_account({}, balance={}, sequence={}, code={})",
            account.address,
            account.balance,
            account.sequence,
            hex::encode(&*account.code)
        );
        if self.fail_writes {
            return Err(StoreError::Backend(format!(
                "cannot write {}",
                account.address
            )))
        }
        self.writes += 1;
        self.accounts.update_account(account)
    }

    fn remove_account(&mut self, addr: &Addr) -> Result<(), StoreError> {
        info!("remove_account({})", addr);
        if self.fail_writes {
            return Err(StoreError::Backend(format!("cannot remove {}", addr)))
        }
        self.writes += 1;
        self.accounts.remove_account(addr)
    }
}
