//! Account state: the store interface consumed by execution, an in-memory store, and the two
//! staging layers used while a transaction runs.
//!
//! Reads and writes are split the same way throughout: reads are `async` because a backend may have
//! to fetch from disk ([AccountStoreR]), whereas writes are buffered and synchronous
//! ([AccountStoreW]). A layer that buffers writes and reads through to the layer below can then
//! implement both and be stacked on top of any other store.
//!
//! ```notrust
//!       Precheck/Check                 Deliver          VirtualMachine
//!             |                           |                  |
//!      [StagedAccount]                    '---> [TxCache] <--'
//!             |                                   |
//!       commit(store)                    commit() / discard()
//!             v                                   v
//!     [AccountStore: MemStore or external backend (AccountStoreR + AccountStoreW)]
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::account::Account;
use crate::common::{Addr, Bytes, Wei};
use crate::errors::{ErrorCode, Exception, ExecutionError, StoreError};

/// Read half of an account store.
#[async_trait]
pub trait AccountStoreR: Send + Sync {
    /// Look up the account at `addr`, `Ok(None)` if it does not exist.
    async fn get_account(
        &self, addr: &Addr,
    ) -> Result<Option<Account>, StoreError>;
}

/// Write half of an account store.
pub trait AccountStoreW {
    fn update_account(&mut self, account: Account) -> Result<(), StoreError>;
    fn remove_account(&mut self, addr: &Addr) -> Result<(), StoreError>;
}

pub trait AccountStore: AccountStoreR + AccountStoreW {}

impl<T: AccountStoreR + AccountStoreW> AccountStore for T {}

/// A store that holds nothing.
pub struct EmptyState;

#[async_trait]
impl AccountStoreR for EmptyState {
    async fn get_account(
        &self, _addr: &Addr,
    ) -> Result<Option<Account>, StoreError> {
        Ok(None)
    }
}

/// In-memory account store layered over a read-only base. Writes (including removals) stay in
/// this layer; lookups that miss fall through to the base.
pub struct MemStore {
    base: Arc<dyn AccountStoreR>,
    accounts: BTreeMap<Addr, Option<Account>>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(Arc::new(EmptyState))
    }
}

impl MemStore {
    pub fn new(base: Arc<dyn AccountStoreR>) -> Self {
        Self {
            base,
            accounts: BTreeMap::new(),
        }
    }

    /// Build a store from an initial set of accounts (e.g. genesis).
    pub fn with_accounts<I: IntoIterator<Item = Account>>(accounts: I) -> Self {
        let mut s = Self::default();
        for acc in accounts {
            s.accounts.insert(acc.address.clone(), Some(acc));
        }
        s
    }

    /// Look up `addr` in this layer only, without consulting the base.
    pub fn get(&self, addr: &Addr) -> Option<&Account> {
        self.accounts.get(addr).and_then(|a| a.as_ref())
    }

    /// Accounts written to this layer, in address order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values().filter_map(|a| a.as_ref())
    }
}

#[async_trait]
impl AccountStoreR for MemStore {
    async fn get_account(
        &self, addr: &Addr,
    ) -> Result<Option<Account>, StoreError> {
        match self.accounts.get(addr) {
            Some(acc) => Ok(acc.clone()),
            None => self.base.get_account(addr).await,
        }
    }
}

impl AccountStoreW for MemStore {
    fn update_account(&mut self, account: Account) -> Result<(), StoreError> {
        self.accounts.insert(account.address.clone(), Some(account));
        Ok(())
    }

    fn remove_account(&mut self, addr: &Addr) -> Result<(), StoreError> {
        self.accounts.insert(addr.clone(), None);
        Ok(())
    }
}

/// A single account fetched from the store and modified in memory. Nothing about it is visible to
/// the store until [StagedAccount::commit] succeeds; dropping it abandons every change.
#[derive(Debug)]
pub struct StagedAccount {
    account: Account,
}

impl StagedAccount {
    pub fn new(account: Account) -> Self {
        Self { account }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn sub_balance(&mut self, val: &Wei) -> Result<(), Exception> {
        self.account.balance =
            self.account.balance.checked_sub(val).ok_or_else(|| {
                exceptionf!(
                    ErrorCode::InsufficientBalance,
                    "account {} has balance {} but needs {}",
                    self.account.address,
                    self.account.balance,
                    val
                )
            })?;
        Ok(())
    }

    pub fn add_balance(&mut self, val: &Wei) -> Result<(), Exception> {
        self.account.balance = self
            .account
            .balance
            .checked_add(val)
            .ok_or(ErrorCode::IntegerOverflow)?;
        Ok(())
    }

    pub fn inc_sequence(&mut self) -> Result<u64, Exception> {
        self.account.sequence = self
            .account
            .sequence
            .checked_add(1)
            .ok_or(ErrorCode::IntegerOverflow)?;
        Ok(self.account.sequence)
    }

    /// Persist the staged account and hand back the snapshot that was written.
    pub fn commit<W: AccountStoreW + ?Sized>(
        self, store: &mut W,
    ) -> Result<Account, StoreError> {
        store.update_account(self.account.clone())?;
        Ok(self.account)
    }
}

/// Write-buffered overlay over an [AccountStore] used while the virtual machine runs.
///
/// Every write lands in the overlay. [TxCache::commit] flushes the buffered writes to the backend in
/// address order; [TxCache::discard] (or simply dropping the cache) leaves the backend untouched.
pub struct TxCache<'a> {
    name: &'static str,
    backend: &'a mut dyn AccountStore,
    /// `None` marks a removed account.
    accounts: BTreeMap<Addr, Option<Account>>,
}

impl<'a> TxCache<'a> {
    pub fn new(backend: &'a mut dyn AccountStore, name: &'static str) -> Self {
        Self {
            name,
            backend,
            accounts: BTreeMap::new(),
        }
    }

    /// Number of accounts with pending writes.
    pub fn pending(&self) -> usize {
        self.accounts.len()
    }

    async fn must_get(&self, addr: &Addr) -> Result<Account, ExecutionError> {
        self.get_account(addr).await?.ok_or_else(|| {
            exceptionf!(
                ErrorCode::InvalidAddress,
                "account {} does not exist",
                addr
            )
            .into()
        })
    }

    pub async fn get_sequence(
        &self, addr: &Addr,
    ) -> Result<u64, ExecutionError> {
        Ok(self.must_get(addr).await?.sequence)
    }

    /// Bump the sequence number of `addr`, returning the new value.
    pub async fn inc_sequence(
        &mut self, addr: &Addr,
    ) -> Result<u64, ExecutionError> {
        let mut acc = StagedAccount::new(self.must_get(addr).await?);
        let seq = acc.inc_sequence()?;
        self.update_account(acc.account)?;
        Ok(seq)
    }

    /// Register a fresh, empty account. An account must not already exist at `addr`.
    pub async fn create_account(
        &mut self, addr: &Addr,
    ) -> Result<(), ExecutionError> {
        if self.get_account(addr).await?.is_some() {
            return Err(exceptionf!(
                ErrorCode::DuplicateAddress,
                "account {} already exists",
                addr
            )
            .into())
        }
        self.update_account(Account::empty(addr.clone()))?;
        Ok(())
    }

    /// Code of the account at `addr`, empty if there is no such account.
    pub async fn get_code(&self, addr: &Addr) -> Result<Bytes, ExecutionError> {
        Ok(self
            .get_account(addr)
            .await?
            .map(|acc| acc.code)
            .unwrap_or_else(Bytes::empty))
    }

    /// Set the code of a freshly created contract account.
    pub async fn init_code(
        &mut self, addr: &Addr, code: Bytes,
    ) -> Result<(), ExecutionError> {
        let acc = self.must_get(addr).await?;
        if acc.is_contract() {
            return Err(exceptionf!(
                ErrorCode::DuplicateAddress,
                "contract {} already holds code",
                addr
            )
            .into())
        }
        self.update_account(acc.with_code(code))?;
        Ok(())
    }

    pub async fn add_balance(
        &mut self, addr: &Addr, val: &Wei,
    ) -> Result<(), ExecutionError> {
        let mut acc = StagedAccount::new(self.must_get(addr).await?);
        acc.add_balance(val)?;
        self.update_account(acc.account)?;
        Ok(())
    }

    pub async fn sub_balance(
        &mut self, addr: &Addr, val: &Wei,
    ) -> Result<(), ExecutionError> {
        let mut acc = StagedAccount::new(self.must_get(addr).await?);
        acc.sub_balance(val)?;
        self.update_account(acc.account)?;
        Ok(())
    }

    pub async fn transfer(
        &mut self, from: &Addr, to: &Addr, val: &Wei,
    ) -> Result<(), ExecutionError> {
        self.sub_balance(from, val).await?;
        self.add_balance(to, val).await
    }

    /// Flush every pending write to the backend. Returns the number of accounts written.
    pub fn commit(self) -> Result<usize, StoreError> {
        let n = self.accounts.len();
        for (addr, acc) in self.accounts {
            match acc {
                Some(acc) => self.backend.update_account(acc)?,
                None => self.backend.remove_account(&addr)?,
            }
        }
        debug!("{}: committed {} account(s)", self.name, n);
        Ok(n)
    }

    /// Drop every pending write.
    pub fn discard(self) {
        debug!(
            "{}: discarded {} pending account(s)",
            self.name,
            self.accounts.len()
        );
    }
}

#[async_trait]
impl<'a> AccountStoreR for TxCache<'a> {
    async fn get_account(
        &self, addr: &Addr,
    ) -> Result<Option<Account>, StoreError> {
        match self.accounts.get(addr) {
            Some(acc) => Ok(acc.clone()),
            None => self.backend.get_account(addr).await,
        }
    }
}

impl<'a> AccountStoreW for TxCache<'a> {
    fn update_account(&mut self, account: Account) -> Result<(), StoreError> {
        self.accounts.insert(account.address.clone(), Some(account));
        Ok(())
    }

    fn remove_account(&mut self, addr: &Addr) -> Result<(), StoreError> {
        self.accounts.insert(addr.clone(), None);
        Ok(())
    }
}
