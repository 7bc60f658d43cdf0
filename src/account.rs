use crate::common::{Addr, Bytes, Wei};
use crate::permission::BasePermissions;

/// An account record as kept by the account store. An empty `code` means a plain (non-contract)
/// account.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Account {
    pub address: Addr,
    pub balance: Wei,
    pub sequence: u64,
    pub code: Bytes,
    pub permissions: BasePermissions,
}

impl Account {
    pub fn new(address: Addr, balance: Wei) -> Self {
        Self {
            address,
            balance,
            sequence: 0,
            code: Bytes::empty(),
            permissions: BasePermissions::default(),
        }
    }

    /// A fresh account with no balance, code or permissions, as registered for a contract being
    /// created.
    pub fn empty(address: Addr) -> Self {
        Self::new(address, Wei::zero().clone())
    }

    #[inline(always)]
    pub fn is_contract(&self) -> bool {
        !self.code.is_empty()
    }

    pub fn with_code(mut self, code: Bytes) -> Self {
        self.code = code;
        self
    }

    pub fn with_permissions(mut self, permissions: BasePermissions) -> Self {
        self.permissions = permissions;
        self
    }
}
