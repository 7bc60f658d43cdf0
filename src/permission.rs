//! Account capabilities.
//!
//! Every account carries a [BasePermissions]: one bit array with the permission values and one
//! that marks which of those values were explicitly set. A flag the account never set falls back
//! to the node's global permissions, which is what [AccountPermissions] evaluates.

use std::fmt;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::account::Account;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermFlag {
    Root = 0,
    Send,
    Call,
    CreateContract,
    CreateAccount,
}

impl PermFlag {
    pub const ALL: [PermFlag; 5] = [
        PermFlag::Root,
        PermFlag::Send,
        PermFlag::Call,
        PermFlag::CreateContract,
        PermFlag::CreateAccount,
    ];

    #[inline(always)]
    fn bit(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PermFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PermFlag::Root => "Root",
            PermFlag::Send => "Send",
            PermFlag::Call => "Call",
            PermFlag::CreateContract => "CreateContract",
            PermFlag::CreateAccount => "CreateAccount",
        })
    }
}

type PermBits = BitArray<[u64; 1], Lsb0>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BasePermissions {
    perms: PermBits,
    set_bit: PermBits,
}

impl Default for BasePermissions {
    fn default() -> Self {
        Self {
            perms: BitArray::new([0]),
            set_bit: BitArray::new([0]),
        }
    }
}

impl BasePermissions {
    /// Permissions with every listed flag explicitly granted and everything else unset.
    pub fn granting(flags: &[PermFlag]) -> Self {
        let mut p = Self::default();
        for f in flags {
            p.set(*f, true);
        }
        p
    }

    /// Explicit value of `flag`, `None` if it was never set on this account.
    pub fn get(&self, flag: PermFlag) -> Option<bool> {
        if self.set_bit[flag.bit()] {
            Some(self.perms[flag.bit()])
        } else {
            None
        }
    }

    pub fn set(&mut self, flag: PermFlag, value: bool) {
        self.perms.set(flag.bit(), value);
        self.set_bit.set(flag.bit(), true);
    }

    pub fn unset(&mut self, flag: PermFlag) {
        self.perms.set(flag.bit(), false);
        self.set_bit.set(flag.bit(), false);
    }
}

/// Evaluates account capabilities. Only the boolean outcome matters to execution contexts.
pub trait PermissionChecker: Send + Sync {
    fn has_permission(&self, account: &Account, flag: PermFlag) -> bool;

    fn has_send(&self, account: &Account) -> bool {
        self.has_permission(account, PermFlag::Send)
    }

    fn has_call(&self, account: &Account) -> bool {
        self.has_permission(account, PermFlag::Call)
    }

    fn has_create_contract(&self, account: &Account) -> bool {
        self.has_permission(account, PermFlag::CreateContract)
    }

    fn has_create_account(&self, account: &Account) -> bool {
        self.has_permission(account, PermFlag::CreateAccount)
    }
}

/// Account permission bits with a fallback to global defaults for unset flags.
pub struct AccountPermissions {
    global: BasePermissions,
}

impl AccountPermissions {
    pub fn new(global: BasePermissions) -> Self {
        Self { global }
    }
}

impl PermissionChecker for AccountPermissions {
    fn has_permission(&self, account: &Account, flag: PermFlag) -> bool {
        match account.permissions.get(flag) {
            Some(v) => v,
            None => self.global.get(flag).unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_permissions() {
        let mut p = BasePermissions::default();
        assert_eq!(p.get(PermFlag::Call), None);
        p.set(PermFlag::Call, false);
        assert_eq!(p.get(PermFlag::Call), Some(false));
        p.set(PermFlag::Call, true);
        assert_eq!(p.get(PermFlag::Call), Some(true));
        assert_eq!(p.get(PermFlag::Send), None);
        p.unset(PermFlag::Call);
        assert_eq!(p.get(PermFlag::Call), None);
    }

    #[test]
    fn test_global_fallback() {
        let base = BasePermissions::granting(&[PermFlag::Call]);
        let checker = AccountPermissions::new(base);
        let mut acc = Account::new(1u64.into(), 0u64.into());
        assert!(checker.has_call(&acc));
        assert!(!checker.has_create_contract(&acc));
        acc.permissions.set(PermFlag::Call, false);
        assert!(!checker.has_call(&acc));
        acc.permissions.set(PermFlag::CreateContract, true);
        assert!(checker.has_create_contract(&acc));
        // root is just another flag
        acc.permissions.set(PermFlag::Root, true);
        assert!(!checker.has_send(&acc));
    }
}
