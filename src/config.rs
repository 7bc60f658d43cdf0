use serde::Deserialize;

use crate::common::Gas;
use crate::permission::{AccountPermissions, BasePermissions, PermFlag};

pub const DEFAULT_GAS_CEILING: Gas = 1_000_000;

/// Per-deployment execution settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Upper bound on the gas any single call may use, whatever the transaction asks for.
    pub gas_ceiling: Gas,
    /// Capabilities of accounts that leave a permission flag unset.
    pub global_permissions: Vec<PermFlag>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            gas_ceiling: DEFAULT_GAS_CEILING,
            global_permissions: vec![
                PermFlag::Send,
                PermFlag::Call,
                PermFlag::CreateContract,
                PermFlag::CreateAccount,
            ],
        }
    }
}

impl ExecutionConfig {
    pub fn permission_checker(&self) -> AccountPermissions {
        let mut global = BasePermissions::default();
        for f in PermFlag::ALL {
            global.set(f, self.global_permissions.contains(&f));
        }
        AccountPermissions::new(global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::permission::PermissionChecker;

    #[test]
    fn test_defaults() {
        let cfg: ExecutionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.gas_ceiling, DEFAULT_GAS_CEILING);
        let checker = cfg.permission_checker();
        let acc = Account::new(1u64.into(), 0u64.into());
        assert!(checker.has_call(&acc));
        assert!(checker.has_create_contract(&acc));
        assert!(!checker.has_permission(&acc, PermFlag::Root));
    }

    #[test]
    fn test_overrides() {
        let cfg: ExecutionConfig = serde_json::from_str(
            r#"{"gas_ceiling": 4000, "global_permissions": ["send"]}"#,
        )
        .unwrap();
        assert_eq!(cfg.gas_ceiling, 4000);
        let checker = cfg.permission_checker();
        let acc = Account::new(1u64.into(), 0u64.into());
        assert!(checker.has_send(&acc));
        assert!(!checker.has_call(&acc));
    }
}
