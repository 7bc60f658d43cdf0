//! Execution contexts, one per transaction kind.
//!
//! Every context runs in one of two modes. [RunMode::Check] is the speculative mempool path: the
//! order of transactions is not known yet, so nothing order-dependent (the VM) runs and only
//! balances and sequence numbers are reserved. [RunMode::Deliver] is the authoritative state
//! transition applied once block order is fixed.

use async_trait::async_trait;

use crate::chain::Tip;
use crate::config::ExecutionConfig;
use crate::errors::ExecutionError;
use crate::exec::TxExecution;
use crate::permission::PermissionChecker;
use crate::vm::VirtualMachine;

mod call;
mod send;

pub use call::CallContext;
pub use send::SendContext;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RunMode {
    Check,
    Deliver,
}

/// The collaborators a context needs besides the store and its transaction.
#[derive(Copy, Clone)]
pub struct ExecEnv<'a> {
    pub tip: &'a dyn Tip,
    pub vm: &'a dyn VirtualMachine,
    pub permissions: &'a dyn PermissionChecker,
    pub config: &'a ExecutionConfig,
}

#[async_trait]
pub trait Context: Send {
    /// Apply the transaction. An `Err` means the transaction is rejected (or the store failed);
    /// an `Ok` may still carry a failed outcome in `txe`.
    async fn execute(
        &mut self, txe: &mut TxExecution,
    ) -> Result<(), ExecutionError>;
}
