//! The interface to the contract interpreter. qexec never looks inside the interpreter: it hands
//! over an overlay, the code and the input, and gets back the output plus an optional exception.

use async_trait::async_trait;

use crate::chain::Tip;
use crate::common::{Addr, Bytes, Gas, Hash, Wei};
use crate::errors::Exception;
use crate::exec::TxExecution;
use crate::state::TxCache;

/// Block-level parameters visible to contract code.
#[derive(Clone, Debug)]
pub struct Params {
    pub block_height: u64,
    pub block_hash: Hash,
    pub block_time: u64,
    /// Node-wide gas ceiling.
    pub gas_limit: Gas,
}

impl Params {
    pub fn from_tip(tip: &dyn Tip, gas_limit: Gas) -> Self {
        Self {
            block_height: tip.last_block_height(),
            block_hash: tip.last_block_hash().clone(),
            block_time: tip.last_block_time(),
            gas_limit,
        }
    }
}

/// Outcome of a single VM invocation.
#[derive(Clone, Debug)]
pub enum CallResult {
    /// The call finished and its writes to the overlay may be committed.
    Succeeded(Bytes),
    /// The call failed (revert, out of gas, invalid code, ...) and its writes must be dropped.
    Reverted(Bytes, Exception),
}

impl CallResult {
    pub fn into_parts(self) -> (Bytes, Option<Exception>) {
        match self {
            CallResult::Succeeded(out) => (out, None),
            CallResult::Reverted(out, e) => (out, Some(e)),
        }
    }
}

#[async_trait]
pub trait VirtualMachine: Send + Sync {
    /// Whether `addr` is reserved for a native contract.
    fn is_registered_native(&self, addr: &Addr) -> bool;

    /// Run `code` as `callee` on behalf of `caller`.
    ///
    /// The VM moves `value` from `caller` to `callee` itself and makes every other state change
    /// through `state`. It charges gas by decrementing `gas`, which on return holds the unused
    /// remainder. Log events and trace lines go into `txe`.
    async fn call(
        &self, params: &Params, state: &mut TxCache<'_>, txe: &mut TxExecution,
        caller: &Addr, callee: &Addr, code: &[u8], input: &[u8], value: &Wei,
        gas: &mut Gas,
    ) -> CallResult;
}
