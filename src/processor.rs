//! The single execution pipeline that applies transactions to the account store.
//!
//! [Executor] owns the store writer for as long as a transaction runs, so that no other party can
//! mutate accounts underneath a context; blocks are applied strictly in transaction order.

use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;

use crate::chain::{ChainTip, Tip};
use crate::common::Hash;
use crate::config::ExecutionConfig;
use crate::contexts::{CallContext, Context, ExecEnv, RunMode, SendContext};
use crate::errors::{Exception, ExecutionError, StoreError};
use crate::exec::TxExecution;
use crate::permission::PermissionChecker;
use crate::state::AccountStore;
use crate::tx::{Payload, Tx};
use crate::vm::VirtualMachine;

/// Outcome of [Executor::execute_block].
#[derive(Debug, Default)]
pub struct BlockOutcome {
    /// Receipts of the included transactions, in block order.
    pub receipts: Vec<TxExecution>,
    /// Transactions that failed validation and left no trace in the state.
    pub rejected: Vec<(Hash, Exception)>,
}

pub struct Executor<S: AccountStore + 'static> {
    store: Arc<RwLock<S>>,
    vm: Arc<dyn VirtualMachine>,
    permissions: Box<dyn PermissionChecker>,
    tip: ChainTip,
    config: ExecutionConfig,
}

impl<S: AccountStore + 'static> Executor<S> {
    pub fn new(
        store: Arc<RwLock<S>>, vm: Arc<dyn VirtualMachine>, tip: ChainTip,
        config: ExecutionConfig,
    ) -> Self {
        let permissions = Box::new(config.permission_checker());
        Self {
            store,
            vm,
            permissions,
            tip,
            config,
        }
    }

    /// Replace the permission checker derived from the config.
    pub fn with_permissions(
        mut self, permissions: Box<dyn PermissionChecker>,
    ) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn store(&self) -> &Arc<RwLock<S>> {
        &self.store
    }

    pub fn tip(&self) -> &ChainTip {
        &self.tip
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    fn env(&self) -> ExecEnv<'_> {
        ExecEnv {
            tip: &self.tip,
            vm: self.vm.as_ref(),
            permissions: self.permissions.as_ref(),
            config: &self.config,
        }
    }

    /// Run one transaction. The receipt is tagged with the height of the block being built.
    ///
    /// `Err(ExecutionError::Exception(_))` means the transaction was rejected and the store was
    /// not touched.
    pub async fn execute(
        &self, tx: &Tx, mode: RunMode,
    ) -> Result<TxExecution, ExecutionError> {
        let height = self.tip.last_block_height() + 1;
        let mut txe = TxExecution::new(tx.hash().clone(), height);
        let env = self.env();
        let mut guard = self.store.write();
        let store: &mut dyn AccountStore = &mut *guard;
        let res = match tx.payload() {
            Payload::Call(call) => {
                CallContext::new(env, store, call, mode)
                    .execute(&mut txe)
                    .await
            }
            Payload::Send(send) => {
                SendContext::new(env, store, send, mode)
                    .execute(&mut txe)
                    .await
            }
        };
        drop(guard);
        match res {
            Ok(()) => Ok(txe),
            Err(ExecutionError::Exception(e)) => {
                info!("rejected tx {} ({:?}): {}", tx.hash(), mode, e);
                Err(e.into())
            }
            Err(e) => {
                warn!("store failure while executing tx {}: {}", tx.hash(), e);
                Err(e)
            }
        }
    }

    /// Deliver the transactions of a block in order. A store failure aborts the whole block.
    pub async fn execute_block(
        &self, txs: &[Tx],
    ) -> Result<BlockOutcome, StoreError> {
        let mut outcome = BlockOutcome::default();
        for tx in txs {
            match self.execute(tx, RunMode::Deliver).await {
                Ok(txe) => outcome.receipts.push(txe),
                Err(ExecutionError::Exception(e)) => {
                    outcome.rejected.push((tx.hash().clone(), e))
                }
                Err(ExecutionError::Store(e)) => return Err(e),
            }
        }
        info!(
            "executed block {}: {} included, {} rejected",
            self.tip.last_block_height() + 1,
            outcome.receipts.len(),
            outcome.rejected.len()
        );
        Ok(outcome)
    }

    /// Advance the chain tip once the block has been committed.
    pub fn commit_block(&mut self, hash: Hash, time: u64) {
        self.tip.commit_block(hash, time)
    }
}
