use async_trait::async_trait;
use log::{info, trace};

use super::{Context, ExecEnv, RunMode};
use crate::account::Account;
use crate::common::{create_addr, Addr, Bytes, Wei};
use crate::errors::{ErrorCode, Exception, ExecutionError, StoreError};
use crate::exec::TxExecution;
use crate::permission::PermFlag;
use crate::state::{AccountStore, AccountStoreR, StagedAccount, TxCache};
use crate::tx::CallTx;
use crate::vm::Params;

/// Executes a [CallTx]: a contract call, or a contract creation when the callee is absent.
pub struct CallContext<'a> {
    env: ExecEnv<'a>,
    store: &'a mut dyn AccountStore,
    tx: &'a CallTx,
    mode: RunMode,
}

impl<'a> CallContext<'a> {
    pub fn new(
        env: ExecEnv<'a>, store: &'a mut dyn AccountStore, tx: &'a CallTx,
        mode: RunMode,
    ) -> Self {
        Self {
            env,
            store,
            tx,
            mode,
        }
    }

    /// Validate the transaction and charge the fee.
    ///
    /// Returns the input account as persisted (fee already deducted) and the callee account, if
    /// the transaction names one and it exists. On error nothing has been written.
    pub async fn precheck(
        &mut self,
    ) -> Result<(Account, Option<Account>), ExecutionError> {
        let tx = self.tx;
        let in_addr = &tx.input.address;
        let in_acc = match self.store.get_account(in_addr).await? {
            Some(acc) => acc,
            None => {
                info!("Cannot find input account {}", in_addr);
                return Err(exceptionf!(
                    ErrorCode::InvalidAddress,
                    "input account {} does not exist",
                    in_addr
                )
                .into())
            }
        };

        if tx.input.amount < tx.fee {
            info!(
                "Sender {} did not send enough to cover the fee \
                 (amount={} fee={})",
                in_addr,
                tx.input.amount,
                tx.fee
            );
            return Err(exceptionf!(
                ErrorCode::InsufficientFunds,
                "amount {} does not cover fee {}",
                tx.input.amount,
                tx.fee
            )
            .into())
        }
        if in_acc.balance < tx.fee {
            info!(
                "Sender {} cannot pay the fee {} (balance={})",
                in_addr, tx.fee, in_acc.balance
            );
            return Err(exceptionf!(
                ErrorCode::InsufficientFunds,
                "account {} has balance {} but the fee is {}",
                in_addr,
                in_acc.balance,
                tx.fee
            )
            .into())
        }
        // Deliver lets the transfer fail inside the VM so the fee is still
        // collected; the mempool refuses such transactions up front.
        if self.mode == RunMode::Check && in_acc.balance < tx.input.amount {
            info!(
                "Sender {} cannot afford amount {} (balance={})",
                in_addr, tx.input.amount, in_acc.balance
            );
            return Err(exceptionf!(
                ErrorCode::InsufficientFunds,
                "account {} has balance {} but sends {}",
                in_addr,
                in_acc.balance,
                tx.input.amount
            )
            .into())
        }

        let mut in_acc = StagedAccount::new(in_acc);
        in_acc.sub_balance(&tx.fee)?;

        let out_acc = match tx.address() {
            None => {
                if !self.env.permissions.has_create_contract(in_acc.account()) {
                    return Err(Exception::permission_denied(
                        in_addr,
                        PermFlag::CreateContract,
                    )
                    .into())
                }
                None
            }
            Some(callee) => {
                if !self.env.permissions.has_call(in_acc.account()) {
                    return Err(Exception::permission_denied(
                        in_addr,
                        PermFlag::Call,
                    )
                    .into())
                }
                if self.env.vm.is_registered_native(callee) {
                    return Err(exceptionf!(
                        ErrorCode::ReservedAddress,
                        "attempt to call a native contract at {}, but native \
                         contracts cannot be called using CallTx",
                        callee
                    )
                    .into())
                }
                // The callee may legitimately be missing here: a contract created earlier in the
                // same block is only visible once that creation is delivered.
                self.store.get_account(callee).await?
            }
        };

        let in_acc = in_acc.commit(&mut *self.store)?;
        Ok((in_acc, out_acc))
    }

    /// Mempool path: reserve the value and, for a creation, the sequence number. The VM does not
    /// run because the outcome of a call depends on the final transaction order.
    pub fn check(
        &mut self, in_acc: Account, value: &Wei,
    ) -> Result<(), ExecutionError> {
        let mut in_acc = StagedAccount::new(in_acc);
        in_acc.sub_balance(value)?;
        if self.tx.creates_contract() {
            let old = in_acc.account().sequence;
            let new = in_acc.inc_sequence()?;
            trace!(
                "Incrementing sequence number since creates contract \
                 (account={} old_sequence={} new_sequence={})",
                in_acc.account().address,
                old,
                new
            );
        }
        in_acc.commit(&mut *self.store)?;
        Ok(())
    }

    /// Block path: run the VM against an overlay and commit the overlay only if the call
    /// succeeded. Failures after the fee was charged end up in `txe`, not in the return value.
    pub async fn deliver(
        &mut self, txe: &mut TxExecution, in_acc: Account,
        out_acc: Option<Account>, value: Wei,
    ) -> Result<(), ExecutionError> {
        let tx = self.tx;
        let env = self.env;
        let gas_limit = tx.gas_limit.min(env.config.gas_ceiling);
        let mut gas = gas_limit;
        let caller = in_acc.address;
        let params = Params::from_tip(env.tip, env.config.gas_ceiling);
        let mut cache = TxCache::new(&mut *self.store, "TxCache");

        let prepared = prepare_callee(&mut cache, tx, &caller, out_acc).await;
        let (callee, code) = match prepared {
            Ok(c) => c,
            Err(ExecutionError::Exception(exception)) => {
                // the fee stays charged, nothing else happens
                info!(
                    "{} (caller={} callee={:?})",
                    exception,
                    caller,
                    tx.address()
                );
                cache.discard();
                txe.push_error(exception.clone());
                call_events(tx, txe, Some(&exception));
                return Ok(())
            }
            Err(e) => return Err(e),
        };
        trace!("callee {}", callee);

        let result = env
            .vm
            .call(
                &params, &mut cache, txe, &caller, &callee, &code, &tx.data,
                &value, &mut gas,
            )
            .await;
        let (ret, mut exception) = result.into_parts();

        if exception.is_none() && tx.creates_contract() {
            match cache.init_code(&callee, ret.clone()).await {
                Ok(()) => (),
                Err(ExecutionError::Exception(e)) => exception = Some(e),
                Err(e) => return Err(e),
            }
        }

        match &exception {
            Some(e) => {
                // The value was not transferred; only the fee is lost.
                info!("Error on execution: {}", e);
                cache.discard();
                let e = exceptionf!(
                    e.code(),
                    "call error: {}\ntrace: {}",
                    e,
                    txe.trace()
                );
                txe.push_error(e);
            }
            None => {
                trace!("Successful execution");
                cache.commit()?;
            }
        }
        call_events(tx, txe, exception.as_ref());
        txe.return_(ret, gas_limit.saturating_sub(gas));
        trace!(
            "VM call complete (caller={} callee={} gas_used={} exception={:?})",
            caller,
            callee,
            gas_limit.saturating_sub(gas),
            exception
        );
        Ok(())
    }
}

#[async_trait]
impl<'a> Context for CallContext<'a> {
    async fn execute(
        &mut self, txe: &mut TxExecution,
    ) -> Result<(), ExecutionError> {
        let (in_acc, out_acc) = self.precheck().await?;
        // fee <= amount was established by precheck
        let value = self
            .tx
            .input
            .amount
            .checked_sub(&self.tx.fee)
            .ok_or(ErrorCode::InsufficientFunds)?;
        match self.mode {
            RunMode::Deliver => self.deliver(txe, in_acc, out_acc, value).await,
            RunMode::Check => self.check(in_acc, &value),
        }
    }
}

/// Resolve the callee address and the code to run. A creation registers the new account in the
/// overlay; a call requires an existing account that holds code.
async fn prepare_callee(
    cache: &mut TxCache<'_>, tx: &CallTx, caller: &Addr,
    out_acc: Option<Account>,
) -> Result<(Addr, Bytes), ExecutionError> {
    match tx.address() {
        None => {
            if cache.get_account(caller).await?.is_none() {
                return Err(StoreError::MissingAccount(caller.clone()).into())
            }
            let sequence = cache.inc_sequence(caller).await?;
            let callee = create_addr(caller, sequence);
            cache.create_account(&callee).await?;
            trace!(
                "Creating new contract (contract_address={} init_code={})",
                callee,
                tx.data
            );
            Ok((callee, tx.data.clone()))
        }
        Some(addr) => {
            // Creating and calling a contract within one block is fine (sequence numbers keep
            // the order), but a call racing a creation from another account loses its fee.
            let out_acc = match out_acc {
                Some(acc) if acc.is_contract() => acc,
                Some(_) => {
                    return Err(exceptionf!(
                        ErrorCode::InvalidAddress,
                        "CallTx to an address ({}) that holds no code",
                        addr
                    )
                    .into())
                }
                None => {
                    return Err(exceptionf!(
                        ErrorCode::InvalidAddress,
                        "CallTx to an address ({}) that does not exist",
                        addr
                    )
                    .into())
                }
            };
            let code = cache.get_code(&out_acc.address).await?;
            trace!(
                "Calling existing contract (contract_address={} input={})",
                out_acc.address,
                tx.data
            );
            Ok((out_acc.address, code))
        }
    }
}

/// Touched-address events for the sender and, if there is one, the named receiver. Further
/// addresses reached by the VM report their own events.
fn call_events(
    tx: &CallTx, txe: &mut TxExecution, exception: Option<&Exception>,
) {
    txe.input(&tx.input.address, exception);
    if let Some(addr) = tx.address() {
        txe.input(addr, exception);
    }
}
