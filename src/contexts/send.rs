use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use log::{info, trace};

use super::{Context, ExecEnv, RunMode};
use crate::account::Account;
use crate::common::{Addr, Wei};
use crate::errors::{ErrorCode, Exception, ExecutionError};
use crate::exec::TxExecution;
use crate::permission::PermFlag;
use crate::state::{AccountStore, AccountStoreR, StagedAccount};
use crate::tx::SendTx;

/// Executes a [SendTx]: moves value from the inputs to the outputs. Nothing is written unless the
/// whole transfer validates.
pub struct SendContext<'a> {
    env: ExecEnv<'a>,
    store: &'a mut dyn AccountStore,
    tx: &'a SendTx,
    mode: RunMode,
}

impl<'a> SendContext<'a> {
    pub fn new(
        env: ExecEnv<'a>, store: &'a mut dyn AccountStore, tx: &'a SendTx,
        mode: RunMode,
    ) -> Self {
        Self {
            env,
            store,
            tx,
            mode,
        }
    }

    /// Debit every input, returning the staged accounts, the total sent and whether any input
    /// may create accounts.
    async fn stage_inputs(
        &self,
    ) -> Result<(BTreeMap<Addr, StagedAccount>, Wei, bool), ExecutionError> {
        let mut staged = BTreeMap::new();
        let mut total = Wei::default();
        let mut can_create = false;
        for input in &self.tx.inputs {
            if staged.contains_key(&input.address) {
                return Err(exceptionf!(
                    ErrorCode::DuplicateAddress,
                    "input {} appears more than once",
                    input.address
                )
                .into())
            }
            let acc = match self.store.get_account(&input.address).await? {
                Some(acc) => acc,
                None => {
                    info!("Cannot find input account {}", input.address);
                    return Err(exceptionf!(
                        ErrorCode::InvalidAddress,
                        "input account {} does not exist",
                        input.address
                    )
                    .into())
                }
            };
            let perms = self.env.permissions;
            if !perms.has_send(&acc) {
                return Err(Exception::permission_denied(
                    &input.address,
                    PermFlag::Send,
                )
                .into())
            }
            can_create |= perms.has_create_account(&acc);
            if acc.balance < input.amount {
                return Err(exceptionf!(
                    ErrorCode::InsufficientFunds,
                    "account {} has balance {} but sends {}",
                    input.address,
                    acc.balance,
                    input.amount
                )
                .into())
            }
            let mut acc = StagedAccount::new(acc);
            acc.sub_balance(&input.amount)?;
            total = total
                .checked_add(&input.amount)
                .ok_or(ErrorCode::IntegerOverflow)?;
            staged.insert(input.address.clone(), acc);
        }
        Ok((staged, total, can_create))
    }

    /// Credit every output on top of the staged inputs, returning the total received.
    async fn stage_outputs(
        &self, staged: &mut BTreeMap<Addr, StagedAccount>, can_create: bool,
    ) -> Result<Wei, ExecutionError> {
        let mut seen = BTreeSet::new();
        let mut total = Wei::default();
        for output in &self.tx.outputs {
            if !seen.insert(&output.address) {
                return Err(exceptionf!(
                    ErrorCode::DuplicateAddress,
                    "output {} appears more than once",
                    output.address
                )
                .into())
            }
            let mut acc = match staged.remove(&output.address) {
                Some(acc) => acc,
                None => match self.store.get_account(&output.address).await? {
                    Some(acc) => StagedAccount::new(acc),
                    None if can_create => {
                        trace!("Creating account {}", output.address);
                        let acc = Account::empty(output.address.clone());
                        StagedAccount::new(acc)
                    }
                    None => {
                        return Err(exceptionf!(
                            ErrorCode::PermissionDenied,
                            "output account {} does not exist and no input may \
                             create accounts ({})",
                            output.address,
                            PermFlag::CreateAccount
                        )
                        .into())
                    }
                },
            };
            acc.add_balance(&output.amount)?;
            total = total
                .checked_add(&output.amount)
                .ok_or(ErrorCode::IntegerOverflow)?;
            staged.insert(output.address.clone(), acc);
        }
        Ok(total)
    }
}

#[async_trait]
impl<'a> Context for SendContext<'a> {
    async fn execute(
        &mut self, txe: &mut TxExecution,
    ) -> Result<(), ExecutionError> {
        let (mut staged, sent, can_create) = self.stage_inputs().await?;
        let received = self.stage_outputs(&mut staged, can_create).await?;
        if received > sent {
            return Err(exceptionf!(
                ErrorCode::InsufficientFunds,
                "outputs total {} but inputs only {}",
                received,
                sent
            )
            .into())
        }
        if sent > received {
            return Err(exceptionf!(
                ErrorCode::Overpayment,
                "inputs total {} but outputs only {}",
                sent,
                received
            )
            .into())
        }

        for (_, acc) in staged {
            acc.commit(&mut *self.store)?;
        }
        trace!("Transferred {} ({:?})", sent, self.mode);

        if self.mode == RunMode::Deliver {
            for input in &self.tx.inputs {
                txe.input(&input.address, None);
            }
            for output in &self.tx.outputs {
                txe.input(&output.address, None);
            }
        }
        Ok(())
    }
}
