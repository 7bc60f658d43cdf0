use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;

use qexec::account::Account;
use qexec::common::{Addr, Bytes, Gas, Hash, Wei};
use qexec::errors::{ErrorCode, Exception, ExecutionError};
use qexec::exec::TxExecution;
use qexec::state::{AccountStoreW, TxCache};
use qexec::vm::{CallResult, Params, VirtualMachine};

/// What the next call to a [ScriptedVm] does.
#[derive(Clone, Debug)]
pub struct Behavior {
    gas_used: Gas,
    output: Bytes,
    exception: Option<Exception>,
    transfer: bool,
    writes: Vec<Account>,
    logs: Vec<(Vec<Hash>, Bytes)>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            gas_used: 0,
            output: Bytes::empty(),
            exception: None,
            transfer: true,
            writes: Vec::new(),
            logs: Vec::new(),
        }
    }
}

impl Behavior {
    pub fn succeed(output: Bytes, gas_used: Gas) -> Self {
        Self {
            gas_used,
            output,
            ..Default::default()
        }
    }

    pub fn revert(exception: Exception, gas_used: Gas) -> Self {
        Self {
            gas_used,
            exception: Some(exception),
            ..Default::default()
        }
    }

    /// Also write `account` into the overlay while running.
    pub fn with_write(mut self, account: Account) -> Self {
        self.writes.push(account);
        self
    }

    /// Emit a log event if the call succeeds.
    pub fn with_log(mut self, topics: Vec<Hash>, data: Bytes) -> Self {
        self.logs.push((topics, data));
        self
    }

    /// Leave the value where it is.
    pub fn without_transfer(mut self) -> Self {
        self.transfer = false;
        self
    }
}

/// Arguments of one call as the VM saw them.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub params: Params,
    pub caller: Addr,
    pub callee: Addr,
    pub code: Bytes,
    pub input: Bytes,
    pub value: Wei,
    pub gas: Gas,
}

/// A VM double that replays queued [Behavior]s instead of interpreting code. When the queue runs
/// dry, calls succeed with empty output and use no gas.
#[derive(Default)]
pub struct ScriptedVm {
    natives: HashSet<Addr>,
    script: Mutex<VecDeque<Behavior>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedVm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_natives<I: IntoIterator<Item = Addr>>(natives: I) -> Self {
        Self {
            natives: natives.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn push(&self, behavior: Behavior) {
        self.script.lock().push_back(behavior)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

fn to_exception(e: ExecutionError) -> Exception {
    match e {
        ExecutionError::Exception(e) => e,
        ExecutionError::Store(e) => {
            Exception::new(ErrorCode::Generic, e.to_string())
        }
    }
}

#[async_trait]
impl VirtualMachine for ScriptedVm {
    fn is_registered_native(&self, addr: &Addr) -> bool {
        self.natives.contains(addr)
    }

    async fn call(
        &self, params: &Params, state: &mut TxCache<'_>, txe: &mut TxExecution,
        caller: &Addr, callee: &Addr, code: &[u8], input: &[u8], value: &Wei,
        gas: &mut Gas,
    ) -> CallResult {
        let behavior = self.script.lock().pop_front().unwrap_or_default();
        info!(
            "call({} -> {}, value={}, gas={}, code={})",
            caller,
            callee,
            value,
            gas,
            hex::encode(code)
        );
        self.calls.lock().push(RecordedCall {
            params: params.clone(),
            caller: caller.clone(),
            callee: callee.clone(),
            code: code.into(),
            input: input.into(),
            value: value.clone(),
            gas: *gas,
        });
        txe.trace_step(format!(
            "CALL {} -> {} value={}",
            caller, callee, value
        ));

        if behavior.gas_used > *gas {
            debug!("Out of Gas: need {}, have {}", behavior.gas_used, gas);
            *gas = 0;
            txe.trace_step("OUT OF GAS");
            return CallResult::Reverted(
                Bytes::empty(),
                out_of_gas(behavior.gas_used),
            )
        }
        *gas -= behavior.gas_used;

        if behavior.transfer && !value.is_zero() {
            if let Err(e) = state.transfer(caller, callee, value).await {
                txe.trace_step(format!("TRANSFER FAILED {}", e));
                return CallResult::Reverted(Bytes::empty(), to_exception(e))
            }
        }
        for acc in behavior.writes {
            if let Err(e) = state.update_account(acc) {
                let e = to_exception(e.into());
                return CallResult::Reverted(Bytes::empty(), e)
            }
        }

        match behavior.exception {
            Some(e) => {
                txe.trace_step(format!("REVERT {}", e.code()));
                CallResult::Reverted(behavior.output, e)
            }
            None => {
                for (topics, data) in behavior.logs {
                    txe.log(callee, &topics, &data);
                }
                txe.trace_step("RETURN");
                CallResult::Succeeded(behavior.output)
            }
        }
    }
}

fn out_of_gas(needed: Gas) -> Exception {
    qexec::exceptionf!(
        ErrorCode::InsufficientGas,
        "out of gas (needed {})",
        needed
    )
}
