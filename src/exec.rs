use serde::Serialize;

use crate::common::{Addr, Bytes, Gas, Hash};
use crate::errors::Exception;

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An address touched by the transaction, with the transaction's exception (if any).
    Input {
        address: Addr,
        exception: Option<Exception>,
    },
    /// A log entry emitted by contract code.
    Log {
        address: Addr,
        topics: Vec<Hash>,
        data: Bytes,
    },
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct ExecResult {
    pub return_value: Bytes,
    pub gas_used: Gas,
}

/// The receipt of one transaction. It is only ever appended to while the transaction runs.
#[derive(Clone, Debug, Serialize)]
pub struct TxExecution {
    tx_hash: Hash,
    height: u64,
    events: Vec<Event>,
    exceptions: Vec<Exception>,
    result: Option<ExecResult>,
    #[serde(skip)]
    trace: Vec<String>,
}

impl TxExecution {
    pub fn new(tx_hash: Hash, height: u64) -> Self {
        Self {
            tx_hash,
            height,
            events: Vec::new(),
            exceptions: Vec::new(),
            result: None,
            trace: Vec::new(),
        }
    }

    pub fn input(&mut self, address: &Addr, exception: Option<&Exception>) {
        self.events.push(Event::Input {
            address: address.clone(),
            exception: exception.cloned(),
        })
    }

    pub fn log(&mut self, address: &Addr, topics: &[Hash], data: &[u8]) {
        self.events.push(Event::Log {
            address: address.clone(),
            topics: topics.to_vec(),
            data: data.into(),
        })
    }

    pub fn push_error(&mut self, exception: Exception) {
        self.exceptions.push(exception)
    }

    /// Append a line to the human-readable execution trace.
    pub fn trace_step<S: Into<String>>(&mut self, step: S) {
        self.trace.push(step.into())
    }

    pub fn trace(&self) -> String {
        self.trace.join("\n")
    }

    pub fn return_(&mut self, return_value: Bytes, gas_used: Gas) {
        self.result = Some(ExecResult {
            return_value,
            gas_used,
        })
    }

    pub fn tx_hash(&self) -> &Hash {
        &self.tx_hash
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn exceptions(&self) -> &[Exception] {
        &self.exceptions
    }

    /// The first recorded exception.
    pub fn exception(&self) -> Option<&Exception> {
        self.exceptions.first()
    }

    pub fn result(&self) -> Option<&ExecResult> {
        self.result.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.exceptions.is_empty()
    }
}
