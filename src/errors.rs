use std::fmt;

use num_traits::{FromPrimitive, ToPrimitive};
use serde::{Serialize, Serializer};

use crate::common::Addr;
use crate::permission::PermFlag;

/// Build an [Exception] with a formatted message.
#[macro_export]
macro_rules! exceptionf {
    ($code: expr, $($arg: tt)+) => {
        $crate::errors::Exception::new($code, format!($($arg)+))
    };
}

/// Stable, numbered classification of a domain failure. The numeric value is what ends up in
/// receipts, so variants are only ever appended.
#[derive(FromPrimitive, ToPrimitive, Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ErrorCode {
    Generic = 0,
    InvalidAddress,
    InsufficientFunds,
    InsufficientBalance,
    PermissionDenied,
    ReservedAddress,
    DuplicateAddress,
    InsufficientGas,
    ExecutionReverted,
    ExecutionAborted,
    InvalidPayload,
    IntegerOverflow,
    Overpayment,
}

impl ErrorCode {
    pub fn number(self) -> u32 {
        // every variant fits, the enum has no explicit large discriminants
        self.to_u32().unwrap_or(0)
    }

    pub fn from_number(n: u32) -> Option<Self> {
        Self::from_u32(n)
    }

    fn describe(self) -> &'static str {
        use ErrorCode::*;
        match self {
            Generic => "generic error",
            InvalidAddress => "invalid address",
            InsufficientFunds => "insufficient funds",
            InsufficientBalance => "insufficient balance",
            PermissionDenied => "permission denied",
            ReservedAddress => "address is reserved for a native contract",
            DuplicateAddress => "duplicate address",
            InsufficientGas => "insufficient gas",
            ExecutionReverted => "execution reverted",
            ExecutionAborted => "execution aborted",
            InvalidPayload => "invalid payload",
            IntegerOverflow => "integer overflow",
            Overpayment => "input amount exceeds output amount",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.number())
    }
}

/// A domain failure raised while executing a transaction. Depending on where it occurs it is
/// either returned to the caller (the transaction is rejected) or pushed into the receipt.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Exception {
    code: ErrorCode,
    message: String,
}

impl Exception {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn permission_denied(addr: &Addr, flag: PermFlag) -> Self {
        exceptionf!(
            ErrorCode::PermissionDenied,
            "account {} does not have {} permission",
            addr,
            flag
        )
    }
}

impl From<ErrorCode> for Exception {
    fn from(code: ErrorCode) -> Self {
        Self::new(code, code.describe())
    }
}

/// Failure of the account storage backend. Always fatal for the block being executed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("account store backend: {0}")]
    Backend(String),

    #[error("account {0} vanished from the store during execution")]
    MissingAccount(Addr),
}

/// Hard error returned by an execution context.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The transaction is rejected; nothing beyond what the context already persisted changes.
    #[error(transparent)]
    Exception(#[from] Exception),

    /// The store failed underneath us.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExecutionError {
    /// The domain exception, if this is not an infrastructure failure.
    pub fn exception(&self) -> Option<&Exception> {
        match self {
            ExecutionError::Exception(e) => Some(e),
            ExecutionError::Store(_) => None,
        }
    }
}

impl From<ErrorCode> for ExecutionError {
    fn from(code: ErrorCode) -> Self {
        ExecutionError::Exception(code.into())
    }
}
