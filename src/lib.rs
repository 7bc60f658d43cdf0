//! # qexec: transaction execution for a permissioned chain
//!
//! - qexec is the deterministic state-transition function of a permissioned chain node: given a
//!   transaction and the account state, it decides what is charged, what is rolled back and what
//!   is merely reported, so that every replica ends up with the same accounts and the same receipt.
//!
//! - The contract interpreter, the account backend and the permission policy are collaborators
//!   behind traits ([vm::VirtualMachine], [state::AccountStore], [permission::PermissionChecker]).
//!   qexec only orchestrates them.
//!
//! # Overview
//! - [contexts]: one execution context per transaction kind ([contexts::CallContext] for contract
//!   calls/creations, [contexts::SendContext] for plain transfers).
//! - [processor]: the [processor::Executor] that owns the store writer and runs transactions or whole
//!   blocks in order.
//! - [state]: the account store interface, an in-memory store and the staging layers
//!   ([state::StagedAccount], [state::TxCache]).
//! - [exec]: the per-transaction receipt ([exec::TxExecution]).
//! - [tx]: transaction payloads and their tagged RLP encoding.
//! - [errors]: the numbered [errors::ErrorCode] taxonomy and the error types.
//! - [common]: basic types shared by everything else.
//!
//! # Execution Phases
//! Every transaction first goes through *precheck*, which validates it and charges the fee. What
//! follows depends on the [contexts::RunMode]:
//!
//! - `Check` (mempool): the final order of transactions is unknown, so the VM does not run. Only the
//!   value and, for a contract creation, the sequence number are reserved.
//! - `Deliver` (block): the VM runs against a [state::TxCache] overlay which is committed if the
//!   call succeeds and discarded otherwise. Once the fee is charged, a failure is recorded in the
//!   receipt rather than returned, so the block still includes the transaction.
//!
//! ```notrust
//!   Submitted --precheck--> Prechecked --+--> CheckApplied
//!       |                                |
//!       '--(rejected, no state change)   +--> Delivered(success)
//!                                        +--> Delivered(vm exception)   [fee only]
//!                                        '--> Delivered(no code target) [fee only]
//! ```

#[macro_use] extern crate num_derive;

#[macro_use]
pub mod errors;
pub mod account;
pub mod chain;
pub mod common;
pub mod config;
pub mod contexts;
pub mod exec;
pub mod permission;
pub mod processor;
pub mod state;
pub mod tx;
pub mod vm;
