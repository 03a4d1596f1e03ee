//! RDK shared types and functions.
//!
//! This crate is the base foundation to build things that can interact with the RDK (Rewards
//! Development Kit) and its internal crates: the action catalog and ledger records, chain
//! primitives, the error taxonomy and the storage trait every ledger backend implements.

pub mod action;
pub mod amount;
pub mod chain;
pub mod connector;
pub mod database;
pub mod error;
pub mod state;
pub mod util;

pub use action::{
    Action, ActionRef, Difficulty, Proof, RewardTemplate, RewardType, UserAction,
    UserActionStatus, UserReward,
};
pub use amount::Amount;
pub use chain::{Address, Chain, TxHash};
pub use error::{Error, ErrorCode, ErrorResponse, TransactionError, TransactionErrorKind};
