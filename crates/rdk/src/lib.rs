//! Rewards Development Kit
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod chain;
pub mod event;
pub mod flow;
pub mod ledger;
pub mod price;
pub mod proof;
pub mod registration;
pub mod swap;

pub mod rdk_database {
    //! RDK Database
    pub use rdk_common::database::{
        Completion, CompletionReceipt, DynLedgerDatabase, Error, LedgerDatabase,
    };
}

/// Re-export common types
#[doc(hidden)]
pub use rdk_common::{
    action, amount, connector,
    error::{self, Error},
    util, Action, ActionRef, Address, Amount, Chain, ErrorCode, ErrorResponse, Proof, TxHash,
    UserAction, UserReward,
};

#[doc(hidden)]
pub use event::{Event, EventBus};
#[doc(hidden)]
pub use flow::{complete_with_swap, swap_and_complete};
#[doc(hidden)]
pub use ledger::{Ledger, LedgerSettings, ProofPolicy};
#[doc(hidden)]
pub use registration::{RegistrationChecker, RegistrationReport};
#[doc(hidden)]
pub use swap::{SwapOrchestrator, SwapOutcome, SwapParams, SwapSettings, SwapState, SwapStatus};
