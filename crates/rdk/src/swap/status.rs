//! Swap state machine
//!
//! One status type shared by every exchange family. Transitions are checked against
//! [`SwapStatus::can_transition_to`], terminal states only leave through a reset.

use std::fmt;

use rdk_common::{Error, ErrorCode, TxHash};
use serde::{Deserialize, Serialize};

/// Status of a swap attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    /// Nothing checked yet
    #[default]
    Idle,
    /// Wallet is connected to another chain
    WrongNetwork,
    /// Waiting for the wallet to switch chains
    SwitchingNetwork,
    /// On the right chain, ready to trade
    Ready,
    /// Approval transaction in flight
    Approving,
    /// Building the trade
    Swapping,
    /// Waiting for the wallet to sign and submit
    TransactionPending,
    /// Submitted, hash known
    TransactionSubmitted,
    /// Polling for the receipt
    TransactionConfirming,
    /// Mined successfully
    Completed,
    /// Gave up, see the state error
    Failed,
}

impl SwapStatus {
    /// `Completed` or `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Completed | SwapStatus::Failed)
    }

    /// States in which a wallet or chain round trip is outstanding
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SwapStatus::SwitchingNetwork
                | SwapStatus::Approving
                | SwapStatus::Swapping
                | SwapStatus::TransactionPending
                | SwapStatus::TransactionSubmitted
                | SwapStatus::TransactionConfirming
        )
    }

    /// Whether moving to `next` is allowed
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        use SwapStatus::*;

        if next == Failed {
            return !self.is_terminal();
        }

        matches!(
            (*self, next),
            (Idle, WrongNetwork | Ready)
                | (WrongNetwork, SwitchingNetwork | Ready)
                | (SwitchingNetwork, Ready | WrongNetwork)
                | (Ready, WrongNetwork | Approving | Swapping)
                | (Approving, Swapping)
                | (Swapping, TransactionPending)
                | (TransactionPending, TransactionSubmitted)
                | (TransactionSubmitted, TransactionConfirming)
                | (TransactionConfirming, Completed)
        )
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwapStatus::Idle => "idle",
            SwapStatus::WrongNetwork => "wrong_network",
            SwapStatus::SwitchingNetwork => "switching_network",
            SwapStatus::Ready => "ready",
            SwapStatus::Approving => "approving",
            SwapStatus::Swapping => "swapping",
            SwapStatus::TransactionPending => "transaction_pending",
            SwapStatus::TransactionSubmitted => "transaction_submitted",
            SwapStatus::TransactionConfirming => "transaction_confirming",
            SwapStatus::Completed => "completed",
            SwapStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Failure reason kept in the observable state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapError {
    /// Stable error code
    pub code: ErrorCode,
    /// User facing message
    pub message: String,
    /// Whether offering a manual retry makes sense
    pub retryable: bool,
}

impl From<&Error> for SwapError {
    fn from(err: &Error) -> Self {
        let message = match err {
            Error::Transaction(err) => err.message.clone(),
            err => err.to_string(),
        };

        Self {
            code: err.code(),
            message,
            retryable: err.is_retryable(),
        }
    }
}

/// Observable state of the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapState {
    /// Current status
    pub status: SwapStatus,
    /// Failure reason once `Failed`
    pub error: Option<SwapError>,
    /// Swap transaction hash once submitted
    pub tx_hash: Option<TxHash>,
}

impl SwapState {
    /// Whether the swap completed
    pub fn is_completed(&self) -> bool {
        self.status == SwapStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use rdk_common::{TransactionError, TransactionErrorKind};

    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            SwapStatus::Idle,
            SwapStatus::WrongNetwork,
            SwapStatus::SwitchingNetwork,
            SwapStatus::Ready,
            SwapStatus::Approving,
            SwapStatus::Swapping,
            SwapStatus::TransactionPending,
            SwapStatus::TransactionSubmitted,
            SwapStatus::TransactionConfirming,
            SwapStatus::Completed,
        ];

        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failed_reachable_from_non_terminal() {
        for status in [
            SwapStatus::Idle,
            SwapStatus::WrongNetwork,
            SwapStatus::SwitchingNetwork,
            SwapStatus::Ready,
            SwapStatus::Approving,
            SwapStatus::Swapping,
            SwapStatus::TransactionPending,
            SwapStatus::TransactionSubmitted,
            SwapStatus::TransactionConfirming,
        ] {
            assert!(status.can_transition_to(SwapStatus::Failed));
        }

        assert!(!SwapStatus::Completed.can_transition_to(SwapStatus::Failed));
        assert!(!SwapStatus::Failed.can_transition_to(SwapStatus::Failed));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!SwapStatus::Idle.can_transition_to(SwapStatus::Swapping));
        assert!(!SwapStatus::Completed.can_transition_to(SwapStatus::Idle));
        assert!(!SwapStatus::TransactionSubmitted.can_transition_to(SwapStatus::Completed));
        assert!(!SwapStatus::Swapping.can_transition_to(SwapStatus::Approving));
    }

    #[test]
    fn test_swap_error_from_transaction_error() {
        let err = Error::Transaction(TransactionError::new(
            TransactionErrorKind::Timeout,
            "request timed out",
        ));
        let swap_error = SwapError::from(&err);

        assert_eq!(swap_error.code, ErrorCode::Timeout);
        assert!(swap_error.retryable);
        assert_eq!(
            swap_error.message,
            TransactionErrorKind::Timeout.user_message().unwrap()
        );
    }
}
