//! Errors

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::database;

/// RDK Error
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed request or proof
    #[error("Validation error: {0}")]
    Validation(String),
    /// Caller is not authenticated
    #[error("Authentication required: {0}")]
    Authentication(String),
    /// Unknown action
    #[error("Action not found: {0}")]
    ActionNotFound(String),
    /// Unknown reward
    #[error("Reward not found: {0}")]
    RewardNotFound(String),
    /// Action already completed by this user
    #[error("Action already completed")]
    AlreadyCompleted,
    /// Reward already claimed
    #[error("Reward already claimed")]
    AlreadyClaimed,
    /// No venue trades both assets
    #[error("No exchange found for {source_token} -> {target_token}")]
    NoExchangeFound {
        /// Token being sold
        source_token: String,
        /// Token being bought
        target_token: String,
    },
    /// Chain read or wallet plumbing failure
    #[error("Chain error: {0}")]
    Chain(String),
    /// Transaction failure
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// Action state transition not allowed
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(crate::state::Error),
    /// Amount Error
    #[error(transparent)]
    Amount(#[from] crate::amount::Error),
    /// Chain primitive Error
    #[error(transparent)]
    ChainPrimitive(#[from] crate::chain::Error),
    /// Serde Json error
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// Database Error
    #[error(transparent)]
    Database(database::Error),
    /// Custom Error
    #[error("`{0}`")]
    Custom(String),
}

impl From<database::Error> for Error {
    fn from(err: database::Error) -> Self {
        match err {
            database::Error::AlreadyCompleted => Error::AlreadyCompleted,
            database::Error::AlreadyClaimed => Error::AlreadyClaimed,
            database::Error::UnknownAction(id) => Error::ActionNotFound(id),
            database::Error::UnknownReward(id) => Error::RewardNotFound(id),
            database::Error::InvalidStateTransition(state) => state.into(),
            err => Error::Database(err),
        }
    }
}

impl From<crate::connector::Error> for Error {
    fn from(err: crate::connector::Error) -> Self {
        Error::Chain(err.to_string())
    }
}

impl From<crate::state::Error> for Error {
    fn from(state: crate::state::Error) -> Self {
        match state {
            crate::state::Error::AlreadyCompleted => Error::AlreadyCompleted,
            crate::state::Error::AlreadyClaimed => Error::AlreadyClaimed,
            _ => Error::InvalidStateTransition(state),
        }
    }
}

impl Error {
    /// Stable code for the error kind
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Validation(_)
            | Error::Amount(_)
            | Error::ChainPrimitive(_)
            | Error::SerdeJson(_) => ErrorCode::Validation,
            Error::Authentication(_) => ErrorCode::AuthenticationRequired,
            Error::ActionNotFound(_) => ErrorCode::ActionNotFound,
            Error::RewardNotFound(_) => ErrorCode::RewardNotFound,
            Error::AlreadyCompleted => ErrorCode::AlreadyCompleted,
            Error::AlreadyClaimed => ErrorCode::AlreadyClaimed,
            Error::InvalidStateTransition(_) => ErrorCode::InvalidStateTransition,
            Error::NoExchangeFound { .. } => ErrorCode::NoExchangeFound,
            Error::Chain(_) => ErrorCode::ChainError,
            Error::Transaction(err) => ErrorCode::from(err.kind),
            Error::Database(_) | Error::Custom(_) => ErrorCode::Unknown(999),
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transaction(err) => err.kind.is_retryable(),
            Error::Chain(_) => true,
            _ => false,
        }
    }
}

/// Class of a transaction failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionErrorKind {
    /// Wallet user declined the request
    UserRejected,
    /// Gas estimation or fee ceiling problem
    GasFee,
    /// Not enough balance for value plus fees
    InsufficientFunds,
    /// Transport or RPC failure
    Network,
    /// Waited too long for the wallet or for a receipt
    Timeout,
    /// Mined with a non-success status
    Reverted,
    /// Anything not matched by the other classes
    Unknown,
}

impl TransactionErrorKind {
    /// Whether the caller may retry manually.
    ///
    /// A user rejection is terminal, gas/fee failures were already retried once with a
    /// manual ceiling.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransactionErrorKind::Network | TransactionErrorKind::Timeout
        )
    }

    /// Short user facing message for the class
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            TransactionErrorKind::UserRejected => Some("Transaction was rejected in the wallet."),
            TransactionErrorKind::GasFee => {
                Some("Gas estimation failed. The network may be congested, try again shortly.")
            }
            TransactionErrorKind::InsufficientFunds => {
                Some("Insufficient funds to cover the amount and network fees.")
            }
            TransactionErrorKind::Network => {
                Some("Network error while talking to the chain. Please retry.")
            }
            TransactionErrorKind::Timeout => {
                Some("Timed out waiting for the transaction. Please check your wallet and retry.")
            }
            TransactionErrorKind::Reverted => Some("Transaction failed on-chain."),
            TransactionErrorKind::Unknown => None,
        }
    }
}

impl fmt::Display for TransactionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionErrorKind::UserRejected => "user_rejected",
            TransactionErrorKind::GasFee => "gas_fee",
            TransactionErrorKind::InsufficientFunds => "insufficient_funds",
            TransactionErrorKind::Network => "network",
            TransactionErrorKind::Timeout => "timeout",
            TransactionErrorKind::Reverted => "reverted",
            TransactionErrorKind::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Classified transaction failure
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Transaction error ({kind}): {message}")]
pub struct TransactionError {
    /// Class
    pub kind: TransactionErrorKind,
    /// User facing message
    pub message: String,
    /// Raw provider message
    pub raw: String,
}

impl TransactionError {
    /// Maximum length of the raw message echoed in a generic message
    pub const MAX_GENERIC_LEN: usize = 100;

    /// Create new [`TransactionError`], deriving the user facing message from the kind
    pub fn new<S: Into<String>>(kind: TransactionErrorKind, raw: S) -> Self {
        let raw = raw.into();
        let message = match kind.user_message() {
            Some(message) => message.to_string(),
            None => generic_message(&raw),
        };

        Self { kind, message, raw }
    }
}

fn generic_message(raw: &str) -> String {
    let truncated: String = raw.chars().take(TransactionError::MAX_GENERIC_LEN).collect();
    if truncated.len() < raw.len() {
        format!("Transaction failed: {truncated}...")
    } else {
        format!("Transaction failed: {truncated}")
    }
}

/// RDK Error Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error Code
    pub code: ErrorCode,
    /// Human readable description
    #[serde(default)]
    pub detail: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code: {}, detail: {}", self.code, self.detail)
    }
}

impl ErrorResponse {
    /// Create new [`ErrorResponse`]
    pub fn new(code: ErrorCode, detail: String) -> Self {
        Self { code, detail }
    }

    /// Error response from json
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(json)?;

        Self::from_value(value)
    }

    /// Error response from json Value
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match serde_json::from_value::<ErrorResponse>(value.clone()) {
            Ok(res) => Ok(res),
            Err(_) => Ok(Self {
                code: ErrorCode::Unknown(999),
                detail: value.to_string(),
            }),
        }
    }
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> ErrorResponse {
        let code = err.code();
        let detail = match &err {
            Error::Transaction(tx_err) => tx_err.message.clone(),
            // Storage internals are not echoed to callers
            Error::Database(_) => "Internal storage error".to_string(),
            err => err.to_string(),
        };

        ErrorResponse { code, detail }
    }
}

/// Possible Error Codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // 1xxxx - request errors
    /// Malformed request or proof (10001)
    Validation,
    /// Missing or invalid user (10002)
    AuthenticationRequired,

    // 2xxxx - ledger errors
    /// Action not found (20001)
    ActionNotFound,
    /// Reward not found (20002)
    RewardNotFound,
    /// Action already completed (20003)
    AlreadyCompleted,
    /// Reward already claimed (20004)
    AlreadyClaimed,
    /// Action state transition not allowed (20005)
    InvalidStateTransition,

    // 3xxxx - swap and chain errors
    /// No venue trades both assets (30001)
    NoExchangeFound,
    /// Chain read or wallet plumbing failure (30002)
    ChainError,
    /// Wallet user declined (30003)
    UserRejected,
    /// Gas or fee failure after the manual fallback (30004)
    GasFee,
    /// Insufficient funds (30005)
    InsufficientFunds,
    /// Network failure (30006)
    Network,
    /// Timeout (30007)
    Timeout,
    /// Reverted on-chain (30008)
    TransactionReverted,
    /// Unclassified transaction failure (30009)
    TransactionFailed,

    /// Unknown error code
    Unknown(u16),
}

impl ErrorCode {
    /// Error code from u16
    pub fn from_code(code: u16) -> Self {
        match code {
            10001 => Self::Validation,
            10002 => Self::AuthenticationRequired,
            20001 => Self::ActionNotFound,
            20002 => Self::RewardNotFound,
            20003 => Self::AlreadyCompleted,
            20004 => Self::AlreadyClaimed,
            20005 => Self::InvalidStateTransition,
            30001 => Self::NoExchangeFound,
            30002 => Self::ChainError,
            30003 => Self::UserRejected,
            30004 => Self::GasFee,
            30005 => Self::InsufficientFunds,
            30006 => Self::Network,
            30007 => Self::Timeout,
            30008 => Self::TransactionReverted,
            30009 => Self::TransactionFailed,
            _ => Self::Unknown(code),
        }
    }

    /// Error code to u16
    pub fn to_code(&self) -> u16 {
        match self {
            Self::Validation => 10001,
            Self::AuthenticationRequired => 10002,
            Self::ActionNotFound => 20001,
            Self::RewardNotFound => 20002,
            Self::AlreadyCompleted => 20003,
            Self::AlreadyClaimed => 20004,
            Self::InvalidStateTransition => 20005,
            Self::NoExchangeFound => 30001,
            Self::ChainError => 30002,
            Self::UserRejected => 30003,
            Self::GasFee => 30004,
            Self::InsufficientFunds => 30005,
            Self::Network => 30006,
            Self::Timeout => 30007,
            Self::TransactionReverted => 30008,
            Self::TransactionFailed => 30009,
            Self::Unknown(code) => *code,
        }
    }

    /// HTTP status the code maps to
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::AuthenticationRequired => 401,
            Self::ActionNotFound | Self::RewardNotFound => 404,
            Self::AlreadyCompleted | Self::AlreadyClaimed | Self::InvalidStateTransition => 409,
            Self::NoExchangeFound
            | Self::UserRejected
            | Self::GasFee
            | Self::InsufficientFunds
            | Self::TransactionReverted => 422,
            Self::ChainError | Self::Network | Self::Timeout | Self::TransactionFailed => 502,
            Self::Unknown(_) => 500,
        }
    }
}

impl From<TransactionErrorKind> for ErrorCode {
    fn from(kind: TransactionErrorKind) -> Self {
        match kind {
            TransactionErrorKind::UserRejected => ErrorCode::UserRejected,
            TransactionErrorKind::GasFee => ErrorCode::GasFee,
            TransactionErrorKind::InsufficientFunds => ErrorCode::InsufficientFunds,
            TransactionErrorKind::Network => ErrorCode::Network,
            TransactionErrorKind::Timeout => ErrorCode::Timeout,
            TransactionErrorKind::Reverted => ErrorCode::TransactionReverted,
            TransactionErrorKind::Unknown => ErrorCode::TransactionFailed,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.to_code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u16::deserialize(deserializer)?;

        Ok(ErrorCode::from_code(code))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_code())
    }
}
