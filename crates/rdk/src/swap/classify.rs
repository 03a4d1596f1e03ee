//! Provider error classification
//!
//! Wallets and nodes report failures as free text. The phrasing is matched against known
//! fragments, first match wins.

use rdk_common::{TransactionError, TransactionErrorKind};

const REJECTED: [&str; 5] = [
    "user rejected",
    "user denied",
    "rejected the request",
    "request rejected",
    "action_rejected",
];

const POPUP: [&str; 3] = ["popup", "window closed", "window was closed"];

const DOMAIN: [&str; 4] = [
    "domain",
    "site is not",
    "unauthorized site",
    "not connected to this site",
];

const INSUFFICIENT_FUNDS: [&str; 3] = [
    "insufficient funds",
    "insufficient balance",
    "exceeds balance",
];

const GAS: [&str; 6] = [
    "gas",
    "fee cap",
    "max fee",
    "underpriced",
    "intrinsic",
    "base fee",
];

const TIMEOUT: [&str; 3] = ["timeout", "timed out", "deadline exceeded"];

const NETWORK: [&str; 6] = [
    "network",
    "connection",
    "fetch failed",
    "econnrefused",
    "503",
    "rate limit",
];

const REVERTED: [&str; 2] = ["execution reverted", "transaction reverted"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Classify a raw provider message
pub fn classify(raw: &str) -> TransactionError {
    let lower = raw.to_lowercase();

    if contains_any(&lower, &REJECTED) {
        return TransactionError::new(TransactionErrorKind::UserRejected, raw);
    }

    if contains_any(&lower, &POPUP) {
        return TransactionError {
            kind: TransactionErrorKind::UserRejected,
            message: "The wallet window was closed before the request was confirmed.".to_string(),
            raw: raw.to_string(),
        };
    }

    if contains_any(&lower, &DOMAIN) {
        return TransactionError {
            kind: TransactionErrorKind::Unknown,
            message: "This site is not authorized by the wallet. Reconnect and try again."
                .to_string(),
            raw: raw.to_string(),
        };
    }

    let kind = if contains_any(&lower, &INSUFFICIENT_FUNDS) {
        TransactionErrorKind::InsufficientFunds
    } else if contains_any(&lower, &REVERTED) {
        TransactionErrorKind::Reverted
    } else if contains_any(&lower, &GAS) {
        TransactionErrorKind::GasFee
    } else if contains_any(&lower, &TIMEOUT) {
        TransactionErrorKind::Timeout
    } else if contains_any(&lower, &NETWORK) {
        TransactionErrorKind::Network
    } else {
        TransactionErrorKind::Unknown
    };

    TransactionError::new(kind, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_kinds() {
        let cases = [
            ("MetaMask Tx Signature: User denied transaction signature.", TransactionErrorKind::UserRejected),
            ("User rejected the request.", TransactionErrorKind::UserRejected),
            ("Popup closed by user", TransactionErrorKind::UserRejected),
            ("The requested domain is not allowed", TransactionErrorKind::Unknown),
            ("insufficient funds for gas * price + value", TransactionErrorKind::InsufficientFunds),
            ("cannot estimate gas; transaction may fail", TransactionErrorKind::GasFee),
            ("max fee per gas less than block base fee", TransactionErrorKind::GasFee),
            ("execution reverted: slippage", TransactionErrorKind::Reverted),
            ("Request timed out", TransactionErrorKind::Timeout),
            ("Network request failed", TransactionErrorKind::Network),
            ("something odd", TransactionErrorKind::Unknown),
        ];

        for (raw, kind) in cases {
            assert_eq!(classify(raw).kind, kind, "{raw}");
        }
    }

    #[test]
    fn test_messages() {
        let popup = classify("Popup window closed");
        assert!(popup.message.contains("wallet window"));
        assert_eq!(popup.raw, "Popup window closed");

        let long = "x".repeat(300);
        let unknown = classify(&long);
        assert_eq!(unknown.kind, TransactionErrorKind::Unknown);
        assert!(unknown.message.starts_with("Transaction failed: "));
        assert!(unknown.message.ends_with("..."));
        assert!(unknown.message.len() < 130);

        assert_eq!(
            classify("User rejected").message,
            TransactionErrorKind::UserRejected.user_message().unwrap()
        );
    }
}
