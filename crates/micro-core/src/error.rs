//! Error types for microwallet.
//!
//! One enum per concern, wrapped by [`WalletError`]. Every wallet error maps
//! to an [`ErrorCategory`] with a distinct process exit code so scripted
//! callers can branch on the outcome without parsing messages.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("hardened derivation unsupported from a public key (segment {index})")] HardenedDerivationUnsupported { index: u32 },
    #[error("invalid path: {0}")] InvalidPath(String),
    #[error("invalid extended public key: {0}")] InvalidExtendedKey(String),
    #[error("extended key magic {magic:#010x} is not a {coin} account key")] UnknownKeyVersion { magic: u32, coin: String },
    #[error("{script_type} accounts are not supported for {coin}")] UnsupportedScriptType { script_type: String, coin: String },
    #[error("child key derivation failed: {0}")] Crypto(String),
    #[error("key was exported for account {key}, not account {requested}")] AccountMismatch { requested: u32, key: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid encoding: {0}")] InvalidEncoding(String),
    #[error("address {address} does not belong to {coin}")] WrongNetwork { address: String, coin: String },
    #[error("{coin} has no native segwit addresses")] SegwitUnsupported { coin: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexerError {
    #[error("request timed out")] Timeout,
    #[error("transport: {0}")] Transport(String),
    #[error("HTTP status {status}: {message}")] Status { status: u16, message: String },
    #[error("malformed response: {0}")] Decode(String),
    #[error("backend error: {0}")] Backend(String),
}

impl IndexerError {
    /// Whether another attempt may succeed.
    ///
    /// Timeouts, transport failures, rate limiting and server errors are
    /// transient. Malformed responses and client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::Backend(_) => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("insufficient funds: have {available}, need {required} (target {target})")] InsufficientFunds { target: u64, required: u64, available: u64 },
    #[error("selection did not converge after {iterations} iterations (target {target}, selected {selected})")] DidNotConverge { iterations: usize, target: u64, selected: u64 },
    #[error("target {target} needs more than {max_inputs} inputs")] TooManyInputs { max_inputs: usize, target: u64 },
    #[error("invalid target: {0}")] InvalidTarget(String),
    #[error("invalid policy: {0}")] InvalidPolicy(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid amount: {0}")] InvalidAmount(String),
    #[error("no inputs")] NoInputs,
    #[error("duplicate input: {0}")] DuplicateInput(String),
    #[error("amount mismatch: inputs {inputs} != outputs {outputs} + fee {fee}")] AmountMismatch { inputs: u64, outputs: u64, fee: u64 },
    #[error("fee {fee} below minimum relay fee {minimum}")] FeeBelowMinimum { fee: u64, minimum: u64 },
    #[error("input {index} belongs to {found}, transaction is {expected}")] CoinMismatch { index: usize, expected: String, found: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("malformed data: {0}")] Malformed(String),
    #[error("truncated data: {0}")] Truncated(String),
    #[error("unsupported format tag: {0}")] UnsupportedFormat(String),
    #[error("unsupported format version: {0}")] UnsupportedVersion(u32),
    #[error("inconsistent transaction: {0}")] Inconsistent(String),
}

impl From<serde_json::Error> for SerializationError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_eof() {
            Self::Truncated(e.to_string())
        } else {
            Self::Malformed(e.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("signer unavailable: {0}")] Unavailable(String),
    #[error("signer rejected the transaction: {0}")] Rejected(String),
    #[error("invalid signer response: {0}")] InvalidResponse(String),
    #[error("signed transaction does not match: {0}")] Mismatch(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown coin: {0}")] UnknownCoin(String),
    #[error("invalid amount: {0}")] InvalidAmount(String),
    #[error("invalid setting: {0}")] Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error(transparent)] Derivation(#[from] DerivationError),
    #[error("indexer unavailable after {attempts} attempt(s): {source}")] IndexerUnavailable { attempts: u32, #[source] source: IndexerError },
    #[error(transparent)] Selection(#[from] SelectionError),
    #[error("invalid address: {0}")] InvalidAddress(#[from] AddressError),
    #[error(transparent)] Build(#[from] BuildError),
    #[error("serialization: {0}")] Serialization(#[from] SerializationError),
    #[error(transparent)] Signer(#[from] SignerError),
    #[error(transparent)] Config(#[from] ConfigError),
}

/// Outcome category of a failed wallet operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Usage,
    Derivation,
    IndexerUnavailable,
    InsufficientFunds,
    SelectionDidNotConverge,
    Selection,
    InvalidAddress,
    InvalidTransaction,
    AmountMismatch,
    Serialization,
    Signer,
}

impl ErrorCategory {
    /// Process exit code of this category. Never 0, never 1 (reserved for
    /// failures outside the wallet core).
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Usage => 2,
            Self::Derivation => 10,
            Self::IndexerUnavailable => 11,
            Self::InsufficientFunds => 12,
            Self::SelectionDidNotConverge => 13,
            Self::Selection => 14,
            Self::InvalidAddress => 15,
            Self::InvalidTransaction => 16,
            Self::AmountMismatch => 17,
            Self::Serialization => 18,
            Self::Signer => 19,
        }
    }
}

impl WalletError {
    /// Outcome category for scripted callers.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Derivation(_) => ErrorCategory::Derivation,
            Self::IndexerUnavailable { .. } => ErrorCategory::IndexerUnavailable,
            Self::Selection(SelectionError::InsufficientFunds { .. }) => ErrorCategory::InsufficientFunds,
            Self::Selection(SelectionError::DidNotConverge { .. }) => ErrorCategory::SelectionDidNotConverge,
            Self::Selection(_) => ErrorCategory::Selection,
            Self::InvalidAddress(_) => ErrorCategory::InvalidAddress,
            Self::Build(BuildError::AmountMismatch { .. }) => ErrorCategory::AmountMismatch,
            Self::Build(_) => ErrorCategory::InvalidTransaction,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Signer(_) => ErrorCategory::Signer,
            Self::Config(_) => ErrorCategory::Usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn display_insufficient_funds() {
        let e = SelectionError::InsufficientFunds {
            target: 79_500,
            required: 80_500,
            available: 80_000,
        };
        assert_eq!(
            e.to_string(),
            "insufficient funds: have 80000, need 80500 (target 79500)"
        );
    }

    #[test]
    fn display_hardened() {
        let e = DerivationError::HardenedDerivationUnsupported { index: 0x8000_0000 };
        assert_eq!(
            e.to_string(),
            "hardened derivation unsupported from a public key (segment 2147483648)"
        );
    }

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let all = [
            ErrorCategory::Usage,
            ErrorCategory::Derivation,
            ErrorCategory::IndexerUnavailable,
            ErrorCategory::InsufficientFunds,
            ErrorCategory::SelectionDidNotConverge,
            ErrorCategory::Selection,
            ErrorCategory::InvalidAddress,
            ErrorCategory::InvalidTransaction,
            ErrorCategory::AmountMismatch,
            ErrorCategory::Serialization,
            ErrorCategory::Signer,
        ];
        let codes: HashSet<i32> = all.iter().map(|c| c.exit_code()).collect();
        assert_eq!(codes.len(), all.len());
        assert!(codes.iter().all(|&c| c > 1));
    }

    #[test]
    fn categories_split_selection_outcomes() {
        let insufficient: WalletError = SelectionError::InsufficientFunds {
            target: 1,
            required: 2,
            available: 0,
        }
        .into();
        let stuck: WalletError = SelectionError::DidNotConverge {
            iterations: 2,
            target: 1,
            selected: 0,
        }
        .into();
        assert_eq!(insufficient.category(), ErrorCategory::InsufficientFunds);
        assert_eq!(stuck.category(), ErrorCategory::SelectionDidNotConverge);
    }

    #[test]
    fn amount_mismatch_is_its_own_category() {
        let e: WalletError = BuildError::AmountMismatch {
            inputs: 10,
            outputs: 5,
            fee: 1,
        }
        .into();
        assert_eq!(e.category(), ErrorCategory::AmountMismatch);
        let other: WalletError = BuildError::NoInputs.into();
        assert_eq!(other.category(), ErrorCategory::InvalidTransaction);
    }

    #[test]
    fn retryable_indexer_errors() {
        assert!(IndexerError::Timeout.is_retryable());
        assert!(IndexerError::Transport("reset".into()).is_retryable());
        assert!(IndexerError::Status { status: 503, message: String::new() }.is_retryable());
        assert!(IndexerError::Status { status: 429, message: String::new() }.is_retryable());
        assert!(!IndexerError::Status { status: 404, message: String::new() }.is_retryable());
        assert!(!IndexerError::Decode("bad json".into()).is_retryable());
    }

    #[test]
    fn json_eof_is_truncation() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\": [1, 2").unwrap_err();
        assert!(matches!(SerializationError::from(err), SerializationError::Truncated(_)));
        let err = serde_json::from_str::<serde_json::Value>("{\"a\" 1}").unwrap_err();
        assert!(matches!(SerializationError::from(err), SerializationError::Malformed(_)));
    }

    #[test]
    fn indexer_unavailable_display() {
        let e = WalletError::IndexerUnavailable {
            attempts: 3,
            source: IndexerError::Timeout,
        };
        assert_eq!(e.to_string(), "indexer unavailable after 3 attempt(s): request timed out");
    }
}
