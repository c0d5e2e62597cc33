//! Typed errors shared across the claimer.
//!
//! Application plumbing (config, files, startup) returns `eyre::Result`; these
//! enums cover the cases callers branch on.

use std::time::Duration;

use thiserror::Error;

/// Why a secret was rejected by the credential validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("private key must be a 64 character hexadecimal string, got {length} characters")]
    InvalidFormat { length: usize },

    #[error("private key is not a valid signing key: {reason}")]
    Derivation { reason: String },
}

/// Failure of a single chain interaction. Every variant is transient from the
/// worker's point of view: it is counted as a failed attempt and retried on the
/// next interval.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("insufficient funds to pay for gas")]
    InsufficientFunds,

    #[error("nonce too low, retry later")]
    NonceTooLow,

    #[error("replacement transaction underpriced, raise the gas price")]
    Underpriced,

    #[error("no receipt after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Fatal errors raised before any worker is dispatched.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("cannot reach the network: {0}")]
    Unreachable(ChainError),

    #[error("wrong network: chain id {actual}, expected {expected}")]
    WrongNetwork { expected: u64, actual: u64 },
}

/// A worker that died from a panic rather than through its own exit paths.
#[derive(Error, Debug)]
#[error("worker {label} faulted: {reason}")]
pub struct WorkerFault {
    pub label: String,
    pub reason: String,
}
