// Path: crates/types/src/error/mod.rs

//! Core error types for the gitmesh node.

use crate::tx::TokenAmount;
use crate::Address;
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Low-level failures shared by every subsystem.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An error occurred while producing a canonical encoding.
    #[error("Encoding error: {0}")]
    Encoding(String),
    /// A cryptographic primitive failed.
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl ErrorCode for CoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Encoding(_) => "CORE_ENCODING_ERROR",
            Self::Crypto(_) => "CORE_CRYPTO_ERROR",
        }
    }
}

/// Errors related to decoding and structural validation of transactions.
#[derive(Error, Debug)]
pub enum TxError {
    /// Decode failure on any message.
    #[error("Bad encoding: {0}")]
    BadEncoding(String),
    /// The leading transaction type code is not in the closed set.
    #[error("Unknown transaction type code: {0}")]
    UnknownType(u8),
    /// A decimal amount field did not parse.
    #[error("Invalid amount {value:?}: {reason}")]
    InvalidAmount {
        /// The raw decimal string.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A structural or consistency rule failed.
    #[error("Invalid transaction: {0}")]
    Invalid(String),
}

impl ErrorCode for TxError {
    fn code(&self) -> &'static str {
        match self {
            Self::BadEncoding(_) => "TX_BAD_ENCODING",
            Self::UnknownType(_) => "TX_UNKNOWN_TYPE",
            Self::InvalidAmount { .. } => "TX_INVALID_AMOUNT",
            Self::Invalid(_) => "TX_INVALID",
        }
    }
}

impl From<CoreError> for TxError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Encoding(s) => TxError::BadEncoding(s),
            CoreError::Crypto(s) => TxError::Invalid(format!("crypto failure: {}", s)),
        }
    }
}

/// Errors raised by the priced pool and the nonce-gap cache.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool has reached its configured entry cap.
    #[error("Transaction pool is full")]
    ContainerFull,
    /// The sender already owns the maximum number of pending entries.
    #[error("Sender {sender} has reached the pending transaction limit of {limit}")]
    SenderLimitReached {
        /// The offending sender.
        sender: Address,
        /// The configured per-sender cap.
        limit: usize,
    },
    /// A replace-by-fee attempt did not offer a strictly greater fee.
    #[error("Replacement fee {offered} is not greater than the current fee {current}")]
    ReplaceByFeeTooLow {
        /// Fee of the entry already in the pool.
        current: TokenAmount,
        /// Fee offered by the replacement.
        offered: TokenAmount,
    },
    /// The transaction nonce is at or below the sender's on-chain nonce.
    #[error("Nonce {got} is not above the account nonce {account_nonce}")]
    NonceBelowAccount {
        /// The sender's current on-chain nonce.
        account_nonce: u64,
        /// The nonce carried by the transaction.
        got: u64,
    },
    /// The exact transaction bytes are already pending.
    #[error("Transaction is already in the pool")]
    DuplicateTransaction,
    /// The nonce-gap cache already holds an entry for this `(sender, nonce)`.
    #[error("A transaction for this sender and nonce is already cached")]
    CacheKeyExists,
    /// The serialized transaction exceeds the single-transaction size cap.
    #[error("Transaction size {size} exceeds the limit of {max} bytes")]
    TxTooLarge {
        /// Serialized size of the rejected transaction.
        size: u64,
        /// The configured cap.
        max: u64,
    },
    /// Admitting the transaction would exceed the aggregate byte budget.
    #[error("Pool byte capacity exceeded")]
    ByteCapacityExceeded,
}

impl ErrorCode for PoolError {
    fn code(&self) -> &'static str {
        match self {
            Self::ContainerFull => "POOL_CONTAINER_FULL",
            Self::SenderLimitReached { .. } => "POOL_SENDER_LIMIT_REACHED",
            Self::ReplaceByFeeTooLow { .. } => "POOL_REPLACE_BY_FEE_TOO_LOW",
            Self::NonceBelowAccount { .. } => "POOL_NONCE_BELOW_ACCOUNT",
            Self::DuplicateTransaction => "POOL_DUPLICATE_TX",
            Self::CacheKeyExists => "POOL_CACHE_KEY_EXISTS",
            Self::TxTooLarge { .. } => "POOL_TX_TOO_LARGE",
            Self::ByteCapacityExceeded => "POOL_BYTE_CAPACITY_EXCEEDED",
        }
    }
}

/// Errors surfaced by mempool admission and block-commit processing.
#[derive(Error, Debug)]
pub enum MempoolError {
    /// A container-level failure.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// A decode or structural failure.
    #[error(transparent)]
    Tx(#[from] TxError),
    /// The pluggable transaction validator rejected the transaction.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl ErrorCode for MempoolError {
    fn code(&self) -> &'static str {
        match self {
            Self::Pool(e) => e.code(),
            Self::Tx(e) => e.code(),
            Self::ValidationFailed(_) => "MEMPOOL_VALIDATION_FAILED",
        }
    }
}

/// Errors produced by the push-note pipeline.
///
/// `Clone` because a fetch outcome fans out to every caller coalesced onto
/// the same in-flight request.
#[derive(Error, Debug, Clone)]
pub enum PushError {
    /// Decode failure on a note or wire message.
    #[error("Bad encoding: {0}")]
    BadEncoding(String),
    /// Structural, signature, or consistency failure.
    #[error("Push validation failed: {0}")]
    Validation(String),
    /// The reference's declared old hash does not match the locally observed
    /// hash. Carries the offending reference name as structured data so the
    /// resync hook can act on it.
    #[error("Local hash of reference {reference} does not match the note's old hash")]
    RefMismatch {
        /// The offending reference name.
        reference: String,
    },
    /// The authenticator or policy enforcer rejected the push.
    #[error("Authorization failed: {0}")]
    Authorization(String),
    /// The target repository is unknown to the chain state.
    #[error("Repository {0} not found")]
    RepoNotFound(String),
    /// The note names a namespace that does not resolve.
    #[error("Namespace {0} not found")]
    NamespaceNotFound(String),
    /// The pusher key is unknown or revoked.
    #[error("Push key {0} not found")]
    PushKeyNotFound(String),
    /// The note's declared size disagrees with the locally computed size.
    #[error("Declared size {declared} does not match locally computed size {computed}")]
    SizeMismatch {
        /// Byte size declared by the note.
        declared: u64,
        /// Byte size computed against the local repository.
        computed: u64,
    },
    /// git-receive-pack rejected the update or the pack was malformed.
    #[error("Dry run failed: {0}")]
    DryRun(String),
    /// The object fetcher exhausted its peers.
    #[error("Object fetch failed: {0}")]
    Fetch(String),
    /// A local repository operation failed.
    #[error("Repository error: {0}")]
    Repo(String),
    /// The push pool has reached its capacity.
    #[error("Push pool is full")]
    PoolFull,
    /// A note with this ID is already pending.
    #[error("Push note is already pending")]
    DuplicateNote,
    /// A bounded operation exceeded its wall-clock budget.
    #[error("Timed out: {0}")]
    Timeout(String),
    /// The operation was cancelled before completion.
    #[error("Cancelled")]
    Cancelled,
}

impl ErrorCode for PushError {
    fn code(&self) -> &'static str {
        match self {
            Self::BadEncoding(_) => "PUSH_BAD_ENCODING",
            Self::Validation(_) => "PUSH_VALIDATION_FAILED",
            Self::RefMismatch { .. } => "PUSH_REF_LOCAL_HASH_MISMATCH",
            Self::Authorization(_) => "PUSH_AUTHORIZATION_FAILED",
            Self::RepoNotFound(_) => "PUSH_REPO_NOT_FOUND",
            Self::NamespaceNotFound(_) => "PUSH_NAMESPACE_NOT_FOUND",
            Self::PushKeyNotFound(_) => "PUSH_KEY_NOT_FOUND",
            Self::SizeMismatch { .. } => "PUSH_SIZE_MISMATCH",
            Self::DryRun(_) => "PUSH_DRY_RUN_FAILED",
            Self::Fetch(_) => "PUSH_FETCH_FAILED",
            Self::Repo(_) => "PUSH_REPO_ERROR",
            Self::PoolFull => "PUSH_POOL_FULL",
            Self::DuplicateNote => "PUSH_DUPLICATE_NOTE",
            Self::Timeout(_) => "PUSH_TIMEOUT",
            Self::Cancelled => "PUSH_CANCELLED",
        }
    }
}

impl From<CoreError> for PushError {
    fn from(e: CoreError) -> Self {
        PushError::BadEncoding(e.to_string())
    }
}

/// Errors from cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The signature failed cryptographic verification.
    #[error("Signature verification failed")]
    VerificationFailed,
    /// The provided key material is malformed or invalid for the algorithm.
    #[error("Invalid cryptographic key: {0}")]
    InvalidKey(String),
    /// The provided signature material is malformed.
    #[error("Invalid signature format: {0}")]
    InvalidSignature(String),
    /// A digest or key had an unexpected length.
    #[error("Invalid length: expected {expected}, got {got}")]
    InvalidLength {
        /// The expected length in bytes.
        expected: usize,
        /// The actual length in bytes.
        got: usize,
    },
    /// A generic failure in an underlying cryptographic library.
    #[error("Cryptographic operation failed: {0}")]
    OperationFailed(String),
    /// Aggregation over an empty set or mismatched inputs.
    #[error("Invalid input for operation: {0}")]
    InvalidInput(String),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::VerificationFailed => "CRYPTO_VERIFICATION_FAILED",
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::InvalidSignature(_) => "CRYPTO_INVALID_SIGNATURE",
            Self::InvalidLength { .. } => "CRYPTO_INVALID_LENGTH",
            Self::OperationFailed(_) => "CRYPTO_OPERATION_FAILED",
            Self::InvalidInput(_) => "CRYPTO_INVALID_INPUT",
        }
    }
}

impl From<CryptoError> for PushError {
    fn from(e: CryptoError) -> Self {
        PushError::Validation(e.to_string())
    }
}

/// Errors from endorsement handling and push-transaction assembly.
#[derive(Error, Debug)]
pub enum EndorseError {
    /// The endorsement quorum has not been reached yet.
    #[error("Not enough endorsements: have {have}, need {need}")]
    NotEnoughEndorsements {
        /// Endorsements currently registered for the note.
        have: usize,
        /// The configured quorum size.
        need: usize,
    },
    /// The builder was invoked for a note absent from the push pool.
    #[error("Push note {0} not found")]
    NoteNotFound(String),
    /// The endorser is not in the current top-host committee.
    #[error("Endorser {0} is not a top host")]
    EndorserNotTopHost(String),
    /// No selected ticket could be resolved for the endorser.
    #[error("No selected ticket for endorser {0}")]
    TicketNotFound(String),
    /// The ticket's registered BLS public key did not decode.
    #[error("BLS public key decode failed: {0}")]
    BlsKeyDecode(String),
    /// BLS signature aggregation failed.
    #[error("Signature aggregation failed: {0}")]
    AggregationFailed(String),
    /// Structural or signature validation of the endorsement failed.
    #[error("Endorsement validation failed: {0}")]
    Validation(String),
    /// The endorsement was already registered.
    #[error("Endorsement is already registered")]
    Duplicate,
}

impl ErrorCode for EndorseError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotEnoughEndorsements { .. } => "ENDORSE_NOT_ENOUGH",
            Self::NoteNotFound(_) => "ENDORSE_NOTE_NOT_FOUND",
            Self::EndorserNotTopHost(_) => "ENDORSE_NOT_TOP_HOST",
            Self::TicketNotFound(_) => "ENDORSE_TICKET_NOT_FOUND",
            Self::BlsKeyDecode(_) => "ENDORSE_BLS_KEY_DECODE",
            Self::AggregationFailed(_) => "ENDORSE_AGGREGATION_FAILED",
            Self::Validation(_) => "ENDORSE_VALIDATION_FAILED",
            Self::Duplicate => "ENDORSE_DUPLICATE",
        }
    }
}
