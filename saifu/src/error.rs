//! Unified error types for saifu.
//!
//! Each layer (cipher, custody, storage, chain, dispatch, config) owns a
//! small `thiserror` enum; all of them convert into the crate-level
//! [`Error`]. No variant ever carries key material in its payload; error
//! messages name users, wallets and functions, never secrets.

use std::fmt;

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for saifu operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Key encryption/decryption error.
    #[error("cipher: {0}")]
    Cipher(#[from] CipherError),

    /// Wallet custody error.
    #[error("wallet: {0}")]
    Wallet(#[from] WalletError),

    /// Persistence backend error.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// Chain client error.
    #[error("chain: {0}")]
    Chain(#[from] ChainError),

    /// Function dispatch error.
    #[error("dispatch: {0}")]
    Dispatch(#[from] DispatchError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Create an internal error.
    #[inline]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias for saifu operations.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Cipher Errors
// ============================================================================

/// Error type for key encryption/decryption.
///
/// The scheme is CBC without an integrity tag, so tampering is only
/// partially detected: a corrupted ciphertext may decrypt to garbage, fail
/// the padding sanity check, or fail UTF-8 decoding. All three outcomes are
/// structured errors; none of them panics.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// Input is not in the `ivHex:cipherHex` format.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// Final plaintext byte is not a plausible PKCS#7 padding length.
    #[error("invalid padding detected")]
    InvalidPadding,

    /// Unpadded plaintext is not valid UTF-8.
    #[error("decrypted data is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
}

impl CipherError {
    /// Create a malformed-ciphertext error.
    #[inline]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedCiphertext(msg.into())
    }
}

/// Result type for cipher operations.
pub type CipherResult<T> = std::result::Result<T, CipherError>;

// ============================================================================
// Wallet Custody Errors
// ============================================================================

/// Error type for wallet generation and custody operations.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Wallet key/address generation failed.
    #[error("wallet creation failed: {0}")]
    Creation(String),

    /// A wallet document already exists for this user.
    #[error("user already has a wallet: {0}")]
    DuplicateUser(String),

    /// The wallet name is already taken within the user's wallet set.
    #[error("wallet name already exists: {0}")]
    DuplicateWalletName(String),

    /// A generated address collides with one already in the store.
    #[error("address already in use: {0}")]
    DuplicateAddress(String),

    /// No wallet document exists for this user.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// The user's document has no active address set.
    #[error("no active address for user: {0}")]
    NoActiveAddress(String),

    /// The active address does not match any wallet item.
    #[error("no wallet item for address: {0}")]
    WalletItemNotFound(String),

    /// Key decryption failed.
    #[error("cipher: {0}")]
    Cipher(#[from] CipherError),

    /// Persistence backend failed.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

impl WalletError {
    /// Create a creation-failed error.
    #[inline]
    pub fn creation(msg: impl Into<String>) -> Self {
        Self::Creation(msg.into())
    }
}

/// Result type for wallet custody operations.
pub type WalletResult<T> = std::result::Result<T, WalletError>;

// ============================================================================
// Storage Errors
// ============================================================================

/// Error type for the persistence backend.
///
/// "Not found" is not a storage error; absent documents are reported as
/// `Ok(None)` by backends, so lookups can distinguish a valid miss from an
/// I/O fault.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ============================================================================
// Chain Errors
// ============================================================================

/// Error type for chain-client operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Chain call exceeded its deadline. The outcome on chain is unknown.
    #[error("chain call timed out after {0}s; outcome unknown")]
    Timeout(u64),

    /// RPC-level failure reported by the chain client.
    #[error("rpc: {0}")]
    Rpc(String),

    /// Session construction against the chain failed.
    #[error("session: {0}")]
    Session(String),
}

impl ChainError {
    /// Create an RPC error.
    #[inline]
    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::Rpc(msg.into())
    }

    /// Create a session-construction error.
    #[inline]
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = std::result::Result<T, ChainError>;

// ============================================================================
// Dispatch Errors
// ============================================================================

/// Error type for function dispatch.
///
/// These never escape [`FunctionDispatcher::execute`](crate::dispatch::FunctionDispatcher::execute)
/// as raw errors; the dispatcher folds them into the structured
/// [`FunctionResult`](crate::dispatch::FunctionResult).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No live session exists for the agent.
    #[error("agent not initialized; provide valid credentials first")]
    AgentNotInitialized,

    /// Arguments do not match the declared shape for the function.
    #[error("invalid arguments for '{function}': {reason}")]
    InvalidArguments {
        /// The function whose arguments were rejected.
        function: String,
        /// What was wrong, naming the offending field.
        reason: String,
    },

    /// The bounded chain call expired.
    #[error("chain call timed out after {0}s; outcome unknown, do not blindly resubmit")]
    ChainTimeout(u64),

    /// Any other failure from the underlying chain client.
    #[error("chain operation failed: {0}")]
    Chain(#[from] ChainError),
}

impl DispatchError {
    /// Create an invalid-arguments error.
    #[inline]
    pub fn invalid_args(function: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            function: function.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Error type for process configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Missing required setting.
    #[error("missing: {0}")]
    Missing(String),

    /// Invalid setting value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a missing-setting error.
    #[inline]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    /// Create an invalid-value error.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Display Helpers
// ============================================================================

/// A wrapper that displays errors in a user-friendly format.
#[derive(Debug)]
pub struct DisplayError<'a>(pub &'a Error);

impl fmt::Display for DisplayError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Error::Cipher(e) => write!(f, "Encryption error: {e}"),
            Error::Wallet(e) => write!(f, "Wallet error: {e}"),
            Error::Storage(e) => write!(f, "Storage error: {e}"),
            Error::Chain(e) => write!(f, "Chain error: {e}"),
            Error::Dispatch(e) => write!(f, "Dispatch error: {e}"),
            Error::Config(e) => write!(f, "Configuration error: {e}"),
            Error::Internal(e) => write!(f, "Internal error: {e}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
