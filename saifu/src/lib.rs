//! Saifu - wallet custody and function dispatch for on-chain AI agents.
//!
//! This crate is the subsystem of an agent deployment that touches secret
//! material and irreversible financial operations. It generates chain
//! keypairs, encrypts private keys at rest, decrypts them transiently to
//! build chain sessions, and routes validated function calls from an
//! upstream agent to a chain client while normalizing every failure into a
//! structured result.
//!
//! # Architecture
//!
//! The core is organized around these components:
//!
//! - **Cipher** ([`cipher`]) - AES-256-CBC encryption of keys at rest
//! - **Keygen** ([`keygen`]) - keypair generation and address derivation
//! - **Store** ([`store`]) - durable user → wallet mapping and key custody
//! - **Registry** ([`registry`]) - per-user cache of live chain sessions
//! - **Dispatch** ([`dispatch`]) - validated, timeout-bounded operation
//!   execution with structured results
//! - **Chain** ([`chain`]) - the seams an external chain SDK plugs into
//!
//! A request flows store → cipher → registry → dispatch: the store yields
//! the encrypted key, the cipher opens it, the registry binds it to a
//! session, and the dispatcher executes against that session. No component
//! retains plaintext key material past its step in that chain.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use saifu::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> saifu::error::Result<()> {
//!     let config = Config::from_env()?;
//!     let cipher = KeyCipher::new(&config.encryption_key);
//!     let store = WalletStore::new(FileBackend::default_path(), cipher);
//!     let registry = Arc::new(AgentRegistry::new(my_sdk_factory(), config.environment));
//!     let dispatcher = FunctionDispatcher::new(Arc::clone(&registry), config.chain_timeout());
//!
//!     store.create_wallet("user-1", "main").await?;
//!     let key = store.decrypted_key("user-1").await?;
//!     let details = store.get_user_details("user-1").await?;
//!     registry
//!         .get_or_create("user-1", &details.wallets[0].address, &key)
//!         .await?;
//!     drop(key);
//!
//!     let result = dispatcher
//!         .execute("query_balances", serde_json::json!({}), "user-1")
//!         .await;
//!     println!("{result:?}");
//!     Ok(())
//! }
//! ```

// Core modules
pub mod chain;
pub mod cipher;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod keygen;
pub mod registry;
pub mod store;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error types (centralized)
    pub use crate::error::{
        ChainError, ChainResult, CipherError, CipherResult, ConfigError, ConfigResult,
        DispatchError, DispatchResult, Error, Result, StorageError, StorageResult, WalletError,
        WalletResult,
    };

    // Cipher
    pub use crate::cipher::KeyCipher;

    // Keygen
    pub use crate::keygen::{GeneratedWallet, Secp256k1Generator, WalletGenerator};

    // Store
    pub use crate::store::{
        ErrorResponse, FileBackend, MemoryBackend, UserDetails, WalletAdded, WalletBackend,
        WalletCreated, WalletDocument, WalletItem, WalletStore, WalletSummary,
    };

    // Registry
    pub use crate::registry::{AgentRegistry, AgentSession};

    // Chain
    pub use crate::chain::{
        ChainClient, ChainClientFactory, ChainEnvironment, TxReceipt,
    };

    // Dispatch
    pub use crate::dispatch::{CallDetails, FunctionCall, FunctionDispatcher, FunctionResult};

    // Config
    pub use crate::config::Config;
}
