//! Chain-client abstraction.
//!
//! The actual wire protocol lives in an external SDK; this module only
//! defines the seams the custody core talks through: a session factory
//! bound to a decrypted private key and a client handle exposing the two
//! operations the dispatcher needs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ChainResult, ConfigError};

/// Network environment a chain session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainEnvironment {
    /// Production network.
    #[default]
    Mainnet,
    /// Test network.
    Testnet,
}

impl ChainEnvironment {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }
}

impl std::fmt::Display for ChainEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(ConfigError::invalid(format!(
                "unknown chain environment '{other}' (expected mainnet or testnet)"
            ))),
        }
    }
}

/// Receipt returned by a submitted transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Hash of the submitted transaction.
    pub tx_hash: String,
}

/// A live chain session bound to one private key.
///
/// Implementations are supplied by the embedding application (wrapping the
/// chain SDK) or by test stubs.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Query balances, denom → amount.
    ///
    /// An empty `denoms` slice asks for every denom the client knows about.
    async fn query_balances(&self, denoms: &[String]) -> ChainResult<BTreeMap<String, String>>;

    /// Submit a fund transfer and return its receipt.
    async fn transfer(&self, to: &str, amount: &str, denom: &str) -> ChainResult<TxReceipt>;
}

/// Builds chain sessions from a decrypted private key.
#[async_trait]
pub trait ChainClientFactory: Send + Sync {
    /// Construct a client handle signing with `private_key` against the
    /// given network environment.
    async fn create_session(
        &self,
        private_key: &str,
        environment: ChainEnvironment,
    ) -> ChainResult<Arc<dyn ChainClient>>;
}
