//! Process configuration.
//!
//! The encryption secret is the one setting the process cannot run
//! without: a missing `ENCRYPTION_KEY` fails configuration loading, which
//! callers must treat as startup-fatal rather than degrading into a core
//! that cannot decrypt anything.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::chain::ChainEnvironment;
use crate::error::{ConfigError, ConfigResult};

/// Environment variable holding the key-encryption passphrase.
pub const ENV_ENCRYPTION_KEY: &str = "ENCRYPTION_KEY";
/// Environment variable selecting the chain environment.
pub const ENV_ENVIRONMENT: &str = "ENVIRONMENT";
/// Environment variable bounding chain calls, in seconds.
pub const ENV_CHAIN_TIMEOUT_SECS: &str = "CHAIN_TIMEOUT_SECS";

/// Default chain-call deadline in seconds.
const DEFAULT_CHAIN_TIMEOUT_SECS: u64 = 30;

/// Custody core configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Passphrase the at-rest key cipher is derived from.
    pub encryption_key: String,
    /// Network environment chain sessions are built against.
    #[serde(default)]
    pub environment: ChainEnvironment,
    /// Deadline for any single chain call, in seconds.
    #[serde(default = "default_chain_timeout_secs")]
    pub chain_timeout_secs: u64,
}

const fn default_chain_timeout_secs() -> u64 {
    DEFAULT_CHAIN_TIMEOUT_SECS
}

impl Config {
    /// Load configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] if `ENCRYPTION_KEY` is unset or empty;
    /// [`ConfigError::Invalid`] for an unknown environment name or a
    /// non-numeric timeout.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let encryption_key = lookup(ENV_ENCRYPTION_KEY)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::missing(ENV_ENCRYPTION_KEY))?;

        let environment = match lookup(ENV_ENVIRONMENT) {
            Some(value) => value.parse()?,
            None => ChainEnvironment::default(),
        };

        let chain_timeout_secs = match lookup(ENV_CHAIN_TIMEOUT_SECS) {
            Some(value) => value.parse().map_err(|_| {
                ConfigError::invalid(format!("{ENV_CHAIN_TIMEOUT_SECS} must be an integer"))
            })?,
            None => DEFAULT_CHAIN_TIMEOUT_SECS,
        };

        Ok(Self {
            encryption_key,
            environment,
            chain_timeout_secs,
        })
    }

    /// The chain-call deadline as a [`Duration`].
    #[must_use]
    pub const fn chain_timeout(&self) -> Duration {
        Duration::from_secs(self.chain_timeout_secs)
    }
}
