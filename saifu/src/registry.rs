//! Per-user cache of live chain sessions.
//!
//! A session binds a decrypted private key to a chain client for the
//! lifetime of the process. The registry is an explicit object passed by
//! reference to request handlers, never an ambient global map, and
//! its cache is never persisted: after a restart, sessions are re-derived
//! from the stored encrypted keys.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::chain::{ChainClient, ChainClientFactory, ChainEnvironment};
use crate::error::ChainResult;

/// An in-memory binding of one user to a live chain client.
///
/// The decrypted key itself is consumed during construction and not
/// retained; the session records only the active address it was built for.
pub struct AgentSession {
    user_id: String,
    address: String,
    client: Arc<dyn ChainClient>,
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("user_id", &self.user_id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl AgentSession {
    /// The owning user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The active address this session was built for.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The underlying chain client.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }
}

/// Process-wide session cache keyed by user id.
pub struct AgentRegistry {
    factory: Arc<dyn ChainClientFactory>,
    environment: ChainEnvironment,
    sessions: Mutex<HashMap<String, Arc<AgentSession>>>,
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl AgentRegistry {
    /// Create a registry building sessions with the given factory against
    /// one network environment.
    pub fn new(factory: impl ChainClientFactory + 'static, environment: ChainEnvironment) -> Self {
        Self {
            factory: Arc::new(factory),
            environment,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Get the cached session for a user, or build one from the supplied
    /// key.
    ///
    /// The cache read and insert are atomic per call: under concurrent
    /// first use, exactly one session is constructed. A cached session
    /// whose recorded address no longer matches `current_address` is
    /// considered stale (the user rotated wallets) and is rebuilt.
    ///
    /// # Errors
    ///
    /// [`ChainError`](crate::error::ChainError) from session construction.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        current_address: &str,
        private_key: &str,
    ) -> ChainResult<Arc<AgentSession>> {
        let mut sessions = self.sessions.lock().await;

        if let Some(session) = sessions.get(user_id) {
            if session.address == current_address {
                debug!(user_id = %user_id, "reusing cached session");
                return Ok(Arc::clone(session));
            }
            info!(user_id = %user_id, "active address changed, rebuilding session");
        }

        let client = self
            .factory
            .create_session(private_key, self.environment)
            .await?;

        let session = Arc::new(AgentSession {
            user_id: user_id.to_owned(),
            address: current_address.to_owned(),
            client,
        });
        sessions.insert(user_id.to_owned(), Arc::clone(&session));

        info!(user_id = %user_id, environment = %self.environment, "session initialized");
        Ok(session)
    }

    /// Look up a live session without creating one.
    pub async fn get(&self, user_id: &str) -> Option<Arc<AgentSession>> {
        self.sessions.lock().await.get(user_id).cloned()
    }

    /// Drop a user's cached session. Returns whether one existed.
    pub async fn invalidate(&self, user_id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(user_id).is_some();
        if removed {
            info!(user_id = %user_id, "session invalidated");
        }
        removed
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no sessions are live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
