//! Wallet document model and persistence backends.
//!
//! One [`WalletDocument`] per user is the unit of persistence. The field
//! names are the stored contract: documents written here must be readable
//! by every other consumer of the document store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StorageResult;

/// One named address + encrypted private key pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletItem {
    /// User-chosen label, unique within the parent document.
    pub wallet_name: String,
    /// Chain-native address; unique across the whole store.
    pub address: String,
    /// Companion EVM-format address; also unique across the store.
    pub secondary_address: String,
    /// Private key as `ivHex:cipherHex` ciphertext, never plaintext.
    pub encrypted_key: String,
}

/// A user's wallet document: the active address plus all named items in
/// creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDocument {
    /// Opaque external identity, unique across the store.
    pub user_id: String,
    /// The address currently considered active for the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_address: Option<String>,
    /// Named items, insertion order = creation order.
    pub wallets: Vec<WalletItem>,
}

impl WalletDocument {
    /// Create a document with a single item, which becomes the active
    /// address.
    #[must_use]
    pub fn new(user_id: impl Into<String>, item: WalletItem) -> Self {
        Self {
            user_id: user_id.into(),
            current_address: Some(item.address.clone()),
            wallets: vec![item],
        }
    }

    /// Find the item carrying the given chain-native address.
    #[must_use]
    pub fn item_by_address(&self, address: &str) -> Option<&WalletItem> {
        self.wallets.iter().find(|w| w.address == address)
    }

    /// Whether any item already uses the given label.
    #[must_use]
    pub fn has_wallet_name(&self, name: &str) -> bool {
        self.wallets.iter().any(|w| w.wallet_name == name)
    }

    /// Whether the document owns the given address in either encoding.
    #[must_use]
    pub fn owns_address(&self, address: &str) -> bool {
        self.wallets
            .iter()
            .any(|w| w.address == address || w.secondary_address == address)
    }
}

/// Trait for wallet persistence backends.
///
/// Absent documents are an `Ok(None)`, not an error; only genuine I/O or
/// serialization faults surface as [`StorageError`](crate::error::StorageError).
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Load a document by user id.
    async fn load(&self, user_id: &str) -> StorageResult<Option<WalletDocument>>;

    /// Insert or replace a document.
    async fn save(&self, doc: &WalletDocument) -> StorageResult<()>;

    /// Delete a whole document. Deleting an absent user is a no-op.
    async fn delete(&self, user_id: &str) -> StorageResult<()>;

    /// List all stored user ids.
    async fn list_user_ids(&self) -> StorageResult<Vec<String>>;

    /// Find the user owning an address (in either encoding), if any.
    async fn address_owner(&self, address: &str) -> StorageResult<Option<String>>;

    /// Check if a document exists for the user.
    async fn exists(&self, user_id: &str) -> StorageResult<bool> {
        Ok(self.load(user_id).await?.is_some())
    }
}

/// In-memory wallet storage.
///
/// Fast but not persistent across restarts; the default for tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    docs: RwLock<HashMap<String, WalletDocument>>,
}

impl MemoryBackend {
    /// Create a new memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletBackend for MemoryBackend {
    async fn load(&self, user_id: &str) -> StorageResult<Option<WalletDocument>> {
        Ok(self.docs.read().await.get(user_id).cloned())
    }

    async fn save(&self, doc: &WalletDocument) -> StorageResult<()> {
        self.docs
            .write()
            .await
            .insert(doc.user_id.clone(), doc.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> StorageResult<()> {
        self.docs.write().await.remove(user_id);
        Ok(())
    }

    async fn list_user_ids(&self) -> StorageResult<Vec<String>> {
        Ok(self.docs.read().await.keys().cloned().collect())
    }

    async fn address_owner(&self, address: &str) -> StorageResult<Option<String>> {
        Ok(self
            .docs
            .read()
            .await
            .values()
            .find(|doc| doc.owns_address(address))
            .map(|doc| doc.user_id.clone()))
    }
}

/// File-based wallet storage.
///
/// Persists one JSON document per user in a directory.
#[derive(Debug)]
pub struct FileBackend {
    base_path: PathBuf,
}

impl FileBackend {
    /// Create a file backend rooted at the given directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create a file backend in the default location (`~/.saifu/wallets`).
    #[must_use]
    pub fn default_path() -> Self {
        let path = dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".saifu")
            .join("wallets");
        Self::new(path)
    }

    /// File path for a user id.
    fn doc_path(&self, user_id: &str) -> PathBuf {
        // Sanitize for filename
        let safe_id = user_id.replace([':', '/', '\\'], "_");
        self.base_path.join(format!("{safe_id}.json"))
    }

    /// Ensure the storage directory exists.
    async fn ensure_dir(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    /// Load every document in the directory.
    async fn load_all(&self) -> StorageResult<Vec<WalletDocument>> {
        self.ensure_dir().await?;

        let mut docs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let content = tokio::fs::read_to_string(&path).await?;
                docs.push(serde_json::from_str(&content)?);
            }
        }

        Ok(docs)
    }
}

#[async_trait]
impl WalletBackend for FileBackend {
    async fn load(&self, user_id: &str) -> StorageResult<Option<WalletDocument>> {
        let path = self.doc_path(user_id);

        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let doc: WalletDocument = serde_json::from_str(&content)?;
        debug!(user_id = %user_id, "loaded wallet document");
        Ok(Some(doc))
    }

    async fn save(&self, doc: &WalletDocument) -> StorageResult<()> {
        self.ensure_dir().await?;

        let path = self.doc_path(&doc.user_id);
        let content = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&path, content).await?;
        debug!(user_id = %doc.user_id, "saved wallet document");
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> StorageResult<()> {
        let path = self.doc_path(user_id);

        if path.exists() {
            tokio::fs::remove_file(&path).await?;
            debug!(user_id = %user_id, "deleted wallet document");
        }
        Ok(())
    }

    async fn list_user_ids(&self) -> StorageResult<Vec<String>> {
        Ok(self.load_all().await?.into_iter().map(|d| d.user_id).collect())
    }

    async fn address_owner(&self, address: &str) -> StorageResult<Option<String>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .find(|doc| doc.owns_address(address))
            .map(|doc| doc.user_id))
    }
}
