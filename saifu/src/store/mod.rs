//! Durable user → wallet mapping and key custody.
//!
//! [`WalletStore`] is the single choke point where plaintext key material
//! is materialized ([`WalletStore::decrypted_key`]); everything else it
//! returns is addresses and labels. Write operations serialize per user so
//! concurrent requests cannot both pass a uniqueness check and both insert.

mod backend;

pub use backend::{FileBackend, MemoryBackend, WalletBackend, WalletDocument, WalletItem};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::cipher::KeyCipher;
use crate::error::{StorageResult, WalletError};
use crate::keygen::{Secp256k1Generator, WalletGenerator};

/// Public fields of one wallet item, the part callers may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    /// User-chosen label.
    pub wallet_name: String,
    /// Chain-native address.
    pub address: String,
    /// Companion EVM-format address.
    pub secondary_address: String,
}

impl From<&WalletItem> for WalletSummary {
    fn from(item: &WalletItem) -> Self {
        Self {
            wallet_name: item.wallet_name.clone(),
            address: item.address.clone(),
            secondary_address: item.secondary_address.clone(),
        }
    }
}

/// Successful result of [`WalletStore::create_wallet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletCreated {
    /// Always `true` on the success path.
    pub ok: bool,
    /// The owning user.
    pub user_id: String,
    /// The label of the new wallet.
    pub wallet_name: String,
    /// Chain-native address of the new wallet.
    pub address: String,
    /// Companion EVM-format address.
    pub secondary_address: String,
}

/// Successful result of [`WalletStore::add_wallet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAdded {
    /// Always `true` on the success path.
    pub ok: bool,
    /// The owning user.
    pub user_id: String,
    /// Public fields of the item just added.
    pub new_wallet: WalletSummary,
    /// The refreshed wallet list, creation order.
    pub wallets: Vec<WalletSummary>,
}

/// Successful result of [`WalletStore::get_user_details`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    /// Always `true` on the success path.
    pub ok: bool,
    /// The queried user.
    pub user_id: String,
    /// All wallet items, creation order, addresses only.
    pub wallets: Vec<WalletSummary>,
}

/// Uniform failure shape handed to transports: `{ok: false, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub ok: bool,
    /// Human-readable failure message; never contains key material.
    pub error: String,
}

impl From<&WalletError> for ErrorResponse {
    fn from(err: &WalletError) -> Self {
        Self {
            ok: false,
            error: err.to_string(),
        }
    }
}

/// Durable wallet custody over a pluggable backend.
pub struct WalletStore {
    backend: Arc<dyn WalletBackend>,
    cipher: KeyCipher,
    generator: Arc<dyn WalletGenerator>,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for WalletStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletStore").finish_non_exhaustive()
    }
}

impl WalletStore {
    /// Create a store over the given backend, generating keys with the
    /// default secp256k1 generator.
    pub fn new(backend: impl WalletBackend + 'static, cipher: KeyCipher) -> Self {
        Self::with_generator(backend, cipher, Secp256k1Generator::new())
    }

    /// Create a store with a custom wallet generator.
    pub fn with_generator(
        backend: impl WalletBackend + 'static,
        cipher: KeyCipher,
        generator: impl WalletGenerator + 'static,
    ) -> Self {
        Self {
            backend: Arc::new(backend),
            cipher,
            generator: Arc::new(generator),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Per-user mutex guarding read-check-write sequences.
    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        Arc::clone(locks.entry(user_id.to_owned()).or_default())
    }

    /// Generate a keypair and refuse addresses already present anywhere in
    /// the store.
    async fn generate_unique(&self) -> Result<WalletItem, WalletError> {
        let generated = self.generator.generate()?;

        for addr in [&generated.address, &generated.secondary_address] {
            if self.backend.address_owner(addr).await?.is_some() {
                return Err(WalletError::DuplicateAddress(addr.clone()));
            }
        }

        Ok(WalletItem {
            wallet_name: String::new(),
            address: generated.address.clone(),
            secondary_address: generated.secondary_address.clone(),
            encrypted_key: self.cipher.encrypt(&generated.private_key),
        })
    }

    /// Create the first wallet for a user.
    ///
    /// # Errors
    ///
    /// [`WalletError::DuplicateUser`] if the user already has a document,
    /// [`WalletError::Creation`] if generation fails,
    /// [`WalletError::DuplicateAddress`] on a store-wide address collision.
    pub async fn create_wallet(
        &self,
        user_id: &str,
        wallet_name: &str,
    ) -> Result<WalletCreated, WalletError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        if self.backend.exists(user_id).await? {
            return Err(WalletError::DuplicateUser(user_id.to_owned()));
        }

        let mut item = self.generate_unique().await?;
        item.wallet_name = wallet_name.to_owned();

        let created = WalletCreated {
            ok: true,
            user_id: user_id.to_owned(),
            wallet_name: item.wallet_name.clone(),
            address: item.address.clone(),
            secondary_address: item.secondary_address.clone(),
        };

        self.backend
            .save(&WalletDocument::new(user_id, item))
            .await?;

        info!(user_id = %user_id, address = %created.address, "created wallet");
        Ok(created)
    }

    /// Append a named wallet to an existing user.
    ///
    /// # Errors
    ///
    /// [`WalletError::UserNotFound`] if the user has no document,
    /// [`WalletError::DuplicateWalletName`] if the label is taken,
    /// plus the generation errors of [`Self::create_wallet`].
    pub async fn add_wallet(
        &self,
        user_id: &str,
        wallet_name: &str,
    ) -> Result<WalletAdded, WalletError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut doc = self
            .backend
            .load(user_id)
            .await?
            .ok_or_else(|| WalletError::UserNotFound(user_id.to_owned()))?;

        if doc.has_wallet_name(wallet_name) {
            return Err(WalletError::DuplicateWalletName(wallet_name.to_owned()));
        }

        let mut item = self.generate_unique().await?;
        item.wallet_name = wallet_name.to_owned();
        let new_wallet = WalletSummary::from(&item);

        doc.wallets.push(item);
        self.backend.save(&doc).await?;

        info!(user_id = %user_id, address = %new_wallet.address, "added wallet");
        Ok(WalletAdded {
            ok: true,
            user_id: user_id.to_owned(),
            new_wallet,
            wallets: doc.wallets.iter().map(WalletSummary::from).collect(),
        })
    }

    /// Fetch a user's wallet list, addresses only.
    ///
    /// # Errors
    ///
    /// [`WalletError::UserNotFound`].
    pub async fn get_user_details(&self, user_id: &str) -> Result<UserDetails, WalletError> {
        let doc = self
            .backend
            .load(user_id)
            .await?
            .ok_or_else(|| WalletError::UserNotFound(user_id.to_owned()))?;

        debug!(user_id = %user_id, wallets = doc.wallets.len(), "fetched user details");
        Ok(UserDetails {
            ok: true,
            user_id: doc.user_id,
            wallets: doc.wallets.iter().map(WalletSummary::from).collect(),
        })
    }

    /// Decrypt the private key behind the user's active address.
    ///
    /// The returned key has any `0x` prefix stripped. This is the single
    /// point where plaintext key material exists; callers must use it for
    /// immediate session construction or signing and drop it.
    ///
    /// # Errors
    ///
    /// [`WalletError::UserNotFound`], [`WalletError::NoActiveAddress`],
    /// [`WalletError::WalletItemNotFound`], or a nested
    /// [`CipherError`](crate::error::CipherError).
    pub async fn decrypted_key(&self, user_id: &str) -> Result<String, WalletError> {
        let doc = self
            .backend
            .load(user_id)
            .await?
            .ok_or_else(|| WalletError::UserNotFound(user_id.to_owned()))?;

        let current = doc
            .current_address
            .as_deref()
            .ok_or_else(|| WalletError::NoActiveAddress(user_id.to_owned()))?;

        let item = doc
            .item_by_address(current)
            .ok_or_else(|| WalletError::WalletItemNotFound(current.to_owned()))?;

        let key = Zeroizing::new(self.cipher.decrypt(&item.encrypted_key)?);
        let raw = key.strip_prefix("0x").unwrap_or(&key);
        Ok(raw.to_owned())
    }

    /// Point the user's active address at another of their own items.
    ///
    /// # Errors
    ///
    /// [`WalletError::UserNotFound`] or [`WalletError::WalletItemNotFound`]
    /// if the address is not one of the user's items.
    pub async fn set_current_address(
        &self,
        user_id: &str,
        address: &str,
    ) -> Result<(), WalletError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut doc = self
            .backend
            .load(user_id)
            .await?
            .ok_or_else(|| WalletError::UserNotFound(user_id.to_owned()))?;

        if doc.item_by_address(address).is_none() {
            return Err(WalletError::WalletItemNotFound(address.to_owned()));
        }

        doc.current_address = Some(address.to_owned());
        self.backend.save(&doc).await?;

        info!(user_id = %user_id, address = %address, "active address changed");
        Ok(())
    }

    /// Whether the user has a wallet document.
    ///
    /// "Not found" is a valid `false`; only storage faults are errors.
    pub async fn user_exists(&self, user_id: &str) -> StorageResult<bool> {
        self.backend.exists(user_id).await
    }

    /// Delete a user's whole wallet document, items and all.
    ///
    /// # Errors
    ///
    /// Storage faults only; deleting an absent user is a no-op.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), WalletError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        self.backend.delete(user_id).await?;
        info!(user_id = %user_id, "deleted wallet document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WalletResult;
    use crate::keygen::GeneratedWallet;

    /// Generator handing out a scripted sequence of wallets.
    struct ScriptedGenerator {
        queue: std::sync::Mutex<Vec<GeneratedWallet>>,
    }

    impl ScriptedGenerator {
        fn new(mut wallets: Vec<GeneratedWallet>) -> Self {
            wallets.reverse();
            Self {
                queue: std::sync::Mutex::new(wallets),
            }
        }
    }

    impl WalletGenerator for ScriptedGenerator {
        fn generate(&self) -> WalletResult<GeneratedWallet> {
            self.queue
                .lock()
                .expect("generator lock")
                .pop()
                .ok_or_else(|| WalletError::creation("scripted generator exhausted"))
        }
    }

    fn fixed(addr: &str, key: &str) -> GeneratedWallet {
        GeneratedWallet {
            address: addr.into(),
            secondary_address: format!("0x{}", addr.trim_start_matches("inj1")),
            private_key: key.into(),
        }
    }

    fn store() -> WalletStore {
        WalletStore::new(MemoryBackend::new(), KeyCipher::new("store-test-secret"))
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let store = store();

        let created = store.create_wallet("u1", "main").await.unwrap();
        assert!(created.ok);
        assert!(created.address.starts_with("inj1"));

        let details = store.get_user_details("u1").await.unwrap();
        assert_eq!(details.wallets.len(), 1);
        assert_eq!(details.wallets[0].wallet_name, "main");
        assert_eq!(details.wallets[0].address, created.address);
    }

    #[tokio::test]
    async fn test_create_twice_is_duplicate_user() {
        let store = store();
        store.create_wallet("u1", "main").await.unwrap();

        let err = store.create_wallet("u1", "other").await.unwrap_err();
        assert!(matches!(err, WalletError::DuplicateUser(_)));
    }

    #[tokio::test]
    async fn test_add_requires_existing_user() {
        let err = store().add_wallet("ghost", "main").await.unwrap_err();
        assert!(matches!(err, WalletError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate_name() {
        let store = store();
        store.create_wallet("u1", "main").await.unwrap();

        let err = store.add_wallet("u1", "main").await.unwrap_err();
        assert!(matches!(err, WalletError::DuplicateWalletName(_)));

        let added = store.add_wallet("u1", "second").await.unwrap();
        assert_eq!(added.wallets.len(), 2);
        assert_eq!(added.new_wallet.wallet_name, "second");
    }

    #[tokio::test]
    async fn test_generated_address_collision_is_rejected() {
        let generator = ScriptedGenerator::new(vec![
            fixed("inj1samesame", "0xaaaa"),
            fixed("inj1samesame", "0xbbbb"),
        ]);
        let store = WalletStore::with_generator(
            MemoryBackend::new(),
            KeyCipher::new("store-test-secret"),
            generator,
        );

        store.create_wallet("u1", "main").await.unwrap();
        let err = store.create_wallet("u2", "main").await.unwrap_err();
        assert!(matches!(err, WalletError::DuplicateAddress(_)));

        // The loser must not have left a document behind.
        assert!(!store.user_exists("u2").await.unwrap());
    }

    #[tokio::test]
    async fn test_decrypted_key_strips_prefix() {
        let key_hex = "d25f04fc0b4165a4e5be566c9689076bc8a3d6a934a7ba5548cbe14c98819e83";
        let generator =
            ScriptedGenerator::new(vec![fixed("inj1decrypt", &format!("0x{key_hex}"))]);
        let store = WalletStore::with_generator(
            MemoryBackend::new(),
            KeyCipher::new("store-test-secret"),
            generator,
        );

        store.create_wallet("u1", "main").await.unwrap();
        assert_eq!(store.decrypted_key("u1").await.unwrap(), key_hex);
    }

    #[tokio::test]
    async fn test_decrypted_key_error_paths() {
        let store = store();
        let err = store.decrypted_key("ghost").await.unwrap_err();
        assert!(matches!(err, WalletError::UserNotFound(_)));

        store.create_wallet("u1", "main").await.unwrap();

        // Corrupt the active address to an item that does not exist.
        let backend = Arc::clone(&store.backend);
        let mut doc = backend.load("u1").await.unwrap().unwrap();
        doc.current_address = Some("inj1unknown".into());
        backend.save(&doc).await.unwrap();
        let err = store.decrypted_key("u1").await.unwrap_err();
        assert!(matches!(err, WalletError::WalletItemNotFound(_)));

        doc.current_address = None;
        backend.save(&doc).await.unwrap();
        let err = store.decrypted_key("u1").await.unwrap_err();
        assert!(matches!(err, WalletError::NoActiveAddress(_)));
    }

    #[tokio::test]
    async fn test_details_lookup_is_idempotent() {
        let store = store();
        store.create_wallet("u1", "main").await.unwrap();
        store.add_wallet("u1", "second").await.unwrap();

        let first = store.get_user_details("u1").await.unwrap();
        let second = store.get_user_details("u1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_same_name_has_one_winner() {
        let store = Arc::new(store());
        store.create_wallet("u1", "main").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.add_wallet("u1", "contested").await
            }));
        }

        let mut wins = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(_) => wins += 1,
                Err(WalletError::DuplicateWalletName(_)) => duplicates += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(store.get_user_details("u1").await.unwrap().wallets.len(), 2);
    }

    #[tokio::test]
    async fn test_set_current_address_and_rotation() {
        let store = store();
        store.create_wallet("u1", "main").await.unwrap();
        let added = store.add_wallet("u1", "second").await.unwrap();

        store
            .set_current_address("u1", &added.new_wallet.address)
            .await
            .unwrap();
        // The decrypted key now belongs to the second item; shape only,
        // the value itself is random.
        let key = store.decrypted_key("u1").await.unwrap();
        assert_eq!(key.len(), 64);

        let err = store
            .set_current_address("u1", "inj1notmine")
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::WalletItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_user_exists_and_delete() {
        let store = store();
        assert!(!store.user_exists("u1").await.unwrap());

        store.create_wallet("u1", "main").await.unwrap();
        assert!(store.user_exists("u1").await.unwrap());

        store.delete_user("u1").await.unwrap();
        assert!(!store.user_exists("u1").await.unwrap());
        // Deleting again is a no-op.
        store.delete_user("u1").await.unwrap();
    }

    #[test]
    fn test_error_response_shape() {
        let err = WalletError::UserNotFound("u9".into());
        let body = ErrorResponse::from(&err);
        assert!(!body.ok);
        assert_eq!(body.error, "user not found: u9");

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ok"], false);
    }
}
