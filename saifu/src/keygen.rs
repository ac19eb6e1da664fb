//! Keypair generation and chain-native address derivation.
//!
//! A wallet is born as 32 bytes of OS entropy. The secp256k1 keypair gives
//! the EVM-format address; the chain-native address is re-derived *from*
//! that address: strip the `0x`, treat the remaining hex as raw bytes,
//! and bech32-encode them under the chain's human-readable prefix. Both
//! addresses therefore always refer to the same key.
//!
//! Generation is behind the [`WalletGenerator`] trait so the store can be
//! exercised with deterministic generators in tests.

use alloy::signers::local::PrivateKeySigner;
use bech32::{Bech32, Hrp};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{WalletError, WalletResult};

/// Human-readable prefix of the chain-native address format.
const ADDRESS_HRP: &str = "inj";

/// A freshly generated keypair and its two address encodings.
///
/// `private_key` is the only secret field; the whole struct is zeroized on
/// drop and its `Debug` impl omits the key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct GeneratedWallet {
    /// Chain-native (bech32) address, e.g. `inj1…`.
    pub address: String,
    /// Companion EVM-format address, EIP-55 checksummed, `0x`-prefixed.
    pub secondary_address: String,
    /// Private key as `0x` + 64 lowercase hex chars.
    pub private_key: String,
}

impl std::fmt::Debug for GeneratedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedWallet")
            .field("address", &self.address)
            .field("secondary_address", &self.secondary_address)
            .finish_non_exhaustive()
    }
}

/// Source of new wallets.
pub trait WalletGenerator: Send + Sync {
    /// Generate a fresh keypair and derive both address encodings.
    ///
    /// # Errors
    ///
    /// [`WalletError::Creation`] if key parsing or address derivation
    /// fails, or any derived field comes out empty. Entropy failure is not
    /// expected to be transient, so callers treat this as fatal for the
    /// request rather than retrying.
    fn generate(&self) -> WalletResult<GeneratedWallet>;
}

/// Default generator: OS entropy + secp256k1 via the local signer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Generator;

impl Secp256k1Generator {
    /// Create a new generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl WalletGenerator for Secp256k1Generator {
    fn generate(&self) -> WalletResult<GeneratedWallet> {
        let mut key_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut key_bytes);
        let key_hex = hex::encode(key_bytes);
        key_bytes.zeroize();

        let signer = key_hex
            .parse::<PrivateKeySigner>()
            .map_err(|e| WalletError::creation(format!("key rejected by signer: {e}")))?;

        let secondary_address = signer.address().to_checksum(None);
        let address = chain_address_from_evm(&secondary_address)?;
        let private_key = format!("0x{key_hex}");

        if address.is_empty() || secondary_address.is_empty() || private_key.len() != 66 {
            return Err(WalletError::creation("derived wallet fields are incomplete"));
        }

        Ok(GeneratedWallet {
            address,
            secondary_address,
            private_key,
        })
    }
}

/// Re-encode an EVM-format address as the chain-native bech32 address.
///
/// # Errors
///
/// [`WalletError::Creation`] if the input is not hex after an optional
/// `0x` prefix, or bech32 encoding fails.
pub fn chain_address_from_evm(evm_address: &str) -> WalletResult<String> {
    let raw = evm_address.strip_prefix("0x").unwrap_or(evm_address);
    let bytes =
        hex::decode(raw).map_err(|e| WalletError::creation(format!("address is not hex: {e}")))?;

    let hrp = Hrp::parse(ADDRESS_HRP)
        .map_err(|e| WalletError::creation(format!("bad address prefix: {e}")))?;
    bech32::encode::<Bech32>(hrp, &bytes)
        .map_err(|e| WalletError::creation(format!("bech32 encoding failed: {e}")))
}
