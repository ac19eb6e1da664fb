//! Symmetric encryption of private keys at rest.
//!
//! Keys are stored as `"ivHex:cipherHex"`: a fresh random 16-byte IV and
//! the AES-256-CBC ciphertext of the PKCS#7-padded plaintext, both
//! lowercase hex, joined by a single `:`. This exact textual format is the
//! persisted contract; round-tripping must reproduce the plaintext
//! byte-for-byte, including ciphertexts written by earlier deployments.
//!
//! The 32-byte AES key is produced from a configured passphrase by padding
//! on the right with ASCII `'0'` (or truncating). That is a fixed,
//! reproducible contract inherited from the stored-ciphertext format, not a
//! KDF; changing it would orphan every encrypted key in the store.
//!
//! The scheme carries no integrity tag. Decrypt performs a padding sanity
//! check only; tampering is partially detected at best.

use aes::Aes256;
use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{CipherError, CipherResult};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes; also the IV length.
const BLOCK_SIZE: usize = 16;

/// Length of the configured key material.
const KEY_SIZE: usize = 32;

/// Encrypts and decrypts private keys with a process-wide secret.
///
/// The key is read-only after construction, so a single `KeyCipher` can be
/// shared freely across tasks.
#[derive(Clone)]
pub struct KeyCipher {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for KeyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCipher").finish_non_exhaustive()
    }
}

impl KeyCipher {
    /// Build a cipher from the configured passphrase.
    ///
    /// The passphrase is right-padded with `'0'` to 32 bytes, or truncated
    /// to 32 bytes if longer.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut key = [b'0'; KEY_SIZE];
        let bytes = secret.as_bytes();
        let len = bytes.len().min(KEY_SIZE);
        key[..len].copy_from_slice(&bytes[..len]);
        Self { key }
    }

    /// Encrypt a plaintext into the `ivHex:cipherHex` storage format.
    ///
    /// A fresh IV is drawn from the OS CSPRNG on every call, so encrypting
    /// the same plaintext twice yields different ciphertexts.
    #[must_use]
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
    }

    /// Decrypt an `ivHex:cipherHex` string back to the plaintext.
    ///
    /// # Errors
    ///
    /// - [`CipherError::MalformedCiphertext`] if the input does not contain
    ///   exactly one `:`, either half is not valid hex, the IV is not 16
    ///   bytes, or the ciphertext is empty or not block-aligned.
    /// - [`CipherError::InvalidPadding`] if the final plaintext byte is 0
    ///   or exceeds the block size. Padding bytes are deliberately not
    ///   verified beyond this; the stored format predates any stricter
    ///   check.
    /// - [`CipherError::Utf8`] if the unpadded bytes are not valid UTF-8
    ///   (only reachable on corrupted ciphertext).
    pub fn decrypt(&self, encrypted: &str) -> CipherResult<String> {
        let mut parts = encrypted.splitn(3, ':');
        let (iv_hex, ct_hex) = match (parts.next(), parts.next(), parts.next()) {
            (Some(iv), Some(ct), None) => (iv, ct),
            _ => {
                return Err(CipherError::malformed(
                    "expected exactly one ':' separator",
                ));
            }
        };

        let iv = hex::decode(iv_hex).map_err(|e| CipherError::malformed(format!("iv: {e}")))?;
        let iv: [u8; BLOCK_SIZE] = iv
            .try_into()
            .map_err(|_| CipherError::malformed("iv must be 16 bytes"))?;

        let ciphertext =
            hex::decode(ct_hex).map_err(|e| CipherError::malformed(format!("ciphertext: {e}")))?;
        if ciphertext.is_empty() {
            return Err(CipherError::malformed("empty ciphertext"));
        }

        // NoPadding: unpadding is done by hand below to match the stored
        // format's sanity-check-only contract.
        let padded = Zeroizing::new(
            Aes256CbcDec::new(&self.key.into(), &iv.into())
                .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
                .map_err(|_| CipherError::malformed("ciphertext is not block-aligned"))?,
        );

        let pad = usize::from(*padded.last().ok_or(CipherError::InvalidPadding)?);
        if pad == 0 || pad > BLOCK_SIZE {
            return Err(CipherError::InvalidPadding);
        }

        let plaintext = &padded[..padded.len() - pad];
        Ok(std::str::from_utf8(plaintext)?.to_owned())
    }
}
