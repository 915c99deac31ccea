//! Machine-derived encryption-at-rest for the storage file.
//!
//! Each file carries a random data key (DEK) wrapped by a key-encryption key
//! (KEK) derived with scrypt from machine identity material plus a per-file
//! salt. Every stored value is sealed separately under the DEK.

use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use scrypt::{scrypt, Params as ScryptParams};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::StorageError;

pub(super) const STORE_FILE_VERSION: u32 = 1;
/// Production scrypt cost (`2^17` iterations, r=8, p=1).
pub(super) const DEFAULT_KDF_LOG_N: u8 = 17;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const MACHINE_KEY_CONTEXT: &str = "fedsign-storage-machine-kek-v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct EncryptedStoreFile {
    #[serde(default)]
    pub(super) version: u32,
    #[serde(default)]
    pub(super) encryption: EncryptionEnvelope,
    #[serde(default)]
    pub(super) entries: BTreeMap<String, SealedValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct EncryptionEnvelope {
    #[serde(default)]
    pub(super) kdf_log_n: u8,
    #[serde(default)]
    pub(super) salt: String,
    #[serde(default)]
    pub(super) wrapped_dek_nonce: String,
    #[serde(default)]
    pub(super) wrapped_dek_ciphertext: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SealedValue {
    #[serde(default)]
    pub(super) nonce: String,
    #[serde(default)]
    pub(super) ciphertext: String,
}

/// Unwrapped data key together with the envelope that wraps it on disk.
///
/// Holding one lets a store rewrite or reread its file without another
/// scrypt derivation.
#[derive(Clone)]
pub(super) struct DataKey {
    dek: [u8; KEY_LEN],
    envelope: EncryptionEnvelope,
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataKey")
            .field("kdf_log_n", &self.envelope.kdf_log_n)
            .finish_non_exhaustive()
    }
}

impl DataKey {
    /// Fresh random DEK wrapped under a newly salted machine KEK.
    pub(super) fn generate(kdf_log_n: u8) -> Result<Self, StorageError> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let kek = derive_machine_kek(&salt, kdf_log_n)?;

        let mut dek = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut dek);
        let (wrapped_nonce, wrapped_dek) = encrypt_blob(&kek, &dek)?;
        Ok(Self {
            dek,
            envelope: EncryptionEnvelope {
                kdf_log_n,
                salt: B64.encode(salt),
                wrapped_dek_nonce: B64.encode(wrapped_nonce),
                wrapped_dek_ciphertext: B64.encode(wrapped_dek),
            },
        })
    }

    /// Derive the machine KEK for `envelope` and unwrap its DEK.
    pub(super) fn unwrap(envelope: &EncryptionEnvelope) -> Result<Self, StorageError> {
        let salt = decode_fixed::<SALT_LEN>(&envelope.salt, "salt")?;
        let kdf_log_n = if envelope.kdf_log_n == 0 {
            DEFAULT_KDF_LOG_N
        } else {
            envelope.kdf_log_n
        };
        let kek = derive_machine_kek(&salt, kdf_log_n)?;
        let wrapped_nonce =
            decode_fixed::<NONCE_LEN>(&envelope.wrapped_dek_nonce, "wrapped_dek_nonce")?;
        let wrapped_dek =
            decode_bytes(&envelope.wrapped_dek_ciphertext, "wrapped_dek_ciphertext")?;
        let dek_raw = decrypt_blob(&kek, &wrapped_nonce, &wrapped_dek).map_err(|_| {
            StorageError::Invalid(
                "failed to decrypt stored session (machine identity may have changed). Run `fedsign logout` and sign in again."
                    .to_string(),
            )
        })?;
        let dek: [u8; KEY_LEN] = dek_raw.as_slice().try_into().map_err(|_| {
            StorageError::Invalid("invalid encrypted key material in storage file".to_string())
        })?;
        Ok(Self {
            dek,
            envelope: envelope.clone(),
        })
    }

    /// True when `envelope` is the one this key was unwrapped from.
    fn wraps(&self, envelope: &EncryptionEnvelope) -> bool {
        self.envelope.salt == envelope.salt
            && self.envelope.wrapped_dek_nonce == envelope.wrapped_dek_nonce
            && self.envelope.wrapped_dek_ciphertext == envelope.wrapped_dek_ciphertext
    }
}

/// Seal every entry under `key`'s DEK.
pub(super) fn seal_entries(
    entries: &BTreeMap<String, String>,
    key: &DataKey,
) -> Result<EncryptedStoreFile, StorageError> {
    let mut sealed = BTreeMap::new();
    for (name, value) in entries {
        let (nonce, ciphertext) = encrypt_blob(&key.dek, value.as_bytes())?;
        sealed.insert(
            name.clone(),
            SealedValue {
                nonce: B64.encode(nonce),
                ciphertext: B64.encode(ciphertext),
            },
        );
    }

    Ok(EncryptedStoreFile {
        version: STORE_FILE_VERSION,
        encryption: key.envelope.clone(),
        entries: sealed,
    })
}

/// Open every sealed entry, reusing `cached` when it matches the file's
/// envelope. Returns the key that opened the file.
pub(super) fn open_entries(
    file: &EncryptedStoreFile,
    cached: Option<&DataKey>,
) -> Result<(BTreeMap<String, String>, DataKey), StorageError> {
    let key = match cached {
        Some(key) if key.wraps(&file.encryption) => key.clone(),
        _ => DataKey::unwrap(&file.encryption)?,
    };

    let mut entries = BTreeMap::new();
    for (name, sealed) in &file.entries {
        let nonce = decode_fixed::<NONCE_LEN>(&sealed.nonce, "nonce")?;
        let ciphertext = decode_bytes(&sealed.ciphertext, "ciphertext")?;
        let plaintext = decrypt_blob(&key.dek, &nonce, &ciphertext).map_err(|_| {
            StorageError::Invalid(format!("failed to decrypt stored value `{name}`"))
        })?;
        let value = String::from_utf8(plaintext).map_err(|_| {
            StorageError::Invalid(format!("stored value `{name}` is not valid UTF-8"))
        })?;
        entries.insert(name.clone(), value);
    }
    Ok((entries, key))
}

fn derive_machine_kek(salt: &[u8; SALT_LEN], log_n: u8) -> Result<[u8; KEY_LEN], StorageError> {
    let mut hashed = Sha256::new();
    hashed.update(MACHINE_KEY_CONTEXT.as_bytes());
    hashed.update(machine_secret_material());
    hashed.update(salt);
    let seed = hashed.finalize();

    let params = ScryptParams::new(log_n, 8, 1, KEY_LEN)
        .map_err(|err| StorageError::Invalid(format!("invalid scrypt parameters: {err}")))?;
    let mut key = [0u8; KEY_LEN];
    scrypt(&seed, salt, &params, &mut key)
        .map_err(|err| StorageError::Invalid(format!("failed to derive storage key: {err}")))?;
    Ok(key)
}

fn machine_secret_material() -> Vec<u8> {
    let hostname = hostname::get()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());
    let home = dirs::home_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    let machine_id = ["/etc/machine-id", "/var/lib/dbus/machine-id", "/etc/hostid"]
        .iter()
        .find_map(|path| {
            let value = std::fs::read_to_string(path).ok()?;
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_default();
    format!(
        "os={}|host={hostname}|user={username}|home={home}|machine_id={machine_id}",
        std::env::consts::OS
    )
    .into_bytes()
}

fn encrypt_blob(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), StorageError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| StorageError::Invalid("invalid encryption key length".to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| StorageError::Invalid("failed to encrypt stored value".to_string()))?;
    Ok((nonce.to_vec(), ciphertext))
}

fn decrypt_blob(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, StorageError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| StorageError::Invalid("invalid encryption key length".to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| StorageError::Invalid("failed to decrypt stored value".to_string()))
}

fn decode_bytes(value: &str, field: &str) -> Result<Vec<u8>, StorageError> {
    B64.decode(value).map_err(|err| {
        StorageError::Invalid(format!("failed to decode storage field `{field}`: {err}"))
    })
}

fn decode_fixed<const N: usize>(value: &str, field: &str) -> Result<[u8; N], StorageError> {
    let bytes = decode_bytes(value, field)?;
    if bytes.len() != N {
        return Err(StorageError::Invalid(format!(
            "invalid storage field `{field}` length: expected {N}, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
