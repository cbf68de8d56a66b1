#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use trustgate_contracts::secrets::SecretId;

const VAULT_SCHEMA_VERSION: u8 = 1;
const MASTER_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug)]
pub enum VaultError {
    InvalidSecretValue,
    Io(std::io::Error),
    Json(serde_json::Error),
    Decode(base64::DecodeError),
    Crypto,
}

impl std::fmt::Display for VaultError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSecretValue => write!(f, "invalid secret value"),
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Decode(err) => write!(f, "decode error: {err}"),
            Self::Crypto => write!(f, "vault cryptographic operation failed"),
        }
    }
}

impl std::error::Error for VaultError {}

impl From<std::io::Error> for VaultError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<base64::DecodeError> for VaultError {
    fn from(value: base64::DecodeError) -> Self {
        Self::Decode(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct VaultDocument {
    schema_version: u8,
    secrets: BTreeMap<String, SealedSecret>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedSecret {
    nonce_b64: String,
    ciphertext_b64: String,
    updated_at_unix_ms: u64,
}

/// Local encrypted store for the server-API secrets the decision flows need
/// at runtime. Values are sealed with AES-256-GCM under a per-host master
/// key; key ids are restricted to the `SecretId` registry so nothing else
/// can end up in the document.
#[derive(Debug, Clone)]
pub struct SecretVault {
    vault_path: PathBuf,
    key_path: PathBuf,
}

impl SecretVault {
    pub fn default_local() -> Self {
        let vault_path = env::var("TRUSTGATE_SECRET_VAULT_PATH")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(default_vault_path);
        let mut key_path = vault_path.clone();
        key_path.set_extension("master.key");
        Self::for_paths(vault_path, key_path)
    }

    pub fn for_paths(vault_path: PathBuf, key_path: PathBuf) -> Self {
        Self {
            vault_path,
            key_path,
        }
    }

    pub fn set_secret(&self, id: SecretId, value: &str) -> Result<(), VaultError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(VaultError::InvalidSecretValue);
        }

        let key = self.load_or_create_master_key()?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| VaultError::Crypto)?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), trimmed.as_bytes())
            .map_err(|_| VaultError::Crypto)?;

        let mut doc = self.load_document()?.unwrap_or_default();
        doc.schema_version = VAULT_SCHEMA_VERSION;
        doc.secrets.insert(
            id.as_str().to_string(),
            SealedSecret {
                nonce_b64: BASE64.encode(nonce_bytes),
                ciphertext_b64: BASE64.encode(ciphertext),
                updated_at_unix_ms: now_unix_ms(),
            },
        );
        self.store_document(&doc)
    }

    pub fn resolve_secret(&self, id: SecretId) -> Result<Option<String>, VaultError> {
        let Some(doc) = self.load_document()? else {
            return Ok(None);
        };
        let Some(sealed) = doc.secrets.get(id.as_str()) else {
            return Ok(None);
        };

        let key = self.load_or_create_master_key()?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| VaultError::Crypto)?;
        let nonce_raw = BASE64.decode(sealed.nonce_b64.as_bytes())?;
        if nonce_raw.len() != NONCE_LEN {
            return Err(VaultError::Crypto);
        }
        let ciphertext = BASE64.decode(sealed.ciphertext_b64.as_bytes())?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_raw), ciphertext.as_ref())
            .map_err(|_| VaultError::Crypto)?;
        let secret = String::from_utf8(plaintext).map_err(|_| VaultError::Crypto)?;
        if secret.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(secret))
    }

    pub fn has_secret(&self, id: SecretId) -> Result<bool, VaultError> {
        Ok(self.resolve_secret(id)?.is_some())
    }

    pub fn delete_secret(&self, id: SecretId) -> Result<bool, VaultError> {
        let Some(mut doc) = self.load_document()? else {
            return Ok(false);
        };
        let removed = doc.secrets.remove(id.as_str()).is_some();
        if removed {
            self.store_document(&doc)?;
        }
        Ok(removed)
    }

    /// Secret ids currently present in the document, registry order.
    pub fn list_secret_ids(&self) -> Result<Vec<SecretId>, VaultError> {
        let Some(doc) = self.load_document()? else {
            return Ok(Vec::new());
        };
        Ok(SecretId::all()
            .iter()
            .copied()
            .filter(|id| doc.secrets.contains_key(id.as_str()))
            .collect())
    }

    fn load_document(&self) -> Result<Option<VaultDocument>, VaultError> {
        if !self.vault_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.vault_path)?;
        if raw.trim().is_empty() {
            return Ok(Some(VaultDocument::default()));
        }
        let doc = serde_json::from_str::<VaultDocument>(&raw)?;
        if doc.schema_version != VAULT_SCHEMA_VERSION {
            return Err(VaultError::Crypto);
        }
        Ok(Some(doc))
    }

    fn store_document(&self, doc: &VaultDocument) -> Result<(), VaultError> {
        self.ensure_parent_dirs()?;
        let serialized = serde_json::to_vec_pretty(doc)?;
        // Write-then-rename so a crash never leaves a torn document.
        let mut tmp = self.vault_path.clone();
        tmp.set_extension("tmp");
        fs::write(&tmp, serialized)?;
        fs::rename(tmp, &self.vault_path)?;
        Ok(())
    }

    fn ensure_parent_dirs(&self) -> Result<(), VaultError> {
        if let Some(parent) = self.vault_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Some(parent) = self.key_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn load_or_create_master_key(&self) -> Result<[u8; MASTER_KEY_LEN], VaultError> {
        if self.key_path.exists() {
            let encoded = fs::read_to_string(&self.key_path)?;
            let decoded = BASE64.decode(encoded.trim().as_bytes())?;
            if decoded.len() != MASTER_KEY_LEN {
                return Err(VaultError::Crypto);
            }
            let mut key = [0u8; MASTER_KEY_LEN];
            key.copy_from_slice(&decoded);
            return Ok(key);
        }

        self.ensure_parent_dirs()?;
        let mut key = [0u8; MASTER_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        write_new_file_restricted(&self.key_path, BASE64.encode(key).as_bytes())?;
        Ok(key)
    }
}

fn default_vault_path() -> PathBuf {
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg_config_home)
            .join("trustgate")
            .join("secret_vault.json");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("trustgate")
            .join("secret_vault.json");
    }
    PathBuf::from(".trustgate").join("secret_vault.json")
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(1)
        .max(1)
}

fn write_new_file_restricted(path: &Path, data: &[u8]) -> Result<(), VaultError> {
    let mut file = OpenOptions::new().create_new(true).write(true).open(path)?;
    file.write_all(data)?;
    file.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
