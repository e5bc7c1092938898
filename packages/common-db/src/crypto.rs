//! Módulo de criptografia para dados sensíveis
//!
//! Os dados identificáveis do paciente (demografia, contato, convênio e
//! histórico médico) são gravados como um único blob AES-256-GCM.
//! A chave de dados é aleatória e fica guardada na tabela `master_keys`,
//! embrulhada com ChaCha20-Poly1305 sob uma chave derivada da senha
//! configurada via Argon2id.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::Argon2;
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaChaKey, Nonce as ChaChaNonce};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{DbError, DbResult};

/// Erros específicos para operações de criptografia
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Falha na criptografia: {0}")]
    EncryptionFailed(String),

    #[error("Falha na descriptografia: {0}")]
    DecryptionFailed(String),

    #[error("Dados inválidos: {0}")]
    InvalidData(String),

    #[error("Falha na derivação de chave: {0}")]
    KeyDerivation(String),

    #[error("Senha do banco de dados não configurada")]
    MissingPassphrase,
}

/// Tamanho do nonce em bytes (AES-GCM e ChaCha20-Poly1305)
const NONCE_SIZE: usize = 12;

/// Tamanho do salt usado pelo Argon2id
pub const KDF_SALT_SIZE: usize = 16;

/// Versão atual do formato da chave embrulhada
pub const KEY_VERSION: i64 = 1;

/// Chave AES-256 (zerada automaticamente ao sair de escopo)
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Cria uma nova chave aleatória
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Cria uma chave a partir de bytes existentes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidData(format!(
                "A chave deve ter 32 bytes, recebeu {}",
                bytes.len()
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Deriva uma chave de embrulho a partir da senha (Argon2id)
    pub fn derive(passphrase: &str, salt: &[u8]) -> Result<Self, CryptoError> {
        if passphrase.is_empty() {
            return Err(CryptoError::MissingPassphrase);
        }

        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// Dados criptografados e seu nonce
#[derive(Debug, Clone)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Cifra de campos sensíveis baseada em AES-256-GCM
#[derive(Clone)]
pub struct FieldCipher {
    key: EncryptionKey,
}

impl FieldCipher {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Criptografa bytes arbitrários com um nonce aleatório
    pub fn encrypt(&self, data: &[u8]) -> Result<EncryptedData, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_bytes()));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, data)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(EncryptedData {
            ciphertext,
            nonce: nonce.to_vec(),
        })
    }

    pub fn decrypt(&self, encrypted: &EncryptedData) -> Result<Vec<u8>, CryptoError> {
        if encrypted.nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidData(format!(
                "Nonce inválido: esperado {} bytes, recebido {}",
                NONCE_SIZE,
                encrypted.nonce.len()
            )));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_bytes()));
        cipher
            .decrypt(Nonce::from_slice(&encrypted.nonce), encrypted.ciphertext.as_ref())
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }

    /// Serializa em JSON e criptografa
    pub fn seal<T: Serialize>(&self, value: &T) -> Result<EncryptedData, CryptoError> {
        let mut plaintext =
            serde_json::to_vec(value).map_err(|e| CryptoError::InvalidData(e.to_string()))?;
        let sealed = self.encrypt(&plaintext);
        plaintext.zeroize();
        sealed
    }

    /// Descriptografa e desserializa
    pub fn open<T: DeserializeOwned>(&self, encrypted: &EncryptedData) -> Result<T, CryptoError> {
        let mut plaintext = self.decrypt(encrypted)?;
        let value =
            serde_json::from_slice(&plaintext).map_err(|e| CryptoError::InvalidData(e.to_string()));
        plaintext.zeroize();
        value
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}

/// Chave de dados embrulhada com a senha do administrador
#[derive(Debug, Clone)]
pub struct WrappedKey {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub salt: Vec<u8>,
}

/// Embrulha uma chave com ChaCha20-Poly1305 sob chave derivada da senha
pub fn wrap_key(key: &EncryptionKey, passphrase: &str) -> Result<WrappedKey, CryptoError> {
    let mut salt = vec![0u8; KDF_SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let wrapping_key = EncryptionKey::derive(passphrase, &salt)?;

    let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(wrapping_key.as_bytes()));
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(ChaChaNonce::from_slice(&nonce), key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(WrappedKey {
        ciphertext,
        nonce: nonce.to_vec(),
        salt,
    })
}

/// Desembrulha a chave de dados; senha errada resulta em `DecryptionFailed`
pub fn unwrap_key(wrapped: &WrappedKey, passphrase: &str) -> Result<EncryptionKey, CryptoError> {
    if wrapped.nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidData(format!(
            "Nonce inválido: esperado {} bytes, recebido {}",
            NONCE_SIZE,
            wrapped.nonce.len()
        )));
    }

    let wrapping_key = EncryptionKey::derive(passphrase, &wrapped.salt)?;
    let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(wrapping_key.as_bytes()));

    let mut plaintext = cipher
        .decrypt(ChaChaNonce::from_slice(&wrapped.nonce), wrapped.ciphertext.as_ref())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    let key = EncryptionKey::from_bytes(&plaintext);
    plaintext.zeroize();
    key
}

/// Carrega a chave mestra ativa ou cria uma nova no primeiro uso
pub async fn load_or_create_master_key(
    pool: &SqlitePool,
    passphrase: &str,
) -> DbResult<EncryptionKey> {
    if passphrase.is_empty() {
        return Err(CryptoError::MissingPassphrase.into());
    }

    let existing: Option<(Vec<u8>, Vec<u8>, Vec<u8>)> = sqlx::query_as(
        "SELECT wrapped_key_ciphertext, wrapped_key_nonce, kdf_salt
         FROM master_keys WHERE active = 1 ORDER BY key_version DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    if let Some((ciphertext, nonce, salt)) = existing {
        let wrapped = WrappedKey {
            ciphertext,
            nonce,
            salt,
        };
        return Ok(unwrap_key(&wrapped, passphrase)?);
    }

    let key = EncryptionKey::generate();
    let wrapped = wrap_key(&key, passphrase)?;

    sqlx::query(
        "INSERT INTO master_keys (active, wrapped_key_ciphertext, wrapped_key_nonce, kdf_salt, key_version)
         VALUES (1, ?, ?, ?, ?)",
    )
    .bind(&wrapped.ciphertext)
    .bind(&wrapped.nonce)
    .bind(&wrapped.salt)
    .bind(KEY_VERSION)
    .execute(pool)
    .await
    .map_err(DbError::from)?;

    info!("Nova chave mestra gerada (versão {})", KEY_VERSION);
    Ok(key)
}
