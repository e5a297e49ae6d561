//! Backup Manager (component C): content-addressed snapshot store with optional
//! authenticated encryption. Guarantees recoverability from any failed run —
//! `create_backup` is called (lazily, once) before the first mutating write of a
//! session, and `restore` is the only path back.
//!
//! Encryption follows PBKDF2-HMAC-SHA512 key derivation (100,000 iterations, 32-byte
//! key, per-store salt) feeding AES-256-GCM. Each encrypted payload is laid out as
//! `[1-byte compression flag][16-byte IV][16-byte auth tag][ciphertext]`; plaintext
//! payloads are gzip only.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Error, Result};
use crate::types::{BackedUpFile, BackupEntry, CipherMeta, EncryptionKeyRecord, SecretString};

const PBKDF2_ITERATIONS: u32 = 100_000;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
const ROTATION_DUE_DAYS: i64 = 90;

/// Backup payload encryption mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Plain,
    Encrypted,
}

pub struct RestoreReport {
    pub restored: Vec<PathBuf>,
}

/// Owns one session's backup directory under `.neurolint/backups/<session_id>/`.
pub struct BackupManager {
    root: PathBuf,
    session_id: String,
}

impl BackupManager {
    pub fn new(neurolint_dir: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            root: neurolint_dir.into(),
            session_id: session_id.into(),
        }
    }

    fn session_dir(&self) -> PathBuf {
        self.root.join("backups").join(&self.session_id)
    }

    fn key_record_path(&self) -> PathBuf {
        self.root.join("encryption-key")
    }

    /// Atomically stores the current contents of `files` under a new backup id.
    pub fn create_backup(&self, files: &[(PathBuf, Vec<u8>)], mode: Mode, passphrase: Option<&str>) -> Result<String> {
        let backup_id = uuid::Uuid::new_v4().to_string();
        let backup_dir = self.session_dir().join(&backup_id);
        fs::create_dir_all(&backup_dir).map_err(|e| Error::io(&backup_dir, e))?;

        let key = match mode {
            Mode::Encrypted => Some(self.load_or_create_key(passphrase.unwrap_or(""))?),
            Mode::Plain => None,
        };

        let mut entries = Vec::with_capacity(files.len());
        for (idx, (path, bytes)) in files.iter().enumerate() {
            let sha256 = sha256_hex(bytes);
            let payload_path = backup_dir.join(format!("{idx}.blob"));
            let (payload, cipher_meta) = match &key {
                Some(key) => {
                    let (ciphertext, iv) = encrypt(bytes, key)?;
                    (
                        ciphertext,
                        Some(CipherMeta {
                            algorithm: "aes-256-gcm".to_string(),
                            iv: hex::encode(iv),
                        }),
                    )
                }
                None => (gzip(bytes)?, None),
            };
            write_atomic(&payload_path, &payload).map_err(|e| Error::io(&payload_path, e))?;
            entries.push(BackedUpFile {
                path: path.clone(),
                sha256,
                size: bytes.len() as u64,
                cipher_meta,
            });
        }

        let entry = BackupEntry {
            backup_id: backup_id.clone(),
            created_at: chrono::Utc::now(),
            files: entries,
            compression: "gzip".to_string(),
            algorithm: key.as_ref().map(|_| "aes-256-gcm".to_string()),
        };
        let manifest_path = backup_dir.join("manifest.json");
        let manifest_bytes = serde_json::to_vec_pretty(&entry)?;
        write_atomic(&manifest_path, &manifest_bytes).map_err(|e| Error::io(&manifest_path, e))?;

        Ok(backup_id)
    }

    /// Recreates every file captured by `backup_id` under `target_root`. Decryption
    /// failures (auth tag mismatch) abort before any file is written.
    pub fn restore(&self, backup_id: &str, target_root: &Path, passphrase: Option<&str>) -> Result<RestoreReport> {
        let backup_dir = self.session_dir().join(backup_id);
        let manifest_path = backup_dir.join("manifest.json");
        let manifest_bytes = fs::read(&manifest_path).map_err(|e| Error::io(&manifest_path, e))?;
        let entry: BackupEntry = serde_json::from_slice(&manifest_bytes)?;

        let key = if entry.algorithm.is_some() {
            Some(self.load_key(passphrase.unwrap_or(""))?)
        } else {
            None
        };

        let mut decoded = Vec::with_capacity(entry.files.len());
        for (idx, file) in entry.files.iter().enumerate() {
            let payload_path = backup_dir.join(format!("{idx}.blob"));
            let payload = fs::read(&payload_path).map_err(|e| Error::io(&payload_path, e))?;
            let plaintext = match (&file.cipher_meta, &key) {
                (Some(meta), Some(key)) => {
                    let iv = hex::decode(&meta.iv).map_err(|e| Error::integrity(e.to_string()))?;
                    decrypt(&payload, key, &iv)?
                }
                _ => gunzip(&payload)?,
            };
            if sha256_hex(&plaintext) != file.sha256 {
                return Err(Error::integrity(format!("checksum mismatch restoring '{}'", file.path.display())));
            }
            decoded.push((file.path.clone(), plaintext));
        }

        // Nothing is written until every file has decrypted and checksummed cleanly,
        // so a tampered payload aborts the whole restore with no partial writes.
        let mut restored = Vec::with_capacity(decoded.len());
        for (path, bytes) in decoded {
            let dest = target_root.join(&path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::write(&dest, &bytes).map_err(|e| Error::io(&dest, e))?;
            restored.push(dest);
        }

        Ok(RestoreReport { restored })
    }

    pub fn list(&self) -> Result<Vec<BackupEntry>> {
        let dir = self.session_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for child in fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))? {
            let child = child.map_err(|e| Error::io(&dir, e))?;
            let manifest_path = child.path().join("manifest.json");
            if manifest_path.exists() {
                let bytes = fs::read(&manifest_path).map_err(|e| Error::io(&manifest_path, e))?;
                entries.push(serde_json::from_slice(&bytes)?);
            }
        }
        entries.sort_by_key(|e: &BackupEntry| e.created_at);
        Ok(entries)
    }

    /// Deletes all but the `keep` most recent backups, oldest-first.
    pub fn delete_oldest(&self, keep: u32) -> Result<()> {
        let mut entries = self.list()?;
        entries.sort_by_key(|e| e.created_at);
        let to_delete = entries.len().saturating_sub(keep as usize);
        for entry in entries.into_iter().take(to_delete) {
            let dir = self.session_dir().join(&entry.backup_id);
            secure_delete_dir(&dir)?;
        }
        Ok(())
    }

    /// Writes a new key record with a new salt, preserving the prior record's
    /// creation time as `previous_rotation` for provenance.
    pub fn rotate_keys(&self, new_passphrase: &str) -> Result<()> {
        let previous = self.try_read_key_record()?;
        let mut salt = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut salt);
        let record = EncryptionKeyRecord {
            passphrase: SecretString::new(new_passphrase),
            salt,
            created_at: chrono::Utc::now(),
            algorithm: "pbkdf2-hmac-sha512".to_string(),
            version: previous.as_ref().map(|p| p.version + 1).unwrap_or(1),
            previous_rotation: previous.map(|p| p.created_at),
        };
        self.write_key_record(&record)
    }

    fn load_or_create_key(&self, passphrase: &str) -> Result<[u8; KEY_LEN]> {
        match self.try_read_key_record()? {
            Some(record) => Ok(derive_key(record.passphrase.expose(), &record.salt)),
            None => {
                let mut salt = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut salt);
                let record = EncryptionKeyRecord {
                    passphrase: SecretString::new(passphrase),
                    salt,
                    created_at: chrono::Utc::now(),
                    algorithm: "pbkdf2-hmac-sha512".to_string(),
                    version: 1,
                    previous_rotation: None,
                };
                self.write_key_record(&record)?;
                Ok(derive_key(passphrase, &salt))
            }
        }
    }

    fn load_key(&self, passphrase: &str) -> Result<[u8; KEY_LEN]> {
        let record = self
            .try_read_key_record()?
            .ok_or_else(|| Error::encryption("no encryption key record found for this store"))?;
        Ok(derive_key(passphrase, &record.salt))
    }

    fn try_read_key_record(&self) -> Result<Option<EncryptionKeyRecord>> {
        let path = self.key_record_path();
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| Error::io(&path, e))?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn write_key_record(&self, record: &EncryptionKeyRecord) -> Result<()> {
        let path = self.key_record_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&path, &bytes).map_err(|e| Error::io(&path, e))?;
        set_owner_only_permissions(&path)?;
        Ok(())
    }

    /// Whether the currently stored key is due for rotation (age >= 90 days).
    pub fn key_rotation_due(&self) -> Result<bool> {
        Ok(match self.try_read_key_record()? {
            Some(record) => chrono::Utc::now().signed_duration_since(record.created_at).num_days() >= ROTATION_DUE_DAYS,
            None => false,
        })
    }
}

fn derive_key(passphrase: &str, salt: &[u8; 32]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha512>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Result<(Vec<u8>, [u8; IV_LEN])> {
    let compressed = gzip(plaintext)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv[..12]);
    let ciphertext = cipher
        .encrypt(nonce, compressed.as_ref())
        .map_err(|e| Error::encryption(format!("AES-GCM encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(1 + IV_LEN + ciphertext.len());
    out.push(1u8); // compression flag: 1 = gzip
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok((out, iv))
}

fn decrypt(payload: &[u8], key: &[u8; KEY_LEN], iv: &[u8]) -> Result<Vec<u8>> {
    if payload.len() < 1 + IV_LEN + TAG_LEN {
        return Err(Error::integrity("ciphertext shorter than header + auth tag"));
    }
    let ciphertext = &payload[1 + IV_LEN..];
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(&iv[..12]);
    let compressed = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| Error::integrity("authentication tag mismatch"))?;
    gunzip(&compressed)
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(Error::from)?;
    encoder.finish().map_err(Error::from)
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(Error::from)?;
    Ok(out)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(0o600);
    fs::set_permissions(path, perms).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Overwrites `path` with random bytes, then zeros, then unlinks it.
pub fn secure_delete(path: &Path) -> Result<()> {
    if let Ok(metadata) = fs::metadata(path) {
        let len = metadata.len() as usize;
        let mut rng = rand::thread_rng();
        let mut random_buf = vec![0u8; len];
        rng.fill_bytes(&mut random_buf);
        fs::write(path, &random_buf).map_err(|e| Error::io(path, e))?;
        fs::write(path, vec![0u8; len]).map_err(|e| Error::io(path, e))?;
    }
    fs::remove_file(path).or_else(|e| if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }).map_err(|e| Error::io(path, e))
}

fn secure_delete_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            secure_delete_dir(&path)?;
        } else {
            secure_delete(&path)?;
        }
    }
    fs::remove_dir(dir).map_err(|e| Error::io(dir, e))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn plain_backup_round_trips() {
        let dir = tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), "session-1");
        let files = vec![(PathBuf::from("src/a.ts"), b"const a = 1;\n".to_vec())];
        let backup_id = manager.create_backup(&files, Mode::Plain, None).unwrap();

        let restore_dir = tempdir().unwrap();
        let report = manager.restore(&backup_id, restore_dir.path(), None).unwrap();
        assert_eq!(report.restored.len(), 1);
        let restored = fs::read(restore_dir.path().join("src/a.ts")).unwrap();
        assert_eq!(restored, files[0].1);
    }

    #[test]
    fn encrypted_backup_round_trips() {
        let dir = tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), "session-2");
        let files = vec![(PathBuf::from("src/b.ts"), b"export const b = 2;\n".to_vec())];
        let backup_id = manager.create_backup(&files, Mode::Encrypted, Some("correct horse battery staple")).unwrap();

        let restore_dir = tempdir().unwrap();
        let report = manager
            .restore(&backup_id, restore_dir.path(), Some("correct horse battery staple"))
            .unwrap();
        assert_eq!(report.restored.len(), 1);
        let restored = fs::read(restore_dir.path().join("src/b.ts")).unwrap();
        assert_eq!(restored, files[0].1);
    }

    #[test]
    fn tampered_ciphertext_fails_integrity_check() {
        let dir = tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), "session-3");
        let files = vec![(PathBuf::from("src/c.ts"), b"const c = 3;\n".to_vec())];
        let backup_id = manager.create_backup(&files, Mode::Encrypted, Some("pw")).unwrap();

        let blob_path = manager.session_dir().join(&backup_id).join("0.blob");
        let mut bytes = fs::read(&blob_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&blob_path, bytes).unwrap();

        let restore_dir = tempdir().unwrap();
        let result = manager.restore(&backup_id, restore_dir.path(), Some("pw"));
        assert!(matches!(result, Err(Error::Integrity { .. })));
        assert!(!restore_dir.path().join("src/c.ts").exists());
    }

    #[test]
    fn delete_oldest_keeps_most_recent() {
        let dir = tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), "session-4");
        for i in 0..3 {
            let files = vec![(PathBuf::from(format!("f{i}.ts")), vec![i as u8])];
            manager.create_backup(&files, Mode::Plain, None).unwrap();
        }
        manager.delete_oldest(1).unwrap();
        assert_eq!(manager.list().unwrap().len(), 1);
    }
}
