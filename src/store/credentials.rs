use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

const CREDS_FILE: &str = "creds.json";

/// Device credentials that let a session resume without pairing again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// JID associated with the paired account, if any.
    pub registered_jid: Option<String>,
    /// Human-readable device name shown in the linked devices list.
    pub device_name: String,
    pub noise_key: String,
    pub identity_key: String,
    pub adv_secret_key: String,
    pub created_at: DateTime<Utc>,
}

impl Credentials {
    /// Generate fresh, unpaired credentials.
    pub fn generate(device_name: impl Into<String>) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            registered_jid: None,
            device_name: device_name.into(),
            noise_key: STANDARD.encode(rng.gen::<[u8; 32]>()),
            identity_key: STANDARD.encode(rng.gen::<[u8; 32]>()),
            adv_secret_key: STANDARD.encode(rng.gen::<[u8; 32]>()),
            created_at: Utc::now(),
        }
    }

    /// Whether a device has been paired.
    pub fn is_registered(&self) -> bool {
        self.registered_jid.is_some()
    }

    pub fn register(&mut self, jid: impl Into<String>) {
        self.registered_jid = Some(jid.into());
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to serialize credentials: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// File-backed credential directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn creds_path(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }

    /// Read the stored credentials, creating the directory and a fresh
    /// unpaired identity on first use.
    pub async fn load_or_create(&self, device_name: &str) -> Result<Credentials, CredentialError> {
        fs::create_dir_all(&self.dir).await?;

        match fs::read_to_string(self.creds_path()).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No credentials in {}, generating", self.dir.display());
                let creds = Credentials::generate(device_name);
                self.save(&creds).await?;
                Ok(creds)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Persist session credentials in JSON format.
    pub async fn save(&self, creds: &Credentials) -> Result<(), CredentialError> {
        let serialized = serde_json::to_string_pretty(creds)?;
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.creds_path(), serialized).await?;
        Ok(())
    }

    /// Recursively delete the credential directory. An absent directory is
    /// not an error.
    pub async fn remove(&self) -> Result<(), CredentialError> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_or_create_generates_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(tmp.path().join("sessions"));

        let created = store.load_or_create("gateway").await.unwrap();
        assert!(!created.is_registered());
        assert_eq!(created.device_name, "gateway");
        assert!(store.dir().join(CREDS_FILE).exists());

        let loaded = store.load_or_create("ignored").await.unwrap();
        assert_eq!(loaded, created);
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_credentials() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(tmp.path());

        let mut creds = store.load_or_create("gateway").await.unwrap();
        creds.register("123@s.whatsapp.net");
        store.save(&creds).await.unwrap();

        let loaded = store.load_or_create("gateway").await.unwrap();
        assert_eq!(loaded.registered_jid.as_deref(), Some("123@s.whatsapp.net"));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(tmp.path().join("sessions"));
        store.load_or_create("gateway").await.unwrap();

        store.remove().await.unwrap();
        assert!(!store.dir().exists());
        store.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_credentials_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CREDS_FILE), "{not json").unwrap();

        let store = CredentialStore::new(tmp.path());
        let err = store.load_or_create("gateway").await.unwrap_err();
        assert!(matches!(err, CredentialError::Serialization(_)));
    }
}
