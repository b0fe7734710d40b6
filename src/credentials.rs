//! Durable storage for the session's [`CredentialBlob`].
//!
//! The lifecycle manager is the only writer: it loads the blob at connect time, overwrites it on
//! every credential change and erases it when the transport reports a logout (or an operator
//! asks for a fresh pairing).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::Result;
use crate::error::Error;
use crate::types::CredentialBlob;

const CREDENTIALS_FILE: &str = "creds.bin";

#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns the stored blob, or `None` when the bot has never been paired.
    async fn load(&self) -> Result<Option<CredentialBlob>>;

    /// Replaces the stored blob.
    async fn save(&self, blob: &CredentialBlob) -> Result<()>;

    /// Removes the stored blob. Erasing an empty store is not an error.
    async fn erase(&self) -> Result<()>;
}

/// Stores one blob per bot identity under `<root>/<bot_id>/creds.bin`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P, bot_id: &str) -> Self {
        Self {
            dir: root.as_ref().join(bot_id),
        }
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<CredentialBlob>> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => Ok(Some(CredentialBlob::new(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::persistence("load", e)),
        }
    }

    async fn save(&self, blob: &CredentialBlob) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::persistence("save", e))?;

        // The blob on disk is never partially written.
        let tmp = self.dir.join(format!("{CREDENTIALS_FILE}.tmp"));
        tokio::fs::write(&tmp, blob.as_bytes())
            .await
            .map_err(|e| Error::persistence("save", e))?;
        tokio::fs::rename(&tmp, self.path())
            .await
            .map_err(|e| Error::persistence("save", e))?;

        tracing::debug!(path = %self.path().display(), "Credentials saved");
        Ok(())
    }

    async fn erase(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::info!(path = %self.dir.display(), "Credential directory removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::persistence("erase", e)),
        }
    }
}

/// In-process store, useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    blob: Mutex<Option<CredentialBlob>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new(initial: Option<CredentialBlob>) -> Self {
        Self {
            blob: Mutex::new(initial),
        }
    }

    /// Current contents, without going through the async trait.
    #[must_use]
    pub fn snapshot(&self) -> Option<CredentialBlob> {
        self.blob
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<CredentialBlob>> {
        Ok(self.snapshot())
    }

    async fn save(&self, blob: &CredentialBlob) -> Result<()> {
        *self.blob.lock().unwrap_or_else(PoisonError::into_inner) = Some(blob.clone());
        Ok(())
    }

    async fn erase(&self) -> Result<()> {
        *self.blob.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
