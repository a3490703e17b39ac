//! Plaintext on-disk persistence for token pairs

use std::path::PathBuf;

use crate::auth::token::TokenPair;
use crate::error::Result;

/// On-disk locations for the two token kinds.
///
/// Each configured path holds exactly one raw token string. A `None` path
/// disables persistence for that kind. Tokens are stored as plaintext with
/// no permission hardening; anyone with read access to the paths can use
/// them. This matches what existing integrations expect.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    access_token_path: Option<PathBuf>,
    refresh_token_path: Option<PathBuf>,
}

impl TokenStore {
    /// Create a store over the given paths
    #[must_use]
    pub fn new(access_token_path: Option<PathBuf>, refresh_token_path: Option<PathBuf>) -> Self {
        Self {
            access_token_path,
            refresh_token_path,
        }
    }

    /// The configured access-token path, if persistence is enabled
    #[must_use]
    pub fn access_token_path(&self) -> Option<&PathBuf> {
        self.access_token_path.as_ref()
    }

    /// The configured refresh-token path, if persistence is enabled
    #[must_use]
    pub fn refresh_token_path(&self) -> Option<&PathBuf> {
        self.refresh_token_path.as_ref()
    }

    /// Write each configured path with the corresponding raw token string,
    /// overwriting prior contents.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a configured path cannot be written.
    pub fn persist(&self, pair: &TokenPair) -> Result<()> {
        if let Some(path) = &self.access_token_path {
            tracing::debug!(path = %path.display(), "persisting access token");
            std::fs::write(path, &pair.access_token)?;
        }
        if let Some(path) = &self.refresh_token_path {
            if let Some(refresh_token) = &pair.refresh_token {
                tracing::debug!(path = %path.display(), "persisting refresh token");
                std::fs::write(path, refresh_token)?;
            }
        }
        Ok(())
    }

    /// Read whatever configured paths exist.
    ///
    /// Missing files are absent tokens, not errors. Returns
    /// `(access_token, refresh_token)`.
    #[must_use]
    pub fn load(&self) -> (Option<String>, Option<String>) {
        (
            read_token_file(self.access_token_path.as_ref()),
            read_token_file(self.refresh_token_path.as_ref()),
        )
    }

    /// Delete any persisted token files.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing file cannot be removed.
    pub fn delete(&self) -> Result<()> {
        for path in [&self.access_token_path, &self.refresh_token_path]
            .into_iter()
            .flatten()
        {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn read_token_file(path: Option<&PathBuf>) -> Option<String> {
    let path = path?;
    let contents = std::fs::read_to_string(path).ok()?;
    let token = contents.trim();
    (!token.is_empty()).then(|| token.to_string())
}
