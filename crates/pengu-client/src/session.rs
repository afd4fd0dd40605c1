//! Durable session persistence.
//!
//! A single JSON document holding the serialized current user, the only
//! thing the client persists across restarts. Collections are memory-only
//! and re-fetched each session, so this file is identity restore, nothing
//! more. Written on every user change, removed on logout.

use crate::models::User;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// Session file at the default location, honoring a `PENGU_SESSION`
    /// override for tests and unusual setups.
    pub fn default_path() -> Result<Self> {
        if let Ok(custom_path) = std::env::var("PENGU_SESSION") {
            return Ok(Self::at(PathBuf::from(custom_path)));
        }
        let home_dir = dirs::home_dir().context("Could not determine home directory")?;
        Ok(Self::at(
            home_dir
                .join(".local")
                .join("share")
                .join("pengu")
                .join("session.json"),
        ))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted user, if any. Unreadable or corrupt content is
    /// treated as no session; the next login overwrites it.
    pub fn load(&self) -> Option<User> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!(
                    "ignoring corrupt session file {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    pub fn store(&self, user: &User) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session directory: {}", parent.display())
            })?;
        }
        let content = serde_json::to_string_pretty(user).context("Failed to serialize session")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;
        Ok(())
    }

    /// Remove the session file. Idempotent: a missing file is fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to remove session file: {}", self.path.display())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, UserStatus};

    fn sample_user() -> User {
        User {
            id: "u1".to_string(),
            name: Some("Sana".to_string()),
            email: "sana@pengu.app".to_string(),
            role: Role::Student,
            status: UserStatus::Active,
            pengu_credits: 40.0,
            token: Some("jwt".to_string()),
            avatar_url: None,
            created_at: None,
        }
    }

    #[test]
    fn store_load_clear_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionFile::at(dir.path().join("session.json"));

        assert!(session.load().is_none());
        session.store(&sample_user()).unwrap();
        let restored = session.load().unwrap();
        assert_eq!(restored.id, "u1");
        assert_eq!(restored.token.as_deref(), Some("jwt"));

        session.clear().unwrap();
        assert!(session.load().is_none());
        // clearing twice must not error
        session.clear().unwrap();
    }

    #[test]
    fn corrupt_content_is_treated_as_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(SessionFile::at(path).load().is_none());
    }
}
