//! Authenticated identity and the persisted session.
//!
//! The backend issues an opaque principal per user; ownership of a pin is
//! decided by comparing principals. The session (principal + bearer token)
//! lives next to the settings file and is removed on logout or when the
//! backend reports an expired session signature.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Opaque principal identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(principal: impl Into<String>) -> Self {
        Self(principal.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub principal: Identity,
    pub token: String,
}

impl Session {
    pub fn load() -> Option<Self> {
        let content = fs::read_to_string(Self::path()).ok()?;
        toml::from_str(&content).ok()
    }

    pub fn save(&self) -> io::Result<()> {
        let path = Self::path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Forced logout: removes the stored session, ignoring a missing file.
    pub fn clear() {
        let _ = fs::remove_file(Self::path());
    }

    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vibemap")
            .join("session.toml")
    }
}
