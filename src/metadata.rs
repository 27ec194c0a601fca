//! Sidecar record describing an installed database.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// What was installed, and when.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UpdateMetadata {
    /// Install time in seconds since the Unix epoch
    pub installed_at: u64,
    /// Version number from the update control file
    pub version: u32,
    /// Size of the installed database in bytes
    pub size: u64,
    /// Hex SHA-256 of the installed database
    pub sha256: String,
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

impl UpdateMetadata {
    /// Describe a database installed just now.
    pub fn describe(database: &[u8], version: u32) -> Self {
        let installed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            installed_at,
            version,
            size: database.len() as u64,
            sha256: sha256_hex(database),
        }
    }

    /// Install time.
    pub fn installed_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.installed_at)
    }

    /// Whether at least `interval` has passed since install.
    ///
    /// A clock set before the install time counts as stale.
    pub fn is_stale(&self, interval: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.installed_at())
            .map_or(true, |age| age >= interval)
    }

    /// Read a sidecar file. `Ok(None)` if there is none.
    pub fn read(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::Config(format!("bad update metadata: {}", e)))
    }

    /// Write the sidecar file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}
