//! Model artifact inspection
//!
//! The predictor is trend-based; the configured model file is only
//! fingerprinted at startup so operators can tell which artifact was
//! deployed alongside the monitor.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
}

impl ModelArtifact {
    /// Hash the file at `path`; `Ok(None)` when it does not exist
    pub fn inspect(path: &Path) -> Result<Option<Self>> {
        let mut file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to open model file {}", path.display()))
            }
        };

        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        let mut size_bytes = 0u64;
        loop {
            let n = file
                .read(&mut buf)
                .with_context(|| format!("Failed to read model file {}", path.display()))?;
            if n == 0 {
                break;
            }
            size_bytes += n as u64;
            hasher.update(&buf[..n]);
        }

        Ok(Some(Self {
            path: path.to_path_buf(),
            size_bytes,
            sha256: hex::encode(hasher.finalize()),
        }))
    }
}
