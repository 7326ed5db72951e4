//! Streaming content digests
//!
//! The digest doubles as the change detector and part of the upload payload,
//! so it must always reflect the bytes actually read; read errors surface
//! instead of being treated as "unchanged".

use std::path::Path;

use eyre::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the hex-encoded SHA-256 digest of a file's content.
///
/// Reads in fixed-size chunks so large files never have to be resident.
pub async fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = tokio::fs::File::open(path)
        .await
        .wrap_err_with(|| format!("Failed to open {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file
            .read(&mut buf)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
