//! Content hashing for cache validation and download verification
//!
//! Digests are always rendered as lowercase hex. Comparisons ignore case
//! because some APIs publish uppercase checksums.

use crate::error::{RunTaskError, RunTaskResult};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Length of a hex digest produced by this algorithm
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha512 => "SHA-512",
        };
        write!(f, "{}", name)
    }
}

/// A digest together with the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHash {
    pub algorithm: HashAlgorithm,
    pub hex: String,
}

impl ContentHash {
    pub fn new(algorithm: HashAlgorithm, hex: impl Into<String>) -> Self {
        Self {
            algorithm,
            hex: hex.into().to_ascii_lowercase(),
        }
    }

    /// Compare against another hex digest of the same algorithm
    pub fn matches(&self, hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(hex)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Incremental hasher over any supported algorithm.
///
/// Fed by the download engine while bytes stream to disk, so a freshly
/// downloaded file never has to be read back just to be hashed.
pub enum StreamingHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Self::Md5(Md5::new()),
            HashAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Md5(_) => HashAlgorithm::Md5,
            Self::Sha1(_) => HashAlgorithm::Sha1,
            Self::Sha256(_) => HashAlgorithm::Sha256,
            Self::Sha512(_) => HashAlgorithm::Sha512,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    pub fn finish(self) -> ContentHash {
        let algorithm = self.algorithm();
        let hex = match self {
            Self::Md5(h) => hex::encode(h.finalize()),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        };
        ContentHash { algorithm, hex }
    }
}

/// Hash everything readable from `reader`
pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, mut reader: R) -> io::Result<ContentHash> {
    let mut hasher = StreamingHasher::new(algorithm);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finish())
}

/// Hash an in-memory byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> ContentHash {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(bytes);
    hasher.finish()
}

/// Hash a file on disk
pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> RunTaskResult<ContentHash> {
    let file = File::open(path)
        .map_err(|e| RunTaskError::io(format!("opening {} for hashing", path.display()), e))?;
    hash_reader(algorithm, file)
        .map_err(|e| RunTaskError::io(format!("hashing {}", path.display()), e))
}

/// Hash a file on the blocking pool
pub async fn hash_file_async(algorithm: HashAlgorithm, path: PathBuf) -> RunTaskResult<ContentHash> {
    tokio::task::spawn_blocking(move || hash_file(algorithm, &path))
        .await
        .map_err(|e| RunTaskError::Internal(format!("hashing task failed: {}", e)))?
}
