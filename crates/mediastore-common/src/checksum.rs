//! Checksum utilities for mediastore
//!
//! Uploads declare an MD5 of their content. These helpers hash stored
//! files by streaming them through a fixed-size buffer, so verification
//! runs in constant memory regardless of file size.

use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Read buffer used while hashing files
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Digest and length of a file, computed in a single pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDigest {
    /// Lowercase hex MD5
    pub md5: String,
    /// Number of bytes hashed
    pub size: u64,
}

/// Streaming MD5 calculator
pub struct Md5Calculator {
    context: md5::Context,
    size: u64,
}

impl Md5Calculator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: md5::Context::new(),
            size: 0,
        }
    }

    /// Update the calculator with more data
    pub fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
        self.size += data.len() as u64;
    }

    /// Finalize and return the computed digest
    #[must_use]
    pub fn finalize(self) -> FileDigest {
        FileDigest {
            md5: format!("{:x}", self.context.compute()),
            size: self.size,
        }
    }
}

impl Default for Md5Calculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute MD5 of an in-memory buffer as lowercase hex
#[must_use]
pub fn compute_md5(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Stream a file through MD5.
///
/// The file handle is dropped before returning on every path.
pub async fn compute_md5_file(path: impl AsRef<Path>) -> io::Result<FileDigest> {
    let mut file = tokio::fs::File::open(path.as_ref()).await?;
    let mut calc = Md5Calculator::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        calc.update(&buf[..n]);
    }
    Ok(calc.finalize())
}

/// Compare two hex digests, ignoring ASCII case
#[must_use]
pub fn checksums_match(declared: &str, computed: &str) -> bool {
    declared.trim().eq_ignore_ascii_case(computed)
}

/// Outcome of checking a file against a declared checksum
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    pub digest: FileDigest,
    pub matches: bool,
}

/// Check a stored file against a declared checksum.
///
/// A mismatch is `Ok` with `matches == false`; an `Err` means the file
/// could not be read and says nothing about its content.
pub async fn verify(path: impl AsRef<Path>, declared: &str) -> io::Result<Verification> {
    let digest = compute_md5_file(path).await?;
    let matches = checksums_match(declared, &digest.md5);
    Ok(Verification { digest, matches })
}
