//! Content digests and streaming hashing.

use crate::error::{CairnError, Result};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Read size for streaming hashes. Memory use stays bounded by this regardless
/// of file size.
pub const BLOCK_SIZE: usize = 64 * 1024;

/// A 32-byte SHA-256 content digest.
///
/// Digests order the same way as their lowercase hex form, so sorted
/// collections of digests iterate in `meta.txt` order.
///
/// # Examples
///
/// ```
/// use cairn_core::Digest;
///
/// let d = Digest::from_bytes([0xab; 32]);
/// assert_eq!(d.as_hex().len(), 64);
/// assert_eq!(d.key(), format!("SHA256/aba/bab/{}", &d.as_hex()[6..]));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The length of a Digest in bytes.
    pub const LEN: usize = 32;

    /// The length of a Digest as a hex string.
    pub const HEX_LEN: usize = 64;

    /// Creates a Digest from raw bytes.
    #[inline]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw hash bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns this Digest as a lowercase hex string (always 64 characters).
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns the sharded object key, `SHA256/<3>/<3>/<rest>`.
    ///
    /// Splitting 3/3/rest keeps every directory level at most 4096 entries wide.
    pub fn key(&self) -> String {
        let hex = self.as_hex();
        format!("SHA256/{}/{}/{}", &hex[..3], &hex[3..6], &hex[6..])
    }

    /// Parses a Digest from a hex string.
    ///
    /// # Errors
    ///
    /// Returns `CairnError::InvalidDigest` if the string is not valid hex
    /// or is not exactly 64 characters long.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != Self::HEX_LEN {
            return Err(CairnError::InvalidDigest(format!(
                "expected {} hex chars, got {}",
                Self::HEX_LEN,
                s.len()
            )));
        }

        let bytes = hex::decode(s).map_err(|e| CairnError::InvalidDigest(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CairnError::InvalidDigest("invalid length".to_string()))?;

        Ok(Self(arr))
    }

    /// Digest of an in-memory buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self::finish(hasher)
    }

    fn finish(hasher: Sha256) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Self(out)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}...)", &self.as_hex()[..12])
    }
}

impl FromStr for Digest {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Hashes everything `reader` yields, block by block.
///
/// When `tee` is given every block is also written to it, so a single pass can
/// both digest a file and copy it somewhere else. Returns the digest and the
/// number of bytes read. On any read or write error nothing is returned.
pub fn hash_reader<R: Read>(mut reader: R, mut tee: Option<&mut dyn Write>) -> Result<(Digest, u64)> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut size = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
        if let Some(sink) = tee.as_mut() {
            sink.write_all(&buf[..n])?;
        }
        size += n as u64;
    }

    if let Some(sink) = tee.as_mut() {
        sink.flush()?;
    }

    Ok((Digest::finish(hasher), size))
}

/// Hashes a file on disk.
pub fn hash_file(path: &Path) -> Result<Digest> {
    let file = File::open(path)?;
    let (digest, _) = hash_reader(file, None)?;
    Ok(digest)
}
