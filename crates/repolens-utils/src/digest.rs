//! Content digests and stable identifiers.
//!
//! Every digest in repolens is SHA-256, rendered as 64 lowercase hex chars.
//! Node and edge identifiers are SHA-256 truncated to 16 hex chars, computed
//! over unit-separated inputs so that `("ab", "c")` and `("a", "bc")` can
//! never collide.

use anyhow::{Context, Result};
use camino::Utf8Path;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;

/// Files at or below this size are digested from a single in-memory read;
/// larger files are streamed in [`CHUNK_BYTES`] chunks.
pub const STREAM_THRESHOLD_BYTES: u64 = 8 * 1024 * 1024;

/// Chunk size for streamed digests.
const CHUNK_BYTES: usize = 64 * 1024;

/// Unit separator placed between identifier components before hashing.
const ID_SEPARATOR: u8 = 0x1F;

/// Number of hex chars kept for node and edge identifiers.
const ID_HEX_LEN: usize = 16;

/// Digest a byte slice to 64 lowercase hex chars.
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Digest a string's UTF-8 bytes.
#[must_use]
pub fn digest_str(content: &str) -> String {
    digest_bytes(content.as_bytes())
}

/// Digest a file's content.
///
/// Small files are read whole; files above [`STREAM_THRESHOLD_BYTES`] are
/// streamed so the full content is never buffered.
pub fn digest_file(path: &Utf8Path) -> Result<String> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat file for digest: {path}"))?;

    if metadata.len() <= STREAM_THRESHOLD_BYTES {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read file for digest: {path}"))?;
        return Ok(digest_bytes(&bytes));
    }

    let file = File::open(path).with_context(|| format!("Failed to open file for digest: {path}"))?;
    digest_reader(file).with_context(|| format!("Failed to stream digest for: {path}"))
}

/// Digest an arbitrary reader in bounded chunks.
pub fn digest_reader<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_BYTES];
    loop {
        let n = reader.read(&mut buf).context("Failed to read chunk for digest")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Stable node identifier: SHA-256 over `kind 0x1F scope_path`, 16 hex chars.
#[must_use]
pub fn node_id(kind: &str, scope_path: &str) -> String {
    truncated_id(&[kind.as_bytes(), scope_path.as_bytes()])
}

/// Stable edge identifier: SHA-256 over `source 0x1F kind 0x1F target`,
/// 16 hex chars.
#[must_use]
pub fn edge_id(source_id: &str, kind: &str, target_id: &str) -> String {
    truncated_id(&[source_id.as_bytes(), kind.as_bytes(), target_id.as_bytes()])
}

/// Incremental SHA-256 for callers that interleave hashing with other
/// single-pass work over the same bytes (line counting, size accounting).
#[derive(Default)]
pub struct StreamingDigest {
    hasher: Sha256,
}

impl StreamingDigest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    #[must_use]
    pub fn finish(self) -> String {
        hex_encode(&self.hasher.finalize())
    }
}

fn truncated_id(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([ID_SEPARATOR]);
        }
        hasher.update(part);
    }
    let mut hex = hex_encode(&hasher.finalize());
    hex.truncate(ID_HEX_LEN);
    hex
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn digest_matches_known_vector() {
        // SHA-256 of the empty input
        assert_eq!(
            digest_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            digest_str("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn streamed_digest_equals_buffered_digest() {
        let content = b"0123456789".repeat(50_000);
        let streamed = digest_reader(Cursor::new(content.clone())).unwrap();
        assert_eq!(streamed, digest_bytes(&content));
    }

    #[test]
    fn node_ids_are_stable_and_separator_safe() {
        assert_eq!(node_id("file", "src/a.py"), node_id("file", "src/a.py"));
        assert_ne!(node_id("file", "src/a.py"), node_id("module", "src/a.py"));
        // The separator prevents boundary ambiguity between kind and scope
        assert_ne!(node_id("ab", "c"), node_id("a", "bc"));
        assert_eq!(node_id("file", "src/a.py").len(), 16);
    }

    #[test]
    fn edge_ids_depend_on_all_three_components() {
        let base = edge_id("n1", "contains", "n2");
        assert_ne!(base, edge_id("n2", "contains", "n1"));
        assert_ne!(base, edge_id("n1", "imports", "n2"));
        assert_eq!(base.len(), 16);
    }
}
