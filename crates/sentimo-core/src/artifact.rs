//! Artifact identity and storage abstraction
//!
//! Transforms and classifiers travel through the system as opaque byte
//! blobs. A blob is addressed by its kind and the SHA-256 digest of its
//! bytes, so a reference doubles as an integrity check and as the
//! compatibility tag other artifacts are stamped with.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Kind of stored artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Fitted feature transform
    Transform,
    /// Fitted classifier
    Classifier,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::Classifier => "classifier",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content address of a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Artifact kind
    pub kind: ArtifactKind,

    /// Lowercase hex SHA-256 of the artifact bytes
    pub digest: String,
}

impl ArtifactRef {
    /// Reference for the given bytes
    pub fn for_bytes(kind: ArtifactKind, bytes: &[u8]) -> Self {
        Self {
            kind,
            digest: digest_hex(bytes),
        }
    }

    /// Whether `bytes` hash to this reference
    pub fn matches(&self, bytes: &[u8]) -> bool {
        digest_hex(bytes) == self.digest
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.digest)
    }
}

/// Lowercase hex SHA-256 digest
pub fn digest_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Durable key -> blob store for artifacts
pub trait ArtifactStore: Send + Sync {
    /// Store a blob, returning its content address. Storing the same bytes
    /// twice yields the same reference.
    fn put(&self, kind: ArtifactKind, bytes: &[u8]) -> Result<ArtifactRef>;

    /// Fetch a blob. Fails with `Error::Artifact` when the blob is missing
    /// or its bytes no longer match the reference.
    fn get(&self, artifact: &ArtifactRef) -> Result<Vec<u8>>;

    /// Whether the blob exists
    fn contains(&self, artifact: &ArtifactRef) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        let a = ArtifactRef::for_bytes(ArtifactKind::Transform, b"vocab");
        let b = ArtifactRef::for_bytes(ArtifactKind::Transform, b"vocab");
        assert_eq!(a, b);
        assert_eq!(a.digest.len(), 64);
        assert!(a.matches(b"vocab"));
        assert!(!a.matches(b"vocab2"));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            digest_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_display() {
        let r = ArtifactRef {
            kind: ArtifactKind::Classifier,
            digest: "abc".into(),
        };
        assert_eq!(r.to_string(), "classifier:abc");
    }
}
