//! Artifact blob stores
//!
//! Blobs are content addressed: the reference returned by `put` is the
//! SHA-256 of the bytes, and `get` re-hashes on the way out so a corrupted
//! or swapped file is reported instead of silently served.

use parking_lot::RwLock;
use sentimo_core::{ArtifactKind, ArtifactRef, ArtifactStore, Error, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

fn check_digest(artifact: &ArtifactRef) -> Result<()> {
    let well_formed =
        artifact.digest.len() == 64 && artifact.digest.bytes().all(|b| b.is_ascii_hexdigit());
    if !well_formed {
        return Err(Error::artifact(format!("malformed digest in {artifact}")));
    }
    Ok(())
}

/// Filesystem store laid out as `<root>/<kind>/<digest>.json`
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for kind in [ArtifactKind::Transform, ArtifactKind::Classifier] {
            std::fs::create_dir_all(root.join(kind.as_str()))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a blob on disk
    pub fn path_for(&self, artifact: &ArtifactRef) -> PathBuf {
        self.root
            .join(artifact.kind.as_str())
            .join(format!("{}.json", artifact.digest))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, kind: ArtifactKind, bytes: &[u8]) -> Result<ArtifactRef> {
        let artifact = ArtifactRef::for_bytes(kind, bytes);
        let path = self.path_for(&artifact);

        if path.exists() {
            debug!("Artifact {} already stored", artifact);
            return Ok(artifact);
        }

        let dir = self.root.join(kind.as_str());
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

        debug!("Stored artifact {} ({} bytes)", artifact, bytes.len());
        Ok(artifact)
    }

    fn get(&self, artifact: &ArtifactRef) -> Result<Vec<u8>> {
        check_digest(artifact)?;
        let path = self.path_for(artifact);

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::artifact(format!("artifact {artifact} is missing")));
            }
            Err(e) => return Err(e.into()),
        };

        if !artifact.matches(&bytes) {
            return Err(Error::artifact(format!(
                "artifact {artifact} failed its integrity check"
            )));
        }
        Ok(bytes)
    }

    fn contains(&self, artifact: &ArtifactRef) -> bool {
        check_digest(artifact).is_ok() && self.path_for(artifact).is_file()
    }
}

/// In-memory store for tests and ephemeral pipelines
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<HashMap<ArtifactRef, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Drop a blob, returning whether it was present
    pub fn remove(&self, artifact: &ArtifactRef) -> bool {
        self.blobs.write().remove(artifact).is_some()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, kind: ArtifactKind, bytes: &[u8]) -> Result<ArtifactRef> {
        let artifact = ArtifactRef::for_bytes(kind, bytes);
        self.blobs
            .write()
            .entry(artifact.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(artifact)
    }

    fn get(&self, artifact: &ArtifactRef) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(artifact)
            .cloned()
            .ok_or_else(|| Error::artifact(format!("artifact {artifact} is missing")))
    }

    fn contains(&self, artifact: &ArtifactRef) -> bool {
        self.blobs.read().contains_key(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_put_get() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        let artifact = store.put(ArtifactKind::Transform, b"vocab").unwrap();
        assert!(store.contains(&artifact));
        assert_eq!(store.get(&artifact).unwrap(), b"vocab");
        assert!(store.path_for(&artifact).starts_with(dir.path().join("transform")));
    }

    #[test]
    fn test_fs_put_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        let a = store.put(ArtifactKind::Classifier, b"forest").unwrap();
        let b = store.put(ArtifactKind::Classifier, b"forest").unwrap();
        assert_eq!(a, b);

        let files = std::fs::read_dir(dir.path().join("classifier")).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_fs_detects_tampering() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        let artifact = store.put(ArtifactKind::Transform, b"vocab").unwrap();
        std::fs::write(store.path_for(&artifact), b"tampered").unwrap();

        let err = store.get(&artifact).unwrap_err();
        assert!(matches!(err, Error::Artifact(_)));
    }

    #[test]
    fn test_fs_missing_blob() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        let artifact = ArtifactRef::for_bytes(ArtifactKind::Transform, b"never stored");
        assert!(!store.contains(&artifact));
        assert!(matches!(store.get(&artifact), Err(Error::Artifact(_))));
    }

    #[test]
    fn test_fs_rejects_path_like_digest() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        let artifact = ArtifactRef {
            kind: ArtifactKind::Transform,
            digest: "../../etc/passwd".to_string(),
        };
        assert!(!store.contains(&artifact));
        assert!(matches!(store.get(&artifact), Err(Error::Artifact(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryArtifactStore::new();
        let artifact = store.put(ArtifactKind::Classifier, b"forest").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&artifact).unwrap(), b"forest");
        assert!(store.remove(&artifact));
        assert!(store.is_empty());
        assert!(matches!(store.get(&artifact), Err(Error::Artifact(_))));
    }
}
