//! Typed view over opaque artifact blobs

use sentimo_core::{ArtifactKind, ArtifactRef, ArtifactStore, Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A fitted, immutable model component that can be stored as a blob
///
/// The registry and the serving layer only ever see the bytes produced by
/// [`Artifact::to_bytes`]; the concrete type is recovered with
/// [`Artifact::from_bytes`].
pub trait Artifact: Serialize + DeserializeOwned + Sized {
    /// Kind recorded alongside the blob
    const KIND: ArtifactKind;

    /// Post-decode hook: rebuild derived state and check internal invariants
    fn restore(self) -> Result<Self> {
        Ok(self)
    }

    /// Serialize to the stored blob format
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a stored blob
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let decoded: Self = serde_json::from_slice(bytes)
            .map_err(|e| Error::artifact(format!("corrupt {} artifact: {e}", Self::KIND)))?;
        decoded.restore()
    }

    /// Content digest of the serialized form
    fn fingerprint(&self) -> Result<String> {
        Ok(sentimo_core::digest_hex(&self.to_bytes()?))
    }

    /// Write to the artifact store
    fn persist(&self, store: &dyn ArtifactStore) -> Result<ArtifactRef> {
        store.put(Self::KIND, &self.to_bytes()?)
    }

    /// Read back from the artifact store
    fn load(store: &dyn ArtifactStore, artifact: &ArtifactRef) -> Result<Self> {
        if artifact.kind != Self::KIND {
            return Err(Error::artifact(format!(
                "expected a {} artifact, got {}",
                Self::KIND,
                artifact
            )));
        }
        Self::from_bytes(&store.get(artifact)?)
    }
}
