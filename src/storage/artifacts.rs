//! Versioned on-disk artifacts for one index generation
//!
//! Layout of an index directory:
//!
//! ```text
//! manifest.json   generation id, row count, per-artifact BLAKE3 checksums
//! vectors.zst     embedding matrix
//! lexical.zst     BM25 statistics
//! metadata.zst    ordered chunk metadata + source catalog
//! ```
//!
//! Every artifact is zstd-compressed JSON wrapped in an envelope naming its
//! kind, format version, generation and row count. Loading rejects any
//! artifact that disagrees with the manifest.

use crate::corpus::{Corpus, Source, SourceCatalog};
use crate::error::{Result, RerankError};
use crate::index::{Bm25Index, EmbeddingMatrix, GenerationInfo, IndexSnapshot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// On-disk format version shared by the manifest and every artifact
pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const COMPRESSION_LEVEL: i32 = 3;

/// The three artifacts of a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Vectors,
    Lexical,
    Metadata,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [Self::Vectors, Self::Lexical, Self::Metadata];

    pub fn name(self) -> &'static str {
        match self {
            Self::Vectors => "vectors",
            Self::Lexical => "lexical",
            Self::Metadata => "metadata",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.zst", self.name())
    }
}

/// Checksum entry for one artifact file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub file: String,
    pub blake3: String,
    pub bytes: u64,
}

/// Index directory manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub generation: GenerationInfo,
    pub row_count: usize,
    pub artifacts: BTreeMap<String, ArtifactEntry>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    kind: &'a str,
    format_version: u32,
    generation: Uuid,
    row_count: usize,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    kind: String,
    format_version: u32,
    generation: Uuid,
    row_count: usize,
    payload: T,
}

#[derive(Serialize, Deserialize)]
struct MetadataPayload {
    corpus: Corpus,
    sources: Vec<Source>,
}

/// Reads and writes index generations in one directory
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a manifest is present
    pub fn exists(&self) -> bool {
        self.root.join(MANIFEST_FILE).exists()
    }

    /// Persist a snapshot, replacing any previous generation
    ///
    /// Artifacts are written to a staging directory first and swapped in with
    /// renames; on failure the previous generation is left in place.
    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<Manifest> {
        snapshot.check_alignment()?;

        let staging = self.sibling(&format!("staging-{}", snapshot.generation.id))?;
        let result = self
            .write_generation(&staging, snapshot)
            .and_then(|manifest| self.swap_in(&staging).map(|()| manifest));

        if result.is_err() && staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }

        let manifest = result?;
        tracing::info!(
            "Saved index generation {} ({} rows) to {}",
            manifest.generation.id,
            manifest.row_count,
            self.root.display()
        );
        Ok(manifest)
    }

    /// Load and verify a complete generation
    pub fn load(&self) -> Result<IndexSnapshot> {
        if !self.root.exists() {
            return Err(RerankError::IndexNotFound {
                path: self.root.clone(),
            });
        }

        let manifest = self.read_manifest()?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(RerankError::inconsistent(
                MANIFEST_FILE,
                format!(
                    "unsupported format version {} (expected {})",
                    manifest.format_version, FORMAT_VERSION
                ),
            ));
        }

        let embeddings: EmbeddingMatrix = self.read_artifact(&manifest, ArtifactKind::Vectors)?;
        embeddings
            .validate()
            .map_err(|e| RerankError::inconsistent("vectors", e.to_string()))?;

        let lexical: Bm25Index = self.read_artifact(&manifest, ArtifactKind::Lexical)?;
        let metadata: MetadataPayload = self.read_artifact(&manifest, ArtifactKind::Metadata)?;

        let snapshot = IndexSnapshot::new(
            manifest.generation.clone(),
            metadata.corpus,
            SourceCatalog::new(metadata.sources),
            embeddings,
            lexical,
        )?;

        if snapshot.len() != manifest.row_count {
            return Err(RerankError::inconsistent(
                MANIFEST_FILE,
                format!(
                    "manifest lists {} rows, artifacts hold {}",
                    manifest.row_count,
                    snapshot.len()
                ),
            ));
        }

        tracing::info!(
            "Loaded index generation {} ({} rows) from {}",
            snapshot.generation.id,
            snapshot.len(),
            self.root.display()
        );

        Ok(snapshot)
    }

    /// Read the manifest without loading artifacts
    pub fn read_manifest(&self) -> Result<Manifest> {
        let path = self.root.join(MANIFEST_FILE);
        let bytes = fs::read(&path)
            .map_err(|e| RerankError::inconsistent(MANIFEST_FILE, format!("unreadable: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RerankError::inconsistent(MANIFEST_FILE, format!("malformed: {}", e)))
    }

    fn sibling(&self, suffix: &str) -> Result<PathBuf> {
        let name = self
            .root
            .file_name()
            .ok_or_else(|| {
                RerankError::Config(format!("Invalid index directory: {}", self.root.display()))
            })?
            .to_string_lossy()
            .into_owned();
        Ok(self.root.with_file_name(format!(".{}.{}", name, suffix)))
    }

    fn write_generation(&self, dir: &Path, snapshot: &IndexSnapshot) -> Result<Manifest> {
        fs::create_dir_all(dir).map_err(|e| RerankError::Io {
            source: e,
            context: format!("Failed to create staging directory: {}", dir.display()),
        })?;

        let mut artifacts = BTreeMap::new();

        let metadata = MetadataPayload {
            corpus: snapshot.corpus.clone(),
            sources: snapshot.sources.iter().cloned().collect(),
        };

        for kind in ArtifactKind::ALL {
            let entry = match kind {
                ArtifactKind::Vectors => write_artifact(dir, kind, snapshot, &snapshot.embeddings)?,
                ArtifactKind::Lexical => write_artifact(dir, kind, snapshot, &snapshot.lexical)?,
                ArtifactKind::Metadata => write_artifact(dir, kind, snapshot, &metadata)?,
            };
            artifacts.insert(kind.name().to_string(), entry);
        }

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            generation: snapshot.generation.clone(),
            row_count: snapshot.len(),
            artifacts,
        };

        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| RerankError::Json {
            source: e,
            context: "Failed to serialize manifest".to_string(),
        })?;
        write_synced(&dir.join(MANIFEST_FILE), &json)?;

        Ok(manifest)
    }

    fn swap_in(&self, staging: &Path) -> Result<()> {
        let previous = self.sibling("previous")?;
        if previous.exists() {
            fs::remove_dir_all(&previous).map_err(|e| RerankError::Io {
                source: e,
                context: format!("Failed to remove stale index: {}", previous.display()),
            })?;
        }

        let had_previous = self.root.exists();
        if had_previous {
            fs::rename(&self.root, &previous).map_err(|e| RerankError::Io {
                source: e,
                context: format!("Failed to move aside index: {}", self.root.display()),
            })?;
        }

        if let Err(e) = fs::rename(staging, &self.root) {
            if had_previous {
                let _ = fs::rename(&previous, &self.root);
            }
            return Err(RerankError::Io {
                source: e,
                context: format!("Failed to install index: {}", self.root.display()),
            });
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&previous) {
                tracing::warn!("Failed to remove previous index {}: {}", previous.display(), e);
            }
        }

        Ok(())
    }

    fn read_artifact<T: DeserializeOwned>(
        &self,
        manifest: &Manifest,
        kind: ArtifactKind,
    ) -> Result<T> {
        let name = kind.name();
        let entry = manifest
            .artifacts
            .get(name)
            .ok_or_else(|| RerankError::inconsistent(name, "not listed in manifest"))?;

        let path = self.root.join(&entry.file);
        let compressed = fs::read(&path)
            .map_err(|e| RerankError::inconsistent(name, format!("unreadable artifact: {}", e)))?;

        let checksum = blake3::hash(&compressed).to_hex().to_string();
        if checksum != entry.blake3 {
            return Err(RerankError::inconsistent(
                name,
                "checksum does not match manifest",
            ));
        }

        let json = zstd::decode_all(&compressed[..])
            .map_err(|e| RerankError::inconsistent(name, format!("decompression failed: {}", e)))?;
        let envelope: Envelope<T> = serde_json::from_slice(&json)
            .map_err(|e| RerankError::inconsistent(name, format!("malformed artifact: {}", e)))?;

        if envelope.kind != name {
            return Err(RerankError::inconsistent(
                name,
                format!("artifact holds '{}' data", envelope.kind),
            ));
        }
        if envelope.format_version != FORMAT_VERSION {
            return Err(RerankError::inconsistent(
                name,
                format!("format version {}", envelope.format_version),
            ));
        }
        if envelope.generation != manifest.generation.id {
            return Err(RerankError::inconsistent(
                name,
                format!(
                    "generation {} does not match manifest generation {}",
                    envelope.generation, manifest.generation.id
                ),
            ));
        }
        if envelope.row_count != manifest.row_count {
            return Err(RerankError::inconsistent(
                name,
                format!(
                    "{} rows, manifest lists {}",
                    envelope.row_count, manifest.row_count
                ),
            ));
        }

        Ok(envelope.payload)
    }
}

fn write_artifact<T: Serialize>(
    dir: &Path,
    kind: ArtifactKind,
    snapshot: &IndexSnapshot,
    payload: &T,
) -> Result<ArtifactEntry> {
    let envelope = EnvelopeRef {
        kind: kind.name(),
        format_version: FORMAT_VERSION,
        generation: snapshot.generation.id,
        row_count: snapshot.len(),
        payload,
    };

    let json = serde_json::to_vec(&envelope).map_err(|e| RerankError::Json {
        source: e,
        context: format!("Failed to serialize {} artifact", kind.name()),
    })?;
    let compressed = zstd::encode_all(&json[..], COMPRESSION_LEVEL).map_err(|e| RerankError::Io {
        source: e,
        context: format!("Failed to compress {} artifact", kind.name()),
    })?;

    let file = kind.file_name();
    write_synced(&dir.join(&file), &compressed)?;

    Ok(ArtifactEntry {
        file,
        blake3: blake3::hash(&compressed).to_hex().to_string(),
        bytes: compressed.len() as u64,
    })
}

fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| RerankError::Io {
        source: e,
        context: format!("Failed to create file: {}", path.display()),
    })?;
    file.write_all(data).map_err(|e| RerankError::Io {
        source: e,
        context: format!("Failed to write file: {}", path.display()),
    })?;
    file.sync_all().map_err(|e| RerankError::Io {
        source: e,
        context: format!("Failed to sync file: {}", path.display()),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Bm25Params, IndexBuilder};
    use crate::test_utils::{corpus_from_texts, VocabularyEmbedder};
    use tempfile::TempDir;

    const TEXTS: [&str; 3] = [
        "fire safety procedure A",
        "electrical hazard checklist",
        "fire extinguisher maintenance",
    ];

    fn snapshot(texts: &[&str]) -> IndexSnapshot {
        let embedder = VocabularyEmbedder::from_texts(&TEXTS);
        let sources = SourceCatalog::new(vec![Source {
            id: 1,
            title: "Plant Safety Manual".to_string(),
            url: "https://example.org/manual".to_string(),
            file: "manual.txt".to_string(),
        }]);
        IndexBuilder::new(2, Bm25Params::default())
            .build(corpus_from_texts(texts), sources, &embedder)
            .unwrap()
    }

    fn rewrite_manifest(store: &ArtifactStore, manifest: &Manifest) {
        fs::write(
            store.root().join(MANIFEST_FILE),
            serde_json::to_vec_pretty(manifest).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("index"));
        let original = snapshot(&TEXTS);

        let manifest = store.save(&original).unwrap();
        assert_eq!(manifest.row_count, 3);
        assert_eq!(manifest.artifacts.len(), 3);
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.generation, original.generation);
        assert_eq!(loaded.corpus, original.corpus);
        assert_eq!(loaded.embeddings, original.embeddings);
        assert_eq!(loaded.lexical, original.lexical);
        assert_eq!(loaded.sources, original.sources);
    }

    #[test]
    fn test_empty_snapshot_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("index"));

        store.save(&snapshot(&[])).unwrap();
        let loaded = store.load().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_missing_index() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("nothing-here"));
        assert!(matches!(store.load(), Err(RerankError::IndexNotFound { .. })));
    }

    #[test]
    fn test_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("index"));
        store.save(&snapshot(&TEXTS)).unwrap();

        fs::remove_file(store.root().join("lexical.zst")).unwrap();
        assert!(matches!(
            store.load(),
            Err(RerankError::InconsistentIndexGeneration { artifact, .. }) if artifact == "lexical"
        ));
    }

    #[test]
    fn test_artifact_from_other_generation() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("index"));
        let other = ArtifactStore::new(temp.path().join("other"));

        store.save(&snapshot(&TEXTS)).unwrap();
        let other_manifest = other.save(&snapshot(&TEXTS)).unwrap();

        // Swap in the other generation's vectors and make the checksum agree
        fs::copy(other.root().join("vectors.zst"), store.root().join("vectors.zst")).unwrap();
        let mut manifest = store.read_manifest().unwrap();
        manifest.artifacts.insert(
            "vectors".to_string(),
            other_manifest.artifacts["vectors"].clone(),
        );
        rewrite_manifest(&store, &manifest);

        match store.load() {
            Err(RerankError::InconsistentIndexGeneration { artifact, reason }) => {
                assert_eq!(artifact, "vectors");
                assert!(reason.contains("generation"));
            }
            other => panic!("expected inconsistent generation, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_corrupted_artifact() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("index"));
        store.save(&snapshot(&TEXTS)).unwrap();

        fs::write(store.root().join("metadata.zst"), b"garbage").unwrap();
        assert!(matches!(
            store.load(),
            Err(RerankError::InconsistentIndexGeneration { .. })
        ));
    }

    #[test]
    fn test_row_count_mismatch() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("index"));
        store.save(&snapshot(&TEXTS)).unwrap();

        let mut manifest = store.read_manifest().unwrap();
        manifest.row_count = 2;
        rewrite_manifest(&store, &manifest);

        assert!(matches!(
            store.load(),
            Err(RerankError::InconsistentIndexGeneration { .. })
        ));
    }

    #[test]
    fn test_save_replaces_previous_generation() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("index"));

        store.save(&snapshot(&TEXTS)).unwrap();
        let second = snapshot(&TEXTS[..2]);
        store.save(&second).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.generation.id, second.generation.id);
        assert_eq!(loaded.len(), 2);

        // Only the live index directory remains
        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
