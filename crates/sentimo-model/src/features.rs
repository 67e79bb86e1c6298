//! TF-IDF feature engineering
//!
//! The transform lowercases text, keeps tokens of two or more word
//! characters and weights raw term counts by smoothed inverse document
//! frequency, `ln((1 + n) / (1 + df)) + 1`, before L2-normalizing each row.
//! Terms outside the fitted vocabulary contribute nothing.

use crate::artifact::Artifact;
use crate::split::{split_indices, SparseVector, Split};
use regex::Regex;
use sentimo_core::{ArtifactKind, ArtifactRef, ArtifactStore, CorpusRecord, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Lowercasing word tokenizer; keeps tokens of two or more word characters
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pattern: Regex,
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(r"\b\w\w+\b")
                .map_err(|e| Error::internal(format!("Failed to compile token regex: {e}")))?,
        })
    }

    /// Split text into lowercase tokens
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.pattern
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Fitted TF-IDF transform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfTransform {
    /// Vocabulary in feature-index order
    vocabulary: Vec<String>,

    /// Inverse document frequency per feature
    idf: Vec<f32>,

    /// Number of documents seen at fit time
    n_documents: usize,

    #[serde(skip)]
    index: HashMap<String, u32>,

    #[serde(skip)]
    tokenizer: Option<Tokenizer>,
}

impl TfidfTransform {
    /// Fit on `documents`, keeping at most `vocab_size` terms.
    ///
    /// Terms are ranked by document frequency, then total count, then
    /// lexicographically, so the vocabulary is fully determined by the input.
    pub fn fit<S: AsRef<str>>(documents: &[S], vocab_size: usize) -> Result<Self> {
        if vocab_size == 0 {
            return Err(Error::config("vocab_size must be > 0"));
        }
        if documents.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let tokenizer = Tokenizer::new()?;
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let mut seen: HashMap<String, usize> = HashMap::new();
            for token in tokenizer.tokenize(doc.as_ref()) {
                *seen.entry(token).or_insert(0) += 1;
            }
            for (term, count) in seen {
                *term_freq.entry(term.clone()).or_insert(0) += count;
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        if doc_freq.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let mut ranked: Vec<(String, usize)> = doc_freq.into_iter().collect();
        ranked.sort_by(|(a_term, a_df), (b_term, b_df)| {
            b_df.cmp(a_df)
                .then_with(|| term_freq[b_term].cmp(&term_freq[a_term]))
                .then_with(|| a_term.cmp(b_term))
        });
        ranked.truncate(vocab_size);

        // Feature indices follow alphabetical order of the kept terms
        ranked.sort_by(|(a, _), (b, _)| a.cmp(b));

        let n = documents.len() as f64;
        let (vocabulary, idf): (Vec<String>, Vec<f32>) = ranked
            .into_iter()
            .map(|(term, df)| {
                let idf = ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0;
                (term, idf as f32)
            })
            .unzip();

        debug!(
            "Fitted TF-IDF vocabulary of {} terms over {} documents",
            vocabulary.len(),
            documents.len()
        );

        Self {
            vocabulary,
            idf,
            n_documents: documents.len(),
            index: HashMap::new(),
            tokenizer: Some(tokenizer),
        }
        .restore()
    }

    /// Map text to an L2-normalized TF-IDF row
    pub fn apply(&self, text: &str) -> SparseVector {
        // Set by `fit` and `restore`
        let Some(tokenizer) = &self.tokenizer else {
            return SparseVector::default();
        };

        let mut counts: HashMap<u32, f32> = HashMap::new();
        for token in tokenizer.tokenize(text) {
            if let Some(&idx) = self.index.get(&token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut pairs: Vec<(u32, f32)> = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx as usize]))
            .collect();
        // Fixed summation order keeps the norm bit-for-bit reproducible
        pairs.sort_by_key(|&(idx, _)| idx);

        let norm = pairs.iter().map(|&(_, v)| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut pairs {
                *v /= norm;
            }
        }

        SparseVector::from_pairs(pairs)
    }

    /// Dimension of the produced vectors
    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Feature index of a term, if it is in the vocabulary
    pub fn feature_index(&self, term: &str) -> Option<usize> {
        self.index.get(term).map(|&i| i as usize)
    }

    /// IDF weight of a term, if it is in the vocabulary
    pub fn idf(&self, term: &str) -> Option<f32> {
        self.feature_index(term).map(|i| self.idf[i])
    }

    pub fn n_documents(&self) -> usize {
        self.n_documents
    }
}

impl Artifact for TfidfTransform {
    const KIND: ArtifactKind = ArtifactKind::Transform;

    fn restore(mut self) -> Result<Self> {
        if self.vocabulary.len() != self.idf.len() {
            return Err(Error::artifact(format!(
                "transform has {} terms but {} idf weights",
                self.vocabulary.len(),
                self.idf.len()
            )));
        }

        self.index = self
            .vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i as u32))
            .collect();

        if self.index.len() != self.vocabulary.len() {
            return Err(Error::artifact("transform vocabulary has duplicate terms"));
        }

        if self.tokenizer.is_none() {
            self.tokenizer = Some(Tokenizer::new()?);
        }

        Ok(self)
    }
}

/// Output of one feature engineering pass
#[derive(Debug, Clone)]
pub struct EngineeredFeatures {
    /// The fitted transform
    pub transform: Arc<TfidfTransform>,

    /// Where the transform was persisted
    pub transform_ref: ArtifactRef,

    /// Training rows
    pub train: Split,

    /// Held-out rows
    pub test: Split,
}

/// Fits transforms and produces train/test splits
pub struct FeatureEngineer {
    store: Arc<dyn ArtifactStore>,
}

impl FeatureEngineer {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Fit a transform on `corpus`, persist it, and split the vectorized rows.
    ///
    /// Rows with blank text are dropped before fitting.
    pub fn fit_transform(
        &self,
        corpus: &[CorpusRecord],
        vocab_size: usize,
        test_ratio: f64,
        seed: u64,
    ) -> Result<EngineeredFeatures> {
        if vocab_size == 0 {
            return Err(Error::config("vocab_size must be > 0"));
        }
        if !(test_ratio > 0.0 && test_ratio < 1.0) {
            return Err(Error::config(format!(
                "test_ratio must be in (0, 1), got {test_ratio}"
            )));
        }

        let usable: Vec<&CorpusRecord> = corpus
            .iter()
            .filter(|r| !r.text.trim().is_empty())
            .collect();
        if usable.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if usable.len() < corpus.len() {
            debug!("Dropped {} blank rows", corpus.len() - usable.len());
        }

        let documents: Vec<&str> = usable.iter().map(|r| r.text.as_str()).collect();
        let transform = TfidfTransform::fit(&documents, vocab_size)?;

        let transform_ref = transform.persist(self.store.as_ref())?;
        let transform_id = transform_ref.digest.clone();

        let rows: Vec<SparseVector> = documents.iter().map(|d| transform.apply(d)).collect();
        let (train_idx, test_idx) = split_indices(rows.len(), test_ratio, seed);

        let build = |indices: Vec<usize>| Split {
            transform_id: transform_id.clone(),
            n_features: transform.n_features(),
            rows: indices.iter().map(|&i| rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| usable[i].label).collect(),
            source_indices: indices,
        };

        let train = build(train_idx);
        let test = build(test_idx);

        info!(
            "Feature engineering complete: {} terms, {} train rows, {} test rows, transform {}",
            transform.n_features(),
            train.len(),
            test.len(),
            transform_ref
        );

        Ok(EngineeredFeatures {
            transform: Arc::new(transform),
            transform_ref,
            train,
            test,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentimo_core::Label;
    use sentimo_registry::MemoryArtifactStore;

    fn corpus() -> Vec<CorpusRecord> {
        vec![
            CorpusRecord::positive("A great movie, truly great"),
            CorpusRecord::positive("great acting and a fine story"),
            CorpusRecord::negative("A terrible movie"),
            CorpusRecord::negative("terrible acting, terrible story"),
            CorpusRecord::positive("fine fun film"),
            CorpusRecord::negative("boring film"),
        ]
    }

    fn engineer() -> (FeatureEngineer, Arc<MemoryArtifactStore>) {
        let store = Arc::new(MemoryArtifactStore::new());
        (FeatureEngineer::new(store.clone()), store)
    }

    #[test]
    fn test_tokenize() {
        let tokenizer = Tokenizer::new().unwrap();
        assert_eq!(
            tokenizer.tokenize("A Great movie, isn't it?"),
            vec!["great", "movie", "isn", "it"]
        );
    }

    #[test]
    fn test_vocab_size_caps_vocabulary() {
        let docs = ["great great movie", "great film", "movie night"];
        let transform = TfidfTransform::fit(&docs, 2).unwrap();
        // df: great=2, movie=2, film=1, night=1; great has the larger total count
        assert_eq!(transform.vocabulary(), &["great", "movie"]);
    }

    #[test]
    fn test_idf_is_smoothed() {
        let docs = ["great movie", "great film"];
        let transform = TfidfTransform::fit(&docs, 10).unwrap();
        let idf_great = transform.idf("great").unwrap();
        let idf_film = transform.idf("film").unwrap();
        assert!((idf_great - 1.0).abs() < 1e-6);
        assert!((idf_film - ((3.0f32 / 2.0).ln() + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_rows_are_l2_normalized() {
        let docs = ["great movie", "terrible movie"];
        let transform = TfidfTransform::fit(&docs, 10).unwrap();
        let row = transform.apply("great great movie");
        let norm: f32 = row.values().iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_vocabulary_is_zero() {
        let docs = ["great movie", "terrible movie"];
        let transform = TfidfTransform::fit(&docs, 10).unwrap();
        let row = transform.apply("completely unseen words");
        assert_eq!(row.nnz(), 0);
    }

    #[test]
    fn test_artifact_restore_rebuilds_index() {
        let docs = ["great movie", "terrible movie"];
        let transform = TfidfTransform::fit(&docs, 10).unwrap();
        let bytes = transform.to_bytes().unwrap();
        let restored = TfidfTransform::from_bytes(&bytes).unwrap();
        assert_eq!(restored.feature_index("movie"), transform.feature_index("movie"));
        assert_eq!(restored.apply("great movie"), transform.apply("great movie"));
    }

    #[test]
    fn test_corrupt_transform_rejected() {
        let err = TfidfTransform::from_bytes(br#"{"vocabulary":["a"],"idf":[],"n_documents":1}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Artifact(_)));
    }

    #[test]
    fn test_fit_transform_is_deterministic() {
        let (engineer, _) = engineer();
        let a = engineer.fit_transform(&corpus(), 50, 0.34, 42).unwrap();
        let b = engineer.fit_transform(&corpus(), 50, 0.34, 42).unwrap();

        assert_eq!(a.transform.vocabulary(), b.transform.vocabulary());
        assert_eq!(a.transform_ref, b.transform_ref);
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn test_splits_share_transform_and_are_disjoint() {
        let (engineer, store) = engineer();
        let features = engineer.fit_transform(&corpus(), 50, 0.34, 7).unwrap();

        assert_eq!(features.train.transform_id, features.transform_ref.digest);
        assert_eq!(features.test.transform_id, features.transform_ref.digest);
        assert_eq!(features.train.len() + features.test.len(), 6);
        assert_eq!(features.test.len(), 3);
        assert!(features
            .train
            .source_indices
            .iter()
            .all(|i| !features.test.source_indices.contains(i)));

        // persisted as a side effect
        assert!(store.contains(&features.transform_ref));
    }

    #[test]
    fn test_labels_follow_rows() {
        let (engineer, _) = engineer();
        let records = corpus();
        let features = engineer.fit_transform(&records, 50, 0.5, 3).unwrap();
        for (pos, &src) in features.train.source_indices.iter().enumerate() {
            assert_eq!(features.train.labels[pos], records[src].label);
        }
    }

    #[test]
    fn test_config_errors() {
        let (engineer, _) = engineer();
        for (vocab, ratio) in [(0, 0.2), (10, 0.0), (10, 1.0), (10, f64::NAN)] {
            let err = engineer.fit_transform(&corpus(), vocab, ratio, 1).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "vocab={vocab} ratio={ratio}");
        }
    }

    #[test]
    fn test_empty_corpus() {
        let (engineer, _) = engineer();
        let err = engineer.fit_transform(&[], 10, 0.2, 1).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus));

        let blank = vec![CorpusRecord::new("   ", Label::Positive)];
        let err = engineer.fit_transform(&blank, 10, 0.2, 1).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus));
    }
}
