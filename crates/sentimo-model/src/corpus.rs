//! Labeled corpus loading and cleaning

use regex::Regex;
use sentimo_core::{CorpusRecord, Error, Label, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Column names of the text and label fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusColumns {
    pub text: String,
    pub label: String,
}

impl Default for CorpusColumns {
    fn default() -> Self {
        Self {
            text: "review".to_string(),
            label: "sentiment".to_string(),
        }
    }
}

/// Reads labeled CSV corpora
///
/// Rows with an empty text or label cell are dropped. Text is cleaned of
/// HTML tags and runs of whitespace; any label other than
/// `positive`/`negative`/`1`/`0` is an `Error::InvalidRecord`.
pub struct CorpusLoader {
    columns: CorpusColumns,
    markup: Regex,
    whitespace: Regex,
}

impl CorpusLoader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            columns: CorpusColumns::default(),
            markup: Regex::new(r"<[^>]*>")
                .map_err(|e| Error::internal(format!("Failed to compile markup regex: {e}")))?,
            whitespace: Regex::new(r"\s+")
                .map_err(|e| Error::internal(format!("Failed to compile whitespace regex: {e}")))?,
        })
    }

    /// Read text and labels from different columns
    pub fn with_columns(mut self, columns: CorpusColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Strip markup and normalize whitespace
    pub fn clean(&self, text: &str) -> String {
        let stripped = self.markup.replace_all(text, " ");
        self.whitespace.replace_all(stripped.trim(), " ").into_owned()
    }

    /// Load a corpus from a CSV file
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Vec<CorpusRecord>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let records = self.read(file)?;
        info!("Loaded {} records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Load a corpus from any CSV source with a header row
    pub fn read<R: Read>(&self, source: R) -> Result<Vec<CorpusRecord>> {
        let mut reader = csv::Reader::from_reader(source);

        let headers = reader
            .headers()
            .map_err(|e| Error::invalid_record(format!("Failed to read headers: {e}")))?
            .clone();

        let position = |name: &str| {
            headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
                Error::invalid_record(format!(
                    "missing column '{name}'; available columns: {:?}",
                    headers.iter().collect::<Vec<_>>()
                ))
            })
        };
        let text_idx = position(&self.columns.text)?;
        let label_idx = position(&self.columns.label)?;

        let mut records = Vec::new();
        let mut dropped = 0usize;

        // Line 1 is the header
        for (line, result) in (2..).zip(reader.records()) {
            let row = result
                .map_err(|e| Error::invalid_record(format!("line {line}: {e}")))?;

            let text = row.get(text_idx).map(|t| self.clean(t)).unwrap_or_default();
            let label = row.get(label_idx).map(str::trim).unwrap_or_default();

            if text.is_empty() || label.is_empty() {
                dropped += 1;
                continue;
            }

            let label: Label = label
                .parse()
                .map_err(|e| Error::invalid_record(format!("line {line}: {e}")))?;

            records.push(CorpusRecord::new(text, label));
        }

        if dropped > 0 {
            debug!("Dropped {} rows with missing fields", dropped);
        }
        if records.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> CorpusLoader {
        CorpusLoader::new().unwrap()
    }

    #[test]
    fn test_reads_imdb_layout() {
        let csv = "review,sentiment\n\
                   \"Loved it.<br /><br />Great cast\",positive\n\
                   \"Dull, slow   plot\",negative\n";
        let records = loader().read(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "Loved it. Great cast");
        assert_eq!(records[0].label, Label::Positive);
        assert_eq!(records[1].text, "Dull, slow plot");
        assert_eq!(records[1].label, Label::Negative);
    }

    #[test]
    fn test_accepts_numeric_labels() {
        let csv = "review,sentiment\ngood,1\nbad,0\n";
        let records = loader().read(csv.as_bytes()).unwrap();
        assert_eq!(records[0].label, Label::Positive);
        assert_eq!(records[1].label, Label::Negative);
    }

    #[test]
    fn test_drops_rows_with_missing_fields() {
        let csv = "review,sentiment\n,positive\nfine,\n\"  \",negative\nok,positive\n";
        let records = loader().read(csv.as_bytes()).unwrap();
        assert_eq!(records, vec![CorpusRecord::positive("ok")]);
    }

    #[test]
    fn test_bad_label_is_invalid_record() {
        let csv = "review,sentiment\ngood,positive\nmeh,neutral\n";
        let err = loader().read(csv.as_bytes()).unwrap_err();
        match err {
            Error::InvalidRecord(msg) => assert!(msg.contains("line 3"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_column() {
        let err = loader().read("text,label\na,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));

        let records = loader()
            .with_columns(CorpusColumns {
                text: "text".to_string(),
                label: "label".to_string(),
            })
            .read("text,label\nnice one,1\n".as_bytes())
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_all_rows_dropped_is_empty_corpus() {
        let err = loader().read("review,sentiment\n,positive\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reviews.csv");
        std::fs::write(&path, "review,sentiment\ngreat,positive\n").unwrap();

        assert_eq!(loader().load(&path).unwrap().len(), 1);
        assert!(matches!(
            loader().load(dir.path().join("missing.csv")),
            Err(Error::Io(_))
        ));
    }
}
