//! Document processor: directory walk, text extraction, chunking.
//!
//! Walks the documents directory recursively in sorted order, extracts
//! text from every supported file, and splits it into fixed-size
//! overlapping chunks. Files that cannot be used are collected in
//! [`ProcessedCorpus::skipped`] with a reason; one bad file never aborts
//! the batch.
//!
//! Files are identified by their path relative to the documents directory
//! with `/` separators, so `a/notes.txt` and `b/notes.txt` stay distinct.

use std::collections::BTreeMap;
use std::path::Path;

use docqa_core::chunk::chunk_text;
use docqa_core::models::SkippedFile;
use walkdir::{DirEntry, WalkDir};

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::extract::{extract_text, DocumentFormat};

/// Chunk texts per file plus the files that were skipped.
#[derive(Debug, Default)]
pub struct ProcessedCorpus {
    pub files: BTreeMap<String, Vec<String>>,
    pub skipped: Vec<SkippedFile>,
}

impl ProcessedCorpus {
    pub fn total_chunks(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Process every file under `dir`.
    ///
    /// A missing directory is an error; everything that goes wrong with a
    /// single file is reported in `skipped`.
    pub fn process_directory(&self, dir: &Path) -> Result<ProcessedCorpus> {
        if !dir.is_dir() {
            return Err(Error::bad_request(format!(
                "documents directory does not exist: {}",
                dir.display()
            )));
        }

        let mut corpus = ProcessedCorpus::default();
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let filename = e
                        .path()
                        .map(|p| relative_name(dir, p))
                        .unwrap_or_default();
                    tracing::warn!(%filename, error = %e, "skipping unreadable entry");
                    corpus.skipped.push(SkippedFile {
                        filename,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let filename = relative_name(dir, entry.path());
            match self.process_file(entry.path(), &filename) {
                Ok(chunks) => {
                    tracing::debug!(%filename, chunks = chunks.len(), "processed file");
                    corpus.files.insert(filename, chunks);
                }
                Err(reason) => {
                    tracing::warn!(%filename, %reason, "skipping file");
                    corpus.skipped.push(SkippedFile { filename, reason });
                }
            }
        }

        Ok(corpus)
    }

    /// Extract and chunk one file. The error is the human-readable skip reason.
    pub fn process_file(&self, path: &Path, filename: &str) -> std::result::Result<Vec<String>, String> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| {
            match path.extension().and_then(|e| e.to_str()) {
                Some(ext) => format!("unsupported file type: .{}", ext.to_ascii_lowercase()),
                None => "unsupported file type: (no extension)".to_string(),
            }
        })?;

        let bytes = std::fs::read(path)
            .map_err(|e| Error::extraction(filename, e.to_string()).to_string())?;
        let text = extract_text(&bytes, format)
            .map_err(|e| Error::extraction(filename, e.to_string()).to_string())?;

        if text.trim().is_empty() {
            return Err("no extractable text".to_string());
        }

        Ok(chunk_text(&text, self.chunk_size, self.chunk_overlap))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
