use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Paragraph text in reading order. How it was extracted from its source
/// format is not this crate's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Hex SHA-256 of the paragraphs, stable across loads of the same text.
    pub id: String,
    pub paragraphs: Vec<String>,
}

impl Document {
    pub fn new(paragraphs: Vec<String>) -> Self {
        let mut hasher = Sha256::new();
        for paragraph in &paragraphs {
            hasher.update(paragraph.as_bytes());
            hasher.update([0u8]);
        }
        let id: String = hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();

        Self { id, paragraphs }
    }

    /// Splits plain text into paragraphs at blank lines. Lines within a
    /// paragraph are joined with single spaces.
    pub fn from_text(text: &str) -> Self {
        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                if !current.is_empty() {
                    paragraphs.push(current.join(" "));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            paragraphs.push(current.join(" "));
        }

        Self::new(paragraphs)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document {path:?}"))?;
        Ok(Self::from_text(&text))
    }

    pub fn paragraph(&self, index: usize) -> Option<&str> {
        self.paragraphs.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}
