//! Turning raw text files into [`Document`]s.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// File extensions picked up when loading a corpus directory.
const CORPUS_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// How a source text is partitioned into logical documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSplit {
    /// One document per sentence (terminated by `.`, `!` or `?` plus whitespace).
    #[default]
    Sentence,
    /// One document per blank-line separated paragraph.
    Paragraph,
    /// The whole text is one document.
    Whole,
}

impl FromStr for DocumentSplit {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sentence" => Ok(Self::Sentence),
            "paragraph" => Ok(Self::Paragraph),
            "whole" => Ok(Self::Whole),
            other => Err(RagError::ConfigError(format!(
                "unknown document split '{other}' (expected sentence, paragraph or whole)"
            ))),
        }
    }
}

impl fmt::Display for DocumentSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sentence => "sentence",
            Self::Paragraph => "paragraph",
            Self::Whole => "whole",
        })
    }
}

/// Partition `text` into documents tagged with `source`.
///
/// Document ids are `{source}#{n}`; blank parts are skipped.
pub fn documents_from_text(text: &str, source: &str, split: DocumentSplit) -> Vec<Document> {
    let text = text.replace("\r\n", "\n");
    let parts: Vec<&str> = match split {
        DocumentSplit::Whole => vec![text.as_str()],
        DocumentSplit::Paragraph => text.split("\n\n").collect(),
        DocumentSplit::Sentence => split_sentences(&text),
    };

    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .enumerate()
        .map(|(n, part)| {
            Document::new(format!("{source}#{n}"), part)
                .with_metadata("source", source)
                .with_source_uri(source)
        })
        .collect()
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
        if at_boundary {
            let end = i + c.len_utf8();
            sentences.push(&text[start..end]);
            start = end;
        }
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Load documents from a text file or from every `.txt`/`.md` file under a directory.
///
/// Directory entries are visited in sorted path order so the resulting corpus
/// (and any index built from it) is deterministic.
///
/// # Errors
///
/// Returns [`RagError::Io`] if the path, a directory under it or a file
/// cannot be read. Symlinks are followed; a symlink cycle is an error.
pub fn load_corpus(path: impl AsRef<Path>, split: DocumentSplit) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let files = if path.is_dir() { corpus_files(path)? } else { vec![path.to_path_buf()] };

    let mut documents = Vec::new();
    for file in files {
        let text = std::fs::read_to_string(&file)?;
        let source = file.display().to_string();
        let parsed = documents_from_text(&text, &source, split);
        debug!(source = %source, document_count = parsed.len(), "loaded corpus file");
        documents.extend(parsed);
    }
    Ok(documents)
}

fn corpus_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| {
            warn!(root = %root.display(), error = %e, "cannot walk corpus directory");
            std::io::Error::from(e)
        })?;
        let is_corpus_file = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| CORPUS_EXTENSIONS.contains(&ext));
        if is_corpus_file {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}
