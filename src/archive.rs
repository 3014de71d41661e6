//! Bulk import of message history exported as JSON lines.
//!
//! Each non-blank line holds one [`Message`] object. Importing only fills the archive;
//! the corpus is rebuilt from it with [`crate::retrain`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::info;
use rayon::prelude::*;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::ImportConfig;
use crate::error::{MarkovError, Result};
use crate::message::Message;
use crate::store::insert_message;

/// Counts produced by [`import_messages`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSummary {
    /// Messages offered for import.
    pub seen: usize,
    /// Messages newly archived; the rest were already present.
    pub inserted: usize,
}

/// Discovers archive files rooted at the provided input paths.
///
/// Directories are traversed recursively by default; set [`ImportConfig::recursive`] to `false`
/// to limit discovery to the first level. Files are returned sorted per input so imports are
/// reproducible.
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P], cfg: &ImportConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(MarkovError::InvalidConfig(format!(
                "input path {path:?} does not exist"
            )));
        }
        let metadata = path
            .symlink_metadata()
            .map_err(|err| MarkovError::io(err, Some(path.to_path_buf())))?;
        if metadata.is_dir() {
            let depth = if cfg.recursive { usize::MAX } else { 1 };
            let walker = WalkDir::new(path)
                .follow_links(cfg.follow_symlinks)
                .max_depth(depth)
                .sort_by_file_name();
            for entry in walker {
                let entry = entry.map_err(|err| MarkovError::Internal(err.to_string()))?;
                if entry.file_type().is_file() {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(MarkovError::InvalidConfig(
            "no files discovered in provided inputs".into(),
        ));
    }
    Ok(files)
}

/// Parses one JSON-lines archive file, skipping blank lines.
pub fn read_messages(path: &Path) -> Result<Vec<Message>> {
    let file = File::open(path).map_err(|err| MarkovError::io(err, Some(path.to_path_buf())))?;
    let mut messages = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|err| MarkovError::io(err, Some(path.to_path_buf())))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let message = serde_json::from_str(trimmed).map_err(|err| MarkovError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            message: err.to_string(),
        })?;
        messages.push(message);
    }
    Ok(messages)
}

/// Parses every archive file under `inputs`, in parallel, preserving file order.
pub fn load_archive<P: AsRef<Path>>(inputs: &[P], cfg: &ImportConfig) -> Result<Vec<Message>> {
    let paths = collect_paths(inputs, cfg)?;
    let per_file: Vec<Vec<Message>> = paths
        .par_iter()
        .map(|path| read_messages(path))
        .collect::<Result<_>>()?;
    let messages: Vec<Message> = per_file.into_iter().flatten().collect();
    info!(
        "loaded {} messages from {} archive files",
        messages.len(),
        paths.len()
    );
    Ok(messages)
}

/// Archives `messages` in one transaction. Ids already present are left untouched.
pub fn import_messages<'a, I>(conn: &mut Connection, messages: I) -> Result<ImportSummary>
where
    I: IntoIterator<Item = &'a Message>,
{
    let tx = conn.transaction()?;
    let mut summary = ImportSummary::default();
    for message in messages {
        summary.seen += 1;
        if insert_message(&tx, message)? {
            summary.inserted += 1;
        }
    }
    tx.commit()?;
    info!(
        "imported {} new messages ({} already archived)",
        summary.inserted,
        summary.seen - summary.inserted
    );
    Ok(summary)
}
