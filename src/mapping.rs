//! Folder-name mapping
//!
//! Cloud-sync clients sometimes give the same logical top-level library a
//! different local name on different machines. A mapping table of
//! `local name=stored name` lines unifies them: while backing up, depth-1
//! source folders are stored under the mapped name; while restoring, depth-1
//! manifest folders are written back under the local name.

use crate::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Bidirectional rename table for depth-1 folders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderNameMapping {
    /// local name -> stored name
    entries: BTreeMap<String, String>,
}

impl FolderNameMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from `(local, stored)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Load `key=value` lines from a file
    ///
    /// Keys and values are trimmed. Blank lines are ignored; lines without
    /// exactly one `=` are logged and skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut entries = BTreeMap::new();

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split('=').collect();
            if parts.len() != 2 {
                warn!("Skipping malformed mapping line {} in {:?}: {:?}", index + 1, path, line);
                continue;
            }
            entries.insert(parts[0].trim().to_string(), parts[1].trim().to_string());
        }

        debug!("Loaded {} folder name mappings from {:?}", entries.len(), path);
        Ok(Self { entries })
    }

    /// Whether the mapping has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Stored name for a local folder name, or the name unchanged
    pub fn map<'a>(&'a self, local: &'a str) -> &'a str {
        self.entries.get(local).map(String::as_str).unwrap_or(local)
    }

    /// Local name for a stored folder name, or the name unchanged
    pub fn reverse<'a>(&'a self, stored: &'a str) -> &'a str {
        self.entries
            .iter()
            .find(|(_, v)| v.as_str() == stored)
            .map(|(k, _)| k.as_str())
            .unwrap_or(stored)
    }
}
