//! Blocked-word list with atomic whole-set reload.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;

/// Used when no word list is configured or the file cannot be read at startup.
pub const FALLBACK_BLOCKED_WORDS: &[&str] = &[
    "sex", "porn", "xxx", "drug", "kill", "hate", "fuck", "shit", "damn",
];

/// An immutable set of blocked tokens.
///
/// Each word is stored lower-cased together with its repeat-squeezed form
/// (`"kill"` → `"kil"`) so obfuscated spellings such as `kiiill` can be caught.
#[derive(Debug, Default, Clone)]
pub struct BlockedWordSet {
    words: HashSet<String>,
    squeezed: HashSet<String>,
}

impl BlockedWordSet {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if word.is_empty() {
                continue;
            }
            set.squeezed.insert(squeeze_repeats(&word));
            set.words.insert(word);
        }
        set
    }

    /// Parse a word list: one token per line, `#` starts a comment line.
    pub fn parse(contents: &str) -> Self {
        Self::new(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::parse(&contents))
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_BLOCKED_WORDS.iter())
    }

    /// Exact lookup of an already lower-cased token.
    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    /// Lookup of a repeat-squeezed token.
    pub fn contains_squeezed(&self, squeezed: &str) -> bool {
        self.squeezed.contains(squeezed)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Collapse every run of the same character to a single character.
pub fn squeeze_repeats(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut last = None;
    for c in token.chars() {
        if last != Some(c) {
            out.push(c);
        }
        last = Some(c);
    }
    out
}

/// Shared handle to the current [`BlockedWordSet`].
///
/// Readers take a snapshot once per request; a reload swaps the whole `Arc`
/// so an in-flight request never sees a partially updated list.
#[derive(Debug, Clone)]
pub struct BlocklistHandle {
    current: Arc<RwLock<Arc<BlockedWordSet>>>,
    source: Option<PathBuf>,
}

impl BlocklistHandle {
    pub fn new(set: BlockedWordSet) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(set))),
            source: None,
        }
    }

    /// Load the configured list at startup.
    ///
    /// With no path, or a path that cannot be read, the built-in fallback list
    /// is used and a warning is logged. Later reloads keep using `path`.
    pub fn load(path: Option<&Path>) -> Self {
        let set = match path {
            Some(path) => match BlockedWordSet::from_file(path) {
                Ok(set) => {
                    info!(path = %path.display(), words = set.len(), "Loaded blocked word list");
                    set
                }
                Err(e) => {
                    warn!(path = %path.display(), "Could not load blocked word list: {}", e);
                    BlockedWordSet::fallback()
                }
            },
            None => {
                info!("No blocked word list configured, using built-in list");
                BlockedWordSet::fallback()
            }
        };

        Self {
            current: Arc::new(RwLock::new(Arc::new(set))),
            source: path.map(Path::to_path_buf),
        }
    }

    /// Current set. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<BlockedWordSet> {
        self.current.read().clone()
    }

    /// Replace the whole set.
    pub fn swap(&self, set: BlockedWordSet) {
        *self.current.write() = Arc::new(set);
    }

    /// Re-read the source file and swap it in. On error the previous set stays
    /// active.
    pub fn reload(&self) -> Result<usize> {
        let Some(path) = &self.source else {
            return Ok(self.snapshot().len());
        };
        let set = BlockedWordSet::from_file(path)?;
        let count = set.len();
        self.swap(set);
        info!(path = %path.display(), words = count, "Reloaded blocked word list");
        Ok(count)
    }
}

impl Default for BlocklistHandle {
    fn default() -> Self {
        Self::new(BlockedWordSet::fallback())
    }
}
