//! Ephemeral full-text index
//!
//! An index lives for exactly one question: it is opened at a scratch
//! location, filled with every file record, searched once and destroyed
//! before the answer is synthesized. [`IndexGuard`] ties `destroy` to scope
//! so that no exit path can leave the scratch state behind.

mod tantivy_store;

pub use tantivy_store::{TantivyIndex, TantivyIndexFactory};

use std::ops::{Deref, DerefMut};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::IndexError;
use crate::file::FileRecord;

/// A search hit: the file path and its relevance score.
///
/// Scores only compare against other matches from the same query on the
/// same index.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f32,
}

impl ScoredMatch {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Write-then-read-then-discard search index keyed by file path
pub trait SearchIndex {
    /// Add one file record. Adding a path again replaces its entry.
    fn add(&mut self, record: &FileRecord) -> Result<(), IndexError>;

    /// Match `query` against everything added so far.
    ///
    /// No matches is `Ok(vec![])`, not an error. Result order carries no
    /// guarantee for equal scores.
    fn search(&mut self, query: &str) -> Result<Vec<ScoredMatch>, IndexError>;

    /// Release every resource held by the index. Idempotent.
    fn destroy(&mut self) -> Result<(), IndexError>;
}

/// Opens indexes at a scratch location
pub trait IndexFactory {
    type Index: SearchIndex;

    fn open(&self, location: &Path) -> Result<Self::Index, IndexError>;
}

/// Owns an open index and destroys it when dropped.
///
/// Destroy failures are logged, never returned: by the time the guard
/// goes away the invocation is already done with the index.
pub struct IndexGuard<I: SearchIndex> {
    index: I,
    destroyed: bool,
}

impl<I: SearchIndex> IndexGuard<I> {
    pub fn new(index: I) -> Self {
        Self {
            index,
            destroyed: false,
        }
    }

    /// Destroy the index now instead of at end of scope
    pub fn destroy(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        match self.index.destroy() {
            Ok(()) => debug!("Index destroyed"),
            Err(err) => warn!("{}", err),
        }
    }
}

impl<I: SearchIndex> Deref for IndexGuard<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.index
    }
}

impl<I: SearchIndex> DerefMut for IndexGuard<I> {
    fn deref_mut(&mut self) -> &mut I {
        &mut self.index
    }
}

impl<I: SearchIndex> Drop for IndexGuard<I> {
    fn drop(&mut self) {
        self.release();
    }
}
