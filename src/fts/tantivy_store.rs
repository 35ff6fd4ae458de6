//! Tantivy-backed ephemeral index
//!
//! Provides BM25 full-text search over whole files in a scratch directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tantivy::{
    collector::TopDocs,
    query::{BooleanQuery, Occur, Query, TermQuery},
    schema::{Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT},
    tokenizer::TokenStream,
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term,
};
use tracing::debug;

use super::{IndexFactory, ScoredMatch, SearchIndex};
use crate::error::IndexError;
use crate::file::FileRecord;

/// Writer heap budget
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Written by Tantivy into every index directory
const META_FILE: &str = "meta.json";

/// Opens [`TantivyIndex`] instances
#[derive(Debug, Clone, Copy, Default)]
pub struct TantivyIndexFactory;

impl IndexFactory for TantivyIndexFactory {
    type Index = TantivyIndex;

    fn open(&self, location: &Path) -> Result<TantivyIndex, IndexError> {
        TantivyIndex::open(location)
    }
}

struct Handles {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    dirty: bool,
}

/// Full-text index over file paths and contents
pub struct TantivyIndex {
    location: PathBuf,
    // None once destroyed
    handles: Option<Handles>,
    path_field: Field,
    content_field: Field,
}

impl TantivyIndex {
    /// Create a fresh index at `location`.
    ///
    /// A leftover index at `location` is wiped. Any other non-empty
    /// directory is refused so user data is never deleted.
    pub fn open(location: &Path) -> Result<Self, IndexError> {
        let creation = |source: tantivy::TantivyError| IndexError::Creation {
            location: location.to_path_buf(),
            source: Box::new(source),
        };
        let io_creation = |source: std::io::Error| IndexError::Creation {
            location: location.to_path_buf(),
            source: Box::new(source),
        };

        // A previous run that died before cleanup must not leak into this one
        if location.exists() {
            let is_empty = std::fs::read_dir(location)
                .map_err(io_creation)?
                .next()
                .is_none();
            if !is_empty && !location.join(META_FILE).is_file() {
                return Err(IndexError::Creation {
                    location: location.to_path_buf(),
                    source: "directory exists and is not an index".into(),
                });
            }
            debug!("Removing stale index at {}", location.display());
            std::fs::remove_dir_all(location).map_err(io_creation)?;
        }
        std::fs::create_dir_all(location).map_err(io_creation)?;

        let mut schema_builder = Schema::builder();
        // Path - exact term for replacement, stored for retrieval
        let path_field = schema_builder.add_text_field("path", STRING | STORED);
        // Content - tokenized for BM25
        let content_field = schema_builder.add_text_field("content", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_dir(location, schema).map_err(creation)?;
        let writer = index.writer(WRITER_HEAP_BYTES).map_err(creation)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(creation)?;

        Ok(Self {
            location: location.to_path_buf(),
            handles: Some(Handles {
                index,
                reader,
                writer,
                dirty: false,
            }),
            path_field,
            content_field,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    fn handles(&mut self) -> Result<&mut Handles, IndexError> {
        self.handles
            .as_mut()
            .ok_or_else(|| IndexError::Search("index has been destroyed".into()))
    }

    /// Commit pending writes so the reader sees them
    fn commit(&mut self) -> Result<(), IndexError> {
        let handles = self.handles()?;
        if handles.dirty {
            handles
                .writer
                .commit()
                .map_err(|e| IndexError::Search(Box::new(e)))?;
            handles
                .reader
                .reload()
                .map_err(|e| IndexError::Search(Box::new(e)))?;
            handles.dirty = false;
        }
        Ok(())
    }
}

impl SearchIndex for TantivyIndex {
    fn add(&mut self, record: &FileRecord) -> Result<(), IndexError> {
        let path_field = self.path_field;
        let content_field = self.content_field;
        let handles = self.handles.as_mut().ok_or_else(|| IndexError::Write {
            path: record.path.clone(),
            source: "index has been destroyed".into(),
        })?;

        // One entry per path
        handles
            .writer
            .delete_term(Term::from_field_text(path_field, &record.path));

        let mut doc = TantivyDocument::new();
        doc.add_text(path_field, &record.path);
        doc.add_text(content_field, &record.contents);

        handles
            .writer
            .add_document(doc)
            .map_err(|e| IndexError::Write {
                path: record.path.clone(),
                source: Box::new(e),
            })?;
        handles.dirty = true;
        Ok(())
    }

    fn search(&mut self, query: &str) -> Result<Vec<ScoredMatch>, IndexError> {
        self.commit()?;

        let path_field = self.path_field;
        let content_field = self.content_field;
        let handles = self.handles()?;
        let searcher = handles.reader.searcher();

        let num_docs = searcher.num_docs() as usize;
        if num_docs == 0 {
            return Ok(Vec::new());
        }

        let terms = query_terms(&handles.index, content_field, query)?;
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        // Questions are prose, so any term may match (OR)
        let clauses: Vec<(Occur, Box<dyn Query>)> = terms
            .into_iter()
            .map(|term| {
                let query: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                (Occur::Should, query)
            })
            .collect();
        let parsed_query = BooleanQuery::new(clauses);

        let top_docs = searcher
            .search(&parsed_query, &TopDocs::with_limit(num_docs))
            .map_err(|e| IndexError::Search(Box::new(e)))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| IndexError::Search(Box::new(e)))?;

            if let Some(path) = doc.get_first(path_field).and_then(|v| v.as_str()) {
                results.push(ScoredMatch::new(path, score));
            }
        }

        debug!("Query matched {} of {} files", results.len(), num_docs);
        Ok(results)
    }

    fn destroy(&mut self) -> Result<(), IndexError> {
        let destroy_err = |source: crate::error::BoxError| IndexError::Destroy {
            location: self.location.clone(),
            source,
        };

        if let Some(handles) = self.handles.take() {
            let Handles {
                index,
                reader,
                writer,
                ..
            } = handles;
            // Let merge threads finish before their files disappear
            writer
                .wait_merging_threads()
                .map_err(|e| destroy_err(Box::new(e)))?;
            drop(reader);
            drop(index);
        }

        if self.location.exists() {
            std::fs::remove_dir_all(&self.location).map_err(|e| destroy_err(Box::new(e)))?;
        }
        Ok(())
    }
}

/// Split a question into content terms with the field's own analyzer.
///
/// Bypasses the query grammar: operators, ranges and field prefixes in a
/// question are just words.
fn query_terms(index: &Index, field: Field, query: &str) -> Result<Vec<Term>, IndexError> {
    let mut analyzer = index
        .tokenizer_for_field(field)
        .map_err(|e| IndexError::Search(Box::new(e)))?;

    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    let mut stream = analyzer.token_stream(query);
    while stream.advance() {
        let text = &stream.token().text;
        if seen.insert(text.clone()) {
            terms.push(Term::from_field_text(field, text));
        }
    }
    Ok(terms)
}

impl Drop for TantivyIndex {
    fn drop(&mut self) {
        if self.handles.is_some() || self.location.exists() {
            if let Err(err) = self.destroy() {
                tracing::warn!("{}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(path: &str, contents: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            contents: contents.to_string(),
            token_count: 0,
        }
    }

    fn ids(results: &[ScoredMatch]) -> Vec<&str> {
        results.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_search_ranks_best_file_first() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut index = TantivyIndex::open(&dir.path().join("index"))?;

        index.add(&record("src/main.rs", "fn hello_world() { println!(\"Hello!\"); }"))?;
        index.add(&record("src/config.rs", "struct UserConfig { name: String, age: u32 }"))?;
        index.add(&record(
            "src/processor.rs",
            "fn process_data(data: Vec<u8>) -> Result<()> { process(data) }",
        ))?;

        let results = index.search("hello")?;
        assert_eq!(ids(&results), vec!["src/main.rs"]);

        let results = index.search("Where is UserConfig defined?")?;
        assert_eq!(results[0].id, "src/config.rs");

        let results = index.search("how do we process data")?;
        assert_eq!(results[0].id, "src/processor.rs");

        Ok(())
    }

    #[test]
    fn test_no_match_is_empty_not_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut index = TantivyIndex::open(&dir.path().join("index"))?;
        index.add(&record("a.txt", "alpha beta"))?;

        assert!(index.search("gamma")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_empty_index_returns_nothing() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut index = TantivyIndex::open(&dir.path().join("index"))?;

        assert!(index.search("anything")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_query_syntax_is_plain_text() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut index = TantivyIndex::open(&dir.path().join("index"))?;
        index.add(&record("api.rs", "const API_VERSION: &str = \"2\";"))?;

        let results = index.search("what is (API_VERSION: set to?")?;
        assert_eq!(ids(&results), vec!["api.rs"]);
        Ok(())
    }

    #[test]
    fn test_operators_in_questions_are_words() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut index = TantivyIndex::open(&dir.path().join("index"))?;
        index.add(&record("auth.rs", "fn login and or not in password"))?;
        index.add(&record("buf.rs", "fn read(buf: Vec<u8>) -> usize { buf.len() }"))?;

        for question in [
            "Is x > 3 in login?",
            "does login use a < b",
            "what is IN",
            "login AND",
            "where is x = login",
            "What does AND do",
        ] {
            let results = index.search(question)?;
            assert_eq!(ids(&results), vec!["auth.rs"], "question: {question}");
        }

        let results = index.search("Where is Vec<u8> used?")?;
        assert_eq!(results[0].id, "buf.rs");
        Ok(())
    }

    #[test]
    fn test_punctuation_only_question_matches_nothing() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut index = TantivyIndex::open(&dir.path().join("index"))?;
        index.add(&record("a.txt", "alpha"))?;

        assert!(index.search("?!")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_re_adding_path_replaces_entry() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut index = TantivyIndex::open(&dir.path().join("index"))?;

        index.add(&record("notes.md", "old draft about parsers"))?;
        index.add(&record("notes.md", "final text about parsers"))?;

        let results = index.search("parsers")?;
        assert_eq!(ids(&results), vec!["notes.md"]);
        assert!(index.search("draft")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_open_wipes_stale_state() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let location = dir.path().join("index");

        std::fs::create_dir_all(&location)?;
        std::fs::write(location.join("meta.json"), "not an index")?;

        let mut index = TantivyIndex::open(&location)?;
        index.add(&record("a.txt", "fresh"))?;
        assert_eq!(ids(&index.search("fresh")?), vec!["a.txt"]);
        Ok(())
    }

    #[test]
    fn test_open_refuses_user_directory() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "keep me")?;

        let result = TantivyIndex::open(dir.path());

        assert!(matches!(result, Err(IndexError::Creation { .. })));
        assert_eq!(std::fs::read_to_string(&notes)?, "keep me");
        Ok(())
    }

    #[test]
    fn test_open_reuses_empty_directory() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let location = dir.path().join("index");
        std::fs::create_dir_all(&location)?;

        let index = TantivyIndex::open(&location)?;
        assert_eq!(index.location(), location.as_path());
        Ok(())
    }

    #[test]
    fn test_destroy_removes_location_and_is_idempotent() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let location = dir.path().join("index");
        let mut index = TantivyIndex::open(&location)?;
        index.add(&record("a.txt", "content"))?;
        index.search("content")?;
        assert_eq!(index.location(), location.as_path());

        index.destroy()?;
        assert!(!location.exists());
        index.destroy()?;

        assert!(index.search("content").is_err());
        Ok(())
    }

    #[test]
    fn test_drop_cleans_up() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let location = dir.path().join("index");
        {
            let mut index = TantivyIndex::open(&location)?;
            index.add(&record("a.txt", "content"))?;
        }
        assert!(!location.exists());
        Ok(())
    }
}
