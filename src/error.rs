//! Error types for codeask.

use std::path::PathBuf;

/// Boxed source error carried by index failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the ephemeral full-text index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The index could not be created at its scratch location.
    #[error("failed to create index at {}: {source}", location.display())]
    Creation {
        location: PathBuf,
        #[source]
        source: BoxError,
    },

    /// A file could not be added to the index.
    #[error("failed to index {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: BoxError,
    },

    /// The query could not be parsed or executed.
    #[error("index search failed: {0}")]
    Search(#[source] BoxError),

    /// Resources held by the index could not be released.
    #[error("failed to destroy index at {}: {source}", location.display())]
    Destroy {
        location: PathBuf,
        #[source]
        source: BoxError,
    },
}

/// Errors raised while collecting file records.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A target file or directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A target file is not valid UTF-8 text.
    #[error("{} is not a UTF-8 text file", .0.display())]
    NotText(PathBuf),

    /// The custom ignore file could not be loaded.
    #[error("failed to load ignore file {}: {source}", path.display())]
    IgnoreFile {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },
}

/// Errors raised by the text splicer. Always a caller fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpliceError {
    #[error("line number {line} is out of range (text has {line_count} lines)")]
    InvalidLineNumber { line: usize, line_count: usize },

    #[error("got {indices} indices but {lines} lines to insert")]
    ArgumentMismatch { indices: usize, lines: usize },

    #[error("index {index} is out of bounds (text has {line_count} lines)")]
    IndexOutOfBounds { index: usize, line_count: usize },

    #[error("indices must be in ascending order, but {index} follows {previous}")]
    UnorderedIndices { previous: usize, index: usize },
}

/// Errors from the answer synthesis service.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("synthesis request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("synthesis service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("synthesis service returned no answer")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}

/// Errors that terminate an `ask` invocation.
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// Nothing in the repository matched the question.
    #[error("no relevant files found for the question")]
    NoRelevantFiles,

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// Errors that stop a `docs` run before or between files.
///
/// Failures on a single file are reported per file and never end the run.
#[derive(Debug, thiserror::Error)]
pub enum DocsError {
    #[error("--markdown and --inline cannot be combined")]
    ConflictingModes,

    #[error("--output is only valid in markdown mode")]
    OutputWithoutMarkdown,

    #[error("--overwrite cannot be used in markdown mode")]
    OverwriteInMarkdown,

    #[error("markdown mode needs an --output file")]
    MissingOutput,

    #[error("output file {} already exists", .0.display())]
    OutputExists(PathBuf),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
