use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::tokens::Tokenizer;

mod binary;

pub use binary::is_binary;

/// Per-directory ignore file honored in addition to .gitignore
pub const IGNORE_FILENAME: &str = ".codeaskignore";

/// A file loaded for question answering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the repository root, or as given in single-file mode
    pub path: String,
    pub contents: String,
    pub token_count: usize,
}

/// Produces the file records a question is answered from
pub trait FileSource {
    /// All text files under `root`, filtered by ignore rules
    fn repository(&self, root: &Path) -> Result<Vec<FileRecord>, SourceError>;

    /// Exactly one record for `path`
    fn single_file(&self, path: &Path) -> Result<FileRecord, SourceError>;
}

/// Statistics about walked files
#[derive(Debug, Default, Clone)]
pub struct WalkStats {
    pub total_files: usize,
    pub loaded_files: usize,
    pub skipped_binary: usize,
    pub skipped_unreadable: usize,
    pub total_tokens: usize,
}

impl WalkStats {
    pub fn log_summary(&self) {
        info!(
            "Loaded {} of {} files (~{} tokens)",
            self.loaded_files, self.total_files, self.total_tokens
        );
        debug!(
            "Skipped {} binary and {} unreadable files",
            self.skipped_binary, self.skipped_unreadable
        );
    }
}

/// File source that walks a repository and respects .gitignore,
/// .codeaskignore and an optional extra ignore file
pub struct RepoWalker {
    tokenizer: Arc<dyn Tokenizer>,
    respect_gitignore: bool,
    ignore_file: Option<PathBuf>,
}

impl RepoWalker {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            respect_gitignore: true,
            ignore_file: None,
        }
    }

    /// Set whether to respect .gitignore files (default: true)
    pub fn respect_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    /// Extra gitignore-syntax file applied to the whole walk
    pub fn ignore_file(mut self, path: Option<PathBuf>) -> Self {
        self.ignore_file = path;
        self
    }

    /// Walk `root`, returning records sorted by path along with walk stats
    pub fn walk(&self, root: &Path) -> Result<(Vec<FileRecord>, WalkStats), SourceError> {
        let mut records = Vec::new();
        let mut stats = WalkStats::default();

        // Surface a missing root as a read error instead of an empty walk
        std::fs::metadata(root).map_err(|source| SourceError::Read {
            path: root.to_path_buf(),
            source,
        })?;

        debug!("Starting file walk in: {}", root.display());

        let mut builder = WalkBuilder::new(root);
        builder
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .require_git(false)
            .hidden(true)
            .add_custom_ignore_filename(IGNORE_FILENAME);

        if let Some(ignore_file) = &self.ignore_file {
            if let Some(err) = builder.add_ignore(ignore_file) {
                return Err(SourceError::IgnoreFile {
                    path: ignore_file.clone(),
                    source: err,
                });
            }
        }

        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error walking file: {}", err);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            stats.total_files += 1;

            let path = entry.path();
            if is_in_excluded_dir(path.strip_prefix(root).unwrap_or(path)) {
                continue;
            }

            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("Could not read {}: {}", path.display(), err);
                    stats.skipped_unreadable += 1;
                    continue;
                }
            };

            if is_binary(path, &bytes) {
                debug!("Skipping binary file: {}", path.display());
                stats.skipped_binary += 1;
                continue;
            }

            let contents = match String::from_utf8(bytes) {
                Ok(contents) => contents,
                Err(_) => {
                    debug!("Skipping non UTF-8 file: {}", path.display());
                    stats.skipped_unreadable += 1;
                    continue;
                }
            };

            let record = FileRecord {
                path: relative_path(root, path),
                token_count: self.tokenizer.count(&contents),
                contents,
            };

            stats.loaded_files += 1;
            stats.total_tokens += record.token_count;
            records.push(record);
        }

        records.sort_by(|a, b| a.path.cmp(&b.path));
        stats.log_summary();

        Ok((records, stats))
    }
}

impl FileSource for RepoWalker {
    fn repository(&self, root: &Path) -> Result<Vec<FileRecord>, SourceError> {
        let (records, _) = self.walk(root)?;
        Ok(records)
    }

    fn single_file(&self, path: &Path) -> Result<FileRecord, SourceError> {
        let bytes = std::fs::read(path).map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let contents =
            String::from_utf8(bytes).map_err(|_| SourceError::NotText(path.to_path_buf()))?;

        Ok(FileRecord {
            path: path.to_string_lossy().into_owned(),
            token_count: self.tokenizer.count(&contents),
            contents,
        })
    }
}

/// `path` relative to `root`, always `/`-separated
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Vendor, build and VCS directories never worth answering from
fn is_in_excluded_dir(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str().unwrap_or(""),
            "node_modules" | "target" | "dist" | "build" | "out"
                | ".git" | ".svn" | ".hg"
                | "__pycache__" | ".pytest_cache" | ".tox" | "venv" | ".venv"
                | "vendor" | ".bundle"
                | ".gradle" | ".idea" | ".vscode"
                | "coverage" | ".cache"
        )
    })
}
