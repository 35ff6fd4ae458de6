pub mod ask;
pub mod cli;
pub mod config;
pub mod docs;
pub mod error;
pub mod file;
pub mod fts;
pub mod search;
pub mod splice;
pub mod synth;
pub mod tokens;

// Re-export commonly used types
pub use ask::{ask, gather_context, Answer};
pub use config::{AskConfig, Settings};
pub use docs::{document, DocsConfig, DocsMode, DocsReport};
pub use error::{AskError, DocsError, IndexError, SourceError, SpliceError, SynthesisError};
pub use file::{FileRecord, FileSource, RepoWalker};
pub use fts::{IndexFactory, IndexGuard, ScoredMatch, SearchIndex, TantivyIndex, TantivyIndexFactory};
pub use splice::{insert_line, insert_many, line_count, split_lines};
pub use synth::{OpenAiSynthesizer, Synthesizer};
pub use tokens::{HeuristicTokenizer, Tokenizer};
