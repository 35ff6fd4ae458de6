//! Question answering pipeline
//!
//! Directory targets go through the ephemeral index: walk, index, search,
//! destroy, rank, assemble, bound. File targets skip all of that and hand
//! the single file to the synthesizer as-is.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::AskConfig;
use crate::error::{AskError, SourceError};
use crate::file::{FileRecord, FileSource};
use crate::fts::{IndexFactory, IndexGuard, ScoredMatch, SearchIndex};
use crate::search::{assemble, bound_context, rank};
use crate::synth::Synthesizer;

/// An answer and the context it was produced from
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Paths sent to the synthesizer, best match first
    pub files: Vec<String>,
    pub context_tokens: usize,
}

/// Answer `config.query` about `target`, a repository directory or a file
pub async fn ask<S, F, Y>(
    config: &AskConfig,
    target: &Path,
    source: &S,
    factory: &F,
    synthesizer: &Y,
) -> Result<Answer, AskError>
where
    S: FileSource + ?Sized,
    F: IndexFactory + ?Sized,
    Y: Synthesizer + ?Sized,
{
    let context = gather_context(config, target, source, factory)?;

    let files: Vec<String> = context.iter().map(|f| f.path.clone()).collect();
    let context_tokens: usize = context.iter().map(|f| f.token_count).sum();
    debug!(
        "Asking question with {} files (~{} tokens)",
        context.len(),
        context_tokens
    );

    let text = synthesizer.synthesize(&context, &config.query).await?;

    Ok(Answer {
        text,
        files,
        context_tokens,
    })
}

/// Collect the ranked file context for `target` without synthesizing.
///
/// For directories the index has been destroyed by the time this returns,
/// whether or not it succeeded.
pub fn gather_context<S, F>(
    config: &AskConfig,
    target: &Path,
    source: &S,
    factory: &F,
) -> Result<Vec<FileRecord>, AskError>
where
    S: FileSource + ?Sized,
    F: IndexFactory + ?Sized,
{
    let metadata = std::fs::metadata(target).map_err(|source| SourceError::Read {
        path: target.to_path_buf(),
        source,
    })?;

    if !metadata.is_dir() {
        debug!("Single file target, skipping index");
        let record = source.single_file(target)?;
        return Ok(vec![record]);
    }

    debug!("Loading repository files...");
    let files = source.repository(target)?;

    let matches = search_repository(config, &files, factory)?;

    debug!("Sorting {} matches...", matches.len());
    let ranked = rank(matches);
    let context = assemble(&ranked, files)?;

    Ok(bound_context(context, config.max_context_tokens))
}

/// Build a throwaway index over `files` and run the query once
fn search_repository<F>(
    config: &AskConfig,
    files: &[FileRecord],
    factory: &F,
) -> Result<Vec<ScoredMatch>, AskError>
where
    F: IndexFactory + ?Sized,
{
    let location = config.index_location();
    debug!("Creating index at {}", location.display());

    let start = Instant::now();
    let mut index = IndexGuard::new(factory.open(&location)?);

    let pb = if config.verbose {
        ProgressBar::new(files.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░ "),
    );

    for file in files {
        pb.set_message(file.path.clone());
        index.add(file)?;
        pb.inc(1);
    }
    pb.finish_and_clear();
    debug!("Indexed {} files in {:?}", files.len(), start.elapsed());

    debug!("Searching index...");
    let matches = index.search(&config.query)?;

    debug!("Results extracted, destroying index...");
    index.destroy();

    info!("{} of {} files matched the question", matches.len(), files.len());
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthesisError;
    use crate::file::RepoWalker;
    use crate::fts::testing::MockFactory;
    use crate::fts::TantivyIndexFactory;
    use crate::tokens::HeuristicTokenizer;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Records what it was asked and answers with a canned reply
    #[derive(Default)]
    struct RecordingSynthesizer {
        seen: Mutex<Vec<(Vec<String>, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Synthesizer for RecordingSynthesizer {
        async fn synthesize(
            &self,
            context: &[FileRecord],
            question: &str,
        ) -> Result<String, SynthesisError> {
            self.seen.lock().unwrap().push((
                context.iter().map(|f| f.path.clone()).collect(),
                question.to_string(),
            ));
            if self.fail {
                return Err(SynthesisError::Other("model unavailable".to_string()));
            }
            Ok("42".to_string())
        }
    }

    fn walker() -> RepoWalker {
        RepoWalker::new(Arc::new(HeuristicTokenizer))
    }

    fn repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.rs"), "fn a() {}").unwrap();
        fs::write(dir.path().join("src/b.rs"), "fn b() {}").unwrap();
        fs::write(dir.path().join("src/c.rs"), "fn c() {}").unwrap();
        dir
    }

    fn config(dir: &TempDir, query: &str) -> AskConfig {
        AskConfig {
            index_dir: Some(dir.path().join("scratch")),
            ..AskConfig::new(query)
        }
    }

    #[tokio::test]
    async fn test_repository_context_in_rank_order() {
        let dir = repo();
        let factory = MockFactory::returning(vec![
            ScoredMatch::new("src/a.rs", 0.5),
            ScoredMatch::new("src/c.rs", 2.0),
            ScoredMatch::new("src/b.rs", 0.5),
        ]);
        let synth = RecordingSynthesizer::default();

        let answer = ask(&config(&dir, "what?"), dir.path(), &walker(), &factory, &synth)
            .await
            .unwrap();

        assert_eq!(answer.text, "42");
        assert_eq!(answer.files, vec!["src/c.rs", "src/a.rs", "src/b.rs"]);
        assert_eq!(answer.context_tokens, 9);

        let seen = synth.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, vec!["src/c.rs", "src/a.rs", "src/b.rs"]);
        assert_eq!(seen[0].1, "what?");

        let calls = factory.calls.borrow();
        assert_eq!(calls.opened, 1);
        assert_eq!(calls.added, vec!["src/a.rs", "src/b.rs", "src/c.rs"]);
        assert_eq!(calls.searches, 1);
        assert_eq!(calls.destroyed, 1);
    }

    #[tokio::test]
    async fn test_single_file_never_touches_index() {
        let dir = repo();
        let file = dir.path().join("src/b.rs");
        let factory = MockFactory {
            fail_open: true,
            ..MockFactory::default()
        };
        let synth = RecordingSynthesizer::default();

        let answer = ask(&config(&dir, "what?"), &file, &walker(), &factory, &synth)
            .await
            .unwrap();

        assert_eq!(answer.files, vec![file.to_string_lossy().into_owned()]);
        let calls = factory.calls.borrow();
        assert_eq!(calls.opened, 0);
        assert_eq!(calls.searches, 0);
        assert_eq!(calls.destroyed, 0);
    }

    #[test]
    fn test_single_file_is_not_bounded() {
        let dir = repo();
        let file = dir.path().join("src/a.rs");
        let config = AskConfig {
            max_context_tokens: Some(0),
            ..config(&dir, "q")
        };

        let context =
            gather_context(&config, &file, &walker(), &MockFactory::default()).unwrap();

        assert_eq!(context.len(), 1);
        assert_eq!(context[0].contents, "fn a() {}");
    }

    #[tokio::test]
    async fn test_no_matches_stops_before_synthesis() {
        let dir = repo();
        let factory = MockFactory::returning(vec![ScoredMatch::new("gone.rs", 1.0)]);
        let synth = RecordingSynthesizer::default();

        let result = ask(&config(&dir, "what?"), dir.path(), &walker(), &factory, &synth).await;

        assert!(matches!(result, Err(AskError::NoRelevantFiles)));
        assert!(synth.seen.lock().unwrap().is_empty());
        assert_eq!(factory.calls.borrow().destroyed, 1);
    }

    #[test]
    fn test_search_failure_still_destroys() {
        let dir = repo();
        let factory = MockFactory {
            search_error: Some("corrupt segment".to_string()),
            ..MockFactory::default()
        };

        let result = gather_context(&config(&dir, "q"), dir.path(), &walker(), &factory);

        assert!(matches!(result, Err(AskError::Index(_))));
        assert_eq!(factory.calls.borrow().destroyed, 1);
    }

    #[test]
    fn test_write_failure_still_destroys() {
        let dir = repo();
        let factory = MockFactory {
            fail_add: true,
            ..MockFactory::default()
        };

        let result = gather_context(&config(&dir, "q"), dir.path(), &walker(), &factory);

        assert!(matches!(result, Err(AskError::Index(_))));
        let calls = factory.calls.borrow();
        assert_eq!(calls.searches, 0);
        assert_eq!(calls.destroyed, 1);
    }

    #[test]
    fn test_open_failure_is_fatal() {
        let dir = repo();
        let factory = MockFactory {
            fail_open: true,
            ..MockFactory::default()
        };

        let result = gather_context(&config(&dir, "q"), dir.path(), &walker(), &factory);

        assert!(matches!(result, Err(AskError::Index(_))));
        assert_eq!(factory.calls.borrow().destroyed, 0);
    }

    #[test]
    fn test_destroy_failure_is_not_escalated() {
        let dir = repo();
        let factory = MockFactory {
            results: vec![ScoredMatch::new("src/a.rs", 1.0)],
            fail_destroy: true,
            ..MockFactory::default()
        };

        let context =
            gather_context(&config(&dir, "q"), dir.path(), &walker(), &factory).unwrap();

        assert_eq!(context.len(), 1);
        assert_eq!(factory.calls.borrow().destroyed, 1);
    }

    #[test]
    fn test_context_is_bounded_in_repository_mode() {
        let dir = repo();
        let factory = MockFactory::returning(vec![
            ScoredMatch::new("src/a.rs", 3.0),
            ScoredMatch::new("src/b.rs", 2.0),
            ScoredMatch::new("src/c.rs", 1.0),
        ]);
        let config = AskConfig {
            max_context_tokens: Some(6),
            ..config(&dir, "q")
        };

        let context = gather_context(&config, dir.path(), &walker(), &factory).unwrap();

        let paths: Vec<_> = context.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.rs", "src/b.rs"]);
    }

    #[tokio::test]
    async fn test_synthesis_error_passes_through() {
        let dir = repo();
        let factory = MockFactory::returning(vec![ScoredMatch::new("src/a.rs", 1.0)]);
        let synth = RecordingSynthesizer {
            fail: true,
            ..RecordingSynthesizer::default()
        };

        let result = ask(&config(&dir, "q"), dir.path(), &walker(), &factory, &synth).await;

        assert!(matches!(result, Err(AskError::Synthesis(_))));
    }

    #[test]
    fn test_missing_target() {
        let dir = repo();
        let result = gather_context(
            &config(&dir, "q"),
            &dir.path().join("nope"),
            &walker(),
            &MockFactory::default(),
        );
        assert!(matches!(result, Err(AskError::Source(_))));
    }

    #[tokio::test]
    async fn test_end_to_end_with_tantivy() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        fs::create_dir(&repo).unwrap();
        fs::write(
            repo.join("auth.rs"),
            "fn login(user: &str, password: &str) -> bool { check_password(user, password) }",
        )
        .unwrap();
        fs::write(repo.join("math.rs"), "fn add(a: i32, b: i32) -> i32 { a + b }").unwrap();
        fs::write(repo.join("README.md"), "Login uses a password check.").unwrap();

        let scratch = dir.path().join("scratch");
        let config = AskConfig {
            index_dir: Some(scratch.clone()),
            ..AskConfig::new("How does the password login work?")
        };
        let synth = RecordingSynthesizer::default();

        let answer = ask(&config, &repo, &walker(), &TantivyIndexFactory, &synth)
            .await
            .unwrap();

        assert!(answer.files.contains(&"auth.rs".to_string()));
        assert!(!answer.files.contains(&"math.rs".to_string()));
        assert_eq!(
            fs::read_dir(&scratch).unwrap().count(),
            0,
            "index must be destroyed"
        );
    }

    #[tokio::test]
    async fn test_index_dir_contents_survive() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        fs::create_dir(&repo).unwrap();
        fs::write(repo.join("auth.rs"), "fn login(password: &str) {}").unwrap();
        fs::write(repo.join("notes.txt"), "password rotation notes").unwrap();

        // Scratch space pointed at the repository itself
        let config = AskConfig {
            index_dir: Some(repo.clone()),
            ..AskConfig::new("password")
        };
        let synth = RecordingSynthesizer::default();

        let answer = ask(&config, &repo, &walker(), &TantivyIndexFactory, &synth)
            .await
            .unwrap();

        assert_eq!(answer.files.len(), 2);
        assert_eq!(
            fs::read_to_string(repo.join("auth.rs")).unwrap(),
            "fn login(password: &str) {}"
        );
        assert_eq!(
            fs::read_to_string(repo.join("notes.txt")).unwrap(),
            "password rotation notes"
        );
        let entries: Vec<_> = fs::read_dir(&repo)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries.len(), 2, "leftover entries: {entries:?}");
    }
}
