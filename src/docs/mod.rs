//! Generated documentation for a repository or file
//!
//! Markdown mode collects one section per file into a new output document.
//! Inline mode asks for comments keyed by line number and splices them into
//! the source with [`insert_many`], either printing or overwriting the file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{DocsError, SourceError};
use crate::file::{FileRecord, FileSource};
use crate::splice::{insert_many, split_lines};
use crate::synth::Synthesizer;

/// Appended to every inline request, custom prompts included
const INLINE_FORMAT: &str = "Reply only with lines of the form `<line>: <comment>`, where <line> \
is the number of the line the comment belongs above and <comment> uses the file's own comment \
syntax. Do not repeat the code.";

/// Where generated documentation goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocsMode {
    /// Append a `## <path>` section per file to `output`
    Markdown { output: PathBuf },
    /// Splice comments into each file, printing the result unless `overwrite`
    Inline { overwrite: bool },
}

impl DocsMode {
    /// Resolve command-line flags into a mode.
    ///
    /// Inline is the default. Nothing is touched on disk.
    pub fn from_flags(
        markdown: bool,
        inline: bool,
        output: Option<PathBuf>,
        overwrite: bool,
    ) -> Result<Self, DocsError> {
        if markdown && inline {
            return Err(DocsError::ConflictingModes);
        }
        if !markdown {
            if output.is_some() {
                return Err(DocsError::OutputWithoutMarkdown);
            }
            return Ok(DocsMode::Inline { overwrite });
        }
        if overwrite {
            return Err(DocsError::OverwriteInMarkdown);
        }
        let output = output.ok_or(DocsError::MissingOutput)?;
        if output.exists() {
            return Err(DocsError::OutputExists(output));
        }
        Ok(DocsMode::Markdown { output })
    }
}

#[derive(Debug, Clone)]
pub struct DocsConfig {
    pub mode: DocsMode,
    /// Replaces the default instruction for each file
    pub prompt: Option<String>,
}

/// A file that could not be documented
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of a docs run
#[derive(Debug, Default, Clone)]
pub struct DocsReport {
    pub documented: Vec<String>,
    pub failed: Vec<FileFailure>,
}

/// Document every file under `target`, or `target` itself if it is a file.
///
/// Printed output goes to `out`. A failure on one file is logged and
/// recorded in the report; the remaining files are still processed.
pub async fn document<S, Y, W>(
    config: &DocsConfig,
    target: &Path,
    source: &S,
    synthesizer: &Y,
    out: &mut W,
) -> Result<DocsReport, DocsError>
where
    S: FileSource + ?Sized,
    Y: Synthesizer + ?Sized,
    W: Write,
{
    let metadata = std::fs::metadata(target).map_err(|source| SourceError::Read {
        path: target.to_path_buf(),
        source,
    })?;

    let (root, files) = if metadata.is_dir() {
        (Some(target), source.repository(target)?)
    } else {
        (None, vec![source.single_file(target)?])
    };
    debug!("Documenting {} files", files.len());

    let mut report = DocsReport::default();
    for file in &files {
        info!("Documenting file {}", file.path);

        let result = match &config.mode {
            DocsMode::Markdown { output } => {
                markdown_section(config, file, synthesizer)
                    .await
                    .map(|section| append(output, &section))
            }
            DocsMode::Inline { overwrite } => {
                inline_comments(config, file, synthesizer)
                    .await
                    .map(|updated| {
                        if *overwrite {
                            let path = match root {
                                Some(root) => root.join(&file.path),
                                None => target.to_path_buf(),
                            };
                            std::fs::write(&path, updated)
                                .map_err(|source| DocsError::Write { path, source })
                        } else {
                            writeln!(out, "----\n{}\n{}", file.path, updated).map_err(|source| {
                                DocsError::Write {
                                    path: PathBuf::from("<stdout>"),
                                    source,
                                }
                            })
                        }
                    })
            }
        };

        match result {
            Ok(written) => {
                written?;
                report.documented.push(file.path.clone());
            }
            Err(reason) => {
                warn!("Error documenting file {}: {}", file.path, reason);
                report.failed.push(FileFailure {
                    path: file.path.clone(),
                    reason,
                });
            }
        }
    }

    Ok(report)
}

async fn markdown_section<Y>(
    config: &DocsConfig,
    file: &FileRecord,
    synthesizer: &Y,
) -> Result<String, String>
where
    Y: Synthesizer + ?Sized,
{
    let instruction = config.prompt.clone().unwrap_or_else(|| {
        format!(
            "Write markdown documentation for the file {}. Describe its purpose and each public item.",
            file.path
        )
    });

    let docs = synthesizer
        .synthesize(std::slice::from_ref(file), &instruction)
        .await
        .map_err(|e| e.to_string())?;

    Ok(format!("## {}\n\n{}\n\n", file.path, docs.trim()))
}

fn append(output: &Path, section: &str) -> Result<(), DocsError> {
    let write_err = |source| DocsError::Write {
        path: output.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output)
        .map_err(write_err)?;
    file.write_all(section.as_bytes()).map_err(write_err)
}

async fn inline_comments<Y>(
    config: &DocsConfig,
    file: &FileRecord,
    synthesizer: &Y,
) -> Result<String, String>
where
    Y: Synthesizer + ?Sized,
{
    let lines = split_lines(&file.contents);
    let numbered = FileRecord {
        path: file.path.clone(),
        contents: number_lines(&lines),
        token_count: file.token_count,
    };

    let instruction = match &config.prompt {
        Some(prompt) => format!("{prompt}\n\n{INLINE_FORMAT}"),
        None => format!(
            "Write documentation comments for the code in {}.\n\n{INLINE_FORMAT}",
            file.path
        ),
    };

    let reply = synthesizer
        .synthesize(std::slice::from_ref(&numbered), &instruction)
        .await
        .map_err(|e| e.to_string())?;

    let comments = parse_comments(&reply, &lines);
    debug!("{} comments for {}", comments.len(), file.path);

    let indices: Vec<usize> = comments.iter().map(|(line, _)| *line).collect();
    let texts: Vec<&str> = comments.iter().map(|(_, text)| text.as_str()).collect();
    insert_many(&file.contents, &indices, &texts).map_err(|e| e.to_string())
}

/// Prefix each line with its 1-based number
fn number_lines(lines: &[&str]) -> String {
    let width = lines.len().to_string().len();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull `<line>: <comment>` pairs out of a model reply.
///
/// Other lines are ignored. Line numbers outside `lines` are dropped with a
/// warning. The result is sorted by line, keeping reply order within a line,
/// and each comment takes the indentation of the line it documents.
pub fn parse_comments(reply: &str, lines: &[&str]) -> Vec<(usize, String)> {
    let mut comments = Vec::new();

    for entry in reply.lines() {
        let Some((number, comment)) = entry.trim().split_once(':') else {
            continue;
        };
        let Ok(line) = number.trim().parse::<usize>() else {
            continue;
        };
        let comment = comment.trim();
        if comment.is_empty() {
            continue;
        }
        if line < 1 || line > lines.len() {
            warn!("Dropping comment for line {} (file has {} lines)", line, lines.len());
            continue;
        }

        let target = lines[line - 1];
        let indent = &target[..target.len() - target.trim_start().len()];
        comments.push((line, format!("{indent}{comment}")));
    }

    comments.sort_by_key(|(line, _)| *line);
    comments
}
