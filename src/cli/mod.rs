use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::ask::ask;
use crate::config::{AskConfig, Settings};
use crate::docs::{document, DocsConfig, DocsMode};
use crate::error::AskError;
use crate::file::RepoWalker;
use crate::fts::TantivyIndexFactory;
use crate::splice::{insert_line, insert_many};
use crate::synth::OpenAiSynthesizer;
use crate::tokens::HeuristicTokenizer;

/// Ask questions about a repository or file
#[derive(Parser, Debug)]
#[command(name = "codeask")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question about a file or repository
    Ask {
        /// Repository directory or single file
        path: PathBuf,

        /// The question to ask (prompted for when omitted)
        #[arg(short, long)]
        question: Option<String>,

        /// Path to an extra ignore file (gitignore syntax)
        #[arg(short = 'n', long = "ignore")]
        ignore: Option<PathBuf>,

        /// Index files even if .gitignore excludes them
        #[arg(short = 'g', long)]
        ignore_gitignore: bool,

        /// Parent directory for the temporary index (defaults to the system temp dir)
        #[arg(long)]
        index_dir: Option<PathBuf>,

        /// Token budget for the files sent with the question
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Generate documentation for a repository or file
    Docs {
        /// Repository directory or single file
        path: PathBuf,

        /// Instruction to use instead of the default one
        #[arg(short, long)]
        prompt: Option<String>,

        /// Markdown output file (markdown mode only, must not exist)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to an extra ignore file (gitignore syntax)
        #[arg(short = 'n', long = "ignore")]
        ignore: Option<PathBuf>,

        /// Write one markdown document for all files
        #[arg(short, long)]
        markdown: bool,

        /// Insert comments into the source (default)
        #[arg(short, long)]
        inline: bool,

        /// Overwrite source files instead of printing them (inline mode)
        #[arg(short = 'w', long)]
        overwrite: bool,

        /// Document files even if .gitignore excludes them
        #[arg(short = 'g', long)]
        ignore_gitignore: bool,
    },

    /// Insert lines into a text file at 1-based line numbers
    Insert {
        /// File to insert into
        file: PathBuf,

        /// Line number in the original file (repeatable, ascending)
        #[arg(short, long = "line", required = true)]
        lines: Vec<usize>,

        /// Text to insert, one per --line
        #[arg(short, long = "text", required = true)]
        texts: Vec<String>,

        /// Overwrite the file instead of printing the result
        #[arg(short, long)]
        write: bool,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ask {
            path,
            question,
            ignore,
            ignore_gitignore,
            index_dir,
            max_tokens,
        } => {
            let query = match question {
                Some(q) => q,
                None => prompt_question()?,
            };
            let config = AskConfig {
                query,
                ignore_path: ignore,
                ignore_gitignore,
                verbose: cli.verbose,
                index_dir,
                max_context_tokens: max_tokens,
            };
            run_ask(config, path).await
        }
        Commands::Docs {
            path,
            prompt,
            output,
            ignore,
            markdown,
            inline,
            overwrite,
            ignore_gitignore,
        } => {
            let mode = DocsMode::from_flags(markdown, inline, output, overwrite)?;
            let config = DocsConfig { mode, prompt };
            let source = RepoWalker::new(Arc::new(HeuristicTokenizer))
                .respect_gitignore(!ignore_gitignore)
                .ignore_file(ignore);
            run_docs(config, path, source).await
        }
        Commands::Insert {
            file,
            lines,
            texts,
            write,
        } => run_insert(file, lines, texts, write),
    }
}

/// Exit status for a failed run: 2 when nothing matched the question
pub fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<AskError>() {
        Some(AskError::NoRelevantFiles) => 2,
        _ => 1,
    }
}

/// Print a failed run's error to stderr
pub fn report_error(err: &anyhow::Error) {
    if let Some(AskError::NoRelevantFiles) = err.downcast_ref::<AskError>() {
        eprintln!("{}", "No relevant files found.".red());
        eprintln!("Try rephrasing the question with names that appear in the code.");
    } else {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
    }
}

async fn run_ask(config: AskConfig, path: PathBuf) -> Result<()> {
    let settings = Settings::load()?;
    settings.require_api_key()?;
    let synthesizer = OpenAiSynthesizer::new(&settings)?;

    let source = RepoWalker::new(Arc::new(HeuristicTokenizer))
        .respect_gitignore(!config.ignore_gitignore)
        .ignore_file(config.ignore_path.clone());

    let answer = ask(&config, &path, &source, &TantivyIndexFactory, &synthesizer)
        .await
        .context("Failed to answer question")?;

    if config.verbose {
        println!("{}", "Context files:".bright_cyan());
        for file in &answer.files {
            println!("   {}", file.dimmed());
        }
        println!("   ~{} tokens", answer.context_tokens);
        println!();
    }

    println!("{} {}", "Answer:".bright_green().bold(), answer.text);
    Ok(())
}

async fn run_docs(config: DocsConfig, path: PathBuf, source: RepoWalker) -> Result<()> {
    let settings = Settings::load()?;
    settings.require_api_key()?;
    let synthesizer = OpenAiSynthesizer::new(&settings)?;

    let report = document(&config, &path, &source, &synthesizer, &mut io::stdout())
        .await
        .context("Failed to document files")?;

    if let DocsMode::Markdown { output } = &config.mode {
        println!(
            "{}",
            format!(
                "Documented {} file(s) into {}",
                report.documented.len(),
                output.display()
            )
            .green()
        );
    }
    if !report.failed.is_empty() {
        eprintln!(
            "{}",
            format!("{} file(s) could not be documented:", report.failed.len()).yellow()
        );
        for failure in &report.failed {
            eprintln!("   {} {}", failure.path, failure.reason.dimmed());
        }
    }
    Ok(())
}

fn prompt_question() -> Result<String> {
    println!("Please enter a question: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;

    let question = input.trim_end().to_string();
    if question.trim().is_empty() {
        anyhow::bail!("No question given");
    }
    Ok(question)
}

fn run_insert(file: PathBuf, lines: Vec<usize>, texts: Vec<String>, write: bool) -> Result<()> {
    let original = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let updated = match (lines.as_slice(), texts.as_slice()) {
        ([line], [text]) => insert_line(&original, *line, text)?,
        _ => {
            let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
            insert_many(&original, &lines, &texts)?
        }
    };

    if write {
        std::fs::write(&file, updated)
            .with_context(|| format!("Failed to write {}", file.display()))?;
        println!(
            "{}",
            format!("Inserted {} line(s) into {}", lines.len(), file.display()).green()
        );
    } else {
        print!("{updated}");
    }
    Ok(())
}
