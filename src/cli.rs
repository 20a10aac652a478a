//! Command-line interface for promptsplit.
//!
//! Three subcommands: `run` executes the full pipeline against the configured
//! LLM endpoint, while `chunk` and `stats` work offline on the chunker alone.

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use promptsplit_config::Config;
use promptsplit_engine::{Pipeline, StageEnv, split};
use promptsplit_llm::{ChatBackend, Retrier, RetryPolicy};

/// promptsplit - decompose a large prompt into subsystems, sub-prompts, code,
/// and agent DSL
#[derive(Parser)]
#[command(name = "promptsplit")]
#[command(about = "Split a monolithic LLM prompt into cooperating sub-prompts")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the full seven-stage pipeline over a prompt file
    Run {
        /// Prompt file to process
        input: Utf8PathBuf,

        /// Directory for stage artifacts and result.json
        #[arg(long)]
        output_dir: Option<Utf8PathBuf>,

        /// Minimum chunk length in characters before line-boundary extension
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Concurrent in-flight LLM calls during batch stages
        #[arg(long)]
        workers: Option<usize>,

        /// Skip the code generation stage
        #[arg(long)]
        no_codegen: bool,
    },

    /// Split a prompt file into chunks without calling the LLM
    Chunk {
        /// Prompt file to split
        input: Utf8PathBuf,

        /// Minimum chunk length in characters before line-boundary extension
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Print chunk bodies instead of a summary
        #[arg(long)]
        text: bool,
    },

    /// Print chunking statistics for a prompt file as JSON
    Stats {
        /// Prompt file to measure
        input: Utf8PathBuf,

        /// Minimum chunk length in characters before line-boundary extension
        #[arg(long)]
        chunk_size: Option<usize>,
    },
}

/// Parse arguments and dispatch.
///
/// # Errors
///
/// Returns an error for configuration, input, or pipeline failures; the
/// binary maps it to a non-zero exit code.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = crate::logging::init_tracing(cli.verbose) {
        eprintln!("warning: could not initialize logging: {err}");
    }

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Run {
            input,
            output_dir,
            chunk_size,
            workers,
            no_codegen,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(size) = chunk_size {
                config.chunk_size = size;
            }
            if let Some(count) = workers {
                config.max_workers = count;
            }
            if no_codegen {
                config.codegen.enabled = false;
            }
            config.validate().context("validating configuration")?;
            run_pipeline(&config, &input).await
        }
        Command::Chunk {
            input,
            chunk_size,
            text,
        } => {
            let source = read_input(&input)?;
            print_chunks(&source, chunk_size.unwrap_or(config.chunk_size), text)
        }
        Command::Stats { input, chunk_size } => {
            let source = read_input(&input)?;
            let stats = chunk_stats(&source, chunk_size.unwrap_or(config.chunk_size))?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

async fn run_pipeline(config: &Config, input: &Utf8Path) -> Result<()> {
    let text = read_input(input)?;
    let backend = ChatBackend::new_from_config(config).context("constructing LLM backend")?;
    let retrier = Retrier::new(Arc::new(backend), RetryPolicy::from_config(&config.retry));
    let pipeline =
        Pipeline::new(StageEnv::new(retrier, config)).with_artifact_dir(&config.output_dir);

    info!(input = %input, output_dir = %config.output_dir, "starting pipeline");
    let report = pipeline.run(text).await;

    if let Some((stage, message)) = &report.failed {
        bail!("pipeline halted in {stage}: {message}");
    }
    println!(
        "pipeline complete: {} stages, {} subsystems, {} sub-prompts, {} DSL conversions skipped",
        report.completed.len(),
        report.context.subsystems.len(),
        report.context.subprompts.len(),
        report.dsl_skipped,
    );
    if let Some(path) = &report.result_path {
        println!("result written to {path}");
    }
    Ok(())
}

fn print_chunks(source: &str, chunk_size: usize, text: bool) -> Result<()> {
    let chunks = split(source, chunk_size)?;
    if text {
        for (index, chunk) in chunks.iter().enumerate() {
            println!("----- chunk {index} ({} chars) -----", chunk.chars().count());
            println!("{chunk}");
        }
    } else {
        for (index, chunk) in chunks.iter().enumerate() {
            println!(
                "chunk {index}: {} chars, {} lines",
                chunk.chars().count(),
                chunk.lines().count()
            );
        }
        println!("{} chunks", chunks.len());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ChunkStats {
    chars: usize,
    lines: usize,
    words: usize,
    paragraphs: usize,
    chunk_size: usize,
    chunk_count: usize,
    min_chunk_chars: usize,
    max_chunk_chars: usize,
    mean_chunk_chars: usize,
}

fn chunk_stats(source: &str, chunk_size: usize) -> Result<ChunkStats> {
    let chunks = split(source, chunk_size)?;
    let sizes: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
    let total: usize = sizes.iter().sum();
    Ok(ChunkStats {
        chars: source.chars().count(),
        lines: source.lines().count(),
        words: source.split_whitespace().count(),
        paragraphs: source
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count(),
        chunk_size,
        chunk_count: chunks.len(),
        min_chunk_chars: sizes.iter().copied().min().unwrap_or(0),
        max_chunk_chars: sizes.iter().copied().max().unwrap_or(0),
        mean_chunk_chars: if sizes.is_empty() { 0 } else { total / sizes.len() },
    })
}

fn read_input(path: &Utf8Path) -> Result<String> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading input file {path}"))?;
    if text.trim().is_empty() {
        bail!("input file {path} is empty");
    }
    Ok(text)
}
