//! stmerge: structured three-way merge of one TypeScript/TSX file.
//!
//! Usage:
//!   stmerge <LEFT> <BASE> <RIGHT> [-o OUT] [--config FILE] [--report FILE]
//
//! Exit status: 0 merged cleanly, 1 merged with conflicts, 2 failure.
//! On a parse failure the caller is expected to fall back to a line-based
//! merge.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use stmerge_core::{AstLanguage, ConflictStyle, MergeConfig, MergeError, merge_files};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Language {
    Ts,
    Tsx,
}

#[derive(Debug, Parser)]
#[command(name = "stmerge", version, about = "Structured three-way merge over syntax trees")]
struct Cli {
    /// Version edited on our side
    left: PathBuf,
    /// Common ancestor
    base: PathBuf,
    /// Version edited on their side
    right: PathBuf,

    /// Write the merged file here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML merge configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Force the source dialect instead of guessing from the extension
    #[arg(long, value_enum)]
    language: Option<Language>,

    /// Write a JSON report of conflicts per declaration
    #[arg(long)]
    report: Option<PathBuf>,

    /// Leave the base segment out of conflict blocks
    #[arg(long)]
    no_base_in_conflicts: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(conflicts) => {
            warn!(conflicts, "merged with conflicts");
            ExitCode::from(1)
        }
        Err(err) => {
            if err.downcast_ref::<MergeError>().is_some_and(MergeError::is_structural) {
                error!("structured merge not possible, fall back to a line-based merge");
            }
            eprintln!("stmerge: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<usize> {
    let mut config = match &cli.config {
        Some(path) => MergeConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MergeConfig::default(),
    };
    if cli.no_base_in_conflicts {
        config.conflict_style = ConflictStyle::Merge;
    }

    let lang = match cli.language {
        Some(Language::Ts) => AstLanguage::TypeScript,
        Some(Language::Tsx) => AstLanguage::Tsx,
        None => match AstLanguage::from_path(&cli.base) {
            Some(lang) => lang,
            None => bail!("cannot tell the language of {}; pass --language", cli.base.display()),
        },
    };

    let res = merge_files(&cli.left, &cli.base, &cli.right, lang, &config)?;

    match &cli.output {
        Some(path) => fs::write(path, res.merged_code.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{}", res.merged_code),
    }

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&res.differences)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(res.conflicts)
}
