//! Command-line interface parsing for llmeval.
//!
//! One subcommand per backend resource, mirroring the console screens.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use llmeval_core::models::{ListParams, DEFAULT_SOURCE_PLATFORM};

/// llmeval - LLM answer evaluation console
#[derive(Parser, Debug)]
#[command(name = "llmeval")]
#[command(about = "Console for the LLM answer evaluation backend")]
#[command(version)]
pub struct Cli {
    /// Backend base URL (overrides config and LLMEVAL_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Overall statistics (cached for five minutes)
    Stats {
        /// Bypass the cache and fetch fresh numbers
        #[arg(long)]
        refresh: bool,

        /// Drop the cached statistics and exit
        #[arg(long, conflicts_with = "refresh")]
        clear_cache: bool,
    },

    /// Dataset versions
    #[command(subcommand)]
    Versions(NamedCommand),

    /// Standard question tags
    #[command(subcommand)]
    Tags(NamedCommand),

    /// Raw questions imported from source platforms
    #[command(subcommand)]
    RawQuestions(RawQuestionsCommand),

    /// Raw answers imported from source platforms
    #[command(subcommand)]
    RawAnswers(RawAnswersCommand),

    /// Standard questions
    #[command(subcommand)]
    StdQuestions(StdQuestionsCommand),

    /// Candidate answers
    #[command(subcommand)]
    CandidateAnswers(CandidateAnswersCommand),

    /// Standard answers
    #[command(subcommand)]
    StdAnswers(StdAnswersCommand),

    /// Evaluation tags
    #[command(subcommand)]
    EvaluationTags(JsonTagCommand),

    /// Evaluation results
    #[command(subcommand)]
    EvaluationResults(EvaluationResultsCommand),

    /// Analysis tags
    #[command(subcommand)]
    AnalysisTags(JsonTagCommand),

    /// Evaluation analysis
    #[command(subcommand)]
    EvaluationAnalysis(EvaluationAnalysisCommand),
}

/// Paging and filters for list commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long)]
    pub page: Option<u32>,

    #[arg(long)]
    pub size: Option<u32>,

    /// Extra query parameter, repeatable (e.g. --filter status=PENDING)
    #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub filters: Vec<(String, String)>,
}

impl ListArgs {
    pub fn to_params(&self) -> ListParams {
        let mut params = ListParams::new();
        if let Some(page) = self.page {
            params.set("page", page);
        }
        if let Some(size) = self.size {
            params.set("size", size);
        }
        for (key, value) in &self.filters {
            params.set(key.as_str(), value);
        }
        params
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

#[derive(Subcommand, Debug)]
pub enum NamedCommand {
    List,
    Create { name: String },
}

#[derive(Subcommand, Debug)]
pub enum JsonTagCommand {
    List,
    /// Create from a JSON file
    Create { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum RawQuestionsCommand {
    List(ListArgs),
    Get { id: i64 },
    Import {
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_SOURCE_PLATFORM)]
        source_platform: String,
    },
    SetStatus { id: i64, status: String },
    /// Answers attached to a raw question
    Answers {
        id: i64,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Standard questions converted from a raw question
    StdQuestions {
        id: i64,
        #[command(flatten)]
        list: ListArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum RawAnswersCommand {
    List(ListArgs),
    Get { id: i64 },
    Import {
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_SOURCE_PLATFORM)]
        source_platform: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum StdQuestionsCommand {
    List(ListArgs),
    Get { id: i64 },
    /// Import from a JSON file
    Import { file: PathBuf },
    AddTag { id: i64, tag: String },
    RemoveTag { id: i64, tag: String },
}

#[derive(Subcommand, Debug)]
pub enum CandidateAnswersCommand {
    List {
        /// Only answers for this standard question
        #[arg(long)]
        question: Option<i64>,
        #[command(flatten)]
        list: ListArgs,
    },
    Import {
        file: PathBuf,
        #[arg(long = "type")]
        kind: String,
    },
    /// Apply a JSON patch file
    Update { id: i64, file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum StdAnswersCommand {
    List {
        /// Only answers for this standard question
        #[arg(long)]
        question: Option<i64>,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Apply a JSON patch file
    Update { id: i64, file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum EvaluationResultsCommand {
    List(ListArgs),
    /// Import from a JSON file
    Import { file: PathBuf },
    /// Write the export to OUTPUT
    Export {
        output: PathBuf,
        #[command(flatten)]
        list: ListArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum EvaluationAnalysisCommand {
    List(ListArgs),
    /// Import from a JSON file
    Import { file: PathBuf },
}
