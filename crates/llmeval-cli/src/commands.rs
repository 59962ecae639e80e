//! Executes parsed commands against the backend and prints the results.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use llmeval_core::api::STATISTICS_CACHE_KEY;
use llmeval_core::cache::{FileStore, TimedCache};
use llmeval_core::models::UploadFile;
use llmeval_core::stores::CommonStore;
use llmeval_core::{ApiClient, Config};

use crate::cli::{
    CandidateAnswersCommand, Command, EvaluationAnalysisCommand, EvaluationResultsCommand,
    JsonTagCommand, NamedCommand, RawAnswersCommand, RawQuestionsCommand, StdAnswersCommand,
    StdQuestionsCommand,
};

pub async fn run(command: Command, config: &Config) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    debug!(base_url = %client.base_url(), "Using backend");

    match command {
        Command::Stats {
            refresh,
            clear_cache,
        } => stats(&client, config, refresh, clear_cache).await,
        Command::Versions(cmd) => versions(client, cmd).await,
        Command::Tags(cmd) => tags(client, cmd).await,
        Command::RawQuestions(cmd) => raw_questions(&client, cmd).await,
        Command::RawAnswers(cmd) => raw_answers(&client, cmd).await,
        Command::StdQuestions(cmd) => std_questions(&client, cmd).await,
        Command::CandidateAnswers(cmd) => candidate_answers(&client, cmd).await,
        Command::StdAnswers(cmd) => std_answers(&client, cmd).await,
        Command::EvaluationTags(cmd) => {
            let handle = client.evaluation_tags();
            match cmd {
                JsonTagCommand::List => print_json(&handle.list().await?),
                JsonTagCommand::Create { file } => print_json(&handle.create(&read_json(&file)?).await?),
            }
        }
        Command::EvaluationResults(cmd) => evaluation_results(&client, cmd).await,
        Command::AnalysisTags(cmd) => {
            let handle = client.analysis_tags();
            match cmd {
                JsonTagCommand::List => print_json(&handle.list().await?),
                JsonTagCommand::Create { file } => print_json(&handle.create(&read_json(&file)?).await?),
            }
        }
        Command::EvaluationAnalysis(cmd) => {
            let handle = client.evaluation_analysis();
            match cmd {
                EvaluationAnalysisCommand::List(list) => print_json(&handle.list(&list.to_params()).await?),
                EvaluationAnalysisCommand::Import { file } => {
                    print_json(&handle.import(&read_json(&file)?).await?)
                }
            }
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {} as JSON", path.display()))
}

async fn stats(client: &ApiClient, config: &Config, refresh: bool, clear_cache: bool) -> Result<()> {
    let cache = TimedCache::new(FileStore::new(config.cache_dir()?));
    let statistics = client.statistics();

    if clear_cache {
        statistics.clear_cache(&cache);
        eprintln!("Statistics cache cleared");
        return Ok(());
    }

    // A zero TTL forces a fetch but leaves the old entry in place if it fails
    let ttl = if refresh {
        Duration::ZERO
    } else {
        config.statistics_ttl()
    };

    let previous = cache.peek(STATISTICS_CACHE_KEY);
    let value = statistics.overall_cached(&cache, ttl).await?;

    match cache.peek(STATISTICS_CACHE_KEY) {
        Some(entry) if Some(&entry) == previous.as_ref() => {
            eprintln!("(cached {})", entry.age_display(cache.now_millis()));
        }
        _ => info!("Fetched fresh statistics"),
    }

    print_json(&value)
}

async fn versions(client: ApiClient, cmd: NamedCommand) -> Result<()> {
    match cmd {
        // Straight to the endpoint: the store swallows fetch errors
        NamedCommand::List => print_json(&client.versions().list().await?),
        NamedCommand::Create { name } => {
            let mut store = CommonStore::new(client);
            print_json(&store.create_version(&name).await?)
        }
    }
}

async fn tags(client: ApiClient, cmd: NamedCommand) -> Result<()> {
    match cmd {
        NamedCommand::List => print_json(&client.tags().list().await?),
        NamedCommand::Create { name } => {
            let mut store = CommonStore::new(client);
            print_json(&store.create_tag(&name).await?)
        }
    }
}

async fn raw_questions(client: &ApiClient, cmd: RawQuestionsCommand) -> Result<()> {
    let handle = client.raw_questions();
    let value = match cmd {
        RawQuestionsCommand::List(list) => handle.list(&list.to_params()).await?,
        RawQuestionsCommand::Get { id } => handle.get(id).await?,
        RawQuestionsCommand::Import {
            file,
            source_platform,
        } => {
            let upload = UploadFile::from_path(&file)?;
            handle.import(&upload, &source_platform).await?
        }
        RawQuestionsCommand::SetStatus { id, status } => handle.update_status(id, &status).await?,
        RawQuestionsCommand::Answers { id, list } => handle.answers(id, &list.to_params()).await?,
        RawQuestionsCommand::StdQuestions { id, list } => {
            handle.standard_questions(id, &list.to_params()).await?
        }
    };
    print_json(&value)
}

async fn raw_answers(client: &ApiClient, cmd: RawAnswersCommand) -> Result<()> {
    let handle = client.raw_answers();
    let value = match cmd {
        RawAnswersCommand::List(list) => handle.list(&list.to_params()).await?,
        RawAnswersCommand::Get { id } => handle.get(id).await?,
        RawAnswersCommand::Import {
            file,
            source_platform,
        } => {
            let upload = UploadFile::from_path(&file)?;
            handle.import(&upload, &source_platform).await?
        }
    };
    print_json(&value)
}

async fn std_questions(client: &ApiClient, cmd: StdQuestionsCommand) -> Result<()> {
    let handle = client.standard_questions();
    let value = match cmd {
        StdQuestionsCommand::List(list) => handle.list(&list.to_params()).await?,
        StdQuestionsCommand::Get { id } => handle.get(id).await?,
        StdQuestionsCommand::Import { file } => handle.import(&read_json(&file)?).await?,
        StdQuestionsCommand::AddTag { id, tag } => handle.add_tag(id, &tag).await?,
        StdQuestionsCommand::RemoveTag { id, tag } => handle.remove_tag(id, &tag).await?,
    };
    print_json(&value)
}

async fn candidate_answers(client: &ApiClient, cmd: CandidateAnswersCommand) -> Result<()> {
    let handle = client.candidate_answers();
    let value = match cmd {
        CandidateAnswersCommand::List { question, list } => match question {
            Some(id) => handle.for_question(id, &list.to_params()).await?,
            None => handle.list(&list.to_params()).await?,
        },
        CandidateAnswersCommand::Import { file, kind } => {
            let upload = UploadFile::from_path(&file)?;
            handle.import(&upload, &kind).await?
        }
        CandidateAnswersCommand::Update { id, file } => handle.update(id, &read_json(&file)?).await?,
    };
    print_json(&value)
}

async fn std_answers(client: &ApiClient, cmd: StdAnswersCommand) -> Result<()> {
    let handle = client.standard_answers();
    let value = match cmd {
        StdAnswersCommand::List { question, list } => match question {
            Some(id) => handle.for_question(id, &list.to_params()).await?,
            None => handle.list(&list.to_params()).await?,
        },
        StdAnswersCommand::Update { id, file } => handle.update(id, &read_json(&file)?).await?,
    };
    print_json(&value)
}

async fn evaluation_results(client: &ApiClient, cmd: EvaluationResultsCommand) -> Result<()> {
    let handle = client.evaluation_results();
    match cmd {
        EvaluationResultsCommand::List(list) => print_json(&handle.list(&list.to_params()).await?),
        EvaluationResultsCommand::Import { file } => print_json(&handle.import(&read_json(&file)?).await?),
        EvaluationResultsCommand::Export { output, list } => {
            let bytes = handle.export(&list.to_params()).await?;
            std::fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write export to {}", output.display()))?;
            eprintln!("Wrote {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }
    }
}
