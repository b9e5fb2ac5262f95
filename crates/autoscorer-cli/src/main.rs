//! AutoScorer CLI — command-line interface over the Workspace Manager,
//! Registry, Executor fleet, Scheduler and Async Task Adapter (spec §6).
//! Every subcommand prints one JSON envelope to stdout and exits 0 on
//! success, non-zero otherwise.

mod envelope;
mod runtime;

use autoscorer_core::{Config, ErrorBlock, ErrorCode, Stage, WorkspaceManager};
use autoscorer_queue::{Action, CallbackClient, QueueAdapter, SubmitRequest};
use clap::{Parser, Subcommand};
use runtime::Runtime;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "autoscorer")]
#[command(about = "Run and score containerized evaluation jobs")]
#[command(version)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workspace's meta.json and layout without executing it
    Validate {
        workspace: PathBuf,
    },
    /// Execute a workspace's container/process, without scoring
    Run {
        workspace: PathBuf,
        #[arg(long)]
        executor: Option<String>,
    },
    /// Run a scorer against an already-produced output/
    Score {
        workspace: PathBuf,
        #[arg(long)]
        scorer: Option<String>,
        #[arg(long)]
        params: Option<String>,
    },
    /// Validate, execute, and score in one call, persisting result.json
    Pipeline {
        workspace: PathBuf,
        #[arg(long)]
        executor: Option<String>,
        #[arg(long)]
        scorer: Option<String>,
        #[arg(long)]
        params: Option<String>,
    },
    /// Submit a workspace to the async task queue
    Submit {
        workspace: PathBuf,
        #[arg(long)]
        action: String,
        #[arg(long)]
        executor: Option<String>,
        #[arg(long)]
        params: Option<String>,
        #[arg(long)]
        callback_url: Option<String>,
    },
    /// Inspect and manage the scorer registry
    Scorers {
        #[command(subcommand)]
        command: ScorerCommands,
    },
    /// Inspect the layered configuration store
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ScorerCommands {
    /// List every registered scorer
    List,
    /// Load a scorer plugin library, optionally hot-reloading on change
    Load {
        path: PathBuf,
        #[arg(long)]
        watch: bool,
    },
    /// Re-load a previously loaded scorer plugin library
    Reload {
        path: PathBuf,
    },
    /// Run a scorer against a workspace without going through the Scheduler
    Test {
        name: String,
        workspace: PathBuf,
        #[arg(long)]
        params: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print every recognized key and its effective value
    Show,
    /// Same as `show`, kept as a separate verb to match spec §6's naming
    Dump,
    /// Check the effective configuration for invalid values
    Validate,
    /// Print the config file search path, in precedence order
    Paths,
}

fn parse_params(raw: Option<&str>) -> Result<Option<serde_json::Map<String, serde_json::Value>>, ErrorBlock> {
    let Some(raw) = raw else { return Ok(None) };
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ErrorBlock::new(ErrorCode::BadFormat, Stage::Validation, format!("--params is not valid JSON: {e}")))?;
    match value {
        serde_json::Value::Object(map) => Ok(Some(map)),
        _ => Err(ErrorBlock::new(ErrorCode::BadFormat, Stage::Validation, "--params must be a JSON object")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let exit_code = match cli.command {
        Commands::Validate { workspace } => cmd_validate(&workspace),
        Commands::Run { workspace, executor } => cmd_run(&workspace, executor.as_deref()).await,
        Commands::Score { workspace, scorer, params } => cmd_score(&workspace, scorer.as_deref(), params.as_deref()).await,
        Commands::Pipeline { workspace, executor, scorer, params } => {
            cmd_pipeline(&workspace, executor.as_deref(), scorer.as_deref(), params.as_deref()).await
        }
        Commands::Submit { workspace, action, executor, params, callback_url } => {
            cmd_submit(&workspace, &action, executor.as_deref(), params.as_deref(), callback_url).await
        }
        Commands::Scorers { command } => cmd_scorers(command).await,
        Commands::Config { command } => cmd_config(command),
    };

    std::process::exit(exit_code);
}

fn cmd_validate(workspace: &Path) -> i32 {
    let ctx = envelope::ctx("workspace", workspace.display().to_string());
    match WorkspaceManager::validate(workspace) {
        Ok(spec) => envelope::success(serde_json::to_value(&spec).unwrap_or(serde_json::Value::Null), ctx),
        Err(e) => envelope::error(e, ctx),
    }
}

async fn cmd_run(workspace: &Path, executor: Option<&str>) -> i32 {
    let ctx = envelope::ctx("workspace", workspace.display().to_string());
    let runtime = Runtime::build(Config::load()).await;
    let report = runtime.scheduler.run(workspace, executor).await;
    if report.is_success() {
        envelope::success(serde_json::to_value(&report).unwrap_or(serde_json::Value::Null), ctx)
    } else {
        envelope::error(report.error.unwrap_or_else(unhandled), ctx)
    }
}

async fn cmd_score(workspace: &Path, scorer: Option<&str>, params: Option<&str>) -> i32 {
    let ctx = envelope::ctx("workspace", workspace.display().to_string());
    let params = match parse_params(params) {
        Ok(p) => p,
        Err(e) => return envelope::error(e, ctx),
    };
    let runtime = Runtime::build(Config::load()).await;
    let result = runtime.scheduler.score(workspace, scorer, params.as_ref()).await;
    if result.is_success() {
        envelope::success(serde_json::to_value(&result).unwrap_or(serde_json::Value::Null), ctx)
    } else {
        envelope::error(result.error.unwrap_or_else(unhandled), ctx)
    }
}

async fn cmd_pipeline(workspace: &Path, executor: Option<&str>, scorer: Option<&str>, params: Option<&str>) -> i32 {
    let ctx = envelope::ctx("workspace", workspace.display().to_string());
    let params = match parse_params(params) {
        Ok(p) => p,
        Err(e) => return envelope::error(e, ctx),
    };
    let runtime = Runtime::build(Config::load()).await;
    let result = runtime.scheduler.pipeline(workspace, scorer, executor, params.as_ref()).await;
    if result.is_success() {
        envelope::success(serde_json::to_value(&result).unwrap_or(serde_json::Value::Null), ctx)
    } else {
        envelope::error(result.error.unwrap_or_else(unhandled), ctx)
    }
}

async fn cmd_submit(workspace: &Path, action: &str, executor: Option<&str>, params: Option<&str>, callback_url: Option<String>) -> i32 {
    let ctx = envelope::ctx("workspace", workspace.display().to_string());
    let action = match Action::from_str(action) {
        Ok(a) => a,
        Err(e) => return envelope::error(ErrorBlock::new(ErrorCode::InvalidValue, Stage::Validation, e), ctx),
    };
    let params = match parse_params(params) {
        Ok(p) => p,
        Err(e) => return envelope::error(e, ctx),
    };

    let runtime = Runtime::build(Config::load()).await;
    let broker = match runtime.config.get_str("TASK_BROKER") {
        Some(url) => autoscorer_queue::JetStreamProducer::connect(url).await.ok(),
        None => None,
    };
    let callback = CallbackClient::new(autoscorer_scheduler::RetryPolicy::default());
    let adapter = Arc::new(QueueAdapter::new(Arc::clone(&runtime.scheduler), callback, broker));

    let response = adapter
        .submit(SubmitRequest {
            workspace: workspace.to_path_buf(),
            action,
            params,
            executor: executor.map(str::to_string),
            callback_url,
        })
        .await;

    let mut data = serde_json::Map::new();
    data.insert("task_id".to_string(), serde_json::Value::String(response.task_id.to_string()));
    data.insert("deduped".to_string(), serde_json::Value::Bool(response.deduped));
    if let Some(record) = adapter.status(response.task_id) {
        data.insert("status".to_string(), serde_json::to_value(&record.status).unwrap());
    }

    envelope::success(serde_json::Value::Object(data), ctx)
}

async fn cmd_scorers(command: ScorerCommands) -> i32 {
    let runtime = Runtime::build(Config::load()).await;
    match command {
        ScorerCommands::List => {
            let listing = runtime.registry.list();
            envelope::success(serde_json::to_value(&listing).unwrap_or(serde_json::Value::Null), serde_json::Map::new())
        }
        ScorerCommands::Load { path, watch } => {
            let ctx = envelope::ctx("path", path.display().to_string());
            match runtime.registry.load_file(&path, watch) {
                Ok(names) => envelope::success(serde_json::json!({ "loaded": names }), ctx),
                Err(e) => envelope::error(plugin_error_block(e), ctx),
            }
        }
        ScorerCommands::Reload { path } => {
            let ctx = envelope::ctx("path", path.display().to_string());
            match runtime.registry.reload_file(&path) {
                Ok(names) => envelope::success(serde_json::json!({ "loaded": names }), ctx),
                Err(e) => envelope::error(plugin_error_block(e), ctx),
            }
        }
        ScorerCommands::Test { name, workspace, params } => {
            let ctx = envelope::ctx("workspace", workspace.display().to_string());
            let params = match parse_params(params.as_deref()) {
                Ok(p) => p.unwrap_or_default(),
                Err(e) => return envelope::error(e, ctx),
            };
            let Some(entry) = runtime.registry.get(&name) else {
                return envelope::error(
                    ErrorBlock::new(ErrorCode::ScorerNotFound, Stage::Scoring, format!("no scorer registered under {name:?}")),
                    ctx,
                );
            };
            match entry.implementation.score(&workspace, &params) {
                Ok(result) => envelope::success(serde_json::to_value(&result).unwrap_or(serde_json::Value::Null), ctx),
                Err(e) => envelope::error(e, ctx),
            }
        }
    }
}

fn cmd_config(command: ConfigCommands) -> i32 {
    let config = Config::load();
    match command {
        ConfigCommands::Show | ConfigCommands::Dump => {
            let dump: std::collections::BTreeMap<_, _> =
                config.dump().into_iter().map(|(k, v)| (k, config_value_to_json(&v))).collect();
            envelope::success(serde_json::to_value(dump).unwrap_or(serde_json::Value::Null), serde_json::Map::new())
        }
        ConfigCommands::Validate => {
            let problems = validate_config(&config);
            if problems.is_empty() {
                envelope::success(serde_json::json!({ "valid": true }), serde_json::Map::new())
            } else {
                envelope::error(
                    ErrorBlock::new(ErrorCode::ConfigValidationError, Stage::Config, problems.join("; ")),
                    serde_json::Map::new(),
                )
            }
        }
        ConfigCommands::Paths => {
            let paths: Vec<String> =
                autoscorer_core::config::search_paths().into_iter().map(|p| p.display().to_string()).collect();
            envelope::success(serde_json::json!({ "search_path": paths }), serde_json::Map::new())
        }
    }
}

fn validate_config(config: &Config) -> Vec<String> {
    let mut problems = Vec::new();
    if config.get_str("DEFAULT_EXECUTOR").and_then(|s| s.parse::<autoscorer_executor::ExecutorKind>().ok()).is_none() {
        problems.push("DEFAULT_EXECUTOR is not one of local/container/cluster".to_string());
    }
    if config.get_str("IMAGE_PULL_POLICY").and_then(|s| s.parse::<autoscorer_executor::PullPolicy>().ok()).is_none() {
        problems.push("IMAGE_PULL_POLICY is not one of always/if-not-present/never".to_string());
    }
    if config.get_str("DEFAULT_MEMORY").map(autoscorer_core::size::parse_memory).transpose().is_err() {
        problems.push("DEFAULT_MEMORY is not a valid size (expected e.g. 1Gi)".to_string());
    }
    if config.get_str("MEMORY_THRESHOLD").map(autoscorer_core::size::parse_memory).transpose().is_err() {
        problems.push("MEMORY_THRESHOLD is not a valid size (expected e.g. 16Gi)".to_string());
    }
    if config.get_float("DEFAULT_CPU").map(|v| v <= 0.0).unwrap_or(true) {
        problems.push("DEFAULT_CPU must be > 0".to_string());
    }
    if config.get_int("METRICS_PORT").map(|v| !(1..=65535).contains(&v)).unwrap_or(true) {
        problems.push("METRICS_PORT must be a valid port number".to_string());
    }
    problems
}

fn config_value_to_json(value: &autoscorer_core::ConfigValue) -> serde_json::Value {
    use autoscorer_core::ConfigValue::*;
    match value {
        Str(s) => serde_json::Value::String(s.clone()),
        Int(i) => serde_json::json!(i),
        Float(f) => serde_json::json!(f),
        Bool(b) => serde_json::Value::Bool(*b),
        List(l) => serde_json::json!(l),
    }
}

fn plugin_error_block(e: autoscorer_registry::RegistryError) -> ErrorBlock {
    ErrorBlock::new(ErrorCode::BadFormat, Stage::Config, e.to_string())
}

fn unhandled() -> ErrorBlock {
    ErrorBlock::new(ErrorCode::UnhandledError, Stage::System, "operation failed with no error detail")
}
