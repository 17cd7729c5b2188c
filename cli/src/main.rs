//! Reducer CLI - binary entry point.
//!
//! # Flow
//!
//! ```text
//! main() -> Args -> inputs + config -> ContextReducer::reduce() -> <name>_reduced.json
//! ```
//!
//! Everything that can fail on bad input (unreadable files, unknown model,
//! missing API key, a prompt too large for the model) fails before the first
//! completion request. The output file is written only after every slice has
//! been answered.

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use reducer_config::{ReducerConfig, resolve_api_key};
use reducer_context::{ContextReducer, ModelRegistry, ReducerSettings, TokenCounter};
use reducer_providers::OpenAIChatClient;
use reducer_types::ModelName;
use reducer_utils::atomic_write;

use crate::args::Args;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries only the final summary.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

/// `.env` in the working directory feeds `OPENAI_API_KEY`. A missing file is fine.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!("Failed to load .env: {err}"),
    }
}

fn resolve_model(flag: Option<&str>, config: Option<&ReducerConfig>) -> Result<ModelName> {
    match flag.or_else(|| config.and_then(ReducerConfig::model)) {
        Some(raw) => ModelName::parse(raw).with_context(|| format!("invalid model name '{raw}'")),
        None => Ok(ModelName::default_model()),
    }
}

fn build_client(config: Option<&ReducerConfig>) -> Result<OpenAIChatClient> {
    let api_key = resolve_api_key(config)?;
    let client = match config.and_then(ReducerConfig::openai_base_url) {
        Some(base_url) => OpenAIChatClient::with_base_url(api_key, base_url),
        None => OpenAIChatClient::new(api_key),
    };
    client.context("building HTTP client")
}

async fn run(args: Args) -> Result<()> {
    let context = args.read_context()?;
    let prompt = args.read_prompt()?;
    let output_path = args.output_path();

    let config = ReducerConfig::load()?;
    let model = resolve_model(args.model.as_deref(), config.as_ref())?;
    let registry = config
        .as_ref()
        .map(ReducerConfig::model_registry)
        .unwrap_or_else(ModelRegistry::new);
    let resolved = registry.get(model.as_str())?;
    tracing::debug!(model = %model, source = ?resolved.source(), "Resolved limit profile");

    let counter = TokenCounter::for_model(model.as_str())?;

    load_dotenv();
    let client = build_client(config.as_ref())?;
    tracing::debug!(endpoint = client.endpoint(), "Using completion endpoint");

    let settings = ReducerSettings {
        model,
        limits: resolved.limits(),
    };
    let reducer = ContextReducer::new(settings, counter, client);
    let reduction = reducer
        .reduce(&context, &prompt)
        .await
        .context("reducing context")?;

    let json = serde_json::to_string_pretty(&reduction.responses)?;
    atomic_write(&output_path, json.as_bytes())
        .with_context(|| format!("writing {}", output_path.display()))?;

    let stats = &reduction.stats;
    println!(
        "Wrote {} responses to {} ({} input tokens, {} output tokens, waited {:.0}s)",
        reduction.responses.len(),
        output_path.display(),
        stats.input_tokens,
        stats.output_tokens,
        stats.total_wait().as_secs_f64(),
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    run(Args::parse()).await
}
