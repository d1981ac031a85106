//! Subcommand handlers. Each one prints a single JSON document to stdout.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Serialize;
use tokio::io::AsyncReadExt;

use vecfuse_types::Document;
use vecfuse_vector::{
    BackendKind, ClientConfig, Execution, FilterTranslator, FusionOptions, ModalityFailurePolicy, ReadyClient,
    RuntimeSettings, SearchRequest, VectorClient,
};

use crate::cli::{CollectionsAction, Command};

pub(crate) async fn run(command: Command, settings: &RuntimeSettings) -> anyhow::Result<()> {
    let config = settings
        .client_config()
        .context("invalid vecfuse settings")?;

    match command {
        Command::Translate { expression, policy } => {
            let translator =
                FilterTranslator::with_default_extensions(config.default_extensions.iter().cloned());
            match policy {
                Some(policy) => emit(&translator.translate_with_policy(&expression, policy.into())?),
                None => emit(&translator.translate(&expression)),
            }
        }
        Command::Collections { action } => run_collections(action, config).await,
        Command::Insert { collection, input } => {
            let documents = read_documents(&input).await?;
            let client = connect(config).await?;
            client.insert(&collection, &documents).await?;
            tracing::info!(
                collection = %collection,
                count = documents.len(),
                "inserted documents"
            );
            emit(&serde_json::json!({ "inserted": documents.len() }))
        }
        Command::Delete { collection, ids } => {
            let client = connect(config).await?;
            client.delete(&collection, &ids).await?;
            emit(&serde_json::json!({ "deleted": ids }))
        }
        Command::Query {
            collection,
            filter,
            limit,
        } => {
            let client = connect(config).await?;
            emit(&client.query(&collection, filter.as_deref(), limit).await?)
        }
        Command::Search {
            collection,
            vector,
            limit,
            filter,
        } => {
            let client = connect(config).await?;
            emit(
                &client
                    .search(&collection, vector, limit, filter.as_deref())
                    .await?,
            )
        }
        Command::Hybrid {
            collection,
            vector,
            text,
            fetch,
            limit,
            filter,
            fallback,
            degrade,
            concurrent,
            timeout_ms,
        } => {
            let fetch = fetch.unwrap_or(limit);
            let mut requests = Vec::new();
            if let Some(vector) = vector {
                requests.push(SearchRequest::dense(vector, fetch));
            }
            if let Some(text) = text {
                requests.push(SearchRequest::lexical(text, fetch));
            }
            if requests.is_empty() {
                bail!("hybrid search needs --vector, --text, or both");
            }

            let mut fusion = config.fusion;
            if degrade {
                fusion = fusion.with_failure_policy(ModalityFailurePolicy::Degrade);
            }
            if concurrent {
                fusion = fusion.with_execution(Execution::Concurrent);
            }
            if let Some(ms) = timeout_ms.filter(|ms| *ms > 0) {
                fusion = fusion.with_timeout(Duration::from_millis(ms));
            }
            let client = connect(config.with_fusion(fusion)).await?;

            // Without --fallback the client's configured policy applies.
            let mut options = FusionOptions::new(limit);
            if let Some(fallback) = fallback {
                options = options.with_fallback(fallback.into());
            }
            if let Some(filter) = filter {
                options = options.with_filter(filter);
            }
            emit(&client.hybrid_search(&collection, &requests, &options).await?)
        }
    }
}

async fn run_collections(
    action: CollectionsAction,
    mut config: ClientConfig,
) -> anyhow::Result<()> {
    match action {
        CollectionsAction::List => {
            let client = connect(config).await?;
            emit(&client.list_collections().await?)
        }
        CollectionsAction::Create { name, dimension } => {
            if let Some(dimension) = dimension {
                config.dimension = dimension;
            }
            let client = connect(config).await?;
            client.create_collection(&name).await?;
            emit(&serde_json::json!({ "created": name, "dimension": client.dimension() }))
        }
        CollectionsAction::Drop { name } => {
            let client = connect(config).await?;
            client.drop_collection(&name).await?;
            emit(&serde_json::json!({ "dropped": name }))
        }
    }
}

async fn connect(config: ClientConfig) -> anyhow::Result<ReadyClient> {
    // Each invocation is its own process, so an in-memory store would start empty every time.
    if config.backend == BackendKind::Memory {
        bail!(
            "the memory backend does not persist between vecfuse invocations; \
             set `backend.kind: lance` in settings.yaml"
        );
    }
    let client = VectorClient::new(config)?;
    tracing::debug!(backend = ?client.config().backend, "connecting");
    Ok(client.connect().await?)
}

async fn read_documents(input: &Path) -> anyhow::Result<Vec<Document>> {
    let raw = if input.as_os_str() == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("failed to read documents from stdin")?;
        raw
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("failed to read {}", input.display()))?
    };
    parse_documents(&raw)
}

fn parse_documents(raw: &str) -> anyhow::Result<Vec<Document>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Document>(line)
                .with_context(|| format!("invalid document on line {}", index + 1))
        })
        .collect()
}

fn emit<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
