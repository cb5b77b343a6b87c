//! Command line client for driving Llama Stack agent turns
//!
//! `ask` runs a full agent turn, answering retrieval tool calls locally and
//! resuming the turn until it completes. The remaining subcommands expose the
//! retrieval, chat and model endpoints directly.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use llama_turn_core::config::{ConfigLoader, LlamaTurnConfig};
use llama_turn_core::{LlamaStackClient, StackApi, TurnDriver, TurnOutcome};
use llama_turn_types::{
    rag_toolgroup, AgentConfig, ChatCompletionRequest, ChatMessage, Message, QueryConfig,
    RagQueryRequest,
};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

const DEFAULT_PROMPT: &str = "Who is Dora's owner?";

#[derive(Parser, Debug)]
#[clap(author, version, about = "llama-turn - Drive Llama Stack agent turns from the command line")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, global = true, default_value = "llama-turn.yaml", help = "Configuration file; defaults are used when it does not exist")]
    config: String,

    #[clap(long, global = true, help = "Llama Stack base URL, overriding the configuration")]
    base_url: Option<String>,

    #[clap(long, short, global = true, help = "Log level (error, warn, info, debug, trace)")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an agent turn, resolving retrieval tool calls locally
    Ask {
        prompt: Option<String>,

        #[clap(long, help = "Use an existing agent instead of creating one")]
        agent_id: Option<String>,

        #[clap(long, requires = "agent_id", help = "Use an existing session of the agent")]
        session_id: Option<String>,
    },
    /// Query the RAG tool runtime directly
    Query { prompt: Option<String> },
    /// Run a chat completion against the configured model
    Chat {
        prompt: Option<String>,

        #[clap(long, help = "Stream the completion as it is generated")]
        stream: bool,

        #[clap(long, help = "Model identifier, overriding the configuration")]
        model: Option<String>,
    },
    /// List the models registered with the server
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::from_file_or_default(&cli.config)
        .await
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    if let Some(base_url) = cli.base_url {
        config.server.base_url = base_url;
        config.validate()?;
    }

    let log_level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_level_filter = log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    log::info!("Using Llama Stack at {}", config.server.base_url);
    let client = Arc::new(LlamaStackClient::from_config(&config.server));

    match cli.command {
        Commands::Ask {
            prompt,
            agent_id,
            session_id,
        } => {
            let prompt = prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string());
            let outcome = ask(&client, &config, &prompt, agent_id, session_id).await?;
            println!("{}", outcome.answer);
            log::info!(
                "Turn {} completed in {} round(s), {} tool response(s) sent",
                outcome.turn.turn_id,
                outcome.rounds,
                outcome.tool_responses_sent
            );
            Ok(())
        }
        Commands::Query { prompt } => {
            let prompt = prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string());
            query(&client, &config, prompt).await
        }
        Commands::Chat {
            prompt,
            stream,
            model,
        } => {
            let prompt = prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string());
            let model = model.unwrap_or_else(|| config.agent.model.clone());
            chat(&client, model, prompt, stream).await
        }
        Commands::Models => {
            let models = client.list_models().await.context("Failed to list models")?;
            for model in models {
                println!(
                    "{}\t{}",
                    model.identifier,
                    model.model_type.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
    }
}

async fn ask(
    client: &Arc<LlamaStackClient>,
    config: &LlamaTurnConfig,
    prompt: &str,
    agent_id: Option<String>,
    session_id: Option<String>,
) -> Result<TurnOutcome> {
    let (agent_id, created_agent) = match agent_id {
        Some(id) => (id, false),
        None => {
            let agent_config = AgentConfig {
                model: config.agent.model.clone(),
                instructions: config.agent.instructions.clone(),
                name: Some(config.agent.name.clone()),
                description: None,
                toolgroups: vec![rag_toolgroup(&config.rag.vector_db_ids)],
                tool_choice: None,
                max_infer_iters: Some(config.agent.max_infer_iters),
            };
            let id = client
                .create_agent(&agent_config)
                .await
                .context("Failed to create agent")?;
            (id, true)
        }
    };

    let result = run_in_session(client, config, prompt, &agent_id, session_id).await;

    if created_agent {
        if let Err(e) = client.delete_agent(&agent_id).await {
            log::warn!("Failed to delete agent {}: {}", agent_id, e);
        }
    }

    result
}

async fn run_in_session(
    client: &Arc<LlamaStackClient>,
    config: &LlamaTurnConfig,
    prompt: &str,
    agent_id: &str,
    session_id: Option<String>,
) -> Result<TurnOutcome> {
    let session_id = match session_id {
        Some(id) => id,
        None => {
            let session_name = format!("llama-turn-{}", uuid::Uuid::new_v4());
            client
                .create_session(agent_id, &session_name)
                .await
                .context("Failed to create session")?
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling turn");
            on_interrupt.cancel();
        }
    });

    let driver = TurnDriver::from_config(client.clone(), config);
    let outcome = driver
        .run_turn_with_cancel(agent_id, &session_id, vec![Message::user(prompt)], &cancel)
        .await
        .context("Agent turn failed")?;
    Ok(outcome)
}

async fn query(client: &LlamaStackClient, config: &LlamaTurnConfig, prompt: String) -> Result<()> {
    let query_config = config.rag.query_config.clone().unwrap_or(QueryConfig {
        max_chunks: Some(5),
        max_tokens_in_context: Some(1000),
        mode: Some("vector".to_string()),
    });
    let request = RagQueryRequest {
        content: prompt,
        vector_db_ids: config.rag.vector_db_ids.clone(),
        query_config: Some(query_config),
    };

    let result = client
        .query_rag(&request)
        .await
        .context("RAG query failed")?;

    if result.content.is_empty() {
        println!("{}", config.rag.empty_result_text);
    }
    for (i, item) in result.content.iter().enumerate() {
        if let Some(text) = &item.text {
            println!("Item {}: {}", i + 1, text);
        }
    }
    Ok(())
}

async fn chat(client: &LlamaStackClient, model: String, prompt: String, stream: bool) -> Result<()> {
    let request = ChatCompletionRequest {
        model,
        messages: vec![ChatMessage::new("user", prompt)],
        stream,
        temperature: None,
        max_tokens: None,
    };

    if !stream {
        let response = client
            .chat_completion(&request)
            .await
            .context("Chat completion failed")?;
        println!("{}", response.text().unwrap_or_default());
        return Ok(());
    }

    let mut deltas = client
        .chat_completion_stream(&request)
        .await
        .context("Chat completion failed")?;
    let mut stdout = std::io::stdout();
    while let Some(delta) = deltas.next().await {
        write!(stdout, "{}", delta?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
