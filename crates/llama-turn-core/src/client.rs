//! HTTP client for the Llama Stack API
//!
//! [`StackApi`] is the narrow surface the turn driver depends on: open a
//! turn stream, resume one, and run a retrieval query. [`LlamaStackClient`]
//! implements it over `reqwest` and adds the supplemental agent, session,
//! model and chat endpoints used by the CLI.

use std::pin::Pin;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::stream::{Stream, TryStreamExt};
use llama_turn_types::{
    AgentConfig, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse,
    CreateAgentRequest, CreateAgentResponse, CreateSessionRequest, CreateSessionResponse, Model,
    ModelList, RagQueryRequest, RagQueryResult, TurnCreateRequest, TurnResumeRequest,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;

use crate::config::ServerConfig;
use crate::errors::{Result, TurnError};

/// A streamed response body, readable line by line.
pub type EventBody = Pin<Box<dyn AsyncBufRead + Send>>;

/// Boxed stream of chat completion text deltas.
pub type ChatDeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Operations the turn driver needs from the server.
#[async_trait]
pub trait StackApi: Send + Sync {
    /// Start a streamed turn. The returned body is only produced for a 2xx response.
    async fn create_turn(
        &self,
        agent_id: &str,
        session_id: &str,
        request: &TurnCreateRequest,
    ) -> Result<EventBody>;

    /// Resume a turn that is awaiting tool responses.
    async fn resume_turn(
        &self,
        agent_id: &str,
        session_id: &str,
        turn_id: &str,
        request: &TurnResumeRequest,
    ) -> Result<EventBody>;

    /// Run a retrieval query against the RAG tool runtime.
    async fn query_rag(&self, request: &RagQueryRequest) -> Result<RagQueryResult>;
}

/// `reqwest` client for a Llama Stack server
#[derive(Clone)]
pub struct LlamaStackClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    api_key: Option<String>,
}

impl LlamaStackClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(120),
            api_key: None,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let client = Self::new(config.base_url.clone()).with_timeout(config.timeout());
        match &config.auth.api_key {
            Some(key) => client.with_api_key(key.clone()),
            None => client,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url).timeout(self.timeout);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(Method::POST, path).json(body).send().await?;
        decode_json(check_status(response).await?).await
    }

    async fn open_stream<B>(&self, path: &str, body: &B) -> Result<EventBody>
    where
        B: Serialize + Sync + ?Sized,
    {
        let response = self
            .request(Method::POST, path)
            .header("Accept", "text/event-stream")
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(body_reader(response))
    }

    /// Register an agent and return its id.
    pub async fn create_agent(&self, agent_config: &AgentConfig) -> Result<String> {
        let request = CreateAgentRequest {
            agent_config: agent_config.clone(),
        };
        let response: CreateAgentResponse = self.post_json("/v1/agents", &request).await?;
        log::info!("Created agent {}", response.agent_id);
        Ok(response.agent_id)
    }

    pub async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        let path = format!("/v1/agents/{}", agent_id);
        let response = self.request(Method::DELETE, &path).send().await?;
        check_status(response).await?;
        log::info!("Deleted agent {}", agent_id);
        Ok(())
    }

    /// Open a session on an agent and return its id.
    pub async fn create_session(&self, agent_id: &str, session_name: &str) -> Result<String> {
        let path = format!("/v1/agents/{}/session", agent_id);
        let request = CreateSessionRequest {
            session_name: session_name.to_string(),
        };
        let response: CreateSessionResponse = self.post_json(&path, &request).await?;
        log::info!("Created session {} on agent {}", response.session_id, agent_id);
        Ok(response.session_id)
    }

    pub async fn list_models(&self) -> Result<Vec<Model>> {
        let response = self.request(Method::GET, "/v1/models").send().await?;
        let models: ModelList = decode_json(check_status(response).await?).await?;
        Ok(models.data)
    }

    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let mut request = request.clone();
        request.stream = false;
        self.post_json("/v1/openai/v1/chat/completions", &request)
            .await
    }

    /// Stream a chat completion, yielding content deltas until `[DONE]`.
    pub async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatDeltaStream> {
        let mut request = request.clone();
        request.stream = true;
        let body = self
            .open_stream("/v1/openai/v1/chat/completions", &request)
            .await?;
        Ok(Box::pin(chat_deltas(body)))
    }
}

#[async_trait]
impl StackApi for LlamaStackClient {
    async fn create_turn(
        &self,
        agent_id: &str,
        session_id: &str,
        request: &TurnCreateRequest,
    ) -> Result<EventBody> {
        let path = format!("/v1/agents/{}/session/{}/turn", agent_id, session_id);
        self.open_stream(&path, request).await
    }

    async fn resume_turn(
        &self,
        agent_id: &str,
        session_id: &str,
        turn_id: &str,
        request: &TurnResumeRequest,
    ) -> Result<EventBody> {
        let path = format!(
            "/v1/agents/{}/session/{}/turn/{}/resume",
            agent_id, session_id, turn_id
        );
        self.open_stream(&path, request).await
    }

    async fn query_rag(&self, request: &RagQueryRequest) -> Result<RagQueryResult> {
        self.post_json("/v1/tool-runtime/rag-tool/query", request)
            .await
    }
}

/// Turn a non-success response into `HttpStatus`, keeping the body text.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(TurnError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| TurnError::Decode(format!("{}: {}", e, text)))
}

fn body_reader(response: Response) -> EventBody {
    let stream = response.bytes_stream().map_err(std::io::Error::other);
    Box::pin(StreamReader::new(stream))
}

fn chat_deltas<R>(reader: R) -> impl Stream<Item = Result<String>> + Send
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut lines = reader.lines();
    try_stream! {
        while let Some(line) = lines.next_line().await? {
            let data = match crate::sse::data_field(&line) {
                Some(data) => data,
                None => continue,
            };
            if data == "[DONE]" {
                break;
            }
            match serde_json::from_str::<ChatCompletionChunk>(data) {
                Ok(chunk) => {
                    if let Some(text) = chunk.delta_text() {
                        yield text.to_string();
                    }
                }
                Err(e) => log::warn!("Skipping undecodable chat chunk ({}): {}", e, data),
            }
        }
    }
}
