use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use docent_protocol::{ChatMessage, ContentType};

pub fn crate_name() -> &'static str {
    "docent-cli"
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "docent-cli",
    version,
    about = "Docent command line client",
    long_about = "Docent command line client for chatting against the gateway, ingesting documentation, and inspecting sessions"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "http://127.0.0.1:8080",
        help = "Gateway base HTTP URL"
    )]
    pub server: String,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Ask a single question in a fresh or existing session")]
    Ask {
        #[arg(help = "The question to ask")]
        query: String,
        #[arg(long, help = "Session id to continue (defaults to a fresh session)")]
        session: Option<String>,
    },
    #[command(about = "Ingest documentation sections from a JSON file")]
    Ingest {
        #[arg(help = "Path to a JSON array of {title, content, url?, contentType?}")]
        path: PathBuf,
    },
    #[command(about = "Semantic search over ingested documentation")]
    Search {
        #[arg(help = "Search query")]
        query: String,
        #[arg(long, default_value_t = 10, help = "Maximum number of results")]
        limit: usize,
    },
    #[command(about = "Show aggregate stats for a session")]
    Stats {
        #[arg(help = "Session id")]
        session: String,
    },
    #[command(about = "Delete a session and all its state")]
    ClearSession {
        #[arg(help = "Session id")]
        session: String,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("file error: {0}")]
    File(String),
    #[error("http transport error: {0}")]
    HttpTransport(String),
    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("json decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct CliClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatTurnRequest<'a> {
    session_id: &'a str,
    history: &'a [ChatMessage],
    query: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnReply {
    pub session_id: String,
    pub answer: String,
    pub sources: Vec<SourceReply>,
    pub usage: UsageReply,
    pub context_compacted: bool,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReply {
    pub title: String,
    pub url: Option<String>,
    pub content_type: ContentType,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReply {
    pub system_tokens: usize,
    pub history_tokens: usize,
    pub documentation_tokens: usize,
    pub query_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionUpload {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Serialize)]
struct IngestRequest {
    sections: Vec<SectionUpload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestReply {
    pub indexed: usize,
    pub ids: Vec<uuid::Uuid>,
}

#[derive(Debug, Clone, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchReply {
    pub query: String,
    pub results: Vec<SearchResultReply>,
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultReply {
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub content_type: ContentType,
    pub score: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReply {
    pub session_id: String,
    pub message_count: usize,
    pub total_tokens: usize,
    pub has_summary: bool,
    pub last_summarized_index: Option<usize>,
}

impl CliClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("reqwest client should build"),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn chat(
        &self,
        session_id: &str,
        history: &[ChatMessage],
        query: &str,
    ) -> Result<ChatTurnReply, CliError> {
        if session_id.trim().is_empty() {
            return Err(CliError::InvalidArgument(
                "session id cannot be empty".to_string(),
            ));
        }
        if query.trim().is_empty() {
            return Err(CliError::InvalidArgument(
                "query cannot be empty".to_string(),
            ));
        }

        let payload = ChatTurnRequest {
            session_id,
            history,
            query,
        };
        self.post_json("/v1/chat", &payload).await
    }

    pub async fn ingest(&self, sections: Vec<SectionUpload>) -> Result<IngestReply, CliError> {
        if sections.is_empty() {
            return Err(CliError::InvalidArgument(
                "nothing to ingest: the section list is empty".to_string(),
            ));
        }
        self.post_json("/v1/documents", &IngestRequest { sections })
            .await
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<SearchReply, CliError> {
        if query.trim().is_empty() {
            return Err(CliError::InvalidArgument(
                "query cannot be empty".to_string(),
            ));
        }
        self.post_json("/v1/search", &SearchRequest { query, limit })
            .await
    }

    pub async fn stats(&self, session_id: &str) -> Result<StatsReply, CliError> {
        if session_id.trim().is_empty() {
            return Err(CliError::InvalidArgument(
                "session id cannot be empty".to_string(),
            ));
        }
        self.get_json(&format!("/v1/sessions/{session_id}/stats"))
            .await
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<(), CliError> {
        if session_id.trim().is_empty() {
            return Err(CliError::InvalidArgument(
                "session id cannot be empty".to_string(),
            ));
        }

        let response = self
            .http
            .delete(self.endpoint(&format!("/v1/sessions/{session_id}")))
            .send()
            .await
            .map_err(|err| CliError::HttpTransport(err.to_string()))?;

        if response.status() != StatusCode::NO_CONTENT {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(CliError::HttpStatus { status, body });
        }
        Ok(())
    }

    async fn post_json<TReq, TRes>(&self, path: &str, payload: &TReq) -> Result<TRes, CliError>
    where
        TReq: Serialize + Sync,
        TRes: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(payload)
            .send()
            .await
            .map_err(|err| CliError::HttpTransport(err.to_string()))?;

        if response.status() != StatusCode::OK && response.status() != StatusCode::CREATED {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(CliError::HttpStatus { status, body });
        }

        response
            .json::<TRes>()
            .await
            .map_err(|err| CliError::Decode(err.to_string()))
    }

    async fn get_json<TRes>(&self, path: &str) -> Result<TRes, CliError>
    where
        TRes: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .get(self.endpoint(path))
            .send()
            .await
            .map_err(|err| CliError::HttpTransport(err.to_string()))?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(CliError::HttpStatus { status, body });
        }

        response
            .json::<TRes>()
            .await
            .map_err(|err| CliError::Decode(err.to_string()))
    }
}

fn load_sections(path: &PathBuf) -> Result<Vec<SectionUpload>, CliError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| CliError::File(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&raw).map_err(|err| CliError::Decode(err.to_string()))
}

pub async fn run(cli: Cli) -> Result<String, CliError> {
    let client = CliClient::new(cli.server);
    match cli.command {
        Commands::Ask { query, session } => {
            let session_id =
                session.unwrap_or_else(|| format!("cli_{}", uuid::Uuid::new_v4().simple()));
            let reply = client.chat(&session_id, &[], &query).await?;

            let mut output = format!("{}\n", reply.answer);
            if !reply.sources.is_empty() {
                output.push_str("\nSources:\n");
                for source in &reply.sources {
                    output.push_str(&format_source(source));
                }
            }
            output.push_str(&format!(
                "\n(session {}, {} prompt tokens)",
                reply.session_id, reply.usage.total_tokens
            ));
            Ok(output)
        }
        Commands::Ingest { path } => {
            let sections = load_sections(&path)?;
            let reply = client.ingest(sections).await?;
            Ok(format!("ingested {} sections", reply.indexed))
        }
        Commands::Search { query, limit } => {
            let reply = client.search(&query, limit).await?;
            if reply.results.is_empty() {
                return Ok(format!("no results for: {}", reply.query));
            }
            let mut output = format!("{} results for: {}\n", reply.total, reply.query);
            for result in &reply.results {
                output.push_str(&format!(
                    "\n[{:.2}] {}\n{}\n",
                    result.score, result.title, result.content
                ));
            }
            Ok(output)
        }
        Commands::Stats { session } => {
            let stats = client.stats(&session).await?;
            Ok(format!(
                "session {}: {} messages, {} tokens at last turn, summary: {}{}",
                stats.session_id,
                stats.message_count,
                stats.total_tokens,
                if stats.has_summary { "yes" } else { "no" },
                match stats.last_summarized_index {
                    Some(index) => format!(" (through message {index})"),
                    None => String::new(),
                }
            ))
        }
        Commands::ClearSession { session } => {
            client.clear_session(&session).await?;
            Ok(format!("session {session} cleared"))
        }
    }
}

pub fn format_source(source: &SourceReply) -> String {
    match &source.url {
        Some(url) => format!("  - {} ({url}) [{:.2}]\n", source.title, source.score),
        None => format!("  - {} [{:.2}]\n", source.title, source.score),
    }
}
