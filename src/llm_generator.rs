//! Model client: turns a prompt into an ordered list of shell commands.

use crate::error::GenerationError;
use crate::http_client::HttpClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable selecting the offline generator.
pub const MOCK_ENV: &str = "TERMAI_USE_MOCK";

/// Everything needed for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    pub api_key: Option<&'a str>,
}

#[async_trait]
pub trait CommandGenerator: Send + Sync {
    /// Returns the commands in execution order. An empty list means the model
    /// answered but suggested nothing.
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<String>, GenerationError>;
}

/// Splits a model reply into command candidates: one trimmed line per
/// command, blank lines and markdown fences dropped, order preserved.
pub fn parse_commands(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .map(str::to_string)
        .collect()
}

// Gemini `generateContent` wire types.

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiGenerator {
    http: Box<dyn HttpClient>,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(http: Box<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    /// Extracts the generated text from a successful reply.
    fn extract_text(body: &str) -> Result<String, GenerationError> {
        let reply: GenerateContentResponse =
            serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;

        if let Some(error) = reply.error {
            return Err(GenerationError::Api {
                status: 200,
                message: error.message.unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        let candidate = reply
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::Parse("reply contains no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(GenerationError::Parse("candidate contains no text".to_string()));
        }
        Ok(text)
    }

    fn api_error(status: u16, body: &str) -> GenerationError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or_else(|| "Check your API key and internet connection.".to_string());
        GenerationError::Api { status, message }
    }
}

#[async_trait]
impl CommandGenerator for GeminiGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<String>, GenerationError> {
        let api_key = request.api_key.ok_or(GenerationError::MissingApiKey)?;
        let endpoint = self.endpoint(request.model);
        info!("Requesting commands from {}", endpoint);

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: request.prompt }],
            }],
        };
        let body = serde_json::to_value(&body).map_err(|e| GenerationError::Parse(e.to_string()))?;

        let url = format!("{}?key={}", endpoint, api_key);
        let response = self
            .http
            .post_json(&url, &[("Content-Type", "application/json")], &body)
            .await?;
        debug!("Model replied with status {}", response.status);

        if !response.is_success() {
            warn!("Model endpoint returned status {}", response.status);
            return Err(Self::api_error(response.status, &response.body));
        }

        let text = Self::extract_text(&response.body)?;
        let commands = parse_commands(&text);
        info!("Model suggested {} command(s)", commands.len());
        Ok(commands)
    }
}

/// Offline generator with canned replies, keyed on words in the prompt.
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn mock_reply(prompt: &str) -> &'static str {
        let task = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Task: "))
            .unwrap_or(prompt)
            .to_lowercase();

        if task.contains("hello") || task == "hi" || task == "test" {
            "echo \"Hello from termai! I'm working correctly.\"\n"
        } else if task.contains("list files") {
            "ls\n\npwd\n"
        } else if task.contains("scratch") {
            "echo preparing\nrm -rf termai-scratch\necho finished\n"
        } else if task.contains("fail") {
            "false\necho after failure\n"
        } else {
            ""
        }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<String>, GenerationError> {
        info!("Using mock generator ({}=1)", MOCK_ENV);
        Ok(parse_commands(Self::mock_reply(request.prompt)))
    }
}
