//! Commentary generator boundary: prompt in, text out. An empty string is
//! the only failure signal callers can observe; errors are logged here and
//! never propagated.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque text-generation capability used by the scorer and downstream
/// commentary jobs.
#[async_trait]
pub trait CommentaryGenerator: Send + Sync {
    /// Generate text for a prompt. Returns `""` on any failure.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> String;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn CommentaryGenerator>;

/// Build a generator from the environment: a real OpenAI client when
/// `OPENAI_API_KEY` is set, otherwise a disabled one. A missing key degrades
/// the scorer (everything defaults to score 1) instead of crashing.
pub fn build_generator() -> DynGenerator {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Arc::new(OpenAiGenerator::new(key, None)),
        _ => {
            tracing::warn!("OPENAI_API_KEY not set; commentary generation disabled");
            Arc::new(DisabledGenerator)
        }
    }
}

/// OpenAI chat-completions client.
pub struct OpenAiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("headline-pipeline/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model: model_override.unwrap_or("gpt-4o-mini").to_string(),
        }
    }
}

#[async_trait]
impl CommentaryGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> String {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
            max_tokens,
        };

        let resp = match self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "generator request failed");
                return String::new();
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "generator returned non-success");
            return String::new();
        }
        match resp.json::<Resp>().await {
            Ok(body) => body
                .choices
                .first()
                .map(|c| c.message.content.trim().to_string())
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "generator response body unparseable");
                String::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Returns `""` always; used when no credentials are configured.
pub struct DisabledGenerator;

#[async_trait]
impl CommentaryGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> String {
        String::new()
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

// --- Test helper ---

/// Scripted generator: pops queued responses in order, then returns `""`.
pub struct MockGenerator {
    responses: Mutex<VecDeque<String>>,
}

impl MockGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl CommentaryGenerator for MockGenerator {
    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> String {
        self.responses
            .lock()
            .expect("mock generator mutex poisoned")
            .pop_front()
            .unwrap_or_default()
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}
