//! Chat completion calls for answer generation.
//!
//! Wraps the OpenAI chat completions API behind [`complete`]. The same
//! retry policy as the embedding client applies: 429 and 5xx retry with
//! exponential backoff, other 4xx fail immediately. `completion.base_url`
//! redirects the calls for test harnesses.
//!
//! [`expand_question`] asks the same model for alternative phrasings of a
//! question. Failures there degrade to "no expansions" rather than failing
//! the query.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::error::{Error, Result};

/// One message in a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Run a chat completion and return the assistant's reply text.
///
/// # Errors
///
/// - `"disabled"` provider: always an error.
/// - Missing `OPENAI_API_KEY`, non-retryable API errors, exhausted
///   retries, or a response with no choices.
pub async fn complete(
    client: &reqwest::Client,
    config: &CompletionConfig,
    messages: &[ChatMessage],
) -> Result<String> {
    match config.provider.as_str() {
        "openai" => complete_openai(client, config, messages).await,
        "disabled" => Err(Error::Provider {
            provider: "completion".to_string(),
            reason: "provider is disabled".to_string(),
        }),
        other => Err(Error::Provider {
            provider: "completion".to_string(),
            reason: format!("unknown provider: {}", other),
        }),
    }
}

/// Whether an HTTP status is worth another attempt.
fn retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

async fn complete_openai(
    client: &reqwest::Client,
    config: &CompletionConfig,
    messages: &[ChatMessage],
) -> Result<String> {
    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| Error::Provider {
        provider: "completion".to_string(),
        reason: "OPENAI_API_KEY not set".to_string(),
    })?;

    let url = format!(
        "{}/v1/chat/completions",
        config.base_url.trim_end_matches('/')
    );
    let request = ChatRequest {
        model: &config.model,
        messages,
        temperature: config.temperature,
    };

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(attempt, delay_secs = delay.as_secs(), "retrying completion request");
            tokio::time::sleep(delay).await;
        }

        let sent = client
            .post(&url)
            .timeout(Duration::from_secs(config.timeout_secs))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                last_err = Some(Error::Http(e));
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            let parsed: ChatResponse = response.json().await?;
            return parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| Error::Provider {
                    provider: "completion".to_string(),
                    reason: "response contained no choices".to_string(),
                });
        }

        let detail = response.text().await.unwrap_or_default();
        let err = Error::Provider {
            provider: "completion".to_string(),
            reason: format!("HTTP {}: {}", status, detail),
        };
        if retryable(status) {
            last_err = Some(err);
            continue;
        }
        return Err(err);
    }

    Err(last_err.unwrap_or_else(|| Error::Provider {
        provider: "completion".to_string(),
        reason: "request failed after retries".to_string(),
    }))
}

/// Ask the completion model for 2 alternative phrasings of a question.
///
/// Used when `retrieval.expand_query` is on. The alternatives widen
/// retrieval only; the original question is always what the model answers.
/// A model reply that cannot be parsed yields an empty list, never an error.
pub async fn expand_question(
    client: &reqwest::Client,
    config: &CompletionConfig,
    question: &str,
) -> Result<Vec<String>> {
    let prompt = format!(
        "You are a document search query expander. Given a question, generate exactly 2 \
         alternative phrasings that capture different aspects or synonyms of the intent. \
         The alternatives should help find relevant passages the original phrasing might miss.\n\n\
         Question: \"{question}\"\n\n\
         Respond with ONLY a JSON array of 2 strings. No explanation.\n\
         Example: [\"alternative phrasing 1\", \"alternative phrasing 2\"]"
    );

    let reply = complete(client, config, &[ChatMessage::user(prompt)]).await?;
    Ok(parse_expansions(&reply))
}

/// Pull a JSON string array out of a model reply, tolerating surrounding
/// prose and markdown fences.
fn parse_expansions(content: &str) -> Vec<String> {
    let json_str = if let Some(start) = content.find('[') {
        if let Some(end) = content.rfind(']') {
            &content[start..=end]
        } else {
            content
        }
    } else {
        content
    };

    match serde_json::from_str::<Vec<String>>(json_str) {
        Ok(queries) => queries.into_iter().take(2).collect(),
        Err(e) => {
            tracing::warn!(error = %e, raw = %content, "could not parse expanded queries");
            Vec::new()
        }
    }
}
