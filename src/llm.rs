//! Streaming chat completion client.
//!
//! Talks the OpenAI-compatible `chat/completions` wire format with
//! `stream: true`, which both supported backends (Groq and OpenAI) speak.
//! Deltas are handed to the caller as they arrive; the full reply is returned
//! once the stream closes. A mid-stream failure is an error, never a partial
//! success.

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::time::Duration;

use crate::config::ModelConfig;
use crate::session::Message;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

fn resolve_endpoint(config: &ModelConfig) -> Result<(String, String)> {
    if let Some(url) = &config.url {
        // Custom endpoint still authenticates per the configured provider.
        let key = api_key_for(&config.provider)?;
        return Ok((url.clone(), key));
    }

    match config.provider.as_str() {
        "groq" => Ok((GROQ_API_URL.to_string(), api_key_for("groq")?)),
        "openai" => Ok((OPENAI_API_URL.to_string(), api_key_for("openai")?)),
        other => bail!("Unknown model provider: {}", other),
    }
}

fn api_key_for(provider: &str) -> Result<String> {
    let var = match provider {
        "groq" => "GROQ_API_KEY",
        "openai" => "OPENAI_API_KEY",
        other => bail!("Unknown model provider: {}", other),
    };
    std::env::var(var).with_context(|| format!("{} environment variable not set", var))
}

/// Stream one chat completion. `on_delta` is invoked for every content
/// fragment in arrival order; the accumulated reply is returned on success.
pub async fn stream_chat(
    config: &ModelConfig,
    messages: &[Message],
    mut on_delta: impl FnMut(&str),
) -> Result<String> {
    let (url, api_key) = resolve_endpoint(config)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": config.name,
        "messages": messages,
        "max_tokens": config.max_tokens,
        "stream": true,
    });

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to reach model endpoint: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Model API error {}: {}", status, body_text);
    }

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();
    let mut reply = String::new();
    let mut done = false;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Stream interrupted mid-response")?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        // SSE events are newline-delimited; hold back any incomplete line.
        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim().to_string();
            buffer.drain(..=pos);

            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            if data == "[DONE]" {
                done = true;
                break;
            }
            if let Some(delta) = parse_delta(data) {
                on_delta(&delta);
                reply.push_str(&delta);
            }
        }

        if done {
            break;
        }
    }

    if !done {
        bail!("Stream ended without completion marker");
    }
    if reply.is_empty() {
        bail!("Model returned an empty response");
    }

    Ok(reply)
}

/// Extract the content fragment from one SSE data payload, if present.
fn parse_delta(data: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(data).ok()?;
    json.get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}
