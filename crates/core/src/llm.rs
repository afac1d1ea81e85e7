//! Language-model backend using an OpenAI-compatible chat completions API
//!
//! The pipeline only depends on the [`LanguageModel`] trait; [`OpenAiClient`] is
//! the production implementation. Model replies are free text, so structured
//! output goes through [`parse_json_from_text`], which tolerates code fences,
//! surrounding prose and trailing commas.

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;

// ============================================================================
// Public Request/Trait
// ============================================================================

/// A single generation request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The user prompt
    pub prompt: String,
    /// Optional system instructions
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.7,
            max_tokens: 2000,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Anything that can turn a prompt into text
pub trait LanguageModel: Send + Sync {
    fn generate(&self, request: &LlmRequest) -> Result<String>;

    fn model_name(&self) -> &str;
}

// ============================================================================
// OpenAI-compatible Client
// ============================================================================

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for `{base_url}/chat/completions`
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("No API key found in ${}", config.api_key_env))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl LanguageModel for OpenAiClient {
    fn generate(&self, request: &LlmRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: &request.prompt });

        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!("Calling LLM at {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| anyhow!("LLM request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("LLM error {}: {}", status, body));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| anyhow!("Failed to parse LLM response: {}", e))?;

        extract_text_from_response(&parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn extract_text_from_response(resp: &ChatCompletionResponse) -> Result<String> {
    let text = resp
        .choices
        .iter()
        .filter_map(|c| c.message.content.as_deref())
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(anyhow!("No text found in LLM response"));
    }
    Ok(text.trim().to_string())
}

// ============================================================================
// JSON Repair
// ============================================================================

/// Parse the first JSON object found in model output into `T`
pub fn parse_json_from_text<T: DeserializeOwned>(text: &str) -> Result<T> {
    let s = strip_code_fence(text.trim());

    // Fast path: the whole reply is the object
    if s.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str(s) {
            return Ok(parsed);
        }
    }

    let json_str = extract_balanced_object(s)?;

    match serde_json::from_str(json_str) {
        Ok(parsed) => Ok(parsed),
        Err(first_err) => {
            let repaired = remove_trailing_commas(json_str);
            serde_json::from_str(&repaired)
                .map_err(|_| anyhow!("Failed to parse JSON: {}", first_err))
        }
    }
}

/// Drop a surrounding ```json ... ``` fence if present
fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start();
    match rest.rfind("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

/// Slice out the first `{ ... }` using string-aware brace balancing
fn extract_balanced_object(s: &str) -> Result<&str> {
    let start = s.find('{').ok_or_else(|| anyhow!("No '{{' found in LLM output"))?;

    let mut in_str = false;
    let mut escape = false;
    let mut depth = 0;

    for (i, ch) in s[start..].char_indices() {
        if in_str {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }

        match ch {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    Err(anyhow!("No matching '}}' found in LLM output"))
}

/// Remove commas that directly precede `}` or `]` outside of strings
fn remove_trailing_commas(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_str = false;
    let mut escape = false;
    let chars: Vec<char> = s.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if in_str {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }
        if ch == '"' {
            in_str = true;
        } else if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Coerce a JSON number or numeric string into f64
pub fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%').trim();
            trimmed.parse::<f64>().ok()
        }
        _ => None,
    }
}

// ============================================================================
// Test Support
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Replies with the first script entry whose needle appears in the prompt
    /// or system text; errors when nothing matches.
    pub struct ScriptedModel {
        script: Vec<(String, String)>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(script: &[(&str, &str)]) -> Self {
            Self {
                script: script
                    .iter()
                    .map(|(n, r)| (n.to_string(), r.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// A model whose every call fails, like an unreachable backend
        pub fn failing() -> Self {
            Self::new(&[])
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or(0)
        }
    }

    impl LanguageModel for ScriptedModel {
        fn generate(&self, request: &LlmRequest) -> Result<String> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(request.prompt.clone());
            }
            let system = request.system.as_deref().unwrap_or("");
            self.script
                .iter()
                .find(|(needle, _)| request.prompt.contains(needle) || system.contains(needle))
                .map(|(_, reply)| reply.clone())
                .ok_or_else(|| anyhow!("connection refused"))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
