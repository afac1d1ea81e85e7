//! Query classification
//!
//! Cheap keyword heuristics catch greetings and help requests. Everything else
//! goes to the language model when one is configured, and defaults to the
//! design workflow otherwise.

use anyhow::Result;
use serde::Deserialize;

use crate::llm::{parse_json_from_text, LanguageModel, LlmRequest};
use crate::prompts::PromptLibrary;
use crate::types::{contains_term, Classification, QueryType};

const GREETINGS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "howdy",
    "greetings",
    "what's up",
    "sup",
    "yo",
];

const HELP_PATTERNS: &[&str] = &[
    "help",
    "what can you do",
    "how do i use",
    "what is this",
    "how does this work",
    "capabilities",
    "features",
];

const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You are a query classifier for an electrolyte design system.
Classify the user's query into one of these categories:

1. "greeting" - Simple greetings like "hello", "hi", casual conversation starters
2. "help" - Questions about how to use the system, what it can do
3. "off_topic" - Questions unrelated to batteries, electrolytes, or chemistry
4. "electrolyte_design" - Requests to design, formulate, or recommend electrolytes
5. "literature_search" - Questions about existing research, papers, or knowledge
6. "property_check" - Questions about specific component properties or compatibility

Return ONLY a JSON object with:
- query_type: one of the categories above
- confidence: 0.0 to 1.0
- reason: brief explanation
- should_delegate: true if specialized agents needed, false for direct response"#;

const CLASSIFIER_PROMPT: &str = r#"Classify this query: "{{query}}""#;

// ============================================================================
// Heuristics
// ============================================================================

/// True when `query` is `prefix` or starts with it followed by a non-word char
fn starts_with_term(query: &str, prefix: &str) -> bool {
    match query.strip_prefix(prefix) {
        Some(rest) => rest.chars().next().map_or(true, |c| !c.is_alphanumeric()),
        None => false,
    }
}

/// Keyword classifier for greetings and help requests
pub fn classify_query_stub(query: &str) -> Option<Classification> {
    let q = query.trim().to_lowercase();

    if GREETINGS.iter().any(|g| starts_with_term(&q, g)) {
        return Some(Classification {
            query_type: QueryType::Greeting,
            confidence: 0.95,
            should_delegate: false,
            reason: "Simple greeting detected".to_string(),
        });
    }

    if HELP_PATTERNS.iter().any(|p| contains_term(&q, p)) {
        return Some(Classification {
            query_type: QueryType::Help,
            confidence: 0.9,
            should_delegate: false,
            reason: "Help request detected".to_string(),
        });
    }

    None
}

/// Used when nothing else decides
pub fn default_classification() -> Classification {
    Classification {
        query_type: QueryType::ElectrolyteDesign,
        confidence: 0.7,
        should_delegate: true,
        reason: "Defaulting to electrolyte design workflow".to_string(),
    }
}

fn parse_failure_classification() -> Classification {
    Classification {
        query_type: QueryType::ElectrolyteDesign,
        confidence: 0.6,
        should_delegate: true,
        reason: "Classification parsing failed, defaulting to design workflow".to_string(),
    }
}

// ============================================================================
// LLM Classification
// ============================================================================

#[derive(Deserialize, Debug, Default)]
struct RawClassification {
    query_type: Option<String>,
    confidence: Option<serde_json::Value>,
    should_delegate: Option<bool>,
    reason: Option<String>,
}

fn normalize_classification(raw: RawClassification) -> Classification {
    let query_type = raw
        .query_type
        .as_deref()
        .and_then(QueryType::from_label)
        .unwrap_or(QueryType::ElectrolyteDesign);

    let confidence = raw
        .confidence
        .as_ref()
        .and_then(crate::llm::value_as_f64)
        .unwrap_or(0.8)
        .clamp(0.0, 1.0);

    let should_delegate = raw.should_delegate.unwrap_or(!matches!(
        query_type,
        QueryType::Greeting | QueryType::Help | QueryType::OffTopic
    ));

    Classification {
        query_type,
        confidence,
        should_delegate,
        reason: raw.reason.unwrap_or_else(|| "Classified by language model".to_string()),
    }
}

/// Ask the model to classify. Transport errors propagate; an unparseable reply
/// yields the design workflow at reduced confidence.
pub fn classify_query_llm(
    query: &str,
    llm: &dyn LanguageModel,
    prompts: &PromptLibrary,
) -> Result<Classification> {
    let system = prompts.render("classifier_system", CLASSIFIER_SYSTEM_PROMPT, &[]);
    let prompt = prompts.render("classifier", CLASSIFIER_PROMPT, &[("query", query)]);

    let request = LlmRequest::new(prompt)
        .system(system)
        .temperature(0.1)
        .max_tokens(200);

    let text = llm.generate(&request)?;
    tracing::debug!("Classifier raw response: {}", text);

    match parse_json_from_text::<RawClassification>(&text) {
        Ok(raw) => Ok(normalize_classification(raw)),
        Err(e) => {
            tracing::warn!("Could not parse classification: {}", e);
            Ok(parse_failure_classification())
        }
    }
}

/// Heuristics, then the model, then the default
pub fn classify_query(
    query: &str,
    llm: Option<&dyn LanguageModel>,
    prompts: &PromptLibrary,
) -> Classification {
    if let Some(classification) = classify_query_stub(query) {
        return classification;
    }

    if let Some(llm) = llm {
        match classify_query_llm(query, llm, prompts) {
            Ok(classification) => return classification,
            Err(e) => tracing::warn!("LLM classification failed: {}", e),
        }
    }

    default_classification()
}
