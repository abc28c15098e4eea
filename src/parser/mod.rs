pub mod tfidf;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::extract::DocChunk;
use crate::external::LlmClient;
pub use tfidf::{Retrieved, TfidfIndex};

const MAX_RETRIES: usize = 3;

/// Join retrieved chunks into a prompt context, best match first.
///
/// Each chunk is prefixed with its source document so the model can tell
/// framework text from SPO text.
pub fn assemble_context(chunks: &[DocChunk], hits: &[Retrieved]) -> String {
    hits.iter()
        .filter_map(|hit| chunks.get(hit.index))
        .map(|chunk| format!("[Source: {}]\n{}", chunk.source, chunk.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Clean up an LLM reply before JSON parsing.
///
/// Strips markdown code fences, trims to the outermost JSON object, and
/// removes trailing commas before closing brackets.
pub fn sanitize_json(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped;
    } else if let Some(stripped) = text.strip_prefix("```") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }
    let text = text.trim();

    // Models sometimes wrap the object in prose; keep the outermost braces only.
    let sliced = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    };

    let re = Regex::new(r",(\s*[\]}])").unwrap();
    re.replace_all(sliced, "$1").to_string()
}

/// Ask the LLM to parse the context and return the response as JSON.
///
/// Retries up to three times on malformed output, pausing a second between
/// attempts (transient truncation is common with long contexts).
pub async fn parse_with_llm(
    client: &dyn LlmClient,
    system: &str,
    user: &str,
) -> Result<Value> {
    let mut last_error = None;

    for attempt in 1..=MAX_RETRIES {
        let response = client.complete(system, user).await?;
        let sanitized = sanitize_json(&response);

        match serde_json::from_str::<Value>(&sanitized) {
            Ok(value) if value.is_object() => return Ok(value),
            Ok(_) => {
                warn!(provider = client.name(), attempt, "LLM returned non-object JSON");
                last_error = Some(anyhow!("response is not a JSON object"));
            }
            Err(e) => {
                warn!(provider = client.name(), attempt, error = %e, "failed to parse LLM response");
                last_error = Some(e.into());
            }
        }

        if attempt < MAX_RETRIES {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow!("no attempts made"))
        .context(format!(
            "Failed to parse {} response after {} attempts",
            client.name(),
            MAX_RETRIES
        )))
}

/// Parse with the primary provider, falling back to the secondary on failure.
pub async fn parse_with_fallback(
    primary: &dyn LlmClient,
    fallback: Option<&dyn LlmClient>,
    system: &str,
    user: &str,
) -> Result<Value> {
    match parse_with_llm(primary, system, user).await {
        Ok(value) => Ok(value),
        Err(primary_err) => match fallback {
            Some(secondary) => {
                warn!(
                    primary = primary.name(),
                    fallback = secondary.name(),
                    error = %primary_err,
                    "primary provider failed, retrying with fallback"
                );
                parse_with_llm(secondary, system, user).await
            }
            None => Err(primary_err),
        },
    }
}
