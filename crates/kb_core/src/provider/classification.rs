//! Classification prompt and reply contract.
//!
//! The reply is expected to be a JSON object
//! `{"tags":[{"name":"...","parent":"...","confidence":0.9}]}`, possibly
//! wrapped in Markdown code fences or surrounded by prose.

use crate::provider::spi::{ProviderError, TagSuggestion};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ClassificationReply {
    #[serde(default)]
    tags: Vec<RawSuggestion>,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Builds the user prompt sent to a chat-style classifier.
pub fn build_classification_prompt(content: &str, known_tags: &[String]) -> String {
    let mut prompt = String::from("Classify this content and suggest tags. Return JSON only.\n\n");
    prompt.push_str("Content:\n");
    prompt.push_str(content);
    prompt.push_str("\n\n");

    if !known_tags.is_empty() {
        prompt.push_str("Existing tags in the system (prefer reusing these when appropriate):\n");
        for tag in known_tags {
            prompt.push_str("- ");
            prompt.push_str(tag);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str(
        r#"Return a JSON object with this structure:
{
  "tags": [
    {"name": "tag-name", "parent": "parent-tag-or-empty", "confidence": 0.9}
  ]
}

Rules:
- Use lowercase, hyphenated tag names (e.g., "machine-learning" not "Machine Learning")
- Suggest 2-5 relevant tags
- Use "parent" to build hierarchy (e.g., {"name": "golang", "parent": "programming"})
- Confidence is 0.0-1.0 based on how certain the classification is
- Reuse existing tags when they fit; create new ones when needed
- Keep tags general enough to be reusable across entries

Return ONLY the JSON, no other text."#,
    );
    prompt
}

/// Parses a classifier reply into suggestions.
///
/// Blank parents become `None`; a missing confidence defaults to `0.5`.
/// Entries with a blank name are dropped.
pub fn parse_classification_reply(
    provider: &'static str,
    text: &str,
) -> Result<Vec<TagSuggestion>, ProviderError> {
    let fragment = extract_json_object(text)
        .ok_or_else(|| ProviderError::malformed(provider, "no JSON object in reply"))?;
    let reply: ClassificationReply = serde_json::from_str(fragment)
        .map_err(|err| ProviderError::malformed(provider, format!("invalid reply JSON: {err}")))?;

    let suggestions = reply
        .tags
        .into_iter()
        .filter(|raw| !raw.name.trim().is_empty())
        .map(|raw| TagSuggestion {
            name: raw.name.trim().to_string(),
            parent: raw
                .parent
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            confidence: raw.confidence.unwrap_or(0.5),
        })
        .collect();
    Ok(suggestions)
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
