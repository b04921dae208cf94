use color_eyre::Result;
use serde_json::Value;
use tome_domain::oracle::{DecompositionResult, QueryType};

use crate::chat;

const SYSTEM_PROMPT: &str = "You are a query analysis assistant for a retrieval system. \
Classify the user question and, when it spans several facts, break it into independent search queries.\n\
Respond with a JSON object:\n\
{\"query_type\": \"simple\" | \"complex\", \"sub_queries\": [\"...\"], \"reasoning\": \"...\"}\n\
Rules:\n\
- A question answerable from a single passage is simple; return it as the only sub-query.\n\
- A question comparing, combining, or chaining facts is complex; return two to four \
self-contained sub-queries, each searchable on its own.\n\
- Keep sub-queries in the language of the question.";

pub async fn decompose(
	cfg: &tome_config::LlmProviderConfig,
	query: &str,
) -> Result<DecompositionResult> {
	let messages = [
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": query }),
	];
	let json = chat::chat_json(cfg, &messages).await?;

	Ok(parse_decomposition(&json, query))
}

fn parse_decomposition(json: &Value, original_query: &str) -> DecompositionResult {
	let query_type = match json.get("query_type").and_then(Value::as_str) {
		Some("complex") => QueryType::Complex,
		_ => QueryType::Simple,
	};
	let sub_queries = json
		.get("sub_queries")
		.and_then(Value::as_array)
		.map(|arr| {
			arr.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>()
		})
		.unwrap_or_default();
	let reasoning =
		json.get("reasoning").and_then(Value::as_str).unwrap_or_default().to_string();

	DecompositionResult::normalized(query_type, sub_queries, reasoning, original_query)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_complex_decomposition() {
		let json = serde_json::json!({
			"query_type": "complex",
			"sub_queries": ["what is a habit loop", "what is habit stacking"],
			"reasoning": "two concepts",
		});
		let result = parse_decomposition(&json, "compare the habit loop and habit stacking");

		assert_eq!(result.query_type, QueryType::Complex);
		assert_eq!(result.sub_queries.len(), 2);
	}

	#[test]
	fn malformed_reply_falls_back_to_original_query() {
		let json = serde_json::json!({ "query_type": "complex" });
		let result = parse_decomposition(&json, "what is a habit");

		assert_eq!(result.query_type, QueryType::Simple);
		assert_eq!(result.sub_queries, vec!["what is a habit"]);
	}
}
