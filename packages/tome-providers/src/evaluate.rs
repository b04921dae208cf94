use color_eyre::Result;
use serde_json::Value;
use tome_domain::oracle::EvaluationResult;

use crate::chat;

const SYSTEM_PROMPT: &str = "You are an evidence sufficiency judge for a retrieval system. \
Given a question, the planned sub-queries, and a digest of the gathered passages, decide whether \
the evidence answers the question.\n\
Respond with a JSON object:\n\
{\"is_sufficient\": bool, \"confidence\": 0.0-1.0, \"missing_aspects\": [\"...\"], \
\"follow_up_queries\": [\"...\"], \"reasoning\": \"...\"}\n\
Rules:\n\
- confidence is how completely the evidence covers the question.\n\
- When evidence is lacking, propose at most three follow-up queries targeting the missing aspects.\n\
- Never repeat a search that was already run.";

pub async fn evaluate(
	cfg: &tome_config::LlmProviderConfig,
	query: &str,
	sub_queries: &[String],
	context_summary: &str,
) -> Result<EvaluationResult> {
	let user = format!(
		"Question: {query}\n\nPlanned sub-queries:\n{}\n\nGathered evidence digest:\n{context_summary}",
		sub_queries.iter().map(|sq| format!("- {sq}")).collect::<Vec<_>>().join("\n"),
	);
	let messages = [
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": user }),
	];
	let json = chat::chat_json(cfg, &messages).await?;

	Ok(parse_evaluation(&json))
}

fn parse_evaluation(json: &Value) -> EvaluationResult {
	let strings = |key: &str| {
		json.get(key)
			.and_then(Value::as_array)
			.map(|arr| {
				arr.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>()
			})
			.unwrap_or_default()
	};

	EvaluationResult {
		is_sufficient: json.get("is_sufficient").and_then(Value::as_bool).unwrap_or(false),
		confidence: json
			.get("confidence")
			.and_then(Value::as_f64)
			.map(|v| (v as f32).clamp(0.0, 1.0))
			.unwrap_or(0.5),
		missing_aspects: strings("missing_aspects"),
		follow_up_queries: strings("follow_up_queries"),
		reasoning: json
			.get("reasoning")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string(),
	}
}
