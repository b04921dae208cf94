use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Single chat completion, returning the assistant message content.
pub async fn chat(cfg: &tome_config::LlmProviderConfig, messages: &[Value]) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"max_tokens": cfg.max_tokens,
		"messages": messages,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	message_content(&json)
		.map(str::to_string)
		.ok_or_else(|| eyre::eyre!("Chat response is missing message content."))
}

/// Chat completion whose content must parse as JSON.
///
/// Models occasionally emit malformed output, so the request is retried up to
/// three times before giving up.
pub async fn chat_json(cfg: &tome_config::LlmProviderConfig, messages: &[Value]) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);

	for _ in 0..3 {
		let body = serde_json::json!({
			"model": cfg.model,
			"temperature": cfg.temperature,
			"max_tokens": cfg.max_tokens,
			"messages": messages,
			"response_format": { "type": "json_object" },
		});
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		if let Ok(parsed) = parse_json_content(json) {
			return Ok(parsed);
		}
	}

	Err(eyre::eyre!("Chat response is not valid JSON."))
}

pub(crate) fn message_content(json: &Value) -> Option<&str> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
}

fn parse_json_content(json: Value) -> Result<Value> {
	if let Some(content) = message_content(&json) {
		let parsed: Value = serde_json::from_str(strip_code_fence(content))
			.map_err(|_| eyre::eyre!("Chat content is not valid JSON."))?;

		return Ok(parsed);
	}

	if json.is_object() {
		return Ok(json);
	}

	Err(eyre::eyre!("Chat response is missing JSON content."))
}

/// Drop a surrounding Markdown code fence if the model wrapped its JSON in
/// one.
fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);
	let inner = inner.strip_suffix("```").unwrap_or(inner);

	inner.trim()
}
