use std::time::Duration;

use color_eyre::{Result, eyre};
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tome_domain::ScoredPassage;

use crate::chat;

const SYSTEM_PROMPT: &str = "You answer questions strictly from the numbered source passages \
provided. Cite nothing beyond them; when the sources do not contain the answer, say so. \
Answer in the language of the question.";

pub fn build_context(evidence: &[ScoredPassage]) -> String {
	evidence
		.iter()
		.enumerate()
		.map(|(index, passage)| format!("[{}] {}", index + 1, passage.text))
		.collect::<Vec<_>>()
		.join("\n\n")
}

fn build_messages(query: &str, evidence: &[ScoredPassage]) -> [Value; 2] {
	let user = format!("Sources:\n{}\n\nQuestion: {query}", build_context(evidence));

	[
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": user }),
	]
}

/// Blocking answer synthesis over the gathered evidence.
pub async fn answer(
	cfg: &tome_config::LlmProviderConfig,
	query: &str,
	evidence: &[ScoredPassage],
) -> Result<String> {
	chat::chat(cfg, &build_messages(query, evidence)).await
}

/// Streaming answer synthesis. Yields content tokens as the model produces
/// them; the first error ends the stream.
pub async fn answer_stream(
	cfg: &tome_config::LlmProviderConfig,
	query: &str,
	evidence: &[ScoredPassage],
) -> Result<UnboundedReceiverStream<Result<String>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"max_tokens": cfg.max_tokens,
		"messages": build_messages(query, evidence),
		"stream": true,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?;
	let (tx, rx) = mpsc::unbounded_channel();

	tokio::spawn(async move {
		let mut bytes = res.bytes_stream();
		let mut buffer = String::new();

		while let Some(chunk) = bytes.next().await {
			let chunk = match chunk {
				Ok(chunk) => chunk,
				Err(err) => {
					let _ = tx.send(Err(err.into()));

					return;
				},
			};

			buffer.push_str(&String::from_utf8_lossy(&chunk));

			for data in drain_sse_data(&mut buffer) {
				if data == "[DONE]" {
					return;
				}

				let Ok(json) = serde_json::from_str::<Value>(&data) else {
					let _ =
						tx.send(Err(eyre::eyre!("Answer stream chunk is not valid JSON.")));

					return;
				};

				if let Some(token) = delta_content(&json)
					&& !token.is_empty() && tx.send(Ok(token.to_string())).is_err()
				{
					return;
				}
			}
		}
	});

	Ok(UnboundedReceiverStream::new(rx))
}

/// Splits complete server-sent-event `data:` payloads off the front of
/// `buffer`, leaving any incomplete trailing line in place.
fn drain_sse_data(buffer: &mut String) -> Vec<String> {
	let mut payloads = Vec::new();

	while let Some(newline) = buffer.find('\n') {
		let line = buffer[..newline].trim_end_matches('\r').to_string();

		buffer.drain(..=newline);

		if let Some(data) = line.strip_prefix("data:") {
			let data = data.trim();

			if !data.is_empty() {
				payloads.push(data.to_string());
			}
		}
	}

	payloads
}

fn delta_content(json: &Value) -> Option<&str> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("delta"))
		.and_then(|delta| delta.get("content"))
		.and_then(|c| c.as_str())
}
