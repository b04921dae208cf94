use color_eyre::Result;

use crate::chat;

const SYSTEM_PROMPT: &str = "You rewrite search queries for a passage retrieval system. \
Rewrite the user query into a single clear, self-contained search query that names the entities \
and facts being asked about. Reply with the rewritten query only, no explanation.";

/// Rewrites a query for retrieval. Callers are expected to fall back to the
/// original query when this fails or returns an empty string.
pub async fn rewrite(cfg: &tome_config::LlmProviderConfig, query: &str) -> Result<String> {
	let messages = [
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": query }),
	];
	let content = chat::chat(cfg, &messages).await?;

	Ok(content.trim().trim_matches('"').to_string())
}
