use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub index: Index,
	pub providers: Providers,
	pub search: Search,
	#[serde(default)]
	pub agent: Agent,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Index {
	/// JSON array of passage texts; the array position is the passage
	/// identifier shared with the vector collection.
	pub corpus_path: PathBuf,
	pub qdrant: Qdrant,
	#[serde(default)]
	pub keyword: Keyword,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Keyword {
	pub enabled: bool,
	pub k1: f32,
	pub b: f32,
}
impl Default for Keyword {
	fn default() -> Self {
		Self { enabled: true, k1: 1.5, b: 0.75 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	/// Chat oracle for decomposition, sufficiency evaluation, and query
	/// rewriting.
	pub planner: LlmProviderConfig,
	/// Chat oracle for final answer synthesis.
	pub answer: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub top_k_retrieval: u32,
	pub top_k_display: u32,
	pub dense_weight: f32,
	pub keyword_weight: f32,
	/// Rerank only when the merged top-1/top-2 score gap is at or below this
	/// value.
	pub rerank_gap_threshold: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Agent {
	pub max_iterations: u32,
	pub sufficiency_threshold: f32,
	pub max_chunks: u32,
	pub enable_rewrite: bool,
	/// How many top chunks the context summary shows to the sufficiency
	/// oracle.
	pub summary_chunks: u32,
}
impl Default for Agent {
	fn default() -> Self {
		Self {
			max_iterations: 3,
			sufficiency_threshold: 0.7,
			max_chunks: 30,
			enable_rewrite: true,
			summary_chunks: 10,
		}
	}
}
