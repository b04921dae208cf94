//! Test doubles and fixtures shared across crates.

pub mod stubs;

use std::sync::Arc;

use tome_config::{
	Agent, Config, EmbeddingProviderConfig, Index, Keyword, LlmProviderConfig, ProviderConfig,
	Providers as ProvidersConfig, Qdrant, Search, Service as ServiceConfig,
};
use tome_index::PassageStore;
use tome_service::{Providers, Service};

use crate::stubs::{HashEmbedding, InMemoryVectorIndex};

pub const TEST_VECTOR_DIM: u32 = 64;

/// Full configuration pointing at stub endpoints; no test may reach the
/// network.
pub fn test_config() -> Config {
	Config {
		service: ServiceConfig {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "warn".to_string(),
		},
		index: Index {
			corpus_path: "unused.json".into(),
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "tome_test".to_string(),
				vector_dim: TEST_VECTOR_DIM,
			},
			keyword: Keyword::default(),
		},
		providers: ProvidersConfig {
			embedding: EmbeddingProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://stub.invalid".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "stub-embed".to_string(),
				dimensions: TEST_VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
			rerank: ProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://stub.invalid".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/rerank".to_string(),
				model: "stub-rerank".to_string(),
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
			planner: test_llm_config("stub-planner"),
			answer: test_llm_config("stub-answer"),
		},
		search: Search {
			top_k_retrieval: 10,
			top_k_display: 5,
			dense_weight: 0.7,
			keyword_weight: 0.3,
			rerank_gap_threshold: 0.05,
		},
		agent: Agent::default(),
	}
}

pub fn test_llm_config(model: &str) -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "stub".to_string(),
		api_base: "http://stub.invalid".to_string(),
		api_key: "test-key".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: model.to_string(),
		temperature: 0.0,
		max_tokens: 512,
		timeout_ms: 1_000,
		default_headers: serde_json::Map::new(),
	}
}

/// Small corpus with two topics so hybrid and multi-hop behavior is
/// observable.
pub fn sample_corpus() -> Vec<String> {
	[
		"[Atomic Habits] The habit loop consists of cue, craving, response, and reward.",
		"[Atomic Habits] Habit stacking pairs a new habit with one you already do.",
		"[Atomic Habits] Small improvements of one percent compound into remarkable results.",
		"[Psychology of Money] Compounding works best when left uninterrupted for decades.",
		"[Psychology of Money] Saving money is the gap between your ego and your income.",
		"[Psychology of Money] Tail events drive a huge share of investment outcomes.",
	]
	.into_iter()
	.map(str::to_string)
	.collect()
}

/// A service over `passages` with an in-memory vector index built by the same
/// hash embedder the stub providers use.
pub fn service_with(cfg: Config, passages: Vec<String>, providers: Providers) -> Service {
	let embedder = HashEmbedding::new(cfg.providers.embedding.dimensions as usize);
	let vectors = passages.iter().map(|passage| embedder.vector(passage)).collect();
	let vector = Arc::new(InMemoryVectorIndex::new(vectors));

	Service::new(cfg, PassageStore::from_passages(passages), vector, providers)
}
