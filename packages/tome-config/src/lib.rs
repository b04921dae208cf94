mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, Config, EmbeddingProviderConfig, Index, Keyword, LlmProviderConfig, ProviderConfig,
	Providers, Qdrant, Search, Service,
};

use std::{fs, path::Path};

const WEIGHT_SUM_EPSILON: f32 = 1e-6;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.index.corpus_path.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "index.corpus_path must be non-empty.".to_string(),
		});
	}
	if cfg.index.qdrant.url.trim().is_empty() {
		return Err(Error::Validation { message: "index.qdrant.url must be non-empty.".to_string() });
	}
	if cfg.index.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "index.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.index.qdrant.vector_dim == 0 {
		return Err(Error::Validation {
			message: "index.qdrant.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.index.keyword.k1 <= 0.0 || !cfg.index.keyword.k1.is_finite() {
		return Err(Error::Validation {
			message: "index.keyword.k1 must be a positive finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.index.keyword.b) {
		return Err(Error::Validation {
			message: "index.keyword.b must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.index.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match index.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.search.top_k_retrieval == 0 {
		return Err(Error::Validation {
			message: "search.top_k_retrieval must be greater than zero.".to_string(),
		});
	}
	if cfg.search.top_k_display == 0 {
		return Err(Error::Validation {
			message: "search.top_k_display must be greater than zero.".to_string(),
		});
	}

	for (label, weight) in [
		("search.dense_weight", cfg.search.dense_weight),
		("search.keyword_weight", cfg.search.keyword_weight),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number."),
			});
		}
		if !(0.0..=1.0).contains(&weight) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if (cfg.search.dense_weight + cfg.search.keyword_weight - 1.0).abs() > WEIGHT_SUM_EPSILON {
		return Err(Error::Validation {
			message: "search.dense_weight and search.keyword_weight must sum to 1.0.".to_string(),
		});
	}
	if !cfg.search.rerank_gap_threshold.is_finite() {
		return Err(Error::Validation {
			message: "search.rerank_gap_threshold must be a finite number.".to_string(),
		});
	}
	if cfg.search.rerank_gap_threshold < 0.0 {
		return Err(Error::Validation {
			message: "search.rerank_gap_threshold must be zero or greater.".to_string(),
		});
	}
	if cfg.agent.max_iterations == 0 {
		return Err(Error::Validation {
			message: "agent.max_iterations must be greater than zero.".to_string(),
		});
	}
	if !cfg.agent.sufficiency_threshold.is_finite()
		|| !(0.0..=1.0).contains(&cfg.agent.sufficiency_threshold)
	{
		return Err(Error::Validation {
			message: "agent.sufficiency_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.agent.max_chunks == 0 {
		return Err(Error::Validation {
			message: "agent.max_chunks must be greater than zero.".to_string(),
		});
	}
	if cfg.agent.summary_chunks == 0 {
		return Err(Error::Validation {
			message: "agent.summary_chunks must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("planner", &cfg.providers.planner.api_key),
		("answer", &cfg.providers.answer.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}
