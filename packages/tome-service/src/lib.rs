pub mod agent;
pub mod memory;
pub mod search;

use std::{future::Future, pin::Pin, sync::Arc};

use futures::stream::BoxStream;
use tome_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use tome_domain::{DecompositionResult, EvaluationResult, ScoredPassage};
use tome_index::{Bm25Index, PassageStore, VectorIndex};
use tome_providers::{answer, decompose, embedding, evaluate, rerank, rewrite};

pub use agent::{AgentEvent, AgenticResult};
pub use memory::{AgentMemory, GatheredChunk, SearchRecord};
pub use search::{AskRequest, AskResponse, SearchItem, SearchRequest, SearchResponse};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Answer tokens as the synthesis model produces them.
pub type TokenStream = BoxStream<'static, color_eyre::Result<String>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait DecomposeProvider
where
	Self: Send + Sync,
{
	fn decompose<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<DecompositionResult>>;
}

pub trait EvaluateProvider
where
	Self: Send + Sync,
{
	/// Judges whether the gathered evidence answers `query`. `sub_queries` is
	/// the decomposition plan; evidence from follow-up rounds arrives through
	/// `context_summary`.
	fn evaluate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
		sub_queries: &'a [String],
		context_summary: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<EvaluationResult>>;
}

pub trait RewriteProvider
where
	Self: Send + Sync,
{
	fn rewrite<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait AnswerProvider
where
	Self: Send + Sync,
{
	fn answer<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
		evidence: &'a [ScoredPassage],
	) -> BoxFuture<'a, color_eyre::Result<String>>;

	fn answer_stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
		evidence: &'a [ScoredPassage],
	) -> BoxFuture<'a, color_eyre::Result<TokenStream>>;
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	Provider { message: String },
	Index { message: String },
}

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Index { message } => write!(f, "Index error: {message}"),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<tome_index::Error> for ServiceError {
	fn from(err: tome_index::Error) -> Self {
		Self::Index { message: err.to_string() }
	}
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub decompose: Arc<dyn DecomposeProvider>,
	pub evaluate: Arc<dyn EvaluateProvider>,
	pub rewrite: Arc<dyn RewriteProvider>,
	pub answer: Arc<dyn AnswerProvider>,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(rerank::rerank(cfg, query, docs))
	}
}

impl DecomposeProvider for DefaultProviders {
	fn decompose<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<DecompositionResult>> {
		Box::pin(decompose::decompose(cfg, query))
	}
}

impl EvaluateProvider for DefaultProviders {
	fn evaluate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
		sub_queries: &'a [String],
		context_summary: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<EvaluationResult>> {
		Box::pin(evaluate::evaluate(cfg, query, sub_queries, context_summary))
	}
}

impl RewriteProvider for DefaultProviders {
	fn rewrite<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(rewrite::rewrite(cfg, query))
	}
}

impl AnswerProvider for DefaultProviders {
	fn answer<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
		evidence: &'a [ScoredPassage],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(answer::answer(cfg, query, evidence))
	}

	fn answer_stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
		evidence: &'a [ScoredPassage],
	) -> BoxFuture<'a, color_eyre::Result<TokenStream>> {
		Box::pin(async move {
			let stream = answer::answer_stream(cfg, query, evidence).await?;

			Ok(Box::pin(stream) as TokenStream)
		})
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		decompose: Arc<dyn DecomposeProvider>,
		evaluate: Arc<dyn EvaluateProvider>,
		rewrite: Arc<dyn RewriteProvider>,
		answer: Arc<dyn AnswerProvider>,
	) -> Self {
		Self { embedding, rerank, decompose, evaluate, rewrite, answer }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			rerank: provider.clone(),
			decompose: provider.clone(),
			evaluate: provider.clone(),
			rewrite: provider.clone(),
			answer: provider,
		}
	}
}

pub struct Service {
	pub cfg: Config,
	pub store: PassageStore,
	pub vector: Arc<dyn VectorIndex>,
	pub keyword: Option<Bm25Index>,
	pub providers: Providers,
}

impl Service {
	/// Builds the keyword index from the passage store when enabled; the
	/// vector index is expected to cover the same corpus.
	pub fn new(
		cfg: Config,
		store: PassageStore,
		vector: Arc<dyn VectorIndex>,
		providers: Providers,
	) -> Self {
		let keyword = cfg.index.keyword.enabled.then(|| {
			Bm25Index::build(store.iter(), cfg.index.keyword.k1, cfg.index.keyword.b)
		});

		if let Some(index) = &keyword {
			tracing::info!(documents = index.doc_count(), "Keyword index built.");
		}

		Self { cfg, store, vector, keyword, providers }
	}
}
