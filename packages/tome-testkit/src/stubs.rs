//! Deterministic provider doubles. None of them touch the network.

use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use color_eyre::eyre;
use futures::StreamExt;
use tome_config::{EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use tome_domain::{
	DecompositionResult, EvaluationResult, QueryType, ScoredPassage, tokenize::tokenize_terms,
};
use tome_service::{
	AnswerProvider, BoxFuture, DecomposeProvider, EmbeddingProvider, EvaluateProvider,
	Providers, RerankProvider, RewriteProvider, TokenStream,
};

fn fnv1a(term: &str) -> u64 {
	let mut hash: u64 = 0xcbf29ce484222325;

	for byte in term.as_bytes() {
		hash ^= *byte as u64;
		hash = hash.wrapping_mul(0x100000001b3);
	}

	hash
}

/// Bag-of-words embedding over hashed term buckets, L2-normalized.
///
/// Deterministic, so corpus vectors built at test setup and query vectors
/// built through the provider trait live in the same space.
pub struct HashEmbedding {
	dim: usize,
}

impl HashEmbedding {
	pub fn new(dim: usize) -> Self {
		Self { dim }
	}

	pub fn vector(&self, text: &str) -> Vec<f32> {
		let mut out = vec![0.0f32; self.dim];

		for term in tokenize_terms(text) {
			out[(fnv1a(&term) % self.dim as u64) as usize] += 1.0;
		}

		let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();

		if norm > 0.0 {
			for v in &mut out {
				*v /= norm;
			}
		}

		out
	}
}

impl EmbeddingProvider for HashEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(texts.iter().map(|text| self.vector(text)).collect()) })
	}
}

/// Brute-force cosine search over pre-computed vectors.
pub struct InMemoryVectorIndex {
	vectors: Vec<Vec<f32>>,
}

impl InMemoryVectorIndex {
	pub fn new(vectors: Vec<Vec<f32>>) -> Self {
		Self { vectors }
	}
}

impl tome_index::VectorIndex for InMemoryVectorIndex {
	fn query<'a>(
		&'a self,
		embedding: &'a [f32],
		top_k: u32,
	) -> tome_index::BoxFuture<'a, tome_index::Result<Vec<(u32, f32)>>> {
		Box::pin(async move {
			let mut ranked: Vec<(u32, f32)> = self
				.vectors
				.iter()
				.enumerate()
				.map(|(id, vector)| {
					let dot =
						vector.iter().zip(embedding).map(|(a, b)| a * b).sum::<f32>();

					(id as u32, dot)
				})
				.filter(|(_, score)| *score > 0.0)
				.collect();

			ranked.sort_by(|(left_id, left), (right_id, right)| {
				right
					.partial_cmp(left)
					.unwrap_or(std::cmp::Ordering::Equal)
					.then_with(|| left_id.cmp(right_id))
			});
			ranked.truncate(top_k as usize);

			Ok(ranked)
		})
	}
}

/// Rerank double that counts invocations. With no scripted scores it returns
/// a descending ramp, preserving the incoming order.
pub struct ScriptedRerank {
	scores: Vec<f32>,
	calls: AtomicUsize,
}

impl ScriptedRerank {
	pub fn passthrough() -> Self {
		Self { scores: Vec::new(), calls: AtomicUsize::new(0) }
	}

	pub fn with_scores(scores: Vec<f32>) -> Self {
		Self { scores, calls: AtomicUsize::new(0) }
	}

	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl RerankProvider for ScriptedRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let scores = if self.scores.is_empty() {
				(0..docs.len()).map(|i| 1.0 - i as f32 / docs.len() as f32).collect()
			} else {
				let mut scores = self.scores.clone();

				scores.resize(docs.len(), 0.0);

				scores
			};

			Ok(scores)
		})
	}
}

/// Decomposition double with a fixed classification.
pub enum StaticDecompose {
	Simple,
	Complex(Vec<String>),
}

impl DecomposeProvider for StaticDecompose {
	fn decompose<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<DecompositionResult>> {
		Box::pin(async move {
			let result = match self {
				Self::Simple => DecompositionResult::normalized(
					QueryType::Simple,
					vec![query.to_string()],
					"stub".to_string(),
					query,
				),
				Self::Complex(sub_queries) => DecompositionResult::normalized(
					QueryType::Complex,
					sub_queries.clone(),
					"stub".to_string(),
					query,
				),
			};

			Ok(result)
		})
	}
}

pub struct FailingDecompose;

impl DecomposeProvider for FailingDecompose {
	fn decompose<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_query: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<DecompositionResult>> {
		Box::pin(async move { Err(eyre::eyre!("decompose stub failure")) })
	}
}

/// Evaluation double that always reports the same confidence.
pub struct ConstantEvaluate {
	pub confidence: f32,
	pub follow_up_queries: Vec<String>,
}

impl ConstantEvaluate {
	pub fn confident() -> Self {
		Self { confidence: 1.0, follow_up_queries: Vec::new() }
	}

	pub fn insufficient(follow_up_queries: Vec<String>) -> Self {
		Self { confidence: 0.0, follow_up_queries }
	}
}

impl EvaluateProvider for ConstantEvaluate {
	fn evaluate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_query: &'a str,
		_searched: &'a [String],
		_context_summary: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<EvaluationResult>> {
		Box::pin(async move {
			Ok(EvaluationResult {
				is_sufficient: self.confidence >= 0.7,
				confidence: self.confidence,
				missing_aspects: Vec::new(),
				follow_up_queries: self.follow_up_queries.clone(),
				reasoning: "stub".to_string(),
			})
		})
	}
}

/// Evaluation double that replays a scripted sequence of results, then keeps
/// returning the terminating fallback.
pub struct QueueEvaluate {
	queue: Mutex<VecDeque<EvaluationResult>>,
}

impl QueueEvaluate {
	pub fn new(results: Vec<EvaluationResult>) -> Self {
		Self { queue: Mutex::new(results.into()) }
	}
}

impl EvaluateProvider for QueueEvaluate {
	fn evaluate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_query: &'a str,
		_searched: &'a [String],
		_context_summary: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<EvaluationResult>> {
		Box::pin(async move {
			let next = self
				.queue
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.pop_front()
				.unwrap_or_else(|| EvaluationResult::fallback("queue exhausted"));

			Ok(next)
		})
	}
}

/// Evaluation double that records every query list it is shown while
/// replaying scripted results, terminating once the script runs out.
pub struct RecordingEvaluate {
	seen: Mutex<Vec<Vec<String>>>,
	queue: Mutex<VecDeque<EvaluationResult>>,
}

impl RecordingEvaluate {
	pub fn new(results: Vec<EvaluationResult>) -> Self {
		Self { seen: Mutex::new(Vec::new()), queue: Mutex::new(results.into()) }
	}

	pub fn seen(&self) -> Vec<Vec<String>> {
		self.seen.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}

impl EvaluateProvider for RecordingEvaluate {
	fn evaluate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_query: &'a str,
		sub_queries: &'a [String],
		_context_summary: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<EvaluationResult>> {
		Box::pin(async move {
			self.seen
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.push(sub_queries.to_vec());

			let next = self
				.queue
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.pop_front()
				.unwrap_or_else(|| EvaluationResult::fallback("queue exhausted"));

			Ok(next)
		})
	}
}

pub struct FailingEvaluate;

impl EvaluateProvider for FailingEvaluate {
	fn evaluate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_query: &'a str,
		_searched: &'a [String],
		_context_summary: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<EvaluationResult>> {
		Box::pin(async move { Err(eyre::eyre!("evaluate stub failure")) })
	}
}

pub struct IdentityRewrite;

impl RewriteProvider for IdentityRewrite {
	fn rewrite<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move { Ok(query.to_string()) })
	}
}

/// Answer double that renders a deterministic sentence from the evidence and
/// streams it word by word.
pub struct TemplateAnswer;

impl TemplateAnswer {
	fn render(query: &str, evidence: &[ScoredPassage]) -> String {
		format!("Answer to \"{query}\" drawn from {} passages.", evidence.len())
	}
}

impl AnswerProvider for TemplateAnswer {
	fn answer<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		query: &'a str,
		evidence: &'a [ScoredPassage],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move { Ok(Self::render(query, evidence)) })
	}

	fn answer_stream<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		query: &'a str,
		evidence: &'a [ScoredPassage],
	) -> BoxFuture<'a, color_eyre::Result<TokenStream>> {
		Box::pin(async move {
			let tokens: Vec<color_eyre::Result<String>> = Self::render(query, evidence)
				.split_inclusive(' ')
				.map(|token| Ok(token.to_string()))
				.collect();

			Ok(futures::stream::iter(tokens).boxed() as TokenStream)
		})
	}
}

/// Default stub wiring: simple decomposition, confident evaluation, identity
/// rewrite, templated answers.
pub fn stub_providers() -> Providers {
	Providers::new(
		Arc::new(HashEmbedding::new(crate::TEST_VECTOR_DIM as usize)),
		Arc::new(ScriptedRerank::passthrough()),
		Arc::new(StaticDecompose::Simple),
		Arc::new(ConstantEvaluate::confident()),
		Arc::new(IdentityRewrite),
		Arc::new(TemplateAnswer),
	)
}
