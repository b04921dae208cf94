use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tome_domain::{ScoredPassage, tokenize::tokenize_query};

use crate::{Service, ServiceError, ServiceResult};

/// Cap on distinct query terms fed to the keyword index.
const MAX_QUERY_TERMS: usize = 32;

#[derive(Clone, Debug, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	/// Optional display-size override, capped at the retrieval depth.
	#[serde(default)]
	pub top_k: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchItem {
	pub id: u32,
	pub score: f32,
	pub text: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
	pub query: String,
	pub reranked: bool,
	pub items: Vec<SearchItem>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AskRequest {
	pub query: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AskResponse {
	pub query: String,
	pub answer: String,
	pub reranked: bool,
	pub sources: Vec<SearchItem>,
}

/// Min-max normalization to [0,1].
///
/// A flat candidate set carries no ranking signal, so every score maps to 1.0
/// and the other channel decides the order.
pub(crate) fn min_max_normalize(scores: &[(u32, f32)]) -> Vec<(u32, f32)> {
	let Some(first) = scores.first() else {
		return Vec::new();
	};
	let (mut min, mut max) = (first.1, first.1);

	for (_, score) in scores {
		min = min.min(*score);
		max = max.max(*score);
	}

	let range = max - min;

	scores
		.iter()
		.map(|(id, score)| {
			let normalized = if range > f32::EPSILON { (score - min) / range } else { 1.0 };

			(*id, normalized)
		})
		.collect()
}

/// Descending score, ascending identifier on ties. The identifier tie-break
/// makes merged rankings reproducible across runs.
pub(crate) fn sort_ranked(ranked: &mut [(u32, f32)]) {
	ranked.sort_by(|(left_id, left), (right_id, right)| {
		right
			.partial_cmp(left)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then_with(|| left_id.cmp(right_id))
	});
}

/// Weighted union of independently normalized candidate lists. A document
/// absent from one channel contributes zero on that side.
pub(crate) fn hybrid_merge(
	dense: &[(u32, f32)],
	keyword: &[(u32, f32)],
	dense_weight: f32,
	keyword_weight: f32,
) -> Vec<(u32, f32)> {
	let mut merged: HashMap<u32, f32> = HashMap::new();

	for (id, score) in min_max_normalize(dense) {
		*merged.entry(id).or_insert(0.0) += dense_weight * score;
	}
	for (id, score) in min_max_normalize(keyword) {
		*merged.entry(id).or_insert(0.0) += keyword_weight * score;
	}

	let mut out: Vec<(u32, f32)> = merged.into_iter().collect();

	sort_ranked(&mut out);

	out
}

/// Whether the merged ranking is ambiguous enough to warrant a cross-encoder
/// pass. Fires when the top-1/top-2 gap is at or below the threshold.
pub(crate) fn rerank_gate(merged: &[(u32, f32)], gap_threshold: f32) -> bool {
	match merged {
		[(_, top1), (_, top2), ..] => top1 - top2 <= gap_threshold,
		_ => false,
	}
}

impl Service {
	pub async fn search(&self, req: SearchRequest) -> ServiceResult<SearchResponse> {
		let display_k = req
			.top_k
			.unwrap_or(self.cfg.search.top_k_display)
			.min(self.cfg.search.top_k_retrieval);
		let (items, reranked) = self.retrieve(&req.query, display_k).await?;

		Ok(SearchResponse { query: req.query, reranked, items })
	}

	/// Single-pass pipeline: hybrid retrieval straight into answer synthesis.
	pub async fn ask(&self, req: AskRequest) -> ServiceResult<AskResponse> {
		let (items, reranked) =
			self.retrieve(&req.query, self.cfg.search.top_k_display).await?;
		let evidence = evidence_or_placeholder(&items);
		let answer = self
			.providers
			.answer
			.answer(&self.cfg.providers.answer, &req.query, &evidence)
			.await?;

		Ok(AskResponse { query: req.query, answer, reranked, sources: items })
	}

	/// Hybrid retrieval over both indexes with the adaptive rerank gate.
	///
	/// Degrades to a single channel when the other returns nothing or the
	/// keyword index is disabled.
	pub(crate) async fn retrieve(
		&self,
		query: &str,
		display_k: u32,
	) -> ServiceResult<(Vec<SearchItem>, bool)> {
		let query = query.trim();

		if query.is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "query must not be empty".to_string(),
			});
		}

		let retrieval_k = self.cfg.search.top_k_retrieval;
		let embeddings = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &[query.to_string()])
			.await?;
		let embedding = embeddings.first().ok_or_else(|| ServiceError::Provider {
			message: "embedding provider returned no vectors".to_string(),
		})?;
		let dense = self.vector.query(embedding, retrieval_k).await?;
		// With the keyword index disabled the dense channel keeps its full
		// weight. A live channel that merely returns nothing still contributes
		// its zero to the weighted sum, so the other side is scaled by its
		// weight and the gate sees the scaled gap.
		let mut merged = match &self.keyword {
			None => {
				let mut ranked = min_max_normalize(&dense);

				sort_ranked(&mut ranked);

				ranked
			},
			Some(index) => hybrid_merge(
				&dense,
				&index.scores(&tokenize_query(query, MAX_QUERY_TERMS), retrieval_k),
				self.cfg.search.dense_weight,
				self.cfg.search.keyword_weight,
			),
		};

		merged.truncate(retrieval_k as usize);

		let reranked = rerank_gate(&merged, self.cfg.search.rerank_gap_threshold);

		if reranked {
			merged = self.rerank(query, merged).await?;
		}

		merged.truncate(display_k as usize);

		let items = merged
			.into_iter()
			.filter_map(|(id, score)| {
				let Some(text) = self.store.get(id) else {
					tracing::warn!(id, "Ranked passage is missing from the store.");

					return None;
				};
				let source =
					ScoredPassage::new(text, score).source_title().map(str::to_string);

				Some(SearchItem { id, score, text: text.to_string(), source })
			})
			.collect();

		Ok((items, reranked))
	}

	/// Replaces merged scores with cross-encoder relevance and re-sorts.
	async fn rerank(
		&self,
		query: &str,
		merged: Vec<(u32, f32)>,
	) -> ServiceResult<Vec<(u32, f32)>> {
		let docs: Vec<String> = merged
			.iter()
			.map(|(id, _)| self.store.get(*id).unwrap_or_default().to_string())
			.collect();
		let scores =
			self.providers.rerank.rerank(&self.cfg.providers.rerank, query, &docs).await?;
		// Scores are positionally aligned with the docs we sent.
		let mut out: Vec<(u32, f32)> =
			merged.iter().zip(scores).map(|((id, _), reranked)| (*id, reranked)).collect();

		sort_ranked(&mut out);

		Ok(out)
	}
}

/// Placeholder evidence entry: the answer oracle is never called with an
/// empty evidence list.
pub(crate) const NO_EVIDENCE_PASSAGE: &str =
	"No evidence found: no passages in the corpus matched this question.";

pub(crate) fn evidence_or_placeholder(items: &[SearchItem]) -> Vec<ScoredPassage> {
	if items.is_empty() {
		return vec![ScoredPassage::new(NO_EVIDENCE_PASSAGE, 0.0)];
	}

	items.iter().map(|item| ScoredPassage::new(item.text.clone(), item.score)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalization_maps_to_unit_interval() {
		let normalized = min_max_normalize(&[(0, 2.0), (1, 6.0), (2, 4.0)]);

		assert_eq!(normalized, vec![(0, 0.0), (1, 1.0), (2, 0.5)]);
	}

	#[test]
	fn flat_scores_normalize_to_one() {
		let normalized = min_max_normalize(&[(0, 3.0), (1, 3.0)]);

		assert_eq!(normalized, vec![(0, 1.0), (1, 1.0)]);
	}

	#[test]
	fn empty_input_normalizes_to_empty() {
		assert!(min_max_normalize(&[]).is_empty());
	}

	#[test]
	fn merge_weights_both_channels() {
		let dense = [(0, 1.0), (1, 0.0)];
		let keyword = [(1, 10.0), (2, 0.0)];
		let merged = hybrid_merge(&dense, &keyword, 0.7, 0.3);

		// 0: 0.7*1.0, 1: 0.3*1.0, 2: 0.0.
		assert_eq!(merged[0].0, 0);
		assert!((merged[0].1 - 0.7).abs() < 1e-6);
		assert_eq!(merged[1].0, 1);
		assert!((merged[1].1 - 0.3).abs() < 1e-6);
		assert_eq!(merged[2].0, 2);
	}

	#[test]
	fn one_sided_merge_keeps_the_channel_weight() {
		// An empty side contributes zero; the live side is not rescaled to
		// identity.
		let merged = hybrid_merge(&[(0, 4.0), (1, 2.0)], &[], 0.7, 0.3);

		assert!((merged[0].1 - 0.7).abs() < 1e-6);
		assert!(merged[1].1.abs() < 1e-6);
	}

	#[test]
	fn merge_ties_break_by_ascending_id() {
		let dense = [(7, 1.0), (3, 1.0)];
		let merged = hybrid_merge(&dense, &[], 1.0, 0.0);

		assert_eq!(merged[0].0, 3);
		assert_eq!(merged[1].0, 7);
	}

	#[test]
	fn gate_fires_at_and_below_threshold() {
		assert!(rerank_gate(&[(0, 0.80), (1, 0.70)], 0.10));
		assert!(rerank_gate(&[(0, 0.80), (1, 0.75)], 0.10));
		assert!(!rerank_gate(&[(0, 0.80), (1, 0.60)], 0.10));
	}

	#[test]
	fn gate_stays_closed_for_short_rankings() {
		assert!(!rerank_gate(&[(0, 0.9)], 0.5));
		assert!(!rerank_gate(&[], 0.5));
	}
}
