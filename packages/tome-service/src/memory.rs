use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tome_domain::fingerprint::{fingerprint, normalize_query};

use crate::search::SearchItem;

/// A passage gathered during an agentic session, tagged with the sub-query
/// and iteration that produced its best score.
#[derive(Clone, Debug)]
pub struct GatheredChunk {
	pub id: u32,
	pub text: String,
	pub score: f32,
	pub source_query: String,
	pub iteration: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRecord {
	pub iteration: u32,
	pub query: String,
	pub result_count: usize,
	pub new_chunks: usize,
}

/// Evidence accumulated across retrieval rounds.
///
/// Chunks are deduplicated by text fingerprint; a strictly higher duplicate
/// score overwrites the stored score, source query, and iteration, so scores
/// only ever go up.
#[derive(Default)]
pub struct AgentMemory {
	chunks: Vec<GatheredChunk>,
	by_fingerprint: HashMap<String, usize>,
	records: Vec<SearchRecord>,
	searched: HashSet<String>,
	query_order: Vec<String>,
}

impl AgentMemory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Folds one search's results into memory, returning how many chunks were
	/// actually new.
	pub fn add_results(&mut self, query: &str, items: &[SearchItem], iteration: u32) -> usize {
		self.searched.insert(normalize_query(query));

		if !self.query_order.iter().any(|q| q == query) {
			self.query_order.push(query.to_string());
		}

		let mut new_chunks = 0;

		for item in items {
			let fp = fingerprint(&item.text);

			match self.by_fingerprint.get(&fp) {
				Some(index) => {
					let chunk = &mut self.chunks[*index];

					if item.score > chunk.score {
						chunk.score = item.score;
						chunk.source_query = query.to_string();
						chunk.iteration = iteration;
					}
				},
				None => {
					self.by_fingerprint.insert(fp, self.chunks.len());
					self.chunks.push(GatheredChunk {
						id: item.id,
						text: item.text.clone(),
						score: item.score,
						source_query: query.to_string(),
						iteration,
					});

					new_chunks += 1;
				},
			}
		}

		self.records.push(SearchRecord {
			iteration,
			query: query.to_string(),
			result_count: items.len(),
			new_chunks,
		});

		new_chunks
	}

	pub fn has_searched(&self, query: &str) -> bool {
		self.searched.contains(&normalize_query(query))
	}

	pub fn chunk_count(&self) -> usize {
		self.chunks.len()
	}

	/// Every gathered chunk, best score first.
	pub fn all_chunks(&self) -> Vec<&GatheredChunk> {
		let mut ranked: Vec<&GatheredChunk> = self.chunks.iter().collect();

		ranked.sort_by(|left, right| {
			right.score.partial_cmp(&left.score).unwrap_or(std::cmp::Ordering::Equal)
		});

		ranked
	}

	pub fn records(&self) -> &[SearchRecord] {
		&self.records
	}

	/// Up to `limit` chunks drawn round-robin across source queries in
	/// first-seen order, each query's chunks ordered by descending score.
	///
	/// Keeps one prolific sub-query from crowding the others out of the
	/// synthesis context.
	pub fn balanced_chunks(&self, limit: usize) -> Vec<&GatheredChunk> {
		let mut buckets: Vec<Vec<&GatheredChunk>> = self
			.query_order
			.iter()
			.map(|query| {
				let mut bucket: Vec<&GatheredChunk> = self
					.chunks
					.iter()
					.filter(|chunk| &chunk.source_query == query)
					.collect();

				bucket.sort_by(|left, right| {
					right
						.score
						.partial_cmp(&left.score)
						.unwrap_or(std::cmp::Ordering::Equal)
				});

				bucket
			})
			.collect();
		let mut out = Vec::new();
		let mut round = 0;

		while out.len() < limit {
			let mut picked = false;

			for bucket in &mut buckets {
				if out.len() >= limit {
					break;
				}

				if let Some(chunk) = bucket.get(round) {
					out.push(*chunk);

					picked = true;
				}
			}

			if !picked {
				break;
			}

			round += 1;
		}

		out
	}

	/// Digest of the strongest chunks for the sufficiency oracle. Produced,
	/// never parsed back.
	pub fn context_summary(&self, max_chunks: usize) -> String {
		let mut ranked = self.all_chunks();

		ranked.truncate(max_chunks);

		ranked
			.iter()
			.enumerate()
			.map(|(index, chunk)| {
				let snippet: String = chunk
					.text
					.chars()
					.take(200)
					.map(|ch| if ch == '\n' { ' ' } else { ch })
					.collect();

				format!("[{}] ({:.2}) {snippet}", index + 1, chunk.score)
			})
			.collect::<Vec<_>>()
			.join("\n")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item(id: u32, text: &str, score: f32) -> SearchItem {
		SearchItem { id, score, text: text.to_string(), source: None }
	}

	#[test]
	fn deduplicates_by_fingerprint() {
		let mut memory = AgentMemory::new();

		assert_eq!(memory.add_results("q1", &[item(0, "the habit loop", 0.9)], 1), 1);
		assert_eq!(memory.add_results("q2", &[item(0, "The  Habit Loop", 0.7)], 1), 0);
		assert_eq!(memory.chunk_count(), 1);
		// The lower duplicate score does not overwrite anything.
		assert_eq!(memory.all_chunks()[0].score, 0.9);
		assert_eq!(memory.all_chunks()[0].source_query, "q1");
	}

	#[test]
	fn higher_duplicate_score_takes_over_the_chunk() {
		let mut memory = AgentMemory::new();

		memory.add_results("q1", &[item(0, "compound interest", 0.4)], 1);
		memory.add_results("q2", &[item(0, "compound interest", 0.8)], 2);

		let chunks = memory.all_chunks();

		assert_eq!(chunks[0].score, 0.8);
		assert_eq!(chunks[0].source_query, "q2");
		assert_eq!(chunks[0].iteration, 2);
	}

	#[test]
	fn tracks_searched_queries_normalized() {
		let mut memory = AgentMemory::new();

		memory.add_results("What is BM25?", &[], 1);

		assert!(memory.has_searched("  what is bm25?  "));
		assert!(!memory.has_searched("what is tf-idf?"));
	}

	#[test]
	fn all_chunks_are_sorted_by_score() {
		let mut memory = AgentMemory::new();

		memory.add_results("q", &[
			item(0, "weak", 0.2),
			item(1, "strong", 0.9),
			item(2, "middle", 0.5),
		], 1);

		let scores: Vec<f32> = memory.all_chunks().iter().map(|chunk| chunk.score).collect();

		assert_eq!(scores, vec![0.9, 0.5, 0.2]);
	}

	#[test]
	fn balanced_chunks_round_robin_across_queries() {
		let mut memory = AgentMemory::new();
		let items_a: Vec<SearchItem> =
			(0..5).map(|i| item(i, &format!("passage a{i}"), 0.9 - i as f32 * 0.1)).collect();
		let items_b: Vec<SearchItem> =
			(10..13).map(|i| item(i, &format!("passage b{i}"), 0.8)).collect();
		let items_c = vec![item(20, "passage c", 0.5)];

		memory.add_results("a", &items_a, 1);
		memory.add_results("b", &items_b, 1);
		memory.add_results("c", &items_c, 1);

		let balanced = memory.balanced_chunks(6);
		let sources: Vec<&str> =
			balanced.iter().map(|chunk| chunk.source_query.as_str()).collect();

		assert_eq!(sources, vec!["a", "b", "c", "a", "b", "a"]);
	}

	#[test]
	fn balanced_chunks_orders_within_query_by_score() {
		let mut memory = AgentMemory::new();

		memory.add_results("q", &[
			item(0, "weak match", 0.2),
			item(1, "strong match", 0.9),
		], 1);

		let balanced = memory.balanced_chunks(10);

		assert_eq!(balanced[0].text, "strong match");
		assert_eq!(balanced[1].text, "weak match");
	}

	#[test]
	fn overlapping_result_sets_keep_distinct_chunks_once() {
		let mut memory = AgentMemory::new();
		let first: Vec<SearchItem> =
			(0..5).map(|i| item(i, &format!("passage {i}"), 0.8)).collect();
		// Two of the second batch duplicate the first batch's text.
		let second: Vec<SearchItem> = [3, 4, 5, 6, 7]
			.into_iter()
			.map(|i| item(i, &format!("passage {i}"), 0.6))
			.collect();

		assert_eq!(memory.add_results("q1", &first, 1), 5);
		assert_eq!(memory.add_results("q2", &second, 1), 3);
		assert_eq!(memory.chunk_count(), 8);
	}

	#[test]
	fn summary_ranks_and_bounds_chunks() {
		let mut memory = AgentMemory::new();

		memory.add_results("q", &[
			item(0, "low scoring passage", 0.1),
			item(1, "top scoring passage", 0.9),
			item(2, "middle passage", 0.5),
		], 1);

		let summary = memory.context_summary(2);
		let lines: Vec<&str> = summary.lines().collect();

		assert_eq!(lines.len(), 2);
		assert!(lines[0].starts_with("[1] (0.90) top scoring passage"));
		assert!(lines[1].starts_with("[2] (0.50) middle passage"));
	}

	#[test]
	fn records_track_each_search() {
		let mut memory = AgentMemory::new();

		memory.add_results("q1", &[item(0, "one", 0.9)], 1);
		memory.add_results("q2", &[item(0, "one", 0.5), item(1, "two", 0.4)], 2);

		let records = memory.records();

		assert_eq!(records.len(), 2);
		assert_eq!(records[0].new_chunks, 1);
		assert_eq!(records[1].iteration, 2);
		assert_eq!(records[1].result_count, 2);
		assert_eq!(records[1].new_chunks, 1);
	}
}
