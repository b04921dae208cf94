use std::collections::HashMap;

use tome_domain::tokenize::tokenize_terms;

/// In-memory BM25 index over the passage corpus.
///
/// Built once at startup from the same corpus array the vector collection was
/// indexed from, so document identifiers line up with passage store
/// positions.
pub struct Bm25Index {
	postings: HashMap<String, Vec<(u32, u32)>>,
	doc_lens: Vec<u32>,
	avg_doc_len: f32,
	k1: f32,
	b: f32,
}

impl Bm25Index {
	pub fn build<'a>(passages: impl Iterator<Item = &'a str>, k1: f32, b: f32) -> Self {
		let mut postings: HashMap<String, Vec<(u32, u32)>> = HashMap::new();
		let mut doc_lens = Vec::new();

		for (doc_id, passage) in passages.enumerate() {
			let terms = tokenize_terms(passage);
			let mut freqs: HashMap<String, u32> = HashMap::new();

			for term in &terms {
				*freqs.entry(term.clone()).or_insert(0) += 1;
			}

			doc_lens.push(terms.len() as u32);

			for (term, tf) in freqs {
				postings.entry(term).or_default().push((doc_id as u32, tf));
			}
		}

		let total: u64 = doc_lens.iter().map(|len| *len as u64).sum();
		let avg_doc_len = if doc_lens.is_empty() {
			0.0
		} else {
			total as f32 / doc_lens.len() as f32
		};

		Self { postings, doc_lens, avg_doc_len, k1, b }
	}

	pub fn doc_count(&self) -> usize {
		self.doc_lens.len()
	}

	/// Top `top_k` documents by BM25 score for the given query terms,
	/// descending, zero scores excluded, ties broken by ascending document
	/// identifier.
	pub fn scores(&self, query_terms: &[String], top_k: u32) -> Vec<(u32, f32)> {
		if query_terms.is_empty() || self.doc_lens.is_empty() || top_k == 0 {
			return Vec::new();
		}

		let n_docs = self.doc_lens.len() as f32;
		let mut accum: HashMap<u32, f32> = HashMap::new();

		for term in query_terms {
			let Some(posting) = self.postings.get(term) else { continue };
			let df = posting.len() as f32;
			let idf = ((n_docs - df + 0.5) / (df + 0.5) + 1.0).ln();

			for (doc_id, tf) in posting {
				let tf = *tf as f32;
				let doc_len = self.doc_lens[*doc_id as usize] as f32;
				let norm = if self.avg_doc_len > 0.0 {
					1.0 - self.b + self.b * doc_len / self.avg_doc_len
				} else {
					1.0
				};
				let score = idf * tf * (self.k1 + 1.0) / (tf + self.k1 * norm);

				*accum.entry(*doc_id).or_insert(0.0) += score;
			}
		}

		let mut out: Vec<(u32, f32)> =
			accum.into_iter().filter(|(_, score)| *score > 0.0).collect();

		out.sort_by(|(left_id, left), (right_id, right)| {
			right
				.partial_cmp(left)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| left_id.cmp(right_id))
		});
		out.truncate(top_k as usize);

		out
	}
}
