use serde::{Deserialize, Serialize};

/// A retrieved passage paired with its relevance score.
///
/// Scores are normalized to [0,1] after hybrid merging; cross-encoder scores
/// replace them wholesale when the rerank gate fires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
	pub text: String,
	pub score: f32,
}

impl ScoredPassage {
	pub fn new(text: impl Into<String>, score: f32) -> Self {
		Self { text: text.into(), score }
	}

	/// Provenance title from a `[Title] body` prefix, if the passage carries
	/// one.
	pub fn source_title(&self) -> Option<&str> {
		let rest = self.text.strip_prefix('[')?;
		let end = rest.find(']')?;
		let title = rest[..end].trim();

		if title.is_empty() { None } else { Some(title) }
	}

	/// Single-line snippet of at most `max_chars` characters.
	pub fn snippet(&self, max_chars: usize) -> String {
		let mut out = String::with_capacity(max_chars);

		for ch in self.text.chars().take(max_chars) {
			out.push(if ch == '\n' { ' ' } else { ch });
		}

		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_source_title() {
		let passage = ScoredPassage::new("[Atomic Habits] Small habits compound.", 0.9);

		assert_eq!(passage.source_title(), Some("Atomic Habits"));
	}

	#[test]
	fn missing_title_yields_none() {
		let passage = ScoredPassage::new("No provenance prefix here.", 0.5);

		assert_eq!(passage.source_title(), None);
	}

	#[test]
	fn snippet_flattens_newlines() {
		let passage = ScoredPassage::new("line one\nline two", 0.5);

		assert_eq!(passage.snippet(12), "line one lin");
	}
}
