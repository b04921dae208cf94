/// Characters of passage text that participate in the fingerprint.
///
/// A bounded prefix catches exact and near-duplicates without comparing whole
/// passages.
pub const FINGERPRINT_PREFIX_CHARS: usize = 200;

/// Normalized fingerprint used to deduplicate gathered passages: bounded
/// prefix, collapsed whitespace, lowercased.
pub fn fingerprint(text: &str) -> String {
	let prefix: String = text.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
	let lowered = prefix.to_lowercase();

	lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized form of a query used for searched-before tracking.
pub fn normalize_query(query: &str) -> String {
	query.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn collapses_whitespace_and_case() {
		assert_eq!(fingerprint("  Habit   Loop\n\tbasics "), "habit loop basics");
	}

	#[test]
	fn prefix_bounds_the_fingerprint() {
		let long = "a".repeat(FINGERPRINT_PREFIX_CHARS * 2);
		let fp = fingerprint(&long);

		assert_eq!(fp.chars().count(), FINGERPRINT_PREFIX_CHARS);
	}

	#[test]
	fn same_prefix_same_fingerprint() {
		let head = "x".repeat(FINGERPRINT_PREFIX_CHARS);
		let a = format!("{head} tail one");
		let b = format!("{head} tail two");

		assert_eq!(fingerprint(&a), fingerprint(&b));
	}

	#[test]
	fn normalizes_query_for_tracking() {
		assert_eq!(normalize_query("  What Is BM25?  "), "what is bm25?");
	}
}
