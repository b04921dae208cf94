/// Lowercased alphanumeric terms in order of appearance, duplicates kept.
///
/// Used to build keyword index postings, where term frequency matters.
pub fn tokenize_terms(text: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut current = String::new();

	for ch in text.chars() {
		if ch.is_alphanumeric() {
			current.extend(ch.to_lowercase());
		} else if !current.is_empty() {
			push_term(&mut out, std::mem::take(&mut current));
		}
	}

	if !current.is_empty() {
		push_term(&mut out, current);
	}

	out
}

/// Deduplicated query terms, capped at `max_terms`.
pub fn tokenize_query(query: &str, max_terms: usize) -> Vec<String> {
	let mut out = Vec::new();

	for term in tokenize_terms(query) {
		if out.contains(&term) {
			continue;
		}

		out.push(term);

		if out.len() >= max_terms {
			break;
		}
	}

	out
}

fn push_term(out: &mut Vec<String>, term: String) {
	// Single-character terms are noise in every script we index.
	if term.chars().count() > 1 {
		out.push(term);
	}
}
