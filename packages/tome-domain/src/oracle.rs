use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
	Simple,
	Complex,
}

impl QueryType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Simple => "simple",
			Self::Complex => "complex",
		}
	}
}

/// Decomposition oracle output.
///
/// `sub_queries` is never empty; a single entry forces [`QueryType::Simple`]
/// regardless of what the oracle labeled the query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecompositionResult {
	pub query_type: QueryType,
	pub sub_queries: Vec<String>,
	pub reasoning: String,
}

impl DecompositionResult {
	/// Applies the structural invariants to a raw oracle reply: an empty
	/// sub-query list falls back to the original query, and a single
	/// sub-query is always classified simple.
	pub fn normalized(
		query_type: QueryType,
		mut sub_queries: Vec<String>,
		reasoning: String,
		original_query: &str,
	) -> Self {
		sub_queries.retain(|sq| !sq.trim().is_empty());

		if sub_queries.is_empty() {
			sub_queries.push(original_query.to_string());
		}

		let query_type =
			if sub_queries.len() == 1 { QueryType::Simple } else { query_type };

		Self { query_type, sub_queries, reasoning }
	}

	/// Fallback used when the oracle call fails: treat the query as simple
	/// and search it verbatim.
	pub fn fallback(original_query: &str, reasoning: impl Into<String>) -> Self {
		Self {
			query_type: QueryType::Simple,
			sub_queries: vec![original_query.to_string()],
			reasoning: reasoning.into(),
		}
	}
}

/// Sufficiency oracle output.
///
/// `is_sufficient` is advisory; the controller derives its stop decision from
/// `confidence` against the configured threshold.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationResult {
	pub is_sufficient: bool,
	pub confidence: f32,
	#[serde(default)]
	pub missing_aspects: Vec<String>,
	#[serde(default)]
	pub follow_up_queries: Vec<String>,
	#[serde(default)]
	pub reasoning: String,
}

impl EvaluationResult {
	/// Fallback used when the oracle call fails: report full confidence so
	/// the session terminates instead of looping on a broken oracle.
	pub fn fallback(reasoning: impl Into<String>) -> Self {
		Self {
			is_sufficient: true,
			confidence: 1.0,
			missing_aspects: Vec::new(),
			follow_up_queries: Vec::new(),
			reasoning: reasoning.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn single_sub_query_forces_simple() {
		let result = DecompositionResult::normalized(
			QueryType::Complex,
			vec!["only one".to_string()],
			String::new(),
			"only one",
		);

		assert_eq!(result.query_type, QueryType::Simple);
	}

	#[test]
	fn empty_sub_queries_fall_back_to_original() {
		let result = DecompositionResult::normalized(
			QueryType::Complex,
			vec!["  ".to_string()],
			String::new(),
			"original question",
		);

		assert_eq!(result.sub_queries, vec!["original question"]);
		assert_eq!(result.query_type, QueryType::Simple);
	}

	#[test]
	fn multi_sub_query_keeps_complex() {
		let result = DecompositionResult::normalized(
			QueryType::Complex,
			vec!["part a".to_string(), "part b".to_string()],
			String::new(),
			"compare a and b",
		);

		assert_eq!(result.query_type, QueryType::Complex);
		assert_eq!(result.sub_queries.len(), 2);
	}

	#[test]
	fn evaluation_fallback_terminates() {
		let result = EvaluationResult::fallback("timeout");

		assert!(result.is_sufficient);
		assert_eq!(result.confidence, 1.0);
		assert!(result.follow_up_queries.is_empty());
	}

	#[test]
	fn query_type_serializes_snake_case() {
		let json = serde_json::to_string(&QueryType::Complex).expect("serialize failed");

		assert_eq!(json, "\"complex\"");
	}
}
