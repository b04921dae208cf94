//! Multi-hop controller behavior with scripted oracles.

use std::sync::Arc;

use futures::StreamExt;
use tome_domain::{EvaluationResult, QueryType};
use tome_service::{AgentEvent, AskRequest, Providers, ServiceError};
use tome_testkit::{
	sample_corpus, service_with,
	stubs::{
		ConstantEvaluate, FailingDecompose, FailingEvaluate, HashEmbedding, IdentityRewrite,
		QueueEvaluate, RecordingEvaluate, ScriptedRerank, StaticDecompose, TemplateAnswer,
	},
	test_config,
};

fn providers_with(
	decompose: Arc<dyn tome_service::DecomposeProvider>,
	evaluate: Arc<dyn tome_service::EvaluateProvider>,
) -> Providers {
	Providers::new(
		Arc::new(HashEmbedding::new(tome_testkit::TEST_VECTOR_DIM as usize)),
		Arc::new(ScriptedRerank::passthrough()),
		decompose,
		evaluate,
		Arc::new(IdentityRewrite),
		Arc::new(TemplateAnswer),
	)
}

fn insufficient(follow_up: &str) -> EvaluationResult {
	EvaluationResult {
		is_sufficient: false,
		confidence: 0.0,
		missing_aspects: Vec::new(),
		follow_up_queries: vec![follow_up.to_string()],
		reasoning: "scripted".to_string(),
	}
}

#[tokio::test]
async fn simple_query_runs_one_round_without_evaluation() {
	// A failing evaluator proves the simple path never consults it.
	let providers = providers_with(
		Arc::new(StaticDecompose::Simple),
		Arc::new(FailingEvaluate),
	);
	let service = service_with(test_config(), sample_corpus(), providers);
	let result = service
		.agent_ask(AskRequest { query: "what is the habit loop".to_string() })
		.await
		.expect("agent failed");

	assert_eq!(result.query_type, QueryType::Simple);
	assert_eq!(result.iterations, 1);
	assert_eq!(result.confidence, None);
	assert!(!result.sources.is_empty());
	assert!(result.answer.contains("what is the habit loop"));
}

#[tokio::test]
async fn complex_query_gathers_evidence_from_every_sub_query() {
	let providers = providers_with(
		Arc::new(StaticDecompose::Complex(vec![
			"what is the habit loop".to_string(),
			"how does compounding work".to_string(),
		])),
		Arc::new(ConstantEvaluate::confident()),
	);
	let service = service_with(test_config(), sample_corpus(), providers);
	let result = service
		.agent_ask(AskRequest {
			query: "compare the habit loop with compounding".to_string(),
		})
		.await
		.expect("agent failed");

	assert_eq!(result.query_type, QueryType::Complex);
	assert_eq!(result.iterations, 1);
	assert_eq!(result.confidence, Some(1.0));
	// Evidence from both topics makes it into the balanced context.
	assert!(result.sources.iter().any(|item| item.id <= 2));
	assert!(result.sources.iter().any(|item| item.id >= 3));
	// One record per sub-query, all from the first round.
	assert_eq!(result.search_records.len(), 2);
	assert!(result.search_records.iter().all(|record| record.iteration == 1));
	assert!(result.total_chunks >= result.sources.len());
}

#[tokio::test]
async fn low_confidence_spawns_follow_up_rounds_until_the_iteration_cap() {
	let providers = providers_with(
		Arc::new(StaticDecompose::Complex(vec![
			"habit loop".to_string(),
			"compound interest".to_string(),
		])),
		Arc::new(QueueEvaluate::new(vec![
			insufficient("habit stacking"),
			insufficient("tail events in investing"),
			insufficient("saving money"),
		])),
	);
	let service = service_with(test_config(), sample_corpus(), providers);
	let result = service
		.agent_ask(AskRequest { query: "habits and money".to_string() })
		.await
		.expect("agent failed");

	// max_iterations is 3 by default; the session must not exceed it even
	// though the oracle never reports sufficiency.
	assert_eq!(result.iterations, 3);
	assert_eq!(result.confidence, Some(0.0));
	assert!(result.search_records.iter().any(|record| record.iteration == 3));
}

#[tokio::test]
async fn repeated_follow_ups_end_the_session_early() {
	// The oracle keeps proposing a query that was already searched.
	let providers = providers_with(
		Arc::new(StaticDecompose::Complex(vec![
			"habit loop".to_string(),
			"habit stacking".to_string(),
		])),
		Arc::new(ConstantEvaluate::insufficient(vec!["habit loop".to_string()])),
	);
	let service = service_with(test_config(), sample_corpus(), providers);
	let result = service
		.agent_ask(AskRequest { query: "habits".to_string() })
		.await
		.expect("agent failed");

	assert_eq!(result.iterations, 1);
}

#[tokio::test]
async fn chunk_cap_halts_retrieval_before_evaluation() {
	// A failing evaluator proves the capped session never consults it.
	let providers = providers_with(
		Arc::new(StaticDecompose::Complex(vec![
			"habit loop".to_string(),
			"compound interest".to_string(),
		])),
		Arc::new(FailingEvaluate),
	);
	let mut cfg = test_config();

	cfg.agent.max_chunks = 2;

	let service = service_with(cfg, sample_corpus(), providers);
	let result = service
		.agent_ask(AskRequest { query: "habits and money".to_string() })
		.await
		.expect("agent failed");

	// The first sub-query alone fills the cap; the second is never searched
	// and no evaluation runs.
	assert_eq!(result.search_records.len(), 1);
	assert_eq!(result.iterations, 1);
	assert_eq!(result.confidence, None);
	assert!(result.total_chunks >= 2);
}

#[tokio::test]
async fn duplicate_evidence_is_stored_once() {
	// Both sub-queries hit the same passages; memory must not double-count.
	let providers = providers_with(
		Arc::new(StaticDecompose::Complex(vec![
			"habit loop cue reward".to_string(),
			"the habit loop".to_string(),
		])),
		Arc::new(ConstantEvaluate::confident()),
	);
	let service = service_with(test_config(), sample_corpus(), providers);
	let result = service
		.agent_ask(AskRequest { query: "habit loop".to_string() })
		.await
		.expect("agent failed");
	let mut ids: Vec<u32> = result.sources.iter().map(|item| item.id).collect();
	let before = ids.len();

	ids.sort_unstable();
	ids.dedup();

	assert_eq!(ids.len(), before);
}

#[tokio::test]
async fn decompose_failure_falls_back_to_the_verbatim_query() {
	let providers = providers_with(
		Arc::new(FailingDecompose),
		Arc::new(ConstantEvaluate::confident()),
	);
	let service = service_with(test_config(), sample_corpus(), providers);
	let result = service
		.agent_ask(AskRequest { query: "what is habit stacking".to_string() })
		.await
		.expect("agent failed");

	assert_eq!(result.query_type, QueryType::Simple);
	assert_eq!(result.sub_queries, vec!["what is habit stacking"]);
	assert!(!result.sources.is_empty());
}

#[tokio::test]
async fn evaluate_failure_terminates_with_full_confidence() {
	let providers = providers_with(
		Arc::new(StaticDecompose::Complex(vec![
			"habit loop".to_string(),
			"compound interest".to_string(),
		])),
		Arc::new(FailingEvaluate),
	);
	let service = service_with(test_config(), sample_corpus(), providers);
	let result = service
		.agent_ask(AskRequest { query: "habits and money".to_string() })
		.await
		.expect("agent failed");

	assert_eq!(result.iterations, 1);
	assert_eq!(result.confidence, Some(1.0));
}

#[tokio::test]
async fn evaluator_always_receives_the_planned_sub_queries() {
	let evaluate = Arc::new(RecordingEvaluate::new(vec![insufficient("habit stacking")]));
	let providers = providers_with(
		Arc::new(StaticDecompose::Complex(vec![
			"habit loop".to_string(),
			"compound interest".to_string(),
		])),
		evaluate.clone(),
	);
	let service = service_with(test_config(), sample_corpus(), providers);

	service
		.agent_ask(AskRequest { query: "habits and money".to_string() })
		.await
		.expect("agent failed");

	let seen = evaluate.seen();

	// One evaluation per round; follow-up rounds still report the plan, not
	// the follow-up queries.
	assert_eq!(seen.len(), 2);
	assert!(seen.iter().all(|queries| queries == &["habit loop", "compound interest"]));
}

#[tokio::test]
async fn blank_query_is_rejected() {
	let service = service_with(test_config(), sample_corpus(), tome_testkit::stubs::stub_providers());
	let err = service
		.agent_ask(AskRequest { query: " ".to_string() })
		.await
		.expect_err("blank query must fail");

	assert!(matches!(err, ServiceError::InvalidRequest { .. }));
}

#[tokio::test]
async fn stream_emits_ordered_events_and_a_matching_answer() {
	let providers = providers_with(
		Arc::new(StaticDecompose::Complex(vec![
			"habit loop".to_string(),
			"compound interest".to_string(),
		])),
		Arc::new(ConstantEvaluate::confident()),
	);
	let service = Arc::new(service_with(test_config(), sample_corpus(), providers));
	let events: Vec<AgentEvent> = service
		.agent_ask_stream("habits and money".to_string())
		.collect()
		.await;

	assert!(matches!(events.first(), Some(AgentEvent::Decompose { .. })));

	let tokens: String = events
		.iter()
		.filter_map(|event| match event {
			AgentEvent::Token { token } => Some(token.as_str()),
			_ => None,
		})
		.collect();
	let Some(AgentEvent::Done { answer, .. }) = events.last() else {
		panic!("stream must end with done");
	};

	assert_eq!(&tokens, answer);
	assert!(events.iter().any(|event| matches!(event, AgentEvent::Sources { sources } if !sources.is_empty())));
	assert!(events.iter().any(|event| matches!(event, AgentEvent::Synthesize { .. })));
}

#[tokio::test]
async fn stream_reports_invalid_input_as_an_error_event() {
	let service = Arc::new(service_with(
		test_config(),
		sample_corpus(),
		tome_testkit::stubs::stub_providers(),
	));
	let events: Vec<AgentEvent> = service.agent_ask_stream("  ".to_string()).collect().await;

	assert!(matches!(events.last(), Some(AgentEvent::Error { .. })));
}
