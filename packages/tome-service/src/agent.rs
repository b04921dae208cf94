use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use tome_domain::{DecompositionResult, EvaluationResult, QueryType, ScoredPassage};

use crate::{
	AgentMemory, Service, ServiceError, ServiceResult,
	memory::SearchRecord,
	search::{AskRequest, SearchItem, evidence_or_placeholder},
};

/// Progress events emitted over the streaming interface, in session order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
	Decompose { query_type: QueryType, sub_queries: Vec<String>, reasoning: String },
	SearchStart { iteration: u32, query: String },
	SearchDone { iteration: u32, query: String, results: usize, added: usize, total: usize },
	Evaluate { iteration: u32, confidence: f32, is_sufficient: bool, follow_up_queries: Vec<String> },
	Sources { sources: Vec<SearchItem> },
	Synthesize { chunk_count: usize },
	Token { token: String },
	Done { session_id: Uuid, answer: String, iterations: u32, confidence: Option<f32> },
	Error { message: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgenticResult {
	pub session_id: Uuid,
	pub query: String,
	pub query_type: QueryType,
	pub sub_queries: Vec<String>,
	pub iterations: u32,
	pub confidence: Option<f32>,
	pub answer: String,
	pub sources: Vec<SearchItem>,
	pub search_records: Vec<SearchRecord>,
	pub total_chunks: usize,
}

fn emit(tx: Option<&UnboundedSender<AgentEvent>>, event: AgentEvent) {
	if let Some(tx) = tx {
		// A dropped receiver just means the client went away.
		let _ = tx.send(event);
	}
}

impl Service {
	/// Blocking agentic question answering.
	pub async fn agent_ask(&self, req: AskRequest) -> ServiceResult<AgenticResult> {
		self.run_agent(&req.query, None).await
	}

	/// Streaming agentic question answering. The session runs on its own task
	/// and the returned stream yields [`AgentEvent`]s until `done` or `error`.
	pub fn agent_ask_stream(
		self: Arc<Self>,
		query: String,
	) -> UnboundedReceiverStream<AgentEvent> {
		let (tx, rx) = mpsc::unbounded_channel();

		tokio::spawn(async move {
			if let Err(err) = self.run_agent(&query, Some(&tx)).await {
				let _ = tx.send(AgentEvent::Error { message: err.to_string() });
			}
		});

		UnboundedReceiverStream::new(rx)
	}

	async fn run_agent(
		&self,
		query: &str,
		tx: Option<&UnboundedSender<AgentEvent>>,
	) -> ServiceResult<AgenticResult> {
		let query = query.trim();

		if query.is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "query must not be empty".to_string(),
			});
		}

		let session_id = Uuid::new_v4();
		let agent_cfg = &self.cfg.agent;
		let decomposition = match self
			.providers
			.decompose
			.decompose(&self.cfg.providers.planner, query)
			.await
		{
			Ok(decomposition) => decomposition,
			Err(err) => {
				tracing::warn!(%session_id, error = %err, "Decomposition failed; searching the query verbatim.");

				DecompositionResult::fallback(query, "decomposition oracle unavailable")
			},
		};

		tracing::info!(
			%session_id,
			query_type = decomposition.query_type.as_str(),
			sub_queries = decomposition.sub_queries.len(),
			"Agent session started."
		);
		emit(tx, AgentEvent::Decompose {
			query_type: decomposition.query_type,
			sub_queries: decomposition.sub_queries.clone(),
			reasoning: decomposition.reasoning.clone(),
		});

		let mut memory = AgentMemory::new();
		let mut round_queries = decomposition.sub_queries.clone();
		let mut iterations = 0;
		let mut confidence = None;

		'rounds: while iterations < agent_cfg.max_iterations {
			iterations += 1;

			for sub_query in &round_queries {
				if memory.chunk_count() >= agent_cfg.max_chunks as usize {
					tracing::info!(%session_id, "Chunk cap reached; stopping retrieval.");

					break 'rounds;
				}
				if memory.has_searched(sub_query) {
					continue;
				}

				emit(tx, AgentEvent::SearchStart {
					iteration: iterations,
					query: sub_query.clone(),
				});

				let search_query = self.effective_query(session_id, sub_query).await;
				let (results, added) = match self
					.retrieve(&search_query, self.cfg.search.top_k_display)
					.await
				{
					Ok((items, _)) => {
						let added = memory.add_results(sub_query, &items, iterations);

						(items.len(), added)
					},
					Err(err) => {
						// One failed search does not end the session.
						tracing::warn!(%session_id, error = %err, "Sub-query search failed.");

						memory.add_results(sub_query, &[], iterations);

						(0, 0)
					},
				};

				emit(tx, AgentEvent::SearchDone {
					iteration: iterations,
					query: sub_query.clone(),
					results,
					added,
					total: memory.chunk_count(),
				});
			}

			// A simple question gets one retrieval round, no sufficiency
			// oracle.
			if decomposition.query_type == QueryType::Simple {
				break;
			}
			if memory.chunk_count() >= agent_cfg.max_chunks as usize
				|| iterations >= agent_cfg.max_iterations
			{
				break;
			}

			// The oracle judges against the plan; follow-ups show up in the
			// digest, not in this list.
			let summary = memory.context_summary(agent_cfg.summary_chunks as usize);
			let evaluation = match self
				.providers
				.evaluate
				.evaluate(
					&self.cfg.providers.planner,
					query,
					&decomposition.sub_queries,
					&summary,
				)
				.await
			{
				Ok(evaluation) => evaluation,
				Err(err) => {
					tracing::warn!(%session_id, error = %err, "Sufficiency evaluation failed; terminating.");

					EvaluationResult::fallback("sufficiency oracle unavailable")
				},
			};

			confidence = Some(evaluation.confidence);
			emit(tx, AgentEvent::Evaluate {
				iteration: iterations,
				confidence: evaluation.confidence,
				is_sufficient: evaluation.is_sufficient,
				follow_up_queries: evaluation.follow_up_queries.clone(),
			});

			// The confidence threshold is the stop rule; is_sufficient is the
			// oracle's own opinion and only informative.
			if evaluation.confidence >= agent_cfg.sufficiency_threshold {
				break;
			}

			let follow_ups: Vec<String> = evaluation
				.follow_up_queries
				.iter()
				.map(|fq| fq.trim().to_string())
				.filter(|fq| !fq.is_empty() && !memory.has_searched(fq))
				.collect();

			if follow_ups.is_empty() {
				break;
			}

			round_queries = follow_ups;
		}

		// Cap the synthesis context proportionally to the decomposition so a
		// wide question gets a wide context.
		let limit =
			self.cfg.search.top_k_display as usize * decomposition.sub_queries.len();
		let sources: Vec<SearchItem> = memory
			.balanced_chunks(limit)
			.into_iter()
			.map(|chunk| SearchItem {
				id: chunk.id,
				score: chunk.score,
				text: chunk.text.clone(),
				source: ScoredPassage::new(chunk.text.as_str(), chunk.score)
					.source_title()
					.map(str::to_string),
			})
			.collect();

		emit(tx, AgentEvent::Sources { sources: sources.clone() });
		emit(tx, AgentEvent::Synthesize { chunk_count: sources.len() });

		let evidence = evidence_or_placeholder(&sources);
		let answer = match tx {
			Some(tx) => {
				let mut stream = self
					.providers
					.answer
					.answer_stream(&self.cfg.providers.answer, query, &evidence)
					.await?;
				let mut answer = String::new();

				while let Some(token) = stream.next().await {
					let token = token?;
					let _ = tx.send(AgentEvent::Token { token: token.clone() });

					answer.push_str(&token);
				}

				answer
			},
			None => {
				self.providers
					.answer
					.answer(&self.cfg.providers.answer, query, &evidence)
					.await?
			},
		};

		emit(tx, AgentEvent::Done {
			session_id,
			answer: answer.clone(),
			iterations,
			confidence,
		});
		tracing::info!(%session_id, iterations, chunks = memory.chunk_count(), "Agent session finished.");

		Ok(AgenticResult {
			session_id,
			query: query.to_string(),
			query_type: decomposition.query_type,
			sub_queries: decomposition.sub_queries,
			iterations,
			confidence,
			answer,
			sources,
			search_records: memory.records().to_vec(),
			total_chunks: memory.chunk_count(),
		})
	}

	/// Retrieval form of a sub-query: the rewrite oracle's output when enabled
	/// and usable, the sub-query itself otherwise.
	async fn effective_query(&self, session_id: Uuid, sub_query: &str) -> String {
		if !self.cfg.agent.enable_rewrite {
			return sub_query.to_string();
		}

		match self.providers.rewrite.rewrite(&self.cfg.providers.planner, sub_query).await {
			Ok(rewritten) if !rewritten.trim().is_empty() => rewritten,
			Ok(_) => sub_query.to_string(),
			Err(err) => {
				tracing::warn!(%session_id, error = %err, "Query rewrite failed; using the sub-query as-is.");

				sub_query.to_string()
			},
		}
	}
}
