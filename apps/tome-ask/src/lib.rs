//! Terminal client for one-shot and interactive question answering.

use std::{
	io::{self, BufRead, Write},
	path::PathBuf,
	sync::Arc,
};

use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use tome_index::{PassageStore, QdrantIndex};
use tome_service::{AgentEvent, AskRequest, Providers, SearchItem, Service};

#[derive(Debug, Parser)]
#[command(
	version = tome_cli::VERSION,
	rename_all = "kebab",
	styles = tome_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Question to answer; omit for an interactive session.
	#[arg(value_name = "QUERY")]
	pub query: Option<String>,
	/// Run the multi-hop agent instead of single-pass retrieval.
	#[arg(long)]
	pub agentic: bool,
	/// Disable sub-query rewriting for this session.
	#[arg(long)]
	pub no_rewrite: bool,
	/// Print the full answer at once instead of streaming tokens.
	#[arg(long)]
	pub no_stream: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let mut config = tome_config::load(&args.config)?;

	if args.no_rewrite {
		config.agent.enable_rewrite = false;
	}

	init_tracing(&config)?;

	let store = PassageStore::load(&config.index.corpus_path)?;
	let vector = Arc::new(QdrantIndex::new(&config.index.qdrant)?);
	let service =
		Arc::new(Service::new(config, store, vector, Providers::default()));

	match args.query {
		Some(ref query) => answer_one(&service, query, &args).await,
		None => interactive(&service, &args).await,
	}
}

async fn interactive(service: &Arc<Service>, args: &Args) -> color_eyre::Result<()> {
	let stdin = io::stdin();

	loop {
		print!("> ");
		io::stdout().flush()?;

		let mut line = String::new();

		if stdin.lock().read_line(&mut line)? == 0 {
			return Ok(());
		}

		let query = line.trim();

		if query.is_empty() {
			continue;
		}
		if query == "exit" || query == "quit" {
			return Ok(());
		}

		if let Err(err) = answer_one(service, query, args).await {
			eprintln!("error: {err}");
		}
	}
}

async fn answer_one(
	service: &Arc<Service>,
	query: &str,
	args: &Args,
) -> color_eyre::Result<()> {
	if !args.agentic {
		let response = service.ask(AskRequest { query: query.to_string() }).await?;

		println!("{}", response.answer);
		print_sources(&response.sources);

		return Ok(());
	}

	if args.no_stream {
		let result = service.agent_ask(AskRequest { query: query.to_string() }).await?;

		println!("{}", result.answer);
		print_sources(&result.sources);

		return Ok(());
	}

	let mut events = service.clone().agent_ask_stream(query.to_string());
	let mut sources = Vec::new();

	while let Some(event) = events.next().await {
		match event {
			AgentEvent::Decompose { query_type, sub_queries, .. } => {
				println!(
					"[plan] {} question, {} sub-queries",
					query_type.as_str(),
					sub_queries.len()
				);
			},
			AgentEvent::SearchStart { query, .. } => println!("[search] {query}"),
			AgentEvent::SearchDone { results, added, .. } => {
				println!("[found] {results} passages, {added} new")
			},
			AgentEvent::Evaluate { confidence, .. } => {
				println!("[evaluate] confidence {confidence:.2}")
			},
			AgentEvent::Sources { sources: gathered } => sources = gathered,
			AgentEvent::Synthesize { chunk_count } => {
				println!("[synthesize] {chunk_count} passages");
				println!();
			},
			AgentEvent::Token { token } => {
				print!("{token}");
				io::stdout().flush()?;
			},
			AgentEvent::Done { .. } => println!(),
			AgentEvent::Error { message } => eprintln!("error: {message}"),
		}
	}

	print_sources(&sources);

	Ok(())
}

fn print_sources(sources: &[SearchItem]) {
	for (index, item) in sources.iter().enumerate() {
		let snippet: String = item
			.text
			.chars()
			.take(100)
			.map(|ch| if ch == '\n' { ' ' } else { ch })
			.collect();

		println!("  [{}] ({:.2}) {snippet}", index + 1, item.score);
	}
}

fn init_tracing(config: &tome_config::Config) -> color_eyre::Result<()> {
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("warn"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}
