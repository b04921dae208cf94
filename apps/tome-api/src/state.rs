use std::sync::Arc;

use tome_index::{PassageStore, QdrantIndex};
use tome_service::{Providers, Service};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<Service>,
}

impl AppState {
	pub async fn new(config: tome_config::Config) -> color_eyre::Result<Self> {
		let store = PassageStore::load(&config.index.corpus_path)?;

		tracing::info!(passages = store.len(), "Corpus loaded.");

		let vector = Arc::new(QdrantIndex::new(&config.index.qdrant)?);
		let service = Service::new(config, store, vector, Providers::default());

		Ok(Self { service: Arc::new(service) })
	}

	pub fn with_service(service: Service) -> Self {
		Self { service: Arc::new(service) }
	}
}
