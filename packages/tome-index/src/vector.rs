use qdrant_client::qdrant::{Query, QueryPointsBuilder, point_id::PointIdOptions};

use crate::{BoxFuture, Result};

/// Nearest-neighbor lookup over passage embeddings.
///
/// The default backing is a Qdrant collection; tests substitute an in-memory
/// implementation.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn query<'a>(
		&'a self,
		embedding: &'a [f32],
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<(u32, f32)>>>;
}

pub struct QdrantIndex {
	client: qdrant_client::Qdrant,
	collection: String,
}

impl QdrantIndex {
	pub fn new(cfg: &tome_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone() })
	}
}

impl VectorIndex for QdrantIndex {
	fn query<'a>(
		&'a self,
		embedding: &'a [f32],
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<(u32, f32)>>> {
		Box::pin(async move {
			let search = QueryPointsBuilder::new(self.collection.clone())
				.query(Query::new_nearest(embedding.to_vec()))
				.limit(top_k as u64);
			let response = self.client.query(search).await.map_err(Box::new)?;
			let mut out = Vec::with_capacity(response.result.len());

			for point in response.result {
				let id = point.id.as_ref().and_then(|id| match id.point_id_options {
					Some(PointIdOptions::Num(num)) => u32::try_from(num).ok(),
					_ => None,
				});
				let Some(id) = id else {
					tracing::warn!("Vector point is missing a numeric identifier.");

					continue;
				};

				out.push((id, point.score));
			}

			Ok(out)
		})
	}
}
