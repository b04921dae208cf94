#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read corpus file at {path:?}.")]
	ReadCorpus { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse corpus file at {path:?}.")]
	ParseCorpus { path: std::path::PathBuf, source: serde_json::Error },
	#[error("Corpus file at {path:?} contains no passages.")]
	EmptyCorpus { path: std::path::PathBuf },
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
