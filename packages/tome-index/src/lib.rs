pub mod keyword;
pub mod store;
pub mod vector;

mod error;

pub use error::Error;
pub use keyword::Bm25Index;
pub use store::PassageStore;
pub use vector::{QdrantIndex, VectorIndex};

use std::{future::Future, pin::Pin};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
