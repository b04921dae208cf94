use std::{fs, path::Path};

use crate::{Error, Result};

/// Read-only passage texts, addressed by their position in the corpus file.
///
/// The position doubles as the point identifier in the vector collection;
/// index builds write both from the same array, so the mapping holds by
/// construction.
#[derive(Debug)]
pub struct PassageStore {
	passages: Vec<String>,
}

impl PassageStore {
	pub fn load(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| Error::ReadCorpus { path: path.to_path_buf(), source: err })?;
		let passages: Vec<String> = serde_json::from_str(&raw)
			.map_err(|err| Error::ParseCorpus { path: path.to_path_buf(), source: err })?;

		if passages.is_empty() {
			return Err(Error::EmptyCorpus { path: path.to_path_buf() });
		}

		Ok(Self { passages })
	}

	pub fn from_passages(passages: Vec<String>) -> Self {
		Self { passages }
	}

	pub fn get(&self, id: u32) -> Option<&str> {
		self.passages.get(id as usize).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.passages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.passages.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.passages.iter().map(String::as_str)
	}
}
