use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::io::{build_output_path, read_lines};

/// Key of the state holding sentence-initial words.
pub const START_KEY: &str = "";

/// Tokens split off the end of words and kept as their own tokens.
const TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Observed continuations of a single (lowercase) word.
///
/// ## Invariants
/// - Every occurrence count is strictly positive
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct WordState {
	/// Next word => number of times it followed this state's word.
	transitions: HashMap<String, usize>,
}

impl WordState {
	/// Records one occurrence of `next` after this state's word.
	pub fn add_transition(&mut self, next: &str) {
		*self.transitions.entry(next.to_owned()).or_insert(0) += 1;
	}

	/// Returns the `top_k` most frequent continuations with their share of
	/// all occurrences, most frequent first (ties broken alphabetically).
	pub fn top(&self, top_k: usize) -> Vec<(String, f32)> {
		let total: usize = self.transitions.values().sum();
		if total == 0 {
			return Vec::new();
		}

		let mut ranked: Vec<(&String, &usize)> = self.transitions.iter().collect();
		ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

		ranked
			.into_iter()
			.take(top_k)
			.map(|(word, count)| (word.clone(), *count as f32 / total as f32))
			.collect()
	}

	/// Adds the counts of `other` into this state.
	pub fn merge(&mut self, other: &Self) {
		for (word, count) in &other.transitions {
			*self.transitions.entry(word.clone()).or_insert(0) += *count;
		}
	}
}

/// Word-transition model backing the reference prediction service.
///
/// # Responsibilities
/// - Learn which words follow which from a corpus
/// - Answer ranked next-word queries for a phrase
/// - Cache the learned model next to its corpus
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct WordModel {
	/// Previous word (lowercase, `START_KEY` for sentence starts) => continuations.
	states: HashMap<String, WordState>,
	sentences: usize,
}

impl WordModel {
	/// Loads the model cached next to `filepath` (`.bin`), or learns it from
	/// the corpus and writes the cache.
	pub fn new<P: AsRef<Path>>(filepath: P) -> Result<Self, Box<dyn std::error::Error>> {
		let binary_data_path = build_output_path(&filepath, "bin")?;
		if binary_data_path.exists() {
			log::info!("loading cached model {}", binary_data_path.display());
			let bytes = std::fs::read(binary_data_path)?;
			return Ok(postcard::from_bytes(&bytes)?);
		}

		log::info!("learning model from {}", filepath.as_ref().display());
		let model = Self::read_corpus(&filepath)?;
		let bytes = postcard::to_stdvec(&model)?;
		std::fs::write(binary_data_path, bytes)?;
		Ok(model)
	}

	/// Learns a model from a corpus, one chunk of lines per worker thread.
	fn read_corpus<P: AsRef<Path>>(filename: P) -> Result<WordModel, Box<dyn std::error::Error>> {
		let lines = read_lines(&filename)?;
		if lines.is_empty() {
			return Ok(WordModel::default());
		}

		let chunks = num_cpus::get() * 8;
		let chunk_size = lines.len().div_ceil(chunks).max(1);

		let (tx, rx) = mpsc::channel();
		for chunk in lines.chunks(chunk_size) {
			let tx = tx.clone();
			let chunk: Vec<String> = chunk.to_vec();

			thread::spawn(move || {
				let mut partial_model = WordModel::default();
				for sentence in chunk {
					partial_model.add_sentence(&sentence);
				}
				// The receiver outlives every worker.
				let _ = tx.send(partial_model);
			});
		}
		drop(tx);

		let mut final_model = WordModel::default();
		for partial_model in rx.iter() {
			final_model.merge(&partial_model);
		}
		log::info!("learned {} sentences, {} states", final_model.sentences, final_model.states.len());

		Ok(final_model)
	}

	/// Number of corpus lines learned.
	pub fn sentences(&self) -> usize {
		self.sentences
	}

	/// Learns the transitions of one line.
	pub fn add_sentence(&mut self, sentence: &str) {
		let tokens = tokenize(sentence);
		if tokens.is_empty() {
			return;
		}
		self.sentences += 1;

		let mut previous = START_KEY.to_owned();
		for token in tokens {
			self.states.entry(previous).or_default().add_transition(&token);
			previous = token;
		}
	}

	/// Ranked next words for `phrase`.
	///
	/// Uses the last word of the phrase, falling back to sentence starts
	/// when the phrase is empty or its last word was never seen.
	pub fn predict(&self, phrase: &str, top_k: usize) -> Vec<(String, f32)> {
		let key = tokenize(phrase).pop().unwrap_or_default();
		let state = self
			.states
			.get(&key)
			.or_else(|| self.states.get(START_KEY));

		match state {
			Some(state) => state.top(top_k),
			None => Vec::new(),
		}
	}

	/// Merges another model into this one, summing counts.
	pub fn merge(&mut self, other: &Self) {
		for (key, state) in &other.states {
			self.states.entry(key.clone()).or_default().merge(state);
		}
		self.sentences += other.sentences;
	}
}

/// Lowercases `text`, splits it on whitespace and detaches trailing
/// `.`, `!`, `?` as separate tokens.
///
/// `"Il dort?!"` → `["il", "dort", "?", "!"]`
pub fn tokenize(text: &str) -> Vec<String> {
	let mut tokens = Vec::new();
	for raw in text.split_whitespace() {
		let word = raw.to_lowercase();
		let stem = word.trim_end_matches(TERMINATORS);
		if !stem.is_empty() {
			tokens.push(stem.to_owned());
		}
		for c in word[stem.len()..].chars() {
			tokens.push(c.to_string());
		}
	}
	tokens
}
