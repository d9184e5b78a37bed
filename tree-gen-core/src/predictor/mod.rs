//! Predictor contract and its implementations.
//!
//! The growth engine only needs [`Predictor`]: a phrase goes in, ranked
//! candidates come out. Two HTTP flavours exist (see [`http`]) plus an
//! in-memory [`ScriptedPredictor`] for tests and demos.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::candidate::Candidate;

/// HTTP clients for the exploration (raw probability) and completion
/// (percentage) services.
pub mod http;

/// Failures of a single predictor call.
///
/// The controller treats every variant the same way (as an empty answer),
/// but keeps the error around so callers can tell "nothing to say" apart
/// from "service down".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
	/// Network failure, timeout, or unreachable service.
	#[error("transport error: {0}")]
	Transport(String),

	/// The service answered with a non-2xx status.
	#[error("predictor returned status {0}")]
	Status(u16),

	/// The response body did not have the expected shape.
	#[error("malformed predictor response: {0}")]
	Protocol(String),
}

/// Something that proposes ranked next words for a phrase.
pub trait Predictor {
	/// Returns up to `top_k` candidates for `phrase`, best first.
	fn predict(&self, phrase: &str, top_k: usize) -> Result<Vec<Candidate>, PredictorError>;
}

/// Connection settings for an HTTP predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
	/// Full URL of the `POST` prediction endpoint.
	pub endpoint: String,
	/// Number of candidates requested.
	pub top_k: usize,
	/// Extra generation length, only sent by the completion contract.
	pub max_new_tokens: Option<usize>,
	pub timeout_secs: u64,
}

impl PredictorConfig {
	/// Exploration service (raw probabilities), used to grow trees.
	pub fn exploration() -> Self {
		Self {
			endpoint: "http://127.0.0.1:8001/predict".to_owned(),
			top_k: 3,
			max_new_tokens: None,
			timeout_secs: 5,
		}
	}

	/// Completion service (percent confidences), used for free-form text.
	pub fn completion() -> Self {
		Self {
			endpoint: "http://127.0.0.1:8000/predict".to_owned(),
			top_k: 4,
			max_new_tokens: Some(3),
			timeout_secs: 5,
		}
	}

	/// Overrides fields from `<PREFIX>_URL`, `<PREFIX>_TOP_K` and
	/// `<PREFIX>_TIMEOUT_SECS`.
	///
	/// Values that fail to parse are ignored.
	pub fn with_env_overrides(mut self, prefix: &str) -> Self {
		if let Ok(url) = env::var(format!("{prefix}_URL")) {
			if !url.trim().is_empty() {
				self.endpoint = url.trim().to_owned();
			}
		}
		if let Some(top_k) = parse_env::<usize>(&format!("{prefix}_TOP_K")) {
			self.top_k = top_k;
		}
		if let Some(timeout) = parse_env::<u64>(&format!("{prefix}_TIMEOUT_SECS")) {
			self.timeout_secs = timeout;
		}
		self
	}
}

impl Default for PredictorConfig {
	fn default() -> Self {
		Self::exploration()
	}
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
	let raw = env::var(key).ok()?;
	match raw.trim().parse::<T>() {
		Ok(value) => Some(value),
		Err(_) => {
			log::warn!("ignoring {key}={raw:?}: not a valid value");
			None
		}
	}
}

/// Predictor that replays queued answers, in order.
///
/// Once the queue is empty every call returns an empty list.
/// Records every phrase it was asked about.
#[derive(Debug, Default)]
pub struct ScriptedPredictor {
	answers: RefCell<VecDeque<Result<Vec<Candidate>, PredictorError>>>,
	calls: RefCell<Vec<(String, usize)>>,
}

impl ScriptedPredictor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queues a successful answer made of `(word, probability)` pairs.
	pub fn then_words(self, words: &[(&str, f32)]) -> Self {
		let answer = words.iter().map(|(w, p)| Candidate::new(*w, *p)).collect();
		self.answers.borrow_mut().push_back(Ok(answer));
		self
	}

	/// Queues a failure.
	pub fn then_error(self, error: PredictorError) -> Self {
		self.answers.borrow_mut().push_back(Err(error));
		self
	}

	/// Phrases and `top_k` values seen so far.
	pub fn calls(&self) -> Vec<(String, usize)> {
		self.calls.borrow().clone()
	}
}

impl Predictor for ScriptedPredictor {
	fn predict(&self, phrase: &str, top_k: usize) -> Result<Vec<Candidate>, PredictorError> {
		self.calls.borrow_mut().push((phrase.to_owned(), top_k));
		self.answers.borrow_mut().pop_front().unwrap_or_else(|| Ok(Vec::new()))
	}
}
