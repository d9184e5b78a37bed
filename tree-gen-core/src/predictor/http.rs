use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{Predictor, PredictorConfig, PredictorError};
use crate::model::candidate::Candidate;

/// Request body shared by both services. `max_new_tokens` is only sent
/// by the completion contract.
#[derive(Serialize, Debug)]
struct PredictRequest<'a> {
	text: &'a str,
	top_k: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	max_new_tokens: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct PredictResponse {
	#[serde(default)]
	candidates: Vec<WireCandidate>,
}

#[derive(Deserialize, Debug)]
struct WireCandidate {
	word: String,
	#[serde(default)]
	prob: f32,
	#[serde(default)]
	new_text: Option<String>,
}

impl From<WireCandidate> for Candidate {
	fn from(wire: WireCandidate) -> Self {
		let candidate = Candidate::new(wire.word, wire.prob);
		match wire.new_text {
			Some(text) => candidate.with_auxiliary_text(text),
			None => candidate,
		}
	}
}

/// Parses a `{ "candidates": [...] }` body.
fn parse_candidates(body: &str) -> Result<Vec<Candidate>, PredictorError> {
	let response: PredictResponse =
		serde_json::from_str(body).map_err(|e| PredictorError::Protocol(e.to_string()))?;
	Ok(response.candidates.into_iter().map(Candidate::from).collect())
}

/// Shared blocking HTTP plumbing for both contracts.
struct HttpPredictor {
	config: PredictorConfig,
	client: Client,
}

impl HttpPredictor {
	fn new(config: PredictorConfig) -> Result<Self, PredictorError> {
		let client = Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.build()
			.map_err(|e| PredictorError::Transport(e.to_string()))?;
		Ok(Self { config, client })
	}

	fn post(&self, text: &str, top_k: usize) -> Result<Vec<Candidate>, PredictorError> {
		let body = PredictRequest {
			text,
			top_k,
			max_new_tokens: self.config.max_new_tokens,
		};

		log::debug!("POST {} text={text:?} top_k={top_k}", self.config.endpoint);
		let response = self.client
			.post(&self.config.endpoint)
			.json(&body)
			.send()
			.map_err(|e| PredictorError::Transport(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			return Err(PredictorError::Status(status.as_u16()));
		}

		let text = response.text().map_err(|e| PredictorError::Transport(e.to_string()))?;
		parse_candidates(&text)
	}
}

/// Client for the exploration service: raw probabilities, optional phrase echo.
///
/// Used to grow sentence trees.
pub struct ExplorationClient {
	inner: HttpPredictor,
}

impl ExplorationClient {
	/// Builds a client with the configured timeout.
	pub fn new(config: PredictorConfig) -> Result<Self, PredictorError> {
		Ok(Self { inner: HttpPredictor::new(config)? })
	}

	pub fn config(&self) -> &PredictorConfig {
		&self.inner.config
	}
}

impl Predictor for ExplorationClient {
	fn predict(&self, phrase: &str, top_k: usize) -> Result<Vec<Candidate>, PredictorError> {
		self.inner.post(phrase, top_k)
	}
}

/// A completion suggestion with its confidence on a 0-100 scale.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Completion {
	pub word: String,
	pub confidence: u8,
}

impl From<&Candidate> for Completion {
	fn from(candidate: &Candidate) -> Self {
		Self {
			word: candidate.word.clone(),
			confidence: candidate.confidence_percent(),
		}
	}
}

/// Client for the completion service: confidences shown as percentages.
pub struct CompletionClient {
	inner: HttpPredictor,
}

impl CompletionClient {
	pub fn new(config: PredictorConfig) -> Result<Self, PredictorError> {
		Ok(Self { inner: HttpPredictor::new(config)? })
	}

	/// Suggests completions for free-form text using the configured `top_k`.
	///
	/// Any failure is logged and yields an empty list.
	pub fn complete(&self, text: &str) -> Vec<Completion> {
		match self.inner.post(text, self.inner.config.top_k) {
			Ok(candidates) => candidates.iter().map(Completion::from).collect(),
			Err(e) => {
				log::warn!("completion failed for {text:?}: {e}");
				Vec::new()
			}
		}
	}
}

impl Predictor for CompletionClient {
	fn predict(&self, phrase: &str, top_k: usize) -> Result<Vec<Candidate>, PredictorError> {
		self.inner.post(phrase, top_k)
	}
}
