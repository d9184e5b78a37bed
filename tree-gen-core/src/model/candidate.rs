use serde::{Deserialize, Serialize};

/// Words used to pad a short predictor answer, in priority order.
///
/// Each entry is `(word, probability)`.
pub const FALLBACK_CANDIDATES: [(&str, f32); 3] = [
	("est", 0.40),
	("a", 0.35),
	("fait", 0.25),
];

/// Tokens that end a sentence when chosen (compared after trimming).
pub const TERMINATORS: [&str; 3] = [".", "!", "?"];

/// A single predicted continuation returned by a predictor.
///
/// ## Invariants
/// - `probability` is within `[0, 1]` (clamped on construction)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Candidate {
	/// The predicted next word.
	pub word: String,
	/// Probability reported by the predictor.
	pub probability: f32,
	/// Optional full-phrase echo some predictors send back. Ignored by the engine.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auxiliary_text: Option<String>,
}

impl Candidate {
	/// Creates a candidate, clamping `probability` into `[0, 1]`.
	///
	/// A NaN probability is treated as 0.
	pub fn new(word: impl Into<String>, probability: f32) -> Self {
		let probability = if probability.is_nan() { 0.0 } else { probability.clamp(0.0, 1.0) };
		Self {
			word: word.into(),
			probability,
			auxiliary_text: None,
		}
	}

	/// Attaches the predictor's full-phrase echo.
	pub fn with_auxiliary_text(mut self, text: impl Into<String>) -> Self {
		self.auxiliary_text = Some(text.into());
		self
	}

	/// Probability on a 0-100 scale: `round(probability * 100)`.
	pub fn confidence_percent(&self) -> u8 {
		(self.probability * 100.0).round().clamp(0.0, 100.0) as u8
	}

	/// Whether this candidate ends the sentence.
	pub fn is_terminator(&self) -> bool {
		is_terminator(&self.word)
	}
}

/// Returns `true` if `word`, trimmed, is exactly one of [`TERMINATORS`].
pub fn is_terminator(word: &str) -> bool {
	TERMINATORS.contains(&word.trim())
}

/// Builds the final child list for a node from a predictor answer.
///
/// - Drops repeated words (first occurrence wins)
/// - Pads with [`FALLBACK_CANDIDATES`] not already present while short of `target_count`
/// - Truncates to `target_count`, keeping predictor order
///
/// The predictor order is assumed to be ranked already; nothing is re-sorted.
pub fn merge_with_fallback(predicted: Vec<Candidate>, target_count: usize) -> Vec<Candidate> {
	let mut merged: Vec<Candidate> = Vec::with_capacity(target_count);

	for candidate in predicted {
		if merged.len() >= target_count {
			break;
		}
		if merged.iter().any(|c| c.word == candidate.word) {
			continue;
		}
		merged.push(candidate);
	}

	for (word, probability) in FALLBACK_CANDIDATES {
		if merged.len() >= target_count {
			break;
		}
		if merged.iter().any(|c| c.word == word) {
			continue;
		}
		merged.push(Candidate::new(word, probability));
	}

	merged
}
