use serde::{Deserialize, Serialize};

use super::candidate::Candidate;

/// Lowest relationship ever reported.
pub const MIN_RELATIONSHIP: u8 = 40;
/// Highest relationship ever reported.
pub const MAX_RELATIONSHIP: u8 = 100;

/// Qualitative bucket for a relationship percentage.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationshipLabel {
	VeryClose,
	GoodLink,
	Connection,
	Weak,
}

impl RelationshipLabel {
	/// `>= 80` very close, `>= 65` good link, `>= 50` connection, weak otherwise.
	pub fn from_percentage(relationship: u8) -> Self {
		match relationship {
			80.. => Self::VeryClose,
			65..=79 => Self::GoodLink,
			50..=64 => Self::Connection,
			_ => Self::Weak,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::VeryClose => "very close",
			Self::GoodLink => "good link",
			Self::Connection => "connection",
			Self::Weak => "weak",
		}
	}
}

/// How strongly a selected word "relates" to one context word.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Relationship {
	pub word: String,
	/// Percentage in `[40, 100]`.
	pub relationship: u8,
	pub label: RelationshipLabel,
}

/// Everything needed to explain a selected word against its context.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RelationshipReport {
	pub word: String,
	/// The selected candidate's probability on a 0-100 scale.
	pub confidence: u8,
	pub relationships: Vec<Relationship>,
}

/// Presentation heuristic relating a selected word to the words before it.
///
/// The score only looks at word length, sentence position and the
/// selected candidate's confidence. It knows nothing about meaning:
///
/// ```text
/// position = (i + 1) / N * 100
/// length   = min(chars(word) * 5, 30)
/// score    = clamp(round((position + length + confidence) / 3), 40, 100)
/// ```
pub struct RelationshipScorer;

impl RelationshipScorer {
	/// Scores `selected` against each of `context_words`, in order.
	pub fn score<S: AsRef<str>>(selected: &Candidate, context_words: &[S]) -> Vec<Relationship> {
		let total = context_words.len() as f64;
		let confidence = selected.confidence_percent() as f64;

		context_words
			.iter()
			.enumerate()
			.map(|(i, word)| {
				let word = word.as_ref();
				let position_factor = (i + 1) as f64 / total * 100.0;
				let length_factor = (word.chars().count() as f64 * 5.0).min(30.0);
				let raw = (position_factor + length_factor + confidence) / 3.0;
				let relationship = raw
					.round()
					.clamp(MIN_RELATIONSHIP as f64, MAX_RELATIONSHIP as f64) as u8;

				Relationship {
					word: word.to_owned(),
					relationship,
					label: RelationshipLabel::from_percentage(relationship),
				}
			})
			.collect()
	}

	/// Splits `text` on whitespace and scores `selected` against every word.
	pub fn report(selected: &Candidate, text: &str) -> RelationshipReport {
		let context: Vec<&str> = text.split_whitespace().collect();
		RelationshipReport {
			word: selected.word.clone(),
			confidence: selected.confidence_percent(),
			relationships: Self::score(selected, &context),
		}
	}
}
