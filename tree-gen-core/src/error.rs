use thiserror::Error;

use crate::model::controller::SessionState;

/// Errors returned by the tree and its growth controller.
///
/// Predictor failures never show up here: they are absorbed by the
/// controller's fallback policy (see [`crate::predictor::PredictorError`]).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
	/// The start word is empty once trimmed.
	#[error("start word must not be empty")]
	Validation,

	/// The operation is not allowed in the current session state.
	#[error("cannot {operation} while {state:?}")]
	InvalidState {
		operation: &'static str,
		state: SessionState,
	},

	/// The requested child does not exist.
	#[error("child index {index} out of range (node has {len} children)")]
	IndexOutOfRange { index: usize, len: usize },

	/// The node's children were already fetched.
	#[error("node children are already populated")]
	AlreadyGrown,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn error_display_messages() {
		assert_eq!(TreeError::Validation.to_string(), "start word must not be empty");
		assert_eq!(
			TreeError::InvalidState { operation: "choose", state: SessionState::RequestingCandidates }.to_string(),
			"cannot choose while RequestingCandidates"
		);
		assert_eq!(
			TreeError::IndexOutOfRange { index: 4, len: 3 }.to_string(),
			"child index 4 out of range (node has 3 children)"
		);
	}
}
