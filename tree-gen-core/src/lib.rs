//! Interactive sentence-tree growth library.
//!
//! This crate grows a sentence one word at a time from predictor suggestions:
//! - A tree of every suggested word, with the chosen path highlighted
//! - A session state machine with stale-answer protection
//! - A fallback policy so a failing predictor never blocks the user
//! - A relationship heuristic explaining a word against its context
//!
//! Rendering is left to the caller, which reads `TreeSnapshot`s.

/// Tree model, growth controller and relationship scorer.
pub mod model;

/// Predictor contract, HTTP clients and a scripted test double.
pub mod predictor;

/// Errors raised by the tree and the controller.
pub mod error;

pub use error::TreeError;
pub use model::candidate::Candidate;
pub use model::controller::{
	CandidateRequest, RequestTicket, Resolution, SessionConfig, SessionState, TreeGrowthController, TreeSnapshot,
};
pub use model::scorer::{RelationshipLabel, RelationshipReport, RelationshipScorer};
pub use model::tree::{NodeId, PredictionTree, TreeNode};
pub use predictor::{Predictor, PredictorConfig, PredictorError};
