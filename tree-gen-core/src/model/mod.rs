//! Top-level module for sentence-tree growth.
//!
//! This module groups:
//! - Predicted continuations and the fallback policy (`Candidate`)
//! - The arena-backed tree and its chosen path (`PredictionTree`)
//! - The session state machine (`TreeGrowthController`)
//! - The relationship heuristic shown next to chosen words (`RelationshipScorer`)

/// Predicted next words, fallback pool and terminator tokens.
pub mod candidate;

/// Arena of tree nodes addressed by index, plus the chosen spine.
///
/// Nodes are never removed: alternatives stay around for display.
pub mod tree;

/// Session state machine driving the tree.
///
/// Requests are explicit values carrying a ticket, so answers that arrive
/// after a stop or restart can be recognised and dropped.
pub mod controller;

/// Pure relationship/confidence heuristic for user feedback.
pub mod scorer;
