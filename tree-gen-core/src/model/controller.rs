use serde::{Deserialize, Serialize};

use super::candidate::{is_terminator, merge_with_fallback, Candidate};
use super::tree::{NodeId, PredictionTree, TreeNode};
use crate::error::TreeError;
use crate::predictor::{Predictor, PredictorError};

/// Phase of a tree-growth session.
///
/// `Idle → AwaitingStart → RequestingCandidates ⇄ AwaitingChoice → Finished`,
/// and `restart()` goes from `Finished` back to `Idle`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
	/// No session yet.
	Idle,
	/// A start word was rejected; waiting for a valid one.
	AwaitingStart,
	/// A candidate request is outstanding. Choices are rejected.
	RequestingCandidates,
	/// Candidates are attached to the current node.
	AwaitingChoice,
	/// The sentence is over. Only `restart()` is accepted.
	Finished,
}

/// Session parameters.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionConfig {
	/// Number of children each growth step aims for.
	pub target_count: usize,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self { target_count: 3 }
	}
}

/// Identifies one candidate request. Never reused, even across restarts.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestTicket(u64);

/// A candidate request the caller must perform and hand back to
/// [`TreeGrowthController::resolve`].
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateRequest {
	pub ticket: RequestTicket,
	/// Chosen words joined by single spaces.
	pub phrase: String,
	pub target_count: usize,
}

/// What `resolve` did with a predictor answer.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
	/// Children were attached; the session now awaits a choice.
	///
	/// `degraded` holds the predictor failure when the children come
	/// (partly or fully) from the fallback pool because of it.
	Grown {
		added: usize,
		degraded: Option<PredictorError>,
	},
	/// Nothing to attach, even after fallback. The session is finished.
	Finished,
	/// The ticket is no longer current (stopped, restarted or superseded).
	Discarded,
}

/// Read-only view handed to render adapters after each transition.
///
/// Consumers should redraw when `version` changes.
#[derive(Serialize, Clone, Copy, Debug)]
pub struct TreeSnapshot<'a> {
	pub version: u64,
	pub state: SessionState,
	pub tree: Option<&'a PredictionTree>,
}

#[derive(Debug)]
struct PendingRequest {
	ticket: RequestTicket,
	node: NodeId,
}

/// Owns one sentence tree and drives its growth.
///
/// ## Responsibilities:
/// - Validate the start word and seed the tree
/// - Issue at most one candidate request at a time and apply its answer
/// - Pad short answers from the fallback pool
/// - Track choices and detect the end of the sentence
///
/// ## Invariants
/// - `pending` is `Some` iff `state == RequestingCandidates`
/// - `tree` is `Some` in every state but `Idle` and `AwaitingStart`
/// - `version` increases on every observable change
#[derive(Debug)]
pub struct TreeGrowthController {
	config: SessionConfig,
	state: SessionState,
	tree: Option<PredictionTree>,
	pending: Option<PendingRequest>,
	next_ticket: u64,
	version: u64,
}

impl TreeGrowthController {
	pub fn new(config: SessionConfig) -> Self {
		Self {
			config,
			state: SessionState::Idle,
			tree: None,
			pending: None,
			next_ticket: 0,
			version: 0,
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn tree(&self) -> Option<&PredictionTree> {
		self.tree.as_ref()
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	/// Current view of the session for render adapters.
	pub fn snapshot(&self) -> TreeSnapshot<'_> {
		TreeSnapshot {
			version: self.version,
			state: self.state,
			tree: self.tree.as_ref(),
		}
	}

	/// Chosen words so far (empty before `start`).
	pub fn sentence(&self) -> Vec<&str> {
		self.tree.as_ref().map(PredictionTree::sentence).unwrap_or_default()
	}

	/// Children of the current node, if any were attached.
	pub fn frontier(&self) -> Vec<&TreeNode> {
		match &self.tree {
			Some(tree) => tree.children(tree.current()).collect(),
			None => Vec::new(),
		}
	}

	/// Seeds a new tree with `word` and returns the first candidate request.
	///
	/// # Errors
	/// - `TreeError::Validation` if `word` is blank (no tree is created)
	/// - `TreeError::InvalidState` outside `Idle` / `AwaitingStart`
	pub fn start(&mut self, word: &str) -> Result<CandidateRequest, TreeError> {
		if !matches!(self.state, SessionState::Idle | SessionState::AwaitingStart) {
			return Err(self.invalid("start"));
		}

		let word = word.trim();
		if word.is_empty() {
			if self.state == SessionState::Idle {
				self.transition(SessionState::AwaitingStart);
			}
			return Err(TreeError::Validation);
		}

		log::info!("starting sentence with {word:?}");
		let tree = PredictionTree::new(word);
		let (node, phrase) = (tree.current(), tree.phrase());
		self.tree = Some(tree);
		Ok(self.issue_request(node, phrase))
	}

	/// Chooses the `index`-th child of the current node.
	///
	/// Returns the next candidate request, or `None` when the chosen word
	/// is a terminator and the session is finished.
	///
	/// # Errors
	/// - `TreeError::InvalidState` outside `AwaitingChoice`
	/// - `TreeError::IndexOutOfRange` if there is no such child
	pub fn choose(&mut self, index: usize) -> Result<Option<CandidateRequest>, TreeError> {
		if self.state != SessionState::AwaitingChoice {
			return Err(self.invalid("choose"));
		}
		let Some(tree) = self.tree.as_mut() else {
			return Err(self.invalid("choose"));
		};

		let chosen = tree.choose(index)?;
		let terminated = is_terminator(chosen.word());
		log::debug!("chose {:?} at index {index}", chosen.word());
		let (node, phrase) = (tree.current(), tree.phrase());

		if terminated {
			self.transition(SessionState::Finished);
			log::info!("sentence finished: {phrase:?}");
			return Ok(None);
		}
		Ok(Some(self.issue_request(node, phrase)))
	}

	/// Ends the session without a terminator.
	///
	/// Any outstanding request becomes stale.
	///
	/// # Errors
	/// Returns `TreeError::InvalidState` once already `Finished`.
	pub fn stop(&mut self) -> Result<(), TreeError> {
		if self.state == SessionState::Finished {
			return Err(self.invalid("stop"));
		}
		self.pending = None;
		self.transition(SessionState::Finished);
		Ok(())
	}

	/// Drops the tree and returns to `Idle`.
	///
	/// # Errors
	/// Returns `TreeError::InvalidState` unless `Finished`.
	pub fn restart(&mut self) -> Result<(), TreeError> {
		if self.state != SessionState::Finished {
			return Err(self.invalid("restart"));
		}
		self.tree = None;
		self.pending = None;
		self.transition(SessionState::Idle);
		Ok(())
	}

	/// Applies the answer for `ticket`.
	///
	/// Failures count as an empty answer: the fallback pool still fills the
	/// node, and the error is reported in `Resolution::Grown::degraded`.
	/// Answers for a ticket that is not the outstanding one are ignored.
	pub fn resolve(
		&mut self,
		ticket: RequestTicket,
		outcome: Result<Vec<Candidate>, PredictorError>,
	) -> Resolution {
		let node = match &self.pending {
			Some(pending) if pending.ticket == ticket => pending.node,
			_ => {
				log::warn!("discarding stale answer for {ticket:?}");
				return Resolution::Discarded;
			}
		};
		self.pending = None;

		let Some(tree) = self.tree.as_mut() else {
			return Resolution::Discarded;
		};
		if tree.current() != node {
			log::warn!("discarding answer for a node that is no longer current");
			return Resolution::Discarded;
		}

		let (predicted, degraded) = match outcome {
			Ok(candidates) => (candidates, None),
			Err(e) => {
				log::warn!("predictor failed, using fallback words: {e}");
				(Vec::new(), Some(e))
			}
		};

		let merged = merge_with_fallback(predicted, self.config.target_count);
		if merged.is_empty() {
			log::info!("no candidates left, finishing sentence");
			self.transition(SessionState::Finished);
			return Resolution::Finished;
		}

		match tree.grow_current(merged) {
			Ok(added) => {
				self.transition(SessionState::AwaitingChoice);
				Resolution::Grown { added, degraded }
			}
			Err(e) => {
				// Only reachable if the node was grown outside this controller.
				log::warn!("cannot attach candidates: {e}");
				self.transition(SessionState::AwaitingChoice);
				Resolution::Discarded
			}
		}
	}

	/// Performs `request` synchronously with `predictor` and resolves it.
	pub fn fetch<P: Predictor + ?Sized>(&mut self, predictor: &P, request: &CandidateRequest) -> Resolution {
		let outcome = predictor.predict(&request.phrase, request.target_count);
		self.resolve(request.ticket, outcome)
	}

	fn issue_request(&mut self, node: NodeId, phrase: String) -> CandidateRequest {
		let ticket = RequestTicket(self.next_ticket);
		self.next_ticket += 1;
		self.pending = Some(PendingRequest { ticket, node });
		self.transition(SessionState::RequestingCandidates);

		log::debug!("requesting {} candidates for {phrase:?} ({ticket:?})", self.config.target_count);
		CandidateRequest {
			ticket,
			phrase,
			target_count: self.config.target_count,
		}
	}

	fn transition(&mut self, state: SessionState) {
		self.state = state;
		self.version += 1;
	}

	fn invalid(&self, operation: &'static str) -> TreeError {
		TreeError::InvalidState { operation, state: self.state }
	}
}

impl Default for TreeGrowthController {
	fn default() -> Self {
		Self::new(SessionConfig::default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::tree::tests::assert_spine_matches_path;
	use crate::predictor::ScriptedPredictor;

	fn child_words(controller: &TreeGrowthController) -> Vec<&str> {
		controller.frontier().iter().map(|n| n.word()).collect()
	}

	fn started(predictor: &ScriptedPredictor, word: &str) -> TreeGrowthController {
		let mut controller = TreeGrowthController::default();
		let request = controller.start(word).unwrap();
		controller.fetch(predictor, &request);
		controller
	}

	#[test]
	fn blank_start_word_is_rejected_without_tree() {
		let mut controller = TreeGrowthController::default();
		assert_eq!(controller.start(""), Err(TreeError::Validation));
		assert_eq!(controller.state(), SessionState::AwaitingStart);
		assert_eq!(controller.start("   "), Err(TreeError::Validation));
		assert!(controller.tree().is_none());
		assert!(controller.sentence().is_empty());
	}

	#[test]
	fn start_seeds_tree_and_requests_candidates() {
		let mut controller = TreeGrowthController::default();
		let request = controller.start("  Il ").unwrap();
		assert_eq!(request.phrase, "Il");
		assert_eq!(request.target_count, 3);
		assert_eq!(controller.state(), SessionState::RequestingCandidates);
		assert_eq!(controller.sentence(), vec!["Il"]);
	}

	#[test]
	fn start_is_rejected_while_a_session_runs() {
		let mut controller = TreeGrowthController::default();
		controller.start("Il").unwrap();
		assert!(matches!(controller.start("Elle"), Err(TreeError::InvalidState { .. })));
	}

	#[test]
	fn short_answer_is_padded_from_fallback_pool() {
		let predictor = ScriptedPredictor::new().then_words(&[("était", 0.6), ("est", 0.3)]);
		let controller = started(&predictor, "Il");

		assert_eq!(predictor.calls(), vec![("Il".to_owned(), 3)]);
		assert_eq!(controller.state(), SessionState::AwaitingChoice);
		assert_eq!(child_words(&controller), vec!["était", "est", "a"]);
		assert!(controller.frontier().iter().all(|n| !n.is_chosen()));
	}

	#[test]
	fn failure_degrades_to_fallback_pool() {
		let predictor = ScriptedPredictor::new().then_error(PredictorError::Transport("down".into()));
		let mut controller = TreeGrowthController::default();
		let request = controller.start("Il").unwrap();

		let resolution = controller.fetch(&predictor, &request);
		assert_eq!(
			resolution,
			Resolution::Grown { added: 3, degraded: Some(PredictorError::Transport("down".into())) }
		);
		assert_eq!(child_words(&controller), vec!["est", "a", "fait"]);
	}

	#[test]
	fn empty_answer_with_zero_target_finishes() {
		let mut controller = TreeGrowthController::new(SessionConfig { target_count: 0 });
		let request = controller.start("Il").unwrap();
		let resolution = controller.resolve(request.ticket, Ok(Vec::new()));
		assert_eq!(resolution, Resolution::Finished);
		assert_eq!(controller.state(), SessionState::Finished);
		assert_eq!(controller.sentence(), vec!["Il"]);
	}

	#[test]
	fn choose_appends_word_and_requests_next_phrase() {
		let predictor = ScriptedPredictor::new()
			.then_words(&[("était", 0.6), ("est", 0.3), ("a", 0.1)])
			.then_words(&[("une", 0.5)]);
		let mut controller = started(&predictor, "Il");
		let version = controller.version();

		let request = controller.choose(0).unwrap().unwrap();
		assert_eq!(request.phrase, "Il était");
		assert_eq!(controller.sentence(), vec!["Il", "était"]);
		assert!(controller.version() > version);
		assert_spine_matches_path(controller.tree().unwrap());

		controller.fetch(&predictor, &request);
		assert_eq!(child_words(&controller), vec!["une", "est", "a"]);

		// Alternatives of the root stay in the tree.
		let tree = controller.tree().unwrap();
		assert_eq!(tree.node(tree.root()).children().len(), 3);
		assert_spine_matches_path(tree);
	}

	#[test]
	fn terminator_finishes_the_sentence() {
		let predictor = ScriptedPredictor::new().then_words(&[(".", 0.9)]);
		let mut controller = TreeGrowthController::new(SessionConfig { target_count: 1 });
		let request = controller.start("Il").unwrap();
		controller.fetch(&predictor, &request);

		assert_eq!(controller.choose(0), Ok(None));
		assert_eq!(controller.state(), SessionState::Finished);
		assert_eq!(controller.sentence(), vec!["Il", "."]);
		assert_eq!(predictor.calls().len(), 1);
	}

	#[test]
	fn padded_terminator_is_detected_after_trim() {
		let predictor = ScriptedPredictor::new().then_words(&[(" ! ", 0.9)]);
		let mut controller = started(&predictor, "Oui");
		assert_eq!(controller.choose(0), Ok(None));
		assert_eq!(controller.state(), SessionState::Finished);
	}

	#[test]
	fn choose_is_rejected_while_requesting() {
		let mut controller = TreeGrowthController::default();
		controller.start("Il").unwrap();
		assert_eq!(
			controller.choose(0),
			Err(TreeError::InvalidState { operation: "choose", state: SessionState::RequestingCandidates })
		);
	}

	#[test]
	fn choose_out_of_range_keeps_waiting() {
		let predictor = ScriptedPredictor::new().then_words(&[("le", 0.5)]);
		let mut controller = started(&predictor, "Il");
		assert_eq!(controller.choose(7), Err(TreeError::IndexOutOfRange { index: 7, len: 3 }));
		assert_eq!(controller.state(), SessionState::AwaitingChoice);
		assert_eq!(controller.sentence(), vec!["Il"]);
	}

	#[test]
	fn answer_after_stop_is_discarded() {
		let mut controller = TreeGrowthController::default();
		let request = controller.start("Il").unwrap();
		controller.stop().unwrap();
		assert_eq!(controller.state(), SessionState::Finished);

		let resolution = controller.resolve(request.ticket, Ok(vec![Candidate::new("est", 0.5)]));
		assert_eq!(resolution, Resolution::Discarded);
		assert_eq!(controller.frontier().len(), 0);
		assert_eq!(controller.state(), SessionState::Finished);
	}

	#[test]
	fn answer_from_previous_session_is_discarded() {
		let mut controller = TreeGrowthController::default();
		let old = controller.start("Il").unwrap();
		controller.stop().unwrap();
		controller.restart().unwrap();
		let new = controller.start("Elle").unwrap();
		assert_ne!(old.ticket, new.ticket);

		assert_eq!(controller.resolve(old.ticket, Ok(Vec::new())), Resolution::Discarded);
		assert_eq!(controller.state(), SessionState::RequestingCandidates);

		let resolution = controller.resolve(new.ticket, Ok(vec![Candidate::new("va", 0.5)]));
		assert!(matches!(resolution, Resolution::Grown { added: 3, degraded: None }));
	}

	#[test]
	fn ticket_is_consumed_once() {
		let mut controller = TreeGrowthController::default();
		let request = controller.start("Il").unwrap();
		controller.resolve(request.ticket, Ok(Vec::new()));
		assert_eq!(controller.resolve(request.ticket, Ok(Vec::new())), Resolution::Discarded);
		assert_eq!(controller.frontier().len(), 3);
	}

	#[test]
	fn stop_and_restart_follow_the_state_machine() {
		let mut controller = TreeGrowthController::default();
		assert!(matches!(controller.restart(), Err(TreeError::InvalidState { .. })));

		controller.stop().unwrap();
		assert!(matches!(controller.stop(), Err(TreeError::InvalidState { .. })));

		controller.restart().unwrap();
		assert_eq!(controller.state(), SessionState::Idle);
		assert!(controller.tree().is_none());
		assert!(controller.start("Il").is_ok());
	}

	#[test]
	fn snapshot_tracks_version_and_state() {
		let predictor = ScriptedPredictor::new();
		let mut controller = TreeGrowthController::default();
		let first = controller.snapshot().version;
		assert!(controller.snapshot().tree.is_none());

		let request = controller.start("Il").unwrap();
		let second = controller.snapshot().version;
		controller.fetch(&predictor, &request);
		let snapshot = controller.snapshot();

		assert!(first < second && second < snapshot.version);
		assert_eq!(snapshot.state, SessionState::AwaitingChoice);
		assert_eq!(snapshot.tree.map(|t| t.len()), Some(4));
	}

	#[test]
	fn chosen_path_always_mirrors_sentence() {
		let predictor = ScriptedPredictor::new()
			.then_words(&[("le", 0.5), ("la", 0.3)])
			.then_words(&[("chat", 0.7), ("chien", 0.2)])
			.then_words(&[("dort", 0.4)])
			.then_words(&[("?", 0.9)]);
		let mut controller = started(&predictor, "Voici");

		for index in [1, 0, 2] {
			let request = controller.choose(index).unwrap().unwrap();
			assert_spine_matches_path(controller.tree().unwrap());
			controller.fetch(&predictor, &request);
			assert_spine_matches_path(controller.tree().unwrap());
		}
		assert_eq!(controller.sentence(), vec!["Voici", "la", "chat", "a"]);

		assert_eq!(controller.choose(0), Ok(None));
		assert_eq!(controller.sentence(), vec!["Voici", "la", "chat", "a", "?"]);
		assert_spine_matches_path(controller.tree().unwrap());
	}
}
