use serde::Serialize;

use super::candidate::Candidate;
use crate::error::TreeError;

/// Index of a node inside a [`PredictionTree`] arena.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
	/// Position of the node in the arena.
	pub fn index(self) -> usize {
		self.0
	}
}

/// A word in the prediction tree.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TreeNode {
	word: String,
	probability: Option<f32>,
	children: Vec<NodeId>,
	chosen: bool,
}

impl TreeNode {
	pub fn word(&self) -> &str {
		&self.word
	}

	/// Probability the predictor gave this word. `None` for the root.
	pub fn probability(&self) -> Option<f32> {
		self.probability
	}

	pub fn children(&self) -> &[NodeId] {
		&self.children
	}

	/// Whether the node lies on the chosen path.
	pub fn is_chosen(&self) -> bool {
		self.chosen
	}
}

/// Nested, owned view of the tree for render adapters that want a
/// hierarchy (e.g. serialized to JSON).
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct NestedNode {
	pub word: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub probability: Option<f32>,
	pub chosen: bool,
	pub children: Vec<NestedNode>,
}

/// Arena-backed tree of predicted words plus the chosen path through it.
///
/// ## Responsibilities:
/// - Store every node ever fetched, including alternatives that were not chosen
/// - Track the chosen path from the root to the current node
/// - Attach candidates as children exactly once per node
///
/// ## Invariants
/// - `path[0]` is the root and `path.last()` is the current node
/// - A node is `chosen` iff it appears in `path`
/// - A node's `children` are set once and only their `chosen` flag changes afterwards
/// - Siblings never share a `word`
#[derive(Serialize, Clone, Debug)]
pub struct PredictionTree {
	nodes: Vec<TreeNode>,
	/// Chosen spine, root first.
	path: Vec<NodeId>,
	/// Nodes whose children were already fetched (even if the answer was empty).
	#[serde(skip)]
	grown: Vec<bool>,
}

impl PredictionTree {
	/// Creates a single-node tree. The root is chosen and has no children.
	pub fn new(root_word: &str) -> Self {
		let root = TreeNode {
			word: root_word.to_owned(),
			probability: None,
			children: Vec::new(),
			chosen: true,
		};
		Self {
			nodes: vec![root],
			path: vec![NodeId(0)],
			grown: vec![false],
		}
	}

	pub fn root(&self) -> NodeId {
		NodeId(0)
	}

	/// The last node of the chosen path.
	pub fn current(&self) -> NodeId {
		// `path` always holds at least the root
		self.path[self.path.len() - 1]
	}

	/// Returns the node behind `id`.
	///
	/// Ids are only handed out by this tree, so lookups cannot miss.
	pub fn node(&self, id: NodeId) -> &TreeNode {
		&self.nodes[id.0]
	}

	/// Iterates over the children of `id` in predictor order.
	pub fn children(&self, id: NodeId) -> impl Iterator<Item = &TreeNode> {
		self.nodes[id.0].children.iter().map(|child| &self.nodes[child.0])
	}

	/// Total number of nodes, alternatives included.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Always `false`: a tree has at least its root.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Chosen spine as node ids, root first.
	pub fn path(&self) -> &[NodeId] {
		&self.path
	}

	/// Chosen words, root first.
	pub fn sentence(&self) -> Vec<&str> {
		self.path.iter().map(|id| self.nodes[id.0].word.as_str()).collect()
	}

	/// Chosen words joined by single spaces.
	pub fn phrase(&self) -> String {
		self.sentence().join(" ")
	}

	/// Whether the current node's children were already fetched.
	pub fn is_current_grown(&self) -> bool {
		self.grown[self.current().0]
	}

	/// Attaches `candidates` as unchosen children of the current node, in order.
	///
	/// Words already present among the new siblings are skipped.
	/// Returns the number of children added.
	///
	/// # Errors
	/// Returns `TreeError::AlreadyGrown` if the current node was grown before.
	pub fn grow_current(&mut self, candidates: Vec<Candidate>) -> Result<usize, TreeError> {
		let current = self.current();
		if self.grown[current.0] {
			return Err(TreeError::AlreadyGrown);
		}
		self.grown[current.0] = true;

		let mut children: Vec<NodeId> = Vec::with_capacity(candidates.len());
		for candidate in candidates {
			if children.iter().any(|id| self.nodes[id.0].word == candidate.word) {
				continue;
			}
			let id = NodeId(self.nodes.len());
			self.nodes.push(TreeNode {
				word: candidate.word,
				probability: Some(candidate.probability),
				children: Vec::new(),
				chosen: false,
			});
			self.grown.push(false);
			children.push(id);
		}

		let added = children.len();
		self.nodes[current.0].children = children;
		Ok(added)
	}

	/// Marks the `index`-th child of the current node as chosen and makes it current.
	///
	/// # Errors
	/// Returns `TreeError::IndexOutOfRange` if the current node has no such child.
	pub fn choose(&mut self, index: usize) -> Result<&TreeNode, TreeError> {
		let current = self.current();
		let children = &self.nodes[current.0].children;
		let child = *children
			.get(index)
			.ok_or(TreeError::IndexOutOfRange { index, len: children.len() })?;

		self.nodes[child.0].chosen = true;
		self.path.push(child);
		Ok(&self.nodes[child.0])
	}

	/// Builds an owned nested copy of the tree, starting at the root.
	pub fn to_nested(&self) -> NestedNode {
		self.nest(self.root())
	}

	fn nest(&self, id: NodeId) -> NestedNode {
		let node = &self.nodes[id.0];
		NestedNode {
			word: node.word.clone(),
			probability: node.probability,
			chosen: node.chosen,
			children: node.children.iter().map(|child| self.nest(*child)).collect(),
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	/// Checks that the `chosen` flags form exactly the recorded path.
	pub(crate) fn assert_spine_matches_path(tree: &PredictionTree) {
		let mut spine = vec![tree.root()];
		assert!(tree.node(tree.root()).is_chosen());
		loop {
			let last = spine[spine.len() - 1];
			let chosen: Vec<NodeId> = tree
				.node(last)
				.children()
				.iter()
				.copied()
				.filter(|id| tree.node(*id).is_chosen())
				.collect();
			assert!(chosen.len() <= 1, "two chosen siblings under {:?}", last);
			match chosen.first() {
				Some(id) => spine.push(*id),
				None => break,
			}
		}
		assert_eq!(spine, tree.path());
		let total_chosen = (0..tree.len()).filter(|i| tree.node(NodeId(*i)).is_chosen()).count();
		assert_eq!(total_chosen, spine.len());
	}

	fn grown(words: &[&str]) -> PredictionTree {
		let mut tree = PredictionTree::new("Il");
		tree.grow_current(words.iter().map(|w| Candidate::new(*w, 0.5)).collect()).unwrap();
		tree
	}

	#[test]
	fn new_tree_has_chosen_root_only() {
		let tree = PredictionTree::new("Il");
		assert_eq!(tree.len(), 1);
		assert_eq!(tree.sentence(), vec!["Il"]);
		assert_eq!(tree.current(), tree.root());
		assert!(tree.node(tree.root()).probability().is_none());
		assert_spine_matches_path(&tree);
	}

	#[test]
	fn grown_children_are_unchosen_and_ordered() {
		let tree = grown(&["était", "est", "a"]);
		let words: Vec<&str> = tree.children(tree.root()).map(|n| n.word()).collect();
		assert_eq!(words, vec!["était", "est", "a"]);
		assert!(tree.children(tree.root()).all(|n| !n.is_chosen()));
		assert_spine_matches_path(&tree);
	}

	#[test]
	fn duplicate_siblings_are_skipped() {
		let tree = grown(&["le", "la", "le"]);
		assert_eq!(tree.node(tree.root()).children().len(), 2);
	}

	#[test]
	fn node_cannot_be_grown_twice() {
		let mut tree = grown(&["le"]);
		assert_eq!(tree.grow_current(vec![Candidate::new("la", 0.2)]), Err(TreeError::AlreadyGrown));
		assert_eq!(tree.node(tree.root()).children().len(), 1);
	}

	#[test]
	fn choose_extends_path_and_flags_only_the_child() {
		let mut tree = grown(&["était", "est", "a"]);
		let word = tree.choose(1).unwrap().word().to_owned();
		assert_eq!(word, "est");
		assert_eq!(tree.sentence(), vec!["Il", "est"]);
		assert_eq!(tree.phrase(), "Il est");
		assert!(!tree.is_current_grown());
		let flags: Vec<bool> = tree.children(tree.root()).map(|n| n.is_chosen()).collect();
		assert_eq!(flags, vec![false, true, false]);
		assert_spine_matches_path(&tree);
	}

	#[test]
	fn choose_out_of_range_leaves_tree_untouched() {
		let mut tree = grown(&["le"]);
		assert_eq!(tree.choose(3).unwrap_err(), TreeError::IndexOutOfRange { index: 3, len: 1 });
		assert_eq!(tree.sentence(), vec!["Il"]);
	}

	#[test]
	fn nested_view_keeps_alternatives() {
		let mut tree = grown(&["le", "la"]);
		tree.choose(0).unwrap();
		tree.grow_current(vec![Candidate::new("chat", 0.7)]).unwrap();
		let nested = tree.to_nested();
		assert_eq!(nested.word, "Il");
		assert_eq!(nested.children.len(), 2);
		assert!(nested.children[0].chosen);
		assert!(!nested.children[1].chosen);
		assert_eq!(nested.children[0].children[0].word, "chat");
	}
}
