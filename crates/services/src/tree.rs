//! # Question-Tree Builder
//!
//! Assembles a flat list of questions into a parent→children forest.
//! Arena-indexed: nodes live in one `Vec` and refer to each other by
//! index, so traversal is an explicit worklist with no recursion even if
//! upstream data is malformed. Child order preserves input order; the
//! builder applies no sort of its own.

use std::collections::HashMap;

use domains::Question;
use uuid::Uuid;

/// One arena slot: the question plus the indices of its children.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionNode {
    pub question: Question,
    children: Vec<usize>,
}

impl QuestionNode {
    pub fn children(&self) -> &[usize] {
        &self.children
    }
}

/// A forest of questions indexed into a flat arena.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionForest {
    nodes: Vec<QuestionNode>,
    roots: Vec<usize>,
    by_id: HashMap<Uuid, usize>,
}

impl QuestionForest {
    pub fn node(&self, idx: usize) -> &QuestionNode {
        &self.nodes[idx]
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// The parent question of a node, if it was attached to one.
    pub fn parent_of(&self, idx: usize) -> Option<&Question> {
        let parent_id = self.nodes[idx].question.parent_id?;
        self.index_of(parent_id).map(|p| &self.node(p).question)
    }

    /// Depth-first flattening (explicit stack), children in input order.
    pub fn flatten(&self) -> Vec<&Question> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            out.push(&node.question);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// Build a forest from a flat list.
///
/// Two passes: index every node by id, then attach each node under its
/// `parent_id` when the parent is present. A node whose parent is missing
/// from the input is promoted to a root rather than dropped — a parent
/// deleted out from under its children must not break rendering. The same
/// promotion applies to parent cycles in malformed input: the
/// first-listed member of each cycle is detached and becomes a root, so
/// no node ever vanishes from traversal.
///
/// Idempotent and side-effect free: the same input always yields a
/// structurally equal forest.
pub fn build(questions: Vec<Question>) -> QuestionForest {
    let mut by_id = HashMap::with_capacity(questions.len());
    let mut nodes: Vec<QuestionNode> = Vec::with_capacity(questions.len());

    for (idx, question) in questions.into_iter().enumerate() {
        by_id.insert(question.id, idx);
        nodes.push(QuestionNode { question, children: Vec::new() });
    }

    let mut roots = Vec::new();
    for idx in 0..nodes.len() {
        let parent_idx = nodes[idx]
            .question
            .parent_id
            .and_then(|pid| by_id.get(&pid).copied())
            // Self-referencing parent ids are treated as orphaned.
            .filter(|&p| p != idx);
        match parent_idx {
            Some(p) => nodes[p].children.push(idx),
            None => roots.push(idx),
        }
    }

    // Parent cycles leave all their members unreachable from the roots;
    // without this sweep they would be counted but never traversed.
    let mut reachable = vec![false; nodes.len()];
    mark_reachable(&nodes, &roots, &mut reachable);
    for idx in 0..nodes.len() {
        if reachable[idx] {
            continue;
        }
        // Break the cycle at its first-listed member: detach it from its
        // parent's child list and promote it to a root.
        if let Some(p) = nodes[idx].question.parent_id.and_then(|pid| by_id.get(&pid).copied()) {
            nodes[p].children.retain(|&c| c != idx);
        }
        roots.push(idx);
        mark_reachable(&nodes, &[idx], &mut reachable);
    }

    QuestionForest { nodes, roots, by_id }
}

fn mark_reachable(nodes: &[QuestionNode], from: &[usize], reachable: &mut [bool]) {
    let mut stack: Vec<usize> = from.to_vec();
    while let Some(idx) = stack.pop() {
        if !std::mem::replace(&mut reachable[idx], true) {
            stack.extend(nodes[idx].children.iter().copied());
        }
    }
}
