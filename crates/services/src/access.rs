//! # Derived-Question Authorization
//!
//! Decides whether a user may see or vote on a question whose access is
//! gated by their vote on its parent. Visibility and votability call the
//! same decision, so the UI never renders an action the engine would
//! reject.

use domains::{Question, Result, VoteError, VoteStore, MAX_QUESTION_DEPTH};
use tracing::debug;
use uuid::Uuid;

use crate::tree::QuestionForest;

/// May `user_id` act on (see, vote on) `question`?
///
/// Rules, in order:
/// 1. Root questions are unrestricted.
/// 2. An untargeted derived question is open to everyone.
/// 3. The question's author and the parent's author are exempt from
///    their own gating.
/// 4. Anyone else must hold a recorded vote on the parent matching the
///    question's target choice.
pub async fn can_act_on(
    user_id: Uuid,
    question: &Question,
    parent: Option<&Question>,
    store: &dyn VoteStore,
) -> Result<()> {
    let Some(parent_id) = question.parent_id else {
        return Ok(());
    };
    let Some(target) = question.target_choice else {
        return Ok(());
    };
    if user_id == question.author_id {
        return Ok(());
    }
    if let Some(parent) = parent {
        if user_id == parent.author_id {
            return Ok(());
        }
    }

    let parent_vote = store.fetch_parent_vote(user_id, parent_id).await?;
    match parent_vote {
        None => {
            debug!(%user_id, question_id = %question.id, "denied: no parent vote");
            Err(VoteError::Unauthorized {
                reason: "you must vote on the parent question first".into(),
            })
        }
        Some(choice) if choice != target => {
            debug!(%user_id, question_id = %question.id, %target, "denied: parent vote mismatch");
            Err(VoteError::Unauthorized {
                reason: format!("this question is for {target} voters"),
            })
        }
        Some(_) => Ok(()),
    }
}

/// Validate a declared nesting depth against the parent at creation time.
/// Independent of the gating rules above: a bad depth is rejected even
/// for authors.
pub fn validate_depth(declared: u8, parent: Option<&Question>) -> Result<()> {
    let expected = match parent {
        None => 0,
        Some(p) if p.depth >= MAX_QUESTION_DEPTH => {
            // Parent already sits at the nesting cap; no child depth is valid.
            return Err(VoteError::InvalidDepth { declared, expected: MAX_QUESTION_DEPTH });
        }
        Some(p) => p.depth + 1,
    };
    if declared != expected {
        return Err(VoteError::InvalidDepth { declared, expected });
    }
    Ok(())
}

/// Ids of the forest nodes `user_id` may see, in depth-first order.
///
/// A node hidden from the user hides its whole subtree: the gating that
/// blocked the node also blocks every derived question under it. The
/// walk is an explicit worklist over the arena, no recursion.
pub async fn visible_questions(
    user_id: Uuid,
    forest: &QuestionForest,
    store: &dyn VoteStore,
) -> Result<Vec<Uuid>> {
    let mut visible = Vec::with_capacity(forest.len());
    let mut stack: Vec<usize> = forest.roots().iter().rev().copied().collect();

    while let Some(idx) = stack.pop() {
        let node = forest.node(idx);
        let parent = forest.parent_of(idx);
        if can_act_on(user_id, &node.question, parent, store).await.is_ok() {
            visible.push(node.question.id);
            stack.extend(node.children().iter().rev());
        }
    }
    Ok(visible)
}
