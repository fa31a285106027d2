//! Derived-question gating end to end: visibility and votability share
//! one decision, authors bypass their own gating, and depth validation
//! holds at the cap.

use domains::{Choice, VoteError, Vote};
use integration_tests::{base_time, derived_question, rig, root_question};
use services::access::{can_act_on, validate_depth, visible_questions};
use services::tree;
use uuid::Uuid;

#[tokio::test]
async fn voting_on_a_gated_question_requires_a_matching_parent_vote() {
    let rig = rig();
    let root = root_question(None);
    let gated = derived_question(&root, Some(Choice::Agree));
    let voter = Uuid::new_v4();

    // No parent vote yet: the engine refuses.
    let err = rig.engine.submit(&gated, Some(&root), voter, Choice::Agree).await.unwrap_err();
    assert!(matches!(err, VoteError::Unauthorized { .. }));

    // Vote DISAGREE on the parent: still refused, wrong side.
    rig.engine.submit(&root, None, voter, Choice::Disagree).await.unwrap();
    let err = rig.engine.submit(&gated, Some(&root), voter, Choice::Agree).await.unwrap_err();
    assert!(matches!(err, VoteError::Unauthorized { .. }));

    // An AGREE voter on the parent gets through.
    let agreeing = Uuid::new_v4();
    rig.engine.submit(&root, None, agreeing, Choice::Agree).await.unwrap();
    rig.engine.submit(&gated, Some(&root), agreeing, Choice::Disagree).await.unwrap();
}

#[tokio::test]
async fn question_author_votes_despite_gating() {
    let rig = rig();
    let root = root_question(None);
    let gated = derived_question(&root, Some(Choice::Agree));

    rig.engine
        .submit(&gated, Some(&root), gated.author_id, Choice::Agree)
        .await
        .unwrap();
    rig.engine
        .submit(&gated, Some(&root), root.author_id, Choice::Disagree)
        .await
        .unwrap();
}

#[tokio::test]
async fn visibility_and_votability_agree() {
    let rig = rig();
    let root = root_question(None);
    let gated = derived_question(&root, Some(Choice::Disagree));
    let open_child = derived_question(&root, None);
    let viewer = Uuid::new_v4();

    let forest = tree::build(vec![root.clone(), gated.clone(), open_child.clone()]);

    // Before voting on the parent: the gated node is both invisible and
    // unvotable, from the same decision.
    let visible = visible_questions(viewer, &forest, rig.store.as_ref()).await.unwrap();
    assert_eq!(visible, vec![root.id, open_child.id]);
    assert!(can_act_on(viewer, &gated, Some(&root), rig.store.as_ref()).await.is_err());

    // After a matching parent vote both flip together.
    rig.store.seed_vote(Vote::first(root.id, viewer, Choice::Disagree, base_time()));
    let visible = visible_questions(viewer, &forest, rig.store.as_ref()).await.unwrap();
    assert!(visible.contains(&gated.id));
    assert!(can_act_on(viewer, &gated, Some(&root), rig.store.as_ref()).await.is_ok());
}

#[test]
fn creation_depth_is_validated_against_the_cap() {
    let root = root_question(None);
    let child = derived_question(&root, None);
    let grandchild = derived_question(&child, None);
    let great = derived_question(&grandchild, None);

    assert!(validate_depth(child.depth, Some(&root)).is_ok());
    assert!(validate_depth(grandchild.depth, Some(&child)).is_ok());
    assert!(validate_depth(great.depth, Some(&grandchild)).is_ok());
    // depth 3 is the cap: nothing may be created under `great`.
    assert!(matches!(
        validate_depth(great.depth + 1, Some(&great)),
        Err(VoteError::InvalidDepth { .. })
    ));
    // And a skipped level is rejected outright.
    assert!(validate_depth(3, Some(&root)).is_err());
}
