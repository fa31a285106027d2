//! agora/crates/domains/src/lib.rs
//!
//! The central domain models and interface definitions for the agora
//! voting core. Behavior lives in the `services` crate; this crate owns
//! the entities, the error taxonomy, and the ports to external
//! collaborators.

pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn first_vote_has_untouched_change_budget() {
        let vote = Vote::first(Uuid::new_v4(), Uuid::new_v4(), Choice::Agree, Utc::now());
        assert!(!vote.changed_in_persuasion);
        assert!(vote.original_choice.is_none());
    }

    #[test]
    fn changed_vote_records_original_choice() {
        let vote = Vote::first(Uuid::new_v4(), Uuid::new_v4(), Choice::Agree, Utc::now());
        let changed = vote.changed_to(Choice::Disagree);
        assert_eq!(changed.choice, Choice::Disagree);
        assert!(changed.changed_in_persuasion);
        assert_eq!(changed.original_choice, Some(Choice::Agree));
        assert_eq!(changed.question_id, vote.question_id);
    }

    #[test]
    fn choice_wire_values_match_store_convention() {
        assert_eq!(Choice::Agree.as_i8(), 1);
        assert_eq!(Choice::Disagree.as_i8(), -1);
        assert_eq!(Choice::Agree.opposite(), Choice::Disagree);
    }

    #[test]
    fn choice_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Choice::Agree).unwrap(), "\"agree\"");
        assert_eq!(serde_json::to_string(&Phase::Persuasion).unwrap(), "\"persuasion\"");
    }
}
