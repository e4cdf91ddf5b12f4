//! Review scheduling.
//!
//! [`apply_review`] turns a completed review into the topic's next
//! [`TopicReviewState`]; [`evaluate_session`] is the entry point used by
//! callers that log sessions. Both are pure and deterministic.
//!
//! Interval rules for a topic that has been reviewed before:
//! - `perfect` / `good`: previous interval times the matching multiplier,
//!   table position advances (clamped at the last entry).
//! - `regular`: previous interval times the regular multiplier, position holds.
//! - `bad`: back to the first table entry when the policy resets, otherwise
//!   half the previous interval (floored, at least one day).
//!
//! A first exposure always lands on the first table entry.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::classifier::SessionClassifier;
use crate::error::ScheduleError;
use crate::models::{ReviewOutcome, SessionType};
use crate::policy::ReviewPolicy;
use crate::state::{clamp_mastery, due_after, next_status, TopicReviewState, MAX_INTERVAL_DAYS};

pub fn mastery_delta(outcome: ReviewOutcome) -> i16 {
    match outcome {
        ReviewOutcome::Perfect => 2,
        ReviewOutcome::Good => 1,
        ReviewOutcome::Regular => 0,
        ReviewOutcome::Bad => -2,
    }
}

/// Applies one completed review to `state` under `policy`.
///
/// Fails with [`ScheduleError::InvalidState`] for practice sessions, which
/// must never reach the scheduler.
pub fn apply_review(
    policy: &ReviewPolicy,
    state: &TopicReviewState,
    session_type: SessionType,
    outcome: ReviewOutcome,
    now: DateTime<Utc>,
) -> Result<TopicReviewState, ScheduleError> {
    if !session_type.is_scheduling() {
        return Err(ScheduleError::InvalidState(format!(
            "{} sessions do not update the review schedule",
            session_type.as_str()
        )));
    }

    let mastery_level = clamp_mastery(state.mastery_level as i16 + mastery_delta(outcome));
    let (interval_days, interval_index) = next_interval(policy, state, outcome);
    let interval_days = interval_days.min(MAX_INTERVAL_DAYS);
    let review_count = state.review_count.saturating_add(1);
    let status = next_status(state.status, mastery_level, review_count, outcome);

    debug!(
        "{} review ({}): interval {} -> {} days, index {}, mastery {} -> {}",
        session_type.as_str(),
        outcome.as_str(),
        state.current_interval_days.unwrap_or(0.0),
        interval_days,
        interval_index,
        state.mastery_level,
        mastery_level
    );

    Ok(TopicReviewState {
        mastery_level,
        status,
        interval_index,
        current_interval_days: Some(interval_days),
        last_reviewed_at: Some(now),
        next_due_at: Some(due_after(now, interval_days)),
        review_count,
    })
}

fn next_interval(
    policy: &ReviewPolicy,
    state: &TopicReviewState,
    outcome: ReviewOutcome,
) -> (f64, usize) {
    if !state.has_history() {
        return (policy.first_interval(), 0);
    }

    // The policy may have been replaced with a shorter table since the last review.
    let index = state.interval_index.min(policy.last_index());
    let previous = state
        .current_interval_days
        .unwrap_or_else(|| policy.base_intervals()[index]);
    let advanced = (index + 1).min(policy.last_index());

    match outcome {
        ReviewOutcome::Perfect => (previous * policy.perfect_multiplier(), advanced),
        ReviewOutcome::Good => (previous * policy.good_multiplier(), advanced),
        ReviewOutcome::Regular => (previous * policy.regular_multiplier(), index),
        ReviewOutcome::Bad if policy.bad_reset() => (policy.first_interval(), 0),
        ReviewOutcome::Bad => ((previous / 2.0).floor().max(1.0), index),
    }
}

/// Result of evaluating a logged session. `new_state` is present only when
/// the session type warrants a scheduling update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEvaluation {
    pub session_type: SessionType,
    pub new_state: Option<TopicReviewState>,
}

/// Classifies a session and, for first exposures and reviews, computes the
/// topic's next state. Practice sessions return no state: the caller logs the
/// session and leaves scheduling untouched.
pub fn evaluate_session(
    topic_id: i64,
    prior: &TopicReviewState,
    policy: &ReviewPolicy,
    classifier: &SessionClassifier,
    explicit_type: Option<SessionType>,
    outcome: Option<ReviewOutcome>,
    now: DateTime<Utc>,
) -> Result<SessionEvaluation, ScheduleError> {
    let session_type = classifier.classify(prior, now, explicit_type);

    if !session_type.is_scheduling() {
        debug!("topic {}: practice session, schedule unchanged", topic_id);
        return Ok(SessionEvaluation {
            session_type,
            new_state: None,
        });
    }

    let outcome = outcome.ok_or_else(|| {
        ScheduleError::InvalidOutcome(format!(
            "an outcome is required for a {} session on topic {}",
            session_type.as_str(),
            topic_id
        ))
    })?;

    let new_state = apply_review(policy, prior, session_type, outcome, now)?;
    Ok(SessionEvaluation {
        session_type,
        new_state: Some(new_state),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyInput;
    use crate::state::TopicStatus;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, day, 10, 0, 0).unwrap()
    }

    fn policy() -> ReviewPolicy {
        ReviewPolicy::new(PolicyInput {
            base_intervals: vec![1.0, 7.0, 30.0, 90.0],
            perfect_multiplier: 2.5,
            good_multiplier: 2.0,
            regular_multiplier: 1.2,
            bad_reset: true,
        })
        .unwrap()
    }

    fn no_reset_policy() -> ReviewPolicy {
        let mut input = policy().to_input();
        input.bad_reset = false;
        ReviewPolicy::new(input).unwrap()
    }

    fn review(
        policy: &ReviewPolicy,
        state: &TopicReviewState,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> TopicReviewState {
        apply_review(policy, state, SessionType::Review, outcome, now).unwrap()
    }

    fn reviewed(interval: f64, index: usize, mastery: u8, status: TopicStatus) -> TopicReviewState {
        TopicReviewState {
            mastery_level: mastery,
            status,
            interval_index: index,
            current_interval_days: Some(interval),
            last_reviewed_at: Some(at(1)),
            next_due_at: Some(due_after(at(1), interval)),
            review_count: 5,
        }
    }

    const OUTCOMES: [ReviewOutcome; 4] = [
        ReviewOutcome::Perfect,
        ReviewOutcome::Good,
        ReviewOutcome::Regular,
        ReviewOutcome::Bad,
    ];

    mod scenario_tests {
        use super::*;

        #[test]
        fn scenario_a_first_exposure_perfect() {
            let s = apply_review(
                &policy(),
                &TopicReviewState::default(),
                SessionType::FirstTime,
                ReviewOutcome::Perfect,
                at(1),
            )
            .unwrap();

            assert_eq!(s.current_interval_days, Some(1.0));
            assert_eq!(s.interval_index, 0);
            assert_eq!(s.mastery_level, 3);
            assert_eq!(s.status, TopicStatus::InProgress);
            assert_eq!(s.review_count, 1);
            assert_eq!(s.last_reviewed_at, Some(at(1)));
            assert_eq!(s.next_due_at, Some(at(2)));
        }

        #[test]
        fn scenario_b_second_review_good() {
            let p = policy();
            let first = apply_review(
                &p,
                &TopicReviewState::default(),
                SessionType::FirstTime,
                ReviewOutcome::Perfect,
                at(1),
            )
            .unwrap();
            let second = review(&p, &first, ReviewOutcome::Good, at(2));

            assert_eq!(second.current_interval_days, Some(2.0));
            assert_eq!(second.interval_index, 1);
            assert_eq!(second.mastery_level, 4);
            assert_eq!(second.review_count, 2);
            assert_eq!(second.next_due_at, Some(at(4)));
        }

        #[test]
        fn scenario_c_bad_without_reset_halves() {
            let state = reviewed(30.0, 2, 9, TopicStatus::InProgress);
            let s = review(&no_reset_policy(), &state, ReviewOutcome::Bad, at(2));

            assert_eq!(s.current_interval_days, Some(15.0));
            assert_eq!(s.mastery_level, 7);
            assert_eq!(s.interval_index, 2);
            assert_eq!(s.status, TopicStatus::InProgress);
        }

        #[test]
        fn scenario_c_bad_without_reset_demotes_mastered() {
            let state = reviewed(30.0, 2, 9, TopicStatus::Mastered);
            let s = review(&no_reset_policy(), &state, ReviewOutcome::Bad, at(2));
            assert_eq!(s.current_interval_days, Some(15.0));
            assert_eq!(s.status, TopicStatus::InProgress);
        }

        #[test]
        fn scenario_d_bad_demotes_mastered_topic() {
            let state = reviewed(90.0, 3, 10, TopicStatus::Mastered);
            let s = review(&policy(), &state, ReviewOutcome::Bad, at(2));
            assert_eq!(s.status, TopicStatus::InProgress);
            assert_eq!(s.mastery_level, 8);
        }

        #[test]
        fn scenario_e_early_session_is_practice_without_state() {
            let state = reviewed(7.0, 1, 4, TopicStatus::InProgress);
            let eval = evaluate_session(
                1,
                &state,
                &policy(),
                &SessionClassifier::default(),
                None,
                Some(ReviewOutcome::Perfect),
                at(2),
            )
            .unwrap();

            assert_eq!(eval.session_type, SessionType::Practice);
            assert!(eval.new_state.is_none());
        }
    }

    mod interval_tests {
        use super::*;

        #[test]
        fn first_exposure_uses_first_interval_for_any_outcome() {
            let p = ReviewPolicy::new(PolicyInput {
                base_intervals: vec![3.0, 10.0],
                ..PolicyInput::default()
            })
            .unwrap();
            for outcome in OUTCOMES {
                let s = apply_review(
                    &p,
                    &TopicReviewState::default(),
                    SessionType::FirstTime,
                    outcome,
                    at(1),
                )
                .unwrap();
                assert_eq!(s.current_interval_days, Some(3.0), "{:?}", outcome);
                assert_eq!(s.interval_index, 0);
            }
        }

        #[test]
        fn first_exposure_keyed_on_review_count_not_session_type() {
            let s = review(&policy(), &TopicReviewState::default(), ReviewOutcome::Bad, at(1));
            assert_eq!(s.current_interval_days, Some(1.0));
            assert_eq!(s.mastery_level, 1);
            assert_eq!(s.status, TopicStatus::InProgress);
        }

        #[test]
        fn perfect_multiplies_and_advances() {
            let s = review(
                &policy(),
                &reviewed(4.0, 1, 5, TopicStatus::InProgress),
                ReviewOutcome::Perfect,
                at(2),
            );
            assert_eq!(s.current_interval_days, Some(10.0));
            assert_eq!(s.interval_index, 2);
        }

        #[test]
        fn regular_scales_but_holds_index() {
            let s = review(
                &policy(),
                &reviewed(10.0, 1, 5, TopicStatus::InProgress),
                ReviewOutcome::Regular,
                at(2),
            );
            assert_eq!(s.current_interval_days, Some(12.0));
            assert_eq!(s.interval_index, 1);
            assert_eq!(s.mastery_level, 5);
        }

        #[test]
        fn growth_continues_past_table_end() {
            let p = policy();
            let mut s = reviewed(90.0, 3, 5, TopicStatus::InProgress);
            s = review(&p, &s, ReviewOutcome::Good, at(2));
            assert_eq!(s.interval_index, 3);
            assert_eq!(s.current_interval_days, Some(180.0));
            s = review(&p, &s, ReviewOutcome::Perfect, at(3));
            assert_eq!(s.interval_index, 3);
            assert_eq!(s.current_interval_days, Some(450.0));
        }

        #[test]
        fn bad_with_reset_returns_to_first_interval() {
            let s = review(
                &policy(),
                &reviewed(45.0, 3, 6, TopicStatus::InProgress),
                ReviewOutcome::Bad,
                at(2),
            );
            assert_eq!(s.current_interval_days, Some(1.0));
            assert_eq!(s.interval_index, 0);
        }

        #[test]
        fn bad_without_reset_floors_at_one_day() {
            let p = no_reset_policy();
            let s = review(
                &p,
                &reviewed(1.0, 0, 3, TopicStatus::InProgress),
                ReviewOutcome::Bad,
                at(2),
            );
            assert_eq!(s.current_interval_days, Some(1.0));

            let s = review(

                &p,

                &reviewed(5.0, 1, 3, TopicStatus::InProgress),

                ReviewOutcome::Bad,

                at(2),

            );
            assert_eq!(s.current_interval_days, Some(2.0));
        }

        #[test]
        fn perfect_then_bad_with_reset_round_trips() {
            let p = policy();
            let start = reviewed(7.0, 1, 5, TopicStatus::InProgress);
            let up = review(&p, &start, ReviewOutcome::Perfect, at(2));
            let down = review(&p, &up, ReviewOutcome::Bad, at(3));
            assert_eq!(down.current_interval_days, Some(p.first_interval()));
        }

        #[test]
        fn shrunk_policy_clamps_stale_index() {
            let short = ReviewPolicy::new(PolicyInput {
                base_intervals: vec![2.0, 5.0],
                ..PolicyInput::default()
            })
            .unwrap();
            let s = review(
                &short,
                &reviewed(30.0, 3, 5, TopicStatus::InProgress),
                ReviewOutcome::Regular,
                at(2),
            );
            assert_eq!(s.interval_index, 1);
        }

        #[test]
        fn missing_interval_falls_back_to_table() {
            let state = TopicReviewState {
                review_count: 1,
                interval_index: 1,
                ..Default::default()
            };
            let s = review(&policy(), &state, ReviewOutcome::Good, at(2));
            assert_eq!(s.current_interval_days, Some(14.0));
        }

        #[test]
        fn interval_growth_is_capped() {
            let s = review(
                &policy(),
                &reviewed(MAX_INTERVAL_DAYS, 3, 5, TopicStatus::InProgress),
                ReviewOutcome::Perfect,
                at(2),
            );
            assert_eq!(s.current_interval_days, Some(MAX_INTERVAL_DAYS));
        }

        #[test]
        fn next_due_is_last_reviewed_plus_interval() {
            let s = review(
                &policy(),
                &reviewed(10.0, 1, 5, TopicStatus::InProgress),
                ReviewOutcome::Regular,
                at(2),
            );
            assert_eq!(s.next_due_at, Some(at(2) + Duration::hours(12 * 24)));
            assert_eq!(
                s.next_due_at,
                Some(due_after(s.last_reviewed_at.unwrap(), s.current_interval_days.unwrap()))
            );
        }
    }

    mod mastery_tests {
        use super::*;

        #[test]
        fn deltas() {
            assert_eq!(mastery_delta(ReviewOutcome::Perfect), 2);
            assert_eq!(mastery_delta(ReviewOutcome::Good), 1);
            assert_eq!(mastery_delta(ReviewOutcome::Regular), 0);
            assert_eq!(mastery_delta(ReviewOutcome::Bad), -2);
        }

        #[test]
        fn perfect_streak_masters_topic() {
            let p = policy();
            let mut s = apply_review(
                &p,
                &TopicReviewState::default(),
                SessionType::FirstTime,
                ReviewOutcome::Perfect,
                at(1),
            )
            .unwrap();
            for day in 2..=5 {
                s = review(&p, &s, ReviewOutcome::Perfect, at(day));
            }
            assert_eq!(s.mastery_level, 10);
            assert_eq!(s.status, TopicStatus::Mastered);

            s = review(&p, &s, ReviewOutcome::Perfect, at(6));
            assert_eq!(s.mastery_level, 10);
        }

        #[test]
        fn repeated_bad_floors_at_one() {
            let p = policy();
            let mut s = reviewed(7.0, 1, 2, TopicStatus::InProgress);
            for day in 2..=4 {
                s = review(&p, &s, ReviewOutcome::Bad, at(day));
            }
            assert_eq!(s.mastery_level, 1);
        }
    }

    mod property_tests {
        use super::*;

        // Walks every outcome sequence of length 4 and checks the bounds hold
        // after each step.
        #[test]
        fn bounds_hold_for_all_short_sequences() {
            for p in [policy(), no_reset_policy()] {
                for code in 0..(4usize.pow(4)) {
                    let mut state = TopicReviewState::default();
                    let mut c = code;
                    for step in 0..4 {
                        let outcome = OUTCOMES[c % 4];
                        c /= 4;
                        let prev = state.clone();
                        state = review(&p, &state, outcome, at(1 + step));

                        assert!((1..=10).contains(&state.mastery_level));
                        assert!(state.interval_index <= p.last_index());
                        assert_eq!(state.review_count, prev.review_count + 1);
                        assert!(state.current_interval_days.unwrap() >= 1.0);
                        assert!(state.next_due_at.is_some());

                        if outcome != ReviewOutcome::Bad {
                            assert!(state.status >= prev.status);
                        } else if prev.status != TopicStatus::Mastered {
                            assert!(state.status >= prev.status);
                        }
                    }
                }
            }
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn practice_is_rejected_by_apply_review() {
            let err = apply_review(
                &policy(),
                &reviewed(7.0, 1, 4, TopicStatus::InProgress),
                SessionType::Practice,
                ReviewOutcome::Good,
                at(2),
            )
            .unwrap_err();
            assert!(matches!(err, ScheduleError::InvalidState(_)));
        }

        #[test]
        fn scheduling_session_without_outcome_is_invalid_outcome() {
            let err = evaluate_session(
                3,
                &TopicReviewState::default(),
                &policy(),
                &SessionClassifier::default(),
                None,
                None,
                at(1),
            )
            .unwrap_err();
            assert!(matches!(err, ScheduleError::InvalidOutcome(_)));
        }

        #[test]
        fn practice_without_outcome_is_fine() {
            let eval = evaluate_session(
                3,
                &TopicReviewState::default(),
                &policy(),
                &SessionClassifier::default(),
                Some(SessionType::Practice),
                None,
                at(1),
            )
            .unwrap();
            assert_eq!(eval.session_type, SessionType::Practice);
            assert!(eval.new_state.is_none());
        }
    }

    mod evaluate_tests {
        use super::*;

        #[test]
        fn fresh_topic_evaluates_as_first_time() {
            let eval = evaluate_session(
                1,
                &TopicReviewState::default(),
                &policy(),
                &SessionClassifier::default(),
                None,
                Some(ReviewOutcome::Good),
                at(1),
            )
            .unwrap();
            assert_eq!(eval.session_type, SessionType::FirstTime);
            let s = eval.new_state.unwrap();
            assert_eq!(s.mastery_level, 2);
            assert_eq!(s.current_interval_days, Some(1.0));
        }

        #[test]
        fn due_topic_evaluates_as_review() {
            let state = reviewed(7.0, 1, 4, TopicStatus::InProgress);
            let eval = evaluate_session(
                1,
                &state,
                &policy(),
                &SessionClassifier::default(),
                None,
                Some(ReviewOutcome::Good),
                at(9),
            )
            .unwrap();
            assert_eq!(eval.session_type, SessionType::Review);
            assert_eq!(eval.new_state.unwrap().current_interval_days, Some(14.0));
        }

        #[test]
        fn explicit_review_overrides_schedule() {
            let state = reviewed(7.0, 1, 4, TopicStatus::InProgress);
            let eval = evaluate_session(
                1,
                &state,
                &policy(),
                &SessionClassifier::default(),
                Some(SessionType::Review),
                Some(ReviewOutcome::Regular),
                at(2),
            )
            .unwrap();
            assert_eq!(eval.session_type, SessionType::Review);
            assert!(eval.new_state.is_some());
        }
    }
}
