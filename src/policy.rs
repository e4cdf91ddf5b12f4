use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::state::MAX_INTERVAL_DAYS;

/// Raw, unvalidated policy fields as supplied by a user or read from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyInput {
    pub base_intervals: Vec<f64>,
    pub perfect_multiplier: f64,
    pub good_multiplier: f64,
    pub regular_multiplier: f64,
    pub bad_reset: bool,
}

impl Default for PolicyInput {
    fn default() -> Self {
        Self {
            base_intervals: vec![1.0, 7.0, 30.0, 90.0],
            perfect_multiplier: 2.5,
            good_multiplier: 2.0,
            regular_multiplier: 1.2,
            bad_reset: true,
        }
    }
}

/// Checks every policy invariant, reporting the first violation.
pub fn validate_policy_input(input: &PolicyInput) -> Result<(), ScheduleError> {
    if input.base_intervals.is_empty() {
        return Err(ScheduleError::InvalidPolicy(
            "base intervals must not be empty".to_string(),
        ));
    }

    if let Some((i, days)) = input
        .base_intervals
        .iter()
        .enumerate()
        .find(|(_, d)| !d.is_finite() || **d <= 0.0 || **d > MAX_INTERVAL_DAYS)
    {
        return Err(ScheduleError::InvalidPolicy(format!(
            "base interval {} must be between 0 and {} days, got {}",
            i, MAX_INTERVAL_DAYS, days
        )));
    }

    let multipliers = [
        ("perfect", input.perfect_multiplier),
        ("good", input.good_multiplier),
        ("regular", input.regular_multiplier),
    ];
    for (name, value) in multipliers {
        if !value.is_finite() || value < 1.0 {
            return Err(ScheduleError::InvalidPolicy(format!(
                "{} multiplier must be at least 1, got {}",
                name, value
            )));
        }
    }

    Ok(())
}

/// Validated, immutable scheduling parameters for one user.
///
/// The only way to obtain one is [`ReviewPolicy::new`], so every instance in
/// circulation satisfies the policy invariants. Updating a user's policy means
/// building a new value and replacing the stored one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "PolicyInput")]
pub struct ReviewPolicy {
    base_intervals: Vec<f64>,
    perfect_multiplier: f64,
    good_multiplier: f64,
    regular_multiplier: f64,
    bad_reset: bool,
}

impl ReviewPolicy {
    pub fn new(input: PolicyInput) -> Result<Self, ScheduleError> {
        validate_policy_input(&input)?;
        Ok(Self {
            base_intervals: input.base_intervals,
            perfect_multiplier: input.perfect_multiplier,
            good_multiplier: input.good_multiplier,
            regular_multiplier: input.regular_multiplier,
            bad_reset: input.bad_reset,
        })
    }

    pub fn base_intervals(&self) -> &[f64] {
        &self.base_intervals
    }

    pub fn first_interval(&self) -> f64 {
        self.base_intervals[0]
    }

    pub fn last_index(&self) -> usize {
        self.base_intervals.len() - 1
    }

    pub fn perfect_multiplier(&self) -> f64 {
        self.perfect_multiplier
    }

    pub fn good_multiplier(&self) -> f64 {
        self.good_multiplier
    }

    pub fn regular_multiplier(&self) -> f64 {
        self.regular_multiplier
    }

    pub fn bad_reset(&self) -> bool {
        self.bad_reset
    }

    pub fn to_input(&self) -> PolicyInput {
        PolicyInput {
            base_intervals: self.base_intervals.clone(),
            perfect_multiplier: self.perfect_multiplier,
            good_multiplier: self.good_multiplier,
            regular_multiplier: self.regular_multiplier,
            bad_reset: self.bad_reset,
        }
    }
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        let input = PolicyInput::default();
        Self {
            base_intervals: input.base_intervals,
            perfect_multiplier: input.perfect_multiplier,
            good_multiplier: input.good_multiplier,
            regular_multiplier: input.regular_multiplier,
            bad_reset: input.bad_reset,
        }
    }
}

impl From<ReviewPolicy> for PolicyInput {
    fn from(policy: ReviewPolicy) -> Self {
        PolicyInput {
            base_intervals: policy.base_intervals,
            perfect_multiplier: policy.perfect_multiplier,
            good_multiplier: policy.good_multiplier,
            regular_multiplier: policy.regular_multiplier,
            bad_reset: policy.bad_reset,
        }
    }
}

impl TryFrom<PolicyInput> for ReviewPolicy {
    type Error = ScheduleError;

    fn try_from(input: PolicyInput) -> Result<Self, Self::Error> {
        ReviewPolicy::new(input)
    }
}

/// Parses a comma-separated list of day counts such as `1,7,30,90`.
pub fn parse_intervals(s: &str) -> Result<Vec<f64>, ScheduleError> {
    s.split(',')
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f64>().map_err(|_| {
                ScheduleError::InvalidPolicy(format!("'{}' is not a number of days", part))
            })
        })
        .collect()
}
