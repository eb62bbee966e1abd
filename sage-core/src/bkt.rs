//! Bayesian Knowledge Tracing core
//!
//! A two-state hidden Markov model per knowledge component. Each observed
//! response drives one Bayes step conditioned on slip/guess, followed by the
//! learning transition. All functions here are pure; the session engine owns
//! the state they produce.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::KcState;

/// P(learned) at or above which a knowledge component counts as mastered
pub const BKT_MASTERY_THRESHOLD: f64 = 0.95;

/// BKT parameters for one knowledge component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BktParams {
    /// Prior probability the KC is already learned
    pub p_l0: f64,
    /// Probability of transitioning to learned after a practice opportunity
    pub p_t: f64,
    /// Probability of slipping (wrong despite learned)
    pub p_s: f64,
    /// Probability of guessing (right despite unlearned)
    pub p_g: f64,
}

impl BktParams {
    pub fn new(p_l0: f64, p_t: f64, p_s: f64, p_g: f64) -> Self {
        Self { p_l0, p_t, p_s, p_g }
    }

    /// Reject parameters outside `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("pL0", self.p_l0),
            ("pT", self.p_t),
            ("pS", self.p_s),
            ("pG", self.p_g),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidArgument(format!(
                    "BKT parameter {name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Immutable registry of the knowledge-component catalogue
///
/// Built once at startup and shared read-only across sessions. `BTreeMap`
/// keeps iteration order deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KcCatalogue {
    entries: BTreeMap<String, BktParams>,
}

impl KcCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalogue, validating every parameter set
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, BktParams)>,
    ) -> Result<Self> {
        let mut catalogue = Self::new();
        for (kc_id, params) in entries {
            params.validate()?;
            catalogue.entries.insert(kc_id, params);
        }
        Ok(catalogue)
    }

    pub fn get(&self, kc_id: &str) -> Option<&BktParams> {
        self.entries.get(kc_id)
    }

    pub fn contains(&self, kc_id: &str) -> bool {
        self.entries.contains_key(kc_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BktParams)> {
        self.entries.iter()
    }

    /// Wrap in an `Arc` for sharing with the engine
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// One Bayes step plus the learning transition
///
/// Returns the new P(learned), clamped to `[0, 1]`. A zero denominator only
/// arises from degenerate parameter settings the catalogue must not contain,
/// so it aborts rather than propagating NaN.
pub fn posterior_update(p_learned: f64, correct: bool, params: &BktParams) -> Result<f64> {
    let prior = p_learned.clamp(0.0, 1.0);

    let (numerator, denominator) = if correct {
        (
            prior * (1.0 - params.p_s),
            prior * (1.0 - params.p_s) + (1.0 - prior) * params.p_g,
        )
    } else {
        (
            prior * params.p_s,
            prior * params.p_s + (1.0 - prior) * (1.0 - params.p_g),
        )
    };
    if denominator == 0.0 {
        return Err(EngineError::Numeric(format!(
            "zero denominator in BKT update (correct={correct}, prior={prior})"
        )));
    }

    let evidence = numerator / denominator;
    let learned = evidence + (1.0 - evidence) * params.p_t;
    Ok(learned.clamp(0.0, 1.0))
}

/// Apply one observed response to a KC state, returning the successor state
pub fn update_kc_state(state: &KcState, correct: bool, params: &BktParams) -> Result<KcState> {
    let p_learned = posterior_update(state.p_learned, correct, params)?;
    Ok(KcState {
        kc_id: state.kc_id.clone(),
        p_learned,
        attempts: state.attempts + 1,
        correct: state.correct + u32::from(correct),
        is_mastered: p_learned >= BKT_MASTERY_THRESHOLD,
    })
}

/// Fresh state for a KC, seeded from its catalogue prior
pub fn initial_state(kc_id: &str, params: &BktParams) -> KcState {
    let p_learned = params.p_l0.clamp(0.0, 1.0);
    KcState {
        kc_id: kc_id.to_string(),
        p_learned,
        attempts: 0,
        correct: 0,
        is_mastered: p_learned >= BKT_MASTERY_THRESHOLD,
    }
}

/// Initial state map covering the whole catalogue
pub fn initialise_all(catalogue: &KcCatalogue) -> BTreeMap<String, KcState> {
    catalogue
        .iter()
        .map(|(kc_id, params)| (kc_id.clone(), initial_state(kc_id, params)))
        .collect()
}

/// Aggregate mastery picture over a session's KC states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterySummary {
    pub total: usize,
    pub mastered: usize,
    /// Attempted at least once but not yet mastered
    pub in_progress: usize,
    pub not_started: usize,
    /// Percentage of KCs mastered, rounded to the nearest integer
    pub overall_progress: u32,
}

/// Summarise a session's KC states
pub fn summarise<'a>(states: impl IntoIterator<Item = &'a KcState>) -> MasterySummary {
    let mut total = 0;
    let mut mastered = 0;
    let mut in_progress = 0;
    let mut not_started = 0;
    for state in states {
        total += 1;
        if state.is_mastered {
            mastered += 1;
        } else if state.attempts > 0 {
            in_progress += 1;
        } else {
            not_started += 1;
        }
    }
    let overall_progress = if total == 0 {
        0
    } else {
        (100.0 * mastered as f64 / total as f64).round() as u32
    };
    MasterySummary {
        total,
        mastered,
        in_progress,
        not_started,
        overall_progress,
    }
}

/// The non-mastered KC with the lowest P(learned)
///
/// Ties break lexicographically by KC id so the answer is deterministic.
pub fn weakest_unmastered<'a>(
    states: impl IntoIterator<Item = &'a KcState>,
) -> Option<&'a KcState> {
    let mut weakest: Option<&KcState> = None;
    for state in states {
        if state.is_mastered {
            continue;
        }
        weakest = match weakest {
            None => Some(state),
            Some(current) => {
                if state.p_learned < current.p_learned
                    || (state.p_learned == current.p_learned && state.kc_id < current.kc_id)
                {
                    Some(state)
                } else {
                    Some(current)
                }
            }
        };
    }
    weakest
}
