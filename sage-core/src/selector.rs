//! Next-item selection
//!
//! Adaptive sessions take the eligible item with the most information at the
//! current ability estimate; static sessions walk the authored order. Both
//! are deterministic given the same inputs.

use std::collections::HashSet;

use crate::error::Result;
use crate::irt;
use crate::types::{BloomLevel, Question};

/// Inputs to adaptive selection
#[derive(Debug, Clone, Default)]
pub struct SelectionCriteria {
    /// Ability estimate to maximise information at
    pub target_theta: f64,
    /// Question ids already answered in this session
    pub exclude_ids: HashSet<String>,
    /// Restrict candidates to one cognitive tier when set
    pub bloom_level: Option<BloomLevel>,
}

impl SelectionCriteria {
    pub fn new(target_theta: f64) -> Self {
        Self {
            target_theta,
            ..Self::default()
        }
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.exclude_ids.extend(ids);
        self
    }

    pub fn with_bloom_level(mut self, level: BloomLevel) -> Self {
        self.bloom_level = Some(level);
        self
    }

    fn eligible<'a, 'b: 'a>(&'a self, bank: &'b [Question]) -> impl Iterator<Item = &'b Question> + 'a {
        bank.iter().filter(move |question| {
            !self.exclude_ids.contains(&question.id)
                && self
                    .bloom_level
                    .map_or(true, |level| question.bloom == level)
        })
    }
}

/// Maximum-information selection
///
/// Ties break on the smallest `|b - target_theta|`, then lexicographically by
/// question id. Returns `None` when nothing is eligible.
pub fn select_adaptive<'a>(
    bank: &'a [Question],
    criteria: &SelectionCriteria,
) -> Result<Option<&'a Question>> {
    let mut best: Option<(&Question, f64)> = None;
    for question in criteria.eligible(bank) {
        let info = irt::information(criteria.target_theta, &question.irt)?;
        best = match best {
            None => Some((question, info)),
            Some((incumbent, incumbent_info)) => {
                if info > incumbent_info
                    || (info == incumbent_info
                        && closer_or_lower_id(question, incumbent, criteria.target_theta))
                {
                    Some((question, info))
                } else {
                    Some((incumbent, incumbent_info))
                }
            }
        };
    }
    Ok(best.map(|(question, _)| question))
}

fn closer_or_lower_id(candidate: &Question, incumbent: &Question, target_theta: f64) -> bool {
    let candidate_distance = (candidate.irt.b - target_theta).abs();
    let incumbent_distance = (incumbent.irt.b - target_theta).abs();
    candidate_distance < incumbent_distance
        || (candidate_distance == incumbent_distance && candidate.id < incumbent.id)
}

/// Authored-order selection for the static control condition
///
/// Ignores information entirely; serves the eligible item with the smallest
/// `order`.
pub fn select_static<'a>(
    bank: &'a [Question],
    exclude_ids: &HashSet<String>,
) -> Option<&'a Question> {
    bank.iter()
        .filter(|question| !exclude_ids.contains(&question.id))
        .min_by_key(|question| question.order)
}
