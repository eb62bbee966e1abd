//! IRT 3PL core: item probability, item information, and grid EAP
//!
//! Pure, deterministic `f64` arithmetic. The grid geometry and prior
//! constants are fixed so that two deployments produce identical theta
//! trajectories for the same response history.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::IrtParams;

/// Logistic scaling constant aligning the logit to the normal ogive
pub const D: f64 = 1.7;

/// Prior ability mean for a fresh session (empirically calibrated)
pub const THETA_PRIOR_MEAN: f64 = -0.780;

/// Prior ability standard deviation for a fresh session
pub const THETA_PRIOR_SD: f64 = 0.543;

/// Lower edge of the posterior grid
pub const GRID_MIN: f64 = -4.0;

/// Upper edge of the posterior grid
pub const GRID_MAX: f64 = 4.0;

/// Number of grid points; step works out to 0.05
pub const GRID_POINTS: usize = 161;

/// Chance level for four-option items; also the mastery probability reported
/// for knowledge components absent from the catalogue
pub const DEFAULT_GUESSING: f64 = 0.25;

/// Predicted-correct probability counted as IRT mastery of an item
pub const IRT_MASTERY_PROBABILITY: f64 = 0.80;

/// One response in an ability-estimation history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredResponse {
    pub params: IrtParams,
    pub correct: bool,
}

/// Grid EAP result with a 95% credible interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EapEstimate {
    /// Posterior mean ability
    pub theta: f64,
    /// Posterior standard deviation, non-negative
    pub sd: f64,
    /// Conservative lower bound of the 95% credible interval
    pub ci_low: f64,
    /// Conservative upper bound of the 95% credible interval
    pub ci_high: f64,
}

/// 3PL item characteristic curve
///
/// `c + (1 - c) / (1 + exp(-D * a * (theta - b)))`, in `[c, 1)` for a valid
/// calibration.
pub fn probability(theta: f64, params: &IrtParams) -> f64 {
    params.c + (1.0 - params.c) / (1.0 + (-D * params.a * (theta - params.b)).exp())
}

/// Item information at `theta`
///
/// `D^2 * a^2 * (p - c)^2 / ((1 - c)^2 * p * (1 - p))`. A probability that
/// clamps all the way to 0 or 1 leaves no information to compute.
pub fn information(theta: f64, params: &IrtParams) -> Result<f64> {
    let p = probability(theta, params).clamp(0.0, 1.0);
    if p <= 0.0 || p >= 1.0 {
        return Err(EngineError::Numeric(format!(
            "item probability degenerate at theta={theta}: p={p}"
        )));
    }
    let numerator = D * D * params.a * params.a * (p - params.c).powi(2);
    let denominator = (1.0 - params.c).powi(2) * p * (1.0 - p);
    Ok(numerator / denominator)
}

/// Grid spacing between adjacent posterior points
fn grid_step() -> f64 {
    (GRID_MAX - GRID_MIN) / (GRID_POINTS - 1) as f64
}

/// Expected A Posteriori ability estimate over the fixed grid
///
/// The unnormalised posterior at each grid point is the Gaussian prior times
/// the 3PL likelihood of the full response history. Normalisation happens
/// once, after the likelihood sweep. With an empty history the estimate
/// reproduces the prior within grid resolution.
pub fn eap_estimate(
    responses: &[ScoredResponse],
    prior_mean: f64,
    prior_sd: f64,
) -> Result<EapEstimate> {
    if !prior_sd.is_finite() || prior_sd <= 0.0 {
        return Err(EngineError::InvalidArgument(format!(
            "prior sd must be positive, got {prior_sd}"
        )));
    }

    let step = grid_step();
    let mut points = Vec::with_capacity(GRID_POINTS);
    let mut weights = Vec::with_capacity(GRID_POINTS);

    for i in 0..GRID_POINTS {
        let t = GRID_MIN + step * i as f64;
        let z = (t - prior_mean) / prior_sd;
        let mut weight = (-0.5 * z * z).exp();
        for response in responses {
            let p = probability(t, &response.params);
            weight *= if response.correct { p } else { 1.0 - p };
        }
        points.push(t);
        weights.push(weight);
    }

    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(EngineError::Numeric(format!(
            "posterior mass degenerate after {} responses: total={total}",
            responses.len()
        )));
    }
    for weight in &mut weights {
        *weight /= total;
    }

    let theta: f64 = points
        .iter()
        .zip(&weights)
        .map(|(t, w)| t * w)
        .sum();
    let variance: f64 = points
        .iter()
        .zip(&weights)
        .map(|(t, w)| (t - theta).powi(2) * w)
        .sum();
    let sd = variance.max(0.0).sqrt();

    // Conservative inclusive bounds: first grid point at or past each tail
    // mass, scanning from the low end.
    let mut ci_low = points[0];
    let mut ci_high = points[GRID_POINTS - 1];
    let mut low_found = false;
    let mut cumulative = 0.0;
    for (t, w) in points.iter().zip(&weights) {
        cumulative += w;
        if !low_found && cumulative >= 0.025 {
            ci_low = *t;
            low_found = true;
        }
        if cumulative >= 0.975 {
            ci_high = *t;
            break;
        }
    }

    Ok(EapEstimate {
        theta,
        sd,
        ci_low,
        ci_high,
    })
}

/// EAP under the calibrated session prior
pub fn eap_estimate_with_default_prior(responses: &[ScoredResponse]) -> Result<EapEstimate> {
    eap_estimate(responses, THETA_PRIOR_MEAN, THETA_PRIOR_SD)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(a: f64, b: f64, c: f64) -> IrtParams {
        IrtParams::new(a, b, c)
    }

    #[test]
    fn grid_step_is_five_hundredths() {
        assert!((grid_step() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn probability_stays_within_item_floor_and_one() {
        let item = params(1.2, -1.5, 0.25);
        for i in -40..=40 {
            let theta = i as f64 / 5.0;
            let p = probability(theta, &item);
            assert!(p >= item.c, "p={p} below floor at theta={theta}");
            assert!(p < 1.0, "p={p} reached 1 at theta={theta}");
        }
    }

    #[test]
    fn probability_is_half_way_up_at_difficulty() {
        // At theta == b the logistic term is exactly 1/2
        let item = params(1.0, 0.3, 0.2);
        let p = probability(0.3, &item);
        assert!((p - (0.2 + 0.8 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn information_is_non_negative_over_the_grid() {
        let item = params(1.2, 0.0, 0.25);
        for i in 0..GRID_POINTS {
            let theta = GRID_MIN + grid_step() * i as f64;
            let info = information(theta, &item).unwrap();
            assert!(info >= 0.0, "negative information at theta={theta}");
        }
    }

    #[test]
    fn information_matches_hand_computation() {
        let item = params(1.2, -1.5, 0.25);
        let theta = -0.78;
        let p = probability(theta, &item);
        let expected = D * D * 1.2 * 1.2 * (p - 0.25).powi(2) / (0.75_f64.powi(2) * p * (1.0 - p));
        assert!((information(theta, &item).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_history_reproduces_the_prior() {
        let estimate = eap_estimate(&[], THETA_PRIOR_MEAN, THETA_PRIOR_SD).unwrap();
        assert!(
            (estimate.theta - THETA_PRIOR_MEAN).abs() < 0.05,
            "theta {} drifted from prior",
            estimate.theta
        );
        assert!(
            (estimate.sd - THETA_PRIOR_SD).abs() < 0.05,
            "sd {} drifted from prior",
            estimate.sd
        );
    }

    #[test]
    fn correct_response_raises_theta() {
        let history = [ScoredResponse {
            params: params(1.2, -1.5, 0.25),
            correct: true,
        }];
        let estimate = eap_estimate_with_default_prior(&history).unwrap();
        assert!(estimate.theta > THETA_PRIOR_MEAN);
    }

    #[test]
    fn incorrect_response_lowers_theta() {
        let history = [ScoredResponse {
            params: params(1.2, -1.5, 0.25),
            correct: false,
        }];
        let estimate = eap_estimate_with_default_prior(&history).unwrap();
        assert!(estimate.theta < THETA_PRIOR_MEAN);
    }

    #[test]
    fn credible_interval_brackets_theta() {
        let history = [
            ScoredResponse {
                params: params(1.2, -1.5, 0.25),
                correct: true,
            },
            ScoredResponse {
                params: params(1.0, -0.8, 0.25),
                correct: false,
            },
            ScoredResponse {
                params: params(0.9, -0.6, 0.25),
                correct: true,
            },
        ];
        let estimate = eap_estimate_with_default_prior(&history).unwrap();
        let step = grid_step();
        assert!(estimate.ci_low <= estimate.theta + step);
        assert!(estimate.ci_high >= estimate.theta - step);
        assert!(estimate.ci_low < estimate.ci_high);
    }

    #[test]
    fn more_responses_shrink_the_posterior_sd() {
        let one = [ScoredResponse {
            params: params(1.2, -0.8, 0.25),
            correct: true,
        }];
        let many: Vec<ScoredResponse> = (0..6)
            .map(|i| ScoredResponse {
                params: params(1.2, -0.8 + 0.1 * i as f64, 0.25),
                correct: i % 2 == 0,
            })
            .collect();

        let sd_one = eap_estimate_with_default_prior(&one).unwrap().sd;
        let sd_many = eap_estimate_with_default_prior(&many).unwrap().sd;
        assert!(sd_many < sd_one);
    }

    #[test]
    fn eap_rejects_non_positive_prior_sd() {
        assert!(matches!(
            eap_estimate(&[], 0.0, 0.0),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            eap_estimate(&[], 0.0, -1.0),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn eap_is_deterministic_for_identical_input() {
        let history = [ScoredResponse {
            params: params(1.1, 0.2, 0.25),
            correct: true,
        }];
        let first = eap_estimate_with_default_prior(&history).unwrap();
        let second = eap_estimate_with_default_prior(&history).unwrap();
        assert_eq!(first, second);
    }
}
