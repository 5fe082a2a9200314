//! Native trial-based configuration optimizer.
//!
//! Each candidate configuration is scored against a 1-D data series with a
//! smoothness fitness proxy. Every trial adds a little seeded Gaussian jitter;
//! the final score penalizes unstable candidates.

use std::collections::BTreeMap;
use thiserror::Error;

/// Seed of the per-candidate jitter generator.
const JITTER_SEED: u64 = 12345;
const JITTER_STDDEV: f64 = 0.02;
const SPEED_SCALE: f64 = 40.0;
const STDDEV_PENALTY: f64 = 0.5;

pub const DEFAULT_TRIALS: usize = 5;
pub const DEFAULT_TOP_K: usize = 3;

/// Named parameters of one candidate.
pub type Config = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimizerError {
    #[error("need at least 2 data points, got {0}")]
    NotEnoughData(usize),
    #[error("trials must be at least 1")]
    NoTrials,
    #[error("config #{index} lacks the '{parameter}' parameter")]
    MissingParameter {
        index: usize,
        parameter: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredConfig {
    pub score: f64,
    pub config: Config,
}

/// Inverse roughness of `data`, scaled by the `speed` parameter. Higher is
/// smoother.
#[must_use]
pub fn fitness_proxy(data: &[f64], speed: f64) -> f64 {
    let factor = speed / SPEED_SCALE;
    let sum_sq = data
        .windows(2)
        .map(|w| {
            let d = factor * (w[1] - w[0]);
            d * d
        })
        .sum::<f64>();
    1.0 / (sum_sq + 1e-6)
}

/// Standard normal sample via Box-Muller.
fn standard_normal(rng: &mut fastrand::Rng) -> f64 {
    // 1 - [0, 1) keeps ln() away from zero
    let u1 = 1.0 - rng.f64();
    let u2 = rng.f64();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Scores one candidate over `trials` jittered evaluations.
///
/// Returns `mean - 0.5 * stddev` of the trial scores.
pub fn evaluate_candidate(data: &[f64], speed: f64, trials: usize) -> Result<f64, OptimizerError> {
    if trials == 0 {
        return Err(OptimizerError::NoTrials);
    }

    let mut rng = fastrand::Rng::with_seed(JITTER_SEED);
    let base = fitness_proxy(data, speed);
    let scores = (0..trials)
        .map(|_| base + JITTER_STDDEV * standard_normal(&mut rng))
        .collect::<Vec<_>>();

    let n = trials as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let var = scores.iter().map(|s| s * s).sum::<f64>() / n - mean * mean;
    let stddev = if var > 0.0 { var.sqrt() } else { 0.0 };

    Ok(mean - STDDEV_PENALTY * stddev)
}

/// Returns the `top_k` best configs, best first.
pub fn optimize(
    configs: &[Config],
    data: &[f64],
    trials: usize,
    top_k: usize,
) -> Result<Vec<ScoredConfig>, OptimizerError> {
    if data.len() < 2 {
        return Err(OptimizerError::NotEnoughData(data.len()));
    }

    let mut scored = configs
        .iter()
        .enumerate()
        .map(|(index, config)| {
            let speed = *config
                .get("speed")
                .ok_or(OptimizerError::MissingParameter {
                    index,
                    parameter: "speed",
                })?;
            Ok((evaluate_candidate(data, speed, trials)?, index))
        })
        .collect::<Result<Vec<_>, OptimizerError>>()?;

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    tracing::debug!(candidates = configs.len(), trials, top_k, "optimized configs");

    Ok(scored
        .into_iter()
        .take(top_k)
        .map(|(score, index)| ScoredConfig {
            score,
            config: configs[index].clone(),
        })
        .collect())
}
