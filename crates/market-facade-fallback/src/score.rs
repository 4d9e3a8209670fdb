//! Health-weighted scoring used by [`crate::FallbackChain::reorder`].

/// The inputs `reorder` scores a venue on. Pulled from the venue's latest
/// `HealthRecord` plus its circuit breaker state — the fallback chain
/// doesn't own either of those, so the facade orchestrator pushes a fresh
/// `ScoreInputs` in via [`crate::FallbackChain::update_score`] whenever it
/// observes a health check or a circuit transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    pub healthy: bool,
    /// Fraction of recent health checks (or calls) that succeeded, in `[0, 1]`.
    pub success_rate: f64,
    /// Latency normalized against the chain's slowest venue, in `[0, 1]`
    /// (0 = fastest venue in the chain, 1 = slowest).
    pub normalized_latency: f64,
    pub circuit_closed: bool,
}

impl Default for ScoreInputs {
    /// A venue nobody has reported on yet: treated as not-yet-healthy so it
    /// sorts behind venues with a proven track record, but not penalized on
    /// success rate or latency since there's no data to penalize it with.
    fn default() -> Self {
        Self {
            healthy: false,
            success_rate: 1.0,
            normalized_latency: 0.0,
            circuit_closed: true,
        }
    }
}

/// Weights for the §4.F scoring formula:
/// `score = w_h·healthy_flag + w_s·success_rate + w_l·(1 − normalized_latency) + w_c·circuit_closed`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub healthy: f64,
    pub success_rate: f64,
    pub latency: f64,
    pub circuit_closed: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            healthy: 0.4,
            success_rate: 0.3,
            latency: 0.2,
            circuit_closed: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn score(&self, inputs: &ScoreInputs) -> f64 {
        self.healthy * bool_to_f64(inputs.healthy)
            + self.success_rate * inputs.success_rate
            + self.latency * (1.0 - inputs.normalized_latency)
            + self.circuit_closed * bool_to_f64(inputs.circuit_closed)
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_healthy_venue_scores_one() {
        let weights = ScoreWeights::default();
        let inputs = ScoreInputs {
            healthy: true,
            success_rate: 1.0,
            normalized_latency: 0.0,
            circuit_closed: true,
        };
        assert!((weights.score(&inputs) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fully_unhealthy_venue_scores_zero() {
        let weights = ScoreWeights::default();
        let inputs = ScoreInputs {
            healthy: false,
            success_rate: 0.0,
            normalized_latency: 1.0,
            circuit_closed: false,
        };
        assert!(weights.score(&inputs).abs() < 1e-9);
    }

    #[test]
    fn slower_venue_scores_lower_than_faster_one_otherwise_equal() {
        let weights = ScoreWeights::default();
        let fast = ScoreInputs {
            normalized_latency: 0.0,
            ..ScoreInputs::default()
        };
        let slow = ScoreInputs {
            normalized_latency: 1.0,
            ..ScoreInputs::default()
        };
        assert!(weights.score(&fast) > weights.score(&slow));
    }
}
