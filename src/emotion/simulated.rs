use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::emotion::{Emotion, EmotionResult, Origin};

// simulated confidences are drawn from [MIN_CONFIDENCE, MAX_CONFIDENCE]
const MIN_CONFIDENCE: f32 = 0.7;
const MAX_CONFIDENCE: f32 = 1.0;

/// Stand-in for a missing or failing emotion model.
#[derive(Debug)]
pub struct EmotionSimulator {
    rng: Mutex<StdRng>,
}

impl EmotionSimulator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// A uniformly random emotion with confidence uniform in [0.7, 1.0].
    pub fn simulate(&self) -> EmotionResult {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let emotion = Emotion::ALL[rng.gen_range(0..Emotion::ALL.len())];
        let confidence = rng.gen_range(MIN_CONFIDENCE..=MAX_CONFIDENCE);

        EmotionResult {
            emotion,
            confidence,
            origin: Origin::Simulated,
        }
    }
}

impl Default for EmotionSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_simulated_results_stay_in_range() {
        let simulator = EmotionSimulator::new();
        for _ in 0..1000 {
            let result = simulator.simulate();
            assert!(Emotion::ALL.contains(&result.emotion));
            assert!(result.confidence >= 0.7 && result.confidence <= 1.0);
            assert_eq!(result.origin, Origin::Simulated);
        }
    }

    #[test]
    fn test_simulation_covers_every_label() {
        let simulator = EmotionSimulator::seeded(42);
        let seen: HashSet<Emotion> = (0..500).map(|_| simulator.simulate().emotion).collect();
        assert_eq!(seen.len(), Emotion::ALL.len());
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = EmotionSimulator::seeded(7);
        let b = EmotionSimulator::seeded(7);
        for _ in 0..20 {
            assert_eq!(a.simulate(), b.simulate());
        }
    }
}
