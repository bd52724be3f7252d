//! Candidate selection policies.
//!
//! A [`Strategy`] is created for a fixed number of candidates. Before each
//! dial the optimizer asks it for an attempt plan (candidate indices in the
//! order to try them) and reports every attempt's outcome back.
//!
//! | strategy               | plan                                   | retries |
//! |------------------------|----------------------------------------|---------|
//! | `first`                | declaration order                      | all     |
//! | `random`               | one uniformly chosen candidate         | none    |
//! | `rotate`               | one candidate, cursor advances per dial | none   |
//! | `track`                | best smoothed success ratio first      | all     |
//! | `minimizeDialDuration` | lowest latency estimate first          | all     |

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

use crate::config::StrategyKind;
use crate::core::LATENCY_EWMA_ALPHA;

/// Selection policy over a fixed candidate list.
pub trait Strategy: Send + Sync + fmt::Debug {
    /// Which policy this is.
    fn kind(&self) -> StrategyKind;

    /// Candidate indices to attempt, in order.
    fn plan(&self) -> Vec<usize>;

    /// Report the outcome of one attempt.
    fn record_outcome(&self, index: usize, success: bool, elapsed: Duration);
}

/// Build the strategy for `candidates` candidates.
///
/// `failure_penalty` is the latency charged to a failed attempt by
/// `minimizeDialDuration`.
pub fn strategy_for(
    kind: StrategyKind,
    candidates: usize,
    failure_penalty: Duration,
) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::First => Box::new(FirstStrategy::new(candidates)),
        StrategyKind::Random => Box::new(RandomStrategy::new(candidates)),
        StrategyKind::Rotate => Box::new(RotateStrategy::new(candidates)),
        StrategyKind::Track => Box::new(TrackStrategy::new(candidates)),
        StrategyKind::MinimizeDialDuration => {
            Box::new(MinimizeDialDuration::new(candidates, failure_penalty))
        }
    }
}

/// Declaration order.
#[derive(Debug)]
pub struct FirstStrategy {
    candidates: usize,
}

impl FirstStrategy {
    /// Strategy over `candidates` candidates.
    pub fn new(candidates: usize) -> Self {
        Self { candidates }
    }
}

impl Strategy for FirstStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::First
    }

    fn plan(&self) -> Vec<usize> {
        (0..self.candidates).collect()
    }

    fn record_outcome(&self, _index: usize, _success: bool, _elapsed: Duration) {}
}

/// A single uniformly random candidate.
#[derive(Debug)]
pub struct RandomStrategy {
    candidates: usize,
}

impl RandomStrategy {
    /// Strategy over `candidates` candidates.
    pub fn new(candidates: usize) -> Self {
        Self { candidates }
    }
}

impl Strategy for RandomStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }

    fn plan(&self) -> Vec<usize> {
        if self.candidates == 0 {
            return Vec::new();
        }
        vec![rand::thread_rng().gen_range(0..self.candidates)]
    }

    fn record_outcome(&self, _index: usize, _success: bool, _elapsed: Duration) {}
}

/// Round-robin cursor shared across dials.
#[derive(Debug)]
pub struct RotateStrategy {
    candidates: usize,
    cursor: AtomicUsize,
}

impl RotateStrategy {
    /// Strategy over `candidates` candidates.
    pub fn new(candidates: usize) -> Self {
        Self {
            candidates,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Strategy for RotateStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Rotate
    }

    fn plan(&self) -> Vec<usize> {
        if self.candidates == 0 {
            return Vec::new();
        }
        let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
        vec![turn % self.candidates]
    }

    fn record_outcome(&self, _index: usize, _success: bool, _elapsed: Duration) {}
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    successes: u64,
    failures: u64,
}

impl Tally {
    /// Laplace-smoothed success ratio; an untried candidate scores 0.5.
    fn score(&self) -> f64 {
        (self.successes as f64 + 1.0) / ((self.successes + self.failures) as f64 + 2.0)
    }
}

/// Success history per candidate.
#[derive(Debug)]
pub struct TrackStrategy {
    tallies: Mutex<Vec<Tally>>,
}

impl TrackStrategy {
    /// Strategy over `candidates` candidates.
    pub fn new(candidates: usize) -> Self {
        Self {
            tallies: Mutex::new(vec![Tally::default(); candidates]),
        }
    }

    /// `(successes, failures)` recorded for a candidate.
    pub fn tally(&self, index: usize) -> Option<(u64, u64)> {
        self.tallies
            .lock()
            .get(index)
            .map(|t| (t.successes, t.failures))
    }
}

impl Strategy for TrackStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Track
    }

    fn plan(&self) -> Vec<usize> {
        let scores: Vec<f64> = self.tallies.lock().iter().map(Tally::score).collect();
        let mut order: Vec<usize> = (0..scores.len()).collect();
        // Stable sort keeps declaration order among equal scores.
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        order
    }

    fn record_outcome(&self, index: usize, success: bool, _elapsed: Duration) {
        if let Some(tally) = self.tallies.lock().get_mut(index) {
            if success {
                tally.successes += 1;
            } else {
                tally.failures += 1;
            }
        }
    }
}

/// Lowest estimated dial latency first.
#[derive(Debug)]
pub struct MinimizeDialDuration {
    estimates: Mutex<Vec<Option<Duration>>>,
    failure_penalty: Duration,
}

impl MinimizeDialDuration {
    /// Strategy over `candidates` candidates, charging `failure_penalty`
    /// for each failed attempt.
    pub fn new(candidates: usize, failure_penalty: Duration) -> Self {
        Self {
            estimates: Mutex::new(vec![None; candidates]),
            failure_penalty,
        }
    }

    /// Current latency estimate for a candidate, if it has been measured.
    pub fn estimate(&self, index: usize) -> Option<Duration> {
        self.estimates.lock().get(index).copied().flatten()
    }
}

impl Strategy for MinimizeDialDuration {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MinimizeDialDuration
    }

    fn plan(&self) -> Vec<usize> {
        // Unmeasured candidates rank as zero so each gets tried once.
        let keys: Vec<Duration> = self
            .estimates
            .lock()
            .iter()
            .map(|e| e.unwrap_or(Duration::ZERO))
            .collect();
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by_key(|&i| keys[i]);
        order
    }

    fn record_outcome(&self, index: usize, success: bool, elapsed: Duration) {
        let sample = if success {
            elapsed
        } else {
            elapsed.max(self.failure_penalty)
        };
        if let Some(estimate) = self.estimates.lock().get_mut(index) {
            *estimate = Some(match *estimate {
                None => sample,
                Some(previous) => smooth(previous, sample),
            });
        }
    }
}

fn smooth(previous: Duration, sample: Duration) -> Duration {
    let nanos = previous.as_nanos() as f64 * (1.0 - LATENCY_EWMA_ALPHA)
        + sample.as_nanos() as f64 * LATENCY_EWMA_ALPHA;
    Duration::from_nanos(nanos as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_first_is_declaration_order() {
        assert_eq!(FirstStrategy::new(3).plan(), vec![0, 1, 2]);
    }

    #[test]
    fn test_random_is_single_attempt_in_range() {
        let strategy = RandomStrategy::new(4);
        for _ in 0..100 {
            let plan = strategy.plan();
            assert_eq!(plan.len(), 1);
            assert!(plan[0] < 4);
        }
        assert!(RandomStrategy::new(0).plan().is_empty());
    }

    #[test]
    fn test_rotate_cycles() {
        let strategy = RotateStrategy::new(3);
        let turns: Vec<usize> = (0..4).map(|_| strategy.plan()[0]).collect();
        assert_eq!(turns, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_track_prefers_successful_candidate() {
        let strategy = TrackStrategy::new(2);
        assert_eq!(strategy.plan(), vec![0, 1]);
        for _ in 0..10 {
            strategy.record_outcome(0, false, MS);
            strategy.record_outcome(1, true, MS);
        }
        assert_eq!(strategy.plan(), vec![1, 0]);
        assert_eq!(strategy.tally(1), Some((10, 0)));
    }

    #[test]
    fn test_track_ties_keep_declaration_order() {
        let strategy = TrackStrategy::new(3);
        strategy.record_outcome(0, true, MS);
        strategy.record_outcome(0, false, MS);
        // 0 now scores (1+1)/(2+2) = 0.5, same as the untried candidates.
        assert_eq!(strategy.plan(), vec![0, 1, 2]);
    }

    #[test]
    fn test_minimize_explores_then_prefers_fastest() {
        let strategy = MinimizeDialDuration::new(3, Duration::from_secs(60));
        strategy.record_outcome(0, true, 50 * MS);
        strategy.record_outcome(1, true, 10 * MS);
        // Candidate 2 is unmeasured and goes first.
        assert_eq!(strategy.plan(), vec![2, 1, 0]);

        strategy.record_outcome(2, false, 5 * MS);
        assert_eq!(strategy.plan(), vec![1, 0, 2]);
    }

    #[test]
    fn test_minimize_estimate_is_smoothed() {
        let strategy = MinimizeDialDuration::new(1, Duration::from_secs(60));
        strategy.record_outcome(0, true, 100 * MS);
        strategy.record_outcome(0, true, 20 * MS);
        assert_eq!(strategy.estimate(0), Some(60 * MS));
    }

    #[test]
    fn test_strategy_for_kind() {
        for kind in [
            StrategyKind::First,
            StrategyKind::Random,
            StrategyKind::Rotate,
            StrategyKind::Track,
            StrategyKind::MinimizeDialDuration,
        ] {
            assert_eq!(strategy_for(kind, 2, MS).kind(), kind);
        }
    }
}
