//! Iteration Controller (C3, §4.3).
//!
//! Enforces per-session resource budgets and decides CONTINUE / STOP between
//! iterations, carrying a confidence-improvement trend. New relative to the
//! teacher (whose `run_quorum` is a fixed, non-iterating 3-phase flow);
//! built in the application layer alongside the use case it serves, in the
//! style of `crate::config::ExecutionParams`.

use quorum_domain::council::IterationConfig;

/// Why `ShouldContinue` returned `stop` (§4.3). Also doubles as the pipeline's
/// human-readable stop reason in trace/synthesis output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxIterations,
    TokenBudget,
    TimeBudget,
    Converged,
    Plateau,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::MaxIterations => "max iterations",
            StopReason::TokenBudget => "token budget",
            StopReason::TimeBudget => "time budget",
            StopReason::Converged => "converged",
            StopReason::Plateau => "plateau",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Context handed to the pipeline to prime the next iteration's prompts
/// (§4.3 `GetContext`).
#[derive(Debug, Clone)]
pub struct IterationContext {
    pub iteration_index: usize,
    pub confidence_history: Vec<f64>,
    pub last_improvement: Option<f64>,
}

impl IterationContext {
    /// A short human-readable confidence trend, e.g. `"0.71 -> 0.92"`,
    /// used in the synthesis prompt's iteration summary (§4.6.7).
    pub fn trend_summary(&self) -> String {
        match self.confidence_history.as_slice() {
            [] => "no iterations yet".to_string(),
            [only] => format!("{only:.2}"),
            history => {
                let parts: Vec<String> = history.iter().map(|c| format!("{c:.2}")).collect();
                parts.join(" -> ")
            }
        }
    }
}

/// Mutable per-session state tracked across iterations (§4.3).
#[derive(Debug, Clone)]
pub struct IterationController {
    config: IterationConfig,
    iteration_index: usize,
    tokens_so_far: u64,
    elapsed_ms: u64,
    confidence_history: Vec<f64>,
    improvements: Vec<f64>,
    started: bool,
}

impl IterationController {
    pub fn new(config: IterationConfig) -> Self {
        Self {
            config,
            iteration_index: 0,
            tokens_so_far: 0,
            elapsed_ms: 0,
            confidence_history: Vec::new(),
            improvements: Vec::new(),
            started: false,
        }
    }

    /// Record one completed iteration: `confidence` is the iteration's
    /// voting confidence average (0 if no voting result), `tokens_used` is
    /// the tokens it spent (excluding any memory-compression call, §9).
    pub fn record_iteration(&mut self, confidence: f64, tokens_used: u64, elapsed_ms: u64) {
        self.started = true;
        self.iteration_index += 1;
        self.tokens_so_far += tokens_used;
        self.elapsed_ms += elapsed_ms;

        let improvement = match self.confidence_history.last() {
            Some(prev) => confidence - prev,
            None => confidence,
        };
        self.confidence_history.push(confidence);
        self.improvements.push(improvement);
    }

    /// Evaluates the six checks in order; first hit wins (§4.3).
    pub fn should_continue(&self) -> (bool, Option<StopReason>) {
        if self.iteration_index >= self.config.max_iterations {
            return (false, Some(StopReason::MaxIterations));
        }
        if self.tokens_so_far >= self.config.max_total_tokens {
            return (false, Some(StopReason::TokenBudget));
        }
        if self.elapsed_ms >= self.config.max_duration_ms {
            return (false, Some(StopReason::TimeBudget));
        }
        if let Some(&last_confidence) = self.confidence_history.last()
            && last_confidence >= self.config.convergence_threshold
        {
            return (false, Some(StopReason::Converged));
        }
        if let Some(&last_improvement) = self.improvements.last()
            && self.improvements.len() >= 1
            && last_improvement < self.config.improvement_threshold
        {
            return (false, Some(StopReason::Plateau));
        }
        (true, None)
    }

    pub fn get_context(&self) -> IterationContext {
        IterationContext {
            iteration_index: self.iteration_index,
            confidence_history: self.confidence_history.clone(),
            last_improvement: self.improvements.last().copied(),
        }
    }

    pub fn iteration_index(&self) -> usize {
        self.iteration_index
    }

    pub fn tokens_so_far(&self) -> u64 {
        self.tokens_so_far
    }

    pub fn confidence_history(&self) -> &[f64] {
        &self.confidence_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_domain::council::IterationStrategy;

    fn config() -> IterationConfig {
        IterationConfig {
            enabled: true,
            max_iterations: 3,
            max_total_tokens: 10_000,
            max_duration_ms: 60_000,
            max_depth: 3,
            convergence_threshold: 0.85,
            improvement_threshold: 0.02,
            strategy: IterationStrategy::Refine,
        }
    }

    // S5 — iteration convergence
    #[test]
    fn stops_on_convergence() {
        let mut ctrl = IterationController::new(config());
        ctrl.record_iteration(0.71, 1000, 500);
        let (cont, reason) = ctrl.should_continue();
        assert!(cont);
        assert!(reason.is_none());

        ctrl.record_iteration(0.92, 1000, 500);
        let (cont, reason) = ctrl.should_continue();
        assert!(!cont);
        assert_eq!(reason, Some(StopReason::Converged));
        assert_eq!(ctrl.confidence_history(), &[0.71, 0.92]);
    }

    #[test]
    fn stops_at_max_iterations() {
        let mut ctrl = IterationController::new(config());
        for _ in 0..3 {
            ctrl.record_iteration(0.1, 100, 10);
        }
        let (cont, reason) = ctrl.should_continue();
        assert!(!cont);
        assert_eq!(reason, Some(StopReason::MaxIterations));
    }

    #[test]
    fn stops_on_token_budget() {
        let mut ctrl = IterationController::new(config());
        ctrl.record_iteration(0.1, 10_000, 10);
        let (cont, reason) = ctrl.should_continue();
        assert!(!cont);
        assert_eq!(reason, Some(StopReason::TokenBudget));
    }

    #[test]
    fn stops_on_time_budget() {
        let mut ctrl = IterationController::new(config());
        ctrl.record_iteration(0.1, 10, 60_000);
        let (cont, reason) = ctrl.should_continue();
        assert!(!cont);
        assert_eq!(reason, Some(StopReason::TimeBudget));
    }

    #[test]
    fn stops_on_plateau() {
        let mut ctrl = IterationController::new(config());
        ctrl.record_iteration(0.5, 10, 10);
        // second iteration barely improves: 0.505 - 0.5 = 0.005 < 0.02 threshold
        ctrl.record_iteration(0.505, 10, 10);
        let (cont, reason) = ctrl.should_continue();
        assert!(!cont);
        assert_eq!(reason, Some(StopReason::Plateau));
    }

    #[test]
    fn first_iteration_improvement_is_absolute_confidence() {
        let mut ctrl = IterationController::new(config());
        ctrl.record_iteration(0.3, 10, 10);
        assert_eq!(ctrl.improvements.last(), Some(&0.3));
    }

    #[test]
    fn trend_summary_formats_history() {
        let mut ctrl = IterationController::new(config());
        ctrl.record_iteration(0.71, 10, 10);
        ctrl.record_iteration(0.92, 10, 10);
        assert_eq!(ctrl.get_context().trend_summary(), "0.71 -> 0.92");
    }

    #[test]
    fn precedence_max_iterations_beats_convergence() {
        // Converges AND hits max_iterations simultaneously -> max_iterations wins (checked first).
        let mut cfg = config();
        cfg.max_iterations = 1;
        let mut ctrl = IterationController::new(cfg);
        ctrl.record_iteration(0.99, 10, 10);
        let (_, reason) = ctrl.should_continue();
        assert_eq!(reason, Some(StopReason::MaxIterations));
    }
}
