use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ExplorerConfig, Strategy};
use crate::emulator::{self, Emulator, Successor};
use crate::outcome::{DivergenceReason, TerminalState, Termination};
use crate::solver::{ConstraintSolver, SolverError, SolverResult};
use crate::state::PathState;

/// Counters describing one exploration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExplorationStats {
    /// Instructions executed across all paths.
    pub steps: u64,

    /// Paths created, including the initial one.
    pub paths: usize,

    /// Paths discarded because their condition is unsatisfiable.
    pub pruned: usize,

    pub solver_calls: u64,
    pub solver_unknown: u64,
    pub solver_timeouts: u64,
    pub cache_hits: u64,
    pub elapsed_ms: u64,

    /// The budget that stopped the exploration early, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exhausted: Option<DivergenceReason>,
}

/// Terminal states in discovery order.
#[derive(Debug)]
pub struct Exploration {
    pub terminals: Vec<TerminalState>,
    pub stats: ExplorationStats,
}

/// Drives an [Emulator] over a frontier of pending path states, pruning infeasible forks with a
/// [ConstraintSolver].
pub struct Explorer<E: Emulator, S: ConstraintSolver> {
    emulator: E,
    solver: S,
    config: ExplorerConfig,
}

impl<E: Emulator, S: ConstraintSolver> Explorer<E, S> {
    pub fn new(emulator: E, solver: S, config: ExplorerConfig) -> Self {
        Self {
            emulator,
            solver,
            config,
        }
    }

    pub fn into_solver(self) -> S {
        self.solver
    }

    /// Check a forked state. Returns false if the state is proven infeasible.
    fn feasible(&mut self, state: &PathState, stats: &mut ExplorationStats) -> bool {
        if state.condition.is_trivially_false() {
            return false;
        }

        stats.solver_calls += 1;
        match self.solver.check(&state.condition) {
            Ok(SolverResult::Unsatisfiable) => false,
            Ok(SolverResult::Satisfiable(_)) => true,
            Ok(SolverResult::Unknown) => {
                stats.solver_unknown += 1;
                true
            }
            Err(err) => {
                if let SolverError::Timeout(_) = err {
                    stats.solver_timeouts += 1;
                }
                stats.solver_unknown += 1;
                warn!(%err, condition = %state.condition, "solver failed, keeping path");
                true
            }
        }
    }

    /// Explore every path from `initial` until the frontier is empty or a budget is exhausted.
    /// When a budget is exhausted every pending state is reported as divergent.
    pub fn explore(&mut self, initial: PathState) -> emulator::Result<Exploration> {
        let start = Instant::now();
        let timeout = self.config.timeout();
        let mut stats = ExplorationStats {
            paths: 1,
            ..Default::default()
        };
        let mut frontier = VecDeque::from([initial]);
        let mut terminals = Vec::new();

        loop {
            let next = match self.config.strategy {
                Strategy::Dfs => frontier.pop_back(),
                Strategy::Bfs => frontier.pop_front(),
            };
            let Some(state) = next else {
                break;
            };

            let exhausted = if stats.steps >= self.config.max_steps {
                Some(DivergenceReason::StepBudget)
            } else if start.elapsed() >= timeout {
                Some(DivergenceReason::Timeout)
            } else if stats.paths > self.config.max_paths {
                Some(DivergenceReason::PathBudget)
            } else {
                None
            };

            if let Some(reason) = exhausted {
                info!(?reason, pending = frontier.len() + 1, "exploration budget exhausted");
                stats.exhausted = Some(reason);
                for state in std::iter::once(state).chain(frontier.drain(..)) {
                    terminals.push(diverge(state, reason));
                }
                break;
            }

            if state.depth > self.config.max_depth {
                debug!(depth = state.depth, "path reached depth limit");
                terminals.push(diverge(state, DivergenceReason::DepthLimit));
                continue;
            }

            let parent_len = state.condition.len();
            stats.steps += 1;
            let successors = self.emulator.step(state)?;
            let forks = successors.len();

            let mut continuing = Vec::with_capacity(forks);
            let mut feasible: usize = 0;
            for successor in successors {
                let successor_state = match &successor {
                    Successor::Continue(state) => state,
                    Successor::Terminal(terminal) => &terminal.state,
                };

                // Only a fork adds constraints; a state with its parent's condition is feasible.
                let grew = successor_state.condition.len() > parent_len;
                if grew && !self.feasible(successor_state, &mut stats) {
                    stats.pruned += 1;
                    continue;
                }
                feasible += 1;

                match successor {
                    Successor::Continue(state) => continuing.push(state),
                    Successor::Terminal(terminal) => {
                        debug!(termination = ?terminal.termination, "path terminated");
                        terminals.push(terminal);
                    }
                }
            }

            stats.paths += feasible.saturating_sub(1);

            match self.config.strategy {
                // The first successor is explored first.
                Strategy::Dfs => frontier.extend(continuing.into_iter().rev()),
                Strategy::Bfs => frontier.extend(continuing),
            }
        }

        stats.elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            steps = stats.steps,
            paths = stats.paths,
            pruned = stats.pruned,
            terminals = terminals.len(),
            "exploration finished"
        );

        Ok(Exploration { terminals, stats })
    }
}

fn diverge(state: PathState, reason: DivergenceReason) -> TerminalState {
    let location = state.location();
    TerminalState {
        state,
        termination: Termination::Divergence(reason),
        location,
    }
}
