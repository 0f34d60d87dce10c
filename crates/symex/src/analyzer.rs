//! Entry point used by harnesses: explore a method and aggregate the classified outcomes into a
//! [Verdict].
use std::collections::BTreeSet;
use std::sync::Arc;

use jbc::{ClassFile, Location, Method, MethodId, Program};
use serde::Serialize;
use sym::SymbolAllocator;
use tracing::{debug, info, warn};

use crate::config::{ExplorerConfig, SolverKind};
use crate::emulator::{self, Input, StandardEmulator};
use crate::explorer::{ExplorationStats, Explorer};
use crate::outcome::{classify, OutcomeKind, PathOutcome};
use crate::solver::{BuiltinSolver, CachingSolver, ConstraintSolver, SolverResult, TrivialSolver};

#[derive(thiserror::Error, Debug)]
pub enum AnalyzerError {
    /// The method or class could not be loaded.
    #[error(transparent)]
    Load(#[from] jbc::Error),

    /// Exploration failed on an inconsistent state.
    #[error(transparent)]
    Engine(#[from] emulator::Error),

    #[error("method {0} not found")]
    MethodNotFound(String),

    #[error("solver {0} is not available in this build")]
    SolverUnavailable(String),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// The explored paths of one method.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub method: MethodId,
    pub inputs: Vec<Input>,

    /// Path outcomes in discovery order.
    pub outcomes: Vec<PathOutcome>,

    pub stats: ExplorationStats,
}

/// Aggregated result for one method.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub method: String,
    pub outcomes: Vec<PathOutcome>,
    pub inputs: Vec<Input>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ExplorationStats>,

    /// Set if the method could not be analyzed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Report> for Verdict {
    fn from(report: Report) -> Self {
        Self {
            method: report.method.to_string(),
            outcomes: report.outcomes,
            inputs: report.inputs,
            stats: Some(report.stats),
            error: None,
        }
    }
}

impl Verdict {
    pub fn from_error(method: impl Into<String>, error: &dyn std::error::Error) -> Self {
        Self {
            method: method.into(),
            outcomes: Vec::new(),
            inputs: Vec::new(),
            stats: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The distinct `(kind, location)` pairs observed.
    pub fn pairs(&self) -> BTreeSet<(OutcomeKind, Option<Location>)> {
        if self.is_error() {
            return BTreeSet::from([(OutcomeKind::AnalyzerError, None)]);
        }

        self.outcomes
            .iter()
            .map(|outcome| (outcome.kind(), outcome.location.clone()))
            .collect()
    }

    /// The distinct kinds observed.
    pub fn kinds(&self) -> BTreeSet<OutcomeKind> {
        self.pairs().into_iter().map(|(kind, _)| kind).collect()
    }

    /// Returns true if every path was explored to completion, so unobserved kinds are
    /// unreachable as far as the approximations recorded in the outcome notes allow.
    pub fn is_exhaustive(&self) -> bool {
        !self.is_error()
            && self.stats.as_ref().is_some_and(|stats| stats.exhausted.is_none())
            && self.outcomes.iter().all(|outcome| {
                outcome.kind() != OutcomeKind::Divergent && outcome.notes.is_empty()
            })
    }

    /// Confidence in percent that each benchmark outcome kind is reachable.
    pub fn predictions(&self) -> Vec<(OutcomeKind, u8)> {
        let kinds = self.kinds();
        let exhaustive = self.is_exhaustive();
        OutcomeKind::JPAMB
            .into_iter()
            .map(|kind| {
                let confidence = if self.is_error() {
                    50
                } else if kind == OutcomeKind::Divergent && kinds.contains(&kind) {
                    if kinds.len() == 1 {
                        100
                    } else {
                        50
                    }
                } else if kinds.contains(&kind) {
                    100
                } else if exhaustive {
                    0
                } else {
                    10
                };
                (kind, confidence)
            })
            .collect()
    }

    /// Prediction lines in the form `ok;100%`.
    pub fn jpamb_lines(&self) -> Vec<String> {
        self.predictions()
            .into_iter()
            .map(|(kind, confidence)| format!("{};{confidence}%", kind.label()))
            .collect()
    }
}

/// Analyzes methods of a program under one configuration. Every exploration gets its own symbol
/// allocator and solver cache, so one analyzer may be shared by several threads.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: ExplorerConfig,
    program: Program,
}

impl Analyzer {
    pub fn new(config: ExplorerConfig, program: Program) -> Self {
        Self { config, program }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    fn solver(&self) -> Result<Box<dyn ConstraintSolver>> {
        if !self.config.use_solver {
            return Ok(Box::new(TrivialSolver));
        }

        match self.config.solver {
            SolverKind::Builtin => Ok(Box::new(BuiltinSolver::new(self.config.solver_timeout()))),
            SolverKind::Trivial => Ok(Box::new(TrivialSolver)),
            #[cfg(feature = "z3")]
            SolverKind::Z3 => Ok(Box::new(crate::solver::Z3Solver::new(
                self.config.solver_timeout(),
            ))),
            #[cfg(not(feature = "z3"))]
            SolverKind::Z3 => Err(AnalyzerError::SolverUnavailable("z3".to_string())),
        }
    }

    /// Explore `method` and report every outcome whose path condition is not proven
    /// unsatisfiable.
    pub fn explore(&self, method: &Arc<Method>) -> Result<Report> {
        let symbols = SymbolAllocator::new();
        let emulator = StandardEmulator::new(&self.program, &symbols, &self.config);
        let (initial, inputs) = emulator.initial_state(Arc::clone(method))?;

        let solver = CachingSolver::new(self.solver()?);
        let mut explorer = Explorer::new(emulator, solver, self.config.clone());
        let exploration = explorer.explore(initial)?;
        let mut solver = explorer.into_solver();
        let mut stats = exploration.stats;

        // Conditions are checked again before reporting, since pruning only happens at forks.
        let mut outcomes = Vec::with_capacity(exploration.terminals.len());
        for terminal in exploration.terminals {
            let mut outcome = classify(terminal);
            stats.solver_calls += 1;
            match solver.check(&outcome.condition) {
                Ok(SolverResult::Unsatisfiable) => {
                    debug!(outcome = %outcome.outcome, "dropping infeasible outcome");
                    stats.pruned += 1;
                    continue;
                }
                Ok(SolverResult::Satisfiable(witness)) => outcome.witness = Some(witness),
                Ok(SolverResult::Unknown) => stats.solver_unknown += 1,
                Err(err) => {
                    stats.solver_unknown += 1;
                    warn!(%err, "solver failed while checking an outcome");
                }
            }
            outcomes.push(outcome);
        }
        stats.cache_hits = solver.hits();

        info!(method = %method.id(), outcomes = outcomes.len(), "analysis finished");
        Ok(Report {
            method: method.id().clone(),
            inputs,
            outcomes,
            stats,
        })
    }

    /// Analyze the method with the given identifier. Failures are reported in the verdict.
    pub fn analyze(&self, id: &MethodId) -> Verdict {
        match self.program.get(id) {
            Some(method) => self.analyze_method(method),
            None => Verdict::from_error(id.to_string(), &AnalyzerError::MethodNotFound(id.to_string())),
        }
    }

    pub fn analyze_method(&self, method: &Arc<Method>) -> Verdict {
        match self.explore(method) {
            Ok(report) => report.into(),
            Err(err) => {
                warn!(method = %method.id(), %err, "analysis failed");
                Verdict::from_error(method.id().to_string(), &err)
            }
        }
    }

    /// Load a method from its JSON description and analyze it. The method is also made available
    /// for inlining.
    pub fn analyze_json(&mut self, bytes: &[u8]) -> Result<Verdict> {
        let method = Method::load(bytes)?;
        let method = self.program.insert(method);
        Ok(self.analyze_method(&method))
    }

    /// Analyze every method of the program in identifier order.
    pub fn analyze_program(&self) -> Vec<Verdict> {
        self.program
            .methods()
            .map(|method| self.analyze_method(method))
            .collect()
    }

    /// Analyze every method of a class. Methods that failed to load get an error verdict.
    pub fn analyze_class(config: ExplorerConfig, class: ClassFile) -> Vec<Verdict> {
        let failures: Vec<Verdict> = class
            .failures
            .iter()
            .map(|(id, err)| Verdict::from_error(id.clone(), err))
            .collect();
        let analyzer = Analyzer::new(config, Program::from(class));
        let mut verdicts = analyzer.analyze_program();
        verdicts.extend(failures);
        verdicts
    }
}
