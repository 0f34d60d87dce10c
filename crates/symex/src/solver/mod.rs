//! Satisfiability checks of path conditions.
//!
//! A [ConstraintSolver] answers [SolverResult::Unknown] whenever it cannot decide a condition.
//! Callers must treat that answer as possibly satisfiable.
use std::collections::BTreeMap;
use std::time::Duration;

use sym::{Value, Witness};
use tracing::trace;

use crate::state::PathCondition;

mod builtin;
pub use builtin::BuiltinSolver;

#[cfg(feature = "z3")]
mod z3;
#[cfg(feature = "z3")]
pub use self::z3::Z3Solver;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("solver timed out after {0:?}")]
    Timeout(Duration),

    #[error("solver backend failure: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverResult {
    /// The condition holds under the witness.
    Satisfiable(Witness),

    Unsatisfiable,

    /// The solver could not decide the condition.
    Unknown,
}

impl SolverResult {
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, SolverResult::Unsatisfiable)
    }

    pub fn witness(&self) -> Option<&Witness> {
        match self {
            SolverResult::Satisfiable(witness) => Some(witness),
            _ => None,
        }
    }
}

pub trait ConstraintSolver {
    /// Decide whether the conjunction of the path condition is satisfiable. Implementations must
    /// bound the time they spend and report a timeout as [SolverError::Timeout].
    fn check(&mut self, condition: &PathCondition) -> Result<SolverResult>;
}

impl<S: ConstraintSolver + ?Sized> ConstraintSolver for Box<S> {
    fn check(&mut self, condition: &PathCondition) -> Result<SolverResult> {
        (**self).check(condition)
    }
}

impl<S: ConstraintSolver + ?Sized> ConstraintSolver for &mut S {
    fn check(&mut self, condition: &PathCondition) -> Result<SolverResult> {
        (**self).check(condition)
    }
}

/// Decides only conditions whose constraints are all concrete.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialSolver;

impl ConstraintSolver for TrivialSolver {
    fn check(&mut self, condition: &PathCondition) -> Result<SolverResult> {
        if condition.is_trivially_false() {
            return Ok(SolverResult::Unsatisfiable);
        }

        if condition.constraints().iter().all(Value::is_concrete) {
            return Ok(SolverResult::Satisfiable(Witness::new()));
        }

        Ok(SolverResult::Unknown)
    }
}

/// Memoizes the results of another solver by the structure of the path condition. Errors are
/// not cached.
#[derive(Debug)]
pub struct CachingSolver<S> {
    inner: S,
    cache: BTreeMap<Vec<Value>, SolverResult>,
    hits: u64,
}

impl<S: ConstraintSolver> CachingSolver<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: BTreeMap::new(),
            hits: 0,
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl<S: ConstraintSolver> ConstraintSolver for CachingSolver<S> {
    fn check(&mut self, condition: &PathCondition) -> Result<SolverResult> {
        let key = condition.constraints();
        if let Some(result) = self.cache.get(&key) {
            self.hits += 1;
            trace!(constraints = key.len(), "solver cache hit");
            return Ok(result.clone());
        }

        let result = self.inner.check(condition)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }
}
