//! This crate explores the paths of a bytecode method symbolically. Every input of the method is
//! a fresh symbol; branches whose outcome depends on a symbol fork the path, and each fork's path
//! condition is checked by a [solver::ConstraintSolver] so infeasible paths are pruned. Terminal
//! paths are classified into the outcomes reported by an [analyzer::Analyzer].
//!
//! ### Emulator
//!
//! The [emulator::Emulator] trait applies the semantics of a single instruction to a
//! [state::PathState], producing zero or more successors. [emulator::StandardEmulator] implements
//! the full supported instruction set, including exception handler dispatch and calls.
//!
//! ### Explorer
//!
//! The [explorer::Explorer] drives the emulator over a frontier of pending paths in depth-first
//! or breadth-first order until every path terminates or a budget from the
//! [config::ExplorerConfig] is exhausted. Paths that are still pending at that point are reported
//! as divergent rather than dropped.

/// Analyzer entry point and verdicts.
pub mod analyzer;

/// Exploration budgets and engine options.
pub mod config;

/// Instruction semantics.
pub mod emulator;

/// Frontier management and budget enforcement.
pub mod explorer;

/// Classification of terminal paths.
pub mod outcome;

/// Satisfiability checking of path conditions.
pub mod solver;

/// Path states: frames, heap and path condition.
pub mod state;

#[cfg(test)]
mod tests;
