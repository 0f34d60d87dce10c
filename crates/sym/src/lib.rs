//! Symbolic representation of the values manipulated by a JVM-style stack machine. A [Value] is
//! either concrete or an expression over input symbols; the functions in [ops] build new values
//! with exact 32-bit `int` semantics, folding whenever every operand is concrete.
//!
//! Input symbols are created by a [SymbolAllocator] owned by whoever drives an exploration, so
//! runs never share identifiers through global state. An [Evaluator] evaluates values under a
//! concrete [Witness].
mod eval;
mod expr;
pub mod ops;
mod symbols;
mod value;

pub use crate::eval::*;
pub use crate::expr::*;
pub use crate::ops::ArithmeticError;
pub use crate::symbols::SymbolAllocator;
pub use crate::value::*;

#[cfg(test)]
mod tests;
