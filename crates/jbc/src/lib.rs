//! This crate models the bytecode of a small JVM-style stack machine. Methods are loaded from a
//! JSON description, validated structurally, and then exposed read-only to analyses.
//!
//! ### Validation
//!
//! [Method::load] and [builder::MethodBuilder::build] reject methods whose branch targets or
//! exception handlers do not land on instruction boundaries, that reference local slots beyond
//! `max_locals`, or whose operand stack depth is not uniquely determined at every instruction.
//! No execution semantics live here.

/// Programmatic construction of methods.
pub mod builder;

/// Built-in `java.lang` class hierarchy.
pub mod classes;

/// Methods, identifiers, exception handler tables and the JSON loader.
pub mod method;

/// The closed set of supported operations.
pub mod opcodes;

/// Collections of methods for whole-program analysis.
pub mod program;

/// Operand stack depth verification.
pub mod verify;

pub use crate::method::{
    ClassFile, Error, ExceptionHandler, Instruction, Location, MalformedKind, Method, MethodId,
    Result,
};
pub use crate::opcodes::*;
pub use crate::program::Program;

#[cfg(test)]
mod tests;
