use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::ser::SerializeMap;
use serde::Serialize;

use crate::expr::{Expr, SymbolId, UnaryOp};
use crate::ops::fold;
use crate::value::Value;

/// Concrete values assigned to input symbols. References are encoded as integers where `0` is
/// `null`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Witness {
    assignments: BTreeMap<SymbolId, i32>,
}

impl Witness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: SymbolId, value: i32) -> Option<i32> {
        self.assignments.insert(id, value)
    }

    pub fn get(&self, id: SymbolId) -> Option<i32> {
        self.assignments.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, i32)> + '_ {
        self.assignments.iter().map(|(id, value)| (*id, *value))
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl FromIterator<(SymbolId, i32)> for Witness {
    fn from_iter<T: IntoIterator<Item = (SymbolId, i32)>>(iter: T) -> Self {
        Self {
            assignments: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (id, value)) in self.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{id} = {value}")?;
        }
        Ok(())
    }
}

impl Serialize for Witness {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (id, value) in self.iter() {
            map.serialize_entry(&id.to_string(), &value)?;
        }
        map.end()
    }
}

/// Result of evaluating a value to a concrete integer or boolean.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Concrete {
    Int(i32),
    Bool(bool),
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Evaluation {
    /// The evaluation response. This is not populated if a symbol without an assignment was
    /// needed, or if the expression divides by zero under the assignment.
    pub response: Option<Concrete>,

    /// Symbols that were used in the evaluation but did not have an assignment.
    pub unassigned_variables: BTreeSet<SymbolId>,
}

/// Evaluates values under a fixed [Witness].
#[derive(Clone, Debug, Default)]
pub struct Evaluator {
    witness: Witness,
}

impl Evaluator {
    pub fn new(witness: impl Into<Witness>) -> Self {
        Self {
            witness: witness.into(),
        }
    }

    pub fn witness(&self) -> &Witness {
        &self.witness
    }

    pub fn evaluate(&self, value: &Value) -> Evaluation {
        let mut unassigned_variables = BTreeSet::new();
        let response = self.eval(value, &mut unassigned_variables);
        Evaluation {
            response,
            unassigned_variables,
        }
    }

    /// Evaluate a boolean value. `None` if it could not be evaluated.
    pub fn evaluate_bool(&self, value: &Value) -> Option<bool> {
        match self.evaluate(value).response? {
            Concrete::Bool(b) => Some(b),
            Concrete::Int(_) => None,
        }
    }

    /// Evaluate an integer or reference value. `None` if it could not be evaluated.
    pub fn evaluate_int(&self, value: &Value) -> Option<i32> {
        match self.evaluate(value).response? {
            Concrete::Int(x) => Some(x),
            Concrete::Bool(_) => None,
        }
    }

    fn eval(&self, value: &Value, unassigned: &mut BTreeSet<SymbolId>) -> Option<Concrete> {
        match value {
            Value::Int(x) => Some(Concrete::Int(*x)),
            Value::Bool(b) => Some(Concrete::Bool(*b)),
            Value::Null => Some(Concrete::Int(0)),
            Value::Ref(heap_ref) => Some(Concrete::Int((heap_ref.0 as i32).wrapping_add(1))),
            Value::Symbolic(expr) => self.eval_expr(expr, unassigned),
        }
    }

    fn eval_int(&self, value: &Value, unassigned: &mut BTreeSet<SymbolId>) -> Option<i32> {
        match self.eval(value, unassigned)? {
            Concrete::Int(x) => Some(x),
            Concrete::Bool(_) => None,
        }
    }

    fn eval_bool(&self, value: &Value, unassigned: &mut BTreeSet<SymbolId>) -> Option<bool> {
        match self.eval(value, unassigned)? {
            Concrete::Bool(b) => Some(b),
            Concrete::Int(_) => None,
        }
    }

    fn eval_expr(&self, expr: &Expr, unassigned: &mut BTreeSet<SymbolId>) -> Option<Concrete> {
        match expr {
            Expr::Var { id, .. } => {
                let response = self.witness.get(*id);
                if response.is_none() {
                    unassigned.insert(*id);
                }
                response.map(Concrete::Int)
            }
            Expr::Unary { op, operand } => {
                let x = self.eval_int(operand, unassigned)?;
                let value = match op {
                    UnaryOp::Neg => x.wrapping_neg(),
                    UnaryOp::Narrow(narrowing) => narrowing.apply(x),
                };
                Some(Concrete::Int(value))
            }
            Expr::Binary { op, lhs, rhs } => {
                // Both sides are evaluated so that every unassigned symbol is reported.
                let x = self.eval_int(lhs, unassigned);
                let y = self.eval_int(rhs, unassigned);
                fold(*op, x?, y?).map(Concrete::Int)
            }
            Expr::Compare { op, lhs, rhs } => {
                let x = self.eval_int(lhs, unassigned);
                let y = self.eval_int(rhs, unassigned);
                Some(Concrete::Bool(op.holds(x?, y?)))
            }
            Expr::Not(operand) => self.eval_bool(operand, unassigned).map(|b| Concrete::Bool(!b)),
            Expr::And(lhs, rhs) => {
                let x = self.eval_bool(lhs, unassigned);
                let y = self.eval_bool(rhs, unassigned);
                match (x, y) {
                    (Some(false), _) | (_, Some(false)) => Some(Concrete::Bool(false)),
                    (Some(true), Some(true)) => Some(Concrete::Bool(true)),
                    _ => None,
                }
            }
            Expr::Or(lhs, rhs) => {
                let x = self.eval_bool(lhs, unassigned);
                let y = self.eval_bool(rhs, unassigned);
                match (x, y) {
                    (Some(true), _) | (_, Some(true)) => Some(Concrete::Bool(true)),
                    (Some(false), Some(false)) => Some(Concrete::Bool(false)),
                    _ => None,
                }
            }
            Expr::Ite {
                cond,
                then,
                otherwise,
            } => match self.eval_bool(cond, unassigned) {
                Some(true) => self.eval(then, unassigned),
                Some(false) => self.eval(otherwise, unassigned),
                None => {
                    self.eval(then, unassigned);
                    self.eval(otherwise, unassigned);
                    None
                }
            },
        }
    }
}
