use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::expr::{Expr, SymbolId};

/// Identifier of an object or array in a path's heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct HeapRef(pub u32);

impl fmt::Display for HeapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// The kind of data a value holds. `boolean`, `byte`, `char` and `short` values all have the
/// [Sort::Int] sort; [Sort::Bool] is reserved for the results of comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    Int,
    Bool,
    Ref,
}

/// A value that is either concrete or described by an expression over input symbols. Values are
/// immutable; operations always construct new values. Cloning is cheap since symbolic
/// expressions are shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Value {
    /// A concrete 32-bit integer.
    Int(i32),

    /// A concrete boolean. Only produced by comparisons and logical connectives.
    Bool(bool),

    /// The `null` reference.
    Null,

    /// A reference to a heap object known to be non-null.
    Ref(HeapRef),

    /// A value defined by an expression. The constructors in [crate::ops] should be preferred to
    /// direct construction, as they have the opportunity to simplify.
    Symbolic(Arc<Expr>),
}

pub const TRUE: Value = Value::Bool(true);
pub const FALSE: Value = Value::Bool(false);

impl Value {
    /// The input symbol with the given identifier.
    pub fn symbol(id: SymbolId, sort: Sort) -> Self {
        Value::Symbolic(Arc::new(Expr::Var { id, sort }))
    }

    pub fn sort(&self) -> Sort {
        match self {
            Value::Int(_) => Sort::Int,
            Value::Bool(_) => Sort::Bool,
            Value::Null | Value::Ref(_) => Sort::Ref,
            Value::Symbolic(expr) => expr.sort(),
        }
    }

    pub fn is_concrete(&self) -> bool {
        !matches!(self, Value::Symbolic(_))
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Value::Symbolic(expr) => Some(expr),
            _ => None,
        }
    }

    /// The identifier if this value is a bare input symbol.
    pub fn as_symbol(&self) -> Option<SymbolId> {
        match self.as_expr() {
            Some(Expr::Var { id, .. }) => Some(*id),
            _ => None,
        }
    }

    /// Every input symbol referenced by this value together with its sort.
    pub fn symbols(&self) -> BTreeMap<SymbolId, Sort> {
        let mut symbols = BTreeMap::new();
        self.collect_symbols(&mut symbols);
        symbols
    }

    pub fn collect_symbols(&self, symbols: &mut BTreeMap<SymbolId, Sort>) {
        if let Value::Symbolic(expr) = self {
            expr.collect_symbols(symbols);
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<HeapRef> for Value {
    fn from(value: HeapRef) -> Self {
        Value::Ref(value)
    }
}

impl From<Expr> for Value {
    fn from(value: Expr) -> Self {
        Value::Symbolic(Arc::new(value))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Null => write!(f, "null"),
            Value::Ref(heap_ref) => write!(f, "{heap_ref}"),
            Value::Symbolic(expr) => write!(f, "{expr}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
