use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{Sort, Value};

/// Identifier of an input symbol. Identifiers are unique within one exploration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SymbolId(pub u64);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym_{}", self.0)
    }
}

/// Narrowing conversions from `int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Narrowing {
    /// Truncate to 8 bits and sign extend.
    Byte,

    /// Truncate to 16 bits and zero extend.
    Char,

    /// Truncate to 16 bits and sign extend.
    Short,
}

impl Narrowing {
    pub fn apply(&self, value: i32) -> i32 {
        match self {
            Narrowing::Byte => i32::from(value as i8),
            Narrowing::Char => i32::from(value as u16),
            Narrowing::Short => i32::from(value as i16),
        }
    }

    /// Inclusive range of values representable after narrowing.
    pub fn range(&self) -> (i32, i32) {
        match self {
            Narrowing::Byte => (i32::from(i8::MIN), i32::from(i8::MAX)),
            Narrowing::Char => (0, i32::from(u16::MAX)),
            Narrowing::Short => (i32::from(i16::MIN), i32::from(i16::MAX)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum UnaryOp {
    Neg,
    Narrow(Narrowing),
}

/// Integer operations with two operands. Semantics follow the JVM `int` instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum IntOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

impl IntOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            IntOp::Add => "+",
            IntOp::Sub => "-",
            IntOp::Mul => "*",
            IntOp::Div => "/",
            IntOp::Rem => "%",
            IntOp::And => "&",
            IntOp::Or => "|",
            IntOp::Xor => "^",
            IntOp::Shl => "<<",
            IntOp::Shr => ">>",
            IntOp::Ushr => ">>>",
        }
    }
}

/// Signed comparisons. Only [CmpOp::Eq] and [CmpOp::Ne] are meaningful for references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// The comparison that holds exactly when this one does not.
    pub fn negate(&self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
        }
    }

    /// The comparison with the operands swapped: `a < b` iff `b > a`.
    pub fn flip(&self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Le,
        }
    }

    pub fn holds<T: Ord>(&self, lhs: T, rhs: T) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// The defining expression of a symbolic value. Only input symbols carry identifiers; derived
/// values are identified by their structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Expr {
    /// An input symbol.
    Var { id: SymbolId, sort: Sort },

    Unary {
        op: UnaryOp,
        operand: Value,
    },

    Binary {
        op: IntOp,
        lhs: Value,
        rhs: Value,
    },

    Compare {
        op: CmpOp,
        lhs: Value,
        rhs: Value,
    },

    Not(Value),

    And(Value, Value),

    Or(Value, Value),

    /// `cond ? then : otherwise`.
    Ite {
        cond: Value,
        then: Value,
        otherwise: Value,
    },
}

impl Expr {
    pub fn sort(&self) -> Sort {
        match self {
            Expr::Var { sort, .. } => *sort,
            Expr::Unary { .. } | Expr::Binary { .. } => Sort::Int,
            Expr::Compare { .. } | Expr::Not(_) | Expr::And(..) | Expr::Or(..) => Sort::Bool,
            Expr::Ite { then, .. } => then.sort(),
        }
    }

    pub fn collect_symbols(&self, symbols: &mut BTreeMap<SymbolId, Sort>) {
        match self {
            Expr::Var { id, sort } => {
                symbols.insert(*id, *sort);
            }
            Expr::Unary { operand, .. } | Expr::Not(operand) => operand.collect_symbols(symbols),
            Expr::Binary { lhs, rhs, .. }
            | Expr::Compare { lhs, rhs, .. }
            | Expr::And(lhs, rhs)
            | Expr::Or(lhs, rhs) => {
                lhs.collect_symbols(symbols);
                rhs.collect_symbols(symbols);
            }
            Expr::Ite {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_symbols(symbols);
                then.collect_symbols(symbols);
                otherwise.collect_symbols(symbols);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var { id, .. } => write!(f, "{id}"),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => write!(f, "-{operand}"),
            Expr::Unary {
                op: UnaryOp::Narrow(narrowing),
                operand,
            } => {
                let name = match narrowing {
                    Narrowing::Byte => "byte",
                    Narrowing::Char => "char",
                    Narrowing::Short => "short",
                };
                write!(f, "({name}){operand}")
            }
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Compare { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Not(operand) => write!(f, "!{operand}"),
            Expr::And(lhs, rhs) => write!(f, "({lhs} && {rhs})"),
            Expr::Or(lhs, rhs) => write!(f, "({lhs} || {rhs})"),
            Expr::Ite {
                cond,
                then,
                otherwise,
            } => write!(f, "({cond} ? {then} : {otherwise})"),
        }
    }
}
