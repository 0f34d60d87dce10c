//! Operations over [Value]s. Concrete operands fold with the exact JVM `int` semantics; any
//! symbolic operand produces a new expression. A handful of algebraic identities are applied at
//! construction so that common expressions stay small.
use std::collections::BTreeMap;

use crate::expr::{CmpOp, Expr, IntOp, SymbolId, UnaryOp};
use crate::value::{Sort, Value};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    /// The divisor of a division or remainder is concretely zero. The caller decides what this
    /// means; for the JVM it is an `ArithmeticException`.
    #[error("division by zero")]
    DivisionByZero,

    /// An operand does not have the integer sort.
    #[error("expected an int operand but found {0:?}")]
    NotAnInteger(Sort),
}

pub type Result<T> = std::result::Result<T, ArithmeticError>;

/// Fold an integer operation over concrete operands. Returns `None` for a zero divisor.
pub fn fold(op: IntOp, lhs: i32, rhs: i32) -> Option<i32> {
    let value = match op {
        IntOp::Add => lhs.wrapping_add(rhs),
        IntOp::Sub => lhs.wrapping_sub(rhs),
        IntOp::Mul => lhs.wrapping_mul(rhs),
        IntOp::Div | IntOp::Rem if rhs == 0 => return None,
        IntOp::Div => lhs.wrapping_div(rhs),
        IntOp::Rem => lhs.wrapping_rem(rhs),
        IntOp::And => lhs & rhs,
        IntOp::Or => lhs | rhs,
        IntOp::Xor => lhs ^ rhs,
        IntOp::Shl => lhs.wrapping_shl(shift_amount(rhs)),
        IntOp::Shr => lhs.wrapping_shr(shift_amount(rhs)),
        IntOp::Ushr => ((lhs as u32) >> shift_amount(rhs)) as i32,
    };
    Some(value)
}

fn shift_amount(rhs: i32) -> u32 {
    (rhs & 0x1f) as u32
}

fn require_int(value: &Value) -> Result<()> {
    match value.sort() {
        Sort::Int => Ok(()),
        sort => Err(ArithmeticError::NotAnInteger(sort)),
    }
}

/// Apply a binary integer operation.
pub fn apply(op: IntOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    require_int(lhs)?;
    require_int(rhs)?;

    if let (Some(x), Some(y)) = (lhs.as_int(), rhs.as_int()) {
        return fold(op, x, y)
            .map(Value::Int)
            .ok_or(ArithmeticError::DivisionByZero);
    }

    if let Some(simplified) = simplify(op, lhs, rhs)? {
        return Ok(simplified);
    }

    Ok(Value::from(Expr::Binary {
        op,
        lhs: lhs.clone(),
        rhs: rhs.clone(),
    }))
}

fn simplify(op: IntOp, lhs: &Value, rhs: &Value) -> Result<Option<Value>> {
    // (x + a) + b == x + (a + b), also under wrapping.
    if let (IntOp::Add | IntOp::Sub, Some(b)) = (op, rhs.as_int()) {
        if let Some(Expr::Binary {
            op: IntOp::Add,
            lhs: inner,
            rhs: offset,
        }) = lhs.as_expr()
        {
            if let Some(a) = offset.as_int() {
                let b = if op == IntOp::Sub { b.wrapping_neg() } else { b };
                return apply(IntOp::Add, inner, &Value::Int(a.wrapping_add(b))).map(Some);
            }
        }
    }

    let simplified = match (op, lhs.as_int(), rhs.as_int()) {
        (IntOp::Div | IntOp::Rem, _, Some(0)) => return Err(ArithmeticError::DivisionByZero),
        (IntOp::Add | IntOp::Or | IntOp::Xor, Some(0), _) => Some(rhs.clone()),
        (IntOp::Add | IntOp::Sub | IntOp::Or | IntOp::Xor, _, Some(0)) => Some(lhs.clone()),
        (IntOp::Mul, Some(1), _) => Some(rhs.clone()),
        (IntOp::Mul | IntOp::Div, _, Some(1)) => Some(lhs.clone()),
        (IntOp::Rem, _, Some(1 | -1)) => Some(Value::Int(0)),
        (IntOp::Mul | IntOp::And, Some(0), _) | (IntOp::Mul | IntOp::And, _, Some(0)) => {
            Some(Value::Int(0))
        }
        (IntOp::Shl | IntOp::Shr | IntOp::Ushr, _, Some(amount)) if amount & 0x1f == 0 => {
            Some(lhs.clone())
        }
        (IntOp::Sub | IntOp::Xor, _, _) if lhs == rhs => Some(Value::Int(0)),
        _ => None,
    };
    Ok(simplified)
}

/// Apply a unary integer operation.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value> {
    require_int(operand)?;

    if let Some(x) = operand.as_int() {
        let value = match op {
            UnaryOp::Neg => x.wrapping_neg(),
            UnaryOp::Narrow(narrowing) => narrowing.apply(x),
        };
        return Ok(Value::Int(value));
    }

    // -(-x) == x, including for MIN.
    if let (UnaryOp::Neg, Some(Expr::Unary { op: UnaryOp::Neg, operand: inner })) =
        (op, operand.as_expr())
    {
        return Ok(inner.clone());
    }

    // Narrowing is idempotent.
    if let Some(Expr::Unary { op: inner_op, .. }) = operand.as_expr() {
        if *inner_op == op && matches!(op, UnaryOp::Narrow(_)) {
            return Ok(operand.clone());
        }
    }

    Ok(Value::from(Expr::Unary {
        op,
        operand: operand.clone(),
    }))
}

/// Compare two values. Concrete operands produce a concrete boolean; otherwise a comparison
/// expression is built. References support only equality comparisons, where `null` and heap
/// references compare by identity.
pub fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Value {
    match (lhs, rhs) {
        (Value::Int(x), Value::Int(y)) => return Value::Bool(op.holds(x, y)),
        (Value::Null | Value::Ref(_), Value::Null | Value::Ref(_)) => match op {
            CmpOp::Eq => return Value::Bool(lhs == rhs),
            CmpOp::Ne => return Value::Bool(lhs != rhs),
            _ => (),
        },
        _ => (),
    }

    if lhs == rhs {
        return Value::Bool(op.holds(0, 0));
    }

    Value::from(Expr::Compare {
        op,
        lhs: lhs.clone(),
        rhs: rhs.clone(),
    })
}

/// Logical negation. Negated comparisons are rewritten to the complementary comparison.
pub fn not(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(!b),
        Value::Symbolic(expr) => match expr.as_ref() {
            Expr::Compare { op, lhs, rhs } => Value::from(Expr::Compare {
                op: op.negate(),
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            }),
            Expr::Not(inner) => inner.clone(),
            _ => Value::from(Expr::Not(value.clone())),
        },
        _ => Value::from(Expr::Not(value.clone())),
    }
}

/// Logical conjunction.
pub fn and(lhs: &Value, rhs: &Value) -> Value {
    match (lhs, rhs) {
        (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
        (Value::Bool(true), other) | (other, Value::Bool(true)) => other.clone(),
        _ if lhs == rhs => lhs.clone(),
        _ => Value::from(Expr::And(lhs.clone(), rhs.clone())),
    }
}

/// Logical disjunction.
pub fn or(lhs: &Value, rhs: &Value) -> Value {
    match (lhs, rhs) {
        (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
        (Value::Bool(false), other) | (other, Value::Bool(false)) => other.clone(),
        _ if lhs == rhs => lhs.clone(),
        _ => Value::from(Expr::Or(lhs.clone(), rhs.clone())),
    }
}

/// `cond ? then : otherwise`.
pub fn ite(cond: &Value, then: &Value, otherwise: &Value) -> Value {
    match cond {
        Value::Bool(true) => then.clone(),
        Value::Bool(false) => otherwise.clone(),
        _ if then == otherwise => then.clone(),
        _ => Value::from(Expr::Ite {
            cond: cond.clone(),
            then: then.clone(),
            otherwise: otherwise.clone(),
        }),
    }
}

/// Replace input symbols by the values bound to them and rebuild the value with the simplifying
/// constructors, so that bindings may fold comparisons and conditionals away.
pub fn substitute(value: &Value, bindings: &BTreeMap<SymbolId, Value>) -> Result<Value> {
    let Value::Symbolic(expr) = value else {
        return Ok(value.clone());
    };

    let substituted = match expr.as_ref() {
        Expr::Var { id, .. } => bindings.get(id).cloned().unwrap_or_else(|| value.clone()),
        Expr::Unary { op, operand } => unary(*op, &substitute(operand, bindings)?)?,
        Expr::Binary { op, lhs, rhs } => {
            apply(*op, &substitute(lhs, bindings)?, &substitute(rhs, bindings)?)?
        }
        Expr::Compare { op, lhs, rhs } => {
            compare(*op, &substitute(lhs, bindings)?, &substitute(rhs, bindings)?)
        }
        Expr::Not(inner) => not(&substitute(inner, bindings)?),
        Expr::And(lhs, rhs) => and(&substitute(lhs, bindings)?, &substitute(rhs, bindings)?),
        Expr::Or(lhs, rhs) => or(&substitute(lhs, bindings)?, &substitute(rhs, bindings)?),
        Expr::Ite {
            cond,
            then,
            otherwise,
        } => ite(
            &substitute(cond, bindings)?,
            &substitute(then, bindings)?,
            &substitute(otherwise, bindings)?,
        ),
    };
    Ok(substituted)
}
