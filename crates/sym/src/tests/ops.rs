use proptest::prelude::*;

use crate::ops::*;
use crate::*;

const INT_OPS: [IntOp; 11] = [
    IntOp::Add,
    IntOp::Sub,
    IntOp::Mul,
    IntOp::Div,
    IntOp::Rem,
    IntOp::And,
    IntOp::Or,
    IntOp::Xor,
    IntOp::Shl,
    IntOp::Shr,
    IntOp::Ushr,
];

/// Reference semantics computed in 64-bit arithmetic and truncated.
fn reference(op: IntOp, x: i32, y: i32) -> Option<i32> {
    let (a, b) = (i64::from(x), i64::from(y));
    let shift = u32::try_from(y & 0x1f).ok()?;
    let value = match op {
        IntOp::Add => (a + b) as i32,
        IntOp::Sub => (a - b) as i32,
        IntOp::Mul => (a * b) as i32,
        IntOp::Div if y == 0 => return None,
        IntOp::Div => (a / b) as i32,
        IntOp::Rem if y == 0 => return None,
        IntOp::Rem => (a % b) as i32,
        IntOp::And => x & y,
        IntOp::Or => x | y,
        IntOp::Xor => x ^ y,
        IntOp::Shl => (a << shift) as i32,
        IntOp::Shr => (a >> shift) as i32,
        IntOp::Ushr => (i64::from(x as u32) >> shift) as i32,
    };
    Some(value)
}

proptest! {
    #[test]
    fn concrete_operands_fold_exactly(x in any::<i32>(), y in any::<i32>(), index in 0usize..11) {
        let op = INT_OPS[index];
        let result = apply(op, &Value::Int(x), &Value::Int(y));
        match reference(op, x, y) {
            Some(expected) => prop_assert_eq!(result, Ok(Value::Int(expected))),
            None => prop_assert_eq!(result, Err(ArithmeticError::DivisionByZero)),
        }
    }

    #[test]
    fn concrete_comparisons_fold(x in any::<i32>(), y in any::<i32>()) {
        prop_assert_eq!(compare(CmpOp::Lt, &Value::Int(x), &Value::Int(y)), Value::Bool(x < y));
        prop_assert_eq!(compare(CmpOp::Ge, &Value::Int(x), &Value::Int(y)), Value::Bool(x >= y));
        prop_assert_eq!(compare(CmpOp::Eq, &Value::Int(x), &Value::Int(y)), Value::Bool(x == y));
    }

    #[test]
    fn constant_offsets_fold_with_wrapping(x in any::<i32>(), a in any::<i32>(), b in any::<i32>()) {
        let symbols = SymbolAllocator::new();
        let var = symbols.fresh(Sort::Int);
        let folded = apply(IntOp::Add, &var, &Value::Int(a))
            .and_then(|sum| apply(IntOp::Sub, &sum, &Value::Int(b)));
        let mut witness = Witness::new();
        if let Some(id) = var.as_symbol() {
            witness.insert(id, x);
        }
        let evaluated = folded.ok().and_then(|value| Evaluator::new(witness).evaluate_int(&value));
        prop_assert_eq!(evaluated, Some(x.wrapping_add(a).wrapping_sub(b)));
    }

    #[test]
    fn narrowing_matches_casts(x in any::<i32>()) {
        let byte = unary(UnaryOp::Narrow(Narrowing::Byte), &Value::Int(x));
        let character = unary(UnaryOp::Narrow(Narrowing::Char), &Value::Int(x));
        let short = unary(UnaryOp::Narrow(Narrowing::Short), &Value::Int(x));
        prop_assert_eq!(byte, Ok(Value::Int(i32::from(x as i8))));
        prop_assert_eq!(character, Ok(Value::Int(i32::from(x as u16))));
        prop_assert_eq!(short, Ok(Value::Int(i32::from(x as i16))));
    }
}

#[test]
fn overflow_edge_cases() {
    let min = Value::Int(i32::MIN);
    let minus_one = Value::Int(-1);
    assert_eq!(apply(IntOp::Div, &min, &minus_one), Ok(Value::Int(i32::MIN)));
    assert_eq!(apply(IntOp::Rem, &min, &minus_one), Ok(Value::Int(0)));
    assert_eq!(unary(UnaryOp::Neg, &min), Ok(Value::Int(i32::MIN)));
    assert_eq!(
        apply(IntOp::Add, &Value::Int(i32::MAX), &Value::Int(1)),
        Ok(Value::Int(i32::MIN))
    );
    assert_eq!(
        apply(IntOp::Shl, &Value::Int(1), &Value::Int(33)),
        Ok(Value::Int(2))
    );
    assert_eq!(
        apply(IntOp::Ushr, &Value::Int(-1), &Value::Int(28)),
        Ok(Value::Int(15))
    );
    assert_eq!(
        apply(IntOp::Div, &Value::Int(-7), &Value::Int(2)),
        Ok(Value::Int(-3))
    );
    assert_eq!(
        apply(IntOp::Rem, &Value::Int(-7), &Value::Int(2)),
        Ok(Value::Int(-1))
    );
}

#[test]
fn symbolic_operands_build_expressions() -> Result<()> {
    let symbols = SymbolAllocator::new();
    let a = symbols.fresh(Sort::Int);
    let b = symbols.fresh(Sort::Int);

    let quotient = apply(IntOp::Div, &a, &b)?;
    assert_eq!(quotient.to_string(), "(sym_0 / sym_1)");
    assert!(!quotient.is_concrete());

    let negated = unary(UnaryOp::Neg, &a)?;
    assert_eq!(negated.to_string(), "-sym_0");
    assert_eq!(unary(UnaryOp::Neg, &negated)?, a);
    Ok(())
}

#[test]
fn symbolic_division_by_concrete_zero() {
    let symbols = SymbolAllocator::new();
    let a = symbols.fresh(Sort::Int);
    assert_eq!(
        apply(IntOp::Div, &a, &Value::Int(0)),
        Err(ArithmeticError::DivisionByZero)
    );
}

#[test]
fn simplifications() -> Result<()> {
    let symbols = SymbolAllocator::new();
    let x = symbols.fresh(Sort::Int);
    assert_eq!(apply(IntOp::Add, &x, &Value::Int(0))?, x);
    assert_eq!(apply(IntOp::Mul, &Value::Int(1), &x)?, x);
    assert_eq!(apply(IntOp::Mul, &x, &Value::Int(0))?, Value::Int(0));
    assert_eq!(apply(IntOp::Sub, &x, &x)?, Value::Int(0));
    assert_eq!(apply(IntOp::Shl, &x, &Value::Int(32))?, x);

    let decremented = apply(IntOp::Add, &x, &Value::Int(-1))?;
    let twice = apply(IntOp::Add, &decremented, &Value::Int(-1))?;
    assert_eq!(twice.to_string(), "(sym_0 + -2)");
    assert_eq!(apply(IntOp::Sub, &decremented, &Value::Int(-1))?, x);
    Ok(())
}

#[test]
fn sort_mismatch_is_rejected() {
    let symbols = SymbolAllocator::new();
    let r = symbols.fresh(Sort::Ref);
    assert_eq!(
        apply(IntOp::Add, &r, &Value::Int(1)),
        Err(ArithmeticError::NotAnInteger(Sort::Ref))
    );
}

#[test]
fn comparisons_never_concretize() {
    let symbols = SymbolAllocator::new();
    let x = symbols.fresh(Sort::Int);
    let lt = compare(CmpOp::Lt, &x, &Value::Int(0));
    assert_eq!(lt.sort(), Sort::Bool);
    assert_eq!(lt.to_string(), "(sym_0 < 0)");
    assert_eq!(not(&lt).to_string(), "(sym_0 >= 0)");
    assert_eq!(not(&not(&lt)), lt);
    assert_eq!(compare(CmpOp::Le, &x, &x), TRUE);
}

#[test]
fn reference_comparisons() {
    let a = Value::Ref(HeapRef(0));
    let b = Value::Ref(HeapRef(1));
    assert_eq!(compare(CmpOp::Eq, &a, &a), TRUE);
    assert_eq!(compare(CmpOp::Eq, &a, &b), FALSE);
    assert_eq!(compare(CmpOp::Ne, &a, &Value::Null), TRUE);
}

#[test]
fn logical_connectives() {
    let symbols = SymbolAllocator::new();
    let x = symbols.fresh(Sort::Int);
    let p = compare(CmpOp::Gt, &x, &Value::Int(5));
    assert_eq!(and(&TRUE, &p), p);
    assert_eq!(and(&p, &FALSE), FALSE);
    assert_eq!(or(&p, &TRUE), TRUE);
    assert_eq!(or(&FALSE, &p), p);
    assert_eq!(ite(&TRUE, &Value::Int(1), &Value::Int(2)), Value::Int(1));
    assert_eq!(ite(&p, &x, &x), x);
    assert_eq!(
        ite(&p, &Value::Int(1), &Value::Int(2)).to_string(),
        "((sym_0 > 5) ? 1 : 2)"
    );
}

#[test]
fn substitution_folds_decided_conditions() -> Result<()> {
    let symbols = SymbolAllocator::new();
    let i = symbols.fresh(Sort::Int);
    let j = symbols.fresh(Sort::Int);
    let a = symbols.fresh(Sort::Int);
    let b = symbols.fresh(Sort::Int);
    let read = ite(&compare(CmpOp::Eq, &j, &i), &a, &b);

    let mut bindings = std::collections::BTreeMap::new();
    bindings.insert(SymbolId(1), i.clone());
    assert_eq!(substitute(&read, &bindings)?, a);
    assert_eq!(substitute(&compare(CmpOp::Ne, &a, &read), &bindings)?, FALSE);

    bindings.insert(SymbolId(1), Value::Int(3));
    let sum = apply(IntOp::Add, &i, &j)?;
    assert_eq!(substitute(&sum, &bindings)?.to_string(), "(sym_0 + 3)");

    bindings.insert(SymbolId(1), Value::Int(0));
    let quotient = apply(IntOp::Div, &i, &j)?;
    assert_eq!(
        substitute(&quotient, &bindings),
        Err(ArithmeticError::DivisionByZero)
    );
    Ok(())
}
