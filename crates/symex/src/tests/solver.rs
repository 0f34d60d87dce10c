use std::time::Duration;

use sym::{ops, CmpOp, Evaluator, IntOp, Sort, SymbolId, Value};

use crate::solver::{
    BuiltinSolver, CachingSolver, ConstraintSolver, SolverResult, TrivialSolver,
};
use crate::state::PathCondition;

fn var(id: u64) -> Value {
    Value::symbol(SymbolId(id), Sort::Int)
}

fn condition(constraints: impl IntoIterator<Item = Value>) -> PathCondition {
    let mut condition = PathCondition::new();
    for constraint in constraints {
        condition.push(constraint);
    }
    condition
}

fn holds(condition: &PathCondition, result: &SolverResult) -> bool {
    let Some(witness) = result.witness() else {
        return false;
    };
    let evaluator = Evaluator::new(witness.clone());
    condition
        .constraints()
        .iter()
        .all(|constraint| evaluator.evaluate_bool(constraint) == Some(true))
}

#[test]
fn disjoint_bounds_are_unsatisfiable() -> crate::solver::Result<()> {
    let x = var(0);
    let condition = condition([
        ops::compare(CmpOp::Lt, &x, &Value::Int(0)),
        ops::compare(CmpOp::Gt, &x, &Value::Int(5)),
    ]);
    let result = BuiltinSolver::default().check(&condition)?;
    assert!(result.is_unsatisfiable());
    Ok(())
}

#[test]
fn narrow_bounds_give_exact_witness() -> crate::solver::Result<()> {
    let x = var(0);
    let condition = condition([
        ops::compare(CmpOp::Gt, &x, &Value::Int(10)),
        ops::compare(CmpOp::Lt, &x, &Value::Int(12)),
    ]);
    let result = BuiltinSolver::default().check(&condition)?;
    assert_eq!(result.witness().and_then(|w| w.get(SymbolId(0))), Some(11));
    Ok(())
}

#[test]
fn offsets_are_propagated() -> crate::solver::Result<()> {
    // x + 1 > 5 && x < 5
    let x = var(0);
    let sum = ops::apply(IntOp::Add, &x, &Value::Int(1)).map_err(backend)?;
    let condition = condition([
        ops::compare(CmpOp::Gt, &sum, &Value::Int(5)),
        ops::compare(CmpOp::Lt, &x, &Value::Int(5)),
    ]);
    let result = BuiltinSolver::default().check(&condition)?;
    assert!(result.is_unsatisfiable());
    Ok(())
}

#[test]
fn offset_equality_wraps() -> crate::solver::Result<()> {
    // x + 1 == MIN only holds for MAX
    let x = var(0);
    let sum = ops::apply(IntOp::Add, &x, &Value::Int(1)).map_err(backend)?;
    let wrapped = condition([ops::compare(CmpOp::Eq, &sum, &Value::Int(i32::MIN))]);
    let result = BuiltinSolver::default().check(&wrapped)?;
    assert_eq!(result.witness().and_then(|w| w.get(SymbolId(0))), Some(i32::MAX));

    let countdown = ops::apply(IntOp::Add, &x, &Value::Int(-15)).map_err(backend)?;
    let loop_exit = condition([
        ops::compare(CmpOp::Ne, &x, &Value::Int(0)),
        ops::compare(CmpOp::Eq, &countdown, &Value::Int(0)),
    ]);
    let result = BuiltinSolver::default().check(&loop_exit)?;
    assert_eq!(result.witness().and_then(|w| w.get(SymbolId(0))), Some(15));
    Ok(())
}

#[test]
fn symbol_ordering_is_propagated() -> crate::solver::Result<()> {
    // x < y && y < x
    let x = var(0);
    let y = var(1);
    let condition = condition([
        ops::compare(CmpOp::Lt, &x, &y),
        ops::compare(CmpOp::Lt, &y, &x),
    ]);
    let result = BuiltinSolver::default().check(&condition)?;
    assert!(result.is_unsatisfiable());
    Ok(())
}

#[test]
fn witness_satisfies_nonlinear_condition() -> crate::solver::Result<()> {
    // x / y == 7 && y != 0
    let x = var(0);
    let y = var(1);
    let quotient = ops::apply(IntOp::Div, &x, &y).map_err(backend)?;
    let condition = condition([
        ops::compare(CmpOp::Ne, &y, &Value::Int(0)),
        ops::compare(CmpOp::Eq, &quotient, &Value::Int(7)),
    ]);
    let result = BuiltinSolver::default().check(&condition)?;
    assert!(holds(&condition, &result));
    Ok(())
}

#[test]
fn witness_respects_wrapping_arithmetic() -> crate::solver::Result<()> {
    // x + 1 < x only holds for MAX
    let x = var(0);
    let sum = ops::apply(IntOp::Add, &x, &Value::Int(1)).map_err(backend)?;
    let condition = condition([ops::compare(CmpOp::Lt, &sum, &x)]);
    let result = BuiltinSolver::default().check(&condition)?;
    assert_eq!(result.witness().and_then(|w| w.get(SymbolId(0))), Some(i32::MAX));
    Ok(())
}

#[test]
fn exhausted_search_is_unknown() -> crate::solver::Result<()> {
    // No square is congruent to 3 modulo 4.
    let x = var(0);
    let square = ops::apply(IntOp::Mul, &x, &x).map_err(backend)?;
    let condition = condition([ops::compare(CmpOp::Eq, &square, &Value::Int(-1))]);
    let mut solver = BuiltinSolver::new(Duration::from_secs(10)).with_budget(200);
    assert_eq!(solver.check(&condition)?, SolverResult::Unknown);
    Ok(())
}

#[test]
fn null_references_are_distinguished() -> crate::solver::Result<()> {
    let r = Value::symbol(SymbolId(0), Sort::Ref);
    let condition = condition([
        ops::compare(CmpOp::Eq, &r, &Value::Null),
        ops::compare(CmpOp::Ne, &r, &Value::Null),
    ]);
    let result = BuiltinSolver::default().check(&condition)?;
    assert!(result.is_unsatisfiable());
    Ok(())
}

#[test]
fn trivial_solver_only_decides_concrete_conditions() -> crate::solver::Result<()> {
    let mut solver = TrivialSolver;
    assert!(matches!(
        solver.check(&PathCondition::new())?,
        SolverResult::Satisfiable(_)
    ));
    assert_eq!(
        solver.check(&condition([Value::Bool(false)]))?,
        SolverResult::Unsatisfiable
    );
    let symbolic = condition([ops::compare(CmpOp::Eq, &var(0), &Value::Int(1))]);
    assert_eq!(solver.check(&symbolic)?, SolverResult::Unknown);
    Ok(())
}

#[test]
fn cache_answers_repeated_checks() -> crate::solver::Result<()> {
    let x = var(0);
    let first = condition([ops::compare(CmpOp::Ge, &x, &Value::Int(0))]);
    let same = condition([ops::compare(CmpOp::Ge, &x, &Value::Int(0))]);
    let other = condition([ops::compare(CmpOp::Lt, &x, &Value::Int(0))]);

    let mut solver = CachingSolver::new(BuiltinSolver::default());
    let expected = solver.check(&first)?;
    assert_eq!(solver.check(&same)?, expected);
    solver.check(&other)?;

    assert_eq!(solver.hits(), 1);
    assert_eq!(solver.len(), 2);
    Ok(())
}

fn backend(err: sym::ArithmeticError) -> crate::solver::SolverError {
    crate::solver::SolverError::Backend(err.to_string())
}

#[cfg(feature = "z3")]
mod z3 {
    use super::*;
    use crate::solver::Z3Solver;

    #[test]
    fn square_is_never_minus_one() -> crate::solver::Result<()> {
        let x = var(0);
        let square = ops::apply(IntOp::Mul, &x, &x).map_err(backend)?;
        let condition = condition([ops::compare(CmpOp::Eq, &square, &Value::Int(-1))]);
        let result = Z3Solver::new(Duration::from_secs(10)).check(&condition)?;
        assert!(result.is_unsatisfiable());
        Ok(())
    }

    #[test]
    fn model_satisfies_division() -> crate::solver::Result<()> {
        let x = var(0);
        let y = var(1);
        let quotient = ops::apply(IntOp::Div, &x, &y).map_err(backend)?;
        let condition = condition([
            ops::compare(CmpOp::Ne, &y, &Value::Int(0)),
            ops::compare(CmpOp::Eq, &quotient, &Value::Int(-3)),
        ]);
        let result = Z3Solver::new(Duration::from_secs(10)).check(&condition)?;
        assert!(holds(&condition, &result));
        Ok(())
    }
}
