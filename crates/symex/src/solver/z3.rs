//! Bit-precise checks with z3. Integers and references are encoded as 32-bit bit-vectors, with
//! `null` as `0` and heap reference `n` as `n + 1`.
use std::time::Duration;

use ::z3::ast::{Ast, Bool, BV};
use ::z3::{Config, Context, SatResult, Solver};
use sym::{CmpOp, Expr, IntOp, Narrowing, Sort, UnaryOp, Value, Witness};

use super::{ConstraintSolver, Result, SolverError, SolverResult};
use crate::state::PathCondition;

const WIDTH: u32 = 32;

enum Term<'ctx> {
    Int(BV<'ctx>),
    Bool(Bool<'ctx>),
}

#[derive(Debug, Clone)]
pub struct Z3Solver {
    timeout: Duration,
}

impl Z3Solver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

struct Encoder<'ctx> {
    ctx: &'ctx Context,
}

impl<'ctx> Encoder<'ctx> {
    fn int(&self, value: &Value) -> Result<BV<'ctx>> {
        match self.term(value)? {
            Term::Int(bv) => Ok(bv),
            Term::Bool(_) => Err(SolverError::Backend(format!(
                "expected an integer term but found {value}"
            ))),
        }
    }

    fn bool(&self, value: &Value) -> Result<Bool<'ctx>> {
        match self.term(value)? {
            Term::Bool(b) => Ok(b),
            Term::Int(_) => Err(SolverError::Backend(format!(
                "expected a boolean term but found {value}"
            ))),
        }
    }

    fn term(&self, value: &Value) -> Result<Term<'ctx>> {
        let term = match value {
            Value::Int(x) => Term::Int(BV::from_i64(self.ctx, i64::from(*x), WIDTH)),
            Value::Bool(b) => Term::Bool(Bool::from_bool(self.ctx, *b)),
            Value::Null => Term::Int(BV::from_i64(self.ctx, 0, WIDTH)),
            Value::Ref(heap_ref) => {
                Term::Int(BV::from_i64(self.ctx, i64::from(heap_ref.0) + 1, WIDTH))
            }
            Value::Symbolic(expr) => self.expr(expr)?,
        };
        Ok(term)
    }

    fn expr(&self, expr: &Expr) -> Result<Term<'ctx>> {
        let term = match expr {
            Expr::Var { id, sort } => match sort {
                Sort::Bool => Term::Bool(Bool::new_const(self.ctx, id.to_string())),
                Sort::Int | Sort::Ref => Term::Int(BV::new_const(self.ctx, id.to_string(), WIDTH)),
            },
            Expr::Unary { op, operand } => {
                let x = self.int(operand)?;
                Term::Int(match op {
                    UnaryOp::Neg => x.bvneg(),
                    UnaryOp::Narrow(Narrowing::Byte) => x.extract(7, 0).sign_ext(24),
                    UnaryOp::Narrow(Narrowing::Short) => x.extract(15, 0).sign_ext(16),
                    UnaryOp::Narrow(Narrowing::Char) => x.extract(15, 0).zero_ext(16),
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let x = self.int(lhs)?;
                let y = self.int(rhs)?;
                let shift = || y.bvand(&BV::from_i64(self.ctx, 0x1f, WIDTH));
                Term::Int(match op {
                    IntOp::Add => x.bvadd(&y),
                    IntOp::Sub => x.bvsub(&y),
                    IntOp::Mul => x.bvmul(&y),
                    IntOp::Div => x.bvsdiv(&y),
                    IntOp::Rem => x.bvsrem(&y),
                    IntOp::And => x.bvand(&y),
                    IntOp::Or => x.bvor(&y),
                    IntOp::Xor => x.bvxor(&y),
                    IntOp::Shl => x.bvshl(&shift()),
                    IntOp::Shr => x.bvashr(&shift()),
                    IntOp::Ushr => x.bvlshr(&shift()),
                })
            }
            Expr::Compare { op, lhs, rhs } => {
                let x = self.int(lhs)?;
                let y = self.int(rhs)?;
                Term::Bool(match op {
                    CmpOp::Eq => x._eq(&y),
                    CmpOp::Ne => x._eq(&y).not(),
                    CmpOp::Lt => x.bvslt(&y),
                    CmpOp::Le => x.bvsle(&y),
                    CmpOp::Gt => x.bvsgt(&y),
                    CmpOp::Ge => x.bvsge(&y),
                })
            }
            Expr::Not(operand) => Term::Bool(self.bool(operand)?.not()),
            Expr::And(lhs, rhs) => {
                Term::Bool(Bool::and(self.ctx, &[&self.bool(lhs)?, &self.bool(rhs)?]))
            }
            Expr::Or(lhs, rhs) => {
                Term::Bool(Bool::or(self.ctx, &[&self.bool(lhs)?, &self.bool(rhs)?]))
            }
            Expr::Ite {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.bool(cond)?;
                match (self.term(then)?, self.term(otherwise)?) {
                    (Term::Int(a), Term::Int(b)) => Term::Int(cond.ite(&a, &b)),
                    (Term::Bool(a), Term::Bool(b)) => Term::Bool(cond.ite(&a, &b)),
                    _ => {
                        return Err(SolverError::Backend(format!(
                            "branches of {expr} have different sorts"
                        )))
                    }
                }
            }
        };
        Ok(term)
    }
}

impl ConstraintSolver for Z3Solver {
    fn check(&mut self, condition: &PathCondition) -> Result<SolverResult> {
        let mut config = Config::new();
        config.set_timeout_msec(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX));
        let ctx = Context::new(&config);
        let solver = Solver::new(&ctx);
        let encoder = Encoder { ctx: &ctx };

        for constraint in condition.constraints() {
            solver.assert(&encoder.bool(&constraint)?);
        }

        let symbols = condition.symbols();
        let zero = BV::from_i64(&ctx, 0, WIDTH);
        for (id, sort) in &symbols {
            if *sort == Sort::Ref {
                solver.assert(&BV::new_const(&ctx, id.to_string(), WIDTH).bvsge(&zero));
            }
        }

        match solver.check() {
            SatResult::Unsat => Ok(SolverResult::Unsatisfiable),
            SatResult::Unknown => {
                let reason = solver.get_reason_unknown().unwrap_or_default();
                if reason.contains("timeout") || reason.contains("canceled") {
                    Err(SolverError::Timeout(self.timeout))
                } else {
                    Ok(SolverResult::Unknown)
                }
            }
            SatResult::Sat => {
                let Some(model) = solver.get_model() else {
                    return Ok(SolverResult::Unknown);
                };

                let mut witness = Witness::new();
                for (id, sort) in &symbols {
                    if *sort == Sort::Bool {
                        continue;
                    }
                    let var = BV::new_const(&ctx, id.to_string(), WIDTH);
                    let value = model
                        .eval(&var, true)
                        .and_then(|value| value.as_u64())
                        .ok_or_else(|| SolverError::Backend(format!("no model value for {id}")))?;
                    witness.insert(*id, value as u32 as i32);
                }
                Ok(SolverResult::Satisfiable(witness))
            }
        }
    }
}
