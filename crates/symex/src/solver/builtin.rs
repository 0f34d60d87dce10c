//! A small decision procedure for the constraints produced by the engine.
//!
//! Each symbol gets an interval over its 32-bit domain. Comparisons between a symbol (optionally
//! offset by a constant) and a constant, or between two symbols, narrow the intervals until a
//! fixpoint is reached. An empty interval proves the condition unsatisfiable. Otherwise
//! assignments are drawn from boundary candidates and then from a deterministic pseudo-random
//! sequence, and checked with the [Evaluator]. Failing to find a witness is reported as
//! [SolverResult::Unknown].
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use sym::{ops, CmpOp, Evaluator, Expr, IntOp, Sort, SymbolId, Value, Witness};
use tracing::trace;

use super::{ConstraintSolver, Result, SolverError, SolverResult};
use crate::state::PathCondition;

const MAX_PROPAGATION_ROUNDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    lo: i64,
    hi: i64,
}

impl Interval {
    fn of(sort: Sort) -> Self {
        match sort {
            Sort::Int => Interval {
                lo: i64::from(i32::MIN),
                hi: i64::from(i32::MAX),
            },
            Sort::Ref => Interval {
                lo: 0,
                hi: i64::from(i32::MAX),
            },
            Sort::Bool => Interval { lo: 0, hi: 1 },
        }
    }

    fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    fn is_singleton(&self) -> bool {
        self.lo == self.hi
    }

    fn contains(&self, value: i64) -> bool {
        self.lo <= value && value <= self.hi
    }

    /// Restrict to the values `x` with `x op k`.
    fn restrict(&mut self, op: CmpOp, k: i64) {
        match op {
            CmpOp::Eq => {
                self.lo = self.lo.max(k);
                self.hi = self.hi.min(k);
            }
            CmpOp::Ne => {
                if self.lo == k {
                    self.lo += 1;
                }
                if self.hi == k {
                    self.hi -= 1;
                }
            }
            CmpOp::Lt => self.hi = self.hi.min(k - 1),
            CmpOp::Le => self.hi = self.hi.min(k),
            CmpOp::Gt => self.lo = self.lo.max(k + 1),
            CmpOp::Ge => self.lo = self.lo.max(k),
        }
    }
}

/// A symbol plus a constant offset: `id + offset`.
#[derive(Debug, Clone, Copy)]
struct Linear {
    id: SymbolId,
    offset: i64,
}

fn linear(value: &Value) -> Option<Linear> {
    match value.as_expr()? {
        Expr::Var { id, .. } => Some(Linear { id: *id, offset: 0 }),
        Expr::Binary { op, lhs, rhs } => match (op, lhs.as_symbol(), rhs.as_int()) {
            (IntOp::Add, Some(id), Some(c)) => Some(Linear {
                id,
                offset: i64::from(c),
            }),
            (IntOp::Sub, Some(id), Some(c)) => Some(Linear {
                id,
                offset: -i64::from(c),
            }),
            (IntOp::Add, None, _) => match (lhs.as_int(), rhs.as_symbol()) {
                (Some(c), Some(id)) => Some(Linear {
                    id,
                    offset: i64::from(c),
                }),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

fn constant(value: &Value) -> Option<i64> {
    match value {
        Value::Int(x) => Some(i64::from(*x)),
        Value::Null => Some(0),
        Value::Ref(heap_ref) => Some(i64::from(heap_ref.0) + 1),
        _ => None,
    }
}

/// Flatten conjunctions. Returns `None` if some constraint is concretely false.
fn flatten(constraints: Vec<Value>) -> Option<Vec<Value>> {
    let mut flat = Vec::with_capacity(constraints.len());
    let mut pending = constraints;
    pending.reverse();
    while let Some(constraint) = pending.pop() {
        match constraint {
            Value::Bool(true) => (),
            Value::Bool(false) => return None,
            Value::Symbolic(ref expr) => match expr.as_ref() {
                Expr::And(lhs, rhs) => {
                    pending.push(rhs.clone());
                    pending.push(lhs.clone());
                }
                _ => flat.push(constraint),
            },
            other => flat.push(other),
        }
    }
    Some(flat)
}

/// Interval propagation and bounded witness search.
#[derive(Debug, Clone)]
pub struct BuiltinSolver {
    timeout: Duration,
    budget: usize,
}

impl Default for BuiltinSolver {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl BuiltinSolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            budget: 20_000,
        }
    }

    /// Limit the number of candidate assignments evaluated per check.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    fn propagate(
        &self,
        constraints: &[Value],
        domains: &mut BTreeMap<SymbolId, Interval>,
    ) -> bool {
        for _ in 0..MAX_PROPAGATION_ROUNDS {
            let before = domains.clone();
            for constraint in constraints {
                if let Some(Expr::Compare { op, lhs, rhs }) = constraint.as_expr() {
                    narrow(*op, lhs, rhs, domains);
                }
                if domains.values().any(Interval::is_empty) {
                    return false;
                }
            }
            if *domains == before {
                break;
            }
        }
        true
    }

    fn candidates(
        constraints: &[Value],
        domains: &BTreeMap<SymbolId, Interval>,
    ) -> BTreeMap<SymbolId, Vec<i64>> {
        let mut constants = BTreeSet::new();
        for constraint in constraints {
            collect_constants(constraint, &mut constants);
        }

        domains
            .iter()
            .map(|(id, domain)| {
                let mut values: BTreeSet<i64> = [domain.lo, domain.hi, 0, 1, -1].into();
                for k in &constants {
                    values.extend([k - 1, *k, k + 1]);
                }
                let mut values: Vec<i64> = values
                    .into_iter()
                    .filter(|value| domain.contains(*value))
                    .collect();
                values.sort_by_key(|value| (value.abs(), *value));
                (*id, values)
            })
            .collect()
    }

    fn search(
        &self,
        constraints: &[Value],
        domains: &BTreeMap<SymbolId, Interval>,
        deadline: Instant,
    ) -> Result<Option<Witness>> {
        let candidates = Self::candidates(constraints, domains);
        let ids: Vec<SymbolId> = candidates.keys().copied().collect();
        let mut evaluations = 0;

        let satisfies = |witness: &Witness| {
            let evaluator = Evaluator::new(witness.clone());
            constraints
                .iter()
                .all(|constraint| evaluator.evaluate_bool(constraint) == Some(true))
        };

        // Enumerate combinations of candidates like an odometer, smallest magnitudes first.
        let mut digits = vec![0usize; ids.len()];
        loop {
            if evaluations >= self.budget / 2 {
                break;
            }
            if evaluations % 64 == 0 && Instant::now() > deadline {
                return Err(SolverError::Timeout(self.timeout));
            }
            evaluations += 1;

            let witness: Witness = ids
                .iter()
                .zip(&digits)
                .map(|(id, digit)| (*id, candidates[id][*digit] as i32))
                .collect();
            if satisfies(&witness) {
                return Ok(Some(witness));
            }

            let mut position = 0;
            loop {
                if position == ids.len() {
                    break;
                }
                digits[position] += 1;
                if digits[position] < candidates[&ids[position]].len() {
                    break;
                }
                digits[position] = 0;
                position += 1;
            }
            if position == ids.len() {
                break;
            }
        }

        let mut rng = XorShift::new(0x9e37_79b9_7f4a_7c15);
        while evaluations < self.budget {
            if evaluations % 64 == 0 && Instant::now() > deadline {
                return Err(SolverError::Timeout(self.timeout));
            }
            evaluations += 1;

            let witness: Witness = domains
                .iter()
                .map(|(id, domain)| (*id, rng.within(domain) as i32))
                .collect();
            if satisfies(&witness) {
                return Ok(Some(witness));
            }
        }

        Ok(None)
    }
}

/// Narrow the domains of the symbols in `lhs op rhs`.
fn narrow(op: CmpOp, lhs: &Value, rhs: &Value, domains: &mut BTreeMap<SymbolId, Interval>) {
    match (linear(lhs), linear(rhs), constant(lhs), constant(rhs)) {
        (Some(x), _, _, Some(k)) => narrow_linear(op, x, k, domains),
        (_, Some(y), Some(k), _) => narrow_linear(op.flip(), y, k, domains),
        (Some(x), Some(y), _, _) if x.offset == 0 && y.offset == 0 => {
            narrow_symbols(op, x.id, y.id, domains)
        }
        _ => (),
    }
}

/// `x.id + x.offset op k`. Only applied when the addition cannot wrap within the domain.
fn narrow_linear(op: CmpOp, x: Linear, k: i64, domains: &mut BTreeMap<SymbolId, Interval>) {
    let Some(domain) = domains.get_mut(&x.id) else {
        return;
    };

    // Equality has exactly one solution modulo 2^32.
    if let CmpOp::Eq | CmpOp::Ne = op {
        domain.restrict(op, i64::from((k - x.offset) as i32));
        return;
    }

    let min = i64::from(i32::MIN);
    let max = i64::from(i32::MAX);
    if domain.lo + x.offset < min || domain.hi + x.offset > max {
        return;
    }

    domain.restrict(op, k - x.offset);
}

fn narrow_symbols(op: CmpOp, x: SymbolId, y: SymbolId, domains: &mut BTreeMap<SymbolId, Interval>) {
    let (Some(&dx), Some(&dy)) = (domains.get(&x), domains.get(&y)) else {
        return;
    };

    let (nx, ny) = match op {
        CmpOp::Eq => {
            let lo = dx.lo.max(dy.lo);
            let hi = dx.hi.min(dy.hi);
            (Interval { lo, hi }, Interval { lo, hi })
        }
        CmpOp::Ne => {
            if dx.is_singleton() && dy.is_singleton() && dx.lo == dy.lo {
                (Interval { lo: 1, hi: 0 }, dy)
            } else {
                (dx, dy)
            }
        }
        CmpOp::Lt => (
            Interval {
                lo: dx.lo,
                hi: dx.hi.min(dy.hi - 1),
            },
            Interval {
                lo: dy.lo.max(dx.lo + 1),
                hi: dy.hi,
            },
        ),
        CmpOp::Le => (
            Interval {
                lo: dx.lo,
                hi: dx.hi.min(dy.hi),
            },
            Interval {
                lo: dy.lo.max(dx.lo),
                hi: dy.hi,
            },
        ),
        CmpOp::Gt | CmpOp::Ge => return narrow_symbols(op.flip(), y, x, domains),
    };

    domains.insert(x, nx);
    domains.insert(y, ny);
}

fn collect_constants(value: &Value, constants: &mut BTreeSet<i64>) {
    match value {
        Value::Int(x) => {
            constants.insert(i64::from(*x));
        }
        Value::Symbolic(expr) => match expr.as_ref() {
            Expr::Var { .. } => (),
            Expr::Unary { operand, .. } | Expr::Not(operand) => {
                collect_constants(operand, constants)
            }
            Expr::Binary { lhs, rhs, .. }
            | Expr::Compare { lhs, rhs, .. }
            | Expr::And(lhs, rhs)
            | Expr::Or(lhs, rhs) => {
                collect_constants(lhs, constants);
                collect_constants(rhs, constants);
            }
            Expr::Ite {
                cond,
                then,
                otherwise,
            } => {
                collect_constants(cond, constants);
                collect_constants(then, constants);
                collect_constants(otherwise, constants);
            }
        },
        _ => (),
    }
}

/// Deterministic pseudo-random numbers so that repeated runs find the same witnesses.
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn within(&mut self, interval: &Interval) -> i64 {
        // Domains are subsets of the 32-bit range, so the width always fits.
        let width = (interval.hi - interval.lo + 1) as u64;
        interval.lo + (self.next() % width) as i64
    }
}

/// Bindings that follow from the condition: a symbol equal to another symbol is replaced by the
/// smaller one, and a symbol whose domain is a single value by that value.
fn bindings(
    constraints: &[Value],
    sorts: &BTreeMap<SymbolId, Sort>,
    domains: &BTreeMap<SymbolId, Interval>,
) -> BTreeMap<SymbolId, Value> {
    let mut parents: BTreeMap<SymbolId, SymbolId> = BTreeMap::new();
    let root = |parents: &BTreeMap<SymbolId, SymbolId>, mut id: SymbolId| {
        while let Some(parent) = parents.get(&id) {
            id = *parent;
        }
        id
    };

    for constraint in constraints {
        if let Some(Expr::Compare {
            op: CmpOp::Eq,
            lhs,
            rhs,
        }) = constraint.as_expr()
        {
            if let (Some(x), Some(y)) = (lhs.as_symbol(), rhs.as_symbol()) {
                let (x, y) = (root(&parents, x), root(&parents, y));
                if x != y {
                    parents.insert(x.max(y), x.min(y));
                }
            }
        }
    }

    let mut bindings = BTreeMap::new();
    for (&id, &sort) in sorts {
        let representative = root(&parents, id);
        let constant = domains
            .get(&representative)
            .filter(|domain| domain.is_singleton())
            .and_then(|domain| match sort {
                Sort::Int => Some(Value::Int(domain.lo as i32)),
                Sort::Bool => Some(Value::Bool(domain.lo != 0)),
                Sort::Ref if domain.lo == 0 => Some(Value::Null),
                Sort::Ref => None,
            });
        if let Some(constant) = constant {
            bindings.insert(id, constant);
        } else if representative != id {
            bindings.insert(id, Value::symbol(representative, sort));
        }
    }
    bindings
}

/// Returns true if the orderings between pairs of symbols form a cycle that requires some symbol
/// to be strictly smaller than itself. Each `x - y <= c` becomes an edge `y -> x` of weight `c`,
/// and a negative cycle is found by Bellman-Ford relaxation.
fn has_ordering_cycle(constraints: &[Value]) -> bool {
    let mut edges = Vec::new();
    for constraint in constraints {
        let Some(Expr::Compare { op, lhs, rhs }) = constraint.as_expr() else {
            continue;
        };
        let (Some(x), Some(y)) = (lhs.as_symbol(), rhs.as_symbol()) else {
            continue;
        };
        match op {
            CmpOp::Lt => edges.push((y, x, -1)),
            CmpOp::Le => edges.push((y, x, 0)),
            CmpOp::Gt => edges.push((x, y, -1)),
            CmpOp::Ge => edges.push((x, y, 0)),
            CmpOp::Eq => edges.extend([(y, x, 0), (x, y, 0)]),
            CmpOp::Ne => (),
        }
    }
    if edges.is_empty() {
        return false;
    }

    let mut distance: BTreeMap<SymbolId, i64> = BTreeMap::new();
    for (from, to, _) in &edges {
        distance.insert(*from, 0);
        distance.insert(*to, 0);
    }

    for _ in 0..distance.len() {
        let mut relaxed = false;
        for (from, to, weight) in &edges {
            let candidate = distance[from] + weight;
            if candidate < distance[to] {
                distance.insert(*to, candidate);
                relaxed = true;
            }
        }
        if !relaxed {
            return false;
        }
    }
    true
}

impl ConstraintSolver for BuiltinSolver {
    fn check(&mut self, condition: &PathCondition) -> Result<SolverResult> {
        let deadline = Instant::now() + self.timeout;
        let Some(constraints) = flatten(condition.constraints()) else {
            return Ok(SolverResult::Unsatisfiable);
        };

        let sorts = condition.symbols();
        let mut domains: BTreeMap<SymbolId, Interval> = sorts
            .iter()
            .map(|(id, sort)| (*id, Interval::of(*sort)))
            .collect();

        if !self.propagate(&constraints, &mut domains) || has_ordering_cycle(&constraints) {
            trace!(%condition, "infeasible by propagation");
            return Ok(SolverResult::Unsatisfiable);
        }

        // Rewrite with the implied bindings. A rewrite that divides by a constant zero means the
        // divisor was excluded elsewhere, so the original constraints are searched instead.
        let bindings = bindings(&constraints, &sorts, &domains);
        let rewritten = constraints
            .iter()
            .map(|constraint| ops::substitute(constraint, &bindings))
            .collect::<std::result::Result<Vec<_>, _>>();
        let (constraints, bindings) = match rewritten {
            Ok(rewritten) => {
                let Some(rewritten) = flatten(rewritten) else {
                    trace!(%condition, "infeasible after substitution");
                    return Ok(SolverResult::Unsatisfiable);
                };
                if !self.propagate(&rewritten, &mut domains) || has_ordering_cycle(&rewritten) {
                    trace!(%condition, "infeasible after substitution");
                    return Ok(SolverResult::Unsatisfiable);
                }
                (rewritten, bindings)
            }
            Err(_) => (constraints, BTreeMap::new()),
        };

        // Search only the symbols that remain free.
        let free: BTreeMap<SymbolId, Interval> = domains
            .into_iter()
            .filter(|(id, _)| !bindings.contains_key(id))
            .collect();
        match self.search(&constraints, &free, deadline)? {
            Some(mut witness) => {
                for (id, bound) in &bindings {
                    let value = match bound {
                        Value::Int(x) => Some(*x),
                        Value::Bool(b) => Some(i32::from(*b)),
                        Value::Null => Some(0),
                        other => other.as_symbol().and_then(|root| witness.get(root)),
                    };
                    if let Some(value) = value {
                        witness.insert(*id, value);
                    }
                }
                Ok(SolverResult::Satisfiable(witness))
            }
            None => {
                trace!(%condition, "no witness found");
                Ok(SolverResult::Unknown)
            }
        }
    }
}
