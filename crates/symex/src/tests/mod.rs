mod analyzer;
mod config;
mod solver;

use std::collections::BTreeSet;

use jbc::builder::MethodBuilder;
use jbc::{Method, MethodId, Program};

use crate::analyzer::{Analyzer, AnalyzerError, Report, Result};
use crate::config::ExplorerConfig;
use crate::outcome::OutcomeKind;

/// `if (x >= 0) return x; else return -x;`
fn abs() -> jbc::Result<Method> {
    MethodBuilder::parse("Demo.abs:(I)I")?
        .load_int(0)
        .ifz(jbc::Condition::Ge, 5)
        .load_int(0)
        .negate()
        .return_int()
        .load_int(0)
        .return_int()
        .build()
}

/// `return a / b;`
fn divide() -> jbc::Result<Method> {
    MethodBuilder::parse("Demo.divide:(II)I")?
        .load_int(0)
        .load_int(1)
        .binary(jbc::BinaryOp::Div)
        .return_int()
        .build()
}

fn explore_in(config: ExplorerConfig, program: Program, id: &str) -> Result<Report> {
    let id: MethodId = id.parse()?;
    let method = program
        .get(&id)
        .cloned()
        .ok_or_else(|| AnalyzerError::MethodNotFound(id.to_string()))?;
    Analyzer::new(config, program).explore(&method)
}

fn explore_with(config: ExplorerConfig, method: Method) -> Result<Report> {
    let id = method.id().to_string();
    let program = Program::from_iter([method]);
    explore_in(config, program, &id)
}

fn explore(method: Method) -> Result<Report> {
    explore_with(ExplorerConfig::default(), method)
}

fn kinds(report: &Report) -> BTreeSet<OutcomeKind> {
    report.outcomes.iter().map(|outcome| outcome.kind()).collect()
}
