use std::collections::BTreeSet;

use jbc::ClassFile;

use super::*;
use crate::analyzer::Verdict;
use crate::config::SolverKind;

fn lines(verdict: &Verdict) -> Vec<String> {
    verdict.jpamb_lines()
}

#[test]
fn divide_prediction() -> Result<()> {
    let verdict = Verdict::from(explore(divide()?)?);
    assert!(verdict.is_exhaustive());
    assert_eq!(
        lines(&verdict),
        vec![
            "ok;100%",
            "divide by zero;100%",
            "assertion error;0%",
            "out of bounds;0%",
            "null pointer;0%",
            "*;0%",
        ]
    );
    Ok(())
}

#[test]
fn divergence_only() -> Result<()> {
    let method = MethodBuilder::parse("Demo.spin:()V")?.goto(0).build()?;
    let config = ExplorerConfig {
        max_steps: 50,
        ..Default::default()
    };
    let verdict = Verdict::from(explore_with(config, method)?);

    assert!(!verdict.is_exhaustive());
    assert_eq!(
        lines(&verdict),
        vec![
            "ok;10%",
            "divide by zero;10%",
            "assertion error;10%",
            "out of bounds;10%",
            "null pointer;10%",
            "*;100%",
        ]
    );
    Ok(())
}

#[test]
fn missing_method_yields_error_verdict() -> Result<()> {
    let analyzer = Analyzer::new(ExplorerConfig::default(), Program::from_iter([divide()?]));
    let verdict = analyzer.analyze(&"Demo.missing:()V".parse()?);

    assert!(verdict.is_error());
    assert_eq!(verdict.kinds(), BTreeSet::from([OutcomeKind::AnalyzerError]));
    assert!(lines(&verdict).iter().all(|line| line.ends_with(";50%")));
    Ok(())
}

#[test]
fn verdict_serializes_outcomes() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let verdict = Verdict::from(explore(divide()?)?);
    let json = serde_json::to_value(&verdict)?;

    assert_eq!(json["method"], "Demo.divide:(II)I");
    assert_eq!(json["outcomes"][0]["outcome"]["kind"], "thrown");
    assert_eq!(json["outcomes"][0]["condition"][0], "(sym_1 == 0)");
    assert_eq!(json["inputs"][1]["name"], "arg1");
    assert!(json.get("error").is_none());
    Ok(())
}

#[test]
fn witnesses_are_attached() -> Result<()> {
    let report = explore(divide()?)?;
    let thrown = &report.outcomes[0];
    let witness = thrown.witness.as_ref().map(|witness| witness.get(sym::SymbolId(1)));
    assert_eq!(witness, Some(Some(0)));
    Ok(())
}

#[test]
fn trivial_solver_keeps_infeasible_paths() -> Result<()> {
    let method = MethodBuilder::parse("Demo.prune:(I)I")?
        .load_int(0)
        .ifz(jbc::Condition::Ge, 7)
        .load_int(0)
        .push_int(5)
        .if_cmp(jbc::Condition::Le, 7)
        .push_int(1)
        .return_int()
        .push_int(0)
        .return_int()
        .build()?;
    let config = ExplorerConfig {
        solver: SolverKind::Trivial,
        ..Default::default()
    };
    let report = explore_with(config, method)?;

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.stats.pruned, 0);
    assert!(report.stats.solver_unknown > 0);
    Ok(())
}

#[cfg(not(feature = "z3"))]
#[test]
fn z3_requires_feature() -> Result<()> {
    let config = ExplorerConfig {
        solver: SolverKind::Z3,
        ..Default::default()
    };
    let result = explore_with(config, divide()?);
    assert!(matches!(result, Err(AnalyzerError::SolverUnavailable(_))));
    Ok(())
}

#[test]
fn json_method_is_analyzed() -> Result<()> {
    let json = br#"{
        "id": "Demo.identity:(I)I",
        "code": [
            { "offset": 0, "opr": "load", "index": 0, "type": "int" },
            { "offset": 1, "opr": "return", "type": "int" }
        ]
    }"#;
    let mut analyzer = Analyzer::new(ExplorerConfig::default(), Program::new());
    let verdict = analyzer.analyze_json(json)?;

    assert_eq!(verdict.kinds(), BTreeSet::from([OutcomeKind::Ok]));
    assert_eq!(analyzer.program().len(), 1);
    Ok(())
}

#[test]
fn class_failures_are_isolated() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let json = br#"{
        "name": "Demo",
        "methods": [
            {
                "id": "Demo.identity:(I)I",
                "code": [
                    { "offset": 0, "opr": "load", "index": 0, "type": "int" },
                    { "offset": 1, "opr": "return", "type": "int" }
                ]
            },
            {
                "id": "Demo.broken:()V",
                "code": [
                    { "offset": 0, "opr": "goto", "target": 9 }
                ]
            }
        ]
    }"#;
    let class = ClassFile::load(json)?;
    let verdicts = Analyzer::analyze_class(ExplorerConfig::default(), class);

    assert_eq!(verdicts.len(), 2);
    let errors: Vec<_> = verdicts.iter().filter(|verdict| verdict.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].method, "Demo.broken:()V");
    Ok(())
}
