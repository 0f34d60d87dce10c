use assert_fs::prelude::*;

use crate::config::{ConfigError, ExplorerConfig, InvokePolicy, SolverKind, Strategy};

#[test]
fn defaults() {
    let config = ExplorerConfig::default();
    assert_eq!(config.strategy, Strategy::Dfs);
    assert_eq!(config.solver, SolverKind::Builtin);
    assert_eq!(config.invoke_policy, InvokePolicy::Summarize);
    assert_eq!(config.max_depth, 64);
    assert!(config.validate().is_ok());
    assert_eq!(config.assertion_helper_ids().len(), 1);
}

#[test]
fn partial_json_keeps_defaults() -> crate::config::Result<()> {
    let config = ExplorerConfig::from_json(
        r#"{ "strategy": "bfs", "max_depth": 8, "invoke_policy": "inline" }"#,
    )?;
    assert_eq!(config.strategy, Strategy::Bfs);
    assert_eq!(config.max_depth, 8);
    assert_eq!(config.invoke_policy, InvokePolicy::Inline);
    assert_eq!(config.max_paths, ExplorerConfig::default().max_paths);
    Ok(())
}

#[test]
fn unknown_fields_are_rejected() {
    let result = ExplorerConfig::from_json(r#"{ "max_dept": 8 }"#);
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn zero_budgets_are_rejected() {
    let result = ExplorerConfig::from_json(r#"{ "max_paths": 0 }"#);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));

    let config = ExplorerConfig {
        max_call_depth: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn assertion_helpers_must_take_one_argument() {
    let config = ExplorerConfig {
        assertion_helpers: vec!["jpamb.cases.Simple.check:(II)V".to_string()],
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let config = ExplorerConfig {
        assertion_helpers: vec!["not a method".to_string()],
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    assert!(config.assertion_helper_ids().is_empty());
}

#[test]
fn load_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let file = assert_fs::NamedTempFile::new("symex.json")?;
    file.write_str(r#"{ "solver": "trivial", "timeout_ms": 250 }"#)?;

    let config = ExplorerConfig::from_path(file.path())?;
    assert_eq!(config.solver, SolverKind::Trivial);
    assert_eq!(config.timeout(), std::time::Duration::from_millis(250));
    Ok(())
}

#[test]
fn missing_file() {
    let result = ExplorerConfig::from_path("/nonexistent/symex.json");
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}
