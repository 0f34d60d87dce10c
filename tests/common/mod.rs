#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use jbc::{ClassFile, Method, MethodId, Program};
use symex::analyzer::{Analyzer, Report, Verdict};
use symex::config::ExplorerConfig;

/// Route engine logs through the test harness so they only show for failing tests.
pub fn initialize_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Budgets small enough that divergent cases finish quickly.
pub fn config() -> ExplorerConfig {
    ExplorerConfig {
        max_depth: 16,
        max_steps: 10_000,
        ..Default::default()
    }
}

pub fn load_class(name: &str) -> ClassFile {
    let path = format!("{}/data/{name}.json", env!("CARGO_MANIFEST_DIR"));
    let bytes = std::fs::read(&path).unwrap_or_else(|err| panic!("failed to read {path}: {err}"));
    ClassFile::load(&bytes).unwrap_or_else(|err| panic!("failed to load {path}: {err}"))
}

pub fn analyzer(class: &str, config: ExplorerConfig) -> Analyzer {
    let class = load_class(class);
    assert!(class.failures.is_empty(), "{:?}", class.failures);
    Analyzer::new(config, Program::from(class))
}

pub fn method(analyzer: &Analyzer, id: &str) -> Arc<Method> {
    let id: MethodId = id.parse().expect("valid method id");
    analyzer
        .program()
        .get(&id)
        .cloned()
        .unwrap_or_else(|| panic!("method {id} is not in the program"))
}

pub fn report(analyzer: &Analyzer, id: &str) -> Report {
    analyzer
        .explore(&method(analyzer, id))
        .unwrap_or_else(|err| panic!("failed to explore {id}: {err}"))
}

pub fn verdict(class: &str, id: &str) -> Verdict {
    initialize_logger();
    let analyzer = analyzer(class, config());
    analyzer.analyze(&id.parse().expect("valid method id"))
}

/// Confidence per benchmark label, e.g. `"divide by zero" => 100`.
pub fn predictions(verdict: &Verdict) -> BTreeMap<String, u8> {
    verdict
        .predictions()
        .into_iter()
        .map(|(kind, confidence)| (kind.label(), confidence))
        .collect()
}
