use std::path::{Path, PathBuf};
use std::time::Duration;

use jbc::MethodId;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Order in which pending paths are explored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Depth-first. The first successor of a fork is explored first.
    #[default]
    Dfs,

    /// Breadth-first.
    Bfs,
}

/// Decision procedure used to check path conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Interval propagation with bounded witness search. Always available.
    #[default]
    Builtin,

    /// Bit-precise solving with z3. Only available when built with the `z3` feature.
    Z3,

    /// Constant folding only. Never prunes a path with a symbolic condition.
    Trivial,
}

/// How calls to other methods are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokePolicy {
    /// Replace the call by a fresh symbol of the return type.
    #[default]
    Summarize,

    /// Execute the callee in a new frame when it is available and the call depth allows it.
    /// Calls that cannot be inlined are summarized and the fallback is recorded on the path.
    Inline,
}

/// Options of one exploration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplorerConfig {
    pub strategy: Strategy,

    /// Maximum number of symbolic branch points along a single path. A path that forks more
    /// often than this is reported as divergent.
    pub max_depth: usize,

    /// Maximum number of paths created by forking.
    pub max_paths: usize,

    /// Maximum number of instructions executed across all paths.
    pub max_steps: u64,

    /// Wall-clock limit for exploring one method, in milliseconds.
    pub timeout_ms: u64,

    pub solver: SolverKind,

    /// Wall-clock limit for a single solver call, in milliseconds.
    pub solver_timeout_ms: u64,

    /// When false, path conditions are only constant folded and no path is pruned on a symbolic
    /// condition.
    pub use_solver: bool,

    pub invoke_policy: InvokePolicy,

    /// Maximum number of frames on a path when inlining.
    pub max_call_depth: usize,

    /// Assume that reference arguments are never `null`.
    pub non_null_arguments: bool,

    /// Static `(Z)V` methods treated as `if (!arg) throw new AssertionError()`.
    pub assertion_helpers: Vec<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Dfs,
            max_depth: 64,
            max_paths: 1000,
            max_steps: 100_000,
            timeout_ms: 5_000,
            solver: SolverKind::Builtin,
            solver_timeout_ms: 500,
            use_solver: true,
            invoke_policy: InvokePolicy::Summarize,
            max_call_depth: 8,
            non_null_arguments: false,
            assertion_helpers: vec!["jpamb.cases.Simple.assertBoolean:(Z)V".to_string()],
        }
    }
}

impl ExplorerConfig {
    /// Read a JSON config file. Missing fields take their default values.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_paths == 0 {
            return Err(ConfigError::Invalid("max_paths must be positive".to_string()));
        }

        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be positive".to_string()));
        }

        if self.timeout_ms == 0 || self.solver_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }

        if self.max_call_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_call_depth must be positive".to_string(),
            ));
        }

        for helper in &self.assertion_helpers {
            let id: MethodId = helper
                .parse()
                .map_err(|err| ConfigError::Invalid(format!("assertion helper: {err}")))?;
            if id.params.len() != 1 || id.returns.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "assertion helper {id} must take one argument and return void"
                )));
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn solver_timeout(&self) -> Duration {
        Duration::from_millis(self.solver_timeout_ms)
    }

    /// The parsed assertion helpers. Entries that do not parse are skipped; see [Self::validate].
    pub fn assertion_helper_ids(&self) -> Vec<MethodId> {
        self.assertion_helpers
            .iter()
            .filter_map(|helper| helper.parse().ok())
            .collect()
    }
}
