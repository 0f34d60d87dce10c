//! Analyzer front end following the jpamb invocation convention. `symex info` prints the
//! analyzer metadata and `symex <METHOD-ID>` prints one `outcome;confidence%` line per outcome.
//!
//! Methods are loaded from `<class-path>/<package>/<Class>.json`. Diagnostics go to stderr so
//! that stdout only carries predictions.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use jbc::{ClassFile, MethodId, Program};
use symex::analyzer::{Analyzer, Verdict};
use symex::config::{ConfigError, ExplorerConfig, InvokePolicy, Strategy};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid method identifier: {0}")]
    MethodId(#[source] jbc::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to load {}: {source}", .path.display())]
    Load { path: PathBuf, source: jbc::Error },

    #[error("failed to encode verdict: {0}")]
    Json(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// One `outcome;confidence%` line per outcome kind
    Jpamb,

    /// The full verdict as JSON
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Dfs,
    Bfs,
}

impl From<StrategyArg> for Strategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Dfs => Strategy::Dfs,
            StrategyArg::Bfs => Strategy::Bfs,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "symex", version)]
#[command(about = "Symbolic execution analyzer for jpamb methods", long_about = None)]
struct Cli {
    /// Method to analyze, e.g. `jpamb.cases.Simple.divideByN:(I)I`, or `info`
    #[arg(value_name = "METHOD-ID")]
    target: String,

    /// Directory holding one JSON description per class
    #[arg(long, value_name = "DIR", default_value = "decompiled")]
    class_path: PathBuf,

    /// Explorer configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Jpamb)]
    format: Format,

    /// Maximum number of symbolic branch points along one path
    #[arg(long)]
    max_depth: Option<usize>,

    /// Maximum number of instructions executed across all paths
    #[arg(long)]
    max_steps: Option<u64>,

    /// Maximum number of paths
    #[arg(long)]
    max_paths: Option<usize>,

    /// Wall-clock limit for the whole method in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Execute callees found in the same class instead of summarizing them
    #[arg(long)]
    inline: bool,

    /// Show debug output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// The configuration file, if any, with the command line overrides applied.
    fn explorer_config(&self) -> Result<ExplorerConfig> {
        let mut config = match &self.config {
            Some(path) => ExplorerConfig::from_path(path)?,
            None => ExplorerConfig::default(),
        };

        if let Some(max_depth) = self.max_depth {
            config.max_depth = max_depth;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
        if let Some(max_paths) = self.max_paths {
            config.max_paths = max_paths;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
        if self.inline {
            config.invoke_policy = InvokePolicy::Inline;
        }

        config.validate()?;
        Ok(config)
    }
}

fn info_lines() -> [&'static str; 5] {
    [
        "symex",
        env!("CARGO_PKG_VERSION"),
        "symex",
        "symbolic,rust",
        "no",
    ]
}

fn class_file_path(class_path: &Path, id: &MethodId) -> PathBuf {
    class_path.join(format!("{}.json", id.class))
}

fn load_class(path: &Path) -> Result<ClassFile> {
    let bytes = std::fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ClassFile::load(&bytes).map_err(|source| CliError::Load {
        path: path.to_path_buf(),
        source,
    })
}

/// Analyze `id` within its class. A method of the class that failed to load yields an error
/// verdict instead of a missing method.
fn analyze_in_class(config: ExplorerConfig, class: ClassFile, id: &MethodId) -> Verdict {
    let failure = class
        .failures
        .iter()
        .find(|(key, _)| key.parse::<MethodId>().is_ok_and(|key| &key == id));
    if let Some((_, err)) = failure {
        warn!(method = %id, %err, "method failed to load");
        return Verdict::from_error(id.to_string(), err);
    }

    debug!(class = %class.name, methods = class.methods.len(), "class loaded");
    Analyzer::new(config, Program::from(class)).analyze(id)
}

fn analyze(cli: &Cli) -> Result<Verdict> {
    let config = cli.explorer_config()?;
    let id: MethodId = cli.target.parse().map_err(CliError::MethodId)?;

    let path = class_file_path(&cli.class_path, &id);
    let verdict = match load_class(&path) {
        Ok(class) => analyze_in_class(config, class, &id),
        Err(err) => {
            warn!(%err, "class could not be loaded");
            Verdict::from_error(id.to_string(), &err)
        }
    };
    Ok(verdict)
}

fn render(verdict: &Verdict, format: Format) -> Result<String> {
    match format {
        Format::Jpamb => Ok(verdict.jpamb_lines().join("\n")),
        Format::Json => Ok(serde_json::to_string_pretty(verdict)?),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    if cli.target == "info" {
        for line in info_lines() {
            println!("{line}");
        }
        return ExitCode::SUCCESS;
    }

    match analyze(&cli).and_then(|verdict| render(&verdict, cli.format)) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "analysis failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests;
