use std::collections::BTreeSet;
use std::fmt;

use jbc::classes;
use jbc::Location;
use serde::Serialize;
use sym::{Value, Witness};

use crate::state::{PathCondition, PathState};

/// Why a path was cut off before it terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceReason {
    /// The instruction budget of the exploration was exhausted.
    StepBudget,

    /// The exploration created more paths than allowed.
    PathBudget,

    /// The path took more symbolic branches than allowed.
    DepthLimit,

    /// The wall-clock budget of the exploration was exhausted.
    Timeout,
}

impl fmt::Display for DivergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DivergenceReason::StepBudget => "step budget exhausted",
            DivergenceReason::PathBudget => "path budget exhausted",
            DivergenceReason::DepthLimit => "depth limit reached",
            DivergenceReason::Timeout => "timeout",
        };
        write!(f, "{reason}")
    }
}

/// How a path stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The analyzed method returned, with the value if it is not `void`.
    Return(Option<Value>),

    /// An exception of the given class escaped the analyzed method.
    Exception(String),

    Divergence(DivergenceReason),
}

/// A path that stopped, before classification.
#[derive(Debug, Clone)]
pub struct TerminalState {
    pub state: PathState,
    pub termination: Termination,

    /// Where the path stopped: the return or throwing instruction, or the next instruction of a
    /// divergent path.
    pub location: Option<Location>,
}

/// Classified result of one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Normal {
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },

    Thrown {
        class: String,
    },

    AssertionViolation {
        location: Location,
    },

    Divergent {
        reason: DivergenceReason,
    },
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Normal { .. } => OutcomeKind::Ok,
            Outcome::AssertionViolation { .. } => OutcomeKind::AssertionError,
            Outcome::Divergent { .. } => OutcomeKind::Divergent,
            Outcome::Thrown { class } => OutcomeKind::from_exception(class),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Normal { value: Some(value) } => write!(f, "return {value}"),
            Outcome::Normal { value: None } => write!(f, "return"),
            Outcome::Thrown { class } => write!(f, "throw {class}"),
            Outcome::AssertionViolation { location } => write!(f, "assertion violated at {location}"),
            Outcome::Divergent { reason } => write!(f, "divergent: {reason}"),
        }
    }
}

/// The reportable categories of outcomes, matching the benchmark vocabulary where one exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Ok,
    AssertionError,
    DivideByZero,
    OutOfBounds,
    NullPointer,
    NegativeArraySize,
    ClassCast,

    /// Any other uncaught exception.
    Exception(String),

    Divergent,

    /// The method could not be analyzed.
    AnalyzerError,
}

impl OutcomeKind {
    /// The benchmark outcome kinds, in the order predictions are printed.
    pub const JPAMB: [OutcomeKind; 6] = [
        OutcomeKind::Ok,
        OutcomeKind::DivideByZero,
        OutcomeKind::AssertionError,
        OutcomeKind::OutOfBounds,
        OutcomeKind::NullPointer,
        OutcomeKind::Divergent,
    ];

    pub fn from_exception(class: &str) -> Self {
        match class {
            classes::ARITHMETIC_EXCEPTION => OutcomeKind::DivideByZero,
            classes::ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION => OutcomeKind::OutOfBounds,
            classes::NULL_POINTER_EXCEPTION => OutcomeKind::NullPointer,
            classes::NEGATIVE_ARRAY_SIZE_EXCEPTION => OutcomeKind::NegativeArraySize,
            classes::CLASS_CAST_EXCEPTION => OutcomeKind::ClassCast,
            classes::ASSERTION_ERROR => OutcomeKind::AssertionError,
            other => OutcomeKind::Exception(other.to_string()),
        }
    }

    /// The benchmark label of this kind, e.g. `divide by zero`. Kinds the benchmark has no
    /// label for are rendered descriptively.
    pub fn label(&self) -> String {
        match self {
            OutcomeKind::Ok => "ok".to_string(),
            OutcomeKind::AssertionError => "assertion error".to_string(),
            OutcomeKind::DivideByZero => "divide by zero".to_string(),
            OutcomeKind::OutOfBounds => "out of bounds".to_string(),
            OutcomeKind::NullPointer => "null pointer".to_string(),
            OutcomeKind::NegativeArraySize => "negative array size".to_string(),
            OutcomeKind::ClassCast => "class cast".to_string(),
            OutcomeKind::Exception(class) => format!("exception {}", class.replace('/', ".")),
            OutcomeKind::Divergent => "*".to_string(),
            OutcomeKind::AnalyzerError => "analyzer error".to_string(),
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One reported path.
#[derive(Debug, Clone, Serialize)]
pub struct PathOutcome {
    pub outcome: Outcome,
    pub location: Option<Location>,
    pub condition: PathCondition,

    /// Inputs that drive execution down this path, when the solver produced them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,

    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub notes: BTreeSet<String>,
}

impl PathOutcome {
    pub fn kind(&self) -> OutcomeKind {
        self.outcome.kind()
    }
}

/// Map a terminal state to its outcome.
pub fn classify(terminal: TerminalState) -> PathOutcome {
    let TerminalState {
        state,
        termination,
        location,
    } = terminal;

    let outcome = match termination {
        Termination::Return(value) => Outcome::Normal { value },
        Termination::Exception(class) => match (&location, class.as_str()) {
            (Some(location), classes::ASSERTION_ERROR) => Outcome::AssertionViolation {
                location: location.clone(),
            },
            _ => Outcome::Thrown { class },
        },
        Termination::Divergence(reason) => Outcome::Divergent { reason },
    };

    PathOutcome {
        outcome,
        location,
        condition: state.condition,
        witness: None,
        notes: state.notes,
    }
}
