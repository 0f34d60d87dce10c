use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::opcodes::{OpCode, Type};
use crate::verify;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The method violates a structural invariant described by the kind.
    #[error("malformed bytecode in {method}: {kind}")]
    MalformedBytecode { method: String, kind: MalformedKind },

    /// The instruction is outside of the supported instruction set.
    #[error("unsupported instruction {opr:?} at offset {offset}")]
    UnsupportedInstruction { opr: String, offset: u32 },

    /// A method identifier or type descriptor could not be parsed.
    #[error("invalid descriptor {0:?}")]
    InvalidDescriptor(String),

    /// The serialized method could not be decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Structural problems detected while loading a method.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedKind {
    #[error("method has no instructions")]
    Empty,

    #[error("instruction offset {offset} does not follow the previous instruction")]
    NonMonotonicOffset { offset: u32 },

    #[error("branch target {target} of instruction {offset} is out of range")]
    TargetOutOfRange { offset: u32, target: u32 },

    #[error("branch target {target} of instruction {offset} is not an instruction boundary")]
    TargetNotOnBoundary { offset: u32, target: u32 },

    #[error("exception handler [{start}, {end}) -> {handler} references a nonexistent offset")]
    InvalidHandler { start: u32, end: u32, handler: u32 },

    #[error("local slot {index} used at offset {offset} exceeds max_locals {max_locals}")]
    LocalOutOfRange {
        offset: u32,
        index: u16,
        max_locals: u16,
    },

    #[error("arguments need {required} local slots but max_locals is {max_locals}")]
    TooFewLocals { required: u16, max_locals: u16 },

    #[error("stack underflow at offset {offset}")]
    StackUnderflow { offset: u32 },

    #[error("stack depth mismatch at offset {offset}: expected {expected} but found {actual}")]
    StackDepthMismatch {
        offset: u32,
        expected: usize,
        actual: usize,
    },

    #[error("execution falls off the end of the method after offset {offset}")]
    FallsOffEnd { offset: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Identifies a method by its class, name and descriptor. The textual form is
/// `pkg.Class.name:(params)ret`, e.g. `jpamb.cases.Simple.divideByN:(I)I`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodId {
    /// Class name using `/` as the package separator.
    pub class: String,
    pub name: String,
    pub params: Vec<Type>,

    /// Return type or `None` for `void`.
    pub returns: Option<Type>,
}

impl MethodId {
    /// Number of local slots occupied by the arguments, including the receiver if present.
    pub fn argument_slots(&self, is_static: bool) -> u16 {
        let receiver = u16::from(!is_static);
        u16::try_from(self.params.len())
            .unwrap_or(u16::MAX)
            .saturating_add(receiver)
    }

    /// The class name with `.` as the package separator.
    pub fn dotted_class(&self) -> String {
        self.class.replace('/', ".")
    }

    pub fn descriptor(&self) -> String {
        let params: String = self.params.iter().map(Type::descriptor).collect();
        let returns = self
            .returns
            .as_ref()
            .map(Type::descriptor)
            .unwrap_or_else(|| "V".to_string());
        format!("({params}){returns}")
    }
}

impl FromStr for MethodId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidDescriptor(s.to_string());
        let (qualified, descriptor) = s.split_once(':').ok_or_else(invalid)?;
        let (class, name) = qualified.rsplit_once('.').ok_or_else(invalid)?;
        if class.is_empty() || name.is_empty() {
            return Err(invalid());
        }

        let descriptor = descriptor.strip_prefix('(').ok_or_else(invalid)?;
        let (mut params_str, returns_str) = descriptor.split_once(')').ok_or_else(invalid)?;
        let mut params = Vec::new();
        while !params_str.is_empty() {
            let (ty, rest) = Type::parse_prefix(params_str).ok_or_else(invalid)?;
            params.push(ty);
            params_str = rest;
        }

        let returns = if returns_str == "V" {
            None
        } else {
            match Type::parse_prefix(returns_str) {
                Some((ty, "")) => Some(ty),
                _ => return Err(invalid()),
            }
        };

        Ok(MethodId {
            class: class.replace('.', "/"),
            name: name.to_string(),
            params,
            returns,
        })
    }
}

impl TryFrom<String> for MethodId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MethodId> for String {
    fn from(value: MethodId) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            self.dotted_class(),
            self.name,
            self.descriptor()
        )
    }
}

/// A position within a specific method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Location {
    pub method: MethodId,
    pub offset: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.method, self.offset)
    }
}

/// An instruction and its offset within the method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub offset: u32,

    #[serde(flatten)]
    pub op_code: OpCode,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4}: {}", self.offset, self.op_code)
    }
}

/// Entry of the exception handler table. Covers offsets in `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub start: u32,
    pub end: u32,
    pub handler: u32,

    /// The caught class. `None` catches everything.
    #[serde(default)]
    pub catch_type: Option<String>,
}

impl ExceptionHandler {
    pub fn covers(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// A loaded, validated method. Read-only for the duration of an analysis.
#[derive(Debug, Clone)]
pub struct Method {
    id: MethodId,
    is_static: bool,
    max_locals: u16,
    max_stack: usize,
    instructions: Vec<Instruction>,
    handlers: Vec<ExceptionHandler>,
    index_by_offset: BTreeMap<u32, usize>,
}

/// Serialized form of a method.
#[derive(Deserialize)]
struct MethodDescription {
    id: MethodId,

    #[serde(rename = "static", default = "default_static")]
    is_static: bool,

    #[serde(default)]
    max_locals: Option<u16>,

    code: Vec<serde_json::Value>,

    #[serde(default)]
    handlers: Vec<ExceptionHandler>,
}

fn default_static() -> bool {
    true
}

impl Method {
    /// Construct a method and validate its structure. If `max_locals` is `None` it is derived
    /// from the arguments and the local slots referenced by the instructions.
    pub fn new(
        id: MethodId,
        is_static: bool,
        max_locals: Option<u16>,
        instructions: Vec<Instruction>,
        handlers: Vec<ExceptionHandler>,
    ) -> Result<Self> {
        let required = id.argument_slots(is_static);
        let max_locals = max_locals.unwrap_or_else(|| {
            instructions
                .iter()
                .filter_map(|instr| instr.op_code.local_index())
                .map(|index| index.saturating_add(1))
                .fold(required, u16::max)
        });

        let mut method = Method {
            id,
            is_static,
            max_locals,
            max_stack: 0,
            instructions,
            handlers,
            index_by_offset: BTreeMap::new(),
        };

        method.index()?;
        method.check_locals()?;
        method.check_targets()?;
        method.check_handlers()?;
        method.max_stack = verify::max_stack(&method).map_err(|kind| method.malformed(kind))?;

        Ok(method)
    }

    /// Load a method from its JSON description.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub(crate) fn from_value(value: serde_json::Value) -> Result<Self> {
        let description: MethodDescription = serde_json::from_value(value)?;
        let instructions = description
            .code
            .into_iter()
            .map(decode_instruction)
            .collect::<Result<Vec<_>>>()?;

        Self::new(
            description.id,
            description.is_static,
            description.max_locals,
            instructions,
            description.handlers,
        )
    }

    fn malformed(&self, kind: MalformedKind) -> Error {
        Error::MalformedBytecode {
            method: self.id.to_string(),
            kind,
        }
    }

    fn index(&mut self) -> Result<()> {
        if self.instructions.is_empty() {
            return Err(self.malformed(MalformedKind::Empty));
        }

        let mut previous = None;
        for (index, instr) in self.instructions.iter().enumerate() {
            if previous.is_some_and(|prev| instr.offset <= prev) {
                let kind = MalformedKind::NonMonotonicOffset {
                    offset: instr.offset,
                };
                return Err(self.malformed(kind));
            }
            previous = Some(instr.offset);
            self.index_by_offset.insert(instr.offset, index);
        }

        Ok(())
    }

    fn check_locals(&self) -> Result<()> {
        let required = self.id.argument_slots(self.is_static);
        if required > self.max_locals {
            return Err(self.malformed(MalformedKind::TooFewLocals {
                required,
                max_locals: self.max_locals,
            }));
        }

        for instr in &self.instructions {
            if let Some(index) = instr.op_code.local_index() {
                if index >= self.max_locals {
                    return Err(self.malformed(MalformedKind::LocalOutOfRange {
                        offset: instr.offset,
                        index,
                        max_locals: self.max_locals,
                    }));
                }
            }
        }

        Ok(())
    }

    fn check_targets(&self) -> Result<()> {
        let last = self.last_offset();
        for instr in &self.instructions {
            for target in instr.op_code.branch_targets() {
                if target > last {
                    return Err(self.malformed(MalformedKind::TargetOutOfRange {
                        offset: instr.offset,
                        target,
                    }));
                }

                if !self.is_boundary(target) {
                    return Err(self.malformed(MalformedKind::TargetNotOnBoundary {
                        offset: instr.offset,
                        target,
                    }));
                }
            }
        }

        Ok(())
    }

    fn check_handlers(&self) -> Result<()> {
        let end_of_code = self.last_offset().saturating_add(1);
        for handler in &self.handlers {
            let valid = self.is_boundary(handler.start)
                && handler.start < handler.end
                && (self.is_boundary(handler.end) || handler.end == end_of_code)
                && self.is_boundary(handler.handler);

            if !valid {
                return Err(self.malformed(MalformedKind::InvalidHandler {
                    start: handler.start,
                    end: handler.end,
                    handler: handler.handler,
                }));
            }
        }

        Ok(())
    }

    fn last_offset(&self) -> u32 {
        self.instructions.last().map_or(0, |instr| instr.offset)
    }

    fn is_boundary(&self, offset: u32) -> bool {
        self.index_by_offset.contains_key(&offset)
    }

    pub fn id(&self) -> &MethodId {
        &self.id
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    /// Maximum operand stack depth reached at any instruction.
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn handlers(&self) -> &[ExceptionHandler] {
        &self.handlers
    }

    /// Offset of the first instruction.
    pub fn entry(&self) -> u32 {
        self.instructions.first().map_or(0, |instr| instr.offset)
    }

    pub fn instruction_at(&self, offset: u32) -> Option<&Instruction> {
        self.index_by_offset
            .get(&offset)
            .map(|&index| &self.instructions[index])
    }

    pub(crate) fn index_of(&self, offset: u32) -> Option<usize> {
        self.index_by_offset.get(&offset).copied()
    }

    /// Offset of the instruction following the one at `offset`, if any.
    pub fn next_offset(&self, offset: u32) -> Option<u32> {
        let index = self.index_of(offset)?;
        self.instructions.get(index + 1).map(|instr| instr.offset)
    }

    /// Handlers whose range covers `offset`, in table order.
    pub fn handlers_covering(&self, offset: u32) -> impl Iterator<Item = &ExceptionHandler> {
        self.handlers
            .iter()
            .filter(move |handler| handler.covers(offset))
    }

    /// Control-flow successors of the instruction at `offset`: the fallthrough, then the branch
    /// targets, then every handler covering the offset. Duplicates are removed keeping the first
    /// occurrence.
    pub fn successors(&self, offset: u32) -> Vec<u32> {
        let Some(instr) = self.instruction_at(offset) else {
            return Vec::new();
        };

        let mut successors = Vec::new();
        let mut push = |target: u32| {
            if !successors.contains(&target) {
                successors.push(target);
            }
        };

        if instr.op_code.falls_through() {
            if let Some(next) = self.next_offset(offset) {
                push(next);
            }
        }

        for target in instr.op_code.branch_targets() {
            push(target);
        }

        for handler in self.handlers_covering(offset) {
            push(handler.handler);
        }

        successors
    }
}

fn decode_instruction(value: serde_json::Value) -> Result<Instruction> {
    let opr = value.get("opr").and_then(serde_json::Value::as_str);
    if let Some(opr) = opr {
        if !OpCode::MNEMONICS.contains(&opr) {
            let offset = value
                .get("offset")
                .and_then(serde_json::Value::as_u64)
                .and_then(|offset| u32::try_from(offset).ok())
                .unwrap_or_default();
            return Err(Error::UnsupportedInstruction {
                opr: opr.to_string(),
                offset,
            });
        }
    }

    Ok(serde_json::from_value(value)?)
}

/// A group of methods belonging to one class.
///
/// Methods that fail to load do not prevent the rest of the class from loading; their errors are
/// kept in `failures`, keyed by the method identifier as written in the description.
#[derive(Debug)]
pub struct ClassFile {
    pub name: String,
    pub methods: Vec<Method>,
    pub failures: BTreeMap<String, Error>,
}

#[derive(Deserialize)]
struct ClassDescription {
    name: String,
    methods: Vec<serde_json::Value>,
}

impl ClassFile {
    /// Load a class from its JSON description: `{"name": ..., "methods": [...]}`.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let description: ClassDescription = serde_json::from_slice(bytes)?;
        let mut methods = Vec::new();
        let mut failures = BTreeMap::new();
        for (index, value) in description.methods.into_iter().enumerate() {
            let key = value
                .get("id")
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| format!("#{index}"), str::to_string);
            match Method::from_value(value) {
                Ok(method) => methods.push(method),
                Err(err) => {
                    failures.insert(key, err);
                }
            }
        }

        Ok(ClassFile {
            name: description.name.replace('.', "/"),
            methods,
            failures,
        })
    }
}
