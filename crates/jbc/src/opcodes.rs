//! The opcode of an instruction determines its semantics. The [OpCode] enum is the closed set of
//! operations the engine understands; anything else is rejected when a method is loaded.
//!
//! Integral values narrower than `int` (`boolean`, `byte`, `char`, `short`) are carried on the
//! operand stack as `int`, so most opcodes only need to distinguish between `int` and reference
//! operands.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::method::MethodId;

/// Value types that may appear in descriptors and typed instructions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    /// 32-bit two's complement integer.
    Int,

    /// Boolean, stored as `int` `0` or `1`.
    Boolean,

    /// Signed 8-bit integer, stored as `int`.
    Byte,

    /// Unsigned 16-bit integer, stored as `int`.
    Char,

    /// Signed 16-bit integer, stored as `int`.
    Short,

    /// Reference to an instance of the named class. Class names use `/` as the package separator.
    Ref(String),

    /// Reference to an array with the given element type.
    Array(Box<Type>),
}

impl Type {
    /// The JVM descriptor for this type, e.g. `I` or `[Ljava/lang/String;`.
    pub fn descriptor(&self) -> String {
        match self {
            Type::Int => "I".to_string(),
            Type::Boolean => "Z".to_string(),
            Type::Byte => "B".to_string(),
            Type::Char => "C".to_string(),
            Type::Short => "S".to_string(),
            Type::Ref(class) => format!("L{class};"),
            Type::Array(element) => format!("[{}", element.descriptor()),
        }
    }

    /// Parse a single field descriptor from the front of `input`, returning the type and the
    /// unparsed remainder. `long`, `float` and `double` are not supported.
    pub fn parse_prefix(input: &str) -> Option<(Type, &str)> {
        let mut chars = input.chars();
        let ty = match chars.next()? {
            'I' => Type::Int,
            'Z' => Type::Boolean,
            'B' => Type::Byte,
            'C' => Type::Char,
            'S' => Type::Short,
            'L' => {
                let rest = chars.as_str();
                let end = rest.find(';')?;
                if end == 0 {
                    return None;
                }
                return Some((Type::Ref(rest[..end].to_string()), &rest[end + 1..]));
            }
            '[' => {
                let (element, rest) = Type::parse_prefix(chars.as_str())?;
                return Some((Type::Array(Box::new(element)), rest));
            }
            _ => return None,
        };
        Some((ty, chars.as_str()))
    }

    /// Returns true if values of this type are references (objects or arrays).
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Ref(_) | Type::Array(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Boolean => write!(f, "boolean"),
            Type::Byte => write!(f, "byte"),
            Type::Char => write!(f, "char"),
            Type::Short => write!(f, "short"),
            Type::Ref(class) => write!(f, "{class}"),
            Type::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// Constant operand of a [OpCode::Push].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Literal {
    Int(i32),
    Boolean(bool),
    Char(char),
    Null,
}

/// Integer operations with two operands.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOp {
    /// Wrapping addition: `x + y`.
    Add,

    /// Wrapping subtraction: `x - y`.
    Sub,

    /// Wrapping multiplication: `x * y`.
    Mul,

    /// Division truncating towards zero: `x / y`. Throws `ArithmeticException` if `y == 0`.
    Div,

    /// Remainder with the sign of the dividend: `x % y`. Throws `ArithmeticException` if
    /// `y == 0`.
    Rem,

    /// Bitwise and: `x & y`.
    And,

    /// Bitwise or: `x | y`.
    Or,

    /// Bitwise exclusive or: `x ^ y`.
    Xor,

    /// Left shift by the low five bits of `y`: `x << y`.
    Shl,

    /// Arithmetic right shift by the low five bits of `y`: `x >> y`.
    Shr,

    /// Logical right shift by the low five bits of `y`: `x >>> y`.
    Ushr,
}

impl BinaryOp {
    /// Returns true if the operation throws when the right operand is zero.
    pub fn traps_on_zero(&self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Rem)
    }
}

/// Branch conditions for [OpCode::If] and [OpCode::Ifz].
///
/// [Condition::Is] and [Condition::IsNot] compare references. For [OpCode::Ifz] they test the
/// operand against `null`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
    Is,
    IsNot,
}

/// How the target of an [OpCode::Invoke] is resolved.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokeKind {
    /// No receiver.
    Static,

    /// Receiver present, target resolved statically (constructors, private methods).
    Special,

    /// Receiver present, target resolved by the receiver's class.
    Virtual,
}

/// A field of a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct FieldRef {
    pub class: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.ty.descriptor())
    }
}

/// One arm of an [OpCode::Switch].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub key: i32,
    pub target: u32,
}

/// A bytecode operation. Branch targets are instruction offsets within the same method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opr", rename_all = "snake_case")]
pub enum OpCode {
    /// Push a constant.
    Push { value: Literal },

    /// Push the value of a local slot.
    Load {
        #[serde(rename = "type")]
        ty: Type,
        index: u16,
    },

    /// Pop a value into a local slot.
    Store {
        #[serde(rename = "type")]
        ty: Type,
        index: u16,
    },

    /// Add a constant to an `int` local slot in place.
    Incr { index: u16, amount: i32 },

    /// Pop two `int` operands and push the result of the operation.
    Binary { op: BinaryOp },

    /// Pop an `int` and push its wrapping negation.
    Negate,

    /// Pop an `int` and push it narrowed to the given integral type.
    Cast { to: Type },

    /// Duplicate the top of the stack.
    Dup,

    /// Discard the top of the stack.
    Pop,

    /// Swap the two topmost values.
    Swap,

    /// Pop two operands and branch if `lhs <condition> rhs`.
    If { condition: Condition, target: u32 },

    /// Pop one operand and branch if `value <condition> 0` (or `null`).
    Ifz { condition: Condition, target: u32 },

    /// Unconditional jump.
    Goto { target: u32 },

    /// Pop an `int` and jump to the target of the matching case, or to `default`.
    Switch { default: u32, cases: Vec<SwitchCase> },

    /// Read a field. Instance reads pop the receiver.
    Get {
        #[serde(rename = "static")]
        is_static: bool,
        field: FieldRef,
    },

    /// Write a field. Instance writes pop the value and then the receiver.
    Put {
        #[serde(rename = "static")]
        is_static: bool,
        field: FieldRef,
    },

    /// Allocate an instance of the class and push its reference.
    New { class: String },

    /// Pop a length and push a new zero-filled array.
    NewArray {
        #[serde(rename = "type")]
        ty: Type,
    },

    /// Pop an array reference and push its length.
    ArrayLength,

    /// Pop an index and an array reference and push the element.
    ArrayLoad {
        #[serde(rename = "type")]
        ty: Type,
    },

    /// Pop a value, an index and an array reference and store the element.
    ArrayStore {
        #[serde(rename = "type")]
        ty: Type,
    },

    /// Call a method. Arguments are popped in reverse, followed by the receiver if any.
    Invoke { kind: InvokeKind, method: MethodId },

    /// Return from the method, popping the return value if typed.
    Return {
        #[serde(rename = "type", default)]
        ty: Option<Type>,
    },

    /// Pop a reference and throw it.
    Throw,

    /// Check that the reference on top of the stack is assignable to the type.
    CheckCast {
        #[serde(rename = "type")]
        ty: Type,
    },

    /// Do nothing.
    Nop,
}

impl OpCode {
    /// Every value accepted in the `opr` field of a serialized instruction.
    pub const MNEMONICS: &'static [&'static str] = &[
        "push",
        "load",
        "store",
        "incr",
        "binary",
        "negate",
        "cast",
        "dup",
        "pop",
        "swap",
        "if",
        "ifz",
        "goto",
        "switch",
        "get",
        "put",
        "new",
        "new_array",
        "array_length",
        "array_load",
        "array_store",
        "invoke",
        "return",
        "throw",
        "check_cast",
        "nop",
    ];

    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpCode::Push { .. } => "push",
            OpCode::Load { .. } => "load",
            OpCode::Store { .. } => "store",
            OpCode::Incr { .. } => "incr",
            OpCode::Binary { .. } => "binary",
            OpCode::Negate => "negate",
            OpCode::Cast { .. } => "cast",
            OpCode::Dup => "dup",
            OpCode::Pop => "pop",
            OpCode::Swap => "swap",
            OpCode::If { .. } => "if",
            OpCode::Ifz { .. } => "ifz",
            OpCode::Goto { .. } => "goto",
            OpCode::Switch { .. } => "switch",
            OpCode::Get { .. } => "get",
            OpCode::Put { .. } => "put",
            OpCode::New { .. } => "new",
            OpCode::NewArray { .. } => "new_array",
            OpCode::ArrayLength => "array_length",
            OpCode::ArrayLoad { .. } => "array_load",
            OpCode::ArrayStore { .. } => "array_store",
            OpCode::Invoke { .. } => "invoke",
            OpCode::Return { .. } => "return",
            OpCode::Throw => "throw",
            OpCode::CheckCast { .. } => "check_cast",
            OpCode::Nop => "nop",
        }
    }

    /// The number of operands popped and pushed by this instruction, in that order.
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            OpCode::Push { .. } | OpCode::Load { .. } | OpCode::New { .. } => (0, 1),
            OpCode::Store { .. } | OpCode::Pop | OpCode::Ifz { .. } | OpCode::Throw => (1, 0),
            OpCode::Switch { .. } => (1, 0),
            OpCode::Incr { .. } | OpCode::Goto { .. } | OpCode::Nop => (0, 0),
            OpCode::Binary { .. } => (2, 1),
            OpCode::Negate | OpCode::Cast { .. } | OpCode::CheckCast { .. } => (1, 1),
            OpCode::NewArray { .. } | OpCode::ArrayLength => (1, 1),
            OpCode::Dup => (1, 2),
            OpCode::Swap => (2, 2),
            OpCode::If { .. } => (2, 0),
            OpCode::Get { is_static, .. } => (usize::from(!is_static), 1),
            OpCode::Put { is_static, .. } => (1 + usize::from(!is_static), 0),
            OpCode::ArrayLoad { .. } => (2, 1),
            OpCode::ArrayStore { .. } => (3, 0),
            OpCode::Invoke { kind, method } => {
                let receiver = usize::from(*kind != InvokeKind::Static);
                (
                    method.params.len() + receiver,
                    usize::from(method.returns.is_some()),
                )
            }
            OpCode::Return { ty } => (usize::from(ty.is_some()), 0),
        }
    }

    /// Explicit branch targets in the order they are listed by the instruction.
    pub fn branch_targets(&self) -> Vec<u32> {
        match self {
            OpCode::If { target, .. } | OpCode::Ifz { target, .. } | OpCode::Goto { target } => {
                vec![*target]
            }
            OpCode::Switch { default, cases } => cases
                .iter()
                .map(|case| case.target)
                .chain(std::iter::once(*default))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns true if execution may continue with the next instruction in sequence.
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            OpCode::Goto { .. } | OpCode::Switch { .. } | OpCode::Return { .. } | OpCode::Throw
        )
    }

    /// The local slot accessed by this instruction, if any.
    pub fn local_index(&self) -> Option<u16> {
        match self {
            OpCode::Load { index, .. } | OpCode::Store { index, .. } | OpCode::Incr { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        match self {
            OpCode::Push { value } => match value {
                Literal::Int(v) => write!(f, " {v}"),
                Literal::Boolean(v) => write!(f, " {v}"),
                Literal::Char(v) => write!(f, " {v:?}"),
                Literal::Null => write!(f, " null"),
            },
            OpCode::Load { ty, index } | OpCode::Store { ty, index } => write!(f, " {ty} {index}"),
            OpCode::Incr { index, amount } => write!(f, " {index} {amount}"),
            OpCode::Binary { op } => write!(f, " {op:?}"),
            OpCode::Cast { to } => write!(f, " {to}"),
            OpCode::If { condition, target } | OpCode::Ifz { condition, target } => {
                write!(f, " {condition:?} {target}")
            }
            OpCode::Goto { target } => write!(f, " {target}"),
            OpCode::Switch { default, cases } => {
                for case in cases {
                    write!(f, " {}:{}", case.key, case.target)?;
                }
                write!(f, " default:{default}")
            }
            OpCode::Get { field, .. } | OpCode::Put { field, .. } => write!(f, " {field}"),
            OpCode::New { class } => write!(f, " {class}"),
            OpCode::NewArray { ty } | OpCode::ArrayLoad { ty } | OpCode::ArrayStore { ty } => {
                write!(f, " {ty}")
            }
            OpCode::CheckCast { ty } => write!(f, " {ty}"),
            OpCode::Invoke { kind, method } => write!(f, " {kind:?} {method}"),
            OpCode::Return { ty: Some(ty) } => write!(f, " {ty}"),
            _ => Ok(()),
        }
    }
}
