use crate::method::{ExceptionHandler, Instruction, Method, MethodId, Result};
use crate::opcodes::{BinaryOp, Condition, InvokeKind, Literal, OpCode, Type};

/// Programmatic construction of a [Method]. Instruction offsets are assigned sequentially
/// starting at zero, so a branch target is the index of the instruction it refers to. The built
/// method goes through the same validation as [Method::load].
///
/// ```
/// # use jbc::builder::MethodBuilder;
/// # use jbc::opcodes::Condition;
/// let abs = MethodBuilder::parse("Demo.abs:(I)I")?
///     .load_int(0)
///     .ifz(Condition::Ge, 5)
///     .load_int(0)
///     .negate()
///     .return_int()
///     .load_int(0)
///     .return_int()
///     .build()?;
/// assert_eq!(abs.successors(1), vec![2, 5]);
/// # Ok::<(), jbc::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MethodBuilder {
    id: MethodId,
    is_static: bool,
    max_locals: Option<u16>,
    code: Vec<OpCode>,
    handlers: Vec<ExceptionHandler>,
}

impl MethodBuilder {
    pub fn new(id: MethodId) -> Self {
        Self {
            id,
            is_static: true,
            max_locals: None,
            code: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        Ok(Self::new(id.parse()?))
    }

    /// Build an instance method. Local slot `0` holds the receiver.
    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    pub fn max_locals(mut self, max_locals: u16) -> Self {
        self.max_locals = Some(max_locals);
        self
    }

    /// Offset that the next appended instruction will have.
    pub fn next_offset(&self) -> u32 {
        u32::try_from(self.code.len()).unwrap_or(u32::MAX)
    }

    pub fn op(mut self, op_code: OpCode) -> Self {
        self.code.push(op_code);
        self
    }

    pub fn push_int(self, value: i32) -> Self {
        self.op(OpCode::Push {
            value: Literal::Int(value),
        })
    }

    pub fn push_null(self) -> Self {
        self.op(OpCode::Push {
            value: Literal::Null,
        })
    }

    pub fn load_int(self, index: u16) -> Self {
        self.op(OpCode::Load { ty: Type::Int, index })
    }

    pub fn load_ref(self, index: u16, ty: Type) -> Self {
        self.op(OpCode::Load { ty, index })
    }

    pub fn store_int(self, index: u16) -> Self {
        self.op(OpCode::Store { ty: Type::Int, index })
    }

    pub fn store_ref(self, index: u16, ty: Type) -> Self {
        self.op(OpCode::Store { ty, index })
    }

    pub fn incr(self, index: u16, amount: i32) -> Self {
        self.op(OpCode::Incr { index, amount })
    }

    pub fn binary(self, op: BinaryOp) -> Self {
        self.op(OpCode::Binary { op })
    }

    pub fn negate(self) -> Self {
        self.op(OpCode::Negate)
    }

    pub fn dup(self) -> Self {
        self.op(OpCode::Dup)
    }

    pub fn pop(self) -> Self {
        self.op(OpCode::Pop)
    }

    pub fn if_cmp(self, condition: Condition, target: u32) -> Self {
        self.op(OpCode::If { condition, target })
    }

    pub fn ifz(self, condition: Condition, target: u32) -> Self {
        self.op(OpCode::Ifz { condition, target })
    }

    pub fn goto(self, target: u32) -> Self {
        self.op(OpCode::Goto { target })
    }

    pub fn new_object(self, class: &str) -> Self {
        self.op(OpCode::New {
            class: class.to_string(),
        })
    }

    pub fn new_array(self, element: Type) -> Self {
        self.op(OpCode::NewArray { ty: element })
    }

    pub fn array_length(self) -> Self {
        self.op(OpCode::ArrayLength)
    }

    pub fn array_load(self, element: Type) -> Self {
        self.op(OpCode::ArrayLoad { ty: element })
    }

    pub fn array_store(self, element: Type) -> Self {
        self.op(OpCode::ArrayStore { ty: element })
    }

    pub fn invoke(self, kind: InvokeKind, method: MethodId) -> Self {
        self.op(OpCode::Invoke { kind, method })
    }

    pub fn return_int(self) -> Self {
        self.op(OpCode::Return { ty: Some(Type::Int) })
    }

    pub fn return_ref(self, ty: Type) -> Self {
        self.op(OpCode::Return { ty: Some(ty) })
    }

    pub fn return_void(self) -> Self {
        self.op(OpCode::Return { ty: None })
    }

    pub fn throw(self) -> Self {
        self.op(OpCode::Throw)
    }

    /// Add an exception handler covering offsets `[start, end)`.
    pub fn handler(mut self, start: u32, end: u32, handler: u32, catch_type: Option<&str>) -> Self {
        self.handlers.push(ExceptionHandler {
            start,
            end,
            handler,
            catch_type: catch_type.map(str::to_string),
        });
        self
    }

    pub fn build(self) -> Result<Method> {
        let instructions = self
            .code
            .into_iter()
            .zip(0u32..)
            .map(|(op_code, offset)| Instruction { offset, op_code })
            .collect();

        Method::new(
            self.id,
            self.is_static,
            self.max_locals,
            instructions,
            self.handlers,
        )
    }
}
