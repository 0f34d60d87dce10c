//! Symbolic semantics of individual instructions.
//!
//! [Emulator::step] executes the instruction at the program counter of the innermost frame and
//! returns every successor in a fixed order: for conditional branches the taken successor comes
//! first, and for checks that may fail at runtime (division, null dereference, array bounds) the
//! exceptional successor comes first. Concretely decided conditions never fork.
use std::sync::Arc;

use jbc::{
    classes, BinaryOp, Condition, FieldRef, InvokeKind, Literal, Location, Method, MethodId,
    OpCode, Program, Type,
};
use serde::Serialize;
use sym::{ops, ArithmeticError, CmpOp, HeapRef, IntOp, Narrowing, Sort, SymbolAllocator, UnaryOp, Value};
use tracing::{debug, trace};

use crate::config::{ExplorerConfig, InvokePolicy};
use crate::outcome::{TerminalState, Termination};
use crate::state::{self, ArrayContents, Frame, HeapObject, PathState};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The path state is inconsistent with the instruction being executed.
    #[error(transparent)]
    State(#[from] state::Error),

    /// An operand does not have the kind of value the instruction requires.
    #[error("type mismatch at {location}: {message}")]
    TypeMismatch { location: Location, message: String },

    /// The instruction is valid but uses a feature the engine does not model.
    #[error("unsupported operation at {location}: {message}")]
    Unsupported { location: Location, message: String },

    /// An internal error occurred. This is a fatal error that cannot be safely handled.
    #[error("internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A state produced by one step.
#[derive(Debug)]
pub enum Successor {
    /// The path continues.
    Continue(PathState),

    /// The path stopped.
    Terminal(TerminalState),
}

pub trait Emulator {
    /// Execute the instruction at the program counter of the innermost frame of `state`.
    fn step(&self, state: PathState) -> Result<Vec<Successor>>;
}

/// An input of the analyzed method and the value standing for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Input {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: Type,

    pub value: Value,
}

/// The emulator for the [OpCode] instruction set.
pub struct StandardEmulator<'a> {
    program: &'a Program,
    symbols: &'a SymbolAllocator,
    config: &'a ExplorerConfig,
    assertion_helpers: Vec<MethodId>,
}

fn sort_of(ty: &Type) -> Sort {
    if ty.is_reference() {
        Sort::Ref
    } else {
        Sort::Int
    }
}

/// Constraints that hold for every value of the given type.
fn type_constraints(value: &Value, ty: &Type) -> Vec<Value> {
    let (lo, hi) = match ty {
        Type::Boolean => (0, 1),
        Type::Byte => Narrowing::Byte.range(),
        Type::Char => Narrowing::Char.range(),
        Type::Short => Narrowing::Short.range(),
        Type::Int | Type::Ref(_) | Type::Array(_) => return Vec::new(),
    };
    vec![
        ops::compare(CmpOp::Ge, value, &Value::Int(lo)),
        ops::compare(CmpOp::Le, value, &Value::Int(hi)),
    ]
}

fn default_value(ty: &Type) -> Value {
    if ty.is_reference() {
        Value::Null
    } else {
        Value::Int(0)
    }
}

fn int_op(op: BinaryOp) -> IntOp {
    match op {
        BinaryOp::Add => IntOp::Add,
        BinaryOp::Sub => IntOp::Sub,
        BinaryOp::Mul => IntOp::Mul,
        BinaryOp::Div => IntOp::Div,
        BinaryOp::Rem => IntOp::Rem,
        BinaryOp::And => IntOp::And,
        BinaryOp::Or => IntOp::Or,
        BinaryOp::Xor => IntOp::Xor,
        BinaryOp::Shl => IntOp::Shl,
        BinaryOp::Shr => IntOp::Shr,
        BinaryOp::Ushr => IntOp::Ushr,
    }
}

fn cmp_op(condition: Condition) -> CmpOp {
    match condition {
        Condition::Eq | Condition::Is => CmpOp::Eq,
        Condition::Ne | Condition::IsNot => CmpOp::Ne,
        Condition::Lt => CmpOp::Lt,
        Condition::Ge => CmpOp::Ge,
        Condition::Gt => CmpOp::Gt,
        Condition::Le => CmpOp::Le,
    }
}

/// Split `state` into the part where `holds` is true and the part where `fails` is true, which
/// must be the negation of `holds`. A side that is concretely impossible is omitted, and the
/// depth only grows when both sides remain.
fn branch(
    state: PathState,
    holds: Value,
    fails: Value,
) -> (Option<PathState>, Option<PathState>) {
    match holds {
        Value::Bool(true) => (Some(state), None),
        Value::Bool(false) => (None, Some(state)),
        _ => {
            let mut taken = state.clone();
            let mut other = state;
            taken.assume(holds);
            other.assume(fails);
            taken.depth += 1;
            other.depth += 1;
            (Some(taken), Some(other))
        }
    }
}

fn split(state: PathState, condition: Value) -> (Option<PathState>, Option<PathState>) {
    let negation = ops::not(&condition);
    branch(state, condition, negation)
}

/// Set the program counter of the innermost frame to the next instruction.
fn advance(state: &mut PathState) -> Result<()> {
    let frame = state.frame_mut()?;
    let next = frame.method().next_offset(frame.pc()).ok_or_else(|| {
        Error::InternalError(format!("no instruction follows {}", frame.location()))
    })?;
    frame.set_pc(next);
    Ok(())
}

/// Apply `f` to the innermost frame and continue with the next instruction.
fn simple(
    mut state: PathState,
    f: impl FnOnce(&mut Frame) -> Result<()>,
) -> Result<Vec<Successor>> {
    f(state.frame_mut()?)?;
    advance(&mut state)?;
    Ok(vec![Successor::Continue(state)])
}

fn jump(state: &mut PathState, target: u32) -> Result<()> {
    state.frame_mut()?.set_pc(target);
    Ok(())
}

fn push(state: &mut PathState, value: Value) -> Result<()> {
    state.frame_mut()?.push(value);
    Ok(())
}

fn pop(state: &mut PathState) -> Result<Value> {
    Ok(state.frame_mut()?.pop()?)
}

fn arithmetic(location: &Location, err: ArithmeticError) -> Error {
    Error::TypeMismatch {
        location: location.clone(),
        message: err.to_string(),
    }
}

impl<'a> StandardEmulator<'a> {
    pub fn new(program: &'a Program, symbols: &'a SymbolAllocator, config: &'a ExplorerConfig) -> Self {
        Self {
            program,
            symbols,
            config,
            assertion_helpers: config.assertion_helper_ids(),
        }
    }

    /// The state at the entry of `method`, with a fresh symbol for every argument. Reference
    /// arguments are resolved lazily on first use unless the configuration assumes they are
    /// non-null. The receiver of an instance method is always a non-null object.
    pub fn initial_state(&self, method: Arc<Method>) -> Result<(PathState, Vec<Input>)> {
        let id = method.id().clone();
        let mut state = PathState::new(Frame::new(Arc::clone(&method)));
        let mut inputs = Vec::new();
        let mut slot = 0u16;

        if !method.is_static() {
            let receiver = state.heap.allocate(HeapObject::Object {
                class: id.class.clone(),
                fields: Default::default(),
                lazy: true,
            });
            state.frame_mut()?.store(slot, Value::Ref(receiver))?;
            inputs.push(Input {
                name: "this".to_string(),
                ty: Type::Ref(id.class.clone()),
                value: Value::Ref(receiver),
            });
            slot += 1;
        }

        for (index, ty) in id.params.iter().enumerate() {
            let value = self.fresh(&mut state, ty);
            if self.config.non_null_arguments && ty.is_reference() {
                if let Some(symbol) = value.as_symbol() {
                    let object = self.materialize(&mut state, ty);
                    state.assume(ops::compare(CmpOp::Ne, &value, &Value::Null));
                    state.heap.bind(symbol, Value::Ref(object));
                }
            }
            state.frame_mut()?.store(slot, value.clone())?;
            inputs.push(Input {
                name: format!("arg{index}"),
                ty: ty.clone(),
                value,
            });
            slot += 1;
        }

        debug!(method = %id, inputs = inputs.len(), "initial state");
        Ok((state, inputs))
    }

    /// A fresh symbol for a value of type `ty`, constrained to the range of the type.
    fn fresh(&self, state: &mut PathState, ty: &Type) -> Value {
        let value = self.symbols.fresh(sort_of(ty));
        if ty.is_reference() {
            if let Some(id) = value.as_symbol() {
                state.heap.declare(id, ty.clone());
            }
        }
        for constraint in type_constraints(&value, ty) {
            state.assume(constraint);
        }
        value
    }

    /// Allocate an object standing for an unknown non-null reference of type `ty`.
    fn materialize(&self, state: &mut PathState, ty: &Type) -> HeapRef {
        match ty {
            Type::Array(element) => {
                let length = self.symbols.fresh(Sort::Int);
                state.assume(ops::compare(CmpOp::Ge, &length, &Value::Int(0)));
                state.heap.allocate(HeapObject::Array {
                    element: element.as_ref().clone(),
                    length,
                    contents: ArrayContents::unknown(),
                })
            }
            Type::Ref(class) => state.heap.allocate(HeapObject::Object {
                class: class.clone(),
                fields: Default::default(),
                lazy: true,
            }),
            _ => state.heap.allocate(HeapObject::Object {
                class: classes::OBJECT.to_string(),
                fields: Default::default(),
                lazy: true,
            }),
        }
    }

    /// Resolve a reference to `null` or a heap object. A symbolic reference that the path has
    /// not resolved yet forks: the `null` state comes first, then the state in which the
    /// reference points to a new object of its declared type.
    fn resolve(
        &self,
        state: PathState,
        reference: &Value,
    ) -> Result<Vec<(PathState, Option<HeapRef>)>> {
        match reference {
            Value::Null => return Ok(vec![(state, None)]),
            Value::Ref(heap_ref) => return Ok(vec![(state, Some(*heap_ref))]),
            Value::Symbolic(_) if reference.sort() == Sort::Ref => (),
            _ => {
                let location = state.location().ok_or(state::Error::NoFrame)?;
                return Err(Error::TypeMismatch {
                    location,
                    message: format!("expected a reference but found {reference}"),
                });
            }
        }

        let symbol = reference.as_symbol();
        let resolution = symbol.and_then(|id| state.heap.resolution(id).cloned());
        match resolution {
            Some(Value::Null) => return Ok(vec![(state, None)]),
            Some(Value::Ref(heap_ref)) => return Ok(vec![(state, Some(heap_ref))]),
            _ => (),
        }

        let ty = symbol
            .and_then(|id| state.heap.declared(id).cloned())
            .unwrap_or_else(|| Type::Ref(classes::OBJECT.to_string()));

        let is_null = ops::compare(CmpOp::Eq, reference, &Value::Null);
        let (null_state, object_state) = split(state, is_null);
        let mut resolved = Vec::with_capacity(2);

        if let Some(mut null_state) = null_state {
            if let Some(id) = symbol {
                null_state.heap.bind(id, Value::Null);
            }
            resolved.push((null_state, None));
        }

        if let Some(mut object_state) = object_state {
            let object = self.materialize(&mut object_state, &ty);
            match symbol {
                Some(id) => object_state.heap.bind(id, Value::Ref(object)),
                None => {
                    object_state.note(format!("aliasing of {reference} is not tracked"));
                }
            }
            resolved.push((object_state, Some(object)));
        }

        Ok(resolved)
    }

    /// Throw a new instance of `class` from the current instruction.
    fn throw(&self, mut state: PathState, class: &str) -> Result<Successor> {
        let exception = state.heap.allocate(HeapObject::object(class));
        self.raise(state, exception)
    }

    /// Transfer control to the innermost handler that catches `exception`, unwinding inlined
    /// frames as needed. An exception that escapes the analyzed method terminates the path.
    fn raise(&self, mut state: PathState, exception: HeapRef) -> Result<Successor> {
        let class = state.heap.get(exception)?.class_name();
        let location = state.location();

        for depth in (0..state.frames.len()).rev() {
            let frame = &state.frames[depth];
            let handler = frame
                .method()
                .handlers_covering(frame.pc())
                .find(|handler| {
                    handler
                        .catch_type
                        .as_deref()
                        .map_or(true, |catch_type| classes::is_subclass(&class, catch_type))
                })
                .map(|handler| handler.handler);

            if let Some(handler) = handler {
                trace!(%class, handler, "exception caught");
                state.frames.truncate(depth + 1);
                let frame = state.frame_mut()?;
                frame.clear_stack();
                frame.push(Value::Ref(exception));
                frame.set_pc(handler);
                return Ok(Successor::Continue(state));
            }
        }

        trace!(%class, "exception escapes");
        Ok(Successor::Terminal(TerminalState {
            state,
            termination: Termination::Exception(class),
            location,
        }))
    }

    fn is_assertion_helper(&self, kind: InvokeKind, callee: &MethodId) -> bool {
        kind == InvokeKind::Static && self.assertion_helpers.contains(callee)
    }

    fn binary(&self, mut state: PathState, op: BinaryOp, location: &Location) -> Result<Vec<Successor>> {
        let rhs = pop(&mut state)?;
        let lhs = pop(&mut state)?;
        let op = int_op(op);

        let (trapped, state) = if matches!(op, IntOp::Div | IntOp::Rem) {
            let is_zero = ops::compare(CmpOp::Eq, &rhs, &Value::Int(0));
            split(state, is_zero)
        } else {
            (None, Some(state))
        };

        let mut successors = Vec::with_capacity(2);
        if let Some(trapped) = trapped {
            successors.push(self.throw(trapped, classes::ARITHMETIC_EXCEPTION)?);
        }
        if let Some(mut state) = state {
            let result = ops::apply(op, &lhs, &rhs).map_err(|err| arithmetic(location, err))?;
            push(&mut state, result)?;
            advance(&mut state)?;
            successors.push(Successor::Continue(state));
        }
        Ok(successors)
    }

    fn conditional(&self, state: PathState, condition: Value, target: u32) -> Result<Vec<Successor>> {
        let (taken, fallthrough) = split(state, condition);
        let mut successors = Vec::with_capacity(2);
        if let Some(mut taken) = taken {
            jump(&mut taken, target)?;
            successors.push(Successor::Continue(taken));
        }
        if let Some(mut fallthrough) = fallthrough {
            advance(&mut fallthrough)?;
            successors.push(Successor::Continue(fallthrough));
        }
        Ok(successors)
    }

    fn switch(&self, mut state: PathState, default: u32, cases: &[jbc::SwitchCase]) -> Result<Vec<Successor>> {
        let value = pop(&mut state)?;
        if let Some(key) = value.as_int() {
            let target = cases
                .iter()
                .find(|case| case.key == key)
                .map_or(default, |case| case.target);
            jump(&mut state, target)?;
            return Ok(vec![Successor::Continue(state)]);
        }

        let mut successors = Vec::with_capacity(cases.len() + 1);
        for case in cases {
            let mut matched = state.clone();
            matched.assume(ops::compare(CmpOp::Eq, &value, &Value::Int(case.key)));
            matched.depth += 1;
            jump(&mut matched, case.target)?;
            successors.push(Successor::Continue(matched));
        }

        let mut unmatched = state;
        for case in cases {
            unmatched.assume(ops::compare(CmpOp::Ne, &value, &Value::Int(case.key)));
        }
        unmatched.depth += 1;
        jump(&mut unmatched, default)?;
        successors.push(Successor::Continue(unmatched));
        Ok(successors)
    }

    fn get_static(&self, mut state: PathState, field: &FieldRef) -> Result<Vec<Successor>> {
        let value = if field.name == "$assertionsDisabled" {
            Value::Int(0)
        } else if let Some(value) = state.heap.static_field(field) {
            value.clone()
        } else {
            let value = self.fresh(&mut state, &field.ty);
            state.heap.set_static(field.clone(), value.clone());
            value
        };
        push(&mut state, value)?;
        advance(&mut state)?;
        Ok(vec![Successor::Continue(state)])
    }

    fn get_field(&self, state: PathState, field: &FieldRef, location: &Location) -> Result<Vec<Successor>> {
        let mut state = state;
        let receiver = pop(&mut state)?;
        let mut successors = Vec::new();
        for (mut state, target) in self.resolve(state, &receiver)? {
            let Some(target) = target else {
                successors.push(self.throw(state, classes::NULL_POINTER_EXCEPTION)?);
                continue;
            };

            let existing = match state.heap.get(target)? {
                HeapObject::Object { fields, lazy, .. } => fields
                    .get(&field.name)
                    .cloned()
                    .map(Ok)
                    .unwrap_or(Err(*lazy)),
                HeapObject::Array { .. } => {
                    return Err(Error::TypeMismatch {
                        location: location.clone(),
                        message: format!("field {field} read from an array"),
                    })
                }
            };

            let value = match existing {
                Ok(value) => value,
                Err(lazy) => {
                    let value = if lazy {
                        self.fresh(&mut state, &field.ty)
                    } else {
                        default_value(&field.ty)
                    };
                    if let HeapObject::Object { fields, .. } = state.heap.get_mut(target)? {
                        fields.insert(field.name.clone(), value.clone());
                    }
                    value
                }
            };

            push(&mut state, value)?;
            advance(&mut state)?;
            successors.push(Successor::Continue(state));
        }
        Ok(successors)
    }

    fn put_field(&self, mut state: PathState, field: &FieldRef, location: &Location) -> Result<Vec<Successor>> {
        let value = pop(&mut state)?;
        let receiver = pop(&mut state)?;
        let mut successors = Vec::new();
        for (mut state, target) in self.resolve(state, &receiver)? {
            let Some(target) = target else {
                successors.push(self.throw(state, classes::NULL_POINTER_EXCEPTION)?);
                continue;
            };

            match state.heap.get_mut(target)? {
                HeapObject::Object { fields, .. } => {
                    fields.insert(field.name.clone(), value.clone());
                }
                HeapObject::Array { .. } => {
                    return Err(Error::TypeMismatch {
                        location: location.clone(),
                        message: format!("field {field} written to an array"),
                    })
                }
            }

            advance(&mut state)?;
            successors.push(Successor::Continue(state));
        }
        Ok(successors)
    }

    fn new_array(&self, mut state: PathState, element: &Type) -> Result<Vec<Successor>> {
        let length = pop(&mut state)?;
        let negative = ops::compare(CmpOp::Lt, &length, &Value::Int(0));
        let (negative, state) = split(state, negative);

        let mut successors = Vec::with_capacity(2);
        if let Some(negative) = negative {
            successors.push(self.throw(negative, classes::NEGATIVE_ARRAY_SIZE_EXCEPTION)?);
        }
        if let Some(mut state) = state {
            let array = state.heap.allocate(HeapObject::Array {
                element: element.clone(),
                length,
                contents: ArrayContents::filled(default_value(element)),
            });
            push(&mut state, Value::Ref(array))?;
            advance(&mut state)?;
            successors.push(Successor::Continue(state));
        }
        Ok(successors)
    }

    fn array_length(&self, state: &PathState, array: HeapRef, location: &Location) -> Result<Value> {
        match state.heap.get(array)? {
            HeapObject::Array { length, .. } => Ok(length.clone()),
            HeapObject::Object { class, .. } => Err(Error::TypeMismatch {
                location: location.clone(),
                message: format!("expected an array but found an instance of {class}"),
            }),
        }
    }

    /// Resolve the array reference and check the index, calling `access` for every state in
    /// which the access succeeds.
    fn array_access(
        &self,
        state: PathState,
        array: &Value,
        index: &Value,
        location: &Location,
        mut access: impl FnMut(&Self, &mut PathState, HeapRef) -> Result<()>,
    ) -> Result<Vec<Successor>> {
        let mut successors = Vec::new();
        for (state, target) in self.resolve(state, array)? {
            let Some(target) = target else {
                successors.push(self.throw(state, classes::NULL_POINTER_EXCEPTION)?);
                continue;
            };

            let length = self.array_length(&state, target, location)?;
            let in_bounds = ops::and(
                &ops::compare(CmpOp::Ge, index, &Value::Int(0)),
                &ops::compare(CmpOp::Lt, index, &length),
            );
            let out_of_bounds = ops::or(
                &ops::compare(CmpOp::Lt, index, &Value::Int(0)),
                &ops::compare(CmpOp::Ge, index, &length),
            );

            let (in_bounds, out_of_bounds) = branch(state, in_bounds, out_of_bounds);
            if let Some(out_of_bounds) = out_of_bounds {
                successors.push(self.throw(out_of_bounds, classes::ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION)?);
            }
            if let Some(mut state) = in_bounds {
                access(self, &mut state, target)?;
                advance(&mut state)?;
                successors.push(Successor::Continue(state));
            }
        }
        Ok(successors)
    }

    fn array_load(&self, mut state: PathState, location: &Location) -> Result<Vec<Successor>> {
        let index = pop(&mut state)?;
        let array = pop(&mut state)?;
        self.array_access(state, &array, &index, location, |emulator, state, target| {
            let HeapObject::Array { element, contents, .. } = state.heap.get_mut(target)? else {
                return Err(Error::InternalError(format!("{target} is not an array")));
            };
            let element = element.clone();
            let (value, created) = contents.read(&index, || emulator.symbols.fresh(sort_of(&element)));
            if let Some(created) = created {
                if let (Some(id), true) = (created.as_symbol(), element.is_reference()) {
                    state.heap.declare(id, element.clone());
                }
                for constraint in type_constraints(&created, &element) {
                    state.assume(constraint);
                }
            }
            push(state, value)
        })
    }

    fn array_store(&self, mut state: PathState, location: &Location) -> Result<Vec<Successor>> {
        let value = pop(&mut state)?;
        let index = pop(&mut state)?;
        let array = pop(&mut state)?;
        self.array_access(state, &array, &index, location, |_, state, target| {
            let HeapObject::Array { element, contents, .. } = state.heap.get_mut(target)? else {
                return Err(Error::InternalError(format!("{target} is not an array")));
            };
            let stored = match element {
                Type::Boolean => ops::apply(IntOp::And, &value, &Value::Int(1)),
                Type::Byte => ops::unary(UnaryOp::Narrow(Narrowing::Byte), &value),
                Type::Char => ops::unary(UnaryOp::Narrow(Narrowing::Char), &value),
                Type::Short => ops::unary(UnaryOp::Narrow(Narrowing::Short), &value),
                Type::Int | Type::Ref(_) | Type::Array(_) => Ok(value.clone()),
            }
            .map_err(|err| arithmetic(location, err))?;
            contents.write(index.clone(), stored);
            Ok(())
        })
    }

    fn invoke(
        &self,
        mut state: PathState,
        kind: InvokeKind,
        callee: &MethodId,
        location: &Location,
    ) -> Result<Vec<Successor>> {
        let args = state.frame_mut()?.pop_n(callee.params.len())?;

        if self.is_assertion_helper(kind, callee) {
            let Some(argument) = args.first() else {
                return Err(Error::InternalError(format!("{callee} takes no argument")));
            };
            let holds = ops::compare(CmpOp::Ne, argument, &Value::Int(0));
            let (holds, fails) = split(state, holds);
            let mut successors = Vec::with_capacity(2);
            if let Some(fails) = fails {
                successors.push(self.throw(fails, classes::ASSERTION_ERROR)?);
            }
            if let Some(mut holds) = holds {
                advance(&mut holds)?;
                successors.push(Successor::Continue(holds));
            }
            return Ok(successors);
        }

        if kind == InvokeKind::Static {
            return Ok(vec![self.call(state, callee, None, args, location)?]);
        }

        let receiver = pop(&mut state)?;
        let mut successors = Vec::new();
        for (state, target) in self.resolve(state, &receiver)? {
            match target {
                None => successors.push(self.throw(state, classes::NULL_POINTER_EXCEPTION)?),
                Some(target) => {
                    let receiver = Value::Ref(target);
                    successors.push(self.call(state, callee, Some(receiver), args.clone(), location)?);
                }
            }
        }
        Ok(successors)
    }

    /// Enter the callee or summarize the call, depending on the invocation policy.
    fn call(
        &self,
        mut state: PathState,
        callee: &MethodId,
        receiver: Option<Value>,
        args: Vec<Value>,
        location: &Location,
    ) -> Result<Successor> {
        let library = callee.class.starts_with("java/");
        let constructor_no_op = callee.class.starts_with("java/lang/") && callee.name == "<init>";
        if self.config.invoke_policy == InvokePolicy::Inline && !library {
            let inlined = self
                .program
                .get(callee)
                .filter(|method| method.is_static() == receiver.is_none());

            match inlined {
                Some(method) if state.frames.len() < self.config.max_call_depth => {
                    trace!(%callee, depth = state.frames.len(), "inline call");
                    let mut frame = Frame::new(Arc::clone(method));
                    let mut slot = 0u16;
                    for value in receiver.into_iter().chain(args) {
                        frame.store(slot, value)?;
                        slot += 1;
                    }
                    state.frames.push(frame);
                    return Ok(Successor::Continue(state));
                }
                Some(_) => state.note(format!(
                    "call to {callee} at {location} summarized: call depth limit reached"
                )),
                None => state.note(format!(
                    "call to {callee} at {location} summarized: method not available"
                )),
            }
        } else if !constructor_no_op {
            state.note(format!("call to {callee} at {location} summarized"));
        }

        if let Some(ty) = &callee.returns {
            let value = self.fresh(&mut state, ty);
            push(&mut state, value)?;
        }
        advance(&mut state)?;
        Ok(Successor::Continue(state))
    }

    fn ret(&self, mut state: PathState, ty: Option<&Type>) -> Result<Vec<Successor>> {
        let value = match ty {
            Some(_) => Some(pop(&mut state)?),
            None => None,
        };

        let location = state.location();
        state.frames.pop();
        if state.frames.is_empty() {
            return Ok(vec![Successor::Terminal(TerminalState {
                state,
                termination: Termination::Return(value),
                location,
            })]);
        }

        if let Some(value) = value {
            push(&mut state, value)?;
        }
        advance(&mut state)?;
        Ok(vec![Successor::Continue(state)])
    }

    fn check_cast(&self, mut state: PathState, ty: &Type) -> Result<Vec<Successor>> {
        let value = state.frame()?.peek()?.clone();
        if let Value::Ref(heap_ref) = value {
            let fails = match (state.heap.get(heap_ref)?, ty) {
                (HeapObject::Object { class, lazy: false, .. }, Type::Ref(target)) => {
                    !classes::is_subclass(class, target)
                }
                (HeapObject::Object { lazy: false, .. }, Type::Array(_)) => true,
                (HeapObject::Array { .. }, Type::Ref(target)) => target != classes::OBJECT,
                _ => false,
            };
            if fails {
                return Ok(vec![self.throw(state, classes::CLASS_CAST_EXCEPTION)?]);
            }
        }
        advance(&mut state)?;
        Ok(vec![Successor::Continue(state)])
    }
}

impl Emulator for StandardEmulator<'_> {
    fn step(&self, mut state: PathState) -> Result<Vec<Successor>> {
        let frame = state.frame()?;
        let method = Arc::clone(frame.method());
        let location = frame.location();
        let instruction = method.instruction_at(frame.pc()).ok_or_else(|| {
            Error::InternalError(format!("no instruction at {location}"))
        })?;
        state.steps += 1;
        trace!(%location, instruction = %instruction.op_code, "step");

        match &instruction.op_code {
            OpCode::Push { value } => {
                let value = match value {
                    Literal::Int(x) => Value::Int(*x),
                    Literal::Boolean(b) => Value::Int(i32::from(*b)),
                    Literal::Char(c) => Value::Int(*c as i32),
                    Literal::Null => Value::Null,
                };
                simple(state, |frame| {
                    frame.push(value.clone());
                    Ok(())
                })
            }
            OpCode::Load { index, .. } => simple(state, |frame| {
                let value = frame.load(*index)?;
                frame.push(value);
                Ok(())
            }),
            OpCode::Store { index, .. } => simple(state, |frame| {
                let value = frame.pop()?;
                Ok(frame.store(*index, value)?)
            }),
            OpCode::Incr { index, amount } => simple(state, |frame| {
                let value = frame.load(*index)?;
                let value = ops::apply(IntOp::Add, &value, &Value::Int(*amount))
                    .map_err(|err| arithmetic(&location, err))?;
                Ok(frame.store(*index, value)?)
            }),
            OpCode::Binary { op } => self.binary(state, *op, &location),
            OpCode::Negate => simple(state, |frame| {
                let value = frame.pop()?;
                let value =
                    ops::unary(UnaryOp::Neg, &value).map_err(|err| arithmetic(&location, err))?;
                frame.push(value);
                Ok(())
            }),
            OpCode::Cast { to } => simple(state, |frame| {
                let value = frame.pop()?;
                let value = match to {
                    Type::Int => Ok(value),
                    Type::Boolean => ops::apply(IntOp::And, &value, &Value::Int(1)),
                    Type::Byte => ops::unary(UnaryOp::Narrow(Narrowing::Byte), &value),
                    Type::Char => ops::unary(UnaryOp::Narrow(Narrowing::Char), &value),
                    Type::Short => ops::unary(UnaryOp::Narrow(Narrowing::Short), &value),
                    Type::Ref(_) | Type::Array(_) => {
                        return Err(Error::Unsupported {
                            location: location.clone(),
                            message: format!("cast to {to}"),
                        })
                    }
                }
                .map_err(|err| arithmetic(&location, err))?;
                frame.push(value);
                Ok(())
            }),
            OpCode::Dup => simple(state, |frame| {
                let value = frame.peek()?.clone();
                frame.push(value);
                Ok(())
            }),
            OpCode::Pop => simple(state, |frame| {
                frame.pop()?;
                Ok(())
            }),
            OpCode::Swap => simple(state, |frame| {
                let top = frame.pop()?;
                let below = frame.pop()?;
                frame.push(top);
                frame.push(below);
                Ok(())
            }),
            OpCode::If { condition, target } => {
                let rhs = pop(&mut state)?;
                let lhs = pop(&mut state)?;
                let condition = ops::compare(cmp_op(*condition), &lhs, &rhs);
                self.conditional(state, condition, *target)
            }
            OpCode::Ifz { condition, target } => {
                let value = pop(&mut state)?;
                let zero = match (condition, value.sort()) {
                    (Condition::Is | Condition::IsNot, _) | (_, Sort::Ref) => Value::Null,
                    _ => Value::Int(0),
                };
                let condition = ops::compare(cmp_op(*condition), &value, &zero);
                self.conditional(state, condition, *target)
            }
            OpCode::Goto { target } => {
                jump(&mut state, *target)?;
                Ok(vec![Successor::Continue(state)])
            }
            OpCode::Switch { default, cases } => self.switch(state, *default, cases),
            OpCode::Get {
                is_static: true,
                field,
            } => self.get_static(state, field),
            OpCode::Get {
                is_static: false,
                field,
            } => self.get_field(state, field, &location),
            OpCode::Put {
                is_static: true,
                field,
            } => {
                let value = pop(&mut state)?;
                state.heap.set_static(field.clone(), value);
                advance(&mut state)?;
                Ok(vec![Successor::Continue(state)])
            }
            OpCode::Put {
                is_static: false,
                field,
            } => self.put_field(state, field, &location),
            OpCode::New { class } => {
                let object = state.heap.allocate(HeapObject::object(class.clone()));
                push(&mut state, Value::Ref(object))?;
                advance(&mut state)?;
                Ok(vec![Successor::Continue(state)])
            }
            OpCode::NewArray { ty } => self.new_array(state, ty),
            OpCode::ArrayLength => {
                let array = pop(&mut state)?;
                let mut successors = Vec::new();
                for (mut state, target) in self.resolve(state, &array)? {
                    match target {
                        None => {
                            successors.push(self.throw(state, classes::NULL_POINTER_EXCEPTION)?)
                        }
                        Some(target) => {
                            let length = self.array_length(&state, target, &location)?;
                            push(&mut state, length)?;
                            advance(&mut state)?;
                            successors.push(Successor::Continue(state));
                        }
                    }
                }
                Ok(successors)
            }
            OpCode::ArrayLoad { .. } => self.array_load(state, &location),
            OpCode::ArrayStore { .. } => self.array_store(state, &location),
            OpCode::Invoke { kind, method } => self.invoke(state, *kind, method, &location),
            OpCode::Return { ty } => self.ret(state, ty.as_ref()),
            OpCode::Throw => {
                let exception = pop(&mut state)?;
                let mut successors = Vec::new();
                for (state, target) in self.resolve(state, &exception)? {
                    successors.push(match target {
                        None => self.throw(state, classes::NULL_POINTER_EXCEPTION)?,
                        Some(target) => self.raise(state, target)?,
                    });
                }
                Ok(successors)
            }
            OpCode::CheckCast { ty } => self.check_cast(state, ty),
            OpCode::Nop => {
                advance(&mut state)?;
                Ok(vec![Successor::Continue(state)])
            }
        }
    }
}
