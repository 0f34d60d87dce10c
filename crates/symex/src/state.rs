//! Path states and the structures they share with their forks.
//!
//! A [PathState] is cloned whenever execution forks. Clones share as much as possible: the
//! [PathCondition] is a persistent list whose tail is shared by reference counting, and heap
//! objects are stored behind [Arc] and copied only when a path writes to them.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use jbc::{FieldRef, Location, Method, Type};
use serde::ser::SerializeSeq;
use serde::Serialize;
use sym::{ops, CmpOp, HeapRef, Sort, SymbolId, Value};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("operand stack underflow at {location}")]
    StackUnderflow { location: Location },

    #[error("read of uninitialized local {index} at {location}")]
    UninitializedLocal { index: u16, location: Location },

    #[error("local {index} is out of range at {location}")]
    LocalOutOfRange { index: u16, location: Location },

    #[error("unknown heap object {0}")]
    UnknownHeapObject(HeapRef),

    #[error("path state has no active frame")]
    NoFrame,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
struct ConstraintNode {
    constraint: Value,
    parent: Option<Arc<ConstraintNode>>,
}

/// Conjunction of the constraints under which a path is taken.
///
/// Appending never affects clones made before the append, so sibling paths never observe each
/// other's constraints.
#[derive(Debug, Clone, Default)]
pub struct PathCondition {
    head: Option<Arc<ConstraintNode>>,
    len: usize,
}

impl PathCondition {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this condition with one more constraint.
    pub fn with(&self, constraint: Value) -> Self {
        let mut condition = self.clone();
        condition.push(constraint);
        condition
    }

    /// Append a constraint. Constraints that are concretely `true` are dropped.
    pub fn push(&mut self, constraint: Value) {
        if constraint == sym::TRUE {
            return;
        }

        self.head = Some(Arc::new(ConstraintNode {
            constraint,
            parent: self.head.take(),
        }));
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The constraints, oldest first.
    pub fn constraints(&self) -> Vec<Value> {
        let mut constraints = Vec::with_capacity(self.len);
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            constraints.push(current.constraint.clone());
            node = current.parent.as_deref();
        }
        constraints.reverse();
        constraints
    }

    /// Returns true if some constraint is concretely `false`.
    pub fn is_trivially_false(&self) -> bool {
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            if current.constraint == sym::FALSE {
                return true;
            }
            node = current.parent.as_deref();
        }
        false
    }

    /// All constraints joined into one boolean value.
    pub fn conjunction(&self) -> Value {
        self.constraints()
            .iter()
            .fold(sym::TRUE, |acc, constraint| ops::and(&acc, constraint))
    }

    pub fn symbols(&self) -> BTreeMap<SymbolId, Sort> {
        let mut symbols = BTreeMap::new();
        for constraint in self.constraints() {
            constraint.collect_symbols(&mut symbols);
        }
        symbols
    }
}

impl PartialEq for PathCondition {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.constraints() == other.constraints()
    }
}

impl Eq for PathCondition {}

impl fmt::Display for PathCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "true");
        }

        for (index, constraint) in self.constraints().iter().enumerate() {
            if index > 0 {
                write!(f, " && ")?;
            }
            write!(f, "{constraint}")?;
        }
        Ok(())
    }
}

impl Serialize for PathCondition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let constraints = self.constraints();
        let mut seq = serializer.serialize_seq(Some(constraints.len()))?;
        for constraint in &constraints {
            seq.serialize_element(constraint)?;
        }
        seq.end()
    }
}

/// One activation of a method.
#[derive(Debug, Clone)]
pub struct Frame {
    method: Arc<Method>,
    pc: u32,
    stack: Vec<Value>,
    locals: Vec<Option<Value>>,
}

impl Frame {
    /// A frame positioned at the entry of `method` with every local uninitialized.
    pub fn new(method: Arc<Method>) -> Self {
        Self {
            pc: method.entry(),
            stack: Vec::with_capacity(method.max_stack()),
            locals: vec![None; usize::from(method.max_locals())],
            method,
        }
    }

    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    pub fn location(&self) -> Location {
        Location {
            method: self.method.id().clone(),
            offset: self.pc,
        }
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or_else(|| Error::StackUnderflow {
            location: self.location(),
        })
    }

    /// Pop `count` values. They are returned in the order they were pushed.
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<Value>> {
        if count > self.stack.len() {
            return Err(Error::StackUnderflow {
                location: self.location(),
            });
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    pub fn peek(&self) -> Result<&Value> {
        self.stack.last().ok_or_else(|| Error::StackUnderflow {
            location: self.location(),
        })
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    pub fn load(&self, index: u16) -> Result<Value> {
        match self.locals.get(usize::from(index)) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(Error::UninitializedLocal {
                index,
                location: self.location(),
            }),
            None => Err(Error::LocalOutOfRange {
                index,
                location: self.location(),
            }),
        }
    }

    pub fn store(&mut self, index: u16, value: Value) -> Result<()> {
        match self.locals.get_mut(usize::from(index)) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(Error::LocalOutOfRange {
                index,
                location: self.location(),
            }),
        }
    }
}

/// Contents of an array: a base that every element starts from, overlaid with writes in
/// program order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayContents {
    base: ArrayBase,
    writes: Vec<(Value, Value)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ArrayBase {
    /// Every element starts with the same value.
    Filled(Value),

    /// Elements are unknown. Each distinct index expression read so far is mapped to the value
    /// of its element: a fresh symbol, unless the index equals one read earlier.
    Unknown { reads: Vec<(Value, Value)> },
}

impl ArrayContents {
    pub fn filled(value: Value) -> Self {
        Self {
            base: ArrayBase::Filled(value),
            writes: Vec::new(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            base: ArrayBase::Unknown { reads: Vec::new() },
            writes: Vec::new(),
        }
    }

    /// Read the element at `index`. A read of an unknown element calls `fresh` for a symbol
    /// standing for it, which is also returned as the second element so the caller can
    /// constrain it.
    pub fn read(&mut self, index: &Value, fresh: impl FnOnce() -> Value) -> (Value, Option<Value>) {
        let mut created = None;
        let mut value = match &mut self.base {
            ArrayBase::Filled(value) => value.clone(),
            ArrayBase::Unknown { reads } => {
                match reads.iter().find(|(read_index, _)| read_index == index) {
                    Some((_, value)) => value.clone(),
                    None => {
                        let symbol = fresh();
                        // An earlier read at an equal index saw the same element.
                        let value = reads.iter().fold(symbol.clone(), |value, (read_index, read)| {
                            ops::ite(&ops::compare(CmpOp::Eq, index, read_index), read, &value)
                        });
                        reads.push((index.clone(), value.clone()));
                        created = Some(symbol);
                        value
                    }
                }
            }
        };

        for (write_index, written) in &self.writes {
            let same = ops::compare(CmpOp::Eq, index, write_index);
            value = ops::ite(&same, written, &value);
        }

        (value, created)
    }

    pub fn write(&mut self, index: Value, value: Value) {
        // A later write to a concretely equal index shadows the earlier one entirely.
        if index.is_concrete() {
            self.writes.retain(|(write_index, _)| write_index != &index);
        }
        self.writes.push((index, value));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapObject {
    /// An instance of a class. Fields of a lazy object were never observed by the path; reading
    /// one yields an unknown value rather than the default.
    Object {
        class: String,
        fields: BTreeMap<String, Value>,
        lazy: bool,
    },

    Array {
        element: Type,
        length: Value,
        contents: ArrayContents,
    },
}

impl HeapObject {
    pub fn object(class: impl Into<String>) -> Self {
        HeapObject::Object {
            class: class.into(),
            fields: BTreeMap::new(),
            lazy: false,
        }
    }

    /// The runtime class, with arrays named by their descriptor.
    pub fn class_name(&self) -> String {
        match self {
            HeapObject::Object { class, .. } => class.clone(),
            HeapObject::Array { element, .. } => Type::Array(Box::new(element.clone())).descriptor(),
        }
    }
}

/// Heap of one path, together with what the path has learned about symbolic references.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: BTreeMap<HeapRef, Arc<HeapObject>>,
    next: u32,

    /// Symbolic references that were resolved to `null` or to a heap object.
    resolved: BTreeMap<SymbolId, Value>,

    /// Static types of symbolic references.
    declared: BTreeMap<SymbolId, Type>,

    statics: BTreeMap<FieldRef, Value>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, object: HeapObject) -> HeapRef {
        let heap_ref = HeapRef(self.next);
        self.next += 1;
        self.objects.insert(heap_ref, Arc::new(object));
        heap_ref
    }

    pub fn get(&self, heap_ref: HeapRef) -> Result<&HeapObject> {
        self.objects
            .get(&heap_ref)
            .map(Arc::as_ref)
            .ok_or(Error::UnknownHeapObject(heap_ref))
    }

    /// Mutable access to an object. The object is copied first if another path shares it.
    pub fn get_mut(&mut self, heap_ref: HeapRef) -> Result<&mut HeapObject> {
        self.objects
            .get_mut(&heap_ref)
            .map(Arc::make_mut)
            .ok_or(Error::UnknownHeapObject(heap_ref))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn declare(&mut self, id: SymbolId, ty: Type) {
        self.declared.insert(id, ty);
    }

    pub fn declared(&self, id: SymbolId) -> Option<&Type> {
        self.declared.get(&id)
    }

    pub fn resolution(&self, id: SymbolId) -> Option<&Value> {
        self.resolved.get(&id)
    }

    pub fn bind(&mut self, id: SymbolId, value: Value) {
        self.resolved.insert(id, value);
    }

    pub fn static_field(&self, field: &FieldRef) -> Option<&Value> {
        self.statics.get(field)
    }

    pub fn set_static(&mut self, field: FieldRef, value: Value) {
        self.statics.insert(field, value);
    }
}

/// The state of one explored path.
#[derive(Debug, Clone)]
pub struct PathState {
    /// Active frames, innermost last.
    pub frames: Vec<Frame>,

    pub heap: Heap,

    pub condition: PathCondition,

    /// Number of symbolic branch points taken along this path.
    pub depth: usize,

    /// Instructions executed along this path.
    pub steps: u64,

    /// Approximations made along this path, such as calls that were summarized.
    pub notes: BTreeSet<String>,
}

impl PathState {
    pub fn new(frame: Frame) -> Self {
        Self {
            frames: vec![frame],
            heap: Heap::new(),
            condition: PathCondition::new(),
            depth: 0,
            steps: 0,
            notes: BTreeSet::new(),
        }
    }

    pub fn frame(&self) -> Result<&Frame> {
        self.frames.last().ok_or(Error::NoFrame)
    }

    pub fn frame_mut(&mut self) -> Result<&mut Frame> {
        self.frames.last_mut().ok_or(Error::NoFrame)
    }

    pub fn location(&self) -> Option<Location> {
        self.frames.last().map(Frame::location)
    }

    pub fn assume(&mut self, constraint: Value) {
        self.condition.push(constraint);
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.insert(note.into());
    }
}
