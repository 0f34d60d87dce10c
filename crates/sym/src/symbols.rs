use std::sync::atomic::{AtomicU64, Ordering};

use crate::expr::SymbolId;
use crate::value::{Sort, Value};

/// Source of fresh input symbols for one exploration run. Identifiers are never reused by the
/// same allocator. The counter is atomic so the allocator may be shared between workers.
#[derive(Debug, Default)]
pub struct SymbolAllocator {
    next: AtomicU64,
}

impl SymbolAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_id(&self) -> SymbolId {
        SymbolId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a new input symbol of the given sort.
    pub fn fresh(&self, sort: Sort) -> Value {
        Value::symbol(self.fresh_id(), sort)
    }

    /// Number of symbols allocated so far.
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
