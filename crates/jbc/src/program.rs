use std::collections::BTreeMap;
use std::sync::Arc;

use crate::method::{ClassFile, Method, MethodId};

/// The set of methods available for analysis and for inlining calls.
#[derive(Debug, Clone, Default)]
pub struct Program {
    methods: BTreeMap<MethodId, Arc<Method>>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method, replacing any previous method with the same identifier.
    pub fn insert(&mut self, method: Method) -> Arc<Method> {
        let method = Arc::new(method);
        self.methods.insert(method.id().clone(), Arc::clone(&method));
        method
    }

    pub fn get(&self, id: &MethodId) -> Option<&Arc<Method>> {
        self.methods.get(id)
    }

    pub fn contains(&self, id: &MethodId) -> bool {
        self.methods.contains_key(id)
    }

    /// Methods ordered by identifier.
    pub fn methods(&self) -> impl Iterator<Item = &Arc<Method>> {
        self.methods.values()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl FromIterator<Method> for Program {
    fn from_iter<T: IntoIterator<Item = Method>>(iter: T) -> Self {
        let mut program = Program::new();
        for method in iter {
            program.insert(method);
        }
        program
    }
}

impl Extend<Method> for Program {
    fn extend<T: IntoIterator<Item = Method>>(&mut self, iter: T) {
        for method in iter {
            self.insert(method);
        }
    }
}

impl From<ClassFile> for Program {
    fn from(class: ClassFile) -> Self {
        class.methods.into_iter().collect()
    }
}
