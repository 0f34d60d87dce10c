//! Built-in knowledge of the `java.lang` class hierarchy. Only the classes the engine can throw or
//! that commonly appear in handler tables are modelled. Every other class is assumed to extend
//! `java/lang/Object` directly.

pub const OBJECT: &str = "java/lang/Object";
pub const THROWABLE: &str = "java/lang/Throwable";
pub const ARITHMETIC_EXCEPTION: &str = "java/lang/ArithmeticException";
pub const NULL_POINTER_EXCEPTION: &str = "java/lang/NullPointerException";
pub const ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION: &str = "java/lang/ArrayIndexOutOfBoundsException";
pub const NEGATIVE_ARRAY_SIZE_EXCEPTION: &str = "java/lang/NegativeArraySizeException";
pub const CLASS_CAST_EXCEPTION: &str = "java/lang/ClassCastException";
pub const ASSERTION_ERROR: &str = "java/lang/AssertionError";

const SUPERCLASSES: &[(&str, &str)] = &[
    (THROWABLE, OBJECT),
    ("java/lang/Exception", THROWABLE),
    ("java/lang/Error", THROWABLE),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    (ARITHMETIC_EXCEPTION, "java/lang/RuntimeException"),
    (NULL_POINTER_EXCEPTION, "java/lang/RuntimeException"),
    ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
    (
        ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION,
        "java/lang/IndexOutOfBoundsException",
    ),
    (NEGATIVE_ARRAY_SIZE_EXCEPTION, "java/lang/RuntimeException"),
    (CLASS_CAST_EXCEPTION, "java/lang/RuntimeException"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/IllegalStateException", "java/lang/RuntimeException"),
    (
        "java/lang/UnsupportedOperationException",
        "java/lang/RuntimeException",
    ),
    (ASSERTION_ERROR, "java/lang/Error"),
    ("java/lang/Number", OBJECT),
    ("java/lang/Integer", "java/lang/Number"),
    ("java/lang/String", OBJECT),
];

/// The direct superclass of `class`. `None` only for `java/lang/Object`.
pub fn superclass(class: &str) -> Option<&str> {
    if class == OBJECT {
        return None;
    }

    SUPERCLASSES
        .iter()
        .find(|(name, _)| *name == class)
        .map(|(_, parent)| *parent)
        .or(Some(OBJECT))
}

/// Returns true if an instance of `class` may be stored in a variable of type `ancestor`.
pub fn is_subclass(class: &str, ancestor: &str) -> bool {
    let mut current = Some(class);
    while let Some(name) = current {
        if name == ancestor {
            return true;
        }
        current = superclass(name);
    }
    false
}
