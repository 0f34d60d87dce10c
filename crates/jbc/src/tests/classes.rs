use crate::classes::*;

#[test]
fn runtime_exceptions_are_caught_by_ancestors() {
    assert!(is_subclass(ARITHMETIC_EXCEPTION, "java/lang/RuntimeException"));
    assert!(is_subclass(ARITHMETIC_EXCEPTION, "java/lang/Exception"));
    assert!(is_subclass(ARITHMETIC_EXCEPTION, THROWABLE));
    assert!(is_subclass(
        ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION,
        "java/lang/IndexOutOfBoundsException"
    ));
}

#[test]
fn errors_are_not_exceptions() {
    assert!(!is_subclass(ASSERTION_ERROR, "java/lang/Exception"));
    assert!(is_subclass(ASSERTION_ERROR, "java/lang/Error"));
}

#[test]
fn unknown_classes_extend_object() {
    assert_eq!(superclass("jpamb/cases/Custom"), Some(OBJECT));
    assert_eq!(superclass(OBJECT), None);
    assert!(is_subclass("jpamb/cases/Custom", OBJECT));
    assert!(!is_subclass("jpamb/cases/Custom", THROWABLE));
}
