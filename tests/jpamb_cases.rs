mod common;

use symex::outcome::OutcomeKind;

/// Checks that exactly `reachable` is predicted with certainty and every other benchmark
/// outcome is ruled out.
fn assert_exact(class: &str, id: &str, reachable: &[&str]) {
    let verdict = common::verdict(class, id);
    assert!(verdict.error.is_none(), "{id}: {:?}", verdict.error);
    assert!(verdict.is_exhaustive(), "{id} was not explored completely");

    for (label, confidence) in common::predictions(&verdict) {
        let expected = if reachable.contains(&label.as_str()) { 100 } else { 0 };
        assert_eq!(confidence, expected, "{id}: {label}");
    }
}

#[test]
fn simple_cases() {
    let cases: [(&str, &[&str]); 11] = [
        ("justReturnNothing:()V", &["ok"]),
        ("assertFalse:()V", &["assertion error"]),
        ("assertBoolean:(Z)V", &["ok", "assertion error"]),
        ("assertInteger:(I)V", &["ok", "assertion error"]),
        ("assertPositive:(I)V", &["ok", "assertion error"]),
        ("divideByZero:()I", &["divide by zero"]),
        ("divideByN:(I)I", &["ok", "divide by zero"]),
        ("divideZeroByZero:(II)I", &["ok", "divide by zero"]),
        ("multiError:(Z)I", &["assertion error", "divide by zero"]),
        ("checkBeforeDivideByN:(I)I", &["ok", "assertion error"]),
        ("checkBeforeAssert:(I)I", &["ok"]),
    ];
    for (method, reachable) in cases {
        assert_exact("Simple", &format!("jpamb.cases.Simple.{method}"), reachable);
    }
}

#[test]
fn array_cases() {
    let cases: [(&str, &[&str]); 5] = [
        ("arrayOutOfBounds:()V", &["out of bounds"]),
        ("arrayInBounds:()V", &["ok"]),
        ("firstElement:([I)I", &["ok", "out of bounds", "null pointer"]),
        ("arrayLength:([I)I", &["ok", "null pointer"]),
        ("nullChecked:([I)I", &["ok"]),
    ];
    for (method, reachable) in cases {
        assert_exact("Arrays", &format!("jpamb.cases.Arrays.{method}"), reachable);
    }
}

#[test]
fn concrete_loop_terminates() {
    assert_exact("Loops", "jpamb.cases.Loops.countToTen:()I", &["ok"]);
}

#[test]
fn unconditional_loops_diverge() {
    for id in ["jpamb.cases.Loops.forever:()V", "jpamb.cases.Loops.neverAsserts:()V"] {
        let verdict = common::verdict("Loops", id);
        assert_eq!(verdict.kinds().into_iter().collect::<Vec<_>>(), vec![OutcomeKind::Divergent]);

        let predictions = common::predictions(&verdict);
        assert_eq!(predictions["*"], 100, "{id}");
        assert_eq!(predictions["assertion error"], 10, "{id}");
        assert_eq!(predictions["ok"], 10, "{id}");
    }
}

#[test]
fn symbolic_loop_is_partially_explored() {
    let verdict = common::verdict("Loops", "jpamb.cases.Loops.countDown:(I)I");
    assert!(!verdict.is_exhaustive());

    let predictions = common::predictions(&verdict);
    assert_eq!(predictions["ok"], 100);
    assert_eq!(predictions["*"], 50);
    assert_eq!(predictions["divide by zero"], 10);
}

#[test]
fn unknown_method_is_an_error_verdict() {
    let verdict = common::verdict("Simple", "jpamb.cases.Simple.missing:()V");
    assert!(verdict.is_error());
    assert!(common::predictions(&verdict).values().all(|confidence| *confidence == 50));
}
