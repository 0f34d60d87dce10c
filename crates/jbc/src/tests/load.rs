use crate::*;

fn divide_json() -> serde_json::Value {
    serde_json::json!({
        "id": "jpamb.cases.Simple.divideByN:(I)I",
        "static": true,
        "max_locals": 1,
        "code": [
            { "offset": 0, "opr": "push", "value": { "type": "int", "value": 1 } },
            { "offset": 1, "opr": "load", "type": "int", "index": 0 },
            { "offset": 2, "opr": "binary", "op": "div" },
            { "offset": 3, "opr": "return", "type": "int" }
        ]
    })
}

fn load(value: &serde_json::Value) -> Result<Method> {
    Method::load(value.to_string().as_bytes())
}

fn malformed_kind(result: Result<Method>) -> MalformedKind {
    match result {
        Err(Error::MalformedBytecode { kind, .. }) => kind,
        other => panic!("expected malformed bytecode, got {other:?}"),
    }
}

#[test]
fn load_method() -> Result<()> {
    let method = load(&divide_json())?;
    assert_eq!(method.id().to_string(), "jpamb.cases.Simple.divideByN:(I)I");
    assert!(method.is_static());
    assert_eq!(method.instructions().len(), 4);
    assert_eq!(
        method.instruction_at(2).map(|i| &i.op_code),
        Some(&OpCode::Binary { op: BinaryOp::Div })
    );
    assert_eq!(method.successors(2), vec![3]);
    assert_eq!(method.next_offset(3), None);
    Ok(())
}

#[test]
fn load_sparse_offsets() -> Result<()> {
    let json = serde_json::json!({
        "id": "Demo.loop:()V",
        "code": [
            { "offset": 0, "opr": "nop" },
            { "offset": 3, "opr": "goto", "target": 0 }
        ]
    });
    let method = load(&json)?;
    assert_eq!(method.next_offset(0), Some(3));
    assert_eq!(method.successors(3), vec![0]);
    Ok(())
}

#[test]
fn load_handlers_and_literals() -> Result<()> {
    let json = serde_json::json!({
        "id": "Demo.safe:(I)I",
        "code": [
            { "offset": 0, "opr": "push", "value": { "type": "int", "value": 10 } },
            { "offset": 1, "opr": "load", "type": "int", "index": 0 },
            { "offset": 2, "opr": "binary", "op": "div" },
            { "offset": 3, "opr": "return", "type": "int" },
            { "offset": 4, "opr": "pop" },
            { "offset": 5, "opr": "push", "value": { "type": "char", "value": "a" } },
            { "offset": 6, "opr": "return", "type": "int" }
        ],
        "handlers": [
            { "start": 0, "end": 4, "handler": 4, "catch_type": "java/lang/ArithmeticException" }
        ]
    });
    let method = load(&json)?;
    assert_eq!(method.handlers_covering(2).count(), 1);
    assert_eq!(method.handlers_covering(4).count(), 0);
    assert_eq!(method.successors(2), vec![3, 4]);
    assert_eq!(
        method.instruction_at(5).map(|i| &i.op_code),
        Some(&OpCode::Push {
            value: Literal::Char('a')
        })
    );
    Ok(())
}

#[test]
fn reject_unknown_opcode() {
    let mut json = divide_json();
    json["code"][2] = serde_json::json!({ "offset": 2, "opr": "fdiv" });
    match load(&json) {
        Err(Error::UnsupportedInstruction { opr, offset }) => {
            assert_eq!(opr, "fdiv");
            assert_eq!(offset, 2);
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn reject_target_out_of_range() {
    let mut json = divide_json();
    json["code"][2] = serde_json::json!({ "offset": 2, "opr": "goto", "target": 17 });
    assert_eq!(
        malformed_kind(load(&json)),
        MalformedKind::TargetOutOfRange {
            offset: 2,
            target: 17
        }
    );
}

#[test]
fn reject_target_between_instructions() {
    let json = serde_json::json!({
        "id": "Demo.f:()V",
        "code": [
            { "offset": 0, "opr": "goto", "target": 2 },
            { "offset": 3, "opr": "return" }
        ]
    });
    assert_eq!(
        malformed_kind(load(&json)),
        MalformedKind::TargetNotOnBoundary {
            offset: 0,
            target: 2
        }
    );
}

#[test]
fn reject_bad_handler() {
    let mut json = divide_json();
    json["handlers"] = serde_json::json!([{ "start": 0, "end": 2, "handler": 9 }]);
    assert!(matches!(
        malformed_kind(load(&json)),
        MalformedKind::InvalidHandler { handler: 9, .. }
    ));

    json["handlers"] = serde_json::json!([{ "start": 2, "end": 2, "handler": 0 }]);
    assert!(matches!(
        malformed_kind(load(&json)),
        MalformedKind::InvalidHandler { .. }
    ));
}

#[test]
fn handler_may_end_after_last_instruction() -> Result<()> {
    let mut json = divide_json();
    json["handlers"] = serde_json::json!([{ "start": 0, "end": 4, "handler": 3 }]);
    // Handler entry has the exception on the stack which `return int` consumes.
    let method = load(&json)?;
    assert_eq!(method.handlers().len(), 1);
    Ok(())
}

#[test]
fn reject_empty_and_unordered() {
    let json = serde_json::json!({ "id": "Demo.f:()V", "code": [] });
    assert_eq!(malformed_kind(load(&json)), MalformedKind::Empty);

    let json = serde_json::json!({
        "id": "Demo.f:()V",
        "code": [
            { "offset": 2, "opr": "nop" },
            { "offset": 1, "opr": "return" }
        ]
    });
    assert_eq!(
        malformed_kind(load(&json)),
        MalformedKind::NonMonotonicOffset { offset: 1 }
    );
}

#[test]
fn reject_local_out_of_range() {
    let mut json = divide_json();
    json["code"][1] = serde_json::json!({ "offset": 1, "opr": "load", "type": "int", "index": 3 });
    assert_eq!(
        malformed_kind(load(&json)),
        MalformedKind::LocalOutOfRange {
            offset: 1,
            index: 3,
            max_locals: 1
        }
    );
}

#[test]
fn reject_invalid_json() {
    assert!(matches!(Method::load(b"{ not json"), Err(Error::Json(_))));
}

#[test]
fn class_file_keeps_good_methods() -> Result<()> {
    let json = serde_json::json!({
        "name": "jpamb.cases.Simple",
        "methods": [
            divide_json(),
            { "id": "jpamb.cases.Simple.broken:()V", "code": [ { "offset": 0, "opr": "lmul" } ] }
        ]
    });
    let class = ClassFile::load(json.to_string().as_bytes())?;
    assert_eq!(class.name, "jpamb/cases/Simple");
    assert_eq!(class.methods.len(), 1);
    assert!(matches!(
        class.failures.get("jpamb.cases.Simple.broken:()V"),
        Some(Error::UnsupportedInstruction { .. })
    ));

    let program = Program::from(class);
    let id: MethodId = "jpamb.cases.Simple.divideByN:(I)I".parse()?;
    assert!(program.contains(&id));
    Ok(())
}
