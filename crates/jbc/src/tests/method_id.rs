use crate::*;

#[test]
fn parse_static_method() -> Result<()> {
    let id: MethodId = "jpamb.cases.Simple.divideByN:(I)I".parse()?;
    assert_eq!(id.class, "jpamb/cases/Simple");
    assert_eq!(id.name, "divideByN");
    assert_eq!(id.params, vec![Type::Int]);
    assert_eq!(id.returns, Some(Type::Int));
    Ok(())
}

#[test]
fn parse_arrays_and_references() -> Result<()> {
    let id: MethodId = "jpamb.cases.Arrays.arraySpellsHello:([CLjava/lang/String;)V".parse()?;
    assert_eq!(
        id.params,
        vec![
            Type::Array(Box::new(Type::Char)),
            Type::Ref("java/lang/String".to_string())
        ]
    );
    assert_eq!(id.returns, None);
    assert_eq!(id.argument_slots(true), 2);
    assert_eq!(id.argument_slots(false), 3);
    Ok(())
}

#[test]
fn display_round_trips() -> Result<()> {
    let text = "jpamb.cases.Loops.forever:()V";
    let id: MethodId = text.parse()?;
    assert_eq!(id.to_string(), text);
    Ok(())
}

#[test]
fn reject_invalid_descriptors() {
    for text in [
        "noDescriptor",
        "Simple.f(I)I",
        "Simple.f:I)I",
        "Simple.f:(J)I",
        "Simple.f:(I)",
        "Simple.f:(I)II",
        "Simple.f:(Ljava/lang/String)V",
        ".f:()V",
    ] {
        let result = text.parse::<MethodId>();
        assert!(
            matches!(result, Err(Error::InvalidDescriptor(_))),
            "{text} should be rejected"
        );
    }
}

#[test]
fn serde_uses_text_form() -> Result<()> {
    let id: MethodId = "jpamb.cases.Simple.assertBoolean:(Z)V".parse()?;
    let json = serde_json::to_string(&id)?;
    assert_eq!(json, "\"jpamb.cases.Simple.assertBoolean:(Z)V\"");
    let decoded: MethodId = serde_json::from_str(&json)?;
    assert_eq!(decoded, id);
    Ok(())
}
