use assert_fs::prelude::*;

use super::*;

const SIMPLE: &str = r#"{
    "name": "jpamb.cases.Simple",
    "methods": [
        {
            "id": "jpamb.cases.Simple.divideByN:(I)I",
            "code": [
                { "offset": 0, "opr": "push", "value": { "type": "int", "value": 1 } },
                { "offset": 1, "opr": "load", "type": "int", "index": 0 },
                { "offset": 2, "opr": "binary", "op": "div" },
                { "offset": 3, "opr": "return", "type": "int" }
            ]
        },
        {
            "id": "jpamb.cases.Simple.broken:()V",
            "code": [
                { "offset": 0, "opr": "wide_jump" }
            ]
        }
    ]
}"#;

fn parse(args: &[&str]) -> Cli {
    match Cli::try_parse_from(std::iter::once("symex").chain(args.iter().copied())) {
        Ok(cli) => cli,
        Err(err) => panic!("failed to parse {args:?}: {err}"),
    }
}

#[test]
fn info_has_five_lines() {
    let lines = info_lines();
    assert_eq!(lines[0], "symex");
    assert_eq!(lines[1], "0.1.0");
    assert_eq!(lines[4], "no");
}

#[test]
fn overrides_apply_to_config() -> Result<()> {
    let cli = parse(&[
        "--max-depth",
        "4",
        "--strategy",
        "bfs",
        "--inline",
        "jpamb.cases.Simple.divideByN:(I)I",
    ]);
    let config = cli.explorer_config()?;
    assert_eq!(config.max_depth, 4);
    assert_eq!(config.strategy, Strategy::Bfs);
    assert_eq!(config.invoke_policy, InvokePolicy::Inline);
    assert_eq!(config.max_steps, ExplorerConfig::default().max_steps);
    assert_eq!(cli.class_path, PathBuf::from("decompiled"));
    assert_eq!(cli.format, Format::Jpamb);
    Ok(())
}

#[test]
fn invalid_override_is_rejected() {
    let cli = parse(&["--max-paths", "0", "Demo.run:()V"]);
    assert!(matches!(cli.explorer_config(), Err(CliError::Config(_))));
}

#[test]
fn class_file_follows_package() -> Result<()> {
    let id: MethodId = "jpamb.cases.Simple.divideByN:(I)I"
        .parse()
        .map_err(CliError::MethodId)?;
    assert_eq!(
        class_file_path(Path::new("decompiled"), &id),
        PathBuf::from("decompiled/jpamb/cases/Simple.json")
    );
    Ok(())
}

#[test]
fn analyze_from_class_path() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = assert_fs::TempDir::new()?;
    dir.child("jpamb/cases/Simple.json").write_str(SIMPLE)?;
    let class_path = dir.path().to_string_lossy().into_owned();

    let cli = parse(&[
        "--class-path",
        &class_path,
        "jpamb.cases.Simple.divideByN:(I)I",
    ]);
    let verdict = analyze(&cli)?;
    assert_eq!(
        render(&verdict, Format::Jpamb)?,
        "ok;100%\ndivide by zero;100%\nassertion error;0%\nout of bounds;0%\nnull pointer;0%\n*;0%"
    );

    let cli = parse(&[
        "--class-path",
        &class_path,
        "jpamb.cases.Simple.broken:()V",
    ]);
    let verdict = analyze(&cli)?;
    assert!(verdict.is_error());
    Ok(())
}

#[test]
fn missing_class_is_an_error_verdict() -> Result<()> {
    let cli = parse(&["--class-path", "/nonexistent", "Demo.run:()V"]);
    let verdict = analyze(&cli)?;
    assert!(verdict.is_error());

    let json = render(&verdict, Format::Json)?;
    assert!(json.contains("\"error\""));
    Ok(())
}
