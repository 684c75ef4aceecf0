use serde_json::json;
use spoon::images::build_image;
use spoon::{MemoryEngine, Options};

fn build_dir() -> tempfile::TempDir {
    let td = tempfile::tempdir().expect("tmpdir");
    std::fs::write(
        td.path().join("Dockerfile"),
        "FROM ubuntu:22.04\nENTRYPOINT [\"runit\"]\n",
    )
    .unwrap();
    td
}

fn opts_for(dir: &std::path::Path, pre: Vec<String>) -> Options {
    Options {
        builddir: dir.to_path_buf(),
        image: "spoon-pairing".to_string(),
        pre_build_commands: pre,
        ..Options::default()
    }
}

#[test]
fn test_build_prints_log_records() {
    let td = build_dir();
    let engine = MemoryEngine::new().with_build_log(vec![
        json!({"stream": "Step 1/2 : FROM ubuntu:22.04\n"}),
        json!({"status": "Pulling fs layer", "id": "abc123"}),
        json!({"aux": {"ID": "sha256:feed"}}),
        json!({"stream": "Successfully tagged spoon-pairing:latest\n"}),
    ]);
    let mut out = Vec::new();
    build_image(&engine, &opts_for(td.path(), vec![]), &mut out).expect("build");
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Step 1/2 : FROM ubuntu:22.04\n\
         status: Pulling fs layer\n\
         id: abc123\n\
         aux: {\"ID\":\"sha256:feed\"}\n\
         Successfully tagged spoon-pairing:latest\n"
    );
    assert_eq!(engine.calls(), vec!["build spoon-pairing"]);
}

#[test]
fn test_build_error_record_fails_after_printing() {
    let td = build_dir();
    let engine = MemoryEngine::new().with_build_log(vec![
        json!({"stream": "Step 1/2 : RUN false\n"}),
        json!({"errorDetail": {"code": 1}, "error": "The command '/bin/sh -c false' returned a non-zero code: 1"}),
        json!({"stream": "never delivered\n"}),
    ]);
    let mut out = Vec::new();
    let err = build_image(&engine, &opts_for(td.path(), vec![]), &mut out).unwrap_err();
    assert_eq!(
        spoon::display_for_error(&err),
        "building spoon-pairing failed: The command '/bin/sh -c false' returned a non-zero code: 1"
    );
    assert_eq!(spoon::exit_code_for_error(&err), 1);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Step 1/2 : RUN false\n\
         error: The command '/bin/sh -c false' returned a non-zero code: 1\n"
    );
}

#[cfg(unix)]
#[test]
fn test_pre_build_commands_run_in_order_before_build() {
    let td = build_dir();
    let log = td.path().join("hooks.log");
    let pre = vec![
        format!("echo first >> '{}'", log.display()),
        format!("echo second >> '{}'", log.display()),
    ];
    let engine = MemoryEngine::new();
    let mut out = Vec::new();
    build_image(&engine, &opts_for(td.path(), pre), &mut out).expect("build");
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "first\nsecond\n");
    assert_eq!(engine.calls(), vec!["build spoon-pairing"]);
}

#[cfg(unix)]
#[test]
fn test_failing_pre_build_command_skips_build() {
    let td = build_dir();
    let engine = MemoryEngine::new();
    let mut out = Vec::new();
    let err = build_image(
        &engine,
        &opts_for(td.path(), vec!["exit 7".to_string(), "echo never".to_string()]),
        &mut out,
    )
    .unwrap_err();
    assert!(err.to_string().contains("pre-build command failed"), "{err}");
    assert!(engine.calls().is_empty());
}

#[test]
fn test_missing_dockerfile_skips_build() {
    let td = tempfile::tempdir().expect("tmpdir");
    let engine = MemoryEngine::new();
    let mut out = Vec::new();
    let err = build_image(&engine, &opts_for(td.path(), vec![]), &mut out).unwrap_err();
    assert!(err.to_string().contains("no Dockerfile"), "{err}");
    assert!(engine.calls().is_empty());
}
