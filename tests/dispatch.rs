// tests/dispatch.rs
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use buildwatch::errors::BuildError;
use buildwatch::exec::{run_build, BuildDispatcher, MethodDispatcher};
use buildwatch::types::{BuildMethod, TargetDescriptor};
use buildwatch::watch::patterns::ExcludeSet;
use tempfile::TempDir;

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("app/src")).unwrap();
    fs::write(dir.path().join("app/src/main.c"), "int main() {}").unwrap();
    dir
}

fn dispatcher(root: &Path) -> MethodDispatcher {
    let excludes = ExcludeSet::new(&["node_modules".to_string(), ".git".to_string()]).unwrap();
    MethodDispatcher::new(root, ".buildwatch", excludes)
}

fn command(name: &str, cmd: &str) -> TargetDescriptor {
    TargetDescriptor::new(name, "app", BuildMethod::Command).with_param("cmd", cmd)
}

#[tokio::test]
async fn command_runs_in_source_root_with_env() {
    let dir = project();
    let out = dir.path().join(".buildwatch/app");
    let target = command(
        "app",
        r#"ls src > "$BUILDWATCH_OUTPUT_DIR/listing.txt" && echo "built $BUILDWATCH_TARGET""#,
    );

    let outcome = run_build(&dispatcher(dir.path()), &target, &out, None).await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.stdout.trim(), "built app");
    assert!(outcome.errors.is_empty());
    let listing = fs::read_to_string(out.join("listing.txt")).unwrap();
    assert_eq!(listing.trim(), "main.c");
}

#[tokio::test]
async fn failing_command_surfaces_matching_lines() {
    let dir = project();
    let out = dir.path().join(".buildwatch/app");
    let target = command(
        "app",
        "echo 'compiling'; echo 'FATAL: missing header' >&2; echo 'note: see above' >&2; exit 3",
    )
    .with_param("error_pattern", "^FATAL");

    let outcome = run_build(&dispatcher(dir.path()), &target, &out, None).await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, Some(3));
    assert_eq!(
        outcome.errors,
        vec![
            "build of 'app' exited with code 3".to_string(),
            "FATAL: missing header".to_string(),
        ]
    );
}

#[tokio::test]
async fn failing_command_without_matches_keeps_stderr_tail() {
    let dir = project();
    let out = dir.path().join(".buildwatch/app");
    let target = command("app", "echo 'undefined reference' >&2; exit 1");

    let outcome = run_build(&dispatcher(dir.path()), &target, &out, None).await;

    assert!(!outcome.success);
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(outcome.errors[1], "undefined reference");
}

#[tokio::test]
async fn copy_mirrors_tree_and_skips_excluded_dirs() {
    let dir = project();
    fs::create_dir_all(dir.path().join("app/node_modules/dep")).unwrap();
    fs::write(dir.path().join("app/node_modules/dep/index.js"), "x").unwrap();
    fs::write(dir.path().join("app/README"), "hi").unwrap();
    let out = dir.path().join(".buildwatch/app");
    let target = TargetDescriptor::new("app", "app", BuildMethod::Copy);

    let outcome = run_build(&dispatcher(dir.path()), &target, &out, None).await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.stdout.trim(), "copied 2 files");
    assert!(out.join("src/main.c").is_file());
    assert!(out.join("README").is_file());
    assert!(!out.join("node_modules").exists());
}

#[tokio::test]
async fn copy_of_project_root_skips_output_dir() {
    let dir = project();
    fs::create_dir_all(dir.path().join(".buildwatch/old")).unwrap();
    fs::write(dir.path().join(".buildwatch/old/stale.txt"), "old").unwrap();
    let out = dir.path().join(".buildwatch/all");
    let target = TargetDescriptor::new("all", ".", BuildMethod::Copy);

    let outcome = run_build(&dispatcher(dir.path()), &target, &out, None).await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert!(out.join("app/src/main.c").is_file());
    assert!(!out.join(".buildwatch").exists());
}

#[tokio::test]
async fn unsupported_method_is_an_error_without_side_effects() {
    let dir = project();
    let out = dir.path().join(".buildwatch/legacy");
    let target = TargetDescriptor::new("legacy", "app", BuildMethod::from("gradle"));

    let err = dispatcher(dir.path())
        .execute(&target, &out)
        .await
        .unwrap_err();

    match err {
        BuildError::UnsupportedMethod { target, method } => {
            assert_eq!(target, "legacy");
            assert_eq!(method, "gradle");
        }
        other => panic!("Expected UnsupportedMethod, got: {:?}", other),
    }
    assert!(!out.exists());
}

#[tokio::test]
async fn command_without_cmd_is_a_missing_parameter() {
    let dir = project();
    let out = dir.path().join(".buildwatch/app");
    let target = TargetDescriptor::new("app", "app", BuildMethod::Command);

    let err = dispatcher(dir.path())
        .execute(&target, &out)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BuildError::MissingParameter { ref param, .. } if param == "cmd"
    ));
}

#[tokio::test]
async fn missing_source_root_fails_to_spawn() {
    let dir = project();
    let out = dir.path().join(".buildwatch/ghost");
    let target = TargetDescriptor::new("ghost", "does/not/exist", BuildMethod::Command)
        .with_param("cmd", "true");

    let outcome = run_build(&dispatcher(dir.path()), &target, &out, None).await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, None);
    assert!(outcome.errors[0].contains("failed to spawn"));
}

#[tokio::test]
async fn slow_build_times_out() {
    let dir = project();
    let out = dir.path().join(".buildwatch/app");
    let target = command("app", "sleep 5");

    let outcome = run_build(
        &dispatcher(dir.path()),
        &target,
        &out,
        Some(Duration::from_millis(100)),
    )
    .await;

    assert!(!outcome.success);
    assert!(outcome.errors[0].contains("timed out"), "{:?}", outcome.errors);
}

#[tokio::test]
async fn copy_with_unnormalized_root_skips_output_dir() {
    let dir = project();
    fs::create_dir_all(dir.path().join("scratch")).unwrap();
    let root = dir.path().join("scratch/..");
    let out = dir.path().join(".buildwatch/all");
    let target = TargetDescriptor::new("all", ".", BuildMethod::Copy);

    let outcome = run_build(&dispatcher(&root), &target, &out, None).await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert!(out.join("app/src/main.c").is_file());
    assert!(!out.join(".buildwatch").exists());
}
