// tests/config_errors.rs

use std::io::Write;

use hashmake::config::{load_and_validate, task_order};
use hashmake::errors::HashmakeError;
use hashmake_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use tempfile::NamedTempFile;

fn load(toml: &str) -> Result<hashmake::config::ConfigFile, HashmakeError> {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{toml}").unwrap();
    load_and_validate(file.path())
}

fn expect_config_error(toml: &str, needle: &str) {
    match load(toml) {
        Err(HashmakeError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} lacks {needle:?}")
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_minimal_config_gets_defaults() {
    let cfg = load(
        r#"
[task.site]
cmd = "make site"
"#,
    )
    .unwrap();

    assert_eq!(cfg.config_section().cache, ".hashmake/cache.json");
    assert_eq!(cfg.config_section().settle_ms, 50);
    assert_eq!(cfg.default_target(), Some("site"));
    let site = cfg.task("site").unwrap();
    assert!(site.needs.is_empty() && site.inputs.is_empty() && site.output.is_none());
}

#[test]
fn test_full_config_parses() {
    let cfg = load(
        r#"
[config]
target = "page"
cache = "out/cache.json"
settle_ms = 200

[options]
width = 990
title = "Charts"

[task.body]
cmd = "render body"
inputs = ["src/**/*.md"]
output = "build/body.html"

[task.page]
cmd = "render page"
needs = ["body"]
"#,
    )
    .unwrap();

    assert_eq!(cfg.default_target(), Some("page"));
    assert_eq!(cfg.config_section().settle_ms, 200);
    assert_eq!(cfg.json_options()["width"], serde_json::json!(990));
    assert_eq!(cfg.json_options()["title"], serde_json::json!("Charts"));
    assert_eq!(task_order(cfg.tasks()).unwrap(), vec!["body", "page"]);
}

#[test]
fn test_several_tasks_without_target_have_no_default() {
    let cfg = load(
        r#"
[task.a]
cmd = "echo a"

[task.b]
cmd = "echo b"
"#,
    )
    .unwrap();
    assert_eq!(cfg.default_target(), None);
}

#[test]
fn test_dag_cycle_returns_structured_error() {
    match load(
        r#"
[task.A]
cmd = "echo A"
needs = ["B"]

[task.B]
cmd = "echo B"
needs = ["A"]
"#,
    ) {
        Err(HashmakeError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains("A") || msg.contains("B"));
        }
        Err(e) => panic!("Expected DagCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_dependency_returns_config_error() {
    expect_config_error(
        r#"
[task.A]
cmd = "echo A"
needs = ["NonExistent"]
"#,
        "unknown dependency 'NonExistent'",
    );
}

#[test]
fn test_self_dependency_returns_config_error() {
    expect_config_error(
        r#"
[task.A]
cmd = "echo A"
needs = ["A"]
"#,
        "cannot depend on itself",
    );
}

#[test]
fn test_builtin_names_are_reserved() {
    expect_config_error(
        r#"
[task.glob]
cmd = "echo glob"
"#,
        "shadows a built-in",
    );
    expect_config_error(
        r#"
[task.A]
cmd = "echo A"
needs = ["file"]
"#,
        "use `inputs` for files",
    );
}

#[test]
fn test_unknown_target_returns_config_error() {
    expect_config_error(
        r#"
[config]
target = "docs"

[task.A]
cmd = "echo A"
"#,
        "unknown task 'docs'",
    );
}

#[test]
fn test_invalid_input_glob_returns_config_error() {
    expect_config_error(
        r#"
[task.A]
cmd = "echo A"
inputs = ["src/[oops"]
"#,
        "invalid `inputs`",
    );
}

#[test]
fn test_empty_config_returns_config_error() {
    expect_config_error("", "at least one [task.<name>]");
}

#[test]
fn test_malformed_toml_returns_toml_error() {
    match load("[task.A\ncmd = ") {
        Err(HashmakeError::TomlError(_)) => {}
        Err(e) => panic!("Expected TomlError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_missing_file_returns_io_error() {
    match load_and_validate("/definitely/not/here/Hashmake.toml") {
        Err(HashmakeError::IoError(_)) => {}
        Err(e) => panic!("Expected IoError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_builder_config_orders_needs_first() {
    let cfg = ConfigFileBuilder::new()
        .with_task("z_first", TaskConfigBuilder::new("echo 1").build())
        .with_task("a_second", TaskConfigBuilder::new("echo 2").needs("z_first").build())
        .build();

    assert_eq!(task_order(cfg.tasks()).unwrap(), vec!["z_first", "a_second"]);
}

#[test]
fn test_builder_raw_config_fails_validation() {
    let raw = ConfigFileBuilder::new()
        .with_task("A", TaskConfigBuilder::new("   ").build())
        .build_raw();
    assert!(matches!(
        hashmake::config::validate_config(&raw),
        Err(HashmakeError::ConfigError(msg)) if msg.contains("empty `cmd`")
    ));
}

#[test]
fn test_cli_target_must_name_a_configured_task() {
    let cfg = ConfigFileBuilder::new()
        .with_task("site", TaskConfigBuilder::new("make site").build())
        .with_task("docs", TaskConfigBuilder::new("make docs").build())
        .build();

    assert_eq!(cfg.resolve_target(Some("docs")).unwrap(), "docs");
    match cfg.resolve_target(Some("sitee")) {
        Err(HashmakeError::ConfigError(msg)) => {
            assert!(msg.contains("unknown task 'sitee'"), "message {msg:?}");
            assert!(msg.contains("docs, site"), "message {msg:?}");
        }
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
    // Built-in tasks take arguments and cannot be selected by name.
    assert!(matches!(
        cfg.resolve_target(Some("file")),
        Err(HashmakeError::ConfigError(_))
    ));
}

#[test]
fn test_target_falls_back_to_config_section() {
    let cfg = ConfigFileBuilder::new()
        .with_task("site", TaskConfigBuilder::new("make site").build())
        .with_task("docs", TaskConfigBuilder::new("make docs").build())
        .with_target("site")
        .build();
    assert_eq!(cfg.resolve_target(None).unwrap(), "site");

    let untargeted = ConfigFileBuilder::new()
        .with_task("site", TaskConfigBuilder::new("make site").build())
        .with_task("docs", TaskConfigBuilder::new("make docs").build())
        .build();
    assert!(matches!(
        untargeted.resolve_target(None),
        Err(HashmakeError::ConfigError(msg)) if msg.contains("no target selected")
    ));
}
